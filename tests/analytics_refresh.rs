//! Dashboard refresh against seeded session history.

mod common;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use harbor::analytics::{Aggregator, ConcernLevel, TrendDirection};
use harbor::store::{MoodAnalysis, SessionRow, SqliteStore};

fn seed_session(store: &SqliteStore, child_id: &str, age: Duration, duration: i64) {
    let session = SessionRow {
        id: Uuid::new_v4().to_string(),
        child_id: child_id.to_string(),
        status: "completed".to_string(),
        session_duration: duration,
        mood_analysis: Some(MoodAnalysis::neutral()),
        topics: vec!["school".to_string()],
        user_message: "I had a busy day".to_string(),
        ai_response: "Tell me about it!".to_string(),
        created_at: Utc::now() - age,
    };
    store.append_session(&session).unwrap();
}

#[tokio::test]
async fn refresh_builds_exact_statistics_and_validated_narrative() {
    let h = common::harness();
    let (family_id, child_id) = h.seed_family();

    // Three sessions today, two well before the current week.
    seed_session(&h.store, &child_id, Duration::minutes(3), 300);
    seed_session(&h.store, &child_id, Duration::minutes(2), 240);
    seed_session(&h.store, &child_id, Duration::minutes(1), 180);
    seed_session(&h.store, &child_id, Duration::days(9), 600);
    seed_session(&h.store, &child_id, Duration::days(10), 660);

    let status = h
        .service
        .refresh_dashboard(&family_id, &child_id)
        .await
        .unwrap();
    assert_eq!(status.as_str(), "completed");

    let record = h.service.dashboard(&family_id, &child_id).unwrap().unwrap();

    // Counts are ground truth from the store, never from the model.
    assert_eq!(record.sessions_analytics.total_sessions, 5);
    assert_eq!(record.sessions_analytics.sessions_this_week, 3);
    // Mean over the recent sample: (300+240+180+600+660)/5
    assert_eq!(record.sessions_analytics.average_duration_seconds, 396);

    assert_eq!(record.emotional_trend.direction, TrendDirection::Improving);
    assert_eq!(record.active_concerns.level, ConcernLevel::Moderate);
    assert!(!record.alerts.has_alert);

    // Goals arrive in the fixed category order.
    let goal_types: Vec<&str> = record
        .family_communication_goals
        .iter()
        .map(|g| g.goal_type.as_str())
        .collect();
    assert_eq!(goal_types, vec!["This Week", "Ongoing", "If Needed"]);
}

#[tokio::test]
async fn refresh_is_idempotent_on_unchanged_history() {
    let h = common::harness();
    let (family_id, child_id) = h.seed_family();
    seed_session(&h.store, &child_id, Duration::minutes(10), 420);
    seed_session(&h.store, &child_id, Duration::minutes(5), 180);

    let latest = h.store.latest_session(&child_id).unwrap().unwrap();
    let aggregator = Aggregator::new(&h.store, h.model.as_ref());

    let first = aggregator.refresh(&child_id, &latest, &family_id).await.unwrap();
    let second = aggregator.refresh(&child_id, &latest, &family_id).await.unwrap();

    assert_eq!(first.sessions_analytics, second.sessions_analytics);

    // Still a single row, reflecting the latest write.
    let stored = h.store.get_analytics(&child_id).unwrap().unwrap();
    assert_eq!(stored.sessions_analytics, second.sessions_analytics);
}

#[tokio::test]
async fn refresh_refuses_a_child_with_no_sessions() {
    let h = common::harness();
    let (family_id, child_id) = h.seed_family();

    let err = h
        .service
        .refresh_dashboard(&family_id, &child_id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
    assert!(h.service.dashboard(&family_id, &child_id).unwrap().is_none());
}

#[tokio::test]
async fn high_priority_concerns_set_the_dashboard_alert() {
    let mut insights = common::default_insights();
    insights["active_concerns"] = json!({
        "count": 2,
        "level": "high_priority",
        "concerns": ["withdrawn at school", "trouble sleeping"]
    });
    let h = common::harness_with(common::FakeModel::with_insights(insights));
    let (family_id, child_id) = h.seed_family();
    seed_session(&h.store, &child_id, Duration::minutes(10), 300);

    h.service
        .refresh_dashboard(&family_id, &child_id)
        .await
        .unwrap();

    let record = h.service.dashboard(&family_id, &child_id).unwrap().unwrap();
    assert!(record.alerts.has_alert);
    assert_eq!(
        record.alerts.description.as_deref(),
        Some("withdrawn at school")
    );
}

#[tokio::test]
async fn malformed_narrative_aborts_without_a_partial_write() {
    // Goals in the wrong order fail validation at the parse boundary.
    let mut insights = common::default_insights();
    insights["family_communication_goals"]
        .as_array_mut()
        .unwrap()
        .reverse();
    let h = common::harness_with(common::FakeModel::with_insights(insights));
    let (family_id, child_id) = h.seed_family();
    seed_session(&h.store, &child_id, Duration::minutes(10), 300);

    let err = h
        .service
        .refresh_dashboard(&family_id, &child_id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);

    // Nothing was written.
    assert!(h.service.dashboard(&family_id, &child_id).unwrap().is_none());
}

#[tokio::test]
async fn dashboard_is_scoped_to_the_owning_family() {
    let h = common::harness();
    let (_family_id, child_id) = h.seed_family();
    let other_family = h
        .service
        .create_family("Casey", "casey@example.com", None)
        .unwrap();

    let err = h.service.dashboard(&other_family, &child_id).unwrap_err();
    assert_eq!(err.status_code(), 403);
}
