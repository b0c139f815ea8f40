//! Dashboard analytics commands

use anyhow::Result;

use crate::service::HarborService;

pub fn show(service: &HarborService, family_id: String, child_id: String) -> Result<()> {
    let Some(record) = service.dashboard(&family_id, &child_id)? else {
        println!("No analytics yet. Run 'harbor analytics refresh' after a session.");
        return Ok(());
    };

    println!("Updated: {}", record.updated_at.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "Mood: {} ({})",
        record.latest_mood.status, record.latest_mood.trend
    );
    println!(
        "Sessions: {} this week, {} total, avg {}s",
        record.sessions_analytics.sessions_this_week,
        record.sessions_analytics.total_sessions,
        record.sessions_analytics.average_duration_seconds,
    );
    println!(
        "Concerns: {} ({:?})",
        record.active_concerns.count, record.active_concerns.level
    );
    if record.alerts.has_alert {
        println!(
            "ALERT: {}",
            record.alerts.title.as_deref().unwrap_or("see dashboard")
        );
    }

    println!("\n{}", record.family_communication_summary);

    println!("\nGoals:");
    for goal in &record.family_communication_goals {
        println!("  {}: {}", goal.goal_type, goal.description);
    }

    if !record.family_wellness_tips.is_empty() {
        println!("\nWellness tips:");
        for tip in &record.family_wellness_tips {
            println!("  - {tip}");
        }
    }
    Ok(())
}

pub async fn refresh(service: &HarborService, family_id: String, child_id: String) -> Result<()> {
    let status = service.refresh_dashboard(&family_id, &child_id).await?;
    println!("Recalculation {}", status.as_str());
    Ok(())
}
