//! Relational storage with SQLite
//!
//! Typed accessors for the five core tables: families, children,
//! therapy_sessions, mood_tracking, dashboard_analytics. Pure CRUD; the
//! business rules live in the service and analytics layers.

mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analytics::DashboardRecord;

pub use schema::SCHEMA;

/// Five 0-10 mood sub-scores plus a free-text insight, as saved per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodAnalysis {
    pub happiness: u8,
    pub anxiety: u8,
    pub sadness: u8,
    pub stress: u8,
    pub confidence: u8,
    #[serde(default)]
    pub insight: Option<String>,
}

impl MoodAnalysis {
    /// Neutral scores, used when a session carries no analysis.
    pub fn neutral() -> Self {
        Self {
            happiness: 5,
            anxiety: 5,
            sadness: 5,
            stress: 5,
            confidence: 5,
            insight: None,
        }
    }
}

/// Subscription lifecycle states mirrored from the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Inactive,
    Trial,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Canceling,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Canceling => "canceling",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(SubscriptionStatus::Inactive),
            "trial" => Some(SubscriptionStatus::Trial),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "active" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            "canceling" => Some(SubscriptionStatus::Canceling),
            _ => None,
        }
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ============================================
    // FAMILIES
    // ============================================

    pub fn create_family(
        &self,
        id: &str,
        parent_name: &str,
        parent_email: &str,
        pin: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO families (id, parent_name, parent_email, dashboard_pin)
             VALUES (?, ?, ?, ?)",
            params![id, parent_name, parent_email, pin],
        )?;
        Ok(())
    }

    pub fn get_family(&self, id: &str) -> Result<Option<FamilyRow>> {
        let row = self.conn.query_row(
            "SELECT id, parent_name, parent_email, subscription_status, trial_ends_at,
                    current_period_end, dashboard_pin, created_at
             FROM families WHERE id = ?",
            params![id],
            |row| {
                Ok(FamilyRow {
                    id: row.get(0)?,
                    parent_name: row.get(1)?,
                    parent_email: row.get(2)?,
                    subscription_status: row.get(3)?,
                    trial_ends_at: row.get(4)?,
                    current_period_end: row.get(5)?,
                    dashboard_pin: row.get(6)?,
                    created_at: row.get(7)?,
                })
            },
        );

        match row {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_subscription_status(&self, id: &str, status: SubscriptionStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE families SET subscription_status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    pub fn set_dashboard_pin(&self, id: &str, pin: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE families SET dashboard_pin = ? WHERE id = ?",
            params![pin, id],
        )?;
        Ok(())
    }

    // ============================================
    // CHILDREN
    // ============================================

    pub fn create_child(&self, child: &ChildRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO children
               (id, family_id, name, age, concerns, triggers, goals, is_active, profile_completed)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                child.id,
                child.family_id,
                child.name,
                child.age,
                child.concerns,
                child.triggers,
                child.goals,
                child.is_active,
                child.profile_completed,
            ],
        )?;
        Ok(())
    }

    pub fn get_child(&self, id: &str) -> Result<Option<ChildRow>> {
        let row = self.conn.query_row(
            "SELECT id, family_id, name, age, concerns, triggers, goals,
                    is_active, profile_completed, created_at
             FROM children WHERE id = ?",
            params![id],
            map_child_row,
        );

        match row {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Active children for a family, oldest profile first.
    pub fn list_children(&self, family_id: &str) -> Result<Vec<ChildRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, family_id, name, age, concerns, triggers, goals,
                    is_active, profile_completed, created_at
             FROM children WHERE family_id = ? AND is_active = TRUE
             ORDER BY created_at",
        )?;

        let rows = stmt.query_map(params![family_id], map_child_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Count includes soft-deleted rows: the per-family cap is a lifetime cap.
    pub fn count_children(&self, family_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM children WHERE family_id = ?",
            params![family_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn deactivate_child(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE children SET is_active = FALSE WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    pub fn mark_profile_completed(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE children SET profile_completed = TRUE WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    // ============================================
    // THERAPY SESSIONS
    // ============================================

    /// Append a new conversation turn. Sessions are append-only.
    pub fn append_session(&self, session: &SessionRow) -> Result<()> {
        let mood_json = session
            .mood_analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("serializing mood analysis")?;
        let topics_json = serde_json::to_string(&session.topics).context("serializing topics")?;

        self.conn.execute(
            "INSERT INTO therapy_sessions
               (id, child_id, status, session_duration, mood_analysis, topics,
                user_message, ai_response, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                session.id,
                session.child_id,
                session.status,
                session.session_duration,
                mood_json,
                topics_json,
                session.user_message,
                session.ai_response,
                format_ts(&session.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn latest_session(&self, child_id: &str) -> Result<Option<SessionRow>> {
        let rows = self.recent_sessions(child_id, 1)?;
        Ok(rows.into_iter().next())
    }

    /// Close the most recent active session, stamping its duration.
    /// Returns the id of the completed row, or None when nothing was active.
    pub fn complete_active_session(
        &self,
        child_id: &str,
        duration_secs: i64,
    ) -> Result<Option<String>> {
        let id = match self.conn.query_row(
            "SELECT id FROM therapy_sessions
             WHERE child_id = ? AND status = 'active'
             ORDER BY created_at DESC LIMIT 1",
            params![child_id],
            |row| row.get::<_, String>(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(ref session_id) = id {
            self.conn.execute(
                "UPDATE therapy_sessions SET status = 'completed', session_duration = ?
                 WHERE id = ?",
                params![duration_secs, session_id],
            )?;
        }

        Ok(id)
    }

    pub fn count_sessions(&self, child_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM therapy_sessions WHERE child_id = ?",
            params![child_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_sessions_since(&self, child_id: &str, cutoff: DateTime<Utc>) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM therapy_sessions WHERE child_id = ? AND created_at >= ?",
            params![child_id, format_ts(&cutoff)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Most recent sessions, newest first.
    pub fn recent_sessions(&self, child_id: &str, limit: usize) -> Result<Vec<SessionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, child_id, status, session_duration, mood_analysis, topics,
                    user_message, ai_response, created_at
             FROM therapy_sessions WHERE child_id = ?
             ORDER BY created_at DESC LIMIT ?",
        )?;

        let rows = stmt.query_map(params![child_id, limit as i64], map_session_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_sessions(&self, child_id: &str) -> Result<Vec<SessionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, child_id, status, session_duration, mood_analysis, topics,
                    user_message, ai_response, created_at
             FROM therapy_sessions WHERE child_id = ?
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![child_id], map_session_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ============================================
    // MOOD TRACKING
    // ============================================

    pub fn record_mood(
        &self,
        child_id: &str,
        session_id: &str,
        mood: &MoodAnalysis,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO mood_tracking
               (child_id, session_id, happiness, anxiety, sadness, stress, confidence,
                insight, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                child_id,
                session_id,
                mood.happiness,
                mood.anxiety,
                mood.sadness,
                mood.stress,
                mood.confidence,
                mood.insight,
                format_ts(&recorded_at),
            ],
        )?;
        Ok(())
    }

    // ============================================
    // DASHBOARD ANALYTICS
    // ============================================

    /// Full-row replace keyed by child_id. Every column is overwritten so a
    /// recalculation can never leave stale fields behind.
    pub fn upsert_analytics(&self, record: &DashboardRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO dashboard_analytics
               (child_id, family_id, latest_mood, sessions_analytics, emotional_trend,
                active_concerns, alerts, communication_insights, growth_development_insights,
                family_communication_summary, conversation_organization, family_wellness_tips,
                family_communication_goals, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(child_id) DO UPDATE SET
                 family_id = excluded.family_id,
                 latest_mood = excluded.latest_mood,
                 sessions_analytics = excluded.sessions_analytics,
                 emotional_trend = excluded.emotional_trend,
                 active_concerns = excluded.active_concerns,
                 alerts = excluded.alerts,
                 communication_insights = excluded.communication_insights,
                 growth_development_insights = excluded.growth_development_insights,
                 family_communication_summary = excluded.family_communication_summary,
                 conversation_organization = excluded.conversation_organization,
                 family_wellness_tips = excluded.family_wellness_tips,
                 family_communication_goals = excluded.family_communication_goals,
                 updated_at = excluded.updated_at",
            params![
                record.child_id,
                record.family_id,
                serde_json::to_string(&record.latest_mood)?,
                serde_json::to_string(&record.sessions_analytics)?,
                serde_json::to_string(&record.emotional_trend)?,
                serde_json::to_string(&record.active_concerns)?,
                serde_json::to_string(&record.alerts)?,
                serde_json::to_string(&record.communication_insights)?,
                serde_json::to_string(&record.growth_development_insights)?,
                record.family_communication_summary,
                record.conversation_organization,
                serde_json::to_string(&record.family_wellness_tips)?,
                serde_json::to_string(&record.family_communication_goals)?,
                format_ts(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_analytics(&self, child_id: &str) -> Result<Option<DashboardRecord>> {
        let row = self.conn.query_row(
            "SELECT child_id, family_id, latest_mood, sessions_analytics, emotional_trend,
                    active_concerns, alerts, communication_insights, growth_development_insights,
                    family_communication_summary, conversation_organization, family_wellness_tips,
                    family_communication_goals, updated_at
             FROM dashboard_analytics WHERE child_id = ?",
            params![child_id],
            |row| {
                Ok(DashboardRecord {
                    child_id: row.get(0)?,
                    family_id: row.get(1)?,
                    latest_mood: from_json(row, 2)?,
                    sessions_analytics: from_json(row, 3)?,
                    emotional_trend: from_json(row, 4)?,
                    active_concerns: from_json(row, 5)?,
                    alerts: from_json(row, 6)?,
                    communication_insights: from_json(row, 7)?,
                    growth_development_insights: from_json(row, 8)?,
                    family_communication_summary: row.get(9)?,
                    conversation_organization: row.get(10)?,
                    family_wellness_tips: from_json(row, 11)?,
                    family_communication_goals: from_json(row, 12)?,
                    updated_at: parse_ts_col(row, 13)?,
                })
            },
        );

        match row {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone)]
pub struct FamilyRow {
    pub id: String,
    pub parent_name: String,
    pub parent_email: String,
    pub subscription_status: String,
    pub trial_ends_at: Option<String>,
    pub current_period_end: Option<String>,
    pub dashboard_pin: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChildRow {
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub age: i64,
    pub concerns: Option<String>,
    pub triggers: Option<String>,
    pub goals: Option<String>,
    pub is_active: bool,
    pub profile_completed: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub child_id: String,
    pub status: String,
    pub session_duration: i64,
    pub mood_analysis: Option<MoodAnalysis>,
    pub topics: Vec<String>,
    pub user_message: String,
    pub ai_response: String,
    pub created_at: DateTime<Utc>,
}

// ============================================
// HELPERS
// ============================================

/// Canonical timestamp format for columns compared with >= in SQL.
pub fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_child_row(row: &rusqlite::Row) -> rusqlite::Result<ChildRow> {
    Ok(ChildRow {
        id: row.get(0)?,
        family_id: row.get(1)?,
        name: row.get(2)?,
        age: row.get(3)?,
        concerns: row.get(4)?,
        triggers: row.get(5)?,
        goals: row.get(6)?,
        is_active: row.get(7)?,
        profile_completed: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_session_row(row: &rusqlite::Row) -> rusqlite::Result<SessionRow> {
    let mood_raw: Option<String> = row.get(4)?;
    let mood_analysis = mood_raw
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()?;

    let topics_raw: Option<String> = row.get(5)?;
    let topics = match topics_raw {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        None => Vec::new(),
    };

    Ok(SessionRow {
        id: row.get(0)?,
        child_id: row.get(1)?,
        status: row.get(2)?,
        session_duration: row.get(3)?,
        mood_analysis,
        topics,
        user_message: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        ai_response: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        created_at: parse_ts_col(row, 8)?,
    })
}

fn from_json<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_ts_col(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
