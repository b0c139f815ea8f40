//! SQLite schema definition
//!
//! Notes:
//! - Timestamps are RFC 3339 UTC text throughout, written by the store helpers
//! - Structured columns (mood analysis, topics, analytics sub-records) are JSON text
//! - dashboard_analytics is keyed by child_id: one row per child, fully replaced
//!   on every recalculation

pub const SCHEMA: &str = r#"
-- ============================================
-- FAMILIES
-- ============================================

-- Account root: one family owns up to four children
CREATE TABLE IF NOT EXISTS families (
    id TEXT PRIMARY KEY,
    parent_name TEXT NOT NULL,
    parent_email TEXT NOT NULL UNIQUE,
    subscription_status TEXT DEFAULT 'inactive',   -- 'inactive','trial','trialing','active','past_due','canceled','canceling'
    trial_ends_at DATETIME,
    current_period_end DATETIME,
    dashboard_pin TEXT,                            -- 4-digit numeric, stored as plaintext (known defect)
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- ============================================
-- CHILDREN
-- ============================================

-- Therapy subject profiles. Soft delete only: is_active = FALSE freezes the
-- row, it is never removed.
CREATE TABLE IF NOT EXISTS children (
    id TEXT PRIMARY KEY,
    family_id TEXT NOT NULL,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,                          -- 6..18 at creation
    concerns TEXT,
    triggers TEXT,
    goals TEXT,
    is_active BOOLEAN DEFAULT TRUE,
    profile_completed BOOLEAN DEFAULT FALSE,       -- gates chat access
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY(family_id) REFERENCES families(id)
);

-- ============================================
-- THERAPY SESSIONS
-- ============================================

-- Append-only conversation turns. 'complete' updates status/duration on the
-- most recent active row rather than inserting.
CREATE TABLE IF NOT EXISTS therapy_sessions (
    id TEXT PRIMARY KEY,
    child_id TEXT NOT NULL,
    status TEXT DEFAULT 'active',                  -- 'active' | 'completed'
    session_duration INTEGER DEFAULT 0,            -- seconds
    mood_analysis TEXT,                            -- JSON: five 0-10 scores + insight
    topics TEXT,                                   -- JSON array of strings
    user_message TEXT,
    ai_response TEXT,
    created_at DATETIME NOT NULL,
    FOREIGN KEY(child_id) REFERENCES children(id)
);

-- ============================================
-- MOOD TRACKING
-- ============================================

-- One row per saved mood analysis, denormalized out of therapy_sessions so
-- history queries avoid JSON extraction.
CREATE TABLE IF NOT EXISTS mood_tracking (
    id INTEGER PRIMARY KEY,
    child_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    happiness INTEGER NOT NULL,
    anxiety INTEGER NOT NULL,
    sadness INTEGER NOT NULL,
    stress INTEGER NOT NULL,
    confidence INTEGER NOT NULL,
    insight TEXT,
    recorded_at DATETIME NOT NULL,
    FOREIGN KEY(child_id) REFERENCES children(id),
    FOREIGN KEY(session_id) REFERENCES therapy_sessions(id)
);

-- ============================================
-- DASHBOARD ANALYTICS
-- ============================================

-- Denormalized per-child analytics. Upserts replace every column; statistics
-- columns are ground truth from fresh counts, narrative columns come from the
-- insight model.
CREATE TABLE IF NOT EXISTS dashboard_analytics (
    child_id TEXT PRIMARY KEY,
    family_id TEXT NOT NULL,
    latest_mood TEXT NOT NULL,                     -- JSON: status + trend
    sessions_analytics TEXT NOT NULL,              -- JSON: weekly/total counts, avg duration, last session
    emotional_trend TEXT NOT NULL,                 -- JSON: direction, attention flag, key factors
    active_concerns TEXT NOT NULL,                 -- JSON: count, level, concern lists
    alerts TEXT NOT NULL,                          -- JSON: has_alert + optional title/description
    communication_insights TEXT NOT NULL,          -- JSON array of topic/confidence/observation
    growth_development_insights TEXT NOT NULL,     -- JSON array
    family_communication_summary TEXT NOT NULL,
    conversation_organization TEXT NOT NULL,
    family_wellness_tips TEXT NOT NULL,            -- JSON array
    family_communication_goals TEXT NOT NULL,      -- JSON array, exactly three fixed goal types
    updated_at DATETIME NOT NULL,
    FOREIGN KEY(child_id) REFERENCES children(id),
    FOREIGN KEY(family_id) REFERENCES families(id)
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_children_family ON children(family_id);
CREATE INDEX IF NOT EXISTS idx_sessions_child ON therapy_sessions(child_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON therapy_sessions(child_id, status);
CREATE INDEX IF NOT EXISTS idx_mood_child ON mood_tracking(child_id, recorded_at DESC);
CREATE INDEX IF NOT EXISTS idx_analytics_family ON dashboard_analytics(family_id);
"#;
