//! Therapeutic memory retrieval
//!
//! Past conversation turns are embedded and stored in the vector index so new
//! chat turns can be grounded in semantically similar history. Storage is
//! best-effort: a failed write is logged and swallowed so the chat response is
//! never blocked. Retrieval failures degrade to "no memories" the same way.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::llm::LanguageModel;
use crate::store::MoodAnalysis;
use crate::vector::{Filter, VectorIndex, VectorRecord};

/// Longest message excerpt persisted in vector metadata.
const EXCERPT_LIMIT: usize = 500;

/// Cap on records pulled for pattern aggregation.
const PATTERN_SCAN_LIMIT: usize = 100;

/// Typed vector metadata for one stored conversation turn. Deserialized and
/// validated right after every query; malformed records are logged and skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub child_id: String,
    pub message_excerpt: String,
    /// Unix seconds, used for range filters
    pub session_timestamp: i64,
    /// Original RFC 3339 string, kept for display
    pub session_date: String,
    pub happiness: u8,
    pub anxiety: u8,
    pub sadness: u8,
    pub stress: u8,
    pub confidence: u8,
    pub topics: Vec<String>,
}

/// One conversation turn to persist.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub child_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub topics: Vec<String>,
    pub mood: Option<MoodAnalysis>,
    pub date: DateTime<Utc>,
}

/// A retrieved memory with its similarity score.
#[derive(Debug, Clone)]
pub struct MemoryMatch {
    pub score: f32,
    pub metadata: ConversationMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnxietyTrend {
    Improving,
    Increasing,
    Stable,
}

impl AnxietyTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnxietyTrend::Improving => "improving",
            AnxietyTrend::Increasing => "increasing",
            AnxietyTrend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MoodAverages {
    pub happiness: f64,
    pub anxiety: f64,
    pub sadness: f64,
    pub stress: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct EmotionalPatterns {
    pub record_count: usize,
    pub averages: MoodAverages,
    /// Top 10 topics by frequency, most frequent first
    pub top_topics: Vec<(String, usize)>,
    pub anxiety_trend: AnxietyTrend,
}

pub struct TherapeuticMemory {
    model: Arc<dyn LanguageModel>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    dimensions: usize,
}

impl TherapeuticMemory {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        index: Arc<dyn VectorIndex>,
        namespace: String,
        dimensions: usize,
    ) -> Self {
        Self {
            model,
            index,
            namespace,
            dimensions,
        }
    }

    /// Persist one conversation turn. Best-effort: errors are logged, never
    /// returned, so the chat path cannot be blocked by memory storage.
    pub async fn store_conversation(&self, ctx: &ConversationContext) {
        if let Err(e) = self.try_store(ctx).await {
            warn!(
                conversation_id = %ctx.conversation_id,
                child_id = %ctx.child_id,
                error = %format!("{e:#}"),
                "conversation memory storage failed"
            );
        }
    }

    async fn try_store(&self, ctx: &ConversationContext) -> Result<()> {
        let mood = ctx.mood.clone().unwrap_or_else(MoodAnalysis::neutral);
        let embed_text = format!(
            "Child: {}\nCompanion: {}\nTopics: {}\nInsight: {}",
            ctx.user_message,
            ctx.ai_response,
            ctx.topics.join(", "),
            mood.insight.as_deref().unwrap_or(""),
        );
        let vector = self.model.embed(&embed_text).await?;

        let metadata = ConversationMetadata {
            child_id: ctx.child_id.clone(),
            message_excerpt: truncate(&ctx.user_message, EXCERPT_LIMIT),
            session_timestamp: ctx.date.timestamp(),
            session_date: ctx.date.to_rfc3339(),
            happiness: mood.happiness,
            anxiety: mood.anxiety,
            sadness: mood.sadness,
            stress: mood.stress,
            confidence: mood.confidence,
            topics: ctx.topics.clone(),
        };

        let record = VectorRecord {
            id: ctx.conversation_id.clone(),
            values: vector,
            metadata: serde_json::to_value(&metadata).context("serializing memory metadata")?,
        };
        self.index.upsert(&self.namespace, record).await
    }

    /// Nearest-neighbor memories for the current message, filtered to the
    /// child. No recency bias beyond similarity. Empty on any failure.
    pub async fn relevant_memories(
        &self,
        child_id: &str,
        current_message: &str,
        limit: usize,
    ) -> Vec<MemoryMatch> {
        match self.try_relevant(child_id, current_message, limit).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(child_id, error = %format!("{e:#}"), "memory retrieval failed");
                Vec::new()
            }
        }
    }

    async fn try_relevant(
        &self,
        child_id: &str,
        current_message: &str,
        limit: usize,
    ) -> Result<Vec<MemoryMatch>> {
        let vector = self.model.embed(current_message).await?;
        let filter = Filter::new().eq("child_id", child_id).build();
        let matches = self
            .index
            .query(&self.namespace, vector, limit, filter)
            .await?;

        Ok(matches
            .into_iter()
            .filter_map(|m| match serde_json::from_value(m.metadata) {
                Ok(metadata) => Some(MemoryMatch {
                    score: m.score,
                    metadata,
                }),
                Err(e) => {
                    warn!(record_id = %m.id, error = %e, "skipping malformed memory record");
                    None
                }
            })
            .collect())
    }

    /// Aggregate mood metadata over a trailing window. This is a metadata
    /// scan, not a similarity search: the query vector is all zeros and only
    /// the filter does the work. None when the window holds no records.
    pub async fn emotional_patterns(
        &self,
        child_id: &str,
        days: i64,
    ) -> Option<EmotionalPatterns> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).timestamp();
        let filter = Filter::new()
            .eq("child_id", child_id)
            .gte("session_timestamp", cutoff)
            .build();

        let matches = match self
            .index
            .query(&self.namespace, vec![0.0; self.dimensions], PATTERN_SCAN_LIMIT, filter)
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!(child_id, error = %format!("{e:#}"), "pattern scan failed");
                return None;
            }
        };

        let records: Vec<ConversationMetadata> = matches
            .into_iter()
            .filter_map(|m| match serde_json::from_value(m.metadata) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!(record_id = %m.id, error = %e, "skipping malformed memory record");
                    None
                }
            })
            .collect();

        summarize_patterns(records)
    }
}

/// Pure aggregation over scanned records: per-score averages, topic
/// frequency (top 10), and the recent-vs-earlier anxiety trend.
pub fn summarize_patterns(mut records: Vec<ConversationMetadata>) -> Option<EmotionalPatterns> {
    if records.is_empty() {
        return None;
    }

    records.sort_by(|a, b| b.session_timestamp.cmp(&a.session_timestamp));
    let n = records.len() as f64;

    let averages = MoodAverages {
        happiness: records.iter().map(|r| r.happiness as f64).sum::<f64>() / n,
        anxiety: records.iter().map(|r| r.anxiety as f64).sum::<f64>() / n,
        sadness: records.iter().map(|r| r.sadness as f64).sum::<f64>() / n,
        stress: records.iter().map(|r| r.stress as f64).sum::<f64>() / n,
        confidence: records.iter().map(|r| r.confidence as f64).sum::<f64>() / n,
    };

    let mut topic_counts: std::collections::HashMap<String, usize> = Default::default();
    for record in &records {
        for topic in &record.topics {
            *topic_counts.entry(topic.clone()).or_default() += 1;
        }
    }
    let mut top_topics: Vec<(String, usize)> = topic_counts.into_iter().collect();
    top_topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_topics.truncate(10);

    // Trend: mean anxiety of the 5 most recent records vs all earlier records
    // in the same window. One point of movement flips the label.
    let recent: Vec<&ConversationMetadata> = records.iter().take(5).collect();
    let earlier: Vec<&ConversationMetadata> = records.iter().skip(5).collect();
    let anxiety_trend = if earlier.is_empty() {
        AnxietyTrend::Stable
    } else {
        let recent_mean =
            recent.iter().map(|r| r.anxiety as f64).sum::<f64>() / recent.len() as f64;
        let earlier_mean =
            earlier.iter().map(|r| r.anxiety as f64).sum::<f64>() / earlier.len() as f64;
        if recent_mean <= earlier_mean - 1.0 {
            AnxietyTrend::Improving
        } else if recent_mean >= earlier_mean + 1.0 {
            AnxietyTrend::Increasing
        } else {
            AnxietyTrend::Stable
        }
    };

    Some(EmotionalPatterns {
        record_count: records.len(),
        averages,
        top_topics,
        anxiety_trend,
    })
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: i64, anxiety: u8, topics: &[&str]) -> ConversationMetadata {
        ConversationMetadata {
            child_id: "child-1".to_string(),
            message_excerpt: "hi".to_string(),
            session_timestamp: ts,
            session_date: "2026-08-01T00:00:00+00:00".to_string(),
            happiness: 5,
            anxiety,
            sadness: 4,
            stress: 4,
            confidence: 6,
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_scan_is_none() {
        assert!(summarize_patterns(vec![]).is_none());
    }

    #[test]
    fn test_averages_and_topics() {
        let patterns = summarize_patterns(vec![
            record(100, 4, &["school", "friends"]),
            record(200, 6, &["school"]),
        ])
        .unwrap();
        assert_eq!(patterns.record_count, 2);
        assert!((patterns.averages.anxiety - 5.0).abs() < f64::EPSILON);
        assert_eq!(patterns.top_topics[0], ("school".to_string(), 2));
    }

    #[test]
    fn test_anxiety_improving() {
        // 5 recent records at anxiety 3, 3 earlier at 6: recent mean is 3+
        // points lower, trend reads improving.
        let mut records: Vec<_> = (0..5).map(|i| record(1000 + i, 3, &[])).collect();
        records.extend((0..3).map(|i| record(10 + i, 6, &[])));
        let patterns = summarize_patterns(records).unwrap();
        assert_eq!(patterns.anxiety_trend, AnxietyTrend::Improving);
    }

    #[test]
    fn test_anxiety_increasing() {
        let mut records: Vec<_> = (0..5).map(|i| record(1000 + i, 8, &[])).collect();
        records.extend((0..4).map(|i| record(10 + i, 5, &[])));
        let patterns = summarize_patterns(records).unwrap();
        assert_eq!(patterns.anxiety_trend, AnxietyTrend::Increasing);
    }

    #[test]
    fn test_few_records_are_stable() {
        // Under 6 records there is no "earlier" cohort to compare against.
        let records: Vec<_> = (0..4).map(|i| record(1000 + i, 9, &[])).collect();
        let patterns = summarize_patterns(records).unwrap();
        assert_eq!(patterns.anxiety_trend, AnxietyTrend::Stable);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "héllo".repeat(200);
        let cut = truncate(&text, 500);
        assert!(cut.len() <= 500);
        assert!(text.starts_with(&cut));
    }
}
