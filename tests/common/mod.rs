//! Shared fakes for integration tests: a canned language model and an
//! in-memory vector index standing in for the hosted services.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use harbor::config::Config;
use harbor::guidance::Guidance;
use harbor::llm::{ChatMessage, ChatOptions, LanguageModel};
use harbor::service::HarborService;
use harbor::store::SqliteStore;
use harbor::vector::{VectorIndex, VectorMatch, VectorRecord};

/// Small embedding width so zero-vector scans stay cheap in tests.
pub const DIMS: usize = 8;

// ============================================
// FAKE LANGUAGE MODEL
// ============================================

/// Canned model: the insight prompt gets the insight payload, everything
/// else gets the companion-turn payload. Chat calls are counted so tests can
/// assert the crisis path never reaches the model.
pub struct FakeModel {
    pub chat_calls: AtomicUsize,
    pub transcribe_calls: AtomicUsize,
    turn_payload: String,
    insight_payload: String,
}

impl FakeModel {
    pub fn new() -> Arc<Self> {
        Self::build(default_turn(), default_insights())
    }

    pub fn with_turn(turn: Value) -> Arc<Self> {
        Self::build(turn, default_insights())
    }

    pub fn with_insights(insights: Value) -> Arc<Self> {
        Self::build(default_turn(), insights)
    }

    fn build(turn: Value, insights: Value) -> Arc<Self> {
        Arc::new(Self {
            chat_calls: AtomicUsize::new(0),
            transcribe_calls: AtomicUsize::new(0),
            turn_payload: turn.to_string(),
            insight_payload: insights.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn chat(&self, messages: &[ChatMessage], _opts: ChatOptions) -> Result<String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
        if system.contains("analyst") {
            Ok(self.insight_payload.clone())
        } else {
            Ok(self.turn_payload.clone())
        }
    }

    async fn embed(&self, _input: &str) -> Result<Vec<f32>> {
        Ok(vec![0.25; DIMS])
    }

    async fn transcribe(&self, _audio: Vec<u8>, _filename: &str) -> Result<String> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok("I had a good day at school".to_string())
    }

    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(vec![1, 2, 3])
    }
}

pub fn default_turn() -> Value {
    json!({
        "response": "That sounds like a really fun day!",
        "mood_analysis": {
            "happiness": 7, "anxiety": 3, "sadness": 2, "stress": 2, "confidence": 6,
            "insight": "Upbeat about school."
        },
        "topics": ["school"]
    })
}

pub fn default_insights() -> Value {
    json!({
        "emotional_trend": {
            "direction": "improving",
            "needs_attention": false,
            "key_factors": ["more open about school"]
        },
        "active_concerns": {
            "count": 1,
            "level": "moderate",
            "concerns": ["test anxiety before math quizzes"]
        },
        "communication_insights": [
            {"topic": "school", "confidence_score": 85, "observation": "talks freely about classes"}
        ],
        "growth_development_insights": ["names feelings more precisely"],
        "family_communication_summary": "Conversations have grown warmer this month.",
        "conversation_organization": "Sessions cluster around school and friendships.",
        "family_wellness_tips": ["keep a consistent bedtime"],
        "family_communication_goals": [
            {"goal_type": "This Week", "description": "ask about the science fair"},
            {"goal_type": "Ongoing", "description": "celebrate small wins"},
            {"goal_type": "If Needed", "description": "reach out to the school counselor"}
        ]
    })
}

// ============================================
// FAKE VECTOR INDEX
// ============================================

/// In-memory index keyed by namespace. Queries apply the metadata filter and
/// ignore the vector entirely, which is enough for exact-match and
/// zero-vector-scan call sites. Flipping `fail_all` makes every operation
/// error, for exercising the best-effort degradation paths.
#[derive(Default)]
pub struct MemoryIndex {
    data: Mutex<HashMap<String, Vec<(String, Vec<f32>, Value)>>>,
    fail_all: std::sync::atomic::AtomicBool,
}

impl MemoryIndex {
    pub fn len(&self, namespace: &str) -> usize {
        self.data
            .lock()
            .unwrap()
            .get(namespace)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            anyhow::bail!("index unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<()> {
        self.check_available()?;
        let mut data = self.data.lock().unwrap();
        let entries = data.entry(namespace.to_string()).or_default();
        entries.retain(|(id, _, _)| *id != record.id);
        entries.push((record.id, record.values, record.metadata));
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        _vector: Vec<f32>,
        top_k: usize,
        filter: Value,
    ) -> Result<Vec<VectorMatch>> {
        self.check_available()?;
        let data = self.data.lock().unwrap();
        let entries = data.get(namespace).cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .filter(|(_, _, metadata)| matches_filter(metadata, &filter))
            .take(top_k)
            .map(|(id, _, metadata)| VectorMatch {
                id,
                score: 0.9,
                metadata,
            })
            .collect())
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<()> {
        self.check_available()?;
        let mut data = self.data.lock().unwrap();
        if let Some(entries) = data.get_mut(namespace) {
            entries.retain(|(entry_id, _, _)| entry_id != id);
        }
        Ok(())
    }
}

fn matches_filter(metadata: &Value, filter: &Value) -> bool {
    let Some(clauses) = filter.as_object() else {
        return true;
    };
    clauses.iter().all(|(key, clause)| {
        let field = &metadata[key.as_str()];
        clause
            .as_object()
            .map(|ops| {
                ops.iter().all(|(op, expected)| match op.as_str() {
                    "$eq" => field == expected,
                    "$gte" => match (field.as_f64(), expected.as_f64()) {
                        (Some(actual), Some(bound)) => actual >= bound,
                        _ => false,
                    },
                    _ => false,
                })
            })
            .unwrap_or(false)
    })
}

// ============================================
// HARNESS
// ============================================

pub struct Harness {
    pub service: HarborService,
    /// Second connection to the same database, for seeding and assertions.
    pub store: SqliteStore,
    pub model: Arc<FakeModel>,
    pub index: Arc<MemoryIndex>,
    _dir: tempfile::TempDir,
}

pub fn harness() -> Harness {
    harness_with(FakeModel::new())
}

pub fn harness_with(model: Arc<FakeModel>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harbor.db");
    let store = SqliteStore::open(&db_path).unwrap();
    let side_store = SqliteStore::open(&db_path).unwrap();

    let guidance_path = dir.path().join("guidance.md");
    std::fs::write(&guidance_path, "Always validate feelings first.").unwrap();
    let guidance = Guidance::load(&guidance_path).unwrap();

    let index = Arc::new(MemoryIndex::default());
    let mut config = Config::default();
    config.llm.embedding_dimensions = DIMS;

    let service = HarborService::new(
        store,
        Arc::clone(&model) as Arc<dyn LanguageModel>,
        Arc::clone(&index) as Arc<dyn VectorIndex>,
        guidance,
        &config,
    );

    Harness {
        service,
        store: side_store,
        model,
        index,
        _dir: dir,
    }
}

impl Harness {
    /// Create a family and a chat-ready child, returning (family_id, child_id).
    pub fn seed_family(&self) -> (String, String) {
        let family_id = self
            .service
            .create_family("Jordan", "jordan@example.com", Some("1234"))
            .unwrap();
        let child = self
            .service
            .create_child(
                &family_id,
                "Sam",
                9,
                Some("school anxiety"),
                None,
                Some("more confidence"),
            )
            .unwrap();
        (family_id, child.id)
    }
}
