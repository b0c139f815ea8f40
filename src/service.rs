//! Request-handler layer
//!
//! Each method is one logical endpoint: validate, check ownership, run the
//! operation, map failures onto the `ServiceError` taxonomy. Crisis screening
//! always runs before any model call and short-circuits the turn with the
//! fixed supportive response; it is never surfaced as an error.

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::{Aggregator, DashboardRecord};
use crate::config::Config;
use crate::error::ServiceError;
use crate::guidance::Guidance;
use crate::knowledge::{DocumentRecord, KnowledgeBase};
use crate::llm::{ChatMessage, ChatOptions, LanguageModel};
use crate::memory::{ConversationContext, TherapeuticMemory};
use crate::screening::{self, AlertLevel};
use crate::store::{ChildRow, MoodAnalysis, SessionRow, SqliteStore};
use crate::vector::VectorIndex;

/// Memories injected into a chat prompt.
const MEMORY_CONTEXT_LIMIT: usize = 5;

/// Window for emotional-pattern context, in days.
const PATTERN_WINDOW_DAYS: i64 = 30;

/// Delay before reading the dashboard row back after a refresh, tolerating
/// read-after-write lag in a hosted store.
const REFRESH_READBACK_DELAY_MS: u64 = 1000;

const CHAT_TEMPERATURE: f32 = 0.7;

type Result<T> = std::result::Result<T, ServiceError>;

/// Outcome of a chat turn.
#[derive(Debug)]
pub struct ChatReply {
    pub session_id: String,
    pub response: String,
    /// True when crisis screening short-circuited the turn
    pub crisis: bool,
    pub alert: Option<AlertLevel>,
}

/// Outcome of a voice turn: the transcript plus synthesized audio.
#[derive(Debug)]
pub struct VoiceReply {
    pub transcript: String,
    pub reply: ChatReply,
    pub audio: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Completed,
    Processing,
}

impl RefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStatus::Completed => "completed",
            RefreshStatus::Processing => "processing",
        }
    }
}

/// Structured companion turn returned by the chat model: the reply itself
/// plus the mood analysis and topics saved with the session.
#[derive(Debug, Deserialize)]
struct CompanionTurn {
    response: String,
    mood_analysis: MoodAnalysis,
    #[serde(default)]
    topics: Vec<String>,
}

const COMPANION_RESPONSE_SCHEMA: &str = r#"Respond with a single JSON object:
- "response": your reply to the child, warm and age-appropriate
- "mood_analysis": {"happiness": 0-10, "anxiety": 0-10, "sadness": 0-10, "stress": 0-10, "confidence": 0-10, "insight": one-sentence observation}
- "topics": array of short topic labels for this turn"#;

pub struct HarborService {
    store: SqliteStore,
    model: Arc<dyn LanguageModel>,
    memory: TherapeuticMemory,
    knowledge: KnowledgeBase,
    guidance: Guidance,
}

impl HarborService {
    pub fn new(
        store: SqliteStore,
        model: Arc<dyn LanguageModel>,
        index: Arc<dyn VectorIndex>,
        guidance: Guidance,
        config: &Config,
    ) -> Self {
        let memory = TherapeuticMemory::new(
            Arc::clone(&model),
            Arc::clone(&index),
            config.vector.memory_namespace.clone(),
            config.llm.embedding_dimensions,
        );
        let knowledge = KnowledgeBase::new(
            Arc::clone(&model),
            Arc::clone(&index),
            config.vector.knowledge_namespace.clone(),
            config.llm.embedding_dimensions,
        );

        Self {
            store,
            model,
            memory,
            knowledge,
            guidance,
        }
    }

    // ============================================
    // FAMILIES
    // ============================================

    pub fn create_family(
        &self,
        parent_name: &str,
        parent_email: &str,
        pin: Option<&str>,
    ) -> Result<String> {
        if parent_name.trim().is_empty() || parent_email.trim().is_empty() {
            return Err(ServiceError::Validation(
                "parent name and email are required".to_string(),
            ));
        }
        if let Some(pin) = pin {
            validate_pin(pin)?;
        }

        let id = Uuid::new_v4().to_string();
        self.store.create_family(&id, parent_name, parent_email, pin)?;
        Ok(id)
    }

    /// Dashboard PIN gate: 4-digit numeric, exact match, independent of the
    /// primary auth layer.
    pub fn verify_pin(&self, family_id: &str, pin: &str) -> Result<()> {
        validate_pin(pin)?;
        let family = self
            .store
            .get_family(family_id)?
            .ok_or(ServiceError::NotFound("family"))?;

        match family.dashboard_pin {
            Some(ref stored) if stored == pin => Ok(()),
            _ => Err(ServiceError::Unauthorized),
        }
    }

    // ============================================
    // CHILDREN
    // ============================================

    pub fn create_child(
        &self,
        family_id: &str,
        name: &str,
        age: i64,
        concerns: Option<&str>,
        triggers: Option<&str>,
        goals: Option<&str>,
    ) -> Result<ChildRow> {
        if self.store.get_family(family_id)?.is_none() {
            return Err(ServiceError::NotFound("family"));
        }
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("child name is required".to_string()));
        }
        if !(6..=18).contains(&age) {
            return Err(ServiceError::Validation(
                "child age must be between 6 and 18".to_string(),
            ));
        }
        if self.store.count_children(family_id)? >= 4 {
            return Err(ServiceError::Validation(
                "a family can have at most four children".to_string(),
            ));
        }

        // Chat stays gated until the profile carries enough context to
        // personalize safely.
        let profile_completed = concerns.is_some() && goals.is_some();

        let child = ChildRow {
            id: Uuid::new_v4().to_string(),
            family_id: family_id.to_string(),
            name: name.trim().to_string(),
            age,
            concerns: concerns.map(str::to_string),
            triggers: triggers.map(str::to_string),
            goals: goals.map(str::to_string),
            is_active: true,
            profile_completed,
            created_at: None,
        };
        self.store.create_child(&child)?;
        Ok(child)
    }

    pub fn list_children(&self, family_id: &str) -> Result<Vec<ChildRow>> {
        Ok(self.store.list_children(family_id)?)
    }

    pub fn deactivate_child(&self, family_id: &str, child_id: &str) -> Result<()> {
        let child = self.owned_child(family_id, child_id)?;
        self.store.deactivate_child(&child.id)?;
        Ok(())
    }

    pub fn list_sessions(&self, family_id: &str, child_id: &str) -> Result<Vec<SessionRow>> {
        self.owned_child(family_id, child_id)?;
        Ok(self.store.list_sessions(child_id)?)
    }

    // ============================================
    // CHAT
    // ============================================

    pub async fn chat_message(
        &self,
        family_id: &str,
        child_id: &str,
        text: &str,
    ) -> Result<ChatReply> {
        let child = self.chat_ready_child(family_id, child_id)?;
        if text.trim().is_empty() {
            return Err(ServiceError::Validation("message text is required".to_string()));
        }

        // Crisis screening runs before any model call and wins outright.
        if screening::detect_crisis(text) {
            info!(child_id, "crisis language detected; returning scripted response");
            let session_id = self.save_turn(child_id, text, screening::CRISIS_RESPONSE, None, vec![
                "safety".to_string(),
            ])?;
            return Ok(ChatReply {
                session_id,
                response: screening::CRISIS_RESPONSE.to_string(),
                crisis: true,
                alert: Some(AlertLevel::High),
            });
        }

        let memories = self
            .memory
            .relevant_memories(child_id, text, MEMORY_CONTEXT_LIMIT)
            .await;
        let patterns = self
            .memory
            .emotional_patterns(child_id, PATTERN_WINDOW_DAYS)
            .await;

        let mut context = String::new();
        if !memories.is_empty() {
            context.push_str("\nEarlier conversations with this child:\n");
            for m in &memories {
                context.push_str(&format!("- {}\n", m.metadata.message_excerpt));
            }
        }
        if let Some(p) = &patterns {
            context.push_str(&format!(
                "\nRecent emotional pattern over {} conversations: average anxiety {:.1}, trend {}.\n",
                p.record_count,
                p.averages.anxiety,
                p.anxiety_trend.as_str(),
            ));
        }

        let system = format!(
            "You are Dr. Emma, a warm AI companion for children.\n\n{guidance}\n\n\
             You are talking with {name}, age {age}.{concerns}{context}\n\n{schema}",
            guidance = self.guidance.text(),
            name = child.name,
            age = child.age,
            concerns = child
                .concerns
                .as_deref()
                .map(|c| format!(" The family shared these concerns: {c}."))
                .unwrap_or_default(),
            context = context,
            schema = COMPANION_RESPONSE_SCHEMA,
        );

        let messages = [ChatMessage::system(system), ChatMessage::user(text)];
        let raw = self
            .model
            .chat(
                &messages,
                ChatOptions {
                    temperature: Some(CHAT_TEMPERATURE),
                    json: true,
                },
            )
            .await?;
        let turn = parse_companion_turn(&raw).map_err(ServiceError::Upstream)?;

        let session_id = self.save_turn(
            child_id,
            text,
            &turn.response,
            Some(&turn.mood_analysis),
            turn.topics.clone(),
        )?;

        let alert = screening::evaluate_session(&turn.mood_analysis, text);
        if let Some(level) = alert {
            warn!(child_id, session_id = %session_id, level = level.as_str(), "session alert raised");
        }

        // Best-effort: memory storage must never block the reply.
        self.memory
            .store_conversation(&ConversationContext {
                conversation_id: session_id.clone(),
                child_id: child_id.to_string(),
                user_message: text.to_string(),
                ai_response: turn.response.clone(),
                topics: turn.topics,
                mood: Some(turn.mood_analysis),
                date: Utc::now(),
            })
            .await;

        Ok(ChatReply {
            session_id,
            response: turn.response,
            crisis: false,
            alert,
        })
    }

    pub async fn voice_message(
        &self,
        family_id: &str,
        child_id: &str,
        audio: Vec<u8>,
        filename: &str,
    ) -> Result<VoiceReply> {
        // Authorization and the profile gate run before the audio ever leaves
        // the process; chat_message re-checks them on the transcript.
        self.chat_ready_child(family_id, child_id)?;

        let transcript = self.model.transcribe(audio, filename).await?;
        let reply = self.chat_message(family_id, child_id, &transcript).await?;
        let audio = self.model.synthesize(&reply.response).await?;
        Ok(VoiceReply {
            transcript,
            reply,
            audio,
        })
    }

    /// Close the most recent active session, stamping its duration.
    pub fn complete_session(
        &self,
        family_id: &str,
        child_id: &str,
        duration_secs: i64,
    ) -> Result<String> {
        self.owned_child(family_id, child_id)?;
        self.store
            .complete_active_session(child_id, duration_secs)?
            .ok_or(ServiceError::NotFound("active session"))
    }

    // ============================================
    // DASHBOARD ANALYTICS
    // ============================================

    pub fn dashboard(&self, family_id: &str, child_id: &str) -> Result<Option<DashboardRecord>> {
        self.owned_child(family_id, child_id)?;
        Ok(self.store.get_analytics(child_id)?)
    }

    /// Force a recalculation, then read the row back after a short delay and
    /// report whether it is visible yet.
    pub async fn refresh_dashboard(&self, family_id: &str, child_id: &str) -> Result<RefreshStatus> {
        let child = self.owned_child(family_id, child_id)?;
        let latest = self
            .store
            .latest_session(child_id)?
            .ok_or_else(|| {
                ServiceError::Precondition("no sessions recorded for this child".to_string())
            })?;

        Aggregator::new(&self.store, self.model.as_ref())
            .refresh(child_id, &latest, &child.family_id)
            .await?;

        tokio::time::sleep(std::time::Duration::from_millis(REFRESH_READBACK_DELAY_MS)).await;

        match self.store.get_analytics(child_id)? {
            Some(_) => Ok(RefreshStatus::Completed),
            None => Ok(RefreshStatus::Processing),
        }
    }

    // ============================================
    // KNOWLEDGE BASE
    // ============================================

    pub async fn add_document(
        &self,
        family_id: &str,
        child_id: &str,
        filename: &str,
        content: &str,
    ) -> Result<DocumentRecord> {
        self.owned_child(family_id, child_id)?;
        if content.trim().is_empty() {
            return Err(ServiceError::Validation("document content is required".to_string()));
        }
        Ok(self.knowledge.add_document(child_id, filename, content).await?)
    }

    pub async fn list_documents(
        &self,
        family_id: &str,
        child_id: &str,
    ) -> Result<Vec<DocumentRecord>> {
        self.owned_child(family_id, child_id)?;
        Ok(self.knowledge.list_documents(child_id).await?)
    }

    pub async fn delete_document(
        &self,
        family_id: &str,
        child_id: &str,
        document_id: &str,
    ) -> Result<()> {
        self.owned_child(family_id, child_id)?;
        Ok(self.knowledge.delete_document(document_id).await?)
    }

    // ============================================
    // INTERNALS
    // ============================================

    /// `owned_child` plus the profile-completeness gate shared by the chat
    /// and voice entry points.
    fn chat_ready_child(&self, family_id: &str, child_id: &str) -> Result<ChildRow> {
        let child = self.owned_child(family_id, child_id)?;
        if !child.profile_completed {
            return Err(ServiceError::Precondition(
                "complete the child's profile before chatting".to_string(),
            ));
        }
        Ok(child)
    }

    /// Fetch a child and enforce tenancy: 404 for missing or deactivated
    /// rows, 403 for cross-family access.
    fn owned_child(&self, family_id: &str, child_id: &str) -> Result<ChildRow> {
        let child = self
            .store
            .get_child(child_id)?
            .filter(|c| c.is_active)
            .ok_or(ServiceError::NotFound("child"))?;
        if child.family_id != family_id {
            return Err(ServiceError::Forbidden);
        }
        Ok(child)
    }

    fn save_turn(
        &self,
        child_id: &str,
        user_message: &str,
        ai_response: &str,
        mood: Option<&MoodAnalysis>,
        topics: Vec<String>,
    ) -> Result<String> {
        let session = SessionRow {
            id: Uuid::new_v4().to_string(),
            child_id: child_id.to_string(),
            status: "active".to_string(),
            session_duration: 0,
            mood_analysis: mood.cloned(),
            topics,
            user_message: user_message.to_string(),
            ai_response: ai_response.to_string(),
            created_at: Utc::now(),
        };
        self.store.append_session(&session)?;

        if let Some(mood) = mood {
            self.store
                .record_mood(child_id, &session.id, mood, session.created_at)?;
        }

        Ok(session.id)
    }
}

fn validate_pin(pin: &str) -> Result<()> {
    if pin.len() == 4 && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ServiceError::Validation(
            "PIN must be exactly four digits".to_string(),
        ))
    }
}

/// Parse the companion model's turn, rejecting out-of-range mood scores at
/// the boundary instead of letting them flow into screening and storage.
fn parse_companion_turn(raw: &str) -> anyhow::Result<CompanionTurn> {
    let turn: CompanionTurn =
        serde_json::from_str(raw).context("malformed companion turn payload")?;

    let m = &turn.mood_analysis;
    for score in [m.happiness, m.anxiety, m.sadness, m.stress, m.confidence] {
        if score > 10 {
            anyhow::bail!("companion turn mood score {score} out of range");
        }
    }
    Ok(turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("0000").is_ok());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("12345").is_err());
        assert!(validate_pin("12a4").is_err());
    }

    fn turn_payload() -> serde_json::Value {
        json!({
            "response": "That sounds fun!",
            "mood_analysis": {
                "happiness": 7, "anxiety": 3, "sadness": 2, "stress": 2, "confidence": 6,
                "insight": "Upbeat."
            },
            "topics": ["school"]
        })
    }

    #[test]
    fn test_parse_companion_turn() {
        let turn = parse_companion_turn(&turn_payload().to_string()).unwrap();
        assert_eq!(turn.response, "That sounds fun!");
        assert_eq!(turn.mood_analysis.anxiety, 3);
    }

    #[test]
    fn test_rejects_out_of_range_mood_score() {
        let mut payload = turn_payload();
        payload["mood_analysis"]["anxiety"] = json!(200);
        let err = parse_companion_turn(&payload.to_string()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_rejects_malformed_turn() {
        assert!(parse_companion_turn("not json").is_err());
    }
}
