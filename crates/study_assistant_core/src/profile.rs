//! crates/study_assistant_core/src/profile.rs
//!
//! The background learning-profile update: ask the model what the student has
//! been studying and how they learn, then merge the answer into the stored profile.
//!
//! The model is asked for JSON. Replies that are not JSON fall back to the
//! `field: value` line format; a reply that yields no field at all is a
//! [`PortError::Extraction`] and writes nothing.

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{Message, ModelChoice, ProfileFields, Role};
use crate::ports::{DatabaseService, LanguageModelService, PortError, PortResult};

/// Minimum number of seconds between two successful profile updates.
pub const DEFAULT_COOLDOWN_SECS: i64 = 300;

const EXTRACTION_PROMPT: &str = r#"You are an expert learning assistant analyzing the following conversation between a student and their AI tutor.

{transcript}

Based on this entire conversation, provide the following:
1. recent_topic: the main topic or subject the user is learning about, summarized in one concise line.
2. learning_style: a brief description of the user's learning style.
3. topics_learned: a list of the distinct topics the user has covered.

Respond with a single JSON object and nothing else, for example:
{"recent_topic": "Derivatives", "learning_style": "Prefers worked examples", "topics_learned": ["Limits", "Derivatives"]}"#;

/// Why a profile update did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CoolingDown,
    NoConversation,
    InFlight,
}

/// Fields pulled out of the model's reply, already cleaned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileExtraction {
    pub recent_topic: Option<String>,
    pub learning_style: Option<String>,
    pub topics_learned: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    recent_topic: Option<String>,
    #[serde(default)]
    learning_style: Option<String>,
    #[serde(default)]
    topics_learned: Option<Vec<String>>,
}

/// Drops blank values and the literal "none".
fn meaningful(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Serializes user and assistant turns into a `Role: content` transcript.
pub fn transcript(turns: &[Message]) -> String {
    turns
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(format!("User: {}\n", m.content)),
            Role::Assistant => Some(format!("Assistant: {}\n", m.content)),
            Role::System => None,
        })
        .collect()
}

pub fn extraction_prompt(transcript: &str) -> String {
    EXTRACTION_PROMPT.replace("{transcript}", transcript)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    // Skip an info string such as "json" on the opening fence line.
    let inner = inner.split_once('\n').map_or("", |(_, body)| body);
    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}

fn value_after_prefix<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

fn parse_lines(body: &str) -> ProfileExtraction {
    let mut extraction = ProfileExtraction::default();
    for line in body.lines().map(str::trim) {
        if let Some(value) = value_after_prefix(line, "recent_topic:") {
            extraction.recent_topic = meaningful(value);
        } else if let Some(value) = value_after_prefix(line, "learning_style:") {
            extraction.learning_style = meaningful(value);
        } else if let Some(value) = value_after_prefix(line, "topics_learned:") {
            extraction.topics_learned = value.split(',').filter_map(meaningful).collect();
        }
    }
    extraction
}

/// Parses the extraction reply.
///
/// JSON replies are validated strictly and fail closed. Anything else is read
/// line by line; a missing line leaves its field unset.
pub fn parse_extraction(reply: &str) -> PortResult<ProfileExtraction> {
    let body = strip_code_fence(reply.trim());

    let extraction = if body.starts_with('{') {
        let raw: RawExtraction = serde_json::from_str(body)
            .map_err(|e| PortError::Extraction(format!("invalid profile JSON: {}", e)))?;
        ProfileExtraction {
            recent_topic: raw.recent_topic.as_deref().and_then(meaningful),
            learning_style: raw.learning_style.as_deref().and_then(meaningful),
            topics_learned: raw
                .topics_learned
                .unwrap_or_default()
                .iter()
                .filter_map(|t| meaningful(t))
                .collect(),
        }
    } else {
        parse_lines(body)
    };

    if extraction == ProfileExtraction::default() {
        return Err(PortError::Extraction(
            "reply contained no profile fields".to_string(),
        ));
    }
    Ok(extraction)
}

/// Deduplicated union of stored and new topics, keeping first spellings.
///
/// Empty values and "none" are skipped; topics compare case-insensitively.
pub fn merge_topics<S: AsRef<str>>(
    existing: &[String],
    additions: impl IntoIterator<Item = S>,
) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len());
    let candidates = existing
        .iter()
        .filter_map(|t| meaningful(t))
        .chain(additions.into_iter().filter_map(|t| meaningful(t.as_ref())));
    for topic in candidates {
        if !merged.iter().any(|m| m.eq_ignore_ascii_case(&topic)) {
            merged.push(topic);
        }
    }
    merged
}

/// Runs one profile extraction over `turns` and persists the result for `email`.
///
/// Returns the fields that were written. Nothing is written on error.
pub async fn update_learning_profile(
    db: &dyn DatabaseService,
    llm: &dyn LanguageModelService,
    email: &str,
    turns: &[Message],
) -> PortResult<ProfileFields> {
    let transcript = transcript(turns);
    if transcript.trim().is_empty() {
        return Err(PortError::Extraction("no conversation to analyze".to_string()));
    }

    let reply = llm
        .complete(
            ModelChoice::Default,
            &[Message::user(extraction_prompt(&transcript))],
        )
        .await?;

    let extraction = parse_extraction(&reply).map_err(|e| {
        warn!("Profile extraction for {} was unusable: {}", email, e);
        e
    })?;

    let mut additions = extraction.topics_learned.clone();
    additions.extend(extraction.recent_topic.clone());

    let topics_learned = if additions.is_empty() {
        None
    } else {
        let existing = db
            .find_user(email)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;
        Some(merge_topics(&existing.topics_learned, &additions))
    };

    let fields = ProfileFields {
        recent_topic: extraction.recent_topic,
        learning_style: extraction.learning_style,
        topics_learned,
    };
    db.upsert_profile(email, &fields).await?;
    info!("Learning profile updated for {}", email);
    Ok(fields)
}
