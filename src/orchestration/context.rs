// Conversation state carried across turns of one session

use super::types::{ActivitySuggestion, AgentKind};
use crate::llm::{ChatMessage, Role};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

// Whole hours only, so "1.5 hours" does not read as 5
static DURATION_HOURS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d.])(\d+)\s*hour").expect("valid duration regex"));

/// User preferences, either stated in the profile or picked up from queries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
    /// 0 = easy, 1 = medium, 2 = hard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_activities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UserPreferences {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite fields that are set in `other`
    pub fn merge(&mut self, other: &UserPreferences) {
        if other.distance_km.is_some() {
            self.distance_km = other.distance_km;
        }
        if other.duration_hours.is_some() {
            self.duration_hours = other.duration_hours;
        }
        if other.difficulty.is_some() {
            self.difficulty = other.difficulty;
        }
        if other.activity.is_some() {
            self.activity = other.activity.clone();
        }
        if !other.preferred_activities.is_empty() {
            self.preferred_activities = other.preferred_activities.clone();
        }
        if other.location.is_some() {
            self.location = other.location.clone();
        }
    }

    /// Fill only the fields that are still unset
    pub fn fill_missing(&mut self, defaults: &UserPreferences) {
        let mut merged = defaults.clone();
        merged.merge(self);
        *self = merged;
    }

    /// One-line description for prompts and agent queries
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(activity) = &self.activity {
            parts.push(format!("activity: {}", activity));
        }
        if !self.preferred_activities.is_empty() {
            parts.push(format!("preferred activities: {}", self.preferred_activities.join(", ")));
        }
        if let Some(difficulty) = self.difficulty {
            parts.push(format!("difficulty: {}", difficulty));
        }
        if let Some(hours) = self.duration_hours {
            parts.push(format!("duration: {} hours", hours));
        }
        if let Some(km) = self.distance_km {
            parts.push(format!("distance: {} km", km));
        }
        if let Some(location) = &self.location {
            parts.push(format!("location: {}", location));
        }
        parts.join(", ")
    }
}

/// Keyword heuristics over the raw query text
pub fn extract_preferences(query: &str) -> UserPreferences {
    let query = query.to_lowercase();
    let mut prefs = UserPreferences::default();

    if query.contains("easy") || query.contains("beginner") {
        prefs.difficulty = Some(0);
    } else if query.contains("medium") || query.contains("moderate") {
        prefs.difficulty = Some(1);
    } else if query.contains("hard") || query.contains("difficult") || query.contains("challenging") {
        prefs.difficulty = Some(2);
    }

    if query.contains("hik") {
        prefs.activity = Some("hiking".to_string());
    } else if query.contains("bik") || query.contains("cycl") {
        prefs.activity = Some("biking".to_string());
    }

    prefs.duration_hours = DURATION_HOURS
        .captures(&query)
        .and_then(|c| c[1].parse().ok());

    prefs
}

/// Accumulated session state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationContext {
    pub user_preferences: UserPreferences,
    pub gathered_info: BTreeMap<AgentKind, serde_json::Value>,
    pub pending_clarifications: Vec<String>,
    pub last_activity_suggestions: Vec<ActivitySuggestion>,
}

impl ConversationContext {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// JSON rendering used inside prompts
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Activities listed in a database agent result, if any
pub fn suggestions_from(data: &serde_json::Value) -> Vec<ActivitySuggestion> {
    let rows = match data.get("data").unwrap_or(data) {
        serde_json::Value::Array(rows) => rows.iter().collect::<Vec<_>>(),
        row @ serde_json::Value::Object(_) => vec![row],
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter_map(|row| {
            let title = field(row, &["title"])?;
            Some(ActivitySuggestion {
                title,
                location: field(row, &["location", "region", "primary_region"]),
                length: field(row, &["length", "length_m"]),
                difficulty: field(row, &["difficulty"]),
            })
        })
        .collect()
}

fn field(row: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    })
}

/// Sliding window over the last exchanges of the conversation
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    window: usize,
    messages: Vec<ChatMessage>,
}

impl ConversationMemory {
    /// Keep the last `window` user/assistant exchanges
    pub fn new(window: usize) -> Self {
        Self {
            window,
            messages: Vec::new(),
        }
    }

    pub fn add_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push(ChatMessage::user(user));
        self.messages.push(ChatMessage::assistant(assistant));

        let max = self.window * 2;
        if self.messages.len() > max {
            let excess = self.messages.len() - max;
            self.messages.drain(..excess);
        }
    }

    /// The last `n` messages, oldest first
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Transcript rendering of the last `n` messages for prompts
    pub fn format_recent(&self, n: usize) -> String {
        let recent = self.recent(n);
        if recent.is_empty() {
            return "(no previous messages)".to_string();
        }
        recent
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "User",
                    _ => "Assistant",
                };
                format!("{}: {}", speaker, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// State owned by the caller for the lifetime of one chat session
#[derive(Debug, Clone)]
pub struct Session {
    pub context: ConversationContext,
    pub memory: ConversationMemory,
    transcript: Vec<ChatMessage>,
}

impl Session {
    pub fn new(memory_window: usize) -> Self {
        Self {
            context: ConversationContext::default(),
            memory: ConversationMemory::new(memory_window),
            transcript: Vec::new(),
        }
    }

    /// Start a session seeded with profile preferences
    pub fn with_preferences(memory_window: usize, preferences: UserPreferences) -> Self {
        let mut session = Self::new(memory_window);
        session.context.user_preferences = preferences;
        session
    }

    /// Full, unwindowed list of messages shown to the user
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub(crate) fn record_turn(&mut self, query: &str, reply: &str) {
        self.memory.add_exchange(query, reply);
        self.transcript.push(ChatMessage::user(query));
        self.transcript.push(ChatMessage::assistant(reply));
    }

    /// Reset everything to the empty state of a fresh session
    pub fn clear(&mut self) {
        self.context = ConversationContext::default();
        self.memory.clear();
        self.transcript.clear();
    }

    /// Summary used by the CLI to inspect the session
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "context": self.context,
            "message_count": self.memory.len(),
            "last_messages": self
                .memory
                .recent(4)
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>(),
        })
    }
}
