//! Session and conversation state.
//!
//! DESIGN
//! ======
//! A `UserProfile` is created at login and dropped at logout. Each session
//! owns one `Conversation`: an append-only message list plus the lock and
//! in-flight flags. Mutation is crate-private so only the tutor service can
//! advance a conversation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTITY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

/// School year, `Lớp 1` through `Lớp 12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GradeLevel(u8);

impl GradeLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 12;

    #[must_use]
    pub fn new(year: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&year).then_some(Self(year))
    }

    #[must_use]
    pub fn year(self) -> u8 {
        self.0
    }

    /// Every grade in ascending order, for selection lists.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl Default for GradeLevel {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lớp {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid grade '{0}' (expected Lớp 1 to Lớp 12)")]
pub struct InvalidGrade(pub String);

impl FromStr for GradeLevel {
    type Err = InvalidGrade;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("Lớp")
            .or_else(|| trimmed.strip_prefix("lớp"))
            .unwrap_or(trimmed)
            .trim();
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidGrade(raw.to_string()))
    }
}

impl TryFrom<String> for GradeLevel {
    type Error = InvalidGrade;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<GradeLevel> for String {
    fn from(grade: GradeLevel) -> Self {
        grade.to_string()
    }
}

/// Who is chatting. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub role: Role,
    pub grade: Option<GradeLevel>,
}

impl UserProfile {
    #[must_use]
    pub fn student(name: impl Into<String>, grade: GradeLevel) -> Self {
        Self { name: name.into(), role: Role::Student, grade: Some(grade) }
    }

    #[must_use]
    pub fn teacher(name: impl Into<String>) -> Self {
        Self { name: name.into(), role: Role::Teacher, grade: None }
    }

    #[must_use]
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    /// Grade label for prompts and status lines; empty for teachers.
    #[must_use]
    pub fn grade_label(&self) -> String {
        self.grade.map(|g| g.to_string()).unwrap_or_default()
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Model,
}

/// An image encoded as a data URL (`data:<mime>;base64,<payload>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageAttachment(String);

impl ImageAttachment {
    #[must_use]
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self(data_url.into())
    }

    #[must_use]
    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    /// Encoded bytes after the first comma; the whole string when there is
    /// no data-URL header.
    #[must_use]
    pub fn payload(&self) -> &str {
        self.0.split_once(',').map_or(self.0.as_str(), |(_, payload)| payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
    #[serde(default)]
    pub is_error: bool,
}

// =============================================================================
// CONVERSATION
// =============================================================================

pub const GREETING_ID: &str = "init-1";

/// Append-only message history for one session.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    locked: bool,
    in_flight: bool,
    next_seq: u64,
}

impl Conversation {
    /// Start a conversation holding only the model's greeting.
    #[must_use]
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let greeting = ChatMessage {
            id: GREETING_ID.to_string(),
            sender: Sender::Model,
            text: greeting.into(),
            image: None,
            is_error: false,
        };
        Self { messages: vec![greeting], locked: false, in_flight: false, next_seq: 1 }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub(crate) fn push(
        &mut self,
        sender: Sender,
        text: impl Into<String>,
        image: Option<ImageAttachment>,
        is_error: bool,
    ) -> &ChatMessage {
        let id = self.next_id();
        self.messages.push(ChatMessage { id, sender, text: text.into(), image, is_error });
        &self.messages[self.messages.len() - 1]
    }

    /// Locking is terminal.
    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }

    pub(crate) fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }

    fn next_id(&mut self) -> String {
        let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let seq = self.next_seq;
        self.next_seq += 1;
        format!("{millis}-{seq}")
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
