//! Off-topic policy: local interpretation of the model's sentinel tokens.
//!
//! The student instruction asks the model to prefix a first off-topic reply
//! with [`WARNING_TOKEN`] and to answer a repeat offence with exactly
//! [`BLOCK_TOKEN`]. Detection is substring containment, not prefix-anchored,
//! so a reply that merely quotes a token takes the same branch.

pub const WARNING_TOKEN: &str = "[[WARNING]]";
pub const BLOCK_TOKEN: &str = "[[BLOCK]]";

/// Replaces the first [`WARNING_TOKEN`] in a displayed reply.
pub const REMINDER_PREFIX: &str = "⚠️ **Nhắc nhở:** ";

/// Shown instead of the raw reply when the conversation is locked.
pub const LOCK_NOTICE: &str = "🔒 **Đoạn chat đã bị khóa.**\n\n\
    Thầy đã nhắc nhở nhưng em vẫn tiếp tục hỏi về vấn đề không liên quan đến học tập. \
    Thầy xin phép dừng cuộc trò chuyện tại đây. \
    Em hãy tải lại trang nếu muốn bắt đầu lại nghiêm túc hơn nhé.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyClass {
    /// Lock the conversation; the raw reply is discarded.
    Block,
    /// First off-topic offence, with the token replaced by the reminder.
    Warning(String),
    /// Ordinary reply, verbatim.
    Normal(String),
}

impl ReplyClass {
    /// Text to display, `None` for [`ReplyClass::Block`].
    #[must_use]
    pub fn display_text(&self) -> Option<&str> {
        match self {
            Self::Block => None,
            Self::Warning(text) | Self::Normal(text) => Some(text),
        }
    }
}

#[must_use]
pub fn classify_reply(raw: &str) -> ReplyClass {
    if raw.contains(BLOCK_TOKEN) {
        ReplyClass::Block
    } else if raw.contains(WARNING_TOKEN) {
        ReplyClass::Warning(raw.replacen(WARNING_TOKEN, REMINDER_PREFIX, 1))
    } else {
        ReplyClass::Normal(raw.to_string())
    }
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
