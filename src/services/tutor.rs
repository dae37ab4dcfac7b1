//! Tutor service: one conversation turn: history → LLM → policy → state.
//!
//! DESIGN
//! ======
//! A turn is split in two so the in-flight flag is observable:
//! [`ChatSession::begin_turn`] admits the send, snapshots the provider
//! content from the history *before* the new message, then appends the
//! outgoing message. [`ChatSession::complete_turn`] applies the settled
//! result: the reply passes through [`classify_reply`]; failures collapse
//! into one error-flagged apology. [`ChatSession::send_turn`] composes both
//! around the single remote call.

use std::sync::Arc;

use tracing::{info, warn};

use crate::llm::LlmChat;
use crate::llm::types::{LlmError, Part, Turn, TurnRole};
use crate::services::policy::{LOCK_NOTICE, ReplyClass, classify_reply};
use crate::services::preferences::{PreferenceError, Preferences};
use crate::services::prompt::{build_system_instruction, greeting};
use crate::state::{ChatMessage, Conversation, ImageAttachment, Sender, UserProfile};

/// Media type declared for every inline image.
pub const IMAGE_MIME_TYPE: &str = "image/jpeg";

pub const CONNECTION_APOLOGY: &str = "Xin lỗi em, mạng của thầy hơi chập chờn. Em hỏi lại được không?";

/// Displayed when the model returns no text at all.
pub const EMPTY_REPLY_FALLBACK: &str = "Thầy chưa nghe rõ, em nói lại được không?";

// =============================================================================
// TYPES
// =============================================================================

/// Why a send was refused. Refusals leave the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendRejected {
    #[error("nothing to send")]
    Empty,
    #[error("a reply is still pending")]
    InFlight,
    #[error("conversation is locked")]
    Locked,
}

/// How a settled turn changed the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied,
    Warned,
    Locked,
    Failed,
    /// No turn was in flight; nothing changed.
    Ignored,
}

/// Request snapshot for one outgoing turn. Built only by
/// [`ChatSession::begin_turn`] and [`request_reply`].
#[derive(Debug)]
pub struct PendingTurn {
    system: String,
    contents: Vec<Turn>,
}

impl PendingTurn {
    fn new(
        user: &UserProfile,
        training_text: &str,
        history: &[ChatMessage],
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> Self {
        Self { system: build_system_instruction(user, training_text), contents: build_contents(history, text, image) }
    }

    #[must_use]
    pub fn system(&self) -> &str {
        &self.system
    }

    #[must_use]
    pub fn contents(&self) -> &[Turn] {
        &self.contents
    }

    /// Issue the remote call and return the reply text.
    ///
    /// # Errors
    ///
    /// Propagates the provider's [`LlmError`].
    pub async fn dispatch(&self, llm: &dyn LlmChat) -> Result<String, LlmError> {
        let response = llm.generate(&self.system, &self.contents).await?;
        info!(
            model = %response.model,
            finish_reason = %response.finish_reason,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "tutor: LLM response"
        );
        if response.text.is_empty() {
            return Ok(EMPTY_REPLY_FALLBACK.to_string());
        }
        Ok(response.text)
    }
}

// =============================================================================
// CONTENT ASSEMBLY
// =============================================================================

/// Provider content for `history` followed by the new user message.
#[must_use]
pub fn build_contents(history: &[ChatMessage], text: &str, image: Option<&ImageAttachment>) -> Vec<Turn> {
    let mut contents: Vec<Turn> = history
        .iter()
        .map(|msg| turn_for(msg.sender, &msg.text, msg.image.as_ref()))
        .collect();
    contents.push(turn_for(Sender::User, text, image));
    contents
}

fn turn_for(sender: Sender, text: &str, image: Option<&ImageAttachment>) -> Turn {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = image {
        parts.push(Part::InlineImage { mime_type: IMAGE_MIME_TYPE.to_string(), data: image.payload().to_string() });
    }
    if !text.is_empty() {
        parts.push(Part::Text { text: text.to_string() });
    }
    let role = match sender {
        Sender::User => TurnRole::User,
        Sender::Model => TurnRole::Model,
    };
    Turn { role, parts }
}

/// Stateless form of a turn: build the request for `user` and return the
/// model's raw reply text.
///
/// # Errors
///
/// Propagates the provider's [`LlmError`].
pub async fn request_reply(
    llm: &dyn LlmChat,
    user: &UserProfile,
    training_text: &str,
    history: &[ChatMessage],
    text: &str,
    image: Option<&ImageAttachment>,
) -> Result<String, LlmError> {
    PendingTurn::new(user, training_text, history, text, image)
        .dispatch(llm)
        .await
}

// =============================================================================
// SESSION
// =============================================================================

/// One logged-in user's chat: profile, conversation and collaborators.
pub struct ChatSession {
    user: UserProfile,
    conversation: Conversation,
    prefs: Preferences,
    llm: Arc<dyn LlmChat>,
}

impl ChatSession {
    /// Start a session whose conversation holds only the greeting.
    #[must_use]
    pub fn start(user: UserProfile, prefs: Preferences, llm: Arc<dyn LlmChat>) -> Self {
        info!(role = ?user.role, grade = %user.grade_label(), "tutor: session started");
        let conversation = Conversation::with_greeting(greeting(&user));
        Self { user, conversation, prefs, llm }
    }

    #[must_use]
    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub fn training_text(&self) -> String {
        self.prefs.training_text()
    }

    /// Persist new training text; later turns pick it up.
    ///
    /// # Errors
    ///
    /// Returns an error when the preference store cannot persist it.
    pub fn save_training_text(&self, text: &str) -> Result<(), PreferenceError> {
        self.prefs.save_training_text(text)?;
        info!(len = text.len(), "tutor: training text saved");
        Ok(())
    }

    /// Admit a send, append the outgoing message and mark the turn in flight.
    ///
    /// # Errors
    ///
    /// [`SendRejected`] when there is nothing to send, a turn is pending, or
    /// the conversation is locked. No state changes in that case.
    pub fn begin_turn(&mut self, text: &str, image: Option<ImageAttachment>) -> Result<PendingTurn, SendRejected> {
        if text.trim().is_empty() && image.is_none() {
            return Err(SendRejected::Empty);
        }
        if self.conversation.is_in_flight() {
            return Err(SendRejected::InFlight);
        }
        if self.conversation.is_locked() {
            return Err(SendRejected::Locked);
        }

        let pending = PendingTurn::new(
            &self.user,
            &self.prefs.training_text(),
            self.conversation.messages(),
            text,
            image.as_ref(),
        );
        info!(
            history_len = self.conversation.messages().len(),
            has_image = image.is_some(),
            "tutor: turn started"
        );
        self.conversation.push(Sender::User, text, image, false);
        self.conversation.set_in_flight(true);
        Ok(pending)
    }

    /// Apply the settled result of a turn started by [`Self::begin_turn`].
    /// Returns [`TurnOutcome::Ignored`] without touching the conversation
    /// when no turn is in flight.
    pub fn complete_turn(&mut self, _pending: PendingTurn, result: Result<String, LlmError>) -> TurnOutcome {
        if !self.conversation.is_in_flight() {
            warn!("tutor: completion without a turn in flight ignored");
            return TurnOutcome::Ignored;
        }
        self.conversation.set_in_flight(false);

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "tutor: LLM call failed");
                self.conversation.push(Sender::Model, CONNECTION_APOLOGY, None, true);
                return TurnOutcome::Failed;
            }
        };

        let class = classify_reply(&raw);
        let Some(text) = class.display_text() else {
            warn!("tutor: conversation locked by policy");
            self.conversation.push(Sender::Model, LOCK_NOTICE, None, false);
            self.conversation.lock();
            return TurnOutcome::Locked;
        };
        self.conversation.push(Sender::Model, text, None, false);
        if matches!(class, ReplyClass::Warning(_)) {
            info!("tutor: off-topic warning issued");
            TurnOutcome::Warned
        } else {
            TurnOutcome::Replied
        }
    }

    /// Run one full turn: admit, call the model once, apply the result.
    ///
    /// # Errors
    ///
    /// [`SendRejected`] when the send is not admitted; no call is made.
    pub async fn send_turn(&mut self, text: &str, image: Option<ImageAttachment>) -> Result<TurnOutcome, SendRejected> {
        let pending = self.begin_turn(text, image)?;
        let llm = Arc::clone(&self.llm);
        let result = pending.dispatch(llm.as_ref()).await;
        Ok(self.complete_turn(pending, result))
    }
}

#[cfg(test)]
#[path = "tutor_test.rs"]
mod tests;
