//! Domain services behind the console presenter.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the tutoring rules and persistence so the presenter
//! stays focused on reading input and rendering messages.

pub mod attachment;
pub mod auth;
pub mod policy;
pub mod preferences;
pub mod prompt;
pub mod tutor;
