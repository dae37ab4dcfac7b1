//! Login: students by name and grade, teachers by shared secret.
//!
//! The teacher secret is a single static value compared exactly, either as
//! plain text or as a SHA-256 digest. Failed attempts are not limited.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::services::preferences::{PreferenceError, Preferences};
use crate::state::{GradeLevel, UserProfile};

pub const TEACHER_DISPLAY_NAME: &str = "Thầy Dũng";
pub const LEGACY_TEACHER_PASSWORD: &str = "Anhdung1@";

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Vui lòng nhập họ và tên của em.")]
    MissingName,
    #[error("Mật khẩu không đúng.")]
    WrongPassword,
    #[error("không lưu được tên gần đây: {0}")]
    Preferences(#[from] PreferenceError),
}

/// Configured teacher credential.
#[derive(Clone, PartialEq, Eq)]
pub enum TeacherSecret {
    Plain(String),
    /// Lowercase hex SHA-256 of the password.
    Sha256Hex(String),
}

impl std::fmt::Debug for TeacherSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("TeacherSecret::Plain(***)"),
            Self::Sha256Hex(_) => f.write_str("TeacherSecret::Sha256Hex(***)"),
        }
    }
}

impl Default for TeacherSecret {
    fn default() -> Self {
        Self::Plain(LEGACY_TEACHER_PASSWORD.to_string())
    }
}

impl TeacherSecret {
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        match self {
            Self::Plain(expected) => password == expected,
            Self::Sha256Hex(expected) => hash_password(password).eq_ignore_ascii_case(expected.trim()),
        }
    }
}

#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

/// Log a student in and record the trimmed name in the recent-names list.
/// The profile keeps the name as typed.
///
/// # Errors
///
/// [`LoginError::MissingName`] for a blank name, or a preference write
/// failure.
pub fn login_student(prefs: &Preferences, name: &str, grade: GradeLevel) -> Result<UserProfile, LoginError> {
    if name.trim().is_empty() {
        return Err(LoginError::MissingName);
    }
    prefs.remember_name(name)?;
    info!(grade = %grade, "auth: student login");
    Ok(UserProfile::student(name, grade))
}

/// # Errors
///
/// [`LoginError::WrongPassword`] unless `password` matches `secret` exactly.
pub fn login_teacher(secret: &TeacherSecret, password: &str) -> Result<UserProfile, LoginError> {
    if !secret.verify(password) {
        warn!("auth: teacher login rejected");
        return Err(LoginError::WrongPassword);
    }
    info!("auth: teacher login");
    Ok(UserProfile::teacher(TEACHER_DISPLAY_NAME))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
