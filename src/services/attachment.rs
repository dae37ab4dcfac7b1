//! Image files to data-URL attachments.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::state::ImageAttachment;

pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("cannot read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("image {path} is {size} bytes (limit {MAX_IMAGE_BYTES})")]
    TooLarge { path: String, size: u64 },
    #[error("image {path} is empty")]
    Empty { path: String },
}

/// Read `path` and encode it as `data:<mime>;base64,<payload>`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is empty, or exceeds
/// [`MAX_IMAGE_BYTES`].
pub fn from_path(path: &Path) -> Result<ImageAttachment, AttachmentError> {
    let read_err = |source| AttachmentError::Read { path: path.display().to_string(), source };

    let size = std::fs::metadata(path).map_err(read_err)?.len();
    if size > MAX_IMAGE_BYTES {
        return Err(AttachmentError::TooLarge { path: path.display().to_string(), size });
    }
    let bytes = std::fs::read(path).map_err(read_err)?;
    if bytes.is_empty() {
        return Err(AttachmentError::Empty { path: path.display().to_string() });
    }
    Ok(from_bytes(&bytes, mime_for(path)))
}

#[must_use]
pub fn from_bytes(bytes: &[u8], mime_type: &str) -> ImageAttachment {
    ImageAttachment::from_data_url(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
}

/// MIME type from the file extension, `image/jpeg` when unknown.
#[must_use]
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
#[path = "attachment_test.rs"]
mod tests;
