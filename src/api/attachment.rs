//! Files queued for out-of-band upload.

use std::path::Path;

use crate::error::ChatError;

/// An attachment read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name sent in the multipart `file` part.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from in-memory bytes.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads `path` into memory. The file name is the last path component.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { file_name, bytes })
    }
}
