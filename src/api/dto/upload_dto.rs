//! DTOs for `POST /upload`.

use serde::Deserialize;

/// Response body of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    /// Name the backend stored the file under.
    pub filename: String,
}
