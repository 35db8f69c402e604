//! HTTP client for the backend's out-of-band endpoints.
//!
//! Conversation listing and attachment uploads are plain request/response
//! exchanges, independent of the duplex connection and unordered relative
//! to chat frames.

use std::time::Duration;

use reqwest::Url;
use reqwest::multipart::{Form, Part};

use super::attachment::Attachment;
use super::dto::{ConversationDto, UploadResponse, into_conversations};
use super::endpoint;
use crate::domain::{Conversation, ConversationId};
use crate::error::{ChatError, RequestKind};

/// Bearer-authenticated client for `/chats` and `/upload`.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    api_base: Url,
    token: String,
}

impl BackendClient {
    /// Creates a client for `api_base` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ClientSetup`] if the HTTP client cannot be
    /// built.
    pub fn new(api_base: Url, token: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ChatError::ClientSetup)?;
        Ok(Self {
            http,
            api_base,
            token: token.into(),
        })
    }

    /// `GET /chats`: the user's conversations in backend order.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RequestFailure`] on transport errors, non-2xx
    /// statuses or an undecodable body.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        let fail = |source| ChatError::RequestFailure {
            operation: RequestKind::ListConversations,
            source,
        };
        let listing: Vec<ConversationDto> = self
            .http
            .get(endpoint(&self.api_base, "chats"))
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fail)?
            .json()
            .await
            .map_err(fail)?;
        let conversations = into_conversations(listing);
        tracing::debug!(count = conversations.len(), "conversations listed");
        Ok(conversations)
    }

    /// `POST /upload`: sends `attachment` as multipart field `file`, with
    /// `chat_id` when a conversation is active. Returns the stored file
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RequestFailure`] on transport errors, non-2xx
    /// statuses or an undecodable body.
    pub async fn upload(
        &self,
        attachment: Attachment,
        chat_id: Option<&ConversationId>,
    ) -> Result<String, ChatError> {
        let fail = |source| ChatError::RequestFailure {
            operation: RequestKind::Upload,
            source,
        };
        let size = attachment.bytes.len();
        let part = Part::bytes(attachment.bytes).file_name(attachment.file_name);
        let mut form = Form::new().part("file", part);
        if let Some(id) = chat_id {
            form = form.text("chat_id", id.to_string());
        }

        let response: UploadResponse = self
            .http
            .post(endpoint(&self.api_base, "upload"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fail)?
            .json()
            .await
            .map_err(fail)?;
        tracing::info!(filename = %response.filename, size, "attachment uploaded");
        Ok(response.filename)
    }
}
