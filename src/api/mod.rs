//! REST client layer: conversation listing and attachment uploads.
//!
//! Everything here talks to the backend over plain HTTP with a bearer
//! token, out of band from the duplex connection.

pub mod attachment;
pub mod client;
pub mod dto;

pub use attachment::Attachment;
pub use client::BackendClient;

use reqwest::Url;

/// Resolves `segment` under `base`, keeping any path prefix of the base
/// (`http://h/api` + `chats` → `http://h/api/chats`). Query and fragment
/// of the base are dropped.
#[must_use]
pub fn endpoint(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{segment}", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}
