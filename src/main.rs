//! chat-session terminal client.
//!
//! Reads lines from stdin: plain lines are sent as chat messages, lines
//! starting with `/` are session commands (`/help` lists them). Session
//! events are rendered to stdout as they arrive; logs go to stderr.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use chat_session::api::Attachment;
use chat_session::auth::MemoryCredentialStore;
use chat_session::config::ClientConfig;
use chat_session::domain::{ConversationId, SendOutcome, SessionEvent};
use chat_session::service::SessionService;

const HELP: &str = "\
/chats            list conversations
/open <id>        switch to a conversation
/upload <path>    upload a file to the active conversation
/refresh          reload the conversation list
/reconnect        reopen a lost connection
/logout           forget the token and exit
/quit             exit";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    Chats,
    Open(ConversationId),
    Upload(&'a str),
    Refresh,
    Reconnect,
    Logout,
    Quit,
    Help,
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line);
        };
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(n, a)| (n, a.trim()));
        match (name, arg) {
            ("chats", _) => Self::Chats,
            ("open", id) if !id.is_empty() => match id.parse() {
                Ok(id) => Self::Open(id),
                Err(never) => match never {},
            },
            ("upload", path) if !path.is_empty() => Self::Upload(path),
            ("refresh", _) => Self::Refresh,
            ("reconnect", _) => Self::Reconnect,
            ("logout", _) => Self::Logout,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Help,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = ClientConfig::from_env().context("loading configuration")?;
    let credentials = Arc::new(MemoryCredentialStore::new(config.token.clone()));

    let session = match SessionService::start(&config, credentials) {
        Err(err) if err.is_fatal() => {
            anyhow::bail!("{err}: set CHAT_TOKEN");
        }
        other => other.context("starting session")?,
    };

    let mut events = session.subscribe();
    let renderer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => render(&event),
                Err(RecvError::Lagged(n)) => tracing::warn!(lagged = n, "renderer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("Type a message, or /help.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        match Input::parse(line.trim_end()) {
            Input::Message(text) => match session.send_message(text).await? {
                SendOutcome::Sent { .. } | SendOutcome::EmptyInput => {}
                SendOutcome::NotConnected(state) => {
                    println!("(not sent: connection is {state})");
                }
                SendOutcome::TransmitFailed { reason } => println!("(not sent: {reason})"),
            },
            Input::Chats => {
                let snapshot = session.snapshot().await?;
                for chat in &snapshot.conversations {
                    let marker = if snapshot.active_conversation_id.as_ref() == Some(&chat.id) {
                        '*'
                    } else {
                        ' '
                    };
                    println!("{marker} {:>6}  {}", chat.id.to_string(), chat.title);
                }
            }
            Input::Open(id) => {
                if let Err(err) = session.select_conversation(id).await {
                    println!("({err})");
                }
            }
            Input::Upload(path) => match Attachment::from_path(path).await {
                Ok(attachment) => session.upload(attachment).await?,
                Err(err) => println!("({err})"),
            },
            Input::Refresh => session.refresh_conversations().await?,
            Input::Reconnect => {
                if !session.reconnect().await? {
                    println!("(already connected)");
                }
            }
            Input::Logout => {
                session.logout().await;
                println!("Logged out.");
                break;
            }
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
        }
    }

    session.shutdown().await;
    renderer.abort();
    Ok(())
}

fn render(event: &SessionEvent) {
    tracing::trace!(event_type = event.event_type_str(), "rendering");
    match event {
        SessionEvent::MessageAppended { message, .. } => {
            println!("[{}] {}", message.role, message.content);
        }
        SessionEvent::TypingChanged { typing: true, .. } => println!("Bot is typing..."),
        SessionEvent::ConversationSwitched {
            conversation_id,
            messages,
            ..
        } => {
            println!("── conversation {conversation_id} ──");
            for message in messages {
                println!("[{}] {}", message.role, message.content);
            }
        }
        SessionEvent::ConversationsLoaded { conversations, .. } => {
            println!("({} conversations, /chats to list)", conversations.len());
        }
        SessionEvent::ConnectionChanged { state, .. } => println!("(connection {state})"),
        SessionEvent::TypingChanged { typing: false, .. } | SessionEvent::ReplyDiscarded { .. } => {}
    }
}
