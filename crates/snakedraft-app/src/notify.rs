// Message delivery for rendered draft messages.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::render::{Action, RenderedMessage};

/// Posts messages somewhere people can see them.
///
/// `post` returns an opaque handle; the same handle is later passed back to
/// `delete` to retract the message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, channel: &str, message: &RenderedMessage) -> Result<String>;
    async fn delete(&self, channel: &str, handle: &str) -> Result<()>;
}

/// Writes messages to stdout. Handles look like chat timestamps
/// (`seconds.sequence`).
#[derive(Default)]
pub struct ConsoleNotifier {
    seq: AtomicU64,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}.{:06}", Utc::now().timestamp(), seq)
    }
}

/// Plain-text form of a message for terminals and logs.
pub fn format_plain(message: &RenderedMessage) -> String {
    let mut out = message.text.clone();
    if !message.actions.is_empty() {
        let buttons = message
            .actions
            .iter()
            .map(|a| {
                let command = match a {
                    Action::Join(id) => format!("join {id}"),
                    Action::Leave(id) => format!("leave {id}"),
                    Action::Start(id) => format!("start {id}"),
                    Action::Pick { action, .. } => format!("pick {action}"),
                };
                format!("[{}: {command}]", a.caption())
            })
            .collect::<Vec<_>>()
            .join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&buttons);
    }
    out
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn post(&self, channel: &str, message: &RenderedMessage) -> Result<String> {
        let handle = self.next_handle();
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "--- {channel} [{handle}] ---\n{}", format_plain(message))
            .context("failed to write message to stdout")?;
        Ok(handle)
    }

    async fn delete(&self, channel: &str, handle: &str) -> Result<()> {
        tracing::debug!(channel, handle, "Retracted console message");
        Ok(())
    }
}
