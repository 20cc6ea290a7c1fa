//! The model transport seam.
//!
//! The engine never talks to an inference service directly. A
//! [`ModelTransport`] receives the conversation, the tool catalog and the
//! wire format, and returns one completion.

use crate::engine::conversation::Conversation;
use crate::error::TransportError;
use crate::protocol::{ModelOutput, ProtocolFormat};
use crate::tools::ToolCatalog;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Produces model completions.
///
/// Any error is treated as the transport being unavailable and ends the run.
/// Implementations should render the conversation with
/// [`Conversation::messages`] for the requested format, and advertise
/// [`ProtocolCodec::tool_definitions`](crate::protocol::ProtocolCodec::tool_definitions)
/// when the format is structured.
#[async_trait]
pub trait ModelTransport: Send + Sync + fmt::Debug {
    /// Requests the next completion.
    async fn complete(
        &self,
        conversation: &Conversation,
        catalog: &ToolCatalog,
        format: ProtocolFormat,
    ) -> Result<ModelOutput, TransportError>;
}

/// A transport that replays canned outputs in order.
///
/// Once the script runs out, every further request fails as unavailable.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    outputs: Vec<ModelOutput>,
    next: AtomicUsize,
}

/// One entry of a script file: bare text or a full output.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptEntry {
    Text(String),
    Output(ModelOutput),
}

impl ScriptedTransport {
    /// Creates a transport replaying `outputs`.
    #[must_use]
    pub fn new(outputs: Vec<ModelOutput>) -> Self {
        Self {
            outputs,
            next: AtomicUsize::new(0),
        }
    }

    /// Creates a transport replaying plain-text outputs.
    #[must_use]
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(ModelOutput::text).collect())
    }

    /// Parses a JSON script.
    ///
    /// The script is an array whose entries are either strings (text-only
    /// outputs) or objects with `text` and `tool_calls`.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the script is not such an array.
    pub fn from_json(script: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<ScriptEntry> = serde_json::from_str(script)?;
        Ok(Self::new(
            entries
                .into_iter()
                .map(|entry| match entry {
                    ScriptEntry::Text(text) => ModelOutput::text(text),
                    ScriptEntry::Output(output) => output,
                })
                .collect(),
        ))
    }

    /// Reads and parses a JSON script file.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, TransportError> {
        let script = std::fs::read_to_string(path).map_err(|e| {
            TransportError::new(format!("cannot read script '{}': {}", path.display(), e))
        })?;
        Self::from_json(&script).map_err(|e| {
            TransportError::new(format!("invalid script '{}': {}", path.display(), e))
        })
    }

    /// Number of completions requested so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    /// Number of outputs in the script.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns true if the script is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn complete(
        &self,
        _conversation: &Conversation,
        _catalog: &ToolCatalog,
        _format: ProtocolFormat,
    ) -> Result<ModelOutput, TransportError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.outputs.get(index).cloned().ok_or_else(|| {
            TransportError::new(format!(
                "script exhausted after {} output(s)",
                self.outputs.len()
            ))
        })
    }
}
