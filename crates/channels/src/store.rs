use std::path::{Path, PathBuf};

use {async_trait::async_trait, scrapbook_common::RawMessage, serde::Deserialize, tracing::debug};

use crate::{Error, Result, error::Context as _, source::MessageSource};

/// Reads messages from a JSON export on disk.
///
/// The file holds either a single message object or an array of messages.
/// It is re-read on every lookup so edits show up without a restart.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Export {
    Many(Vec<RawMessage>),
    One(RawMessage),
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every message in the export, in file order.
    pub async fn load_all(&self) -> Result<Vec<RawMessage>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::external(format!("reading {}", self.path.display()), e))?;
        let export: Export = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        let messages = match export {
            Export::Many(messages) => messages,
            Export::One(message) => vec![message],
        };
        debug!(path = %self.path.display(), count = messages.len(), "loaded message export");
        Ok(messages)
    }
}

#[async_trait]
impl MessageSource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Option<RawMessage>> {
        if message_id.trim().is_empty() {
            return Err(Error::invalid_input("message id is empty"));
        }
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|m| m.id == message_id))
    }
}
