use crate::error::{DoppelError, Result};
use crate::types::Fid;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub fid: Fid,
    pub title: String,
    pub body: String,
}

/// Best-effort message push to a player. Callers log and drop errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            "Notify fid {}: {} - {}",
            notification.fid,
            notification.title,
            notification.body
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a fixed endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DoppelError::notification(format!(
                "webhook returned {} for fid {}",
                response.status(),
                notification.fid
            )));
        }

        Ok(())
    }
}

/// Keeps every notification in memory. Optionally fails for chosen fids.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Vec<Fid>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(fids: impl IntoIterator<Item = Fid>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: fids.into_iter().collect(),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        if self.failing.contains(&notification.fid) {
            return Err(DoppelError::notification(format!(
                "fid {} unreachable",
                notification.fid
            )));
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
