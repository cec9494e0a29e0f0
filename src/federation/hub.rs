//! Hub pings: tell every hub that a topic has new content.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;

use crate::transport::{FetchError, Transport};
use crate::util::{UrlPolicy, UrlValidationError};

/// Why a single hub ping failed.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Invalid hub URL: {0}")]
    InvalidHub(#[from] UrlValidationError),
    #[error("Hub transport error: {0}")]
    Transport(#[from] FetchError),
    /// The hub answered but did not acknowledge
    #[error("Hub responded with status {0}")]
    NotAcknowledged(u16),
}

/// Per-hub outcome of [`HubPublisher::publish`]. Both lists keep the input
/// order of the hubs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl PublishReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Issues `hub.mode=publish` notifications, a bounded number at a time.
#[derive(Clone)]
pub struct HubPublisher {
    transport: Arc<dyn Transport>,
    policy: UrlPolicy,
    concurrency: usize,
}

impl HubPublisher {
    pub fn new(transport: Arc<dyn Transport>, policy: UrlPolicy, concurrency: usize) -> Self {
        Self {
            transport,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    /// Pings each hub with `feed_url` as the topic. A failing hub never
    /// aborts the others, and nothing here returns an error: failures are
    /// reported in [`PublishReport::failed`].
    pub async fn publish(&self, feed_url: &str, hubs: &[String]) -> PublishReport {
        let outcomes: Vec<(String, Result<(), PublishError>)> = stream::iter(hubs.iter().cloned())
            .map(|hub| async move {
                let result = self.ping(&hub, feed_url).await;
                (hub, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = PublishReport::default();
        for (hub, result) in outcomes {
            match result {
                Ok(()) => {
                    tracing::info!(hub = %hub, topic = %feed_url, "Hub acknowledged publish");
                    report.succeeded.push(hub);
                }
                Err(e) => {
                    tracing::warn!(hub = %hub, topic = %feed_url, error = %e, "Hub publish failed");
                    report.failed.push(hub);
                }
            }
        }
        report
    }

    async fn ping(&self, hub: &str, feed_url: &str) -> Result<(), PublishError> {
        let hub_url = self.policy.check(hub)?;
        let status = self
            .transport
            .post_form(
                hub_url.as_str(),
                &[("hub.mode", "publish"), ("hub.url", feed_url)],
            )
            .await?;

        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(PublishError::NotAcknowledged(status))
        }
    }
}
