use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::ingest::{IngestEngine, IngestResult};
use super::locks::KeyedLocks;
use crate::content::TextExtractor;
use crate::federation::{
    self, HubPublisher, IntentOutcome, IntentRequest, PublishReport, TokenSource,
};
use crate::feed::{self, CodecError, FeedDocument, ParsedFeed};
use crate::storage::{
    Feed, FeedId, NewAuthor, NewFeed, NewUpdate, Repository, StorageError, Update,
};
use crate::transport::{FetchError, Transport};
use crate::util::{strip_control_chars, UrlPolicy, UrlValidationError};

/// Public hub seeded onto every new feed.
pub const DEFAULT_HUB: &str = "http://pubsubhubbub.appspot.com/publish";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    #[error("Feed {0} not found")]
    FeedNotFound(FeedId),
    #[error("Feed {0} has not been populated")]
    NotPopulated(FeedId),
    #[error("Feed {0} is remote; only local feeds accept posts")]
    NotLocal(FeedId),
    #[error("Feed {0} is local; subscriptions are for remote feeds")]
    NotRemote(FeedId),
    #[error("Feed {0} has no hub")]
    NoHub(FeedId),
    #[error("Hub refused the subscription with status {0}")]
    HubRejected(u16),
}

/// What a re-populate does with the hubs a feed already has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubPolicy {
    /// The remote document's hub list wins outright
    #[default]
    Replace,
    /// Remote hubs first, then local hubs the remote list lacks
    Merge,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub default_hub: String,
    /// Budget for fetching a remote document during populate
    pub fetch_timeout: Duration,
    pub url_policy: UrlPolicy,
    pub hub_policy: HubPolicy,
    pub hub_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            default_hub: DEFAULT_HUB.to_string(),
            fetch_timeout: Duration::from_secs(30),
            url_policy: UrlPolicy::default(),
            hub_policy: HubPolicy::default(),
            hub_concurrency: 8,
        }
    }
}

/// An inbound content distribution as the HTTP layer received it.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub body: Vec<u8>,
    /// `X-Hub-Signature` header value
    pub signature: String,
    pub callback_url: String,
    pub topic_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted(IngestResult),
    /// Signature did not verify; nothing changed
    Rejected,
}

#[derive(Debug, Clone)]
pub struct PopulateReport {
    pub feed: Feed,
    pub ingest: IngestResult,
    /// Entries with neither id nor link
    pub skipped: usize,
}

/// The feed lifecycle: creation, population, pushes, hub pings, rendering.
///
/// Per-feed work (populate, push, post) runs under a per-feed lock; distinct
/// feeds proceed in parallel.
pub struct FeedSync {
    repo: Arc<dyn Repository>,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    ingest: IngestEngine,
    publisher: HubPublisher,
    options: SyncOptions,
    feed_locks: KeyedLocks,
    creation_locks: KeyedLocks,
}

impl FeedSync {
    pub fn new(
        repo: Arc<dyn Repository>,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn TextExtractor>,
        tokens: Arc<dyn TokenSource>,
        options: SyncOptions,
    ) -> Self {
        let publisher = HubPublisher::new(
            Arc::clone(&transport),
            options.url_policy,
            options.hub_concurrency,
        );
        Self {
            ingest: IngestEngine::new(Arc::clone(&repo), extractor),
            repo,
            transport,
            tokens,
            publisher,
            options,
            feed_locks: KeyedLocks::new(),
            creation_locks: KeyedLocks::new(),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn new_feed(&self, remote_url: Option<String>, author_id: Option<i64>) -> NewFeed {
        NewFeed {
            remote_url,
            verify_token: self.tokens.token(),
            secret: SecretString::from(self.tokens.token()),
            hubs: vec![self.options.default_hub.clone()],
            author_id,
        }
    }

    async fn load_feed(&self, feed_id: FeedId) -> Result<Feed, SyncError> {
        self.repo
            .find_feed(feed_id)
            .await?
            .ok_or(SyncError::FeedNotFound(feed_id))
    }

    /// Finds or creates the uninitialized feed for `remote_url`. New feeds get
    /// fresh tokens and the default hub.
    pub async fn create_remote_feed(&self, remote_url: &str) -> Result<Feed, SyncError> {
        self.options.url_policy.check(remote_url)?;

        let _guard = self.creation_locks.lock(remote_url).await;
        if let Some(feed) = self.repo.find_feed_by_remote_url(remote_url).await? {
            return Ok(feed);
        }

        let feed = self
            .repo
            .create_feed(self.new_feed(Some(remote_url.to_string()), None))
            .await?;
        tracing::info!(feed_id = feed.id, url = %remote_url, "Remote feed created");
        Ok(feed)
    }

    /// Creates an author and a local feed published by them.
    pub async fn create_local_feed(&self, author: NewAuthor) -> Result<Feed, SyncError> {
        let author = self.repo.create_author(author).await?;
        let feed = self.repo.create_feed(self.new_feed(None, Some(author.id))).await?;
        tracing::info!(feed_id = feed.id, author = %author.username, "Local feed created");
        Ok(feed)
    }

    /// Fetches and parses `remote_url`, then sets the author and hubs and
    /// ingests every entry.
    ///
    /// Fetch and parse happen before any write, so a `Fetch` or `Codec`
    /// error leaves the feed exactly as it was. The author is bound to the
    /// feed before ingestion; a re-populate keeps that author and applies
    /// [`HubPolicy`] to the hub list.
    pub async fn populate(&self, remote_url: &str) -> Result<PopulateReport, SyncError> {
        let feed = self.create_remote_feed(remote_url).await?;
        let _guard = self.feed_locks.lock(&feed.id).await;
        let mut feed = self.load_feed(feed.id).await?;

        let document = self.fetch_document(remote_url).await?;
        let parsed = feed::parse(&document)?;

        // Saved at once so a later failure cannot orphan the author.
        let author_id = match feed.author_id {
            Some(id) => id,
            None => {
                let id = self.create_author(&parsed).await?;
                feed.author_id = Some(id);
                self.repo.save_feed(&feed).await?;
                id
            }
        };

        feed.hubs = match self.options.hub_policy {
            HubPolicy::Replace => parsed.hubs.clone(),
            HubPolicy::Merge => merge_hubs(&parsed.hubs, &feed.hubs),
        };

        let ingest = self.ingest.ingest(&feed, author_id, &parsed.entries).await?;
        self.repo.save_feed(&feed).await?;

        if parsed.skipped > 0 {
            tracing::warn!(
                feed_id = feed.id,
                skipped = parsed.skipped,
                "Entries without id or link were skipped"
            );
        }
        tracing::info!(
            feed_id = feed.id,
            created = ingest.created,
            updated = ingest.updated,
            hubs = feed.hubs.len(),
            "Feed populated"
        );

        Ok(PopulateReport {
            feed,
            ingest,
            skipped: parsed.skipped,
        })
    }

    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tokio::time::timeout(self.options.fetch_timeout, self.transport.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    async fn create_author(&self, parsed: &ParsedFeed) -> Result<i64, StorageError> {
        let a = &parsed.author;
        let author = self
            .repo
            .create_author(NewAuthor {
                name: strip_control_chars(&a.display_name).into_owned(),
                username: strip_control_chars(&a.username).into_owned(),
                email: a.email.clone(),
                remote_url: a.uri.clone(),
                image_url: a.avatar_url.clone(),
            })
            .await?;
        Ok(author.id)
    }

    /// Applies a pushed document to a populated feed.
    ///
    /// A bad signature is a normal outcome ([`PushOutcome::Rejected`]) and
    /// changes nothing. A good one ingests the entries; author and hubs are
    /// left alone.
    pub async fn apply_push(
        &self,
        feed_id: FeedId,
        push: &PushRequest,
    ) -> Result<PushOutcome, SyncError> {
        let _guard = self.feed_locks.lock(&feed_id).await;
        let feed = self.load_feed(feed_id).await?;

        if !federation::verify(&push.body, &push.signature, feed.secret.expose_secret()) {
            tracing::warn!(
                feed_id,
                topic = %push.topic_url,
                callback = %push.callback_url,
                "Push rejected: signature mismatch"
            );
            return Ok(PushOutcome::Rejected);
        }

        let author_id = feed.author_id.ok_or(SyncError::NotPopulated(feed_id))?;
        let parsed = feed::parse(&push.body)?;
        let result = self.ingest.ingest(&feed, author_id, &parsed.entries).await?;

        tracing::info!(
            feed_id,
            topic = %push.topic_url,
            created = result.created,
            updated = result.updated,
            "Push accepted"
        );
        Ok(PushOutcome::Accepted(result))
    }

    /// Pings every hub of the feed. Partial failure is reported, not raised.
    pub async fn notify_hubs(
        &self,
        feed_id: FeedId,
        base_uri: &str,
    ) -> Result<PublishReport, SyncError> {
        let feed = self.load_feed(feed_id).await?;
        let topic = feed.absolute_url(base_uri);
        let report = self.publisher.publish(&topic, &feed.hubs).await;
        tracing::info!(
            feed_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Hubs notified"
        );
        Ok(report)
    }

    /// Loads everything [`feed::serialize`] needs.
    pub async fn feed_document(&self, feed_id: FeedId) -> Result<FeedDocument, SyncError> {
        let feed = self.load_feed(feed_id).await?;
        let author_id = feed.author_id.ok_or(SyncError::NotPopulated(feed_id))?;
        let author = self
            .repo
            .find_author(author_id)
            .await?
            .ok_or(SyncError::NotPopulated(feed_id))?;
        let updates = self.repo.updates_for_feed(feed_id).await?;
        Ok(FeedDocument {
            feed,
            author,
            updates,
        })
    }

    pub async fn render(&self, feed_id: FeedId, base_uri: &str) -> Result<Vec<u8>, SyncError> {
        let document = self.feed_document(feed_id).await?;
        Ok(feed::serialize(&document, base_uri)?)
    }

    /// Appends a status update to a local feed. The update gets a fresh
    /// `urn:uuid:` canonical URL.
    pub async fn post_update(&self, feed_id: FeedId, text: &str) -> Result<Update, SyncError> {
        let _guard = self.feed_locks.lock(&feed_id).await;
        let feed = self.load_feed(feed_id).await?;
        if !feed.is_local() {
            return Err(SyncError::NotLocal(feed_id));
        }
        let author_id = feed.author_id.ok_or(SyncError::NotPopulated(feed_id))?;

        let now = chrono::Utc::now();
        let update = self
            .repo
            .create_update(NewUpdate {
                feed_id,
                author_id,
                url: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
                text: strip_control_chars(text).into_owned(),
                created_at: now,
                updated_at: now,
            })
            .await?;
        tracing::info!(feed_id, update_id = update.id, "Update posted");
        Ok(update)
    }

    /// Asks the feed's primary hub to start pushing to `callback_url`.
    pub async fn request_subscription(
        &self,
        feed_id: FeedId,
        callback_url: &str,
    ) -> Result<(), SyncError> {
        let feed = self.load_feed(feed_id).await?;
        let topic = feed
            .remote_url
            .as_deref()
            .ok_or(SyncError::NotRemote(feed_id))?;
        let hub = feed.hubs.first().ok_or(SyncError::NoHub(feed_id))?;
        let hub_url = self.options.url_policy.check(hub)?;

        let form = federation::subscribe_form(
            callback_url,
            topic,
            &feed.verify_token,
            feed.secret.expose_secret(),
        );
        let status = self.transport.post_form(hub_url.as_str(), &form).await?;
        if !(200..300).contains(&status) {
            tracing::warn!(feed_id, hub = %hub, status, "Subscription request refused");
            return Err(SyncError::HubRejected(status));
        }

        tracing::info!(feed_id, hub = %hub, "Subscription requested");
        Ok(())
    }

    /// Answers a hub's verification-of-intent callback for `feed_id`.
    /// Unknown feeds are denied.
    pub async fn verify_intent(
        &self,
        feed_id: FeedId,
        request: &IntentRequest,
    ) -> Result<IntentOutcome, SyncError> {
        let Some(feed) = self.repo.find_feed(feed_id).await? else {
            tracing::warn!(feed_id, "Intent verification for unknown feed");
            return Ok(IntentOutcome::Denied);
        };
        let outcome = federation::verify_intent(request, &feed.url(), &feed.verify_token);
        tracing::info!(
            feed_id,
            mode = %request.mode,
            confirmed = matches!(outcome, IntentOutcome::Confirmed(_)),
            "Intent verification"
        );
        Ok(outcome)
    }

    pub async fn list(&self) -> Result<Vec<Feed>, SyncError> {
        Ok(self.repo.list_feeds().await?)
    }
}

/// `remote` in order, then whatever of `local` it lacks.
fn merge_hubs(remote: &[String], local: &[String]) -> Vec<String> {
    let mut hubs = remote.to_vec();
    for hub in local {
        if !remote.contains(hub) {
            hubs.push(hub.clone());
        }
    }
    hubs
}
