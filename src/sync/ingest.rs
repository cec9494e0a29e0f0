use chrono::Utc;
use std::sync::Arc;

use super::locks::KeyedLocks;
use crate::content::TextExtractor;
use crate::feed::ParsedEntry;
use crate::storage::{AuthorId, Feed, NewUpdate, Repository, StorageError};

/// Counts from one [`IngestEngine::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestResult {
    pub created: usize,
    /// Already-known entries whose text was refreshed
    pub updated: usize,
    /// Already-known entries whose text was identical
    pub unchanged: usize,
}

/// Merges parsed entries into the update store, at most one update per
/// canonical URL across every feed.
pub struct IngestEngine {
    repo: Arc<dyn Repository>,
    extractor: Arc<dyn TextExtractor>,
    url_locks: KeyedLocks,
}

impl IngestEngine {
    pub fn new(repo: Arc<dyn Repository>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            repo,
            extractor,
            url_locks: KeyedLocks::new(),
        }
    }

    /// New entries become updates owned by `feed` and authored by `author_id`.
    /// Known entries only get their text refreshed: timestamps, owner and
    /// author stay as first observed.
    ///
    /// Each canonical URL is locked for its check-then-write, so concurrent
    /// ingests of the same entry (even from different feeds) create it once.
    pub async fn ingest(
        &self,
        feed: &Feed,
        author_id: AuthorId,
        entries: &[ParsedEntry],
    ) -> Result<IngestResult, StorageError> {
        let mut result = IngestResult::default();

        for entry in entries {
            let text = self.entry_text(entry);
            let _guard = self.url_locks.lock(entry.url.as_str()).await;

            match self.repo.find_update_by_url(&entry.url).await? {
                Some(mut existing) => {
                    if existing.text == text {
                        result.unchanged += 1;
                        continue;
                    }
                    existing.text = text;
                    self.repo.save_update(&existing).await?;
                    result.updated += 1;
                }
                None => {
                    let created_at = entry.published.or(entry.updated).unwrap_or_else(Utc::now);
                    let updated_at = entry.updated.unwrap_or(created_at);
                    self.repo
                        .create_update(NewUpdate {
                            feed_id: feed.id,
                            author_id,
                            url: entry.url.clone(),
                            text,
                            created_at,
                            updated_at,
                        })
                        .await?;
                    result.created += 1;
                }
            }
        }

        tracing::debug!(
            feed_id = feed.id,
            created = result.created,
            updated = result.updated,
            unchanged = result.unchanged,
            "Entries ingested"
        );
        Ok(result)
    }

    /// Body text, falling back to the title for entries without one.
    fn entry_text(&self, entry: &ParsedEntry) -> String {
        let text = self.extractor.body_text(&entry.body, entry.body_kind);
        if text.is_empty() {
            if let Some(title) = &entry.title {
                return self
                    .extractor
                    .body_text(title, crate::feed::BodyKind::PlainText);
            }
        }
        text
    }
}
