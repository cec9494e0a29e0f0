//! Feed synchronization: ingestion of parsed entries and the orchestrator
//! that drives populate, push, publish and render.

mod ingest;
mod locks;
mod orchestrator;

pub use ingest::{IngestEngine, IngestResult};
pub use locks::KeyedLocks;
pub use orchestrator::{
    FeedSync, HubPolicy, PopulateReport, PushOutcome, PushRequest, SyncError, SyncOptions,
    DEFAULT_HUB,
};
