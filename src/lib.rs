//! OStatus / PubSubHubbub federation core.
//!
//! - [`federation`] - push signatures, hub pings, subscription handshake
//! - [`feed`] - Atom parse and serialize
//! - [`sync`] - entry ingestion and the [`sync::FeedSync`] orchestrator
//! - [`storage`] - the [`storage::Repository`] trait and its SQLite adapter
//! - [`transport`] - the outbound HTTP [`transport::Transport`]

pub mod config;
pub mod content;
pub mod federation;
pub mod feed;
pub mod storage;
pub mod sync;
pub mod transport;
pub mod util;
