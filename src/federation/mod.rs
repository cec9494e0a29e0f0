//! OStatus federation protocol pieces: push signatures, hub pings and the
//! subscription handshake. Nothing here touches storage.

mod hub;
pub mod signature;
mod subscription;
mod tokens;

pub use hub::{HubPublisher, PublishError, PublishReport};
pub use signature::{sign, sign_with, verify, SignatureAlgorithm};
pub use subscription::{
    subscribe_form, verify_intent, IntentOutcome, IntentRequest, SubscriptionMode,
};
pub use tokens::{OsTokenSource, TokenSource};
