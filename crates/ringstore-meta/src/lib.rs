//! Cluster coordinator for ringstore.
//!
//! [`MetaStore`] is the single authority for:
//!
//! - file metadata, updated under optimistic versioning (a new version is
//!   accepted only if it is exactly one above the stored one);
//! - block routing, answering which block store owns each block hash;
//! - ring membership, where every join or leave first migrates the affected
//!   arc of blocks and only then changes the ring.

mod error;
mod handler;
mod store;

pub use error::MetaError;
pub use store::MetaStore;
