//! Block storage for one ringstore node.
//!
//! This crate defines the [`BlockStorage`] trait for holding content-addressed
//! blocks, an in-memory backend ([`MemoryStorage`]), and the [`BlockStore`]
//! service that serves get/put/has requests and pushes ring ranges of its
//! blocks to peers during rebalancing.

mod error;
mod handler;
mod memory_store;
mod service;
mod traits;

pub use error::StoreError;
pub use memory_store::MemoryStorage;
pub use service::BlockStore;
pub use traits::BlockStorage;
