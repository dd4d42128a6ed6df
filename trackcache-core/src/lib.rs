//! # Trackcache Core
//!
//! Core building blocks of the Trackcache two-tier object cache.
//!
//! This crate provides the LRU engine, the thread-safe memory and disk tiers
//! built on it, and the unified cache that composes both tiers with
//! promotion on read.
//!
//! ## Features
//!
//! - **O(1) LRU engine**: Arena-backed doubly linked list with a key index
//! - **Three eviction limits**: Entry count, total cost and time since last access
//! - **Memory tier**: Mutex-protected in-memory values with lifecycle auto-clear
//! - **Disk tier**: One blob per key, LRU metadata rebuilt from modification times
//! - **Unified cache**: Memory-first reads with promotion from disk
//! - **Async access**: Every operation also runs on Tokio's blocking pool
//! - **Statistics**: Optional hit/miss/eviction counters (with `stats` feature)
//!
//! ## Module Organization
//!
//! - [`indexed_list`] - Arena-backed list with a key index and generational handles
//! - [`lru_store`] - LRU store with a running cost total and trim policies
//! - [`memory_tier`] - Thread-safe in-memory tier
//! - [`disk_tier`] - Thread-safe tier persisted through a [`BlobStore`]
//! - [`unified_cache`] - Two-tier cache composing both tiers
//! - [`blob_store`] - Blob store trait, filesystem and in-memory stores
//! - [`signals`] - Lifecycle events and the registry delivering them
//! - [`async_ops`] - Completion model of asynchronous operations
//!
//! ## Locking
//!
//! Each tier owns one mutex held for the full duration of every operation,
//! iterators included. An iterator must be dropped before any other call on
//! the same tier, or that call blocks forever.

mod cache_entry;
mod config;
mod error;
mod memory_estimator;
mod payload;

pub mod async_ops;
pub mod blob_store;
pub mod disk_tier;
pub mod indexed_list;
pub mod lru_store;
pub mod memory_tier;
pub mod signals;
pub mod unified_cache;

#[cfg(feature = "stats")]
mod stats;

pub use async_ops::{AsyncOp, Completion};
pub use blob_store::{BlobMeta, BlobStore, FsBlobStore, MemoryBlobStore};
pub use cache_entry::Entry;
pub use config::{
    CacheConfig, DiskConfig, Limits, MemoryConfig, CACHE_DIR_PREFIX, DEFAULT_CACHE_NAME,
};
pub use disk_tier::{DiskIter, DiskTier};
pub use error::{CacheError, Result, StorageOp};
pub use indexed_list::{DuplicateKey, IndexedList, NodeHandle};
pub use lru_store::{Evicted, LruStore};
pub use memory_estimator::MemoryEstimator;
pub use memory_tier::{MemoryIter, MemoryTier};
pub use payload::Payload;
pub use signals::{LifecycleEvent, SignalHub};
pub use unified_cache::{UnifiedCache, UnifiedIter};

#[cfg(feature = "stats")]
pub use stats::TierStats;
