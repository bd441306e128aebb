//! Stockroom Projection — the in-memory read model.
//!
//! The projection cache mirrors the live material set 1:1 and maintains the
//! derived aggregates (total stock, low-stock count, category set)
//! incrementally, so UI queries never re-scan the durable store. The cache
//! is derived and disposable: it owns no primary data and can always be
//! rebuilt from a store snapshot.

pub mod cache;

pub use cache::{CacheDrift, ProjectionCache, Stats};
