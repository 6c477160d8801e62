//! loadkit: a data-access façade with a transparent multi-tier cache.
//!
//! The cache core (entries, eviction policies, providers, manager) carries
//! the library's invariants; the [`loader`] module layers read-through,
//! write-through, and negative-result caching over an arbitrary async
//! loader. See `DESIGN.md` for internal architecture notes.

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod keygen;
pub mod loader;
pub mod manager;
pub mod policy;
pub mod provider;
pub mod stats;
pub mod util;

pub mod prelude;
