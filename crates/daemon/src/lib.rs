//! NeosNoize daemon: keeps a local mirror of the Neos session list.
//!
//! Every tick fetches the session list, caches the thumbnails it references,
//! drops cached files no session points at anymore and writes a snapshot
//! with thumbnail links rewritten to the local cache.

pub mod cache;
pub mod config;
pub mod scheduler;
pub mod snapshot;
pub mod source;
pub mod sync;
pub mod web;
