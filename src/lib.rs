//! Client-side synchronization core for a newsletter-aggregation reader.
//!
//! A [`sync::SyncContext`] fronts a namespace-routed [`storage::KeyedStore`]
//! with a coalescing read cache and a per-key change bus. Day payloads are
//! reconciled with fresh scrapes by [`merge`], and user actions are modelled
//! as pure reducers in [`machine`]. [`reader::Reader`] ties these together.

pub mod api;
pub mod config;
pub mod machine;
pub mod merge;
pub mod model;
pub mod reader;
pub mod storage;
pub mod sync;
pub mod util;

pub use reader::{Reader, ReaderError};
