//! Durable storage.
//!
//! Four entities persist across restarts: identities (activity stats and
//! the mirrored flag string), elections, suffrages, and live effects. The
//! Election and Effect rows double as the schedule table the engine rebuilds
//! its timer queue from on startup.

pub mod store;

pub use store::{CastOutcome, CloseWrite, Store, StoreError};
