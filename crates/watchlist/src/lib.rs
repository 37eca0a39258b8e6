//! Watchlist Module
//!
//! In-memory, insertion-ordered watchlist shared by the quote poller, the
//! moving-average engine and the alert engine, plus the text commands that
//! edit it and the JSON snapshot it is restored from.

pub mod command;
pub mod snapshot;
pub mod store;

pub use command::Command;
pub use snapshot::WatchlistSnapshot;
pub use store::{PriceObservation, UpsertOutcome, WatchlistStore};
