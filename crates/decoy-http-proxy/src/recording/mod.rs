//! Recorded state: the pair store, the exchange journal and the proxy mode.
//!
//! # Module Structure
//!
//! - `mode` - Proxy mode enum and the shared mode cell
//! - `store` - Copy-on-write pair store
//! - `journal` - Bounded journal of real exchanges
//! - `capture` - Pair generation from captured exchanges

mod capture;
mod journal;
mod mode;
mod store;

pub use capture::capture_pair;
pub use journal::{Journal, JournalEntry, DEFAULT_ENTRY_LIMIT};
pub use mode::{Mode, ModeHandle};
pub use store::PairStore;
