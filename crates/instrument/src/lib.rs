//! # Instrument Crate
//!
//! The symbol registry: exchange-pair, future-contract and option
//! definitions, keyed by `symbol_id` and managed by the `AddSymbols`
//! admin command. The matching engine consults it only for a symbol's
//! existence; the risk engine consults it for a future contract's
//! margin coefficients. Tick-size validation and option pricing are not
//! this crate's job.

pub mod error;
pub mod store;
pub mod types;
pub mod wire;

pub use error::{InstrumentError, InstrumentResult};
pub use store::SymbolRegistry;
pub use types::{Symbol, SymbolCore};
