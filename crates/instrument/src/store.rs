//! The in-memory symbol registry.
//!
//! Single-threaded per shard like everything else in the core: a
//! `parking_lot::RwLock` guards the map purely so the registry can be
//! shared behind an `Arc` by callers that want read access from more
//! than one place (e.g. the risk engine reading margin coefficients
//! while the matching engine reads tick-adjacent metadata), not because
//! the registry itself performs any concurrent mutation.

use crate::error::{InstrumentError, InstrumentResult};
use crate::types::Symbol;
use common::codec::{Reader, WriteBuf};
use common::{Error, SymbolId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SymbolRegistry {
    symbols: RwLock<HashMap<SymbolId, Symbol>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new symbol. Re-adding an existing id with an identical
    /// definition is a no-op (replay idempotency); re-adding with a
    /// differing definition is rejected.
    pub fn add(&self, symbol: Symbol) -> InstrumentResult<()> {
        let mut symbols = self.symbols.write();
        match symbols.get(&symbol.symbol_id()) {
            Some(existing) if existing == &symbol => Ok(()),
            Some(_) => Err(InstrumentError::AlreadyExists(symbol.symbol_id())),
            None => {
                symbols.insert(symbol.symbol_id(), symbol);
                Ok(())
            }
        }
    }

    pub fn get(&self, symbol_id: SymbolId) -> InstrumentResult<Symbol> {
        self.symbols
            .read()
            .get(&symbol_id)
            .copied()
            .ok_or(InstrumentError::NotFound(symbol_id))
    }

    pub fn contains(&self, symbol_id: SymbolId) -> bool {
        self.symbols.read().contains_key(&symbol_id)
    }

    /// All registered symbol ids, used to rebuild empty order books for
    /// every known symbol after a `Reset`.
    pub fn symbol_ids(&self) -> Vec<SymbolId> {
        self.symbols.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears the registry, used by the `Reset` command.
    pub fn clear(&self) {
        self.symbols.write().clear();
    }

    /// Snapshot encoding: symbol count followed by each symbol's own
    /// encoding. Folded into the matching-engine snapshot file, since
    /// the catalog of known symbols and their order books are both
    /// "which symbols this shard knows about" state.
    pub fn encode(&self, out: &mut WriteBuf) {
        let symbols = self.symbols.read();
        common::codec::write_i32(out, symbols.len() as i32);
        for symbol in symbols.values() {
            symbol.encode(out);
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        let count = r.read_i32()?;
        let mut symbols = HashMap::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let symbol = Symbol::decode(r)?;
            symbols.insert(symbol.symbol_id(), symbol);
        }
        Ok(Self { symbols: RwLock::new(symbols) })
    }
}
