//! Core domain types for the symbol registry.
//!
//! A `Symbol` is identified by `symbol_id` and carries category-specific
//! fields via the enum variant: a currency-exchange pair needs only the
//! shared fields, a future contract additionally carries margin
//! coefficients, an option additionally carries series identity.

use common::codec::{Reader, WriteBuf};
use common::{Currency, Error, SymbolId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCore {
    pub symbol_id: SymbolId,
    pub base_currency: Currency,
    pub quote_currency: Currency,
    pub base_scale_k: i64,
    pub quote_scale_k: i64,
    pub taker_fee: i64,
    pub maker_fee: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    CurrencyExchangePair {
        core: SymbolCore,
    },
    FutureContract {
        core: SymbolCore,
        margin_buy: i64,
        margin_sell: i64,
    },
    Option {
        core: SymbolCore,
        underlying_symbol_id: SymbolId,
        strike_price: i64,
        expiry_ts: i64,
    },
}

impl Symbol {
    pub fn core(&self) -> &SymbolCore {
        match self {
            Symbol::CurrencyExchangePair { core }
            | Symbol::FutureContract { core, .. }
            | Symbol::Option { core, .. } => core,
        }
    }

    pub fn symbol_id(&self) -> SymbolId {
        self.core().symbol_id
    }

    /// Margin coefficients for a future contract; `None` for the other
    /// two categories, which the risk engine never margins.
    pub fn margin_coefficients(&self) -> Option<(i64, i64)> {
        match self {
            Symbol::FutureContract {
                margin_buy,
                margin_sell,
                ..
            } => Some((*margin_buy, *margin_sell)),
            _ => None,
        }
    }

    /// Snapshot encoding: a category tag followed by the shared core
    /// fields, then the category's own fields (zeroed where not
    /// applicable, mirroring `SymbolWire`'s wire layout).
    pub fn encode(&self, out: &mut WriteBuf) {
        let core = self.core();
        let tag: i8 = match self {
            Symbol::CurrencyExchangePair { .. } => 0,
            Symbol::FutureContract { .. } => 1,
            Symbol::Option { .. } => 2,
        };
        common::codec::write_i8(out, tag);
        common::codec::write_i32(out, core.symbol_id);
        common::codec::write_i32(out, core.base_currency);
        common::codec::write_i32(out, core.quote_currency);
        common::codec::write_i64(out, core.base_scale_k);
        common::codec::write_i64(out, core.quote_scale_k);
        common::codec::write_i64(out, core.taker_fee);
        common::codec::write_i64(out, core.maker_fee);
        let (margin_buy, margin_sell) = self.margin_coefficients().unwrap_or((0, 0));
        common::codec::write_i64(out, margin_buy);
        common::codec::write_i64(out, margin_sell);
        let (underlying_symbol_id, strike_price, expiry_ts) = match self {
            Symbol::Option {
                underlying_symbol_id,
                strike_price,
                expiry_ts,
                ..
            } => (*underlying_symbol_id, *strike_price, *expiry_ts),
            _ => (0, 0, 0),
        };
        common::codec::write_i32(out, underlying_symbol_id);
        common::codec::write_i64(out, strike_price);
        common::codec::write_i64(out, expiry_ts);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        let tag = r.read_i8()?;
        let core = SymbolCore {
            symbol_id: r.read_i32()?,
            base_currency: r.read_i32()?,
            quote_currency: r.read_i32()?,
            base_scale_k: r.read_i64()?,
            quote_scale_k: r.read_i64()?,
            taker_fee: r.read_i64()?,
            maker_fee: r.read_i64()?,
        };
        let margin_buy = r.read_i64()?;
        let margin_sell = r.read_i64()?;
        let underlying_symbol_id = r.read_i32()?;
        let strike_price = r.read_i64()?;
        let expiry_ts = r.read_i64()?;
        match tag {
            0 => Ok(Symbol::CurrencyExchangePair { core }),
            1 => Ok(Symbol::FutureContract { core, margin_buy, margin_sell }),
            2 => Ok(Symbol::Option { core, underlying_symbol_id, strike_price, expiry_ts }),
            other => Err(Error::codec(format!("unknown symbol category tag: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> SymbolCore {
        SymbolCore {
            symbol_id: 1,
            base_currency: 1,
            quote_currency: 2,
            base_scale_k: 1,
            quote_scale_k: 1,
            taker_fee: 10,
            maker_fee: 5,
        }
    }

    #[test]
    fn margin_coefficients_only_on_futures() {
        let pair = Symbol::CurrencyExchangePair { core: core() };
        assert_eq!(pair.margin_coefficients(), None);

        let future = Symbol::FutureContract {
            core: core(),
            margin_buy: 100,
            margin_sell: 100,
        };
        assert_eq!(future.margin_coefficients(), Some((100, 100)));
    }
}
