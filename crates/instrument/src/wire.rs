//! Conversion between the wire representation of a symbol (carried by
//! the `AddSymbols` command) and the registry's richer [`Symbol`] type.

use crate::types::{Symbol, SymbolCore};
use common::{SymbolCategoryWire, SymbolWire};

impl From<&Symbol> for SymbolWire {
    fn from(symbol: &Symbol) -> Self {
        let core = symbol.core();
        let (category, margin_buy, margin_sell) = match symbol {
            Symbol::CurrencyExchangePair { .. } => (SymbolCategoryWire::CurrencyExchangePair, 0, 0),
            Symbol::FutureContract {
                margin_buy,
                margin_sell,
                ..
            } => (SymbolCategoryWire::FutureContract, *margin_buy, *margin_sell),
            Symbol::Option { .. } => (SymbolCategoryWire::Option, 0, 0),
        };
        let (underlying_symbol_id, strike_price, expiry_ts) = match symbol {
            Symbol::Option {
                underlying_symbol_id,
                strike_price,
                expiry_ts,
                ..
            } => (*underlying_symbol_id, *strike_price, *expiry_ts),
            _ => (0, 0, 0),
        };
        SymbolWire {
            symbol_id: core.symbol_id,
            category,
            base_currency: core.base_currency,
            quote_currency: core.quote_currency,
            base_scale_k: core.base_scale_k,
            quote_scale_k: core.quote_scale_k,
            taker_fee: core.taker_fee,
            maker_fee: core.maker_fee,
            margin_buy,
            margin_sell,
            underlying_symbol_id,
            strike_price,
            expiry_ts,
        }
    }
}

impl From<SymbolWire> for Symbol {
    fn from(wire: SymbolWire) -> Self {
        let core = SymbolCore {
            symbol_id: wire.symbol_id,
            base_currency: wire.base_currency,
            quote_currency: wire.quote_currency,
            base_scale_k: wire.base_scale_k,
            quote_scale_k: wire.quote_scale_k,
            taker_fee: wire.taker_fee,
            maker_fee: wire.maker_fee,
        };
        match wire.category {
            SymbolCategoryWire::CurrencyExchangePair => Symbol::CurrencyExchangePair { core },
            SymbolCategoryWire::FutureContract => Symbol::FutureContract {
                core,
                margin_buy: wire.margin_buy,
                margin_sell: wire.margin_sell,
            },
            SymbolCategoryWire::Option => Symbol::Option {
                core,
                underlying_symbol_id: wire.underlying_symbol_id,
                strike_price: wire.strike_price,
                expiry_ts: wire.expiry_ts,
            },
        }
    }
}
