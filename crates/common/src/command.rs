//! The tagged command envelope: every mutating or querying operation the
//! core accepts is one variant of [`Command`], prefixed on the wire by an
//! `i8` code and a [`Metadata`] frame.

use crate::codec::{read_map, write_map, Reader, WriteBuf};
use crate::error::{Error, Result};
use crate::types::{Action, BalanceAdjustmentType, Currency, OrderCategory, OrderId, Price, Quantity, SymbolId, UserId};

pub mod code {
    pub const PLACE: i8 = 1;
    pub const CANCEL: i8 = 2;
    pub const MOVE: i8 = 3;
    pub const REDUCE: i8 = 4;
    pub const ORDER_BOOK_REQUEST: i8 = 6;

    pub const ADD_USER: i8 = 10;
    pub const BALANCE_ADJ: i8 = 11;
    pub const SUSPEND_USER: i8 = 12;
    pub const RESUME_USER: i8 = 13;
    pub const ADD_ACCOUNTS: i8 = 14;

    pub const ADD_SYMBOLS: i8 = 40;

    pub const PERSIST_STATE_MATCHING: i8 = 110;
    pub const PERSIST_STATE_RISK: i8 = 111;

    pub const GROUPING_CONTROL: i8 = 118;
    pub const NOP: i8 = 120;
    pub const RESET: i8 = 124;
    pub const SHUTDOWN_SIGNAL: i8 = 127;

    pub const RESERVED_COMPRESSED: i8 = -1;
}

/// Sequencing and tracing fields every command carries, assigned by the
/// upstream dispatcher before the command reaches a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub seq: i64,
    pub timestamp_ns: i64,
    pub service_flags: i32,
    pub events_group: i64,
}

impl Metadata {
    pub fn encode(&self, out: &mut WriteBuf) {
        crate::codec::write_i64(out, self.seq);
        crate::codec::write_i64(out, self.timestamp_ns);
        crate::codec::write_i32(out, self.service_flags);
        crate::codec::write_i64(out, self.events_group);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            seq: r.read_i64()?,
            timestamp_ns: r.read_i64()?,
            service_flags: r.read_i32()?,
            events_group: r.read_i64()?,
        })
    }
}

/// On-wire representation of a symbol definition, as carried by
/// `AddSymbols`. The `instrument` crate owns the richer in-memory
/// `Symbol` type and converts to/from this shape at the registry
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolWire {
    pub symbol_id: SymbolId,
    pub category: SymbolCategoryWire,
    pub base_currency: Currency,
    pub quote_currency: Currency,
    pub base_scale_k: i64,
    pub quote_scale_k: i64,
    pub taker_fee: i64,
    pub maker_fee: i64,
    /// Only meaningful for `FutureContract`.
    pub margin_buy: i64,
    pub margin_sell: i64,
    /// Only meaningful for `Option`.
    pub underlying_symbol_id: SymbolId,
    pub strike_price: i64,
    pub expiry_ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolCategoryWire {
    CurrencyExchangePair = 0,
    FutureContract = 1,
    Option = 2,
}

impl SymbolCategoryWire {
    fn from_i8(v: i8) -> Result<Self> {
        match v {
            0 => Ok(SymbolCategoryWire::CurrencyExchangePair),
            1 => Ok(SymbolCategoryWire::FutureContract),
            2 => Ok(SymbolCategoryWire::Option),
            other => Err(Error::codec(format!("unknown symbol category: {other}"))),
        }
    }
}

impl SymbolWire {
    fn encode(&self, out: &mut WriteBuf) {
        crate::codec::write_i32(out, self.symbol_id);
        crate::codec::write_i8(out, self.category as i8);
        crate::codec::write_i32(out, self.base_currency);
        crate::codec::write_i32(out, self.quote_currency);
        crate::codec::write_i64(out, self.base_scale_k);
        crate::codec::write_i64(out, self.quote_scale_k);
        crate::codec::write_i64(out, self.taker_fee);
        crate::codec::write_i64(out, self.maker_fee);
        crate::codec::write_i64(out, self.margin_buy);
        crate::codec::write_i64(out, self.margin_sell);
        crate::codec::write_i32(out, self.underlying_symbol_id);
        crate::codec::write_i64(out, self.strike_price);
        crate::codec::write_i64(out, self.expiry_ts);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let symbol_id = r.read_i32()?;
        let category = SymbolCategoryWire::from_i8(r.read_i8()?)?;
        let base_currency = r.read_i32()?;
        let quote_currency = r.read_i32()?;
        let base_scale_k = r.read_i64()?;
        let quote_scale_k = r.read_i64()?;
        let taker_fee = r.read_i64()?;
        let maker_fee = r.read_i64()?;
        let margin_buy = r.read_i64()?;
        let margin_sell = r.read_i64()?;
        let underlying_symbol_id = r.read_i32()?;
        let strike_price = r.read_i64()?;
        let expiry_ts = r.read_i64()?;
        Ok(Self {
            symbol_id,
            category,
            base_currency,
            quote_currency,
            base_scale_k,
            quote_scale_k,
            taker_fee,
            maker_fee,
            margin_buy,
            margin_sell,
            underlying_symbol_id,
            strike_price,
            expiry_ts,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Place {
        metadata: Metadata,
        user_id: UserId,
        symbol_id: SymbolId,
        order_id: OrderId,
        price: Price,
        reserved_bid_price: Price,
        quantity: Quantity,
        user_cookie: i64,
        action: Action,
        category: OrderCategory,
    },
    Cancel {
        metadata: Metadata,
        user_id: UserId,
        symbol_id: SymbolId,
        order_id: OrderId,
    },
    Move {
        metadata: Metadata,
        user_id: UserId,
        symbol_id: SymbolId,
        order_id: OrderId,
        to_price: Price,
    },
    Reduce {
        metadata: Metadata,
        user_id: UserId,
        symbol_id: SymbolId,
        order_id: OrderId,
        quantity: Quantity,
    },
    OrderBookRequest {
        metadata: Metadata,
        symbol_id: SymbolId,
        depth: i32,
    },
    AddUser {
        metadata: Metadata,
        user_id: UserId,
    },
    BalanceAdj {
        metadata: Metadata,
        user_id: UserId,
        currency: Currency,
        txid: i64,
        amount: i64,
        kind: BalanceAdjustmentType,
    },
    SuspendUser {
        metadata: Metadata,
        user_id: UserId,
    },
    ResumeUser {
        metadata: Metadata,
        user_id: UserId,
    },
    AddAccounts {
        metadata: Metadata,
        users: Vec<(UserId, Vec<(Currency, i64)>)>,
    },
    AddSymbols {
        metadata: Metadata,
        symbols: Vec<(SymbolId, SymbolWire)>,
    },
    PersistStateMatching {
        metadata: Metadata,
    },
    PersistStateRisk {
        metadata: Metadata,
    },
    GroupingControl {
        metadata: Metadata,
    },
    Nop {
        metadata: Metadata,
    },
    Reset {
        metadata: Metadata,
    },
    ShutdownSignal {
        metadata: Metadata,
    },
}

impl Command {
    pub fn metadata(&self) -> &Metadata {
        match self {
            Command::Place { metadata, .. }
            | Command::Cancel { metadata, .. }
            | Command::Move { metadata, .. }
            | Command::Reduce { metadata, .. }
            | Command::OrderBookRequest { metadata, .. }
            | Command::AddUser { metadata, .. }
            | Command::BalanceAdj { metadata, .. }
            | Command::SuspendUser { metadata, .. }
            | Command::ResumeUser { metadata, .. }
            | Command::AddAccounts { metadata, .. }
            | Command::AddSymbols { metadata, .. }
            | Command::PersistStateMatching { metadata }
            | Command::PersistStateRisk { metadata }
            | Command::GroupingControl { metadata }
            | Command::Nop { metadata }
            | Command::Reset { metadata }
            | Command::ShutdownSignal { metadata } => metadata,
        }
    }

    pub fn code(&self) -> i8 {
        match self {
            Command::Place { .. } => code::PLACE,
            Command::Cancel { .. } => code::CANCEL,
            Command::Move { .. } => code::MOVE,
            Command::Reduce { .. } => code::REDUCE,
            Command::OrderBookRequest { .. } => code::ORDER_BOOK_REQUEST,
            Command::AddUser { .. } => code::ADD_USER,
            Command::BalanceAdj { .. } => code::BALANCE_ADJ,
            Command::SuspendUser { .. } => code::SUSPEND_USER,
            Command::ResumeUser { .. } => code::RESUME_USER,
            Command::AddAccounts { .. } => code::ADD_ACCOUNTS,
            Command::AddSymbols { .. } => code::ADD_SYMBOLS,
            Command::PersistStateMatching { .. } => code::PERSIST_STATE_MATCHING,
            Command::PersistStateRisk { .. } => code::PERSIST_STATE_RISK,
            Command::GroupingControl { .. } => code::GROUPING_CONTROL,
            Command::Nop { .. } => code::NOP,
            Command::Reset { .. } => code::RESET,
            Command::ShutdownSignal { .. } => code::SHUTDOWN_SIGNAL,
        }
    }

    /// Whether this command, if accepted, mutates shard state and
    /// therefore must be journaled.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::OrderBookRequest { .. }
                | Command::GroupingControl { .. }
                | Command::Nop { .. }
                | Command::ShutdownSignal { .. }
        )
    }

    pub fn encode(&self) -> WriteBuf {
        let mut out = WriteBuf::new();
        crate::codec::write_i8(&mut out, self.code());
        self.metadata().encode(&mut out);
        match self {
            Command::Place {
                user_id,
                symbol_id,
                order_id,
                price,
                reserved_bid_price,
                quantity,
                user_cookie,
                action,
                category,
                ..
            } => {
                crate::codec::write_i64(&mut out, *user_id);
                crate::codec::write_i32(&mut out, *symbol_id);
                crate::codec::write_i64(&mut out, *order_id);
                crate::codec::write_i64(&mut out, *price);
                crate::codec::write_i64(&mut out, *reserved_bid_price);
                crate::codec::write_i64(&mut out, *quantity);
                crate::codec::write_i64(&mut out, *user_cookie);
                crate::codec::write_i8(
                    &mut out,
                    crate::types::pack_action_category(*action, *category),
                );
            }
            Command::Cancel {
                user_id,
                symbol_id,
                order_id,
                ..
            } => {
                crate::codec::write_i64(&mut out, *user_id);
                crate::codec::write_i32(&mut out, *symbol_id);
                crate::codec::write_i64(&mut out, *order_id);
            }
            Command::Move {
                user_id,
                symbol_id,
                order_id,
                to_price,
                ..
            } => {
                crate::codec::write_i64(&mut out, *user_id);
                crate::codec::write_i32(&mut out, *symbol_id);
                crate::codec::write_i64(&mut out, *order_id);
                crate::codec::write_i64(&mut out, *to_price);
            }
            Command::Reduce {
                user_id,
                symbol_id,
                order_id,
                quantity,
                ..
            } => {
                crate::codec::write_i64(&mut out, *user_id);
                crate::codec::write_i32(&mut out, *symbol_id);
                crate::codec::write_i64(&mut out, *order_id);
                crate::codec::write_i64(&mut out, *quantity);
            }
            Command::OrderBookRequest {
                symbol_id, depth, ..
            } => {
                crate::codec::write_i32(&mut out, *symbol_id);
                crate::codec::write_i32(&mut out, *depth);
            }
            Command::AddUser { user_id, .. } => {
                crate::codec::write_i64(&mut out, *user_id);
            }
            Command::BalanceAdj {
                user_id,
                currency,
                txid,
                amount,
                kind,
                ..
            } => {
                crate::codec::write_i64(&mut out, *user_id);
                crate::codec::write_i32(&mut out, *currency);
                crate::codec::write_i64(&mut out, *txid);
                crate::codec::write_i64(&mut out, *amount);
                crate::codec::write_i8(&mut out, *kind as i8);
            }
            Command::SuspendUser { user_id, .. } => {
                crate::codec::write_i64(&mut out, *user_id);
            }
            Command::ResumeUser { user_id, .. } => {
                crate::codec::write_i64(&mut out, *user_id);
            }
            Command::AddAccounts { users, .. } => {
                write_map(
                    &mut out,
                    users.iter().map(|(u, balances)| (*u, balances)),
                    |out, k| crate::codec::write_i64(out, k),
                    |out, balances| {
                        write_map(
                            out,
                            balances.iter().map(|(c, b)| (*c, *b)),
                            |out, k| crate::codec::write_i32(out, k),
                            |out, v| crate::codec::write_i64(out, v),
                        )
                    },
                );
            }
            Command::AddSymbols { symbols, .. } => {
                write_map(
                    &mut out,
                    symbols.iter().map(|(id, s)| (*id, s)),
                    |out, k| crate::codec::write_i32(out, k),
                    |out, s| s.encode(out),
                );
            }
            Command::PersistStateMatching { .. }
            | Command::PersistStateRisk { .. }
            | Command::GroupingControl { .. }
            | Command::Nop { .. }
            | Command::Reset { .. }
            | Command::ShutdownSignal { .. } => {}
        }
        out
    }

    pub fn decode(code: i8, r: &mut Reader<'_>) -> Result<Self> {
        let metadata = Metadata::decode(r)?;
        match code {
            code::PLACE => {
                let user_id = r.read_i64()?;
                let symbol_id = r.read_i32()?;
                let order_id = r.read_i64()?;
                let price = r.read_i64()?;
                let reserved_bid_price = r.read_i64()?;
                let quantity = r.read_i64()?;
                let user_cookie = r.read_i64()?;
                let packed = r.read_i8()?;
                let (action, category) = crate::types::unpack_action_category(packed)
                    .ok_or_else(|| Error::codec(format!("bad action/category byte: {packed}")))?;
                Ok(Command::Place {
                    metadata,
                    user_id,
                    symbol_id,
                    order_id,
                    price,
                    reserved_bid_price,
                    quantity,
                    user_cookie,
                    action,
                    category,
                })
            }
            code::CANCEL => Ok(Command::Cancel {
                metadata,
                user_id: r.read_i64()?,
                symbol_id: r.read_i32()?,
                order_id: r.read_i64()?,
            }),
            code::MOVE => Ok(Command::Move {
                metadata,
                user_id: r.read_i64()?,
                symbol_id: r.read_i32()?,
                order_id: r.read_i64()?,
                to_price: r.read_i64()?,
            }),
            code::REDUCE => Ok(Command::Reduce {
                metadata,
                user_id: r.read_i64()?,
                symbol_id: r.read_i32()?,
                order_id: r.read_i64()?,
                quantity: r.read_i64()?,
            }),
            code::ORDER_BOOK_REQUEST => Ok(Command::OrderBookRequest {
                metadata,
                symbol_id: r.read_i32()?,
                depth: r.read_i32()?,
            }),
            code::ADD_USER => Ok(Command::AddUser {
                metadata,
                user_id: r.read_i64()?,
            }),
            code::BALANCE_ADJ => {
                let user_id = r.read_i64()?;
                let currency = r.read_i32()?;
                let txid = r.read_i64()?;
                let amount = r.read_i64()?;
                let kind_byte = r.read_i8()?;
                let kind = BalanceAdjustmentType::from_i8(kind_byte)
                    .ok_or_else(|| Error::codec(format!("bad balance adj type: {kind_byte}")))?;
                Ok(Command::BalanceAdj {
                    metadata,
                    user_id,
                    currency,
                    txid,
                    amount,
                    kind,
                })
            }
            code::SUSPEND_USER => Ok(Command::SuspendUser {
                metadata,
                user_id: r.read_i64()?,
            }),
            code::RESUME_USER => Ok(Command::ResumeUser {
                metadata,
                user_id: r.read_i64()?,
            }),
            code::ADD_ACCOUNTS => {
                let decoded = read_map(
                    r,
                    |r| r.read_i64(),
                    |r| {
                        read_map(
                            r,
                            |r| r.read_i32(),
                            |r| r.read_i64(),
                        )
                    },
                )?;
                Ok(Command::AddAccounts {
                    metadata,
                    users: decoded,
                })
            }
            code::ADD_SYMBOLS => {
                let decoded = read_map(r, |r| r.read_i32(), SymbolWire::decode)?;
                Ok(Command::AddSymbols {
                    metadata,
                    symbols: decoded,
                })
            }
            code::PERSIST_STATE_MATCHING => Ok(Command::PersistStateMatching { metadata }),
            code::PERSIST_STATE_RISK => Ok(Command::PersistStateRisk { metadata }),
            code::GROUPING_CONTROL => Ok(Command::GroupingControl { metadata }),
            code::NOP => Ok(Command::Nop { metadata }),
            code::RESET => Ok(Command::Reset { metadata }),
            code::SHUTDOWN_SIGNAL => Ok(Command::ShutdownSignal { metadata }),
            other => Err(Error::codec(format!("unknown command code: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(seq: i64) -> Metadata {
        Metadata {
            seq,
            timestamp_ns: 42,
            service_flags: 0,
            events_group: 0,
        }
    }

    #[test]
    fn place_round_trips() {
        let cmd = Command::Place {
            metadata: md(1),
            user_id: 7,
            symbol_id: 1,
            order_id: 100,
            price: 100,
            reserved_bid_price: 100,
            quantity: 10,
            user_cookie: 0,
            action: Action::Bid,
            category: OrderCategory::Gtc,
        };
        let bytes = cmd.encode();
        let mut r = Reader::new(&bytes[1..]);
        let decoded = Command::decode(bytes[0] as i8, &mut r).unwrap();
        assert_eq!(decoded, cmd);
        assert!(r.is_empty());
    }

    #[test]
    fn balance_adj_field_order_matches_reference() {
        let cmd = Command::BalanceAdj {
            metadata: md(2),
            user_id: 1,
            currency: 2,
            txid: 3,
            amount: 4,
            kind: BalanceAdjustmentType::Withdrawal,
        };
        let bytes = cmd.encode();
        let mut r = Reader::new(&bytes[1..]);
        let decoded = Command::decode(bytes[0] as i8, &mut r).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn add_symbols_round_trips() {
        let wire = SymbolWire {
            symbol_id: 1,
            category: SymbolCategoryWire::FutureContract,
            base_currency: 1,
            quote_currency: 2,
            base_scale_k: 1,
            quote_scale_k: 1,
            taker_fee: 10,
            maker_fee: 5,
            margin_buy: 100,
            margin_sell: 100,
            underlying_symbol_id: 0,
            strike_price: 0,
            expiry_ts: 0,
        };
        let cmd = Command::AddSymbols {
            metadata: md(3),
            symbols: vec![(1, wire)],
        };
        let bytes = cmd.encode();
        let mut r = Reader::new(&bytes[1..]);
        let decoded = Command::decode(bytes[0] as i8, &mut r).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn unknown_code_is_codec_error() {
        let mut buf = WriteBuf::new();
        md(1).encode(&mut buf);
        let mut r = Reader::new(&buf);
        assert!(Command::decode(99, &mut r).is_err());
    }
}
