//! Domain types for the Matching Engine
//!
//! This module defines the order representation shared by the bucket
//! and order-book layers.

use common::codec::{Reader, WriteBuf};
use common::{Action, OrderCategory, OrderId, Price, Quantity, Timestamp, UserId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Order
// ============================================================================

/// A resting or incoming order. `quantity` only ever decreases (via
/// Reduce) and `filled` only ever increases (via matching); both are
/// monotone and `filled <= quantity` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol_id: i32,
    pub action: Action,
    pub price: Price,
    pub quantity: Quantity,
    pub filled: Quantity,
    pub reserved_bid_price: Price,
    pub timestamp_ns: Timestamp,
    pub category: OrderCategory,
}

impl Order {
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        symbol_id: i32,
        action: Action,
        price: Price,
        quantity: Quantity,
        reserved_bid_price: Price,
        timestamp_ns: Timestamp,
        category: OrderCategory,
    ) -> Self {
        Self {
            order_id,
            user_id,
            symbol_id,
            action,
            price,
            quantity,
            filled: 0,
            reserved_bid_price,
            timestamp_ns,
            category,
        }
    }

    pub fn remained(&self) -> Quantity {
        self.quantity - self.filled
    }

    /// Records a fill of `q` lots. `q` must not exceed `remained()` —
    /// callers (the bucket's match loop) always clamp to it first, so a
    /// violation here is a programming error, not a command failure.
    pub fn fill(&mut self, q: Quantity) {
        debug_assert!(q > 0 && q <= self.remained(), "fill exceeds remained quantity");
        self.filled += q;
    }

    /// Reduces `quantity` (not `remained`) by `q`, clamped by the
    /// caller to `remained()` beforehand. Used by Reduce/Cancel/Move.
    pub fn reduce(&mut self, q: Quantity) {
        debug_assert!(q > 0 && q <= self.remained(), "reduce exceeds remained quantity");
        self.quantity -= q;
    }

    pub fn is_filled(&self) -> bool {
        self.remained() == 0
    }

    /// Snapshot encoding, read back by [`crate::book::OrderBook::decode`]
    /// in the same order orders were written.
    pub fn encode(&self, out: &mut WriteBuf) {
        common::codec::write_i64(out, self.order_id);
        common::codec::write_i64(out, self.user_id);
        common::codec::write_i32(out, self.symbol_id);
        common::codec::write_i8(out, if self.action == Action::Bid { 1 } else { 0 });
        common::codec::write_i64(out, self.price);
        common::codec::write_i64(out, self.quantity);
        common::codec::write_i64(out, self.filled);
        common::codec::write_i64(out, self.reserved_bid_price);
        common::codec::write_i64(out, self.timestamp_ns);
        common::codec::write_i8(out, self.category as i8);
    }

    pub fn decode(r: &mut Reader<'_>) -> common::Result<Self> {
        let order_id = r.read_i64()?;
        let user_id = r.read_i64()?;
        let symbol_id = r.read_i32()?;
        let action = if r.read_i8()? == 1 { Action::Bid } else { Action::Ask };
        let price = r.read_i64()?;
        let quantity = r.read_i64()?;
        let filled = r.read_i64()?;
        let reserved_bid_price = r.read_i64()?;
        let timestamp_ns = r.read_i64()?;
        let category_code = r.read_i8()?;
        let category = OrderCategory::from_bits(category_code as i32)
            .ok_or_else(|| common::Error::codec(format!("unknown order category: {category_code}")))?;
        Ok(Self {
            order_id,
            user_id,
            symbol_id,
            action,
            price,
            quantity,
            filled,
            reserved_bid_price,
            timestamp_ns,
            category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(quantity: Quantity) -> Order {
        Order::new(1, 1, 1, Action::Bid, 100, quantity, 100, 0, OrderCategory::Gtc)
    }

    #[test]
    fn remained_tracks_fill() {
        let mut o = order(10);
        assert_eq!(o.remained(), 10);
        o.fill(4);
        assert_eq!(o.remained(), 6);
        assert_eq!(o.filled, 4);
    }

    #[test]
    fn reduce_shrinks_quantity_not_filled() {
        let mut o = order(10);
        o.fill(4);
        o.reduce(6);
        assert_eq!(o.quantity, 4);
        assert_eq!(o.filled, 4);
        assert!(o.is_filled());
    }

    #[test]
    fn order_round_trips_through_codec() {
        let mut o = order(10);
        o.fill(3);
        let mut out = WriteBuf::new();
        o.encode(&mut out);
        let mut r = Reader::new(&out);
        assert_eq!(Order::decode(&mut r).unwrap(), o);
    }
}
