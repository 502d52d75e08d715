//! Margin position accounting for futures contracts.
//!
//! Grounded directly on the reference's `position.Margin`: a position is
//! tracked per `(user_id, symbol_id)`, holds pending order quantities
//! separately from the open (filled) position, and accumulates realized
//! profit as the open side is reduced or flipped.

use crate::error::RiskError;
use common::{Action, Currency, Price, Quantity, SymbolId, UserId};
use serde::{Deserialize, Serialize};

/// Which way a position is currently facing. `Empty` carries no open
/// quantity; `multiplier()` is the sign applied to open quantity when
/// folding it into a signed position size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Empty,
}

impl Direction {
    pub fn multiplier(self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
            Direction::Empty => 0,
        }
    }

    pub fn from_action(action: Action) -> Direction {
        match action {
            Action::Bid => Direction::Long,
            Action::Ask => Direction::Short,
        }
    }

    pub fn from_code(code: i8) -> Option<Direction> {
        match code {
            1 => Some(Direction::Long),
            -1 => Some(Direction::Short),
            0 => Some(Direction::Empty),
            _ => None,
        }
    }

    pub fn code(self) -> i8 {
        self.multiplier() as i8
    }

    pub fn is_opposite_to(self, action: Action) -> bool {
        (self == Direction::Long && action == Action::Ask) || (self == Direction::Short && action == Action::Bid)
    }

    pub fn is_same_as(self, action: Action) -> bool {
        (self == Direction::Long && action == Action::Bid) || (self == Direction::Short && action == Action::Ask)
    }
}

/// A last-traded-price snapshot used to mark an open position to
/// market. `bid == 0` and `ask == i64::MAX` both mean "unknown" — the
/// reference's sentinel for "no liquidity observed yet", in which case
/// estimation falls back to the symbol's margin coefficient.
#[derive(Debug, Clone, Copy)]
pub struct LastPrice {
    pub bid: Price,
    pub ask: Price,
}

impl LastPrice {
    pub fn has_bid(&self) -> bool {
        self.bid != 0
    }

    pub fn has_ask(&self) -> bool {
        self.ask != i64::MAX
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginPosition {
    pub user_id: UserId,
    pub symbol_id: SymbolId,
    pub currency: Currency,
    pub open_quantity: Quantity,
    pub open_price_sum: i64,
    pub profit: i64,
    pub direction: Direction,
    pub pending_sell_quantity: Quantity,
    pub pending_buy_quantity: Quantity,
}

impl MarginPosition {
    pub fn new(user_id: UserId, symbol_id: SymbolId, currency: Currency) -> Self {
        Self {
            user_id,
            symbol_id,
            currency,
            open_quantity: 0,
            open_price_sum: 0,
            profit: 0,
            direction: Direction::Empty,
            pending_sell_quantity: 0,
            pending_buy_quantity: 0,
        }
    }

    /// No pending orders, no open exposure — safe to drop from the
    /// positions map.
    pub fn is_empty(&self) -> bool {
        self.direction == Direction::Empty && self.pending_sell_quantity == 0 && self.pending_buy_quantity == 0
    }

    pub fn pending_hold(&mut self, action: Action, quantity: Quantity) {
        match action {
            Action::Ask => self.pending_sell_quantity += quantity,
            Action::Bid => self.pending_buy_quantity += quantity,
        }
    }

    pub fn pending_release(&mut self, action: Action, quantity: Quantity) {
        match action {
            Action::Ask => self.pending_sell_quantity -= quantity,
            Action::Bid => self.pending_buy_quantity -= quantity,
        }
    }

    /// Marks the open position to `last_price`, falling back to the
    /// symbol's margin coefficient when no price is known yet.
    pub fn estimate_profit(&self, margin_buy: i64, margin_sell: i64, last_price: Option<LastPrice>) -> i64 {
        match self.direction {
            Direction::Empty => self.profit,
            Direction::Long => {
                let mut p = self.profit;
                match last_price.filter(LastPrice::has_bid) {
                    Some(lp) => p += self.open_quantity * lp.bid - self.open_price_sum,
                    None => p += margin_buy * self.open_quantity,
                }
                p
            }
            Direction::Short => {
                let mut p = self.profit;
                match last_price.filter(LastPrice::has_ask) {
                    Some(lp) => p += self.open_price_sum - self.open_quantity * lp.ask,
                    None => p += margin_sell * self.open_quantity,
                }
                p
            }
        }
    }

    fn signed_margins(&self, margin_buy: i64, margin_sell: i64) -> (i64, i64) {
        let signed_position = self.open_quantity * self.direction.multiplier();
        let buy_quantity = self.pending_buy_quantity + signed_position;
        let sell_quantity = self.pending_sell_quantity - signed_position;
        (buy_quantity * margin_buy, sell_quantity * margin_sell)
    }

    pub fn required_margin_for_futures(&self, margin_buy: i64, margin_sell: i64) -> i64 {
        let (buy, sell) = self.signed_margins(margin_buy, margin_sell);
        buy.max(sell)
    }

    /// Margin needed if an order of `quantity` lots in `action` is added
    /// on top of current pending + open exposure. Returns `-1` when the
    /// order reduces net exposure and therefore needs no extra margin.
    pub fn required_margin_for_order(&self, margin_buy: i64, margin_sell: i64, action: Action, quantity: Quantity) -> i64 {
        let (mut buy, mut sell) = self.signed_margins(margin_buy, margin_sell);
        let current = buy.max(sell);

        match action {
            Action::Bid => buy += margin_buy * quantity,
            Action::Ask => sell += margin_sell * quantity,
        }
        let new_margin = buy.max(sell);

        if new_margin <= current {
            -1
        } else {
            new_margin
        }
    }

    /// Applies a confirmed trade: un-holds the pending quantity, closes
    /// (or flips) any opposing open position, then opens the remainder.
    /// Returns the quantity that ended up opened.
    pub fn update_for_margin_trade(&mut self, action: Action, quantity: Quantity, price: Price) -> Result<Quantity, RiskError> {
        self.pending_release(action, quantity);
        let quantity_to_open = self.close_current_position(action, quantity, price)?;
        if quantity_to_open > 0 {
            self.open_position(action, quantity_to_open, price);
        }
        Ok(quantity_to_open)
    }

    fn close_current_position(&mut self, action: Action, trade_quantity: Quantity, price: Price) -> Result<Quantity, RiskError> {
        if self.direction == Direction::Empty || self.direction == Direction::from_action(action) {
            return Ok(trade_quantity);
        }

        if self.open_quantity > trade_quantity {
            self.open_quantity -= trade_quantity;
            self.open_price_sum -= trade_quantity * price;
            return Ok(0);
        }

        self.profit += (self.open_quantity * price - self.open_price_sum) * self.direction.multiplier();
        self.open_price_sum = 0;
        self.direction = Direction::Empty;
        let quantity_to_open = trade_quantity - self.open_quantity;
        self.open_quantity = 0;

        self.validate()?;
        Ok(quantity_to_open)
    }

    fn open_position(&mut self, action: Action, quantity_to_open: Quantity, price: Price) {
        self.open_quantity += quantity_to_open;
        self.open_price_sum += quantity_to_open * price;
        self.direction = Direction::from_action(action);
    }

    pub fn reset(&mut self) {
        self.pending_buy_quantity = 0;
        self.pending_sell_quantity = 0;
        self.open_quantity = 0;
        self.open_price_sum = 0;
        self.direction = Direction::Empty;
    }

    /// `direction == Empty` iff both `open_quantity` and
    /// `open_price_sum` are zero; pending quantities never go negative.
    pub fn validate(&self) -> Result<(), RiskError> {
        let fail = |detail: &str| RiskError::InvariantViolation {
            user_id: self.user_id,
            symbol_id: self.symbol_id,
            detail: detail.to_string(),
        };

        if self.direction == Direction::Empty && (self.open_quantity != 0 || self.open_price_sum != 0) {
            return Err(fail("empty direction with non-zero open quantity/price sum"));
        }
        if self.pending_sell_quantity < 0 || self.pending_buy_quantity < 0 {
            return Err(fail("negative pending quantity"));
        }
        Ok(())
    }

    /// Field order matches the reference's `Margin.Marshal`.
    pub fn encode(&self, out: &mut common::codec::WriteBuf) {
        common::codec::write_i64(out, self.user_id);
        common::codec::write_i32(out, self.symbol_id);
        common::codec::write_i32(out, self.currency);
        common::codec::write_i8(out, self.direction.code());
        common::codec::write_i64(out, self.open_quantity);
        common::codec::write_i64(out, self.open_price_sum);
        common::codec::write_i64(out, self.profit);
        common::codec::write_i64(out, self.pending_sell_quantity);
        common::codec::write_i64(out, self.pending_buy_quantity);
    }

    pub fn decode(r: &mut common::codec::Reader<'_>) -> common::Result<Self> {
        let user_id = r.read_i64()?;
        let symbol_id = r.read_i32()?;
        let currency = r.read_i32()?;
        let direction_code = r.read_i8()?;
        let direction = Direction::from_code(direction_code)
            .ok_or_else(|| common::Error::codec(format!("unknown direction code {direction_code}")))?;
        let open_quantity = r.read_i64()?;
        let open_price_sum = r.read_i64()?;
        let profit = r.read_i64()?;
        let pending_sell_quantity = r.read_i64()?;
        let pending_buy_quantity = r.read_i64()?;

        Ok(Self {
            user_id,
            symbol_id,
            currency,
            open_quantity,
            open_price_sum,
            profit,
            direction,
            pending_sell_quantity,
            pending_buy_quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_a_long_position_tracks_vwap() {
        let mut pos = MarginPosition::new(1, 10, 1);
        pos.pending_hold(Action::Bid, 5);
        let opened = pos.update_for_margin_trade(Action::Bid, 5, 100).unwrap();
        assert_eq!(opened, 5);
        assert_eq!(pos.direction, Direction::Long);
        assert_eq!(pos.open_quantity, 5);
        assert_eq!(pos.open_price_sum, 500);
    }

    #[test]
    fn reducing_long_position_keeps_profit_unrealized() {
        let mut pos = MarginPosition::new(1, 10, 1);
        pos.update_for_margin_trade(Action::Bid, 10, 100).unwrap();
        pos.update_for_margin_trade(Action::Ask, 4, 110).unwrap();

        assert_eq!(pos.direction, Direction::Long);
        assert_eq!(pos.open_quantity, 6);
        assert_eq!(pos.open_price_sum, 600);
        assert_eq!(pos.profit, 0);
    }

    #[test]
    fn fully_closing_long_position_realizes_profit() {
        let mut pos = MarginPosition::new(1, 10, 1);
        pos.update_for_margin_trade(Action::Bid, 10, 100).unwrap();
        let opened = pos.update_for_margin_trade(Action::Ask, 10, 110).unwrap();

        assert_eq!(opened, 0);
        assert_eq!(pos.direction, Direction::Empty);
        assert_eq!(pos.profit, 100);
    }

    #[test]
    fn closing_and_flipping_opens_opposite_direction() {
        let mut pos = MarginPosition::new(1, 10, 1);
        pos.update_for_margin_trade(Action::Bid, 5, 100).unwrap();
        let opened = pos.update_for_margin_trade(Action::Ask, 8, 110).unwrap();

        assert_eq!(opened, 3);
        assert_eq!(pos.direction, Direction::Short);
        assert_eq!(pos.open_quantity, 3);
        assert_eq!(pos.profit, 50);
    }

    #[test]
    fn required_margin_for_order_is_negative_one_when_reducing_exposure() {
        let mut pos = MarginPosition::new(1, 10, 1);
        pos.update_for_margin_trade(Action::Bid, 10, 100).unwrap();
        let required = pos.required_margin_for_order(5, 5, Action::Ask, 4);
        assert_eq!(required, -1);
    }

    #[test]
    fn margin_round_trips_through_wire() {
        let mut pos = MarginPosition::new(7, 3, 1);
        pos.update_for_margin_trade(Action::Bid, 5, 100).unwrap();
        pos.pending_hold(Action::Ask, 2);

        let mut out = Vec::new();
        pos.encode(&mut out);
        let mut reader = common::codec::Reader::new(&out);
        let decoded = MarginPosition::decode(&mut reader).unwrap();
        assert_eq!(decoded, pos);
    }
}
