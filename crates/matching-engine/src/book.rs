//! The naive order book: two ordered collections of price buckets (asks
//! ascending, bids descending) plus an `order_id -> (action, price)`
//! index for O(log n) lookup during cancel/move/reduce.

use crate::bucket::PriceBucket;
use crate::domain::Order;
use crate::error::MatchingError;
use crate::event::{EventChain, MatchingEvent};
use crate::result::MatcherResult;
use common::{Action, OrderCategory, OrderId, Price, Quantity, ResultCode};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Price,
    pub total_quantity: Quantity,
    pub num_orders: usize,
}

#[derive(Debug)]
pub struct OrderBook {
    pub symbol_id: i32,
    asks: BTreeMap<Price, PriceBucket>,
    bids: BTreeMap<Reverse<Price>, PriceBucket>,
    index: HashMap<OrderId, (Action, Price)>,
}

impl OrderBook {
    pub fn new(symbol_id: i32) -> Self {
        Self {
            symbol_id,
            asks: BTreeMap::new(),
            bids: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Looks up a resting order without removing it. Used by callers
    /// that need an order's action before cancelling/reducing it (e.g.
    /// to release held margin on the correct side).
    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        let &(action, price) = self.index.get(&order_id)?;
        self.side_bucket(action, price).and_then(|b| b.find(order_id))
    }

    fn side_bucket(&self, action: Action, price: Price) -> Option<&PriceBucket> {
        match action {
            Action::Ask => self.asks.get(&price),
            Action::Bid => self.bids.get(&Reverse(price)),
        }
    }

    /// Walks the opposite side in best-price-first order, matching
    /// `taker` against resting orders while the candidate bucket's
    /// price still crosses `taker`'s limit. Stops at the first
    /// non-crossing bucket or once `taker` is fully filled.
    fn match_instantly(&mut self, taker: &mut Order) -> EventChain {
        let mut chain = EventChain::new();
        match taker.action {
            Action::Ask => {
                while taker.remained() > 0 {
                    let Some((&Reverse(best_price), _)) = self.bids.iter().next() else {
                        break;
                    };
                    if best_price < taker.price {
                        break;
                    }
                    let bucket = self.bids.get_mut(&Reverse(best_price)).expect("just peeked");
                    let result = bucket.apply_match(
                        taker.remained(),
                        taker.order_id,
                        taker.user_id,
                        taker.reserved_bid_price,
                    );
                    taker.fill(result.collected);
                    for id in &result.removed_ids {
                        self.index.remove(id);
                    }
                    chain.0.extend(result.trades);
                    if bucket.is_empty() {
                        self.bids.remove(&Reverse(best_price));
                    }
                }
            }
            Action::Bid => {
                while taker.remained() > 0 {
                    let Some((&best_price, _)) = self.asks.iter().next() else {
                        break;
                    };
                    if best_price > taker.price {
                        break;
                    }
                    let bucket = self.asks.get_mut(&best_price).expect("just peeked");
                    let result = bucket.apply_match(
                        taker.remained(),
                        taker.order_id,
                        taker.user_id,
                        taker.reserved_bid_price,
                    );
                    taker.fill(result.collected);
                    for id in &result.removed_ids {
                        self.index.remove(id);
                    }
                    chain.0.extend(result.trades);
                    if bucket.is_empty() {
                        self.asks.remove(&best_price);
                    }
                }
            }
        }
        chain
    }

    /// Walks the *entire* opposite side (no crossing bound) in
    /// priority order, summing `min(bucket.total, remaining) *
    /// bucket.price` until `to_collect` lots are accounted for or the
    /// side is exhausted. Mirrors the reference's unbounded budget scan,
    /// which is deliberately not limited by the taker's price the way
    /// the actual matching walk is.
    fn budget_to_fill(&self, to_collect: Quantity, action: Action) -> (i64, Quantity) {
        let mut collected = 0;
        let mut budget: i64 = 0;
        match action {
            Action::Ask => {
                for bucket in self.bids.values() {
                    if collected == to_collect {
                        break;
                    }
                    let take = (to_collect - collected).min(bucket.total_quantity);
                    budget += take * bucket.price;
                    collected += take;
                }
            }
            Action::Bid => {
                for bucket in self.asks.values() {
                    if collected == to_collect {
                        break;
                    }
                    let take = (to_collect - collected).min(bucket.total_quantity);
                    budget += take * bucket.price;
                    collected += take;
                }
            }
        }
        (budget, collected)
    }

    fn insert_resting(&mut self, order: Order) {
        let (action, price, order_id) = (order.action, order.price, order.order_id);
        let bucket = match action {
            Action::Ask => self.asks.entry(price).or_insert_with(|| PriceBucket::new(price)),
            Action::Bid => self
                .bids
                .entry(Reverse(price))
                .or_insert_with(|| PriceBucket::new(price)),
        };
        bucket.put(order);
        self.index.insert(order_id, (action, price));
    }

    /// Dispatches to the placement routine matching `order.category`.
    /// `Ioc`/`Foc` both resolve to the plain immediate-match-then-cancel
    /// routine; `IocBudget`/`FocBudget` both resolve to the aggregate
    /// budget check — the reference only special-cases the budget
    /// variant of each pair, not the fill-completeness distinction.
    pub fn place(&mut self, order: Order) -> MatcherResult {
        match order.category {
            OrderCategory::Gtc => self.place_gtc(order),
            OrderCategory::Ioc | OrderCategory::Foc => self.place_ioc(order),
            OrderCategory::IocBudget | OrderCategory::FocBudget => self.place_fok_budget(order),
        }
    }

    pub fn place_gtc(&mut self, mut order: Order) -> MatcherResult {
        debug_assert_eq!(order.category, OrderCategory::Gtc);
        let mut chain = self.match_instantly(&mut order);

        if order.remained() == 0 {
            return MatcherResult::success(chain);
        }

        if self.index.contains_key(&order.order_id) {
            tracing::warn!(order_id = order.order_id, "duplicate order id");
            chain.prepend(MatchingEvent::Reject {
                order_id: order.order_id,
                user_id: order.user_id,
                quantity: order.remained(),
                action: order.action,
            });
            return MatcherResult::failed_with_events(chain, ResultCode::MatchingDuplicateOrderId);
        }

        self.insert_resting(order);
        MatcherResult::success(chain)
    }

    pub fn place_ioc(&mut self, mut order: Order) -> MatcherResult {
        debug_assert!(matches!(order.category, OrderCategory::Ioc | OrderCategory::Foc));
        let mut chain = self.match_instantly(&mut order);

        if order.remained() > 0 {
            chain.prepend(MatchingEvent::Reject {
                order_id: order.order_id,
                user_id: order.user_id,
                quantity: order.remained(),
                action: order.action,
            });
        }

        MatcherResult::success(chain)
    }

    /// The asymmetric acceptance predicate is preserved exactly as
    /// implemented by the reference: `collected == remained` (full
    /// liquidity available) OR `price == budget` OR, for an Ask taker,
    /// `budget <= price` OR, for a Bid taker, `budget > price` — note
    /// this compares the aggregate budget against the taker's *unit*
    /// price, not `price * remained`; see DESIGN.md for why that
    /// asymmetric, seemingly-loose comparison is kept rather than
    /// "corrected".
    pub fn place_fok_budget(&mut self, mut order: Order) -> MatcherResult {
        let remained = order.remained();
        let (budget, collected) = self.budget_to_fill(remained, order.action);
        let accept = collected == remained
            || order.price == budget
            || (order.action == Action::Ask && budget <= order.price)
            || (order.action == Action::Bid && budget > order.price);

        if accept {
            let chain = self.match_instantly(&mut order);
            MatcherResult::success(chain)
        } else {
            let mut chain = EventChain::new();
            chain.push(MatchingEvent::Reject {
                order_id: order.order_id,
                user_id: order.user_id,
                quantity: remained,
                action: order.action,
            });
            MatcherResult::success(chain)
        }
    }

    pub fn reduce(&mut self, order_id: OrderId, q: Quantity) -> MatcherResult {
        if q <= 0 {
            return MatcherResult::failed(ResultCode::MatchingReduceFailedWrongQuantity);
        }
        let Some(&(action, price)) = self.index.get(&order_id) else {
            return MatcherResult::failed(ResultCode::MatchingUnknownOrderId);
        };

        let side = match action {
            Action::Ask => self.asks.get_mut(&price),
            Action::Bid => self.bids.get_mut(&Reverse(price)),
        };
        let bucket = side.expect("index and side must agree");
        let order = bucket.find_mut(order_id).expect("index and bucket must agree");

        let clamped = q.min(order.remained());
        let user_id = order.user_id;
        order.reduce(clamped);
        bucket.reduce_total(clamped);
        let completed = order.is_filled();

        if completed {
            bucket.remove(order_id);
            self.index.remove(&order_id);
        }
        if bucket.is_empty() {
            match action {
                Action::Ask => {
                    self.asks.remove(&price);
                }
                Action::Bid => {
                    self.bids.remove(&Reverse(price));
                }
            }
        }

        let mut chain = EventChain::new();
        chain.push(MatchingEvent::Reduce {
            order_id,
            user_id,
            quantity: clamped,
            maker_order_completed: completed,
        });
        MatcherResult::success(chain)
    }

    pub fn cancel(&mut self, order_id: OrderId) -> MatcherResult {
        let Some(&(_, _)) = self.index.get(&order_id) else {
            return MatcherResult::failed(ResultCode::MatchingUnknownOrderId);
        };
        let remained = self.order_remained(order_id).expect("just checked index");
        self.reduce(order_id, remained)
    }

    fn order_remained(&self, order_id: OrderId) -> Option<Quantity> {
        let &(action, price) = self.index.get(&order_id)?;
        let bucket = self.side_bucket(action, price)?;
        bucket.find(order_id).map(|o| o.remained())
    }

    /// Reduces the order to zero (a Reduce event) and places a fresh
    /// GTC order at `to_price` for the remaining quantity, chaining the
    /// place outcome's events after the reduce's.
    pub fn move_order(&mut self, order_id: OrderId, to_price: Price) -> Result<MatcherResult, MatchingError> {
        if to_price <= 0 {
            return Err(MatchingError::MoveFailedPriceInvalid);
        }
        let &(action, current_price) = self
            .index
            .get(&order_id)
            .ok_or(MatchingError::UnknownOrderId(order_id))?;
        if to_price == current_price {
            return Err(MatchingError::MoveFailedPriceInvalid);
        }

        let bucket = self.side_bucket(action, current_price).expect("index consistent");
        let original = bucket.find(order_id).expect("index consistent").clone();

        if action == Action::Bid && to_price > original.reserved_bid_price {
            return Err(MatchingError::MoveFailedPriceOverRiskLimit);
        }

        let reduce_result = self.reduce(order_id, original.remained());

        let mut twin = original;
        twin.price = to_price;
        twin.quantity = twin.remained();
        twin.filled = 0;

        let place_result = self.place_gtc(twin);

        let mut chain = reduce_result.events;
        chain.extend(place_result.events);
        Ok(MatcherResult {
            events: chain,
            result_code: place_result.result_code,
        })
    }

    pub fn fill_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(n)
            .map(|(&price, bucket)| PriceLevel {
                price,
                total_quantity: bucket.total_quantity,
                num_orders: bucket.num_orders(),
            })
            .collect()
    }

    pub fn fill_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .take(n)
            .map(|(&Reverse(price), bucket)| PriceLevel {
                price,
                total_quantity: bucket.total_quantity,
                num_orders: bucket.num_orders(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }

    /// Every bucket is valid and the `order_id` index exactly mirrors
    /// the union of orders resting in buckets.
    pub fn is_valid(&self) -> bool {
        let buckets_valid = self.asks.values().all(PriceBucket::is_valid) && self.bids.values().all(PriceBucket::is_valid);
        let index_count: usize = self.index.len();
        let resting_count: usize = self.asks.values().map(PriceBucket::num_orders).sum::<usize>()
            + self.bids.values().map(PriceBucket::num_orders).sum::<usize>();
        buckets_valid && index_count == resting_count
    }

    /// Snapshot encoding: symbol id, then every resting order in
    /// traversal order (asks ascending, bids descending; time priority
    /// within each price). [`Self::decode`] replays this as a flat
    /// insertion sequence, which reconstructs identical buckets because
    /// orders for a given price always arrive contiguously.
    pub fn encode(&self, out: &mut common::codec::WriteBuf) {
        common::codec::write_i32(out, self.symbol_id);
        let total: i32 = (self.asks.values().map(PriceBucket::num_orders).sum::<usize>()
            + self.bids.values().map(PriceBucket::num_orders).sum::<usize>()) as i32;
        common::codec::write_i32(out, total);
        for bucket in self.asks.values() {
            for order in bucket.iter() {
                order.encode(out);
            }
        }
        for bucket in self.bids.values() {
            for order in bucket.iter() {
                order.encode(out);
            }
        }
    }

    pub fn decode(r: &mut common::codec::Reader<'_>) -> common::Result<Self> {
        let symbol_id = r.read_i32()?;
        let count = r.read_i32()?;
        let mut book = Self::new(symbol_id);
        for _ in 0..count {
            book.insert_resting(Order::decode(r)?);
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: OrderId, action: Action, price: Price, q: Quantity, reserved: Price) -> Order {
        Order::new(id, 1, 1, action, price, q, reserved, 0, OrderCategory::Gtc)
    }

    // Scenario 1: empty book, place GTC bid.
    #[test]
    fn scenario_1_resting_bid_no_trade() {
        let mut book = OrderBook::new(1);
        let result = book.place_gtc(order(1, Action::Bid, 100, 10, 100));
        assert!(result.events.is_empty());
        let levels = book.fill_bids(10);
        assert_eq!(levels, vec![PriceLevel { price: 100, total_quantity: 10, num_orders: 1 }]);
    }

    // Scenario 2: partial IOC fill against the resting bid.
    #[test]
    fn scenario_2_partial_ioc_fill() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(1, Action::Bid, 100, 10, 100));

        let mut ask = order(2, Action::Ask, 100, 4, 0);
        ask.category = OrderCategory::Ioc;
        let result = book.place_ioc(ask);

        assert_eq!(result.events.0.len(), 1);
        match &result.events.0[0] {
            MatchingEvent::Trade {
                maker_order_id,
                quantity,
                taker_completed,
                bidder_hold_price,
                ..
            } => {
                assert_eq!(*maker_order_id, 1);
                assert_eq!(*quantity, 4);
                assert!(*taker_completed);
                assert_eq!(*bidder_hold_price, 100);
            }
            other => panic!("expected trade, got {other:?}"),
        }
        let levels = book.fill_bids(10);
        assert_eq!(levels[0].total_quantity, 6);
    }

    // Scenario 3: IOC eats the rest of the bucket and rejects the remainder.
    #[test]
    fn scenario_3_ioc_trade_then_reject() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(1, Action::Bid, 100, 10, 100));
        let mut ask1 = order(2, Action::Ask, 100, 4, 0);
        ask1.category = OrderCategory::Ioc;
        book.place_ioc(ask1);

        let mut ask2 = order(3, Action::Ask, 100, 20, 0);
        ask2.category = OrderCategory::Ioc;
        let result = book.place_ioc(ask2);

        assert_eq!(result.events.0.len(), 2);
        match &result.events.0[0] {
            MatchingEvent::Trade { quantity, maker_completed, taker_completed, .. } => {
                assert_eq!(*quantity, 6);
                assert!(*maker_completed);
                assert!(!*taker_completed);
            }
            other => panic!("expected trade, got {other:?}"),
        }
        match &result.events.0[1] {
            MatchingEvent::Reject { quantity, action, .. } => {
                assert_eq!(*quantity, 14);
                assert_eq!(*action, Action::Ask);
            }
            other => panic!("expected reject, got {other:?}"),
        }
        assert!(book.fill_bids(10).is_empty());
    }

    // Scenario 4: move an ask down, creating two buckets.
    #[test]
    fn scenario_4_move_splits_bucket() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(10, Action::Ask, 100, 5, 0));
        book.place_gtc(order(11, Action::Ask, 100, 3, 0));

        let result = book.move_order(11, 99).unwrap();
        assert_eq!(result.events.0.len(), 1);
        match &result.events.0[0] {
            MatchingEvent::Reduce { order_id, maker_order_completed, quantity, .. } => {
                assert_eq!(*order_id, 11);
                assert!(*maker_order_completed);
                assert_eq!(*quantity, 3);
            }
            other => panic!("expected reduce, got {other:?}"),
        }

        let asks = book.fill_asks(10);
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[0], PriceLevel { price: 99, total_quantity: 3, num_orders: 1 });
        assert_eq!(asks[1], PriceLevel { price: 100, total_quantity: 5, num_orders: 1 });
    }

    // Scenario 5: FOK-Budget bid against two ask buckets.
    #[test]
    fn scenario_5_fok_budget_fills_across_buckets() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(100, Action::Ask, 100, 5, 0));
        book.place_gtc(order(101, Action::Ask, 101, 5, 0));

        let mut bid = order(20, Action::Bid, 101, 8, 101);
        bid.category = OrderCategory::FocBudget;
        let result = book.place_fok_budget(bid);

        assert_eq!(result.events.0.len(), 2);
        match &result.events.0[1] {
            MatchingEvent::Trade { quantity, taker_completed, .. } => {
                assert_eq!(*quantity, 3);
                assert!(*taker_completed);
            }
            other => panic!("expected trade, got {other:?}"),
        }
        let asks = book.fill_asks(10);
        assert_eq!(asks, vec![PriceLevel { price: 101, total_quantity: 2, num_orders: 1 }]);
    }

    #[test]
    fn duplicate_order_id_is_rejected() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(1, Action::Bid, 100, 10, 100));
        let result = book.place_gtc(order(1, Action::Bid, 90, 5, 90));
        assert_eq!(result.result_code, ResultCode::MatchingDuplicateOrderId);
        assert!(matches!(result.events.0[0], MatchingEvent::Reject { .. }));
    }

    #[test]
    fn cancel_is_reduce_by_remained() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(1, Action::Bid, 100, 10, 100));
        let result = book.cancel(1);
        assert!(matches!(
            result.events.0[0],
            MatchingEvent::Reduce { quantity: 10, maker_order_completed: true, .. }
        ));
        assert!(book.is_empty());
    }

    #[test]
    fn move_rejects_price_over_reserved_bid() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(1, Action::Bid, 100, 10, 100));
        let err = book.move_order(1, 101).unwrap_err();
        assert_eq!(err, MatchingError::MoveFailedPriceOverRiskLimit);
    }

    #[test]
    fn book_is_valid_after_operations() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(1, Action::Bid, 100, 10, 100));
        book.place_gtc(order(2, Action::Ask, 100, 4, 0));
        assert!(book.is_valid());
    }

    #[test]
    fn place_dispatches_by_category() {
        let mut book = OrderBook::new(1);
        let mut bid = order(1, Action::Bid, 100, 10, 100);
        bid.category = OrderCategory::Gtc;
        book.place(bid);

        let mut ask = order(2, Action::Ask, 100, 4, 0);
        ask.category = OrderCategory::Foc;
        let result = book.place(ask);
        assert!(matches!(result.events.0[0], MatchingEvent::Trade { quantity: 4, .. }));
    }

    #[test]
    fn book_round_trips_through_codec() {
        let mut book = OrderBook::new(1);
        book.place_gtc(order(1, Action::Bid, 100, 10, 100));
        book.place_gtc(order(2, Action::Bid, 99, 5, 99));
        book.place_gtc(order(3, Action::Ask, 105, 7, 0));

        let mut out = common::codec::WriteBuf::new();
        book.encode(&mut out);
        let mut r = common::codec::Reader::new(&out);
        let decoded = OrderBook::decode(&mut r).unwrap();

        assert_eq!(decoded.fill_bids(10), book.fill_bids(10));
        assert_eq!(decoded.fill_asks(10), book.fill_asks(10));
        assert!(decoded.is_valid());
        assert!(decoded.contains(1) && decoded.contains(2) && decoded.contains(3));
    }
}
