//! A price bucket: one price level holding an ordered sequence of
//! resting orders in time priority (earliest insertion first).

use crate::domain::Order;
use crate::event::MatchingEvent;
use common::{Action, OrderId, Price, Quantity};
use std::collections::VecDeque;

/// Result of walking a bucket's orders to satisfy `to_collect` lots of
/// demand from the opposite side.
#[derive(Debug, Default)]
pub struct BucketMatchResult {
    pub trades: Vec<MatchingEvent>,
    pub collected: Quantity,
    pub removed_ids: Vec<OrderId>,
}

#[derive(Debug, Clone)]
pub struct PriceBucket {
    pub price: Price,
    pub total_quantity: Quantity,
    orders: VecDeque<Order>,
}

impl PriceBucket {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            total_quantity: 0,
            orders: VecDeque::new(),
        }
    }

    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Appends `order` to the back of the queue. `order.price` must
    /// equal `self.price`; this is checked by the order book before
    /// dispatch, not re-validated here.
    pub fn put(&mut self, order: Order) {
        debug_assert_eq!(order.price, self.price, "order placed in wrong bucket");
        self.total_quantity += order.remained();
        self.orders.push_back(order);
    }

    /// Removes the order with `order_id`, if present, returning it.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let idx = self.orders.iter().position(|o| o.order_id == order_id)?;
        let order = self.orders.remove(idx)?;
        self.total_quantity -= order.remained();
        Some(order)
    }

    /// Finds an order by id without removing it.
    pub fn find(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn find_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.order_id == order_id)
    }

    /// Resting orders in time priority, front (oldest) first. Used by
    /// snapshot serialization to write orders in replay order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Decrements `total_quantity` by `q` without touching any order —
    /// used when a contained order's own `reduce` already shrank its
    /// quantity and the bucket total needs to follow.
    pub fn reduce_total(&mut self, q: Quantity) {
        self.total_quantity -= q;
    }

    /// Consumes orders front-to-back, taking `min(order.remained(),
    /// remaining demand)` from each, until `to_collect` is satisfied or
    /// the bucket empties. Orders that become fully filled are removed
    /// and their ids recorded.
    ///
    /// `reserved_bid_price` is the *taker's* reservation, used for the
    /// `bidder_hold_price` on trades where the resting (maker) order is
    /// an Ask — see §4.1.
    pub fn apply_match(
        &mut self,
        to_collect: Quantity,
        taker_order_id: OrderId,
        taker_user_id: i64,
        taker_reserved_bid_price: Price,
    ) -> BucketMatchResult {
        let mut result = BucketMatchResult::default();
        let mut remaining_demand = to_collect;

        while remaining_demand > 0 {
            let Some(maker) = self.orders.front_mut() else {
                break;
            };
            let take = remaining_demand.min(maker.remained());
            maker.fill(take);
            self.total_quantity -= take;
            remaining_demand -= take;
            result.collected += take;

            let maker_completed = maker.is_filled();
            let bidder_hold_price = match maker.action {
                Action::Ask => taker_reserved_bid_price,
                Action::Bid => maker.reserved_bid_price,
            };
            result.trades.push(MatchingEvent::Trade {
                maker_order_id: maker.order_id,
                maker_user_id: maker.user_id,
                taker_order_id,
                taker_user_id,
                price: self.price,
                quantity: take,
                maker_completed,
                taker_completed: remaining_demand == 0,
                bidder_hold_price,
            });

            if maker_completed {
                let removed = self.orders.pop_front().expect("front just matched");
                result.removed_ids.push(removed.order_id);
            } else {
                break;
            }
        }

        result
    }

    /// A bucket is valid iff its cached total matches the sum of
    /// remaining quantities over its orders.
    pub fn is_valid(&self) -> bool {
        self.total_quantity == self.orders.iter().map(|o| o.remained()).sum::<Quantity>()
    }
}
