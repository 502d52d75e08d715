//! The event chain emitted by book operations.
//!
//! The reference implementation builds a singly-linked list of events
//! head/tail as it walks buckets; a `Vec` built in the same order is
//! behaviorally equivalent and friendlier to the allocator and the
//! cache, so that is what is used here. Ordering within the chain is
//! significant (§5): for a Move, the Reduce event precedes the Place
//! events; for a matched Place, Trade events appear in bucket traversal
//! order.

use common::{Action, OrderId, Price, Quantity, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchingEvent {
    /// One resting order was (partially or fully) matched against the
    /// taker.
    Trade {
        maker_order_id: OrderId,
        maker_user_id: UserId,
        taker_order_id: OrderId,
        taker_user_id: UserId,
        price: Price,
        quantity: Quantity,
        maker_completed: bool,
        taker_completed: bool,
        /// The price at which the bid side's funds were held: the
        /// taker's reservation when the maker is an Ask, otherwise the
        /// maker's own reservation.
        bidder_hold_price: Price,
    },
    /// An order's remaining quantity was reduced (by an explicit Reduce,
    /// a Cancel, or the first half of a Move).
    Reduce {
        order_id: OrderId,
        user_id: UserId,
        quantity: Quantity,
        maker_order_completed: bool,
    },
    /// A quantity could not be matched and was not (or could not be)
    /// rested: an IOC/FOK remainder, or a failed command.
    Reject {
        order_id: OrderId,
        user_id: UserId,
        quantity: Quantity,
        action: Action,
    },
}

/// An ordered sequence of events produced by a single command. Kept as
/// a thin `Vec` wrapper rather than a bare alias so call sites read as
/// "the chain for this command" rather than "a list of events".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChain(pub Vec<MatchingEvent>);

impl EventChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: MatchingEvent) {
        self.0.push(event);
    }

    pub fn prepend(&mut self, event: MatchingEvent) {
        self.0.insert(0, event);
    }

    pub fn extend(&mut self, other: EventChain) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchingEvent> {
        self.0.iter()
    }
}

impl IntoIterator for EventChain {
    type Item = MatchingEvent;
    type IntoIter = std::vec::IntoIter<MatchingEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
