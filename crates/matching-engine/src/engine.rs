//! The matching engine: a map of per-symbol order books, dispatched by
//! symbol id. One shard owns exactly one `MatchingEngine`; there is no
//! internal locking because the shard processes commands one at a time.

use crate::book::OrderBook;
use crate::error::MatchingError;
use crate::result::MatcherResult;
use common::{OrderId, Price, Quantity, SymbolId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MatchingEngine {
    books: HashMap<SymbolId, OrderBook>,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_book(&mut self, symbol_id: SymbolId) -> Result<(), MatchingError> {
        if self.books.contains_key(&symbol_id) {
            return Err(MatchingError::OrderBookAlreadyExists(symbol_id));
        }
        self.books.insert(symbol_id, OrderBook::new(symbol_id));
        Ok(())
    }

    pub fn has_book(&self, symbol_id: SymbolId) -> bool {
        self.books.contains_key(&symbol_id)
    }

    pub fn book(&self, symbol_id: SymbolId) -> Result<&OrderBook, MatchingError> {
        self.books.get(&symbol_id).ok_or(MatchingError::InvalidOrderBookId(symbol_id))
    }

    pub fn book_mut(&mut self, symbol_id: SymbolId) -> Result<&mut OrderBook, MatchingError> {
        self.books.get_mut(&symbol_id).ok_or(MatchingError::InvalidOrderBookId(symbol_id))
    }

    /// Locates the book holding `order_id`, scanning every book. Used by
    /// commands (Cancel/Reduce/Move) that arrive without a symbol id.
    pub fn find_order(&self, order_id: OrderId) -> Option<SymbolId> {
        self.books
            .iter()
            .find(|(_, book)| book.contains(order_id))
            .map(|(&symbol_id, _)| symbol_id)
    }

    pub fn cancel(&mut self, order_id: OrderId) -> Result<MatcherResult, MatchingError> {
        let symbol_id = self.find_order(order_id).ok_or(MatchingError::UnknownOrderId(order_id))?;
        Ok(self.book_mut(symbol_id).expect("just located").cancel(order_id))
    }

    pub fn reduce(&mut self, order_id: OrderId, quantity: Quantity) -> Result<MatcherResult, MatchingError> {
        let symbol_id = self.find_order(order_id).ok_or(MatchingError::UnknownOrderId(order_id))?;
        Ok(self.book_mut(symbol_id).expect("just located").reduce(order_id, quantity))
    }

    pub fn move_order(&mut self, order_id: OrderId, to_price: Price) -> Result<MatcherResult, MatchingError> {
        let symbol_id = self.find_order(order_id).ok_or(MatchingError::UnknownOrderId(order_id))?;
        self.book_mut(symbol_id).expect("just located").move_order(order_id, to_price)
    }

    /// All books pass their own internal consistency check, used after
    /// replaying a journal or loading a snapshot.
    pub fn is_valid(&self) -> bool {
        self.books.values().all(OrderBook::is_valid)
    }

    pub fn reset(&mut self) {
        self.books.clear();
    }

    /// Snapshot encoding: book count followed by each book's own
    /// encoding (which carries its own symbol id).
    pub fn encode(&self, out: &mut common::codec::WriteBuf) {
        common::codec::write_i32(out, self.books.len() as i32);
        for book in self.books.values() {
            book.encode(out);
        }
    }

    pub fn decode(r: &mut common::codec::Reader<'_>) -> Result<Self, common::Error> {
        let count = r.read_i32()?;
        let mut books = HashMap::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let book = OrderBook::decode(r)?;
            books.insert(book.symbol_id, book);
        }
        Ok(Self { books })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Order;
    use common::{Action, OrderCategory};

    #[test]
    fn add_book_rejects_duplicate() {
        let mut engine = MatchingEngine::new();
        engine.add_book(1).unwrap();
        assert!(matches!(engine.add_book(1), Err(MatchingError::OrderBookAlreadyExists(1))));
    }

    #[test]
    fn find_order_locates_owning_book() {
        let mut engine = MatchingEngine::new();
        engine.add_book(1).unwrap();
        engine.add_book(2).unwrap();
        let order = Order::new(7, 1, 1, Action::Bid, 100, 10, 100, 0, OrderCategory::Gtc);
        engine.book_mut(1).unwrap().place_gtc(order);

        assert_eq!(engine.find_order(7), Some(1));
        assert_eq!(engine.find_order(999), None);
    }

    #[test]
    fn cancel_routes_to_owning_book() {
        let mut engine = MatchingEngine::new();
        engine.add_book(1).unwrap();
        let order = Order::new(7, 1, 1, Action::Bid, 100, 10, 100, 0, OrderCategory::Gtc);
        engine.book_mut(1).unwrap().place_gtc(order);

        let result = engine.cancel(7).unwrap();
        assert!(!result.events.is_empty());
        assert!(engine.book(1).unwrap().is_empty());
    }

    #[test]
    fn cancel_unknown_order_is_error() {
        let mut engine = MatchingEngine::new();
        engine.add_book(1).unwrap();
        assert!(matches!(engine.cancel(404), Err(MatchingError::UnknownOrderId(404))));
    }

    #[test]
    fn engine_round_trips_through_codec() {
        let mut engine = MatchingEngine::new();
        engine.add_book(1).unwrap();
        engine.add_book(2).unwrap();
        let order = Order::new(7, 1, 1, Action::Bid, 100, 10, 100, 0, OrderCategory::Gtc);
        engine.book_mut(1).unwrap().place_gtc(order);

        let mut out = common::codec::WriteBuf::new();
        engine.encode(&mut out);
        let mut r = common::codec::Reader::new(&out);
        let decoded = MatchingEngine::decode(&mut r).unwrap();

        assert!(decoded.has_book(1) && decoded.has_book(2));
        assert!(decoded.find_order(7) == Some(1));
        assert!(decoded.is_valid());
    }
}
