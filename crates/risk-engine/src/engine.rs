//! The per-shard risk engine: a map of user profiles, dispatched by
//! user id. Margin coefficients live on the symbol (owned by the
//! `instrument` crate); callers look them up and pass them in rather
//! than the risk engine reaching across crates for them.

use crate::error::RiskError;
use crate::profile::{BalanceAdjOutcome, UserProfile};
use crate::types::LastPrice;
use common::{Action, Currency, Price, Quantity, SymbolId, UserId, UserStatus};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RiskEngine {
    profiles: HashMap<UserId, UserProfile>,
}

impl RiskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user_id: UserId) -> Result<(), RiskError> {
        if self.profiles.contains_key(&user_id) {
            return Err(RiskError::UserAlreadyExists(user_id));
        }
        self.profiles.insert(user_id, UserProfile::new(user_id, UserStatus::Active));
        Ok(())
    }

    pub fn profile(&self, user_id: UserId) -> Result<&UserProfile, RiskError> {
        self.profiles.get(&user_id).ok_or(RiskError::UnknownUser(user_id))
    }

    pub fn profile_mut(&mut self, user_id: UserId) -> Result<&mut UserProfile, RiskError> {
        self.profiles.get_mut(&user_id).ok_or(RiskError::UnknownUser(user_id))
    }

    /// Bulk-seeds balances for an initial ledger import. Bypasses the
    /// per-adjustment `txid` idempotency check — the whole-map replay is
    /// itself idempotent.
    pub fn add_accounts(&mut self, users: impl IntoIterator<Item = (UserId, Vec<(Currency, i64)>)>) {
        for (user_id, balances) in users {
            let profile = self
                .profiles
                .entry(user_id)
                .or_insert_with(|| UserProfile::new(user_id, UserStatus::Active));
            for (currency, amount) in balances {
                profile.seed_balance(currency, amount);
            }
        }
    }

    pub fn apply_balance_adjustment(
        &mut self,
        user_id: UserId,
        currency: Currency,
        amount: i64,
        txid: i64,
    ) -> Result<BalanceAdjOutcome, RiskError> {
        Ok(self.profile_mut(user_id)?.apply_balance_adjustment(currency, amount, txid))
    }

    /// Rejects the transition when the account has open positions or a
    /// non-zero balance that would be left stranded, or when already
    /// suspended.
    pub fn suspend_user(&mut self, user_id: UserId) -> Result<(), RiskError> {
        let profile = self.profile_mut(user_id)?;
        if profile.has_open_positions() {
            return Err(RiskError::InvariantViolation {
                user_id,
                symbol_id: -1,
                detail: "cannot suspend user with open positions".to_string(),
            });
        }
        if profile.has_nonzero_balance() {
            return Err(RiskError::InvariantViolation {
                user_id,
                symbol_id: -1,
                detail: "cannot suspend user with non-zero balance".to_string(),
            });
        }
        profile.suspend()
    }

    pub fn resume_user(&mut self, user_id: UserId) -> Result<(), RiskError> {
        self.profile_mut(user_id)?.resume()
    }

    pub fn required_margin_for_order(
        &self,
        user_id: UserId,
        symbol_id: SymbolId,
        margin_buy: i64,
        margin_sell: i64,
        action: Action,
        quantity: Quantity,
    ) -> Result<i64, RiskError> {
        let profile = self.profile(user_id)?;
        let required = match profile.margin_position_of(symbol_id) {
            Some(position) => position.required_margin_for_order(margin_buy, margin_sell, action, quantity),
            None => {
                let fresh = crate::types::MarginPosition::new(user_id, symbol_id, 0);
                fresh.required_margin_for_order(margin_buy, margin_sell, action, quantity)
            }
        };
        Ok(required)
    }

    pub fn hold_pending(&mut self, user_id: UserId, symbol_id: SymbolId, currency: Currency, action: Action, quantity: Quantity) -> Result<(), RiskError> {
        self.profile_mut(user_id)?
            .margin_position_mut(symbol_id, currency)
            .pending_hold(action, quantity);
        Ok(())
    }

    pub fn release_pending(&mut self, user_id: UserId, symbol_id: SymbolId, currency: Currency, action: Action, quantity: Quantity) -> Result<(), RiskError> {
        self.profile_mut(user_id)?
            .margin_position_mut(symbol_id, currency)
            .pending_release(action, quantity);
        Ok(())
    }

    /// Applies a confirmed trade fill to a user's margin position, then
    /// drops the position from the map if it becomes empty.
    pub fn update_for_trade(
        &mut self,
        user_id: UserId,
        symbol_id: SymbolId,
        currency: Currency,
        action: Action,
        quantity: Quantity,
        price: Price,
    ) -> Result<Quantity, RiskError> {
        let profile = self.profile_mut(user_id)?;
        let opened = profile
            .margin_position_mut(symbol_id, currency)
            .update_for_margin_trade(action, quantity, price)?;
        profile.prune_empty_positions();
        Ok(opened)
    }

    pub fn estimate_profit(
        &self,
        user_id: UserId,
        symbol_id: SymbolId,
        margin_buy: i64,
        margin_sell: i64,
        last_price: Option<LastPrice>,
    ) -> Result<i64, RiskError> {
        let profile = self.profile(user_id)?;
        Ok(profile
            .margin_position_of(symbol_id)
            .map(|p| p.estimate_profit(margin_buy, margin_sell, last_price))
            .unwrap_or(0))
    }

    pub fn reset(&mut self) {
        self.profiles.clear();
    }

    /// Snapshot encoding: profile count followed by each profile's own
    /// encoding (which carries its own user id).
    pub fn encode(&self, out: &mut common::codec::WriteBuf) {
        common::codec::write_i32(out, self.profiles.len() as i32);
        for profile in self.profiles.values() {
            profile.encode(out);
        }
    }

    pub fn decode(r: &mut common::codec::Reader<'_>) -> common::Result<Self> {
        let count = r.read_i32()?;
        let mut profiles = HashMap::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let profile = UserProfile::decode(r)?;
            profiles.insert(profile.user_id, profile);
        }
        Ok(Self { profiles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_user_rejects_duplicate() {
        let mut engine = RiskEngine::new();
        engine.add_user(1).unwrap();
        assert!(matches!(engine.add_user(1), Err(RiskError::UserAlreadyExists(1))));
    }

    #[test]
    fn balance_adjustment_routes_through_profile() {
        let mut engine = RiskEngine::new();
        engine.add_user(1).unwrap();
        let outcome = engine.apply_balance_adjustment(1, 1, 500, 1).unwrap();
        assert_eq!(outcome, BalanceAdjOutcome::Applied);
        assert_eq!(engine.profile(1).unwrap().balance_of(1), 500);
    }

    #[test]
    fn suspend_rejects_user_with_nonzero_balance() {
        let mut engine = RiskEngine::new();
        engine.add_user(1).unwrap();
        engine.apply_balance_adjustment(1, 1, 500, 1).unwrap();
        assert!(engine.suspend_user(1).is_err());
    }

    #[test]
    fn suspend_succeeds_for_clean_account() {
        let mut engine = RiskEngine::new();
        engine.add_user(1).unwrap();
        engine.suspend_user(1).unwrap();
        assert_eq!(engine.profile(1).unwrap().status, UserStatus::Suspended);
    }

    #[test]
    fn trade_updates_margin_position_and_prunes_when_empty() {
        let mut engine = RiskEngine::new();
        engine.add_user(1).unwrap();
        engine.update_for_trade(1, 7, 1, Action::Bid, 5, 100).unwrap();
        assert!(engine.profile(1).unwrap().margin_position_of(7).is_some());

        engine.update_for_trade(1, 7, 1, Action::Ask, 5, 110).unwrap();
        assert!(engine.profile(1).unwrap().margin_position_of(7).is_none());
    }

    #[test]
    fn unknown_user_is_error() {
        let engine = RiskEngine::new();
        assert!(matches!(engine.profile(999), Err(RiskError::UnknownUser(999))));
    }

    #[test]
    fn engine_round_trips_through_codec() {
        let mut engine = RiskEngine::new();
        engine.add_user(1).unwrap();
        engine.apply_balance_adjustment(1, 1, 500, 1).unwrap();
        engine.hold_pending(1, 7, 1, Action::Bid, 3).unwrap();

        let mut out = common::codec::WriteBuf::new();
        engine.encode(&mut out);
        let mut r = common::codec::Reader::new(&out);
        let decoded = RiskEngine::decode(&mut r).unwrap();

        assert_eq!(decoded.profile(1).unwrap().balance_of(1), 500);
        assert_eq!(
            decoded.profile(1).unwrap().margin_position_of(7).unwrap().pending_buy_quantity,
            3
        );
    }
}
