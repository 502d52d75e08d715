//! A user's account: balances, margin positions, administrative status
//! and balance-adjustment idempotency. Grounded on the reference's
//! `user.Profile`.

use crate::error::RiskError;
use crate::types::MarginPosition;
use common::{codec, Currency, SymbolId, UserId, UserStatus};
use std::collections::HashMap;

/// Outcome of applying a `BalanceAdj` command, distinguishing the two
/// "already applied" result codes: a `txid` equal to the counter is the
/// same adjustment replayed; a `txid` strictly less than it means one or
/// more later adjustments have already landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAdjOutcome {
    Applied,
    AlreadyAppliedSame,
    AlreadyAppliedMany,
    Zero,
    Nsf,
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: UserId,
    pub status: UserStatus,
    adjustments_counter: i64,
    margin_positions: HashMap<SymbolId, MarginPosition>,
    balances: HashMap<Currency, i64>,
}

impl UserProfile {
    pub fn new(user_id: UserId, status: UserStatus) -> Self {
        Self {
            user_id,
            status,
            adjustments_counter: 0,
            margin_positions: HashMap::new(),
            balances: HashMap::new(),
        }
    }

    pub fn balance_of(&self, currency: Currency) -> i64 {
        self.balances.get(&currency).copied().unwrap_or(0)
    }

    pub fn balances(&self) -> impl Iterator<Item = (Currency, i64)> + '_ {
        self.balances.iter().map(|(&c, &b)| (c, b))
    }

    pub fn margin_position_of(&self, symbol_id: SymbolId) -> Option<&MarginPosition> {
        self.margin_positions.get(&symbol_id)
    }

    pub fn margin_position_mut(&mut self, symbol_id: SymbolId, currency: Currency) -> &mut MarginPosition {
        self.margin_positions
            .entry(symbol_id)
            .or_insert_with(|| MarginPosition::new(self.user_id, symbol_id, currency))
    }

    pub fn margin_positions(&self) -> impl Iterator<Item = &MarginPosition> {
        self.margin_positions.values()
    }

    /// Drops margin positions that are empty (no pending orders, no open
    /// exposure) — keeps the map from growing unboundedly across
    /// symbols a user once touched but no longer holds.
    pub fn prune_empty_positions(&mut self) {
        self.margin_positions.retain(|_, p| !p.is_empty());
    }

    pub fn has_open_positions(&self) -> bool {
        self.margin_positions.values().any(|p| !p.is_empty())
    }

    pub fn has_nonzero_balance(&self) -> bool {
        self.balances.values().any(|&b| b != 0)
    }

    /// Seeds a balance directly, bypassing the `txid` idempotency check
    /// — used by `AddAccounts`, which is idempotent at the whole-map
    /// level on replay rather than per adjustment.
    pub fn seed_balance(&mut self, currency: Currency, amount: i64) {
        *self.balances.entry(currency).or_insert(0) += amount;
    }

    /// Applies a `BalanceAdj`, gated by `txid` against
    /// `adjustments_counter`. A `txid` must be strictly greater than the
    /// counter to apply; on success the counter advances to `txid`.
    pub fn apply_balance_adjustment(&mut self, currency: Currency, amount: i64, txid: i64) -> BalanceAdjOutcome {
        if txid == self.adjustments_counter {
            return BalanceAdjOutcome::AlreadyAppliedSame;
        }
        if txid < self.adjustments_counter {
            return BalanceAdjOutcome::AlreadyAppliedMany;
        }
        if amount == 0 {
            return BalanceAdjOutcome::Zero;
        }

        let balance = self.balances.entry(currency).or_insert(0);
        if amount < 0 && *balance + amount < 0 {
            return BalanceAdjOutcome::Nsf;
        }

        *balance += amount;
        self.adjustments_counter = txid;
        BalanceAdjOutcome::Applied
    }

    pub fn suspend(&mut self) -> Result<(), RiskError> {
        if self.status == UserStatus::Suspended {
            return Err(RiskError::InvariantViolation {
                user_id: self.user_id,
                symbol_id: -1,
                detail: "user already suspended".to_string(),
            });
        }
        self.status = UserStatus::Suspended;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RiskError> {
        if self.status == UserStatus::Active {
            return Err(RiskError::InvariantViolation {
                user_id: self.user_id,
                symbol_id: -1,
                detail: "user not suspended".to_string(),
            });
        }
        self.status = UserStatus::Active;
        Ok(())
    }

    /// Field order matches the reference's `Profile.Marshal`: positions
    /// before the adjustment counter, balances before status, and
    /// status written last.
    pub fn encode(&self, out: &mut codec::WriteBuf) {
        codec::write_i64(out, self.user_id);

        codec::write_map(
            out,
            self.margin_positions.iter(),
            |out, (&symbol_id, _)| codec::write_i32(out, symbol_id),
            |out, (_, position)| position.encode(out),
        );

        codec::write_i64(out, self.adjustments_counter);

        codec::write_map(
            out,
            self.balances.iter(),
            |out, (&currency, _)| codec::write_i32(out, currency),
            |out, (_, &balance)| codec::write_i64(out, balance),
        );

        codec::write_i8(out, if self.status == UserStatus::Active { 0 } else { 1 });
    }

    pub fn decode(r: &mut codec::Reader<'_>) -> common::Result<Self> {
        let user_id = r.read_i64()?;

        let positions = codec::read_map(
            r,
            |r| r.read_i32(),
            |r| MarginPosition::decode(r),
        )?;
        let margin_positions = positions.into_iter().collect();

        let adjustments_counter = r.read_i64()?;

        let balances = codec::read_map(r, |r| r.read_i32(), |r| r.read_i64())?.into_iter().collect();

        let status_code = r.read_i8()?;
        let status = match status_code {
            0 => UserStatus::Active,
            1 => UserStatus::Suspended,
            other => return Err(common::Error::codec(format!("unknown user status code {other}"))),
        };

        Ok(Self {
            user_id,
            status,
            adjustments_counter,
            margin_positions,
            balances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_adjustment_is_idempotent_by_txid() {
        let mut profile = UserProfile::new(1, UserStatus::Active);
        assert_eq!(profile.apply_balance_adjustment(1, 100, 1), BalanceAdjOutcome::Applied);
        assert_eq!(profile.balance_of(1), 100);

        assert_eq!(profile.apply_balance_adjustment(1, 100, 1), BalanceAdjOutcome::AlreadyAppliedSame);
        assert_eq!(profile.apply_balance_adjustment(1, 50, 0), BalanceAdjOutcome::AlreadyAppliedMany);
        assert_eq!(profile.balance_of(1), 100);
    }

    #[test]
    fn zero_amount_adjustment_is_rejected() {
        let mut profile = UserProfile::new(1, UserStatus::Active);
        assert_eq!(profile.apply_balance_adjustment(1, 0, 1), BalanceAdjOutcome::Zero);
    }

    #[test]
    fn debit_below_zero_balance_is_nsf() {
        let mut profile = UserProfile::new(1, UserStatus::Active);
        profile.apply_balance_adjustment(1, 50, 1);
        assert_eq!(profile.apply_balance_adjustment(1, -100, 2), BalanceAdjOutcome::Nsf);
        assert_eq!(profile.balance_of(1), 50);
    }

    #[test]
    fn suspend_then_resume_round_trips_status() {
        let mut profile = UserProfile::new(1, UserStatus::Active);
        profile.suspend().unwrap();
        assert_eq!(profile.status, UserStatus::Suspended);
        assert!(profile.suspend().is_err());

        profile.resume().unwrap();
        assert_eq!(profile.status, UserStatus::Active);
        assert!(profile.resume().is_err());
    }

    #[test]
    fn profile_round_trips_through_wire() {
        let mut profile = UserProfile::new(42, UserStatus::Active);
        profile.apply_balance_adjustment(1, 1000, 1);
        profile.apply_balance_adjustment(2, 500, 2);
        profile.margin_position_mut(7, 1).pending_hold(common::Action::Bid, 3);

        let mut out = Vec::new();
        profile.encode(&mut out);
        let mut reader = codec::Reader::new(&out);
        let decoded = UserProfile::decode(&mut reader).unwrap();

        assert_eq!(decoded.user_id, profile.user_id);
        assert_eq!(decoded.status, profile.status);
        assert_eq!(decoded.balance_of(1), 1000);
        assert_eq!(decoded.balance_of(2), 500);
        assert_eq!(decoded.margin_position_of(7).unwrap().pending_buy_quantity, 3);
    }
}
