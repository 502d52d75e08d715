//! Primitive identifiers and enums shared by the matching, risk and
//! storage crates. Kept deliberately small: fixed-width integers, no
//! UUIDs, because these values are part of the journal's byte-exact wire
//! format.

use serde::{Deserialize, Serialize};

pub type OrderId = i64;
pub type UserId = i64;
pub type SymbolId = i32;
pub type Currency = i32;
pub type Price = i64;
pub type Quantity = i64;
pub type Timestamp = i64;

/// Which side of the book an order rests on / trades against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Ask,
    Bid,
}

impl Action {
    pub fn opposite(self) -> Action {
        match self {
            Action::Ask => Action::Bid,
            Action::Bid => Action::Ask,
        }
    }
}

/// Order category, packed into bits 1..=4 of the Place command's
/// action/category byte (bit 0 = action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCategory {
    Gtc = 0,
    Ioc = 1,
    IocBudget = 2,
    Foc = 3,
    FocBudget = 4,
}

impl OrderCategory {
    pub fn from_bits(bits: i32) -> Option<Self> {
        match bits {
            0 => Some(OrderCategory::Gtc),
            1 => Some(OrderCategory::Ioc),
            2 => Some(OrderCategory::IocBudget),
            3 => Some(OrderCategory::Foc),
            4 => Some(OrderCategory::FocBudget),
            _ => None,
        }
    }
}

/// Packs `action` (bit 0) and `category` (bits 1..=4) into a single byte,
/// the wire representation used by the `Place` command.
pub fn pack_action_category(action: Action, category: OrderCategory) -> i8 {
    let action_bit = match action {
        Action::Ask => 0,
        Action::Bid => 1,
    };
    let category_bits = (category as i32) << 1;
    (action_bit | category_bits) as i8
}

pub fn unpack_action_category(byte: i8) -> Option<(Action, OrderCategory)> {
    let byte = byte as i32;
    let action = if byte & 1 == 0 { Action::Ask } else { Action::Bid };
    let category = OrderCategory::from_bits((byte >> 1) & 0x0F)?;
    Some((action, category))
}

/// Adjustment direction for a `BalanceAdj` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceAdjustmentType {
    Deposit = 0,
    Withdrawal = 1,
}

impl BalanceAdjustmentType {
    pub fn from_i8(v: i8) -> Option<Self> {
        match v {
            0 => Some(BalanceAdjustmentType::Deposit),
            1 => Some(BalanceAdjustmentType::Withdrawal),
            _ => None,
        }
    }
}

/// A user account's administrative status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Suspended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_category_packing_round_trips() {
        for action in [Action::Ask, Action::Bid] {
            for category in [
                OrderCategory::Gtc,
                OrderCategory::Ioc,
                OrderCategory::IocBudget,
                OrderCategory::Foc,
                OrderCategory::FocBudget,
            ] {
                let byte = pack_action_category(action, category);
                let (decoded_action, decoded_category) = unpack_action_category(byte).unwrap();
                assert_eq!(decoded_action, action);
                assert_eq!(decoded_category, category);
            }
        }
    }

    #[test]
    fn action_opposite_is_involution() {
        assert_eq!(Action::Ask.opposite().opposite(), Action::Ask);
    }
}
