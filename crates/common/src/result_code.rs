//! The fixed result-code vocabulary every command returns.
//!
//! Positive codes are success categories, negative codes are specific
//! failures. The numeric values are part of the wire contract (they are
//! journaled alongside failed commands for replay fidelity) and must not
//! be renumbered.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ResultCode {
    New = 0,
    ValidForMatchingEngine = 1,

    Success = 100,
    Accepted = 110,

    AuthInvalidUser = -1001,
    AuthTokenExpired = -1002,

    InvalidSymbol = -1201,
    InvalidPriceStep = -1202,
    UnsupportedSymbolType = -1203,

    RiskNsf = -2001,
    RiskInvalidReservedBidPrice = -2002,
    RiskAskPriceLowerThanFee = -2003,
    RiskMarginTradingDisabled = -2004,

    MatchingUnknownOrderId = -3002,
    MatchingDuplicateOrderId = -3003,
    MatchingUnsupportedCommand = -3004,
    MatchingInvalidOrderBookId = -3005,
    MatchingOrderBookAlreadyExists = -3006,
    MatchingUnsupportedOrderType = -3007,

    MatchingMoveRejectedDifferentPrice = -3040,
    MatchingMoveFailedPriceOverRiskLimit = -3041,
    MatchingMoveFailedPriceInvalid = -3042,

    MatchingReduceFailedWrongQuantity = -3051,

    UserMgmtUserAlreadyExists = -4001,

    UserMgmtAccountBalanceAdjustmentZero = -4100,
    UserMgmtAccountBalanceAdjustmentAlreadyAppliedSame = -4101,
    UserMgmtAccountBalanceAdjustmentAlreadyAppliedMany = -4102,
    UserMgmtAccountBalanceAdjustmentNsf = -4103,
    UserMgmtNonZeroAccountBalance = -4104,

    UserMgmtUserNotSuspendableHasPositions = -4130,
    UserMgmtUserNotSuspendableNonEmptyAccounts = -4131,
    UserMgmtUserNotSuspended = -4132,
    UserMgmtUserAlreadySuspended = -4133,

    UserMgmtUserNotFound = -4201,

    SymbolMgmtSymbolAlreadyExists = -5001,

    BinaryCommandFailed = -8001,
    ReportQueryUnknownType = -8003,
    StatePersistRiskEngineFailed = -8010,
    StatePersistMatchingEngineFailed = -8020,

    Drop = -9999,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::Accepted)
    }

    /// Folds a sequence of codes the way the dispatcher does when a single
    /// command touches both the risk and matching engines: the first
    /// non-success code wins, `Success` beats `Accepted` when both
    /// sub-results succeeded.
    pub fn merge_to_first_failed(codes: impl IntoIterator<Item = ResultCode>) -> ResultCode {
        let codes: Vec<_> = codes.into_iter().collect();
        if let Some(failed) = codes.iter().copied().find(|c| !c.is_success()) {
            return failed;
        }
        if codes.iter().any(|c| *c == ResultCode::Success) {
            return ResultCode::Success;
        }
        ResultCode::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_first_failure() {
        let merged = ResultCode::merge_to_first_failed([
            ResultCode::Accepted,
            ResultCode::MatchingUnknownOrderId,
            ResultCode::Success,
        ]);
        assert_eq!(merged, ResultCode::MatchingUnknownOrderId);
    }

    #[test]
    fn merge_prefers_success_over_accepted() {
        let merged =
            ResultCode::merge_to_first_failed([ResultCode::Accepted, ResultCode::Success]);
        assert_eq!(merged, ResultCode::Success);
    }

    #[test]
    fn merge_defaults_to_accepted() {
        let merged = ResultCode::merge_to_first_failed([ResultCode::Accepted, ResultCode::Accepted]);
        assert_eq!(merged, ResultCode::Accepted);
    }
}
