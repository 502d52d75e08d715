//! Result types returned by order-book operations.

use crate::event::EventChain;
use common::ResultCode;

/// What a book operation (Place/Cancel/Move/Reduce) returns: the event
/// chain produced, plus the result code the command envelope reports
/// upward. Mirrors `MatcherResult` of §6, minus the separate
/// head/tail pointers — a `Vec`-backed [`EventChain`] carries the same
/// ordering guarantee.
#[derive(Debug, Clone)]
pub struct MatcherResult {
    pub events: EventChain,
    pub result_code: ResultCode,
}

impl MatcherResult {
    pub fn success(events: EventChain) -> Self {
        Self {
            events,
            result_code: ResultCode::Success,
        }
    }

    pub fn failed(result_code: ResultCode) -> Self {
        Self {
            events: EventChain::new(),
            result_code,
        }
    }

    pub fn failed_with_events(events: EventChain, result_code: ResultCode) -> Self {
        Self {
            events,
            result_code,
        }
    }
}
