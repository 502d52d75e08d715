//! The shard orchestrator: one matching engine, one risk engine, one
//! symbol registry and one journal/snapshot pair, all owned exclusively
//! by a single shard. Decodes nothing itself — it is handed an already
//! decoded [`Command`] by the upstream dispatcher and returns a
//! [`DispatchOutcome`] per §6.

use crate::error::ShardError;
use common::{
    Action, BalanceAdjustmentType, Command, Currency, OrderId, Price, Quantity, ResultCode,
    SymbolId, UserId,
};
use config::JournalConfig;
use instrument::{InstrumentError, SymbolRegistry};
use matching_engine::{EventChain, MatchingEngine, MatchingError, MatchingEvent, Order, PriceLevel};
use risk_engine::{BalanceAdjOutcome, RiskEngine, RiskError};
use std::path::PathBuf;
use storage::{JournalDescriptor, JournalWriter, SnapshotCategory, SnapshotChain, SnapshotDescriptor};

/// The L2 projection returned by an `OrderBookRequest`: parallel arrays
/// per side, best price first, truncated to the requested depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookView {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// What a dispatched command returns: a result code always, an event
/// chain for order commands, and a book view for `OrderBookRequest`.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub result_code: ResultCode,
    pub events: EventChain,
    pub book_view: Option<OrderBookView>,
}

impl DispatchOutcome {
    fn accepted() -> Self {
        Self {
            result_code: ResultCode::Accepted,
            events: EventChain::new(),
            book_view: None,
        }
    }

    fn rejected(result_code: ResultCode) -> Self {
        Self {
            result_code,
            events: EventChain::new(),
            book_view: None,
        }
    }

    fn from_matcher(result: matching_engine::MatcherResult) -> Self {
        Self {
            result_code: result.result_code,
            events: result.events,
            book_view: None,
        }
    }
}

/// Classifies a command-level rejection out of `RiskError::InvariantViolation`'s
/// detail text. Suspend/resume reuse this variant for ordinary
/// rejections (already-suspended, has open positions, ...); anything
/// whose detail doesn't match one of those is a genuine state
/// corruption and stays shard-fatal.
fn classify_invariant(detail: &str) -> Option<ResultCode> {
    if detail.contains("open positions") {
        Some(ResultCode::UserMgmtUserNotSuspendableHasPositions)
    } else if detail.contains("non-zero balance") {
        Some(ResultCode::UserMgmtUserNotSuspendableNonEmptyAccounts)
    } else if detail.contains("already suspended") {
        Some(ResultCode::UserMgmtUserAlreadySuspended)
    } else if detail.contains("not suspended") {
        Some(ResultCode::UserMgmtUserNotSuspended)
    } else {
        None
    }
}

/// Folds a risk-engine result into either a command-level rejection
/// code or a shard-fatal error, per [`classify_invariant`].
fn handle_risk<T>(r: Result<T, RiskError>) -> Result<Result<T, ResultCode>, ShardError> {
    match r {
        Ok(v) => Ok(Ok(v)),
        Err(RiskError::UnknownUser(_)) => Ok(Err(ResultCode::AuthInvalidUser)),
        Err(RiskError::UserAlreadyExists(_)) => Ok(Err(ResultCode::UserMgmtUserAlreadyExists)),
        Err(RiskError::InvariantViolation { detail, user_id, symbol_id }) => {
            match classify_invariant(&detail) {
                Some(code) => Ok(Err(code)),
                None => Err(RiskError::InvariantViolation { detail, user_id, symbol_id }.into()),
            }
        }
        Err(e @ RiskError::Codec(_)) => Err(e.into()),
    }
}

/// Folds a matching-engine command-level error into its result code;
/// `InvariantViolation` is a programming error and stays shard-fatal.
fn matching_command_code(e: MatchingError) -> Result<ResultCode, ShardError> {
    match e {
        MatchingError::UnknownOrderId(_) => Ok(ResultCode::MatchingUnknownOrderId),
        MatchingError::DuplicateOrderId(_) => Ok(ResultCode::MatchingDuplicateOrderId),
        MatchingError::ReduceFailedWrongQuantity(_) => Ok(ResultCode::MatchingReduceFailedWrongQuantity),
        MatchingError::MoveFailedPriceInvalid => Ok(ResultCode::MatchingMoveFailedPriceInvalid),
        MatchingError::MoveFailedPriceOverRiskLimit => Ok(ResultCode::MatchingMoveFailedPriceOverRiskLimit),
        MatchingError::InvalidOrderBookId(_) => Ok(ResultCode::MatchingInvalidOrderBookId),
        MatchingError::OrderBookAlreadyExists(_) => Ok(ResultCode::MatchingOrderBookAlreadyExists),
        MatchingError::InvariantViolation(_) => Err(e.into()),
    }
}

/// Ties a [`MatchingEngine`], a [`RiskEngine`] and a [`SymbolRegistry`]
/// to one journal/snapshot pair. One shard per symbol-sharded
/// partition; no locking, since a shard processes one command at a
/// time to completion.
pub struct Shard {
    dir: PathBuf,
    exchange_id: i64,
    instance_id: i32,
    snapshot_id: i64,
    journal_config: JournalConfig,
    matching: MatchingEngine,
    risk: RiskEngine,
    symbols: SymbolRegistry,
    journal: JournalWriter,
    snapshots: SnapshotChain,
}

impl Shard {
    /// Opens a fresh shard rooted at `dir`, starting from the
    /// clean-start sentinel snapshot (`snapshot_id == 0`).
    pub fn open(
        dir: impl Into<PathBuf>,
        exchange_id: i64,
        instance_id: i32,
        journal_config: JournalConfig,
    ) -> Result<Self, ShardError> {
        let dir = dir.into();
        let journal = JournalWriter::open(&dir, exchange_id, 0, journal_config.clone())?;
        Ok(Self {
            dir,
            exchange_id,
            instance_id,
            snapshot_id: 0,
            journal_config,
            matching: MatchingEngine::new(),
            risk: RiskEngine::new(),
            symbols: SymbolRegistry::new(),
            journal,
            snapshots: SnapshotChain::new(),
        })
    }

    /// Resumes a shard from a previously persisted snapshot plus every
    /// journal file chained off it, re-applying each replayed command
    /// without re-journaling it (it is already durable on disk). Follows
    /// `PersistStateRisk` rebases encountered mid-replay by continuing
    /// the search at the new snapshot id, so a prefix of any length —
    /// including one spanning several rebases — replays correctly.
    ///
    /// `snapshot_id` is the checkpoint to resume from; there is no
    /// on-disk manifest of snapshot ids, so the caller must already know
    /// which one to load (typically the last one it persisted).
    pub fn open_from_snapshot(
        dir: impl Into<PathBuf>,
        exchange_id: i64,
        instance_id: i32,
        snapshot_id: i64,
        journal_config: JournalConfig,
    ) -> Result<Self, ShardError> {
        let dir = dir.into();

        let me_bytes = storage::read_snapshot(&dir, exchange_id, snapshot_id, SnapshotCategory::MatchingEngine, instance_id, &journal_config)?;
        let mut r = common::codec::Reader::new(&me_bytes);
        let matching = MatchingEngine::decode(&mut r)?;
        let symbols = SymbolRegistry::decode(&mut r)?;

        let re_bytes = storage::read_snapshot(&dir, exchange_id, snapshot_id, SnapshotCategory::RiskEngine, instance_id, &journal_config)?;
        let mut r = common::codec::Reader::new(&re_bytes);
        let risk = RiskEngine::decode(&mut r)?;

        let mut shard = Self {
            dir: dir.clone(),
            exchange_id,
            instance_id,
            snapshot_id,
            journal_config: journal_config.clone(),
            matching,
            risk,
            symbols,
            journal: JournalWriter::open(&dir, exchange_id, snapshot_id, journal_config.clone())?,
            snapshots: SnapshotChain::new(),
        };

        let last_partition = loop {
            let base = shard.snapshot_id;
            let mut partition = 0u32;
            loop {
                let path = storage::journal_file_path(&dir, exchange_id, base, partition);
                if !path.exists() {
                    break;
                }
                for cmd in storage::replay_file(&path)? {
                    shard.apply(cmd)?;
                }
                partition += 1;
            }
            if shard.snapshot_id == base {
                break partition.saturating_sub(1);
            }
        };

        shard.journal = JournalWriter::open_at_partition(&dir, exchange_id, shard.snapshot_id, last_partition, journal_config)?;
        Ok(shard)
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    pub fn matching(&self) -> &MatchingEngine {
        &self.matching
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    pub fn snapshots(&self) -> &SnapshotChain {
        &self.snapshots
    }

    pub fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    /// Decodes nothing — the caller already owns a typed `Command`.
    /// Journals it first (if mutating), then applies its effect. A
    /// `ShardError` here is expected to terminate the shard's run loop;
    /// anything short of that comes back as a result code.
    #[tracing::instrument(skip(self, cmd), fields(seq = cmd.metadata().seq))]
    pub fn dispatch(&mut self, cmd: Command) -> Result<DispatchOutcome, ShardError> {
        if cmd.is_mutating() {
            self.journal.append(&cmd)?;
        }
        self.apply(cmd)
    }

    /// Applies a command's effect without touching the journal, used
    /// both by `dispatch` (after journaling) and by replay (where the
    /// command is already durable on disk and must not be re-journaled).
    fn apply(&mut self, cmd: Command) -> Result<DispatchOutcome, ShardError> {
        match cmd {
            Command::Place {
                metadata,
                user_id,
                symbol_id,
                order_id,
                price,
                reserved_bid_price,
                quantity,
                action,
                category,
                ..
            } => self.dispatch_place(
                metadata.timestamp_ns,
                user_id,
                symbol_id,
                order_id,
                price,
                reserved_bid_price,
                quantity,
                action,
                category,
            ),
            Command::Cancel { user_id, order_id, .. } => self.dispatch_cancel(user_id, order_id),
            Command::Reduce { user_id, order_id, quantity, .. } => {
                self.dispatch_reduce(user_id, order_id, quantity)
            }
            Command::Move { order_id, to_price, .. } => self.dispatch_move(order_id, to_price),
            Command::OrderBookRequest { symbol_id, depth, .. } => {
                self.dispatch_order_book_request(symbol_id, depth)
            }
            Command::AddUser { user_id, .. } => self.dispatch_add_user(user_id),
            Command::BalanceAdj { user_id, currency, txid, amount, kind, .. } => {
                self.dispatch_balance_adj(user_id, currency, txid, amount, kind)
            }
            Command::SuspendUser { user_id, .. } => self.dispatch_suspend_user(user_id),
            Command::ResumeUser { user_id, .. } => self.dispatch_resume_user(user_id),
            Command::AddAccounts { users, .. } => {
                self.risk.add_accounts(users);
                Ok(DispatchOutcome::accepted())
            }
            Command::AddSymbols { symbols, .. } => self.dispatch_add_symbols(symbols),
            Command::PersistStateMatching { .. } => self.dispatch_persist_matching(),
            Command::PersistStateRisk { metadata } => {
                self.dispatch_persist_risk(metadata.seq, metadata.timestamp_ns)
            }
            Command::GroupingControl { .. } | Command::Nop { .. } => Ok(DispatchOutcome::accepted()),
            Command::Reset { .. } => self.dispatch_reset(),
            Command::ShutdownSignal { .. } => {
                self.journal.end_batch()?;
                Ok(DispatchOutcome::accepted())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_place(
        &mut self,
        timestamp_ns: i64,
        user_id: UserId,
        symbol_id: SymbolId,
        order_id: OrderId,
        price: Price,
        reserved_bid_price: Price,
        quantity: Quantity,
        action: Action,
        category: common::OrderCategory,
    ) -> Result<DispatchOutcome, ShardError> {
        let Ok(symbol) = self.symbols.get(symbol_id) else {
            return Ok(DispatchOutcome::rejected(ResultCode::InvalidSymbol));
        };
        if !self.matching.has_book(symbol_id) {
            return Ok(DispatchOutcome::rejected(ResultCode::MatchingInvalidOrderBookId));
        }

        let margin = symbol.margin_coefficients();
        let quote_currency = symbol.core().quote_currency;

        if let Some((margin_buy, margin_sell)) = margin {
            let required = match handle_risk(self.risk.required_margin_for_order(
                user_id, symbol_id, margin_buy, margin_sell, action, quantity,
            ))? {
                Ok(v) => v,
                Err(code) => return Ok(DispatchOutcome::rejected(code)),
            };
            if required > 0 {
                let balance = match handle_risk(self.risk.profile(user_id).map(|p| p.balance_of(quote_currency)))? {
                    Ok(v) => v,
                    Err(code) => return Ok(DispatchOutcome::rejected(code)),
                };
                if balance < required {
                    return Ok(DispatchOutcome::rejected(ResultCode::RiskNsf));
                }
            }
            self.risk.hold_pending(user_id, symbol_id, quote_currency, action, quantity)?;
        }

        let order = Order::new(order_id, user_id, symbol_id, action, price, quantity, reserved_bid_price, timestamp_ns, category);
        let result = self.matching.book_mut(symbol_id)?.place(order);

        if margin.is_some() {
            self.apply_margin_events(symbol_id, quote_currency, action, &result.events)?;
        }

        Ok(DispatchOutcome::from_matcher(result))
    }

    fn dispatch_cancel(&mut self, user_id: UserId, order_id: OrderId) -> Result<DispatchOutcome, ShardError> {
        let Some(symbol_id) = self.matching.find_order(order_id) else {
            return Ok(DispatchOutcome::rejected(ResultCode::MatchingUnknownOrderId));
        };
        let action = self.matching.book(symbol_id)?.order(order_id).map(|o| o.action);
        match self.matching.cancel(order_id) {
            Ok(result) => {
                self.release_margin_for_reduce(user_id, symbol_id, action, &result.events)?;
                Ok(DispatchOutcome::from_matcher(result))
            }
            Err(e) => Ok(DispatchOutcome::rejected(matching_command_code(e)?)),
        }
    }

    fn dispatch_reduce(&mut self, user_id: UserId, order_id: OrderId, quantity: Quantity) -> Result<DispatchOutcome, ShardError> {
        let Some(symbol_id) = self.matching.find_order(order_id) else {
            return Ok(DispatchOutcome::rejected(ResultCode::MatchingUnknownOrderId));
        };
        let action = self.matching.book(symbol_id)?.order(order_id).map(|o| o.action);
        match self.matching.reduce(order_id, quantity) {
            Ok(result) => {
                self.release_margin_for_reduce(user_id, symbol_id, action, &result.events)?;
                Ok(DispatchOutcome::from_matcher(result))
            }
            Err(e) => Ok(DispatchOutcome::rejected(matching_command_code(e)?)),
        }
    }

    fn dispatch_move(&mut self, order_id: OrderId, to_price: Price) -> Result<DispatchOutcome, ShardError> {
        let Some(symbol_id) = self.matching.find_order(order_id) else {
            return Ok(DispatchOutcome::rejected(ResultCode::MatchingUnknownOrderId));
        };
        let action = self.matching.book(symbol_id)?.order(order_id).map(|o| o.action);
        match self.matching.move_order(order_id, to_price) {
            Ok(result) => {
                if let (Some(action), Ok(symbol)) = (action, self.symbols.get(symbol_id)) {
                    if symbol.margin_coefficients().is_some() {
                        let quote_currency = symbol.core().quote_currency;
                        self.apply_margin_events(symbol_id, quote_currency, action, &result.events)?;
                    }
                }
                Ok(DispatchOutcome::from_matcher(result))
            }
            Err(e) => Ok(DispatchOutcome::rejected(matching_command_code(e)?)),
        }
    }

    fn dispatch_order_book_request(&mut self, symbol_id: SymbolId, depth: i32) -> Result<DispatchOutcome, ShardError> {
        let Ok(book) = self.matching.book(symbol_id) else {
            return Ok(DispatchOutcome::rejected(ResultCode::InvalidSymbol));
        };
        let depth = depth.max(0) as usize;
        let view = OrderBookView {
            bids: book.fill_bids(depth),
            asks: book.fill_asks(depth),
        };
        Ok(DispatchOutcome {
            result_code: ResultCode::Success,
            events: EventChain::new(),
            book_view: Some(view),
        })
    }

    fn dispatch_add_user(&mut self, user_id: UserId) -> Result<DispatchOutcome, ShardError> {
        match handle_risk(self.risk.add_user(user_id))? {
            Ok(()) => Ok(DispatchOutcome::accepted()),
            Err(code) => Ok(DispatchOutcome::rejected(code)),
        }
    }

    fn dispatch_balance_adj(
        &mut self,
        user_id: UserId,
        currency: Currency,
        txid: i64,
        amount: i64,
        kind: BalanceAdjustmentType,
    ) -> Result<DispatchOutcome, ShardError> {
        let signed_amount = match kind {
            BalanceAdjustmentType::Deposit => amount,
            BalanceAdjustmentType::Withdrawal => -amount,
        };
        match handle_risk(self.risk.apply_balance_adjustment(user_id, currency, signed_amount, txid))? {
            Ok(outcome) => {
                let code = match outcome {
                    BalanceAdjOutcome::Applied => ResultCode::Success,
                    BalanceAdjOutcome::AlreadyAppliedSame => ResultCode::UserMgmtAccountBalanceAdjustmentAlreadyAppliedSame,
                    BalanceAdjOutcome::AlreadyAppliedMany => ResultCode::UserMgmtAccountBalanceAdjustmentAlreadyAppliedMany,
                    BalanceAdjOutcome::Zero => ResultCode::UserMgmtAccountBalanceAdjustmentZero,
                    BalanceAdjOutcome::Nsf => ResultCode::UserMgmtAccountBalanceAdjustmentNsf,
                };
                Ok(DispatchOutcome { result_code: code, events: EventChain::new(), book_view: None })
            }
            Err(code) => Ok(DispatchOutcome::rejected(code)),
        }
    }

    fn dispatch_suspend_user(&mut self, user_id: UserId) -> Result<DispatchOutcome, ShardError> {
        match handle_risk(self.risk.suspend_user(user_id))? {
            Ok(()) => Ok(DispatchOutcome::accepted()),
            Err(code) => Ok(DispatchOutcome::rejected(code)),
        }
    }

    fn dispatch_resume_user(&mut self, user_id: UserId) -> Result<DispatchOutcome, ShardError> {
        match handle_risk(self.risk.resume_user(user_id))? {
            Ok(()) => Ok(DispatchOutcome::accepted()),
            Err(code) => Ok(DispatchOutcome::rejected(code)),
        }
    }

    fn dispatch_add_symbols(&mut self, symbols: Vec<(SymbolId, common::SymbolWire)>) -> Result<DispatchOutcome, ShardError> {
        let mut code = ResultCode::Success;
        for (symbol_id, wire) in symbols {
            let symbol: instrument::Symbol = wire.into();
            match self.symbols.add(symbol) {
                Ok(()) => {
                    if !self.matching.has_book(symbol_id) {
                        self.matching.add_book(symbol_id)?;
                    }
                }
                Err(InstrumentError::AlreadyExists(_)) => code = ResultCode::SymbolMgmtSymbolAlreadyExists,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(DispatchOutcome { result_code: code, events: EventChain::new(), book_view: None })
    }

    /// The matching-engine snapshot also carries the symbol registry:
    /// both describe "which symbols this shard knows about and how
    /// their books are set up", and folding them together means a
    /// replay only needs to load the two engine snapshots to have a
    /// fully populated registry, with no separate catalog file to keep
    /// in sync.
    fn dispatch_persist_matching(&mut self) -> Result<DispatchOutcome, ShardError> {
        let mut bytes = common::codec::WriteBuf::new();
        self.matching.encode(&mut bytes);
        self.symbols.encode(&mut bytes);
        storage::write_snapshot(&self.dir, self.exchange_id, self.snapshot_id, SnapshotCategory::MatchingEngine, self.instance_id, &bytes)?;
        Ok(DispatchOutcome::accepted())
    }

    /// Persisting risk state is also the chain-rebase point: it closes
    /// out the current journal/snapshot pair and opens a fresh one
    /// based at the persisting sequence.
    fn dispatch_persist_risk(&mut self, seq: i64, timestamp_ns: i64) -> Result<DispatchOutcome, ShardError> {
        let mut bytes = common::codec::WriteBuf::new();
        self.risk.encode(&mut bytes);
        storage::write_snapshot(&self.dir, self.exchange_id, self.snapshot_id, SnapshotCategory::RiskEngine, self.instance_id, &bytes)?;

        let prev_snapshot_id = self.snapshot_id;
        let new_snapshot_id = seq;

        self.snapshots.register_snapshot(SnapshotDescriptor {
            snapshot_id: new_snapshot_id,
            seq,
            timestamp_ns,
            num_risk_engines: 1,
            num_matching_engines: 1,
            prev_snapshot_id: Some(prev_snapshot_id),
        });
        self.snapshots.register_journal(JournalDescriptor {
            base_snapshot_id: new_snapshot_id,
            seq_first: seq + 1,
            seq_last: None,
            timestamp_ns,
            partition: 0,
        });

        self.snapshot_id = new_snapshot_id;
        self.journal = JournalWriter::open(&self.dir, self.exchange_id, new_snapshot_id, self.journal_config.clone())?;
        Ok(DispatchOutcome::accepted())
    }

    /// Clears all engine state, keeping the symbol catalog (an
    /// administrative registry, not trading state) but rebuilding an
    /// empty book for every symbol already known, so a subsequent Place
    /// on an existing symbol needs no new `AddSymbols`.
    fn dispatch_reset(&mut self) -> Result<DispatchOutcome, ShardError> {
        self.risk.reset();
        self.matching.reset();
        for symbol_id in self.symbols.symbol_ids() {
            self.matching.add_book(symbol_id)?;
        }
        self.snapshots.reset();
        self.snapshot_id = 0;
        self.journal.reset_enable_gate();
        Ok(DispatchOutcome::accepted())
    }

    /// Applies the risk-engine side effects of an order's matching: a
    /// fill folds into both sides' margin positions (which internally
    /// releases the matched quantity's hold), a reject or
    /// duplicate-id rejection releases the held quantity outright.
    fn apply_margin_events(
        &mut self,
        symbol_id: SymbolId,
        quote_currency: Currency,
        taker_action: Action,
        events: &EventChain,
    ) -> Result<(), ShardError> {
        let maker_action = taker_action.opposite();
        for event in events.iter() {
            match event {
                MatchingEvent::Trade { maker_user_id, taker_user_id, price, quantity, .. } => {
                    self.risk.update_for_trade(*maker_user_id, symbol_id, quote_currency, maker_action, *quantity, *price)?;
                    self.risk.update_for_trade(*taker_user_id, symbol_id, quote_currency, taker_action, *quantity, *price)?;
                }
                MatchingEvent::Reject { user_id, quantity, action, .. } => {
                    self.risk.release_pending(*user_id, symbol_id, quote_currency, *action, *quantity)?;
                }
                MatchingEvent::Reduce { .. } => {}
            }
        }
        Ok(())
    }

    /// Releases held margin for an explicit Cancel/Reduce's `Reduce`
    /// event. A no-op for non-margined symbols or orders that weren't
    /// found (nothing was ever held).
    fn release_margin_for_reduce(
        &mut self,
        user_id: UserId,
        symbol_id: SymbolId,
        action: Option<Action>,
        events: &EventChain,
    ) -> Result<(), ShardError> {
        let Some(action) = action else { return Ok(()) };
        let Ok(symbol) = self.symbols.get(symbol_id) else { return Ok(()) };
        if symbol.margin_coefficients().is_none() {
            return Ok(());
        }
        let quote_currency = symbol.core().quote_currency;
        for event in events.iter() {
            if let MatchingEvent::Reduce { quantity, .. } = event {
                self.risk.release_pending(user_id, symbol_id, quote_currency, action, *quantity)?;
            }
        }
        Ok(())
    }
}
