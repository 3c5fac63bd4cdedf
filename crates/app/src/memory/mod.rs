//! In-memory backend
//!
//! Implements every persistence port on plain collections behind one lock. Each call holds the
//! lock for its whole duration, which gives the same all-or-nothing behaviour as the
//! transactions of the `PostgreSQL` services. Used by tests and by the CLI demo mode.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::{
    clock::{Clock, SystemClock},
    domain::{
        addresses::models::Address,
        credits::{
            CreditsServiceError,
            models::{CreditRecord, NewCredit},
        },
        history::models::HistoryRecord,
        invoices::models::InvoiceRecord,
        ledger::models::{LedgerRecord, NewLedgerRecord},
        reservations::models::ReservationRecord,
    },
    tasks::ScheduledTask,
};

mod accounting;
mod addresses;
mod credits;
mod history;
mod invoices;
mod ledger;
mod reservations;
mod tasks;

/// First identifier handed out unless configured otherwise.
pub const DEFAULT_FIRST_IDENTIFIER: u64 = 1000;

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    next_identifier: u64,
    history: Vec<HistoryRecord>,
    ledger: Vec<LedgerRecord>,
    credits: Vec<CreditRecord>,
    reservations: FxHashMap<u64, ReservationRecord>,
    invoices: Vec<InvoiceRecord>,
    addresses: Vec<Address>,
    tasks: Vec<ScheduledTask>,
}

impl MemoryState {
    fn take_identifier(&mut self) -> u64 {
        let identifier = self.next_identifier;
        self.next_identifier += 1;
        identifier
    }

    fn next_id<T>(rows: &[T], id: impl Fn(&T) -> u64) -> u64 {
        rows.iter().map(id).max().unwrap_or(0) + 1
    }

    fn history_mut(&mut self, id: u64) -> Option<&mut HistoryRecord> {
        self.history.iter_mut().find(|record| record.id == id)
    }

    fn balance(&self, userid: u64) -> Decimal {
        self.credits
            .iter()
            .rev()
            .find(|credit| credit.userid == userid)
            .map_or(Decimal::ZERO, |credit| credit.balance)
    }

    fn push_credit(
        &mut self,
        credit: NewCredit,
        now: Timestamp,
    ) -> Result<CreditRecord, CreditsServiceError> {
        let balance = self.balance(credit.userid) + credit.amount;

        if balance < Decimal::ZERO {
            return Err(CreditsServiceError::InsufficientBalance);
        }

        let record = CreditRecord {
            id: Self::next_id(&self.credits, |credit| credit.id),
            userid: credit.userid,
            amount: credit.amount,
            balance,
            currency: credit.currency,
            reason: credit.reason,
            identifier: credit.identifier,
            created_by: credit.created_by,
            created_at: now,
        };

        self.credits.push(record.clone());

        Ok(record)
    }

    /// Append unless a row with the same key exists.
    fn insert_ledger(&mut self, entry: NewLedgerRecord, now: Timestamp) -> Option<LedgerRecord> {
        let key = entry.conflict_key();
        let exists = self.ledger.iter().any(|existing| {
            (
                existing.identifier,
                existing.item_id,
                existing.component.as_str(),
                existing.area.as_str(),
                existing.kind,
            ) == key
        });

        if exists {
            return None;
        }

        let record = entry.into_record(Self::next_id(&self.ledger, |entry| entry.id), now);
        self.ledger.push(record.clone());

        Some(record)
    }
}

/// Every persistence port in one process-local store.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_identifier: DEFAULT_FIRST_IDENTIFIER,
                ..MemoryState::default()
            }),
            clock,
        }
    }

    /// Start identifiers at `first` instead of [`DEFAULT_FIRST_IDENTIFIER`].
    #[must_use]
    pub fn with_next_identifier(self, first: u64) -> Self {
        let mut state = self.state.into_inner();
        state.next_identifier = first;

        Self {
            state: Mutex::new(state),
            clock: self.clock,
        }
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}
