//! Human-readable order number issuance.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use domain::OrderNumber;
use store::{StoreError, Transaction};
use thiserror::Error;

/// Settings for order number issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Offset used to decide which calendar day an order belongs to.
    pub utc_offset: FixedOffset,
    /// How many times a checkout transaction is attempted before giving up
    /// on a conflicting order number.
    pub max_attempts: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            max_attempts: 3,
        }
    }
}

impl SequencerConfig {
    /// Uses the given offset east of UTC, in minutes.
    ///
    /// Returns `None` for offsets outside ±24h.
    pub fn with_offset_minutes(mut self, minutes: i32) -> Option<Self> {
        self.utc_offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
        Some(self)
    }

    /// Sets the attempt budget (at least one attempt is always made).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}

#[derive(Debug, Error)]
pub enum SequenceError {
    /// The day's counter ran past the largest representable sequence.
    #[error("order sequence for {0} exhausted")]
    Exhausted(NaiveDate),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues `ORD-YYYYMMDD-NNNNN` numbers from a per-day counter kept by the store.
///
/// The counter is advanced inside the caller's transaction, so numbers taken
/// by a rolled-back checkout are reissued and each day's sequence stays dense.
#[derive(Debug, Clone, Default)]
pub struct OrderSequencer {
    config: SequencerConfig,
}

impl OrderSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// The calendar day of `at` in the configured offset.
    pub fn day_for(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.config.utc_offset).date_naive()
    }

    /// Takes the next number for the day of `at`.
    pub async fn next<T: Transaction>(
        &self,
        tx: &mut T,
        at: DateTime<Utc>,
    ) -> Result<OrderNumber, SequenceError> {
        let day = self.day_for(at);
        let sequence = tx.next_order_sequence(day).await?;
        OrderNumber::new(day, sequence).map_err(|_| SequenceError::Exhausted(day))
    }
}
