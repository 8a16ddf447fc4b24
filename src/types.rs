//! Core data model for the posting engine: accounts, journal entries,
//! ledger entries, and the error taxonomy shared by every component.

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of decimal places of the smallest currency unit.
pub const CURRENCY_SCALE: i64 = 2;

/// Round an amount to the smallest currency unit (half-up).
pub fn round_currency(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(CURRENCY_SCALE, RoundingMode::HalfUp)
}

/// Account categories following standard accounting principles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountCategory {
    /// What the business owns (Cash, Receivables, Inventory, ...).
    Asset,
    /// What the business owes (Payables, Output GST, Loans, ...).
    Liability,
    /// Owner's interest in the business.
    Equity,
    /// Money earned by the business.
    Revenue,
    /// Costs incurred by the business.
    Expense,
}

impl AccountCategory {
    /// The side on which this category naturally accumulates value.
    ///
    /// This is the single sign-convention policy; every report consults it
    /// rather than hard-coding debit/credit arithmetic per statement.
    pub fn normal_side(&self) -> Side {
        match self {
            AccountCategory::Asset | AccountCategory::Expense => Side::Debit,
            AccountCategory::Liability | AccountCategory::Equity | AccountCategory::Revenue => {
                Side::Credit
            }
        }
    }
}

/// One side of a double-entry movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// A ledger account.
///
/// `current_balance` is a write-through cache of the latest [`LedgerEntry`]'s
/// running balance for this account. It is mutated exclusively by the posting
/// engine inside the same commit that appends the ledger entries; the
/// append-only ledger log stays the single source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique, human-assigned account code (e.g. "1200").
    pub code: String,
    /// Human-readable name (e.g. "Accounts Receivable").
    pub name: String,
    /// Category, which fixes the normal balance side.
    pub category: AccountCategory,
    /// Balance carried in at setup time, stated on the account's normal side.
    pub opening_balance: BigDecimal,
    /// Signed running balance (debits - credits), cached from the ledger.
    pub current_balance: BigDecimal,
    /// Accounts are never deleted, only deactivated.
    pub active: bool,
    pub created_at: NaiveDateTime,
}

impl Account {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        category: AccountCategory,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            category,
            opening_balance: BigDecimal::from(0),
            current_balance: BigDecimal::from(0),
            active: true,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Sets the opening balance and primes the cached running balance with
    /// its signed value, so the first posting continues from it.
    pub fn with_opening_balance(mut self, opening: BigDecimal) -> Self {
        self.opening_balance = opening;
        self.current_balance = self.signed_opening_balance();
        self
    }

    /// Opening balance expressed debit-positive, for running-balance math.
    pub fn signed_opening_balance(&self) -> BigDecimal {
        match self.category.normal_side() {
            Side::Debit => self.opening_balance.clone(),
            Side::Credit => -self.opening_balance.clone(),
        }
    }
}

/// Identifier of a posted journal entry.
pub type JournalEntryId = Uuid;

/// The kind of business event a journal entry was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    Invoice,
    CreditNote,
    Bill,
    ExpenseClaim,
    Receipt,
    Payment,
}

/// One movement inside a journal entry. Exactly one of `debit`/`credit` is
/// non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Preserves insertion order; lines are applied in this order.
    pub line_no: u32,
    pub account_code: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub description: String,
    pub cost_center: Option<String>,
}

impl JournalLine {
    pub fn debit(
        account_code: impl Into<String>,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            line_no: 0,
            account_code: account_code.into(),
            debit: amount,
            credit: BigDecimal::from(0),
            description: description.into(),
            cost_center: None,
        }
    }

    pub fn credit(
        account_code: impl Into<String>,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            line_no: 0,
            account_code: account_code.into(),
            debit: BigDecimal::from(0),
            credit: amount,
            description: description.into(),
            cost_center: None,
        }
    }

    /// Signed movement, debit-positive.
    pub fn signed_amount(&self) -> BigDecimal {
        &self.debit - &self.credit
    }
}

/// A balanced set of movements produced from one business event.
///
/// A journal entry is posted from the moment it exists; the engine never
/// materializes an unposted journal state for generated entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub entry_date: NaiveDate,
    pub kind: JournalKind,
    /// Back-reference to the source document this entry was produced from.
    pub document_id: String,
    pub lines: Vec<JournalLine>,
    pub narration: String,
    pub created_at: NaiveDateTime,
}

impl JournalEntry {
    pub fn total_debit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    pub fn total_credit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Balance invariant: sum of debits equals sum of credits exactly, to the
    /// smallest currency unit. No tolerance.
    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::Validation(
                "journal entry must have at least two lines".to_string(),
            ));
        }
        let zero = BigDecimal::from(0);
        for line in &self.lines {
            if line.debit < zero || line.credit < zero {
                return Err(LedgerError::Validation(format!(
                    "line {} has a negative amount",
                    line.line_no
                )));
            }
            let debit_set = line.debit != zero;
            let credit_set = line.credit != zero;
            if debit_set == credit_set {
                return Err(LedgerError::Validation(format!(
                    "line {} must carry exactly one of debit or credit",
                    line.line_no
                )));
            }
        }
        if !self.is_balanced() {
            return Err(LedgerError::UnbalancedEntry {
                debits: self.total_debit(),
                credits: self.total_credit(),
            });
        }
        Ok(())
    }
}

/// Immutable per-account projection of one journal line, carrying the
/// account's running balance after the movement. Append-only; the sole source
/// of truth for all reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account_code: String,
    pub journal_entry_id: JournalEntryId,
    pub entry_date: NaiveDate,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    /// Signed (debits - credits) balance of the account after this entry,
    /// opening balance included.
    pub running_balance: BigDecimal,
    /// Total order of postings within one account.
    pub sequence: u64,
}

/// Errors surfaced by the posting engine and its collaborators.
///
/// All of these are recovered at the boundary of the single posting call:
/// the caller receives a typed failure and ledger/document state is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unbalanced entry: debits = {debits}, credits = {credits}")]
    UnbalancedEntry {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("missing control account: {0}")]
    MissingControlAccount(String),
    #[error("document {0} is already posted")]
    AlreadyPosted(String),
    #[error("posting conflict: {0}")]
    Conflict(String),
    #[error("amount {amount} exceeds outstanding balance {balance_due} on document {document_id}")]
    InsufficientBalance {
        document_id: String,
        amount: BigDecimal,
        balance_due: BigDecimal,
    },
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("account is inactive: {0}")]
    AccountInactive(String),
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("journal entry not found: {0}")]
    JournalNotFound(String),
    #[error("invalid status transition: {0}")]
    InvalidStatus(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias used across the crate.
pub type LedgerResult<T> = Result<T, LedgerError>;
