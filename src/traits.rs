//! Storage abstraction for the posting engine.
//!
//! The engine works against any backend (PostgreSQL, SQLite, in-memory, ...)
//! that implements [`LedgerStore`]. The one hard requirement is that
//! [`LedgerStore::commit_posting`] applies a whole posting batch atomically:
//! readers must never observe a partially applied journal entry.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::documents::{Document, DocumentKind};
use crate::types::{
    Account, AccountCategory, JournalEntry, JournalEntryId, LedgerEntry, LedgerResult,
};

/// Everything one successful posting writes, committed as a unit.
///
/// The engine computes the full batch up front from a read snapshot; the
/// store either persists all of it or none of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingBatch {
    pub journal: JournalEntry,
    /// One per journal line, in line order, running balances precomputed.
    pub ledger_entries: Vec<LedgerEntry>,
    /// Accounts with their cached `current_balance` moved forward.
    pub accounts: Vec<Account>,
    /// The source document with its back-reference, status, and balance due
    /// updated.
    pub document: Document,
}

/// Storage backend contract.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    async fn get_account(&self, code: &str) -> LedgerResult<Option<Account>>;

    async fn list_accounts(
        &self,
        category: Option<AccountCategory>,
    ) -> LedgerResult<Vec<Account>>;

    async fn save_document(&mut self, document: &Document) -> LedgerResult<()>;

    async fn get_document(&self, id: &str) -> LedgerResult<Option<Document>>;

    async fn list_documents(&self, kind: Option<DocumentKind>) -> LedgerResult<Vec<Document>>;

    async fn get_journal_entry(&self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>>;

    async fn list_journal_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>>;

    /// Ledger entries, ordered by per-account sequence, optionally filtered
    /// by account and bounded by entry date.
    async fn ledger_entries(
        &self,
        account_code: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerEntry>>;

    /// Latest ledger entry for an account, if any has ever been posted.
    async fn last_ledger_entry(&self, account_code: &str) -> LedgerResult<Option<LedgerEntry>>;

    /// Apply one posting batch atomically. This is the transaction boundary:
    /// the journal entry, its ledger entries, the account balance caches, and
    /// the document update become visible together or not at all.
    ///
    /// The batch was computed from a read snapshot. Implementations must
    /// check, inside the same transaction, that each ledger entry's
    /// `sequence` extends its account's log by exactly one, and reject a
    /// stale batch with [`LedgerError::Conflict`]. This is what serializes
    /// concurrent postings against a shared account: the loser of a race
    /// gets a typed, retryable failure instead of forked running balances.
    ///
    /// [`LedgerError::Conflict`]: crate::types::LedgerError::Conflict
    async fn commit_posting(&mut self, batch: PostingBatch) -> LedgerResult<()>;
}
