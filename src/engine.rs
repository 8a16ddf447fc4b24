//! The ledger posting engine: the only component that mutates the ledger.
//!
//! Posting is all-or-nothing. The engine re-validates the proposed journal
//! entry, computes every affected account's new running balance from a read
//! snapshot, then hands the whole batch to the store's atomic commit. On any
//! failure the caller gets a typed error and nothing has changed.

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::chart::ControlAccounts;
use crate::documents::{Document, DocumentKind, DocumentStatus};
use crate::tax::TaxCodeRegistry;
use crate::traits::{LedgerStore, PostingBatch};
use crate::translator::Translator;
use crate::types::{
    Account, JournalEntry, JournalEntryId, LedgerEntry, LedgerError, LedgerResult,
};

/// What a successful posting call returns to the surrounding service:
/// a reference usable for audit and the document's advanced status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingOutcome {
    pub journal_entry_id: JournalEntryId,
    pub status: DocumentStatus,
}

/// Report of a ledger consistency audit.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub as_of_date: NaiveDate,
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// The posting engine, bound to one storage backend.
///
/// `&mut self` on every posting path serializes postings through this
/// handle; the store's `commit_posting` is the transaction boundary that
/// keeps concurrent readers consistent. Postings racing through separate
/// engine handles over one shared store are serialized by the store's
/// ledger-sequence check: the loser gets [`LedgerError::Conflict`].
#[derive(Debug)]
pub struct PostingEngine<S: LedgerStore> {
    store: S,
    taxes: TaxCodeRegistry,
    controls: ControlAccounts,
}

impl<S: LedgerStore> PostingEngine<S> {
    /// Build an engine, failing fast if any control account is missing from
    /// the chart rather than failing per transaction later.
    pub async fn new(
        store: S,
        taxes: TaxCodeRegistry,
        controls: ControlAccounts,
    ) -> LedgerResult<Self> {
        controls.validate(&store).await?;
        Ok(Self {
            store,
            taxes,
            controls,
        })
    }

    /// Read access to the underlying store, for the report layer.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn controls(&self) -> &ControlAccounts {
        &self.controls
    }

    /// Translate a document into its journal entry and post it.
    ///
    /// Idempotency guard: a document posts at most once; re-submitting an
    /// already-posted document returns [`LedgerError::AlreadyPosted`] instead
    /// of silently re-applying it.
    pub async fn translate_and_post(&mut self, document_id: &str) -> LedgerResult<PostingOutcome> {
        let mut document = self.require_document(document_id).await?;
        if document.is_posted() {
            warn!(document_id, "rejected double posting attempt");
            return Err(LedgerError::AlreadyPosted(document_id.to_string()));
        }
        if !document.status.can_transition_to(DocumentStatus::Posted) {
            return Err(LedgerError::InvalidStatus(format!(
                "document {} cannot be posted from {:?}",
                document.id, document.status
            )));
        }

        let translator = Translator::new(&self.taxes, &self.controls);
        let journal = translator.translate(&document)?;

        document.journal_entry_id = Some(journal.id);
        document.transition_to(DocumentStatus::Posted)?;
        // A credit note settles nothing; it only reverses receivable value.
        document.balance_due = match document.kind {
            DocumentKind::CreditNote => BigDecimal::from(0),
            _ => document.gross_total(&self.taxes),
        };

        let outcome = self.post(journal, document).await?;
        info!(
            document_id,
            journal_entry_id = %outcome.journal_entry_id,
            "document posted"
        );
        Ok(outcome)
    }

    /// Apply a receipt of `amount` (with `tds` withheld) against a posted
    /// receivable document, keeping its balance due and status in sync.
    pub async fn apply_receipt(
        &mut self,
        document_id: &str,
        amount: BigDecimal,
        tds: BigDecimal,
        received_on: NaiveDate,
    ) -> LedgerResult<PostingOutcome> {
        let mut document = self.require_settleable(document_id).await?;
        if !document.kind.is_receivable() {
            return Err(LedgerError::Validation(format!(
                "document {} is not on the receivable side",
                document.id
            )));
        }
        Self::check_outstanding(&document, &amount)?;

        let translator = Translator::new(&self.taxes, &self.controls);
        let journal = translator.translate_receipt(&document, &amount, &tds, received_on)?;

        document.balance_due = &document.balance_due - &amount;
        let next = if document.balance_due == BigDecimal::from(0) {
            DocumentStatus::Paid
        } else {
            DocumentStatus::Partial
        };
        document.transition_to(next)?;

        self.post(journal, document).await
    }

    /// Apply a payment against a posted bill or expense claim; the
    /// payable-side mirror of [`apply_receipt`](Self::apply_receipt).
    pub async fn apply_payment(
        &mut self,
        document_id: &str,
        amount: BigDecimal,
        tds: BigDecimal,
        paid_on: NaiveDate,
    ) -> LedgerResult<PostingOutcome> {
        let mut document = self.require_settleable(document_id).await?;
        if document.kind.is_receivable() {
            return Err(LedgerError::Validation(format!(
                "document {} is not on the payable side",
                document.id
            )));
        }
        Self::check_outstanding(&document, &amount)?;

        let translator = Translator::new(&self.taxes, &self.controls);
        let journal = translator.translate_payment(&document, &amount, &tds, paid_on)?;

        document.balance_due = &document.balance_due - &amount;
        let next = if document.balance_due == BigDecimal::from(0) {
            DocumentStatus::Paid
        } else {
            DocumentStatus::Partial
        };
        document.transition_to(next)?;

        self.post(journal, document).await
    }

    /// Apply a validated journal entry: compute running balances in line
    /// order, build the ledger entries and refreshed account caches, and
    /// commit the batch atomically together with the document update.
    ///
    /// The balances come from a read snapshot; the store's sequence check in
    /// `commit_posting` rejects the batch with [`LedgerError::Conflict`] if
    /// another posting touched one of these accounts in between. The caller
    /// may retry, which recomputes from fresh state.
    async fn post(
        &mut self,
        journal: JournalEntry,
        document: Document,
    ) -> LedgerResult<PostingOutcome> {
        // Never trust the caller's balance; re-validate here.
        journal.validate()?;

        // Account snapshot plus its last ledger sequence, keyed by code.
        let mut touched: HashMap<String, (Account, u64)> = HashMap::new();
        let mut ledger_entries = Vec::with_capacity(journal.lines.len());

        for line in &journal.lines {
            if !touched.contains_key(&line.account_code) {
                let account = self
                    .store
                    .get_account(&line.account_code)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(line.account_code.clone()))?;
                if !account.active {
                    return Err(LedgerError::AccountInactive(line.account_code.clone()));
                }
                let sequence = self
                    .store
                    .last_ledger_entry(&line.account_code)
                    .await?
                    .map(|e| e.sequence)
                    .unwrap_or(0);
                touched.insert(line.account_code.clone(), (account, sequence));
            }
            let (account, sequence) = touched
                .get_mut(&line.account_code)
                .ok_or_else(|| LedgerError::AccountNotFound(line.account_code.clone()))?;

            // The cached balance equals the last ledger entry's running
            // balance; the new one is a deterministic function of it.
            let new_balance = &account.current_balance + &line.debit - &line.credit;
            account.current_balance = new_balance.clone();
            *sequence += 1;

            ledger_entries.push(LedgerEntry {
                account_code: line.account_code.clone(),
                journal_entry_id: journal.id,
                entry_date: journal.entry_date,
                debit: line.debit.clone(),
                credit: line.credit.clone(),
                running_balance: new_balance,
                sequence: *sequence,
            });
        }

        debug!(
            journal_entry_id = %journal.id,
            lines = journal.lines.len(),
            total_debit = %journal.total_debit(),
            "committing posting batch"
        );

        let outcome = PostingOutcome {
            journal_entry_id: journal.id,
            status: document.status,
        };
        let batch = PostingBatch {
            journal,
            ledger_entries,
            accounts: touched.into_values().map(|(account, _)| account).collect(),
            document,
        };
        self.store.commit_posting(batch).await?;
        Ok(outcome)
    }

    async fn require_document(&self, document_id: &str) -> LedgerResult<Document> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| LedgerError::DocumentNotFound(document_id.to_string()))
    }

    /// A settlement target must have been posted and must not be cancelled.
    async fn require_settleable(&self, document_id: &str) -> LedgerResult<Document> {
        let document = self.require_document(document_id).await?;
        if !document.is_posted() {
            return Err(LedgerError::InvalidStatus(format!(
                "document {} has not been posted",
                document.id
            )));
        }
        if document.status == DocumentStatus::Cancelled {
            return Err(LedgerError::InvalidStatus(format!(
                "document {} is cancelled",
                document.id
            )));
        }
        Ok(document)
    }

    fn check_outstanding(document: &Document, amount: &BigDecimal) -> LedgerResult<()> {
        if *amount > document.balance_due {
            return Err(LedgerError::InsufficientBalance {
                document_id: document.id.clone(),
                amount: amount.clone(),
                balance_due: document.balance_due.clone(),
            });
        }
        Ok(())
    }

    /// Consistency audit: recompute every account's balance from its ledger
    /// entries and compare against the cached `current_balance`, then check
    /// that the full-history trial balance nets to zero. Read-only; intended
    /// for periodic verification, never as a repair pass.
    pub async fn audit_integrity(&self, as_of_date: NaiveDate) -> LedgerResult<IntegrityReport> {
        let mut issues = Vec::new();

        let accounts = self.store.list_accounts(None).await?;
        let mut net = BigDecimal::from(0);
        for account in &accounts {
            let entries = self.store.ledger_entries(Some(&account.code), None, None).await?;
            let replayed = entries.iter().fold(
                account.signed_opening_balance(),
                |balance, e| balance + &e.debit - &e.credit,
            );
            if replayed != account.current_balance {
                issues.push(format!(
                    "account {}: cached balance {} does not match ledger replay {}",
                    account.code, account.current_balance, replayed
                ));
            }
            if let Some(last) = entries.last() {
                if last.running_balance != account.current_balance {
                    issues.push(format!(
                        "account {}: cached balance {} does not match last running balance {}",
                        account.code, account.current_balance, last.running_balance
                    ));
                }
            }
            net += account.signed_opening_balance();
        }
        if net != BigDecimal::from(0) {
            issues.push(format!("opening balances do not net to zero: {net}"));
        }

        let all_entries = self.store.ledger_entries(None, None, None).await?;
        let total_debit: BigDecimal = all_entries.iter().map(|e| e.debit.clone()).sum();
        let total_credit: BigDecimal = all_entries.iter().map(|e| e.credit.clone()).sum();
        if total_debit != total_credit {
            issues.push(format!(
                "ledger does not balance: debits = {total_debit}, credits = {total_credit}"
            ));
        }

        Ok(IntegrityReport {
            as_of_date,
            is_valid: issues.is_empty(),
            issues,
        })
    }
}
