//! In-memory storage backend for testing and development.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::documents::{Document, DocumentKind};
use crate::traits::{LedgerStore, PostingBatch};
use crate::types::{
    Account, AccountCategory, JournalEntry, JournalEntryId, LedgerEntry, LedgerError, LedgerResult,
};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    documents: HashMap<String, Document>,
    journal_entries: HashMap<JournalEntryId, JournalEntry>,
    /// Append-only; ordered by insertion, which is posting order.
    ledger_entries: Vec<LedgerEntry>,
}

/// In-memory [`LedgerStore`].
///
/// [`commit_posting`](LedgerStore::commit_posting) takes the write lock for
/// the whole batch, so concurrent readers see either none or all of a
/// posting. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all data; for tests.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = Inner::default();
    }
}

fn within(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    if let Some(start) = start {
        if date < start {
            return false;
        }
    }
    if let Some(end) = end {
        if date > end {
            return false;
        }
    }
    true
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.inner
            .write()
            .unwrap()
            .accounts
            .insert(account.code.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self.inner.read().unwrap().accounts.get(code).cloned())
    }

    async fn list_accounts(
        &self,
        category: Option<AccountCategory>,
    ) -> LedgerResult<Vec<Account>> {
        let inner = self.inner.read().unwrap();
        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| category.is_none_or(|c| a.category == c))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn save_document(&mut self, document: &Document) -> LedgerResult<()> {
        self.inner
            .write()
            .unwrap()
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> LedgerResult<Option<Document>> {
        Ok(self.inner.read().unwrap().documents.get(id).cloned())
    }

    async fn list_documents(&self, kind: Option<DocumentKind>) -> LedgerResult<Vec<Document>> {
        let inner = self.inner.read().unwrap();
        let mut documents: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| kind.is_none_or(|k| d.kind == k))
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    async fn get_journal_entry(&self, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.inner.read().unwrap().journal_entries.get(&id).cloned())
    }

    async fn list_journal_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<JournalEntry> = inner
            .journal_entries
            .values()
            .filter(|e| within(e.entry_date, start_date, end_date))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.entry_date, e.created_at));
        Ok(entries)
    }

    async fn ledger_entries(
        &self,
        account_code: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .ledger_entries
            .iter()
            .filter(|e| account_code.is_none_or(|code| e.account_code == code))
            .filter(|e| within(e.entry_date, start_date, end_date))
            .cloned()
            .collect())
    }

    async fn last_ledger_entry(&self, account_code: &str) -> LedgerResult<Option<LedgerEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .ledger_entries
            .iter()
            .rev()
            .find(|e| e.account_code == account_code)
            .cloned())
    }

    async fn commit_posting(&mut self, batch: PostingBatch) -> LedgerResult<()> {
        // Single write lock for the whole batch: the transaction boundary.
        let mut inner = self.inner.write().unwrap();
        if inner.journal_entries.contains_key(&batch.journal.id) {
            return Err(LedgerError::Storage(format!(
                "journal entry {} already committed",
                batch.journal.id
            )));
        }
        for account in &batch.accounts {
            if !inner.accounts.contains_key(&account.code) {
                return Err(LedgerError::AccountNotFound(account.code.clone()));
            }
        }
        // The engine computed this batch from a read snapshot. If another
        // posting landed on one of these accounts in between, the batch's
        // sequences no longer extend the log; accepting it would fork the
        // running balances. Reject so the caller can recompute and retry.
        let mut staged: HashMap<&str, u64> = HashMap::new();
        for entry in &batch.ledger_entries {
            let last = match staged.get(entry.account_code.as_str()) {
                Some(seq) => *seq,
                None => inner
                    .ledger_entries
                    .iter()
                    .rev()
                    .find(|e| e.account_code == entry.account_code)
                    .map(|e| e.sequence)
                    .unwrap_or(0),
            };
            if entry.sequence != last + 1 {
                return Err(LedgerError::Conflict(format!(
                    "account {}: ledger sequence {} does not extend {}",
                    entry.account_code, entry.sequence, last
                )));
            }
            staged.insert(entry.account_code.as_str(), entry.sequence);
        }

        inner
            .journal_entries
            .insert(batch.journal.id, batch.journal);
        inner.ledger_entries.extend(batch.ledger_entries);
        for account in batch.accounts {
            inner.accounts.insert(account.code.clone(), account);
        }
        inner
            .documents
            .insert(batch.document.id.clone(), batch.document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JournalKind;
    use bigdecimal::BigDecimal;
    use uuid::Uuid;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn ledger_entry(account: &str, d: u32, seq: u64) -> LedgerEntry {
        LedgerEntry {
            account_code: account.to_string(),
            journal_entry_id: Uuid::new_v4(),
            entry_date: date(d),
            debit: BigDecimal::from(100),
            credit: BigDecimal::from(0),
            running_balance: BigDecimal::from(100 * seq as i64),
            sequence: seq,
        }
    }

    #[tokio::test]
    async fn accounts_round_trip() {
        let mut store = MemoryStore::new();
        let account = Account::new("1000", "Bank", AccountCategory::Asset);
        store.save_account(&account).await.unwrap();
        assert_eq!(store.get_account("1000").await.unwrap(), Some(account));
        assert!(store.get_account("9999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ledger_entries_filter_by_account_and_date() {
        let store = MemoryStore::new();
        {
            let mut inner = store.inner.write().unwrap();
            inner.ledger_entries.push(ledger_entry("1000", 1, 1));
            inner.ledger_entries.push(ledger_entry("1000", 10, 2));
            inner.ledger_entries.push(ledger_entry("2000", 5, 1));
        }
        let all = store.ledger_entries(None, None, None).await.unwrap();
        assert_eq!(all.len(), 3);
        let bank = store
            .ledger_entries(Some("1000"), None, Some(date(5)))
            .await
            .unwrap();
        assert_eq!(bank.len(), 1);
        let last = store.last_ledger_entry("1000").await.unwrap().unwrap();
        assert_eq!(last.sequence, 2);
    }

    #[tokio::test]
    async fn commit_rejects_duplicate_journal_id() {
        let mut store = MemoryStore::new();
        let account = Account::new("1000", "Bank", AccountCategory::Asset);
        store.save_account(&account).await.unwrap();

        let journal = JournalEntry {
            id: Uuid::new_v4(),
            entry_date: date(1),
            kind: JournalKind::Invoice,
            document_id: "INV-1".to_string(),
            lines: vec![],
            narration: "x".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        let document = Document::new(
            "INV-1",
            DocumentKind::Invoice,
            "Acme",
            date(1),
            date(30),
            false,
            vec![crate::documents::DocumentLine::new(
                "4000",
                "x",
                BigDecimal::from(1),
                BigDecimal::from(1),
            )],
        );
        let batch = PostingBatch {
            journal: journal.clone(),
            ledger_entries: vec![],
            accounts: vec![account],
            document,
        };
        store.commit_posting(batch.clone()).await.unwrap();
        let err = store.commit_posting(batch).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[tokio::test]
    async fn commit_rejects_a_batch_with_stale_sequences() {
        let mut store = MemoryStore::new();
        let account = Account::new("1000", "Bank", AccountCategory::Asset);
        store.save_account(&account).await.unwrap();

        let document = Document::new(
            "INV-1",
            DocumentKind::Invoice,
            "Acme",
            date(1),
            date(30),
            false,
            vec![crate::documents::DocumentLine::new(
                "4000",
                "x",
                BigDecimal::from(1),
                BigDecimal::from(1),
            )],
        );
        let batch_with = |seq: u64| PostingBatch {
            journal: JournalEntry {
                id: Uuid::new_v4(),
                entry_date: date(1),
                kind: JournalKind::Invoice,
                document_id: "INV-1".to_string(),
                lines: vec![],
                narration: "x".to_string(),
                created_at: chrono::Utc::now().naive_utc(),
            },
            ledger_entries: vec![ledger_entry("1000", 1, seq)],
            accounts: vec![account.clone()],
            document: document.clone(),
        };

        store.commit_posting(batch_with(1)).await.unwrap();

        // A second batch computed from the same snapshot repeats sequence 1;
        // accepting it would fork the running balances.
        let err = store.commit_posting(batch_with(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        // Gaps are just as stale.
        let err = store.commit_posting(batch_with(3)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        // The log still extends normally.
        store.commit_posting(batch_with(2)).await.unwrap();
        let last = store.last_ledger_entry("1000").await.unwrap().unwrap();
        assert_eq!(last.sequence, 2);
    }
}
