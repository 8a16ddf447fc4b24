//! # Ledger Engine
//!
//! A double-entry posting and financial statement derivation library for
//! small-business accounting, with Indian GST tax resolution built in.
//!
//! ## Features
//!
//! - **Chart of accounts**: Typed account registry with the five categories
//!   and a single normal-side sign policy
//! - **GST resolution**: Intrastate CGST/SGST split vs interstate IGST, with
//!   cess on top and residual-cent absorption
//! - **Document translation**: Invoices, credit notes, bills, expense claims,
//!   receipts and payments (with TDS) into balanced journal entries
//! - **Atomic posting**: All-or-nothing ledger commits with running balances
//!   and a double-posting guard
//! - **Reports**: Trial balance, profit and loss, balance sheet, cash flow,
//!   AR/AP aging and budget vs actual, all derived read-only from the ledger
//! - **Storage abstraction**: Database-agnostic design with a trait-based
//!   store and an in-memory implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use ledger_engine::{
//!     standard_chart, ChartOfAccounts, ControlAccounts, MemoryStore,
//!     PostingEngine, TaxCodeRegistry,
//! };
//!
//! # async fn demo() -> ledger_engine::LedgerResult<()> {
//! let store = MemoryStore::new();
//! let mut chart = ChartOfAccounts::new(store.clone());
//! standard_chart(&mut chart).await?;
//!
//! let mut engine = PostingEngine::new(
//!     store,
//!     TaxCodeRegistry::standard(),
//!     ControlAccounts::standard(),
//! )
//! .await?;
//! // Save a document through the store, then:
//! // engine.translate_and_post("INV-001").await?;
//! # Ok(())
//! # }
//! ```

pub mod chart;
pub mod documents;
pub mod engine;
pub mod reports;
pub mod store;
pub mod tax;
pub mod traits;
pub mod translator;
pub mod types;

// Re-export the common surface
pub use chart::{standard_chart, ChartOfAccounts, ControlAccounts, TaxComponent};
pub use documents::{Document, DocumentKind, DocumentLine, DocumentStatus};
pub use engine::{IntegrityReport, PostingEngine, PostingOutcome};
pub use reports::{
    aging, balance_sheet, budget_vs_actual, cash_flow, profit_and_loss, run_report,
    trial_balance, AgingReport, AgingSide, BalanceSheet, BudgetComparison, BudgetLine,
    CashFlowStatement, ProfitAndLoss, Report, ReportKind, ReportRange, TrialBalance,
};
pub use store::MemoryStore;
pub use tax::{resolve, TaxBreakdown, TaxCode, TaxCodeRegistry};
pub use traits::{LedgerStore, PostingBatch};
pub use translator::{JournalBuilder, Translator};
pub use types::{
    round_currency, Account, AccountCategory, JournalEntry, JournalEntryId, JournalKind,
    JournalLine, LedgerEntry, LedgerError, LedgerResult, Side,
};
