//! Financial statement derivation: pure read-side aggregation over the
//! append-only ledger log. Nothing in this module mutates state, so every
//! report can run concurrently with postings and with itself, and any report
//! can be recomputed later from the same history with the same result.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chart::ControlAccounts;
use crate::documents::{DocumentKind, DocumentStatus};
use crate::traits::LedgerStore;
use crate::types::{Account, AccountCategory, LedgerError, LedgerResult, Side};

/// Reporting-layer tolerance for the balance-sheet check. Historical data
/// may carry rounding noise; posted entries never do, and the posting-time
/// invariant stays exact.
fn balance_sheet_epsilon() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

/// Sum of debits and credits over an account's ledger entries in a window.
async fn account_totals<S: LedgerStore>(
    store: &S,
    account_code: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> LedgerResult<(BigDecimal, BigDecimal)> {
    let entries = store.ledger_entries(Some(account_code), start, end).await?;
    let debit = entries.iter().map(|e| e.debit.clone()).sum();
    let credit = entries.iter().map(|e| e.credit.clone()).sum();
    Ok((debit, credit))
}

/// Balance of one account over a window, oriented to its normal side.
fn oriented(account: &Account, debit: &BigDecimal, credit: &BigDecimal) -> BigDecimal {
    match account.category.normal_side() {
        Side::Debit => debit - credit,
        Side::Credit => credit - debit,
    }
}

// ---------------------------------------------------------------------------
// Trial balance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_code: String,
    pub account_name: String,
    pub category: AccountCategory,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: Option<NaiveDate>,
    /// Non-zero accounts only, sorted by code.
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    /// Global consistency check: total debits equal total credits exactly.
    pub is_balanced: bool,
}

/// Net each account's ledger entries (optionally bounded by an as-of date)
/// into a debit or credit column.
pub async fn trial_balance<S: LedgerStore>(
    store: &S,
    as_of_date: Option<NaiveDate>,
) -> LedgerResult<TrialBalance> {
    let mut rows = Vec::new();
    let mut total_debit = zero();
    let mut total_credit = zero();

    for account in store.list_accounts(None).await? {
        let (debit, credit) = account_totals(store, &account.code, None, as_of_date).await?;
        let net = account.signed_opening_balance() + &debit - &credit;
        if net == zero() {
            continue;
        }
        let (row_debit, row_credit) = if net > zero() {
            (net, zero())
        } else {
            (zero(), -net)
        };
        total_debit += &row_debit;
        total_credit += &row_credit;
        rows.push(TrialBalanceRow {
            account_code: account.code,
            account_name: account.name,
            category: account.category,
            debit: row_debit,
            credit: row_credit,
        });
    }

    rows.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    let is_balanced = total_debit == total_credit;
    Ok(TrialBalance {
        as_of_date,
        rows,
        total_debit,
        total_credit,
        is_balanced,
    })
}

// ---------------------------------------------------------------------------
// Profit & loss
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub account_code: String,
    pub account_name: String,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue: Vec<StatementRow>,
    pub expenses: Vec<StatementRow>,
    pub total_revenue: BigDecimal,
    pub total_expenses: BigDecimal,
    pub net_income: BigDecimal,
}

/// Revenue reports credit - debit, expenses debit - credit, both via the
/// single normal-side policy, summed within the date range.
pub async fn profit_and_loss<S: LedgerStore>(
    store: &S,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> LedgerResult<ProfitAndLoss> {
    validate_range(start_date, end_date)?;
    let mut revenue = Vec::new();
    let mut expenses = Vec::new();

    for account in store.list_accounts(None).await? {
        let bucket = match account.category {
            AccountCategory::Revenue => &mut revenue,
            AccountCategory::Expense => &mut expenses,
            _ => continue,
        };
        let (debit, credit) =
            account_totals(store, &account.code, Some(start_date), Some(end_date)).await?;
        let amount = oriented(&account, &debit, &credit);
        if amount == zero() {
            continue;
        }
        bucket.push(StatementRow {
            account_code: account.code,
            account_name: account.name,
            amount,
        });
    }

    revenue.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    expenses.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    let total_revenue: BigDecimal = revenue.iter().map(|r| r.amount.clone()).sum();
    let total_expenses: BigDecimal = expenses.iter().map(|r| r.amount.clone()).sum();
    let net_income = &total_revenue - &total_expenses;
    Ok(ProfitAndLoss {
        start_date,
        end_date,
        revenue,
        expenses,
        total_revenue,
        total_expenses,
        net_income,
    })
}

// ---------------------------------------------------------------------------
// Balance sheet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of_date: NaiveDate,
    pub assets: Vec<StatementRow>,
    pub liabilities: Vec<StatementRow>,
    pub equity: Vec<StatementRow>,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_equity: BigDecimal,
    /// Assets == liabilities + equity within the reporting epsilon.
    pub is_balanced: bool,
}

/// Assets report debit - credit + opening; liabilities and equity report
/// credit - debit + opening; net income to date is folded into equity.
pub async fn balance_sheet<S: LedgerStore>(
    store: &S,
    as_of_date: NaiveDate,
) -> LedgerResult<BalanceSheet> {
    let mut assets = Vec::new();
    let mut liabilities = Vec::new();
    let mut equity = Vec::new();
    let mut net_income = zero();

    for account in store.list_accounts(None).await? {
        let (debit, credit) =
            account_totals(store, &account.code, None, Some(as_of_date)).await?;
        match account.category {
            AccountCategory::Revenue | AccountCategory::Expense => {
                // Flows into equity as retained earnings below.
                let amount = oriented(&account, &debit, &credit);
                match account.category {
                    AccountCategory::Revenue => net_income += amount,
                    _ => net_income -= amount,
                }
                continue;
            }
            _ => {}
        }
        let amount = oriented(&account, &debit, &credit) + &account.opening_balance;
        if amount == zero() {
            continue;
        }
        let row = StatementRow {
            account_code: account.code,
            account_name: account.name,
            amount,
        };
        match account.category {
            AccountCategory::Asset => assets.push(row),
            AccountCategory::Liability => liabilities.push(row),
            AccountCategory::Equity => equity.push(row),
            _ => unreachable!("revenue and expense handled above"),
        }
    }

    assets.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    liabilities.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    equity.sort_by(|a, b| a.account_code.cmp(&b.account_code));

    if net_income != zero() {
        equity.push(StatementRow {
            account_code: "net_income".to_string(),
            account_name: "Net Income".to_string(),
            amount: net_income,
        });
    }

    let total_assets: BigDecimal = assets.iter().map(|r| r.amount.clone()).sum();
    let total_liabilities: BigDecimal = liabilities.iter().map(|r| r.amount.clone()).sum();
    let total_equity: BigDecimal = equity.iter().map(|r| r.amount.clone()).sum();
    let gap = &total_assets - (&total_liabilities + &total_equity);
    let is_balanced = gap.abs() <= balance_sheet_epsilon();

    Ok(BalanceSheet {
        as_of_date,
        assets,
        liabilities,
        equity,
        total_assets,
        total_liabilities,
        total_equity,
        is_balanced,
    })
}

// ---------------------------------------------------------------------------
// Cash flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowItem {
    pub description: String,
    /// Signed from the bank's perspective: inflows positive.
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub operating: Vec<CashFlowItem>,
    pub investing: Vec<CashFlowItem>,
    pub financing: Vec<CashFlowItem>,
    pub net_operating: BigDecimal,
    pub net_investing: BigDecimal,
    pub net_financing: BigDecimal,
    pub net_cash_flow: BigDecimal,
}

/// Classify bank movements by the categories of their counterpart accounts:
/// settlement and tax control accounts are operating, other assets are
/// investing, non-control liabilities and equity are financing.
pub async fn cash_flow<S: LedgerStore>(
    store: &S,
    controls: &ControlAccounts,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> LedgerResult<CashFlowStatement> {
    validate_range(start_date, end_date)?;
    let categories: HashMap<String, AccountCategory> = store
        .list_accounts(None)
        .await?
        .into_iter()
        .map(|a| (a.code, a.category))
        .collect();
    let is_control = |code: &str| -> bool {
        code == controls.receivable
            || code == controls.payable
            || code == controls.tds_receivable
            || code == controls.tds_payable
            || controls.output_tax.values().any(|c| c == code)
            || controls.input_tax.values().any(|c| c == code)
    };

    let mut operating = Vec::new();
    let mut investing = Vec::new();
    let mut financing = Vec::new();

    for journal in store
        .list_journal_entries(Some(start_date), Some(end_date))
        .await?
    {
        let bank_delta: BigDecimal = journal
            .lines
            .iter()
            .filter(|l| l.account_code == controls.bank)
            .map(|l| l.signed_amount())
            .sum();
        if bank_delta == zero() {
            continue;
        }

        let mut has_financing = false;
        let mut has_investing = false;
        for line in journal.lines.iter().filter(|l| l.account_code != controls.bank) {
            if is_control(&line.account_code) {
                continue;
            }
            match categories.get(&line.account_code) {
                Some(AccountCategory::Liability) | Some(AccountCategory::Equity) => {
                    has_financing = true;
                }
                Some(AccountCategory::Asset) => has_investing = true,
                _ => {}
            }
        }

        let item = CashFlowItem {
            description: journal.narration.clone(),
            amount: bank_delta,
        };
        if has_financing {
            financing.push(item);
        } else if has_investing {
            investing.push(item);
        } else {
            operating.push(item);
        }
    }

    let net_operating: BigDecimal = operating.iter().map(|i| i.amount.clone()).sum();
    let net_investing: BigDecimal = investing.iter().map(|i| i.amount.clone()).sum();
    let net_financing: BigDecimal = financing.iter().map(|i| i.amount.clone()).sum();
    let net_cash_flow = &net_operating + &net_investing + &net_financing;

    Ok(CashFlowStatement {
        start_date,
        end_date,
        operating,
        investing,
        financing,
        net_operating,
        net_investing,
        net_financing,
        net_cash_flow,
    })
}

// ---------------------------------------------------------------------------
// Aging
// ---------------------------------------------------------------------------

/// Which side of the book an aging report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingSide {
    Receivables,
    Payables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingRow {
    pub document_id: String,
    pub party: String,
    pub due_date: NaiveDate,
    pub balance_due: BigDecimal,
    /// Negative means not yet due.
    pub days_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of_date: NaiveDate,
    pub side: AgingSide,
    pub current: BigDecimal,
    pub days_1_30: BigDecimal,
    pub days_31_60: BigDecimal,
    pub days_61_90: BigDecimal,
    pub days_over_90: BigDecimal,
    pub total: BigDecimal,
    pub rows: Vec<AgingRow>,
}

/// Bucket outstanding balances by day-distance from due date as of a
/// reference date, over the documents' live `balance_due` (which the posting
/// engine keeps in sync as settlements are applied).
pub async fn aging<S: LedgerStore>(
    store: &S,
    side: AgingSide,
    as_of_date: NaiveDate,
) -> LedgerResult<AgingReport> {
    let open_statuses = [
        DocumentStatus::Posted,
        DocumentStatus::Sent,
        DocumentStatus::Partial,
    ];
    let mut report = AgingReport {
        as_of_date,
        side,
        current: zero(),
        days_1_30: zero(),
        days_31_60: zero(),
        days_61_90: zero(),
        days_over_90: zero(),
        total: zero(),
        rows: Vec::new(),
    };

    for document in store.list_documents(None).await? {
        let matches_side = match side {
            AgingSide::Receivables => document.kind == DocumentKind::Invoice,
            AgingSide::Payables => matches!(
                document.kind,
                DocumentKind::Bill | DocumentKind::ExpenseClaim
            ),
        };
        if !matches_side
            || !open_statuses.contains(&document.status)
            || document.balance_due <= zero()
        {
            continue;
        }

        let days_overdue = (as_of_date - document.due_date).num_days();
        let bucket = match days_overdue {
            d if d <= 0 => &mut report.current,
            1..=30 => &mut report.days_1_30,
            31..=60 => &mut report.days_31_60,
            61..=90 => &mut report.days_61_90,
            _ => &mut report.days_over_90,
        };
        *bucket += &document.balance_due;
        report.total += &document.balance_due;
        report.rows.push(AgingRow {
            document_id: document.id,
            party: document.party,
            due_date: document.due_date,
            balance_due: document.balance_due,
            days_overdue,
        });
    }

    report.rows.sort_by(|a, b| a.document_id.cmp(&b.document_id));
    Ok(report)
}

// ---------------------------------------------------------------------------
// Budget vs actual
// ---------------------------------------------------------------------------

/// One budgeted amount for an account over the report's fiscal range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub account_code: String,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetVarianceRow {
    pub account_code: String,
    pub account_name: String,
    pub budget: BigDecimal,
    pub actual: BigDecimal,
    /// budget - actual.
    pub variance: BigDecimal,
    /// Percentage of budget; `None` when the budget is zero.
    pub variance_pct: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetComparison {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: Vec<BudgetVarianceRow>,
    pub total_budget: BigDecimal,
    pub total_actual: BigDecimal,
    pub total_variance: BigDecimal,
}

/// Actuals come from ledger aggregation over the fiscal range using the
/// category sign convention; variance percentage guards division by zero.
pub async fn budget_vs_actual<S: LedgerStore>(
    store: &S,
    budgets: &[BudgetLine],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> LedgerResult<BudgetComparison> {
    validate_range(start_date, end_date)?;
    let mut rows = Vec::new();

    for budget in budgets {
        let account = store
            .get_account(&budget.account_code)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(budget.account_code.clone()))?;
        let (debit, credit) =
            account_totals(store, &account.code, Some(start_date), Some(end_date)).await?;
        let actual = oriented(&account, &debit, &credit);
        let variance = &budget.amount - &actual;
        let variance_pct = if budget.amount == zero() {
            None
        } else {
            Some(&variance * BigDecimal::from(100) / &budget.amount)
        };
        rows.push(BudgetVarianceRow {
            account_code: account.code,
            account_name: account.name,
            budget: budget.amount.clone(),
            actual,
            variance,
            variance_pct,
        });
    }

    rows.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    let total_budget: BigDecimal = rows.iter().map(|r| r.budget.clone()).sum();
    let total_actual: BigDecimal = rows.iter().map(|r| r.actual.clone()).sum();
    let total_variance = &total_budget - &total_actual;
    Ok(BudgetComparison {
        start_date,
        end_date,
        rows,
        total_budget,
        total_actual,
        total_variance,
    })
}

// ---------------------------------------------------------------------------
// Uniform dispatch
// ---------------------------------------------------------------------------

/// Report selector for the narrow `report(kind, range)` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    TrialBalance,
    ProfitAndLoss,
    BalanceSheet,
    CashFlow,
    ReceivablesAging,
    PayablesAging,
}

/// Either an as-of cutoff or a closed date range, depending on the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRange {
    AsOf(NaiveDate),
    Between { start: NaiveDate, end: NaiveDate },
}

/// Structured aggregate returned by [`run_report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Report {
    TrialBalance(TrialBalance),
    ProfitAndLoss(ProfitAndLoss),
    BalanceSheet(BalanceSheet),
    CashFlow(CashFlowStatement),
    Aging(AgingReport),
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> LedgerResult<()> {
    if start > end {
        return Err(LedgerError::Validation(format!(
            "start date {start} is after end date {end}"
        )));
    }
    Ok(())
}

/// Side-effect-free dispatch, safe to call at any frequency. A range shape
/// that does not fit the report kind is a local validation error.
pub async fn run_report<S: LedgerStore>(
    store: &S,
    controls: &ControlAccounts,
    kind: ReportKind,
    range: ReportRange,
) -> LedgerResult<Report> {
    match (kind, range) {
        (ReportKind::TrialBalance, ReportRange::AsOf(date)) => {
            Ok(Report::TrialBalance(trial_balance(store, Some(date)).await?))
        }
        (ReportKind::BalanceSheet, ReportRange::AsOf(date)) => {
            Ok(Report::BalanceSheet(balance_sheet(store, date).await?))
        }
        (ReportKind::ReceivablesAging, ReportRange::AsOf(date)) => Ok(Report::Aging(
            aging(store, AgingSide::Receivables, date).await?,
        )),
        (ReportKind::PayablesAging, ReportRange::AsOf(date)) => {
            Ok(Report::Aging(aging(store, AgingSide::Payables, date).await?))
        }
        (ReportKind::ProfitAndLoss, ReportRange::Between { start, end }) => Ok(
            Report::ProfitAndLoss(profit_and_loss(store, start, end).await?),
        ),
        (ReportKind::CashFlow, ReportRange::Between { start, end }) => Ok(Report::CashFlow(
            cash_flow(store, controls, start, end).await?,
        )),
        (kind, range) => Err(LedgerError::Validation(format!(
            "report {kind:?} does not accept range {range:?}"
        ))),
    }
}
