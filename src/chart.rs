//! Chart of accounts: account creation and lookup, plus the fixed mapping
//! from posting roles (receivable, bank, tax components) to control-account
//! codes, validated once at startup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::traits::LedgerStore;
use crate::types::{Account, AccountCategory, LedgerError, LedgerResult};

fn validate_account_code(code: &str) -> LedgerResult<()> {
    if code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "account code cannot be empty".to_string(),
        ));
    }
    if code.len() > 50 {
        return Err(LedgerError::Validation(
            "account code cannot exceed 50 characters".to_string(),
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::Validation(
            "account code can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "account name cannot be empty".to_string(),
        ));
    }
    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "account name cannot exceed 100 characters".to_string(),
        ));
    }
    Ok(())
}

/// Manager for chart-of-accounts operations against a storage backend.
pub struct ChartOfAccounts<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> ChartOfAccounts<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a new account. Duplicate codes are rejected.
    pub async fn create_account(&mut self, account: Account) -> LedgerResult<Account> {
        validate_account_code(&account.code)?;
        validate_account_name(&account.name)?;

        if self.store.get_account(&account.code).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "account with code '{}' already exists",
                account.code
            )));
        }

        self.store.save_account(&account).await?;
        Ok(account)
    }

    pub async fn get_account(&self, code: &str) -> LedgerResult<Option<Account>> {
        self.store.get_account(code).await
    }

    pub async fn get_account_required(&self, code: &str) -> LedgerResult<Account> {
        self.store
            .get_account(code)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()))
    }

    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.store.list_accounts(None).await
    }

    pub async fn list_accounts_by_category(
        &self,
        category: AccountCategory,
    ) -> LedgerResult<Vec<Account>> {
        self.store.list_accounts(Some(category)).await
    }

    /// Accounts are never deleted; deactivation blocks further postings while
    /// keeping ledger history intact.
    pub async fn deactivate_account(&mut self, code: &str) -> LedgerResult<()> {
        let mut account = self.get_account_required(code).await?;
        account.active = false;
        self.store.save_account(&account).await
    }
}

/// GST components that map to output/input tax control accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxComponent {
    Cgst,
    Sgst,
    Igst,
    Cess,
}

impl TaxComponent {
    pub const ALL: [TaxComponent; 4] = [
        TaxComponent::Cgst,
        TaxComponent::Sgst,
        TaxComponent::Igst,
        TaxComponent::Cess,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TaxComponent::Cgst => "CGST",
            TaxComponent::Sgst => "SGST",
            TaxComponent::Igst => "IGST",
            TaxComponent::Cess => "Cess",
        }
    }
}

/// Fixed mapping from posting roles to control-account codes.
///
/// Resolved and validated once at startup against the chart of accounts so a
/// misconfiguration fails fast instead of failing per transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlAccounts {
    /// Accounts Receivable.
    pub receivable: String,
    /// Accounts Payable.
    pub payable: String,
    /// Bank / cash settlement account.
    pub bank: String,
    /// TDS withheld by customers, recoverable.
    pub tds_receivable: String,
    /// TDS withheld from suppliers, payable.
    pub tds_payable: String,
    /// Output tax collected on sales, per component.
    pub output_tax: HashMap<TaxComponent, String>,
    /// Input tax paid on purchases, recoverable, per component.
    pub input_tax: HashMap<TaxComponent, String>,
}

impl ControlAccounts {
    /// The chart codes used by [`standard_chart`].
    pub fn standard() -> Self {
        let output_tax = HashMap::from([
            (TaxComponent::Cgst, "2210".to_string()),
            (TaxComponent::Sgst, "2220".to_string()),
            (TaxComponent::Igst, "2230".to_string()),
            (TaxComponent::Cess, "2240".to_string()),
        ]);
        let input_tax = HashMap::from([
            (TaxComponent::Cgst, "1410".to_string()),
            (TaxComponent::Sgst, "1420".to_string()),
            (TaxComponent::Igst, "1430".to_string()),
            (TaxComponent::Cess, "1440".to_string()),
        ]);
        Self {
            receivable: "1200".to_string(),
            payable: "2000".to_string(),
            bank: "1000".to_string(),
            tds_receivable: "1300".to_string(),
            tds_payable: "2300".to_string(),
            output_tax,
            input_tax,
        }
    }

    pub fn output_for(&self, component: TaxComponent) -> LedgerResult<&str> {
        self.output_tax
            .get(&component)
            .map(String::as_str)
            .ok_or_else(|| {
                LedgerError::MissingControlAccount(format!("output {}", component.label()))
            })
    }

    pub fn input_for(&self, component: TaxComponent) -> LedgerResult<&str> {
        self.input_tax
            .get(&component)
            .map(String::as_str)
            .ok_or_else(|| {
                LedgerError::MissingControlAccount(format!("input {}", component.label()))
            })
    }

    /// Verify every referenced code exists as an active account.
    pub async fn validate<S: LedgerStore>(&self, store: &S) -> LedgerResult<()> {
        let named = [
            ("accounts receivable", &self.receivable),
            ("accounts payable", &self.payable),
            ("bank", &self.bank),
            ("TDS receivable", &self.tds_receivable),
            ("TDS payable", &self.tds_payable),
        ];
        for (role, code) in named {
            Self::require_active(store, role, code).await?;
        }
        for component in TaxComponent::ALL {
            if let Some(code) = self.output_tax.get(&component) {
                Self::require_active(store, &format!("output {}", component.label()), code).await?;
            }
            if let Some(code) = self.input_tax.get(&component) {
                Self::require_active(store, &format!("input {}", component.label()), code).await?;
            }
        }
        Ok(())
    }

    async fn require_active<S: LedgerStore>(
        store: &S,
        role: &str,
        code: &str,
    ) -> LedgerResult<()> {
        match store.get_account(code).await? {
            Some(account) if account.active => Ok(()),
            Some(_) => Err(LedgerError::MissingControlAccount(format!(
                "{role} account '{code}' is inactive"
            ))),
            None => Err(LedgerError::MissingControlAccount(format!(
                "{role} account '{code}' is not configured in the chart"
            ))),
        }
    }
}

/// Seed a small-business chart of accounts including the GST control
/// accounts. Returns the accounts keyed by a short handle.
pub async fn standard_chart<S: LedgerStore>(
    chart: &mut ChartOfAccounts<S>,
) -> LedgerResult<HashMap<String, Account>> {
    use AccountCategory::*;

    let defs: [(&str, &str, &str, AccountCategory); 18] = [
        ("bank", "1000", "Bank", Asset),
        ("accounts_receivable", "1200", "Accounts Receivable", Asset),
        ("tds_receivable", "1300", "TDS Receivable", Asset),
        ("inventory", "1350", "Inventory", Asset),
        ("input_cgst", "1410", "Input CGST", Asset),
        ("input_sgst", "1420", "Input SGST", Asset),
        ("input_igst", "1430", "Input IGST", Asset),
        ("input_cess", "1440", "Input Cess", Asset),
        ("accounts_payable", "2000", "Accounts Payable", Liability),
        ("output_cgst", "2210", "Output CGST", Liability),
        ("output_sgst", "2220", "Output SGST", Liability),
        ("output_igst", "2230", "Output IGST", Liability),
        ("output_cess", "2240", "Output Cess", Liability),
        ("tds_payable", "2300", "TDS Payable", Liability),
        ("owners_equity", "3000", "Owner's Equity", Equity),
        ("sales_revenue", "4000", "Sales Revenue", Revenue),
        ("service_revenue", "4100", "Service Revenue", Revenue),
        ("operating_expenses", "5000", "Operating Expenses", Expense),
    ];

    let mut accounts = HashMap::new();
    for (handle, code, name, category) in defs {
        let account = chart.create_account(Account::new(code, name, category)).await?;
        accounts.insert(handle.to_string(), account);
    }
    Ok(accounts)
}
