//! Source documents (invoices, credit notes, bills, expense claims) that the
//! surrounding services hand to the engine for posting.
//!
//! Documents are owned by their originating service; the engine only reads
//! them to produce journal entries, records the back-reference once posted,
//! and keeps `balance_due` in sync as receipts and payments are applied.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::tax::{resolve, TaxCodeRegistry};
use crate::types::{round_currency, JournalEntryId, LedgerError, LedgerResult};

/// Which business document a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Sale on credit; posts to the receivable side.
    Invoice,
    /// Reversal of an invoice.
    CreditNote,
    /// Purchase on credit; posts to the payable side.
    Bill,
    /// Employee expense claim; payable side, like a bill.
    ExpenseClaim,
}

impl DocumentKind {
    /// True for documents settled by customers (receivable side).
    pub fn is_receivable(&self) -> bool {
        matches!(self, DocumentKind::Invoice | DocumentKind::CreditNote)
    }
}

/// Status lifecycle, monotonically forward except explicit cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Posted,
    Sent,
    Partial,
    Paid,
    Cancelled,
}

impl DocumentStatus {
    /// Forward-only transition check. `Paid` and `Cancelled` are terminal.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (Draft, Posted) | (Draft, Cancelled) => true,
            (Posted, Sent) | (Posted, Partial) | (Posted, Paid) | (Posted, Cancelled) => true,
            (Sent, Partial) | (Sent, Paid) | (Sent, Cancelled) => true,
            (Partial, Partial) | (Partial, Paid) | (Partial, Cancelled) => true,
            _ => false,
        }
    }
}

/// One line of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    /// Revenue account for invoices/credit notes, expense account for bills
    /// and claims.
    pub account_code: String,
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    /// Absolute discount on the line, subtracted before tax.
    pub discount: BigDecimal,
    /// Reference into the tax-code registry; `None` means tax-exempt.
    pub tax_code: Option<String>,
}

impl DocumentLine {
    pub fn new(
        account_code: impl Into<String>,
        description: impl Into<String>,
        quantity: BigDecimal,
        unit_price: BigDecimal,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            description: description.into(),
            quantity,
            unit_price,
            discount: BigDecimal::from(0),
            tax_code: None,
        }
    }

    pub fn with_discount(mut self, discount: BigDecimal) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_tax_code(mut self, code: impl Into<String>) -> Self {
        self.tax_code = Some(code.into());
        self
    }

    /// Net amount of the line (quantity x price - discount), rounded to the
    /// smallest currency unit.
    pub fn net_amount(&self) -> BigDecimal {
        round_currency(&(&self.quantity * &self.unit_price - &self.discount))
    }
}

/// A source document: header plus ordered lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier assigned by the owning service (e.g. "INV-2024-001").
    pub id: String,
    pub kind: DocumentKind,
    /// Customer or supplier.
    pub party: String,
    pub document_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Drives the CGST+SGST vs IGST split for every line.
    pub interstate: bool,
    pub status: DocumentStatus,
    pub lines: Vec<DocumentLine>,
    /// Outstanding amount, kept in sync by the posting engine as receipts
    /// and payments are applied.
    pub balance_due: BigDecimal,
    /// Set once the document has been posted; the double-posting guard.
    pub journal_entry_id: Option<JournalEntryId>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        kind: DocumentKind,
        party: impl Into<String>,
        document_date: NaiveDate,
        due_date: NaiveDate,
        interstate: bool,
        lines: Vec<DocumentLine>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            party: party.into(),
            document_date,
            due_date,
            interstate,
            status: DocumentStatus::Draft,
            lines,
            balance_due: BigDecimal::from(0),
            journal_entry_id: None,
        }
    }

    /// Required-field validation, applied before any ledger interaction.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "document id cannot be empty".to_string(),
            ));
        }
        if self.party.trim().is_empty() {
            return Err(LedgerError::Validation(
                "document party cannot be empty".to_string(),
            ));
        }
        if self.lines.is_empty() {
            return Err(LedgerError::Validation(
                "document must have at least one line".to_string(),
            ));
        }
        if self.due_date < self.document_date {
            return Err(LedgerError::Validation(
                "due date cannot precede document date".to_string(),
            ));
        }
        let zero = BigDecimal::from(0);
        for (i, line) in self.lines.iter().enumerate() {
            if line.quantity <= zero {
                return Err(LedgerError::Validation(format!(
                    "line {i}: quantity must be positive"
                )));
            }
            if line.unit_price < zero || line.discount < zero {
                return Err(LedgerError::Validation(format!(
                    "line {i}: amounts cannot be negative"
                )));
            }
            if line.net_amount() < zero {
                return Err(LedgerError::Validation(format!(
                    "line {i}: discount exceeds the line amount"
                )));
            }
        }
        Ok(())
    }

    /// Total net of all lines (before tax).
    pub fn net_total(&self) -> BigDecimal {
        self.lines.iter().map(|l| l.net_amount()).sum()
    }

    /// Gross total including tax per line, resolved against the registry.
    pub fn gross_total(&self, taxes: &TaxCodeRegistry) -> BigDecimal {
        self.lines
            .iter()
            .map(|l| {
                let net = l.net_amount();
                let code = l.tax_code.as_deref().and_then(|c| taxes.get(c));
                let breakdown = resolve(code, &net, self.interstate);
                net + breakdown.total()
            })
            .sum()
    }

    pub fn is_posted(&self) -> bool {
        self.journal_entry_id.is_some()
    }

    /// Advance the status, enforcing the forward-only lifecycle.
    pub fn transition_to(&mut self, next: DocumentStatus) -> LedgerResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidStatus(format!(
                "document {}: {:?} -> {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn sample_invoice() -> Document {
        Document::new(
            "INV-1",
            DocumentKind::Invoice,
            "Acme Traders",
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            false,
            vec![
                DocumentLine::new("4000", "Widgets", BigDecimal::from(2), dec("500.00"))
                    .with_tax_code("GST18"),
                DocumentLine::new("4100", "Installation", BigDecimal::from(1), dec("300.00"))
                    .with_discount(dec("50.00")),
            ],
        )
    }

    #[test]
    fn net_amount_subtracts_discount() {
        let doc = sample_invoice();
        assert_eq!(doc.lines[0].net_amount(), dec("1000.00"));
        assert_eq!(doc.lines[1].net_amount(), dec("250.00"));
        assert_eq!(doc.net_total(), dec("1250.00"));
    }

    #[test]
    fn gross_total_includes_per_line_tax() {
        let doc = sample_invoice();
        let taxes = TaxCodeRegistry::standard();
        // 1000 + 18% tax on line one, 250 untaxed.
        assert_eq!(doc.gross_total(&taxes), dec("1430.00"));
    }

    #[test]
    fn lifecycle_is_forward_only() {
        let mut doc = sample_invoice();
        doc.transition_to(DocumentStatus::Posted).unwrap();
        doc.transition_to(DocumentStatus::Partial).unwrap();
        doc.transition_to(DocumentStatus::Paid).unwrap();
        let err = doc.transition_to(DocumentStatus::Draft).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStatus(_)));
        // Paid is terminal, including for cancellation.
        assert!(doc.transition_to(DocumentStatus::Cancelled).is_err());
    }

    #[test]
    fn draft_can_be_cancelled() {
        let mut doc = sample_invoice();
        doc.transition_to(DocumentStatus::Cancelled).unwrap();
        assert!(doc.transition_to(DocumentStatus::Posted).is_err());
    }

    #[test]
    fn validation_rejects_missing_fields() {
        let mut doc = sample_invoice();
        doc.party = "".to_string();
        assert!(matches!(doc.validate(), Err(LedgerError::Validation(_))));

        let mut doc = sample_invoice();
        doc.lines.clear();
        assert!(matches!(doc.validate(), Err(LedgerError::Validation(_))));

        let mut doc = sample_invoice();
        doc.lines[0].quantity = BigDecimal::from(0);
        assert!(matches!(doc.validate(), Err(LedgerError::Validation(_))));

        let mut doc = sample_invoice();
        doc.lines[1].discount = dec("1000.00");
        assert!(matches!(doc.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn serde_round_trips_a_document() {
        let doc = sample_invoice();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"invoice\""));
        assert!(json.contains("\"draft\""));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
