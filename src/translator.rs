//! Document-to-journal translation: fixed recipes that turn a source
//! document (or a settlement against one) into a proposed, balanced journal
//! entry. Nothing here touches storage; the posting engine applies the
//! result.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::chart::{ControlAccounts, TaxComponent};
use crate::documents::{Document, DocumentKind};
use crate::tax::{resolve, TaxBreakdown, TaxCodeRegistry};
use crate::types::{
    JournalEntry, JournalKind, JournalLine, LedgerError, LedgerResult,
};

/// Fluent builder for journal entries. Line numbers are assigned in
/// insertion order; `build` re-checks the balance invariant so an unbalanced
/// entry can never leave the translator.
#[derive(Debug)]
pub struct JournalBuilder {
    entry: JournalEntry,
}

impl JournalBuilder {
    pub fn new(
        entry_date: NaiveDate,
        kind: JournalKind,
        document_id: impl Into<String>,
        narration: impl Into<String>,
    ) -> Self {
        Self {
            entry: JournalEntry {
                id: Uuid::new_v4(),
                entry_date,
                kind,
                document_id: document_id.into(),
                lines: Vec::new(),
                narration: narration.into(),
                created_at: chrono::Utc::now().naive_utc(),
            },
        }
    }

    pub fn debit(
        mut self,
        account_code: impl Into<String>,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Self {
        self.push(JournalLine::debit(account_code, amount, description));
        self
    }

    pub fn credit(
        mut self,
        account_code: impl Into<String>,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Self {
        self.push(JournalLine::credit(account_code, amount, description));
        self
    }

    fn push(&mut self, mut line: JournalLine) {
        line.line_no = self.entry.lines.len() as u32 + 1;
        self.entry.lines.push(line);
    }

    pub fn build(self) -> LedgerResult<JournalEntry> {
        self.entry.validate()?;
        Ok(self.entry)
    }
}

/// Translates documents into proposed journal entries using the tax registry
/// and the control-account map.
pub struct Translator<'a> {
    taxes: &'a TaxCodeRegistry,
    controls: &'a ControlAccounts,
}

/// Per-document aggregation: net amounts per line account (in first-seen
/// order) and tax totals per component.
struct DocumentTotals {
    /// (account code, net amount) in document order.
    by_account: Vec<(String, BigDecimal)>,
    tax: TaxBreakdown,
    gross: BigDecimal,
}

impl<'a> Translator<'a> {
    pub fn new(taxes: &'a TaxCodeRegistry, controls: &'a ControlAccounts) -> Self {
        Self { taxes, controls }
    }

    /// Produce the proposed journal entry for a document posting.
    pub fn translate(&self, document: &Document) -> LedgerResult<JournalEntry> {
        document.validate()?;
        match document.kind {
            DocumentKind::Invoice => self.translate_invoice(document),
            DocumentKind::CreditNote => self.translate_credit_note(document),
            DocumentKind::Bill | DocumentKind::ExpenseClaim => self.translate_bill(document),
        }
    }

    fn totals(&self, document: &Document) -> DocumentTotals {
        let mut by_account: Vec<(String, BigDecimal)> = Vec::new();
        let mut tax = TaxBreakdown::exempt();

        for line in &document.lines {
            let net = line.net_amount();
            match by_account.iter_mut().find(|(code, _)| code == &line.account_code) {
                Some((_, total)) => *total += &net,
                None => by_account.push((line.account_code.clone(), net.clone())),
            }
            // An unknown tax code id resolves the same as "no tax"; the code
            // set itself is validated when the registry is configured.
            let code = line.tax_code.as_deref().and_then(|c| self.taxes.get(c));
            let breakdown = resolve(code, &net, document.interstate);
            tax.cgst += breakdown.cgst;
            tax.sgst += breakdown.sgst;
            tax.igst += breakdown.igst;
            tax.cess += breakdown.cess;
        }

        let net_total: BigDecimal = by_account.iter().map(|(_, n)| n.clone()).sum();
        let gross = &net_total + tax.total();
        DocumentTotals {
            by_account,
            tax,
            gross,
        }
    }

    fn tax_components(tax: &TaxBreakdown) -> [(TaxComponent, &BigDecimal); 4] {
        [
            (TaxComponent::Cgst, &tax.cgst),
            (TaxComponent::Sgst, &tax.sgst),
            (TaxComponent::Igst, &tax.igst),
            (TaxComponent::Cess, &tax.cess),
        ]
    }

    /// Invoice: debit the receivable control account for the gross total,
    /// credit each revenue account net of discount, credit each non-zero tax
    /// component to its output-tax control account.
    fn translate_invoice(&self, document: &Document) -> LedgerResult<JournalEntry> {
        let totals = self.totals(document);
        let mut builder = JournalBuilder::new(
            document.document_date,
            JournalKind::Invoice,
            &document.id,
            format!("Invoice {} to {}", document.id, document.party),
        )
        .debit(
            &self.controls.receivable,
            totals.gross.clone(),
            "Accounts receivable",
        );

        let zero = BigDecimal::from(0);
        for (account, net) in &totals.by_account {
            if *net > zero {
                builder = builder.credit(account, net.clone(), "Revenue");
            }
        }
        for (component, amount) in Self::tax_components(&totals.tax) {
            if *amount > zero {
                let account = self.controls.output_for(component)?;
                builder = builder.credit(
                    account,
                    amount.clone(),
                    format!("Output {}", component.label()),
                );
            }
        }
        builder.build()
    }

    /// Credit note: the mirror image of an invoice.
    fn translate_credit_note(&self, document: &Document) -> LedgerResult<JournalEntry> {
        let totals = self.totals(document);
        let mut builder = JournalBuilder::new(
            document.document_date,
            JournalKind::CreditNote,
            &document.id,
            format!("Credit note {} to {}", document.id, document.party),
        );

        let zero = BigDecimal::from(0);
        for (account, net) in &totals.by_account {
            if *net > zero {
                builder = builder.debit(account, net.clone(), "Revenue reversal");
            }
        }
        for (component, amount) in Self::tax_components(&totals.tax) {
            if *amount > zero {
                let account = self.controls.output_for(component)?;
                builder = builder.debit(
                    account,
                    amount.clone(),
                    format!("Output {} reversal", component.label()),
                );
            }
        }
        builder
            .credit(
                &self.controls.receivable,
                totals.gross.clone(),
                "Accounts receivable reversal",
            )
            .build()
    }

    /// Bill or expense claim: debit each expense account net, debit each
    /// non-zero input tax component, credit the payable control account for
    /// the gross total.
    fn translate_bill(&self, document: &Document) -> LedgerResult<JournalEntry> {
        let totals = self.totals(document);
        let kind = match document.kind {
            DocumentKind::ExpenseClaim => JournalKind::ExpenseClaim,
            _ => JournalKind::Bill,
        };
        let mut builder = JournalBuilder::new(
            document.document_date,
            kind,
            &document.id,
            format!("Bill {} from {}", document.id, document.party),
        );

        let zero = BigDecimal::from(0);
        for (account, net) in &totals.by_account {
            if *net > zero {
                builder = builder.debit(account, net.clone(), "Expense");
            }
        }
        for (component, amount) in Self::tax_components(&totals.tax) {
            if *amount > zero {
                let account = self.controls.input_for(component)?;
                builder = builder.debit(
                    account,
                    amount.clone(),
                    format!("Input {}", component.label()),
                );
            }
        }
        builder
            .credit(
                &self.controls.payable,
                totals.gross.clone(),
                "Accounts payable",
            )
            .build()
    }

    /// Receipt against an invoice: debit the bank for the net amount
    /// received, debit TDS receivable for any withheld amount, credit the
    /// receivable for the gross amount applied.
    pub fn translate_receipt(
        &self,
        invoice: &Document,
        amount: &BigDecimal,
        tds: &BigDecimal,
        received_on: NaiveDate,
    ) -> LedgerResult<JournalEntry> {
        Self::check_settlement_amounts(amount, tds)?;
        let mut builder = JournalBuilder::new(
            received_on,
            JournalKind::Receipt,
            &invoice.id,
            format!("Receipt against {} from {}", invoice.id, invoice.party),
        )
        .debit(&self.controls.bank, amount - tds, "Bank");
        if *tds > BigDecimal::from(0) {
            builder = builder.debit(&self.controls.tds_receivable, tds.clone(), "TDS withheld");
        }
        builder
            .credit(&self.controls.receivable, amount.clone(), "Receivable settled")
            .build()
    }

    /// Payment against a bill or expense claim: the payable-side mirror of a
    /// receipt.
    pub fn translate_payment(
        &self,
        bill: &Document,
        amount: &BigDecimal,
        tds: &BigDecimal,
        paid_on: NaiveDate,
    ) -> LedgerResult<JournalEntry> {
        Self::check_settlement_amounts(amount, tds)?;
        let mut builder = JournalBuilder::new(
            paid_on,
            JournalKind::Payment,
            &bill.id,
            format!("Payment against {} to {}", bill.id, bill.party),
        )
        .debit(&self.controls.payable, amount.clone(), "Payable settled")
        .credit(&self.controls.bank, amount - tds, "Bank");
        if *tds > BigDecimal::from(0) {
            builder = builder.credit(&self.controls.tds_payable, tds.clone(), "TDS withheld");
        }
        builder.build()
    }

    fn check_settlement_amounts(amount: &BigDecimal, tds: &BigDecimal) -> LedgerResult<()> {
        let zero = BigDecimal::from(0);
        if *amount <= zero {
            return Err(LedgerError::Validation(
                "settlement amount must be positive".to_string(),
            ));
        }
        if *tds < zero {
            return Err(LedgerError::Validation(
                "TDS amount cannot be negative".to_string(),
            ));
        }
        if tds >= amount {
            return Err(LedgerError::Validation(
                "TDS amount must be less than the settlement amount".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentLine;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn invoice(interstate: bool) -> Document {
        Document::new(
            "INV-1",
            DocumentKind::Invoice,
            "Acme Traders",
            date(1),
            date(30),
            interstate,
            vec![
                DocumentLine::new("4000", "Widgets", BigDecimal::from(2), dec("500.00"))
                    .with_tax_code("GST18"),
                DocumentLine::new("4100", "Installation", BigDecimal::from(1), dec("250.00")),
            ],
        )
    }

    fn line_amount<'e>(entry: &'e JournalEntry, account: &str) -> &'e JournalLine {
        entry
            .lines
            .iter()
            .find(|l| l.account_code == account)
            .unwrap_or_else(|| panic!("no line for account {account}"))
    }

    #[test]
    fn intrastate_invoice_splits_tax_into_cgst_sgst() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let entry = translator.translate(&invoice(false)).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "1200").debit, dec("1430.00"));
        assert_eq!(line_amount(&entry, "4000").credit, dec("1000.00"));
        assert_eq!(line_amount(&entry, "4100").credit, dec("250.00"));
        assert_eq!(line_amount(&entry, "2210").credit, dec("90.00"));
        assert_eq!(line_amount(&entry, "2220").credit, dec("90.00"));
        assert!(entry.lines.iter().all(|l| l.account_code != "2230"));
    }

    #[test]
    fn interstate_invoice_uses_igst_only() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let entry = translator.translate(&invoice(true)).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "2230").credit, dec("180.00"));
        assert!(entry.lines.iter().all(|l| l.account_code != "2210"));
        assert!(entry.lines.iter().all(|l| l.account_code != "2220"));
    }

    #[test]
    fn credit_note_mirrors_invoice() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let mut note = invoice(false);
        note.id = "CN-1".to_string();
        note.kind = DocumentKind::CreditNote;
        let entry = translator.translate(&note).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "1200").credit, dec("1430.00"));
        assert_eq!(line_amount(&entry, "4000").debit, dec("1000.00"));
        assert_eq!(line_amount(&entry, "2210").debit, dec("90.00"));
    }

    #[test]
    fn bill_debits_input_tax() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let bill = Document::new(
            "BILL-1",
            DocumentKind::Bill,
            "Supplies Co",
            date(2),
            date(30),
            false,
            vec![DocumentLine::new("5000", "Stationery", BigDecimal::from(1), dec("400.00"))
                .with_tax_code("GST12")],
        );
        let entry = translator.translate(&bill).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "5000").debit, dec("400.00"));
        assert_eq!(line_amount(&entry, "1410").debit, dec("24.00"));
        assert_eq!(line_amount(&entry, "1420").debit, dec("24.00"));
        assert_eq!(line_amount(&entry, "2000").credit, dec("448.00"));
    }

    fn taxes_with_cess() -> TaxCodeRegistry {
        let mut taxes = TaxCodeRegistry::standard();
        taxes
            .register(
                crate::tax::TaxCode::new("GST28C", BigDecimal::from(28))
                    .with_cess(BigDecimal::from(12)),
            )
            .unwrap();
        taxes
    }

    #[test]
    fn cess_invoice_credits_the_output_cess_account() {
        let taxes = taxes_with_cess();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let mut doc = invoice(false);
        doc.lines[0].tax_code = Some("GST28C".to_string());
        // 28% of 1000 splits 140/140, 12% cess charged on top.
        let entry = translator.translate(&doc).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "2210").credit, dec("140.00"));
        assert_eq!(line_amount(&entry, "2220").credit, dec("140.00"));
        assert_eq!(line_amount(&entry, "2240").credit, dec("120.00"));
        assert_eq!(line_amount(&entry, "1200").debit, dec("1650.00"));
    }

    #[test]
    fn cess_bill_debits_the_input_cess_account() {
        let taxes = taxes_with_cess();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let bill = Document::new(
            "BILL-1",
            DocumentKind::Bill,
            "Tobacco Traders",
            date(2),
            date(30),
            false,
            vec![DocumentLine::new("5000", "Stock", BigDecimal::from(1), dec("400.00"))
                .with_tax_code("GST28C")],
        );
        let entry = translator.translate(&bill).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "1410").debit, dec("56.00"));
        assert_eq!(line_amount(&entry, "1420").debit, dec("56.00"));
        assert_eq!(line_amount(&entry, "1440").debit, dec("48.00"));
        assert_eq!(line_amount(&entry, "2000").credit, dec("560.00"));
    }

    #[test]
    fn receipt_with_tds_balances_three_ways() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let entry = translator
            .translate_receipt(&invoice(false), &dec("1000.00"), &dec("100.00"), date(10))
            .unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "1000").debit, dec("900.00"));
        assert_eq!(line_amount(&entry, "1300").debit, dec("100.00"));
        assert_eq!(line_amount(&entry, "1200").credit, dec("1000.00"));
    }

    #[test]
    fn receipt_without_tds_has_two_lines() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let entry = translator
            .translate_receipt(&invoice(false), &dec("500.00"), &dec("0"), date(10))
            .unwrap();
        assert_eq!(entry.lines.len(), 2);
    }

    #[test]
    fn payment_mirrors_receipt_on_payable_side() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let bill = Document::new(
            "BILL-1",
            DocumentKind::Bill,
            "Supplies Co",
            date(2),
            date(30),
            false,
            vec![DocumentLine::new("5000", "Stationery", BigDecimal::from(1), dec("448.00"))],
        );
        let entry = translator
            .translate_payment(&bill, &dec("448.00"), &dec("48.00"), date(12))
            .unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "2000").debit, dec("448.00"));
        assert_eq!(line_amount(&entry, "1000").credit, dec("400.00"));
        assert_eq!(line_amount(&entry, "2300").credit, dec("48.00"));
    }

    #[test]
    fn missing_output_tax_account_fails_translation() {
        let taxes = TaxCodeRegistry::standard();
        let mut controls = ControlAccounts::standard();
        controls.output_tax.remove(&TaxComponent::Cgst);
        let translator = Translator::new(&taxes, &controls);

        let err = translator.translate(&invoice(false)).unwrap_err();
        assert!(matches!(err, LedgerError::MissingControlAccount(_)));
    }

    #[test]
    fn unknown_tax_code_is_treated_as_exempt() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let mut doc = invoice(false);
        doc.lines[0].tax_code = Some("GST99".to_string());
        let entry = translator.translate(&doc).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(line_amount(&entry, "1200").debit, dec("1250.00"));
    }

    #[test]
    fn tds_not_below_amount_is_rejected() {
        let taxes = TaxCodeRegistry::standard();
        let controls = ControlAccounts::standard();
        let translator = Translator::new(&taxes, &controls);

        let err = translator
            .translate_receipt(&invoice(false), &dec("100.00"), &dec("100.00"), date(10))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
