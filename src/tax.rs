//! GST tax rule resolution: splitting a tax code's rate into CGST/SGST for
//! intrastate transactions or IGST for interstate ones, with cess on top.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{round_currency, LedgerError, LedgerResult};

/// Immutable tax reference data looked up by the translator.
///
/// A tax code carries a flat rate percentage and may carry explicit
/// per-component rates; when it does not, the intrastate split halves the
/// flat rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCode {
    /// Unique code, e.g. "GST18".
    pub code: String,
    /// Total rate percentage, e.g. 18 for 18%.
    pub rate: BigDecimal,
    /// Explicit CGST rate percentage, when the code defines one.
    pub cgst_rate: Option<BigDecimal>,
    /// Explicit SGST rate percentage, when the code defines one.
    pub sgst_rate: Option<BigDecimal>,
    /// Explicit IGST rate percentage, when the code defines one.
    pub igst_rate: Option<BigDecimal>,
    /// Cess rate percentage, charged on top regardless of interstate status.
    pub cess_rate: Option<BigDecimal>,
}

impl TaxCode {
    pub fn new(code: impl Into<String>, rate: BigDecimal) -> Self {
        Self {
            code: code.into(),
            rate,
            cgst_rate: None,
            sgst_rate: None,
            igst_rate: None,
            cess_rate: None,
        }
    }

    pub fn with_components(
        mut self,
        cgst: BigDecimal,
        sgst: BigDecimal,
        igst: BigDecimal,
    ) -> Self {
        self.cgst_rate = Some(cgst);
        self.sgst_rate = Some(sgst);
        self.igst_rate = Some(igst);
        self
    }

    pub fn with_cess(mut self, cess: BigDecimal) -> Self {
        self.cess_rate = Some(cess);
        self
    }

    /// Explicit component rates must add up to the flat rate.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.rate < BigDecimal::from(0) {
            return Err(LedgerError::Validation(format!(
                "tax code {} has a negative rate",
                self.code
            )));
        }
        if let (Some(cgst), Some(sgst)) = (&self.cgst_rate, &self.sgst_rate) {
            if cgst + sgst != self.rate {
                return Err(LedgerError::Validation(format!(
                    "tax code {}: CGST {} + SGST {} does not equal rate {}",
                    self.code, cgst, sgst, self.rate
                )));
            }
        }
        if let Some(igst) = &self.igst_rate {
            if *igst != self.rate {
                return Err(LedgerError::Validation(format!(
                    "tax code {}: IGST {} does not equal rate {}",
                    self.code, igst, self.rate
                )));
            }
        }
        Ok(())
    }
}

/// The applicable split for one line: every component is a non-negative
/// amount already rounded to the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    pub igst: BigDecimal,
    pub cess: BigDecimal,
}

impl TaxBreakdown {
    /// All-zero breakdown: the valid result for a tax-exempt line.
    pub fn exempt() -> Self {
        Self {
            cgst: BigDecimal::from(0),
            sgst: BigDecimal::from(0),
            igst: BigDecimal::from(0),
            cess: BigDecimal::from(0),
        }
    }

    pub fn total(&self) -> BigDecimal {
        &self.cgst + &self.sgst + &self.igst + &self.cess
    }
}

/// Resolve the tax split for a net line amount.
///
/// Interstate: the entire primary rate goes to IGST. Intrastate: the primary
/// rate splits evenly into CGST and SGST, using the code's explicit component
/// rates when present, otherwise halving the flat rate. SGST is computed as
/// the rounded primary tax minus the rounded CGST, so a rounding residual is
/// absorbed into the component closest to the total rather than dropped.
/// Cess is computed on top and never split. A missing tax code yields an
/// all-zero breakdown.
pub fn resolve(tax_code: Option<&TaxCode>, net: &BigDecimal, interstate: bool) -> TaxBreakdown {
    let Some(code) = tax_code else {
        return TaxBreakdown::exempt();
    };

    let hundred = BigDecimal::from(100);
    let primary = round_currency(&(net * &code.rate / &hundred));
    let cess = match &code.cess_rate {
        Some(rate) => round_currency(&(net * rate / &hundred)),
        None => BigDecimal::from(0),
    };

    if interstate {
        TaxBreakdown {
            cgst: BigDecimal::from(0),
            sgst: BigDecimal::from(0),
            igst: primary,
            cess,
        }
    } else {
        let cgst_rate = code
            .cgst_rate
            .clone()
            .unwrap_or_else(|| &code.rate / BigDecimal::from(2));
        let cgst = round_currency(&(net * &cgst_rate / &hundred));
        let sgst = &primary - &cgst;
        TaxBreakdown {
            cgst,
            sgst,
            igst: BigDecimal::from(0),
            cess,
        }
    }
}

/// Registry of tax codes, validated once at construction.
///
/// An unknown tax-code id is a configuration error at registry build time;
/// at translation time a missing code is treated as "no tax", never as a
/// per-document failure.
#[derive(Debug, Default)]
pub struct TaxCodeRegistry {
    codes: HashMap<String, TaxCode>,
}

impl TaxCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: TaxCode) -> LedgerResult<()> {
        code.validate()?;
        self.codes.insert(code.code.clone(), code);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&TaxCode> {
        self.codes.get(code)
    }

    /// Standard Indian GST slabs: 0%, 5%, 12%, 18%, 28%.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for rate in [0u32, 5, 12, 18, 28] {
            let code = TaxCode::new(format!("GST{rate}"), BigDecimal::from(rate));
            registry
                .register(code)
                .expect("standard slab rates are valid");
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn interstate_assigns_full_rate_to_igst() {
        let code = TaxCode::new("GST18", BigDecimal::from(18));
        let breakdown = resolve(Some(&code), &BigDecimal::from(1000), true);
        assert_eq!(breakdown.igst, dec("180.00"));
        assert_eq!(breakdown.cgst, BigDecimal::from(0));
        assert_eq!(breakdown.sgst, BigDecimal::from(0));
        assert_eq!(breakdown.cess, BigDecimal::from(0));
    }

    #[test]
    fn intrastate_splits_evenly() {
        let code = TaxCode::new("GST18", BigDecimal::from(18));
        let breakdown = resolve(Some(&code), &BigDecimal::from(1000), false);
        assert_eq!(breakdown.cgst, dec("90.00"));
        assert_eq!(breakdown.sgst, dec("90.00"));
        assert_eq!(breakdown.igst, BigDecimal::from(0));
    }

    #[test]
    fn residual_cent_lands_in_sgst() {
        // 18% of 100.03 = 18.0054 -> 18.01; halves round to 9.00 each,
        // leaving one cent that must not be dropped.
        let code = TaxCode::new("GST18", BigDecimal::from(18));
        let breakdown = resolve(Some(&code), &dec("100.03"), false);
        assert_eq!(breakdown.cgst, dec("9.00"));
        assert_eq!(breakdown.sgst, dec("9.01"));
        assert_eq!(breakdown.total(), dec("18.01"));
    }

    #[test]
    fn explicit_component_rates_are_used() {
        let code = TaxCode::new("GST18X", BigDecimal::from(18)).with_components(
            BigDecimal::from(9),
            BigDecimal::from(9),
            BigDecimal::from(18),
        );
        assert!(code.validate().is_ok());
        let breakdown = resolve(Some(&code), &BigDecimal::from(500), false);
        assert_eq!(breakdown.cgst, dec("45.00"));
        assert_eq!(breakdown.sgst, dec("45.00"));
    }

    #[test]
    fn cess_applies_on_top_regardless_of_interstate() {
        let code = TaxCode::new("GST28C", BigDecimal::from(28)).with_cess(BigDecimal::from(12));
        let intra = resolve(Some(&code), &BigDecimal::from(1000), false);
        let inter = resolve(Some(&code), &BigDecimal::from(1000), true);
        assert_eq!(intra.cess, dec("120.00"));
        assert_eq!(inter.cess, dec("120.00"));
        assert_eq!(intra.total(), dec("400.00"));
        assert_eq!(inter.total(), dec("400.00"));
    }

    #[test]
    fn missing_tax_code_is_exempt() {
        let breakdown = resolve(None, &BigDecimal::from(1000), false);
        assert_eq!(breakdown.total(), BigDecimal::from(0));
    }

    #[test]
    fn mismatched_component_rates_are_rejected() {
        let code = TaxCode::new("BAD", BigDecimal::from(18)).with_components(
            BigDecimal::from(9),
            BigDecimal::from(8),
            BigDecimal::from(18),
        );
        assert!(matches!(code.validate(), Err(LedgerError::Validation(_))));
        let mut registry = TaxCodeRegistry::new();
        assert!(registry.register(code).is_err());
    }

    #[test]
    fn standard_registry_has_all_slabs() {
        let registry = TaxCodeRegistry::standard();
        for rate in ["GST0", "GST5", "GST12", "GST18", "GST28"] {
            assert!(registry.get(rate).is_some(), "missing {rate}");
        }
        assert!(registry.get("GST7").is_none());
    }
}
