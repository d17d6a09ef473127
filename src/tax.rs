//! UK income tax and employee National Insurance
//!
//! Both are evaluated with the band calculator. Income tax applies the
//! personal-allowance taper first: the zero-rate band shrinks by `ratio` for
//! every pound of income above the taper threshold, floored at zero.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::bands::BandSchedule;
use crate::error::{check_income, check_income_series, Result};

/// Personal allowance taper rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllowanceTaper {
    /// Income above which the allowance starts to shrink
    pub threshold: f64,
    /// Allowance lost per pound over the threshold (0.5 = £1 per £2)
    pub ratio: f64,
}

impl Default for AllowanceTaper {
    fn default() -> Self {
        Self {
            threshold: 100_000.0,
            ratio: 0.5,
        }
    }
}

/// Income tax and NI tables for one tax year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxTables {
    /// Untapered income tax schedule; the first band is the personal allowance
    pub income_tax: BandSchedule,
    pub allowance_taper: AllowanceTaper,
    pub national_insurance: BandSchedule,
}

impl TaxTables {
    pub fn new(
        income_tax: BandSchedule,
        allowance_taper: AllowanceTaper,
        national_insurance: BandSchedule,
    ) -> Self {
        Self {
            income_tax,
            allowance_taper,
            national_insurance,
        }
    }

    /// 2024/25 England, Wales and NI rates
    pub fn uk_2024_25() -> Self {
        let income_tax = BandSchedule::from_thresholds(&[
            (0.0, 0.0),
            (12_570.0, 0.20),
            (50_270.0, 0.40),
            (125_140.0, 0.45),
        ])
        .expect("built-in income tax bands are valid");

        let national_insurance =
            BandSchedule::from_thresholds(&[(0.0, 0.0), (12_576.0, 0.08), (50_268.0, 0.02)])
                .expect("built-in NI bands are valid");

        Self::new(income_tax, AllowanceTaper::default(), national_insurance)
    }

    /// Full personal allowance (upper bound of the zero-rate band)
    pub fn personal_allowance(&self) -> f64 {
        match self.income_tax.bands().first() {
            Some(band) if band.rate == 0.0 => band.upper.unwrap_or(f64::INFINITY),
            _ => 0.0,
        }
    }

    /// Personal allowance after the taper for a given gross income
    pub fn effective_allowance(&self, gross_income: f64) -> f64 {
        let excess = (gross_income - self.allowance_taper.threshold).max(0.0);
        (self.personal_allowance() - self.allowance_taper.ratio * excess).max(0.0)
    }

    /// Income tax schedule after the allowance taper for `gross_income`
    pub fn income_tax_schedule(&self, gross_income: f64) -> BandSchedule {
        if self.personal_allowance() <= 0.0 {
            return self.income_tax.clone();
        }
        self.income_tax
            .with_first_band_upper(self.effective_allowance(gross_income))
    }

    /// Annual income tax on `gross_income`
    pub fn income_tax(&self, gross_income: f64) -> Result<f64> {
        check_income("gross_income", gross_income)?;
        Ok(self.income_tax_on(gross_income))
    }

    /// Annual employee NI on `gross_income`
    pub fn national_insurance(&self, gross_income: f64) -> Result<f64> {
        check_income("gross_income", gross_income)?;
        Ok(self.national_insurance_on(gross_income))
    }

    pub fn income_tax_series(&self, gross_incomes: &[f64]) -> Result<Vec<f64>> {
        check_income_series("gross_income", gross_incomes)?;
        Ok(gross_incomes.iter().map(|&g| self.income_tax_on(g)).collect())
    }

    pub fn national_insurance_series(&self, gross_incomes: &[f64]) -> Result<Vec<f64>> {
        check_income_series("gross_income", gross_incomes)?;
        Ok(gross_incomes
            .iter()
            .map(|&g| self.national_insurance_on(g))
            .collect())
    }

    /// Gross income less income tax and NI
    pub fn net_income(&self, gross_income: f64) -> Result<f64> {
        check_income("gross_income", gross_income)?;
        Ok(gross_income - self.income_tax_on(gross_income) - self.national_insurance_on(gross_income))
    }

    // Callers have already validated the income.
    pub(crate) fn income_tax_on(&self, gross_income: f64) -> f64 {
        self.income_tax_schedule(gross_income).apply(gross_income)
    }

    pub(crate) fn national_insurance_on(&self, gross_income: f64) -> f64 {
        self.national_insurance.apply(gross_income)
    }
}

impl Default for TaxTables {
    fn default() -> Self {
        Self::uk_2024_25()
    }
}

/// Evaluate an annual function on a monthly amount: `f(monthly × 12) / 12`
pub fn monthly<F>(f: F, monthly_gross: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    f(monthly_gross * 12.0) / 12.0
}

fn default_tables() -> &'static TaxTables {
    static TABLES: OnceLock<TaxTables> = OnceLock::new();
    TABLES.get_or_init(TaxTables::uk_2024_25)
}

/// Income tax under the built-in 2024/25 tables
pub fn income_tax(gross_income: f64) -> Result<f64> {
    default_tables().income_tax(gross_income)
}

/// National Insurance under the built-in 2024/25 tables
pub fn national_insurance(gross_income: f64) -> Result<f64> {
    default_tables().national_insurance(gross_income)
}
