//! CSV-based policy table loader
//!
//! Loads tax bands and repayment plans from CSV files in data/assumptions/

use std::fs::File;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use super::Assumptions;
use crate::bands::BandSchedule;
use crate::error::{ModelError, Result};
use crate::plans::{PlanId, PlanTable, RepaymentPlan, MAX_HORIZON_MONTHS};
use crate::tax::{AllowanceTaper, TaxTables};

/// Default path to assumptions directory
pub const DEFAULT_ASSUMPTIONS_PATH: &str = "data/assumptions";

pub const INCOME_TAX_FILE: &str = "income_tax.csv";
pub const ALLOWANCE_TAPER_FILE: &str = "allowance_taper.csv";
pub const NATIONAL_INSURANCE_FILE: &str = "national_insurance.csv";
pub const REPAYMENT_PLANS_FILE: &str = "repayment_plans.csv";

/// Raw band row: lower bound and marginal rate
#[derive(Debug, Clone, Copy, Deserialize)]
struct BandRow {
    lower: f64,
    rate: f64,
}

/// Raw row matching repayment_plans.csv columns
#[derive(Debug, Deserialize)]
struct PlanRow {
    plan: String,
    threshold: f64,
    rate: f64,
    write_off_years: u32,
}

impl PlanRow {
    fn to_plan(self) -> Result<RepaymentPlan> {
        let id: PlanId = self.plan.parse()?;
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(parse_error(REPAYMENT_PLANS_FILE, format!("{id} threshold {} is invalid", self.threshold)));
        }
        if !self.rate.is_finite() || !(0.0..=1.0).contains(&self.rate) {
            return Err(parse_error(REPAYMENT_PLANS_FILE, format!("{id} rate {} is invalid", self.rate)));
        }
        if self.write_off_years == 0 || self.write_off_years > MAX_HORIZON_MONTHS / 12 {
            return Err(parse_error(
                REPAYMENT_PLANS_FILE,
                format!(
                    "{id} write-off of {} years is outside 1-{}",
                    self.write_off_years,
                    MAX_HORIZON_MONTHS / 12
                ),
            ));
        }
        Ok(RepaymentPlan {
            id,
            threshold: self.threshold,
            rate: self.rate,
            write_off_years: self.write_off_years,
        })
    }
}

fn parse_error(file: &str, reason: impl Into<String>) -> ModelError {
    ModelError::Parse {
        file: file.to_string(),
        reason: reason.into(),
    }
}

fn read_rows<T>(path: &Path, file_name: &str) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let file = File::open(path.join(file_name))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }

    if rows.is_empty() {
        return Err(parse_error(file_name, "no rows"));
    }
    debug!("Loaded {} rows from {}", rows.len(), file_name);
    Ok(rows)
}

/// Load a band schedule from `lower,rate` rows in ascending order
pub fn load_band_schedule(path: &Path, file_name: &str) -> Result<BandSchedule> {
    let rows: Vec<BandRow> = read_rows(path, file_name)?;
    let thresholds: Vec<(f64, f64)> = rows.iter().map(|r| (r.lower, r.rate)).collect();
    BandSchedule::from_thresholds(&thresholds)
}

/// Load the income tax schedule; its first band is the personal allowance and must be zero-rated
pub fn load_income_tax_schedule(path: &Path) -> Result<BandSchedule> {
    let schedule = load_band_schedule(path, INCOME_TAX_FILE)?;
    match schedule.bands().first() {
        Some(band) if band.rate == 0.0 && band.upper.is_some() => Ok(schedule),
        _ => Err(parse_error(
            INCOME_TAX_FILE,
            "first band must be a bounded zero-rate personal allowance",
        )),
    }
}

/// Load the personal allowance taper from a single `threshold,ratio` row
pub fn load_allowance_taper(path: &Path) -> Result<AllowanceTaper> {
    let rows: Vec<AllowanceTaper> = read_rows(path, ALLOWANCE_TAPER_FILE)?;
    if rows.len() > 1 {
        return Err(parse_error(ALLOWANCE_TAPER_FILE, format!("expected 1 row, found {}", rows.len())));
    }
    let taper = rows[0];
    if !taper.threshold.is_finite() || taper.threshold < 0.0 || !taper.ratio.is_finite() || taper.ratio < 0.0 {
        return Err(parse_error(ALLOWANCE_TAPER_FILE, "threshold and ratio must be non-negative"));
    }
    Ok(taper)
}

/// Load repayment plans; plans absent from the file are unknown to the table
pub fn load_repayment_plans(path: &Path) -> Result<Vec<RepaymentPlan>> {
    let rows: Vec<PlanRow> = read_rows(path, REPAYMENT_PLANS_FILE)?;
    rows.into_iter().map(PlanRow::to_plan).collect()
}

/// All tables loaded from one directory
pub struct LoadedAssumptions {
    pub income_tax: BandSchedule,
    pub allowance_taper: AllowanceTaper,
    pub national_insurance: BandSchedule,
    pub repayment_plans: Vec<RepaymentPlan>,
}

impl LoadedAssumptions {
    /// Load all tables from the default path
    pub fn load_default() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load all tables from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self {
            income_tax: load_income_tax_schedule(path)?,
            allowance_taper: load_allowance_taper(path)?,
            national_insurance: load_band_schedule(path, NATIONAL_INSURANCE_FILE)?,
            repayment_plans: load_repayment_plans(path)?,
        })
    }

    pub fn into_assumptions(self) -> Assumptions {
        Assumptions {
            tax: TaxTables::new(self.income_tax, self.allowance_taper, self.national_insurance),
            plans: PlanTable::new(self.repayment_plans),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("student_loan_model_{name}_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_default_assumptions() {
        let result = LoadedAssumptions::load_default();
        assert!(result.is_ok(), "Failed to load assumptions: {:?}", result.err());

        let assumptions = result.unwrap().into_assumptions();

        // Shipped CSVs carry the same figures as the built-in tables
        assert_eq!(assumptions, Assumptions::default_2024_25());
        assert_eq!(assumptions.plans.len(), 5);
    }

    #[test]
    fn test_unsorted_loaded_bands_are_rejected() {
        let dir = scratch_dir("unsorted");
        fs::write(dir.join(INCOME_TAX_FILE), "lower,rate\n0,0\n50270,0.4\n12570,0.2\n").unwrap();
        let result = load_band_schedule(&dir, INCOME_TAX_FILE);
        assert!(matches!(result, Err(ModelError::InvalidSchedule { .. })));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_plan_in_file() {
        let dir = scratch_dir("plans");
        fs::write(
            dir.join(REPAYMENT_PLANS_FILE),
            "plan,threshold,rate,write_off_years\nPlan 3,20000,0.09,30\n",
        )
        .unwrap();
        assert!(matches!(load_repayment_plans(&dir), Err(ModelError::UnknownPlan(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_implausible_write_off_horizon_is_rejected() {
        let dir = scratch_dir("horizon");
        fs::write(
            dir.join(REPAYMENT_PLANS_FILE),
            "plan,threshold,rate,write_off_years\nPlan 2,27295,0.09,400000000\n",
        )
        .unwrap();
        assert!(matches!(load_repayment_plans(&dir), Err(ModelError::Parse { .. })));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_taxed_personal_allowance_is_rejected() {
        let dir = scratch_dir("allowance");
        fs::write(dir.join(INCOME_TAX_FILE), "lower,rate\n0,0.1\n12570,0.2\n").unwrap();
        assert!(matches!(load_income_tax_schedule(&dir), Err(ModelError::Parse { .. })));

        fs::write(dir.join(INCOME_TAX_FILE), "lower,rate\n0,0\n12570,0.2\n").unwrap();
        assert!(load_income_tax_schedule(&dir).is_ok());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_directory() {
        let result = LoadedAssumptions::load_from(Path::new("does/not/exist"));
        assert!(matches!(result, Err(ModelError::Io(_))));
    }
}
