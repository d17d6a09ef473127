//! Student loan repayment plans
//!
//! Each plan is a threshold and a flat rate on income above it, plus the
//! number of years after which any remaining balance is written off.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{check_income, check_income_series, ModelError, Result};

/// Longest simulation horizon accepted from a table or config, in months
pub const MAX_HORIZON_MONTHS: u32 = 600;

/// Repayment plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanId {
    /// Courses started before 1 September 2012
    #[serde(rename = "Plan 1")]
    Plan1,
    /// Courses started between 1 September 2012 and 31 July 2023
    #[serde(rename = "Plan 2")]
    Plan2,
    /// Student Awards Agency Scotland
    #[serde(rename = "Plan 4")]
    Plan4,
    /// Courses started on or after 1 August 2023
    #[serde(rename = "Plan 5")]
    Plan5,
    /// Postgraduate master's or doctoral loans
    #[serde(rename = "Postgraduate")]
    Postgraduate,
}

impl PlanId {
    pub const ALL: [PlanId; 5] = [
        PlanId::Plan1,
        PlanId::Plan2,
        PlanId::Plan4,
        PlanId::Plan5,
        PlanId::Postgraduate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PlanId::Plan1 => "Plan 1",
            PlanId::Plan2 => "Plan 2",
            PlanId::Plan4 => "Plan 4",
            PlanId::Plan5 => "Plan 5",
            PlanId::Postgraduate => "Postgraduate",
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlanId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        PlanId::ALL
            .iter()
            .copied()
            .find(|plan| plan.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownPlan(s.to_string()))
    }
}

/// Threshold, rate and write-off horizon for one plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepaymentPlan {
    pub id: PlanId,
    /// Annual income threshold
    pub threshold: f64,
    /// Rate applied to income above the threshold
    pub rate: f64,
    /// Years until the remaining balance is written off
    pub write_off_years: u32,
}

impl RepaymentPlan {
    /// Annual repayment due on `gross_income`
    pub fn repayment(&self, gross_income: f64) -> f64 {
        self.rate * (gross_income - self.threshold).max(0.0)
    }

    /// Write-off horizon in months, at most [`MAX_HORIZON_MONTHS`]
    pub fn write_off_months(&self) -> Result<u32> {
        self.write_off_years
            .checked_mul(12)
            .filter(|months| *months <= MAX_HORIZON_MONTHS)
            .ok_or_else(|| {
                ModelError::invalid_input(
                    "write_off_years",
                    format!("{} write-off of {} years is out of range", self.id, self.write_off_years),
                )
            })
    }
}

/// Lookup table of repayment plans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTable {
    plans: BTreeMap<PlanId, RepaymentPlan>,
}

impl PlanTable {
    pub fn new(plans: impl IntoIterator<Item = RepaymentPlan>) -> Self {
        Self {
            plans: plans.into_iter().map(|plan| (plan.id, plan)).collect(),
        }
    }

    /// 2024/25 thresholds
    pub fn uk_2024_25() -> Self {
        Self::new([
            RepaymentPlan { id: PlanId::Plan1, threshold: 22_015.0, rate: 0.09, write_off_years: 25 },
            RepaymentPlan { id: PlanId::Plan2, threshold: 27_295.0, rate: 0.09, write_off_years: 30 },
            RepaymentPlan { id: PlanId::Plan4, threshold: 27_660.0, rate: 0.09, write_off_years: 30 },
            RepaymentPlan { id: PlanId::Plan5, threshold: 25_000.0, rate: 0.09, write_off_years: 40 },
            RepaymentPlan { id: PlanId::Postgraduate, threshold: 21_000.0, rate: 0.06, write_off_years: 30 },
        ])
    }

    pub fn get(&self, plan: PlanId) -> Result<&RepaymentPlan> {
        self.plans
            .get(&plan)
            .ok_or_else(|| ModelError::UnknownPlan(plan.to_string()))
    }

    /// Look a plan up by its display name, e.g. `"Plan 2"`
    pub fn plan_by_name(&self, name: &str) -> Result<&RepaymentPlan> {
        self.get(name.parse()?)
    }

    /// Annual repayment for `gross_income` under `plan`
    pub fn student_loan_repayment(&self, gross_income: f64, plan: PlanId) -> Result<f64> {
        check_income("gross_income", gross_income)?;
        Ok(self.get(plan)?.repayment(gross_income))
    }

    pub fn student_loan_repayment_series(&self, gross_incomes: &[f64], plan: PlanId) -> Result<Vec<f64>> {
        let plan = self.get(plan)?;
        check_income_series("gross_income", gross_incomes)?;
        Ok(gross_incomes.iter().map(|&g| plan.repayment(g)).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RepaymentPlan> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl Default for PlanTable {
    fn default() -> Self {
        Self::uk_2024_25()
    }
}

fn default_plans() -> &'static PlanTable {
    static PLANS: OnceLock<PlanTable> = OnceLock::new();
    PLANS.get_or_init(PlanTable::uk_2024_25)
}

/// Annual repayment under the built-in 2024/25 plan table
pub fn student_loan_repayment(gross_income: f64, plan: PlanId) -> Result<f64> {
    default_plans().student_loan_repayment(gross_income, plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_plan_names() {
        assert_eq!("Plan 2".parse::<PlanId>().unwrap(), PlanId::Plan2);
        assert_eq!("postgraduate".parse::<PlanId>().unwrap(), PlanId::Postgraduate);
        assert!(matches!("Plan 3".parse::<PlanId>(), Err(ModelError::UnknownPlan(_))));
    }

    #[test]
    fn test_zero_at_or_below_threshold() {
        let table = PlanTable::default();
        for plan in PlanId::ALL {
            let threshold = table.get(plan).unwrap().threshold;
            assert_eq!(table.student_loan_repayment(0.0, plan).unwrap(), 0.0);
            assert_eq!(table.student_loan_repayment(threshold, plan).unwrap(), 0.0);
            assert_eq!(table.student_loan_repayment(threshold - 1.0, plan).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_linear_above_threshold() {
        let table = PlanTable::default();
        let plan = table.get(PlanId::Plan2).unwrap();
        let at_1k = table.student_loan_repayment(plan.threshold + 1_000.0, PlanId::Plan2).unwrap();
        let at_2k = table.student_loan_repayment(plan.threshold + 2_000.0, PlanId::Plan2).unwrap();
        assert_abs_diff_eq!(at_1k, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(at_2k - at_1k, 1_000.0 * plan.rate, epsilon = 1e-9);

        let pg = table.student_loan_repayment(31_000.0, PlanId::Postgraduate).unwrap();
        assert_abs_diff_eq!(pg, 600.0, epsilon = 1e-9);
    }

    #[test]
    fn test_plan_by_name_and_missing_plan() {
        let table = PlanTable::default();
        assert_eq!(table.plan_by_name("Plan 5").unwrap().write_off_years, 40);
        assert!(matches!(table.plan_by_name("Plan 9"), Err(ModelError::UnknownPlan(_))));

        let partial = PlanTable::new([*table.get(PlanId::Plan1).unwrap()]);
        assert!(matches!(
            partial.student_loan_repayment(30_000.0, PlanId::Plan2),
            Err(ModelError::UnknownPlan(_))
        ));
    }

    #[test]
    fn test_series_and_validation() {
        let repayments = student_loan_repayment_series_default(&[20_000.0, 30_000.0]);
        assert_eq!(repayments[0], 0.0);
        assert_abs_diff_eq!(repayments[1], 0.09 * 2_705.0, epsilon = 1e-9);

        assert!(matches!(
            student_loan_repayment(-10.0, PlanId::Plan2),
            Err(ModelError::InvalidInput { .. })
        ));
    }

    fn student_loan_repayment_series_default(incomes: &[f64]) -> Vec<f64> {
        PlanTable::default()
            .student_loan_repayment_series(incomes, PlanId::Plan2)
            .unwrap()
    }

    #[test]
    fn test_write_off_horizon_is_bounded() {
        let table = PlanTable::default();
        assert_eq!(table.get(PlanId::Plan5).unwrap().write_off_months().unwrap(), 480);

        let mut plan = *table.get(PlanId::Plan2).unwrap();
        plan.write_off_years = 400_000_000;
        assert!(matches!(plan.write_off_months(), Err(ModelError::InvalidInput { .. })));
        plan.write_off_years = 51;
        assert!(plan.write_off_months().is_err());
    }
}
