//! Caller-supplied assumptions for a simulation: salary path, interest policy
//! and extra repayment strategy

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// How annual salary growth is applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Compounding {
    /// `(1 + g)^(1/12)` every month
    Monthly,
    /// Full annual raise after the given calendar month (1-12)
    Annually { month: u32 },
}

impl Default for Compounding {
    fn default() -> Self {
        Compounding::Annually { month: 12 }
    }
}

/// Salary path over the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SalaryAssumptions {
    /// Starting annual salary grown at a fixed annual rate
    Growth {
        initial_salary: f64,
        /// `None` grows with the simulation's inflation rate
        #[serde(default)]
        annual_growth: Option<f64>,
        #[serde(default)]
        compounding: Compounding,
    },
    /// Annual salary for each period; the last value is held if the series is short
    Explicit(Vec<f64>),
}

impl SalaryAssumptions {
    pub fn flat(annual_salary: f64) -> Self {
        SalaryAssumptions::Growth {
            initial_salary: annual_salary,
            annual_growth: Some(0.0),
            compounding: Compounding::default(),
        }
    }

    pub fn growing(initial_salary: f64, annual_growth: f64) -> Self {
        SalaryAssumptions::Growth {
            initial_salary,
            annual_growth: Some(annual_growth),
            compounding: Compounding::default(),
        }
    }

    /// Salary that keeps pace with whatever inflation rate the simulation uses
    pub fn with_inflation(initial_salary: f64) -> Self {
        SalaryAssumptions::Growth {
            initial_salary,
            annual_growth: None,
            compounding: Compounding::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SalaryAssumptions::Growth { initial_salary, annual_growth, compounding } => {
                if !initial_salary.is_finite() || *initial_salary < 0.0 {
                    return Err(ModelError::invalid_input(
                        "initial_salary",
                        format!("must be non-negative, got {initial_salary}"),
                    ));
                }
                if let Some(growth) = annual_growth {
                    if !growth.is_finite() || *growth <= -1.0 {
                        return Err(ModelError::invalid_input(
                            "annual_growth",
                            format!("must be above -100%, got {growth}"),
                        ));
                    }
                }
                if let Compounding::Annually { month } = compounding {
                    if !(1..=12).contains(month) {
                        return Err(ModelError::invalid_input(
                            "compounding.month",
                            format!("must be 1-12, got {month}"),
                        ));
                    }
                }
            }
            SalaryAssumptions::Explicit(salaries) => {
                if salaries.is_empty() {
                    return Err(ModelError::invalid_input("salary", "explicit salary series is empty"));
                }
                if let Some((i, s)) = salaries
                    .iter()
                    .enumerate()
                    .find(|(_, s)| !s.is_finite() || **s < 0.0)
                {
                    return Err(ModelError::invalid_input(
                        &format!("salary[{i}]"),
                        format!("must be non-negative, got {s}"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Annual salary for each period date; `inflation_rate` stands in for a missing growth rate
    pub fn project(&self, dates: &[NaiveDate], inflation_rate: f64) -> Vec<f64> {
        match self {
            SalaryAssumptions::Growth { initial_salary, annual_growth, compounding } => {
                let annual_growth = annual_growth.unwrap_or(inflation_rate);
                let mut salaries = Vec::with_capacity(dates.len());
                let mut salary = *initial_salary;
                let mut previous: Option<&NaiveDate> = None;
                for date in dates {
                    if let Some(prev) = previous {
                        match compounding {
                            Compounding::Monthly => {
                                salary *= (1.0 + annual_growth).powf(1.0 / 12.0);
                            }
                            Compounding::Annually { month } => {
                                // Raise lands in the period after the anniversary month
                                if prev.month() == *month {
                                    salary *= 1.0 + annual_growth;
                                }
                            }
                        }
                    }
                    salaries.push(salary);
                    previous = Some(date);
                }
                salaries
            }
            SalaryAssumptions::Explicit(series) => {
                let last = series.last().copied().unwrap_or(0.0);
                (0..dates.len())
                    .map(|i| series.get(i).copied().unwrap_or(last))
                    .collect()
            }
        }
    }
}

/// Interest rate source; may vary by period and by current annual income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterestPolicy {
    /// Nominal annual rate, `annual / 12` per month
    Constant { annual_rate: f64 },
    /// Effective annual rate spread by days: `(1 + r)^(days_in_month / days_in_year) - 1`
    DayCount { annual_rate: f64 },
    /// Base rate plus a premium rising linearly from 0 at `lower_income`
    /// to `max_premium` at `upper_income`
    IncomeLinked {
        base_rate: f64,
        max_premium: f64,
        lower_income: f64,
        upper_income: f64,
    },
    /// Annual rate per period; the last value is held
    Schedule(Vec<f64>),
}

impl InterestPolicy {
    /// Annual rate for a period index (0-based) and annual income
    pub fn annual_rate(&self, period_index: usize, annual_income: f64) -> f64 {
        match self {
            InterestPolicy::Constant { annual_rate } | InterestPolicy::DayCount { annual_rate } => {
                *annual_rate
            }
            InterestPolicy::IncomeLinked { base_rate, max_premium, lower_income, upper_income } => {
                let share = if upper_income > lower_income {
                    ((annual_income - lower_income) / (upper_income - lower_income)).clamp(0.0, 1.0)
                } else if annual_income > *lower_income {
                    1.0
                } else {
                    0.0
                };
                base_rate + max_premium * share
            }
            InterestPolicy::Schedule(rates) => rates
                .get(period_index)
                .or(rates.last())
                .copied()
                .unwrap_or(0.0),
        }
    }

    /// Rate applied to the opening balance of the period starting at `date`
    pub fn period_rate(&self, period_index: usize, date: NaiveDate, annual_income: f64) -> f64 {
        let annual = self.annual_rate(period_index, annual_income);
        match self {
            InterestPolicy::DayCount { .. } => {
                let year_start = date.with_month(1).unwrap_or(date);
                let fraction = days_spanned(date, 1) / days_spanned(year_start, 12);
                (1.0 + annual).powf(fraction) - 1.0
            }
            _ => annual / 12.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let rates: Vec<f64> = match self {
            InterestPolicy::Constant { annual_rate } | InterestPolicy::DayCount { annual_rate } => {
                vec![*annual_rate]
            }
            InterestPolicy::IncomeLinked { base_rate, max_premium, lower_income, upper_income } => {
                if *max_premium < 0.0 || !(lower_income.is_finite() && upper_income.is_finite()) {
                    return Err(ModelError::invalid_input(
                        "interest",
                        "income-linked premium must be non-negative with finite income bounds",
                    ));
                }
                vec![*base_rate, base_rate + max_premium]
            }
            InterestPolicy::Schedule(rates) => {
                if rates.is_empty() {
                    return Err(ModelError::invalid_input("interest", "rate schedule is empty"));
                }
                rates.clone()
            }
        };
        match rates.iter().find(|r| !r.is_finite() || **r <= -1.0) {
            Some(r) => Err(ModelError::invalid_input(
                "interest",
                format!("annual rate must be above -100%, got {r}"),
            )),
            None => Ok(()),
        }
    }
}

/// Days from `from` to `months` later
fn days_spanned(from: NaiveDate, months: u32) -> f64 {
    from.checked_add_months(Months::new(months))
        .map(|to| (to - from).num_days() as f64)
        .unwrap_or(30.436_875 * months as f64)
}

/// Regular extra repayments made in the active scenario
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ExtraRepayments {
    #[default]
    None,
    /// Same amount every period
    Monthly(f64),
    /// Amount by 1-based period number
    Schedule(BTreeMap<u32, f64>),
}

impl ExtraRepayments {
    /// Extra repayment planned for a 1-based period
    pub fn amount(&self, period: u32) -> f64 {
        match self {
            ExtraRepayments::None => 0.0,
            ExtraRepayments::Monthly(amount) => *amount,
            ExtraRepayments::Schedule(amounts) => amounts.get(&period).copied().unwrap_or(0.0),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bad = match self {
            ExtraRepayments::None => None,
            ExtraRepayments::Monthly(amount) => Some(*amount).filter(|a| !a.is_finite() || *a < 0.0),
            ExtraRepayments::Schedule(amounts) => amounts
                .values()
                .copied()
                .find(|a| !a.is_finite() || *a < 0.0),
        };
        match bad {
            Some(amount) => Err(ModelError::invalid_input(
                "extra_repayments",
                format!("amounts must be non-negative, got {amount}"),
            )),
            None => Ok(()),
        }
    }
}

/// One-time lump sum paid in the active scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstantRepayment {
    pub amount: f64,
    /// 1-based period in which the lump sum is paid
    #[serde(default = "default_instant_period")]
    pub period: u32,
}

fn default_instant_period() -> u32 {
    1
}

impl InstantRepayment {
    /// Lump sum paid in the first period
    pub fn immediate(amount: f64) -> Self {
        Self { amount, period: 1 }
    }
}

/// Strategy distinguishing the active run from the passive one
#[derive(Debug, Clone, Copy)]
pub struct RepaymentStrategy<'a> {
    pub extra: &'a ExtraRepayments,
    pub instant: Option<InstantRepayment>,
}

impl RepaymentStrategy<'static> {
    /// Statutory repayments only
    pub fn passive() -> Self {
        static NONE: ExtraRepayments = ExtraRepayments::None;
        Self {
            extra: &NONE,
            instant: None,
        }
    }
}

impl RepaymentStrategy<'_> {
    pub fn instant_due(&self, period: u32) -> f64 {
        match self.instant {
            Some(instant) if instant.period == period => instant.amount,
            _ => 0.0,
        }
    }
}
