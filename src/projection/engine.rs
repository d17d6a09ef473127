//! Core simulation engine for monthly student loan amortisation

use chrono::{Datelike, Months, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::policy::{
    ExtraRepayments, InstantRepayment, InterestPolicy, RepaymentStrategy, SalaryAssumptions,
};
use super::records::{InstantRepaymentOutcome, Scenario, ScenarioRow, SimulationOutput, SimulationRecord};
use super::state::{LoanState, RepaymentKind};
use crate::assumptions::Assumptions;
use crate::discount::monthly_rate;
use crate::error::{ModelError, Result};
use crate::plans::{PlanId, RepaymentPlan, MAX_HORIZON_MONTHS};
use crate::tax::monthly;

/// Default annual inflation, used for salary growth and discounting
pub const DEFAULT_INFLATION_RATE: f64 = 0.04;

/// Default annual loan interest rate
pub const DEFAULT_INTEREST_RATE: f64 = 0.071;

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub plan: PlanId,

    /// Balance at the start of period 1
    pub initial_balance: f64,

    pub salary: SalaryAssumptions,

    /// Fraction of salary given up before tax (pension contributions etc.)
    #[serde(default)]
    pub salary_sacrifice: f64,

    /// Regular extra repayments in the active scenario
    #[serde(default)]
    pub extra_repayments: ExtraRepayments,

    /// One-time lump sum in the active scenario
    #[serde(default)]
    pub instant_repayment: Option<InstantRepayment>,

    pub interest: InterestPolicy,

    /// Annual inflation rate
    pub inflation_rate: f64,

    /// Period 1 is the month containing this date
    pub start_date: NaiveDate,

    /// Year the borrower graduated; anchors the write-off date
    #[serde(default)]
    pub graduation_year: Option<i32>,

    /// Override the plan's write-off horizon
    #[serde(default)]
    pub horizon_months: Option<u32>,
}

impl SimulationConfig {
    /// Config with salary growing at the configured inflation rate, default
    /// interest and no extra repayments
    pub fn new(plan: PlanId, initial_balance: f64, initial_salary: f64, start_date: NaiveDate) -> Self {
        Self {
            plan,
            initial_balance,
            salary: SalaryAssumptions::with_inflation(initial_salary),
            salary_sacrifice: 0.0,
            extra_repayments: ExtraRepayments::None,
            instant_repayment: None,
            interest: InterestPolicy::Constant {
                annual_rate: DEFAULT_INTEREST_RATE,
            },
            inflation_rate: DEFAULT_INFLATION_RATE,
            start_date,
            graduation_year: None,
            horizon_months: None,
        }
    }

    pub fn with_salary(mut self, salary: SalaryAssumptions) -> Self {
        self.salary = salary;
        self
    }

    pub fn with_salary_sacrifice(mut self, fraction: f64) -> Self {
        self.salary_sacrifice = fraction;
        self
    }

    pub fn with_interest(mut self, interest: InterestPolicy) -> Self {
        self.interest = interest;
        self
    }

    pub fn with_inflation_rate(mut self, inflation_rate: f64) -> Self {
        self.inflation_rate = inflation_rate;
        self
    }

    pub fn with_extra_repayments(mut self, extra: ExtraRepayments) -> Self {
        self.extra_repayments = extra;
        self
    }

    pub fn with_instant_repayment(mut self, instant: InstantRepayment) -> Self {
        self.instant_repayment = Some(instant);
        self
    }

    pub fn with_graduation_year(mut self, year: i32) -> Self {
        self.graduation_year = Some(year);
        self
    }

    pub fn with_horizon_months(mut self, months: u32) -> Self {
        self.horizon_months = Some(months);
        self
    }

    /// Monthly discount rate implied by inflation
    pub fn discount_rate(&self) -> f64 {
        monthly_rate(self.inflation_rate)
    }

    /// Reject invalid inputs before any computation runs
    pub fn validate(&self) -> Result<()> {
        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            return Err(ModelError::invalid_input(
                "initial_balance",
                format!("must be positive, got {}", self.initial_balance),
            ));
        }
        if !self.salary_sacrifice.is_finite() || !(0.0..1.0).contains(&self.salary_sacrifice) {
            return Err(ModelError::invalid_input(
                "salary_sacrifice",
                format!("must be in [0, 1), got {}", self.salary_sacrifice),
            ));
        }
        if !self.inflation_rate.is_finite() || self.inflation_rate <= -1.0 {
            return Err(ModelError::invalid_input(
                "inflation_rate",
                format!("must be above -100%, got {}", self.inflation_rate),
            ));
        }
        if let Some(months) = self.horizon_months {
            if months == 0 || months > MAX_HORIZON_MONTHS {
                return Err(ModelError::invalid_input(
                    "horizon_months",
                    format!("must be 1-{MAX_HORIZON_MONTHS}, got {months}"),
                ));
            }
        }
        if let Some(instant) = &self.instant_repayment {
            if !instant.amount.is_finite() || instant.amount < 0.0 {
                return Err(ModelError::invalid_input(
                    "instant_repayment.amount",
                    format!("must be non-negative, got {}", instant.amount),
                ));
            }
            if instant.period == 0 {
                return Err(ModelError::invalid_input("instant_repayment.period", "periods start at 1"));
            }
        }
        self.salary.validate()?;
        self.interest.validate()?;
        self.extra_repayments.validate()
    }
}

/// Income figures for one period, shared by both scenarios
#[derive(Debug, Clone, Copy)]
struct PeriodIncome {
    salary: f64,
    gross: f64,
    income_tax: f64,
    national_insurance: f64,
}

impl PeriodIncome {
    fn net_before_repayment(&self) -> f64 {
        self.gross - self.income_tax - self.national_insurance
    }
}

/// Inputs resolved once per simulation
struct Prepared<'a> {
    plan: &'a RepaymentPlan,
    dates: Vec<NaiveDate>,
    incomes: Vec<PeriodIncome>,
}

/// Main simulation engine
pub struct SimulationEngine {
    assumptions: Assumptions,
    config: SimulationConfig,
}

impl SimulationEngine {
    /// Create a new engine with given policy tables and config
    pub fn new(assumptions: Assumptions, config: SimulationConfig) -> Self {
        Self { assumptions, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    /// Number of periods simulated.
    ///
    /// An explicit override wins. With a graduation year the loan is written
    /// off on 1 April, `write_off_years + 1` years after graduation. Otherwise
    /// the plan's full write-off horizon runs from the start date.
    pub fn horizon_months(&self) -> Result<u32> {
        if let Some(months) = self.config.horizon_months {
            return Ok(months);
        }
        let plan = self.assumptions.plans.get(self.config.plan)?;
        match self.config.graduation_year {
            Some(year) => months_until_write_off(self.config.start_date, year, plan.write_off_years),
            None => plan.write_off_months(),
        }
    }

    /// Run the active and passive scenarios side by side
    pub fn simulate(&self) -> Result<SimulationOutput> {
        let prepared = self.prepare()?;

        let active_strategy = RepaymentStrategy {
            extra: &self.config.extra_repayments,
            instant: self.config.instant_repayment,
        };
        let (active_rows, active) = self.run_scenario(&prepared, Scenario::Active, active_strategy);
        let (passive_rows, passive) =
            self.run_scenario(&prepared, Scenario::Passive, RepaymentStrategy::passive());

        let instant_repayment = self.config.instant_repayment.map(|instant| {
            let applied = active_rows[(instant.period - 1) as usize].instant_repayment;
            if applied < instant.amount {
                warn!(
                    "Instant repayment of {:.2} in period {} exceeded the balance; applied {:.2}",
                    instant.amount, instant.period, applied
                );
            }
            InstantRepaymentOutcome {
                period: instant.period,
                requested: instant.amount,
                applied,
            }
        });

        let records = prepared
            .dates
            .iter()
            .zip(active_rows.into_iter().zip(passive_rows))
            .enumerate()
            .map(|(i, (date, (active, passive)))| SimulationRecord {
                period: i as u32 + 1,
                date: *date,
                active,
                passive,
            })
            .collect();

        Ok(SimulationOutput {
            plan: self.config.plan,
            records,
            active,
            passive,
            instant_repayment,
        })
    }

    /// Validate the config and resolve the plan, period dates and income path
    fn prepare(&self) -> Result<Prepared<'_>> {
        self.config.validate()?;
        let plan = self.assumptions.plans.get(self.config.plan)?;
        let horizon = self.horizon_months()?;

        if let Some(instant) = &self.config.instant_repayment {
            if instant.period > horizon {
                return Err(ModelError::invalid_input(
                    "instant_repayment.period",
                    format!("period {} is beyond the {horizon}-month horizon", instant.period),
                ));
            }
        }

        let dates = period_dates(self.config.start_date, horizon)?;
        let incomes = self.project_income(&dates);
        Ok(Prepared { plan, dates, incomes })
    }

    /// Monthly salary, gross, tax and NI for each period
    fn project_income(&self, dates: &[NaiveDate]) -> Vec<PeriodIncome> {
        let tax = &self.assumptions.tax;
        self.config
            .salary
            .project(dates, self.config.inflation_rate)
            .into_iter()
            .map(|annual_salary| {
                let salary = annual_salary / 12.0;
                let gross = salary * (1.0 - self.config.salary_sacrifice);
                PeriodIncome {
                    salary,
                    gross,
                    income_tax: monthly(|g| tax.income_tax_on(g), gross),
                    national_insurance: monthly(|g| tax.national_insurance_on(g), gross),
                }
            })
            .collect()
    }

    /// Simulate one scenario over the horizon.
    ///
    /// Active and passive runs both come through here and differ only in
    /// `strategy`.
    fn run_scenario(
        &self,
        prepared: &Prepared<'_>,
        scenario: Scenario,
        strategy: RepaymentStrategy<'_>,
    ) -> (Vec<ScenarioRow>, LoanState) {
        let horizon = prepared.dates.len() as u32;
        let plan = prepared.plan;
        let mut state = LoanState::new(self.config.initial_balance);
        let mut rows = Vec::with_capacity(prepared.dates.len());

        for (i, (date, income)) in prepared.dates.iter().zip(&prepared.incomes).enumerate() {
            let period = i as u32 + 1;

            // Closed loans carry their terminal balance with no further activity
            if state.is_closed() {
                rows.push(ScenarioRow {
                    salary: income.salary,
                    gross_income: income.gross,
                    income_tax: income.income_tax,
                    national_insurance: income.national_insurance,
                    net_income: income.net_before_repayment(),
                    opening_balance: state.balance,
                    interest_rate: 0.0,
                    interest: 0.0,
                    statutory_repayment: 0.0,
                    extra_repayment: 0.0,
                    instant_repayment: 0.0,
                    closing_balance: state.balance,
                    status: state.status,
                });
                continue;
            }

            state.begin_period();
            let opening_balance = state.balance;

            let interest_rate = self.config.interest.period_rate(i, *date, income.gross * 12.0);
            let interest = state.accrue_interest(interest_rate);

            let statutory_due = monthly(|g| plan.repayment(g), income.gross);
            let statutory = state.apply_repayment(RepaymentKind::Statutory, statutory_due);
            let extra = state.apply_repayment(RepaymentKind::Extra, strategy.extra.amount(period));
            let instant = state.apply_repayment(RepaymentKind::Instant, strategy.instant_due(period));

            let status = state.check_termination(horizon);
            if status.is_closed() {
                debug!(
                    "{:?} scenario {:?} in period {} ({}): repaid {:.2}, interest {:.2}, forgiven {:.2}",
                    scenario,
                    status,
                    period,
                    date,
                    state.total_repaid(),
                    state.cumulative_interest,
                    state.forgiven,
                );
            }

            rows.push(ScenarioRow {
                salary: income.salary,
                gross_income: income.gross,
                income_tax: income.income_tax,
                national_insurance: income.national_insurance,
                net_income: income.net_before_repayment() - (statutory + extra + instant),
                opening_balance,
                interest_rate,
                interest,
                statutory_repayment: statutory,
                extra_repayment: extra,
                instant_repayment: instant,
                closing_balance: state.balance,
                status,
            });
        }

        (rows, state)
    }
}

/// Whole months from the start month up to the April write-off date
fn months_until_write_off(start: NaiveDate, graduation_year: i32, write_off_years: u32) -> Result<u32> {
    let write_off_year = i64::from(graduation_year) + i64::from(write_off_years) + 1;
    let months = (write_off_year - i64::from(start.year())) * 12 + 4 - i64::from(start.month());
    if months <= 0 {
        return Err(ModelError::invalid_input(
            "graduation_year",
            format!("write-off in April {write_off_year} has already passed at {start}"),
        ));
    }
    u32::try_from(months)
        .ok()
        .filter(|months| *months <= MAX_HORIZON_MONTHS)
        .ok_or_else(|| {
            ModelError::invalid_input(
                "graduation_year",
                format!("{months} months to write-off exceeds {MAX_HORIZON_MONTHS}"),
            )
        })
}

/// First-of-month date for each period, starting with the month of `start`
fn period_dates(start: NaiveDate, horizon: u32) -> Result<Vec<NaiveDate>> {
    let first = start.with_day(1).unwrap_or(start);
    (0..horizon)
        .map(|i| {
            first.checked_add_months(Months::new(i)).ok_or_else(|| {
                ModelError::invalid_input("start_date", format!("{start} plus {i} months is out of range"))
            })
        })
        .collect()
}

/// Simulate under the built-in 2024/25 tables
pub fn simulate_repayment(config: &SimulationConfig) -> Result<SimulationOutput> {
    SimulationEngine::new(Assumptions::default_2024_25(), config.clone()).simulate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::state::LoanStatus;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::collections::BTreeMap;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 15).unwrap()
    }

    fn flat_config(balance: f64, salary: f64, annual_rate: f64) -> SimulationConfig {
        SimulationConfig::new(PlanId::Plan2, balance, salary, start())
            .with_salary(SalaryAssumptions::flat(salary))
            .with_interest(InterestPolicy::Constant { annual_rate })
    }

    #[test]
    fn test_first_month_worked_example() {
        let output = simulate_repayment(&flat_config(45_000.0, 30_000.0, 0.058)).unwrap();
        let row = &output.records[0].passive;

        assert_abs_diff_eq!(row.statutory_repayment, 0.09 * (30_000.0 - 27_295.0) / 12.0, epsilon = 1e-9);
        assert_abs_diff_eq!(row.statutory_repayment, 20.29, epsilon = 0.01);
        assert_abs_diff_eq!(row.interest, 217.5, epsilon = 1e-9);
        assert_abs_diff_eq!(
            row.closing_balance,
            45_000.0 * (1.0 + 0.058 / 12.0) - 0.09 * 2_705.0 / 12.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(row.closing_balance, 45_197.46, epsilon = 0.5);
    }

    #[test]
    fn test_record_dates_are_month_starts() {
        let output = simulate_repayment(&flat_config(45_000.0, 30_000.0, 0.058)).unwrap();
        assert_eq!(output.records[0].date, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert_eq!(output.records[4].date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(output.records.len(), 360);
    }

    #[test]
    fn test_zero_interest_pays_off_within_bound() {
        let config = flat_config(10_000.0, 60_000.0, 0.0);
        let output = simulate_repayment(&config).unwrap();
        let monthly_repayment: f64 = 0.09 * (60_000.0 - 27_295.0) / 12.0;
        let bound = (10_000.0 / monthly_repayment).ceil() as u32;

        assert_eq!(output.passive.status, LoanStatus::PaidOff);
        assert!(output.passive.closed_at.unwrap() <= bound);
        assert_eq!(output.passive.balance, 0.0);
        assert_abs_diff_eq!(output.passive.total_repaid(), 10_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_write_off_when_income_below_threshold() {
        let config = flat_config(45_000.0, 20_000.0, 0.06);
        let output = simulate_repayment(&config).unwrap();

        assert_eq!(output.passive.status, LoanStatus::WrittenOff);
        assert_eq!(output.passive.closed_at, Some(360));
        let expected = 45_000.0 * (1.0 + 0.005_f64).powi(360);
        assert_relative_eq!(output.passive.forgiven, expected, max_relative = 1e-9);
        assert_relative_eq!(
            output.records.last().unwrap().passive.closing_balance,
            expected,
            max_relative = 1e-9
        );
        assert_eq!(output.passive.total_repaid(), 0.0);
    }

    #[test]
    fn test_closed_scenario_holds_terminal_balance() {
        let config = flat_config(5_000.0, 40_000.0, 0.05).with_extra_repayments(ExtraRepayments::Monthly(500.0));
        let output = simulate_repayment(&config).unwrap();
        let closed_at = output.active.closed_at.unwrap() as usize;

        assert_eq!(output.records.len(), 360);
        for record in &output.records[closed_at..] {
            assert_eq!(record.active.closing_balance, 0.0);
            assert_eq!(record.active.total_repayment(), 0.0);
            assert_eq!(record.active.status, LoanStatus::PaidOff);
            // Income is still reported after the loan closes
            assert!(record.active.net_income > 0.0);
        }
        assert!(output.active.closed_at < output.passive.closed_at);
    }

    #[test]
    fn test_final_repayment_is_capped() {
        let config = flat_config(1_000.0, 40_000.0, 0.0).with_extra_repayments(ExtraRepayments::Monthly(300.0));
        let output = simulate_repayment(&config).unwrap();
        let closed_at = output.active.closed_at.unwrap() as usize;
        let last = &output.records[closed_at - 1].active;

        assert!(last.extra_repayment < 300.0);
        assert_abs_diff_eq!(output.active.total_repaid(), 1_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_instant_repayment_larger_than_balance() {
        let config = flat_config(10_000.0, 30_000.0, 0.0).with_instant_repayment(InstantRepayment::immediate(25_000.0));
        let output = simulate_repayment(&config).unwrap();
        let outcome = output.instant_repayment.unwrap();

        // Statutory repayment comes off first, the lump sum clears the rest
        let statutory = output.records[0].active.statutory_repayment;
        assert_abs_diff_eq!(outcome.applied, 10_000.0 - statutory, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.unapplied(), 25_000.0 - outcome.applied, epsilon = 1e-9);
        assert_eq!(output.active.closed_at, Some(1));
        assert_eq!(output.passive.status, LoanStatus::WrittenOff);
    }

    #[test]
    fn test_scheduled_instant_repayment_after_payoff_applies_nothing() {
        let config = flat_config(500.0, 30_000.0, 0.0)
            .with_extra_repayments(ExtraRepayments::Monthly(500.0))
            .with_instant_repayment(InstantRepayment { amount: 1_000.0, period: 12 });
        let output = simulate_repayment(&config).unwrap();
        assert_eq!(output.instant_repayment.unwrap().applied, 0.0);
    }

    #[test]
    fn test_extra_repayment_schedule() {
        let schedule = BTreeMap::from([(2, 1_000.0), (3, 2_000.0)]);
        let config = flat_config(45_000.0, 30_000.0, 0.058).with_extra_repayments(ExtraRepayments::Schedule(schedule));
        let output = simulate_repayment(&config).unwrap();

        assert_eq!(output.records[0].active.extra_repayment, 0.0);
        assert_eq!(output.records[1].active.extra_repayment, 1_000.0);
        assert_eq!(output.records[2].active.extra_repayment, 2_000.0);
        assert_eq!(output.records[3].active.extra_repayment, 0.0);
        assert!(output.records.iter().all(|r| r.passive.extra_repayment == 0.0));
        assert_abs_diff_eq!(output.active.cumulative_extra, 3_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_passive_matches_active_without_extras() {
        let output = simulate_repayment(&flat_config(45_000.0, 35_000.0, 0.07)).unwrap();
        for record in &output.records {
            assert_eq!(record.active, record.passive);
        }
    }

    #[test]
    fn test_net_income_deducts_tax_and_repayments() {
        let output = simulate_repayment(&flat_config(45_000.0, 30_000.0, 0.058)).unwrap();
        let row = &output.records[0].passive;
        let expected = 2_500.0 - 3_486.0 / 12.0 - 1_393.92 / 12.0 - row.statutory_repayment;
        assert_abs_diff_eq!(row.net_income, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_salary_sacrifice_reduces_repayment() {
        let base = flat_config(45_000.0, 40_000.0, 0.05);
        let sacrificed = base.clone().with_salary_sacrifice(0.1);
        let full = simulate_repayment(&base).unwrap();
        let reduced = simulate_repayment(&sacrificed).unwrap();

        let row = &reduced.records[0].passive;
        assert_abs_diff_eq!(row.gross_income, 3_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(row.statutory_repayment, 0.09 * (36_000.0 - 27_295.0) / 12.0, epsilon = 1e-9);
        assert!(row.statutory_repayment < full.records[0].passive.statutory_repayment);
    }

    #[test]
    fn test_horizon_override_and_plan_horizon() {
        let five_years = flat_config(45_000.0, 20_000.0, 0.05).with_horizon_months(60);
        let output = simulate_repayment(&five_years).unwrap();
        assert_eq!(output.records.len(), 60);
        assert_eq!(output.passive.status, LoanStatus::WrittenOff);

        let mut plan5 = flat_config(45_000.0, 20_000.0, 0.05);
        plan5.plan = PlanId::Plan5;
        assert_eq!(simulate_repayment(&plan5).unwrap().records.len(), 480);
    }

    #[test]
    fn test_horizon_anchored_to_graduation() {
        // Plan 2 graduate of 2020 is written off on 1 April 2051
        let config = flat_config(45_000.0, 20_000.0, 0.05).with_graduation_year(2020);
        let output = simulate_repayment(&config).unwrap();
        assert_eq!(output.records.len(), 319);
        assert_eq!(output.records.last().unwrap().date, NaiveDate::from_ymd_opt(2051, 3, 1).unwrap());
        assert_eq!(output.passive.status, LoanStatus::WrittenOff);

        let expired = flat_config(45_000.0, 20_000.0, 0.05).with_graduation_year(1990);
        assert!(matches!(simulate_repayment(&expired), Err(ModelError::InvalidInput { .. })));

        // An explicit horizon still takes precedence
        let overridden = config.with_horizon_months(12);
        assert_eq!(simulate_repayment(&overridden).unwrap().records.len(), 12);
    }

    #[test]
    fn test_implausible_horizons_rejected() {
        let too_long = flat_config(45_000.0, 30_000.0, 0.05).with_horizon_months(MAX_HORIZON_MONTHS + 1);
        assert!(matches!(simulate_repayment(&too_long), Err(ModelError::InvalidInput { .. })));

        let mut assumptions = Assumptions::default_2024_25();
        let mut plan = *assumptions.plans.get(PlanId::Plan2).unwrap();
        plan.write_off_years = 400_000_000;
        assumptions.plans = crate::plans::PlanTable::new([plan]);
        let engine = SimulationEngine::new(assumptions, flat_config(45_000.0, 30_000.0, 0.05));
        assert!(matches!(engine.simulate(), Err(ModelError::InvalidInput { .. })));
    }

    #[test]
    fn test_default_salary_grows_with_configured_inflation() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        let config = SimulationConfig::new(PlanId::Plan2, 45_000.0, 30_000.0, start).with_inflation_rate(0.02);
        let output = simulate_repayment(&config).unwrap();
        assert_abs_diff_eq!(output.records[0].passive.salary * 12.0, 30_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(output.records[1].passive.salary * 12.0, 30_600.0, epsilon = 1e-9);
    }

    #[test]
    fn test_trimmed_drops_tail_after_both_close() {
        let output = simulate_repayment(&flat_config(5_000.0, 60_000.0, 0.0)).unwrap();
        let closed_at = output.passive.closed_at.unwrap();
        let trimmed = output.trimmed();
        assert_eq!(trimmed.records.len(), closed_at as usize);

        // Written-off loans close at the horizon, so nothing is dropped
        let never_repaid = simulate_repayment(&flat_config(5_000.0, 10_000.0, 0.0)).unwrap().trimmed();
        assert_eq!(never_repaid.records.len(), 360);
    }

    #[test]
    fn test_series_helpers() {
        let config = flat_config(45_000.0, 30_000.0, 0.058).with_extra_repayments(ExtraRepayments::Monthly(100.0));
        let output = simulate_repayment(&config).unwrap();
        let active = output.repayment_series(Scenario::Active);
        let passive = output.repayment_series(Scenario::Passive);

        assert_eq!(active.len(), passive.len());
        assert_abs_diff_eq!(active[0] - passive[0], 100.0, epsilon = 1e-9);
        assert_eq!(output.balance_series(Scenario::Passive)[0], output.records[0].passive.closing_balance);

        let summary = output.summary(Scenario::Active);
        assert_abs_diff_eq!(summary.total_repaid, active.iter().sum::<f64>(), epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let bad_balance = flat_config(0.0, 30_000.0, 0.05);
        assert!(matches!(simulate_repayment(&bad_balance), Err(ModelError::InvalidInput { .. })));

        let bad_sacrifice = flat_config(1_000.0, 30_000.0, 0.05).with_salary_sacrifice(1.0);
        assert!(simulate_repayment(&bad_sacrifice).is_err());

        let late_instant = flat_config(1_000.0, 30_000.0, 0.05)
            .with_horizon_months(12)
            .with_instant_repayment(InstantRepayment { amount: 100.0, period: 13 });
        assert!(simulate_repayment(&late_instant).is_err());

        let negative_extra = flat_config(1_000.0, 30_000.0, 0.05).with_extra_repayments(ExtraRepayments::Monthly(-5.0));
        assert!(simulate_repayment(&negative_extra).is_err());
    }

    #[test]
    fn test_missing_plan_in_tables() {
        let mut assumptions = Assumptions::default_2024_25();
        assumptions.plans = crate::plans::PlanTable::new([]);
        let engine = SimulationEngine::new(assumptions, flat_config(1_000.0, 30_000.0, 0.05));
        assert!(matches!(engine.simulate(), Err(ModelError::UnknownPlan(_))));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = flat_config(45_000.0, 30_000.0, 0.058)
            .with_extra_repayments(ExtraRepayments::Schedule(BTreeMap::from([(6, 250.0)])))
            .with_instant_repayment(InstantRepayment::immediate(1_000.0));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
