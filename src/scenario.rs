//! Scenario runner for batch simulations
//!
//! Loads policy tables once, then runs many simulations with different
//! configurations without re-reading CSV files.

use std::path::Path;

use rayon::prelude::*;

use crate::assumptions::Assumptions;
use crate::discount::present_value;
use crate::error::Result;
use crate::projection::{Scenario, SimulationConfig, SimulationEngine, SimulationOutput};

/// Headline figures from one simulation in a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub config: SimulationConfig,
    /// Present value of active-scenario repayments at the config's discount rate
    pub active_npv: f64,
    pub passive_npv: f64,
    pub active_closed_at: Option<u32>,
    pub passive_closed_at: Option<u32>,
}

impl SweepResult {
    /// Positive when the active strategy costs more in today's money
    pub fn npv_difference(&self) -> f64 {
        self.active_npv - self.passive_npv
    }
}

/// Pre-loaded scenario runner
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_csv()?;
///
/// for lump_sum in [0.0, 5_000.0, 10_000.0] {
///     let config = base.clone().with_instant_repayment(InstantRepayment::immediate(lump_sum));
///     let output = runner.run(config)?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    base_assumptions: Assumptions,
}

impl ScenarioRunner {
    /// Create runner with the built-in 2024/25 tables
    pub fn new() -> Self {
        Self {
            base_assumptions: Assumptions::default_2024_25(),
        }
    }

    /// Create runner by loading tables from data/assumptions/
    pub fn from_csv() -> Result<Self> {
        Ok(Self {
            base_assumptions: Assumptions::from_csv()?,
        })
    }

    /// Create runner from a specific assumptions directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        Ok(Self {
            base_assumptions: Assumptions::from_csv_path(path)?,
        })
    }

    pub fn with_assumptions(assumptions: Assumptions) -> Self {
        Self {
            base_assumptions: assumptions,
        }
    }

    /// Run a single simulation
    pub fn run(&self, config: SimulationConfig) -> Result<SimulationOutput> {
        SimulationEngine::new(self.base_assumptions.clone(), config).simulate()
    }

    /// Run many configs in parallel, preserving input order
    pub fn run_batch(&self, configs: &[SimulationConfig]) -> Vec<Result<SimulationOutput>> {
        configs.par_iter().map(|config| self.run(config.clone())).collect()
    }

    /// Run many configs in parallel and reduce each to its discounted totals
    pub fn sweep(&self, configs: &[SimulationConfig]) -> Result<Vec<SweepResult>> {
        configs
            .par_iter()
            .map(|config| {
                let output = self.run(config.clone())?;
                let rate = config.discount_rate();
                Ok(SweepResult {
                    config: config.clone(),
                    active_npv: present_value(&output.repayment_series(Scenario::Active), rate)?,
                    passive_npv: present_value(&output.repayment_series(Scenario::Passive), rate)?,
                    active_closed_at: output.active.closed_at,
                    passive_closed_at: output.passive.closed_at,
                })
            })
            .collect()
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.base_assumptions
    }

    /// Mutable access for customising tables before a batch
    pub fn assumptions_mut(&mut self) -> &mut Assumptions {
        &mut self.base_assumptions
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::PlanId;
    use crate::projection::{InstantRepayment, InterestPolicy, SalaryAssumptions};
    use chrono::NaiveDate;

    fn base_config() -> SimulationConfig {
        SimulationConfig::new(PlanId::Plan2, 45_000.0, 30_000.0, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
    }

    #[test]
    fn test_sweep_over_instant_repayments() {
        let runner = ScenarioRunner::new();
        let configs: Vec<_> = [0.0, 10_000.0, 50_000.0]
            .iter()
            .map(|&amount| base_config().with_instant_repayment(InstantRepayment::immediate(amount)))
            .collect();

        let results = runner.sweep(&configs).unwrap();
        assert_eq!(results.len(), 3);

        // Without a lump sum both scenarios are identical
        assert!(results[0].npv_difference().abs() < 1e-9);
        assert_eq!(results[2].active_closed_at, Some(1));
        assert!(results[1].active_closed_at.unwrap_or(u32::MAX) <= results[1].passive_closed_at.unwrap_or(u32::MAX));
    }

    #[test]
    fn test_batch_preserves_order_and_errors() {
        let runner = ScenarioRunner::new();
        let mut bad = base_config();
        bad.initial_balance = -1.0;
        let results = runner.run_batch(&[base_config(), bad]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(runner.sweep(&[base_config(), base_config().with_salary_sacrifice(2.0)]).is_err());
    }

    #[test]
    fn test_customised_assumptions() {
        let mut runner = ScenarioRunner::new();
        runner.assumptions_mut().plans = crate::plans::PlanTable::new([]);
        assert!(runner.run(base_config()).is_err());

        let flat = base_config()
            .with_salary(SalaryAssumptions::flat(30_000.0))
            .with_interest(InterestPolicy::Constant { annual_rate: 0.0 });
        assert!(ScenarioRunner::default().run(flat).is_ok());
    }
}
