//! Simulation output structures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::state::{LoanState, LoanStatus};
use crate::plans::PlanId;

/// Which of the two parallel runs a figure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    /// With extra and instant repayments
    Active,
    /// Statutory repayments only
    Passive,
}

/// One scenario's figures for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    // Income (monthly)
    /// Salary before sacrifice
    pub salary: f64,
    /// Salary after sacrifice; basis for tax, NI and repayments
    pub gross_income: f64,
    pub income_tax: f64,
    pub national_insurance: f64,
    /// Gross less tax, NI and all loan repayments
    pub net_income: f64,

    // Loan
    pub opening_balance: f64,
    pub interest_rate: f64,
    pub interest: f64,
    pub statutory_repayment: f64,
    pub extra_repayment: f64,
    pub instant_repayment: f64,
    pub closing_balance: f64,
    pub status: LoanStatus,
}

impl ScenarioRow {
    pub fn total_repayment(&self) -> f64 {
        self.statutory_repayment + self.extra_repayment + self.instant_repayment
    }
}

/// Active and passive figures for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    /// 1-based period number
    pub period: u32,
    /// First day of the period's month
    pub date: NaiveDate,
    pub active: ScenarioRow,
    pub passive: ScenarioRow,
}

impl SimulationRecord {
    pub fn row(&self, scenario: Scenario) -> &ScenarioRow {
        match scenario {
            Scenario::Active => &self.active,
            Scenario::Passive => &self.passive,
        }
    }
}

/// How much of a requested lump sum reached the balance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstantRepaymentOutcome {
    pub period: u32,
    pub requested: f64,
    pub applied: f64,
}

impl InstantRepaymentOutcome {
    /// Portion of the lump sum that exceeded the balance
    pub fn unapplied(&self) -> f64 {
        (self.requested - self.applied).max(0.0)
    }
}

/// Complete simulation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub plan: PlanId,

    /// Monthly records, equal length for both scenarios
    pub records: Vec<SimulationRecord>,

    /// Final active-scenario state
    pub active: LoanState,

    /// Final passive-scenario state
    pub passive: LoanState,

    pub instant_repayment: Option<InstantRepaymentOutcome>,
}

impl SimulationOutput {
    pub fn state(&self, scenario: Scenario) -> &LoanState {
        match scenario {
            Scenario::Active => &self.active,
            Scenario::Passive => &self.passive,
        }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    /// Total repayment per period, ready for discounting
    pub fn repayment_series(&self, scenario: Scenario) -> Vec<f64> {
        self.series(scenario, ScenarioRow::total_repayment)
    }

    pub fn net_income_series(&self, scenario: Scenario) -> Vec<f64> {
        self.series(scenario, |row| row.net_income)
    }

    pub fn balance_series(&self, scenario: Scenario) -> Vec<f64> {
        self.series(scenario, |row| row.closing_balance)
    }

    fn series<F>(&self, scenario: Scenario, f: F) -> Vec<f64>
    where
        F: Fn(&ScenarioRow) -> f64,
    {
        self.records.iter().map(|r| f(r.row(scenario))).collect()
    }

    /// Drop periods after both scenarios have closed
    pub fn trimmed(mut self) -> Self {
        let last_close = self
            .active
            .closed_at
            .zip(self.passive.closed_at)
            .map(|(a, p)| a.max(p));
        if let Some(last) = last_close {
            self.records.truncate(last as usize);
        }
        self
    }

    /// Get summary statistics
    pub fn summary(&self, scenario: Scenario) -> ScenarioSummary {
        let state = self.state(scenario);
        ScenarioSummary {
            scenario,
            status: state.status,
            closed_at: state.closed_at,
            total_statutory: state.cumulative_statutory,
            total_extra: state.cumulative_extra,
            total_instant: state.cumulative_instant,
            total_repaid: state.total_repaid(),
            total_interest: state.cumulative_interest,
            forgiven: state.forgiven,
            final_balance: state.balance,
        }
    }
}

/// Summary statistics for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario: Scenario,
    pub status: LoanStatus,
    pub closed_at: Option<u32>,
    pub total_statutory: f64,
    pub total_extra: f64,
    pub total_instant: f64,
    pub total_repaid: f64,
    pub total_interest: f64,
    pub forgiven: f64,
    pub final_balance: f64,
}
