//! Monthly loan projection for the active and passive scenarios

mod state;
mod engine;
mod records;
pub mod policy;

pub use state::{LoanState, LoanStatus, RepaymentKind};
pub use engine::{
    simulate_repayment, SimulationConfig, SimulationEngine, DEFAULT_INFLATION_RATE, DEFAULT_INTEREST_RATE,
};
pub use records::{
    InstantRepaymentOutcome, Scenario, ScenarioRow, ScenarioSummary, SimulationOutput, SimulationRecord,
};
pub use policy::{
    Compounding, ExtraRepayments, InstantRepayment, InterestPolicy, RepaymentStrategy, SalaryAssumptions,
};
