//! Student Loan Model - UK income tax, National Insurance and student loan repayment simulation
//!
//! This library provides:
//! - Progressive band schedules with a tapered personal allowance
//! - Income tax and National Insurance on annual or monthly income
//! - Statutory repayments for Plans 1, 2, 4, 5 and Postgraduate loans
//! - Monthly amortisation of a loan with and without extra repayments
//! - Discounting and net present value of repayment streams
//! - Parallel sweeps over many simulation configs

pub mod error;
pub mod bands;
pub mod tax;
pub mod plans;
pub mod discount;
pub mod assumptions;
pub mod projection;
pub mod scenario;

// Re-export commonly used types
pub use error::{ModelError, Result};
pub use bands::{Band, BandSchedule};
pub use tax::{income_tax, national_insurance, AllowanceTaper, TaxTables};
pub use plans::{student_loan_repayment, PlanId, PlanTable, RepaymentPlan};
pub use discount::{net_present_value, present_value};
pub use assumptions::Assumptions;
pub use projection::{simulate_repayment, SimulationConfig, SimulationEngine, SimulationOutput};
pub use scenario::ScenarioRunner;
