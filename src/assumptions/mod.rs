//! Policy tables: tax bands, NI bands and repayment plans

pub mod loader;

pub use loader::LoadedAssumptions;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plans::PlanTable;
use crate::tax::TaxTables;

/// Container for all policy tables used by a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    pub tax: TaxTables,
    pub plans: PlanTable,
}

impl Assumptions {
    /// Built-in 2024/25 tables
    pub fn default_2024_25() -> Self {
        Self {
            tax: TaxTables::uk_2024_25(),
            plans: PlanTable::uk_2024_25(),
        }
    }

    /// Load tables from CSV files in the default location (data/assumptions/)
    pub fn from_csv() -> Result<Self> {
        Self::from_csv_path(Path::new(loader::DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load tables from CSV files in a specific directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let loaded = LoadedAssumptions::load_from(path)?;
        Ok(loaded.into_assumptions())
    }
}

impl Default for Assumptions {
    fn default() -> Self {
        Self::default_2024_25()
    }
}
