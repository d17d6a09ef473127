//! Sweep instant repayment amounts against starting salaries
//!
//! Outputs one row per grid point with the NPV of both scenarios

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::info;
use serde::Serialize;

use student_loan_model::projection::{InstantRepayment, InterestPolicy, SalaryAssumptions, SimulationConfig};
use student_loan_model::scenario::ScenarioRunner;
use student_loan_model::PlanId;

#[derive(Parser, Debug)]
#[command(name = "sweep", about = "Grid of instant repayment x salary NPV outcomes")]
struct Cli {
    #[arg(long, default_value = "Plan 2")]
    plan: PlanId,
    #[arg(long, default_value_t = 45_000.0)]
    loan: f64,
    #[arg(long, default_value_t = 0.08)]
    salary_growth: f64,
    #[arg(long, default_value_t = 0.071)]
    interest_rate: f64,
    #[arg(long, default_value_t = 0.04)]
    inflation_rate: f64,
    #[arg(long, default_value_t = 20_000.0)]
    min_salary: f64,
    #[arg(long, default_value_t = 80_000.0)]
    max_salary: f64,
    #[arg(long, default_value_t = 5_000.0)]
    salary_step: f64,
    #[arg(long, default_value_t = 50_000.0, help = "Largest lump sum; the grid starts at zero")]
    max_instant: f64,
    #[arg(long, default_value_t = 5_000.0)]
    instant_step: f64,
    #[arg(long, default_value = "2024-09-01")]
    start_date: NaiveDate,
    #[arg(long, help = "Directory of policy table CSVs")]
    assumptions: Option<PathBuf>,
    #[arg(long, default_value = "sweep_output.csv")]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
struct SweepRow {
    salary: f64,
    instant_repayment: f64,
    active_npv: f64,
    passive_npv: f64,
    npv_difference: f64,
    active_months: Option<u32>,
    passive_months: Option<u32>,
}

fn grid(min: f64, max: f64, step: f64) -> Result<Vec<f64>> {
    anyhow::ensure!(step > 0.0 && min <= max, "invalid grid {min}..={max} step {step}");
    let count = ((max - min) / step).floor() as usize + 1;
    Ok((0..count).map(|i| min + step * i as f64).collect())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let start = Instant::now();
    let runner = match &cli.assumptions {
        Some(dir) => ScenarioRunner::from_csv_path(dir)
            .with_context(|| format!("loading assumptions from {}", dir.display()))?,
        None => ScenarioRunner::new(),
    };

    let salaries = grid(cli.min_salary, cli.max_salary, cli.salary_step)?;
    let lump_sums = grid(0.0, cli.max_instant, cli.instant_step)?;

    let configs: Vec<SimulationConfig> = salaries
        .iter()
        .flat_map(|&salary| lump_sums.iter().map(move |&amount| (salary, amount)))
        .map(|(salary, amount)| {
            let config = SimulationConfig::new(cli.plan, cli.loan, salary, cli.start_date)
                .with_salary(SalaryAssumptions::growing(salary, cli.salary_growth))
                .with_interest(InterestPolicy::Constant {
                    annual_rate: cli.interest_rate,
                })
                .with_inflation_rate(cli.inflation_rate);
            if amount > 0.0 {
                config.with_instant_repayment(InstantRepayment::immediate(amount))
            } else {
                config
            }
        })
        .collect();

    info!("Running {} simulations", configs.len());
    let results = runner.sweep(&configs)?;
    info!("Sweep complete in {:?}", start.elapsed());

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    for result in &results {
        let salary = match &result.config.salary {
            SalaryAssumptions::Growth { initial_salary, .. } => *initial_salary,
            SalaryAssumptions::Explicit(series) => series.first().copied().unwrap_or(0.0),
        };
        writer.serialize(SweepRow {
            salary,
            instant_repayment: result.config.instant_repayment.map_or(0.0, |i| i.amount),
            active_npv: result.active_npv,
            passive_npv: result.passive_npv,
            npv_difference: result.npv_difference(),
            active_months: result.active_closed_at,
            passive_months: result.passive_closed_at,
        })?;
    }
    writer.flush()?;

    println!("{} grid points written to {}", results.len(), cli.output.display());
    println!("Total time: {:?}", start.elapsed());
    Ok(())
}
