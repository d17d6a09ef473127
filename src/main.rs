//! Student Loan Model CLI
//!
//! Simulates a loan with and without extra repayments and compares the
//! present value of what each strategy costs.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;

use student_loan_model::discount::present_value;
use student_loan_model::projection::{
    ExtraRepayments, InstantRepayment, InterestPolicy, SalaryAssumptions, Scenario, ScenarioSummary,
    SimulationConfig, SimulationOutput, SimulationRecord,
};
use student_loan_model::{Assumptions, PlanId, SimulationEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "student-loan-model",
    version,
    about = "Compare a UK student loan repaid with and without extra repayments"
)]
struct Cli {
    #[arg(long, env = "PLAN", default_value = "Plan 2", help = "Plan 1, Plan 2, Plan 4, Plan 5 or Postgraduate")]
    plan: PlanId,
    #[arg(long, env = "LOAN", default_value_t = 45_000.0, help = "Outstanding balance")]
    loan: f64,
    #[arg(long, env = "INITIAL_SALARY", default_value_t = 30_000.0, help = "Annual salary in the first period")]
    salary: f64,
    #[arg(long, env = "SALARY_GROWTH", default_value_t = 0.08, help = "Annual salary growth as a fraction")]
    salary_growth: f64,
    #[arg(long, env = "SALARY_SACRIFICE", default_value_t = 0.0, help = "Fraction of salary sacrificed before tax")]
    salary_sacrifice: f64,
    #[arg(long, env = "INTEREST_RATE", default_value_t = 0.071, help = "Annual loan interest rate")]
    interest_rate: f64,
    #[arg(long, env = "INFLATION_RATE", default_value_t = 0.04, help = "Annual inflation, used as the discount rate")]
    inflation_rate: f64,
    #[arg(long, env = "INSTANT_REPAYMENT", default_value_t = 0.0, help = "Lump sum paid in the active scenario")]
    instant_repayment: f64,
    #[arg(long, default_value_t = 1, help = "1-based period in which the lump sum is paid")]
    instant_period: u32,
    #[arg(long, env = "EXTRA_REPAYMENTS", default_value_t = 0.0, help = "Extra amount repaid every month")]
    extra_repayment: f64,
    #[arg(long, help = "Simulation start date (YYYY-MM-DD), defaults to today")]
    start_date: Option<NaiveDate>,
    #[arg(long, env = "GRADUATION_YEAR", help = "Graduation year; the loan is written off on the 1 April after the plan's term ends")]
    graduation_year: Option<i32>,
    #[arg(long, help = "Override the plan's write-off horizon")]
    horizon_months: Option<u32>,
    #[arg(long, help = "Directory of policy table CSVs, defaults to the built-in 2024/25 tables")]
    assumptions: Option<PathBuf>,
    #[arg(long, help = "Read the full simulation config from a JSON file instead of flags")]
    config: Option<PathBuf>,
    #[arg(long, help = "Write monthly records to this file")]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
    #[arg(long, help = "Keep periods after both scenarios have closed")]
    full_horizon: bool,
}

impl Cli {
    fn simulation_config(&self) -> Result<SimulationConfig> {
        if let Some(path) = &self.config {
            let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
            return serde_json::from_reader(file).with_context(|| format!("parsing config {}", path.display()));
        }

        let start_date = self.start_date.unwrap_or_else(|| Local::now().date_naive());
        let mut config = SimulationConfig::new(self.plan, self.loan, self.salary, start_date)
            .with_salary(SalaryAssumptions::growing(self.salary, self.salary_growth))
            .with_salary_sacrifice(self.salary_sacrifice)
            .with_interest(InterestPolicy::Constant {
                annual_rate: self.interest_rate,
            })
            .with_inflation_rate(self.inflation_rate);
        if self.extra_repayment > 0.0 {
            config = config.with_extra_repayments(ExtraRepayments::Monthly(self.extra_repayment));
        }
        if self.instant_repayment > 0.0 {
            config = config.with_instant_repayment(InstantRepayment {
                amount: self.instant_repayment,
                period: self.instant_period,
            });
        }
        if let Some(year) = self.graduation_year {
            config = config.with_graduation_year(year);
        }
        if let Some(months) = self.horizon_months {
            config = config.with_horizon_months(months);
        }
        Ok(config)
    }
}

/// Flat CSV row of one period, both scenarios side by side
#[derive(Debug, Serialize)]
struct OutputRow {
    period: u32,
    date: NaiveDate,
    salary: f64,
    gross_income: f64,
    income_tax: f64,
    national_insurance: f64,
    active_interest: f64,
    active_repayment: f64,
    active_net_income: f64,
    active_balance: f64,
    passive_interest: f64,
    passive_repayment: f64,
    passive_net_income: f64,
    passive_balance: f64,
}

impl From<&SimulationRecord> for OutputRow {
    fn from(record: &SimulationRecord) -> Self {
        let (a, p) = (&record.active, &record.passive);
        Self {
            period: record.period,
            date: record.date,
            salary: a.salary,
            gross_income: a.gross_income,
            income_tax: a.income_tax,
            national_insurance: a.national_insurance,
            active_interest: a.interest,
            active_repayment: a.total_repayment(),
            active_net_income: a.net_income,
            active_balance: a.closing_balance,
            passive_interest: p.interest,
            passive_repayment: p.total_repayment(),
            passive_net_income: p.net_income,
            passive_balance: p.closing_balance,
        }
    }
}

fn write_records(output: &SimulationOutput, path: &Path, format: OutputFormat) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(file);
            for record in &output.records {
                writer.serialize(OutputRow::from(record))?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, output)?;
            writer.flush()?;
        }
    }
    Ok(())
}

fn print_summary(out: &mut impl Write, summary: &ScenarioSummary, npv: f64) -> io::Result<()> {
    let label = match summary.scenario {
        Scenario::Active => "Active (with extra repayments)",
        Scenario::Passive => "Passive (statutory only)",
    };
    writeln!(out, "{label}:")?;
    match summary.closed_at {
        Some(months) => writeln!(out, "  {:?} after {} months", summary.status, months)?,
        None => writeln!(out, "  Still accruing, balance £{:.2}", summary.final_balance)?,
    }
    writeln!(out, "  Total repaid:   £{:>12.2}", summary.total_repaid)?;
    writeln!(out, "  Total interest: £{:>12.2}", summary.total_interest)?;
    if summary.forgiven > 0.0 {
        writeln!(out, "  Written off:    £{:>12.2}", summary.forgiven)?;
    }
    writeln!(out, "  NPV repaid:     £{:>12.2}", npv)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.simulation_config()?;

    let assumptions = match &cli.assumptions {
        Some(dir) => Assumptions::from_csv_path(dir)
            .with_context(|| format!("loading assumptions from {}", dir.display()))?,
        None => Assumptions::default_2024_25(),
    };

    info!(
        "Simulating {} loan of {:.2} from {}",
        config.plan, config.initial_balance, config.start_date
    );
    let engine = SimulationEngine::new(assumptions, config);
    let mut output = engine.simulate()?;
    if !cli.full_horizon {
        output = output.trimmed();
    }

    let rate = engine.config().discount_rate();
    let active_npv = present_value(&output.repayment_series(Scenario::Active), rate)?;
    let passive_npv = present_value(&output.repayment_series(Scenario::Passive), rate)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Student Loan Model v{}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "========================\n")?;
    print_summary(&mut out, &output.summary(Scenario::Active), active_npv)?;
    writeln!(out)?;
    print_summary(&mut out, &output.summary(Scenario::Passive), passive_npv)?;
    if let Some(instant) = &output.instant_repayment {
        writeln!(
            out,
            "\nLump sum in period {}: £{:.2} requested, £{:.2} applied",
            instant.period, instant.requested, instant.applied
        )?;
    }
    writeln!(
        out,
        "\nNPV difference (active - passive): £{:.2}",
        active_npv - passive_npv
    )?;

    if let Some(path) = &cli.output {
        write_records(&output, path, cli.format)?;
        info!("Wrote {} records to {}", output.records.len(), path.display());
        writeln!(out, "Monthly records written to: {}", path.display())?;
    }

    Ok(())
}
