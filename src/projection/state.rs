//! Loan state tracked through a single scenario run

use serde::{Deserialize, Serialize};

/// Lifecycle of a loan within a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// Balance outstanding and horizon not yet reached
    Accruing,
    /// Balance repaid in full
    PaidOff,
    /// Horizon reached with balance outstanding; the remainder is forgiven
    WrittenOff,
}

impl LoanStatus {
    pub fn is_closed(&self) -> bool {
        !matches!(self, LoanStatus::Accruing)
    }
}

/// Kind of repayment, applied in this order each period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepaymentKind {
    Statutory,
    Extra,
    Instant,
}

/// State of a loan at a point in time during simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanState {
    /// Outstanding balance
    pub balance: f64,

    /// Interest accrued in the current period
    pub interest_this_period: f64,

    /// Interest accrued since the start
    pub cumulative_interest: f64,

    /// Statutory repayments applied since the start
    pub cumulative_statutory: f64,

    /// Regular extra repayments applied since the start
    pub cumulative_extra: f64,

    /// Lump-sum repayments applied since the start
    pub cumulative_instant: f64,

    /// Periods simulated so far
    pub periods_elapsed: u32,

    pub status: LoanStatus,

    /// Period in which the loan closed
    pub closed_at: Option<u32>,

    /// Balance forgiven at write-off
    pub forgiven: f64,
}

impl LoanState {
    /// Initialize state at simulation start
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            interest_this_period: 0.0,
            cumulative_interest: 0.0,
            cumulative_statutory: 0.0,
            cumulative_extra: 0.0,
            cumulative_instant: 0.0,
            periods_elapsed: 0,
            status: LoanStatus::Accruing,
            closed_at: None,
            forgiven: 0.0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Advance to the next period
    pub fn begin_period(&mut self) {
        self.periods_elapsed += 1;
        self.interest_this_period = 0.0;
    }

    /// Accrue interest on the opening balance at a period rate
    pub fn accrue_interest(&mut self, period_rate: f64) -> f64 {
        let interest = self.balance * period_rate;
        self.balance += interest;
        self.interest_this_period = interest;
        self.cumulative_interest += interest;
        interest
    }

    /// Reduce the balance by up to `amount`, returning the amount actually applied.
    ///
    /// Anything above the outstanding balance is not applied.
    pub fn apply_repayment(&mut self, kind: RepaymentKind, amount: f64) -> f64 {
        if self.is_closed() || amount <= 0.0 {
            return 0.0;
        }
        let applied = amount.min(self.balance.max(0.0));
        self.balance -= applied;
        if self.balance <= 0.0 {
            self.balance = 0.0;
        }
        match kind {
            RepaymentKind::Statutory => self.cumulative_statutory += applied,
            RepaymentKind::Extra => self.cumulative_extra += applied,
            RepaymentKind::Instant => self.cumulative_instant += applied,
        }
        applied
    }

    /// Close the loan if it is repaid or the horizon has been reached
    pub fn check_termination(&mut self, horizon: u32) -> LoanStatus {
        if self.is_closed() {
            return self.status;
        }
        if self.balance <= 0.0 {
            self.balance = 0.0;
            self.close(LoanStatus::PaidOff);
        } else if self.periods_elapsed >= horizon {
            self.forgiven = self.balance;
            self.close(LoanStatus::WrittenOff);
        }
        self.status
    }

    /// Total applied across every kind of repayment
    pub fn total_repaid(&self) -> f64 {
        self.cumulative_statutory + self.cumulative_extra + self.cumulative_instant
    }

    fn close(&mut self, status: LoanStatus) {
        self.status = status;
        self.closed_at = Some(self.periods_elapsed);
    }
}
