//! Present value of cash-flow series
//!
//! Element `i` of a series is discounted by `(1 + rate)^-i`. The rate is a
//! per-period rate: callers discounting a monthly series pass `annual / 12`
//! (see [`monthly_rate`]), callers discounting [`annual_totals`] pass the
//! annual rate. Nothing here converts between periods.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::error::{ModelError, Result};

/// Per-element discounted values
pub fn discounted(series: &[f64], discount_rate: f64) -> Result<Vec<f64>> {
    check_rate(discount_rate)?;
    let v = 1.0 / (1.0 + discount_rate);
    Ok(series
        .iter()
        .enumerate()
        .map(|(t, &value)| value * v.powi(t as i32))
        .collect())
}

/// Running cumulative sum of discounted values.
///
/// The last element is the present value of the whole series.
pub fn net_present_value(series: &[f64], discount_rate: f64) -> Result<Vec<f64>> {
    let mut total = 0.0;
    Ok(discounted(series, discount_rate)?
        .into_iter()
        .map(|value| {
            total += value;
            total
        })
        .collect())
}

/// Present value of the whole series as a single figure
pub fn present_value(series: &[f64], discount_rate: f64) -> Result<f64> {
    Ok(discounted(series, discount_rate)?.iter().sum())
}

/// Monthly period rate matching an annual rate
pub fn monthly_rate(annual_rate: f64) -> f64 {
    annual_rate / 12.0
}

/// Sum a dated series into calendar-year totals, ordered by year
pub fn annual_totals(dates: &[NaiveDate], values: &[f64]) -> Result<Vec<(i32, f64)>> {
    if dates.len() != values.len() {
        return Err(ModelError::invalid_input(
            "values",
            format!("{} values for {} dates", values.len(), dates.len()),
        ));
    }

    let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
    for (date, &value) in dates.iter().zip(values) {
        *totals.entry(date.year()).or_insert(0.0) += value;
    }
    Ok(totals.into_iter().collect())
}

fn check_rate(discount_rate: f64) -> Result<()> {
    if !discount_rate.is_finite() || discount_rate < 0.0 {
        return Err(ModelError::invalid_input(
            "discount_rate",
            format!("must be finite and non-negative, got {discount_rate}"),
        ));
    }
    Ok(())
}
