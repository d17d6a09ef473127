//! Piecewise marginal-rate schedules
//!
//! A [`BandSchedule`] is an ordered list of [`Band`]s covering `[0, ∞)` with no
//! gaps or overlaps. The schedule is validated once when it is built; evaluating
//! it against an income never fails.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A single income band `[lower, upper)` taxed at a marginal rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: f64,
    /// `None` for the unbounded top band
    pub upper: Option<f64>,
    pub rate: f64,
}

impl Band {
    pub fn new(lower: f64, upper: Option<f64>, rate: f64) -> Self {
        Self { lower, upper, rate }
    }

    /// Amount due on the slice of `income` falling inside this band
    pub fn slice_amount(&self, income: f64) -> f64 {
        if income <= self.lower {
            return 0.0;
        }
        let top = match self.upper {
            Some(upper) => income.min(upper),
            None => income,
        };
        self.rate * (top - self.lower)
    }

    fn contains(&self, income: f64) -> bool {
        income >= self.lower && self.upper.map_or(true, |upper| income < upper)
    }
}

/// Validated, ascending band schedule covering `[0, ∞)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Band>", into = "Vec<Band>")]
pub struct BandSchedule {
    bands: Vec<Band>,
}

impl BandSchedule {
    /// Build a schedule, rejecting gaps, overlaps, unsorted bounds and bad rates
    pub fn new(bands: Vec<Band>) -> Result<Self> {
        validate(&bands)?;
        Ok(Self { bands })
    }

    /// Build a covering schedule from ascending `(lower, rate)` pairs.
    ///
    /// Each band ends where the next one starts and the last band is unbounded.
    pub fn from_thresholds(thresholds: &[(f64, f64)]) -> Result<Self> {
        let bands = thresholds
            .iter()
            .enumerate()
            .map(|(i, &(lower, rate))| {
                let upper = thresholds.get(i + 1).map(|&(next, _)| next);
                Band::new(lower, upper, rate)
            })
            .collect();
        Self::new(bands)
    }

    /// Total amount due on `income`: the sum of every band's slice
    pub fn apply(&self, income: f64) -> f64 {
        self.bands
            .iter()
            .take_while(|band| income > band.lower)
            .map(|band| band.slice_amount(income))
            .sum()
    }

    /// Rate of the band containing `income`
    pub fn marginal_rate(&self, income: f64) -> f64 {
        let income = income.max(0.0);
        self.bands
            .iter()
            .find(|band| band.contains(income))
            .map(|band| band.rate)
            .unwrap_or(0.0)
    }

    /// Upper bound of the first band, `None` if the schedule is a single unbounded band
    pub fn first_band_upper(&self) -> Option<f64> {
        self.bands.first().and_then(|band| band.upper)
    }

    /// Copy of the schedule with the first band narrowed to end at `upper`.
    ///
    /// The second band is widened downwards to start at `upper`, so the result
    /// still covers `[0, ∞)`. `upper` is clamped to `[0, first_band_upper]`; at 0
    /// the first band disappears entirely.
    pub fn with_first_band_upper(&self, upper: f64) -> BandSchedule {
        let Some(current) = self.first_band_upper() else {
            return self.clone();
        };
        let upper = upper.clamp(0.0, current);

        let mut bands = Vec::with_capacity(self.bands.len());
        if upper > 0.0 {
            bands.push(Band::new(0.0, Some(upper), self.bands[0].rate));
        }
        let mut rest = self.bands[1..].iter().copied();
        if let Some(mut second) = rest.next() {
            second.lower = upper;
            bands.push(second);
        }
        bands.extend(rest);

        BandSchedule { bands }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }
}

impl TryFrom<Vec<Band>> for BandSchedule {
    type Error = ModelError;

    fn try_from(bands: Vec<Band>) -> Result<Self> {
        Self::new(bands)
    }
}

impl From<BandSchedule> for Vec<Band> {
    fn from(schedule: BandSchedule) -> Self {
        schedule.bands
    }
}

fn validate(bands: &[Band]) -> Result<()> {
    let first = bands
        .first()
        .ok_or_else(|| ModelError::invalid_schedule("schedule has no bands"))?;
    if first.lower != 0.0 {
        return Err(ModelError::invalid_schedule(format!(
            "first band must start at 0, starts at {}",
            first.lower
        )));
    }

    for (i, band) in bands.iter().enumerate() {
        if !band.rate.is_finite() || band.rate < 0.0 {
            return Err(ModelError::invalid_schedule(format!(
                "band {i} has invalid rate {}",
                band.rate
            )));
        }
        if !band.lower.is_finite() {
            return Err(ModelError::invalid_schedule(format!(
                "band {i} has non-finite lower bound"
            )));
        }

        match (band.upper, bands.get(i + 1)) {
            (Some(upper), next) => {
                if !(upper > band.lower) {
                    return Err(ModelError::invalid_schedule(format!(
                        "band {i} upper bound {upper} is not above lower bound {}",
                        band.lower
                    )));
                }
                match next {
                    Some(next) if next.lower < upper => {
                        return Err(ModelError::invalid_schedule(format!(
                            "band {} overlaps band {i} ({} < {upper})",
                            i + 1,
                            next.lower
                        )));
                    }
                    Some(next) if next.lower > upper => {
                        return Err(ModelError::invalid_schedule(format!(
                            "gap between band {i} and band {} ({upper}..{})",
                            i + 1,
                            next.lower
                        )));
                    }
                    Some(_) => {}
                    None => {
                        return Err(ModelError::invalid_schedule(format!(
                            "last band ends at {upper}; schedule must be unbounded above"
                        )));
                    }
                }
            }
            (None, Some(_)) => {
                return Err(ModelError::invalid_schedule(format!(
                    "unbounded band {i} is not the last band"
                )));
            }
            (None, None) => {}
        }
    }

    Ok(())
}
