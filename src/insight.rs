// Peer-comparison statistics against the joined reference population.
use std::collections::BTreeMap;
use std::fmt;

use rand::seq::index;
use rand::Rng;
use tracing::debug;

use crate::error::{CalorieError, Result};
use crate::preprocess::{columns, round2, Record, UserProfile, AGE, BODY_TEMP, DURATION, HEART_RATE};

/// Inputs the user is ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric { Age, Duration, HeartRate, BodyTemp }

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Age, Metric::Duration, Metric::HeartRate, Metric::BodyTemp];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Age       => "age",
            Metric::Duration  => "duration",
            Metric::HeartRate => "heart_rate",
            Metric::BodyTemp  => "body_temp",
        }
    }

    /// Phrase for "your X is higher than N% of other people".
    pub fn comparison(self) -> &'static str {
        match self {
            Metric::Age       => "You are older than",
            Metric::Duration  => "Your exercise duration is higher than",
            Metric::HeartRate => "Your heart rate is higher than",
            Metric::BodyTemp  => "Your body temperature is higher than",
        }
    }

    /// Column this metric reads in the population table.
    pub fn column(self) -> &'static str {
        match self {
            Metric::Age       => AGE,
            Metric::Duration  => DURATION,
            Metric::HeartRate => HEART_RATE,
            Metric::BodyTemp  => BODY_TEMP,
        }
    }

    fn of_profile(self, p: &UserProfile) -> f64 {
        match self {
            Metric::Age       => p.age as f64,
            Metric::Duration  => p.duration,
            Metric::HeartRate => p.heart_rate,
            Metric::BodyTemp  => p.body_temp,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Fraction of `population` strictly below `value`.
pub fn percentile_rank(value: f64, population: &[f64]) -> Result<f64> {
    if population.is_empty() {
        return Err(CalorieError::InsufficientData(
            "percentile rank of an empty population".into(),
        ));
    }
    let below = population.iter().filter(|&&x| x < value).count();
    Ok(below as f64 / population.len() as f64)
}

/// Percentage of the population below the user on every [`Metric`]. The fraction
/// is rounded to 2 decimals before scaling to a percentage.
pub fn percentile_ranks(population: &[Record], profile: &UserProfile) -> Result<BTreeMap<Metric, f64>> {
    let table = columns(population);
    let mut out = BTreeMap::new();
    for metric in Metric::ALL {
        let column = table.get(metric.column()).map(Vec::as_slice).unwrap_or(&[]);
        let fraction = percentile_rank(metric.of_profile(profile), column)?;
        out.insert(metric, (round2(fraction) * 100.0).round());
    }
    Ok(out)
}

/// Outcome of a peer lookup. Finding nobody is a normal answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Peers {
    Found(Vec<Record>),
    NoSimilarResults,
}

impl Peers {
    pub fn records(&self) -> &[Record] {
        match self {
            Peers::Found(r) => r,
            Peers::NoSimilarResults => &[],
        }
    }
}

/// Up to `sample_size` records, drawn uniformly without replacement, whose
/// calories lie within `tolerance` of `predicted`.
pub fn peers<R: Rng + ?Sized>(
    population: &[Record],
    predicted: f64,
    tolerance: f64,
    sample_size: usize,
    rng: &mut R,
) -> Result<Peers> {
    if population.is_empty() {
        return Err(CalorieError::InsufficientData("peer lookup on an empty population".into()));
    }
    let (lo, hi) = (predicted - tolerance, predicted + tolerance);
    let matching: Vec<&Record> = population
        .iter()
        .filter(|r| r.calories >= lo && r.calories <= hi)
        .collect();
    debug!(predicted, matching = matching.len(), "Peer lookup");
    if matching.is_empty() {
        return Ok(Peers::NoSimilarResults);
    }
    let amount = sample_size.min(matching.len());
    let picked = index::sample(rng, matching.len(), amount)
        .into_iter()
        .map(|i| matching[i].clone())
        .collect();
    Ok(Peers::Found(picked))
}
