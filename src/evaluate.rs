// Holdout scoring of the fitted forest.
use std::fmt;

use linfa::prelude::*;
use tracing::info;

use crate::error::{CalorieError, Result};
use crate::model::RandomForest;
use crate::preprocess::FeatureFrame;

/// Qualitative model quality, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier { Excellent, Good, Average, Poor, VeryBad }

impl Tier {
    /// Total over every R² value; NaN falls through to `VeryBad`.
    pub fn from_r2(r2: f64) -> Tier {
        if r2 >= 0.9 {
            Tier::Excellent
        } else if r2 >= 0.75 {
            Tier::Good
        } else if r2 >= 0.5 {
            Tier::Average
        } else if r2 >= 0.0 {
            Tier::Poor
        } else {
            Tier::VeryBad
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent",
            Tier::Good      => "Good",
            Tier::Average   => "Average",
            Tier::Poor      => "Poor",
            Tier::VeryBad   => "Very Bad",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tier::Excellent => "Very accurate and reliable!",
            Tier::Good      => "Explains a significant portion of the variance.",
            Tier::Average   => "Usable but could be improved.",
            Tier::Poor      => "Explains very little variance.",
            Tier::VeryBad   => "Worse than predicting the mean!",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub r2: f64,
    pub mse: f64,
    pub tier: Tier,
    pub n_test: usize,
}

/// Score `model` on an encoded holdout frame.
pub fn evaluate(model: &RandomForest, test: &FeatureFrame) -> Result<Evaluation> {
    if test.y.is_empty() {
        return Err(CalorieError::InsufficientData("empty holdout set".into()));
    }
    let y_pred = model.predict(&test.x)?;
    let r2 = y_pred.r2(&test.y)?;
    let mse = y_pred.mean_squared_error(&test.y)?;
    let tier = Tier::from_r2(r2);
    info!(r2, mse, tier = %tier, n_test = test.y.len(), "Model evaluated");
    Ok(Evaluation { r2, mse, tier, n_test: test.y.len() })
}
