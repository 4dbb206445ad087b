//! Calorie-burn estimation from a workout profile, with peer comparison and
//! holdout evaluation of the fitted random forest.

pub mod config;
pub mod error;
pub mod evaluate;
pub mod insight;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod preprocess;
pub mod split;

pub use config::PipelineConfig;
pub use error::{CalorieError, Result};
pub use evaluate::{Evaluation, Tier};
pub use insight::{Metric, Peers};
pub use model::{ForestParams, RandomForest};
pub use pipeline::{Pipeline, Report};
pub use preprocess::{Encoding, FeatureSchema, Field, Gender, QueryVector, Record, UserProfile};
