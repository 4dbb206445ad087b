// Pipeline configuration and the user-input defaults/ranges.
use std::ops::RangeInclusive;
use std::path::PathBuf;

use crate::model::ForestParams;

pub const DEFAULT_EXERCISE_PATH: &str = "exercise.csv";
pub const DEFAULT_CALORIES_PATH: &str = "calories.csv";

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SPLIT_SEED: u64 = 1;

pub const DEFAULT_N_TREES: usize = 1000;
pub const DEFAULT_MAX_FEATURES: usize = 3;
pub const DEFAULT_MAX_DEPTH: usize = 6;
pub const DEFAULT_MIN_SAMPLES_SPLIT: usize = 2;
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 1;

/// Peers are records whose calories lie within this distance of the prediction.
pub const DEFAULT_PEER_TOLERANCE: f64 = 10.0;
pub const DEFAULT_PEER_SAMPLE_SIZE: usize = 5;

pub const DEFAULT_AGE: u32 = 25;
pub const DEFAULT_BMI: f64 = 25.0;
pub const DEFAULT_DURATION: f64 = 15.0;
pub const DEFAULT_HEART_RATE: f64 = 80.0;
pub const DEFAULT_BODY_TEMP: f64 = 41.0;

pub const AGE_RANGE: RangeInclusive<u32> = 10..=100;
pub const BMI_RANGE: RangeInclusive<f64> = 10.0..=50.0;
pub const DURATION_RANGE: RangeInclusive<f64> = 0.0..=30.0;
pub const HEART_RATE_RANGE: RangeInclusive<f64> = 60.0..=130.0;
pub const BODY_TEMP_RANGE: RangeInclusive<f64> = 36.0..=42.0;

/// Everything one pipeline invocation needs besides the user's own inputs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub exercise_path: PathBuf,
    pub calories_path: PathBuf,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub forest: ForestParams,
    pub peer_tolerance: f64,
    pub peer_sample_size: usize,
    /// `None` draws peers from OS entropy.
    pub peer_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exercise_path: PathBuf::from(DEFAULT_EXERCISE_PATH),
            calories_path: PathBuf::from(DEFAULT_CALORIES_PATH),
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
            forest: ForestParams::default(),
            peer_tolerance: DEFAULT_PEER_TOLERANCE,
            peer_sample_size: DEFAULT_PEER_SAMPLE_SIZE,
            peer_seed: None,
        }
    }
}
