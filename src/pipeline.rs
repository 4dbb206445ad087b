// The sequential pipeline: load -> split -> engineer -> fit, then the four
// entry points the presentation layer calls.
use std::collections::BTreeMap;

use linfa::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::evaluate::{evaluate, Evaluation};
use crate::insight::{peers, percentile_ranks, Metric, Peers};
use crate::io::load_dataset;
use crate::model::RandomForest;
use crate::predict::Predictor;
use crate::preprocess::{FeatureFrame, FeatureSchema, Record, UserProfile};
use crate::split::{train_test_split, Partition};

/// One fitted invocation. Owns its data and model; build a new one per request.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    population: Vec<Record>,
    partition: Partition,
    schema: FeatureSchema,
    model: RandomForest,
    holdout: FeatureFrame,
}

/// Everything the presentation layer shows for one user.
#[derive(Debug, Clone)]
pub struct Report {
    pub profile: UserProfile,
    pub prediction: f64,
    pub peers: Peers,
    pub percentiles: BTreeMap<Metric, f64>,
    pub evaluation: Evaluation,
}

impl Pipeline {
    /// Load both CSV sources named in `config` and fit.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let population = load_dataset(&config.exercise_path, &config.calories_path)?;
        Self::fit(config, population)
    }

    /// Fit on an already-joined population.
    pub fn fit(config: PipelineConfig, population: Vec<Record>) -> Result<Self> {
        let partition = train_test_split(&population, config.test_fraction, config.split_seed)?;
        let schema = FeatureSchema::from_records(&partition.train)?;
        let train = schema.encode(&partition.train);
        let holdout = schema.encode(&partition.test);
        info!(
            train = partition.train.len(),
            test = partition.test.len(),
            columns = ?schema.names(),
            "Features engineered"
        );

        let mut model = RandomForest::new(config.forest.clone());
        model.fit(&Dataset::new(train.x, train.y))?;
        Ok(Pipeline { config, population, partition, schema, model, holdout })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn population(&self) -> &[Record] {
        &self.population
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model(&self) -> &RandomForest {
        &self.model
    }

    pub fn predict(&self, profile: &UserProfile) -> Result<f64> {
        Predictor::new(&self.schema, &self.model).predict(profile)
    }

    pub fn percentile_ranks(&self, profile: &UserProfile) -> Result<BTreeMap<Metric, f64>> {
        percentile_ranks(&self.population, profile)
    }

    pub fn peers(&self, predicted: f64) -> Result<Peers> {
        let mut rng = match self.config.peer_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        peers(
            &self.population,
            predicted,
            self.config.peer_tolerance,
            self.config.peer_sample_size,
            &mut rng,
        )
    }

    pub fn evaluate(&self) -> Result<Evaluation> {
        evaluate(&self.model, &self.holdout)
    }

    /// All four results for `profile`; the first failure aborts the rest.
    pub fn report(&self, profile: &UserProfile) -> Result<Report> {
        let prediction = self.predict(profile)?;
        let peers = self.peers(prediction)?;
        let percentiles = self.percentile_ranks(profile)?;
        let evaluation = self.evaluate()?;
        Ok(Report { profile: profile.clone(), prediction, peers, percentiles, evaluation })
    }
}
