// Single-query inference: align the user's named values to the trained schema,
// then ask the forest for one estimate.
use ndarray::Array2;
use tracing::debug;

use crate::error::{CalorieError, Result};
use crate::model::RandomForest;
use crate::preprocess::{FeatureSchema, QueryVector, UserProfile};

/// One-row design matrix in exactly the schema's column order.
pub fn align_query(schema: &FeatureSchema, query: &QueryVector) -> Result<Array2<f64>> {
    let aligned = schema.align(query);
    if !aligned.filled.is_empty() || !aligned.dropped.is_empty() {
        debug!(filled = ?aligned.filled, dropped = ?aligned.dropped, "Query aligned to schema");
    }
    Array2::from_shape_vec((1, schema.len()), aligned.values)
        .map_err(|e| CalorieError::SchemaMismatch(e.to_string()))
}

pub struct Predictor<'a> {
    schema: &'a FeatureSchema,
    model: &'a RandomForest,
}

impl<'a> Predictor<'a> {
    pub fn new(schema: &'a FeatureSchema, model: &'a RandomForest) -> Self {
        Predictor { schema, model }
    }

    pub fn predict_query(&self, query: &QueryVector) -> Result<f64> {
        let x = align_query(self.schema, query)?;
        let preds = self.model.predict(&x)?;
        preds
            .get(0)
            .copied()
            .ok_or_else(|| CalorieError::InsufficientData("model returned no prediction".into()))
    }

    /// Validate the profile, encode it with the schema's column encodings, then
    /// predict from it. BMI is used as given.
    pub fn predict(&self, profile: &UserProfile) -> Result<f64> {
        profile.validate()?;
        self.predict_query(&self.schema.to_query(&profile.features()))
    }
}
