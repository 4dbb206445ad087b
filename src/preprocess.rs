// Feature engineering: BMI derivation, gender encoding and the feature schema
// that training rows and the live user query are both aligned to.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};

use crate::config::{AGE_RANGE, BMI_RANGE, BODY_TEMP_RANGE, DURATION_RANGE, HEART_RATE_RANGE};
use crate::error::{CalorieError, Result};

/// Bumped whenever the column set or the encoding rules change.
pub const SCHEMA_VERSION: u32 = 1;

pub const AGE: &str = "Age";
pub const BMI: &str = "BMI";
pub const DURATION: &str = "Duration";
pub const HEART_RATE: &str = "Heart_Rate";
pub const BODY_TEMP: &str = "Body_Temp";
pub const GENDER_PREFIX: &str = "Gender_";

/// Gender category. Variant order is the sorted level order used for drop-first encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gender { Female, Male }

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }
}

impl FromStr for Gender {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" => Ok(Gender::Female),
            "male"   => Ok(Gender::Male),
            _ => Err(format!("Unknown gender: {}", s)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One joined exercise session; the subject id is gone after the join.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub gender: Gender,
    pub age: u32,
    pub height: f64,
    pub weight: f64,
    pub duration: f64,
    pub heart_rate: f64,
    pub body_temp: f64,
    pub calories: f64,
}

impl Record {
    pub fn bmi(&self) -> f64 {
        bmi(self.weight, self.height)
    }

    /// Model-facing view of this record.
    pub fn features(&self) -> FeatureRow {
        FeatureRow {
            gender: self.gender,
            age: self.age as f64,
            bmi: self.bmi(),
            duration: self.duration,
            heart_rate: self.heart_rate,
            body_temp: self.body_temp,
        }
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `weight_kg / height_m^2`, rounded to 2 decimals. Height is in centimetres.
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    round2(weight_kg / (height_m * height_m))
}

/// The derived feature set, before encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub gender: Gender,
    pub age: f64,
    pub bmi: f64,
    pub duration: f64,
    pub heart_rate: f64,
    pub body_temp: f64,
}

fn indicator_name(level: Gender) -> String {
    format!("{}{}", GENDER_PREFIX, level.label())
}

/// What the user types in. BMI is given directly, not derived from height/weight.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub age: u32,
    pub gender: Gender,
    pub bmi: f64,
    pub duration: f64,
    pub heart_rate: f64,
    pub body_temp: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        use crate::config::*;
        Self {
            age: DEFAULT_AGE,
            gender: Gender::Male,
            bmi: DEFAULT_BMI,
            duration: DEFAULT_DURATION,
            heart_rate: DEFAULT_HEART_RATE,
            body_temp: DEFAULT_BODY_TEMP,
        }
    }
}

impl UserProfile {
    /// Rejects values the input form could never have produced.
    pub fn validate(&self) -> Result<()> {
        if !AGE_RANGE.contains(&self.age) {
            return Err(CalorieError::InvalidInput(format!(
                "age {} outside {:?}", self.age, AGE_RANGE
            )));
        }
        let checks = [
            ("bmi", self.bmi, BMI_RANGE),
            ("duration", self.duration, DURATION_RANGE),
            ("heart_rate", self.heart_rate, HEART_RATE_RANGE),
            ("body_temp", self.body_temp, BODY_TEMP_RANGE),
        ];
        for (name, value, range) in checks {
            if !value.is_finite() || !range.contains(&value) {
                return Err(CalorieError::InvalidInput(format!(
                    "{} {} outside {:?}", name, value, range
                )));
            }
        }
        Ok(())
    }

    pub fn features(&self) -> FeatureRow {
        FeatureRow {
            gender: self.gender,
            age: self.age as f64,
            bmi: self.bmi,
            duration: self.duration,
            heart_rate: self.heart_rate,
            body_temp: self.body_temp,
        }
    }
}

/// Named feature values for a single row, in no particular order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryVector {
    values: BTreeMap<String, f64>,
}

impl QueryVector {
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Numeric field of a [`FeatureRow`] that a schema column copies as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field { Age, Bmi, Duration, HeartRate, BodyTemp }

impl Field {
    pub const ALL: [Field; 5] = [Field::Age, Field::Bmi, Field::Duration, Field::HeartRate, Field::BodyTemp];

    pub fn name(self) -> &'static str {
        match self {
            Field::Age       => AGE,
            Field::Bmi       => BMI,
            Field::Duration  => DURATION,
            Field::HeartRate => HEART_RATE,
            Field::BodyTemp  => BODY_TEMP,
        }
    }

    pub fn of(self, row: &FeatureRow) -> f64 {
        match self {
            Field::Age       => row.age,
            Field::Bmi       => row.bmi,
            Field::Duration  => row.duration,
            Field::HeartRate => row.heart_rate,
            Field::BodyTemp  => row.body_temp,
        }
    }
}

/// How a schema column gets its value out of a [`FeatureRow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding {
    Numeric(Field),
    /// 1 when the row's gender is this level, else 0.
    Indicator(Gender),
}

impl Encoding {
    pub fn value(self, row: &FeatureRow) -> f64 {
        match self {
            Encoding::Numeric(field) => field.of(row),
            Encoding::Indicator(level) => if row.gender == level { 1.0 } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub encoding: Encoding,
}

/// Result of reindexing a query onto the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// One value per schema column, in schema order.
    pub values: Vec<f64>,
    /// Schema columns the query lacked, filled with 0.
    pub filled: Vec<String>,
    /// Query columns the schema does not know, ignored.
    pub dropped: Vec<String>,
}

/// Ordered model columns. Built once from the training partition; every other
/// stage aligns to it instead of deriving columns on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    pub version: u32,
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    /// Numeric columns first, then one indicator per observed gender level with
    /// the first level (in sorted order) dropped as the reference.
    pub fn from_records(train: &[Record]) -> Result<Self> {
        if train.is_empty() {
            return Err(CalorieError::InsufficientData(
                "cannot derive a feature schema from zero records".into(),
            ));
        }
        let mut columns: Vec<FeatureColumn> = Field::ALL
            .iter()
            .map(|&field| FeatureColumn { name: field.name().to_string(), encoding: Encoding::Numeric(field) })
            .collect();

        let levels: BTreeSet<Gender> = train.iter().map(|r| r.gender).collect();
        for level in levels.into_iter().skip(1) {
            columns.push(FeatureColumn {
                name: indicator_name(level),
                encoding: Encoding::Indicator(level),
            });
        }
        Ok(FeatureSchema { version: SCHEMA_VERSION, columns })
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Reindex `query` to exactly this schema's columns: missing columns become 0,
    /// unknown ones are dropped.
    pub fn align(&self, query: &QueryVector) -> Alignment {
        let mut filled = Vec::new();
        let values = self
            .columns
            .iter()
            .map(|col| match query.get(&col.name) {
                Some(v) => v,
                None => {
                    filled.push(col.name.clone());
                    0.0
                }
            })
            .collect();
        let dropped = query
            .names()
            .filter(|n| !self.columns.iter().any(|c| c.name == *n))
            .map(str::to_string)
            .collect();
        Alignment { values, filled, dropped }
    }

    /// One value per column, in schema order, read through each column's [`Encoding`].
    pub fn encode_row(&self, row: &FeatureRow) -> Vec<f64> {
        self.columns.iter().map(|col| col.encoding.value(row)).collect()
    }

    /// `row` as named values under this schema's column names. Aligning the
    /// result back onto the schema fills and drops nothing.
    pub fn to_query(&self, row: &FeatureRow) -> QueryVector {
        let mut q = QueryVector::default();
        for (col, value) in self.columns.iter().zip(self.encode_row(row)) {
            q.insert(col.name.as_str(), value);
        }
        q
    }

    /// Encode records into a design matrix and target vector.
    pub fn encode(&self, records: &[Record]) -> FeatureFrame {
        let n = records.len();
        let p = self.columns.len();
        let mut x = Array2::<f64>::zeros((n, p));
        let mut y = Array1::<f64>::zeros(n);
        for (i, r) in records.iter().enumerate() {
            for (j, v) in self.encode_row(&r.features()).into_iter().enumerate() {
                x[(i, j)] = v;
            }
            y[i] = r.calories;
        }
        FeatureFrame { x, y }
    }
}

/// Encoded features plus the calorie target.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

/// Column-oriented copy of a record set, keyed by column name.
pub fn columns(records: &[Record]) -> BTreeMap<&'static str, Vec<f64>> {
    let mut out: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
    for r in records {
        let f = r.features();
        out.entry(AGE).or_default().push(f.age);
        out.entry(BMI).or_default().push(f.bmi);
        out.entry(DURATION).or_default().push(f.duration);
        out.entry(HEART_RATE).or_default().push(f.heart_rate);
        out.entry(BODY_TEMP).or_default().push(f.body_temp);
        out.entry("Calories").or_default().push(r.calories);
    }
    out
}

#[cfg(test)]
pub(crate) fn record(gender: Gender, age: u32, height: f64, weight: f64, duration: f64,
                     heart_rate: f64, body_temp: f64, calories: f64) -> Record {
    Record { gender, age, height, weight, duration, heart_rate, body_temp, calories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Vec<Record> {
        vec![
            record(Gender::Male, 68, 190.0, 94.0, 29.0, 105.0, 40.8, 231.0),
            record(Gender::Female, 20, 166.0, 60.0, 14.0, 94.0, 40.3, 66.0),
            record(Gender::Male, 69, 179.0, 79.0, 5.0, 88.0, 38.7, 26.0),
        ]
    }

    #[test]
    fn bmi_is_rounded_and_idempotent() {
        assert_abs_diff_eq!(bmi(94.0, 190.0), 26.04, epsilon = 1e-12);
        assert_abs_diff_eq!(bmi(60.0, 166.0), 21.77, epsilon = 1e-12);
        for r in sample() {
            let once = r.bmi();
            assert_eq!(once, r.bmi());
            assert_eq!(round2(once), once);
        }
    }

    #[test]
    fn gender_parses_case_insensitively() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" female ".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn schema_drops_first_gender_level() {
        let schema = FeatureSchema::from_records(&sample()).unwrap();
        assert_eq!(schema.version, SCHEMA_VERSION);
        assert_eq!(
            schema.names(),
            vec!["Age", "BMI", "Duration", "Heart_Rate", "Body_Temp", "Gender_male"]
        );
    }

    #[test]
    fn single_level_training_set_has_no_indicator() {
        let males: Vec<Record> = sample().into_iter().filter(|r| r.gender == Gender::Male).collect();
        let schema = FeatureSchema::from_records(&males).unwrap();
        assert_eq!(schema.len(), 5);
        assert!(schema.names().iter().all(|n| !n.starts_with(GENDER_PREFIX)));
    }

    #[test]
    fn empty_training_set_has_no_schema() {
        assert!(matches!(
            FeatureSchema::from_records(&[]),
            Err(CalorieError::InsufficientData(_))
        ));
    }

    #[test]
    fn align_fills_missing_and_drops_extra() {
        let schema = FeatureSchema::from_records(&sample()).unwrap();
        // a female query that names its own level, as a raw form would
        let mut q = QueryVector::default();
        for field in Field::ALL {
            q.insert(field.name(), field.of(&UserProfile::default().features()));
        }
        q.insert("Gender_female", 1.0);
        let aligned = schema.align(&q);

        assert_eq!(aligned.values.len(), schema.len());
        assert_eq!(aligned.values, vec![25.0, 25.0, 15.0, 80.0, 41.0, 0.0]);
        assert_eq!(aligned.filled, vec!["Gender_male".to_string()]);
        assert_eq!(aligned.dropped, vec!["Gender_female".to_string()]);

        let male = schema.to_query(&UserProfile::default().features());
        let aligned = schema.align(&male);
        assert_eq!(aligned.values[5], 1.0);
        assert!(aligned.filled.is_empty());
        assert!(aligned.dropped.is_empty());
    }

    #[test]
    fn columns_read_their_own_encoding() {
        let schema = FeatureSchema::from_records(&sample()).unwrap();
        assert_eq!(schema.columns()[2].encoding, Encoding::Numeric(Field::Duration));
        assert_eq!(schema.columns()[5].encoding, Encoding::Indicator(Gender::Male));

        for gender in [Gender::Female, Gender::Male] {
            let row = UserProfile { gender, ..UserProfile::default() }.features();
            let encoded = schema.encode_row(&row);
            assert_eq!(encoded[5], if gender == Gender::Male { 1.0 } else { 0.0 });
            assert_eq!(schema.align(&schema.to_query(&row)).values, encoded);
        }
    }

    #[test]
    fn indicator_value_does_not_depend_on_column_name() {
        // renaming the column must not change what it encodes
        let schema = FeatureSchema {
            version: SCHEMA_VERSION,
            columns: vec![
                FeatureColumn { name: "minutes".into(), encoding: Encoding::Numeric(Field::Duration) },
                FeatureColumn { name: "is_m".into(), encoding: Encoding::Indicator(Gender::Male) },
            ],
        };
        let row = UserProfile { duration: 12.0, ..UserProfile::default() }.features();
        assert_eq!(schema.encode_row(&row), vec![12.0, 1.0]);
    }

    #[test]
    fn align_follows_schema_order_for_any_query() {
        let schema = FeatureSchema::from_records(&sample()).unwrap();
        let mut q = QueryVector::default();
        q.insert("Body_Temp", 39.0);
        q.insert("Unrelated", 7.0);
        q.insert("Age", 30.0);
        let aligned = schema.align(&q);
        assert_eq!(aligned.values, vec![30.0, 0.0, 0.0, 0.0, 39.0, 0.0]);
        assert_eq!(aligned.filled, vec!["BMI", "Duration", "Heart_Rate", "Gender_male"]);
        assert_eq!(aligned.dropped, vec!["Unrelated".to_string()]);
    }

    #[test]
    fn encode_matches_row_alignment() {
        let records = sample();
        let schema = FeatureSchema::from_records(&records).unwrap();
        let frame = schema.encode(&records);
        assert_eq!(frame.x.dim(), (3, 6));
        assert_eq!(frame.y.to_vec(), vec![231.0, 66.0, 26.0]);
        // first row: male, BMI derived from height/weight
        assert_eq!(frame.x.row(0).to_vec(), vec![68.0, 26.04, 29.0, 105.0, 40.8, 1.0]);
        assert_eq!(frame.x[(1, 5)], 0.0);
    }

    #[test]
    fn profile_validation_rejects_out_of_range() {
        assert!(UserProfile::default().validate().is_ok());
        let old = UserProfile { age: 120, ..UserProfile::default() };
        assert!(matches!(old.validate(), Err(CalorieError::InvalidInput(_))));
        let hot = UserProfile { body_temp: 45.0, ..UserProfile::default() };
        assert!(matches!(hot.validate(), Err(CalorieError::InvalidInput(_))));
        let nan = UserProfile { bmi: f64::NAN, ..UserProfile::default() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn columns_are_parallel() {
        let cols = columns(&sample());
        assert_eq!(cols["Age"], vec![68.0, 20.0, 69.0]);
        assert_eq!(cols["Calories"].len(), 3);
        assert_eq!(cols["BMI"][0], 26.04);
    }
}
