// Module for loading the two source tables and joining them on the subject id.
// It validates headers and skips malformed rows.
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CalorieError, Result};
use crate::preprocess::{Gender, Record};

pub const EXERCISE_COLUMNS: [&str; 8] = [
    "User_ID", "Gender", "Age", "Height", "Weight", "Duration", "Heart_Rate", "Body_Temp",
];
pub const CALORIE_COLUMNS: [&str; 2] = ["User_ID", "Calories"];

/// One row of exercise.csv.
#[derive(Debug, Deserialize)]
pub struct ExerciseRow {
    #[serde(rename = "User_ID")]    pub user_id: u64,
    #[serde(rename = "Gender")]     pub gender: String,
    #[serde(rename = "Age")]        pub age: u32,
    #[serde(rename = "Height")]     pub height: f64,
    #[serde(rename = "Weight")]     pub weight: f64,
    #[serde(rename = "Duration")]   pub duration: f64,
    #[serde(rename = "Heart_Rate")] pub heart_rate: f64,
    #[serde(rename = "Body_Temp")]  pub body_temp: f64,
}

/// One row of calories.csv.
#[derive(Debug, Deserialize)]
pub struct CalorieRow {
    #[serde(rename = "User_ID")]  pub user_id: u64,
    #[serde(rename = "Calories")] pub calories: f64,
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| CalorieError::DataUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a table with the given required columns. `source` is only used in messages.
pub fn read_table<T, R>(reader: R, source: &Path, required: &[&str]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| CalorieError::DataUnavailable {
            path: source.to_path_buf(),
            source: e.into(),
        })?
        .clone();

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if !missing.is_empty() {
        return Err(CalorieError::SchemaMismatch(format!(
            "{} is missing column(s): {}",
            source.display(),
            missing.join(", ")
        )));
    }
    let expected_len = headers.len();

    let mut out = Vec::new();
    for result in rdr.records() {
        let raw: StringRecord = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Skipping unreadable row");
                continue;
            }
        };
        let line = raw.position().map(|p| p.line()).unwrap_or(0);

        if raw.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if raw.len() != expected_len {
            warn!(
                source = %source.display(),
                line,
                expected = expected_len,
                found = raw.len(),
                "Skipping row with wrong field count"
            );
            continue;
        }
        match raw.deserialize::<T>(Some(&headers)) {
            Ok(rec) => out.push(rec),
            Err(e) => {
                warn!(source = %source.display(), line, error = %e, "Skipping malformed row");
            }
        }
    }
    debug!(source = %source.display(), rows = out.len(), "Table read");
    Ok(out)
}

/// Inner join on `User_ID`, keeping exercise-table order. The id is dropped.
pub fn join(exercise: Vec<ExerciseRow>, calories: Vec<CalorieRow>) -> Vec<Record> {
    let mut by_id: HashMap<u64, f64> = HashMap::with_capacity(calories.len());
    for row in calories {
        if by_id.contains_key(&row.user_id) {
            warn!(user_id = row.user_id, "Duplicate subject in calorie table; keeping first");
            continue;
        }
        by_id.insert(row.user_id, row.calories);
    }

    let mut seen = HashSet::with_capacity(exercise.len());
    let mut unmatched = 0usize;
    let mut joined = Vec::with_capacity(exercise.len());
    for row in exercise {
        if !seen.insert(row.user_id) {
            warn!(user_id = row.user_id, "Duplicate subject in exercise table; keeping first");
            continue;
        }
        let Some(&calories) = by_id.get(&row.user_id) else {
            unmatched += 1;
            continue;
        };
        let gender: Gender = match row.gender.parse() {
            Ok(g) => g,
            Err(e) => {
                warn!(user_id = row.user_id, "Skipping subject: {}", e);
                continue;
            }
        };
        if !(row.height > 0.0 && row.weight > 0.0 && row.height.is_finite() && row.weight.is_finite()) {
            warn!(user_id = row.user_id, height = row.height, weight = row.weight,
                  "Skipping subject with impossible height/weight");
            continue;
        }
        joined.push(Record {
            gender,
            age: row.age,
            height: row.height,
            weight: row.weight,
            duration: row.duration,
            heart_rate: row.heart_rate,
            body_temp: row.body_temp,
            calories,
        });
    }
    if unmatched > 0 {
        debug!(unmatched, "Exercise rows without a calorie outcome dropped by the join");
    }
    joined
}

/// Join already-open sources.
pub fn load_from_readers<A: Read, B: Read>(exercise: A, calories: B) -> Result<Vec<Record>> {
    let ex = read_table::<ExerciseRow, _>(exercise, Path::new("exercise"), &EXERCISE_COLUMNS)?;
    let cal = read_table::<CalorieRow, _>(calories, Path::new("calories"), &CALORIE_COLUMNS)?;
    Ok(join(ex, cal))
}

/// Load both CSV files and join them into the reference population.
pub fn load_dataset(exercise_path: &Path, calories_path: &Path) -> Result<Vec<Record>> {
    let ex = read_table::<ExerciseRow, _>(open(exercise_path)?, exercise_path, &EXERCISE_COLUMNS)?;
    let cal = read_table::<CalorieRow, _>(open(calories_path)?, calories_path, &CALORIE_COLUMNS)?;
    let records = join(ex, cal);
    info!(
        exercise = %exercise_path.display(),
        calories = %calories_path.display(),
        records = records.len(),
        "Dataset loaded"
    );
    Ok(records)
}
