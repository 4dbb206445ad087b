use std::io::Write;

use calorie_insight::io::load_dataset;
use calorie_insight::{
    CalorieError, ForestParams, Gender, Peers, Pipeline, PipelineConfig, Record, Tier, UserProfile,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

/// Rows loosely shaped like the real exercise data: calories driven by duration,
/// with heart rate and body temperature rising alongside it.
fn synthetic_csvs(n: usize, seed: u64) -> (NamedTempFile, NamedTempFile) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ex = NamedTempFile::new().unwrap();
    let mut cal = NamedTempFile::new().unwrap();
    writeln!(ex, "User_ID,Gender,Age,Height,Weight,Duration,Heart_Rate,Body_Temp").unwrap();
    writeln!(cal, "User_ID,Calories").unwrap();
    for i in 0..n {
        let id = 10_000_000 + i as u64;
        let gender = if rng.random_bool(0.5) { "male" } else { "female" };
        let age: u32 = rng.random_range(20..80);
        let height: f64 = rng.random_range(160..196) as f64;
        let weight: f64 = rng.random_range(55..101) as f64;
        let duration: f64 = rng.random_range(1..31) as f64;
        let heart_rate = (75.0 + 1.5 * duration + rng.random_range(-2.0..2.0_f64)).round();
        let body_temp = ((37.0 + 0.12 * duration + rng.random_range(-0.1..0.1_f64)) * 10.0).round() / 10.0;
        let calories = (6.0 * duration + 0.2 * (heart_rate - 90.0)).round();
        writeln!(ex, "{id},{gender},{age},{height},{weight},{duration},{heart_rate},{body_temp}").unwrap();
        // every tenth subject has no outcome and drops out of the join
        if i % 10 != 9 {
            writeln!(cal, "{id},{calories}").unwrap();
        }
    }
    (ex, cal)
}

fn config(ex: &NamedTempFile, cal: &NamedTempFile) -> PipelineConfig {
    PipelineConfig {
        exercise_path: ex.path().to_path_buf(),
        calories_path: cal.path().to_path_buf(),
        forest: ForestParams { n_trees: 100, seed: Some(11), ..ForestParams::default() },
        peer_seed: Some(5),
        ..PipelineConfig::default()
    }
}

fn profile_of(r: &Record) -> UserProfile {
    UserProfile {
        age: r.age,
        gender: r.gender,
        bmi: r.bmi(),
        duration: r.duration,
        heart_rate: r.heart_rate,
        body_temp: r.body_temp,
    }
}

#[test]
fn fitted_pipeline_reproduces_training_rows() {
    let (ex, cal) = synthetic_csvs(600, 21);
    let pipeline = Pipeline::from_config(config(&ex, &cal)).unwrap();

    assert_eq!(pipeline.population().len(), 540);
    let part = pipeline.partition();
    assert_eq!(part.test.len(), 108);
    assert_eq!(part.train.len() + part.test.len(), 540);
    assert_eq!(
        pipeline.schema().names(),
        vec!["Age", "BMI", "Duration", "Heart_Rate", "Body_Temp", "Gender_male"]
    );

    for r in part.train.iter().take(10) {
        let predicted = pipeline.predict(&profile_of(r)).unwrap();
        assert!(
            (predicted - r.calories).abs() < 15.0,
            "predicted {predicted:.2} for a row that burned {}",
            r.calories
        );
    }
}

#[test]
fn report_covers_every_output() {
    let (ex, cal) = synthetic_csvs(400, 3);
    let pipeline = Pipeline::from_config(config(&ex, &cal)).unwrap();

    let profile = UserProfile { gender: Gender::Female, duration: 20.0, heart_rate: 105.0, body_temp: 39.5,
                                ..UserProfile::default() };
    let report = pipeline.report(&profile).unwrap();

    assert!(report.prediction > 0.0);
    match &report.peers {
        Peers::Found(peers) => {
            assert!(!peers.is_empty() && peers.len() <= 5);
            assert!(peers.iter().all(|p| (p.calories - report.prediction).abs() <= 10.0));
        }
        Peers::NoSimilarResults => panic!("a mid-range prediction should have peers"),
    }
    assert_eq!(report.percentiles.len(), 4);
    assert!(report.percentiles.values().all(|p| (0.0..=100.0).contains(p)));
    assert!(report.evaluation.r2 > 0.75, "r2 = {}", report.evaluation.r2);
    assert!(matches!(report.evaluation.tier, Tier::Excellent | Tier::Good));
    assert_eq!(report.evaluation.n_test, 72);
}

#[test]
fn same_seeds_same_answers() {
    let (ex, cal) = synthetic_csvs(200, 8);
    let a = Pipeline::from_config(config(&ex, &cal)).unwrap();
    let b = Pipeline::from_config(config(&ex, &cal)).unwrap();
    let profile = UserProfile::default();
    assert_eq!(a.predict(&profile).unwrap(), b.predict(&profile).unwrap());
    assert_eq!(a.evaluate().unwrap(), b.evaluate().unwrap());
    let pa = a.peers(a.predict(&profile).unwrap()).unwrap();
    let pb = b.peers(b.predict(&profile).unwrap()).unwrap();
    assert_eq!(pa, pb);
}

#[test]
fn far_prediction_has_no_peers() {
    let (ex, cal) = synthetic_csvs(100, 1);
    let pipeline = Pipeline::from_config(config(&ex, &cal)).unwrap();
    assert_eq!(pipeline.peers(5_000.0).unwrap(), Peers::NoSimilarResults);
}

#[test]
fn out_of_range_profile_is_rejected() {
    let (ex, cal) = synthetic_csvs(100, 1);
    let pipeline = Pipeline::from_config(config(&ex, &cal)).unwrap();
    let bad = UserProfile { age: 5, ..UserProfile::default() };
    assert!(matches!(pipeline.predict(&bad), Err(CalorieError::InvalidInput(_))));
}

#[test]
fn missing_source_aborts_the_run() {
    let (ex, _cal) = synthetic_csvs(10, 1);
    let mut cfg = PipelineConfig { exercise_path: ex.path().to_path_buf(), ..PipelineConfig::default() };
    cfg.calories_path = "no/such/calories.csv".into();
    assert!(matches!(Pipeline::from_config(cfg), Err(CalorieError::DataUnavailable { .. })));
    assert!(load_dataset(ex.path(), "no/such/calories.csv".as_ref()).is_err());
}

#[test]
fn tiny_population_cannot_be_split() {
    let one = vec![Record {
        gender: Gender::Male, age: 30, height: 180.0, weight: 80.0,
        duration: 10.0, heart_rate: 90.0, body_temp: 39.0, calories: 60.0,
    }];
    assert!(matches!(
        Pipeline::fit(PipelineConfig::default(), one),
        Err(CalorieError::InsufficientData(_))
    ));
}
