//! Put the pipeline together: parse the user's inputs, fit, and print the report.
use std::error::Error;
use std::path::{Path, PathBuf};

use calorie_insight::config::*;
use calorie_insight::{ForestParams, Gender, Peers, Pipeline, PipelineConfig, Record, Report, UserProfile};
use clap::Parser;
use plotters::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "calorie_insight", about = "Estimate calories burned during a workout")]
struct Args {
    /// Exercise attributes table
    #[arg(long, default_value = DEFAULT_EXERCISE_PATH)]
    exercise: PathBuf,
    /// Calorie outcomes table
    #[arg(long, default_value = DEFAULT_CALORIES_PATH)]
    calories: PathBuf,

    #[arg(long, default_value_t = DEFAULT_AGE)]
    age: u32,
    /// male or female
    #[arg(long, default_value = "male")]
    gender: Gender,
    #[arg(long, default_value_t = DEFAULT_BMI)]
    bmi: f64,
    /// Workout duration in minutes
    #[arg(long, default_value_t = DEFAULT_DURATION)]
    duration: f64,
    /// Heart rate during the workout (BPM)
    #[arg(long, default_value_t = DEFAULT_HEART_RATE)]
    heart_rate: f64,
    /// Body temperature during the workout (°C)
    #[arg(long, default_value_t = DEFAULT_BODY_TEMP)]
    body_temp: f64,

    #[arg(long, default_value_t = DEFAULT_N_TREES)]
    trees: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_FEATURES)]
    max_features: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Seed for the forest; omit for a fresh one each run
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_SPLIT_SEED)]
    split_seed: u64,
    #[arg(long, default_value_t = DEFAULT_TEST_FRACTION)]
    test_fraction: f64,
    #[arg(long)]
    peer_seed: Option<u64>,

    /// Save a Duration vs Body_Temp scatter with your point to this PNG
    #[arg(long)]
    plot: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn profile(&self) -> UserProfile {
        UserProfile {
            age: self.age,
            gender: self.gender,
            bmi: self.bmi,
            duration: self.duration,
            heart_rate: self.heart_rate,
            body_temp: self.body_temp,
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            exercise_path: self.exercise.clone(),
            calories_path: self.calories.clone(),
            test_fraction: self.test_fraction,
            split_seed: self.split_seed,
            forest: ForestParams {
                n_trees: self.trees,
                max_features: self.max_features,
                max_depth: self.max_depth,
                seed: self.seed,
                ..ForestParams::default()
            },
            peer_seed: self.peer_seed,
            ..PipelineConfig::default()
        }
    }
}

/// Draws the training workouts as a duration vs body temperature scatter with the user's point in red
/// input: output path, training records, the user's profile
/// output: none (saves a PNG at "path")
/// logic: compute axis ranges over train + user; set up PNG backend; build Cartesian chart;
/// draw one circle per training row sized by calories; draw the user's point on top
fn plot_workouts(path: &Path, train: &[Record], user: &UserProfile) -> Result<(), Box<dyn Error>> {
    let (min_t, max_t) = train
        .iter()
        .fold((user.body_temp, user.body_temp), |(lo, hi), r| (lo.min(r.body_temp), hi.max(r.body_temp)));
    let max_dur = train.iter().map(|r| r.duration).fold(user.duration, f64::max);
    let max_cal = train.iter().map(|r| r.calories).fold(1.0, f64::max);

    let root = BitMapBackend::new(path, (700, 450)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Workout Duration vs Body Temperature", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..max_dur + 1.0, (min_t - 0.5)..(max_t + 0.5))?;

    chart
        .configure_mesh()
        .x_desc("Duration (min)")
        .y_desc("Body temperature (°C)")
        .draw()?;

    chart.draw_series(train.iter().map(|r| {
        let size = 2 + (r.calories / max_cal * 8.0) as i32;
        Circle::new((r.duration, r.body_temp), size, BLUE.mix(0.3).filled())
    }))?;

    chart
        .draw_series(std::iter::once(Circle::new((user.duration, user.body_temp), 9, RED.filled())))?
        .label("You")
        .legend(|(x, y)| Circle::new((x, y), 5, RED.filled()));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn print_report(report: &Report) {
    let p = &report.profile;
    println!("Your parameters:");
    println!("{:<12} {:>8}", "Age", p.age);
    println!("{:<12} {:>8}", "Gender", p.gender);
    println!("{:<12} {:>8.2}", "BMI", p.bmi);
    println!("{:<12} {:>8.1}", "Duration", p.duration);
    println!("{:<12} {:>8.1}", "Heart_Rate", p.heart_rate);
    println!("{:<12} {:>8.1}", "Body_Temp", p.body_temp);

    println!("\nPrediction: {:.2} kilocalories burned today as per your data.", report.prediction);

    println!("\nSimilar results:");
    match &report.peers {
        Peers::Found(peers) => {
            println!(
                "{:<8} {:>4} {:>7} {:>7} {:>9} {:>11} {:>10} {:>9}",
                "Gender", "Age", "Height", "Weight", "Duration", "Heart_Rate", "Body_Temp", "Calories"
            );
            for r in peers {
                println!(
                    "{:<8} {:>4} {:>7.1} {:>7.1} {:>9.1} {:>11.1} {:>10.1} {:>9.1}",
                    r.gender, r.age, r.height, r.weight, r.duration, r.heart_rate, r.body_temp, r.calories
                );
            }
        }
        Peers::NoSimilarResults => println!("No similar results found in the dataset."),
    }

    println!("\nGeneral information:");
    for (metric, pct) in &report.percentiles {
        println!("{} {}% of other people.", metric.comparison(), pct);
    }

    let eval = &report.evaluation;
    println!("\nR² score of the model: {:.2} (MSE {:.2} on {} holdout rows)", eval.r2, eval.mse, eval.n_test);
    println!("{} model: {}", eval.tier, eval.tier.description());
}

/// fit the pipeline on the CSVs, report on the user's workout, and optionally plot
/// input: none
/// output: none
/// logic: Parse CLI flags into a "UserProfile" and "PipelineConfig"; install the tracing subscriber;
/// Call "Pipeline::from_config"; Call "report(&profile)"; Call "print_report";
/// if "--plot" is given, Call "plot_workouts" on the training partition
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let profile = args.profile();
    profile.validate()?;

    info!(exercise = %args.exercise.display(), calories = %args.calories.display(), "Loading data");
    let pipeline = Pipeline::from_config(args.config())?;
    let report = pipeline.report(&profile)?;
    print_report(&report);

    if let Some(path) = &args.plot {
        plot_workouts(path, &pipeline.partition().train, &profile)?;
        println!("\nWrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_named_constants() {
        let args = Args::parse_from(["calorie_insight"]);
        assert_eq!(args.profile(), UserProfile::default());
        let config = args.config();
        assert_eq!(config.forest, ForestParams::default());
        assert_eq!(config.test_fraction, DEFAULT_TEST_FRACTION);
        assert_eq!(config.exercise_path, PathBuf::from(DEFAULT_EXERCISE_PATH));
    }

    #[test]
    fn flags_flow_into_profile_and_config() {
        let args = Args::parse_from([
            "calorie_insight", "--gender", "Female", "--age", "40", "--trees", "10",
            "--seed", "3", "--peer-seed", "4", "--heart-rate", "120",
        ]);
        let profile = args.profile();
        assert_eq!(profile.gender, Gender::Female);
        assert_eq!(profile.age, 40);
        assert_eq!(profile.heart_rate, 120.0);
        let config = args.config();
        assert_eq!(config.forest.n_trees, 10);
        assert_eq!(config.forest.seed, Some(3));
        assert_eq!(config.peer_seed, Some(4));
    }
}
