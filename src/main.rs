//! Career Recommender - Main Entry Point
//!
//! `predict` answers a single submission from the command line, `schema`
//! describes the loaded bundle, and `serve` answers submissions arriving
//! over NATS one at a time.

use anyhow::{Context, Result};
use career_recommender::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    consumer::RequestConsumer,
    metrics::PredictionMetrics,
    models::{Bundle, BundleLoader, Predictor},
    producer::{ErrorReply, ResultProducer},
    types::person::{Gender, PersonInput},
    types::prediction::PredictionResult,
};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "career-recommender", version, about = "Recommend a career path from student grades")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Model bundle to use instead of the configured candidates
    #[arg(long, global = true)]
    bundle: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Predict a career for one student
    Predict(PredictArgs),
    /// Describe the loaded model bundle
    Schema,
    /// Answer prediction requests from NATS
    Serve,
}

#[derive(Debug, Args)]
struct PredictArgs {
    /// Read the whole submission from a JSON file
    #[arg(long, conflicts_with_all = ["gender", "year", "gpa", "grades"])]
    input: Option<PathBuf>,

    /// ชาย / male or หญิง / female
    #[arg(long)]
    gender: Option<Gender>,

    /// Study year
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    year: Option<u8>,

    /// Cumulative GPA, 0.00-4.00
    #[arg(long)]
    gpa: Option<f64>,

    /// Subject grade, repeatable; unspecified subjects keep the form defaults
    #[arg(long = "grade", value_name = "SUBJECT=GRADE", value_parser = parse_grade)]
    grades: Vec<(String, String)>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_grade(s: &str) -> Result<(String, String), String> {
    let (subject, grade) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected SUBJECT=GRADE, got '{}'", s))?;
    let (subject, grade) = (subject.trim(), grade.trim());
    if subject.is_empty() || grade.is_empty() {
        return Err(format!("expected SUBJECT=GRADE, got '{}'", s));
    }
    Ok((subject.to_string(), grade.to_string()))
}

impl PredictArgs {
    fn person(&self) -> Result<PersonInput> {
        if let Some(path) = &self.input {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input {}", path.display()))?;
            return serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse input {}", path.display()));
        }

        let mut person = PersonInput::default();
        if let Some(gender) = self.gender {
            person.gender = gender;
        }
        if let Some(year) = self.year {
            person.year = year;
        }
        if let Some(gpa) = self.gpa {
            person.gpa = gpa;
        }
        for (subject, grade) in &self.grades {
            person.grades.insert(subject.clone(), grade.clone());
        }
        Ok(person)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)?;
    init_logging(&config.logging)?;

    let loader = match &cli.bundle {
        Some(path) => BundleLoader::new([path]),
        None => BundleLoader::new(&config.bundle.candidates),
    };
    let bundle = loader.load()?;
    let predictor = Predictor::new(bundle);

    match cli.command {
        Command::Predict(args) => run_predict(&predictor, &args),
        Command::Schema => {
            print_schema(predictor.bundle());
            Ok(())
        }
        Command::Serve => run_serve(&config, predictor).await,
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

fn run_predict(predictor: &Predictor, args: &PredictArgs) -> Result<()> {
    let person = args.person()?;
    let result = predictor.predict(&person)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &PredictionResult) {
    println!("อาชีพที่เหมาะสม: {}", result.label);
    println!();
    println!("Class probabilities:");
    let width = result
        .probabilities
        .iter()
        .map(|p| p.label.chars().count())
        .max()
        .unwrap_or(0);
    for p in &result.probabilities {
        let bar = "█".repeat((p.probability * 40.0).round() as usize);
        let pad = width - p.label.chars().count();
        println!(
            "  {}{}  {:>6.2}%  {}",
            p.label,
            " ".repeat(pad),
            p.probability * 100.0,
            bar
        );
    }
    println!();
    println!("Encoded features:");
    for (column, value) in result.encoded_row.iter() {
        println!("  {} = {}", column, value);
    }
}

fn print_schema(bundle: &Bundle) {
    if let Some(source) = bundle.source() {
        println!("Bundle:        {}", source.display());
    }
    println!("Model:         {}", bundle.classifier().name());
    println!("Classes:       {}", bundle.classes().join(", "));
    println!("Gender scheme: {}", bundle.schema().gender_scheme());
    println!("Features ({}):", bundle.feature_count());
    for (i, column) in bundle.feature_cols().iter().enumerate() {
        println!("  {:>2}. {}", i + 1, column);
    }
    println!("Subjects:      {}", bundle.schema().subject_columns().join(", "));
    let grades: Vec<String> = bundle
        .grade_points()
        .ranked()
        .iter()
        .map(|(grade, points)| format!("{}={}", grade, points))
        .collect();
    println!("Grade points:  {}", grades.join(", "));
}

async fn run_serve(config: &AppConfig, predictor: Predictor) -> Result<()> {
    let metrics = PredictionMetrics::new();

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let producer = ResultProducer::new(client, &config.nats.result_subject);
    let mut subscription = consumer.subscribe().await?;

    info!(
        requests = %consumer.subject(),
        results = %producer.subject(),
        features = predictor.bundle().feature_count(),
        "Serving career predictions"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Requests are answered one at a time, in arrival order
    loop {
        let message = tokio::select! {
            _ = &mut shutdown => break,
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let start = Instant::now();
        let reply_to = message.reply.clone();

        let outcome = match serde_json::from_slice::<PersonInput>(&message.payload) {
            Ok(person) => match predictor.predict(&person) {
                Ok(result) => {
                    metrics.record_prediction(start.elapsed(), &result.label);
                    info!(
                        prediction_id = %result.prediction_id,
                        label = %result.label,
                        confidence = result.confidence(),
                        processing_time_us = start.elapsed().as_micros(),
                        "Prediction served"
                    );
                    producer.publish(reply_to, &result).await
                }
                Err(e) => {
                    metrics.record_failure(start.elapsed(), e.kind());
                    warn!(error = %e, "Prediction failed");
                    producer.publish_error(reply_to, &ErrorReply::from(&e)).await
                }
            },
            Err(e) => {
                metrics.record_failure(start.elapsed(), "malformed_request");
                warn!(error = %e, "Failed to deserialize request");
                let reply = ErrorReply::new("malformed_request", e.to_string());
                producer.publish_error(reply_to, &reply).await
            }
        };

        if let Err(e) = outcome {
            error!(error = %e, "Failed to publish reply");
        }

        if metrics.total() % 100 == 0 {
            metrics.print_summary();
        }
    }

    info!("Prediction service shutting down...");
    metrics.print_summary();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grade() {
        assert_eq!(
            parse_grade("หลักการตลาด=B+").unwrap(),
            ("หลักการตลาด".to_string(), "B+".to_string())
        );
        assert_eq!(
            parse_grade("ระบบการสื่อสารและเครือข่าย 1 = A").unwrap(),
            ("ระบบการสื่อสารและเครือข่าย 1".to_string(), "A".to_string())
        );
        assert!(parse_grade("B+").is_err());
        assert!(parse_grade("=A").is_err());
    }

    #[test]
    fn test_cli_overrides_form_defaults() {
        let cli = Cli::parse_from([
            "career-recommender",
            "predict",
            "--gender",
            "male",
            "--gpa",
            "2.5",
            "--grade",
            "หลักการตลาด=A",
        ]);
        let Command::Predict(args) = cli.command else {
            panic!("expected predict command");
        };

        let person = args.person().unwrap();
        assert_eq!(person.gender, Gender::Male);
        assert_eq!(person.year, 4);
        assert_eq!(person.gpa, 2.5);
        assert_eq!(person.grades.get("หลักการตลาด").map(String::as_str), Some("A"));
        assert_eq!(person.grades.len(), 8);
    }

    #[test]
    fn test_cli_rejects_out_of_range_year() {
        assert!(Cli::try_parse_from(["career-recommender", "predict", "--year", "5"]).is_err());
    }
}
