//! Sample Request Generator
//!
//! Generates random student submissions and sends them as NATS requests to a
//! running `career-recommender serve`, logging each reply.

use career_recommender::producer::ErrorReply;
use career_recommender::types::person::{Gender, PersonInput, DEFAULT_SUBJECT_GRADES, GRADE_OPTIONS};
use career_recommender::types::prediction::PredictionResult;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Random submission generator
struct SubmissionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl SubmissionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a submission; grades cluster around the student's GPA
    fn generate(&mut self) -> PersonInput {
        let gender = if self.rng.gen_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        };
        let year = self.rng.gen_range(1..=4);
        let gpa = (self.rng.gen_range(1.5..4.0_f64) * 100.0).round() / 100.0;

        // Index into GRADE_OPTIONS near the grade matching the GPA
        let center = ((4.0 - gpa) * 2.0).round() as i64;

        DEFAULT_SUBJECT_GRADES
            .iter()
            .fold(PersonInput::new(gender, year, gpa), |person, (subject, _)| {
                let offset = self.rng.gen_range(-1..=1);
                let index = (center + offset).clamp(0, GRADE_OPTIONS.len() as i64 - 1) as usize;
                person.with_grade(*subject, GRADE_OPTIONS[index])
            })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_requester=info".parse()?),
        )
        .init();

    info!("Starting sample request generator");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("career.predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, delay_ms).await;
        }
    };

    let mut generator = SubmissionGenerator::new();
    let mut answered = 0u64;
    let mut rejected = 0u64;

    for i in 0..count {
        let person = generator.generate();
        let payload = serde_json::to_vec(&person)?;

        let reply = client.request(subject.to_string(), payload.into()).await?;

        if let Ok(result) = serde_json::from_slice::<PredictionResult>(&reply.payload) {
            answered += 1;
            info!(
                request = i + 1,
                gpa = person.gpa,
                label = %result.label,
                confidence = format!("{:.1}%", result.confidence() * 100.0),
                "Prediction received"
            );
        } else {
            rejected += 1;
            match serde_json::from_slice::<ErrorReply>(&reply.payload) {
                Ok(err) => warn!(request = i + 1, kind = %err.error, "{}", err.message),
                Err(e) => warn!(request = i + 1, error = %e, "Unrecognized reply"),
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} answered, {} rejected)",
        count, answered, rejected
    );

    Ok(())
}

async fn run_dry_mode(count: u64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = SubmissionGenerator::new();

    for i in 0..count {
        let person = generator.generate();
        let json = serde_json::to_string_pretty(&person)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample submission {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
