//! offer-rec - train the offer recommender on an engagement fact table
//!
//! Input is a JSON array or JSON-lines file of
//! `{"customer_id": ..., "offer_id": ..., "score": ...}` rows.

use anyhow::{Context, Result};
use clap::Parser;
use offer_recommender::{EngineConfig, Observation, OfferRecommender};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "offer-rec", version, about = "Latent-factor offer recommender")]
struct Cli {
    /// Engagement fact table (JSON array or JSON lines)
    #[arg(long)]
    input: PathBuf,

    /// Configuration file; defaults to config/offer-rec if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Customer to recommend offers for
    #[arg(long, requires = "threshold")]
    customer: Option<String>,

    /// Recommend offers predicted strictly above this score
    #[arg(long)]
    threshold: Option<f64>,

    /// Print the customer's observed row next to the predicted row
    #[arg(long, requires = "customer")]
    compare: bool,

    #[arg(long)]
    latent_features: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    iterations: Option<usize>,

    /// Share of fact-table rows used for training, in (0, 1)
    #[arg(long)]
    train_fraction: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Write the trained factor model (bincode) to this path
    #[arg(long)]
    model_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load().context("Failed to load configuration")?,
    };
    apply_overrides(&mut config, &cli);

    let observations = load_fact_table(&cli.input)?;
    info!(rows = observations.len(), input = %cli.input.display(), "Loaded fact table");

    let recommender = OfferRecommender::from_config(&observations, &config)
        .context("Failed to fit recommender")?;

    let report = recommender.report();
    let evaluation = recommender.evaluate_holdout();
    let mut output = json!({
        "customers": recommender.train_matrix().num_customers(),
        "offers": recommender.train_matrix().num_offers(),
        "observed_cells": report.observed_cells,
        "final_mse": report.final_mse(),
        "divergence": report.divergence.map(|w| w.to_string()),
        "error_series": report.error_series,
        "holdout": evaluation,
    });

    if let Some(customer) = &cli.customer {
        // clap enforces `threshold` alongside `customer`
        let threshold = cli.threshold.context("--threshold is required")?;
        let offers = recommender.recommend(customer, threshold)?;
        output["recommendations"] = json!({
            "customer_id": customer,
            "threshold": threshold,
            "offers": offers,
        });

        if cli.compare {
            let comparison = recommender.compare(customer)?;
            output["comparison"] = json!({
                "offer_ids": comparison.offer_ids,
                "actual": comparison.actual,
                "predicted": comparison.predicted,
            });
        }
    }

    if let Some(path) = &cli.model_out {
        let bytes = recommender.model().to_bytes()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write model to {}", path.display()))?;
        info!(path = %path.display(), "Wrote factor model");
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn apply_overrides(config: &mut EngineConfig, cli: &Cli) {
    if let Some(k) = cli.latent_features {
        config.latent_features = k;
    }
    if let Some(lr) = cli.learning_rate {
        config.learning_rate = lr;
    }
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if let Some(fraction) = cli.train_fraction {
        config.train_fraction = fraction;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
}

fn load_fact_table(path: &Path) -> Result<Vec<Observation>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_fact_table(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_fact_table(raw: &str) -> Result<Vec<Observation>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid row on line {}", n + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let raw = r#"[{"customer_id": "a", "offer_id": "x", "score": 4.5}]"#;
        let rows = parse_fact_table(raw).unwrap();
        assert_eq!(rows, vec![Observation::new("a", "x", 4.5)]);
    }

    #[test]
    fn test_parse_json_lines() {
        let raw = "{\"customer_id\": \"a\", \"offer_id\": \"x\", \"score\": 1.0}\n\n\
                   {\"customer_id\": \"b\", \"offer_id\": \"y\", \"score\": 2.0}\n";
        let rows = parse_fact_table(raw).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], Observation::new("b", "y", 2.0));
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let raw = "{\"customer_id\": \"a\", \"offer_id\": \"x\", \"score\": 1.0}\nnot json\n";
        let err = parse_fact_table(raw).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_cli_requires_threshold_with_customer() {
        let result = Cli::try_parse_from(["offer-rec", "--input", "f.json", "--customer", "a"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "offer-rec",
            "--input",
            "f.json",
            "--customer",
            "a",
            "--threshold",
            "5.67",
        ])
        .unwrap();
        assert_eq!(cli.threshold, Some(5.67));
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "offer-rec",
            "--input",
            "f.json",
            "--iterations",
            "5",
            "--seed",
            "3",
            "--train-fraction",
            "0.75",
        ])
        .unwrap();
        let mut config = EngineConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.iterations, 5);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.train_fraction, 0.75);
        assert_eq!(config.latent_features, 10);
    }

    #[test]
    fn test_out_of_range_train_fraction_fails_validation() {
        let cli =
            Cli::try_parse_from(["offer-rec", "--input", "f.json", "--train-fraction", "1.5"])
                .unwrap();
        let mut config = EngineConfig::default();
        apply_overrides(&mut config, &cli);

        assert!(config.validate().is_err());
    }
}
