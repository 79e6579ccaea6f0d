use anyhow::{bail, Context, Result};
use audience_rec::algorithms::evaluation::{evaluate, temporal_split, EvaluationReport};
use audience_rec::algorithms::{ActivityBaseline, RankingModel};
use audience_rec::utils::{read_interactions, sample_products, write_atomic};
use audience_rec::{init_tracing, Config, MODEL_TYPE};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

const QUICK_TOP_N: usize = 20;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Interaction table (JSON Lines); overrides paths.interactions
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Artifact directory; overrides paths.models_dir
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    top_n: Option<usize>,

    #[arg(long)]
    recency_days: Option<u32>,

    /// Train on a sample of products for a fast smoke run
    #[arg(long)]
    quick: bool,

    /// Skip the temporal hold-out evaluation
    #[arg(long)]
    skip_eval: bool,
}

#[derive(Debug, Serialize)]
struct MetricsFile<'a> {
    model_type: &'a str,
    quick_mode: bool,
    train_size: usize,
    test_size: usize,
    report: &'a EvaluationReport,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(top_n) = args.top_n {
        config.training.top_n = top_n;
    }
    if let Some(recency_days) = args.recency_days {
        config.training.recency_days = recency_days;
    }
    config.validate()?;

    let input = args.input.clone().unwrap_or_else(|| config.paths.interactions.clone());
    let output = args.output.clone().unwrap_or_else(|| config.paths.models_dir.clone());
    let training = &config.training;

    let mut interactions = read_interactions(&input)?;
    if interactions.is_empty() {
        bail!("no interactions in {}", input.display());
    }

    let mut top_n = training.top_n;
    if args.quick {
        interactions = sample_products(&interactions, training.sample_fraction, training.seed);
        top_n = top_n.min(QUICK_TOP_N);
        info!(
            "Quick mode: {} interactions after sampling {:.0}% of products, top_n {}",
            interactions.len(),
            training.sample_fraction * 100.0,
            top_n
        );
    }

    if !args.skip_eval {
        let (train, test) = temporal_split(&interactions, training.train_fraction);
        info!("Temporal split: {} train, {} test", train.len(), test.len());

        let mut model = ActivityBaseline::new(training.recency_days);
        model.train(&train);
        let cache = model.precompute(top_n, training.fallback_size, Utc::now());
        let report = evaluate(&cache, &test, &training.k_values);

        let metrics = MetricsFile {
            model_type: MODEL_TYPE,
            quick_mode: args.quick,
            train_size: train.len(),
            test_size: test.len(),
            report: &report,
        };
        let path = config.paths.results_dir.join("model_metrics.json");
        write_atomic(&path, &serde_json::to_vec_pretty(&metrics)?)?;
        info!("Metrics saved to {}", path.display());
    }

    // The shipped artifact is always trained on the full history.
    let mut model = ActivityBaseline::new(training.recency_days);
    model.train(&interactions);
    let cache = model.precompute(top_n, training.fallback_size, Utc::now());
    cache
        .persist(&output)
        .with_context(|| format!("failed to persist cache to {}", output.display()))?;

    info!(
        "Training complete: {} products, {} recommendations written to {}",
        cache.product_count(),
        cache.total_entries(),
        output.display()
    );
    Ok(())
}
