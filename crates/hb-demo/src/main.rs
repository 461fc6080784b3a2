//! Hyperband demo CLI.
//!
//! Tunes a single scalar `rho` against a quadratic loss whose noise shrinks
//! as more resource is spent on it.

use std::f64::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use clap::Parser;
use hb_tuner::{
    HbError, LossEvaluator, ParamSet, ParamValue, RandomSearch, SearchSpace, Tuner, TunerConfig,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hb-demo")]
#[command(about = "Run Hyperband on a noisy quadratic objective")]
struct Cli {
    /// JSON tuner configuration. Overrides --max-resource, --eta and --workers
    #[arg(long, env = "HB_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum resource per configuration (R)
    #[arg(long, env = "HB_MAX_RESOURCE", default_value = "81")]
    max_resource: f64,

    /// Culling factor
    #[arg(long, env = "HB_ETA", default_value = "3")]
    eta: f64,

    /// Worker slots; omit to run on the main thread
    #[arg(long, env = "HB_WORKERS")]
    workers: Option<usize>,

    /// Random seed for sampling and noise
    #[arg(long)]
    seed: Option<u64>,

    /// Noise standard deviation at resource 1
    #[arg(long, default_value = "40")]
    noise_scale: f64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

/// `rho^2` plus Gaussian noise with standard deviation `noise_scale / r`.
struct NoisyQuadratic {
    noise_scale: f64,
    rng: Mutex<StdRng>,
    meter: Arc<Mutex<f64>>,
}

impl NoisyQuadratic {
    fn new(noise_scale: f64, seed: Option<u64>, meter: Arc<Mutex<f64>>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            noise_scale,
            rng: Mutex::new(rng),
            meter,
        }
    }

    /// Box-Muller.
    fn standard_normal(&self) -> f64 {
        let mut rng = self.rng.lock();
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }
}

impl LossEvaluator<ParamSet> for NoisyQuadratic {
    fn evaluate(&self, config: &ParamSet, resource: f64) -> Result<f64> {
        let rho = config
            .get("rho")
            .and_then(ParamValue::as_f64)
            .ok_or_else(|| anyhow!("configuration has no numeric rho"))?;

        *self.meter.lock() += resource;
        let loss = rho * rho + self.standard_normal() * self.noise_scale / resource;
        debug!(rho, resource, loss, "Evaluated");
        Ok(loss)
    }
}

fn tuner_config(cli: &Cli) -> Result<TunerConfig> {
    if let Some(path) = &cli.config {
        return Ok(TunerConfig::from_file(path)?);
    }
    let mut config = TunerConfig::new("hb-demo", cli.max_resource).with_eta(cli.eta);
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    ensure!(
        cli.noise_scale.is_finite() && cli.noise_scale >= 0.0,
        "noise scale must be a non-negative number, got {}",
        cli.noise_scale
    );

    let config = tuner_config(&cli)?;
    let space = SearchSpace::new().uniform("rho", -100.0, 100.0);
    let sampler = match cli.seed {
        Some(seed) => RandomSearch::with_seed(space, seed)?,
        None => RandomSearch::new(space)?,
    };
    let meter = Arc::new(Mutex::new(0.0));
    let noise_seed = cli.seed.map(|s| s.wrapping_add(1));
    let evaluator = NoisyQuadratic::new(cli.noise_scale, noise_seed, Arc::clone(&meter));

    let tuner = Tuner::<ParamSet>::from_config(&config, sampler, evaluator)?;
    let schedule = tuner.schedule();
    info!(
        max_resource = schedule.max_resource,
        eta = schedule.eta,
        s_max = schedule.s_max,
        brackets = schedule.len(),
        planned_resource = schedule.total_resource(),
        "Planned schedule"
    );

    let mut steps = tuner.step_sequence();
    let mut best = None;
    for (step, result) in steps.by_ref().enumerate() {
        let evaluation = result?;
        let rho = evaluation
            .config
            .get("rho")
            .map(ToString::to_string)
            .unwrap_or_default();
        info!(
            step = step + 1,
            rho = %rho,
            loss = evaluation.loss,
            resource_used = *meter.lock(),
            "Best so far"
        );
        best = Some(evaluation);
    }
    let best = best.ok_or(HbError::NoResult)?;

    let report = serde_json::json!({
        "best": best,
        "status": steps.status(),
        "resource_used": *meter.lock(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
