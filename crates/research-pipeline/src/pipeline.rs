use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;

use backtest_engine::{evaluate_signals, EvaluateParams, EvaluationResult};
use feature_pipeline::{
    build_feature_rows, build_live_rows, feature_names, filter_universe, label_rows, latest_snapshot,
    load_prices_csv, purge_label_overlap, realized_returns, split_at_cutoff, validate_schema,
};
use ml_engine::{
    FoldPolicy, LogisticClassifier, LogisticParams, ModelArtifact, TrainerConfig, TrainingReport,
    WalkForwardTrainer, MODEL_FILE_NAME,
};
use research_core::{DashboardParams, FeatureRow, MetricsRow, PipelineConfig, PricePoint};
use signal_generator::{generate_signals, ArtifactKind, SignalArtifact};

const REPORT_FILE_NAME: &str = "training_report.json";

/// Share of distinct dates used for training when no cutoff is configured.
const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

pub struct TrainOutcome {
    pub cutoff: NaiveDate,
    pub trained_through: NaiveDate,
    pub report: TrainingReport<LogisticParams>,
}

fn load_prices(config: &PipelineConfig, path: &Path) -> anyhow::Result<Vec<PricePoint>> {
    let prices = load_prices_csv(path).with_context(|| format!("Failed to load {}", path.display()))?;
    let sampling = config.universe_sampling();
    Ok(filter_universe(prices, sampling.as_ref()))
}

fn historical_features(config: &PipelineConfig, prices: &[PricePoint]) -> anyhow::Result<Vec<FeatureRow>> {
    let rows = build_feature_rows(prices, config.horizon_days, config.min_history)?;
    if rows.is_empty() {
        bail!("No feature rows: no instrument has at least {} prices", config.min_history);
    }
    validate_schema(&rows, &feature_names())?;
    Ok(rows)
}

/// The date at `DEFAULT_TRAIN_FRACTION` of the distinct dates.
pub fn default_cutoff(rows: &[FeatureRow]) -> Option<NaiveDate> {
    let dates: Vec<NaiveDate> = rows
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let idx = (dates.len() as f64 * DEFAULT_TRAIN_FRACTION).floor() as usize;
    dates.get(idx).copied()
}

pub fn train(
    config: &PipelineConfig,
    prices_path: &Path,
    cutoff: Option<NaiveDate>,
    fold_policy: FoldPolicy,
) -> anyhow::Result<TrainOutcome> {
    let prices = load_prices(config, prices_path)?;
    let rows = historical_features(config, &prices)?;
    let cutoff = match cutoff.or_else(|| default_cutoff(&rows)) {
        Some(c) => c,
        None => bail!("Cannot derive a train/test cutoff from an empty date range"),
    };

    let labeled = label_rows(rows, config.label_threshold);
    let (train_rows, held_out) = split_at_cutoff(labeled, cutoff, |r| r.date());
    // labels of the final horizon dates before the cutoff read prices past it
    let train_rows = purge_label_overlap(train_rows, &prices, config.horizon_days, cutoff);
    let trained_through = match train_rows.iter().map(|r| r.date()).max() {
        Some(d) => d,
        None => bail!("No training rows before cutoff {}", cutoff),
    };
    tracing::info!(
        "Cutoff {}: {} training rows, {} held out",
        cutoff,
        train_rows.len(),
        held_out.len()
    );

    let trainer_config = TrainerConfig {
        fold_policy,
        ..TrainerConfig::logistic(config.seed)
    };
    let trainer = WalkForwardTrainer::new(LogisticClassifier::new(feature_names()), trainer_config);
    let (model, report) = trainer.train(&train_rows)?;

    let model_path = config.artifact_dir.join(MODEL_FILE_NAME);
    ModelArtifact::new(model, Some(trained_through)).save(&model_path)?;

    let report_path = config.artifact_dir.join(REPORT_FILE_NAME);
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    Ok(TrainOutcome {
        cutoff,
        trained_through,
        report,
    })
}

/// Score held-out history (rows after the model's training window) or the
/// latest date, and persist the artifact.
pub fn generate(
    config: &PipelineConfig,
    prices_path: &Path,
    live: bool,
    threshold: f64,
) -> anyhow::Result<SignalArtifact> {
    let model_path = config.artifact_dir.join(MODEL_FILE_NAME);
    let artifact = ModelArtifact::load(&model_path).context("Run `train` first")?;
    let prices = load_prices(config, prices_path)?;

    let signal_artifact = if live {
        let snapshot = latest_snapshot(&build_live_rows(&prices, config.min_history)?);
        let rows = generate_signals(&artifact.model, &snapshot, threshold)?;
        SignalArtifact::new(ArtifactKind::Live, threshold, rows, Vec::new())
    } else {
        let rows = historical_features(config, &prices)?;
        let test_rows: Vec<FeatureRow> = match artifact.trained_through {
            Some(through) => rows.into_iter().filter(|r| r.date > through).collect(),
            None => rows,
        };
        if test_rows.is_empty() {
            tracing::warn!("No rows after the training window; the artifact will be empty");
        }
        let signals = generate_signals(&artifact.model, &test_rows, threshold)?;
        SignalArtifact::new(ArtifactKind::Historical, threshold, signals, realized_returns(&test_rows))
    };

    signal_artifact.save(&config.artifact_dir.join(signal_artifact.kind.file_name()))?;
    Ok(signal_artifact)
}

pub fn backtest(config: &PipelineConfig, params: &DashboardParams) -> anyhow::Result<EvaluationResult> {
    params.validate()?;
    let path = config.artifact_dir.join(ArtifactKind::Historical.file_name());
    let artifact = SignalArtifact::load(&path).context("Run `signals` first")?;
    let eval_params = EvaluateParams::new(params.take_profit, params.stop_loss, config.horizon_days);
    Ok(evaluate_signals(
        &artifact.rows,
        &artifact.realized,
        params.threshold,
        &eval_params,
    )?)
}

pub fn format_metrics_table(rows: &[MetricsRow]) -> String {
    let cell = |v: Option<f64>| v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "NA".to_string());
    let mut out = format!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Series", "CAGR", "Vol", "Sharpe", "MaxDD", "Calmar"
    );
    for m in rows {
        out.push_str(&format!(
            "\n{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
            m.series.label(),
            cell(m.cagr),
            cell(m.volatility),
            cell(m.sharpe),
            cell(m.max_drawdown),
            cell(m.calmar)
        ));
    }
    out
}
