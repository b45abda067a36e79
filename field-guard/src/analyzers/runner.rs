//! Orchestration of one analysis run.
//!
//! A run has two phases separated by barriers:
//!
//! 1. **Inference**: one unit per column classifies its semantic type.
//! 2. **Analysis**: per-column quality, statistics and outlier units, per-pair
//!    relationship units, decomposition units and one duplicate-row unit, all
//!    independent of each other.
//!
//! Units run on the blocking pool, at most `max_concurrency` at a time, each under
//! the optional per-unit timeout and a child of the run's cancellation token. Results
//! are merged in plan order, never completion order, so the profile is identical
//! whatever the scheduling. Rules are synthesized only after the second barrier.
//!
//! # Example
//!
//! ```rust,no_run
//! use field_guard::analyzers::AnalysisRunner;
//! use field_guard::cancellation::CancellationToken;
//! use field_guard::config::AnalysisConfig;
//! use field_guard::dataset::Dataset;
//!
//! # fn example() -> field_guard::error::Result<()> {
//! let dataset = Dataset::builder("orders")
//!     .column_from("amount", vec![12.5, 13.0, 11.75, 250.0])
//!     .build()?;
//! let token = CancellationToken::new();
//!
//! let profile = AnalysisRunner::new(AnalysisConfig::builder().isolation_seed(7).build()?)
//!     .cancellation_token(token.clone())
//!     .on_progress(|progress| println!("Analysis progress: {:.1}%", progress * 100.0))
//!     .run(&dataset)?;
//! println!("{} rules", profile.rules.len());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::runtime::RuntimeFlavor;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, info, instrument, warn};

use crate::analyzers::inference::{SemanticType, TypeInferenceEngine, TypedColumn};
use crate::analyzers::outliers::OutlierDetector;
use crate::analyzers::profile::{
    AnalysisProfile, ColumnProfile, DatasetSummary, Diagnostic, DuplicateReport, OutlierFinding,
    OutlierMethod, ProfileStatus, RelationshipEdge, SeasonalDecomposition, TypeSummary,
};
use crate::analyzers::quality::{dataset_totals, measure_column, ColumnQuality, DuplicateDetector};
use crate::analyzers::relationships::{plan_pairs, RelationshipAnalyzer};
use crate::analyzers::rules::RuleSynthesizer;
use crate::analyzers::statistics::StatisticalSummarizer;
use crate::analyzers::temporal::SeasonalDecomposer;
use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::dataset::{Column, Dataset};
use crate::error::{EngineError, Result};
use crate::log_unit;
use crate::logging::truncate_field;

/// Type alias for progress callback function.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Share of the progress range covered by the inference phase.
const INFERENCE_SHARE: f64 = 0.2;

const OUTLIER_METHODS: [OutlierMethod; 3] = [
    OutlierMethod::ZScore,
    OutlierMethod::Iqr,
    OutlierMethod::IsolationForest,
];

type Work<T> = Box<dyn FnOnce(&CancellationToken) -> Result<T> + Send>;

/// A named unit of work.
struct Unit<T> {
    id: String,
    work: Work<T>,
}

impl<T> Unit<T> {
    fn new<F>(id: String, work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        Self {
            id,
            work: Box::new(work),
        }
    }
}

struct UnitOutcome<T> {
    id: String,
    result: Result<T>,
}

impl<T> UnitOutcome<T> {
    /// The unit ran to an answer, including a "skipped" answer about its data.
    fn finished(&self) -> bool {
        !matches!(
            self.result,
            Err(EngineError::Cancelled { .. }) | Err(EngineError::UnitTimeout { .. })
        )
    }
}

/// Output of a second-phase unit.
enum Finding {
    Quality(usize, ColumnQuality),
    Summary(usize, TypeSummary),
    Outliers(Vec<OutlierFinding>),
    Relationship(RelationshipEdge),
    Decomposition(SeasonalDecomposition),
    Duplicates(DuplicateReport),
}

/// Runs the full analysis of a dataset.
pub struct AnalysisRunner {
    config: AnalysisConfig,
    token: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl Default for AnalysisRunner {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisRunner {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            token: CancellationToken::new(),
            on_progress: None,
        }
    }

    /// Uses `token` to cancel the run from elsewhere.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Sets a progress callback that will be called during execution.
    ///
    /// The callback receives a non-decreasing float between 0.0 and 1.0.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Runs the analysis to completion, blocking the calling thread.
    ///
    /// Outside a tokio runtime the run drives a private runtime. Inside a
    /// multi-threaded runtime it blocks in place on the caller's runtime; inside a
    /// current-thread runtime it drives a private runtime on a scoped thread. Async
    /// callers should prefer [`run_async`](Self::run_async).
    pub fn run(&self, dataset: &Dataset) -> Result<AnalysisProfile> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.run_async(dataset)))
            }
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| self.run_private(dataset))
                    .join()
                    .map_err(|_| EngineError::internal("analysis thread panicked"))?
            }),
            Err(_) => self.run_private(dataset),
        }
    }

    fn run_private(&self, dataset: &Dataset) -> Result<AnalysisProfile> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .max_blocking_threads(self.config.max_concurrency.max(1))
            .thread_name("field-guard-unit")
            .build()
            .map_err(|e| EngineError::internal(format!("failed to start runtime: {e}")))?;
        runtime.block_on(self.run_async(dataset))
    }

    /// Runs the analysis on the current tokio runtime.
    #[instrument(skip(self, dataset), fields(
        dataset = %dataset.name(),
        rows = dataset.row_count(),
        columns = dataset.column_count()
    ))]
    pub async fn run_async(&self, dataset: &Dataset) -> Result<AnalysisProfile> {
        self.config.validate()?;
        if dataset.column_count() == 0 {
            return Err(EngineError::invalid_dataset("dataset has no columns"));
        }
        if dataset.row_count() == 0 {
            return Err(EngineError::invalid_dataset("dataset has no rows"));
        }

        let started = Instant::now();
        let seed = match self.config.isolation_seed {
            Some(seed) => seed,
            None => {
                let seed: u64 = rand::rng().random();
                warn!(
                    seed,
                    "No isolation_seed configured; drew one from entropy, results will not repeat"
                );
                seed
            }
        };
        info!(
            dataset = %dataset.name(),
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            max_concurrency = self.config.max_concurrency,
            "Starting analysis"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut diagnostics = Vec::new();
        let mut completed = 0usize;

        // Phase 1: inference
        let inferred = self
            .run_phase(self.inference_units(dataset), &semaphore, (0.0, INFERENCE_SHARE))
            .await;
        let mut typed = Vec::with_capacity(dataset.column_count());
        for (index, outcome) in inferred.into_iter().enumerate() {
            if outcome.finished() {
                completed += 1;
            }
            match outcome.result {
                Ok(column) => typed.push(column),
                Err(err) => {
                    let column = &dataset.columns()[index];
                    self.record_skip(&mut diagnostics, outcome.id, err);
                    typed.push(TypedColumn::unknown(
                        &column.name,
                        index,
                        column.non_missing_count(),
                    ));
                }
            }
        }
        let typed = Arc::new(typed);

        // Phase 2: everything that depends only on the inferred types
        let analyzed = self
            .run_phase(
                self.analysis_units(dataset, &typed, seed),
                &semaphore,
                (INFERENCE_SHARE, 1.0),
            )
            .await;

        let column_count = dataset.column_count();
        let mut qualities: Vec<Option<ColumnQuality>> = vec![None; column_count];
        let mut summaries: Vec<Option<TypeSummary>> = vec![None; column_count];
        let mut outliers = Vec::new();
        let mut relationships = Vec::new();
        let mut decompositions = Vec::new();
        let mut duplicates = None;
        for outcome in analyzed {
            if outcome.finished() {
                completed += 1;
            }
            match outcome.result {
                Ok(Finding::Quality(index, quality)) => qualities[index] = Some(quality),
                Ok(Finding::Summary(index, summary)) => summaries[index] = Some(summary),
                Ok(Finding::Outliers(found)) => outliers.extend(found),
                Ok(Finding::Relationship(edge)) => relationships.push(edge),
                Ok(Finding::Decomposition(decomposition)) => decompositions.push(decomposition),
                Ok(Finding::Duplicates(report)) => duplicates = Some(report),
                Err(err) => self.record_skip(&mut diagnostics, outcome.id, err),
            }
        }

        let cancelled = self.token.is_cancelled();
        if cancelled && completed == 0 {
            warn!("Analysis cancelled before any unit completed");
            return Err(EngineError::Cancelled { completed_units: 0 });
        }

        let columns: Vec<ColumnProfile> = typed
            .iter()
            .zip(dataset.columns())
            .zip(qualities.into_iter().zip(summaries))
            .map(|((typed, raw), (quality, summary))| {
                let quality = quality.unwrap_or_else(|| quality_from_inference(raw, typed));
                ColumnProfile {
                    name: typed.name.clone(),
                    semantic_type: typed.semantic_type(),
                    type_confidence: typed.inference.confidence,
                    non_missing_count: quality.non_missing,
                    missing_ratio: quality.missing_ratio,
                    completeness: quality.completeness,
                    distinct_count: quality.distinct_count,
                    distinctness: quality.distinctness,
                    summary: summary.unwrap_or(TypeSummary::None),
                }
            })
            .collect();

        let (total_cells, missing_cells) = dataset_totals(dataset);
        let mut profile = AnalysisProfile {
            dataset: DatasetSummary {
                name: dataset.name().to_string(),
                fingerprint: dataset.fingerprint(),
                row_count: dataset.row_count(),
                column_count,
                total_cells,
                missing_cells,
                completeness: 1.0 - missing_cells as f64 / total_cells as f64,
                duplicates,
            },
            status: if cancelled {
                ProfileStatus::Cancelled
            } else {
                ProfileStatus::Complete
            },
            isolation_seed: seed,
            columns,
            relationships,
            decompositions,
            outliers,
            rules: Vec::new(),
            diagnostics,
        };

        // A cancelled run is partial; rules are only derived from a complete picture.
        if !cancelled {
            profile.rules = RuleSynthesizer::from_config(&self.config).synthesize(&profile);
        }

        info!(
            status = ?profile.status,
            completed_units = completed,
            skipped_units = profile.diagnostics.len(),
            outliers = profile.outliers.len(),
            rules = profile.rules.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis finished"
        );
        Ok(profile)
    }

    fn inference_units(&self, dataset: &Dataset) -> Vec<Unit<TypedColumn>> {
        let engine = Arc::new(TypeInferenceEngine::from_config(&self.config));
        dataset
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let engine = Arc::clone(&engine);
                let data = dataset.clone();
                Unit::new(format!("inference:{}", column.name), move |token| {
                    engine.infer(&data.columns()[index], index, token)
                })
            })
            .collect()
    }

    fn analysis_units(
        &self,
        dataset: &Dataset,
        typed: &Arc<Vec<TypedColumn>>,
        seed: u64,
    ) -> Vec<Unit<Finding>> {
        let summarizer = Arc::new(StatisticalSummarizer::new(&self.config));
        let detector = Arc::new(OutlierDetector::new(&self.config, seed));
        let analyzer = Arc::new(RelationshipAnalyzer::new(&self.config));
        let decomposer = Arc::new(SeasonalDecomposer::new(&self.config));
        let duplicates = DuplicateDetector::from_config(&self.config);
        let types: Vec<SemanticType> = typed.iter().map(TypedColumn::semantic_type).collect();
        let mut units = Vec::new();

        for (index, column) in typed.iter().enumerate() {
            let name = &column.name;
            {
                let (data, typed) = (dataset.clone(), Arc::clone(typed));
                units.push(Unit::new(format!("quality:{name}"), move |token| {
                    measure_column(&data.columns()[index], &typed[index], token)
                        .map(|q| Finding::Quality(index, q))
                }));
            }
            if column.semantic_type() == SemanticType::Unknown {
                continue;
            }
            {
                let (summarizer, typed) = (Arc::clone(&summarizer), Arc::clone(typed));
                units.push(Unit::new(format!("statistics:{name}"), move |token| {
                    summarizer
                        .summarize(&typed[index], token)
                        .map(|s| Finding::Summary(index, s))
                }));
            }
            if column.semantic_type() == SemanticType::Numeric {
                for method in OUTLIER_METHODS {
                    let (detector, data, typed) =
                        (Arc::clone(&detector), dataset.clone(), Arc::clone(typed));
                    units.push(Unit::new(
                        format!("outliers.{}:{name}", method.as_str()),
                        move |token| {
                            detector
                                .detect(method, &data.columns()[index], &typed[index], token)
                                .map(Finding::Outliers)
                        },
                    ));
                }
            }
        }

        for pair in plan_pairs(&types) {
            let (analyzer, typed) = (Arc::clone(&analyzer), Arc::clone(typed));
            let id = format!("relationship:{}|{}", typed[pair.a].name, typed[pair.b].name);
            units.push(Unit::new(id, move |token| {
                analyzer
                    .analyze(pair.kind, &typed[pair.a], &typed[pair.b], token)
                    .map(Finding::Relationship)
            }));
        }

        if let Some(time) = types.iter().position(|t| *t == SemanticType::Datetime) {
            for (value, _) in types
                .iter()
                .enumerate()
                .filter(|(_, t)| **t == SemanticType::Numeric)
            {
                let (decomposer, typed) = (Arc::clone(&decomposer), Arc::clone(typed));
                let id = format!("decomposition:{}|{}", typed[time].name, typed[value].name);
                units.push(Unit::new(id, move |token| {
                    decomposer
                        .decompose(&typed[time], &typed[value], token)
                        .map(Finding::Decomposition)
                }));
            }
        }

        let data = dataset.clone();
        units.push(Unit::new("quality:duplicates".to_string(), move |token| {
            duplicates.detect(&data, &types, token).map(Finding::Duplicates)
        }));

        debug!(units = units.len(), "Planned analysis units");
        units
    }

    /// Runs every unit of a phase and waits for all of them. Outcomes keep plan order.
    async fn run_phase<T: Send + 'static>(
        &self,
        units: Vec<Unit<T>>,
        semaphore: &Arc<Semaphore>,
        span: (f64, f64),
    ) -> Vec<UnitOutcome<T>> {
        let total = units.len().max(1) as f64;
        let done = AtomicUsize::new(0);
        let pending = units.into_iter().map(|unit| {
            let done = &done;
            async move {
                let outcome = self.execute(unit, semaphore).await;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = &self.on_progress {
                    callback(span.0 + (span.1 - span.0) * finished as f64 / total);
                }
                outcome
            }
        });
        futures::future::join_all(pending).await
    }

    async fn execute<T: Send + 'static>(
        &self,
        unit: Unit<T>,
        semaphore: &Arc<Semaphore>,
    ) -> UnitOutcome<T> {
        let Unit { id, work } = unit;
        let cancelled = |id| UnitOutcome {
            id,
            result: Err(EngineError::Cancelled { completed_units: 0 }),
        };
        if self.token.is_cancelled() {
            return cancelled(id);
        }
        let permit = match Arc::clone(semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return UnitOutcome {
                    id,
                    result: Err(EngineError::internal("unit scheduler closed")),
                }
            }
        };
        if self.token.is_cancelled() {
            return cancelled(id);
        }

        let unit_token = self.token.child();
        let worker_token = unit_token.clone();
        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work(&worker_token)
        });

        let result = match self.config.per_unit_timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await {
                    Ok(joined) => flatten(joined),
                    Err(_) => {
                        // stops the worker at its next cancellation check
                        unit_token.cancel();
                        Err(EngineError::UnitTimeout {
                            unit: id.clone(),
                            timeout_ms,
                        })
                    }
                }
            }
            None => flatten(handle.await),
        };

        log_unit!(
            self.config.log,
            unit = %id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Unit finished"
        );
        UnitOutcome { id, result }
    }

    fn record_skip(&self, diagnostics: &mut Vec<Diagnostic>, unit: String, err: EngineError) {
        let message = truncate_field(&err.to_string(), self.config.log.max_field_length);
        if err.is_fatal() {
            warn!(unit = %unit, error = %message, "Unit failed");
        } else {
            debug!(unit = %unit, reason = %message, "Unit skipped");
        }
        diagnostics.push(Diagnostic {
            unit,
            reason: err.into(),
        });
    }
}

fn flatten<T>(joined: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    joined.map_err(|e| EngineError::internal(format!("unit worker failed: {e}")))?
}

/// Completeness figures for a column whose quality unit did not finish.
fn quality_from_inference(column: &Column, typed: &TypedColumn) -> ColumnQuality {
    let non_missing = column.non_missing_count();
    let completeness = if column.is_empty() {
        0.0
    } else {
        non_missing as f64 / column.len() as f64
    };
    let distinct_count = typed.inference.distinct.min(non_missing);
    ColumnQuality {
        non_missing,
        completeness,
        missing_ratio: 1.0 - completeness,
        distinct_count,
        distinctness: (non_missing > 0).then(|| distinct_count as f64 / non_missing as f64),
    }
}
