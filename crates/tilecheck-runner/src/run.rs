//! Batch validation of configured tiles.
//!
//! For each tile the source file is streamed and the tile is fetched and
//! decoded at the same time (`rayon::join`); the configured strategy then
//! runs on both point sets. Tiles of a dataset are spread over a rayon pool
//! of `jobs` threads and reported in configuration order.
//!
//! Errors confined to one tile (bad address, missing or corrupt tile) are
//! recorded in that tile's outcome and the batch moves on. Source read
//! errors and cancellation abort the batch.

use crate::{DatasetConfig, Result, RunError, TileError, TileProvider, ValidationConfig};
use rayon::prelude::*;
use serde_json::{json, Value};
use tilecheck_geo::{tile_bounding_box, BoundingBox, TileAddress};
use tilecheck_mvt::{TileFeature, TileIndex, VectorTileDecoder};
use tilecheck_source::{CancelFlag, SourceError, SourcePoint, SourceReader};
use tilecheck_validate::{
    aggregate_comparison, point_query_comparison, PointQueryOptions, Progress, ReportBuilder, Strategy,
    ValidateError, ValidationResult, Verdict,
};
use tracing::{info, warn};

/// What happened to one tile.
#[derive(Debug)]
pub enum TileStatus {
    /// The comparison ran.
    Validated(ValidationResult),
    /// The tile could not be validated.
    Errored(TileError),
}

/// Outcome of validating one tile of one dataset.
#[derive(Debug)]
pub struct TileOutcome {
    /// Dataset name.
    pub dataset: String,
    /// Tile as configured, `[z, x, y]`.
    pub tile: [u32; 3],
    /// `{tileset}-{z}-{x}-{y}`.
    pub label: String,
    /// Result or error.
    pub status: TileStatus,
}

impl TileOutcome {
    /// Verdict of a validated tile.
    pub fn verdict(&self) -> Option<Verdict> {
        match &self.status {
            TileStatus::Validated(result) => Some(result.verdict()),
            TileStatus::Errored(_) => None,
        }
    }

    /// True when the tile failed validation or could not be validated.
    pub fn is_failure(&self) -> bool {
        match &self.status {
            TileStatus::Validated(result) => result.verdict() == Verdict::Fail,
            TileStatus::Errored(_) => true,
        }
    }

    /// Human-readable report.
    pub fn text(&self, max_listed: Option<usize>) -> String {
        match &self.status {
            TileStatus::Validated(result) => {
                let mut builder = ReportBuilder::new(self.label.as_str());
                if let Some(n) = max_listed {
                    builder = builder.max_listed(n);
                }
                builder.text(result)
            }
            TileStatus::Errored(err) => format!("{}: ERROR: {}\n", self.label, err),
        }
    }

    /// JSON report, tagged with the dataset and tile.
    pub fn json_value(&self) -> serde_json::Result<Value> {
        let mut value = match &self.status {
            TileStatus::Validated(result) => ReportBuilder::new(self.label.as_str()).json_value(result)?,
            TileStatus::Errored(err) => json!({
                "label": self.label,
                "verdict": "error",
                "error": err.to_string(),
            }),
        };
        if let Value::Object(map) = &mut value {
            map.insert("dataset".to_string(), json!(self.dataset));
            map.insert("tile".to_string(), json!(self.tile));
        }
        Ok(value)
    }
}

/// Outcomes for one dataset, in configuration order.
#[derive(Debug)]
pub struct DatasetReport {
    /// Dataset name.
    pub dataset: String,
    /// One outcome per configured tile.
    pub tiles: Vec<TileOutcome>,
}

/// Outcomes of a whole batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One report per dataset, in configuration order.
    pub datasets: Vec<DatasetReport>,
}

impl BatchReport {
    /// Every tile outcome, dataset by dataset.
    pub fn tiles(&self) -> impl Iterator<Item = &TileOutcome> + '_ {
        self.datasets.iter().flat_map(|d| d.tiles.iter())
    }

    /// True when any tile failed validation or errored.
    pub fn any_failed(&self) -> bool {
        self.tiles().any(TileOutcome::is_failure)
    }

    /// Number of tiles with the given verdict.
    pub fn count(&self, verdict: Verdict) -> usize {
        self.tiles().filter(|t| t.verdict() == Some(verdict)).count()
    }

    /// Number of tiles that could not be validated.
    pub fn errored(&self) -> usize {
        self.tiles().filter(|t| t.verdict().is_none()).count()
    }

    /// JSON document with every tile report.
    pub fn json_value(&self) -> serde_json::Result<Value> {
        let tiles = self.tiles().map(TileOutcome::json_value).collect::<serde_json::Result<Vec<_>>>()?;
        Ok(json!({
            "passed": self.count(Verdict::Pass),
            "failed": self.count(Verdict::Fail),
            "inconclusive": self.count(Verdict::Inconclusive),
            "errored": self.errored(),
            "tiles": tiles,
        }))
    }
}

/// Called as each tile finishes, from the worker that ran it.
pub type TileCallback = Box<dyn Fn(&TileOutcome) + Send + Sync>;

/// Validates configured datasets tile by tile.
pub struct Runner<P> {
    provider: P,
    jobs: usize,
    cancel: CancelFlag,
    on_tile: Option<TileCallback>,
}

impl<P: TileProvider> Runner<P> {
    /// Runner fetching tiles from `provider`, one tile at a time.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            jobs: 1,
            cancel: CancelFlag::new(),
            on_tile: None,
        }
    }

    /// Validate up to `jobs` tiles concurrently.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register a callback invoked as each tile finishes.
    pub fn on_tile(mut self, callback: TileCallback) -> Self {
        self.on_tile = Some(callback);
        self
    }

    /// The runner's cancellation flag.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Validate every dataset of `config`, in order.
    pub fn run(&self, config: &ValidationConfig) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for dataset in &config.datasets {
            report.datasets.push(self.run_dataset(dataset)?);
        }
        info!(
            "Batch finished: {} passed, {} failed, {} inconclusive, {} errored",
            report.count(Verdict::Pass),
            report.count(Verdict::Fail),
            report.count(Verdict::Inconclusive),
            report.errored()
        );
        Ok(report)
    }

    /// Validate every tile of one dataset.
    pub fn run_dataset(&self, dataset: &DatasetConfig) -> Result<DatasetReport> {
        info!(
            "Validating dataset '{}': {} tiles, {} strategy, {} jobs",
            dataset.name,
            dataset.tiles.len(),
            dataset.strategy,
            self.jobs
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| RunError::ThreadPool(e.to_string()))?;

        let tiles = pool.install(|| {
            dataset
                .tiles
                .par_iter()
                .map(|tile| {
                    if self.cancel.is_cancelled() {
                        return Err(RunError::Cancelled);
                    }
                    let outcome = self.validate_tile(dataset, *tile)?;
                    if let Some(callback) = &self.on_tile {
                        callback(&outcome);
                    }
                    Ok(outcome)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(DatasetReport {
            dataset: dataset.name.clone(),
            tiles,
        })
    }

    /// Validate one tile of a dataset.
    ///
    /// Tile-local problems are returned inside the outcome; only source
    /// errors and cancellation are returned as `Err`.
    pub fn validate_tile(&self, dataset: &DatasetConfig, tile: [u32; 3]) -> Result<TileOutcome> {
        let [z, x, y] = tile;
        let label = format!("{}-{}-{}-{}", dataset.tileset, z, x, y);
        let outcome = |status: TileStatus| TileOutcome {
            dataset: dataset.name.clone(),
            tile,
            label: label.clone(),
            status,
        };

        let address = match TileAddress::try_from(tile) {
            Ok(address) => address,
            Err(e) => {
                warn!("{}: {}", label, e);
                return Ok(outcome(TileStatus::Errored(e.into())));
            }
        };
        let bbox = tile_bounding_box(&address);

        info!("{}: reading source data and tile", label);
        let (source, features) = rayon::join(
            || self.read_source(dataset, bbox),
            || self.load_features(dataset, &address, &bbox),
        );
        let source = source?;
        let features = match features {
            Ok(features) => features,
            Err(e) => {
                warn!("{}: {}", label, e);
                return Ok(outcome(TileStatus::Errored(e)));
            }
        };
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        info!(
            "{}: {} source points, {} tile features, running {} comparison",
            label,
            source.len(),
            features.len(),
            dataset.strategy
        );

        let attributes = dataset.attribute_names();
        let result = match dataset.strategy {
            Strategy::AggregateComparison => aggregate_comparison(&source, &features, &attributes, dataset.co_filter),
            Strategy::PointQueryComparison => {
                let index = TileIndex::new(features);
                let progress_label = label.clone();
                let options = PointQueryOptions {
                    query: dataset.point_query.query.clone(),
                    progress_every: dataset.progress_every,
                    parallel: dataset.point_query.parallel,
                    progress: Some(Box::new(move |p: Progress| {
                        info!("{}: validated {} / {} points", progress_label, p.processed, p.total);
                    })),
                    cancel: Some(self.cancel.clone()),
                };
                point_query_comparison(&source, &index, &attributes, &options).map_err(|e| match e {
                    ValidateError::Cancelled => RunError::Cancelled,
                })?
            }
        };
        info!("{}: {}", label, result.verdict());

        Ok(outcome(TileStatus::Validated(result)))
    }

    fn read_source(&self, dataset: &DatasetConfig, bbox: BoundingBox) -> std::result::Result<Vec<SourcePoint>, SourceError> {
        let options = dataset.read_options().with_cancel(self.cancel.clone());
        SourceReader::open(&dataset.csv_path, bbox, &dataset.layout(), options)?.collect()
    }

    fn load_features(
        &self,
        dataset: &DatasetConfig,
        tile: &TileAddress,
        bbox: &BoundingBox,
    ) -> std::result::Result<Vec<TileFeature>, TileError> {
        let bytes = self.provider.fetch(&dataset.tileset, tile)?;
        let decoder = VectorTileDecoder::with_layers(dataset.layers.iter().cloned());
        let features = match dataset.strategy {
            Strategy::AggregateComparison => decoder.decode(&bytes, tile, bbox)?,
            // Geometry reaching past the tile edge still answers lookups
            Strategy::PointQueryComparison => decoder.decode_all(&bytes, tile)?,
        };
        Ok(features)
    }
}
