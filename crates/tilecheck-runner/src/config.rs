//! YAML configuration for validation batches.
//!
//! ```yaml
//! tiles_dir: ./tiles
//! jobs: 4
//! datasets:
//!   - name: heat
//!     csv_path: data/heat.csv
//!     columns: { lon: 0, lat: 1 }
//!     attributes:
//!       - { name: data_1c_mid, column: 2 }
//!     unit: "°C"
//!     tileset: heat
//!     tiles: [[6, 33, 28]]
//!     strategy: aggregate
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use crate::{Result, RunError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tilecheck_mvt::QueryOptions;
use tilecheck_source::{AttributeColumn, ColumnLayout, DatasetUnit, ReadOptions, ValuePolicy};
use tilecheck_validate::{Strategy, DEFAULT_PROGRESS_EVERY};

fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_jobs() -> usize {
    1
}

fn default_tiles_dir() -> PathBuf {
    PathBuf::from("tiles")
}

fn default_progress_every() -> usize {
    DEFAULT_PROGRESS_EVERY
}

/// Top-level configuration: where tiles live and which datasets to check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Directory holding `{tileset}-{z}-{x}-{y}.mvt` files.
    #[serde(default = "default_tiles_dir")]
    pub tiles_dir: PathBuf,
    /// Number of tiles validated concurrently.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Datasets to validate, in order.
    pub datasets: Vec<DatasetConfig>,
}

/// Longitude and latitude columns. Equal indices select one combined
/// `(lon,lat)` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinateColumns {
    /// Longitude column.
    pub lon: usize,
    /// Latitude column.
    pub lat: usize,
}

/// Point Query Comparison settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointQuerySettings {
    /// Per-lookup options (`radius`, `limit`, `geometry`, `dedupe`).
    #[serde(flatten)]
    pub query: QueryOptions,
    /// Spread lookups over the rayon pool.
    #[serde(default)]
    pub parallel: bool,
}

/// One source dataset and the tiles built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Dataset name, used in logs, reports and `--dataset`.
    pub name: String,
    /// Delimited text file with one observation per row.
    pub csv_path: PathBuf,
    /// The first row is a header.
    #[serde(default = "default_true")]
    pub has_headers: bool,
    /// Field delimiter (a single ASCII character).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Coordinate columns.
    pub columns: CoordinateColumns,
    /// Attribute columns, in comparison order.
    pub attributes: Vec<AttributeColumn>,
    /// Unit of the attribute values.
    pub unit: DatasetUnit,
    /// Overrides the unit's default coercion.
    #[serde(default)]
    pub value_policy: Option<ValuePolicy>,
    /// Tile file prefix.
    pub tileset: String,
    /// Layers to decode. Empty decodes all layers.
    #[serde(default)]
    pub layers: Vec<String>,
    /// Tiles to validate as `[z, x, y]`. Checked per tile at run time.
    #[serde(default)]
    pub tiles: Vec<[u32; 3]>,
    /// Validation strategy.
    #[serde(default)]
    pub strategy: Strategy,
    /// Restrict tile points to longitudes the source covers.
    #[serde(default = "default_true")]
    pub co_filter: bool,
    /// Point Query Comparison settings.
    #[serde(default)]
    pub point_query: PointQuerySettings,
    /// Points between progress log lines during Point Query Comparison.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl DatasetConfig {
    /// Column layout for the source reader.
    pub fn layout(&self) -> ColumnLayout {
        ColumnLayout {
            lon: self.columns.lon,
            lat: self.columns.lat,
            attributes: self.attributes.clone(),
        }
    }

    /// Value policy in effect: the override, or the unit's default.
    pub fn policy(&self) -> ValuePolicy {
        self.value_policy.unwrap_or_else(|| self.unit.default_policy())
    }

    /// Attribute names in comparison order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }

    /// Reader options derived from this dataset.
    pub fn read_options(&self) -> ReadOptions {
        let mut options = ReadOptions::new(self.policy());
        options.has_headers = self.has_headers;
        // validate() guarantees an ASCII delimiter
        options.delimiter = u8::try_from(self.delimiter).unwrap_or(b',');
        options
    }

    /// Check the dataset for internal consistency.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(RunError::Config(format!("dataset '{}': {}", self.name, msg)));

        if self.name.trim().is_empty() {
            return Err(RunError::Config("dataset with an empty name".to_string()));
        }
        if self.tileset.trim().is_empty() {
            return fail("tileset must not be empty".to_string());
        }
        if !self.delimiter.is_ascii() {
            return fail(format!("delimiter '{}' is not a single-byte character", self.delimiter));
        }
        if let Err(e) = self.layout().validate() {
            return fail(e.to_string());
        }
        let query = &self.point_query.query;
        if !query.radius.is_finite() || query.radius < 0.0 {
            return fail(format!("point_query.radius must be non-negative, got {}", query.radius));
        }
        if query.limit == 0 {
            return fail("point_query.limit must be at least 1".to_string());
        }
        if self.progress_every == 0 {
            return fail("progress_every must be at least 1".to_string());
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.csv_path.is_relative() {
            self.csv_path = base.join(&self.csv_path);
        }
    }
}

impl ValidationConfig {
    /// Parse and validate a YAML document. Relative paths are kept as given.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, resolving relative paths against its
    /// directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| RunError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&yaml)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Check every dataset, and that names are unique.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(RunError::Config("jobs must be at least 1".to_string()));
        }
        if self.datasets.is_empty() {
            return Err(RunError::Config("no datasets configured".to_string()));
        }
        for (i, dataset) in self.datasets.iter().enumerate() {
            dataset.validate()?;
            if self.datasets[..i].iter().any(|d| d.name == dataset.name) {
                return Err(RunError::Config(format!("dataset '{}' configured twice", dataset.name)));
            }
        }
        Ok(())
    }

    /// Look up a dataset by name.
    pub fn dataset(&self, name: &str) -> Result<&DatasetConfig> {
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| RunError::UnknownDataset(name.to_string()))
    }

    /// Drop every dataset except `name`.
    pub fn retain_dataset(&mut self, name: &str) -> Result<()> {
        self.dataset(name)?;
        self.datasets.retain(|d| d.name == name);
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.tiles_dir.is_relative() {
            self.tiles_dir = base.join(&self.tiles_dir);
        }
        for dataset in &mut self.datasets {
            dataset.resolve_paths(base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecheck_mvt::GeometryKind;

    const MINIMAL: &str = r#"
datasets:
  - name: heat
    csv_path: heat.csv
    columns: { lon: 0, lat: 1 }
    attributes:
      - { name: data_1c_mid, column: 2 }
    unit: "°C"
    tileset: heat
    tiles: [[6, 33, 28]]
"#;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.jobs, 1);
        assert_eq!(config.tiles_dir, PathBuf::from("tiles"));

        let dataset = &config.datasets[0];
        assert!(dataset.has_headers);
        assert_eq!(dataset.delimiter, ',');
        assert!(dataset.co_filter);
        assert_eq!(dataset.strategy, Strategy::AggregateComparison);
        assert_eq!(dataset.policy(), ValuePolicy::Floor);
        assert_eq!(dataset.point_query.query, QueryOptions::default());
        assert!(!dataset.point_query.parallel);
        assert_eq!(dataset.progress_every, DEFAULT_PROGRESS_EVERY);
        assert_eq!(dataset.tiles, vec![[6, 33, 28]]);
        assert_eq!(dataset.attribute_names(), vec!["data_1c_mid".to_string()]);
    }

    #[test]
    fn test_full_dataset() {
        let yaml = r#"
tiles_dir: /srv/tiles
jobs: 3
datasets:
  - name: zscore
    csv_path: /data/z.tsv
    has_headers: false
    delimiter: "\t"
    columns: { lon: 4, lat: 4 }
    attributes:
      - { name: a, column: 0 }
      - { name: b, column: 1 }
    unit: z-score
    value_policy: floor-of-one-decimal
    tileset: z
    layers: [data]
    strategy: point-query
    co_filter: false
    point_query:
      radius: 0.05
      limit: 2
      geometry: point
      dedupe: false
      parallel: true
    progress_every: 10
"#;
        let config = ValidationConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.jobs, 3);
        let dataset = &config.datasets[0];
        assert_eq!(dataset.read_options().delimiter, b'\t');
        assert!(!dataset.read_options().has_headers);
        assert!(dataset.layout().is_combined());
        assert_eq!(dataset.policy(), ValuePolicy::FloorOfOneDecimal);
        assert_eq!(dataset.strategy, Strategy::PointQueryComparison);
        assert_eq!(dataset.point_query.query.radius, 0.05);
        assert_eq!(dataset.point_query.query.limit, 2);
        assert_eq!(dataset.point_query.query.geometry, Some(GeometryKind::Point));
        assert!(!dataset.point_query.query.dedupe);
        assert!(dataset.point_query.parallel);
        assert!(dataset.tiles.is_empty());
    }

    #[test]
    fn test_invalid_tiles_are_accepted_at_load() {
        let yaml = MINIMAL.replace("[[6, 33, 28]]", "[[6, 99, 28], [40, 0, 0]]");
        let config = ValidationConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.datasets[0].tiles.len(), 2);
    }

    #[test]
    fn test_rejects_inconsistent_datasets() {
        let cases = [
            MINIMAL.replace("column: 2", "column: 1"),
            MINIMAL.replace("tiles:", "point_query: { radius: -1.0 }\n    tiles:"),
            MINIMAL.replace("tiles:", "point_query: { limit: 0 }\n    tiles:"),
            MINIMAL.replace(
                "- { name: data_1c_mid, column: 2 }",
                "- { name: v, column: 2 }\n      - { name: v, column: 3 }",
            ),
            MINIMAL.replace("attributes:\n      - { name: data_1c_mid, column: 2 }", "attributes: []"),
            MINIMAL.replace("tiles:", "delimiter: \"§\"\n    tiles:"),
            MINIMAL.replace("datasets:", "jobs: 0\ndatasets:"),
        ];
        for yaml in &cases {
            assert!(
                matches!(ValidationConfig::from_yaml_str(yaml), Err(RunError::Config(_))),
                "accepted:\n{}",
                yaml
            );
        }
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let yaml = MINIMAL.replace("tileset: heat", "tileset: heat\n    colour: red");
        assert!(matches!(
            ValidationConfig::from_yaml_str(&yaml),
            Err(RunError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_duplicate_dataset_names() {
        let yaml = format!("{}{}", MINIMAL, MINIMAL.replace("datasets:\n", ""));
        assert!(matches!(ValidationConfig::from_yaml_str(&yaml), Err(RunError::Config(_))));
    }

    #[test]
    fn test_retain_dataset() {
        let mut config = ValidationConfig::from_yaml_str(MINIMAL).unwrap();
        assert!(matches!(
            config.retain_dataset("rain"),
            Err(RunError::UnknownDataset(name)) if name == "rain"
        ));
        config.retain_dataset("heat").unwrap();
        assert_eq!(config.datasets.len(), 1);
    }

    #[test]
    fn test_relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("check.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = ValidationConfig::from_file(&path).unwrap();
        assert_eq!(config.tiles_dir, dir.path().join("tiles"));
        assert_eq!(config.datasets[0].csv_path, dir.path().join("heat.csv"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ValidationConfig::from_file("/nonexistent/check.yaml"),
            Err(RunError::ConfigIo { .. })
        ));
    }
}
