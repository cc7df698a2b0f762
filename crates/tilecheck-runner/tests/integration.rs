//! Batch runs over temporary directories holding a config, a CSV file and
//! synthetic tiles.

use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tilecheck_geo::{lon_lat_to_tile_pixel, TileAddress, DEFAULT_EXTENT};
use tilecheck_mvt::TileBuilder;
use tilecheck_runner::{
    DirectoryTileProvider, ProviderError, RunError, Runner, TileError, TileOutcome, TileStatus, ValidationConfig,
};
use tilecheck_source::{CancelFlag, SourceError};
use tilecheck_validate::{MismatchKey, Strategy, Verdict};

const ATTRIBUTE: &str = "data_1c_mid";

/// z6 tile holding (10.1, 20.0): 6/33/28.
fn tile() -> TileAddress {
    TileAddress::from_lon_lat(10.1, 20.0, 6).unwrap()
}

fn tile_triple() -> [u32; 3] {
    let t = tile();
    [u32::from(t.z()), t.x(), t.y()]
}

fn square_around(lon: f64, lat: f64, half: i32) -> Vec<(i32, i32)> {
    let (px, py) = lon_lat_to_tile_pixel(DEFAULT_EXTENT, &tile(), lon, lat);
    let (cx, cy) = (px.round() as i32, py.round() as i32);
    vec![
        (cx - half, cy - half),
        (cx + half, cy - half),
        (cx + half, cy + half),
        (cx - half, cy + half),
    ]
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(csv: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("tiles")).unwrap();
        std::fs::write(dir.path().join("heat.csv"), csv).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_tile(&self, address: &TileAddress, bytes: &[u8]) {
        std::fs::write(self.path().join("tiles").join(address.file_name("heat")), bytes).unwrap();
    }

    /// Tile with one feature at (10.1, 20.0) carrying `value`, `half` pixels
    /// on each side.
    fn write_feature_tile(&self, value: f64, half: i32) {
        let bytes = TileBuilder::new()
            .layer("data", DEFAULT_EXTENT)
            .polygon(&square_around(10.1, 20.0, half), &[(ATTRIBUTE, value)])
            .encode_gzip()
            .unwrap();
        self.write_tile(&tile(), &bytes);
    }

    fn config(&self, tiles: &str, strategy: &str) -> ValidationConfig {
        let yaml = format!(
            r#"
datasets:
  - name: heat
    csv_path: heat.csv
    columns: {{ lon: 0, lat: 1 }}
    attributes:
      - {{ name: {}, column: 2 }}
    unit: "°C"
    tileset: heat
    tiles: {}
    strategy: {}
"#,
            ATTRIBUTE, tiles, strategy
        );
        let path = self.path().join("check.yaml");
        std::fs::write(&path, yaml).unwrap();
        ValidationConfig::from_file(&path).unwrap()
    }

    fn runner(&self, config: &ValidationConfig) -> Runner<DirectoryTileProvider> {
        Runner::new(DirectoryTileProvider::new(&config.tiles_dir)).jobs(config.jobs)
    }
}

fn tiles_yaml(tiles: &[[u32; 3]]) -> String {
    let items: Vec<String> = tiles.iter().map(|[z, x, y]| format!("[{}, {}, {}]", z, x, y)).collect();
    format!("[{}]", items.join(", "))
}

fn result(outcome: &TileOutcome) -> &tilecheck_validate::ValidationResult {
    match &outcome.status {
        TileStatus::Validated(result) => result,
        TileStatus::Errored(e) => panic!("{} errored: {}", outcome.label, e),
    }
}

const MATCHING_CSV: &str = "lon,lat,data_1c_mid\n10.05,20.0,5\n10.15,20.0,7\n";

#[test]
fn test_aggregate_batch_passes() {
    let fixture = Fixture::new(MATCHING_CSV);
    fixture.write_feature_tile(6.0, 20);
    let config = fixture.config(&tiles_yaml(&[tile_triple()]), "aggregate");

    let report = fixture.runner(&config).run(&config).unwrap();
    assert_eq!(report.datasets.len(), 1);
    let outcome = &report.datasets[0].tiles[0];
    assert_eq!(outcome.label, "heat-6-33-28");
    assert_eq!(result(outcome).total_units_checked, 1);
    assert_eq!(outcome.verdict(), Some(Verdict::Pass));
    assert!(!report.any_failed());
}

#[test]
fn test_batch_compares_every_attribute() {
    let fixture = Fixture::new("lon,lat,data_1c_mid,data_2c_mid\n10.05,20.0,5,3\n10.15,20.0,7,5\n");
    let bytes = TileBuilder::new()
        .layer("data", DEFAULT_EXTENT)
        .polygon(&square_around(10.1, 20.0, 20), &[(ATTRIBUTE, 6.0), ("data_2c_mid", 5.0)])
        .encode()
        .unwrap();
    fixture.write_tile(&tile(), &bytes);

    let yaml = format!(
        r#"
datasets:
  - name: heat
    csv_path: heat.csv
    columns: {{ lon: 0, lat: 1 }}
    attributes:
      - {{ name: {}, column: 2 }}
      - {{ name: data_2c_mid, column: 3 }}
    unit: "°C"
    tileset: heat
    tiles: {}
"#,
        ATTRIBUTE,
        tiles_yaml(&[tile_triple()])
    );
    let path = fixture.path().join("check.yaml");
    std::fs::write(&path, yaml).unwrap();
    let config = ValidationConfig::from_file(&path).unwrap();

    let report = fixture.runner(&config).run(&config).unwrap();
    let result = result(&report.datasets[0].tiles[0]);
    // The first attribute averages to 6 on both sides; the second is 4 vs 5
    assert_eq!(result.total_units_checked, 1);
    assert_eq!(result.mismatches.len(), 1);
    assert_eq!(result.mismatches[0].attribute, "data_2c_mid");
    assert_eq!(result.mismatches[0].source_value, 4.0);
    assert_eq!(result.mismatches[0].tile_value, 5.0);
}

#[test]
fn test_point_query_batch_names_bad_row() {
    let fixture = Fixture::new("lon,lat,data_1c_mid\n10.05,20.0,8\n10.15,20.0,7\n");
    fixture.write_feature_tile(8.0, 100);
    let config = fixture.config(&tiles_yaml(&[tile_triple()]), "point-query");

    let report = fixture.runner(&config).run(&config).unwrap();
    let outcome = &report.datasets[0].tiles[0];
    let result = result(outcome);
    assert_eq!(result.strategy, Strategy::PointQueryComparison);
    assert_eq!(result.failed(), 1);
    assert_eq!(
        result.mismatches[0].key,
        MismatchKey::Row {
            line: 3,
            raw: "10.15,20.0,7".to_string()
        }
    );
    assert!(report.any_failed());
    assert!(outcome.text(None).contains("line 3: 10.15,20.0,7"));
}

#[test]
fn test_tile_errors_are_contained() {
    let fixture = Fixture::new(MATCHING_CSV);
    fixture.write_feature_tile(6.0, 20);
    // 6/33/29 has no file, 6/34/28 is corrupt, 6/99/0 is out of range
    fixture.write_tile(&TileAddress::new(6, 34, 28).unwrap(), &[0x0a, 0xff]);
    let tiles = [[6, 99, 0], [6, 33, 29], [6, 34, 28], tile_triple()];
    let config = fixture.config(&tiles_yaml(&tiles), "aggregate");

    let report = fixture.runner(&config).run(&config).unwrap();
    let outcomes = &report.datasets[0].tiles;
    assert_eq!(outcomes.len(), 4);

    assert!(matches!(outcomes[0].status, TileStatus::Errored(TileError::InvalidTile(_))));
    assert!(matches!(
        outcomes[1].status,
        TileStatus::Errored(TileError::Provider(ProviderError::NotFound { .. }))
    ));
    assert!(matches!(outcomes[2].status, TileStatus::Errored(TileError::Decode(_))));
    assert_eq!(outcomes[3].verdict(), Some(Verdict::Pass));

    assert_eq!(report.errored(), 3);
    assert!(report.any_failed());
    assert!(outcomes[0].text(None).starts_with("heat-6-99-0: ERROR:"));
}

#[test]
fn test_source_error_aborts_batch() {
    let fixture = Fixture::new("lon,lat,data_1c_mid\n10.05,20.0,5\n10.15,20.0,warm\n");
    fixture.write_feature_tile(6.0, 20);
    let config = fixture.config(&tiles_yaml(&[tile_triple()]), "aggregate");

    match fixture.runner(&config).run(&config) {
        Err(RunError::Source(SourceError::RowParse { line, .. })) => assert_eq!(line, 3),
        other => panic!("expected a row parse error, got {:?}", other.map(|r| r.errored())),
    }
}

#[test]
fn test_missing_source_file_aborts_batch() {
    let fixture = Fixture::new(MATCHING_CSV);
    fixture.write_feature_tile(6.0, 20);
    let config = fixture.config(&tiles_yaml(&[tile_triple()]), "aggregate");
    std::fs::remove_file(fixture.path().join("heat.csv")).unwrap();

    assert!(matches!(
        fixture.runner(&config).run(&config),
        Err(RunError::Source(SourceError::Io { .. }))
    ));
}

#[test]
fn test_cancelled_run_returns_no_result() {
    let fixture = Fixture::new(MATCHING_CSV);
    fixture.write_feature_tile(6.0, 20);
    let config = fixture.config(&tiles_yaml(&[tile_triple()]), "aggregate");

    let cancel = CancelFlag::new();
    cancel.cancel();
    let runner = fixture.runner(&config).with_cancel(cancel);
    assert!(matches!(runner.run(&config), Err(RunError::Cancelled)));
}

#[test]
fn test_parallel_batch_keeps_config_order() {
    let fixture = Fixture::new(MATCHING_CSV);
    fixture.write_feature_tile(6.0, 20);
    let mut tiles = vec![tile_triple()];
    tiles.extend((0..6).map(|y| [6, 40, y]));
    let mut config = fixture.config(&tiles_yaml(&tiles), "aggregate");
    config.jobs = 4;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let runner = fixture.runner(&config).on_tile(Box::new(move |outcome: &TileOutcome| {
        sink.lock().unwrap().push(outcome.label.clone());
    }));
    let report = runner.run(&config).unwrap();

    let labels: Vec<&str> = report.tiles().map(|t| t.label.as_str()).collect();
    let expected: Vec<String> = tiles
        .iter()
        .map(|[z, x, y]| format!("heat-{}-{}-{}", z, x, y))
        .collect();
    assert_eq!(labels, expected);
    assert_eq!(seen.lock().unwrap().len(), tiles.len());
}

#[test]
fn test_json_report() {
    let fixture = Fixture::new(MATCHING_CSV);
    fixture.write_feature_tile(5.0, 20);
    let config = fixture.config(&tiles_yaml(&[tile_triple(), [6, 0, 0]]), "aggregate");

    let report = fixture.runner(&config).run(&config).unwrap();
    let value = report.json_value().unwrap();
    assert_eq!(value["failed"], 1);
    assert_eq!(value["errored"], 1);
    assert_eq!(value["tiles"][0]["dataset"], "heat");
    assert_eq!(value["tiles"][0]["verdict"], "fail");
    assert_eq!(value["tiles"][0]["mismatches"][0]["key"]["lat"], 20.0);
    assert_eq!(value["tiles"][1]["tile"], serde_json::json!([6, 0, 0]));
    assert_eq!(value["tiles"][1]["verdict"], "error");
}
