//! Streaming reader over a delimited source dataset.

use crate::{CancelFlag, ColumnLayout, Result, SourceError, ValuePolicy};
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tilecheck_geo::{round_to_tenth, BoundingBox};
use tracing::debug;

/// Where a source point came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// 1-based line number in the file.
    pub line: u64,
    /// The row as read, fields re-joined with the delimiter.
    pub raw: String,
}

/// One observation from the source dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePoint {
    /// Longitude as read.
    pub lon: f64,
    /// Latitude as read.
    pub lat: f64,
    names: Arc<[String]>,
    values: Vec<f64>,
    /// Origin of the point.
    pub record: SourceRecord,
}

impl SourcePoint {
    /// Longitude rounded to one decimal, the bucketing precision.
    pub fn rounded_lon(&self) -> f64 {
        round_to_tenth(self.lon)
    }

    /// Latitude rounded to one decimal, the bucketing precision.
    pub fn rounded_lat(&self) -> f64 {
        round_to_tenth(self.lat)
    }

    /// Coerced attribute values, in layout order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named attribute.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// `(name, value)` pairs in layout order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

/// Options controlling how rows are read and coerced.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Coercion applied to every attribute value.
    pub policy: ValuePolicy,
    /// Skip the first row.
    pub has_headers: bool,
    /// Field delimiter.
    pub delimiter: u8,
    /// Checked before each row; a set flag ends the read with
    /// [`SourceError::Cancelled`].
    pub cancel: Option<CancelFlag>,
}

impl ReadOptions {
    /// Comma-delimited with a header row.
    pub fn new(policy: ValuePolicy) -> Self {
        Self {
            policy,
            has_headers: true,
            delimiter: b',',
            cancel: None,
        }
    }

    /// Attach a cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Single-pass iterator of [`SourcePoint`]s inside a bounding box.
///
/// Rows outside the box are dropped before any attribute is parsed. The
/// first error is yielded once and ends the iteration; there is no
/// skip-and-continue mode.
pub struct SourceReader<R = File> {
    reader: csv::Reader<R>,
    record: StringRecord,
    bbox: BoundingBox,
    layout: ColumnLayout,
    names: Arc<[String]>,
    options: ReadOptions,
    rows_read: u64,
    rows_kept: u64,
    done: bool,
}

impl SourceReader<File> {
    /// Open a dataset file. Each call opens an independent handle.
    pub fn open(path: impl AsRef<Path>, bbox: BoundingBox, layout: &ColumnLayout, options: ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Reading source points from {} within {}", path.display(), bbox);
        Self::from_reader(file, bbox, layout, options)
    }
}

impl<R: Read> SourceReader<R> {
    /// Read from any byte source.
    pub fn from_reader(rdr: R, bbox: BoundingBox, layout: &ColumnLayout, options: ReadOptions) -> Result<Self> {
        layout.validate()?;

        let reader = csv::ReaderBuilder::new()
            .has_headers(options.has_headers)
            .delimiter(options.delimiter)
            .flexible(true)
            .from_reader(rdr);

        Ok(Self {
            reader,
            record: StringRecord::new(),
            bbox,
            names: layout.attribute_names().into(),
            layout: layout.clone(),
            options,
            rows_read: 0,
            rows_kept: 0,
            done: false,
        })
    }

    /// Data rows read so far, including rows outside the box.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Rows yielded so far.
    pub fn rows_kept(&self) -> u64 {
        self.rows_kept
    }

    fn fail(&mut self, err: SourceError) -> Option<Result<SourcePoint>> {
        self.done = true;
        Some(Err(err))
    }

    fn raw_row(&self) -> String {
        let delimiter = (self.options.delimiter as char).to_string();
        self.record.iter().collect::<Vec<_>>().join(&delimiter)
    }

    fn row_error(&self, line: u64, reason: impl Into<String>) -> SourceError {
        SourceError::RowParse {
            line,
            raw: self.raw_row(),
            reason: reason.into(),
        }
    }

    fn field(&self, line: u64, column: usize) -> Result<&str> {
        self.record.get(column).ok_or_else(|| {
            self.row_error(
                line,
                format!("column {} missing, row has {} fields", column, self.record.len()),
            )
        })
    }

    fn coordinates(&self, line: u64) -> Result<(f64, f64)> {
        let (lon, lat) = if self.layout.is_combined() {
            let cell = self.field(line, self.layout.lon)?;
            parse_combined(cell).ok_or_else(|| self.row_error(line, format!("'{}' is not a (lon,lat) pair", cell)))?
        } else {
            let lon_cell = self.field(line, self.layout.lon)?;
            let lat_cell = self.field(line, self.layout.lat)?;
            let lon = parse_number(lon_cell)
                .ok_or_else(|| self.row_error(line, format!("longitude '{}' is not a number", lon_cell)))?;
            let lat = parse_number(lat_cell)
                .ok_or_else(|| self.row_error(line, format!("latitude '{}' is not a number", lat_cell)))?;
            (lon, lat)
        };

        if !lon.is_finite() || !lat.is_finite() {
            return Err(self.row_error(line, "non-finite coordinate"));
        }
        Ok((lon, lat))
    }

    fn attribute_values(&self, line: u64) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(self.layout.attributes.len());
        for attribute in &self.layout.attributes {
            let cell = self.field(line, attribute.column)?.trim();
            // Empty cell: missing data
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                let parsed = parse_number(cell).ok_or_else(|| {
                    self.row_error(line, format!("attribute '{}' value '{}' is not a number", attribute.name, cell))
                })?;
                self.options.policy.apply(parsed)
            };
            values.push(value);
        }
        Ok(values)
    }
}

impl<R: Read> Iterator for SourceReader<R> {
    type Item = Result<SourcePoint>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.options.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                debug!("Source read cancelled after {} rows", self.rows_read);
                return self.fail(SourceError::Cancelled);
            }

            match self.reader.read_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    debug!(
                        "Source read complete: {} rows, {} inside {}",
                        self.rows_read, self.rows_kept, self.bbox
                    );
                    return None;
                }
                Err(e) => return self.fail(e.into()),
            }
            self.rows_read += 1;

            let line = self
                .record
                .position()
                .map(|p| p.line())
                .unwrap_or(self.rows_read);

            let (lon, lat) = match self.coordinates(line) {
                Ok(c) => c,
                Err(e) => return self.fail(e),
            };
            if !self.bbox.contains(lon, lat) {
                continue;
            }

            let values = match self.attribute_values(line) {
                Ok(v) => v,
                Err(e) => return self.fail(e),
            };

            self.rows_kept += 1;
            return Some(Ok(SourcePoint {
                lon,
                lat,
                names: Arc::clone(&self.names),
                values,
                record: SourceRecord {
                    line,
                    raw: self.raw_row(),
                },
            }));
        }
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

/// Parse `(lon,lat)`, tolerating surrounding whitespace.
fn parse_combined(cell: &str) -> Option<(f64, f64)> {
    let inner = cell.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split(',');
    let lon = parse_number(parts.next()?)?;
    let lat = parse_number(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((lon, lat))
}
