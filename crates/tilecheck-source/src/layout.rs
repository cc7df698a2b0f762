//! Column layout of a source dataset.

use crate::{Result, SourceError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named attribute and the column holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeColumn {
    /// Attribute name, matching the tile property name.
    pub name: String,
    /// Zero-based column index.
    pub column: usize,
}

/// Which columns hold the coordinates and each attribute.
///
/// When `lon == lat` the coordinates are read from a single column formatted
/// as `(lon,lat)`; otherwise from two plain numeric columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Longitude column.
    pub lon: usize,
    /// Latitude column.
    pub lat: usize,
    /// Attribute columns, in comparison order.
    #[serde(default)]
    pub attributes: Vec<AttributeColumn>,
}

impl ColumnLayout {
    /// Layout with separate longitude and latitude columns.
    pub fn new(lon: usize, lat: usize) -> Self {
        Self {
            lon,
            lat,
            attributes: Vec::new(),
        }
    }

    /// Layout with both coordinates in one `(lon,lat)` column.
    pub fn combined(column: usize) -> Self {
        Self::new(column, column)
    }

    /// Add an attribute column.
    pub fn with_attribute(mut self, name: impl Into<String>, column: usize) -> Self {
        self.attributes.push(AttributeColumn {
            name: name.into(),
            column,
        });
        self
    }

    /// True when both coordinates share one column.
    pub fn is_combined(&self) -> bool {
        self.lon == self.lat
    }

    /// Attribute names in layout order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }

    /// Highest column index the layout reads.
    pub fn max_column(&self) -> usize {
        self.attributes
            .iter()
            .map(|a| a.column)
            .chain([self.lon, self.lat])
            .max()
            .unwrap_or(0)
    }

    /// Check the layout for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.attributes.is_empty() {
            return Err(SourceError::InvalidLayout("no attribute columns configured".to_string()));
        }

        let mut names = HashSet::new();
        for attribute in &self.attributes {
            if attribute.name.trim().is_empty() {
                return Err(SourceError::InvalidLayout("attribute with an empty name".to_string()));
            }
            if !names.insert(attribute.name.as_str()) {
                return Err(SourceError::InvalidLayout(format!(
                    "attribute '{}' configured twice",
                    attribute.name
                )));
            }
            if attribute.column == self.lon || attribute.column == self.lat {
                return Err(SourceError::InvalidLayout(format!(
                    "attribute '{}' reads coordinate column {}",
                    attribute.name, attribute.column
                )));
            }
        }
        Ok(())
    }
}
