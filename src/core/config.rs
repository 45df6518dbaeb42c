use serde::{Deserialize, Serialize};

use super::error::{SpatialError, SpatialResult};

/// Main hyperparameters for a spatial hash engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Number of hash buckets. Fixed at construction, never resized.
    pub table_size: u32,
    /// Side length of one square grid cell, in world units.
    pub cell_size: f32,
    /// Entries reserved per bucket the first time it is touched.
    pub bucket_capacity: usize,
}

impl HashConfig {
    pub fn new(table_size: u32, cell_size: f32) -> Self {
        HashConfig {
            table_size,
            cell_size,
            ..Self::default()
        }
    }

    pub fn with_bucket_capacity(mut self, bucket_capacity: usize) -> Self {
        self.bucket_capacity = bucket_capacity;
        self
    }

    /// Parse a config from JSON. Missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> SpatialResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SpatialError::invalid(format!("malformed config: {}", e)))
    }

    pub fn validate(&self) -> SpatialResult<()> {
        if self.table_size == 0 {
            return Err(SpatialError::invalid("table_size must be non-zero"));
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(SpatialError::invalid(format!(
                "cell_size must be finite and positive, got {}",
                self.cell_size
            )));
        }
        Ok(())
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        HashConfig {
            table_size: 64,
            cell_size: 10.0,
            bucket_capacity: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(HashConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_table_size_is_rejected() {
        let err = HashConfig::new(0, 10.0).validate().unwrap_err();
        assert_eq!(err.status_code(), 1);
    }

    #[test]
    fn bad_cell_size_is_rejected() {
        assert!(HashConfig::new(8, 0.0).validate().is_err());
        assert!(HashConfig::new(8, -2.0).validate().is_err());
        assert!(HashConfig::new(8, f32::NAN).validate().is_err());
        assert!(HashConfig::new(8, f32::INFINITY).validate().is_err());
    }

    #[test]
    fn json_fills_missing_fields() {
        let cfg = HashConfig::from_json(r#"{ "table_size": 16 }"#).unwrap();
        assert_eq!(cfg.table_size, 16);
        assert_eq!(cfg.cell_size, 10.0);
        assert_eq!(cfg.bucket_capacity, 8);

        assert!(HashConfig::from_json("{ not json").is_err());
    }
}
