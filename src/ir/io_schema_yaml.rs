//! YAML persistence for the category schema registry.
//!
//! ```yaml
//! categories:
//!   - name: person
//!     keypoints: [nose, left_eye, right_eye]
//!   - name: class_1
//!     keypoints: [kp0]
//! ```

use std::fs;
use std::path::Path;

use super::registry::CategoryRegistry;
use crate::error::KplabelError;

/// Read a category schema from a YAML file.
pub fn read_schema_yaml(path: &Path) -> Result<CategoryRegistry, KplabelError> {
    let data = fs::read_to_string(path).map_err(|source| KplabelError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    from_schema_yaml_str(&data).map_err(|source| KplabelError::SchemaParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a category schema from a YAML string.
pub fn from_schema_yaml_str(data: &str) -> Result<CategoryRegistry, serde_yaml::Error> {
    if data.trim().is_empty() {
        return Ok(CategoryRegistry::new());
    }
    serde_yaml::from_str(data)
}

/// Write a category schema to a YAML file.
pub fn write_schema_yaml(path: &Path, registry: &CategoryRegistry) -> Result<(), KplabelError> {
    let yaml = serde_yaml::to_string(registry).map_err(|source| KplabelError::SchemaWrite {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, yaml).map_err(|source| KplabelError::FileAccess {
        path: path.to_path_buf(),
        source,
    })
}
