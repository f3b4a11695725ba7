//! Catalogue file loading.

use std::fs;
use std::path::Path;

use crate::catalogue::RouteCatalogue;
use crate::errors::ConfigError;
use crate::map::RoutingMap;

/// Serialization format of a catalogue file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueFormat {
    Yaml,
    Json,
}

impl CatalogueFormat {
    /// Pick a format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Parse catalogue text without validating it.
pub fn parse_catalogue(text: &str, format: CatalogueFormat) -> Result<RouteCatalogue, ConfigError> {
    match format {
        CatalogueFormat::Yaml => serde_yaml::from_str(text).map_err(ConfigError::parse),
        CatalogueFormat::Json => serde_json::from_str(text).map_err(ConfigError::parse),
    }
}

/// Parse, validate and compile catalogue text.
pub fn load_str(text: &str, format: CatalogueFormat) -> Result<RoutingMap, ConfigError> {
    let catalogue = parse_catalogue(text, format)?;
    RoutingMap::compile(&catalogue)
}

/// Read a catalogue file and compile it into a routing map.
pub fn load(path: impl AsRef<Path>) -> Result<RoutingMap, ConfigError> {
    let path = path.as_ref();
    let format = CatalogueFormat::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text, format)
}
