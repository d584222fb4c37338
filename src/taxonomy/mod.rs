//! Forensic lane taxonomy.
//!
//! Documents are classified into a `(lane_id, path_id)` pair. Each lane groups
//! related paths, and each path owns the extraction schema used to transcribe
//! documents of that category. The taxonomy is loaded once at startup and is
//! read-only afterwards; share it behind an `Arc`.

mod builtin;
mod schema;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use schema::{ExtractionSchema, FieldSpec, FieldType, ScalarType, SchemaFields};

/// Errors raised while loading or validating a taxonomy.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Duplicate lane id: {0}")]
    DuplicateLane(String),

    #[error("Duplicate path id '{path_id}' in lane {lane_id}")]
    DuplicatePath { lane_id: String, path_id: String },

    #[error("Lane {0} has no paths")]
    EmptyLane(String),

    #[error("Path {lane_id}/{path_id} declares no extraction fields")]
    EmptySchema { lane_id: String, path_id: String },

    #[error("Taxonomy has no lanes")]
    Empty,

    #[error("Failed to parse taxonomy: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Leaf category a document is classified into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanePath {
    /// Unique within the owning lane only.
    pub id: String,
    pub name: String,
    /// Disambiguating context shown to the classifier.
    pub description: String,
    pub extraction_schema: ExtractionSchema,
}

/// Top-level forensic category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: String,
    pub name: String,
    /// Display grouping only.
    pub group: String,
    pub paths: Vec<LanePath>,
}

impl Lane {
    pub fn path(&self, path_id: &str) -> Option<&LanePath> {
        self.paths.iter().find(|p| p.id == path_id)
    }
}

/// On-disk taxonomy document: `{ "lanes": [...] }`.
#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    lanes: Vec<Lane>,
}

/// Immutable registry of lanes and paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxonomy {
    lanes: Vec<Lane>,
}

impl Taxonomy {
    /// Build a taxonomy, validating id uniqueness and non-empty schemas.
    pub fn from_lanes(lanes: Vec<Lane>) -> Result<Self, TaxonomyError> {
        if lanes.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let mut lane_ids = HashSet::new();
        for lane in &lanes {
            if !lane_ids.insert(lane.id.as_str()) {
                return Err(TaxonomyError::DuplicateLane(lane.id.clone()));
            }
            if lane.paths.is_empty() {
                return Err(TaxonomyError::EmptyLane(lane.id.clone()));
            }

            let mut path_ids = HashSet::new();
            for path in &lane.paths {
                if !path_ids.insert(path.id.as_str()) {
                    return Err(TaxonomyError::DuplicatePath {
                        lane_id: lane.id.clone(),
                        path_id: path.id.clone(),
                    });
                }
                if path.extraction_schema.is_empty() {
                    return Err(TaxonomyError::EmptySchema {
                        lane_id: lane.id.clone(),
                        path_id: path.id.clone(),
                    });
                }
            }
        }

        Ok(Self { lanes })
    }

    /// The built-in forensic lane table.
    pub fn builtin() -> Self {
        Self {
            lanes: builtin::forensic_lanes(),
        }
    }

    /// Parse a taxonomy document. `format` is a file extension
    /// (`toml`, `yaml`/`yml`; anything else is treated as JSON).
    pub fn parse(contents: &str, format: &str) -> Result<Self, TaxonomyError> {
        let file: TaxonomyFile = match format {
            "toml" => toml::from_str(contents).map_err(|e| TaxonomyError::Parse(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| TaxonomyError::Parse(e.to_string()))?
            }
            _ => serde_json::from_str(contents).map_err(|e| TaxonomyError::Parse(e.to_string()))?,
        };
        Self::from_lanes(file.lanes)
    }

    /// Load a taxonomy file, choosing the parser from its extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, TaxonomyError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let taxonomy = Self::parse(&contents, ext)?;
        tracing::debug!(
            "Loaded taxonomy from {} ({} lanes, {} paths)",
            path.display(),
            taxonomy.lanes.len(),
            taxonomy.path_count()
        );
        Ok(taxonomy)
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane(&self, lane_id: &str) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == lane_id)
    }

    /// Resolve a fully-qualified category.
    pub fn find_path(&self, lane_id: &str, path_id: &str) -> Option<&LanePath> {
        self.lane(lane_id).and_then(|lane| lane.path(path_id))
    }

    /// Resolve a category to its lane and path.
    pub fn resolve(&self, lane_id: &str, path_id: &str) -> Option<(&Lane, &LanePath)> {
        let lane = self.lane(lane_id)?;
        lane.path(path_id).map(|path| (lane, path))
    }

    /// Every `(lane, path)` pair in declaration order. Call again to restart.
    pub fn all_paths(&self) -> impl Iterator<Item = (&Lane, &LanePath)> + '_ {
        self.lanes
            .iter()
            .flat_map(|lane| lane.paths.iter().map(move |path| (lane, path)))
    }

    pub fn path_count(&self) -> usize {
        self.lanes.iter().map(|l| l.paths.len()).sum()
    }

    /// Distinct display groups in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for lane in &self.lanes {
            if !seen.contains(&lane.group.as_str()) {
                seen.push(lane.group.as_str());
            }
        }
        seen
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}
