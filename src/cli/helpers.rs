//! Shared helper functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tracing::{info, warn};

use dlproc::config::Config;
use dlproc::model::DocumentImage;
use dlproc::pipeline::DocumentInput;
use dlproc::taxonomy::Taxonomy;
use dlproc::utils::mime::{detect_media_type, is_supported_media_type};

/// Load the configured taxonomy file, or the built-in lanes when none is set.
pub async fn load_taxonomy(config: &Config) -> anyhow::Result<Arc<Taxonomy>> {
    let taxonomy = match config.taxonomy_path() {
        Some(path) => {
            info!("Loading taxonomy from {}", path.display());
            Taxonomy::load_from_path(&path)
                .await
                .with_context(|| format!("Failed to load taxonomy {}", path.display()))?
        }
        None => Taxonomy::builtin(),
    };
    Ok(Arc::new(taxonomy))
}

/// Read a document from disk and wrap it for the pipeline.
pub async fn load_document(path: &Path) -> anyhow::Result<DocumentInput> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let media_type = detect_media_type(path, &data);
    if !is_supported_media_type(&media_type) {
        warn!(
            "{} has media type {}, the model may reject it",
            path.display(),
            media_type
        );
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(DocumentInput::new(
        file_name,
        DocumentImage::new(data, media_type),
    ))
}

/// Truncate a string for column display.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print the "model not usable" banner shared by commands that call a model.
pub fn print_unavailable(hint: &str) {
    eprintln!("{} {}", style("✗").red(), hint);
}
