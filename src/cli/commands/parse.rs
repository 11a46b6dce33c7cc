//! `parse`: extract a saved page.

use std::path::Path;

use anyhow::Context;
use console::style;
use tracing::warn;

use gemharvest::config::HarvestConfig;
use gemharvest::history::{extract_document, ContainerKind, HarvestError};
use gemharvest::loader::HarvestContext;

use super::helpers::{load_failed, write_records};

pub async fn cmd_parse(
    config: &HarvestConfig,
    file: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let html = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let batch = extract_document(&html, config.mode);
    if batch.kind == ContainerKind::Unknown {
        let miss = HarvestError::NoContainerFound;
        warn!("{} in {}", miss, file.display());
        eprintln!("{} {}", style("!").yellow(), miss);
    }

    let context = HarvestContext::detached(&file.display().to_string());
    context.merge(batch).map_err(load_failed)?;
    write_records(&context.schema(), &context.records(), output)
}
