//! `fetch`: paginated history over HTTP.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use url::Url;

use gemharvest::config::HarvestConfig;
use gemharvest::loader::{HarvestSession, PaginatedLoader};
use gemharvest::scrapers::HttpClient;

use super::helpers::{load_failed, progress_fn, spinner, write_records};

pub async fn cmd_fetch(
    config: &HarvestConfig,
    url: &str,
    initial: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let target = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let client = HttpClient::for_target(config, &target)
        .await
        .map_err(load_failed)?;

    let progress = spinner(&format!("Fetching {}", target));
    let mut loader = PaginatedLoader::new(
        Arc::new(client),
        target.clone(),
        config.mode,
        config.pagination.clone(),
    )
    .with_progress(progress_fn(&progress));

    if let Some(path) = initial {
        let html = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        loader = loader.with_initial_html(html);
    }

    let session = HarvestSession::new(target.as_str());
    let result = session.ensure_loaded(Arc::new(loader)).await;
    progress.finish_and_clear();

    let snapshot = result.map_err(load_failed)?;
    write_records(&snapshot.schema, &snapshot.records, output)
}
