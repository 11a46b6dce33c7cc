//! `browse`: interactive history in a browser.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use url::Url;

use gemharvest::config::HarvestConfig;
use gemharvest::loader::{HarvestSession, InteractiveLoader};
use gemharvest::scrapers::{session_cookies, BrowserSession};

use super::helpers::{load_failed, progress_fn, spinner, write_records};

pub async fn cmd_browse(
    config: &HarvestConfig,
    url: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let target = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let cookies = session_cookies(config, &target)
        .await
        .map_err(load_failed)?;

    let progress = spinner(&format!("Opening {}", target));
    let mut browser = BrowserSession::new(config.browser.clone());
    let page = match browser.open(target.as_str(), &cookies).await {
        Ok(page) => page,
        Err(e) => {
            progress.finish_and_clear();
            browser.close().await;
            return Err(load_failed(e));
        }
    };

    let loader = InteractiveLoader::new(page, config.mode, config.loader.clone())
        .with_progress(progress_fn(&progress));
    let session = HarvestSession::new(target.as_str());
    let result = session.ensure_loaded(Arc::new(loader)).await;

    progress.finish_and_clear();
    browser.close().await;

    let snapshot = result.map_err(load_failed)?;
    write_records(&snapshot.schema, &snapshot.records, output)
}
