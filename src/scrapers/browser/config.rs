//! Browser session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Browser settings for the interaction loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a window (default: true). `browse --headful` turns it off,
    /// which also lets the user log in by hand before harvesting.
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,

    /// Cookie export loaded into the page before navigation.
    pub cookies_file: Option<PathBuf>,

    /// Navigation and ready-state timeout in seconds.
    pub timeout: u64,

    /// Wait for this CSS selector before harvesting.
    pub wait_for_selector: Option<String>,

    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    pub remote_url: Option<String>,

    /// User agent override for the page.
    pub user_agent: Option<String>,

    /// How often the page's change counter is polled, in milliseconds.
    pub change_poll_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            cookies_file: None,
            timeout: 30,
            wait_for_selector: None,
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: None,
            change_poll_ms: 100,
        }
    }
}
