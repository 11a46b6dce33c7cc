//! Concrete page sources for the loaders.
//!
//! - `http_client`: cookie-aware page fetcher for the pagination loader
//! - `browser`: chromiumoxide session producing live pages for the
//!   interaction loader
//! - `cookies`: session cookie loading shared by both

pub mod browser;
pub mod cookies;
mod http_client;

pub use browser::{BrowserConfig, BrowserSession};
pub use cookies::{session_cookies, CookieEntry};
pub use http_client::{resolve_user_agent, HttpClient, USER_AGENT};
