//! User agent selection for page requests.

/// Crate user agent, sent unless configured otherwise.
pub const USER_AGENT: &str = concat!(
    "gemharvest/",
    env!("CARGO_PKG_VERSION"),
    " (personal history export)"
);

/// Config value selecting a real browser user agent.
pub const IMPERSONATE: &str = "impersonate";

/// Desktop browser user agents for impersonate mode. Profile pages often
/// serve a stripped layout to clients they don't recognize.
const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// Pick one of the browser user agents.
pub fn browser_user_agent() -> &'static str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as usize)
        .unwrap_or(0);
    BROWSER_USER_AGENTS[nanos % BROWSER_USER_AGENTS.len()]
}

/// Resolve the configured user agent.
/// - None or blank => crate user agent
/// - "impersonate" => a real browser user agent
/// - anything else => sent verbatim
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim).filter(|s| !s.is_empty()) {
        None => USER_AGENT.to_string(),
        Some(value) if value.eq_ignore_ascii_case(IMPERSONATE) => browser_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}
