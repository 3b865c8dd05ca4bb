//! Cookie synchronization from the user's real browser profile
//!
//! The ephemeral automation profile starts logged-out. To pre-authenticate
//! the session, cookies are read from the persistent Chrome profile through
//! the platform credential store (rookie decrypts the cookie database with
//! the OS keyring) and injected into the automation browser over the network
//! domain. Cookies are copied, never written back to the source profile.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, SetCookieParams, TimeSinceEpoch,
};
use chromiumoxide::page::Page;
use tracing::{debug, info, warn};
use url::Url;

use crate::AutomationConfig;
use crate::browser::DebugConnection;
use crate::error::EngineError;

/// Environment opt-in for the one-shot recovery retry when the native cookie
/// store cannot be read (store locked by a running browser, keyring hiccup).
/// Nothing is retried without this explicit operator consent.
pub const COOKIE_RETRY_ENV: &str = "CHATPILOT_COOKIE_RETRY";

/// Seconds between the Windows FILETIME epoch (1601) and the Unix epoch.
const FILETIME_EPOCH_OFFSET_SECS: f64 = 11_644_473_600.0;

/// A cookie as it comes out of a native store, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    pub expires: Option<f64>,
}

/// A cookie ready for injection over the protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix seconds; `None` means a session cookie.
    pub expires: Option<f64>,
}

/// Copies authentication cookies from the real browser profile into the
/// ephemeral one. Owns the one-shot recovery flag: a single instance lives
/// for the whole run, so the retry can fire at most once per process.
pub struct CookieSynchronizer {
    recovery_attempted: bool,
}

impl CookieSynchronizer {
    pub fn new() -> Self {
        Self {
            recovery_attempted: false,
        }
    }

    /// Read, normalize and inject cookies for the configured target.
    ///
    /// Returns the number of cookies applied. Per-cookie injection failures
    /// are logged and skipped; only a store-read failure is a sync error, and
    /// `allow_errors` downgrades even that to a warning (the run proceeds
    /// logged-out with zero cookies).
    pub async fn sync(
        &mut self,
        conn: &DebugConnection,
        page: &Page,
        config: &AutomationConfig,
    ) -> Result<usize, EngineError> {
        let target = Url::parse(&config.target_url)
            .map_err(|e| EngineError::CookieSync(format!("invalid target url: {e}")))?;
        let host = target
            .host_str()
            .ok_or_else(|| EngineError::CookieSync("target url has no host".into()))?
            .to_string();

        let hosts = alias_hosts(&host);
        debug!("Querying cookie store for hosts: {:?}", hosts);

        let raw = match self
            .read_store(hosts, config.cookie_profile.clone(), config.cookie_store_path.clone())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                let err = EngineError::CookieSync(format!("{e:#}"));
                if config.allow_cookie_errors {
                    warn!("{err}; continuing without authentication");
                    return Ok(0);
                }
                return Err(err);
            }
        };

        let merged = merge_first_seen(raw);
        info!("Read {} cookies from the native profile", merged.len());

        // Start from a clean jar so stale state from an earlier navigation in
        // this ephemeral profile can't shadow the synced cookies.
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| conn.classify(e))?;

        let now = chrono::Utc::now().timestamp() as f64;
        let mut applied = 0usize;
        for cookie in &merged {
            let normalized = normalize(cookie, &host);
            if let Some(exp) = normalized.expires
                && exp <= now
            {
                debug!("Skipping expired cookie {}", normalized.name);
                continue;
            }
            match build_set_params(&normalized) {
                Ok(params) => match page.execute(params).await {
                    Ok(_) => applied += 1,
                    Err(e) => warn!(
                        "Failed to apply cookie {} for {}: {}",
                        normalized.name, normalized.domain, e
                    ),
                },
                Err(e) => warn!("Skipping malformed cookie {}: {}", normalized.name, e),
            }
        }

        info!("Applied {}/{} cookies", applied, merged.len());
        Ok(applied)
    }

    /// Read the native store, with the env-gated one-shot recovery retry.
    async fn read_store(
        &mut self,
        hosts: Vec<String>,
        profile: Option<String>,
        store_path: Option<PathBuf>,
    ) -> anyhow::Result<Vec<RawCookie>> {
        match read_store_once(hosts.clone(), profile.clone(), store_path.clone()).await {
            Ok(cookies) => Ok(cookies),
            Err(e) => {
                if retry_opted_in() && !self.recovery_attempted {
                    self.recovery_attempted = true;
                    warn!(
                        "Cookie store read failed ({e:#}); {} is set, retrying once",
                        COOKIE_RETRY_ENV
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    read_store_once(hosts, profile, store_path).await
                } else {
                    Err(e)
                }
            }
        }
    }
}

impl Default for CookieSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

fn retry_opted_in() -> bool {
    std::env::var(COOKIE_RETRY_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// One pass over the native store. rookie does blocking sqlite + keyring
/// work, so it runs on the blocking pool.
async fn read_store_once(
    hosts: Vec<String>,
    profile: Option<String>,
    store_path: Option<PathBuf>,
) -> anyhow::Result<Vec<RawCookie>> {
    tokio::task::spawn_blocking(move || {
        let mut out = Vec::new();
        // One query per host so first-seen precedence follows the alias
        // order: the exact target host wins over parents and siblings.
        for host in &hosts {
            let domains = Some(vec![host.clone()]);
            let cookies = match resolve_store_file(profile.as_deref(), store_path.as_deref()) {
                Some(db) => rookie::any_browser(
                    db.to_string_lossy().as_ref(),
                    domains,
                    None,
                )
                .map_err(|e| anyhow::anyhow!("cookie store {} unreadable: {e}", db.display()))?,
                None => rookie::chrome(domains)
                    .map_err(|e| anyhow::anyhow!("chrome cookie store unreadable: {e}"))?,
            };
            out.extend(cookies.into_iter().map(|c| RawCookie {
                name: c.name,
                value: c.value,
                domain: Some(c.domain),
                path: Some(c.path),
                secure: Some(c.secure),
                http_only: Some(c.http_only),
                expires: c.expires.map(|e| e as f64),
            }));
        }
        Ok(out)
    })
    .await
    .map_err(|e| anyhow::anyhow!("cookie reader task panicked: {e}"))?
}

/// Locate a non-default cookie database when a profile name or explicit path
/// was configured. `None` means "use rookie's default Chrome discovery".
fn resolve_store_file(profile: Option<&str>, store_path: Option<&std::path::Path>) -> Option<PathBuf> {
    if let Some(path) = store_path {
        return Some(path.to_path_buf());
    }
    let name = profile?;
    if name.is_empty() || name.eq_ignore_ascii_case("default") {
        return None;
    }
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir()?.join("Library/Application Support/Google/Chrome")
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()?.join("Google/Chrome/User Data")
    } else {
        dirs::config_dir()?.join("google-chrome")
    };
    let modern = base.join(name).join("Network/Cookies");
    if modern.exists() {
        return Some(modern);
    }
    Some(base.join(name).join("Cookies"))
}

/// Hostnames queried for the same site: the target host, its parent domain,
/// and known sibling hostnames of the chat services we target. Covers
/// cookies scoped to parent/alternate hostnames.
pub fn alias_hosts(host: &str) -> Vec<String> {
    const KNOWN_SIBLINGS: &[(&str, &[&str])] = &[
        ("chatgpt.com", &["chat.openai.com", "openai.com"]),
        ("chat.openai.com", &["chatgpt.com", "openai.com"]),
        ("claude.ai", &["anthropic.com"]),
        ("gemini.google.com", &["google.com"]),
    ];

    let mut out = vec![host.to_string()];
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 {
        out.push(labels[1..].join("."));
    }
    if let Some((_, siblings)) = KNOWN_SIBLINGS.iter().find(|(h, _)| *h == host) {
        out.extend(siblings.iter().map(|s| s.to_string()));
    }

    let mut seen = HashSet::new();
    out.retain(|h| seen.insert(h.clone()));
    out
}

/// Merge cookies from multiple host queries by `(domain, name)`, first seen
/// wins.
pub fn merge_first_seen(cookies: Vec<RawCookie>) -> Vec<RawCookie> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(cookies.len());
    for cookie in cookies {
        let key = (
            cookie.domain.clone().unwrap_or_default(),
            cookie.name.clone(),
        );
        if seen.insert(key) {
            out.push(cookie);
        }
    }
    out
}

/// Normalize a raw cookie: default the domain to the request host, default
/// `secure=true` / `http_only=false`, and coerce the expiry to Unix seconds.
/// Idempotent by construction.
pub fn normalize(raw: &RawCookie, request_host: &str) -> NormalizedCookie {
    NormalizedCookie {
        name: raw.name.clone(),
        value: raw.value.clone(),
        domain: raw
            .domain
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| request_host.to_string()),
        path: raw
            .path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string()),
        secure: raw.secure.unwrap_or(true),
        http_only: raw.http_only.unwrap_or(false),
        expires: raw.expires.map(coerce_expiry_seconds),
    }
}

/// Coerce the timestamp encodings seen in the wild into Unix seconds.
///
/// Chrome on Windows stores FILETIME-style microseconds since 1601; other
/// exports use microsecond or millisecond Unix epochs. Already-normalized
/// values pass through unchanged.
pub fn coerce_expiry_seconds(value: f64) -> f64 {
    if value >= 1e16 {
        // Microseconds since 1601-01-01 (Windows FILETIME base)
        value / 1e6 - FILETIME_EPOCH_OFFSET_SECS
    } else if value >= 1e14 {
        // Microseconds since the Unix epoch
        value / 1e6
    } else if value >= 1e11 {
        // Milliseconds since the Unix epoch
        value / 1e3
    } else {
        value
    }
}

fn build_set_params(cookie: &NormalizedCookie) -> Result<SetCookieParams, String> {
    let mut builder = SetCookieParams::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(exp) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(exp));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// View a normalized cookie as raw input again, to exercise
    /// normalization idempotence.
    fn as_raw(cookie: &NormalizedCookie) -> RawCookie {
        RawCookie {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: Some(cookie.domain.clone()),
            path: Some(cookie.path.clone()),
            secure: Some(cookie.secure),
            http_only: Some(cookie.http_only),
            expires: cookie.expires,
        }
    }

    fn raw(name: &str, domain: Option<&str>) -> RawCookie {
        RawCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: domain.map(|d| d.to_string()),
            path: None,
            secure: None,
            http_only: None,
            expires: None,
        }
    }

    #[test]
    fn normalization_defaults() {
        let n = normalize(&raw("session", None), "chatgpt.com");
        assert_eq!(n.domain, "chatgpt.com");
        assert_eq!(n.path, "/");
        assert!(n.secure);
        assert!(!n.http_only);
        assert_eq!(n.expires, None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut c = raw("token", Some(".chatgpt.com"));
        c.path = Some("/api".to_string());
        c.secure = Some(false);
        c.http_only = Some(true);
        c.expires = Some(13_400_000_000_000_000.0); // FILETIME microseconds

        let once = normalize(&c, "chatgpt.com");
        let twice = normalize(&as_raw(&once), "chatgpt.com");
        assert_eq!(once, twice);
    }

    #[test]
    fn expiry_coercion_variants() {
        // Already Unix seconds
        assert_eq!(coerce_expiry_seconds(1_767_225_600.0), 1_767_225_600.0);
        // Milliseconds
        assert_eq!(coerce_expiry_seconds(1_767_225_600_000.0), 1_767_225_600.0);
        // Microseconds
        assert_eq!(
            coerce_expiry_seconds(1_767_225_600_000_000.0),
            1_767_225_600.0
        );
        // FILETIME microseconds since 1601: 1601->1970 offset plus one hour
        let filetime = (FILETIME_EPOCH_OFFSET_SECS + 3_600.0) * 1e6;
        assert_eq!(coerce_expiry_seconds(filetime), 3_600.0);
    }

    #[test]
    fn merge_keeps_first_seen_per_domain_and_name() {
        let mut a = raw("sid", Some("chatgpt.com"));
        a.value = "target-scope".to_string();
        let mut b = raw("sid", Some("chatgpt.com"));
        b.value = "parent-scope".to_string();
        let c = raw("sid", Some("openai.com"));

        let merged = merge_first_seen(vec![a.clone(), b, c.clone()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, "target-scope");
        assert_eq!(merged[1], c);
    }

    #[test]
    fn alias_hosts_cover_parent_and_siblings() {
        let hosts = alias_hosts("chat.openai.com");
        assert_eq!(hosts[0], "chat.openai.com");
        assert!(hosts.contains(&"openai.com".to_string()));
        assert!(hosts.contains(&"chatgpt.com".to_string()));
        // no duplicates
        let unique: HashSet<_> = hosts.iter().collect();
        assert_eq!(unique.len(), hosts.len());
    }

    #[test]
    fn set_params_build_for_session_and_persistent_cookies() {
        let session = normalize(&raw("a", Some("chatgpt.com")), "chatgpt.com");
        assert!(build_set_params(&session).is_ok());

        let mut persistent = raw("b", Some("chatgpt.com"));
        persistent.expires = Some(1_767_225_600.0);
        let persistent = normalize(&persistent, "chatgpt.com");
        assert!(build_set_params(&persistent).is_ok());
    }
}
