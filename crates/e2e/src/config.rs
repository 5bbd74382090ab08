//! Harness configuration
//!
//! Settings come from a `config.properties` file loaded once per process.
//! Any key can be overridden at process level: explicit overrides (the
//! runner's `--set key=value`) win, then the environment, then the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};
use crate::playwright::Browser;

/// Environment variable pointing at an alternative properties file
pub const CONFIG_PATH_ENV: &str = "USERMGMT_CONFIG";

static GLOBAL: OnceCell<ConfigSource> = OnceCell::new();

/// Layered key/value settings
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// File-backed layer
    file: HashMap<String, String>,

    /// Explicit process-level overrides
    overrides: HashMap<String, String>,

    /// Whether the process environment is consulted
    read_env: bool,

    /// Where the file layer came from (for diagnostics)
    origin: Option<PathBuf>,
}

impl ConfigSource {
    /// Load a properties file. A missing or unreadable file is fatal.
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            E2eError::Config(format!("Not able to read {}: {}", path.display(), e))
        })?;
        debug!("Loading configuration from: {}", path.display());

        Ok(Self {
            file: parse_properties(&content),
            overrides: HashMap::new(),
            read_env: true,
            origin: Some(path.to_path_buf()),
        })
    }

    /// Build a source from in-memory properties text, without the environment layer
    pub fn from_properties_str(content: &str) -> Self {
        Self {
            file: parse_properties(content),
            overrides: HashMap::new(),
            read_env: false,
            origin: None,
        }
    }

    /// Add an explicit process-level override
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Toggle the environment layer
    pub fn with_env(mut self, read_env: bool) -> Self {
        self.read_env = read_env;
        self
    }

    /// The process-wide instance, loaded from the default resource on first use
    pub fn global() -> E2eResult<&'static ConfigSource> {
        GLOBAL.get_or_try_init(|| ConfigSource::load(&default_config_path()))
    }

    /// Install the process-wide instance. Fails if one is already in use.
    pub fn install(source: ConfigSource) -> E2eResult<&'static ConfigSource> {
        GLOBAL
            .set(source)
            .map_err(|_| E2eError::Config("configuration already initialized".to_string()))?;
        GLOBAL
            .get()
            .ok_or_else(|| E2eError::Config("configuration not initialized".to_string()))
    }

    /// Resolve a key: override layer first, then the file
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        if self.read_env {
            if let Some(value) = env_lookup(key) {
                return Some(value);
            }
        }
        self.file.get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require(&self, key: &str) -> E2eResult<String> {
        self.get(key)
            .ok_or_else(|| E2eError::MissingSetting(key.to_string()))
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> E2eResult<T> {
        match self.get(key) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                E2eError::Config(format!("Invalid value for '{}': {}", key, raw))
            }),
            None => Ok(default),
        }
    }

    fn parse_required<T: std::str::FromStr>(&self, key: &str) -> E2eResult<T> {
        let raw = self.require(key)?;
        raw.trim()
            .parse()
            .map_err(|_| E2eError::Config(format!("Invalid value for '{}': {}", key, raw)))
    }
}

/// Default location of `config.properties`
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| resource_path("config.properties"))
}

/// Path of a file shipped in the crate's `resources/` directory
pub fn resource_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("resources").join(name)
}

fn env_lookup(key: &str) -> Option<String> {
    if let Ok(value) = std::env::var(key) {
        return Some(value);
    }
    let normalized: String = key
        .chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    std::env::var(normalized).ok()
}

/// Parse Java-style properties text
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut pending = String::new();

    for raw in content.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        // Trailing backslash continues the logical line
        if let Some(stripped) = line.strip_suffix('\\') {
            pending.push_str(stripped);
            continue;
        }
        pending.push_str(line);
        let logical = std::mem::take(&mut pending);
        if let Some((key, value)) = split_property(&logical) {
            props.insert(key, value);
        }
    }

    if let Some((key, value)) = split_property(&pending) {
        props.insert(key, value);
    }

    props
}

fn split_property(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let end = line
        .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
        .unwrap_or(line.len());
    let key = line[..end].to_string();

    let mut rest = line[end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start();
    }

    Some((key, rest.trim_end().to_string()))
}

/// Typed view of the settings the harness consumes
#[derive(Debug, Clone)]
pub struct HarnessSettings {
    pub base_url: String,
    pub backend_port: u16,
    pub frontend_port: u16,
    pub auth_username: String,
    pub auth_password: String,
    pub headless: bool,
    pub slow_mo_ms: u64,
    pub browser: Browser,
    /// Node binary running the Playwright bridge
    pub node_binary: String,
    /// NODE_PATH so the bridge can resolve the `playwright` package
    pub node_path: Option<PathBuf>,
    /// Numbered step screenshots
    pub artifacts_dir: PathBuf,
    /// Named top-level screenshots (loginFill.png, ...)
    pub artifacts_root: PathBuf,
    pub results_dir: PathBuf,
    pub case_timeout: Duration,
    /// None keeps the transport default
    pub http_timeout: Option<Duration>,
}

impl HarnessSettings {
    /// Resolve all settings. Missing required keys are configuration errors.
    pub fn from_source(source: &ConfigSource) -> E2eResult<Self> {
        let backend_port = match source.get("backend_port") {
            Some(_) => source.parse_required("backend_port")?,
            None if source.get("port").is_some() => {
                let port = source.parse_required::<u16>("port")?;
                warn!("'port' is deprecated, use 'backend_port' instead");
                port
            }
            None => return Err(E2eError::MissingSetting("backend_port".to_string())),
        };

        let browser = match source.get("browser.name") {
            Some(name) => name.parse()?,
            None => Browser::Chromium,
        };

        let http_timeout = match source.get("http.timeout_ms") {
            Some(_) => Some(Duration::from_millis(source.parse_required("http.timeout_ms")?)),
            None => None,
        };

        Ok(Self {
            base_url: source.require("base_url")?,
            backend_port,
            frontend_port: source.parse_or("frontend_port", 3000)?,
            auth_username: source.require("auth_username")?,
            auth_password: source.require("auth_password")?,
            headless: parse_bool(&source.get_or("browser.headless", "true")),
            slow_mo_ms: source.parse_or("browser.slowmo", 300)?,
            browser,
            node_binary: source.get_or("playwright.node", "node"),
            node_path: source.get("playwright.node_path").map(PathBuf::from),
            artifacts_dir: PathBuf::from(source.get_or("artifacts.dir", "target/screenshots")),
            artifacts_root: PathBuf::from(source.get_or("artifacts.root", ".")),
            results_dir: PathBuf::from(source.get_or("results.dir", "test-results")),
            case_timeout: Duration::from_millis(source.parse_or("case.timeout_ms", 120_000)?),
            http_timeout,
        })
    }

    /// Settings pointing at a backend on `base_url:backend_port`, everything else defaulted
    pub fn for_backend(base_url: impl Into<String>, backend_port: u16) -> Self {
        Self {
            base_url: base_url.into(),
            backend_port,
            frontend_port: 3000,
            auth_username: "admin".to_string(),
            auth_password: "password123".to_string(),
            headless: true,
            slow_mo_ms: 0,
            browser: Browser::Chromium,
            node_binary: "node".to_string(),
            node_path: None,
            artifacts_dir: PathBuf::from("target/screenshots"),
            artifacts_root: PathBuf::from("."),
            results_dir: PathBuf::from("test-results"),
            case_timeout: Duration::from_secs(120),
            http_timeout: None,
        }
    }

    pub fn backend_url(&self) -> String {
        format!("{}:{}", self.base_url.trim_end_matches('/'), self.backend_port)
    }

    pub fn frontend_url(&self) -> String {
        format!("{}:{}", self.base_url.trim_end_matches('/'), self.frontend_port)
    }
}

/// `true` only for a case-insensitive "true"
fn parse_bool(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}
