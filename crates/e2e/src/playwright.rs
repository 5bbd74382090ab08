//! Playwright browser automation
//!
//! The browser runs inside a long-lived `node` process executing the embedded
//! `bridge.js`. Commands and replies are single JSON lines over the child's
//! stdin/stdout; console output from pages arrives as unsolicited events and
//! is forwarded to `tracing`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command as TokioCommand};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::HarnessSettings;
use crate::error::{E2eError, E2eResult};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Default per-command timeout, matching Playwright's own
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack on top of the in-browser timeout before the harness gives up on a reply
const REPLY_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("Unknown browser: {}", other))),
        }
    }
}

/// Wait state for element waits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// Page load milestones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum LoadState {
    #[default]
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// How an element is found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum By {
    Css { selector: String },
    Placeholder { text: String },
    Role { role: String, name: Option<String> },
    Text { text: String },
    Title { text: String },
}

/// Element query, optionally narrowed to the n-th match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    #[serde(flatten)]
    pub by: By,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl Locator {
    fn new(by: By) -> Self {
        Self { by, nth: None }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(By::Css {
            selector: selector.into(),
        })
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::new(By::Placeholder { text: text.into() })
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(By::Role {
            role: role.into(),
            name: Some(name.into()),
        })
    }

    pub fn button(name: impl Into<String>) -> Self {
        Self::role("button", name)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(By::Text { text: text.into() })
    }

    pub fn title(text: impl Into<String>) -> Self {
        Self::new(By::Title { text: text.into() })
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    pub fn nth(mut self, n: usize) -> Self {
        self.nth = Some(n);
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.by {
            By::Css { selector } => write!(f, "css={}", selector)?,
            By::Placeholder { text } => write!(f, "placeholder={}", text)?,
            By::Role { role, name: Some(name) } => write!(f, "role={}[name={}]", role, name)?,
            By::Role { role, name: None } => write!(f, "role={}", role)?,
            By::Text { text } => write!(f, "text={}", text)?,
            By::Title { text } => write!(f, "title={}", text)?,
        }
        if let Some(n) = self.nth {
            write!(f, " >> nth={}", n)?;
        }
        Ok(())
    }
}

/// What the page does with the next confirm/alert dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DialogPolicy {
    /// Accept one dialog, if its message contains `expected` (when given)
    Accept { expected: Option<String> },
    Dismiss,
}

/// A dialog the page saw and how it was answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRecord {
    pub message: String,
    pub kind: String,
    pub action: String,
}

impl DialogRecord {
    pub fn accepted(&self) -> bool {
        self.action == "accepted"
    }
}

/// Page-level browser operations the UI flows are written against
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    async fn wait_for_load_state(&mut self, state: LoadState) -> E2eResult<()>;

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;

    /// Whether the first match is visible right now (no waiting)
    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool>;

    async fn input_value(&mut self, locator: &Locator) -> E2eResult<String>;

    async fn wait_for(&mut self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()>;

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> E2eResult<()>;

    /// Must be registered before the click that opens the dialog
    async fn set_dialog_policy(&mut self, policy: DialogPolicy) -> E2eResult<()>;

    /// Dialogs seen since the last call
    async fn take_dialogs(&mut self) -> E2eResult<Vec<DialogRecord>>;

    async fn close(&mut self) -> E2eResult<()>;
}

/// Owned end of the node child process
struct BridgeConnection {
    child: Child,
    stdin: ChildStdin,
    replies: mpsc::UnboundedReceiver<Value>,
    next_id: u64,
    _script_dir: tempfile::TempDir,
}

impl BridgeConnection {
    async fn spawn(settings: &HarnessSettings) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut cmd = TokioCommand::new(&settings.node_binary);
        cmd.arg(&script_path)
            .current_dir(script_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = &settings.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("Failed to spawn {}: {}", settings.node_binary, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".to_string()))?;

        let (tx, replies) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<Value>(&line) {
                    Ok(message) if message.get("event").is_some() => forward_event(&message),
                    Ok(message) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(_) => debug!("[bridge] {}", line),
                }
            }
        });

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[bridge stderr] {}", line);
                }
            });
        }

        Ok(Self {
            child,
            stdin,
            replies,
            next_id: 1,
            _script_dir: script_dir,
        })
    }

    /// Send one command and wait for its reply
    async fn request(&mut self, mut command: Value, wait: Duration) -> E2eResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let name = command
            .get("cmd")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        if let Some(obj) = command.as_object_mut() {
            obj.insert("id".to_string(), json!(id));
        }

        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| E2eError::Playwright(format!("bridge write failed: {}", e)))?;
        self.stdin.flush().await?;

        let deadline = Instant::now() + wait;
        loop {
            let message = match timeout_at(deadline, self.replies.recv()).await {
                Err(_) => return Err(E2eError::Timeout(format!("browser command '{}'", name))),
                Ok(None) => return Err(E2eError::Playwright("bridge exited".to_string())),
                Ok(Some(message)) => message,
            };

            if message.get("id").and_then(Value::as_u64) != Some(id) {
                // Late reply to a command that already timed out
                debug!("Discarding stale bridge reply: {}", message);
                continue;
            }

            if message.get("ok").and_then(Value::as_bool).unwrap_or(false) {
                return Ok(message.get("result").cloned().unwrap_or(Value::Null));
            }
            let error = message
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown bridge error");
            return Err(E2eError::Playwright(format!("{}: {}", name, error)));
        }
    }
}

fn forward_event(message: &Value) {
    match message.get("event").and_then(Value::as_str) {
        Some("console") => {
            let page = message.get("page_id").and_then(Value::as_u64).unwrap_or(0);
            let level = message.get("level").and_then(Value::as_str).unwrap_or("log");
            let text = message.get("text").and_then(Value::as_str).unwrap_or("");
            match level {
                "error" => warn!("[page {}] console.error: {}", page, text),
                _ => debug!("[page {}] console.{}: {}", page, level, text),
            }
        }
        Some("fatal") => warn!(
            "[bridge] {}",
            message.get("error").and_then(serde_json::Value::as_str).unwrap_or("fatal error")
        ),
        _ => debug!("[bridge] {}", message),
    }
}

/// A launched browser shared by the pages of one suite
#[derive(Clone)]
pub struct BrowserSession {
    conn: Arc<Mutex<BridgeConnection>>,
    command_timeout: Duration,
}

impl BrowserSession {
    /// Start node, load Playwright and launch the configured browser
    pub async fn launch(settings: &HarnessSettings) -> E2eResult<Self> {
        Self::check_playwright_installed(settings).await?;

        let conn = BridgeConnection::spawn(settings).await?;
        let session = Self {
            conn: Arc::new(Mutex::new(conn)),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        };

        let launched = session
            .request(
                json!({
                    "cmd": "launch",
                    "browser": settings.browser.as_str(),
                    "headless": settings.headless,
                    "slow_mo": settings.slow_mo_ms,
                }),
                Duration::from_secs(60),
            )
            .await?;

        info!(
            "Launched {} {} (headless: {}, slow-mo: {} ms)",
            settings.browser.as_str(),
            launched.get("version").and_then(serde_json::Value::as_str).unwrap_or(""),
            settings.headless,
            settings.slow_mo_ms
        );
        Ok(session)
    }

    /// Check that node can resolve the `playwright` package
    async fn check_playwright_installed(settings: &HarnessSettings) -> E2eResult<()> {
        let mut cmd = TokioCommand::new(&settings.node_binary);
        cmd.args(["-e", "require.resolve('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(node_path) = &settings.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        match cmd.status().await {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    async fn request(&self, command: Value, wait: Duration) -> E2eResult<Value> {
        let mut conn = self.conn.lock().await;
        conn.request(command, wait).await
    }

    /// Fresh context and page
    pub async fn new_page(&self, viewport: Viewport) -> E2eResult<PageHandle> {
        let result = self
            .request(
                json!({
                    "cmd": "new_page",
                    "width": viewport.width,
                    "height": viewport.height,
                }),
                self.command_timeout + REPLY_GRACE,
            )
            .await?;

        let page_id = result
            .get("page_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| E2eError::Playwright("new_page reply without page_id".to_string()))?;

        debug!("Opened page {} ({}x{})", page_id, viewport.width, viewport.height);
        Ok(PageHandle {
            conn: Arc::clone(&self.conn),
            page_id,
            command_timeout: self.command_timeout,
            closed: false,
        })
    }

    /// Close the browser and stop the node process
    pub async fn close(self) -> E2eResult<()> {
        let mut conn = self.conn.lock().await;
        let closed = conn.request(json!({ "cmd": "close" }), Duration::from_secs(30)).await;
        if let Err(e) = &closed {
            warn!("Browser close failed: {}", e);
        }

        if timeout(Duration::from_secs(5), conn.child.wait()).await.is_err() {
            let _ = conn.child.kill().await;
        }
        closed.map(|_| ())
    }
}

/// One browser context with a single page
pub struct PageHandle {
    conn: Arc<Mutex<BridgeConnection>>,
    page_id: u64,
    command_timeout: Duration,
    closed: bool,
}

impl PageHandle {
    pub fn id(&self) -> u64 {
        self.page_id
    }

    async fn call(&self, cmd: &str, mut args: Value, wait: Duration) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::Playwright(format!("page {} is closed", self.page_id)));
        }
        if let Some(obj) = args.as_object_mut() {
            obj.insert("cmd".to_string(), json!(cmd));
            obj.insert("page_id".to_string(), json!(self.page_id));
            obj.entry("timeout_ms")
                .or_insert_with(|| json!(self.command_timeout.as_millis() as u64));
        }
        let mut conn = self.conn.lock().await;
        conn.request(args, wait + REPLY_GRACE).await
    }

    async fn call_default(&self, cmd: &str, args: Value) -> E2eResult<Value> {
        self.call(cmd, args, self.command_timeout).await
    }
}

#[async_trait]
impl PageDriver for PageHandle {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        debug!("goto {}", url);
        self.call_default("goto", json!({ "url": url })).await.map(|_| ())
    }

    async fn wait_for_load_state(&mut self, state: LoadState) -> E2eResult<()> {
        self.call_default("wait_for_load_state", json!({ "state": state }))
            .await
            .map(|_| ())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        debug!("fill {} = {:?}", locator, value);
        self.call_default("fill", json!({ "locator": locator, "value": value }))
            .await
            .map(|_| ())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        debug!("click {}", locator);
        self.call_default("click", json!({ "locator": locator })).await.map(|_| ())
    }

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        let result = self.call_default("is_visible", json!({ "locator": locator })).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn input_value(&mut self, locator: &Locator) -> E2eResult<String> {
        let result = self.call_default("input_value", json!({ "locator": locator })).await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for(&mut self, locator: &Locator, state: WaitState, wait: Duration) -> E2eResult<()> {
        let args = json!({
            "locator": locator,
            "state": state,
            "timeout_ms": wait.as_millis() as u64,
        });
        self.call("wait_for", args, wait).await.map(|_| ())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let absolute = absolutize(path)?;
        self.call_default(
            "screenshot",
            json!({ "path": absolute.to_string_lossy(), "full_page": full_page }),
        )
        .await
        .map(|_| ())
    }

    async fn set_dialog_policy(&mut self, policy: DialogPolicy) -> E2eResult<()> {
        self.call_default("set_dialog_policy", json!({ "policy": policy }))
            .await
            .map(|_| ())
    }

    async fn take_dialogs(&mut self) -> E2eResult<Vec<DialogRecord>> {
        let result = self.call_default("take_dialogs", json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.call_default("close_page", json!({})).await;
        self.closed = true;
        result.map(|_| ())
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Dropped mid-case (panic or timeout): close the context in the background
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let conn = Arc::clone(&self.conn);
            let page_id = self.page_id;
            runtime.spawn(async move {
                let mut conn = conn.lock().await;
                let _ = conn
                    .request(json!({ "cmd": "close_page", "page_id": page_id }), REPLY_GRACE)
                    .await;
            });
        }
    }
}

/// The bridge runs in a temp directory, so paths must not be relative
fn absolutize(path: &Path) -> E2eResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn locators_serialize_for_the_bridge() {
        let loc = Locator::title("Edit").first();
        assert_eq!(
            serde_json::to_value(&loc).unwrap(),
            json!({"by": "title", "text": "Edit", "nth": 0})
        );

        let loc = Locator::button("Sign In");
        assert_eq!(
            serde_json::to_value(&loc).unwrap(),
            json!({"by": "role", "role": "button", "name": "Sign In"})
        );
    }

    #[test]
    fn locator_display_is_readable() {
        assert_eq!(
            Locator::css("input[placeholder*='name']").to_string(),
            "css=input[placeholder*='name']"
        );
        assert_eq!(Locator::title("Delete").nth(2).to_string(), "title=Delete >> nth=2");
    }

    #[test]
    fn dialog_policy_wire_format() {
        let policy = DialogPolicy::Accept {
            expected: Some("Are you sure you want to delete this user?".into()),
        };
        assert_eq!(
            serde_json::to_value(&policy).unwrap(),
            json!({"action": "accept", "expected": "Are you sure you want to delete this user?"})
        );
        assert_eq!(serde_json::to_value(DialogPolicy::Dismiss).unwrap(), json!({"action": "dismiss"}));
    }

    #[test]
    fn states_serialize_as_playwright_names() {
        assert_eq!(serde_json::to_value(WaitState::Detached).unwrap(), json!("detached"));
        assert_eq!(serde_json::to_value(LoadState::NetworkIdle).unwrap(), json!("networkidle"));
        assert_eq!(serde_json::to_value(LoadState::Load).unwrap(), json!("load"));
    }

    #[test_case("chromium", Browser::Chromium)]
    #[test_case("Firefox", Browser::Firefox)]
    #[test_case(" webkit ", Browser::Webkit)]
    fn browser_names(raw: &str, expected: Browser) {
        assert_eq!(raw.parse::<Browser>().unwrap(), expected);
    }

    #[test]
    fn unknown_browser_is_a_config_error() {
        assert!(matches!("netscape".parse::<Browser>(), Err(E2eError::Config(_))));
    }

    #[test]
    fn bridge_script_handles_every_command() {
        for cmd in [
            "launch",
            "new_page",
            "goto",
            "wait_for_load_state",
            "fill",
            "click",
            "is_visible",
            "input_value",
            "wait_for",
            "screenshot",
            "set_dialog_policy",
            "take_dialogs",
            "close_page",
            "close",
        ] {
            assert!(BRIDGE_SCRIPT.contains(&format!("case '{}'", cmd)), "{}", cmd);
        }
    }
}
