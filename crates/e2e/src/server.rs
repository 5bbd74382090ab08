//! Backend process management - spawning and health checking the SUT

use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::api::endpoints;
use crate::error::{E2eError, E2eResult};

/// Handle to a backend started by the harness
pub struct SutProcess {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl SutProcess {
    /// Spawn the backend through the shell and wait until it reports healthy
    pub async fn spawn(config: SutConfig) -> E2eResult<Self> {
        let base_url = format!("{}:{}", config.base_url.trim_end_matches('/'), config.port);

        info!("Spawning backend on port {}: {}", config.port, config.command);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&config.command)
            .env("PORT", config.port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn '{}': {}", config.command, e))
        })?;

        let mut handle = SutProcess {
            child,
            base_url: base_url.clone(),
            port: config.port,
        };

        if let Err(e) = handle.wait_for_healthy(config.startup_timeout).await {
            let _ = handle.stop();
            return Err(e);
        }

        info!("Backend is healthy at {}", base_url);
        Ok(handle)
    }

    /// Poll the health endpoint every 100 ms
    async fn wait_for_healthy(&mut self, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = format!("{}{}", self.base_url, endpoints::HEALTH_CHECK);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .danger_accept_invalid_certs(true)
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            if let Ok(Some(status)) = self.child.try_wait() {
                return Err(E2eError::ServerStartup(format!("backend exited early: {}", status)));
            }

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for backend to start...");
                    }
                    // Connection refused is expected while the backend is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the backend: SIGTERM first, then kill
    pub fn stop(&mut self) -> E2eResult<()> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }

        info!("Stopping backend (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for SutProcess {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// How to start the backend
#[derive(Debug, Clone)]
pub struct SutConfig {
    /// Shell command, e.g. `node server.js`
    pub command: String,

    pub working_dir: Option<std::path::PathBuf>,

    /// Scheme and host, without port
    pub base_url: String,

    /// Passed to the backend as `PORT`
    pub port: u16,

    pub startup_timeout: Duration,
}

impl SutConfig {
    pub fn new(command: impl Into<String>, base_url: impl Into<String>, port: u16) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            base_url: base_url.into(),
            port,
            startup_timeout: Duration::from_secs(30),
        }
    }
}
