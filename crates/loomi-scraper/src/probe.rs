//! Detects what the current process can do, once per run.

use std::time::Duration;

use loomi_core::EnvironmentCapabilities;
use tokio::sync::OnceCell;

use crate::browser::{find_chrome, BrowserOptions, BrowserSession};

/// Environment variables whose presence marks a hosted sandbox where
/// launching a browser is not permitted.
const SANDBOX_ENV_VARS: &[&str] = &["REPL_ID"];

/// Upper bound on the launch test so a hung browser cannot stall startup.
const LAUNCH_TEST_TIMEOUT: Duration = Duration::from_secs(20);

static CAPABILITIES: OnceCell<EnvironmentCapabilities> = OnceCell::const_new();

/// Inputs to the probe. Only the first call in a process uses them.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub force_sandboxed: bool,
    pub browser: BrowserOptions,
}

impl ProbeOptions {
    #[must_use]
    pub fn from_config(config: &loomi_core::AppConfig) -> Self {
        Self {
            force_sandboxed: config.force_sandboxed,
            browser: BrowserOptions::from_config(config),
        }
    }
}

pub struct EnvironmentProbe;

impl EnvironmentProbe {
    /// Returns the process-wide capability snapshot, detecting it on first use.
    ///
    /// Never fails: any error while probing becomes a `false` flag.
    pub async fn probe(options: &ProbeOptions) -> EnvironmentCapabilities {
        *CAPABILITIES.get_or_init(|| Self::detect(options)).await
    }

    /// Runs detection without consulting or filling the process-wide cache.
    pub async fn detect(options: &ProbeOptions) -> EnvironmentCapabilities {
        let sandboxed =
            options.force_sandboxed || sandbox_env_present(|k| std::env::var_os(k).is_some());

        let browser_engine_importable = cfg!(feature = "browser")
            && find_chrome(options.browser.chrome_path.as_deref()).is_some();

        let browser_launchable =
            !sandboxed && browser_engine_importable && launch_test(&options.browser).await;

        let caps = EnvironmentCapabilities {
            sandboxed,
            browser_engine_importable,
            browser_launchable,
        };
        tracing::info!(
            sandboxed,
            browser_engine_importable,
            browser_launchable,
            "environment probed"
        );
        caps
    }
}

fn sandbox_env_present<F>(is_set: F) -> bool
where
    F: Fn(&str) -> bool,
{
    SANDBOX_ENV_VARS.iter().any(|var| is_set(var))
}

async fn launch_test(options: &BrowserOptions) -> bool {
    match tokio::time::timeout(LAUNCH_TEST_TIMEOUT, BrowserSession::launch(options)).await {
        Ok(Ok(session)) => {
            session.close().await;
            true
        }
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "browser launch test failed");
            false
        }
        Err(_) => {
            tracing::debug!("browser launch test timed out");
            false
        }
    }
}
