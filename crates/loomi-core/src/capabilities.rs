use serde::Serialize;

/// Snapshot of what the current process is able to do, computed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EnvironmentCapabilities {
    /// Running inside a constrained sandbox where launching a browser is not allowed.
    pub sandboxed: bool,
    /// The rendering engine is compiled in and a browser executable was found.
    pub browser_engine_importable: bool,
    /// A headless browser was actually launched and shut down during the probe.
    pub browser_launchable: bool,
}

impl EnvironmentCapabilities {
    /// Capabilities of a process that can only do plain HTTP.
    #[must_use]
    pub const fn static_only() -> Self {
        Self {
            sandboxed: false,
            browser_engine_importable: false,
            browser_launchable: false,
        }
    }

    /// Capabilities of a process with a working browser engine.
    #[must_use]
    pub const fn with_browser() -> Self {
        Self {
            sandboxed: false,
            browser_engine_importable: true,
            browser_launchable: true,
        }
    }

    /// Each flag with its human-readable label, in display order.
    #[must_use]
    pub fn flags(&self) -> [(&'static str, bool); 3] {
        [
            ("sandboxed", self.sandboxed),
            ("browser engine importable", self.browser_engine_importable),
            ("browser launchable", self.browser_launchable),
        ]
    }

    /// Explains why browser rendering cannot run, or `None` when it can.
    #[must_use]
    pub fn browser_blocker(&self) -> Option<&'static str> {
        if self.browser_launchable {
            None
        } else if self.sandboxed {
            Some("running in a sandboxed environment; browser launch is not permitted")
        } else if !self.browser_engine_importable {
            Some("browser engine not available (not compiled in or no browser executable found)")
        } else {
            Some("browser engine is installed but failed to launch")
        }
    }
}
