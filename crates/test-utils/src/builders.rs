#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use buildwatch::engine::WatchSettings;
use buildwatch::types::{DebounceWindow, MonitoredFileSet, ProcessPattern, UserScope, WatchBackend};

/// Builder for `WatchSettings` to simplify test setup.
///
/// Defaults: 25 ms debounce, `self-and-root` scope, pattern `builder`,
/// native backend with a 50 ms retry interval.
pub struct SettingsBuilder {
    paths: Vec<PathBuf>,
    scope: UserScope,
    pattern: String,
    debounce: Duration,
    backend: WatchBackend,
    poll_interval: Duration,
    retry_interval: Duration,
    query_on_start: bool,
    shutdown_grace: Duration,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            scope: UserScope::CurrentUserAndRoot,
            pattern: "builder".to_string(),
            debounce: Duration::from_millis(25),
            backend: WatchBackend::Native,
            poll_interval: Duration::from_millis(50),
            retry_interval: Duration::from_millis(50),
            query_on_start: false,
            shutdown_grace: Duration::from_millis(100),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_scope(mut self, scope: UserScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = pattern.to_string();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_poll_backend(mut self, interval: Duration) -> Self {
        self.backend = WatchBackend::Poll;
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_query_on_start(mut self, on: bool) -> Self {
        self.query_on_start = on;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn build(self) -> WatchSettings {
        let paths = MonitoredFileSet::new(self.paths).expect("builder needs at least one path");
        let pattern = ProcessPattern::new(self.pattern).expect("invalid pattern in builder");
        let debounce = DebounceWindow::new(self.debounce).expect("invalid debounce in builder");

        let mut settings = WatchSettings::new(paths, self.scope, pattern, debounce);
        settings.watch.backend = self.backend;
        settings.watch.poll_interval = self.poll_interval;
        settings.watch.retry_interval = self.retry_interval;
        settings.query_on_start = self.query_on_start;
        settings.shutdown_grace = self.shutdown_grace;
        settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
