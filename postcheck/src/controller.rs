use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use postcheck_common::{ConfigError, Platform, PollTimeouts, internal};
use postcheck_store::StoreConfig;
use serde::Deserialize;

use crate::{
    scenario::{Scenario, ScenarioContext},
    service::{LoopbackConfig, LoopbackMailService},
    suite::{SuiteReport, run_suite},
};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "POSTCHECK_CONFIG";

/// Root of the RON configuration file.
///
/// ```ron
/// Postcheck (
///     platform: (
///         app_id: "theappid",
///         admin_email: Some("admin@example.com"),
///         environment: Loopback,
///     ),
///     timeouts: (max_wait_secs: 10),
///     store: Memory(()),
/// )
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Postcheck {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub timeouts: PollTimeouts,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub loopback: LoopbackConfig,
}

impl Postcheck {
    /// # Errors
    ///
    /// If `config` is not valid RON for this structure.
    pub fn from_ron(config: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(config)?)
    }

    /// Read and parse the configuration at `path`.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&config)
    }

    /// Find the configuration file using the following precedence:
    /// 1. `POSTCHECK_CONFIG` environment variable
    /// 2. ./postcheck.config.ron (current working directory)
    /// 3. /etc/postcheck/postcheck.config.ron (system-wide config)
    ///
    /// # Errors
    ///
    /// If `POSTCHECK_CONFIG` names a missing file, or no file exists at the
    /// default locations.
    pub fn find_config_file() -> Result<PathBuf, ConfigError> {
        find_config_file_in(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            &[
                PathBuf::from("./postcheck.config.ron"),
                PathBuf::from("/etc/postcheck/postcheck.config.ron"),
            ],
        )
    }

    /// Wire the configured store and the loopback mail service into a
    /// scenario context.
    ///
    /// # Errors
    ///
    /// If the platform identity or the poll timings are invalid.
    pub fn into_context(self) -> Result<ScenarioContext, ConfigError> {
        self.platform.validate()?;
        self.timeouts.validate()?;

        let store = self.store.into_record_store();
        let service =
            LoopbackMailService::new(Arc::clone(&store), self.platform.clone(), &self.loopback);

        Ok(ScenarioContext::new(self.platform, Arc::new(service), store)
            .with_timeouts(self.timeouts))
    }

    /// Run `scenarios` against the configured platform.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid. Scenario failures are reported in
    /// the returned [`SuiteReport`].
    #[tracing::instrument(
        target = "postcheck::internal",
        level = "trace",
        skip_all,
        err,
        fields(domain = %self.platform.mail_domain())
    )]
    pub async fn run(self, scenarios: &[Scenario]) -> Result<SuiteReport, ConfigError> {
        internal!(
            level = INFO,
            "Running {} scenario(s) against {} ({})",
            scenarios.len(),
            self.platform.mail_domain(),
            self.platform.environment
        );

        let ctx = self.into_context()?;
        Ok(run_suite(&ctx, scenarios).await)
    }
}

fn find_config_file_in(
    from_env: Option<PathBuf>,
    default_paths: &[PathBuf],
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = from_env {
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::Invalid {
            field: CONFIG_ENV.to_string(),
            reason: format!("points to non-existent file: {}", path.display()),
        });
    }

    if let Some(path) = default_paths.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::NotFound {
        tried: format!("  - {CONFIG_ENV} environment variable\n{paths_tried}"),
    })
}
