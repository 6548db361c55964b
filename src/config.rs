use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::fields::FieldId;
use crate::packet::GatePolicy;
use crate::rulebook::{CategoryRulebook, LookupPolicy};

pub const CONFIG_FILE: &str = "product-onboarding.toml";
pub const RC_FILE: &str = ".product-onboarding-rc";
pub const ENV_PREFIX: &str = "PRODUCT_ONBOARDING";

/// Main configuration structure for the onboarding engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OnboardingConfig {
    pub observability: ObservabilityConfig,
    pub rules: RulesConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RulesConfig {
    /// Fail on unregistered categories instead of treating them as rule-free
    pub strict_categories: bool,
    pub gate_policy: GatePolicy,
    /// Prefix of generated packet ids
    pub packet_id_prefix: String,
    /// Category id -> replacement rule list
    pub categories: BTreeMap<String, Vec<FieldId>>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            strict_categories: false,
            gate_policy: GatePolicy::ManagerBlocking,
            packet_id_prefix: "REQ".to_string(),
            categories: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DispatchConfig {
    pub delivery_timeout_seconds: u64,
    /// Reject enqueue when a destination's required fields are missing
    pub block_on_missing_fields: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_seconds: 30,
            block_on_missing_fields: false,
        }
    }
}

impl RulesConfig {
    pub fn lookup_policy(&self) -> LookupPolicy {
        if self.strict_categories {
            LookupPolicy::Strict
        } else {
            LookupPolicy::Lenient
        }
    }

    /// Default taxonomy with the configured overrides applied.
    pub fn build_rulebook(&self) -> CategoryRulebook {
        let mut rulebook = CategoryRulebook::default();
        for (category_id, fields) in &self.categories {
            rulebook.set_requirements(category_id, fields.iter().copied());
        }
        rulebook
    }
}

impl DispatchConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_seconds)
    }
}

impl OnboardingConfig {
    /// Load configuration from the current directory.
    ///
    /// Precedence, lowest first:
    /// 1. Default values
    /// 2. `product-onboarding.toml`, then `.product-onboarding-rc`
    /// 3. Environment variables (`PRODUCT_ONBOARDING_RULES__GATE_POLICY=any_blocking`)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        for name in [CONFIG_FILE, RC_FILE] {
            let path = dir.join(name);
            if path.exists() {
                let path = path.to_string_lossy().into_owned();
                builder = builder.add_source(File::new(&path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: OnboardingConfig = builder.build()?.try_deserialize()?;
        Ok(loaded)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<OnboardingConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = OnboardingConfig::load_env_file();
        OnboardingConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static OnboardingConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let loaded = config()?;
    tracing::info!(
        gate_policy = ?loaded.rules.gate_policy,
        strict_categories = loaded.rules.strict_categories,
        "Configuration loaded successfully"
    );
    Ok(())
}
