use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fallback::try_in_order;
use crate::pricing::{PricingBand, PricingConfig};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub maps: MapsConfig,
    pub pricing: PricingConfig,
    pub pricing_source: PricingSource,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub origin_url: Option<String>,
    pub default_client: String,
    pub max_age_secs: u64,
    pub stale_while_revalidate_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MapsConfig {
    pub api_base: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PricingSource {
    ConfigFile,
    LegacyFile(PathBuf),
    /// Built-in table; `fallback_reasons` lists why each earlier source was passed over.
    Default { fallback_reasons: Vec<String> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub origin_url: Option<String>,
    pub default_client: Option<String>,
    pub maps_api_key: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub legacy_pricing_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8787,
                graceful_shutdown_secs: 15,
            },
            proxy: ProxyConfig {
                origin_url: None,
                default_client: "default".to_string(),
                max_age_secs: 300,
                stale_while_revalidate_secs: 60,
                request_timeout_secs: 30,
            },
            maps: MapsConfig {
                api_base: "maps.googleapis.com".to_string(),
                api_key: None,
                timeout_secs: 10,
            },
            pricing: PricingConfig::default(),
            pricing_source: PricingSource::Default { fallback_reasons: Vec::new() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        let mut pricing_patch = None;
        if let Some(path) = maybe_path {
            let mut patch = read_patch(&path)?;
            pricing_patch = patch.pricing.take();
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("islandhop.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        let (pricing, source) =
            resolve_pricing(pricing_patch, options.legacy_pricing_path.as_deref());
        config.pricing = pricing;
        config.pricing_source = source;

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(proxy) = patch.proxy {
            if let Some(origin_url) = proxy.origin_url {
                self.proxy.origin_url = Some(origin_url);
            }
            if let Some(default_client) = proxy.default_client {
                self.proxy.default_client = default_client;
            }
            if let Some(max_age_secs) = proxy.max_age_secs {
                self.proxy.max_age_secs = max_age_secs;
            }
            if let Some(stale_secs) = proxy.stale_while_revalidate_secs {
                self.proxy.stale_while_revalidate_secs = stale_secs;
            }
            if let Some(request_timeout_secs) = proxy.request_timeout_secs {
                self.proxy.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(maps) = patch.maps {
            if let Some(api_base) = maps.api_base {
                self.maps.api_base = api_base;
            }
            if let Some(api_key) = maps.api_key {
                self.maps.api_key = Some(api_key.into());
            }
            if let Some(timeout_secs) = maps.timeout_secs {
                self.maps.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ISLANDHOP_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ISLANDHOP_SERVER_PORT") {
            self.server.port = parse_u16("ISLANDHOP_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ISLANDHOP_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ISLANDHOP_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("ISLANDHOP_PROXY_ORIGIN_URL") {
            self.proxy.origin_url = Some(value);
        }
        if let Some(value) = read_env("ISLANDHOP_PROXY_DEFAULT_CLIENT") {
            self.proxy.default_client = value;
        }
        if let Some(value) = read_env("ISLANDHOP_PROXY_MAX_AGE_SECS") {
            self.proxy.max_age_secs = parse_u64("ISLANDHOP_PROXY_MAX_AGE_SECS", &value)?;
        }
        if let Some(value) = read_env("ISLANDHOP_PROXY_STALE_WHILE_REVALIDATE_SECS") {
            self.proxy.stale_while_revalidate_secs =
                parse_u64("ISLANDHOP_PROXY_STALE_WHILE_REVALIDATE_SECS", &value)?;
        }
        if let Some(value) = read_env("ISLANDHOP_PROXY_REQUEST_TIMEOUT_SECS") {
            self.proxy.request_timeout_secs =
                parse_u64("ISLANDHOP_PROXY_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ISLANDHOP_MAPS_API_BASE") {
            self.maps.api_base = value;
        }
        if let Some(value) = read_env("ISLANDHOP_MAPS_API_KEY") {
            self.maps.api_key = Some(value.into());
        }
        if let Some(value) = read_env("ISLANDHOP_MAPS_TIMEOUT_SECS") {
            self.maps.timeout_secs = parse_u64("ISLANDHOP_MAPS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ISLANDHOP_PRICING_MIN_PRICE_PER_PERSON") {
            self.pricing.min_price_per_person =
                parse_decimal("ISLANDHOP_PRICING_MIN_PRICE_PER_PERSON", &value)?;
        }
        if let Some(value) = read_env("ISLANDHOP_PRICING_REMOTE_SURCHARGE_PER_PERSON") {
            self.pricing.remote_surcharge.surcharge_per_person =
                parse_decimal("ISLANDHOP_PRICING_REMOTE_SURCHARGE_PER_PERSON", &value)?;
        }
        if let Some(value) = read_env("ISLANDHOP_PRICING_REMOTE_KEYWORDS") {
            self.pricing.remote_surcharge.keywords = value
                .split(',')
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = read_env("ISLANDHOP_PRICING_DEFAULT_PASSENGERS") {
            self.pricing.default_passengers =
                parse_u32("ISLANDHOP_PRICING_DEFAULT_PASSENGERS", &value)?;
        }

        let log_level =
            read_env("ISLANDHOP_LOGGING_LEVEL").or_else(|| read_env("ISLANDHOP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ISLANDHOP_LOGGING_FORMAT").or_else(|| read_env("ISLANDHOP_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(origin_url) = overrides.origin_url {
            self.proxy.origin_url = Some(origin_url);
        }
        if let Some(default_client) = overrides.default_client {
            self.proxy.default_client = default_client;
        }
        if let Some(maps_api_key) = overrides.maps_api_key {
            self.maps.api_key = Some(maps_api_key.into());
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_proxy(&self.proxy)?;
        validate_maps(&self.maps)?;
        self.pricing.validate().map_err(|error| ConfigError::Validation(error.to_string()))?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("islandhop.toml"), PathBuf::from("config/islandhop.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn resolve_legacy_pricing_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricing.toml"), PathBuf::from("config/pricing.toml")]
        .into_iter()
        .find(|path| path.exists())
}

/// Pricing comes from `[pricing]` in the main file, then a legacy `pricing.toml`, then defaults.
fn resolve_pricing(
    main: Option<PricingPatch>,
    legacy_path: Option<&Path>,
) -> (PricingConfig, PricingSource) {
    let providers: [Box<dyn FnOnce() -> Result<(PricingConfig, PricingSource), ConfigError>>; 2] = [
        Box::new(move || {
            main.map(|patch| (patch.apply(PricingConfig::default()), PricingSource::ConfigFile))
                .ok_or_else(|| ConfigError::Validation("no [pricing] section".to_string()))
        }),
        Box::new({
            let legacy_path = legacy_path.map(Path::to_path_buf);
            move || {
                let path = resolve_legacy_pricing_path(legacy_path.as_deref()).ok_or_else(|| {
                    ConfigError::MissingConfigFile(PathBuf::from("pricing.toml"))
                })?;
                let patch = read_legacy_pricing(&path)?;
                Ok((patch.apply(PricingConfig::default()), PricingSource::LegacyFile(path)))
            }
        }),
    ];

    try_in_order(providers).unwrap_or_else(|fallback| {
        let fallback_reasons = fallback.attempts.iter().map(ToString::to_string).collect();
        (PricingConfig::default(), PricingSource::Default { fallback_reasons })
    })
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_legacy_pricing(path: &Path) -> Result<PricingPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<PricingPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_proxy(proxy: &ProxyConfig) -> Result<(), ConfigError> {
    if let Some(origin_url) = &proxy.origin_url {
        if !origin_url.starts_with("http://") && !origin_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "proxy.origin_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if proxy.default_client.trim().is_empty() {
        return Err(ConfigError::Validation(
            "proxy.default_client must not be empty".to_string(),
        ));
    }

    if proxy.request_timeout_secs == 0 || proxy.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "proxy.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_maps(maps: &MapsConfig) -> Result<(), ConfigError> {
    if maps.api_base.trim().is_empty() {
        return Err(ConfigError::Validation("maps.api_base must not be empty".to_string()));
    }

    if let Some(api_key) = &maps.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "maps.api_key must not be blank when set".to_string(),
            ));
        }
    }

    if maps.timeout_secs == 0 || maps.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "maps.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    proxy: Option<ProxyPatch>,
    maps: Option<MapsPatch>,
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProxyPatch {
    origin_url: Option<String>,
    default_client: Option<String>,
    max_age_secs: Option<u64>,
    stale_while_revalidate_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MapsPatch {
    api_base: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    bands: Option<Vec<PricingBand>>,
    min_price_per_person: Option<Decimal>,
    remote_keywords: Option<Vec<String>>,
    remote_surcharge_per_person: Option<Decimal>,
    default_passengers: Option<u32>,
}

impl PricingPatch {
    fn apply(self, mut pricing: PricingConfig) -> PricingConfig {
        if let Some(bands) = self.bands {
            pricing.bands = bands;
        }
        if let Some(min_price_per_person) = self.min_price_per_person {
            pricing.min_price_per_person = min_price_per_person;
        }
        if let Some(keywords) = self.remote_keywords {
            pricing.remote_surcharge.keywords = keywords;
        }
        if let Some(surcharge) = self.remote_surcharge_per_person {
            pricing.remote_surcharge.surcharge_per_person = surcharge;
        }
        if let Some(default_passengers) = self.default_passengers {
            pricing.default_passengers = default_passengers;
        }
        pricing
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
