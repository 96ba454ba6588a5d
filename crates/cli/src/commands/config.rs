use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use islandhop_core::config::{AppConfig, LoadOptions, PricingSource};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let sources = Sources {
        doc: config_file_doc.as_ref(),
        path: config_file_path.as_deref(),
        pricing: &config.pricing_source,
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = sources.attribute(&field);
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.push(format!("- pricing.source = {}", describe_pricing_source(&config.pricing_source)));

    CommandResult::plain(lines.join("\n"), 0)
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let pricing = &config.pricing;

    vec![
        field(
            "server.bind_address",
            &["ISLANDHOP_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["ISLANDHOP_SERVER_PORT"], config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            &["ISLANDHOP_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "proxy.origin_url",
            &["ISLANDHOP_PROXY_ORIGIN_URL"],
            config.proxy.origin_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "proxy.default_client",
            &["ISLANDHOP_PROXY_DEFAULT_CLIENT"],
            config.proxy.default_client.clone(),
        ),
        field(
            "proxy.max_age_secs",
            &["ISLANDHOP_PROXY_MAX_AGE_SECS"],
            config.proxy.max_age_secs.to_string(),
        ),
        field(
            "proxy.stale_while_revalidate_secs",
            &["ISLANDHOP_PROXY_STALE_WHILE_REVALIDATE_SECS"],
            config.proxy.stale_while_revalidate_secs.to_string(),
        ),
        field(
            "proxy.request_timeout_secs",
            &["ISLANDHOP_PROXY_REQUEST_TIMEOUT_SECS"],
            config.proxy.request_timeout_secs.to_string(),
        ),
        field("maps.api_base", &["ISLANDHOP_MAPS_API_BASE"], config.maps.api_base.clone()),
        field(
            "maps.api_key",
            &["ISLANDHOP_MAPS_API_KEY"],
            config
                .maps
                .api_key
                .as_ref()
                .map(|key| redact_key(key.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "maps.timeout_secs",
            &["ISLANDHOP_MAPS_TIMEOUT_SECS"],
            config.maps.timeout_secs.to_string(),
        ),
        field("pricing.bands", &[], describe_bands(config)),
        field(
            "pricing.min_price_per_person",
            &["ISLANDHOP_PRICING_MIN_PRICE_PER_PERSON"],
            pricing.min_price_per_person.to_string(),
        ),
        field(
            "pricing.remote_keywords",
            &["ISLANDHOP_PRICING_REMOTE_KEYWORDS"],
            pricing.remote_surcharge.keywords.join(", "),
        ),
        field(
            "pricing.remote_surcharge_per_person",
            &["ISLANDHOP_PRICING_REMOTE_SURCHARGE_PER_PERSON"],
            pricing.remote_surcharge.surcharge_per_person.to_string(),
        ),
        field(
            "pricing.default_passengers",
            &["ISLANDHOP_PRICING_DEFAULT_PASSENGERS"],
            pricing.default_passengers.to_string(),
        ),
        field(
            "logging.level",
            &["ISLANDHOP_LOGGING_LEVEL", "ISLANDHOP_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["ISLANDHOP_LOGGING_FORMAT", "ISLANDHOP_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

struct Sources<'a> {
    doc: Option<&'a Value>,
    path: Option<&'a Path>,
    pricing: &'a PricingSource,
}

impl Sources<'_> {
    fn attribute(&self, field: &Field) -> String {
        if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.doc {
            if contains_path(doc, field.key) {
                let file_path = self
                    .path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        if let (Some(pricing_key), PricingSource::LegacyFile(path)) =
            (field.key.strip_prefix("pricing."), self.pricing)
        {
            let legacy_doc = load_config_file_doc(Some(path));
            if legacy_doc.as_ref().is_some_and(|doc| contains_path(doc, pricing_key)) {
                return format!("file ({})", path.display());
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    ["islandhop.toml", "config/islandhop.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn describe_bands(config: &AppConfig) -> String {
    let mut lower = 0.0;
    let mut parts = Vec::with_capacity(config.pricing.bands.len());
    for band in &config.pricing.bands {
        match band.max_miles_exclusive {
            Some(upper) => {
                parts.push(format!("[{lower}, {upper}) -> {}", band.price_per_person));
                lower = upper;
            }
            None => parts.push(format!("[{lower}, ∞) -> {}", band.price_per_person)),
        }
    }
    parts.join("; ")
}

fn describe_pricing_source(source: &PricingSource) -> String {
    match source {
        PricingSource::ConfigFile => "config file [pricing] section".to_string(),
        PricingSource::LegacyFile(path) => format!("legacy pricing file ({})", path.display()),
        PricingSource::Default { fallback_reasons } if fallback_reasons.is_empty() => {
            "built-in default table".to_string()
        }
        PricingSource::Default { fallback_reasons } => {
            format!("built-in default table (fell back because: {})", fallback_reasons.join("; "))
        }
    }
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.get(..4) {
        Some(prefix) if trimmed.len() > 8 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use islandhop_core::config::{AppConfig, PricingSource};

    use super::{describe_bands, describe_pricing_source, redact_key};

    #[test]
    fn maps_key_keeps_only_a_short_prefix() {
        assert_eq!(redact_key("AIzaSyExampleExample"), "AIza***");
        assert_eq!(redact_key("short"), "<redacted>");
        assert_eq!(redact_key("   "), "<empty>");
    }

    #[test]
    fn default_bands_render_as_half_open_ranges() {
        let rendered = describe_bands(&AppConfig::default());
        assert!(rendered.starts_with("[0, 10) -> 30"));
        assert!(rendered.ends_with("[40, ∞) -> 70"));
    }

    #[test]
    fn default_pricing_source_explains_why_earlier_sources_were_skipped() {
        let source = PricingSource::Default {
            fallback_reasons: vec![
                "configuration validation failed: no [pricing] section".to_string(),
                "could not parse config file `pricing.toml`: invalid type".to_string(),
            ],
        };

        assert_eq!(
            describe_pricing_source(&source),
            "built-in default table (fell back because: configuration validation failed: no \
             [pricing] section; could not parse config file `pricing.toml`: invalid type)"
        );
        assert_eq!(
            describe_pricing_source(&PricingSource::Default { fallback_reasons: Vec::new() }),
            "built-in default table"
        );
    }
}
