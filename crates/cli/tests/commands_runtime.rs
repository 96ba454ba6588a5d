use std::env;
use std::sync::{Mutex, OnceLock};

use islandhop_cli::commands::{config, doctor, quote};
use islandhop_cli::QuoteArgs;
use serde_json::Value;

#[test]
fn quote_prices_remote_transfer_as_json() {
    with_env(&[], || {
        let result = quote::run(&quote_args("Sangster Airport", "Tryall Club", 15.0, Some("2")));
        assert_eq!(result.exit_code, 0, "expected successful quote");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["price_per_person"], 45.0);
        assert_eq!(payload["data"]["total_price"], 90.0);
        assert_eq!(payload["data"]["remote_surcharge_applied"], true);
    });
}

#[test]
fn quote_applies_floor_from_environment() {
    with_env(&[("ISLANDHOP_PRICING_MIN_PRICE_PER_PERSON", "50")], || {
        let result = quote::run(&quote_args("Negril", "Lucea", 5.0, None));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["price_per_person"], 50.0);
        assert_eq!(payload["data"]["passenger_count"], 1);
    });
}

#[test]
fn quote_falls_back_to_default_passengers_for_invalid_text() {
    with_env(&[], || {
        let result = quote::run(&quote_args("Negril", "Lucea", 12.0, Some("zero")));
        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["passenger_count"], 1);
        assert_eq!(payload["data"]["total_price"], 40.0);
    });
}

#[test]
fn quote_rejects_blank_locations() {
    with_env(&[], || {
        let result = quote::run(&quote_args("   ", "Tryall", 15.0, None));
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "missing_input");
    });
}

#[test]
fn quote_reports_config_failure() {
    with_env(&[("ISLANDHOP_SERVER_PORT", "not-a-port")], || {
        let result = quote::run(&quote_args("Negril", "Lucea", 5.0, None));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn human_quote_lists_pricing_trace() {
    with_env(&[], || {
        let mut args = quote_args("Sangster Airport", "Treasure Beach", 35.0, Some("3"));
        args.json = false;
        let result = quote::run(&args);

        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("quote: 65.00 per person, 195.00 total"));
        assert!(result.output.contains("remote surcharge applied: true"));
    });
}

#[test]
fn config_attributes_sources_and_redacts_maps_key() {
    with_env(&[("ISLANDHOP_MAPS_API_KEY", "AIzaSyNotARealKeyValue")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);

        assert!(result
            .output
            .contains("- maps.api_key = AIza*** (source: env (ISLANDHOP_MAPS_API_KEY))"));
        assert!(!result.output.contains("NotARealKeyValue"));
        assert!(result.output.contains("- server.port = 8787 (source: default)"));
        assert!(result.output.contains("- pricing.source = built-in default table"));
    });
}

#[test]
fn config_accepts_legacy_log_level_alias() {
    with_env(&[("ISLANDHOP_LOG_LEVEL", "debug")], || {
        let result = config::run();
        assert!(result
            .output
            .contains("- logging.level = debug (source: env (ISLANDHOP_LOG_LEVEL))"));
    });
}

#[test]
fn doctor_fails_without_origin_url() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let origin = find_check(&payload, "origin_reachability");
        assert_eq!(origin["status"], "fail");
        assert_eq!(find_check(&payload, "pricing_table")["status"], "pass");
        assert_eq!(find_check(&payload, "directions_provider")["status"], "skipped");
    });
}

#[test]
fn doctor_reports_unreachable_origin() {
    with_env(
        &[
            ("ISLANDHOP_PROXY_ORIGIN_URL", "http://127.0.0.1:9/exec"),
            ("ISLANDHOP_PROXY_REQUEST_TIMEOUT_SECS", "1"),
        ],
        || {
            let result = doctor::run(false);
            assert_eq!(result.exit_code, 1);
            assert!(result.output.contains("- [fail] origin_reachability"));
            assert!(result.output.contains("- [ok] config_validation"));
        },
    );
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[("ISLANDHOP_LOGGING_FORMAT", "xml")], || {
        let payload = parse_payload(&doctor::run(true).output);
        assert_eq!(find_check(&payload, "config_validation")["status"], "fail");
        assert_eq!(find_check(&payload, "origin_reachability")["status"], "skipped");
    });
}

fn quote_args(pickup: &str, dropoff: &str, distance_miles: f64, passengers: Option<&str>) -> QuoteArgs {
    QuoteArgs {
        pickup: pickup.to_string(),
        dropoff: dropoff.to_string(),
        distance_miles,
        duration_seconds: 0,
        passengers: passengers.map(str::to_string),
        json: true,
    }
}

fn find_check<'a>(payload: &'a Value, name: &str) -> &'a Value {
    payload["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .expect("check should be present in doctor report")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ISLANDHOP_SERVER_BIND_ADDRESS",
        "ISLANDHOP_SERVER_PORT",
        "ISLANDHOP_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ISLANDHOP_PROXY_ORIGIN_URL",
        "ISLANDHOP_PROXY_DEFAULT_CLIENT",
        "ISLANDHOP_PROXY_MAX_AGE_SECS",
        "ISLANDHOP_PROXY_STALE_WHILE_REVALIDATE_SECS",
        "ISLANDHOP_PROXY_REQUEST_TIMEOUT_SECS",
        "ISLANDHOP_MAPS_API_BASE",
        "ISLANDHOP_MAPS_API_KEY",
        "ISLANDHOP_MAPS_TIMEOUT_SECS",
        "ISLANDHOP_PRICING_MIN_PRICE_PER_PERSON",
        "ISLANDHOP_PRICING_REMOTE_SURCHARGE_PER_PERSON",
        "ISLANDHOP_PRICING_REMOTE_KEYWORDS",
        "ISLANDHOP_PRICING_DEFAULT_PASSENGERS",
        "ISLANDHOP_LOGGING_LEVEL",
        "ISLANDHOP_LOGGING_FORMAT",
        "ISLANDHOP_LOG_LEVEL",
        "ISLANDHOP_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
