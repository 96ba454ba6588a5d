use std::time::Duration;

use islandhop_core::config::{AppConfig, LoadOptions};
use islandhop_core::TourFeed;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::plain(output, exit_code);
    }

    CommandResult::plain(render_human(&report), exit_code)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_pricing_table(&config));
            checks.push(check_directions(&config));
            checks.push(check_origin_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["pricing_table", "directions_provider", "origin_reachability"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_pricing_table(config: &AppConfig) -> DoctorCheck {
    match config.pricing.validate() {
        Ok(()) => DoctorCheck {
            name: "pricing_table",
            status: CheckStatus::Pass,
            details: format!(
                "{} distance bands, floor {} per person, {} remote keywords",
                config.pricing.bands.len(),
                config.pricing.min_price_per_person,
                config.pricing.remote_surcharge.keywords.len()
            ),
        },
        Err(error) => DoctorCheck {
            name: "pricing_table",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_directions(config: &AppConfig) -> DoctorCheck {
    if config.maps.api_key.is_some() {
        DoctorCheck {
            name: "directions_provider",
            status: CheckStatus::Pass,
            details: format!("directions requests go to `{}`", config.maps.api_base),
        }
    } else {
        DoctorCheck {
            name: "directions_provider",
            status: CheckStatus::Skipped,
            details: "maps.api_key is unset; quotes need an explicit distance".to_string(),
        }
    }
}

fn check_origin_reachability(config: &AppConfig) -> DoctorCheck {
    let Some(origin_url) = config.proxy.origin_url.as_deref() else {
        return DoctorCheck {
            name: "origin_reachability",
            status: CheckStatus::Fail,
            details: "proxy.origin_url is not set".to_string(),
        };
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "origin_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let timeout = Duration::from_secs(config.proxy.request_timeout_secs);
    let client = config.proxy.default_client.as_str();
    let result = runtime.block_on(async {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| format!("failed to build http client: {error}"))?;
        let response = http
            .get(origin_url)
            .query(&[("client", client), ("mode", "all"), ("value", "")])
            .send()
            .await
            .map_err(|error| format!("origin request failed: {error}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("origin responded with {status}"));
        }

        response
            .json::<TourFeed>()
            .await
            .map_err(|error| format!("origin body is not a tour feed: {error}"))
    });

    match result {
        Ok(feed) => match feed.error {
            Some(error) => DoctorCheck {
                name: "origin_reachability",
                status: CheckStatus::Fail,
                details: format!("origin reported an error: {error}"),
            },
            None => DoctorCheck {
                name: "origin_reachability",
                status: CheckStatus::Pass,
                details: format!(
                    "origin returned {} tours (version {})",
                    feed.tours.len(),
                    feed.version.as_deref().unwrap_or("unknown")
                ),
            },
        },
        Err(error) => {
            DoctorCheck { name: "origin_reachability", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
