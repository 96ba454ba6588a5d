use islandhop_core::config::{AppConfig, LoadOptions};
use islandhop_core::{
    parse_passengers, DeterministicPricingEngine, PricingEngine, QuoteRequest, QuoteResult,
};
use rust_decimal::Decimal;

use crate::commands::CommandResult;
use crate::QuoteArgs;

const COMMAND: &str = "quote";

pub fn run(args: &QuoteArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    if args.pickup.trim().is_empty() || args.dropoff.trim().is_empty() {
        return CommandResult::failure(
            COMMAND,
            "missing_input",
            "both --pickup and --dropoff must be non-empty",
            1,
        );
    }

    let request = QuoteRequest {
        pickup_text: args.pickup.trim().to_string(),
        dropoff_text: args.dropoff.trim().to_string(),
        distance_miles: args.distance_miles,
        duration_seconds: args.duration_seconds,
        passenger_count: args.passengers.as_deref().and_then(parse_passengers),
    };
    let result = DeterministicPricingEngine::new(config.pricing).price(&request);

    if args.json {
        return match serde_json::to_value(&result) {
            Ok(data) => CommandResult::success(COMMAND, summary(&result), Some(data)),
            Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
        };
    }

    CommandResult::plain(render_human(&result), 0)
}

fn summary(result: &QuoteResult) -> String {
    format!(
        "{} per person, {} total for {} passenger(s)",
        money(result.price_per_person),
        money(result.total_price),
        result.passenger_count
    )
}

fn render_human(result: &QuoteResult) -> String {
    let mut lines = vec![
        format!("quote: {}", summary(result)),
        format!(
            "- distance: {:.1} mi, duration: {} min",
            result.distance_miles,
            result.duration_seconds / 60
        ),
        format!("- remote surcharge applied: {}", result.remote_surcharge_applied),
    ];

    for step in &result.trace.steps {
        lines.push(format!("  - {}: {} ({})", step.stage, money(step.amount), step.detail));
    }

    lines.join("\n")
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::money;

    #[test]
    fn money_renders_two_decimal_places() {
        assert_eq!(money(Decimal::from(45)), "45.00");
        assert_eq!(money(Decimal::new(12346, 3)), "12.35");
    }
}
