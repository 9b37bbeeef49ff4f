use crate::pricing::price_for;

/// Estimated cost in USD for one usage event.
///
/// The raw input count includes cached and cache-write tokens, so both tiers
/// are subtracted before the base input rate applies. The clamp to zero is
/// mandatory even though upstream counts are unsigned.
pub fn cost_for(model: &str, input: u64, output: u64, cached: u64, cache_write: u64) -> f64 {
    let p = price_for(model);

    let billed_input = input.saturating_sub(cached.saturating_add(cache_write));
    let cache_write_rate = p.cache_write.unwrap_or(p.input);

    billed_input as f64 / 1e6 * p.input
        + output as f64 / 1e6 * p.output
        + cached as f64 / 1e6 * p.cached
        + cache_write as f64 / 1e6 * cache_write_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    #[test]
    fn zero_tokens_cost_nothing() {
        approx(cost_for("gemini-3-pro-preview", 0, 0, 0, 0), 0.0);
        approx(cost_for("claude-sonnet-4-5", 0, 0, 0, 0), 0.0);
        approx(cost_for("totally-new-model-xyz", 0, 0, 0, 0), 0.0);
    }

    #[test]
    fn tiered_input_billing() {
        // 800k billed input, 500k output, 200k cached:
        // 0.8 * 2.00 + 0.5 * 12.00 + 0.2 * 0.20 = 7.64
        approx(cost_for("gemini-3-pro-preview", 1_000_000, 500_000, 200_000, 0), 7.64);
    }

    #[test]
    fn cache_write_tier_uses_premium_rate() {
        // All 100k input tokens are cache writes: billed input clamps to 0 and
        // only the 3.75/M cache-write rate applies.
        approx(
            cost_for("claude-sonnet-4-5 (thinking)", 100_000, 0, 0, 100_000),
            0.375,
        );
    }

    #[test]
    fn cache_write_defaults_to_input_rate() {
        // gemini entries declare no cache-write rate
        approx(
            cost_for("gemini-3-flash", 100_000, 0, 0, 100_000),
            0.1 * 0.50,
        );
    }

    #[test]
    fn unknown_model_is_free() {
        approx(cost_for("totally-new-model-xyz", 50_000, 50_000, 0, 0), 0.0);
    }

    #[test]
    fn billed_input_clamps_at_zero() {
        // cached + cache_write exceed input; no negative component may leak in
        let cost = cost_for("claude-sonnet-4-5", 100, 0, 500, 500);
        let expected = 500.0 / 1e6 * 0.30 + 500.0 / 1e6 * 3.75;
        approx(cost, expected);
    }
}
