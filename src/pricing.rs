use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::types::UsageEvent;

/// Per-model pricing in USD per 1,000,000 tokens.
///
/// `cache_write` is the premium rate for populating a provider-side prompt
/// cache; when absent, cache-write tokens bill at the base input rate.
#[derive(Debug, Clone)]
pub struct PricingEntry {
    pub input: f64,
    pub output: f64,
    pub cached: f64,
    pub cache_write: Option<f64>,
}

const fn entry(input: f64, output: f64, cached: f64) -> PricingEntry {
    PricingEntry {
        input,
        output,
        cached,
        cache_write: None,
    }
}

const fn entry_cw(input: f64, output: f64, cached: f64, cache_write: f64) -> PricingEntry {
    PricingEntry {
        input,
        output,
        cached,
        cache_write: Some(cache_write),
    }
}

/// Static pricing table, keyed by normalized model id.
static PRICING: &[(&str, PricingEntry)] = &[
    // Gemini
    ("gemini-3-pro", entry(2.00, 12.00, 0.20)),
    ("gemini-3-pro-preview", entry(2.00, 12.00, 0.20)),
    ("gemini-3-flash", entry(0.50, 3.00, 0.05)),
    ("gemini-3-flash-preview", entry(0.50, 3.00, 0.05)),
    ("gemini-2.5-pro", entry(1.25, 10.00, 0.125)),
    ("gemini-2.5-flash", entry(0.30, 1.20, 0.03)),
    ("gemini-2.5-flash-lite", entry(0.10, 0.40, 0.01)),
    // OpenAI / Codex CLI
    ("gpt-5.2", entry(1.75, 14.00, 0.175)),
    ("gpt-5.2-instant", entry(1.75, 14.00, 0.175)),
    ("gpt-5.2-thinking", entry(1.75, 14.00, 0.175)),
    ("gpt-5.2-pro", entry(21.00, 168.00, 2.10)),
    ("gpt-5.2-codex", entry(1.75, 14.00, 0.175)),
    ("gpt-5-pro", entry(15.00, 120.00, 1.50)),
    ("o1-pro", entry(150.00, 600.00, 15.00)),
    ("o3-pro", entry(20.00, 80.00, 2.00)),
    ("o3-deep-research", entry(10.00, 40.00, 1.00)),
    ("gpt-4-0314", entry(30.00, 60.00, 3.00)),
    ("gpt-4", entry(30.00, 60.00, 3.00)),
    ("gpt-5.1", entry(1.25, 10.00, 0.125)),
    ("gpt-5.1-codex-max", entry(1.25, 10.00, 0.125)),
    ("gpt-5.1-codex-mini", entry(0.25, 2.00, 0.025)),
    ("gpt-5-nano", entry(0.05, 0.40, 0.005)),
    ("gpt-5-codex", entry(0.50, 1.50, 0.025)),
    ("gpt-5.3-codex", entry(0.30, 1.20, 0.025)),
    ("gpt-4-codex", entry(2.00, 6.00, 0.50)),
    ("o3-mini", entry(1.10, 4.40, 0.55)),
    ("o1", entry(15.00, 60.00, 7.50)),
    ("gpt-4o", entry(2.50, 10.00, 1.25)),
    // Anthropic; cache writes bill at 1.25x the input rate
    ("claude-opus-4-6", entry_cw(5.00, 25.00, 0.50, 6.25)),
    ("claude-opus-4-5", entry_cw(5.00, 25.00, 0.50, 6.25)),
    ("claude-sonnet-4-5", entry_cw(3.00, 15.00, 0.30, 3.75)),
    ("claude-sonnet-4", entry_cw(3.00, 15.00, 0.30, 3.75)),
    ("claude-haiku-4-5", entry_cw(1.00, 5.00, 0.10, 1.25)),
    ("claude-opus-4-1", entry_cw(15.00, 75.00, 1.50, 18.75)),
    ("claude-3-7-sonnet", entry_cw(3.00, 15.00, 0.30, 3.75)),
    ("claude-3-5-sonnet", entry_cw(3.00, 15.00, 0.30, 3.75)),
    ("claude-3-opus", entry_cw(15.00, 75.00, 1.50, 18.75)),
    // Moonshot / Zhipu / MiniMax
    ("kimi-k2-5", entry(0.60, 3.00, 0.15)),
    ("kimi-k2.5", entry(0.60, 3.00, 0.15)),
    ("kimi-k2", entry(0.60, 3.00, 0.15)),
    ("kimi-k1.5", entry(0.60, 3.00, 0.15)),
    ("glm-4-7", entry(0.60, 2.20, 0.11)),
    ("glm-4-6", entry(0.60, 2.20, 0.11)),
    ("glm-5", entry(0.80, 2.56, 0.08)),
    ("minimax-m2.1", entry(0.30, 1.20, 0.03)),
    ("minimax-m2.5", entry(0.30, 1.20, 0.03)),
    ("minimax-m2-5", entry(0.30, 1.20, 0.03)),
    ("minimax-m2-1", entry(0.30, 1.20, 0.03)),
    // Qwen
    ("qwen-2.5-coder-32b-instruct", entry(0.20, 0.20, 0.02)),
    ("qwen-2.5-72b-instruct", entry(0.36, 0.36, 0.036)),
    ("qwen-2.5-vl-72b-instruct", entry(0.40, 0.40, 0.04)),
    ("qwen-2.5-vl-7b-instruct", entry(0.10, 0.10, 0.01)),
    ("qwen-2.5-7b-instruct", entry(0.05, 0.05, 0.005)),
    ("qwen-qwq-32b", entry(0.20, 0.20, 0.02)),
    ("qwen-2.5-max", entry(1.60, 6.40, 0.16)),
    ("qwen-2.5-plus", entry(0.40, 1.20, 0.04)),
    ("qwen-3-235b-a22b", entry(0.20, 0.60, 0.02)),
    ("qwen-3-30b-a3b", entry(0.05, 0.15, 0.005)),
    ("qwen-3-32b", entry(0.20, 0.20, 0.02)),
    ("qwen-3-8b", entry(0.05, 0.05, 0.005)),
    ("qwen-3-4b", entry(0.02, 0.02, 0.002)),
    ("qwen-3-0.6b", entry(0.01, 0.01, 0.001)),
    // xAI
    ("grok-code-fast-1", entry(0.20, 1.50, 0.02)),
    ("grok-3", entry(0.20, 1.50, 0.02)),
    ("grok-3-mini", entry(0.10, 0.50, 0.01)),
    // Mistral
    ("devstral-2512", entry(0.05, 0.22, 0.005)),
    ("mistral-large-2411", entry(2.00, 6.00, 0.50)),
    ("mistral-small-2501", entry(0.10, 0.30, 0.025)),
    // Stealth models with no public pricing
    ("pony-alpha", entry(0.0, 0.0, 0.0)),
    ("giga-potato", entry(0.0, 0.0, 0.0)),
];

/// Zero-priced fallback for models the table doesn't know. Token counts stay
/// meaningful while spend is never invented.
pub static DEFAULT_PRICING: PricingEntry = entry(0.0, 0.0, 0.0);

static TABLE: LazyLock<HashMap<&'static str, &'static PricingEntry>> =
    LazyLock::new(|| PRICING.iter().map(|(name, e)| (*name, e)).collect());

/// Look up pricing for a raw model string: exact match first, then a retry
/// after normalization, else the zero-priced default.
pub fn price_for(model: &str) -> &'static PricingEntry {
    if let Some(e) = TABLE.get(model) {
        return e;
    }
    TABLE
        .get(normalize_model(model).as_str())
        .copied()
        .unwrap_or(&DEFAULT_PRICING)
}

pub fn is_priced(model: &str) -> bool {
    TABLE.contains_key(model) || TABLE.contains_key(normalize_model(model).as_str())
}

/// Normalize a free-form model identifier for pricing lookup:
/// strip a trailing `-YYYYMMDD` date, a `:free` marker, a `(thinking)` or
/// `(high|low|medium)` qualifier, then hyphenate spaces and lowercase.
pub fn normalize_model(model: &str) -> String {
    let mut s = model.trim().to_string();

    // Trailing date suffix: 8 digits preceded by '-'
    if s.len() > 9
        && s.as_bytes()[s.len() - 9] == b'-'
        && s[s.len() - 8..].chars().all(|c| c.is_ascii_digit())
    {
        s.truncate(s.len() - 9);
    }

    if s.ends_with(":free") {
        s.truncate(s.len() - ":free".len());
    }

    s = strip_paren_qualifier(s, &["thinking"]);
    s = strip_paren_qualifier(s, &["high", "low", "medium"]);

    s.replace(' ', "-").to_lowercase()
}

/// Remove a trailing `(word)` qualifier, case-insensitive, plus any
/// whitespace before it.
fn strip_paren_qualifier(s: String, words: &[&str]) -> String {
    let lower = s.to_ascii_lowercase();
    for word in words {
        let suffix = format!("({word})");
        if lower.ends_with(&suffix) {
            let cut = s.len() - suffix.len();
            return s[..cut].trim_end().to_string();
        }
    }
    s
}

/// Normalized models that appeared in events but have no pricing entry.
pub fn unpriced_models(events: &[UsageEvent]) -> Vec<String> {
    let mut models: Vec<String> = events
        .iter()
        .map(|e| normalize_model(&e.model))
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|m| !is_priced(m))
        .collect();
    models.sort();
    models
}
