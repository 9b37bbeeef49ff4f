mod adapters;
mod aggregate;
mod cli;
mod config;
mod cost;
mod output;
mod pricing;
mod project;
mod types;

use anyhow::Result;
use clap::Parser;
use rayon::prelude::*;

use cli::Cli;
use types::UsageEvent;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config();

    let date_range = match (cli.from, cli.to) {
        (Some(f), Some(t)) => Some((f, t)),
        (Some(f), None) => Some((f, chrono::Utc::now().date_naive())),
        (None, Some(t)) => Some((chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), t)),
        (None, None) => None,
    };

    let adapters = adapters::all_adapters();
    let events: Vec<UsageEvent> = adapters
        .par_iter()
        .flat_map_iter(|adapter| {
            let roots = match config.roots_for(adapter.name()) {
                Some(overridden) => overridden.clone(),
                None => adapter.default_roots(),
            };
            roots
                .into_iter()
                .flat_map(|root| adapter.produce_events(&root))
                .collect::<Vec<_>>()
        })
        .collect();

    let events: Vec<_> = if let Some((from, to)) = date_range {
        events
            .into_iter()
            .filter(|e| {
                let date = e.timestamp.date_naive();
                date >= from && date <= to
            })
            .collect()
    } else {
        events
    };

    let events: Vec<_> = if let Some(ref proj) = cli.project {
        let needle = proj.to_lowercase();
        events
            .into_iter()
            .filter(|e| {
                project::resolve_project(&e.project_hint)
                    .to_lowercase()
                    .contains(&needle)
            })
            .collect()
    } else {
        events
    };

    let events: Vec<_> = if let Some(ref tool) = cli.tool {
        let needle = tool.to_lowercase();
        events
            .into_iter()
            .filter(|e| e.tool.to_lowercase() == needle)
            .collect()
    } else {
        events
    };

    if events.is_empty() {
        eprintln!("No usage records found.");
        return Ok(());
    }

    eprintln!("Found {} usage records.", events.len());

    let unpriced = pricing::unpriced_models(&events);
    if !unpriced.is_empty() {
        eprintln!("No pricing data for: {}", unpriced.join(", "));
    }

    let report = aggregate::aggregate(&events);

    match cli.format {
        cli::OutputFormat::Json => output::print_json(&report),
        cli::OutputFormat::Table => output::print_report(&report),
    }

    Ok(())
}
