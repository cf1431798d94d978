use clap::Subcommand;
use serde_json::json;
use sitebudget_core::clock::now_ms;
use sitebudget_core::domain::normalize_domain;
use sitebudget_core::format::format_time_tracking;
use sitebudget_core::Period;

use super::{block_on, CliResult, Context};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Time spent on one domain
    Show {
        domain: String,
        /// 24h, 7d, 30d or alltime
        #[arg(long, default_value = "24h")]
        period: Period,
    },
    /// Wipe usage history for one domain, or for all when omitted
    Reset {
        domain: Option<String>,
    },
    /// Drop daily totals older than the retention window
    Prune,
}

pub fn run(ctx: &Context, action: StatsAction) -> CliResult {
    let registry = ctx.registry()?;

    match action {
        StatsAction::Show { domain, period } => {
            let domain = normalize_domain(&domain);
            let now = now_ms();
            let tracking = block_on(registry.records().time_tracking())??;
            let seconds = tracking
                .get(&domain)
                .map_or(0, |record| record.time_spent(period, now));
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "domain": domain,
                    "period": period,
                    "seconds": seconds,
                    "formatted": format_time_tracking(seconds),
                }))?
            );
        }
        StatsAction::Reset { domain: Some(domain) } => {
            if block_on(registry.reset_statistics(&domain, now_ms()))?? {
                println!("Statistics reset for {domain}");
            } else {
                println!("No statistics recorded for {domain}");
            }
        }
        StatsAction::Reset { domain: None } => {
            let count = block_on(registry.reset_all_statistics(now_ms()))??;
            println!("Statistics reset for {count} domains");
        }
        StatsAction::Prune => {
            let config = ctx.config()?;
            let removed = block_on(
                registry
                    .records()
                    .prune_history(now_ms(), config.history.retention_days),
            )??;
            println!("Removed {removed} daily entries");
        }
    }
    Ok(())
}
