use clap::Subcommand;
use serde_json::json;
use sitebudget_core::clock::now_ms;
use sitebudget_core::domain::normalize_domain;
use sitebudget_core::format::{format_time, format_time_tracking};
use sitebudget_core::ValidationError;

use super::{block_on, CliResult, Context};

#[derive(Subcommand)]
pub enum DomainAction {
    /// Start tracking a domain or URL
    Add {
        /// Domain or URL (e.g. "reddit.com", "https://x.com/home")
        input: String,
        /// Daily budget in minutes (default from config)
        #[arg(long)]
        minutes: Option<i64>,
        /// Hours between budget resets (default from config)
        #[arg(long)]
        interval: Option<u32>,
    },
    /// Stop tracking a domain (usage history is kept)
    Remove {
        domain: String,
    },
    /// List tracked domains with remaining budget and usage
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a domain's budget and reset interval
    Set {
        domain: String,
        /// New budget in minutes
        #[arg(long)]
        minutes: Option<i64>,
        /// New reset interval in hours
        #[arg(long)]
        interval: Option<u32>,
    },
    /// Replenish every budget now
    ResetAll,
    /// Show the reset interval, or apply one to every domain
    Interval {
        hours: Option<u32>,
    },
}

pub fn run(ctx: &Context, action: DomainAction) -> CliResult {
    let registry = ctx.registry()?;

    match action {
        DomainAction::Add {
            input,
            minutes,
            interval,
        } => {
            let config = ctx.config()?;
            let minutes = minutes.unwrap_or(i64::from(config.defaults.time_allowed_minutes));
            let interval = interval.unwrap_or(config.defaults.reset_interval_hours);
            let domain = block_on(registry.add_domain(&input, minutes, interval, now_ms()))??;
            println!("Tracking {domain}: {minutes} min every {interval}h");
        }
        DomainAction::Remove { domain } => {
            block_on(registry.remove_domain(&domain))??;
            println!("Stopped tracking {domain}");
        }
        DomainAction::List { json } => {
            let rows = block_on(registry.overview(now_ms()))??;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No domains tracked.");
            } else {
                for row in rows {
                    println!(
                        "{:<28} {:>16} of {:<8} every {:>3}h  24h {:<8} 7d {:<8} 30d {:<8} all {}",
                        row.domain,
                        format_time(row.timer.time_left),
                        format_time_tracking(row.timer.original_time),
                        row.timer.reset_interval,
                        format_time_tracking(row.last_24h),
                        format_time_tracking(row.last_7d),
                        format_time_tracking(row.last_30d),
                        format_time_tracking(row.all_time),
                    );
                }
            }
        }
        DomainAction::Set {
            domain,
            minutes,
            interval,
        } => {
            let timers = block_on(registry.records().domain_timers())??;
            let current = timers
                .get(&normalize_domain(&domain))
                .ok_or_else(|| ValidationError::NotTracked(domain.clone()))?;
            let original_time = minutes.map_or(current.original_time, |m| m.saturating_mul(60));
            let interval = interval.unwrap_or(current.reset_interval);

            let reconciled =
                block_on(registry.update_settings(&domain, original_time, interval, now_ms()))??;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "domain": domain,
                    "wasReset": reconciled.was_reset,
                    "timer": reconciled.timer,
                }))?
            );
        }
        DomainAction::ResetAll => {
            let count = block_on(registry.reset_all_timers(now_ms()))??;
            println!("Reset {count} timers");
        }
        DomainAction::Interval { hours: None } => {
            let hours = block_on(registry.global_reset_interval())??;
            println!("{hours}");
        }
        DomainAction::Interval { hours: Some(hours) } => {
            let count = block_on(registry.set_global_reset_interval(hours))??;
            println!("Reset interval set to {hours}h for {count} domains");
        }
    }
    Ok(())
}
