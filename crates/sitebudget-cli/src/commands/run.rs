//! Event-driven runner: focus notifications in, block actions and tracker
//! events out, one JSON object per line.

use std::sync::Arc;

use clap::Args;
use serde_json::json;
use sitebudget_core::clock::now_ms;
use sitebudget_core::{
    ActiveContextTracker, BlockAction, DomainRegistry, FocusEvent, KeyValueStore, MemoryStore,
    Records, SharedFocus, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::{block_on, CliResult, Context};

#[derive(Args)]
pub struct RunArgs {
    /// Keep all state in memory instead of the on-disk database
    #[arg(long)]
    ephemeral: bool,
}

/// Blocks by telling whoever reads stdout.
struct StdoutBlocker;

impl BlockAction for StdoutBlocker {
    fn block_current_view(&self, domain: &str) {
        println!("{}", json!({ "blocked": domain }));
    }
}

pub fn run(ctx: &Context, args: RunArgs) -> CliResult {
    let config = ctx.config()?;
    let store: Arc<dyn KeyValueStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(ctx.database()?)
    };

    block_on(async move {
        let records = Records::new(store);
        let now = now_ms();
        DomainRegistry::new(records.clone())
            .seed_defaults(&config, now)
            .await?;
        let pruned = records
            .prune_history(now, config.history.retention_days)
            .await?;
        debug!(pruned, "history pruned");

        let focus = Arc::new(SharedFocus::new());
        let tracker = ActiveContextTracker::new(
            records,
            focus.clone(),
            Arc::new(StdoutBlocker),
            Arc::new(SystemClock),
            config.tracker_settings(),
        );

        let mut events = tracker.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!(error = %e, "could not encode event"),
                    },
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let handle = tracker.spawn_background();
        info!("reading focus events from stdin");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event: FocusEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, line, "ignoring malformed focus event");
                    continue;
                }
            };
            focus.apply(&event);
            let outcome = tracker.handle_event(event).await;
            debug!(?outcome, "focus event handled");
        }

        handle.shutdown().await;
        drop(tracker);
        if let Err(e) = printer.await {
            warn!(error = %e, "event printer failed");
        }
        Ok::<_, Box<dyn std::error::Error>>(())
    })??;

    Ok(())
}
