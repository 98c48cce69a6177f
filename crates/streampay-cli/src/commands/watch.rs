use super::common::{open_ledger, print_snapshot, require_address};
use crate::{print_info, print_warning};
use std::time::Duration;
use streampay_client::{ClientConfig, PortfolioWatcher};

pub async fn handle(
    config: &ClientConfig,
    interval: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = require_address(config)?;
    let period = interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.refresh_period());
    let ledger = open_ledger(config)?;

    let watcher = PortfolioWatcher::new(ledger, config.fetch_window);
    watcher.set_caller(Some(address));
    let mut updates = watcher.subscribe();
    let task = watcher.spawn(period);
    print_info(&format!(
        "Watching every {}s (Ctrl+C to stop)",
        period.as_secs()
    ));

    let mut shown_generation = 0;
    let mut shown_error: Option<String> = None;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.generation != shown_generation {
                    if let Some(snap) = &state.snapshot {
                        shown_generation = state.generation;
                        if let Some(at) = state.last_refresh {
                            println!();
                            print_info(&format!("Refreshed at {}", at.format("%H:%M:%S UTC")));
                        }
                        print_snapshot(snap);
                    }
                }
                if state.last_error != shown_error {
                    if let Some(err) = &state.last_error {
                        print_warning(&format!("Refresh failed, showing last snapshot: {}", err));
                    }
                    shown_error = state.last_error;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    task.abort();
    Ok(())
}
