use super::common::{open_ledger, print_snapshot, require_address};
use crate::{print_error, print_info};
use streampay_client::{ClientConfig, PortfolioWatcher};

pub async fn handle(config: &ClientConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let address = require_address(config)?;
    let ledger = open_ledger(config)?;
    if !json {
        print_info(&format!("Scanning {} for streams...", config.streaming_contract));
    }

    let watcher = PortfolioWatcher::new(ledger, config.fetch_window);
    watcher.set_caller(Some(address));
    if let Err(e) = watcher.refresh().await {
        print_error(&format!("Refresh failed: {}", e));
        return Err(e.into());
    }

    match watcher.state().snapshot {
        Some(snap) if json => println!("{}", serde_json::to_string_pretty(&snap)?),
        Some(snap) => print_snapshot(&snap),
        None => print_error("No snapshot published"),
    }
    Ok(())
}
