use super::common::{open_ledger, require_address};
use crate::print_info;
use colored::*;
use streampay_client::{ClientConfig, StreamLedger};
use streampay_core::format_amount;

pub async fn handle(
    config: &ClientConfig,
    address: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let holder = match address {
        Some(a) => a.to_string(),
        None => require_address(config)?,
    };
    print_info(&format!("Fetching {} balance of {}...", config.token_asset, holder));

    let ledger = open_ledger(config)?;
    let balance = ledger.token_balance(&holder).await?;

    println!();
    println!("{} {}", "Address:".bold(), holder.green());
    println!(
        "{} {} {}",
        "Balance:".bold(),
        format_amount(balance).cyan().bold(),
        config.token_asset
    );
    Ok(())
}
