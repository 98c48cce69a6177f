use colored::*;
use std::sync::Arc;
use streampay_client::{ClientConfig, RpcLedger};
use streampay_core::amount::format_amount_short;
use streampay_core::{format_amount, Direction, PortfolioSnapshot, UserStream};

pub fn open_ledger(config: &ClientConfig) -> Result<Arc<RpcLedger>, Box<dyn std::error::Error>> {
    Ok(Arc::new(RpcLedger::new(config)?))
}

pub fn require_address(config: &ClientConfig) -> Result<String, Box<dyn std::error::Error>> {
    config
        .address
        .clone()
        .ok_or_else(|| "No address set (use --address or STREAMPAY_ADDRESS)".into())
}

/// One table row per stream.
pub fn stream_line(s: &UserStream) -> String {
    let r = &s.record;
    let (arrow, counterparty) = match s.direction {
        Direction::Incoming => ("←", r.sender.as_str()),
        Direction::Outgoing => ("→", r.recipient.as_str()),
    };
    let status = if r.paused {
        "paused".yellow()
    } else {
        "active".green()
    };
    format!(
        "#{:<5} {} {:<42} {:>14}/{:<6} deposit {:>14}  withdrawn {:>14}  owed {:>14}  {}",
        r.id,
        arrow,
        counterparty,
        format_amount_short(r.rate, 2),
        format!("{}blk", r.interval),
        format_amount(r.deposit),
        format_amount(r.withdrawn),
        format_amount(r.owed),
        status
    )
}

pub fn print_snapshot(snap: &PortfolioSnapshot) {
    let stats = &snap.stats;
    println!();
    println!("{} {}", "Address:".bold(), snap.caller.green());
    println!("{} {}", "Scanned ids:".bold(), snap.scanned);
    println!(
        "{} {} ({} incoming, {} outgoing)",
        "Active streams:".bold(),
        stats.active_count.to_string().cyan(),
        stats.incoming_count,
        stats.outgoing_count
    );
    println!(
        "{} {}",
        "Total streamed:".bold(),
        format_amount(stats.total_streamed)
    );
    println!(
        "{} {}",
        "Available to withdraw:".bold(),
        format_amount(stats.available_to_withdraw).green().bold()
    );

    let incoming: Vec<_> = snap.incoming().collect();
    let outgoing: Vec<_> = snap.outgoing().collect();
    for (title, list) in [("Incoming", incoming), ("Outgoing", outgoing)] {
        println!();
        println!("{}", format!("{} ({})", title, list.len()).bold());
        if list.is_empty() {
            println!("  {}", "none".dimmed());
        }
        for s in list {
            println!("  {}", stream_line(s));
        }
    }

    if !snap.is_complete() {
        println!();
        println!(
            "{} {} id(s) could not be read: {:?}",
            "⚠".yellow().bold(),
            snap.unreachable.len(),
            snap.unreachable
        );
    }
}
