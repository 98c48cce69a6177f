use crate::{config_path, print_info, print_success, ConfigCommands};
use colored::*;
use std::path::Path;
use streampay_client::ClientConfig;

pub async fn handle(
    action: ConfigCommands,
    config_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigCommands::Init { force } => init(config_dir, force)?,
        ConfigCommands::Show => show(config_dir)?,
    }
    Ok(())
}

fn init(config_dir: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(config_dir);
    if path.exists() && !force {
        return Err(format!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    ClientConfig::default().save_to_file(&path)?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(())
}

fn show(config_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(config_dir);
    if !path.exists() {
        print_info(&format!("No config at {}, showing defaults", path.display()));
    }
    let config = ClientConfig::load_or_default(&path)?.apply_env()?;

    println!();
    println!("{} {}", "Network:".bold(), config.network);
    println!("{} {}", "RPC:".bold(), config.rpc_url.cyan());
    println!("{} {}", "Streaming contract:".bold(), config.streaming_contract);
    println!(
        "{} {}::{}",
        "Token:".bold(),
        config.token_contract,
        config.token_asset
    );
    println!(
        "{} {}",
        "Address:".bold(),
        config.address.as_deref().unwrap_or("(not set)")
    );
    println!("{} {}", "Fetch window:".bold(), config.fetch_window);
    println!("{} {}s", "Refresh:".bold(), config.refresh_secs);
    if let Err(e) = config.validate() {
        println!("{} {}", "⚠".yellow().bold(), e);
    }
    Ok(())
}
