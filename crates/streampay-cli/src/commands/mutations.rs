use super::common::{open_ledger, require_address};
use crate::{print_error, print_info, print_success, print_warning};
use async_trait::async_trait;
use colored::*;
use std::io::{BufRead, Write};
use std::sync::Arc;
use streampay_client::{
    ActionError, Approval, Approver, AutoApprove, ClientConfig, MutationOutcome, RpcLedger,
    StreamActions,
};
use streampay_core::{format_amount, CallArg, ContractCall, CreateWarning, StreamId};

/// Shows the guarded call and asks on stdin.
pub struct PromptApprover;

pub fn describe_call(call: &ContractCall) -> Vec<String> {
    let mut lines = vec![format!("{} {}", "Function:".bold(), call.function.cyan())];
    lines.push(format!("{} {}", "Contract:".bold(), call.contract));
    lines.push(format!("{} {}", "Caller:".bold(), call.caller));
    for arg in &call.args {
        let shown = match arg {
            CallArg::Uint(v) => format!("u{}", v),
            CallArg::Principal(p) => p.clone(),
            CallArg::ContractPrincipal(p) => format!("'{}", p),
        };
        lines.push(format!("  {} {}", "arg".dimmed(), shown));
    }
    if call.post_conditions.is_empty() {
        lines.push(format!("{} none", "Guards:".bold()));
    }
    for pc in &call.post_conditions {
        lines.push(format!(
            "{} {} ({} tokens)",
            "Guard:".bold(),
            pc,
            format_amount(pc.amount)
        ));
    }
    lines
}

#[async_trait]
impl Approver for PromptApprover {
    async fn approve(&self, call: &ContractCall, warnings: &[CreateWarning]) -> Approval {
        println!();
        for line in describe_call(call) {
            println!("{}", line);
        }
        for w in warnings {
            print_warning(&w.to_string());
        }
        print!("Sign and submit? [y/N] ");
        let _ = std::io::stdout().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;
        match answer {
            Ok(Ok(line)) if is_yes(&line) => Approval::Approved,
            _ => Approval::Declined,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn actions(
    config: &ClientConfig,
    yes: bool,
) -> Result<StreamActions<RpcLedger>, Box<dyn std::error::Error>> {
    let caller = require_address(config)?;
    let approver: Arc<dyn Approver> = if yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(PromptApprover)
    };
    Ok(StreamActions::new(
        open_ledger(config)?,
        config.stream_contract(),
        caller,
        approver,
    ))
}

fn report(
    what: &str,
    result: Result<MutationOutcome, ActionError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(MutationOutcome::Submitted(receipt)) => {
            print_success(&format!("{} submitted", what));
            println!("{} {}", "TX:".bold(), receipt.txid.green());
            Ok(())
        }
        Ok(MutationOutcome::Aborted) => {
            print_info("Aborted, nothing was signed");
            Ok(())
        }
        Err(e) => {
            print_error(&format!("{} failed: {}", what, e));
            Err(e.into())
        }
    }
}

pub async fn create(
    config: &ClientConfig,
    yes: bool,
    to: &str,
    rate: &str,
    deposit: &str,
    interval: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let actions = actions(config, yes)?;
    print_info(&format!(
        "Streaming {} per {} block(s) to {}, deposit {}",
        rate, interval, to, deposit
    ));
    report("Create stream", actions.create(to, rate, deposit, interval).await)
}

pub async fn withdraw(
    config: &ClientConfig,
    yes: bool,
    id: StreamId,
) -> Result<(), Box<dyn std::error::Error>> {
    let actions = actions(config, yes)?;
    let record = actions.lookup(id).await?;
    print_info(&format!(
        "Stream #{} owes {}",
        id,
        format_amount(record.owed)
    ));
    report("Withdraw", actions.withdraw(&record).await)
}

pub async fn pause(
    config: &ClientConfig,
    yes: bool,
    id: StreamId,
) -> Result<(), Box<dyn std::error::Error>> {
    let actions = actions(config, yes)?;
    report("Pause", actions.pause(id).await)
}

pub async fn resume(
    config: &ClientConfig,
    yes: bool,
    id: StreamId,
) -> Result<(), Box<dyn std::error::Error>> {
    let actions = actions(config, yes)?;
    report("Resume", actions.resume(id).await)
}

pub async fn top_up(
    config: &ClientConfig,
    yes: bool,
    id: StreamId,
    amount: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let actions = actions(config, yes)?;
    report("Top-up", actions.top_up(id, amount).await)
}

pub async fn cancel(
    config: &ClientConfig,
    yes: bool,
    id: StreamId,
) -> Result<(), Box<dyn std::error::Error>> {
    let actions = actions(config, yes)?;
    report("Cancel", actions.cancel(id).await)
}
