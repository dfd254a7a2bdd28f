//! Display utilities for the CLI

use colored::*;
use covenant_sdk::DeploymentReport;

use crate::scenario::{Outcome, ScenarioReport, StepReport};

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

pub fn error(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

pub fn warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message.yellow());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("      {}: {}", key, value.bright_cyan());
}

pub fn labeled(label: &str, value: &str) {
    println!("  {}: {}", label.bright_white(), value.bright_cyan());
}

pub fn deployment(report: &DeploymentReport) {
    section("Deployment");
    labeled("Deployer", &report.deployer.to_string());
    labeled("Ledger", &report.ledger.ledger.to_string());
    labeled("Registry", &report.registry.registry.to_string());
    if report.wired {
        success("Registry authorized to mint on the ledger");
    } else {
        warning("Registry not wired; settlements will fail until it is");
    }
}

pub fn step(step: &StepReport) {
    let prefix = format!("[{}] {} as {}", step.index, step.op, step.caller);
    match &step.outcome {
        Outcome::Ok { detail } => success(&format!("{prefix}: {detail}")),
        Outcome::Failed { error: kind, message } => {
            error(&format!("{prefix}: {kind}"));
            kv("reason", message);
        }
    }
}

pub fn scenario_report(report: &ScenarioReport) {
    section(report.name.as_deref().unwrap_or("Scenario"));
    for s in &report.steps {
        step(s);
    }
    if report.skipped > 0 {
        warning(&format!("{} step(s) skipped after failure", report.skipped));
    }

    section("Ledger");
    labeled("Total supply", &report.ledger.total_supply.to_string());
    match report.ledger.authorized_minter {
        Some(minter) => labeled("Authorized minter", &minter.to_string()),
        None => labeled("Authorized minter", "none"),
    }
    if report.balances.is_empty() {
        info("No balances");
    }
    for (alias, balance) in &report.balances {
        kv(alias, &balance.to_string());
    }

    println!();
    let failures = report.failures();
    if failures == 0 {
        success(&format!("{} step(s) succeeded", report.steps.len()));
    } else {
        error(&format!("{failures} of {} step(s) failed", report.steps.len()));
    }
}
