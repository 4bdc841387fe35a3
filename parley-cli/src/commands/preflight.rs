//! Preflight command - check providers before a run

use std::time::Duration;

use clap::Args;
use parley_core::preflight::{self, PreflightOutcome};

use super::Context;

/// Arguments for the preflight command
#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// Seconds to wait for each provider
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Check the offline simulation backend instead
    #[arg(long)]
    pub simulate: bool,
}

impl PreflightArgs {
    /// Execute the preflight command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let config = ctx.config(|_| {})?;
        let registry = super::registry(&config, self.simulate)?;
        let book = super::persona_book(&config)?;
        let cast = super::cast(&config, &book)?;

        println!("Parley Preflight");
        println!("================");
        println!();

        let report = preflight::check(&registry, &cast, Duration::from_secs(self.timeout)).await;

        println!("Providers:");
        for check in &report.providers {
            let latency = check
                .latency_ms
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_default();
            println!(
                "  {:<4} {:<11} {:>8}  {}",
                check.status, check.provider, latency, check.detail
            );
        }
        println!();

        println!("Cast:");
        for member in &report.cast {
            match (&member.provider, &member.model) {
                (Some(provider), Some(model)) => println!(
                    "  {:<14} {:<10} {} / {} [{}]",
                    member.role,
                    member.persona,
                    provider,
                    model,
                    if member.native { "NATIVE" } else { "FALLBACK" }
                ),
                _ => println!("  {:<14} {:<10} (no provider)", member.role, member.persona),
            }
        }
        println!();

        if let Some(mode) = report.mode {
            println!("Mode: {}", mode);
        }

        match &report.outcome {
            PreflightOutcome::AllClear => println!("ALL CLEAR"),
            PreflightOutcome::PassWithWarnings(warnings) => {
                println!("PASS with warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            PreflightOutcome::Blocked(reasons) => {
                println!("BLOCKED:");
                for reason in reasons {
                    println!("  - {}", reason);
                }
                anyhow::bail!("Preflight failed");
            }
        }

        Ok(())
    }
}
