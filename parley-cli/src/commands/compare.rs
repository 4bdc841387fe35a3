//! Compare command - run one topic under both round orders

use std::path::PathBuf;

use clap::Args;
use parley_core::{FileSink, RoundOrder, Transcript};

use super::Context;

/// Arguments for the compare command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// The question or proposal to negotiate
    #[arg(required = true)]
    pub topic: String,

    /// Number of debating rounds
    #[arg(short = 'n', long)]
    pub rounds: Option<u32>,

    /// Use canned offline replies instead of calling any provider
    #[arg(long)]
    pub simulate: bool,

    /// Directory transcripts are written to (one subdirectory per order)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CompareArgs {
    /// Execute the compare command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        println!("Parley Round Order Comparison");
        println!("=============================");
        println!();
        println!("Topic: {}", self.topic);
        println!();

        let mut results = Vec::new();
        for order in [RoundOrder::Sequential, RoundOrder::Symmetric] {
            println!(">>> {} <<<", order.name().to_uppercase());
            let transcript = self.run_order(ctx, order).await?;
            results.push(transcript);
            println!();
        }

        print_comparison(&results[0], &results[1]);
        Ok(())
    }

    async fn run_order(&self, ctx: &Context, order: RoundOrder) -> anyhow::Result<Transcript> {
        let config = ctx.config(|o| {
            o.rounds = self.rounds.or(o.rounds);
            o.round_order = Some(order);
        })?;
        let registry = super::registry(&config, self.simulate)?;
        let negotiation = super::negotiation(&self.topic, &config, &registry, ctx.verbose)?;
        super::print_participants(&negotiation);

        let base = self
            .output
            .clone()
            .unwrap_or_else(|| config.negotiation.output_dir.clone());
        let sink = FileSink::new(base.join(order.name()));
        let transcript = negotiation.run_and_record(&sink).await?;

        let (_, md_path) = sink.paths_for(&transcript);
        println!("Transcript: {}", md_path.display());
        Ok(transcript)
    }
}

fn print_comparison(sequential: &Transcript, symmetric: &Transcript) {
    println!("Comparison");
    println!("----------");
    println!("{:<14} {:>12} {:>12}", "phase", "sequential", "symmetric");

    for timing in &sequential.timings {
        let other = symmetric
            .timings
            .iter()
            .find(|t| t.phase == timing.phase)
            .map(|t| format!("{} ms", t.millis))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} {:>12} {:>12}",
            timing.phase,
            format!("{} ms", timing.millis),
            other
        );
    }

    let seq_total = sequential.total_millis();
    let sym_total = symmetric.total_millis();
    println!(
        "{:<14} {:>12} {:>12}",
        "total",
        format!("{} ms", seq_total),
        format!("{} ms", sym_total)
    );
    if sym_total > 0 {
        println!("Speedup: {:.2}x", seq_total as f64 / sym_total as f64);
    }
    println!();

    println!("Tension (sequential): {}", sequential.tension);
    println!("Tension (symmetric):  {}", symmetric.tension);
    println!("Verdict (sequential): {}", sequential.stress_test.verdict);
    println!("Verdict (symmetric):  {}", symmetric.stress_test.verdict);
}
