//! Negotiate command - run one negotiation and write its transcript

use std::path::PathBuf;

use clap::Args;
use parley_core::{FileSink, RoundOrder, Transcript};

use super::Context;

/// Arguments for the negotiate command
#[derive(Args, Debug)]
pub struct NegotiateArgs {
    /// The question or proposal to negotiate
    #[arg(required = true)]
    pub topic: String,

    /// Number of debating rounds
    #[arg(short = 'n', long)]
    pub rounds: Option<u32>,

    /// Both debaters answer the other's previous round concurrently
    #[arg(long)]
    pub symmetric: bool,

    /// Use canned offline replies instead of calling any provider
    #[arg(long)]
    pub simulate: bool,

    /// Directory transcripts are written to
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl NegotiateArgs {
    /// Execute the negotiate command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let config = ctx.config(|o| {
            o.rounds = self.rounds.or(o.rounds);
            if self.symmetric {
                o.round_order = Some(RoundOrder::Symmetric);
            }
            o.output_dir = self.output.clone().or(o.output_dir.take());
        })?;
        let registry = super::registry(&config, self.simulate)?;
        let negotiation = super::negotiation(&self.topic, &config, &registry, ctx.verbose)?;

        println!("Parley Negotiation");
        println!("==================");
        println!();
        println!("Topic: {}", self.topic);
        println!(
            "Rounds: {} ({})",
            config.negotiation.rounds, config.negotiation.round_order
        );
        super::print_participants(&negotiation);

        let sink = FileSink::new(&config.negotiation.output_dir);
        let transcript = negotiation.run_and_record(&sink).await?;

        print_summary(&transcript);
        let (json_path, md_path) = sink.paths_for(&transcript);
        println!();
        println!("Transcript written:");
        println!("  {}", md_path.display());
        println!("  {}", json_path.display());

        Ok(())
    }
}

fn print_summary(transcript: &Transcript) {
    println!();
    println!("Result");
    println!("------");

    let verdict = &transcript.stress_test;
    if verdict.inferred {
        println!("Verdict: {} (inferred, no verdict token found)", verdict.verdict);
    } else {
        println!("Verdict: {}", verdict.verdict);
    }
    println!("Tension: {}", transcript.tension);

    if let Some(nucleus) = &transcript.synthesis.nucleus {
        println!();
        println!("Nucleus:");
        for line in nucleus.lines().filter(|l| !l.trim().is_empty()) {
            println!("  {}", line.trim());
        }
    }
    if !transcript.synthesis.missing.is_empty() {
        println!(
            "Synthesis missing sections: {}",
            transcript.synthesis.missing.join(", ")
        );
    }
    if !verdict.failure_modes.is_empty() {
        println!();
        println!("Failure modes:");
        for mode in &verdict.failure_modes {
            println!("  - {}", mode);
        }
    }

    println!();
    println!("Total time: {:.1}s", transcript.total_millis() as f64 / 1000.0);
}
