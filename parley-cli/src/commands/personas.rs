//! Personas command - list the personas available to a run

use clap::Args;

use super::Context;

/// Arguments for the personas command
#[derive(Args, Debug)]
pub struct PersonasArgs {
    /// Print each persona's full directive
    #[arg(long)]
    pub full: bool,
}

impl PersonasArgs {
    /// Execute the personas command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let config = ctx.config(|_| {})?;
        let book = super::persona_book(&config)?;
        let cast = super::cast(&config, &book)?;

        println!("Personas ({})", book.len());
        println!("========");
        println!();

        for persona in book.list() {
            let seat = if persona.name == cast.debater_a.name {
                Some("debater A")
            } else if persona.name == cast.debater_b.name {
                Some("debater B")
            } else if persona.name == cast.synthesizer.name {
                Some("synthesizer")
            } else if persona.name == cast.stress_tester.name {
                Some("stress tester")
            } else {
                None
            };

            print!("{}", persona.name);
            if let Some(role) = &persona.role {
                print!(" ({})", role);
            }
            if let Some(seat) = seat {
                print!(" [{}]", seat);
            }
            println!();

            let provider = persona
                .provider
                .map(|p| p.to_string())
                .unwrap_or_else(|| "any".to_string());
            println!(
                "  provider: {}, model: {}",
                provider,
                persona.model.as_deref().unwrap_or("(default)")
            );
            if !persona.anchors.is_empty() {
                println!("  anchors: {}", persona.anchors.join("; "));
            }
            if self.full || ctx.verbose {
                println!();
                for line in persona.directive.lines() {
                    println!("    {}", line);
                }
            }
            println!();
        }

        if let Some(path) = &config.personas.file {
            println!("Extra personas loaded from {}", path.display());
        }

        Ok(())
    }
}
