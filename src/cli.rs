//! Top-level command dispatch.

use std::io::{self, Write};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::provider::registry::{PROVIDERS, new_provider};
use crate::provider::{ModelInfo, Provider};
use crate::render::PlainTextRenderer;
use crate::repl::{Repl, RustylineTerminal};

/// Runs the command named by `config.command`.
pub async fn run(config: Config) -> Result<()> {
    tracing::debug!(command = %config.command, provider = %config.provider, "dispatching");
    match config.command.as_str() {
        "list-providers" => list_providers(&mut io::stdout()),
        "list-models" => {
            let provider = new_provider(&config)?;
            list_models(provider.as_ref(), &mut io::stdout()).await
        }
        "repl" => repl(config).await,
        "" => Err(Error::config("no command specified")),
        other => Err(Error::unknown_command(other)),
    }
}

/// Writes the names of the supported providers.
pub fn list_providers(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Supported providers:")?;
    for name in PROVIDERS {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Writes the models `provider` offers.
pub async fn list_models(provider: &dyn Provider, out: &mut dyn Write) -> Result<()> {
    let models = provider.list_models().await?;
    for model in &models {
        write_model(model, out)?;
    }
    Ok(())
}

fn write_model(model: &ModelInfo, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== {} ===", model.name)?;
    writeln!(out, "    Description: {}", model.description)?;
    writeln!(out, "    Max tokens: {}", model.max_tokens)?;
    writeln!(out, "    Version: {}", model.version)?;
    Ok(())
}

async fn repl(config: Config) -> Result<()> {
    let provider = new_provider(&config)?;
    let terminal = RustylineTerminal::new(config.use_color)?;
    let renderer = PlainTextRenderer::with_color(config.use_color);

    println!(
        "promptline (provider: {}, model: {})",
        provider.name(),
        config.model
    );
    println!("Type /help for commands, /quit to exit\n");

    let mut repl = Repl::new(
        provider,
        Box::new(terminal),
        Box::new(renderer),
        config.model.clone(),
    );
    repl.run().await
}
