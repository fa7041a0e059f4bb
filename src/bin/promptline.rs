//! Interactive terminal client for chat-style language models.
//!
//! # Usage
//!
//! ```bash
//! # Chat with the default provider and model
//! promptline
//!
//! # Chat with Gemini, grounding every turn with search
//! promptline --provider gemini --model gemini-2.0-flash --grounding
//!
//! # List what a provider offers
//! promptline --provider gemini list-models
//! promptline list-providers
//! ```
//!
//! Inside the REPL, type `/help` for the command reference.

use arrrg::CommandLine;

use promptline::cli;
use promptline::config::{Args, Config};
use promptline::logging;

#[tokio::main]
async fn main() {
    let (args, free) = Args::from_command_line_relaxed("promptline [OPTIONS] [COMMAND]");
    if args.version {
        println!("promptline {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    let result = async {
        let config = Config::load(args, &free)?;
        logging::init(config.log_file.as_deref())?;
        cli::run(config).await
    }
    .await;
    if let Err(err) = result {
        eprintln!("promptline: {err}");
        std::process::exit(1);
    }
}
