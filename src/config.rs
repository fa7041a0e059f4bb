//! Configuration for promptline.
//!
//! Values come from four layers, highest precedence first: command-line flags
//! parsed by `arrrg`, `PROMPTLINE_*` environment variables, a TOML config file,
//! and built-in defaults.  Every option has one kebab-case name shared by all
//! layers: `--http-timeout`, `PROMPTLINE_HTTP_TIMEOUT` and `http-timeout = 30`
//! all set the same value.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default top-level command.
pub const DEFAULT_COMMAND: &str = "repl";

/// Default provider.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant. Be concise.";

/// Default HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT: u64 = 30;

/// Name of the per-project config file searched for from the working directory upward.
pub const PROJECT_CONFIG_FILE: &str = ".promptline.toml";

/// Prefix of every environment variable read by promptline.
pub const ENV_PREFIX: &str = "PROMPTLINE_";

/// Command-line arguments for the promptline tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct Args {
    /// Explicit config file.
    #[arrrg(optional, "Path to a TOML config file", "PATH")]
    pub config: Option<String>,

    /// Top-level command.
    #[arrrg(optional, "Command: repl, list-models, list-providers (default: repl)", "COMMAND")]
    pub command: Option<String>,

    /// Provider name.
    #[arrrg(optional, "Provider: openai, gemini (default: openai)", "PROVIDER")]
    pub provider: Option<String>,

    /// Initial model.
    #[arrrg(optional, "Model to use (default: gpt-4o-mini)", "MODEL")]
    pub model: Option<String>,

    /// System prompt.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system_prompt: Option<String>,

    /// OpenAI API key.
    #[arrrg(optional, "OpenAI API key", "KEY")]
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible endpoint.
    #[arrrg(optional, "OpenAI-compatible base URL", "URL")]
    pub openai_base_url: Option<String>,

    /// Gemini API key.
    #[arrrg(optional, "Gemini API key", "KEY")]
    pub gemini_api_key: Option<String>,

    /// Gemini endpoint.
    #[arrrg(optional, "Gemini base URL", "URL")]
    pub gemini_base_url: Option<String>,

    /// HTTP timeout in seconds.
    #[arrrg(optional, "HTTP timeout in seconds (default: 30)", "SECONDS")]
    pub http_timeout: Option<u64>,

    /// Diagnostic log file.
    #[arrrg(optional, "Write diagnostic logs to this file", "PATH")]
    pub log_file: Option<String>,

    /// Ground every turn with search.
    #[arrrg(flag, "Enable search grounding by default (gemini)")]
    pub grounding: bool,

    /// Comma-separated safety categories to keep blocked.
    #[arrrg(optional, "Comma-separated safety categories to keep blocked (gemini)", "LIST")]
    pub blocked_categories: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Print the version and exit.
    #[arrrg(flag, "Print version and exit")]
    pub version: bool,
}

/// Contents of a TOML config file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub command: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub http_timeout: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub grounding: Option<bool>,
    pub blocked_categories: Option<Vec<String>>,
    pub no_color: Option<bool>,
}

impl FileConfig {
    /// Parses TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::parse(&text)
            .map_err(|e| Error::config(format!("invalid config file {}: {e}", path.display())))
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Top-level command to run.
    pub command: String,
    /// Provider name.
    pub provider: String,
    /// Initial active model.
    pub model: String,
    /// System prompt; empty disables it.
    pub system_prompt: String,
    /// OpenAI API key.
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible endpoint.
    pub openai_base_url: String,
    /// Gemini API key.
    pub gemini_api_key: Option<String>,
    /// Gemini endpoint.
    pub gemini_base_url: String,
    /// HTTP timeout in seconds.
    pub http_timeout: u64,
    /// Diagnostic log file.
    pub log_file: Option<PathBuf>,
    /// Ground every turn unless suppressed.
    pub grounding: bool,
    /// Safety categories left at the provider's default threshold.
    pub blocked_categories: Vec<String>,
    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
    /// Print the version and exit.
    pub version: bool,
}

impl Config {
    /// Creates a configuration with every option at its default.
    pub fn new() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            openai_api_key: None,
            openai_base_url: crate::provider::openai::DEFAULT_BASE_URL.to_string(),
            gemini_api_key: None,
            gemini_base_url: crate::provider::gemini::DEFAULT_BASE_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            log_file: None,
            grounding: false,
            blocked_categories: Vec::new(),
            use_color: true,
            version: false,
        }
    }

    /// Sets the provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Sets the OpenAI API key.
    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Sets the Gemini API key.
    pub fn with_gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.gemini_api_key = Some(key.into());
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The HTTP timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// The system prompt, or `None` when it is empty.
    pub fn system_prompt(&self) -> Option<String> {
        Some(self.system_prompt.clone()).filter(|p| !p.trim().is_empty())
    }

    /// Loads configuration from the process environment and disk.
    ///
    /// `free` holds the positional arguments left over by `arrrg`; the first
    /// one names the command when `--command` was not given.
    pub fn load(args: Args, free: &[String]) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(Path::new(path))?,
            None => {
                let cwd = std::env::current_dir()?;
                match find_config_file(&cwd, dirs::home_dir().as_deref()) {
                    Some(path) => {
                        tracing::debug!(path = %path.display(), "loading config file");
                        FileConfig::load(&path)?
                    }
                    None => FileConfig::default(),
                }
            }
        };
        let mut args = args;
        if args.command.is_none() {
            args.command = free.first().cloned();
        }
        Self::resolve(args, |key| std::env::var(key).ok(), file)
    }

    /// Merges the layers, highest precedence first.
    ///
    /// `env` looks up an environment variable by its full name.
    pub fn resolve<E>(args: Args, env: E, file: FileConfig) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(&env_name(key)).filter(|v| !v.is_empty());
        let defaults = Config::new();

        let string = |cli: Option<String>, key: &str, file: Option<String>, default: String| {
            cli.or_else(|| env(key)).or(file).unwrap_or(default)
        };
        let optional = |cli: Option<String>, key: &str, file: Option<String>| {
            cli.or_else(|| env(key)).or(file).filter(|v| !v.is_empty())
        };
        let boolean = |cli: bool, key: &str, file: Option<bool>, default: bool| -> Result<bool> {
            if cli {
                return Ok(true);
            }
            match env(key) {
                Some(value) => parse_bool(key, &value),
                None => Ok(file.unwrap_or(default)),
            }
        };

        let http_timeout = match args.http_timeout {
            Some(secs) => secs,
            None => match env("http-timeout") {
                Some(value) => value.trim().parse().map_err(|_| {
                    Error::config(format!("http-timeout: expected seconds, got {value:?}"))
                })?,
                None => file.http_timeout.unwrap_or(defaults.http_timeout),
            },
        };
        if http_timeout == 0 {
            return Err(Error::config("http-timeout must be at least one second"));
        }

        let blocked_categories = match args
            .blocked_categories
            .or_else(|| env("blocked-categories"))
        {
            Some(list) => split_list(&list),
            None => file.blocked_categories.unwrap_or_default(),
        };

        let log_file = args
            .log_file
            .or_else(|| env("log-file"))
            .map(PathBuf::from)
            .or(file.log_file);

        Ok(Config {
            command: string(args.command, "command", file.command, defaults.command),
            provider: string(args.provider, "provider", file.provider, defaults.provider),
            model: string(args.model, "model", file.model, defaults.model),
            system_prompt: string(
                args.system_prompt,
                "system-prompt",
                file.system_prompt,
                defaults.system_prompt,
            ),
            openai_api_key: optional(args.openai_api_key, "openai-api-key", file.openai_api_key),
            openai_base_url: string(
                args.openai_base_url,
                "openai-base-url",
                file.openai_base_url,
                defaults.openai_base_url,
            ),
            gemini_api_key: optional(args.gemini_api_key, "gemini-api-key", file.gemini_api_key),
            gemini_base_url: string(
                args.gemini_base_url,
                "gemini-base-url",
                file.gemini_base_url,
                defaults.gemini_base_url,
            ),
            http_timeout,
            log_file,
            grounding: boolean(args.grounding, "grounding", file.grounding, defaults.grounding)?,
            blocked_categories,
            use_color: !boolean(args.no_color, "no-color", file.no_color, false)?,
            version: args.version,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment variable name for a kebab-case option: `http-timeout` becomes
/// `PROMPTLINE_HTTP_TIMEOUT`.
pub fn env_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('-', "_").to_uppercase())
}

/// Locates the config file to use when none was given explicitly.
///
/// Searches `start` and its ancestors for `.promptline.toml`, then falls back
/// to `~/.promptline.d/promptline.toml`.
pub fn find_config_file(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_FILE))
        .find(|candidate| candidate.is_file())
        .or_else(|| {
            home.map(|home| home.join(".promptline.d").join("promptline.toml"))
                .filter(|candidate| candidate.is_file())
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "{}: expected a boolean, got {value:?}",
            env_name(key)
        ))),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
