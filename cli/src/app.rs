//! Core application

use anyhow::Result;
use serde_json::Value;

use crate::commands;
use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::ENV_LOG;
use crate::utils::file::read_input;

pub struct CoreApp;

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let config = AppConfig::load(&cli_config)?;
        let output = Self::execute(&config, command)?;
        Self::print(&output)
    }

    fn execute(config: &AppConfig, command: Commands) -> Result<Value> {
        match command {
            Commands::Resolve { tree, now } => {
                let json = read_input(&tree)?;
                commands::resolve_tree(config, &json, now)
            }
            Commands::Validate { tree } => {
                let json = read_input(&tree)?;
                commands::validate_tree(config, &json)
            }
            Commands::Definitions => commands::definitions(config),
        }
    }

    fn print(output: &Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(output)?);
        Ok(())
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "warn".to_string());

        // Logs go to stderr so stdout stays valid JSON
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
