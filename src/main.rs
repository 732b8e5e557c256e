use std::process;

use clap::{Arg, ArgAction, Command};
use winsandbox_mcp::config::{Config, LOG_LEVEL_ENV};
use winsandbox_mcp::mcp_server;

mod commands;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    let matches = Command::new("winsandbox-mcp")
        .version(VERSION)
        .about("Windows Sandbox lifecycle control over MCP")
        .subcommand(
            Command::new("mcp")
                .about("Start MCP server on stdio")
                .arg(
                    Arg::new("log-level")
                        .long("log-level")
                        .value_name("LEVEL")
                        .help(format!("Log level written to stderr (overrides {})", LOG_LEVEL_ENV)),
                ),
        )
        .subcommand(Command::new("doctor").about("Check Windows Sandbox prerequisites"))
        .subcommand(
            Command::new("status")
                .about("List running sandboxes")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print machine-readable JSON"),
                ),
        )
        .get_matches();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            process::exit(2);
        }
    };

    match matches.subcommand() {
        Some(("mcp", sub_matches)) => {
            if let Some(level) = sub_matches.get_one::<String>("log-level") {
                config.logging.level = level.to_ascii_lowercase();
                if let Err(e) = config.validate() {
                    eprintln!("✗ {}", e);
                    process::exit(2);
                }
            }
            if let Err(e) = mcp_server::start_mcp_server(config).await {
                eprintln!("✗ MCP server error: {:#}", e);
                process::exit(1);
            }
        }
        Some(("doctor", _)) => {
            if !commands::doctor::run().await {
                process::exit(1);
            }
        }
        Some(("status", sub_matches)) => {
            let json = sub_matches.get_flag("json");
            if let Err(e) = commands::status::run(json).await {
                eprintln!("✗ {:#}", e);
                process::exit(1);
            }
        }
        _ => {
            println!("winsandbox-mcp v{}", VERSION);
            println!("Use --help for available commands");
        }
    }
}
