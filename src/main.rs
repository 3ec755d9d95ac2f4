#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    dead_code
)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use practice_chat::chat::{create_orchestrator, ChatError, ReplyKind};
use practice_chat::config::Config;
use practice_chat::infra::create_usage_tracker;
use practice_chat::observability::create_observer;
use practice_chat::security::redact;
use practice_chat::sessions::create_session_store;
use practice_chat::{gateway, providers, ConfigCommands};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

/// Chat backend for a practice website assistant.
#[derive(Parser, Debug)]
#[command(name = "practice-chat")]
#[command(version)]
#[command(about = "Session-scoped chat proxy for a practice's website assistant.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway the chat widget talks to
    #[command(long_about = "\
Start the HTTP gateway the chat widget talks to.

Serves POST /api/chat plus /health, /api/usage and (with the prometheus \
observability backend) /metrics. Bind address defaults to the values in \
your config file (gateway.host / gateway.port).

Examples:
  practice-chat gateway                  # use config defaults
  practice-chat gateway -p 8080          # listen on port 8080
  practice-chat gateway --host 0.0.0.0   # bind to all interfaces
  practice-chat gateway -p 0             # random available port")]
    Gateway {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Send one message through the full chat pipeline and print the reply
    #[command(long_about = "\
Send one message through the full chat pipeline and print the reply.

The message is sanitized, checked against the injection filter and sent \
to the configured model with the assistant's system prompt. Sessions live \
only for this process, so each invocation starts a fresh conversation.

Examples:
  practice-chat ask -m \"What are your fees?\"
  practice-chat ask -m \"Do you take insurance?\" --model gpt-4o-mini")]
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Session id; a random one is generated when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Model to use; defaults to config default_model
        #[arg(long)]
        model: Option<String>,

        /// Temperature (0.0 - 2.0); defaults to config default_temperature
        #[arg(short, long, value_parser = parse_temperature)]
        temperature: Option<f64>,
    },

    /// Show resolved configuration
    Status,

    /// List supported model providers
    Providers,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("PRACTICE_CHAT_CONFIG_DIR", config_dir);
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut config = Config::load_or_init().await?;

    match cli.command {
        Commands::Gateway { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting chat gateway on {host} (random port)");
            } else {
                info!("Starting chat gateway on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Ask {
            message,
            session,
            model,
            temperature,
        } => {
            if let Some(model) = model {
                config.default_model = Some(model);
            }
            if let Some(temperature) = temperature {
                config.default_temperature = temperature;
            }
            run_ask(&config, &message, session).await
        }

        Commands::Status => {
            print_status(&config);
            Ok(())
        }

        Commands::Providers => {
            let current = config
                .default_provider
                .as_deref()
                .unwrap_or("openai")
                .trim()
                .to_ascii_lowercase();
            let providers = providers::list_providers();
            println!("Supported providers ({} total):\n", providers.len());
            println!("  ID (use in config)  DESCRIPTION");
            for p in &providers {
                let marker = if p.name == current { " (active)" } else { "" };
                let url_tag = if p.requires_url { " [needs api_url]" } else { "" };
                println!("  {:<19} {}{}{}", p.name, p.display_name, url_tag, marker);
            }
            Ok(())
        }

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Show => {
                let mut masked = config.clone();
                masked.api_key = masked.api_key.as_deref().map(redact);
                print!("{}", toml::to_string_pretty(&masked)?);
                Ok(())
            }
            ConfigCommands::Path => {
                println!("{}", config.config_path.display());
                Ok(())
            }
        },
    }
}

async fn run_ask(config: &Config, message: &str, session: Option<String>) -> Result<()> {
    let chat = create_orchestrator(
        config,
        create_session_store(),
        create_observer(&config.observability),
        create_usage_tracker(),
    )?;
    let session_id = session.unwrap_or_else(|| format!("cli_{}", uuid::Uuid::new_v4()));

    match chat.handle_chat_request(&session_id, message).await {
        Ok(reply) => {
            if reply.kind == ReplyKind::Refused {
                info!("Message was refused by the injection filter");
            }
            println!("{}", reply.reply);
            Ok(())
        }
        Err(ChatError::Completion(detail)) => {
            eprintln!("{}", chat.settings().failure_reply);
            bail!("completion failed: {detail}")
        }
        Err(e) => Err(e.into()),
    }
}

fn print_status(config: &Config) {
    println!("💬 Practice Chat Status");
    println!();
    println!("Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("Config:      {}", config.config_path.display());
    println!();
    println!(
        "🤖 Provider:      {}",
        config.default_provider.as_deref().unwrap_or("openai")
    );
    println!(
        "   Model:         {}",
        config.default_model.as_deref().unwrap_or("(default)")
    );
    println!("   Temperature:   {}", config.default_temperature);
    println!(
        "   API key:       {}",
        config
            .api_key
            .as_deref()
            .map_or_else(|| "(not set)".to_string(), redact)
    );
    if let Some(url) = &config.api_url {
        println!("   API URL:       {url}");
    }
    println!("📊 Observability:  {}", config.observability.backend);
    println!();
    println!("Gateway:");
    println!("  Bind:              {}:{}", config.gateway.host, config.gateway.port);
    println!("  Max body:          {} bytes", config.gateway.max_body_bytes);
    println!(
        "  Allowed origins:   {}",
        if config.gateway.allowed_origins.is_empty() {
            "(any)".to_string()
        } else {
            config.gateway.allowed_origins.join(", ")
        }
    );
    println!();
    println!("Chat:");
    println!("  Compaction after:  {} turns", config.chat.compaction_threshold);
    println!(
        "  System prompt:     {}",
        if config.chat.system_prompt.is_some() {
            "custom"
        } else {
            "built-in"
        }
    );
    println!(
        "  Pricing (per 1K):  ${} in / ${} out",
        config.pricing.input_per_1k, config.pricing.output_per_1k
    );
    println!(
        "  Idle session TTL:  {}",
        if config.sessions.idle_ttl_secs == 0 {
            "never".to_string()
        } else {
            format!("{}s", config.sessions.idle_ttl_secs)
        }
    );
}
