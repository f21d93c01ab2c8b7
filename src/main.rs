//! reply-proxy: chat widget client and reply proxy
//!
//! Runs the proxy that forwards widget messages to the completion API, or
//! talks to a running proxy from the terminal.

use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use reply_proxy::{
    config::{AppConfig, LogFormat},
    run_server,
    widget::{ChatEntry, ChatView, ChatWidget, Sender},
    ProxyClient,
};

#[derive(Parser)]
#[command(name = "reply-proxy")]
#[command(version = "0.1.0")]
#[command(about = "Chat reply proxy for an OpenAI-compatible completion API")]
#[command(long_about = "
reply-proxy holds the upstream API key and answers chat widget requests with
a {\"reply\": ...} envelope, adding a fixed persona to every message.

Example usage:
  OPENAI_API_KEY=sk-... reply-proxy serve --port 8787
  reply-proxy ask \"What projects has Moulik built?\"
  reply-proxy chat --endpoint http://localhost:8787/api/chat
")]
struct Cli {
    /// Path to config file (defaults: config.yaml, config.yml, ./config/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Serve {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override upstream completions URL
        #[arg(long)]
        upstream_url: Option<String>,
    },

    /// Validate configuration and print the effective settings
    CheckConfig,

    /// Send one message to a running proxy and print the reply
    Ask {
        message: String,
        /// Override proxy endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Interactive chat with a running proxy
    Chat {
        /// Override proxy endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, source) = match AppConfig::load_with_source(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(cli.log_level, config.logging.format);
    tracing::info!(source = %source, "Configuration loaded");

    match cli.command {
        Commands::Serve { port, upstream_url } => {
            run_proxy(config, port, upstream_url).await?;
        }
        Commands::CheckConfig => {
            check_config(&config);
        }
        Commands::Ask { message, endpoint } => {
            let client = build_client(&config, endpoint)?;
            println!("{}", client.send(&message).await);
        }
        Commands::Chat { endpoint } => {
            let client = build_client(&config, endpoint)?;
            run_chat(client).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so `ask` and `chat` output stays clean
fn init_tracing(level: Option<LogLevel>, format: LogFormat) {
    let level_filter = if let Some(level) = level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Run the proxy server
async fn run_proxy(
    mut config: AppConfig,
    port_override: Option<u16>,
    upstream_url_override: Option<String>,
) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = upstream_url_override {
        config.upstream.url = url;
    }
    config.validate()?;

    let credential = config.upstream.credential();
    run_server(config, credential)
        .await
        .map_err(|e| anyhow::anyhow!("Proxy server failed: {}", e))
}

/// Print the effective configuration
fn check_config(config: &AppConfig) {
    if let Err(e) = config.validate() {
        eprintln!("✗ Configuration error: {}", e);
        std::process::exit(1);
    }

    println!("✓ Configuration is valid\n");
    println!("Server:");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  Route: {}", config.server.route);
    println!("\nUpstream:");
    println!("  URL: {}", config.upstream.url);
    println!("  TLS: {}", if config.upstream.is_tls() { "enabled" } else { "disabled" });
    println!("  Model: {}", config.upstream.model);
    println!("  Max tokens: {}", config.upstream.max_tokens);
    println!("  Temperature: {}", config.upstream.temperature);
    println!("  Timeout: {}s", config.upstream.timeout_seconds);
    println!(
        "  API key ({}): {}",
        config.upstream.api_key_env,
        if config.upstream.credential().is_some() { "set" } else { "NOT SET" }
    );
    println!("\nClient:");
    println!("  Endpoint: {}", config.client.endpoint);
    println!("\nLogging:");
    println!("  Format: {:?}", config.logging.format);
}

fn build_client(config: &AppConfig, endpoint: Option<String>) -> anyhow::Result<ProxyClient> {
    let mut client_config = config.client.clone();
    if let Some(endpoint) = endpoint {
        url::Url::parse(&endpoint).map_err(|e| anyhow::anyhow!("Invalid endpoint {}: {}", endpoint, e))?;
        client_config.endpoint = endpoint;
    }
    Ok(ProxyClient::from_config(&client_config)?)
}

/// Renders the widget to the terminal
struct TerminalView;

impl ChatView for TerminalView {
    fn message_added(&mut self, entry: &ChatEntry) {
        // The user's line is already on screen as typed input
        if entry.sender == Sender::Bot {
            println!("{}", entry);
        }
    }

    fn typing_changed(&mut self, typing: bool) {
        if typing {
            print!("bot is typing...\r");
        } else {
            print!("                \r");
        }
        let _ = std::io::stdout().flush();
    }
}

async fn run_chat(client: ProxyClient) -> anyhow::Result<()> {
    println!("Chatting with {} (Ctrl-D to quit)", client.endpoint());

    let mut widget = ChatWidget::new(client, TerminalView);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        widget.submit(&line).await;
    }

    Ok(())
}
