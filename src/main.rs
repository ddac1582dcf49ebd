//! `toolchat` — interactive chat with MCP tool servers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::watch;

use toolchat::agent_core::{
    assemble_system_prompt, connect_all, run_chat_loop, ConversationDriver, LoopExit,
    ToolDispatcher, DEFAULT_PROMPT_TEMPLATE,
};
use toolchat::config::{self, AppConfig};
use toolchat::inference::InferenceClient;
use toolchat::logging;
use toolchat::mcp_client::{SessionRegistry, StdioLauncher};

/// Grace period for runtime shutdown. A pending stdin read would otherwise
/// keep the process alive after an interrupt.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "toolchat", version)]
#[command(about = "Chat with a language model that can call tools on MCP servers")]
#[command(
    long_about = "Starts every tool server listed in the configuration, tells the model \
which tools exist, and runs any tool call the model asks for.\n\n\
Configuration is read from --config, then $TOOLCHAT_CONFIG, then the nearest \
toolchat.yaml above the current directory, and otherwise falls back to the \
DeepSeek API plus the bundled weather-server.\n\n\
Environment Variables:\n  \
DEEPSEEK_API_KEY       API key for the default model endpoint\n  \
OPENWEATHER_API_KEY    API key used by weather-server\n  \
RUST_LOG               Log filter (default: toolchat=info,warn)"
)]
struct Cli {
    /// Path to a toolchat.yaml configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Prompt template file; `<$MCP_INFO$>` is replaced with the tool list
    #[arg(short = 'p', long, value_name = "PATH")]
    prompt: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_path = match logging::init_file_tracing("client.log") {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e}");
            None
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "toolchat exited with an error");
            eprintln!("Error: {e:#}");
            if let Some(path) = log_path {
                eprintln!("See {} for details.", path.display());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let (config, source) =
        config::load(cli.config.as_deref(), &cwd).context("failed to load configuration")?;
    tracing::info!(
        source = ?source,
        model = %config.model.model_name,
        servers = config.servers.len(),
        "configuration loaded"
    );

    let template = match cli.prompt.as_deref().or(config.prompt_path.as_deref()) {
        Some(path) => config::read_prompt_template(path).context("failed to read prompt template")?,
        None => DEFAULT_PROMPT_TEMPLATE.to_string(),
    };

    let model = InferenceClient::from_config(&config.model)
        .context("failed to set up the model client")?;

    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            let _ = interrupt_tx.send(true);
        }
    });

    let mut registry = SessionRegistry::new();
    let outcome = chat(&config, &template, model, &mut registry, interrupt_rx).await;

    println!("\nCleaning up resources");
    registry.shutdown().await;

    let exit = outcome?;
    tracing::info!(exit = ?exit, "chat session ended");
    Ok(())
}

/// Bootstrap the servers into `registry`, then run the interactive loop.
async fn chat(
    config: &AppConfig,
    template: &str,
    model: InferenceClient,
    registry: &mut SessionRegistry,
    interrupt: watch::Receiver<bool>,
) -> anyhow::Result<LoopExit> {
    connect_all(&StdioLauncher, &config.servers, registry)
        .await
        .context("failed to start tool servers")?;

    let registry: &SessionRegistry = registry;
    for (name, tools) in registry.catalogs() {
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        println!("Connected to MCP server: {name}");
        println!("Available tools: {}", names.join(", "));
    }

    let system_prompt = assemble_system_prompt(template, registry.catalogs());
    tracing::debug!(prompt_len = system_prompt.len(), "system prompt assembled");

    let mut driver = ConversationDriver::new(model, ToolDispatcher::new(registry), system_prompt);
    let mut stdout = std::io::stdout();
    let exit = run_chat_loop(
        &mut driver,
        BufReader::new(tokio::io::stdin()),
        &mut stdout,
        interrupt,
    )
    .await
    .context("terminal I/O failed")?;

    tracing::info!(turns = driver.history().len(), "chat loop finished");
    Ok(exit)
}
