use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use linkscan::{
    agent::{AgentRegistry, MemorySurface, SingleSurface, Surface},
    api::{HttpScanApi, ScanApi},
    config::Config,
    coordinator::{
        Coordinator, LogNotifier, MenuClick, MenuOutcome, Notification, Notifier, TabInfo,
        DEEP_SCAN_ID, QUICK_SCAN_ID,
    },
    model::{ScanMode, ScanOutcome, ScanResult, TabId, ThreatLevel},
    output::{print_json, render_rate_panel, ConsoleNotifier, OutputFormat, TerminalSurface},
    popup::{Popup, PopupError, RatePanel},
};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit codes for scripting
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const MALICIOUS: u8 = 2;
    pub const SUSPICIOUS: u8 = 3;
}

/// The CLI drives a single simulated tab.
const ACTIVE_TAB: TabId = TabId(1);

#[derive(Parser)]
#[command(name = "linkscan")]
#[command(author, version, about = "Scan links with the LinkScanner service")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a URL, as typed into the popup
    Scan {
        url: String,

        /// Run a deep (enhanced) scan
        #[arg(long)]
        deep: bool,

        /// Output format (text, json, html)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Trigger a context-menu scan through the coordinator
    Menu {
        #[arg(value_enum)]
        entry: MenuEntry,

        /// URL of the link that was right-clicked
        #[arg(long)]
        link_url: Option<String>,

        /// URL of the page the menu was opened on
        #[arg(long)]
        page_url: Option<String>,

        /// URL of the active tab
        #[arg(long)]
        tab_url: Option<String>,

        /// Output format (text, json, html)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Show API rate-limit usage
    Limits {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,

        /// Output format (text, json, html)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Check which configured API address is reachable
    Health,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MenuEntry {
    Quick,
    Deep,
}

impl MenuEntry {
    fn item_id(self) -> &'static str {
        match self {
            MenuEntry::Quick => QUICK_SCAN_ID,
            MenuEntry::Deep => DEEP_SCAN_ID,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable config file: {}", e);
        Config::default()
    });

    match cli.command {
        Commands::Scan { url, deep, format } => {
            let format = resolve_format(format, &config)?;
            let mode = if deep {
                ScanMode::Enhanced
            } else {
                ScanMode::Quick
            };
            run_scan(&config, &url, mode, format).await
        }
        Commands::Menu {
            entry,
            link_url,
            page_url,
            tab_url,
            format,
        } => {
            let format = resolve_format(format, &config)?;
            let mut click = MenuClick::new(entry.item_id());
            click.link_url = link_url;
            click.page_url = page_url;
            let tab = TabInfo {
                id: ACTIVE_TAB,
                url: tab_url,
            };
            run_menu(&config, &click, &tab, format).await
        }
        Commands::Limits { watch, format } => {
            let format = resolve_format(format, &config)?;
            run_limits(&config, watch, format).await
        }
        Commands::Health => run_health(&config).await,
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("linkscan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linkscan=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_format(flag: Option<String>, config: &Config) -> Result<OutputFormat> {
    let format = flag.unwrap_or_else(|| config.default_format.clone());
    OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))
}

/// Everything one CLI invocation needs: the API client, the page agent
/// registry over the terminal, the coordinator and a popup bound to it.
struct Session {
    coordinator: Arc<Coordinator>,
    popup: Popup,
}

fn session(config: &Config, format: OutputFormat) -> Result<Session> {
    let api: Arc<dyn ScanApi> = Arc::new(HttpScanApi::new(&config.api_base_url)?);

    let surface: Arc<dyn Surface> = match format {
        // JSON goes to stdout as a single document; overlays stay in memory.
        OutputFormat::Json => MemorySurface::new(),
        _ => TerminalSurface::new(format, std::io::stderr().is_terminal()),
    };
    let agents = Arc::new(AgentRegistry::new(
        Arc::new(SingleSurface(surface)),
        config.agent_settings(),
    ));

    let notifier: Arc<dyn Notifier> = if std::io::stderr().is_terminal() {
        Arc::new(ConsoleNotifier)
    } else {
        Arc::new(LogNotifier)
    };
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&api),
        Arc::clone(&agents),
        notifier,
        config.coordinator_settle(),
    ));
    let runtime = coordinator.serve_runtime();
    let popup = Popup::new(api, agents, runtime, ACTIVE_TAB, config.popup_settings());

    Ok(Session { coordinator, popup })
}

async fn run_scan(config: &Config, url: &str, mode: ScanMode, format: OutputFormat) -> Result<u8> {
    let session = session(config, format)?;

    match session.popup.scan(url, mode).await {
        Ok(result) => {
            if format == OutputFormat::Json {
                print_json(&result)?;
            }
            Ok(verdict_code(&result))
        }
        Err(PopupError::Api(e)) if format != OutputFormat::Json => {
            // The error overlay has already been printed.
            warn!("{}", e);
            Ok(exit_codes::ERROR)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_menu(
    config: &Config,
    click: &MenuClick,
    tab: &TabInfo,
    format: OutputFormat,
) -> Result<u8> {
    let session = session(config, format)?;
    session.coordinator.start().await;

    match session.coordinator.on_menu_clicked(click, tab).await {
        MenuOutcome::Completed { result, .. } => {
            if format == OutputFormat::Json {
                print_json(&result)?;
            }
            Ok(verdict_code(&result))
        }
        MenuOutcome::Failed { error, .. } => {
            if format == OutputFormat::Json {
                bail!(error);
            }
            Ok(exit_codes::ERROR)
        }
        MenuOutcome::NoTarget => bail!("No URL to scan: pass --link-url, --page-url or --tab-url"),
        MenuOutcome::Busy => bail!("A menu scan is already running"),
        MenuOutcome::Ignored => Ok(exit_codes::SUCCESS),
    }
}

async fn run_limits(config: &Config, watch: bool, format: OutputFormat) -> Result<u8> {
    let session = session(config, format)?;

    let panel = session.popup.refresh_rate_limits().await;
    println!("{}", render_rate_panel(&panel, format)?);
    if !watch {
        return Ok(if panel == RatePanel::Unavailable {
            exit_codes::ERROR
        } else {
            exit_codes::SUCCESS
        });
    }

    let mut updates = session.coordinator.subscribe();
    let mut ticker = tokio::time::interval(config.popup_settings().poll_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let panel = session.popup.refresh_rate_limits().await;
                println!("{}", render_rate_panel(&panel, format)?);
            }
            Ok(message) = updates.recv() => {
                if let linkscan::Message::UpdateRateLimit { info } = message {
                    println!("{}", render_rate_panel(&RatePanel::Usage(info), format)?);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(exit_codes::SUCCESS)
}

async fn run_health(config: &Config) -> Result<u8> {
    let candidates = config.base_url_candidates();
    match HttpScanApi::discover(&candidates).await {
        Ok(api) => {
            println!("\x1b[32mScanner API reachable at {}\x1b[0m", api.base_url());
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            warn!("{}", e);
            ConsoleNotifier.notify(Notification::api_unavailable());
            println!("Tried: {}", candidates.join(", "));
            Ok(exit_codes::ERROR)
        }
    }
}

fn verdict_code(result: &ScanResult) -> u8 {
    if let ScanOutcome::Failed { .. } = result.outcome() {
        return exit_codes::ERROR;
    }
    match result.threat_level() {
        Some(ThreatLevel::Malicious) => exit_codes::MALICIOUS,
        Some(ThreatLevel::Suspicious) => exit_codes::SUSPICIOUS,
        _ => exit_codes::SUCCESS,
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'linkscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
