//! Clinick command line client
//!
//! Submits incident reports, runs the alarm dashboard in a terminal and
//! exports monthly summaries.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use clap::{Parser, Subcommand, ValueEnum};
use clinick_client::{ApiClient, ReportBackend};
use clinick_core::config::LoggingConfig;
use clinick_core::{Config, MonthFilter, ReportDraft, ReportId, Role, Severity};
use clinick_dashboard::export::{self, report_row};
use clinick_dashboard::{
    Dashboard, DashboardError, ReportSubmitter, Result, SessionStore, SilentSiren, Siren,
    TerminalSiren, register_push_token,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

/// Command line interface for Clinick
#[derive(Parser)]
#[command(
    name = "clinick",
    version = env!("CARGO_PKG_VERSION"),
    about = "Clinic incident reporting client",
    long_about = "Submit incident reports, watch the clinic dashboard with audible alarms for new reports, and export monthly summaries."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to `[logging] level`
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log format (json, pretty); defaults to `[logging] format`
    #[arg(long)]
    log_format: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    json: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Submit an incident report
    Submit {
        /// Reporter role (Student, Teacher, Staff)
        #[arg(long)]
        role: Option<Role>,

        /// Patient name
        #[arg(long)]
        patient_name: Option<String>,

        /// Where the incident happened
        #[arg(long)]
        location: Option<String>,

        /// Short incident description
        #[arg(long)]
        incident: Option<String>,

        /// Severity (Mild, Moderate, Severe)
        #[arg(long)]
        severity: Option<Severity>,

        /// Observed symptoms
        #[arg(long)]
        symptoms: Option<String>,
    },

    /// Log in to the dashboard
    Login {
        /// Dashboard password (prompted when omitted)
        #[arg(long, env = "CLINICK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log out of the dashboard
    Logout,

    /// List reports once
    List {
        /// Month to show (YYYY-MM)
        #[arg(short, long, value_name = "YYYY-MM")]
        month: Option<MonthFilter>,
    },

    /// Watch for new reports and sound alarms
    Watch {
        /// Month to show (YYYY-MM); defaults to the current month
        #[arg(short, long, value_name = "YYYY-MM")]
        month: Option<MonthFilter>,

        /// Poll interval in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Register this push token before watching
        #[arg(long)]
        push_token: Option<String>,

        /// Do not ring the terminal bell
        #[arg(long)]
        silent: bool,
    },

    /// Export one month of reports
    Export {
        /// Output format
        #[arg(value_enum)]
        format: ExportFormat,

        /// Month to export (YYYY-MM)
        #[arg(short, long, value_name = "YYYY-MM")]
        month: Option<MonthFilter>,

        /// Output file or directory (overrides config)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Register a push notification token
    RegisterPush {
        /// Device token
        #[arg(value_name = "TOKEN")]
        token: String,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Export formats
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    /// Server-rendered CSV
    Csv,
    /// Locally rendered PDF table
    Pdf,
}

/// Main entry point for the Clinick client
///
/// # Errors
///
/// Returns error if configuration is invalid or the selected command fails
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for development convenience)
    if let Err(e) = dotenvy::dotenv() {
        // It's okay if .env doesn't exist
        eprintln!("Note: .env file not loaded: {e}");
    }

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    init_logging(&cli, &config.logging);

    match cli.command {
        Commands::Submit {
            role,
            patient_name,
            location,
            incident,
            severity,
            symptoms,
        } => {
            let draft = ReportDraft {
                role,
                patient_name: patient_name.unwrap_or_default(),
                location: location.unwrap_or_default(),
                incident: incident.unwrap_or_default(),
                severity,
                symptoms: symptoms.unwrap_or_default(),
            };
            submit(&config, draft).await
        }
        Commands::Login { password } => login(&config, password),
        Commands::Logout => session(&config).logout(),
        Commands::List { month } => list(&config, month).await,
        Commands::Watch {
            month,
            interval_ms,
            push_token,
            silent,
        } => {
            let mut config = config;
            if let Some(ms) = interval_ms {
                config.dashboard.poll_interval_ms = ms;
            }
            watch(&config, month, push_token, silent).await
        }
        Commands::Export {
            format,
            month,
            output,
        } => {
            let output = output.unwrap_or_else(|| config.export.output_dir.clone());
            run_export(&config, format, month, &output).await
        }
        Commands::RegisterPush { token } => {
            let client = ApiClient::from_config(&config.api)?;
            if register_push_token(&client, &token).await {
                println!("Push token registered");
            } else {
                println!("Push token was not registered (see log)");
            }
            Ok(())
        }
        Commands::Config { show } => handle_config_command(&config, show),
    }
}

/// Initialize logging system
///
/// Command line flags win over the `[logging]` section; `RUST_LOG` wins over both.
fn init_logging(cli: &Cli, configured: &LoggingConfig) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let logging =
        configured.with_overrides(cli.log_level.as_deref(), cli.log_format.as_deref(), cli.json);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if logging.is_json() {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %logging.level,
        "Clinick client starting"
    );
}

/// Load configuration from file or environment
///
/// Runs before logging is initialized, so it does not log.
///
/// # Errors
///
/// Returns error if the configuration file cannot be read or parsed
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Ok(Config::from_toml_file(path)?),
        None => Ok(Config::load()?),
    }
}

fn session(config: &Config) -> SessionStore {
    SessionStore::new(config.dashboard.session_path(), config.auth.clone())
}

fn backend(config: &Config) -> Result<Arc<ApiClient>> {
    Ok(Arc::new(ApiClient::from_config(&config.api)?))
}

/// Submit a report built from command line flags
///
/// # Errors
///
/// Returns error if a field is missing or the backend rejects the report
async fn submit(config: &Config, mut draft: ReportDraft) -> Result<()> {
    let submitter = ReportSubmitter::new(backend(config)?, config.submission.confirmation());
    let confirmation = submitter.submit(&mut draft).await?;
    println!("✅ {}", confirmation.message());
    Ok(())
}

/// Log in, prompting for the password when it was not given
///
/// # Errors
///
/// Returns error on a wrong password or if the session cannot be stored
fn login(config: &Config, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            print!("Password: ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    session(config).login(&password)?;
    println!("Logged in");
    Ok(())
}

/// Fetch and print reports once
///
/// # Errors
///
/// Returns error without a valid session or if the request fails
async fn list(config: &Config, month: Option<MonthFilter>) -> Result<()> {
    let token = session(config)
        .valid_token()
        .ok_or(DashboardError::NotAuthenticated)?;
    let client = backend(config)?;
    let reports = client.list_reports(month, &token).await?;

    if reports.is_empty() {
        println!("No reports");
        return Ok(());
    }
    for report in &reports {
        let [role, patient, location, incident, severity, symptoms, time] = report_row(report);
        let seen = if report.seen { "seen" } else { "NEW" };
        println!(
            "{id:<26} {seen:<4} {severity:<8} {role:<8} {location:<16} {patient:<20} {incident:<20} {time:<16} {symptoms}",
            id = report.id,
        );
    }
    Ok(())
}

/// Run the dashboard until Ctrl+C or `quit`
///
/// # Errors
///
/// Returns error without a valid session or if the backend URL is invalid
async fn watch(
    config: &Config,
    month: Option<MonthFilter>,
    push_token: Option<String>,
    silent: bool,
) -> Result<()> {
    let client = backend(config)?;
    if let Some(token) = push_token {
        register_push_token(&*client, &token).await;
    }

    let siren: Arc<dyn Siren> = if silent {
        Arc::new(SilentSiren)
    } else {
        Arc::new(TerminalSiren::new(config.dashboard.siren_repeat()))
    };
    let mut dashboard = Dashboard::new(config, client, siren);
    if let Some(month) = month {
        dashboard = dashboard.with_filter(Some(month));
    }

    if !dashboard.mount() {
        dashboard.unmount().await;
        return Err(DashboardError::NotAuthenticated);
    }

    println!("Watching for reports. Commands: stop <id>, stop-all, month <YYYY-MM|all>, list, alarms, logout, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if handle_watch_command(&dashboard, line.trim()).await == WatchFlow::Quit {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read command");
                    stdin_open = false;
                }
            },
        }
    }

    dashboard.unmount().await;
    let stats = dashboard.ack_stats();
    info!(
        acknowledged = stats.acknowledged,
        failed = stats.failed,
        dropped = stats.dropped,
        "Dashboard stopped"
    );
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum WatchFlow {
    Continue,
    Quit,
}

/// Apply one interactive command
async fn handle_watch_command(dashboard: &Dashboard, line: &str) -> WatchFlow {
    let (command, argument) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));

    match command {
        "" => {}
        "stop" if !argument.is_empty() => {
            if !dashboard.dismiss(&ReportId::new(argument)) {
                println!("No active alarm for {argument}");
            }
        }
        "stop-all" => {
            let stopped = dashboard.stop_all();
            println!("Stopped {stopped} alarm(s)");
        }
        "month" => {
            let filter = match argument {
                "" | "all" => None,
                value => match value.parse::<MonthFilter>() {
                    Ok(filter) => Some(filter),
                    Err(e) => {
                        println!("{e}");
                        return WatchFlow::Continue;
                    }
                },
            };
            if !dashboard.set_month(filter) {
                println!("Session ended; log in again");
                return WatchFlow::Quit;
            }
        }
        "list" => {
            for report in dashboard.reports() {
                let seen = if report.seen { "seen" } else { "NEW" };
                println!("{:<26} {seen:<4} {}", report.id, report.location);
            }
        }
        "alarms" => {
            for alarm in dashboard.active_alarms() {
                println!("{:<26} EMERGENCY ON {}", alarm.report_id, alarm.location);
            }
        }
        "logout" => {
            if let Err(e) = dashboard.logout().await {
                warn!(error = %e, "Logout failed");
            }
            return WatchFlow::Quit;
        }
        "quit" | "exit" => return WatchFlow::Quit,
        _ => println!("Unknown command: {line}"),
    }
    WatchFlow::Continue
}

/// Export one month as CSV or PDF
///
/// # Errors
///
/// Returns error without a month, without a session (PDF) or if the export
/// fails
async fn run_export(
    config: &Config,
    format: ExportFormat,
    month: Option<MonthFilter>,
    output: &Path,
) -> Result<()> {
    let month = month.ok_or(DashboardError::MonthRequired)?;
    let client = backend(config)?;

    let path = match format {
        ExportFormat::Csv => export::export_csv(&client, Some(month), output).await?,
        ExportFormat::Pdf => {
            let token = session(config)
                .valid_token()
                .ok_or(DashboardError::NotAuthenticated)?;
            let reports = client.list_reports(Some(month), &token).await?;
            export::export_pdf(&reports, Some(month), output)?
        }
    };

    println!("Exported {}", path.display());
    Ok(())
}

/// Handle configuration commands
///
/// # Errors
///
/// Returns error if configuration cannot be serialized
fn handle_config_command(config: &Config, show: bool) -> Result<()> {
    ApiClient::from_config(&config.api)?;
    info!(
        base_url = %config.api.base_url,
        data_dir = %config.dashboard.data_dir.display(),
        "Configuration is valid"
    );

    if show {
        println!("{}", config.redacted().to_toml()?);
    }
    Ok(())
}
