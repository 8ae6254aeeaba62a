// # zonesyncd - zonesync runner
//
// Thin integration layer over zonesync-core. It reads configuration from the
// environment, installs logging, builds a backend through the registry and
// runs exactly one operation. No DNS logic lives here.
//
// ## Usage
//
// ```text
// zonesyncd records              # print observed records as JSON
// zonesyncd adjust  [FILE|-]     # adjust desired endpoints, print them
// zonesyncd plan    [FILE|-]     # print the zoned change set for a batch
// zonesyncd apply   [FILE|-]     # apply a batch, print the report
// ```
//
// Input defaults to `ZONESYNC_PLAN_PATH`, then stdin. JSON goes to stdout,
// logs go to stderr.
//
// ## Configuration
//
// ### Backend
// - `ZONESYNC_BACKEND_TYPE`: Backend type (memory, file)
// - `ZONESYNC_BACKEND_PATH`: Snapshot path (for file)
//
// ### Records
// - `ZONESYNC_VIEW`: View zones are listed from and records created in
// - `ZONESYNC_CREATE_PTR`: Generate PTR records for A records (true/false)
// - `ZONESYNC_DEFAULT_TTL`: TTL for endpoints without one
// - `ZONESYNC_DOMAIN_FILTER`: Comma-separated zones to manage
// - `ZONESYNC_EXCLUDE_DOMAINS`: Comma-separated zones to leave alone
// - `ZONESYNC_MAX_RESULTS`: Page size for record listings
// - `ZONESYNC_NAME_REGEX`: Regex record names must match when listing
// - `ZONESYNC_ZONE_REGEX`: Regex zone names must match when listing zones
// - `ZONESYNC_EXTENSIBLE_ATTRIBUTES_JSON`: JSON object attached to records
//
// ### Runner
// - `ZONESYNC_DRY_RUN`: Log changes instead of submitting them
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export ZONESYNC_BACKEND_TYPE=file
// export ZONESYNC_BACKEND_PATH=/var/lib/zonesync/zones.json
// export ZONESYNC_CREATE_PTR=true
// export ZONESYNC_DOMAIN_FILTER=example.com,10.0.0.0/8
//
// zonesyncd apply changes.json
// ```

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::io::Read;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::{
    BackendConfig, BackendRegistry, ChangeBatches, DomainFilter, Endpoint, EngineEvent,
    Reconciler, SyncConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Operation completed
/// - 1: Configuration or startup error
/// - 2: Runtime error (backend failure, malformed input, interrupt)
#[derive(Debug, Clone, Copy)]
enum ZonesyncExitCode {
    /// Operation completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<ZonesyncExitCode> for ExitCode {
    fn from(code: ZonesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Operation selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Records,
    Adjust,
    Plan,
    Apply,
}

impl Mode {
    fn parse(arg: &str) -> Result<Self> {
        match arg {
            "records" => Ok(Self::Records),
            "adjust" => Ok(Self::Adjust),
            "plan" => Ok(Self::Plan),
            "apply" => Ok(Self::Apply),
            other => anyhow::bail!(
                "Unknown mode '{}'. Valid modes: records, adjust, plan, apply",
                other
            ),
        }
    }

    fn reads_input(self) -> bool {
        self != Self::Records
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    backend_type: String,
    backend_path: Option<String>,
    view: String,
    create_ptr: bool,
    default_ttl: u32,
    domain_filter: Vec<String>,
    exclude_domains: Vec<String>,
    dry_run: bool,
    max_results: Option<u32>,
    name_regex: Option<String>,
    zone_regex: Option<String>,
    extensible_attributes: Option<String>,
    plan_path: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps variable names to values
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let flag = |key: &str| -> Result<bool> {
            match lookup(key).as_deref().map(str::trim) {
                None | Some("") => Ok(false),
                Some("1") | Some("true") | Some("yes") => Ok(true),
                Some("0") | Some("false") | Some("no") => Ok(false),
                Some(other) => anyhow::bail!("{} must be true or false. Got: {}", key, other),
            }
        };

        Ok(Self {
            backend_type: lookup("ZONESYNC_BACKEND_TYPE").unwrap_or_else(|| "memory".to_string()),
            backend_path: lookup("ZONESYNC_BACKEND_PATH"),
            view: lookup("ZONESYNC_VIEW").unwrap_or_else(|| "default".to_string()),
            create_ptr: flag("ZONESYNC_CREATE_PTR")?,
            default_ttl: lookup("ZONESYNC_DEFAULT_TTL")
                .map(|s| s.trim().parse())
                .transpose()
                .context("ZONESYNC_DEFAULT_TTL must be a number of seconds")?
                .unwrap_or(300),
            domain_filter: split_list(lookup("ZONESYNC_DOMAIN_FILTER")),
            exclude_domains: split_list(lookup("ZONESYNC_EXCLUDE_DOMAINS")),
            dry_run: flag("ZONESYNC_DRY_RUN")?,
            max_results: match lookup("ZONESYNC_MAX_RESULTS") {
                Some(s) => Some(
                    s.trim()
                        .parse()
                        .context("ZONESYNC_MAX_RESULTS must be a number")?,
                ),
                None => Some(1500),
            },
            name_regex: lookup("ZONESYNC_NAME_REGEX").filter(|s| !s.is_empty()),
            zone_regex: lookup("ZONESYNC_ZONE_REGEX").filter(|s| !s.is_empty()),
            extensible_attributes: lookup("ZONESYNC_EXTENSIBLE_ATTRIBUTES_JSON")
                .filter(|s| !s.trim().is_empty()),
            plan_path: lookup("ZONESYNC_PLAN_PATH").filter(|s| !s.is_empty()),
            log_level: lookup("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks the settings the library cannot see: backend selection and log
    /// level. Everything else is checked by `SyncConfig::validate`.
    fn validate(&self) -> Result<()> {
        match self.backend_type.as_str() {
            "memory" => {}
            "file" => match self.backend_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "ZONESYNC_BACKEND_PATH is required when ZONESYNC_BACKEND_TYPE=file. \
                    Set it via: export ZONESYNC_BACKEND_PATH=/var/lib/zonesync/zones.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "ZONESYNC_BACKEND_PATH parent directory does not exist: {}. \
                            Create it first: mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            },
            other => anyhow::bail!(
                "ZONESYNC_BACKEND_TYPE '{}' is not supported. \
                Supported types: memory, file",
                other
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.sync_config()?;
        Ok(())
    }

    /// Build the library configuration
    fn sync_config(&self) -> Result<SyncConfig> {
        let backend = match self.backend_type.as_str() {
            "file" => BackendConfig::File {
                path: self.backend_path.clone().unwrap_or_default(),
            },
            _ => BackendConfig::Memory,
        };

        let extensible_attributes = match &self.extensible_attributes {
            Some(raw) => serde_json::from_str(raw)
                .context("ZONESYNC_EXTENSIBLE_ATTRIBUTES_JSON is not valid JSON")?,
            None => serde_json::Value::Object(Default::default()),
        };

        let mut config = SyncConfig::new()
            .with_reverse_records(self.create_ptr)
            .with_dry_run(self.dry_run)
            .with_domain_filter(DomainFilter::new(
                self.domain_filter.clone(),
                self.exclude_domains.clone(),
            ));
        config.backend = backend;
        config.view = self.view.clone();
        config.default_ttl = self.default_ttl;
        config.max_results = self.max_results;
        config.name_regex = self.name_regex.clone();
        config.zone_regex = self.zone_regex.clone();
        config.extensible_attributes = extensible_attributes;

        config.validate()?;
        Ok(config)
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let mode = match Mode::parse(args.first().map(String::as_str).unwrap_or("records")) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Usage error: {}", e);
            return ZonesyncExitCode::ConfigError.into();
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ZonesyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    // Initialize tracing; stdout is reserved for JSON output
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    info!("Starting zonesyncd ({:?})", mode);

    let input_path = args
        .get(1)
        .cloned()
        .or_else(|| config.plan_path.clone())
        .unwrap_or_else(|| "-".to_string());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonesyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        tokio::select! {
            result = run(mode, &config, &input_path) => match result {
                Ok(()) => ZonesyncExitCode::Success,
                Err(e) => {
                    error!("zonesyncd failed: {:#}", e);
                    ZonesyncExitCode::RuntimeError
                }
            },
            signal = wait_for_shutdown() => {
                match signal {
                    Ok(name) => warn!("Received {} during pass, aborting", name),
                    Err(e) => error!("Signal handling error: {}", e),
                }
                ZonesyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run one operation against the configured backend
async fn run(mode: Mode, config: &Config, input_path: &str) -> Result<()> {
    let sync_config = config.sync_config()?;

    let registry = BackendRegistry::with_builtin();
    debug!("Registered backends: {}", registry.list_backends().join(", "));
    let backend = registry.create_backend(&sync_config.backend).await?;
    info!("Using {} backend, view '{}'", backend.backend_name(), sync_config.view);

    let (reconciler, mut events) = Reconciler::new(backend, sync_config)?;
    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let input = if mode.reads_input() {
        Some(read_input(input_path)?)
    } else {
        None
    };

    match (mode, input) {
        (Mode::Records, _) => {
            let records = reconciler.records().await?;
            print_json(&records)?;
        }
        (Mode::Adjust, Some(input)) => {
            let desired: Vec<Endpoint> = parse_input(&input)?;
            let observed = reconciler.records().await?;
            print_json(&reconciler.adjust_endpoints(desired, &observed))?;
        }
        (Mode::Plan, Some(input)) => {
            let batches: ChangeBatches = parse_input(&input)?;
            print_json(&reconciler.plan(&batches).await?)?;
        }
        (Mode::Apply, Some(input)) => {
            let batches: ChangeBatches = parse_input(&input)?;
            let report = reconciler.apply_changes(&batches).await?;
            print_json(&report)?;
        }
        (mode, None) => anyhow::bail!("{:?} needs input", mode),
    }

    drop(reconciler);
    event_logger.await.context("event logger task failed")?;
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::ChangeFailed {
            zone,
            change,
            error,
        } => error!("Failed to {} in zone {}: {}", change, zone, error),
        EngineEvent::PassFinished { applied, skipped } => {
            info!("Pass finished: {} applied, {} skipped", applied, skipped)
        }
        other => debug!("Engine event: {:?}", other),
    }
}

/// Read the input document from a path, or stdin for `-`
fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read input from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read input from {}", path))
    }
}

fn parse_input<T: DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_str(input).context("input is not valid JSON for this mode")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
