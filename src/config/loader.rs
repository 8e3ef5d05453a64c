//! Settings loading.
//!
//! Settings come from the command line when any argument is given, otherwise
//! entirely from environment variables. The two sources are never merged.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::schema::{
    ApiSettings, CaSource, InstallSettings, RenderSettings, Settings, TlsSettings,
    DEFAULT_CA_FILE, DEFAULT_CHECK_CMD, DEFAULT_HAPROXY_CONF, DEFAULT_RELOAD_CMD,
    DEFAULT_TEMPLATE_DIR,
};
use crate::config::validation::validate_settings;
use crate::error::{ConfdError, ConfdResult};

/// Command line interface.
#[derive(Debug, Parser)]
#[command(name = "haproxy-confd", version)]
#[command(about = "Generates haproxy.cfg from annotated cluster endpoints", long_about = None)]
pub struct Cli {
    /// Log level or tracing filter directive
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Ignore http_proxy/https_proxy settings from the environment
    #[arg(
        long,
        default_value = "true",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub ignore_proxy_env: bool,

    /// Client key file (PEM)
    #[arg(long)]
    pub ssl_key: Option<PathBuf>,

    /// Client certificate file (PEM)
    #[arg(long)]
    pub ssl_cert: Option<PathBuf>,

    /// Seconds between endpoint checks
    #[arg(long, default_value_t = 30)]
    pub interval: u64,

    /// CA file to verify the API server, or `false` to skip verification
    #[arg(long, default_value = DEFAULT_CA_FILE)]
    pub ssl_ca: String,

    /// Directory holding *.conf and *.tmpl fragments
    #[arg(long, default_value = DEFAULT_TEMPLATE_DIR)]
    pub template_dir: PathBuf,

    /// Where to install the generated haproxy config
    #[arg(long, default_value = DEFAULT_HAPROXY_CONF)]
    pub haproxy_conf: PathBuf,

    /// Comma separated API server URLs like https://<ip>:<port>
    #[arg(long, required = true, value_delimiter = ',')]
    pub api_servers: Vec<String>,

    /// Syntax check command; the candidate config path is appended
    #[arg(long, default_value = DEFAULT_CHECK_CMD)]
    pub haproxy_chk_cmd: String,

    /// Command to reload haproxy
    #[arg(long, default_value = DEFAULT_RELOAD_CMD)]
    pub haproxy_reload_cmd: String,

    /// Fall through to the next API server when one fails
    #[arg(long)]
    pub api_failover: bool,

    /// API request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub fetch_timeout: u64,

    /// Syntax check and reload timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub command_timeout: u64,

    /// Directory for candidate configs (default: system temp dir)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Cap in seconds for exponential backoff after failed runs (0 = fixed interval)
    #[arg(long, default_value_t = 0)]
    pub backoff_max: u64,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    pub metrics_address: Option<String>,

    /// Run once and exit
    #[arg(long)]
    pub once: bool,
}

impl Settings {
    /// Build settings from parsed command line arguments.
    pub fn from_cli(cli: Cli) -> Self {
        Self {
            log_level: cli.log_level,
            interval_secs: cli.interval,
            backoff_max_secs: cli.backoff_max,
            once: cli.once,
            metrics_address: cli.metrics_address,
            api: ApiSettings {
                servers: split_servers(&cli.api_servers.join(",")),
                failover: cli.api_failover,
                ignore_proxy: cli.ignore_proxy_env,
                timeout_secs: cli.fetch_timeout,
                tls: TlsSettings {
                    ca: CaSource::parse(&cli.ssl_ca),
                    client_cert: cli.ssl_cert,
                    client_key: cli.ssl_key,
                },
            },
            render: RenderSettings {
                template_dir: cli.template_dir,
            },
            install: InstallSettings {
                destination: cli.haproxy_conf,
                scratch_dir: cli.scratch_dir.unwrap_or_else(std::env::temp_dir),
                check_cmd: cli.haproxy_chk_cmd,
                reload_cmd: cli.haproxy_reload_cmd,
                command_timeout_secs: cli.command_timeout,
            },
        }
    }

    /// Build settings from the process environment.
    pub fn from_env() -> ConfdResult<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_env_with<F>(lookup: F) -> ConfdResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let path = |key: &str| get(key).map(PathBuf::from);
        let defaults = Settings::default();

        Ok(Self {
            log_level: get("LOGLEVEL").unwrap_or(defaults.log_level),
            interval_secs: env_u64(&get, "REFRESH_INTERVAL", defaults.interval_secs)?,
            backoff_max_secs: env_u64(&get, "BACKOFF_MAX", defaults.backoff_max_secs)?,
            once: env_bool(&get, "ONCE", false)?,
            metrics_address: get("METRICS_ADDRESS"),
            api: ApiSettings {
                servers: get("APISERVERS").map(|s| split_servers(&s)).unwrap_or_default(),
                failover: env_bool(&get, "API_FAILOVER", defaults.api.failover)?,
                ignore_proxy: env_bool(&get, "IGNORE_PROXY_ENV", defaults.api.ignore_proxy)?,
                timeout_secs: env_u64(&get, "FETCH_TIMEOUT", defaults.api.timeout_secs)?,
                tls: TlsSettings {
                    ca: CaSource::parse(&get("SSL_CA_FILE").unwrap_or_default()),
                    client_cert: path("SSL_CERT_FILE"),
                    client_key: path("SSL_KEY_FILE"),
                },
            },
            render: RenderSettings {
                template_dir: path("TEMPLATE_DIR").unwrap_or(defaults.render.template_dir),
            },
            install: InstallSettings {
                destination: path("HAPROXY_CONF").unwrap_or(defaults.install.destination),
                scratch_dir: path("SCRATCH_DIR").unwrap_or(defaults.install.scratch_dir),
                check_cmd: get("HAPROXY_CHECK_CMD").unwrap_or(defaults.install.check_cmd),
                reload_cmd: get("HAPROXY_RELOAD_CMD").unwrap_or(defaults.install.reload_cmd),
                command_timeout_secs: env_u64(
                    &get,
                    "COMMAND_TIMEOUT",
                    defaults.install.command_timeout_secs,
                )?,
            },
        })
    }
}

/// Resolve settings for this process and validate them.
pub fn load_settings() -> ConfdResult<Settings> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let settings = if args.len() <= 1 {
        Settings::from_env()?
    } else {
        Settings::from_cli(Cli::parse_from(args))
    };

    validate_settings(&settings).map_err(|errors| {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        ConfdError::Config(format!("Validation failed: {}", joined))
    })?;

    Ok(settings)
}

fn split_servers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_u64<G>(get: &G, key: &str, default: u64) -> ConfdResult<u64>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfdError::Config(format!("{}={:?} is not a number: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn env_bool<G>(get: &G, key: &str, default: bool) -> ConfdResult<bool>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfdError::Config(format!("{}={:?} is not a boolean", key, raw))),
    }
}
