//! Resolved settings.
//!
//! Every subsystem depends only on these types, never on where the values came
//! from (command line or environment).

use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_CA_FILE: &str = "/etc/haproxy-confd/ca.pem";
pub const DEFAULT_TEMPLATE_DIR: &str = "/etc/haproxy-confd";
pub const DEFAULT_HAPROXY_CONF: &str = "/etc/haproxy/haproxy.cfg";
pub const DEFAULT_CHECK_CMD: &str = "/usr/sbin/haproxy -c -q -f";
pub const DEFAULT_RELOAD_CMD: &str = "/etc/init.d/haproxy reload";

/// Root settings for the reconciler.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Log filter (trace, debug, info, warn, error or a full directive).
    pub log_level: String,

    /// Seconds between reconcile ticks.
    pub interval_secs: u64,

    /// Upper bound for the failure backoff in seconds. 0 disables backoff.
    pub backoff_max_secs: u64,

    /// Run a single tick and exit.
    pub once: bool,

    /// Prometheus scrape address. Metrics are not exported when unset.
    pub metrics_address: Option<String>,

    /// API server access.
    pub api: ApiSettings,

    /// Fragment directory.
    pub render: RenderSettings,

    /// Validation, install and reload.
    pub install: InstallSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            interval_secs: 30,
            backoff_max_secs: 0,
            once: false,
            metrics_address: None,
            api: ApiSettings::default(),
            render: RenderSettings::default(),
            install: InstallSettings::default(),
        }
    }
}

/// How to reach the cluster API.
#[derive(Debug, Clone, Serialize)]
pub struct ApiSettings {
    /// Base URLs like `https://10.0.0.1:6443`, in priority order.
    pub servers: Vec<String>,

    /// Try every server in order instead of only the first one.
    pub failover: bool,

    /// Build the HTTP client without any proxy.
    pub ignore_proxy: bool,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    pub tls: TlsSettings,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            failover: false,
            ignore_proxy: true,
            timeout_secs: 10,
            tls: TlsSettings::default(),
        }
    }
}

/// TLS options for the API client.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TlsSettings {
    pub ca: CaSource,

    /// Client certificate (PEM). Requires `client_key`.
    pub client_cert: Option<PathBuf>,

    /// Client private key (PEM). Requires `client_cert`.
    pub client_key: Option<PathBuf>,
}

/// Where server certificates are verified against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaSource {
    /// Platform trust roots.
    #[default]
    SystemRoots,
    /// A PEM bundle on disk.
    File(PathBuf),
    /// Server certificates are not verified.
    Insecure,
}

impl CaSource {
    /// Interpret a CA option value: empty means system roots, `false` disables
    /// verification, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            CaSource::SystemRoots
        } else if value.eq_ignore_ascii_case("false") {
            CaSource::Insecure
        } else {
            CaSource::File(PathBuf::from(value))
        }
    }
}

/// Fragment directory settings.
#[derive(Debug, Clone, Serialize)]
pub struct RenderSettings {
    pub template_dir: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
        }
    }
}

/// Installer settings.
#[derive(Debug, Clone, Serialize)]
pub struct InstallSettings {
    /// Live haproxy config path.
    pub destination: PathBuf,

    /// Directory for candidate configs awaiting validation.
    pub scratch_dir: PathBuf,

    /// Syntax check command; the candidate path is appended.
    pub check_cmd: String,

    /// Reload command.
    pub reload_cmd: String,

    /// Deadline for each subprocess in seconds.
    pub command_timeout_secs: u64,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            destination: PathBuf::from(DEFAULT_HAPROXY_CONF),
            scratch_dir: std::env::temp_dir(),
            check_cmd: DEFAULT_CHECK_CMD.to_string(),
            reload_cmd: DEFAULT_RELOAD_CMD.to_string(),
            command_timeout_secs: 60,
        }
    }
}
