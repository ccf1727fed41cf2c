//! Command-line and environment settings.

use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Parser)]
#[command(
    name = "sqlgauged",
    version,
    about = "Export the results of scheduled SQL queries as Prometheus gauges"
)]
pub struct Cli {
    /// Port the /metrics endpoint listens on.
    #[arg(short, long, env = "SQLGAUGE_PORT", default_value = "9207")]
    pub port: u16,

    /// Main query definition file.
    #[arg(short = 'c', long, env = "SQLGAUGE_CONFIG_FILE", default_value = "exporter.toml")]
    pub config_file: PathBuf,

    /// Directory of extra `*.toml` query files, merged in filename order.
    #[arg(long, env = "SQLGAUGE_CONFIG_DIR", default_value = "./config")]
    pub config_dir: PathBuf,

    /// MySQL server as host[:port].
    #[arg(
        short = 's',
        long,
        env = "SQLGAUGE_MYSQL_SERVER",
        default_value = "localhost",
        value_parser = parse_server_address
    )]
    pub mysql_server: ServerAddress,

    #[arg(short = 'u', long, env = "SQLGAUGE_MYSQL_USER", default_value = "root")]
    pub mysql_user: String,

    #[arg(
        short = 'P',
        long,
        env = "SQLGAUGE_MYSQL_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    pub mysql_password: String,

    /// Session time zone for MySQL connections, e.g. "+00:00" or "Europe/London".
    #[arg(short = 'z', long, env = "SQLGAUGE_MYSQL_LOCAL_TIMEZONE")]
    pub mysql_local_timezone: Option<String>,

    /// Log level used when RUST_LOG is not set.
    #[arg(
        long,
        env = "SQLGAUGE_LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Shorthand for --log-level debug.
    #[arg(short, long, env = "SQLGAUGE_VERBOSE")]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(short, long, env = "SQLGAUGE_JSON_LOGGING")]
    pub json_logging: bool,
}

impl Cli {
    /// Default tracing directive when RUST_LOG is absent.
    pub fn log_directive(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

/// Parse `host`, `host:port`, `[v6]` or `[v6]:port`. A bare IPv6 address
/// without brackets is taken as a host with the default port.
pub fn parse_server_address(s: &str) -> Result<ServerAddress, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("server address must not be empty".to_string());
    }

    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated '[' in {s:?}"))?;
        match tail {
            "" => (host, None),
            _ => match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(format!("unexpected {tail:?} after ']' in {s:?}")),
            },
        }
    } else if s.matches(':').count() == 1 {
        let (host, port) = s.split_once(':').unwrap_or((s, ""));
        (host, Some(port))
    } else {
        (s, None)
    };

    if host.is_empty() {
        return Err(format!("missing host in {s:?}"));
    }
    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| format!("invalid port {p:?} in {s:?}"))?,
        None => DEFAULT_MYSQL_PORT,
    };

    Ok(ServerAddress {
        host: host.to_string(),
        port,
    })
}
