use std::net::IpAddr;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use simply_dns_webhook::{config::Ttl, provider::SIMPLY_API_URL};

#[derive(Clone, PartialEq, Eq, Hash, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Simply.com account name, e.g. S123456
    #[arg(long, value_name = "ACCOUNT", env = "SIMPLY_ACCOUNT_NAME")]
    pub account_name: String,

    /// Simply.com API key belonging to the account
    #[arg(long, value_name = "API_KEY", env = "SIMPLY_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the Simply.com API
    #[arg(long, value_name = "URL", default_value = SIMPLY_API_URL, env = "SIMPLY_API_URL")]
    pub api_url: String,

    /// Only manage these domains, as a comma-separated list. Manages all domains of the account if empty
    #[arg(
        long,
        value_name = "DOMAIN",
        use_value_delimiter = true,
        value_delimiter = ',',
        env = "DOMAIN_FILTER"
    )]
    pub domain_filter: Vec<String>,

    /// Set the loglevel of the application
    #[arg(
        value_enum,
        short = 'l',
        long,
        default_value_t = Loglevel::Info,
        value_name = "LEVEL",
        env = "LOG_LEVEL",
        ignore_case = true
    )]
    pub loglevel: Loglevel,

    /// Address to listen on for webhook requests
    #[arg(long, default_value = "0.0.0.0", env = "LISTEN_ADDRESS")]
    pub listen_address: IpAddr,

    /// Port to listen on for webhook requests
    #[arg(short = 'p', long, default_value_t = 8888, env = "PORT")]
    pub port: u16,

    /// TTL for records that ExternalDNS sends without one
    #[arg(
        long,
        value_name = "TTL",
        default_value_t = simply_dns_webhook::config::DEFAULT_TTL,
        env = "DEFAULT_TTL"
    )]
    pub default_ttl: Ttl,

    /// Timeout for requests against the Simply.com API in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 30, env = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Do not make any changes to the DNS records, only show what would happen
    #[arg(long, short = 'd', action, default_value_t = false, env = "DRY_RUN")]
    pub dry_run: bool,
}

/// Used to set the applications loglevel
// log::Level doesn't derive ValueEnum, so we mirror it here
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum Loglevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
impl From<Loglevel> for LevelFilter {
    fn from(ll: Loglevel) -> Self {
        match ll {
            Loglevel::Error => LevelFilter::Error,
            Loglevel::Warn => LevelFilter::Warn,
            Loglevel::Info => LevelFilter::Info,
            Loglevel::Debug => LevelFilter::Debug,
            Loglevel::Trace => LevelFilter::Trace,
        }
    }
}
