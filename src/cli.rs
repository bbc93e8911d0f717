use crate::profile::ScannerKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trustgrid")]
#[command(about = "Command-line client for the TrustGrid security-scanning backend")]
#[command(long_about = r#"
TrustGrid submits targets to a TrustGrid backend, follows scan progress and
prints the findings. All scanning happens on the backend.

WARNING: Only scan systems you own or have explicit permission to test.

Usage Examples:
  trustgrid webapp https://example.com               # Web application scan
  trustgrid api https://api.example.com --download   # API scan + PDF report
  trustgrid ssl example.com                          # TLS certificate check
  trustgrid domain example.com                       # Domain lookup
  trustgrid network 192.168.1.10 -p 1-1024           # Port scan
  trustgrid login -u alice                           # Store a session
"#)]
#[command(version)]
#[command(author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Backend base URL
    #[arg(long, env = "TRUSTGRID_URL", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Poll interval in milliseconds (overrides the scanner default)
    #[arg(long, value_name = "MS", global = true)]
    pub interval: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Output directory for downloaded reports
    #[arg(short, long, value_name = "DIR", global = true)]
    pub output: Option<PathBuf>,

    /// Download the PDF report once the scan finishes
    #[arg(long, global = true)]
    pub download: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Web application scan (spider + active scan)
    Webapp {
        /// Target URL (e.g., https://example.com)
        target: String,
    },

    /// REST API scan
    Api {
        /// API base URL
        target: String,
    },

    /// Domain information lookup
    Domain {
        /// Domain name (e.g., example.com)
        domain: String,
    },

    /// TLS certificate inspection
    Ssl {
        /// Domain name (e.g., example.com)
        domain: String,
    },

    /// Port scan of a single host
    Network {
        /// Target IP address
        ip: String,

        /// Port range (e.g., 1-1024 or 22,80,443)
        #[arg(short, long, default_value = crate::profile::DEFAULT_NETWORK_PORTS)]
        ports: String,
    },

    /// Create a backend account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// Password (read from TRUSTGRID_PASSWORD if omitted)
        #[arg(long, env = "TRUSTGRID_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and store the session tokens
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (read from TRUSTGRID_PASSWORD if omitted)
        #[arg(long, env = "TRUSTGRID_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,
}

impl Commands {
    /// Scanner kind and target for scan subcommands.
    pub fn scan_target(&self) -> Option<(ScannerKind, &str, Option<&str>)> {
        match self {
            Commands::Webapp { target } => Some((ScannerKind::Webapp, target.as_str(), None)),
            Commands::Api { target } => Some((ScannerKind::Api, target.as_str(), None)),
            Commands::Domain { domain } => Some((ScannerKind::Domain, domain.as_str(), None)),
            Commands::Ssl { domain } => Some((ScannerKind::Ssl, domain.as_str(), None)),
            Commands::Network { ip, ports } => {
                Some((ScannerKind::Network, ip.as_str(), Some(ports.as_str())))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_network_scan() {
        let cli = Cli::parse_from(["trustgrid", "network", "10.0.0.1", "-p", "22,80", "--download"]);
        assert!(cli.download);
        assert_eq!(
            cli.command.scan_target(),
            Some((ScannerKind::Network, "10.0.0.1", Some("22,80")))
        );
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["trustgrid", "webapp", "https://x.io", "-vv", "--interval", "500"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.interval, Some(500));
        assert!(matches!(cli.command, Commands::Webapp { .. }));
    }
}
