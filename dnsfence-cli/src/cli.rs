//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's
//! derive macros. It is purely declarative with no side effects or I/O.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Dnsfence -- per-tenant DNS filtering orchestration.
///
/// Use `dnsfence <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "dnsfence", version, about, long_about = None)]
pub struct Cli {
    /// Path to the dnsfence.toml configuration file.
    #[arg(short, long, default_value = "dnsfence.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Blocking mode choices exposed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Answer blocked queries with NXDOMAIN.
    Nxdomain,
    /// Answer blocked queries with a null address.
    NullIp,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a filtering instance for a tenant.
    Provision(ProvisionArgs),

    /// Remove a tenant's filtering instance and its record.
    Deprovision(DeprovisionArgs),

    /// Restart an instance container.
    Restart(RestartArgs),

    /// Query an instance container's live status.
    Status(StatusArgs),

    /// List all instances with live status.
    List,

    /// Converge an instance's rule set to the declared snapshot.
    Sync(SyncArgs),

    /// Routing configuration operations.
    Routing(RoutingArgs),

    /// Manage the tenant directory.
    Tenant(TenantArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- provision ----

/// Provision a filtering instance for a tenant.
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Tenant identifier.
    pub tenant: String,

    /// Public source address whose traffic routes to this instance.
    #[arg(long)]
    pub public_ip: IpAddr,

    /// Admin console password (write-only after creation).
    #[arg(long)]
    pub password: String,

    /// Blocking mode.
    #[arg(long, value_enum, default_value = "nxdomain")]
    pub mode: ModeArg,
}

// ---- deprovision ----

/// Remove a tenant's filtering instance.
#[derive(Args, Debug)]
pub struct DeprovisionArgs {
    /// Tenant identifier.
    pub tenant: String,
}

// ---- restart ----

/// Restart an instance container.
#[derive(Args, Debug)]
pub struct RestartArgs {
    /// Container name (as derived from the tenant identifier).
    pub container: String,
}

// ---- status ----

/// Query live container status.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Container name.
    pub container: String,
}

// ---- sync ----

/// Converge an instance's rule set.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Tenant identifier.
    pub tenant: String,

    /// JSON file with the declared rule snapshot; falls back to the
    /// rules recorded in the state store when omitted.
    #[arg(long)]
    pub rules_file: Option<PathBuf>,
}

// ---- routing ----

/// Routing configuration operations.
#[derive(Args, Debug)]
pub struct RoutingArgs {
    #[command(subcommand)]
    pub action: RoutingAction,
}

#[derive(Subcommand, Debug)]
pub enum RoutingAction {
    /// Render the routing configuration from current instances.
    Render {
        /// Write the rendered document to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

// ---- tenant ----

/// Manage the tenant directory.
#[derive(Args, Debug)]
pub struct TenantArgs {
    #[command(subcommand)]
    pub action: TenantAction,
}

#[derive(Subcommand, Debug)]
pub enum TenantAction {
    /// Register a tenant.
    Add {
        /// Tenant identifier.
        tenant: String,
    },
    /// List registered tenants.
    List,
}

// ---- config ----

/// Manage dnsfence configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, runtime, addressing, routing).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_provision() {
        let args = Cli::try_parse_from([
            "dnsfence",
            "provision",
            "acme",
            "--public-ip",
            "203.0.113.7",
            "--password",
            "hunter2",
        ]);
        assert!(args.is_ok(), "should parse 'provision' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Provision(provision_args) => {
                assert_eq!(provision_args.tenant, "acme");
                assert_eq!(
                    provision_args.public_ip,
                    "203.0.113.7".parse::<IpAddr>().unwrap()
                );
                assert!(matches!(provision_args.mode, ModeArg::Nxdomain));
            }
            _ => panic!("expected Provision command"),
        }
    }

    #[test]
    fn test_cli_parse_provision_null_ip_mode() {
        let args = Cli::try_parse_from([
            "dnsfence",
            "provision",
            "acme",
            "--public-ip",
            "203.0.113.7",
            "--password",
            "pw",
            "--mode",
            "null-ip",
        ]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Provision(provision_args) => {
                assert!(matches!(provision_args.mode, ModeArg::NullIp));
            }
            _ => panic!("expected Provision command"),
        }
    }

    #[test]
    fn test_cli_parse_provision_requires_public_ip() {
        let args = Cli::try_parse_from(["dnsfence", "provision", "acme", "--password", "pw"]);
        assert!(args.is_err(), "should require --public-ip");
    }

    #[test]
    fn test_cli_parse_provision_rejects_bad_ip() {
        let args = Cli::try_parse_from([
            "dnsfence",
            "provision",
            "acme",
            "--public-ip",
            "not-an-ip",
            "--password",
            "pw",
        ]);
        assert!(args.is_err(), "should reject invalid IP address");
    }

    #[test]
    fn test_cli_parse_deprovision() {
        let args = Cli::try_parse_from(["dnsfence", "deprovision", "acme"]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Deprovision(deprovision_args) => {
                assert_eq!(deprovision_args.tenant, "acme");
            }
            _ => panic!("expected Deprovision command"),
        }
    }

    #[test]
    fn test_cli_parse_restart() {
        let args = Cli::try_parse_from(["dnsfence", "restart", "dnsfence-tenant-acme"]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Restart(restart_args) => {
                assert_eq!(restart_args.container, "dnsfence-tenant-acme");
            }
            _ => panic!("expected Restart command"),
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let args = Cli::try_parse_from(["dnsfence", "status", "dnsfence-tenant-acme"]);
        assert!(args.is_ok(), "should parse 'status' subcommand");
    }

    #[test]
    fn test_cli_parse_list() {
        let args = Cli::try_parse_from(["dnsfence", "list"]);
        let cli = args.expect("parse succeeded");
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_cli_parse_sync_with_rules_file() {
        let args = Cli::try_parse_from([
            "dnsfence",
            "sync",
            "acme",
            "--rules-file",
            "/tmp/rules.json",
        ]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Sync(sync_args) => {
                assert_eq!(sync_args.tenant, "acme");
                assert_eq!(
                    sync_args.rules_file,
                    Some(PathBuf::from("/tmp/rules.json"))
                );
            }
            _ => panic!("expected Sync command"),
        }
    }

    #[test]
    fn test_cli_parse_sync_without_rules_file() {
        let args = Cli::try_parse_from(["dnsfence", "sync", "acme"]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Sync(sync_args) => {
                assert!(sync_args.rules_file.is_none());
            }
            _ => panic!("expected Sync command"),
        }
    }

    #[test]
    fn test_cli_parse_routing_render() {
        let args = Cli::try_parse_from(["dnsfence", "routing", "render"]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Routing(routing_args) => match routing_args.action {
                RoutingAction::Render { out } => assert!(out.is_none()),
            },
            _ => panic!("expected Routing command"),
        }
    }

    #[test]
    fn test_cli_parse_routing_render_with_out() {
        let args = Cli::try_parse_from([
            "dnsfence",
            "routing",
            "render",
            "--out",
            "/etc/dnsdist/dnsdist.conf",
        ]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Routing(routing_args) => match routing_args.action {
                RoutingAction::Render { out } => {
                    assert_eq!(out, Some(PathBuf::from("/etc/dnsdist/dnsdist.conf")));
                }
            },
            _ => panic!("expected Routing command"),
        }
    }

    #[test]
    fn test_cli_parse_tenant_add() {
        let args = Cli::try_parse_from(["dnsfence", "tenant", "add", "acme"]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Tenant(tenant_args) => match tenant_args.action {
                TenantAction::Add { tenant } => assert_eq!(tenant, "acme"),
                _ => panic!("expected Add action"),
            },
            _ => panic!("expected Tenant command"),
        }
    }

    #[test]
    fn test_cli_parse_config_validate() {
        let args = Cli::try_parse_from(["dnsfence", "config", "validate"]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Validate => {}
                _ => panic!("expected Validate action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let args = Cli::try_parse_from(["dnsfence", "config", "show", "--section", "runtime"]);
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("runtime".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_custom_config_path() {
        let args = Cli::try_parse_from(["dnsfence", "-c", "/custom/dnsfence.toml", "list"]);
        let cli = args.expect("parse succeeded");
        assert_eq!(cli.config, PathBuf::from("/custom/dnsfence.toml"));
    }

    #[test]
    fn test_cli_parse_output_format_json() {
        let args = Cli::try_parse_from(["dnsfence", "--output", "json", "list"]);
        let cli = args.expect("parse succeeded");
        assert!(matches!(cli.output, OutputFormat::Json));
    }

    #[test]
    fn test_cli_parse_log_level() {
        let args = Cli::try_parse_from(["dnsfence", "--log-level", "debug", "list"]);
        let cli = args.expect("parse succeeded");
        assert_eq!(cli.log_level, Some("debug".to_owned()));
    }

    #[test]
    fn test_cli_parse_invalid_command_fails() {
        let args = Cli::try_parse_from(["dnsfence", "invalid-command"]);
        assert!(args.is_err(), "should fail on invalid command");
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        let args = Cli::try_parse_from(["dnsfence"]);
        assert!(args.is_err(), "should fail when no command provided");
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "dnsfence");

        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for expected in [
            "provision",
            "deprovision",
            "restart",
            "status",
            "list",
            "sync",
            "routing",
            "tenant",
            "config",
        ] {
            assert!(
                subcommands.contains(&expected),
                "should have '{expected}' subcommand"
            );
        }
    }
}
