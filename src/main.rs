use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, ArgMatches, Args, FromArgMatches};
use serde_json::json;
use tracing::debug;

mod cim;
mod cmd;
mod command;
mod config;
mod error;
mod format;
mod utils;

use cim::Namespace;
use cim::bridge::BridgeNamespace;
use cim::target::{TargetSpec, parse_target};
use command::{CommandContext, Multiplexer, Output};
use config::Config;
use error::{Error, Result};
use format::{Role, StyleOptions, box_header, color};

// Flags accepted by every command; see `cli`.
#[derive(Args, Debug)]
struct GlobalArgs {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Bridge command (or URL) of a managed host; repeat for several hosts
    #[arg(
        short = 't',
        long = "target",
        global = true,
        value_name = "TARGET",
        env = "LMI_TARGET"
    )]
    targets: Vec<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file
    #[arg(long, global = true, value_name = "PATH", env = "LMI_CONFIG")]
    config: Option<PathBuf>,

    /// CIM namespace (default root/cimv2)
    #[arg(long, global = true, value_name = "NAMESPACE")]
    namespace: Option<String>,

    /// Print sizes in KiB/MiB/GiB instead of bytes
    #[arg(long, global = true)]
    human_friendly: bool,

    /// Show the bridge process's stderr
    #[arg(long, global = true)]
    bridge_stderr: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// lmi - OpenLMI command line interface
///
/// Command layout:
///   lmi user      <list|show|create|delete> ...
///   lmi group     <show|listusers|create|delete|add|remove> ...
///   lmi sw        <list|show|install|remove|verify|update|enable|disable> ...
///   lmi partition <list|create|delete|show> ...
///
/// Global flags / env:
///   -v / -vv        Increase verbosity (LMI_LOG overrides, e.g. LMI_LOG=debug)
///   -q / --quiet    Errors only
///   -t / --target   Bridge to run against (repeatable; LMI_TARGET env fallback)
///   --json          One JSON document per host instead of tables
///   --config PATH   Configuration file (LMI_CONFIG env fallback)
///
/// Targets:
///   Local command (spawned, speaks MCP on stdio), e.g.
///     "lmi-bridge"  or  "ssh root@db1.example.com lmi-bridge"
///   URLs are recognized but not supported.
///
/// Examples:
///   lmi -t "ssh root@db1 lmi-bridge" user list
///   lmi -t "ssh root@db1 lmi-bridge" -t "ssh root@db2 lmi-bridge" sw update bash
///   lmi -t lmi-bridge --human-friendly partition list /dev/sda
fn cli(tree: &Multiplexer) -> clap::Command {
    let cmd = clap::Command::new("lmi")
        .version(env!("CARGO_PKG_VERSION"))
        .about("OpenLMI command line interface")
        .propagate_version(true)
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommands(tree.subcommands());
    GlobalArgs::augment_args(cmd)
}

fn main() -> ExitCode {
    let tree = cmd::registry();
    let matches = cli(&tree).get_matches();
    let globals = match GlobalArgs::from_arg_matches(&matches) {
        Ok(g) => g,
        Err(e) => e.exit(),
    };

    // Initialize logging
    let level = utils::derive_level(globals.verbose, globals.quiet);
    utils::init_logging(level);

    let mut style = StyleOptions::detect();
    if globals.no_color {
        style.use_color = false;
    }

    match run(&tree, &matches, &globals, &style) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{} {err}", color(Role::Error, "error:", &style));
            ExitCode::from(err.exit_code())
        }
    }
}

/// Resolve and validate the command, then run it once per target.
/// Returns the worst exit status over all hosts.
fn run(
    tree: &Multiplexer,
    matches: &ArgMatches,
    globals: &GlobalArgs,
    style: &StyleOptions,
) -> Result<u8> {
    let config = Config::load(globals.config.as_deref())?;

    // Everything that can be rejected locally is rejected before connecting.
    let resolved = tree.resolve(matches)?;
    let opts = resolved.endpoint.prepare(resolved.matches)?;
    debug!(command = %resolved.command_line(), ?opts, "prepared");

    let targets = select_targets(&globals.targets, &config)?;
    let namespace = globals
        .namespace
        .clone()
        .unwrap_or_else(|| config.namespace.clone());
    let ctx = CommandContext {
        human_friendly: globals.human_friendly || config.human_friendly,
    };
    let bridge_stderr = globals.bridge_stderr || config.bridge_stderr;
    let command_line = resolved.command_line();
    let several = targets.len() > 1;

    let mut worst = 0;
    for spec in &targets {
        let host = spec.host_label();
        if several && !globals.json {
            println!("{}", box_header(&host, Some(&command_line), style));
        }
        let result = BridgeNamespace::connect(spec, &namespace, bridge_stderr)
            .and_then(|ns| {
                debug!(host = %host, namespace = ns.name(), "connected");
                resolved.endpoint.run(&ns, &opts, &ctx)
            });
        match result {
            Ok(output) if globals.json => print_json(&host_document(&host, &command_line, &output)),
            Ok(output) => print_output(&output, style),
            Err(err) => {
                debug!(host = %host, error = ?err, "command failed");
                worst = worst.max(err.exit_code());
                if globals.json {
                    print_json(&json!({
                        "host": host,
                        "command": command_line,
                        "error": err.to_string(),
                        "exit_code": err.exit_code(),
                    }));
                } else {
                    eprintln!("{} {host}: {err}", color(Role::Error, "error:", style));
                }
            }
        }
        if several && !globals.json {
            println!();
        }
    }
    if several && worst != 0 && !globals.json {
        eprintln!(
            "{}",
            color(Role::Warning, "some hosts failed, see the errors above", style)
        );
    }
    Ok(worst)
}

/// Effective targets: `--target` / `LMI_TARGET`, else the configuration file.
fn select_targets(cli_targets: &[String], config: &Config) -> Result<Vec<TargetSpec>> {
    let raw: &[String] = if cli_targets.is_empty() {
        &config.targets
    } else {
        cli_targets
    };
    if raw.is_empty() {
        return Err(Error::invalid(
            "no target given (use --target, LMI_TARGET or the configuration file)",
        ));
    }
    raw.iter()
        .map(|t| {
            parse_target(t).map_err(|e| Error::invalid(format!("invalid target '{t}': {e:#}")))
        })
        .collect()
}

fn host_document(host: &str, command_line: &str, output: &Output) -> serde_json::Value {
    json!({
        "host": host,
        "command": command_line,
        "tables": output.tables.iter().map(format::Table::to_json).collect::<Vec<_>>(),
        "notes": output.notes,
    })
}

fn print_json(doc: &serde_json::Value) {
    match serde_json::to_string_pretty(doc) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

fn print_output(output: &Output, style: &StyleOptions) {
    for (i, table) in output.tables.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", table.render(style));
    }
    for note in &output.notes {
        println!("{note}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> (ArgMatches, GlobalArgs) {
        let tree = cmd::registry();
        let m = cli(&tree).try_get_matches_from(argv).unwrap();
        let g = GlobalArgs::from_arg_matches(&m).unwrap();
        (m, g)
    }

    #[test]
    fn global_flags_after_subcommand() {
        let (_, g) = parse(&[
            "lmi", "user", "list", "-t", "lmi-bridge", "-t", "ssh root@db2 lmi-bridge", "--json", "-vv",
        ]);
        assert_eq!(g.targets.len(), 2);
        assert!(g.json);
        assert_eq!(g.verbose, 2);
    }

    #[test]
    fn cli_is_consistent() {
        cli(&cmd::registry()).debug_assert();
    }

    #[test]
    fn targets_fall_back_to_config() {
        let config = Config {
            targets: vec!["ssh root@db1 lmi-bridge".into()],
            ..Config::default()
        };
        let specs = select_targets(&[], &config).unwrap();
        assert_eq!(specs[0].host_label(), "root@db1");

        let specs = select_targets(&["lmi-bridge".to_string()], &config).unwrap();
        assert_eq!(specs[0].host_label(), "lmi-bridge");

        let err = select_targets(&[], &Config::default()).unwrap_err();
        assert_eq!(err.exit_code(), error::EXIT_USAGE);
    }

    #[test]
    fn json_document_shape() {
        let output = Output {
            tables: vec![format::Table::new(&["Name"]).rows(vec![vec!["alice".into()]])],
            notes: vec!["done".into()],
        };
        let doc = host_document("db1", "lmi user list", &output);
        assert_eq!(doc["host"], "db1");
        assert_eq!(doc["tables"][0]["rows"][0]["Name"], "alice");
        assert_eq!(doc["notes"][0], "done");
    }
}
