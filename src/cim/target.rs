//! Target parsing: which management bridge to talk to for one host.
//!
//! A target is either a command line that starts a bridge speaking MCP on
//! stdio (`lmi-bridge`, `ssh root@db1 lmi-bridge`, ...) or a URL. URLs are
//! recognized so the user gets a precise error, but only command targets
//! can be connected.

use anyhow::{Context, Result, bail};
use shell_words::split as shell_split;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum TargetSpec {
    /// Bridge process to spawn.
    Command {
        original: String,
        program: String,
        args: Vec<String>,
    },
    /// Remote endpoint given by URL (http/https).
    Url { original: String, url: Url },
}

impl TargetSpec {
    pub fn original(&self) -> &str {
        match self {
            TargetSpec::Command { original, .. } => original,
            TargetSpec::Url { original, .. } => original,
        }
    }

    /// Short label used in per-host headers: the ssh destination when the
    /// bridge is started through ssh, else the whole target.
    pub fn host_label(&self) -> String {
        match self {
            TargetSpec::Command { program, args, .. } if program == "ssh" => {
                ssh_destination(args).unwrap_or_else(|| self.original().to_string())
            }
            TargetSpec::Url { url, .. } => url
                .host_str()
                .map(str::to_string)
                .unwrap_or_else(|| url.to_string()),
            _ => self.original().to_string(),
        }
    }
}

/// First ssh argument that is neither an option nor an option's value.
fn ssh_destination(args: &[String]) -> Option<String> {
    const TAKES_VALUE: &str = "BbcDEeFIiJLlmOopQRSWw";
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.strip_prefix('-') {
            Some(flag) if flag.len() == 1 && TAKES_VALUE.contains(flag) => {
                iter.next();
            }
            Some(_) => {}
            None => return Some(arg.clone()),
        }
    }
    None
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Command { program, args, .. } => {
                if args.is_empty() {
                    write!(f, "command: {}", program)
                } else {
                    write!(f, "command: {} {}", program, args.join(" "))
                }
            }
            TargetSpec::Url { url, .. } => write!(f, "url: {}", url),
        }
    }
}

/// Parse a `--target` value.
///
/// http/https URLs become [`TargetSpec::Url`]; anything else is split with
/// shell rules into a command line.
pub fn parse_target(raw: &str) -> Result<TargetSpec> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Target string is empty");
    }

    if let Ok(url) = Url::parse(trimmed)
        && matches!(url.scheme(), "http" | "https")
    {
        return Ok(TargetSpec::Url {
            original: raw.to_string(),
            url,
        });
    }

    let parts = shell_split(trimmed).context("Failed to parse bridge command line")?;
    let Some((program, args)) = parts.split_first() else {
        bail!("No tokens produced when parsing bridge command");
    };
    if program.is_empty() {
        bail!("Empty program name in bridge command");
    }
    Ok(TargetSpec::Command {
        original: raw.to_string(),
        program: program.clone(),
        args: args.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_target() {
        let spec = parse_target("https://mgmt.example.com:5989").unwrap();
        assert!(matches!(spec, TargetSpec::Url { .. }));
        assert_eq!(spec.host_label(), "mgmt.example.com");
    }

    #[test]
    fn parse_plain_command() {
        let spec = parse_target("lmi-bridge --namespace root/cimv2").unwrap();
        if let TargetSpec::Command { program, args, .. } = &spec {
            assert_eq!(program, "lmi-bridge");
            assert_eq!(args, &vec!["--namespace", "root/cimv2"]);
        } else {
            panic!("Expected Command variant");
        }
        assert_eq!(spec.host_label(), "lmi-bridge --namespace root/cimv2");
    }

    #[test]
    fn ssh_targets_are_labelled_by_destination() {
        let spec = parse_target("ssh -q root@db1.example.com lmi-bridge").unwrap();
        assert_eq!(spec.host_label(), "root@db1.example.com");
        let spec = parse_target("ssh -p 2222 -o BatchMode=yes db2 lmi-bridge").unwrap();
        assert_eq!(spec.host_label(), "db2");
    }

    #[test]
    fn quoted_arguments_survive() {
        let spec = parse_target(r#"lmi-bridge --socket "/run/my dir/cim.sock""#).unwrap();
        if let TargetSpec::Command { args, .. } = spec {
            assert_eq!(args, vec!["--socket", "/run/my dir/cim.sock"]);
        } else {
            panic!("Expected Command variant");
        }
    }

    #[test]
    fn other_schemes_are_commands() {
        let spec = parse_target("ftp://example.com/resource").unwrap();
        assert!(matches!(spec, TargetSpec::Command { .. }));
    }

    #[test]
    fn empty_target_rejected() {
        let err = parse_target("   ").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
