//! Declarative argument grammar for endpoint commands.
//!
//! Keys are written the way the usage line reads (`<user>`, `--gid`); the
//! clap id of every argument is its normalized key, so the option map and
//! the parser agree on names.

use clap::{Arg, ArgAction, ArgMatches};

use super::options::{OptValue, Options, normalize_key};

#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    Positional { multiple: bool, required: bool },
    Flag,
    Value { value_name: &'static str },
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub key: &'static str,
    pub kind: ArgKind,
    pub short: Option<char>,
    pub help: &'static str,
    conflicts: Vec<&'static str>,
    requires: Vec<&'static str>,
    required_unless: Option<&'static str>,
}

impl ArgSpec {
    fn new(key: &'static str, kind: ArgKind) -> Self {
        Self {
            key,
            kind,
            short: None,
            help: "",
            conflicts: Vec::new(),
            requires: Vec::new(),
            required_unless: None,
        }
    }

    /// Optional single positional (`[<size>]`).
    pub fn positional(key: &'static str) -> Self {
        Self::new(
            key,
            ArgKind::Positional {
                multiple: false,
                required: false,
            },
        )
    }

    pub fn flag(key: &'static str) -> Self {
        Self::new(key, ArgKind::Flag)
    }

    pub fn value(key: &'static str, value_name: &'static str) -> Self {
        Self::new(key, ArgKind::Value { value_name })
    }

    /// Repeated positional (`<user> ...`).
    pub fn many(mut self) -> Self {
        if let ArgKind::Positional { multiple, .. } = &mut self.kind {
            *multiple = true;
        }
        self
    }

    pub fn required(mut self) -> Self {
        if let ArgKind::Positional { required, .. } = &mut self.kind {
            *required = true;
        }
        self
    }

    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    pub fn help(mut self, text: &'static str) -> Self {
        self.help = text;
        self
    }

    pub fn conflicts_with(mut self, other: &'static str) -> Self {
        self.conflicts.push(other);
        self
    }

    pub fn requires(mut self, other: &'static str) -> Self {
        self.requires.push(other);
        self
    }

    /// Required unless `other` is given (`install <pkg> ... | install --uri <uri>`).
    pub fn required_unless(mut self, other: &'static str) -> Self {
        self.required_unless = Some(other);
        self
    }

    pub fn id(&self) -> String {
        normalize_key(self.key)
    }

    pub fn to_clap(&self) -> Arg {
        let mut arg = Arg::new(self.id()).help(self.help);
        arg = match &self.kind {
            ArgKind::Positional { multiple, required } => {
                let name = self.key.trim_matches(|c: char| c == '<' || c == '>');
                let arg = arg.value_name(name.to_string()).required(*required);
                if *multiple {
                    arg.num_args(1..).action(ArgAction::Append)
                } else {
                    arg.action(ArgAction::Set)
                }
            }
            ArgKind::Flag => arg
                .long(self.key.trim_start_matches('-').to_string())
                .action(ArgAction::SetTrue),
            ArgKind::Value { value_name } => arg
                .long(self.key.trim_start_matches('-').to_string())
                .value_name(*value_name)
                .action(ArgAction::Set),
        };
        if let Some(c) = self.short {
            arg = arg.short(c);
        }
        for other in &self.conflicts {
            arg = arg.conflicts_with(normalize_key(other));
        }
        for other in &self.requires {
            arg = arg.requires(normalize_key(other));
        }
        if let Some(other) = self.required_unless {
            arg = arg.required_unless_present(normalize_key(other));
        }
        arg
    }

    pub fn extract(&self, matches: &ArgMatches) -> OptValue {
        let id = self.id();
        match &self.kind {
            ArgKind::Flag => OptValue::Flag(matches.get_flag(&id)),
            ArgKind::Positional { multiple: true, .. } => OptValue::List(
                matches
                    .get_many::<String>(&id)
                    .map(|vals| vals.cloned().collect())
                    .unwrap_or_default(),
            ),
            ArgKind::Positional { .. } | ArgKind::Value { .. } => {
                OptValue::Value(matches.get_one::<String>(&id).cloned())
            }
        }
    }
}

/// Collect every declared argument from `matches` into an option map.
pub fn collect_options(specs: &[ArgSpec], matches: &ArgMatches) -> Options {
    let mut opts = Options::new();
    for spec in specs {
        opts.insert(spec.id(), spec.extract(matches));
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> Vec<ArgSpec> {
        vec![
            ArgSpec::flag("--nodeletehome"),
            ArgSpec::flag("--force").short('f'),
            ArgSpec::value("--gid", "gid").short('g'),
            ArgSpec::positional("<user>").many().required(),
        ]
    }

    fn parse(args: &[&str]) -> Result<Options, clap::Error> {
        let specs = grammar();
        let cmd = clap::Command::new("delete").args(specs.iter().map(ArgSpec::to_clap));
        let m = cmd.try_get_matches_from(args)?;
        Ok(collect_options(&specs, &m))
    }

    #[test]
    fn flags_values_and_lists_are_collected() {
        let opts = parse(&["delete", "--force", "-g", "10", "alice", "bob"]).unwrap();
        assert!(opts.flag("_force"));
        assert!(!opts.flag("_nodeletehome"));
        assert_eq!(opts.value("_gid"), Some("10"));
        assert_eq!(opts.list("user"), vec!["alice", "bob"]);
    }

    #[test]
    fn required_positional_is_enforced() {
        assert!(parse(&["delete", "--force"]).is_err());
    }

    #[test]
    fn conflicts_and_requirements_are_enforced() {
        let specs = vec![
            ArgSpec::flag("--logical").conflicts_with("--extended"),
            ArgSpec::flag("--extended"),
            ArgSpec::value("--repo", "repo").requires("--logical"),
        ];
        let cmd = || clap::Command::new("create").args(specs.iter().map(ArgSpec::to_clap));
        assert!(
            cmd()
                .try_get_matches_from(["create", "--logical", "--extended"])
                .is_err()
        );
        assert!(cmd().try_get_matches_from(["create", "--repo", "x"]).is_err());
        assert!(
            cmd()
                .try_get_matches_from(["create", "--logical", "--repo", "x"])
                .is_ok()
        );
    }

    #[test]
    fn required_unless_allows_alternative() {
        let specs = vec![
            ArgSpec::value("--uri", "uri").conflicts_with("<pkg>"),
            ArgSpec::positional("<pkg>").many().required_unless("--uri"),
        ];
        let cmd = || clap::Command::new("install").args(specs.iter().map(ArgSpec::to_clap));
        assert!(cmd().try_get_matches_from(["install"]).is_err());
        assert!(
            cmd()
                .try_get_matches_from(["install", "--uri", "http://x/p.rpm"])
                .is_ok()
        );
        assert!(cmd().try_get_matches_from(["install", "vim"]).is_ok());
    }
}
