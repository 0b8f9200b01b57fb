/*!
Command registration and dispatch.

A command module declares its endpoints as data: help text, an argument
grammar ([`ArgSpec`]), optional `verify`/`transform` hooks and a callable of
one of four kinds:

  - lister:          fixed columns, callable yields rows
  - multi-lister:    callable yields several titled tables
  - instance lister: callable yields instances, a property list renders
                     one Name/Value table per instance
  - check result:    callable yields an [`Outcome`] whose result must equal
                     the endpoint's expectation

Endpoints are grouped with [`register_subcommands`] into [`Multiplexer`]s,
which nest. The tree produces the clap grammar and, after parsing, resolves
the matched path back to its endpoint. [`EndPoint::prepare`] turns the
matches into normalized [`Options`] (verify first, then transform) without
touching the network; [`EndPoint::run`] executes against a namespace.
*/

pub mod grammar;
pub mod options;

use clap::ArgMatches;
use serde_json::Value;

pub use grammar::ArgSpec;
pub use options::{OptValue, Options};

use crate::cim::{Instance, Namespace};
use crate::error::{Error, Result};
use crate::format::Table;

/// Per-invocation settings commands may consult.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub human_friendly: bool,
}

pub type Row = Vec<String>;
pub type ListFn = fn(&dyn Namespace, &Options, &CommandContext) -> Result<Vec<Row>>;
pub type TablesFn = fn(&dyn Namespace, &Options, &CommandContext) -> Result<Vec<Table>>;
pub type InstancesFn = fn(&dyn Namespace, &Options) -> Result<Vec<Instance>>;
pub type CheckFn = fn(&dyn Namespace, &Options, &CommandContext) -> Result<Outcome>;
pub type VerifyFn = fn(&Options) -> Result<()>;
pub type TransformFn = fn(&mut Options);

/// How an instance lister renders one row of its Name/Value table.
#[derive(Clone, Copy)]
pub enum Property {
    /// Property shown under its own name.
    Name(&'static str),
    /// `(label, property)`.
    Renamed(&'static str, &'static str),
    /// `(label, fn)`.
    Computed(&'static str, fn(&Instance) -> String),
}

impl Property {
    fn render(&self, inst: &Instance) -> Row {
        match self {
            Property::Name(p) => vec![(*p).to_string(), inst.text(p)],
            Property::Renamed(label, p) => vec![(*label).to_string(), inst.text(p)],
            Property::Computed(label, f) => vec![(*label).to_string(), f(inst)],
        }
    }
}

/// What a check-result callable reports back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub result: Option<Value>,
    pub notes: Vec<String>,
}

impl Outcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with_result(value: impl Into<Value>) -> Self {
        Self {
            result: Some(value.into()),
            notes: Vec::new(),
        }
    }

    pub fn note(mut self, msg: impl Into<String>) -> Self {
        self.notes.push(msg.into());
        self
    }
}

/// Rendered result of one endpoint run on one host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub tables: Vec<Table>,
    pub notes: Vec<String>,
}

pub enum Kind {
    Lister {
        columns: &'static [&'static str],
        run: ListFn,
    },
    MultiLister {
        run: TablesFn,
    },
    InstanceLister {
        properties: Vec<Property>,
        run: InstancesFn,
    },
    CheckResult {
        expect: Option<Value>,
        run: CheckFn,
    },
}

pub struct EndPoint {
    about: &'static str,
    args: Vec<ArgSpec>,
    verify: Option<VerifyFn>,
    transform: Option<TransformFn>,
    kind: Kind,
}

impl EndPoint {
    fn new(about: &'static str, kind: Kind) -> Self {
        Self {
            about,
            args: Vec::new(),
            verify: None,
            transform: None,
            kind,
        }
    }

    pub fn lister(about: &'static str, columns: &'static [&'static str], run: ListFn) -> Self {
        Self::new(about, Kind::Lister { columns, run })
    }

    pub fn multi_lister(about: &'static str, run: TablesFn) -> Self {
        Self::new(about, Kind::MultiLister { run })
    }

    pub fn instance_lister(
        about: &'static str,
        properties: Vec<Property>,
        run: InstancesFn,
    ) -> Self {
        Self::new(about, Kind::InstanceLister { properties, run })
    }

    /// `expect` of `None` means the callable must not return a result value.
    pub fn check_result(about: &'static str, expect: Option<Value>, run: CheckFn) -> Self {
        Self::new(about, Kind::CheckResult { expect, run })
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn verify(mut self, f: VerifyFn) -> Self {
        self.verify = Some(f);
        self
    }

    pub fn transform(mut self, f: TransformFn) -> Self {
        self.transform = Some(f);
        self
    }

    fn to_clap(&self, name: &'static str) -> clap::Command {
        clap::Command::new(name)
            .about(self.about)
            .args(self.args.iter().map(ArgSpec::to_clap))
    }

    /// Options for this endpoint, verified and transformed.
    pub fn prepare(&self, matches: &ArgMatches) -> Result<Options> {
        let mut opts = grammar::collect_options(&self.args, matches);
        if let Some(verify) = self.verify {
            verify(&opts)?;
        }
        if let Some(transform) = self.transform {
            transform(&mut opts);
        }
        Ok(opts)
    }

    pub fn run(&self, ns: &dyn Namespace, opts: &Options, ctx: &CommandContext) -> Result<Output> {
        match &self.kind {
            Kind::Lister { columns, run } => {
                let rows = run(ns, opts, ctx)?;
                Ok(Output {
                    tables: vec![Table::new(columns).rows(rows)],
                    notes: Vec::new(),
                })
            }
            Kind::MultiLister { run } => Ok(Output {
                tables: run(ns, opts, ctx)?,
                notes: Vec::new(),
            }),
            Kind::InstanceLister { properties, run } => {
                let tables = run(ns, opts)?
                    .iter()
                    .map(|inst| {
                        let title = inst
                            .string("Name")
                            .unwrap_or_else(|| inst.path.to_string());
                        Table::new(&["Name", "Value"])
                            .title(title)
                            .rows(properties.iter().map(|p| p.render(inst)).collect())
                    })
                    .collect();
                Ok(Output {
                    tables,
                    notes: Vec::new(),
                })
            }
            Kind::CheckResult { expect, run } => {
                let outcome = run(ns, opts, ctx)?;
                if outcome.result != *expect {
                    return Err(Error::UnexpectedResult {
                        expected: describe(expect.as_ref()),
                        got: describe(outcome.result.as_ref()),
                    });
                }
                Ok(Output {
                    tables: Vec::new(),
                    notes: outcome.notes,
                })
            }
        }
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "no result".to_string(),
        Some(v) => v.to_string(),
    }
}

pub enum Command {
    EndPoint(EndPoint),
    Multiplexer(Multiplexer),
}

impl From<EndPoint> for Command {
    fn from(e: EndPoint) -> Self {
        Command::EndPoint(e)
    }
}

impl From<Multiplexer> for Command {
    fn from(m: Multiplexer) -> Self {
        Command::Multiplexer(m)
    }
}

pub struct Multiplexer {
    name: &'static str,
    about: &'static str,
    commands: Vec<(&'static str, Command)>,
}

/// Group `commands` under one multiplexing command.
pub fn register_subcommands(
    name: &'static str,
    about: &'static str,
    commands: Vec<(&'static str, Command)>,
) -> Multiplexer {
    Multiplexer {
        name,
        about,
        commands,
    }
}

/// Endpoint found for a parsed command line.
pub struct Resolved<'a> {
    pub path: Vec<&'static str>,
    pub endpoint: &'a EndPoint,
    pub matches: &'a ArgMatches,
}

impl Resolved<'_> {
    pub fn command_line(&self) -> String {
        self.path.join(" ")
    }
}

impl Multiplexer {
    /// clap subcommands for every child, for embedding in a parent command.
    pub fn subcommands(&self) -> Vec<clap::Command> {
        self.commands
            .iter()
            .map(|(name, cmd)| match cmd {
                Command::EndPoint(e) => e.to_clap(name),
                Command::Multiplexer(m) => m.to_clap(),
            })
            .collect()
    }

    pub fn to_clap(&self) -> clap::Command {
        clap::Command::new(self.name)
            .about(self.about)
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommands(self.subcommands())
    }

    /// Walk `matches` (parsed from [`Multiplexer::to_clap`] or from a parent
    /// embedding [`Multiplexer::subcommands`]) down to the chosen endpoint.
    pub fn resolve<'a>(&'a self, matches: &'a ArgMatches) -> Result<Resolved<'a>> {
        let mut path = vec![self.name];
        let mut current = self;
        let mut m = matches;
        loop {
            let Some((name, sub)) = m.subcommand() else {
                return Err(Error::invalid(format!(
                    "missing subcommand for '{}'",
                    path.join(" ")
                )));
            };
            let Some((registered, cmd)) = current.commands.iter().find(|(n, _)| *n == name)
            else {
                return Err(Error::invalid(format!("unknown command '{name}'")));
            };
            path.push(registered);
            match cmd {
                Command::EndPoint(endpoint) => {
                    return Ok(Resolved {
                        path,
                        endpoint,
                        matches: sub,
                    });
                }
                Command::Multiplexer(next) => {
                    current = next;
                    m = sub;
                }
            }
        }
    }
}
