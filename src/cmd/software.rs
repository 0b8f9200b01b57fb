//! System software management.
//!
//! ```text
//! lmi sw list pkgs [(--available [--repo <repo>] | --all)] [--allow-duplicates]
//! lmi sw list repos [--disabled | --all]
//! lmi sw list files <pkg>
//! lmi sw show pkg [--repo <repo>] <pkg> ...
//! lmi sw show repo <repo> ...
//! lmi sw install [--force] <pkg> ...
//! lmi sw install --uri <uri>
//! lmi sw remove <pkg> ...
//! lmi sw verify <pkg> ...
//! lmi sw update <pkg> ...
//! lmi sw enable <repo> ...
//! lmi sw disable <repo> ...
//! ```
//!
//! Packages are given as `<name>`, `<name>.<arch>` or
//! `<name>-<epoch>:<version>-<release>.<arch>`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, json};
use tracing::{debug, info};

use super::nevra::{PackageSpec, compare_evr, epoch, nevra};
use super::user::COMPUTER_SYSTEM;
use crate::cim::{Instance, Namespace, cim_date};
use crate::command::{
    ArgSpec, CommandContext, EndPoint, Multiplexer, Options, Outcome, Property, Row,
    register_subcommands,
};
use crate::error::{Error, Result};

pub const IDENTITY: &str = "LMI_SoftwareIdentity";
pub const REPOSITORY: &str = "LMI_SoftwareIdentityResource";
pub const INSTALLED: &str = "LMI_InstalledSoftwareIdentity";
pub const RESOURCE_FOR: &str = "LMI_ResourceForSoftwareIdentity";
pub const INSTALLATION_SERVICE: &str = "LMI_SoftwareInstallationService";
pub const CHECKS: &str = "LMI_SoftwareIdentityChecks";
pub const FILE_CHECK: &str = "LMI_SoftwareIdentityFileCheck";

// InstallOptions of the installation service.
const OPT_FORCE: u16 = 3;
const OPT_INSTALL: u16 = 4;
const OPT_UPDATE: u16 = 5;
const OPT_UNINSTALL: u16 = 9;

// EnabledState / RequestedState of repositories.
const STATE_ENABLED: u16 = 2;
const STATE_DISABLED: u16 = 3;

/* ---------------------------------------------------------------------- */
/* lookups                                                                */
/* ---------------------------------------------------------------------- */

fn installed(ns: &dyn Namespace) -> Result<Vec<Instance>> {
    let system = ns.singleton(COMPUTER_SYSTEM)?;
    ns.associators(&system.path, Some(INSTALLED), Some(IDENTITY))
}

fn is_enabled(repo: &Instance) -> bool {
    repo.u64("EnabledState") == Some(u64::from(STATE_ENABLED))
}

fn find_repo(ns: &dyn Namespace, name: &str) -> Result<Instance> {
    ns.first_instance(REPOSITORY, &[("Name", name)])?
        .ok_or_else(|| Error::failed(format!("No such repository \"{name}\"")))
}

/// Packages offered by `repo`, or by every enabled repository.
fn available(ns: &dyn Namespace, repo: Option<&str>) -> Result<Vec<Instance>> {
    let repos = match repo {
        Some(name) => vec![find_repo(ns, name)?],
        None => ns
            .instances(REPOSITORY)?
            .into_iter()
            .filter(is_enabled)
            .collect(),
    };
    let mut pkgs = Vec::new();
    for r in &repos {
        pkgs.extend(ns.associators(&r.path, Some(RESOURCE_FOR), Some(IDENTITY))?);
    }
    Ok(pkgs)
}

fn newest<'a>(pkgs: impl Iterator<Item = &'a Instance>) -> Option<&'a Instance> {
    pkgs.max_by(|a, b| compare_evr(a, b))
}

/// Keep only the newest identity per name and architecture.
fn collapse(pkgs: Vec<Instance>) -> Vec<Instance> {
    let mut newest: BTreeMap<(String, String), Instance> = BTreeMap::new();
    for p in pkgs {
        let key = (p.text("Name"), p.text("Architecture"));
        let replace = newest
            .get(&key)
            .is_none_or(|cur| compare_evr(&p, cur) == Ordering::Greater);
        if replace {
            newest.insert(key, p);
        }
    }
    newest.into_values().collect()
}

fn specs(opts: &Options) -> Result<Vec<PackageSpec>> {
    opts.list("pkg").iter().map(|p| PackageSpec::parse(p)).collect()
}

fn verify_specs(opts: &Options) -> Result<()> {
    specs(opts).map(|_| ())
}

fn find_installed<'a>(installed: &'a [Instance], spec: &PackageSpec) -> Result<&'a Instance> {
    installed
        .iter()
        .find(|p| spec.matches(p))
        .ok_or_else(|| Error::failed(format!("Package \"{spec}\" is not installed")))
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "Yes" } else { "No" };
    text.to_string()
}

fn file_type(code: Option<u64>) -> &'static str {
    match code {
        Some(1) => "file",
        Some(2) => "directory",
        Some(3) => "symlink",
        Some(4) => "fifo",
        Some(5) => "character device",
        Some(6) => "block device",
        _ => "unknown",
    }
}

fn failed_flag(code: &str) -> String {
    let name = match code {
        "0" => "existence",
        "1" => "size",
        "2" => "mode",
        "3" => "checksum",
        "4" => "device number",
        "5" => "file type",
        "6" => "owner",
        "7" => "group",
        "8" => "mtime",
        other => return format!("flag {other}"),
    };
    name.to_string()
}

/* ---------------------------------------------------------------------- */
/* list                                                                   */
/* ---------------------------------------------------------------------- */

fn list_pkgs(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Vec<Row>> {
    let installed = installed(ns)?;
    let mut pkgs = if opts.flag("_available") {
        let have: HashSet<String> = installed.iter().map(nevra).collect();
        let mut avail = available(ns, opts.value("_repo"))?;
        avail.retain(|p| !have.contains(&nevra(p)));
        avail
    } else if opts.flag("_all") {
        let mut all = installed;
        all.extend(available(ns, None)?);
        all
    } else {
        installed
    };
    if !opts.flag("_allow_duplicates") {
        pkgs = collapse(pkgs);
    }
    let rows: BTreeMap<String, String> = pkgs.iter().map(|p| (nevra(p), p.text("Caption"))).collect();
    Ok(rows.into_iter().map(|(n, summary)| vec![n, summary]).collect())
}

fn list_repos(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Vec<Row>> {
    let mut repos = ns.instances(REPOSITORY)?;
    repos.retain(|r| {
        if opts.flag("_all") {
            true
        } else {
            is_enabled(r) != opts.flag("_disabled")
        }
    });
    repos.sort_by_key(|r| r.text("Name"));
    Ok(repos
        .iter()
        .map(|r| vec![r.text("Name"), r.text("Caption"), yes_no(is_enabled(r))])
        .collect())
}

fn list_files(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Vec<Row>> {
    let installed = installed(ns)?;
    let mut rows = Vec::new();
    for spec in specs(opts)? {
        let pkg = find_installed(&installed, &spec)?;
        for check in ns.associators(&pkg.path, Some(CHECKS), Some(FILE_CHECK))? {
            rows.push(vec![check.text("Name"), file_type(check.u64("FileType")).to_string()]);
        }
    }
    rows.sort();
    Ok(rows)
}

/* ---------------------------------------------------------------------- */
/* show                                                                   */
/* ---------------------------------------------------------------------- */

fn show_pkgs(ns: &dyn Namespace, opts: &Options) -> Result<Vec<Instance>> {
    let repo = opts.value("_repo");
    let installed = if repo.is_some() { Vec::new() } else { installed(ns)? };
    let avail = available(ns, repo)?;
    specs(opts)?
        .iter()
        .map(|spec| {
            installed
                .iter()
                .find(|p| spec.matches(p))
                .or_else(|| newest(avail.iter().filter(|p| spec.matches(p))))
                .cloned()
                .ok_or_else(|| Error::failed(format!("No such package \"{spec}\"")))
        })
        .collect()
}

fn show_repos(ns: &dyn Namespace, opts: &Options) -> Result<Vec<Instance>> {
    opts.list("repo").iter().map(|r| find_repo(ns, r)).collect()
}

/* ---------------------------------------------------------------------- */
/* install / remove / update                                              */
/* ---------------------------------------------------------------------- */

fn install_identity(
    ns: &dyn Namespace,
    pkg: &Instance,
    options: &[u16],
) -> Result<()> {
    let system = ns.singleton(COMPUTER_SYSTEM)?;
    let service = ns.singleton(INSTALLATION_SERVICE)?;
    let mut params = Map::new();
    params.insert("Source".into(), pkg.path.to_value());
    params.insert("Target".into(), system.path.to_value());
    params.insert("InstallOptions".into(), json!(options));
    debug!(package = %nevra(pkg), ?options, "InstallFromSoftwareIdentity");
    ns.call(&service.path, "InstallFromSoftwareIdentity", params)?;
    Ok(())
}

fn install(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let force = opts.flag("_force");
    let mut options = vec![OPT_INSTALL];
    if force {
        options.insert(0, OPT_FORCE);
    }

    if let Some(uri) = opts.value("_uri") {
        let system = ns.singleton(COMPUTER_SYSTEM)?;
        let service = ns.singleton(INSTALLATION_SERVICE)?;
        let mut params = Map::new();
        params.insert("URI".into(), json!(uri));
        params.insert("Target".into(), system.path.to_value());
        params.insert("InstallOptions".into(), json!(options));
        ns.call(&service.path, "InstallFromURI", params)?;
        info!(uri, "installed from uri");
        return Ok(Outcome::done());
    }

    let installed = installed(ns)?;
    let avail = available(ns, None)?;
    let mut outcome = Outcome::done();
    let mut todo = Vec::new();
    for spec in specs(opts)? {
        let have = installed.iter().find(|p| spec.matches(p));
        if let Some(have) = have
            && !force
        {
            info!(package = %nevra(have), "already installed, skipping");
            outcome = outcome.note(format!(
                "Package \"{}\" is already installed, skipping.",
                nevra(have)
            ));
            continue;
        }
        let pick = newest(avail.iter().filter(|p| spec.matches(p)))
            .or(have)
            .ok_or_else(|| Error::failed(format!("No available package matches \"{spec}\"")))?;
        todo.push(pick);
    }
    for pkg in todo {
        install_identity(ns, pkg, &options)?;
        info!(package = %nevra(pkg), "installed");
    }
    Ok(outcome)
}

fn remove(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let installed = installed(ns)?;
    let todo = specs(opts)?
        .iter()
        .map(|spec| find_installed(&installed, spec))
        .collect::<Result<Vec<_>>>()?;
    for pkg in todo {
        install_identity(ns, pkg, &[OPT_UNINSTALL])?;
        info!(package = %nevra(pkg), "removed");
    }
    Ok(Outcome::done())
}

fn update(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let installed = installed(ns)?;
    let avail = available(ns, None)?;
    let mut outcome = Outcome::done();
    let mut todo = Vec::new();
    for spec in specs(opts)? {
        let have = find_installed(&installed, &spec)?;
        let candidate = newest(avail.iter().filter(|p| {
            p.text("Name") == have.text("Name")
                && p.text("Architecture") == have.text("Architecture")
                && compare_evr(p, have) == Ordering::Greater
        }));
        match candidate {
            Some(pkg) => todo.push(pkg),
            None => {
                info!(package = %nevra(have), "already up to date");
                outcome = outcome.note(format!(
                    "Package \"{}\" is already up to date.",
                    nevra(have)
                ));
            }
        }
    }
    for pkg in todo {
        install_identity(ns, pkg, &[OPT_UPDATE])?;
        info!(package = %nevra(pkg), "updated");
    }
    Ok(outcome)
}

fn verify(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Vec<Row>> {
    let installed = installed(ns)?;
    let mut rows = Vec::new();
    for spec in specs(opts)? {
        let pkg = find_installed(&installed, &spec)?;
        for check in ns.associators(&pkg.path, Some(CHECKS), Some(FILE_CHECK))? {
            let failed = check.strings("FailedFlags");
            if failed.is_empty() {
                continue;
            }
            let flags: Vec<String> = failed.iter().map(|f| failed_flag(f)).collect();
            rows.push(vec![nevra(pkg), check.text("Name"), flags.join(", ")]);
        }
    }
    Ok(rows)
}

/* ---------------------------------------------------------------------- */
/* repositories                                                           */
/* ---------------------------------------------------------------------- */

fn change_repo_state(ns: &dyn Namespace, opts: &Options, state: u16) -> Result<Outcome> {
    let repos = opts
        .list("repo")
        .iter()
        .map(|r| find_repo(ns, r))
        .collect::<Result<Vec<_>>>()?;
    for repo in repos {
        let mut params = Map::new();
        params.insert("RequestedState".into(), json!(state));
        ns.call(&repo.path, "RequestStateChange", params)?;
        info!(repo = %repo.text("Name"), state, "repository state changed");
    }
    Ok(Outcome::done())
}

fn enable(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    change_repo_state(ns, opts, STATE_ENABLED)
}

fn disable(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    change_repo_state(ns, opts, STATE_DISABLED)
}

/* ---------------------------------------------------------------------- */
/* registration                                                           */
/* ---------------------------------------------------------------------- */

fn pkgs_arg() -> ArgSpec {
    ArgSpec::positional("<pkg>").many().required()
}

fn repos_arg() -> ArgSpec {
    ArgSpec::positional("<repo>").many().required()
}

fn list_commands() -> Multiplexer {
    register_subcommands(
        "list",
        "List various information about packages, repositories or files.",
        vec![
            (
                "pkgs",
                EndPoint::lister("List packages.", &["NEVRA", "Summary"], list_pkgs)
                    .arg(ArgSpec::flag("--available").conflicts_with("--all").help("List packages available in repositories and not installed."))
                    .arg(ArgSpec::flag("--all").help("List installed and available packages."))
                    .arg(ArgSpec::value("--repo", "repo").requires("--available").help("Only packages of this repository."))
                    .arg(ArgSpec::flag("--allow-duplicates").help("Show every version of a package."))
                    .into(),
            ),
            (
                "repos",
                EndPoint::lister("List repositories.", &["Repo id", "Name", "Enabled"], list_repos)
                    .arg(ArgSpec::flag("--disabled").conflicts_with("--all").help("List only disabled repositories."))
                    .arg(ArgSpec::flag("--all").help("List all repositories."))
                    .into(),
            ),
            (
                "files",
                EndPoint::lister("List files of an installed package.", &["File", "Type"], list_files)
                    .arg(ArgSpec::positional("<pkg>").required())
                    .verify(verify_specs)
                    .into(),
            ),
        ],
    )
}

fn show_commands() -> Multiplexer {
    register_subcommands(
        "show",
        "Show detailed information about a package or repository.",
        vec![
            (
                "pkg",
                EndPoint::instance_lister(
                    "Show packages.",
                    vec![
                        Property::Computed("NEVRA", nevra),
                        Property::Name("Name"),
                        Property::Renamed("Arch", "Architecture"),
                        Property::Computed("Epoch", epoch),
                        Property::Name("Version"),
                        Property::Name("Release"),
                        Property::Renamed("Summary", "Caption"),
                        Property::Computed("Install date", |p| {
                            p.string("InstallDate")
                                .and_then(|d| cim_date(&d))
                                .unwrap_or_default()
                        }),
                        Property::Name("Description"),
                    ],
                    show_pkgs,
                )
                .arg(ArgSpec::value("--repo", "repo").help("Search the package in this repository."))
                .arg(pkgs_arg())
                .verify(verify_specs)
                .into(),
            ),
            (
                "repo",
                EndPoint::instance_lister(
                    "Show repositories.",
                    vec![
                        Property::Renamed("Repo id", "Name"),
                        Property::Renamed("Name", "Caption"),
                        Property::Computed("Enabled", |r| yes_no(is_enabled(r))),
                        Property::Renamed("Base URL", "AccessInfo"),
                    ],
                    show_repos,
                )
                .arg(repos_arg())
                .into(),
            ),
        ],
    )
}

pub fn commands() -> Multiplexer {
    register_subcommands(
        "sw",
        "System software management.",
        vec![
            ("list", list_commands().into()),
            ("show", show_commands().into()),
            (
                "install",
                EndPoint::check_result("Install packages or a package file from a URI.", None, install)
                    .arg(ArgSpec::flag("--force").help("Force installation."))
                    .arg(
                        ArgSpec::value("--uri", "uri")
                            .conflicts_with("<pkg>")
                            .help("Install an rpm package available through http or ftp."),
                    )
                    .arg(ArgSpec::positional("<pkg>").many().required_unless("--uri"))
                    .verify(verify_specs)
                    .into(),
            ),
            (
                "remove",
                EndPoint::check_result("Remove installed packages.", None, remove)
                    .arg(pkgs_arg())
                    .verify(verify_specs)
                    .into(),
            ),
            (
                "verify",
                EndPoint::lister("Verify installed packages.", &["Package", "File", "Failed"], verify)
                    .arg(pkgs_arg())
                    .verify(verify_specs)
                    .into(),
            ),
            (
                "update",
                EndPoint::check_result("Update installed packages.", None, update)
                    .arg(pkgs_arg())
                    .verify(verify_specs)
                    .into(),
            ),
            (
                "enable",
                EndPoint::check_result("Enable repositories.", None, enable)
                    .arg(repos_arg())
                    .into(),
            ),
            (
                "disable",
                EndPoint::check_result("Disable repositories.", None, disable)
                    .arg(repos_arg())
                    .into(),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cim::ObjectPath;
    use crate::cim::memory::{MemoryNamespace, path};

    fn identity(ns: &MemoryNamespace, name: &str, evr: (u32, &str, &str), arch: &str) -> ObjectPath {
        let (epoch, version, release) = evr;
        let id = format!("LMI:LMI_SoftwareIdentity:{name}-{epoch}:{version}-{release}.{arch}");
        let p = path(IDENTITY, "InstanceID", id);
        ns.add(
            Instance::new(p.clone())
                .with("Name", name)
                .with("Epoch", epoch)
                .with("Version", version)
                .with("Release", release)
                .with("Architecture", arch)
                .with("Caption", format!("{name} summary")),
        );
        p
    }

    fn repo(ns: &MemoryNamespace, name: &str, enabled: bool) -> ObjectPath {
        let p = path(REPOSITORY, "Name", name);
        ns.add(
            Instance::new(p.clone())
                .with("Name", name)
                .with("Caption", format!("{name} repo"))
                .with("EnabledState", if enabled { STATE_ENABLED } else { STATE_DISABLED }),
        );
        p
    }

    fn file(ns: &MemoryNamespace, pkg: &ObjectPath, name: &str, failed: &[u16]) {
        let p = path(FILE_CHECK, "Name", name);
        ns.add(
            Instance::new(p.clone())
                .with("Name", name)
                .with("FileType", 1)
                .with("FailedFlags", json!(failed)),
        );
        ns.link(CHECKS, ("Element", pkg), ("Check", &p));
    }

    /// bash 4.2.45 installed, 4.2.46 in fedora; vim only in updates (disabled).
    fn host() -> MemoryNamespace {
        let ns = MemoryNamespace::new();
        let system = path(COMPUTER_SYSTEM, "Name", "db1");
        ns.add(Instance::new(system.clone()));
        ns.add(Instance::new(path(INSTALLATION_SERVICE, "Name", "sw")));

        let bash_old = identity(&ns, "bash", (0, "4.2.45", "1.fc19"), "x86_64");
        let bash_new = identity(&ns, "bash", (0, "4.2.46", "1.fc19"), "x86_64");
        let zsh = identity(&ns, "zsh", (0, "5.0.2", "5.fc19"), "x86_64");
        let vim = identity(&ns, "vim", (2, "7.4", "1.fc19"), "x86_64");
        ns.link(INSTALLED, ("System", &system), ("InstalledSoftware", &bash_old));

        let fedora = repo(&ns, "fedora", true);
        let updates = repo(&ns, "updates-testing", false);
        ns.link(RESOURCE_FOR, ("AvailableSAP", &fedora), ("ManagedElement", &bash_old));
        ns.link(RESOURCE_FOR, ("AvailableSAP", &fedora), ("ManagedElement", &bash_new));
        ns.link(RESOURCE_FOR, ("AvailableSAP", &fedora), ("ManagedElement", &zsh));
        ns.link(RESOURCE_FOR, ("AvailableSAP", &updates), ("ManagedElement", &vim));

        file(&ns, &bash_old, "/usr/bin/bash", &[]);
        file(&ns, &bash_old, "/etc/skel/.bashrc", &[2, 3]);
        ns
    }

    fn run(ns: &MemoryNamespace, argv: &[&str]) -> Result<crate::command::Output> {
        let tree = commands();
        let m = tree
            .to_clap()
            .try_get_matches_from(argv)
            .map_err(|e| Error::invalid(e.to_string()))?;
        let r = tree.resolve(&m)?;
        let opts = r.endpoint.prepare(r.matches)?;
        r.endpoint.run(ns, &opts, &CommandContext::default())
    }

    fn first_column(out: &crate::command::Output) -> Vec<String> {
        out.tables[0].row_data().iter().map(|r| r[0].clone()).collect()
    }

    #[test]
    fn list_installed_by_default() {
        let out = run(&host(), &["sw", "list", "pkgs"]).unwrap();
        assert_eq!(first_column(&out), vec!["bash-0:4.2.45-1.fc19.x86_64"]);
        assert_eq!(out.tables[0].row_data()[0][1], "bash summary");
    }

    #[test]
    fn list_available_excludes_installed_and_collapses() {
        let ns = host();
        let out = run(&ns, &["sw", "list", "pkgs", "--available"]).unwrap();
        assert_eq!(
            first_column(&out),
            vec!["bash-0:4.2.46-1.fc19.x86_64", "zsh-0:5.0.2-5.fc19.x86_64"]
        );

        let out = run(&ns, &["sw", "list", "pkgs", "--all", "--allow-duplicates"]).unwrap();
        assert_eq!(out.tables[0].row_count(), 3);
        let out = run(&ns, &["sw", "list", "pkgs", "--all"]).unwrap();
        assert_eq!(out.tables[0].row_count(), 2);
    }

    #[test]
    fn list_available_from_named_repo() {
        let out = run(&host(), &["sw", "list", "pkgs", "--available", "--repo", "updates-testing"]).unwrap();
        assert_eq!(first_column(&out), vec!["vim-2:7.4-1.fc19.x86_64"]);
    }

    #[test]
    fn list_pkgs_option_conflicts_are_usage_errors() {
        for argv in [
            &["sw", "list", "pkgs", "--available", "--all"][..],
            &["sw", "list", "pkgs", "--repo", "fedora"][..],
        ] {
            assert_eq!(run(&host(), argv).unwrap_err().exit_code(), crate::error::EXIT_USAGE);
        }
    }

    #[test]
    fn list_repos_filters_on_state() {
        let ns = host();
        let out = run(&ns, &["sw", "list", "repos"]).unwrap();
        assert_eq!(out.tables[0].row_data(), &[vec!["fedora", "fedora repo", "Yes"]]);
        let out = run(&ns, &["sw", "list", "repos", "--disabled"]).unwrap();
        assert_eq!(first_column(&out), vec!["updates-testing"]);
        let out = run(&ns, &["sw", "list", "repos", "--all"]).unwrap();
        assert_eq!(out.tables[0].row_count(), 2);
    }

    #[test]
    fn list_files_of_installed_package() {
        let out = run(&host(), &["sw", "list", "files", "bash"]).unwrap();
        assert_eq!(
            out.tables[0].row_data(),
            &[vec!["/etc/skel/.bashrc", "file"], vec!["/usr/bin/bash", "file"]]
        );
        let err = run(&host(), &["sw", "list", "files", "zsh"]).unwrap_err();
        assert_eq!(err.to_string(), "Package \"zsh\" is not installed");
    }

    #[test]
    fn show_prefers_installed_then_newest_available() {
        let ns = host();
        let out = run(&ns, &["sw", "show", "pkg", "bash", "zsh.x86_64"]).unwrap();
        assert_eq!(out.tables.len(), 2);
        assert_eq!(out.tables[0].row_data()[0][1], "bash-0:4.2.45-1.fc19.x86_64");
        assert_eq!(out.tables[1].title_text(), Some("zsh"));

        let out = run(&ns, &["sw", "show", "pkg", "--repo", "updates-testing", "vim"]).unwrap();
        assert_eq!(out.tables[0].row_data()[3], vec!["Epoch", "2"]);

        let err = run(&ns, &["sw", "show", "pkg", "emacs"]).unwrap_err();
        assert_eq!(err.to_string(), "No such package \"emacs\"");
    }

    #[test]
    fn show_repo_reports_state() {
        let out = run(&host(), &["sw", "show", "repo", "updates-testing"]).unwrap();
        assert_eq!(out.tables[0].title_text(), Some("updates-testing"));
        assert_eq!(out.tables[0].row_data()[2], vec!["Enabled", "No"]);
    }

    #[test]
    fn install_skips_installed_without_force() {
        let ns = host();
        let out = run(&ns, &["sw", "install", "bash", "zsh"]).unwrap();
        assert_eq!(
            out.notes,
            vec!["Package \"bash-0:4.2.45-1.fc19.x86_64\" is already installed, skipping."]
        );
        let calls = ns.calls_of("InstallFromSoftwareIdentity");
        assert_eq!(calls.len(), 1);
        let source = ObjectPath::from_value(&calls[0].params["Source"]).unwrap();
        assert_eq!(
            source.key("InstanceID").as_deref(),
            Some("LMI:LMI_SoftwareIdentity:zsh-0:5.0.2-5.fc19.x86_64")
        );
        assert_eq!(calls[0].params["InstallOptions"], json!([4]));
    }

    #[test]
    fn forced_install_reinstalls() {
        let ns = host();
        run(&ns, &["sw", "install", "--force", "bash"]).unwrap();
        let calls = ns.calls_of("InstallFromSoftwareIdentity");
        assert_eq!(calls[0].params["InstallOptions"], json!([3, 4]));
    }

    #[test]
    fn install_unknown_package_installs_nothing() {
        let ns = host();
        let err = run(&ns, &["sw", "install", "zsh", "emacs"]).unwrap_err();
        assert_eq!(err.to_string(), "No available package matches \"emacs\"");
        assert!(ns.calls().is_empty());
    }

    #[test]
    fn install_from_uri() {
        let ns = host();
        run(&ns, &["sw", "install", "--uri", "http://mirror/pkg.rpm"]).unwrap();
        let calls = ns.calls_of("InstallFromURI");
        assert_eq!(calls[0].params["URI"], json!("http://mirror/pkg.rpm"));
        assert_eq!(calls[0].params["InstallOptions"], json!([4]));
    }

    #[test]
    fn install_grammar() {
        let ns = host();
        assert!(run(&ns, &["sw", "install"]).is_err());
        assert!(run(&ns, &["sw", "install", "--uri", "http://x/p.rpm", "bash"]).is_err());
        let err = run(&ns, &["sw", "install", "foo-x:1-2.noarch"]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
    }

    #[test]
    fn remove_uses_uninstall_option() {
        let ns = host();
        run(&ns, &["sw", "remove", "bash"]).unwrap();
        let calls = ns.calls_of("InstallFromSoftwareIdentity");
        assert_eq!(calls[0].params["InstallOptions"], json!([9]));
        assert!(run(&ns, &["sw", "remove", "zsh"]).is_err());
    }

    #[test]
    fn update_picks_newer_version() {
        let ns = host();
        let out = run(&ns, &["sw", "update", "bash"]).unwrap();
        assert!(out.notes.is_empty());
        let calls = ns.calls_of("InstallFromSoftwareIdentity");
        assert_eq!(calls[0].params["InstallOptions"], json!([5]));
        let source = ObjectPath::from_value(&calls[0].params["Source"]).unwrap();
        assert!(source.key("InstanceID").unwrap().contains("4.2.46"));
    }

    #[test]
    fn update_reports_up_to_date() {
        let ns = host();
        let mut props = Map::new();
        props.insert("EnabledState".into(), json!(STATE_DISABLED));
        ns.modify_instance(&path(REPOSITORY, "Name", "fedora"), props)
            .unwrap();
        let out = run(&ns, &["sw", "update", "bash"]).unwrap();
        assert_eq!(
            out.notes,
            vec!["Package \"bash-0:4.2.45-1.fc19.x86_64\" is already up to date."]
        );
        assert!(ns.calls().is_empty());
    }

    #[test]
    fn disable_requests_state_three() {
        let ns = host();
        run(&ns, &["sw", "disable", "fedora"]).unwrap();
        assert_eq!(
            ns.calls_of("RequestStateChange")[0].params["RequestedState"],
            json!(3)
        );
    }

    #[test]
    fn verify_lists_failed_checks_only() {
        let out = run(&host(), &["sw", "verify", "bash"]).unwrap();
        assert_eq!(
            out.tables[0].row_data(),
            &[vec!["bash-0:4.2.45-1.fc19.x86_64", "/etc/skel/.bashrc", "mode, checksum"]]
        );
    }

    #[test]
    fn enable_resolves_all_repos_first() {
        let ns = host();
        let err = run(&ns, &["sw", "enable", "updates-testing", "nope"]).unwrap_err();
        assert_eq!(err.to_string(), "No such repository \"nope\"");
        assert!(ns.calls().is_empty());

        run(&ns, &["sw", "enable", "updates-testing"]).unwrap();
        let calls = ns.calls_of("RequestStateChange");
        assert_eq!(calls[0].params["RequestedState"], json!(2));
        assert_eq!(calls[0].path.key("Name").as_deref(), Some("updates-testing"));
    }
}
