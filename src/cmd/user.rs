//! POSIX user information and management.
//!
//! ```text
//! lmi user list
//! lmi user show [<user> ...]
//! lmi user create <name> [options]
//! lmi user delete [--nodeletehome --nodeletegroup --force] <user> ...
//! ```

use serde_json::{Map, Value, json};
use tracing::info;

use crate::cim::{Instance, Namespace, cim_date};
use crate::command::{
    ArgSpec, CommandContext, EndPoint, Multiplexer, Options, Outcome, Property, Row,
    register_subcommands,
};
use crate::error::{Error, Result};

pub const ACCOUNT: &str = "LMI_Account";
pub const COMPUTER_SYSTEM: &str = "Linux_ComputerSystem";
pub const ACCOUNT_SERVICE: &str = "LMI_AccountManagementService";

/// Look up an account by login name.
pub fn find_user(ns: &dyn Namespace, name: &str) -> Result<Instance> {
    ns.first_instance(ACCOUNT, &[("Name", name)])?
        .ok_or_else(|| Error::failed(format!("No such user \"{name}\"")))
}

fn list(ns: &dyn Namespace, _: &Options, _: &CommandContext) -> Result<Vec<Row>> {
    let mut users = ns.instances(ACCOUNT)?;
    users.sort_by_key(|u| u.text("Name"));
    Ok(users
        .iter()
        .map(|u| vec![u.text("Name"), u.text("UserID"), u.text("ElementName")])
        .collect())
}

fn show(ns: &dyn Namespace, opts: &Options) -> Result<Vec<Instance>> {
    let users = opts.list("users");
    if users.is_empty() {
        return ns.instances(ACCOUNT);
    }
    users.iter().map(|u| find_user(ns, u)).collect()
}

fn password_last_change(inst: &Instance) -> String {
    inst.string("PasswordLastChange")
        .and_then(|raw| cim_date(&raw))
        .unwrap_or_default()
}

fn delete(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    // Resolve everything first so a typo deletes nobody.
    let accounts = opts
        .list("users")
        .iter()
        .map(|u| find_user(ns, u))
        .collect::<Result<Vec<_>>>()?;

    let mut params = Map::new();
    params.insert(
        "DontDeleteHomeDirectory".into(),
        json!(opts.flag("_nodeletehome")),
    );
    params.insert("DontDeleteGroup".into(), json!(opts.flag("_nodeletegroup")));
    params.insert("Force".into(), json!(opts.flag("_force")));

    for account in &accounts {
        ns.call(&account.path, "DeleteUser", params.clone())?;
        info!(user = %account.text("Name"), "user deleted");
    }
    Ok(Outcome::done())
}

fn verify_create(opts: &Options) -> Result<()> {
    if opts.value("_password").is_some() && opts.value("_plainpassword").is_some() {
        return Err(Error::invalid("Must set only one of password options"));
    }
    opts.number("_uid", "User ID")?;
    opts.number("_gid", "Group ID")?;
    Ok(())
}

/// Parameters for `CreateAccount`; unset values are left out, switches are always sent.
pub fn create_params(opts: &Options, system: Value) -> Result<Map<String, Value>> {
    let name = opts.required("name")?;
    let (password, plain) = match (opts.value("_password"), opts.value("_plainpassword")) {
        (Some(hash), _) => (Some(hash), false),
        (None, Some(plain)) => (Some(plain), true),
        (None, None) => (None, false),
    };

    let mut params = Map::new();
    params.insert("Name".into(), json!(name));
    params.insert("System".into(), system);
    let optional = [
        ("GECOS", opts.value("_gecos").map(|v| json!(v))),
        ("HomeDirectory", opts.value("_directory").map(|v| json!(v))),
        ("Shell", opts.value("_shell").map(|v| json!(v))),
        ("UID", opts.number("_uid", "User ID")?.map(|v| json!(v))),
        ("GID", opts.number("_gid", "Group ID")?.map(|v| json!(v))),
        ("Password", password.map(|v| json!(v))),
    ];
    for (key, value) in optional {
        if let Some(v) = value {
            params.insert(key.into(), v);
        }
    }
    let switches = [
        ("DontCreateHome", opts.flag("_nocreatehome") || opts.flag("_reserved")),
        ("SystemAccount", opts.flag("_reserved")),
        ("DontCreateGroup", opts.flag("_nocreategroup")),
        ("PasswordIsPlain", plain),
    ];
    for (key, set) in switches {
        params.insert(key.into(), json!(set));
    }
    Ok(params)
}

fn create(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let system = ns.singleton(COMPUTER_SYSTEM)?;
    let service = ns.singleton(ACCOUNT_SERVICE)?;
    let params = create_params(opts, system.path.to_value())?;
    ns.call(&service.path, "CreateAccount", params)?;
    info!(user = %opts.required("name")?, "user created");
    Ok(Outcome::done())
}

fn rename_users(opts: &mut Options) {
    opts.rename("user", "users");
}

pub fn commands() -> Multiplexer {
    register_subcommands(
        "user",
        "POSIX user information and management.",
        vec![
            (
                "list",
                EndPoint::lister("Prints a list of users.", &["Name", "UID", "Full name"], list)
                    .into(),
            ),
            (
                "show",
                EndPoint::instance_lister(
                    "Show detailed information about users. If no users are given, all of them are displayed.",
                    vec![
                        Property::Name("Name"),
                        Property::Renamed("UID", "UserID"),
                        Property::Renamed("Home", "HomeDirectory"),
                        Property::Renamed("Login shell", "LoginShell"),
                        Property::Computed("Password last change", password_last_change),
                    ],
                    show,
                )
                .arg(ArgSpec::positional("<user>").many())
                .transform(rename_users)
                .into(),
            ),
            (
                "create",
                EndPoint::check_result("Creates a new user.", None, create)
                    .arg(ArgSpec::positional("<name>").required())
                    .arg(ArgSpec::value("--gecos", "gecos").short('c').help("Set the GECOS field to gecos."))
                    .arg(ArgSpec::value("--directory", "dir").short('d').help("Set the user's home directory to dir."))
                    .arg(ArgSpec::value("--shell", "shell").short('s').help("Set user's login shell to shell."))
                    .arg(ArgSpec::value("--uid", "uid").short('u').help("Use user ID uid for the newly created user."))
                    .arg(ArgSpec::value("--gid", "gid").short('g').help("Set user's primary group ID to gid."))
                    .arg(ArgSpec::flag("--reserved").short('r').help("The user is a system user. Implies the -M option."))
                    .arg(ArgSpec::flag("--nocreatehome").short('M').help("Don't create a home directory."))
                    .arg(ArgSpec::flag("--nocreategroup").short('n').help("Don't create a primary group for user."))
                    .arg(ArgSpec::value("--plainpassword", "password").short('P').help("Set user's password to password."))
                    .arg(ArgSpec::value("--password", "encrypted").short('p').help("Set user's password to the password represented by the hash encrypted."))
                    .verify(verify_create)
                    .into(),
            ),
            (
                "delete",
                EndPoint::check_result("Delete specified users.", None, delete)
                    .arg(ArgSpec::flag("--nodeletehome").help("Do not remove home directory."))
                    .arg(ArgSpec::flag("--nodeletegroup").help("Do not remove user's primary group."))
                    .arg(ArgSpec::flag("--force").help("Remove home directory even if the user is not owner."))
                    .arg(ArgSpec::positional("<user>").many().required())
                    .transform(rename_users)
                    .into(),
            ),
        ],
    )
}
