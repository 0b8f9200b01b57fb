//! POSIX group information and management.
//!
//! ```text
//! lmi group show [<group> ...]
//! lmi group listusers [<group> ...]
//! lmi group create [--reserved --gid=gid] <group>
//! lmi group delete <group>
//! lmi group add <group> <user> ...
//! lmi group remove <group> <user> ...
//! ```

use serde_json::{Map, json};
use tracing::info;

use super::user::{ACCOUNT, ACCOUNT_SERVICE, COMPUTER_SYSTEM, find_user};
use crate::cim::{Instance, Namespace};
use crate::command::{
    ArgSpec, CommandContext, EndPoint, Multiplexer, Options, Outcome, Property, Row,
    register_subcommands,
};
use crate::error::{Error, Result};

pub const GROUP: &str = "LMI_Group";
pub const IDENTITY: &str = "LMI_Identity";
pub const MEMBER_OF_GROUP: &str = "LMI_MemberOfGroup";
pub const ASSIGNED_IDENTITY: &str = "LMI_AssignedAccountIdentity";

fn find_group(ns: &dyn Namespace, name: &str) -> Result<Instance> {
    ns.first_instance(GROUP, &[("Name", name)])?
        .ok_or_else(|| Error::failed(format!("No such group \"{name}\"")))
}

/// Numeric id at the end of an `LMI:GID:100`-style InstanceID.
fn id_suffix(instance_id: &str) -> &str {
    instance_id.rsplit(':').next().unwrap_or(instance_id)
}

fn gid(inst: &Instance) -> String {
    id_suffix(&inst.text("InstanceID")).to_string()
}

fn identity_of(ns: &dyn Namespace, user: &Instance) -> Result<Instance> {
    ns.first_associator(&user.path, Some(ASSIGNED_IDENTITY), Some(IDENTITY))?
        .ok_or_else(|| {
            Error::failed(format!(
                "User \"{}\" has no identity instance",
                user.text("Name")
            ))
        })
}

/// Login names of the members of `group`.
pub fn users_in_group(ns: &dyn Namespace, group: &Instance) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for identity in ns.associators(&group.path, Some(MEMBER_OF_GROUP), Some(IDENTITY))? {
        if let Some(account) =
            ns.first_associator(&identity.path, Some(ASSIGNED_IDENTITY), Some(ACCOUNT))?
        {
            names.push(account.text("Name"));
        }
    }
    Ok(names)
}

fn is_in_group(ns: &dyn Namespace, group: &Instance, user: &Instance) -> Result<bool> {
    let uid = user.text("UserID");
    Ok(ns
        .associators(&group.path, Some(MEMBER_OF_GROUP), Some(IDENTITY))?
        .iter()
        .any(|identity| id_suffix(&identity.text("InstanceID")) == uid))
}

fn show(ns: &dyn Namespace, opts: &Options) -> Result<Vec<Instance>> {
    let groups = opts.list("groups");
    if groups.is_empty() {
        return ns.instances(GROUP);
    }
    groups.iter().map(|g| find_group(ns, g)).collect()
}

fn list_users(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Vec<Row>> {
    let names = opts.list("groups");
    let groups = if names.is_empty() {
        ns.instances(GROUP)?
    } else {
        names
            .iter()
            .map(|g| find_group(ns, g))
            .collect::<Result<Vec<_>>>()?
    };
    groups
        .iter()
        .map(|g| Ok(vec![g.text("Name"), users_in_group(ns, g)?.join(", ")]))
        .collect()
}

fn verify_gid(opts: &Options) -> Result<()> {
    opts.number("_gid", "Group ID").map(|_| ())
}

fn create(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let name = opts.required("group")?;
    let system = ns.singleton(COMPUTER_SYSTEM)?;
    let service = ns.singleton(ACCOUNT_SERVICE)?;

    let mut params = Map::new();
    params.insert("Name".into(), json!(name));
    params.insert("System".into(), system.path.to_value());
    if opts.flag("_reserved") {
        params.insert("SystemAccount".into(), json!(true));
    }
    if let Some(gid) = opts.number("_gid", "Group ID")? {
        params.insert("GID".into(), json!(gid));
    }
    ns.call(&service.path, "CreateGroup", params)?;
    info!(group = name, "group created");
    Ok(Outcome::done())
}

fn delete(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let group = find_group(ns, opts.required("group")?)?;
    ns.delete_instance(&group.path)?;
    Ok(Outcome::done())
}

/// Accounts named on the command line with their identities, all resolved
/// before anything is modified.
fn resolve_members(ns: &dyn Namespace, users: &[String]) -> Result<Vec<(Instance, Instance)>> {
    users
        .iter()
        .map(|user| -> Result<(Instance, Instance)> {
            let account = find_user(ns, user)?;
            let identity = identity_of(ns, &account)?;
            Ok((account, identity))
        })
        .collect()
}

fn add(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let group_name = opts.required("group")?;
    let group = find_group(ns, group_name)?;
    let members = resolve_members(ns, &opts.list("users"))?;
    let mut outcome = Outcome::done();

    for (account, identity) in &members {
        if is_in_group(ns, &group, account)? {
            let user = account.text("Name");
            info!(user = %user, group = group_name, "already a member, skipping");
            outcome = outcome.note(format!(
                "User \"{user}\" already is in group \"{group_name}\", skipping."
            ));
            continue;
        }
        let mut props = Map::new();
        props.insert("Member".into(), identity.path.to_value());
        props.insert("Collection".into(), group.path.to_value());
        ns.create_instance(MEMBER_OF_GROUP, props)?;
    }
    Ok(outcome)
}

fn remove(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let group_name = opts.required("group")?;
    find_group(ns, group_name)?;
    let members = resolve_members(ns, &opts.list("users"))?;

    for (_, identity) in &members {
        for membership in ns.references(&identity.path, Some(MEMBER_OF_GROUP))? {
            let collection = membership
                .reference("Collection")
                .and_then(|c| c.key("Name"));
            if collection.as_deref() == Some(group_name) {
                ns.delete_instance(&membership.path)?;
            }
        }
    }
    Ok(Outcome::done())
}

fn rename_groups(opts: &mut Options) {
    opts.rename("group", "groups");
}

fn rename_users(opts: &mut Options) {
    opts.rename("user", "users");
}

pub fn commands() -> Multiplexer {
    register_subcommands(
        "group",
        "POSIX group information and management.",
        vec![
            (
                "show",
                EndPoint::instance_lister(
                    "Show detailed information about groups. If no groups are given, all of them are displayed.",
                    vec![Property::Name("Name"), Property::Computed("GID", gid)],
                    show,
                )
                .arg(ArgSpec::positional("<group>").many())
                .transform(rename_groups)
                .into(),
            ),
            (
                "listusers",
                EndPoint::lister("List users in a group or in a list of groups.", &["Group", "Users"], list_users)
                    .arg(ArgSpec::positional("<group>").many())
                    .transform(rename_groups)
                    .into(),
            ),
            (
                "create",
                EndPoint::check_result("Creates a new group.", None, create)
                    .arg(ArgSpec::flag("--reserved").short('r').help("Create a system group."))
                    .arg(ArgSpec::value("--gid", "gid").short('g').help("GID for a new group."))
                    .arg(ArgSpec::positional("<group>").required())
                    .verify(verify_gid)
                    .into(),
            ),
            (
                "delete",
                EndPoint::check_result("Deletes a group.", None, delete)
                    .arg(ArgSpec::positional("<group>").required())
                    .into(),
            ),
            (
                "add",
                EndPoint::check_result("Adds a user or a list of users to the group.", None, add)
                    .arg(ArgSpec::positional("<group>").required())
                    .arg(ArgSpec::positional("<user>").many().required())
                    .transform(rename_users)
                    .into(),
            ),
            (
                "remove",
                EndPoint::check_result("Removes a user or a list of users from the group.", None, remove)
                    .arg(ArgSpec::positional("<group>").required())
                    .arg(ArgSpec::positional("<user>").many().required())
                    .transform(rename_users)
                    .into(),
            ),
        ],
    )
}
