//! Partition management.
//!
//! ```text
//! lmi partition list [<device> ...]
//! lmi partition create [--logical | --extended] <device> [<size>]
//! lmi partition delete <partition> ...
//! lmi partition show [<partition> ...]
//! ```
//!
//! Without a size, `create` takes the largest free region. On MS-DOS tables
//! the partition type is chosen automatically unless given: logical when an
//! extended partition exists, primary while at most two primaries exist,
//! otherwise an extended partition over the rest of the disk and a logical
//! one inside it.

use serde_json::json;

use super::storage::{
    PartitionType, create_partition, delete_partition, extent_size, get_partitions, str2device,
    type_label,
};
use crate::cim::Namespace;
use crate::command::{
    ArgSpec, CommandContext, EndPoint, Multiplexer, Options, Outcome, Row, register_subcommands,
};
use crate::error::Result;
use crate::format::{Table, size2str, str2size};

fn list(ns: &dyn Namespace, opts: &Options, ctx: &CommandContext) -> Result<Vec<Row>> {
    Ok(get_partitions(ns, &opts.list("devices"))?
        .iter()
        .map(|part| {
            vec![
                part.text("DeviceID"),
                part.text("Name"),
                part.text("ElementName"),
                type_label(part).to_string(),
                size2str(extent_size(part), ctx.human_friendly),
            ]
        })
        .collect())
}

fn verify_size(opts: &Options) -> Result<()> {
    match opts.value("size") {
        Some(raw) => str2size(raw).map(|_| ()),
        None => Ok(()),
    }
}

fn create(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let device = str2device(ns, opts.required("device")?)?;
    let size = opts.value("size").map(str2size).transpose()?;
    let ptype = if opts.flag("_extended") {
        Some(PartitionType::Extended)
    } else if opts.flag("_logical") {
        Some(PartitionType::Logical)
    } else {
        None
    };
    let part = create_partition(ns, &device, size, ptype)?;
    Ok(Outcome::done().note(format!(
        "Partition {}, with DeviceID {} created.",
        part.text("Name"),
        part.text("DeviceID")
    )))
}

fn delete(ns: &dyn Namespace, opts: &Options, _: &CommandContext) -> Result<Outcome> {
    let parts = opts
        .list("partitions")
        .iter()
        .map(|p| str2device(ns, p))
        .collect::<Result<Vec<_>>>()?;
    for part in &parts {
        delete_partition(ns, part)?;
    }
    Ok(Outcome::with_result(0))
}

fn show(ns: &dyn Namespace, opts: &Options, ctx: &CommandContext) -> Result<Vec<Table>> {
    let names = opts.list("partitions");
    let parts = if names.is_empty() {
        get_partitions(ns, &[])?
    } else {
        names
            .iter()
            .map(|p| str2device(ns, p))
            .collect::<Result<Vec<_>>>()?
    };
    Ok(parts
        .iter()
        .map(|part| {
            let row = |label: &str, value: String| vec![label.to_string(), value];
            Table::new(&["Name", "Value"]).title(part.text("DeviceID")).rows(vec![
                row("Name", part.text("Name")),
                row("ElementName", part.text("ElementName")),
                row("Partition Type", type_label(part).to_string()),
                row("Number of blocks", part.text("NumberOfBlocks")),
                row("Block size", part.text("BlockSize")),
                row("Size", size2str(extent_size(part), ctx.human_friendly)),
            ])
        })
        .collect())
}

fn rename_devices(opts: &mut Options) {
    opts.rename("device", "devices");
}

fn rename_partitions(opts: &mut Options) {
    opts.rename("partition", "partitions");
}

pub fn commands() -> Multiplexer {
    register_subcommands(
        "partition",
        "Partition management.",
        vec![
            (
                "list",
                EndPoint::lister(
                    "List partitions on given devices. If no devices are given, all partitions are listed.",
                    &["DeviceID", "Name", "ElementName", "Type", "Size"],
                    list,
                )
                .arg(ArgSpec::positional("<device>").many())
                .transform(rename_devices)
                .into(),
            ),
            (
                "create",
                EndPoint::check_result("Create a partition on given device.", None, create)
                    .arg(ArgSpec::flag("--logical").conflicts_with("--extended").help("Request a logical partition."))
                    .arg(ArgSpec::flag("--extended").help("Request an extended partition."))
                    .arg(ArgSpec::positional("<device>").required())
                    .arg(ArgSpec::positional("<size>").help("Size with optional K, M, G or T suffix."))
                    .verify(verify_size)
                    .into(),
            ),
            (
                "delete",
                EndPoint::check_result("Delete given partitions.", Some(json!(0)), delete)
                    .arg(ArgSpec::positional("<partition>").many().required())
                    .transform(rename_partitions)
                    .into(),
            ),
            (
                "show",
                EndPoint::multi_lister(
                    "Show detailed information about partitions. If no partitions are given, all of them are displayed.",
                    show,
                )
                .arg(ArgSpec::positional("<partition>").many())
                .transform(rename_partitions)
                .into(),
            ),
        ],
    )
}
