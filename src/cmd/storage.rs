//! Block device and partition helpers shared by storage commands.

use serde_json::{Map, json};
use tracing::{debug, info};

use crate::cim::{Instance, Namespace};
use crate::error::{Error, Result};

pub const STORAGE_EXTENT: &str = "CIM_StorageExtent";
pub const PARTITION: &str = "CIM_GenericDiskPartition";
pub const BASED_ON: &str = "CIM_BasedOn";
pub const INSTALLED_PARTITION_TABLE: &str = "LMI_InstalledPartitionTable";
pub const PARTITION_CAPABILITIES: &str = "LMI_DiskPartitionConfigurationCapabilities";
pub const PARTITION_SERVICE: &str = "LMI_DiskPartitionConfigurationService";

/// `PartitionStyle` of a partition table.
const STYLE_MBR: u64 = 2;
const STYLE_GPT: u64 = 3;

/// Maximum number of primary partitions (extended included) on MS-DOS tables.
const MBR_PRIMARY_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    Primary = 1,
    Extended = 2,
    Logical = 3,
}

impl PartitionType {
    pub fn of(part: &Instance) -> Option<Self> {
        match part.u64("PartitionType")? {
            1 => Some(Self::Primary),
            2 => Some(Self::Extended),
            3 => Some(Self::Logical),
            _ => None,
        }
    }
}

/// Display label of a partition's type: empty when the property is absent.
pub fn type_label(part: &Instance) -> &'static str {
    if !part.has("PartitionType") {
        return "";
    }
    match PartitionType::of(part) {
        Some(PartitionType::Primary) => "primary",
        Some(PartitionType::Extended) => "extended",
        Some(PartitionType::Logical) => "logical",
        None => "unknown",
    }
}

/// Size in bytes: `NumberOfBlocks * BlockSize`.
pub fn extent_size(extent: &Instance) -> u64 {
    extent
        .u64("NumberOfBlocks")
        .unwrap_or(0)
        .saturating_mul(extent.u64("BlockSize").unwrap_or(0))
}

/// Find a device or partition by `/dev/...` name or by DeviceID.
pub fn str2device(ns: &dyn Namespace, raw: &str) -> Result<Instance> {
    let key = if raw.starts_with("/dev/") { "Name" } else { "DeviceID" };
    ns.first_instance(STORAGE_EXTENT, &[(key, raw)])?
        .ok_or_else(|| Error::failed(format!("Invalid device: {raw}")))
}

/// Partitions on `devices`, or every partition when none are given.
pub fn get_partitions(ns: &dyn Namespace, devices: &[String]) -> Result<Vec<Instance>> {
    if devices.is_empty() {
        return ns.instances(PARTITION);
    }
    let mut parts = Vec::new();
    for raw in devices {
        let device = str2device(ns, raw)?;
        parts.extend(ns.associators(&device.path, Some(BASED_ON), Some(PARTITION))?);
    }
    Ok(parts)
}

fn capabilities(ns: &dyn Namespace, device: &Instance) -> Result<Instance> {
    ns.first_associator(
        &device.path,
        Some(INSTALLED_PARTITION_TABLE),
        Some(PARTITION_CAPABILITIES),
    )?
    .ok_or_else(|| {
        Error::failed(format!(
            "Device {} has no partition table",
            device.text("DeviceID")
        ))
    })
}

/// Partition type to create on an MS-DOS table when the caller did not ask
/// for one, and whether an extended partition over the remaining space has
/// to be created first.
fn auto_type(existing: &[Instance]) -> Result<(PartitionType, bool)> {
    let kinds: Vec<_> = existing.iter().filter_map(PartitionType::of).collect();
    if kinds.contains(&PartitionType::Extended) {
        return Ok((PartitionType::Logical, false));
    }
    let primaries = kinds
        .iter()
        .filter(|k| **k == PartitionType::Primary)
        .count();
    match primaries {
        n if n < MBR_PRIMARY_SLOTS - 1 => Ok((PartitionType::Primary, false)),
        n if n == MBR_PRIMARY_SLOTS - 1 => Ok((PartitionType::Logical, true)),
        _ => Err(Error::failed(
            "There are already four primary partitions on the device",
        )),
    }
}

fn create_one(
    ns: &dyn Namespace,
    device: &Instance,
    caps: &Instance,
    size: Option<u64>,
    ptype: Option<PartitionType>,
) -> Result<Instance> {
    let service = ns.singleton(PARTITION_SERVICE)?;
    let mut params = Map::new();
    params.insert("extent".into(), device.path.to_value());
    if let Some(size) = size {
        params.insert("Size".into(), json!(size));
    }
    if let Some(ptype) = ptype {
        let setting = ns
            .call(&caps.path, "CreateSetting", Map::new())?
            .out_reference("Setting")
            .ok_or_else(|| Error::Malformed("CreateSetting returned no Setting".into()))?;
        let mut props = Map::new();
        props.insert("PartitionType".into(), json!(ptype as u16));
        ns.modify_instance(&setting, props)?;
        params.insert("Goal".into(), setting.to_value());
    }
    debug!(device = %device.text("DeviceID"), ?size, ?ptype, "LMI_CreateOrModifyPartition");
    let created = ns
        .call(&service.path, "LMI_CreateOrModifyPartition", params)?
        .out_reference("Partition")
        .ok_or_else(|| {
            Error::Malformed("LMI_CreateOrModifyPartition returned no Partition".into())
        })?;
    ns.get_instance(&created)
}

/// Create a partition on `device`, choosing primary/extended/logical on
/// MS-DOS tables when `ptype` is `None`.
pub fn create_partition(
    ns: &dyn Namespace,
    device: &Instance,
    size: Option<u64>,
    ptype: Option<PartitionType>,
) -> Result<Instance> {
    let caps = capabilities(ns, device)?;
    let style = caps.u64("PartitionStyle");
    if style != Some(STYLE_MBR) {
        if ptype.is_some() {
            return Err(Error::failed(
                "Logical and extended partitions exist only on MS-DOS partition tables",
            ));
        }
        if style != Some(STYLE_GPT) {
            debug!(?style, "unknown partition table style");
        }
        return create_one(ns, device, &caps, size, None);
    }

    let ptype = match ptype {
        Some(t) => t,
        None => {
            let existing = get_partitions(ns, &[device.text("DeviceID")])?;
            let (ptype, needs_extended) = auto_type(&existing)?;
            if needs_extended {
                let extended = create_one(ns, device, &caps, None, Some(PartitionType::Extended))?;
                info!(partition = %extended.text("DeviceID"), "created extended partition");
            }
            ptype
        }
    };
    create_one(ns, device, &caps, size, Some(ptype))
}

pub fn delete_partition(ns: &dyn Namespace, part: &Instance) -> Result<()> {
    let service = ns.singleton(PARTITION_SERVICE)?;
    let mut params = Map::new();
    params.insert("Partition".into(), part.path.to_value());
    ns.call(&service.path, "LMI_DeletePartition", params)?;
    info!(partition = %part.text("DeviceID"), "partition deleted");
    Ok(())
}
