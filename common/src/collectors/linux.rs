//! Linux collector: sysfs is the source for everything the firmware
//! and the block/net layers expose. Missing or unreadable entries
//! degrade to empty fields, never to a failure.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::collectors::{cpuid, PlatformCollector, SmbiosRawData};
use crate::hwid::{BusType, Cpu, PhysicalDriveInfo};
use crate::vm::{NetworkAdapterInfo, NetworkEvidence};

const DMI_TABLE_PATH: &str = "/sys/firmware/dmi/tables/DMI";
const DMI_ENTRY_POINT_PATH: &str = "/sys/firmware/dmi/tables/smbios_entry_point";
const BLOCK_PATH: &str = "/sys/block";
const NET_PATH: &str = "/sys/class/net";

// ARPHRD_TUNNEL, ARPHRD_TUNNEL6, ARPHRD_SIT, ARPHRD_IPGRE
const TUNNEL_ARPHRD_TYPES: [u32; 4] = [768, 769, 776, 778];

#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxCollector;

impl PlatformCollector for LinuxCollector {
    fn snap_cpu(&self) -> Cpu {
        cpuid::snap_cpu()
    }

    fn get_firmware_table(&self) -> SmbiosRawData {
        let table_data = match fs::read(DMI_TABLE_PATH) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = DMI_TABLE_PATH, error = %e, "无法读取 SMBIOS 表");
                return SmbiosRawData::default();
            }
        };

        let mut raw = SmbiosRawData {
            table_data,
            ..SmbiosRawData::default()
        };

        if let Ok(entry) = fs::read(DMI_ENTRY_POINT_PATH) {
            apply_entry_point_versions(&entry, &mut raw);
        } else {
            debug!(path = DMI_ENTRY_POINT_PATH, "SMBIOS 入口点不可读");
        }

        raw
    }

    fn list_drives(&self) -> Vec<PhysicalDriveInfo> {
        let entries = match fs::read_dir(BLOCK_PATH) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = BLOCK_PATH, error = %e, "无法枚举块设备");
                return Vec::new();
            }
        };

        let mut drives = Vec::new();
        for entry in entries.flatten() {
            let device = entry.file_name().to_string_lossy().into_owned();
            if device.starts_with("loop") || device.starts_with("ram") || device.starts_with("dm-")
            {
                continue;
            }

            if let Some(info) = read_drive(&entry.path(), &device) {
                drives.push(info);
            }
        }
        drives
    }

    fn list_network_adapters(&self) -> NetworkEvidence {
        let entries = match fs::read_dir(NET_PATH) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = NET_PATH, error = %e, "无法枚举网络接口");
                return NetworkEvidence::AccessDenied;
            }
        };

        let mut adapters = Vec::new();
        for entry in entries.flatten() {
            let iface = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            let arphrd_type = read_sysfs_value(&path.join("type"))
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0);

            let mut description = fs::read_link(path.join("device/driver"))
                .ok()
                .and_then(|target| {
                    target
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                })
                .unwrap_or_default();
            if description.is_empty() {
                description = iface.clone();
            }

            adapters.push(NetworkAdapterInfo {
                description,
                is_loopback: iface == "lo",
                is_tunnel: TUNNEL_ARPHRD_TYPES.contains(&arphrd_type),
            });
        }

        NetworkEvidence::Adapters(adapters)
    }
}

fn apply_entry_point_versions(entry: &[u8], raw: &mut SmbiosRawData) {
    // SMBIOS 2.1 32-bit entry point: "_SM_" anchor, versions at 6/7.
    if entry.starts_with(b"_SM_") && entry.len() > 7 {
        raw.major_version = entry[6];
        raw.minor_version = entry[7];
        return;
    }

    // SMBIOS 3.x 64-bit entry point: "_SM3_" anchor, versions at 7/8.
    if entry.starts_with(b"_SM3_") && entry.len() > 9 {
        raw.major_version = entry[7];
        raw.minor_version = entry[8];
        raw.dmi_revision = entry[9];
    }
}

fn read_sysfs_value(path: &Path) -> Option<String> {
    let value = fs::read_to_string(path).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_drive(sysfs_path: &Path, device: &str) -> Option<PhysicalDriveInfo> {
    let (bus_type, serial) = if device.starts_with("nvme") {
        (
            BusType::Nvme,
            read_sysfs_value(&sysfs_path.join("serial")).unwrap_or_default(),
        )
    } else if device.starts_with("sd") {
        let bus_type = classify_scsi_bus(sysfs_path);
        let serial = read_sysfs_value(&sysfs_path.join("device/serial"))
            .or_else(|| read_vpd_serial(&sysfs_path.join("device/vpd_pg80")))
            .unwrap_or_default();
        (bus_type, serial)
    } else {
        return None;
    };

    if serial.is_empty() {
        debug!(device, "块设备缺少序列号");
    }

    Some(PhysicalDriveInfo {
        device_name: format!("/dev/{device}"),
        serial,
        vendor_id: read_sysfs_value(&sysfs_path.join("device/vendor")).unwrap_or_default(),
        product_id: read_sysfs_value(&sysfs_path.join("device/model")).unwrap_or_default(),
        bus_type,
    })
}

fn classify_scsi_bus(sysfs_path: &Path) -> BusType {
    let Ok(target) = fs::read_link(sysfs_path.join("device/subsystem")) else {
        return BusType::Other;
    };

    match target.file_name().and_then(|name| name.to_str()) {
        Some("scsi" | "ata") => BusType::Sata,
        Some("usb") => BusType::Usb,
        _ => BusType::Other,
    }
}

/// VPD page 0x80: 4-byte header, then the unit serial number.
fn read_vpd_serial(path: &Path) -> Option<String> {
    let data = fs::read(path).ok()?;
    let payload = data.get(4..)?;
    let serial = String::from_utf8_lossy(payload).trim().to_string();
    if serial.is_empty() {
        None
    } else {
        Some(serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_32bit_versions_are_extracted() {
        let mut entry = vec![0u8; 31];
        entry[0..4].copy_from_slice(b"_SM_");
        entry[6] = 2;
        entry[7] = 8;

        let mut raw = SmbiosRawData::default();
        apply_entry_point_versions(&entry, &mut raw);
        assert_eq!((raw.major_version, raw.minor_version), (2, 8));
    }

    #[test]
    fn entry_point_64bit_versions_are_extracted() {
        let mut entry = vec![0u8; 24];
        entry[0..5].copy_from_slice(b"_SM3_");
        entry[7] = 3;
        entry[8] = 4;
        entry[9] = 1;

        let mut raw = SmbiosRawData::default();
        apply_entry_point_versions(&entry, &mut raw);
        assert_eq!((raw.major_version, raw.minor_version), (3, 4));
        assert_eq!(raw.dmi_revision, 1);
    }

    #[test]
    fn unknown_anchor_leaves_versions_zero() {
        let mut raw = SmbiosRawData::default();
        apply_entry_point_versions(b"garbage entry point", &mut raw);
        assert_eq!((raw.major_version, raw.minor_version), (0, 0));
    }

    #[test]
    fn truncated_entry_point_is_ignored() {
        let mut raw = SmbiosRawData::default();
        apply_entry_point_versions(b"_SM_", &mut raw);
        apply_entry_point_versions(b"_SM3_", &mut raw);
        assert_eq!((raw.major_version, raw.minor_version), (0, 0));
    }
}
