//! Hardware snapshot model: CPU facts, SMBIOS facts and drive facts,
//! assembled once from collector output and read-only afterwards.

use crate::collectors::{PlatformCollector, SmbiosRawData};
use crate::smbios;

pub const SMBIOS_UUID_LENGTH: usize = smbios::UUID_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstructionSet {
    pub basic: u32,
    pub modern: u32,
    pub extended_modern: [u32; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cpu {
    pub vendor: String,
    pub version: u32,
    pub brand_index: u8,
    pub clflush_line_size: u8,
    pub logical_processors_count: u8,
    pub apic_id: u8,
    pub extended_brand_string: String,
    pub too_old: bool,
    pub hypervisor_bit: bool,
    pub hypervisor_signature: String,
    pub instruction_set: InstructionSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Smbios {
    pub is_20_calling_used: bool,
    pub major_version: u8,
    pub minor_version: u8,
    pub dmi_revision: u8,
    pub uuid: [u8; SMBIOS_UUID_LENGTH],
    pub raw_tables_data: Vec<u8>,
}

impl Smbios {
    pub fn from_raw(raw: SmbiosRawData) -> Self {
        let uuid = smbios::extract_uuid(&raw.table_data).unwrap_or_default();
        Self {
            is_20_calling_used: raw.used_20_calling_method != 0,
            major_version: raw.major_version,
            minor_version: raw.minor_version,
            dmi_revision: raw.dmi_revision,
            uuid,
            raw_tables_data: raw.table_data,
        }
    }

    pub fn manufacturer(&self) -> String {
        smbios::extract_manufacturer(&self.raw_tables_data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BusType {
    Sata = 0,
    Nvme = 1,
    Usb = 2,
    Virtual = 3,
    Scsi = 4,
    Ata = 5,
    Sas = 6,
    #[default]
    Other = 7,
}

impl BusType {
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Sata),
            1 => Some(Self::Nvme),
            2 => Some(Self::Usb),
            3 => Some(Self::Virtual),
            4 => Some(Self::Scsi),
            5 => Some(Self::Ata),
            6 => Some(Self::Sas),
            7 => Some(Self::Other),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sata => "SATA",
            Self::Nvme => "NVMe",
            Self::Usb => "USB",
            Self::Virtual => "Virtual",
            Self::Scsi => "SCSI",
            Self::Ata => "ATA",
            Self::Sas => "SAS",
            Self::Other => "Other",
        }
    }

    /// Removable and catch-all buses are not stable identity signals and
    /// stay out of the fingerprint digest.
    pub const fn identity_relevant(self) -> bool {
        !matches!(self, Self::Usb | Self::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhysicalDriveInfo {
    pub device_name: String,
    pub serial: String,
    pub vendor_id: String,
    pub product_id: String,
    pub bus_type: BusType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Motherboard {
    pub cpu: Cpu,
    pub smbios: Smbios,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MotherboardEx {
    pub cpu: Cpu,
    pub smbios: Smbios,
    pub drives: Vec<PhysicalDriveInfo>,
}

pub fn snap_motherboard(collector: &impl PlatformCollector) -> Motherboard {
    Motherboard {
        cpu: collector.snap_cpu(),
        smbios: Smbios::from_raw(collector.get_firmware_table()),
    }
}

pub fn snap_motherboard_ex(collector: &impl PlatformCollector) -> MotherboardEx {
    let mut drives = collector.list_drives();
    drives.sort_by(|a, b| a.serial.cmp(&b.serial));

    MotherboardEx {
        cpu: collector.snap_cpu(),
        smbios: Smbios::from_raw(collector.get_firmware_table()),
        drives,
    }
}
