//! Heuristic virtualization evidence engine.
//!
//! Every check is a pure predicate over an immutable snapshot plus the
//! externally supplied network-adapter evidence. Each finding is one of
//! a closed flag set, classified by strength, and the final confidence
//! is a deterministic function of the strength tallies alone.

use crate::hwid::{
    BusType, Cpu, Motherboard, MotherboardEx, PhysicalDriveInfo, Smbios, SMBIOS_UUID_LENGTH,
};

const MICROSOFT_HYPERV_SIGNATURE: &str = "Microsoft Hv";

const KNOWN_HYPERVISOR_SIGNATURES: [&str; 9] = [
    "KVM",
    "KVMKVMKVM",
    "VMwareVMware",
    "VBoxVBoxVBox",
    "TCGTCGTCG",
    "ACRNACRN",
    "bhyve bhyve",
    "Xen",
    MICROSOFT_HYPERV_SIGNATURE,
];

const KNOWN_VM_MANUFACTURERS: [&str; 7] = [
    "innotek GmbH",
    "Oracle",
    "VMware, Inc.",
    "QEMU",
    "Xen",
    "Microsoft Corporation",
    "Parallels",
];

const KNOWN_VM_NETWORK_ADAPTERS: [&str; 12] = [
    "vmware",
    "vmxnet",
    "vmnet",
    "virtualbox",
    "vbox",
    "hyper-v",
    "microsoft hyper-v",
    "virtio",
    "red hat virtio",
    "xennet",
    "xen",
    "parallels",
];

const KNOWN_VM_DRIVE_PRODUCTS: [&str; 10] = [
    "VBOX",
    "VMWARE",
    "QEMU",
    "VIRTUAL",
    "XEN",
    "KVM",
    "RED HAT",
    "VIRTIO",
    "MSFT",
    "MICROSOFT VIRTUAL",
];

const UNCOMMON_BUSES: [BusType; 3] = [BusType::Sas, BusType::Scsi, BusType::Ata];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmFlag {
    CpuHypervisorBit,
    CpuHypervisorSignature,
    SmbiosSuspiciousManufacturer,
    SmbiosSuspiciousUuid,
    SmbiosUuidTotallyZeroed,
    StorageProductIdKnownVm,
    StorageBusTypeIsVirtual,
    StorageSuspiciousSerial,
    StorageBusTypeUncommon,
    StorageAllDrivesBusesVirtual,
    StorageAllDrivesVendorProductKnownVm,
    PlatformHyperVIsolation,
    PlatformVirtualNetworkAdaptersPresent,
    PlatformOnlyVirtualNetworkAdapters,
    PlatformAccessToNetworkDevicesDenied,
    PlatformWindowsRegistry,
    PlatformLinuxDevices,
}

pub const ALL_FLAGS: [VmFlag; 17] = [
    VmFlag::CpuHypervisorBit,
    VmFlag::CpuHypervisorSignature,
    VmFlag::SmbiosSuspiciousManufacturer,
    VmFlag::SmbiosSuspiciousUuid,
    VmFlag::SmbiosUuidTotallyZeroed,
    VmFlag::StorageProductIdKnownVm,
    VmFlag::StorageBusTypeIsVirtual,
    VmFlag::StorageSuspiciousSerial,
    VmFlag::StorageBusTypeUncommon,
    VmFlag::StorageAllDrivesBusesVirtual,
    VmFlag::StorageAllDrivesVendorProductKnownVm,
    VmFlag::PlatformHyperVIsolation,
    VmFlag::PlatformVirtualNetworkAdaptersPresent,
    VmFlag::PlatformOnlyVirtualNetworkAdapters,
    VmFlag::PlatformAccessToNetworkDevicesDenied,
    VmFlag::PlatformWindowsRegistry,
    VmFlag::PlatformLinuxDevices,
];

impl VmFlag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CpuHypervisorBit => "cpu.hypervisor_bit",
            Self::CpuHypervisorSignature => "cpu.hypervisor_signature",
            Self::SmbiosSuspiciousManufacturer => "smbios.suspicious_manufacturer",
            Self::SmbiosSuspiciousUuid => "smbios.suspicious_uuid",
            Self::SmbiosUuidTotallyZeroed => "smbios.uuid_totally_zeroed",
            Self::StorageProductIdKnownVm => "storage.product_id_known_vm",
            Self::StorageBusTypeIsVirtual => "storage.bus_type_is_virtual",
            Self::StorageSuspiciousSerial => "storage.suspicious_serial",
            Self::StorageBusTypeUncommon => "storage.bus_type_uncommon",
            Self::StorageAllDrivesBusesVirtual => "storage.all_drives_buses_virtual",
            Self::StorageAllDrivesVendorProductKnownVm => "storage.all_drives_product_known_vm",
            Self::PlatformHyperVIsolation => "platform.hyperv_isolation",
            Self::PlatformVirtualNetworkAdaptersPresent => "platform.virtual_network_adapters",
            Self::PlatformOnlyVirtualNetworkAdapters => "platform.only_virtual_network_adapters",
            Self::PlatformAccessToNetworkDevicesDenied => "platform.network_access_denied",
            Self::PlatformWindowsRegistry => "platform.windows_registry",
            Self::PlatformLinuxDevices => "platform.linux_devices",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlagStrength {
    Weak,
    Medium,
    Strong,
    Critical,
}

pub const fn flag_strength(flag: VmFlag) -> FlagStrength {
    match flag {
        VmFlag::PlatformHyperVIsolation | VmFlag::PlatformVirtualNetworkAdaptersPresent => {
            FlagStrength::Weak
        }

        VmFlag::SmbiosSuspiciousUuid
        | VmFlag::PlatformOnlyVirtualNetworkAdapters
        | VmFlag::StorageBusTypeUncommon
        | VmFlag::StorageSuspiciousSerial
        | VmFlag::PlatformWindowsRegistry
        | VmFlag::PlatformLinuxDevices
        | VmFlag::PlatformAccessToNetworkDevicesDenied => FlagStrength::Medium,

        VmFlag::CpuHypervisorBit
        | VmFlag::CpuHypervisorSignature
        | VmFlag::StorageBusTypeIsVirtual
        | VmFlag::StorageProductIdKnownVm
        | VmFlag::SmbiosSuspiciousManufacturer => FlagStrength::Strong,

        VmFlag::SmbiosUuidTotallyZeroed
        | VmFlag::StorageAllDrivesBusesVirtual
        | VmFlag::StorageAllDrivesVendorProductKnownVm => FlagStrength::Critical,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VmConfidence {
    #[default]
    Unlikely,
    Possible,
    Probable,
    DefinitelyVM,
}

impl VmConfidence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unlikely => "unlikely",
            Self::Possible => "possible",
            Self::Probable => "probable",
            Self::DefinitelyVM => "definitely-vm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeuristicVerdict {
    pub detections: Vec<VmFlag>,
    pub confidence: VmConfidence,
}

impl HeuristicVerdict {
    pub fn is_virtual(&self) -> bool {
        self.confidence >= VmConfidence::Probable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkAdapterInfo {
    pub description: String,
    pub is_loopback: bool,
    pub is_tunnel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvidence {
    AccessDenied,
    Adapters(Vec<NetworkAdapterInfo>),
}

impl Default for NetworkEvidence {
    fn default() -> Self {
        Self::Adapters(Vec::new())
    }
}

pub fn calculate_confidence(detections: &[VmFlag]) -> VmConfidence {
    let mut weak = 0u32;
    let mut medium = 0u32;
    let mut strong = 0u32;
    let mut critical = false;

    for &flag in detections {
        match flag_strength(flag) {
            FlagStrength::Weak => weak += 1,
            FlagStrength::Medium => medium += 1,
            FlagStrength::Strong => strong += 1,
            FlagStrength::Critical => critical = true,
        }
    }

    // Precedence is exact: critical short-circuits, two strong signals
    // are as conclusive as one critical.
    if critical || strong >= 2 {
        VmConfidence::DefinitelyVM
    } else if strong >= 1 || medium >= 3 {
        VmConfidence::Probable
    } else if medium >= 1 || weak >= 2 {
        VmConfidence::Possible
    } else {
        VmConfidence::Unlikely
    }
}

fn contains_icase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    let needle = needle.to_ascii_lowercase();
    haystack.to_ascii_lowercase().contains(&needle)
}

fn matches_known_manufacturer(manufacturer: &str) -> bool {
    KNOWN_VM_MANUFACTURERS
        .iter()
        .any(|known| manufacturer.contains(known))
}

/// Windows Core Isolation runs the OS under Hyper-V on bare metal, which
/// sets the hypervisor bit and the "Microsoft Hv" signature without any
/// VM vendor showing up in the firmware. A genuine Hyper-V guest carries
/// a recognizable manufacturer string instead. The UUID pattern is not
/// inspected here, so a guest with a scrubbed manufacturer string will
/// be classified as isolation-only.
fn is_core_isolation(cpu: &Cpu, smbios: &Smbios) -> bool {
    cpu.hypervisor_bit
        && cpu.hypervisor_signature == MICROSOFT_HYPERV_SIGNATURE
        && !matches_known_manufacturer(&smbios.manufacturer())
}

fn check_cpu(cpu: &Cpu, smbios: &Smbios, detections: &mut Vec<VmFlag>) {
    if is_core_isolation(cpu, smbios) {
        detections.push(VmFlag::PlatformHyperVIsolation);
        return;
    }

    if cpu.hypervisor_bit {
        detections.push(VmFlag::CpuHypervisorBit);
    }

    if KNOWN_HYPERVISOR_SIGNATURES
        .iter()
        .any(|sig| cpu.hypervisor_signature.contains(sig))
    {
        detections.push(VmFlag::CpuHypervisorSignature);
    }
}

fn check_smbios(smbios: &Smbios, detections: &mut Vec<VmFlag>) {
    if matches_known_manufacturer(&smbios.manufacturer()) {
        detections.push(VmFlag::SmbiosSuspiciousManufacturer);
    }

    if smbios.uuid == [0u8; SMBIOS_UUID_LENGTH] {
        detections.push(VmFlag::SmbiosSuspiciousUuid);
        detections.push(VmFlag::SmbiosUuidTotallyZeroed);
    }
}

fn is_virtual_adapter(adapter: &NetworkAdapterInfo) -> bool {
    KNOWN_VM_NETWORK_ADAPTERS
        .iter()
        .any(|key| contains_icase(&adapter.description, key))
}

fn check_network(evidence: &NetworkEvidence, detections: &mut Vec<VmFlag>) {
    let adapters = match evidence {
        NetworkEvidence::AccessDenied => {
            detections.push(VmFlag::PlatformAccessToNetworkDevicesDenied);
            return;
        }
        NetworkEvidence::Adapters(adapters) => adapters,
    };

    let mut virtual_count = 0usize;
    let mut total_count = 0usize;

    for adapter in adapters {
        if is_virtual_adapter(adapter) {
            virtual_count += 1;
            total_count += 1;
        } else if !adapter.is_loopback && !adapter.is_tunnel {
            total_count += 1;
        }
    }

    if virtual_count > 0 {
        detections.push(VmFlag::PlatformVirtualNetworkAdaptersPresent);
    }

    if total_count > 0 && virtual_count == total_count {
        detections.push(VmFlag::PlatformOnlyVirtualNetworkAdapters);
    }
}

fn is_suspicious_serial(serial: &str) -> bool {
    let mut chars = serial.chars();
    match chars.next() {
        None => true,
        Some(first) => chars.all(|c| c == first),
    }
}

fn check_drive(drive: &PhysicalDriveInfo, detections: &mut Vec<VmFlag>) -> bool {
    let full_model_name = format!("{} {}", drive.vendor_id, drive.product_id);

    let product_known_vm = KNOWN_VM_DRIVE_PRODUCTS
        .iter()
        .any(|product| contains_icase(&full_model_name, product));
    if product_known_vm {
        detections.push(VmFlag::StorageProductIdKnownVm);
    }

    if drive.bus_type == BusType::Virtual {
        detections.push(VmFlag::StorageBusTypeIsVirtual);
    }

    if is_suspicious_serial(&drive.serial) {
        detections.push(VmFlag::StorageSuspiciousSerial);
    }

    if UNCOMMON_BUSES.contains(&drive.bus_type) {
        detections.push(VmFlag::StorageBusTypeUncommon);
    }

    product_known_vm
}

pub fn analyze(board: &Motherboard, network: &NetworkEvidence) -> HeuristicVerdict {
    let mut detections = Vec::new();
    check_cpu(&board.cpu, &board.smbios, &mut detections);
    check_smbios(&board.smbios, &mut detections);
    check_network(network, &mut detections);

    let confidence = calculate_confidence(&detections);
    HeuristicVerdict {
        detections,
        confidence,
    }
}

pub fn analyze_ex(board: &MotherboardEx, network: &NetworkEvidence) -> HeuristicVerdict {
    let mut detections = Vec::new();
    check_cpu(&board.cpu, &board.smbios, &mut detections);
    check_smbios(&board.smbios, &mut detections);
    check_network(network, &mut detections);

    let mut product_known_vm_count = 0usize;
    for drive in &board.drives {
        if check_drive(drive, &mut detections) {
            product_known_vm_count += 1;
        }
    }

    let virtual_buses = board
        .drives
        .iter()
        .filter(|drive| drive.bus_type == BusType::Virtual)
        .count();

    if !board.drives.is_empty() && virtual_buses == board.drives.len() {
        detections.push(VmFlag::StorageAllDrivesBusesVirtual);
    }

    if !board.drives.is_empty() && product_known_vm_count == board.drives.len() {
        detections.push(VmFlag::StorageAllDrivesVendorProductKnownVm);
    }

    let confidence = calculate_confidence(&detections);
    HeuristicVerdict {
        detections,
        confidence,
    }
}

pub fn assume_virtual(board: &Motherboard, network: &NetworkEvidence) -> bool {
    analyze(board, network).is_virtual()
}

pub fn assume_virtual_ex(board: &MotherboardEx, network: &NetworkEvidence) -> bool {
    analyze_ex(board, network).is_virtual()
}

/// Heuristic seam, same shape as the hash seam: stateless-constructible
/// and swappable by type parameter.
pub trait Heuristic<S>: Default {
    fn evaluate(&self, snapshot: &S, network: &NetworkEvidence) -> HeuristicVerdict;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHeuristic;

impl Heuristic<Motherboard> for DefaultHeuristic {
    fn evaluate(&self, snapshot: &Motherboard, network: &NetworkEvidence) -> HeuristicVerdict {
        analyze(snapshot, network)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHeuristicEx;

impl Heuristic<MotherboardEx> for DefaultHeuristicEx {
    fn evaluate(&self, snapshot: &MotherboardEx, network: &NetworkEvidence) -> HeuristicVerdict {
        analyze_ex(snapshot, network)
    }
}
