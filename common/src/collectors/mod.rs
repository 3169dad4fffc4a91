#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(windows)]
pub mod windows;

use crate::hwid::{Cpu, PhysicalDriveInfo};
use crate::vm::NetworkEvidence;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SmbiosRawData {
    pub used_20_calling_method: u8,
    pub major_version: u8,
    pub minor_version: u8,
    pub dmi_revision: u8,
    pub table_data: Vec<u8>,
}

impl SmbiosRawData {
    pub fn is_empty(&self) -> bool {
        self.table_data.is_empty()
    }
}

/// OS boundary: everything behind this trait touches the outside world,
/// everything in front of it is pure computation over the snapshot.
pub trait PlatformCollector {
    fn snap_cpu(&self) -> Cpu;
    fn get_firmware_table(&self) -> SmbiosRawData;
    fn list_drives(&self) -> Vec<PhysicalDriveInfo>;
    fn list_network_adapters(&self) -> NetworkEvidence;
}

#[cfg(target_os = "linux")]
pub type DefaultCollector = linux::LinuxCollector;
#[cfg(windows)]
pub type DefaultCollector = windows::WindowsCollector;

#[cfg(any(target_os = "linux", windows))]
pub fn default_collector() -> DefaultCollector {
    DefaultCollector::default()
}

#[cfg(all(target_arch = "x86_64", any(target_os = "linux", windows)))]
pub(crate) mod cpuid {
    use crate::hwid::{Cpu, InstructionSet};

    const LEAF_VENDOR: u32 = 0x0000_0000;
    const LEAF_FAMILY: u32 = 0x0000_0001;
    const LEAF_EXT_INSTRUCTIONS: u32 = 0x0000_0007;
    const LEAF_HYPERVISOR: u32 = 0x4000_0000;
    const LEAF_EXT_MAX: u32 = 0x8000_0000;
    const LEAF_EXT_BRAND: u32 = 0x8000_0002;

    const HYPERVISOR_BIT: u32 = 1 << 31;

    fn trimmed_ascii(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes)
            .trim_matches(char::from(0))
            .trim()
            .to_string()
    }

    #[allow(unsafe_code)]
    pub(crate) fn snap_cpu() -> Cpu {
        // SAFETY: x86_64 guarantees the cpuid instruction; every leaf
        // below reports its availability through the max-leaf values.
        let vendor_leaf = unsafe { core::arch::x86_64::__cpuid(LEAF_VENDOR) };
        let max_leaf = vendor_leaf.eax;

        let mut vendor_bytes = [0u8; 12];
        vendor_bytes[0..4].copy_from_slice(&vendor_leaf.ebx.to_le_bytes());
        vendor_bytes[4..8].copy_from_slice(&vendor_leaf.edx.to_le_bytes());
        vendor_bytes[8..12].copy_from_slice(&vendor_leaf.ecx.to_le_bytes());

        let mut cpu = Cpu {
            vendor: trimmed_ascii(&vendor_bytes),
            ..Cpu::default()
        };

        if max_leaf >= LEAF_FAMILY {
            let family = unsafe { core::arch::x86_64::__cpuid(LEAF_FAMILY) };
            cpu.version = family.eax;
            cpu.brand_index = (family.ebx & 0xff) as u8;
            cpu.clflush_line_size = ((family.ebx >> 8) & 0xff) as u8;
            cpu.logical_processors_count = ((family.ebx >> 16) & 0xff) as u8;
            cpu.apic_id = ((family.ebx >> 24) & 0xff) as u8;
            cpu.hypervisor_bit = family.ecx & HYPERVISOR_BIT != 0;
            cpu.instruction_set = InstructionSet {
                basic: family.edx,
                modern: family.ecx,
                extended_modern: [0; 3],
            };
        }

        if max_leaf >= LEAF_EXT_INSTRUCTIONS {
            let ext = unsafe { core::arch::x86_64::__cpuid_count(LEAF_EXT_INSTRUCTIONS, 0) };
            cpu.instruction_set.extended_modern = [ext.ebx, ext.ecx, ext.edx];
        }

        if cpu.hypervisor_bit {
            let hv = unsafe { core::arch::x86_64::__cpuid(LEAF_HYPERVISOR) };
            let mut signature = [0u8; 12];
            signature[0..4].copy_from_slice(&hv.ebx.to_le_bytes());
            signature[4..8].copy_from_slice(&hv.ecx.to_le_bytes());
            signature[8..12].copy_from_slice(&hv.edx.to_le_bytes());
            cpu.hypervisor_signature = trimmed_ascii(&signature);
        }

        let ext_max = unsafe { core::arch::x86_64::__cpuid(LEAF_EXT_MAX) }.eax;
        if ext_max >= LEAF_EXT_BRAND + 2 {
            let mut brand = Vec::with_capacity(48);
            for leaf in LEAF_EXT_BRAND..=LEAF_EXT_BRAND + 2 {
                let regs = unsafe { core::arch::x86_64::__cpuid(leaf) };
                for word in [regs.eax, regs.ebx, regs.ecx, regs.edx] {
                    brand.extend_from_slice(&word.to_le_bytes());
                }
            }
            cpu.extended_brand_string = trimmed_ascii(&brand);
        } else {
            cpu.too_old = true;
            cpu.extended_brand_string = "unavailable".to_string();
        }

        cpu
    }
}

#[cfg(all(not(target_arch = "x86_64"), any(target_os = "linux", windows)))]
pub(crate) mod cpuid {
    use crate::hwid::Cpu;

    pub(crate) fn snap_cpu() -> Cpu {
        Cpu {
            too_old: true,
            extended_brand_string: "unavailable".to_string(),
            ..Cpu::default()
        }
    }
}
