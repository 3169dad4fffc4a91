#![allow(missing_docs)]

use std::io::Cursor;

use common::collectors::{PlatformCollector, SmbiosRawData};
use common::fingerprint::{fingerprint, fingerprint_ex};
use common::hwid::{
    snap_motherboard, snap_motherboard_ex, BusType, Cpu, PhysicalDriveInfo, SMBIOS_UUID_LENGTH,
};
use common::io;
use common::vm::{analyze_ex, NetworkEvidence, VmConfidence, VmFlag};

/// Collector returning a canned VirtualBox-looking machine.
struct VirtualBoxCollector;

fn vbox_firmware_table() -> Vec<u8> {
    let mut record = vec![0u8; 27];
    record[0] = 1; // System Information
    record[1] = 27;
    record[4] = 1; // manufacturer string index
    record[8..24].copy_from_slice(b"\x01\x23\x45\x67\x89\xab\xcd\xef\x01\x23\x45\x67\x89\xab\xcd\xef");
    record.extend_from_slice(b"innotek GmbH\0\0");
    record
}

impl PlatformCollector for VirtualBoxCollector {
    fn snap_cpu(&self) -> Cpu {
        Cpu {
            vendor: "GenuineIntel".to_string(),
            version: 0x0009_06ea,
            clflush_line_size: 8,
            logical_processors_count: 4,
            extended_brand_string: "Intel(R) Core(TM) i7-8750H CPU @ 2.20GHz".to_string(),
            hypervisor_bit: true,
            hypervisor_signature: "VBoxVBoxVBox".to_string(),
            ..Cpu::default()
        }
    }

    fn get_firmware_table(&self) -> SmbiosRawData {
        SmbiosRawData {
            used_20_calling_method: 1,
            major_version: 2,
            minor_version: 5,
            dmi_revision: 0,
            table_data: vbox_firmware_table(),
        }
    }

    fn list_drives(&self) -> Vec<PhysicalDriveInfo> {
        vec![PhysicalDriveInfo {
            device_name: "/dev/sda".to_string(),
            serial: "VB1234-56789".to_string(),
            vendor_id: "VBOX".to_string(),
            product_id: "HARDDISK".to_string(),
            bus_type: BusType::Sata,
        }]
    }

    fn list_network_adapters(&self) -> NetworkEvidence {
        NetworkEvidence::Adapters(vec![common::vm::NetworkAdapterInfo {
            description: "Intel PRO/1000 MT Desktop (VirtualBox)".to_string(),
            is_loopback: false,
            is_tunnel: false,
        }])
    }
}

#[test]
fn snapshot_to_fingerprint_is_stable() {
    let collector = VirtualBoxCollector;
    let first = fingerprint_ex(&snap_motherboard_ex(&collector));
    let second = fingerprint_ex(&snap_motherboard_ex(&collector));
    assert_eq!(first, second);
}

#[test]
fn base_and_extended_snapshots_agree_on_smbios() {
    let collector = VirtualBoxCollector;
    let base = snap_motherboard(&collector);
    let extended = snap_motherboard_ex(&collector);

    assert_eq!(base.smbios, extended.smbios);
    assert_eq!(base.smbios.manufacturer(), "innotek GmbH");
    assert_ne!(base.smbios.uuid, [0u8; SMBIOS_UUID_LENGTH]);
    // Base digest covers a strict prefix of the extended stream.
    assert_ne!(
        fingerprint(&base).as_bytes(),
        fingerprint_ex(&extended).as_bytes()
    );
}

#[test]
fn virtualbox_machine_is_detected() {
    let collector = VirtualBoxCollector;
    let board = snap_motherboard_ex(&collector);
    let verdict = analyze_ex(&board, &collector.list_network_adapters());

    assert!(verdict.detections.contains(&VmFlag::CpuHypervisorBit));
    assert!(verdict.detections.contains(&VmFlag::CpuHypervisorSignature));
    assert!(verdict
        .detections
        .contains(&VmFlag::SmbiosSuspiciousManufacturer));
    assert!(verdict.detections.contains(&VmFlag::StorageProductIdKnownVm));
    assert!(verdict
        .detections
        .contains(&VmFlag::PlatformVirtualNetworkAdaptersPresent));
    assert_eq!(verdict.confidence, VmConfidence::DefinitelyVM);
    assert!(verdict.is_virtual());
}

#[test]
fn degraded_collector_still_produces_fingerprint_and_verdict() {
    struct EmptyCollector;

    impl PlatformCollector for EmptyCollector {
        fn snap_cpu(&self) -> Cpu {
            Cpu::default()
        }
        fn get_firmware_table(&self) -> SmbiosRawData {
            SmbiosRawData::default()
        }
        fn list_drives(&self) -> Vec<PhysicalDriveInfo> {
            Vec::new()
        }
        fn list_network_adapters(&self) -> NetworkEvidence {
            NetworkEvidence::AccessDenied
        }
    }

    let collector = EmptyCollector;
    let board = snap_motherboard_ex(&collector);

    let digest = fingerprint_ex(&board);
    assert_eq!(digest.as_bytes().len(), 32);

    // Zero UUID plus denied network access: still a verdict, no panic.
    let verdict = analyze_ex(&board, &collector.list_network_adapters());
    assert!(verdict.detections.contains(&VmFlag::SmbiosUuidTotallyZeroed));
    assert!(verdict
        .detections
        .contains(&VmFlag::PlatformAccessToNetworkDevicesDenied));
    assert_eq!(verdict.confidence, VmConfidence::DefinitelyVM);
}

#[test]
fn binary_report_round_trips_through_io() {
    let collector = VirtualBoxCollector;
    let board = snap_motherboard_ex(&collector);

    let encoded = io::encode_binary_ex(&board);
    let decoded = io::read_binary_ex(&encoded).expect("well-formed record");

    assert_eq!(decoded.cpu.vendor, board.cpu.vendor);
    assert_eq!(decoded.smbios.uuid, board.smbios.uuid);
    assert_eq!(decoded.drives.len(), board.drives.len());
    assert_eq!(decoded.drives[0].serial, board.drives[0].serial);
}

#[test]
fn fingerprint_file_write_is_all_or_nothing() {
    let collector = VirtualBoxCollector;
    let board = snap_motherboard_ex(&collector);

    let mut sized = Cursor::new(vec![0u8; 32]);
    assert_eq!(io::write_fingerprint_ex(&mut sized, &board).unwrap(), 32);
    assert_eq!(
        sized.get_ref().as_slice(),
        fingerprint_ex(&board).as_bytes()
    );

    let mut short = Cursor::new(vec![0u8; 31]);
    assert_eq!(io::write_fingerprint_ex(&mut short, &board).unwrap(), 0);
    assert_eq!(short.get_ref().as_slice(), &[0u8; 31]);
}
