//! Canonical serialization of a hardware snapshot and the pluggable
//! hash seam on top of it.
//!
//! The byte stream exists only to be hashed. Stability across repeated
//! snapshots of the same machine is the contract: field order is fixed,
//! integers are little-endian, drives are visited in ascending serial
//! order, and buses that do not identify hardware (USB, catch-all) are
//! left out. The bulky raw firmware blob and the apic id are excluded
//! as well, both vary without the machine changing.

use crate::hash::{Hash256, Sha256};
use crate::hwid::{Cpu, Motherboard, MotherboardEx, PhysicalDriveInfo, Smbios};

pub fn serialize_motherboard(board: &Motherboard) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(256);
    push_base(&mut buffer, &board.cpu, &board.smbios);
    buffer
}

pub fn serialize_motherboard_ex(board: &MotherboardEx) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(512);
    push_base(&mut buffer, &board.cpu, &board.smbios);

    let mut drives: Vec<&PhysicalDriveInfo> = board
        .drives
        .iter()
        .filter(|drive| drive.bus_type.identity_relevant())
        .collect();
    drives.sort_by(|a, b| a.serial.cmp(&b.serial));

    for drive in drives {
        buffer.push(drive.bus_type.tag());
        buffer.extend_from_slice(drive.device_name.as_bytes());
        buffer.extend_from_slice(drive.serial.as_bytes());
    }

    buffer
}

fn push_base(buffer: &mut Vec<u8>, cpu: &Cpu, smbios: &Smbios) {
    buffer.extend_from_slice(cpu.vendor.as_bytes());
    buffer.extend_from_slice(&cpu.version.to_le_bytes());
    buffer.push(cpu.brand_index);
    buffer.push(cpu.clflush_line_size);
    buffer.push(cpu.logical_processors_count);
    buffer.extend_from_slice(cpu.extended_brand_string.as_bytes());

    buffer.extend_from_slice(&cpu.instruction_set.basic.to_le_bytes());
    buffer.extend_from_slice(&cpu.instruction_set.modern.to_le_bytes());
    for word in cpu.instruction_set.extended_modern {
        buffer.extend_from_slice(&word.to_le_bytes());
    }

    buffer.push(u8::from(smbios.is_20_calling_used));
    buffer.push(smbios.major_version);
    buffer.push(smbios.minor_version);
    buffer.push(smbios.dmi_revision);
    buffer.extend_from_slice(&smbios.uuid);
}

/// Hash seam over a snapshot type. Implementations must be
/// stateless-constructible so callers can swap algorithms by type
/// parameter alone.
pub trait SnapshotHash<S>: Default {
    type Output: AsRef<[u8]>;

    fn hash(&self, snapshot: &S) -> Self::Output;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHash;

impl SnapshotHash<Motherboard> for DefaultHash {
    type Output = Hash256;

    fn hash(&self, snapshot: &Motherboard) -> Hash256 {
        Sha256::digest(&serialize_motherboard(snapshot))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHashEx;

impl SnapshotHash<MotherboardEx> for DefaultHashEx {
    type Output = Hash256;

    fn hash(&self, snapshot: &MotherboardEx) -> Hash256 {
        Sha256::digest(&serialize_motherboard_ex(snapshot))
    }
}

pub fn fingerprint(board: &Motherboard) -> Hash256 {
    DefaultHash.hash(board)
}

pub fn fingerprint_ex(board: &MotherboardEx) -> Hash256 {
    DefaultHashEx.hash(board)
}

pub fn fingerprint_with<S, H: SnapshotHash<S>>(board: &S) -> H::Output {
    H::default().hash(board)
}
