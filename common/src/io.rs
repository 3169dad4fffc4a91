//! Snapshot reports: human-readable text, a length-prefixed binary
//! record, and raw fingerprint bytes.
//!
//! The binary record is internal persistence, not a public protocol.
//! All integers are little-endian, strings are u32 length + bytes.
//! Hash writes are all-or-nothing: a sink without room for the full
//! digest receives zero bytes.

use std::io::{self, Seek, SeekFrom, Write};

use crate::fingerprint::{DefaultHash, DefaultHashEx, SnapshotHash};
use crate::hash::Hash;
use crate::hwid::{
    BusType, Cpu, InstructionSet, Motherboard, MotherboardEx, PhysicalDriveInfo, Smbios,
    SMBIOS_UUID_LENGTH,
};

pub fn format_uuid(uuid: &[u8; SMBIOS_UUID_LENGTH]) -> String {
    let hex: Vec<String> = uuid.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        hex[0..4].concat(),
        hex[4..6].concat(),
        hex[6..8].concat(),
        hex[8..10].concat(),
        hex[10..16].concat()
    )
}

fn write_text_common(out: &mut impl Write, cpu: &Cpu, smbios: &Smbios) -> io::Result<()> {
    writeln!(out, "CPU:")?;
    writeln!(out, " {}", cpu.extended_brand_string)?;
    writeln!(out, " Vendor: {}", cpu.vendor)?;
    writeln!(out, " Cores: {}", cpu.logical_processors_count)?;
    writeln!(out, " Hypervisor present: {}", cpu.hypervisor_bit)?;
    writeln!(
        out,
        " Hypervisor signature (if presented): {}",
        cpu.hypervisor_signature
    )?;

    writeln!(out, "Motherboard:")?;
    writeln!(out, " SMBIOS UUID: {}", format_uuid(&smbios.uuid))?;
    writeln!(
        out,
        " SMBIOS Ver: {}.{}",
        smbios.major_version, smbios.minor_version
    )?;
    writeln!(out, " SMBIOS DMI Ver: {}", smbios.dmi_revision)?;
    writeln!(
        out,
        " SMBIOS 2.0 calling convention: {}",
        smbios.is_20_calling_used
    )?;
    Ok(())
}

#[allow(clippy::missing_errors_doc)]
pub fn write_text(out: &mut impl Write, board: &Motherboard) -> io::Result<()> {
    write_text_common(out, &board.cpu, &board.smbios)
}

#[allow(clippy::missing_errors_doc)]
pub fn write_text_ex(out: &mut impl Write, board: &MotherboardEx) -> io::Result<()> {
    write_text_common(out, &board.cpu, &board.smbios)?;

    writeln!(out, "Physical Drives:")?;
    if board.drives.is_empty() {
        writeln!(out, " No drives detected or insufficient permissions")?;
        return Ok(());
    }

    for (i, drive) in board.drives.iter().enumerate() {
        writeln!(out, " Drive {i}")?;
        writeln!(out, "  Device: {}", drive.device_name)?;
        writeln!(out, "  Serial: {}", drive.serial)?;
        writeln!(out, "  Bus Type: {}", drive.bus_type.as_str())?;
    }
    Ok(())
}

fn push_string(buffer: &mut Vec<u8>, s: &str) {
    buffer.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buffer.extend_from_slice(s.as_bytes());
}

fn encode_common(buffer: &mut Vec<u8>, cpu: &Cpu, smbios: &Smbios) {
    push_string(buffer, &cpu.vendor);
    buffer.extend_from_slice(&cpu.version.to_le_bytes());
    buffer.push(u8::from(cpu.hypervisor_bit));
    buffer.push(cpu.brand_index);
    buffer.push(cpu.clflush_line_size);
    buffer.push(cpu.logical_processors_count);
    push_string(buffer, &cpu.extended_brand_string);
    push_string(buffer, &cpu.hypervisor_signature);
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

pub fn encode_binary(board: &Motherboard) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(128);
    encode_common(&mut buffer, &board.cpu, &board.smbios);
    buffer
}

pub fn encode_binary_ex(board: &MotherboardEx) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(256);
    encode_common(&mut buffer, &board.cpu, &board.smbios);

    buffer.extend_from_slice(&(board.drives.len() as u32).to_le_bytes());
    for drive in &board.drives {
        buffer.push(drive.bus_type.tag());
        push_string(&mut buffer, &drive.device_name);
        push_string(&mut buffer, &drive.serial);
    }
    buffer
}

#[allow(clippy::missing_errors_doc)]
pub fn write_binary(out: &mut impl Write, board: &Motherboard) -> io::Result<()> {
    out.write_all(&encode_binary(board))
}

#[allow(clippy::missing_errors_doc)]
pub fn write_binary_ex(out: &mut impl Write, board: &MotherboardEx) -> io::Result<()> {
    out.write_all(&encode_binary_ex(board))
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.pos..self.pos.checked_add(count)?)?;
        self.pos += count;
        Some(slice)
    }

    fn read_u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_string(&mut self) -> Option<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    fn exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

fn decode_common(reader: &mut ByteReader<'_>) -> Option<(Cpu, Smbios)> {
    let vendor = reader.read_string()?;
    let version = reader.read_u32()?;
    let hypervisor_bit = reader.read_u8()? != 0;
    let brand_index = reader.read_u8()?;
    let clflush_line_size = reader.read_u8()?;
    let logical_processors_count = reader.read_u8()?;
    let extended_brand_string = reader.read_string()?;
    let hypervisor_signature = reader.read_string()?;
    let basic = reader.read_u32()?;
    let modern = reader.read_u32()?;
    let extended_modern = [reader.read_u32()?, reader.read_u32()?, reader.read_u32()?];

    let is_20_calling_used = reader.read_u8()? != 0;
    let major_version = reader.read_u8()?;
    let minor_version = reader.read_u8()?;
    let dmi_revision = reader.read_u8()?;
    let mut uuid = [0u8; SMBIOS_UUID_LENGTH];
    uuid.copy_from_slice(reader.take(SMBIOS_UUID_LENGTH)?);

    let cpu = Cpu {
        vendor,
        version,
        brand_index,
        clflush_line_size,
        logical_processors_count,
        apic_id: 0,
        extended_brand_string,
        too_old: false,
        hypervisor_bit,
        hypervisor_signature,
        instruction_set: InstructionSet {
            basic,
            modern,
            extended_modern,
        },
    };
    let smbios = Smbios {
        is_20_calling_used,
        major_version,
        minor_version,
        dmi_revision,
        uuid,
        raw_tables_data: Vec::new(),
    };
    Some((cpu, smbios))
}

pub fn read_binary(data: &[u8]) -> Option<Motherboard> {
    let mut reader = ByteReader::new(data);
    let (cpu, smbios) = decode_common(&mut reader)?;
    reader.exhausted().then_some(Motherboard { cpu, smbios })
}

pub fn read_binary_ex(data: &[u8]) -> Option<MotherboardEx> {
    let mut reader = ByteReader::new(data);
    let (cpu, smbios) = decode_common(&mut reader)?;

    let count = reader.read_u32()? as usize;
    let mut drives = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let bus_type = BusType::from_tag(reader.read_u8()?)?;
        let device_name = reader.read_string()?;
        let serial = reader.read_string()?;
        drives.push(PhysicalDriveInfo {
            device_name,
            serial,
            vendor_id: String::new(),
            product_id: String::new(),
            bus_type,
        });
    }

    reader.exhausted().then_some(MotherboardEx {
        cpu,
        smbios,
        drives,
    })
}

/// Writes the digest only if the sink has room for all of it, reporting
/// bytes written. A short sink gets nothing and `Ok(0)`.
#[allow(clippy::missing_errors_doc)]
pub fn write_hash<const N: usize, W: Write + Seek>(
    sink: &mut W,
    hash: &Hash<N>,
) -> io::Result<usize> {
    let current = sink.stream_position()?;
    let end = sink.seek(SeekFrom::End(0))?;
    sink.seek(SeekFrom::Start(current))?;

    let space = end.saturating_sub(current);
    if space < N as u64 {
        return Ok(0);
    }

    sink.write_all(&hash.buffer)?;
    Ok(N)
}

#[allow(clippy::missing_errors_doc)]
pub fn write_fingerprint<W: Write + Seek>(sink: &mut W, board: &Motherboard) -> io::Result<usize> {
    let digest = DefaultHash.hash(board);
    write_hash(sink, &digest)
}

#[allow(clippy::missing_errors_doc)]
pub fn write_fingerprint_ex<W: Write + Seek>(
    sink: &mut W,
    board: &MotherboardEx,
) -> io::Result<usize> {
    let digest = DefaultHashEx.hash(board);
    write_hash(sink, &digest)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::hash::Hash256;

    fn sample_board() -> MotherboardEx {
        MotherboardEx {
            cpu: Cpu {
                vendor: "AuthenticAMD".to_string(),
                version: 0x00a2_0f10,
                brand_index: 0,
                clflush_line_size: 8,
                logical_processors_count: 24,
                apic_id: 0,
                extended_brand_string: "AMD Ryzen 9 5900X 12-Core Processor".to_string(),
                too_old: false,
                hypervisor_bit: false,
                hypervisor_signature: String::new(),
                instruction_set: InstructionSet {
                    basic: 0x178b_fbff,
                    modern: 0x7ed8_320b,
                    extended_modern: [0x2191_01ab, 0x4005_0cbc, 0],
                },
            },
            smbios: Smbios {
                is_20_calling_used: true,
                major_version: 3,
                minor_version: 3,
                dmi_revision: 0,
                uuid: *b"\xaa\xbb\xcc\xdd\xee\xff\x00\x11\x22\x33\x44\x55\x66\x77\x88\x99",
                raw_tables_data: Vec::new(),
            },
            drives: vec![PhysicalDriveInfo {
                device_name: "/dev/nvme0n1".to_string(),
                serial: "S4EVNF0M824739".to_string(),
                vendor_id: "Samsung".to_string(),
                product_id: "SSD 980 PRO".to_string(),
                bus_type: BusType::Nvme,
            }],
        }
    }

    #[test]
    fn text_report_contains_the_important_fields() {
        let board = sample_board();
        let mut out = Vec::new();
        write_text_ex(&mut out, &board).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("AuthenticAMD"));
        assert!(text.contains("AMD Ryzen 9 5900X"));
        assert!(text.contains("Cores: 24"));
        assert!(text.contains("Hypervisor present: false"));
        assert!(text.contains("aabbccdd-eeff-0011-2233-445566778899"));
        assert!(text.contains("SMBIOS Ver: 3.3"));
        assert!(text.contains("/dev/nvme0n1"));
        assert!(text.contains("S4EVNF0M824739"));
        assert!(text.contains("Bus Type: NVMe"));
    }

    #[test]
    fn text_report_mentions_missing_drives() {
        let mut board = sample_board();
        board.drives.clear();
        let mut out = Vec::new();
        write_text_ex(&mut out, &board).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("No drives detected"));
    }

    #[test]
    fn uuid_renders_dash_grouped() {
        let uuid = [0u8; SMBIOS_UUID_LENGTH];
        assert_eq!(format_uuid(&uuid), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn binary_round_trips_without_drives() {
        let full = sample_board();
        let board = Motherboard {
            cpu: full.cpu.clone(),
            smbios: full.smbios.clone(),
        };
        let encoded = encode_binary(&board);
        let decoded = read_binary(&encoded).unwrap();

        assert_eq!(decoded.cpu.vendor, board.cpu.vendor);
        assert_eq!(decoded.cpu.version, board.cpu.version);
        assert_eq!(decoded.cpu.instruction_set, board.cpu.instruction_set);
        assert_eq!(decoded.smbios.uuid, board.smbios.uuid);
        assert_eq!(decoded.smbios.major_version, board.smbios.major_version);
    }

    #[test]
    fn binary_round_trips_drives() {
        let board = sample_board();
        let encoded = encode_binary_ex(&board);
        let decoded = read_binary_ex(&encoded).unwrap();

        assert_eq!(decoded.drives.len(), 1);
        assert_eq!(decoded.drives[0].device_name, "/dev/nvme0n1");
        assert_eq!(decoded.drives[0].serial, "S4EVNF0M824739");
        assert_eq!(decoded.drives[0].bus_type, BusType::Nvme);
    }

    #[test]
    fn truncated_binary_reads_as_none() {
        let board = sample_board();
        let encoded = encode_binary_ex(&board);
        for cut in 0..encoded.len() {
            assert!(read_binary_ex(&encoded[..cut]).is_none(), "cut {cut}");
        }
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let board = sample_board();
        let mut encoded = encode_binary_ex(&board);
        encoded.push(0x42);
        assert!(read_binary_ex(&encoded).is_none());
    }

    #[test]
    fn hash_write_is_all_or_nothing() {
        let digest = Hash256::from_bytes([0x5a; 32]);

        let mut roomy = Cursor::new(vec![0u8; 64]);
        assert_eq!(write_hash(&mut roomy, &digest).unwrap(), 32);
        assert_eq!(&roomy.get_ref()[..32], &[0x5a; 32]);

        let mut cramped = Cursor::new(vec![0u8; 16]);
        assert_eq!(write_hash(&mut cramped, &digest).unwrap(), 0);
        assert_eq!(cramped.get_ref(), &vec![0u8; 16]);
        assert_eq!(cramped.position(), 0);
    }

    #[test]
    fn hash_write_respects_current_position() {
        let digest = Hash256::from_bytes([0x7e; 32]);
        let mut sink = Cursor::new(vec![0u8; 40]);
        sink.set_position(16);

        // 24 bytes left, not enough for a 32-byte digest.
        assert_eq!(write_hash(&mut sink, &digest).unwrap(), 0);
        assert_eq!(sink.position(), 16);
    }

    #[test]
    fn fingerprint_write_emits_digest_bytes() {
        let board = sample_board();
        let expected = crate::fingerprint::fingerprint_ex(&board);

        let mut sink = Cursor::new(vec![0u8; 32]);
        assert_eq!(write_fingerprint_ex(&mut sink, &board).unwrap(), 32);
        assert_eq!(sink.get_ref().as_slice(), expected.as_bytes());
    }
}
