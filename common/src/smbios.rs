//! Bounds-checked walker over the raw SMBIOS firmware table.
//!
//! Records are self-describing: a 4-byte header, a formatted area of
//! `length` bytes, then a string table terminated by a double null. A
//! truncated or malformed table yields empty results, never a fault.

pub const UUID_LENGTH: usize = 16;

const HEADER_LENGTH: usize = 4;
const TYPE_SYSTEM_INFORMATION: u8 = 1;
const SYSTEM_INFORMATION_MIN_LENGTH: usize = 24;
const UUID_OFFSET: usize = 8;
const MANUFACTURER_INDEX_OFFSET: usize = 4;

struct Record<'a> {
    record_type: u8,
    formatted: &'a [u8],
    strings: &'a [u8],
}

struct RecordWalker<'a> {
    table: &'a [u8],
    pos: usize,
}

impl<'a> RecordWalker<'a> {
    fn new(table: &'a [u8]) -> Self {
        Self { table, pos: 0 }
    }
}

impl<'a> Iterator for RecordWalker<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Record<'a>> {
        let start = self.pos;
        let header = self.table.get(start..start + HEADER_LENGTH)?;

        let record_type = header[0];
        let length = usize::from(header[1]);
        if length < HEADER_LENGTH {
            return None;
        }

        // A declared length past the buffer end means the table is cut
        // mid-record; stop without touching the bytes.
        let formatted = self.table.get(start..start + length)?;

        let strings_start = start + length;
        let mut cursor = strings_start;
        while cursor + 1 < self.table.len()
            && !(self.table[cursor] == 0 && self.table[cursor + 1] == 0)
        {
            cursor += 1;
        }

        let strings_end = cursor.min(self.table.len());
        let strings = &self.table[strings_start.min(strings_end)..strings_end];

        if cursor + 2 > self.table.len() {
            self.pos = self.table.len();
        } else {
            self.pos = cursor + 2;
        }

        Some(Record {
            record_type,
            formatted,
            strings,
        })
    }
}

fn string_at(strings: &[u8], index: u8) -> Option<String> {
    if index == 0 {
        return None;
    }

    let entry = strings.split(|&b| b == 0).nth(usize::from(index) - 1)?;
    if entry.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(entry).into_owned())
}

pub fn extract_uuid(table: &[u8]) -> Option<[u8; UUID_LENGTH]> {
    RecordWalker::new(table).find_map(|record| {
        if record.record_type != TYPE_SYSTEM_INFORMATION
            || record.formatted.len() < SYSTEM_INFORMATION_MIN_LENGTH
        {
            return None;
        }
        let bytes = record.formatted.get(UUID_OFFSET..UUID_OFFSET + UUID_LENGTH)?;
        let mut uuid = [0u8; UUID_LENGTH];
        uuid.copy_from_slice(bytes);
        Some(uuid)
    })
}

pub fn extract_manufacturer(table: &[u8]) -> String {
    RecordWalker::new(table)
        .find_map(|record| {
            if record.record_type != TYPE_SYSTEM_INFORMATION {
                return None;
            }
            let index = *record.formatted.get(MANUFACTURER_INDEX_OFFSET)?;
            string_at(record.strings, index)
        })
        .unwrap_or_default()
}
