//! Windows collector: firmware table via `GetSystemFirmwareTable`,
//! drives via `IOCTL_STORAGE_QUERY_PROPERTY`, adapters via
//! `GetAdaptersInfo`. Denied or failing calls degrade to empty data.

use std::ffi::CString;

use tracing::{debug, warn};

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ACCESS_DENIED, ERROR_BUFFER_OVERFLOW, HANDLE,
    INVALID_HANDLE_VALUE, NO_ERROR,
};
use windows_sys::Win32::NetworkManagement::IpHelper::{
    GetAdaptersInfo, IP_ADAPTER_INFO, MIB_IF_TYPE_LOOPBACK,
};
use windows_sys::Win32::NetworkManagement::Ndis::IF_TYPE_TUNNEL;
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileA, QueryDosDeviceA, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::IO::DeviceIoControl;
use windows_sys::Win32::System::Ioctl::{
    BusTypeAta, BusTypeFileBackedVirtual, BusTypeNvme, BusTypeSas, BusTypeSata, BusTypeScsi,
    BusTypeUsb, BusTypeVirtual, PropertyStandardQuery, StorageDeviceProperty,
    IOCTL_STORAGE_QUERY_PROPERTY, STORAGE_DEVICE_DESCRIPTOR, STORAGE_PROPERTY_QUERY,
};
use windows_sys::Win32::System::SystemInformation::GetSystemFirmwareTable;

use crate::collectors::{cpuid, PlatformCollector, SmbiosRawData};
use crate::hwid::{BusType, Cpu, PhysicalDriveInfo};
use crate::vm::{NetworkAdapterInfo, NetworkEvidence};

const RSMB_PROVIDER: u32 = u32::from_be_bytes(*b"RSMB");

// RSMB blob layout: version header, u32 table length, then the table.
const RSMB_LENGTH_OFFSET: usize = 4;
const RSMB_TABLE_DATA_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsCollector;

impl PlatformCollector for WindowsCollector {
    fn snap_cpu(&self) -> Cpu {
        cpuid::snap_cpu()
    }

    #[allow(unsafe_code)]
    fn get_firmware_table(&self) -> SmbiosRawData {
        let size = unsafe { GetSystemFirmwareTable(RSMB_PROVIDER, 0, std::ptr::null_mut(), 0) };
        if size == 0 {
            warn!("GetSystemFirmwareTable 返回空 SMBIOS 表");
            return SmbiosRawData::default();
        }

        let mut buffer = vec![0u8; size as usize];
        let written =
            unsafe { GetSystemFirmwareTable(RSMB_PROVIDER, 0, buffer.as_mut_ptr(), size) };
        if written == 0 || (written as usize) > buffer.len() {
            warn!("GetSystemFirmwareTable 第二次调用失败");
            return SmbiosRawData::default();
        }
        buffer.truncate(written as usize);

        parse_rsmb_blob(&buffer)
    }

    fn list_drives(&self) -> Vec<PhysicalDriveInfo> {
        let mut drives = Vec::new();
        for name in physical_drive_names() {
            match query_drive(&name) {
                Some(info) => drives.push(info),
                None => debug!(drive = %name, "无法查询磁盘属性"),
            }
        }
        drives
    }

    #[allow(unsafe_code)]
    fn list_network_adapters(&self) -> NetworkEvidence {
        let mut buffer_size: u32 = 0;
        let rc = unsafe { GetAdaptersInfo(std::ptr::null_mut(), &mut buffer_size) };
        if rc == ERROR_ACCESS_DENIED {
            return NetworkEvidence::AccessDenied;
        }
        if rc != ERROR_BUFFER_OVERFLOW || buffer_size == 0 {
            warn!(code = rc, "GetAdaptersInfo 预查询失败");
            return NetworkEvidence::AccessDenied;
        }

        let mut buffer = vec![0u8; buffer_size as usize];
        let rc = unsafe {
            GetAdaptersInfo(buffer.as_mut_ptr().cast::<IP_ADAPTER_INFO>(), &mut buffer_size)
        };
        if rc != NO_ERROR {
            warn!(code = rc, "GetAdaptersInfo 失败");
            return NetworkEvidence::AccessDenied;
        }

        let mut adapters = Vec::new();
        let mut current = buffer.as_ptr().cast::<IP_ADAPTER_INFO>();
        while !current.is_null() {
            let adapter = unsafe { std::ptr::read_unaligned(current) };
            adapters.push(NetworkAdapterInfo {
                description: ansi_field_to_string(&adapter.Description),
                is_loopback: adapter.Type == MIB_IF_TYPE_LOOPBACK,
                is_tunnel: adapter.Type == IF_TYPE_TUNNEL,
            });
            current = adapter.Next;
        }

        NetworkEvidence::Adapters(adapters)
    }
}

fn parse_rsmb_blob(buffer: &[u8]) -> SmbiosRawData {
    if buffer.len() < RSMB_TABLE_DATA_OFFSET {
        return SmbiosRawData::default();
    }

    let mut raw = SmbiosRawData {
        used_20_calling_method: buffer[0],
        major_version: buffer[1],
        minor_version: buffer[2],
        dmi_revision: buffer[3],
        table_data: Vec::new(),
    };

    let table_length = u32::from_le_bytes([
        buffer[RSMB_LENGTH_OFFSET],
        buffer[RSMB_LENGTH_OFFSET + 1],
        buffer[RSMB_LENGTH_OFFSET + 2],
        buffer[RSMB_LENGTH_OFFSET + 3],
    ]) as usize;

    if let Some(table) = buffer.get(RSMB_TABLE_DATA_OFFSET..RSMB_TABLE_DATA_OFFSET + table_length) {
        raw.table_data = table.to_vec();
    }

    raw
}

#[allow(unsafe_code)]
fn physical_drive_names() -> Vec<String> {
    let mut buffer = vec![0u8; 65536];
    let count =
        unsafe { QueryDosDeviceA(std::ptr::null(), buffer.as_mut_ptr(), buffer.len() as u32) };
    if count == 0 {
        warn!(code = unsafe { GetLastError() }, "QueryDosDeviceA 失败");
        return Vec::new();
    }

    buffer.truncate(count as usize);
    buffer
        .split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| String::from_utf8_lossy(entry).into_owned())
        .filter(|name| name.starts_with("PhysicalDrive"))
        .collect()
}

#[allow(unsafe_code)]
fn query_drive(drive_name: &str) -> Option<PhysicalDriveInfo> {
    let path = CString::new(format!(r"\\.\{drive_name}")).ok()?;

    let handle: HANDLE = unsafe {
        CreateFileA(
            path.as_ptr().cast::<u8>(),
            0,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            std::ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return None;
    }

    let result = query_storage_descriptor(handle, drive_name);
    unsafe { CloseHandle(handle) };
    result
}

#[allow(unsafe_code)]
fn query_storage_descriptor(handle: HANDLE, drive_name: &str) -> Option<PhysicalDriveInfo> {
    let mut query: STORAGE_PROPERTY_QUERY = unsafe { std::mem::zeroed() };
    query.PropertyId = StorageDeviceProperty;
    query.QueryType = PropertyStandardQuery;

    let mut buffer = vec![0u8; 1024];
    let mut bytes_returned: u32 = 0;

    let ok = unsafe {
        DeviceIoControl(
            handle,
            IOCTL_STORAGE_QUERY_PROPERTY,
            std::ptr::from_ref(&query).cast(),
            std::mem::size_of::<STORAGE_PROPERTY_QUERY>() as u32,
            buffer.as_mut_ptr().cast(),
            buffer.len() as u32,
            &mut bytes_returned,
            std::ptr::null_mut(),
        )
    };
    if ok == 0 || (bytes_returned as usize) < std::mem::size_of::<STORAGE_DEVICE_DESCRIPTOR>() {
        return None;
    }

    let descriptor: STORAGE_DEVICE_DESCRIPTOR =
        unsafe { std::ptr::read_unaligned(buffer.as_ptr().cast()) };

    let bus_type = match descriptor.BusType {
        t if t == BusTypeNvme => BusType::Nvme,
        t if t == BusTypeSata => BusType::Sata,
        t if t == BusTypeUsb => BusType::Usb,
        t if t == BusTypeScsi => BusType::Scsi,
        t if t == BusTypeAta => BusType::Ata,
        t if t == BusTypeSas => BusType::Sas,
        t if t == BusTypeVirtual || t == BusTypeFileBackedVirtual => BusType::Virtual,
        _ => BusType::Other,
    };

    Some(PhysicalDriveInfo {
        device_name: drive_name.to_string(),
        serial: descriptor_string(&buffer, descriptor.SerialNumberOffset),
        vendor_id: descriptor_string(&buffer, descriptor.VendorIdOffset),
        product_id: descriptor_string(&buffer, descriptor.ProductIdOffset),
        bus_type,
    })
}

fn descriptor_string(buffer: &[u8], offset: u32) -> String {
    if offset == 0 {
        return String::new();
    }
    let Some(tail) = buffer.get(offset as usize..) else {
        return String::new();
    };
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..end]).trim().to_string()
}

fn ansi_field_to_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsmb_blob_is_parsed() {
        let mut blob = vec![1u8, 3, 4, 0];
        blob.extend_from_slice(&5u32.to_le_bytes());
        blob.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00]);

        let raw = parse_rsmb_blob(&blob);
        assert_eq!(raw.used_20_calling_method, 1);
        assert_eq!((raw.major_version, raw.minor_version), (3, 4));
        assert_eq!(raw.table_data, [0xde, 0xad, 0xbe, 0xef, 0x00]);
    }

    #[test]
    fn rsmb_blob_with_overrun_length_keeps_no_table() {
        let mut blob = vec![0u8, 2, 7, 0];
        blob.extend_from_slice(&100u32.to_le_bytes());
        blob.extend_from_slice(&[1, 2, 3]);

        let raw = parse_rsmb_blob(&blob);
        assert_eq!((raw.major_version, raw.minor_version), (2, 7));
        assert!(raw.table_data.is_empty());
    }

    #[test]
    fn short_rsmb_blob_is_empty() {
        assert!(parse_rsmb_blob(&[1, 2, 3]).is_empty());
    }

    #[test]
    fn descriptor_string_handles_bad_offsets() {
        let buffer = b"head\0VENDOR \0tail";
        assert_eq!(descriptor_string(buffer, 5), "VENDOR");
        assert_eq!(descriptor_string(buffer, 0), "");
        assert_eq!(descriptor_string(buffer, 999), "");
    }

    #[test]
    fn ansi_field_stops_at_nul() {
        assert_eq!(
            ansi_field_to_string(b"Intel(R) Adapter\0junk"),
            "Intel(R) Adapter"
        );
        assert_eq!(ansi_field_to_string(b"no terminator"), "no terminator");
    }
}
