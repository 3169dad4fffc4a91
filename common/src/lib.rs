#![allow(missing_docs)]

pub mod collectors;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod hwid;
pub mod io;
pub mod smbios;
pub mod telemetry;
pub mod vm;

pub use config::WardenConfig;
pub use error::WardenError;
pub use hwid::{Motherboard, MotherboardEx, snap_motherboard, snap_motherboard_ex};
