use crate::{Error, Result};

#[cfg(feature = "protocol_serde")]
use serde::{Deserialize, Serialize};

macro_rules! read_bit {
    ($byte:expr,$position:expr) => {
        ($byte >> $position) & 1 != 0
    };
}

fn validate_len(id: u32, data: &[u8], required: usize) -> Result<()> {
    if data.len() < required {
        log::debug!(
            "Dropping frame {id:#05x} - required={required} received={} data={data:02X?}",
            data.len()
        );
        return Err(Error::FrameTooShort {
            id,
            required,
            received: data.len(),
        });
    }
    Ok(())
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

/// State of charge and state of health, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct SocSoh {
    pub soc: u16,
    pub soh: u16,
}

impl SocSoh {
    pub const ID: u32 = 0x355;
    pub const LEN: usize = 4;

    pub fn decode(data: &[u8]) -> Result<Self> {
        validate_len(Self::ID, data, Self::LEN)?;
        Ok(Self {
            soc: read_u16(data, 0),
            soh: read_u16(data, 2),
        })
    }
}

/// Extremes computed by the pack controller across all of its modules.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct CellExtremes {
    pub highest_temperature: f64,
    pub lowest_temperature: f64,
    pub highest_voltage: f64,
    pub lowest_voltage: f64,
}

impl CellExtremes {
    pub const ID: u32 = 0x370;
    pub const LEN: usize = 8;

    pub fn decode(data: &[u8]) -> Result<Self> {
        validate_len(Self::ID, data, Self::LEN)?;
        Ok(Self {
            highest_temperature: f64::from(read_u16(data, 0)) / 10.0,
            lowest_temperature: f64::from(read_u16(data, 2)) / 10.0,
            // cell voltages are reported in millivolts
            highest_voltage: f64::from(read_u16(data, 4)) / 1000.0,
            lowest_voltage: f64::from(read_u16(data, 6)) / 1000.0,
        })
    }
}

/// Request flags, also the heartbeat of the pack controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct RequestFlags {
    pub full_charge: bool,
    pub force_charge_2: bool,
    pub force_charge_1: bool,
    pub enable_discharge: bool,
    pub enable_charge: bool,
}

impl RequestFlags {
    pub const ID: u32 = 0x35c;
    pub const LEN: usize = 1;

    pub fn decode(data: &[u8]) -> Result<Self> {
        validate_len(Self::ID, data, Self::LEN)?;
        Ok(Self {
            full_charge: read_bit!(data[0], 3),
            force_charge_2: read_bit!(data[0], 4),
            force_charge_1: read_bit!(data[0], 5),
            enable_discharge: read_bit!(data[0], 6),
            enable_charge: read_bit!(data[0], 7),
        })
    }
}

/// Voltage and current limits advertised by the pack controller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct Limits {
    pub charge_voltage: f64,
    pub charge_current: f64,
    pub discharge_current: f64,
    pub discharge_voltage: f64,
}

impl Limits {
    pub const ID: u32 = 0x351;
    pub const LEN: usize = 8;

    pub fn decode(data: &[u8]) -> Result<Self> {
        validate_len(Self::ID, data, Self::LEN)?;
        Ok(Self {
            charge_voltage: f64::from(read_u16(data, 0)) / 10.0,
            charge_current: f64::from(read_u16(data, 2)) / 10.0,
            discharge_current: f64::from(read_u16(data, 4)) / 10.0,
            discharge_voltage: f64::from(read_u16(data, 6)) / 10.0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct PackStatus {
    pub voltage: f64,
    pub current: f64, // positive=charging, negative=discharging
    pub temperature: f64,
}

impl PackStatus {
    pub const ID: u32 = 0x356;
    pub const LEN: usize = 6;

    pub fn decode(data: &[u8]) -> Result<Self> {
        validate_len(Self::ID, data, Self::LEN)?;
        Ok(Self {
            voltage: f64::from(read_u16(data, 0)) / 100.0,
            current: f64::from(read_i16(data, 2)) / 10.0,
            temperature: f64::from(read_u16(data, 4)) / 10.0,
        })
    }

    pub fn power(&self) -> f64 {
        self.voltage * self.current
    }
}

/// Raw protection and warning bit fields.
///
/// Byte 0 and 2 land in the low byte, byte 1 and 3 in the high byte of
/// `protection` respectively `warning`, so both share the same bit positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub struct AlarmFlags {
    pub protection: u16,
    pub warning: u16,
    pub module_count: u8,
}

impl AlarmFlags {
    pub const ID: u32 = 0x359;
    pub const LEN: usize = 7;

    pub fn decode(data: &[u8]) -> Result<Self> {
        validate_len(Self::ID, data, Self::LEN)?;
        Ok(Self {
            protection: read_u16(data, 0),
            warning: read_u16(data, 2),
            module_count: data[4],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub enum Frame {
    SocSoh(SocSoh),
    CellExtremes(CellExtremes),
    RequestFlags(RequestFlags),
    Limits(Limits),
    PackStatus(PackStatus),
    Alarms(AlarmFlags),
}

impl Frame {
    /// Decodes a frame by its arbitration id.
    ///
    /// Unknown ids yield `Ok(None)`, frames shorter than their layout
    /// yield [`Error::FrameTooShort`].
    pub fn decode(id: u32, data: &[u8]) -> Result<Option<Self>> {
        let frame = match id {
            SocSoh::ID => Self::SocSoh(SocSoh::decode(data)?),
            CellExtremes::ID => Self::CellExtremes(CellExtremes::decode(data)?),
            RequestFlags::ID => Self::RequestFlags(RequestFlags::decode(data)?),
            Limits::ID => Self::Limits(Limits::decode(data)?),
            PackStatus::ID => Self::PackStatus(PackStatus::decode(data)?),
            AlarmFlags::ID => Self::Alarms(AlarmFlags::decode(data)?),
            _ => {
                log::trace!("Ignoring unknown frame {id:#05x}");
                return Ok(None);
            }
        };
        log::trace!("Decoded frame {id:#05x}: {frame:?}");
        Ok(Some(frame))
    }
}
