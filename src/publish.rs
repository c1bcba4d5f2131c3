//! The published battery state.
//!
//! Every value the daemon exposes has a fixed [`Path`]. The core hands out raw
//! [`Value`]s only; turning them into human readable text is done at the sink
//! boundary through [`Path::format`].

use std::collections::HashMap;
use std::fmt;

use crate::alarms::{AlarmKind, Severity};
use crate::{BatteryState, Config, Result};

#[cfg(feature = "protocol_serde")]
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize), serde(untagged))]
pub enum Value {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Value::Empty, Value::Float)
    }
}

impl From<Option<u16>> for Value {
    fn from(value: Option<u16>) -> Self {
        value.map_or(Value::Empty, |v| Value::Int(i64::from(v)))
    }
}

impl From<Option<u8>> for Value {
    fn from(value: Option<u8>) -> Self {
        value.map_or(Value::Empty, |v| Value::Int(i64::from(v)))
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<Severity> for Value {
    fn from(value: Severity) -> Self {
        Value::Int(value as i64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Percent,
    AmpHours,
    Volts,
    MilliVolts,
    Amps,
    Watts,
    Celsius,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Path {
    ProductName,
    CustomName,
    DeviceInstance,
    FirmwareVersion,
    HardwareVersion,
    Soc,
    Soh,
    Capacity,
    InstalledCapacity,
    MinCellVoltage,
    MaxCellVoltage,
    MinCellTemperature,
    MaxCellTemperature,
    CellsPerBattery,
    ModulesOnline,
    ModulesOffline,
    ModulesBlockingCharge,
    ModulesBlockingDischarge,
    DcVoltage,
    DcCurrent,
    DcPower,
    DcTemperature,
    BatteryLowVoltage,
    MaxChargeVoltage,
    MaxChargeCurrent,
    MaxDischargeCurrent,
    AllowToCharge,
    AllowToDischarge,
    SystemSwitch,
    Alarm(AlarmKind),
    Connected,
    UpdateIndex,
}

impl Path {
    pub fn as_str(&self) -> &'static str {
        match self {
            Path::ProductName => "/ProductName",
            Path::CustomName => "/CustomName",
            Path::DeviceInstance => "/DeviceInstance",
            Path::FirmwareVersion => "/FirmwareVersion",
            Path::HardwareVersion => "/HardwareVersion",
            Path::Soc => "/Soc",
            Path::Soh => "/Soh",
            Path::Capacity => "/Capacity",
            Path::InstalledCapacity => "/InstalledCapacity",
            Path::MinCellVoltage => "/System/MinCellVoltage",
            Path::MaxCellVoltage => "/System/MaxCellVoltage",
            Path::MinCellTemperature => "/System/MinCellTemperature",
            Path::MaxCellTemperature => "/System/MaxCellTemperature",
            Path::CellsPerBattery => "/System/NrOfCellsPerBattery",
            Path::ModulesOnline => "/System/NrOfModulesOnline",
            Path::ModulesOffline => "/System/NrOfModulesOffline",
            Path::ModulesBlockingCharge => "/System/NrOfModulesBlockingCharge",
            Path::ModulesBlockingDischarge => "/System/NrOfModulesBlockingDischarge",
            Path::DcVoltage => "/Dc/0/Voltage",
            Path::DcCurrent => "/Dc/0/Current",
            Path::DcPower => "/Dc/0/Power",
            Path::DcTemperature => "/Dc/0/Temperature",
            Path::BatteryLowVoltage => "/Info/BatteryLowVoltage",
            Path::MaxChargeVoltage => "/Info/MaxChargeVoltage",
            Path::MaxChargeCurrent => "/Info/MaxChargeCurrent",
            Path::MaxDischargeCurrent => "/Info/MaxDischargeCurrent",
            Path::AllowToCharge => "/Io/AllowToCharge",
            Path::AllowToDischarge => "/Io/AllowToDischarge",
            Path::SystemSwitch => "/SystemSwitch",
            Path::Alarm(AlarmKind::LowVoltage) => "/Alarms/LowVoltage",
            Path::Alarm(AlarmKind::HighVoltage) => "/Alarms/HighVoltage",
            Path::Alarm(AlarmKind::HighChargeCurrent) => "/Alarms/HighChargeCurrent",
            Path::Alarm(AlarmKind::HighDischargeCurrent) => "/Alarms/HighDischargeCurrent",
            Path::Alarm(AlarmKind::HighTemperature) => "/Alarms/HighTemperature",
            Path::Alarm(AlarmKind::LowTemperature) => "/Alarms/LowTemperature",
            Path::Alarm(AlarmKind::InternalFailure) => "/Alarms/InternalFailure",
            Path::Connected => "/Connected",
            Path::UpdateIndex => "/UpdateIndex",
        }
    }

    fn unit(&self) -> Unit {
        match self {
            Path::Soc | Path::Soh => Unit::Percent,
            Path::Capacity | Path::InstalledCapacity => Unit::AmpHours,
            Path::MinCellVoltage | Path::MaxCellVoltage => Unit::MilliVolts,
            Path::MinCellTemperature | Path::MaxCellTemperature | Path::DcTemperature => {
                Unit::Celsius
            }
            Path::DcVoltage | Path::BatteryLowVoltage | Path::MaxChargeVoltage => Unit::Volts,
            Path::DcCurrent | Path::MaxChargeCurrent | Path::MaxDischargeCurrent => Unit::Amps,
            Path::DcPower => Unit::Watts,
            _ => Unit::Count,
        }
    }

    /// Presentation text of `value` for this path.
    pub fn format(&self, value: &Value) -> String {
        let v = match value {
            Value::Empty => return String::new(),
            Value::Text(text) => return text.clone(),
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
        };
        match self.unit() {
            Unit::Percent => format!("{v:.1} %"),
            Unit::AmpHours => format!("{v:.1} Ah"),
            Unit::Volts => format!("{v:.1} V"),
            Unit::MilliVolts => format!("{:.0} mV", v * 1000.0),
            Unit::Amps => format!("{v:.1} A"),
            Unit::Watts => format!("{v:.1} W"),
            Unit::Celsius => format!("{v:.1} °C"),
            Unit::Count => value.to_string(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattens the battery state into its published paths.
pub fn snapshot(state: &BatteryState, config: &Config) -> Vec<(Path, Value)> {
    let pack = state.pack.as_ref();
    let advertised = state.advertised.as_ref();
    let mut entries: Vec<(Path, Value)> = vec![
        (Path::ProductName, config.product_name.as_str().into()),
        (Path::CustomName, config.product_name.as_str().into()),
        (Path::DeviceInstance, config.device_instance.into()),
        (Path::FirmwareVersion, Config::FIRMWARE_VERSION.into()),
        (Path::HardwareVersion, Config::HARDWARE_VERSION.into()),
        (Path::Soc, state.soc.into()),
        (Path::Soh, state.soh.into()),
        (Path::Capacity, state.capacity_ah.into()),
        (
            Path::InstalledCapacity,
            Value::Float(config.installed_capacity_ah),
        ),
        (Path::MinCellVoltage, state.extremes.v_min.into()),
        (Path::MaxCellVoltage, state.extremes.v_max.into()),
        (Path::MinCellTemperature, state.extremes.t_min.into()),
        (Path::MaxCellTemperature, state.extremes.t_max.into()),
        (Path::CellsPerBattery, config.cells_per_battery.into()),
        (Path::ModulesOnline, state.modules_online.into()),
        (Path::ModulesOffline, state.modules_offline().into()),
        (
            Path::ModulesBlockingCharge,
            state.modules_blocking_charge().into(),
        ),
        (
            Path::ModulesBlockingDischarge,
            state.modules_blocking_discharge().into(),
        ),
        (Path::DcVoltage, pack.map(|p| p.voltage).into()),
        (Path::DcCurrent, pack.map(|p| p.current).into()),
        (Path::DcPower, pack.map(|p| p.power()).into()),
        (Path::DcTemperature, pack.map(|p| p.temperature).into()),
        (
            Path::BatteryLowVoltage,
            advertised.map(|l| l.discharge_voltage).into(),
        ),
        (
            Path::MaxChargeVoltage,
            advertised.map(|l| l.charge_voltage).into(),
        ),
        (Path::MaxChargeCurrent, state.derating.ccl.into()),
        (Path::MaxDischargeCurrent, state.derating.dcl.into()),
        (Path::AllowToCharge, state.allow.charge.into()),
        (Path::AllowToDischarge, state.allow.discharge.into()),
        (Path::SystemSwitch, state.system_switch().into()),
    ];
    entries.extend(
        AlarmKind::ALL
            .into_iter()
            .map(|kind| (Path::Alarm(kind), state.alarms.severity(kind).into())),
    );
    entries.push((Path::Connected, state.watchdog.is_online().into()));
    entries.push((Path::UpdateIndex, state.update_index.into()));
    entries
}

/// Destination of the published battery state.
pub trait StateSink {
    fn write(&mut self, path: Path, value: &Value) -> Result<()>;

    /// Called once after every publish cycle.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Forwards only the paths whose value changed since the last cycle.
#[derive(Debug)]
pub struct Publisher<S> {
    sink: S,
    published: HashMap<Path, Value>,
}

impl<S: StateSink> Publisher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            published: HashMap::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Writes the changed entries and returns how many were written.
    ///
    /// Entries only count as published once the sink flushed them, so after
    /// any sink error the whole change set is retried on the next cycle.
    pub fn publish(&mut self, entries: &[(Path, Value)]) -> Result<usize> {
        let changed: Vec<&(Path, Value)> = entries
            .iter()
            .filter(|(path, value)| self.published.get(path) != Some(value))
            .collect();
        for (path, value) in &changed {
            self.sink.write(*path, value)?;
        }
        self.sink.flush()?;
        for (path, value) in &changed {
            self.published.insert(*path, value.clone());
        }
        Ok(changed.len())
    }
}
