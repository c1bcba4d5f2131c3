use std::fmt;

use crate::protocol::AlarmFlags;
use crate::state::Permissions;

#[cfg(feature = "protocol_serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub enum Severity {
    #[default]
    None = 0,
    Warning = 1,
    Protection = 2,
}

impl Severity {
    /// Protection always dominates warning.
    pub fn from_bits(protection: bool, warning: bool) -> Self {
        if protection {
            Severity::Protection
        } else if warning {
            Severity::Warning
        } else {
            Severity::None
        }
    }

    pub fn is_active(self) -> bool {
        self != Severity::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "protocol_serde", derive(Serialize, Deserialize))]
pub enum AlarmKind {
    LowVoltage,
    HighVoltage,
    HighChargeCurrent,
    HighDischargeCurrent,
    HighTemperature,
    LowTemperature,
    InternalFailure,
}

impl AlarmKind {
    pub const ALL: [AlarmKind; 7] = [
        AlarmKind::LowVoltage,
        AlarmKind::HighVoltage,
        AlarmKind::HighChargeCurrent,
        AlarmKind::HighDischargeCurrent,
        AlarmKind::HighTemperature,
        AlarmKind::LowTemperature,
        AlarmKind::InternalFailure,
    ];

    /// Bit position inside [`AlarmFlags::protection`] and [`AlarmFlags::warning`].
    pub const fn mask(self) -> u16 {
        match self {
            AlarmKind::HighVoltage => 1 << 1,
            AlarmKind::LowVoltage => 1 << 2,
            AlarmKind::HighTemperature => 1 << 3,
            AlarmKind::LowTemperature => 1 << 4,
            AlarmKind::HighDischargeCurrent => 1 << 7,
            AlarmKind::HighChargeCurrent => 1 << 8,
            AlarmKind::InternalFailure => 1 << 11,
        }
    }

    /// Permissions left over while this alarm is active.
    pub const fn permits(self) -> Permissions {
        match self {
            AlarmKind::LowVoltage | AlarmKind::HighDischargeCurrent => {
                Permissions::new(true, false)
            }
            AlarmKind::HighVoltage | AlarmKind::HighChargeCurrent | AlarmKind::LowTemperature => {
                Permissions::new(false, true)
            }
            AlarmKind::HighTemperature | AlarmKind::InternalFailure => Permissions::BLOCKED,
        }
    }
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlarmKind::LowVoltage => write!(f, "Cell voltage too low"),
            AlarmKind::HighVoltage => write!(f, "Cell voltage too high"),
            AlarmKind::HighChargeCurrent => write!(f, "Charge over current"),
            AlarmKind::HighDischargeCurrent => write!(f, "Discharge over current"),
            AlarmKind::HighTemperature => write!(f, "Cell temperature too high"),
            AlarmKind::LowTemperature => write!(f, "Cell temperature too low"),
            AlarmKind::InternalFailure => write!(f, "Internal failure"),
        }
    }
}

/// Per-class severities of the last alarm frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alarms {
    severities: [Severity; 7],
}

impl Alarms {
    pub fn severity(&self, kind: AlarmKind) -> Severity {
        self.severities[kind as usize]
    }

    pub fn update(&mut self, flags: &AlarmFlags) {
        for kind in AlarmKind::ALL {
            let severity = Severity::from_bits(
                flags.protection & kind.mask() != 0,
                flags.warning & kind.mask() != 0,
            );
            let previous = std::mem::replace(&mut self.severities[kind as usize], severity);
            if previous != severity {
                match severity {
                    Severity::Protection => log::error!("{kind}: protection"),
                    Severity::Warning => log::warn!("{kind}: warning"),
                    Severity::None => log::info!("{kind}: cleared"),
                }
            }
        }
    }

    /// Any non-`None` severity vetoes the permissions of its class.
    pub fn permissions(&self) -> Permissions {
        AlarmKind::ALL
            .into_iter()
            .filter(|kind| self.severity(*kind).is_active())
            .fold(Permissions::ALLOWED, |acc, kind| acc.and(kind.permits()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(protection: u16, warning: u16) -> AlarmFlags {
        AlarmFlags {
            protection,
            warning,
            module_count: 1,
        }
    }

    #[test]
    fn protection_dominates_warning() {
        assert_eq!(Severity::from_bits(true, true), Severity::Protection);
        assert_eq!(Severity::from_bits(true, false), Severity::Protection);
        assert_eq!(Severity::from_bits(false, true), Severity::Warning);
        assert_eq!(Severity::from_bits(false, false), Severity::None);

        let mut alarms = Alarms::default();
        for kind in AlarmKind::ALL {
            alarms.update(&flags(kind.mask(), kind.mask()));
            assert_eq!(alarms.severity(kind), Severity::Protection, "{kind:?}");
        }
    }

    #[test]
    fn no_bits_no_alarms() {
        let mut alarms = Alarms::default();
        alarms.update(&flags(0, 0));
        for kind in AlarmKind::ALL {
            assert_eq!(alarms.severity(kind), Severity::None);
        }
        assert_eq!(alarms.permissions(), Permissions::ALLOWED);
    }

    #[test]
    fn undervoltage_blocks_discharge() {
        let mut alarms = Alarms::default();
        alarms.update(&flags(1 << 2, 0));
        assert_eq!(alarms.severity(AlarmKind::LowVoltage), Severity::Protection);
        assert_eq!(alarms.permissions(), Permissions::new(true, false));
    }

    #[test]
    fn warning_vetoes_too() {
        let mut alarms = Alarms::default();
        alarms.update(&flags(0, 1 << 1));
        assert_eq!(alarms.severity(AlarmKind::HighVoltage), Severity::Warning);
        assert_eq!(alarms.permissions(), Permissions::new(false, true));
    }

    #[test]
    fn class_effects() {
        for (kind, expected) in [
            (AlarmKind::LowVoltage, Permissions::new(true, false)),
            (AlarmKind::HighVoltage, Permissions::new(false, true)),
            (AlarmKind::HighChargeCurrent, Permissions::new(false, true)),
            (AlarmKind::HighDischargeCurrent, Permissions::new(true, false)),
            (AlarmKind::HighTemperature, Permissions::BLOCKED),
            (AlarmKind::LowTemperature, Permissions::new(false, true)),
            (AlarmKind::InternalFailure, Permissions::BLOCKED),
        ] {
            let mut alarms = Alarms::default();
            alarms.update(&flags(kind.mask(), 0));
            assert_eq!(alarms.permissions(), expected, "{kind:?}");
        }
    }

    #[test]
    fn bit_positions() {
        let mut alarms = Alarms::default();
        // byte1 bit3 system error, byte3 bit0 charge current warning
        alarms.update(&flags(0x0800, 0x0100));
        assert_eq!(
            alarms.severity(AlarmKind::InternalFailure),
            Severity::Protection
        );
        assert_eq!(
            alarms.severity(AlarmKind::HighChargeCurrent),
            Severity::Warning
        );
        // byte0 bit7 discharge over current
        alarms.update(&flags(0x0080, 0));
        assert_eq!(
            alarms.severity(AlarmKind::HighDischargeCurrent),
            Severity::Protection
        );
        assert_eq!(alarms.severity(AlarmKind::InternalFailure), Severity::None);
    }
}
