use crate::alarms::Alarms;
use crate::derating::Derating;
use crate::extremes::Extremes;
use crate::protocol::{Limits, PackStatus, RequestFlags, SocSoh};
use crate::watchdog::Watchdog;

/// Charge and discharge permission pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub charge: bool,
    pub discharge: bool,
}

impl Permissions {
    pub const ALLOWED: Self = Self {
        charge: true,
        discharge: true,
    };
    pub const BLOCKED: Self = Self {
        charge: false,
        discharge: false,
    };

    pub const fn new(charge: bool, discharge: bool) -> Self {
        Self { charge, discharge }
    }

    /// Both flags survive only if both sides allow them.
    pub const fn and(self, other: Self) -> Self {
        Self {
            charge: self.charge && other.charge,
            discharge: self.discharge && other.discharge,
        }
    }
}

impl From<&RequestFlags> for Permissions {
    fn from(flags: &RequestFlags) -> Self {
        Self::new(flags.enable_charge, flags.enable_discharge)
    }
}

/// Everything known about the battery pack.
///
/// Measured fields start out as `None` and are filled in by the frame handlers.
#[derive(Debug, Clone)]
pub struct BatteryState {
    pub soc: Option<u16>,
    pub soh: Option<u16>,
    pub capacity_ah: Option<f64>,
    pub extremes: Extremes,
    pub pack: Option<PackStatus>,
    pub advertised: Option<Limits>,
    pub derating: Derating,
    pub request: Option<RequestFlags>,
    pub alarms: Alarms,
    pub modules_online: Option<u8>,
    pub watchdog: Watchdog,
    /// Composed result of the request, alarm, limit and watchdog vetoes.
    pub allow: Permissions,
    pub update_index: u8,
}

impl BatteryState {
    pub fn new(watchdog_threshold: u32) -> Self {
        Self {
            soc: None,
            soh: None,
            capacity_ah: None,
            extremes: Extremes::default(),
            pack: None,
            advertised: None,
            derating: Derating::default(),
            request: None,
            alarms: Alarms::default(),
            modules_online: None,
            watchdog: Watchdog::new(watchdog_threshold),
            allow: Permissions::BLOCKED,
            update_index: 0,
        }
    }

    pub fn set_soc(&mut self, frame: &SocSoh, installed_capacity_ah: f64) {
        self.soc = Some(frame.soc);
        self.soh = Some(frame.soh);
        self.capacity_ah = Some(installed_capacity_ah * f64::from(frame.soc) / 100.0);
    }

    /// Recomputes the published permissions from every independent veto.
    pub fn compose_permissions(&mut self) {
        let requested = self
            .request
            .as_ref()
            .map_or(Permissions::BLOCKED, Permissions::from);
        let online = if self.watchdog.is_online() {
            Permissions::ALLOWED
        } else {
            Permissions::BLOCKED
        };
        self.allow = requested
            .and(self.alarms.permissions())
            .and(self.derating.permissions())
            .and(online);
    }

    /// Pack switched on by its controller and still talking to us.
    pub fn system_switch(&self) -> bool {
        self.watchdog.is_online()
            && self
                .request
                .is_some_and(|r| r.enable_charge && r.enable_discharge)
    }

    pub fn modules_offline(&self) -> u8 {
        u8::from(!self.watchdog.is_online())
    }

    pub fn modules_blocking_charge(&self) -> u8 {
        u8::from(!self.allow.charge)
    }

    pub fn modules_blocking_discharge(&self) -> u8 {
        u8::from(!self.allow.discharge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_blocked() {
        let state = BatteryState::new(10);
        assert_eq!(state.soc, None);
        assert_eq!(state.extremes.v_max, None);
        assert_eq!(state.allow, Permissions::BLOCKED);
        assert!(!state.system_switch());
    }

    #[test]
    fn capacity_follows_soc() {
        let mut state = BatteryState::new(10);
        state.set_soc(&SocSoh { soc: 50, soh: 100 }, 130.0);
        assert_eq!(state.capacity_ah, Some(65.0));
        state.set_soc(&SocSoh { soc: 0, soh: 100 }, 130.0);
        assert_eq!(state.capacity_ah, Some(0.0));
    }

    #[test]
    fn permissions_and() {
        let p = Permissions::new(true, false).and(Permissions::new(true, true));
        assert_eq!(p, Permissions::new(true, false));
        assert_eq!(
            Permissions::ALLOWED.and(Permissions::BLOCKED),
            Permissions::BLOCKED
        );
    }
}
