use crate::protocol::Frame;
use crate::state::BatteryState;
use crate::watchdog::Link;
use crate::Config;

/// Input of the run loop: a received bus frame or a periodic tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Frame { id: u32, data: Vec<u8> },
    Tick,
}

/// Owns the battery state and applies frames and ticks to it.
///
/// All mutation goes through `&mut self`, so a caller that owns the controller
/// on a single thread can never observe a half-applied update.
#[derive(Debug)]
pub struct Controller {
    config: Config,
    state: BatteryState,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        let state = BatteryState::new(config.watchdog_threshold);
        Self { config, state }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &BatteryState {
        &self.state
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Frame { id, data } => self.handle_frame(id, &data),
            Event::Tick => {
                self.tick();
            }
        }
    }

    /// Decodes and applies one bus frame.
    ///
    /// Unknown ids and frames shorter than their layout leave the state untouched.
    pub fn handle_frame(&mut self, id: u32, data: &[u8]) {
        if let Ok(Some(frame)) = Frame::decode(id, data) {
            self.apply(&frame);
        }
    }

    pub fn apply(&mut self, frame: &Frame) {
        let state = &mut self.state;
        match frame {
            Frame::SocSoh(soc) => state.set_soc(soc, self.config.installed_capacity_ah),
            Frame::CellExtremes(extremes) => state.extremes.replace(extremes),
            Frame::RequestFlags(flags) => {
                state.request = Some(*flags);
                state.watchdog.feed();
            }
            Frame::Limits(limits) => {
                state.advertised = Some(*limits);
                state.derating.update(limits, &state.extremes);
            }
            Frame::PackStatus(pack) => {
                state.pack = Some(*pack);
                if self.config.cells_per_battery > 0 {
                    state
                        .extremes
                        .widen_voltage(pack.voltage / f64::from(self.config.cells_per_battery));
                }
            }
            Frame::Alarms(flags) => {
                state.alarms.update(flags);
                state.modules_online = Some(flags.module_count);
            }
        }
        self.refresh();
    }

    /// Advances the watchdog by one period and bumps the update index.
    pub fn tick(&mut self) -> Link {
        let link = self.state.watchdog.tick();
        if link == Link::Offline {
            log::error!("BMS offline: {} ticks", self.state.watchdog.ticks());
            self.state.modules_online = Some(0);
        }
        self.refresh();
        self.state.update_index = self.state.update_index.wrapping_add(1);
        link
    }

    fn refresh(&mut self) {
        let previous = self.state.allow;
        self.state.compose_permissions();
        if previous != self.state.allow {
            log::info!(
                "Permissions changed: charge={} discharge={}",
                self.state.allow.charge,
                self.state.allow.discharge
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Permissions;

    const ENABLE_BOTH: [u8; 1] = [0b1100_0000];

    fn limits_frame(charge_deciamps: u16, discharge_deciamps: u16) -> Vec<u8> {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&560u16.to_le_bytes());
        data.extend_from_slice(&charge_deciamps.to_le_bytes());
        data.extend_from_slice(&discharge_deciamps.to_le_bytes());
        data.extend_from_slice(&480u16.to_le_bytes());
        data
    }

    #[test]
    fn all_vetoes_compose() {
        let mut controller = Controller::new(Config::default());
        controller.handle_frame(0x35c, &ENABLE_BOTH);
        // no limits yet
        assert_eq!(controller.state().allow, Permissions::BLOCKED);

        controller.handle_frame(0x351, &limits_frame(400, 1000));
        assert_eq!(controller.state().allow, Permissions::ALLOWED);

        // high temperature warning blocks both
        controller.handle_frame(0x359, &[0, 0, 1 << 3, 0, 1, 0, 0]);
        assert_eq!(controller.state().allow, Permissions::BLOCKED);
        assert_eq!(controller.state().modules_blocking_charge(), 1);
        assert_eq!(controller.state().modules_blocking_discharge(), 1);

        controller.handle_frame(0x359, &[0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(controller.state().allow, Permissions::ALLOWED);
        assert_eq!(controller.state().modules_blocking_charge(), 0);

        // pack withdraws its charge request
        controller.handle_frame(0x35c, &[0b0100_0000]);
        assert_eq!(controller.state().allow, Permissions::new(false, true));
    }

    #[test]
    fn short_frame_leaves_state_untouched() {
        let mut controller = Controller::new(Config::default());
        controller.handle_frame(0x355, &[50, 0, 100]);
        assert_eq!(controller.state().soc, None);
        controller.handle_frame(0x7ff, &[1, 2, 3]);
        assert_eq!(controller.state().soc, None);
    }

    #[test]
    fn pack_voltage_is_scaled_to_cells() {
        let mut controller = Controller::new(Config::default());
        // 0x370 with 3.20 V / 3.25 V
        controller.handle_frame(0x370, &[200, 0, 180, 0, 0xb2, 0x0c, 0x80, 0x0c]);
        // 52.80 V over 16 cells = 3.30 V
        controller.handle_frame(0x356, &[0xa0, 0x14, 0, 0, 200, 0]);
        let extremes = controller.state().extremes;
        assert_eq!(extremes.v_min, Some(3.2));
        assert_eq!(extremes.v_max, Some(3.3));
    }

    #[test]
    fn update_index_wraps() {
        let mut controller = Controller::new(Config::default());
        for _ in 0..256 {
            controller.handle_frame(0x35c, &ENABLE_BOTH);
            controller.handle(Event::Tick);
        }
        assert_eq!(controller.state().update_index, 0);
        controller.tick();
        assert_eq!(controller.state().update_index, 1);
    }
}
