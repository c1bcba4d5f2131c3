/// Default number of ticks without a request flags frame before the pack is offline.
pub const DEFAULT_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Online,
    Offline,
}

/// Liveness monitor fed by the request flags frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watchdog {
    ticks: u32,
    threshold: u32,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Watchdog {
    pub const fn new(threshold: u32) -> Self {
        Self { ticks: 0, threshold }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn link(&self) -> Link {
        if self.ticks > self.threshold {
            Link::Offline
        } else {
            Link::Online
        }
    }

    pub fn is_online(&self) -> bool {
        self.link() == Link::Online
    }

    pub fn feed(&mut self) {
        if !self.is_online() {
            log::info!("BMS back online after {} ticks", self.ticks);
        }
        self.ticks = 0;
    }

    /// Counts one period of silence and returns the resulting link state.
    pub fn tick(&mut self) -> Link {
        self.ticks = self.ticks.saturating_add(1);
        self.link()
    }
}
