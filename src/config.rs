use crate::watchdog::DEFAULT_THRESHOLD;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Nominal capacity of the pack in Ah.
    pub installed_capacity_ah: f64,
    /// Cells in series; scales the pack voltage down to a cell-level sample.
    pub cells_per_battery: u8,
    pub watchdog_threshold: u32,
    /// Published as both product and custom name.
    pub product_name: String,
    pub device_instance: u32,
}

impl Config {
    pub const DEFAULT_INSTALLED_CAPACITY_AH: f64 = 130.0;
    pub const DEFAULT_CELLS_PER_BATTERY: u8 = 16;
    pub const DEFAULT_PRODUCT_NAME: &'static str = "BMS";
    pub const DEFAULT_DEVICE_INSTANCE: u32 = 40;
    pub const FIRMWARE_VERSION: &'static str = env!("CARGO_PKG_VERSION");
    pub const HARDWARE_VERSION: u8 = 0;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            installed_capacity_ah: Self::DEFAULT_INSTALLED_CAPACITY_AH,
            cells_per_battery: Self::DEFAULT_CELLS_PER_BATTERY,
            watchdog_threshold: DEFAULT_THRESHOLD,
            product_name: Self::DEFAULT_PRODUCT_NAME.to_string(),
            device_instance: Self::DEFAULT_DEVICE_INSTANCE,
        }
    }
}
