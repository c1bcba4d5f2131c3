use crate::protocol::CellExtremes;

/// Running cell voltage (V) and temperature (°C) extremes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Extremes {
    pub v_min: Option<f64>,
    pub v_max: Option<f64>,
    pub t_min: Option<f64>,
    pub t_max: Option<f64>,
}

impl Extremes {
    /// The pack controller's own cross-module extremes replace ours.
    pub fn replace(&mut self, frame: &CellExtremes) {
        self.v_min = Some(frame.lowest_voltage);
        self.v_max = Some(frame.highest_voltage);
        self.t_min = Some(frame.lowest_temperature);
        self.t_max = Some(frame.highest_temperature);
    }

    /// Widens the voltage range with a single measurement point.
    pub fn widen_voltage(&mut self, sample: f64) {
        self.v_max = Some(self.v_max.map_or(sample, |v| v.max(sample)));
        self.v_min = Some(self.v_min.map_or(sample, |v| v.min(sample)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(v_low: f64, v_high: f64) -> CellExtremes {
        CellExtremes {
            highest_temperature: 25.0,
            lowest_temperature: 18.5,
            highest_voltage: v_high,
            lowest_voltage: v_low,
        }
    }

    #[test]
    fn replace_narrows() {
        let mut extremes = Extremes::default();
        extremes.replace(&frame(3.1, 3.4));
        extremes.replace(&frame(3.2, 3.3));
        assert_eq!(extremes.v_min, Some(3.2));
        assert_eq!(extremes.v_max, Some(3.3));
        assert_eq!(extremes.t_min, Some(18.5));
        assert_eq!(extremes.t_max, Some(25.0));
    }

    #[test]
    fn widen_only_grows() {
        let mut extremes = Extremes::default();
        extremes.replace(&frame(3.2, 3.3));
        extremes.widen_voltage(3.25);
        assert_eq!(extremes.v_min, Some(3.2));
        assert_eq!(extremes.v_max, Some(3.3));
        extremes.widen_voltage(3.35);
        assert_eq!(extremes.v_max, Some(3.35));
        extremes.widen_voltage(3.15);
        assert_eq!(extremes.v_min, Some(3.15));
        assert!(extremes.v_min <= extremes.v_max);
    }

    #[test]
    fn widen_from_unknown() {
        let mut extremes = Extremes::default();
        extremes.widen_voltage(3.3);
        assert_eq!(extremes.v_min, Some(3.3));
        assert_eq!(extremes.v_max, Some(3.3));
    }
}
