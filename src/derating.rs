//! Charge/discharge current limits (CCL/DCL).
//!
//! The advertised limits of every 0x351 frame are folded against the cell
//! voltage extremes. Each staircase step can only tighten the limit computed
//! so far, and the charge limit may rise by at most [`RAMP_STEP`] per frame.

use crate::extremes::Extremes;
use crate::protocol::Limits;
use crate::state::Permissions;

/// Global charge current cap in amps.
pub const CHARGE_CURRENT_CAP: f64 = 35.0;

/// Maximum increase of the charge limit between two 0x351 frames, in amps.
pub const RAMP_STEP: f64 = 1.0;

/// `(v_max threshold, charge limit)`, loosest first.
const CHARGE_STAIRCASE: [(f64, f64); 12] = [
    (3.45, 20.0),
    (3.46, 15.0),
    (3.47, 10.0),
    (3.48, 5.0),
    (3.49, 4.0),
    (3.50, 3.0),
    (3.51, 2.0),
    (3.53, 1.5),
    (3.54, 1.0),
    (3.57, 0.5),
    (3.58, 0.0),
    (3.60, 0.0),
];

/// `(v_min threshold, discharge limit)`, loosest first.
const DISCHARGE_STAIRCASE: [(f64, f64); 5] = [
    (3.10, 12.0),
    (3.00, 7.0),
    (2.90, 4.0),
    (2.80, 2.0),
    (2.70, 0.0),
];

/// Charge limit before ramp limiting.
pub fn charge_limit(advertised: f64, v_max: Option<f64>) -> f64 {
    let mut ccl = advertised.min(CHARGE_CURRENT_CAP);
    if let Some(v_max) = v_max {
        for (threshold, limit) in CHARGE_STAIRCASE {
            if v_max >= threshold {
                ccl = ccl.min(limit);
            }
        }
    }
    ccl.max(0.0)
}

pub fn discharge_limit(advertised: f64, v_min: Option<f64>) -> f64 {
    let mut dcl = advertised;
    if let Some(v_min) = v_min {
        for (threshold, limit) in DISCHARGE_STAIRCASE {
            if v_min <= threshold {
                dcl = dcl.min(limit);
            }
        }
    }
    dcl.max(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Derating {
    /// `None` until the first 0x351 frame arrived.
    pub ccl: Option<f64>,
    pub dcl: Option<f64>,
    pub previous_ccl: f64,
    pub previous_dcl: f64,
}

impl Derating {
    /// Runs one control cycle and returns the new `(ccl, dcl)`.
    pub fn update(&mut self, limits: &Limits, extremes: &Extremes) -> (f64, f64) {
        let derated = charge_limit(limits.charge_current, extremes.v_max);
        let ccl = derated.min(self.previous_ccl + RAMP_STEP);
        let dcl = discharge_limit(limits.discharge_current, extremes.v_min);

        if ccl < limits.charge_current || dcl < limits.discharge_current {
            log::debug!(
                "Derating: advertised={}A/{}A v_max={:?} v_min={:?} ccl={ccl}A dcl={dcl}A",
                limits.charge_current,
                limits.discharge_current,
                extremes.v_max,
                extremes.v_min
            );
        }

        self.ccl = Some(ccl);
        self.dcl = Some(dcl);
        self.previous_ccl = ccl;
        self.previous_dcl = dcl;
        (ccl, dcl)
    }

    /// A limit of zero, or no limit at all yet, vetoes that direction.
    pub fn permissions(&self) -> Permissions {
        Permissions::new(
            self.ccl.is_some_and(|ccl| ccl > 0.0),
            self.dcl.is_some_and(|dcl| dcl > 0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(charge_current: f64, discharge_current: f64) -> Limits {
        Limits {
            charge_voltage: 56.0,
            charge_current,
            discharge_current,
            discharge_voltage: 48.0,
        }
    }

    fn extremes(v_min: f64, v_max: f64) -> Extremes {
        Extremes {
            v_min: Some(v_min),
            v_max: Some(v_max),
            t_min: Some(20.0),
            t_max: Some(22.0),
        }
    }

    #[test]
    fn global_cap() {
        assert_eq!(charge_limit(40.0, Some(3.3)), 35.0);
        assert_eq!(charge_limit(12.5, Some(3.3)), 12.5);
        assert_eq!(charge_limit(80.0, None), 35.0);
    }

    #[test]
    fn charge_staircase_steps() {
        for (v_max, expected) in [
            (3.44, 35.0),
            (3.45, 20.0),
            (3.46, 15.0),
            (3.47, 10.0),
            (3.48, 5.0),
            (3.49, 4.0),
            (3.50, 3.0),
            (3.51, 2.0),
            (3.52, 2.0),
            (3.53, 1.5),
            (3.54, 1.0),
            (3.56, 1.0),
            (3.57, 0.5),
            (3.58, 0.0),
            (3.65, 0.0),
        ] {
            assert_eq!(charge_limit(100.0, Some(v_max)), expected, "v_max={v_max}");
        }
    }

    #[test]
    fn charge_staircase_never_loosens() {
        let mut previous = f64::MAX;
        for mv in 3300..3700 {
            let ccl = charge_limit(40.0, Some(f64::from(mv) / 1000.0));
            assert!(ccl <= previous, "ccl rose at {mv}mV");
            previous = ccl;
        }
    }

    #[test]
    fn discharge_staircase_steps() {
        for (v_min, expected) in [
            (3.2, 100.0),
            (3.1, 12.0),
            (3.0, 7.0),
            (2.9, 4.0),
            (2.85, 4.0),
            (2.8, 2.0),
            (2.7, 0.0),
            (2.5, 0.0),
        ] {
            assert_eq!(discharge_limit(100.0, Some(v_min)), expected, "v_min={v_min}");
        }
        // never raises a lower advertised limit
        assert_eq!(discharge_limit(5.0, Some(3.05)), 5.0);
    }

    #[test]
    fn ramp_up_from_zero() {
        let mut derating = Derating::default();
        let (ccl, dcl) = derating.update(&limits(40.0, 100.0), &extremes(3.2, 3.5));
        assert_eq!(ccl, 1.0);
        assert_eq!(dcl, 100.0);
        assert_eq!(derating.previous_ccl, 1.0);
    }

    #[test]
    fn ramp_climbs_one_amp_per_cycle() {
        let mut derating = Derating::default();
        for expected in 1..=10 {
            let (ccl, _) = derating.update(&limits(10.0, 100.0), &extremes(3.2, 3.3));
            assert_eq!(ccl, f64::from(expected.min(10)));
        }
        let (ccl, _) = derating.update(&limits(10.0, 100.0), &extremes(3.2, 3.3));
        assert_eq!(ccl, 10.0);
    }

    #[test]
    fn ramp_does_not_limit_falling_edge() {
        let mut derating = Derating {
            previous_ccl: 30.0,
            ..Default::default()
        };
        let (ccl, _) = derating.update(&limits(40.0, 100.0), &extremes(3.2, 3.58));
        assert_eq!(ccl, 0.0);
        assert_eq!(derating.permissions(), Permissions::new(false, true));
    }

    #[test]
    fn discharge_has_no_ramp() {
        let mut derating = Derating::default();
        derating.update(&limits(10.0, 100.0), &extremes(2.6, 3.3));
        let (_, dcl) = derating.update(&limits(10.0, 100.0), &extremes(3.3, 3.4));
        assert_eq!(dcl, 100.0);
    }

    #[test]
    fn unknown_limits_block() {
        assert_eq!(Derating::default().permissions(), Permissions::BLOCKED);
    }
}
