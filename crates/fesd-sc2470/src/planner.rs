//! RF/IF/LO frequency planning.
//!
//! The converter relates its three frequencies as RF = IF + LO. A caller
//! names two of them (or all three, or a single bypass frequency); the
//! planner produces the triple to send with `PATH:FREQ`, honouring each
//! field's hardware range. A field sent as 0 is left for the instrument to
//! derive. Planning is pure; the commander sends the result and reports the
//! triple the instrument reads back.
//!
//! When a two-value request is infeasible the planner moves toward the
//! violated floor first and never past a ceiling.

use fesd_core::{
    is_almost_equal_to_zero, BypassFrequency, FrequencySet, IfFrequency, LoFrequency,
    RfFrequency, ZERO_EPSILON,
};

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrequencyRequest {
    /// RF and IF given; the instrument derives LO.
    RfIf(RfFrequency, IfFrequency),
    /// RF and LO given; the instrument derives IF.
    RfLo(RfFrequency, LoFrequency),
    /// IF and LO given; the instrument derives RF.
    IfLo(IfFrequency, LoFrequency),
    /// Explicit triple in Hz. Fields at (near) zero are left unset.
    Explicit(FrequencySet),
    /// RF tied to IF with the mixer bypassed.
    Bypass(BypassFrequency),
}

/// Triple in kHz as carried by `PATH:FREQ`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WireFrequencySet {
    pub rf_khz: f64,
    pub if_khz: f64,
    pub lo_khz: f64,
}

impl WireFrequencySet {
    fn from_hz(rf_hz: f64, if_hz: f64, lo_hz: f64) -> Self {
        Self {
            rf_khz: rf_hz / 1000.0,
            if_khz: if_hz / 1000.0,
            lo_khz: lo_hz / 1000.0,
        }
    }
}

/// Resolve `request` into the triple to send.
pub fn plan(request: &FrequencyRequest) -> WireFrequencySet {
    match *request {
        FrequencyRequest::RfIf(rf, if_) => plan_rf_if(rf.hz(), if_.hz()),
        FrequencyRequest::RfLo(rf, lo) => plan_rf_lo(rf.hz(), lo.hz()),
        FrequencyRequest::IfLo(if_, lo) => plan_if_lo(if_.hz(), lo.hz()),
        FrequencyRequest::Explicit(set) => plan_explicit(&set),
        FrequencyRequest::Bypass(bypass) => WireFrequencySet::from_hz(bypass.hz(), bypass.hz(), 0.0),
    }
}

fn plan_rf_if(rf_hz: f64, if_hz: f64) -> WireFrequencySet {
    let rf_hz = if rf_hz - if_hz < LoFrequency::MIN_HZ {
        if_hz + LoFrequency::MIN_HZ
    } else {
        rf_hz
    };
    WireFrequencySet::from_hz(rf_hz, if_hz, 0.0)
}

fn plan_rf_lo(rf_hz: f64, lo_hz: f64) -> WireFrequencySet {
    let (rf_hz, lo_hz) = if rf_hz - lo_hz < IfFrequency::MIN_HZ {
        if rf_hz - LoFrequency::MIN_HZ > IfFrequency::MIN_HZ {
            (rf_hz, LoFrequency::MIN_HZ)
        } else {
            (LoFrequency::MIN_HZ + IfFrequency::MIN_HZ, LoFrequency::MIN_HZ)
        }
    } else if rf_hz - lo_hz > IfFrequency::MAX_HZ {
        (lo_hz + IfFrequency::MAX_HZ, lo_hz)
    } else {
        (rf_hz, lo_hz)
    };
    WireFrequencySet::from_hz(rf_hz, 0.0, lo_hz)
}

fn plan_if_lo(if_hz: f64, lo_hz: f64) -> WireFrequencySet {
    let lo_hz = if lo_hz + if_hz < RfFrequency::MIN_HZ {
        if_hz + RfFrequency::MIN_HZ
    } else if lo_hz + if_hz > RfFrequency::MAX_HZ {
        RfFrequency::MAX_HZ - if_hz
    } else {
        lo_hz
    };
    WireFrequencySet::from_hz(0.0, if_hz, lo_hz)
}

fn plan_explicit(set: &FrequencySet) -> WireFrequencySet {
    let coerce = |hz: f64, clamp: fn(f64) -> f64| {
        if is_almost_equal_to_zero(hz, ZERO_EPSILON) {
            0.0
        } else {
            clamp(hz)
        }
    };
    WireFrequencySet::from_hz(
        coerce(set.rf_hz, |hz| RfFrequency::new(hz).hz()),
        coerce(set.if_hz, |hz| IfFrequency::new(hz).hz()),
        coerce(set.lo_hz, |hz| LoFrequency::new(hz).hz()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn khz(rf: f64, if_: f64, lo: f64) -> WireFrequencySet {
        WireFrequencySet {
            rf_khz: rf,
            if_khz: if_,
            lo_khz: lo,
        }
    }

    fn rf_if(rf: f64, if_: f64) -> WireFrequencySet {
        plan(&FrequencyRequest::RfIf(RfFrequency::new(rf), IfFrequency::new(if_)))
    }

    fn rf_lo(rf: f64, lo: f64) -> WireFrequencySet {
        plan(&FrequencyRequest::RfLo(RfFrequency::new(rf), LoFrequency::new(lo)))
    }

    fn if_lo(if_: f64, lo: f64) -> WireFrequencySet {
        plan(&FrequencyRequest::IfLo(IfFrequency::new(if_), LoFrequency::new(lo)))
    }

    // RF + IF

    #[test]
    fn rf_if_feasible_sends_rf_unchanged() {
        assert_eq!(rf_if(12.7e9, 6e9), khz(12_700_000.0, 6_000_000.0, 0.0));
    }

    #[test]
    fn rf_if_raises_rf_to_lo_floor() {
        // 6.7 GHz - 6 GHz leaves LO at 0.7 GHz, below its 6 GHz floor.
        assert_eq!(rf_if(6.7e9, 6e9), khz(12_000_000.0, 6_000_000.0, 0.0));
    }

    #[test]
    fn rf_if_exact_lo_floor_is_feasible() {
        assert_eq!(rf_if(12e9, 6e9), khz(12_000_000.0, 6_000_000.0, 0.0));
    }

    #[test]
    fn rf_if_inputs_are_clamped_first() {
        // IF 10 GHz clamps to 6 GHz, RF 1 GHz clamps to 6.7 GHz.
        assert_eq!(rf_if(1e9, 10e9), khz(12_000_000.0, 6_000_000.0, 0.0));
    }

    // RF + LO

    #[test]
    fn rf_lo_feasible_keeps_both() {
        assert_eq!(rf_lo(20e9, 15e9), khz(20_000_000.0, 0.0, 15_000_000.0));
    }

    #[test]
    fn rf_lo_if_floor_boundary_is_feasible() {
        // RF - LO is exactly IF_MIN; equality satisfies the floor.
        assert_eq!(rf_lo(6.7e9, 6e9), khz(6_700_000.0, 0.0, 6_000_000.0));
    }

    #[test]
    fn rf_lo_below_if_floor_drops_lo_to_its_floor() {
        // RF - LO = 0.5 GHz < 0.7 GHz; RF - LO_MIN = 4 GHz > 0.7 GHz.
        assert_eq!(rf_lo(10e9, 9.5e9), khz(10_000_000.0, 0.0, 6_000_000.0));
    }

    #[test]
    fn rf_lo_both_floors_hit() {
        // RF clamps to 6.7 GHz, LO 6.5 GHz: RF - LO = 0.2 GHz and
        // RF - LO_MIN = 0.7 GHz is not above IF_MIN.
        assert_eq!(rf_lo(6.7e9, 6.5e9), khz(6_700_000.0, 0.0, 6_000_000.0));
    }

    #[test]
    fn rf_lo_above_if_ceiling_pulls_rf_down() {
        assert_eq!(rf_lo(20e9, 6e9), khz(12_000_000.0, 0.0, 6_000_000.0));
    }

    // IF + LO

    #[test]
    fn if_lo_feasible_keeps_lo() {
        assert_eq!(if_lo(2e9, 10e9), khz(0.0, 2_000_000.0, 10_000_000.0));
    }

    #[test]
    fn if_lo_always_meets_rf_floor_from_clamped_inputs() {
        // The smallest clamped sum is 0.7 + 6 = 6.7 GHz, exactly RF_MIN.
        assert_eq!(if_lo(0.0, 0.0), khz(0.0, 700_000.0, 6_000_000.0));
    }

    #[test]
    fn if_lo_above_rf_ceiling_pulls_lo_down() {
        assert_eq!(if_lo(5e9, 25e9), khz(0.0, 5_000_000.0, 21_000_000.0));
    }

    // Explicit

    #[test]
    fn explicit_zero_fields_pass_through() {
        let set = FrequencySet {
            rf_hz: 12e9,
            if_hz: 0.0,
            lo_hz: 0.0005,
        };
        assert_eq!(plan(&FrequencyRequest::Explicit(set)), khz(12_000_000.0, 0.0, 0.0));
    }

    #[test]
    fn explicit_fields_clamp_independently() {
        let set = FrequencySet {
            rf_hz: 30e9,
            if_hz: 100e6,
            lo_hz: 1e9,
        };
        assert_eq!(
            plan(&FrequencyRequest::Explicit(set)),
            khz(26_000_000.0, 700_000.0, 6_000_000.0)
        );
    }

    #[test]
    fn explicit_nan_field_goes_to_minimum() {
        let set = FrequencySet {
            rf_hz: 12e9,
            if_hz: f64::NAN,
            lo_hz: 0.0,
        };
        let wire = plan(&FrequencyRequest::Explicit(set));
        assert_eq!(wire, khz(12_000_000.0, 700_000.0, 0.0));
        assert!(!wire.if_khz.is_nan());
    }

    // Bypass

    #[test]
    fn bypass_ties_rf_to_if() {
        let request = FrequencyRequest::Bypass(BypassFrequency::new(2.4e9));
        assert_eq!(plan(&request), khz(2_400_000.0, 2_400_000.0, 0.0));
    }

    #[test]
    fn bypass_clamps() {
        let request = FrequencyRequest::Bypass(BypassFrequency::new(10e9));
        assert_eq!(plan(&request), khz(8_500_000.0, 8_500_000.0, 0.0));
    }

    // Properties

    #[test]
    fn every_two_value_plan_respects_ranges() {
        let grid = [0.0, 0.5e9, 0.7e9, 3e9, 6e9, 6.7e9, 9e9, 12.7e9, 20e9, 25.3e9, 26e9, 40e9];
        let in_range = |khz: f64, min: f64, max: f64| {
            khz == 0.0 || (khz * 1000.0 >= min - 1.0 && khz * 1000.0 <= max + 1.0)
        };
        for &a in &grid {
            for &b in &grid {
                for wire in [rf_if(a, b), rf_lo(a, b), if_lo(a, b)] {
                    assert!(in_range(wire.rf_khz, RfFrequency::MIN_HZ, RfFrequency::MAX_HZ), "{wire:?}");
                    assert!(in_range(wire.if_khz, IfFrequency::MIN_HZ, IfFrequency::MAX_HZ), "{wire:?}");
                    assert!(in_range(wire.lo_khz, LoFrequency::MIN_HZ, LoFrequency::MAX_HZ), "{wire:?}");
                }
            }
        }
    }

    #[test]
    fn planning_is_idempotent() {
        let first = rf_if(6.7e9, 6e9);
        let again = rf_if(first.rf_khz * 1000.0, first.if_khz * 1000.0);
        assert_eq!(first, again);
    }
}
