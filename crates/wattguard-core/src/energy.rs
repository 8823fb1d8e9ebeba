//! Energy, cost, and CO₂ accounting for a single heartbeat.
//!
//! Parameters (idle power draw, electricity cost, CO₂ intensity, idle
//! threshold) are configuration, not constants here — callers supply them so
//! the server's `ServerConfig` is the single source of truth.

/// Tunable inputs to the per-heartbeat accounting formula.
#[derive(Debug, Clone, Copy)]
pub struct EnergyParams {
    pub idle_power_watts: f64,
    pub cost_per_kwh: f64,
    pub co2_kg_per_kwh: f64,
    pub idle_threshold_seconds: i64,
    pub heartbeat_interval_seconds: i64,
}

/// The energy/cost/CO₂ increment attributable to one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyDelta {
    pub is_idle: bool,
    pub energy_kwh: f64,
    pub cost: f64,
    pub co2_kg: f64,
}

/// `true` once `idle_seconds` reaches the configured idle threshold.
#[must_use]
pub fn is_idle(idle_seconds: i64, params: &EnergyParams) -> bool {
    idle_seconds >= params.idle_threshold_seconds
}

/// Compute the energy/cost/CO₂ increment a single heartbeat contributes.
///
/// Idle seconds credited toward the increment are capped at the configured
/// heartbeat interval, so one heartbeat never contributes more than one
/// interval's worth of energy no matter how large `idle_seconds` is (an
/// agent that was briefly offline and reports a large catch-up value does
/// not inflate the totals). The raw, uncapped `idle_seconds` is still used
/// by the caller for the machine's cumulative idle-seconds counter and for
/// idle/online classification.
#[must_use]
pub fn compute_delta(idle_seconds: i64, params: &EnergyParams) -> EnergyDelta {
    let credited_seconds = idle_seconds.min(params.heartbeat_interval_seconds).max(0);
    let idle_hours = credited_seconds as f64 / 3600.0;
    let energy_kwh = round6(idle_hours * (params.idle_power_watts / 1000.0));
    let cost = round4(energy_kwh * params.cost_per_kwh);
    let co2_kg = round6(energy_kwh * params.co2_kg_per_kwh);

    EnergyDelta {
        is_idle: is_idle(idle_seconds, params),
        energy_kwh,
        cost,
        co2_kg,
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EnergyParams {
        EnergyParams {
            idle_power_watts: 65.0,
            cost_per_kwh: 0.12,
            co2_kg_per_kwh: 0.386,
            idle_threshold_seconds: 300,
            heartbeat_interval_seconds: 60,
        }
    }

    #[test]
    fn sixty_seconds_at_sixty_five_watts_matches_worked_example() {
        let delta = compute_delta(60, &params());
        assert!(!delta.is_idle);
        assert_eq!(delta.energy_kwh, 0.001083);
    }

    #[test]
    fn zero_idle_seconds_yields_zero_delta() {
        let delta = compute_delta(0, &params());
        assert!(!delta.is_idle);
        assert_eq!(delta.energy_kwh, 0.0);
        assert_eq!(delta.cost, 0.0);
        assert_eq!(delta.co2_kg, 0.0);
    }

    #[test]
    fn idle_seconds_exactly_at_threshold_is_idle() {
        let delta = compute_delta(300, &params());
        assert!(delta.is_idle);
    }

    #[test]
    fn idle_seconds_above_threshold_classifies_idle() {
        let delta = compute_delta(600, &params());
        assert!(delta.is_idle);
        // credited seconds still capped at the heartbeat interval
        assert_eq!(delta.energy_kwh, 0.001083);
    }

    #[test]
    fn large_catch_up_value_does_not_inflate_the_increment() {
        let capped = compute_delta(60, &params());
        let huge = compute_delta(86_400, &params());
        assert_eq!(capped.energy_kwh, huge.energy_kwh);
    }

    #[test]
    fn delta_is_never_negative() {
        let delta = compute_delta(0, &params());
        assert!(delta.energy_kwh >= 0.0);
    }
}
