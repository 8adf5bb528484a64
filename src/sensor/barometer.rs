//! Simulated barometer with a crude vertical plant.
//!
//! Clones share one plant: the sensor thread reads altitude from it while the
//! actuation thread feeds lift commands back into it.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use super::{AltitudeSource, RawReading, SensorSettings};
use crate::actuator::MotorDriver;
use crate::clock::ControlClock;
use crate::hub::MotorCommand;

const SEA_LEVEL_HPA: f32 = 1013.25;

/// International barometric formula.
pub fn altitude_from_pressure(pressure_hpa: f32) -> f32 {
    44_330.0 * (1.0 - (pressure_hpa / SEA_LEVEL_HPA).powf(1.0 / 5.255))
}

pub fn pressure_at_altitude(altitude_m: f32) -> f32 {
    SEA_LEVEL_HPA * (1.0 - altitude_m / 44_330.0).powf(5.255)
}

struct PlantState {
    rng: StdRng,
    altitude_m: f32,
    velocity_ms: f32,
    lift: i32,
    noise_m: f32,
    lift_gain: f32,
    drag: f32,
    last_step_ms: u64,
    pending_dropouts: u32,
    reads: u64,
}

#[derive(Clone)]
pub struct SimulatedBarometer {
    state: Arc<Mutex<PlantState>>,
    clock: ControlClock,
}

impl SimulatedBarometer {
    pub fn new(settings: &SensorSettings, clock: ControlClock) -> Self {
        let state = PlantState {
            rng: StdRng::seed_from_u64(settings.seed),
            altitude_m: settings.start_altitude_m,
            velocity_ms: 0.0,
            lift: 0,
            noise_m: settings.noise_m,
            // full lift gives ~5 m/s² of climb authority
            lift_gain: 0.05,
            drag: 0.8,
            last_step_ms: clock.now_ms(),
            pending_dropouts: 0,
            reads: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    /// True altitude of the plant, without sensor noise.
    pub fn true_altitude(&self) -> f32 {
        self.state.lock().altitude_m
    }

    pub fn reads(&self) -> u64 {
        self.state.lock().reads
    }

    /// Shift the plant up or down, e.g. a gust.
    pub fn inject_disturbance(&self, delta_m: f32) {
        self.state.lock().altitude_m += delta_m;
    }

    /// The next `count` reads return no data.
    pub fn inject_dropouts(&self, count: u32) {
        self.state.lock().pending_dropouts += count;
    }

    fn step(&self, state: &mut PlantState) {
        let now_ms = self.clock.now_ms();
        let dt = now_ms.saturating_sub(state.last_step_ms) as f32 / 1000.0;
        state.last_step_ms = now_ms;
        if dt <= 0.0 {
            return;
        }
        let accel = state.lift as f32 * state.lift_gain - state.drag * state.velocity_ms;
        state.velocity_ms += accel * dt;
        state.altitude_m += state.velocity_ms * dt;
    }
}

impl AltitudeSource for SimulatedBarometer {
    fn read(&mut self) -> Option<RawReading> {
        let mut state = self.state.lock();
        self.step(&mut state);
        state.reads += 1;
        if state.pending_dropouts > 0 {
            state.pending_dropouts -= 1;
            return None;
        }

        let noise = if state.noise_m > 0.0 {
            let amplitude = state.noise_m;
            state.rng.gen_range(-amplitude..amplitude)
        } else {
            0.0
        };
        let sensed = state.altitude_m + noise;
        let pressure = pressure_at_altitude(sensed);
        Some(RawReading {
            temperature: 15.0 - 0.0065 * sensed,
            pressure,
            altitude: altitude_from_pressure(pressure),
        })
    }
}

impl MotorDriver for SimulatedBarometer {
    fn drive(&mut self, command: &MotorCommand) {
        let mut state = self.state.lock();
        self.step(&mut state);
        state.lift = command.lift_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MotorLimits;
    use approx::assert_relative_eq;

    fn quiet() -> SensorSettings {
        SensorSettings {
            noise_m: 0.0,
            start_altitude_m: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn barometric_formula_round_trips() {
        for alt in [0.0f32, 50.0, 120.0, 1500.0] {
            assert_relative_eq!(
                altitude_from_pressure(pressure_at_altitude(alt)),
                alt,
                epsilon = 0.05
            );
        }
        assert_relative_eq!(pressure_at_altitude(0.0), 1013.25);
    }

    #[test]
    fn noise_is_bounded_and_deterministic_per_seed() {
        let settings = SensorSettings {
            noise_m: 0.5,
            start_altitude_m: 100.0,
            ..Default::default()
        };
        let (clock, _mock) = ControlClock::mock();
        let mut a = SimulatedBarometer::new(&settings, clock.clone());
        let mut b = SimulatedBarometer::new(&settings, clock);
        for _ in 0..50 {
            let ra = a.read().unwrap();
            let rb = b.read().unwrap();
            assert_eq!(ra, rb);
            assert!((ra.altitude - 100.0).abs() < 0.6);
        }
    }

    #[test]
    fn lift_command_makes_the_plant_climb() {
        let (clock, mock) = ControlClock::mock();
        let mut baro = SimulatedBarometer::new(&quiet(), clock);
        let mut driver = baro.clone();
        driver.drive(&MotorCommand::auto(100, &MotorLimits::default()));
        for _ in 0..20 {
            mock.advance_ms(100);
            baro.read();
        }
        assert!(baro.true_altitude() > 101.0);
    }

    #[test]
    fn dropouts_yield_no_reading() {
        let (clock, _mock) = ControlClock::mock();
        let mut baro = SimulatedBarometer::new(&quiet(), clock);
        baro.inject_dropouts(2);
        assert!(baro.read().is_none());
        assert!(baro.read().is_none());
        assert!(baro.read().is_some());
        assert_eq!(baro.reads(), 3);
    }

    #[test]
    fn disturbance_moves_the_reading() {
        let (clock, _mock) = ControlClock::mock();
        let mut baro = SimulatedBarometer::new(&quiet(), clock);
        let before = baro.read().unwrap().altitude;
        baro.inject_disturbance(5.0);
        let after = baro.read().unwrap().altitude;
        assert!((after - before - 5.0).abs() < 0.1);
    }
}
