use nalgebra::Vector3;
use rand::Rng;
use tracing::debug;

use crate::burst::chain::{per_tick_probability, BurstState, GilbertChain};
use crate::{MAX_GAIN_DB, MIN_GAIN_DB};

/// Emission parameters for one regime of a burst.
#[derive(Debug, Clone, Copy)]
pub struct EmissionProfile {
    /// Per-unit-time probability of emitting a trigger.
    pub rate: f64,
    /// Gain range triggers are drawn from, in dB.
    pub gain_lo: f64,
    pub gain_hi: f64,
}

/// A trigger produced by a burst: which pool to fire, how loud, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub pool: String,
    pub gain_db: f64,
    pub position: Vector3<f64>,
}

/// Fires randomized triggers from a pool, switching between a quiet and a
/// busy emission regime under a Gilbert chain.
#[derive(Debug, Clone)]
pub struct BurstEmitter {
    name: String,
    pool: String,
    chain: GilbertChain,
    profiles: [EmissionProfile; 2],
    space_lo: Vector3<f64>,
    space_hi: Vector3<f64>,
    enabled: bool,
}

impl BurstEmitter {
    /// `switching` is `(p_idle_to_active, p_active_to_idle)` per unit time;
    /// `profiles` are the Idle and Active regimes; `space` is the bounding
    /// box trigger positions are drawn from.
    pub fn new(
        name: impl Into<String>,
        pool: impl Into<String>,
        switching: (f64, f64),
        profiles: [EmissionProfile; 2],
        space: (Vector3<f64>, Vector3<f64>),
    ) -> Self {
        Self {
            name: name.into(),
            pool: pool.into(),
            chain: GilbertChain::new(switching.0, switching.1),
            profiles,
            space_lo: space.0,
            space_hi: space.1,
            // Bursts start dormant and are enabled by command.
            enabled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn state(&self) -> BurstState {
        self.chain.state()
    }

    /// Advance one tick; maybe produce a trigger.
    pub fn tick(&mut self, dt: f64, rng: &mut impl Rng) -> Option<Trigger> {
        if !self.enabled {
            return None;
        }

        let state = self.chain.tick(dt, rng);
        let profile = self.profiles[state.index()];

        let rate = per_tick_probability(profile.rate, dt);
        if rng.gen::<f64>() >= rate {
            return None;
        }

        let gain_db = uniform_axis(rng, profile.gain_lo, profile.gain_hi)
            .clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        let position = Vector3::new(
            uniform_axis(rng, self.space_lo.x, self.space_hi.x),
            uniform_axis(rng, self.space_lo.y, self.space_hi.y),
            uniform_axis(rng, self.space_lo.z, self.space_hi.z),
        );
        debug!(
            burst = %self.name,
            gain_db,
            x = position.x,
            y = position.y,
            z = position.z,
            "burst trigger"
        );
        Some(Trigger {
            pool: self.pool.clone(),
            gain_db,
            position,
        })
    }
}

fn uniform_axis(rng: &mut impl Rng, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi {
        lo
    } else {
        rng.gen_range(lo..hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn profile(rate: f64, gain_lo: f64, gain_hi: f64) -> EmissionProfile {
        EmissionProfile {
            rate,
            gain_lo,
            gain_hi,
        }
    }

    fn boxed() -> (Vector3<f64>, Vector3<f64>) {
        (Vector3::new(-2.0, 0.0, -2.0), Vector3::new(2.0, 1.0, 2.0))
    }

    #[test]
    fn disabled_emitter_never_triggers() {
        let mut burst = BurstEmitter::new(
            "storm",
            "rain",
            (1.0, 0.0),
            [profile(1.0, -6.0, 0.0), profile(1.0, -6.0, 0.0)],
            boxed(),
        );
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..100 {
            assert_eq!(burst.tick(1.0, &mut rng), None);
        }
    }

    #[test]
    fn certain_rate_triggers_every_tick_while_active() {
        // Chain locked Active after the first tick (p_activate = 1,
        // p_deactivate = 0), rate 1 in the Active regime.
        let mut burst = BurstEmitter::new(
            "storm",
            "rain",
            (1.0, 0.0),
            [profile(0.0, 0.0, 0.0), profile(1.0, -30.0, -10.0)],
            boxed(),
        );
        burst.set_enabled(true);
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..50 {
            let trigger = burst.tick(1.0, &mut rng);
            assert!(trigger.is_some());
        }
    }

    #[test]
    fn zero_rate_never_triggers() {
        let mut burst = BurstEmitter::new(
            "storm",
            "rain",
            (1.0, 1.0),
            [profile(0.0, 0.0, 0.0), profile(0.0, 0.0, 0.0)],
            boxed(),
        );
        burst.set_enabled(true);
        let mut rng = SmallRng::seed_from_u64(6);
        for _ in 0..200 {
            assert_eq!(burst.tick(0.1, &mut rng), None);
        }
    }

    #[test]
    fn gains_are_clamped_to_legal_range() {
        // Deliberately absurd gain range; the drawn gain must still come
        // out inside [-120, 0] dB.
        let mut burst = BurstEmitter::new(
            "storm",
            "rain",
            (1.0, 0.0),
            [profile(1.0, -500.0, 60.0), profile(1.0, -500.0, 60.0)],
            boxed(),
        );
        burst.set_enabled(true);
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            if let Some(t) = burst.tick(1.0, &mut rng) {
                assert!((MIN_GAIN_DB..=MAX_GAIN_DB).contains(&t.gain_db));
            }
        }
    }

    #[test]
    fn positions_stay_inside_the_bounding_box() {
        let (lo, hi) = boxed();
        let mut burst = BurstEmitter::new(
            "storm",
            "rain",
            (1.0, 0.0),
            [profile(1.0, -20.0, -10.0), profile(1.0, -20.0, -10.0)],
            (lo, hi),
        );
        burst.set_enabled(true);
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..500 {
            if let Some(t) = burst.tick(1.0, &mut rng) {
                for i in 0..3 {
                    assert!(t.position[i] >= lo[i] && t.position[i] <= hi[i]);
                }
            }
        }
    }

    #[test]
    fn triggers_carry_the_pool_name() {
        let mut burst = BurstEmitter::new(
            "storm",
            "rain",
            (1.0, 0.0),
            [profile(1.0, -10.0, -10.0), profile(1.0, -10.0, -10.0)],
            boxed(),
        );
        burst.set_enabled(true);
        let mut rng = SmallRng::seed_from_u64(9);
        let trigger = burst.tick(1.0, &mut rng).expect("rate 1 must trigger");
        assert_eq!(trigger.pool, "rain");
        assert_eq!(trigger.gain_db, -10.0);
    }
}
