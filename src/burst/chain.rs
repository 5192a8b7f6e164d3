use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstState {
    /// Quiet regime: sparse or no emission.
    Idle,
    /// Busy regime: dense emission.
    Active,
}

impl BurstState {
    /// Index into per-state parameter tables.
    pub fn index(self) -> usize {
        match self {
            BurstState::Idle => 0,
            BurstState::Active => 1,
        }
    }
}

/// Convert a per-unit-time exit probability into a per-tick one.
///
/// `1 - (1-p)^dt` keeps the chain's statistics approximately invariant to
/// tick length: halving the tick halves each step's flip chance in just the
/// right way for the compounded odds over one second to stay `p`. The
/// geometric compounding is a first-order stand-in for a true continuous
/// process; the residual bias under variable `dt` is accepted.
pub fn per_tick_probability(p: f64, dt: f64) -> f64 {
    1.0 - (1.0 - p).powf(dt)
}

/// Two-state Markov chain with per-unit-time switching probabilities.
///
/// Over a long run the fraction of time spent Active converges to
/// `p_activate / (p_activate + p_deactivate)`.
#[derive(Debug, Clone)]
pub struct GilbertChain {
    p_activate: f64,
    p_deactivate: f64,
    state: BurstState,
}

impl GilbertChain {
    pub fn new(p_activate: f64, p_deactivate: f64) -> Self {
        Self {
            p_activate,
            p_deactivate,
            state: BurstState::Idle,
        }
    }

    pub fn state(&self) -> BurstState {
        self.state
    }

    /// Advance one tick of `dt` seconds; at most one transition per tick,
    /// so a state entered this tick cannot be exited in the same tick.
    pub fn tick(&mut self, dt: f64, rng: &mut impl Rng) -> BurstState {
        match self.state {
            BurstState::Idle => {
                if rng.gen::<f64>() < per_tick_probability(self.p_activate, dt) {
                    self.state = BurstState::Active;
                }
            }
            BurstState::Active => {
                if rng.gen::<f64>() < per_tick_probability(self.p_deactivate, dt) {
                    self.state = BurstState::Idle;
                }
            }
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn per_tick_probability_is_consistent_across_tick_lengths() {
        // Compounding ten 0.1s steps must equal one 1s step.
        let p = 0.3;
        let per_tick = per_tick_probability(p, 0.1);
        let survive_ten = (1.0 - per_tick).powi(10);
        assert!((1.0 - survive_ten - p).abs() < 1e-12);
    }

    #[test]
    fn certain_switching_flips_every_tick() {
        let mut chain = GilbertChain::new(1.0, 1.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let mut expected = BurstState::Idle;
        for _ in 0..32 {
            expected = match expected {
                BurstState::Idle => BurstState::Active,
                BurstState::Active => BurstState::Idle,
            };
            assert_eq!(chain.tick(1.0, &mut rng), expected);
        }
    }

    #[test]
    fn zero_activation_never_leaves_idle() {
        let mut chain = GilbertChain::new(0.0, 1.0);
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..1000 {
            assert_eq!(chain.tick(0.05, &mut rng), BurstState::Idle);
        }
    }

    #[test]
    fn long_run_occupancy_matches_stationary_distribution() {
        // p_activate / (p_activate + p_deactivate) = 0.25. Probabilities are
        // kept small so the geometric compounding's log-scale bias stays far
        // below the test tolerance.
        let mut chain = GilbertChain::new(0.02, 0.06);
        let mut rng = SmallRng::seed_from_u64(3);
        let dt = 0.01;
        let steps = 5_000_000;
        let mut active = 0u64;
        for _ in 0..steps {
            if chain.tick(dt, &mut rng) == BurstState::Active {
                active += 1;
            }
        }
        let occupancy = active as f64 / steps as f64;
        assert!(
            (occupancy - 0.25).abs() < 0.02,
            "occupancy was {occupancy}, expected ~0.25"
        );
    }
}
