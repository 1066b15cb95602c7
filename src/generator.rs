//! A module for weather value generation.
//!
//!

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::protocol::WeatherType;

/// Closed interval a generated value must fall in.
pub fn value_range(kind: WeatherType) -> RangeInclusive<f32> {
    match kind {
        WeatherType::Temperature => -10.0..=40.0,
        WeatherType::Humidity => 20.0..=100.0,
        WeatherType::Wind => 0.0..=100.0,
        WeatherType::Pressure => 950.0..=1050.0,
    }
}

/// A trait for weather data sources.
///
/// A source is cloned into every worker, so clones must share state.
pub trait WeatherSource: Clone + Send + 'static {
    /// Produce a measurement of the given kind.
    fn generate(&self, kind: WeatherType) -> f32;
}

/// Uniform random values within [`value_range`].
///
/// One generator is seeded per process and shared by all clones.
#[derive(Clone)]
pub struct RandomWeather {
    rng: Arc<Mutex<StdRng>>,
}

impl RandomWeather {
    /// Seed from operating system entropy.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic generator, for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}

impl WeatherSource for RandomWeather {
    fn generate(&self, kind: WeatherType) -> f32 {
        // a poisoned lock only means another worker panicked mid-draw
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(value_range(kind))
    }
}
