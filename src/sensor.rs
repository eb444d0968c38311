use rand::{rngs::StdRng, Rng, SeedableRng};

/// Source of 8-bit readings.
pub(crate) trait Sensor {
    fn sample(&mut self) -> u8;
}

/// Produces uniformly distributed readings.
#[derive(Debug)]
pub(crate) struct RandomSensor {
    rng: StdRng,
}

impl RandomSensor {
    pub(crate) fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    #[cfg(test)]
    pub(crate) fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Sensor for RandomSensor {
    fn sample(&mut self) -> u8 {
        self.rng.gen()
    }
}

/// Always reports the same reading.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedSensor(pub u8);

#[cfg(test)]
impl Sensor for FixedSensor {
    fn sample(&mut self) -> u8 {
        self.0
    }
}
