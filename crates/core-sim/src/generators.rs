use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{GeneratorKind, SimConfig};
use crate::error::ConfigError;

/// Inclusive price range a generator is guaranteed to stay within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    pub fn for_digits(n_min: i64, n_max: i64, n_samples: u32) -> Self {
        let samples = f64::from(n_samples);
        Self {
            min: n_min as f64 * samples,
            max: n_max as f64 * samples,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Produces the next price of the series.
///
/// `previous` is `None` on the first tick. Implementations must be
/// deterministic for a fixed seed and must never leave [`PriceGenerator::bounds`].
pub trait PriceGenerator: Send {
    fn next(&mut self, previous: Option<f64>, expected_value: f64) -> f64;

    fn bounds(&self) -> PriceBounds;
}

/// Derives the anchor price the generator reverts toward.
pub trait ExpectedValueModel: Send + Sync {
    fn compute(&self, n_min: i64, n_max: i64, n_samples: u32) -> f64;
}

/// Mean of a sum of `n_samples` uniform digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigitSumMean;

impl ExpectedValueModel for DigitSumMean {
    fn compute(&self, n_min: i64, n_max: i64, n_samples: u32) -> f64 {
        f64::from(n_samples) * (n_min + n_max) as f64 / 2.0
    }
}

/// Sums `n_samples` uniform integer digit draws. After the first tick a
/// sum is kept only when it lies on the opposite side of the expected
/// value from the previous price, so the series keeps pulling back toward
/// the anchor while prices next to it stay reachable.
#[derive(Debug, Clone)]
pub struct DigitSumGenerator {
    rng: StdRng,
    n_min: i64,
    n_max: i64,
    n_samples: u32,
    bounds: PriceBounds,
}

/// Which side of the expected value the next price has to land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reversion {
    Any,
    AtOrBelow,
    AtOrAbove,
}

impl DigitSumGenerator {
    /// Draws attempted before a sum is pulled onto the required side.
    const MAX_DRAWS: usize = 64;

    /// # Panics
    ///
    /// When `n_min > n_max` or `n_samples == 0`. [`generator_for`] checks
    /// both through [`SimConfig::validate`] first.
    pub fn new(seed: u64, n_min: i64, n_max: i64, n_samples: u32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), n_min, n_max, n_samples)
    }

    pub fn with_rng(rng: StdRng, n_min: i64, n_max: i64, n_samples: u32) -> Self {
        assert!(n_min <= n_max, "n_min must not exceed n_max");
        assert!(n_samples > 0, "n_samples must be positive");

        Self {
            rng,
            n_min,
            n_max,
            n_samples,
            bounds: PriceBounds::for_digits(n_min, n_max, n_samples),
        }
    }

    fn draw(&mut self) -> f64 {
        let (low, high) = (self.n_min, self.n_max);
        let sum: i64 = (0..self.n_samples)
            .map(|_| self.rng.gen_range(low..=high))
            .sum();
        sum as f64
    }
}

impl Reversion {
    fn of(previous: Option<f64>, expected_value: f64) -> Self {
        match previous {
            None => Self::Any,
            Some(price) if price >= expected_value => Self::AtOrBelow,
            Some(_) => Self::AtOrAbove,
        }
    }

    fn accepts(self, price: f64, expected_value: f64) -> bool {
        match self {
            Self::Any => true,
            Self::AtOrBelow => price <= expected_value,
            Self::AtOrAbove => price >= expected_value,
        }
    }

    fn pull(self, price: f64, expected_value: f64, bounds: PriceBounds) -> f64 {
        let pulled = match self {
            Self::Any => price,
            Self::AtOrBelow => price.min(expected_value.floor()),
            Self::AtOrAbove => price.max(expected_value.ceil()),
        };
        bounds.clamp(pulled)
    }
}

impl PriceGenerator for DigitSumGenerator {
    fn next(&mut self, previous: Option<f64>, expected_value: f64) -> f64 {
        let side = Reversion::of(previous, expected_value);

        let mut price = self.draw();
        for _ in 1..Self::MAX_DRAWS {
            if side.accepts(price, expected_value) {
                return price;
            }
            price = self.draw();
        }

        side.pull(price, expected_value, self.bounds)
    }

    fn bounds(&self) -> PriceBounds {
        self.bounds
    }
}

/// Scales the previous price by a random multiplier, shrinking on average
/// above the expected value and growing below it, then truncates to a whole
/// number. A price truncated down to zero (or below) restarts from the
/// expected value on the next tick instead of staying there.
#[derive(Debug, Clone)]
pub struct MultiplierGenerator {
    rng: StdRng,
    bounds: PriceBounds,
}

impl MultiplierGenerator {
    const ABOVE_ANCHOR: (f64, f64) = (0.75, 1.1);
    const BELOW_ANCHOR: (f64, f64) = (0.9, 1.25);

    pub fn new(seed: u64, bounds: PriceBounds) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), bounds)
    }

    pub fn with_rng(rng: StdRng, bounds: PriceBounds) -> Self {
        assert!(
            bounds.min.is_finite() && bounds.max.is_finite() && bounds.min <= bounds.max,
            "bounds must be finite and ordered"
        );

        Self { rng, bounds }
    }
}

impl PriceGenerator for MultiplierGenerator {
    fn next(&mut self, previous: Option<f64>, expected_value: f64) -> f64 {
        let base = previous
            .filter(|price| *price > 0.0)
            .unwrap_or(expected_value);
        let (low, high) = if base > expected_value {
            Self::ABOVE_ANCHOR
        } else {
            Self::BELOW_ANCHOR
        };

        self.bounds.clamp((base * self.rng.gen_range(low..high)).trunc())
    }

    fn bounds(&self) -> PriceBounds {
        self.bounds
    }
}

/// Builds the generator named by `config.generator`, seeded from
/// `config.seed` or from OS entropy when no seed is configured.
pub fn generator_for(config: &SimConfig) -> Result<Box<dyn PriceGenerator>, ConfigError> {
    config.validate()?;

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let generator: Box<dyn PriceGenerator> = match config.generator {
        GeneratorKind::DigitSum => Box::new(DigitSumGenerator::with_rng(
            rng,
            config.n_min,
            config.n_max,
            config.n_samples,
        )),
        GeneratorKind::Multiplier => Box::new(MultiplierGenerator::with_rng(
            rng,
            PriceBounds::for_digits(config.n_min, config.n_max, config.n_samples),
        )),
    };
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::{
        generator_for, DigitSumGenerator, DigitSumMean, ExpectedValueModel, MultiplierGenerator,
        PriceBounds, PriceGenerator,
    };
    use crate::config::{GeneratorKind, SimConfig};
    use crate::error::ConfigError;

    fn run(generator: &mut dyn PriceGenerator, expected_value: f64, ticks: usize) -> Vec<f64> {
        let mut previous = None;
        (0..ticks)
            .map(|_| {
                let price = generator.next(previous, expected_value);
                previous = Some(price);
                price
            })
            .collect()
    }

    #[test]
    fn expected_value_is_mean_of_digit_sum() {
        assert_eq!(DigitSumMean.compute(0, 9, 10), 45.0);
        assert_eq!(DigitSumMean.compute(2, 5, 4), 14.0);
        assert_eq!(DigitSumMean.compute(-3, 3, 8), 0.0);
    }

    #[test]
    fn seeded_generators_are_deterministic() {
        let mut a = DigitSumGenerator::new(42, 0, 9, 10);
        let mut b = DigitSumGenerator::new(42, 0, 9, 10);

        assert_eq!(run(&mut a, 45.0, 50), run(&mut b, 45.0, 50));

        let bounds = PriceBounds::for_digits(0, 9, 10);
        let mut c = MultiplierGenerator::new(7, bounds);
        let mut d = MultiplierGenerator::new(7, bounds);

        assert_eq!(run(&mut c, 45.0, 50), run(&mut d, 45.0, 50));
    }

    #[test]
    fn digit_sum_prices_stay_within_configured_range() {
        for (n_min, n_max, n_samples) in [(0, 9, 10), (1, 2, 3), (-5, 5, 7), (4, 4, 2)] {
            let mean = DigitSumMean.compute(n_min, n_max, n_samples);
            let mut generator = DigitSumGenerator::new(11, n_min, n_max, n_samples);
            let bounds = PriceBounds::for_digits(n_min, n_max, n_samples);

            for price in run(&mut generator, mean, 2_000) {
                assert!(bounds.contains(price), "{price} escaped {bounds:?}");
            }
        }
    }

    #[test]
    fn digit_sum_reverts_toward_expected_value() {
        let mut generator = DigitSumGenerator::new(3, 0, 9, 10);

        for _ in 0..500 {
            assert!(generator.next(Some(60.0), 45.0) <= 45.0);
            assert!(generator.next(Some(45.0), 45.0) <= 45.0);
            assert!(generator.next(Some(30.0), 45.0) >= 45.0);
        }
    }

    #[test]
    fn digit_sum_prices_are_whole_numbers() {
        let mut generator = DigitSumGenerator::new(13, 0, 9, 10);

        for price in run(&mut generator, 45.0, 200) {
            assert_eq!(price.fract(), 0.0);
        }
    }

    #[test]
    fn digit_sum_prices_next_to_the_anchor_stay_reachable() {
        let mut generator = DigitSumGenerator::new(29, 0, 9, 10);
        let prices = run(&mut generator, 45.0, 5_000);

        let near_anchor = prices
            .iter()
            .filter(|price| (40.0..=50.0).contains(*price))
            .count();
        assert!(near_anchor > 500, "only {near_anchor} of 5000 prices near 45");
        assert!(prices.contains(&45.0));
    }

    #[test]
    fn digit_sum_anchor_outside_range_is_pulled_to_nearest_bound() {
        let mut generator = DigitSumGenerator::new(2, 0, 9, 1);

        // nothing in [0, 9] is >= 20, so the draw ends on the upper bound
        assert_eq!(generator.next(Some(0.0), 20.0), 9.0);
        // nothing is <= -3, so it ends on the lower bound
        assert_eq!(generator.next(Some(5.0), -3.0), 0.0);
    }

    #[test]
    fn first_digit_sum_tick_samples_full_range() {
        let mut generator = DigitSumGenerator::new(5, 0, 9, 10);
        let first: Vec<f64> = (0..500).map(|_| generator.next(None, 45.0)).collect();

        assert!(first.iter().any(|price| *price < 45.0));
        assert!(first.iter().any(|price| *price > 45.0));
    }

    #[test]
    fn multiplier_prices_stay_within_bounds() {
        let bounds = PriceBounds::for_digits(0, 9, 10);
        let mut generator = MultiplierGenerator::new(9, bounds);

        for price in run(&mut generator, 45.0, 2_000) {
            assert!(bounds.contains(price));
        }
    }

    #[test]
    fn multiplier_first_tick_scales_expected_value() {
        let bounds = PriceBounds::for_digits(0, 9, 10);
        let mut generator = MultiplierGenerator::new(1, bounds);

        let first = generator.next(None, 45.0);

        // trunc(45 * 0.9) ..= trunc(45 * 1.25)
        assert!((40.0..=56.0).contains(&first), "{first}");
    }

    #[test]
    fn multiplier_prices_are_truncated_to_whole_numbers() {
        let bounds = PriceBounds::for_digits(0, 9, 10);
        let mut generator = MultiplierGenerator::new(17, bounds);

        for price in run(&mut generator, 45.0, 200) {
            assert_eq!(price.fract(), 0.0, "{price} is not a whole number");
        }
    }

    #[test]
    fn multiplier_restarts_from_anchor_after_hitting_zero() {
        let bounds = PriceBounds::for_digits(0, 9, 10);
        let mut generator = MultiplierGenerator::new(4, bounds);

        for _ in 0..100 {
            let price = generator.next(Some(0.0), 45.0);
            assert!((40.0..=56.0).contains(&price), "{price}");
        }
    }

    #[test]
    fn generator_for_honours_kind_and_seed() {
        let config = SimConfig {
            seed: Some(21),
            generator: GeneratorKind::Multiplier,
            ..SimConfig::default()
        };

        let mut built = generator_for(&config).unwrap();
        let mut direct = MultiplierGenerator::new(21, PriceBounds::for_digits(0, 9, 10));

        assert_eq!(built.bounds(), direct.bounds());
        assert_eq!(run(built.as_mut(), 45.0, 20), run(&mut direct, 45.0, 20));
    }

    #[test]
    fn generator_for_rejects_unvalidated_config() {
        let inverted = SimConfig {
            n_min: 9,
            n_max: 0,
            ..SimConfig::default()
        };
        let centred_multiplier = SimConfig {
            n_min: -5,
            n_max: 5,
            generator: GeneratorKind::Multiplier,
            ..SimConfig::default()
        };

        assert_eq!(
            generator_for(&inverted).err(),
            Some(ConfigError::InvertedDigitRange { n_min: 9, n_max: 0 })
        );
        assert!(matches!(
            generator_for(&centred_multiplier).err(),
            Some(ConfigError::NonPositiveAnchor { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "n_min must not exceed n_max")]
    fn digit_sum_generator_rejects_inverted_range() {
        let _ = DigitSumGenerator::new(1, 9, 0, 10);
    }
}
