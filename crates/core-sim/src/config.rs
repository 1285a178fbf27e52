use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: u32,
    pub width: u32,
}

impl Default for ImageShape {
    fn default() -> Self {
        Self {
            height: 250,
            width: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    #[default]
    DigitSum,
    Multiplier,
}

impl GeneratorKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "digit-sum" => Some(Self::DigitSum),
            "multiplier" => Some(Self::Multiplier),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DigitSum => "digit-sum",
            Self::Multiplier => "multiplier",
        }
    }
}

/// Startup configuration of a simulation run. Immutable once the
/// controller has been built from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub n_min: i64,
    pub n_max: i64,
    pub n_samples: u32,
    pub n_ticks: u64,
    /// Seconds between ticks. Only the session driver reads this.
    pub t_update: f64,
    pub image_shape: ImageShape,
    pub show_expected_value_line: bool,
    pub generator: GeneratorKind,
    pub seed: Option<u64>,
    pub one_action_per_tick: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            n_min: 0,
            n_max: 9,
            n_samples: 10,
            n_ticks: 100,
            t_update: 0.02,
            image_shape: ImageShape::default(),
            show_expected_value_line: true,
            generator: GeneratorKind::DigitSum,
            seed: None,
            one_action_per_tick: false,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_min > self.n_max {
            return Err(ConfigError::InvertedDigitRange {
                n_min: self.n_min,
                n_max: self.n_max,
            });
        }
        if self.n_samples == 0 {
            return Err(ConfigError::NonPositiveSamples);
        }
        if self.n_ticks == 0 {
            return Err(ConfigError::NonPositiveTicks);
        }
        // a multiplier walk needs a positive anchor: n_samples * (n_min + n_max) / 2 >= 1
        let doubled_anchor =
            i128::from(self.n_samples) * (i128::from(self.n_min) + i128::from(self.n_max));
        if self.generator == GeneratorKind::Multiplier && doubled_anchor < 2 {
            return Err(ConfigError::NonPositiveAnchor {
                n_min: self.n_min,
                n_max: self.n_max,
                n_samples: self.n_samples,
            });
        }
        if !self.t_update.is_finite() || self.t_update < 0.0 {
            return Err(ConfigError::InvalidTickInterval(self.t_update));
        }
        if self.image_shape.height == 0 || self.image_shape.width == 0 {
            return Err(ConfigError::EmptyCanvas);
        }
        if u64::from(self.image_shape.width) % self.n_ticks != 0 {
            return Err(ConfigError::CanvasNotDivisible {
                width: self.image_shape.width,
                n_ticks: self.n_ticks,
            });
        }

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.t_update.max(0.0))
    }

    /// Pixel width of one tick column on the render canvas.
    pub fn bar_width(&self) -> u32 {
        let bar = u64::from(self.image_shape.width) / self.n_ticks.max(1);
        u32::try_from(bar).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeneratorKind, ImageShape, SimConfig};
    use crate::error::ConfigError;

    #[test]
    fn defaults_match_documented_startup_values() {
        let config = SimConfig::default();

        assert_eq!(config.n_min, 0);
        assert_eq!(config.n_max, 9);
        assert_eq!(config.n_samples, 10);
        assert_eq!(config.n_ticks, 100);
        assert_eq!(config.t_update, 0.02);
        assert_eq!(
            config.image_shape,
            ImageShape {
                height: 250,
                width: 1000
            }
        );
        assert!(config.show_expected_value_line);
        assert_eq!(config.generator, GeneratorKind::DigitSum);
        assert_eq!(config.seed, None);
        assert!(!config.one_action_per_tick);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_digit_range() {
        let config = SimConfig {
            n_min: 5,
            n_max: 4,
            ..SimConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedDigitRange { n_min: 5, n_max: 4 })
        );
    }

    #[test]
    fn rejects_zero_samples_and_zero_ticks() {
        let no_samples = SimConfig {
            n_samples: 0,
            ..SimConfig::default()
        };
        let no_ticks = SimConfig {
            n_ticks: 0,
            ..SimConfig::default()
        };

        assert_eq!(no_samples.validate(), Err(ConfigError::NonPositiveSamples));
        assert_eq!(no_ticks.validate(), Err(ConfigError::NonPositiveTicks));
    }

    #[test]
    fn rejects_invalid_tick_interval() {
        let negative = SimConfig {
            t_update: -0.5,
            ..SimConfig::default()
        };
        let nan = SimConfig {
            t_update: f64::NAN,
            ..SimConfig::default()
        };

        assert!(matches!(
            negative.validate(),
            Err(ConfigError::InvalidTickInterval(_))
        ));
        assert!(matches!(
            nan.validate(),
            Err(ConfigError::InvalidTickInterval(_))
        ));
    }

    #[test]
    fn rejects_canvas_width_not_divisible_by_tick_count() {
        let config = SimConfig {
            n_ticks: 7,
            ..SimConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::CanvasNotDivisible {
                width: 1000,
                n_ticks: 7
            })
        );
    }

    #[test]
    fn rejects_zero_sized_canvas() {
        let flat = SimConfig {
            image_shape: ImageShape {
                height: 0,
                width: 1000,
            },
            ..SimConfig::default()
        };
        let narrow = SimConfig {
            image_shape: ImageShape {
                height: 250,
                width: 0,
            },
            ..SimConfig::default()
        };

        assert_eq!(flat.validate(), Err(ConfigError::EmptyCanvas));
        assert_eq!(narrow.validate(), Err(ConfigError::EmptyCanvas));
    }

    #[test]
    fn multiplier_requires_a_positive_expected_value() {
        let centred = SimConfig {
            n_min: -5,
            n_max: 5,
            generator: GeneratorKind::Multiplier,
            ..SimConfig::default()
        };
        let negative = SimConfig {
            n_min: -9,
            n_max: -1,
            generator: GeneratorKind::Multiplier,
            ..SimConfig::default()
        };

        assert_eq!(
            centred.validate(),
            Err(ConfigError::NonPositiveAnchor {
                n_min: -5,
                n_max: 5,
                n_samples: 10
            })
        );
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::NonPositiveAnchor { .. })
        ));

        // the digit-sum generator has no such restriction
        let digit_sum = SimConfig {
            generator: GeneratorKind::DigitSum,
            ..centred
        };
        assert_eq!(digit_sum.validate(), Ok(()));

        let smallest = SimConfig {
            n_min: 0,
            n_max: 1,
            n_samples: 2,
            ..centred
        };
        assert_eq!(smallest.validate(), Ok(()));
    }

    #[test]
    fn equal_digit_bounds_are_accepted() {
        let config = SimConfig {
            n_min: 3,
            n_max: 3,
            ..SimConfig::default()
        };

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn bar_width_divides_canvas_by_tick_count() {
        assert_eq!(SimConfig::default().bar_width(), 10);
    }

    #[test]
    fn generator_kind_parses_its_own_names() {
        for kind in [GeneratorKind::DigitSum, GeneratorKind::Multiplier] {
            assert_eq!(GeneratorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(GeneratorKind::parse("gaussian"), None);
    }
}
