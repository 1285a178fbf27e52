use std::{net::SocketAddr, path::PathBuf};

use clap::{ArgAction, Parser};
use core_sim::{ConfigError, GeneratorKind, ImageShape, SimConfig};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TRADES_OUTPUT: &str = "trades.csv";

#[derive(Debug, Clone, Parser)]
#[command(name = "sim-server", about = "Tick-driven trading simulator")]
pub struct Cli {
    /// Largest digit a price sample can draw.
    #[arg(long = "n_max", env = "SIM_N_MAX", default_value_t = 9, allow_negative_numbers = true)]
    pub n_max: i64,

    /// Smallest digit a price sample can draw.
    #[arg(long = "n_min", env = "SIM_N_MIN", default_value_t = 0, allow_negative_numbers = true)]
    pub n_min: i64,

    /// Digits summed into each price.
    #[arg(long = "n_samples", env = "SIM_N_SAMPLES", default_value_t = 10)]
    pub n_samples: u32,

    /// Ticks before the session stops on its own.
    #[arg(long = "n_ticks", env = "SIM_N_TICKS", default_value_t = 100)]
    pub n_ticks: u64,

    /// Seconds between ticks.
    #[arg(long = "t_update", env = "SIM_T_UPDATE", default_value_t = 0.02)]
    pub t_update: f64,

    /// Canvas size as `height,width`.
    #[arg(
        long = "image_shape",
        env = "SIM_IMAGE_SHAPE",
        default_value = "250,1000",
        value_parser = parse_image_shape
    )]
    pub image_shape: ImageShape,

    #[arg(
        long = "show_expected_value_line",
        env = "SIM_SHOW_EXPECTED_VALUE_LINE",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub show_expected_value_line: bool,

    /// Price process: `digit-sum` or `multiplier`.
    #[arg(
        long = "generator",
        env = "SIM_GENERATOR",
        default_value = "digit-sum",
        value_parser = parse_generator
    )]
    pub generator: GeneratorKind,

    /// Fixes the random stream for reproducible sessions.
    #[arg(long = "seed", env = "SIM_SEED")]
    pub seed: Option<u64>,

    /// Reject a second buy or sell inside the same tick.
    #[arg(
        long = "one_action_per_tick",
        env = "SIM_ONE_ACTION_PER_TICK",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub one_action_per_tick: bool,

    /// Trailing samples carried by each streamed frame; the whole history when unset.
    #[arg(long = "snapshot_window", env = "SIM_SNAPSHOT_WINDOW")]
    pub snapshot_window: Option<usize>,

    #[arg(long = "listen_addr", env = "SIM_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Closed trades are written here when the session ends.
    #[arg(long = "trades_output", env = "SIM_TRADES_OUTPUT", default_value = DEFAULT_TRADES_OUTPUT)]
    pub trades_output: PathBuf,
}

impl Cli {
    pub fn sim_config(&self) -> Result<SimConfig, ConfigError> {
        let config = SimConfig {
            n_min: self.n_min,
            n_max: self.n_max,
            n_samples: self.n_samples,
            n_ticks: self.n_ticks,
            t_update: self.t_update,
            image_shape: self.image_shape,
            show_expected_value_line: self.show_expected_value_line,
            generator: self.generator,
            seed: self.seed,
            one_action_per_tick: self.one_action_per_tick,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Accepts `250,1000`, `250x1000` or `(250, 1000)`.
fn parse_image_shape(value: &str) -> Result<ImageShape, String> {
    let trimmed = value
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let (height, width) = trimmed
        .split_once(',')
        .or_else(|| trimmed.split_once('x'))
        .ok_or_else(|| format!("expected `height,width`, got `{value}`"))?;

    let parse = |part: &str, name: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid image {name} `{}`: {err}", part.trim()))
    };

    Ok(ImageShape {
        height: parse(height, "height")?,
        width: parse(width, "width")?,
    })
}

fn parse_generator(value: &str) -> Result<GeneratorKind, String> {
    GeneratorKind::parse(value.trim())
        .ok_or_else(|| format!("generator must be one of: digit-sum, multiplier (got `{value}`)"))
}

#[cfg(test)]
mod tests {
    use std::{env, sync::Mutex};

    use clap::Parser;
    use core_sim::{ConfigError, GeneratorKind, ImageShape, SimConfig};

    use super::{parse_image_shape, Cli};

    static ENV_LOCK: Mutex<()> = Mutex::new(());
    const ENV_KEYS: [&str; 13] = [
        "SIM_N_MAX",
        "SIM_N_MIN",
        "SIM_N_SAMPLES",
        "SIM_N_TICKS",
        "SIM_T_UPDATE",
        "SIM_IMAGE_SHAPE",
        "SIM_SHOW_EXPECTED_VALUE_LINE",
        "SIM_GENERATOR",
        "SIM_SEED",
        "SIM_ONE_ACTION_PER_TICK",
        "SIM_SNAPSHOT_WINDOW",
        "SIM_LISTEN_ADDR",
        "SIM_TRADES_OUTPUT",
    ];

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        fn unset(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    fn reset_config_env_baseline() -> Vec<EnvVarGuard> {
        ENV_KEYS.iter().map(|&key| EnvVarGuard::unset(key)).collect()
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sim-server").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_simulator_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let cli = parse(&[]).unwrap();

        assert_eq!(cli.sim_config().unwrap(), SimConfig::default());
        assert_eq!(cli.listen_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cli.trades_output.to_str(), Some("trades.csv"));
        assert_eq!(cli.snapshot_window, None);
    }

    #[test]
    fn underscore_flags_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let cli = parse(&[
            "--n_max",
            "5",
            "--n_min",
            "-1",
            "--n_samples",
            "4",
            "--n_ticks",
            "50",
            "--t_update",
            "0.5",
            "--image_shape",
            "(100, 500)",
            "--show_expected_value_line",
            "false",
            "--generator",
            "multiplier",
            "--seed",
            "42",
            "--one_action_per_tick",
        ])
        .unwrap();
        let config = cli.sim_config().unwrap();

        assert_eq!(config.n_max, 5);
        assert_eq!(config.n_min, -1);
        assert_eq!(config.n_samples, 4);
        assert_eq!(config.n_ticks, 50);
        assert_eq!(config.t_update, 0.5);
        assert_eq!(
            config.image_shape,
            ImageShape {
                height: 100,
                width: 500
            }
        );
        assert!(!config.show_expected_value_line);
        assert_eq!(config.generator, GeneratorKind::Multiplier);
        assert_eq!(config.seed, Some(42));
        assert!(config.one_action_per_tick);
    }

    #[test]
    fn environment_fills_in_missing_flags() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _ticks = EnvVarGuard::set("SIM_N_TICKS", "20");
        let _addr = EnvVarGuard::set("SIM_LISTEN_ADDR", "127.0.0.1:9090");

        let cli = parse(&["--n_ticks", "40"]).unwrap();

        assert_eq!(cli.n_ticks, 40);
        assert_eq!(cli.listen_addr.to_string(), "127.0.0.1:9090");
    }

    #[test]
    fn inverted_digit_range_is_a_config_error() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let cli = parse(&["--n_min", "9", "--n_max", "0"]).unwrap();

        assert_eq!(
            cli.sim_config().unwrap_err(),
            ConfigError::InvertedDigitRange { n_min: 9, n_max: 0 }
        );
    }

    #[test]
    fn canvas_width_must_divide_by_tick_count() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let cli = parse(&["--n_ticks", "300"]).unwrap();

        assert!(matches!(
            cli.sim_config(),
            Err(ConfigError::CanvasNotDivisible { .. })
        ));
    }

    #[test]
    fn unknown_generator_is_rejected_by_the_parser() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        assert!(parse(&["--generator", "gbm"]).is_err());
    }

    #[test]
    fn image_shape_accepts_common_spellings() {
        let expected = ImageShape {
            height: 250,
            width: 1000,
        };

        assert_eq!(parse_image_shape("250,1000"), Ok(expected));
        assert_eq!(parse_image_shape("(250, 1000)"), Ok(expected));
        assert_eq!(parse_image_shape("250x1000"), Ok(expected));
        assert!(parse_image_shape("250").is_err());
        assert!(parse_image_shape("tall,wide").is_err());
    }
}
