use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::constants::LOG_ENV_VAR;

/// Initialize logging, given a verbosity level.
///
/// The level is the difference between `-v` and `-q` occurrences on the command line.
/// If set, the environment variable `LAGTRACE_LOG` takes precedence.
pub fn init(verbosity_level: i8) {
    let default_level = match verbosity_level {
        i8::MIN..=-2 => LevelFilter::Off,
        -1 => LevelFilter::Error,
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        3..=i8::MAX => LevelFilter::Trace,
    };

    Builder::from_env(Env::default().filter_or(LOG_ENV_VAR, default_level.as_str()))
        .format_timestamp_millis()
        .init();

    info!("Logging initialized (default level: {default_level})");
}
