use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::devlog::DEV_TARGET;
use crate::errors::{BridgeError, BridgeResult};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const KEEP: u32 = 7;

/// Initializes logging from `log4rs.yaml` in the working directory, if present.
pub fn init() -> BridgeResult<()> {
    init_path(Path::new("log4rs.yaml"))
}

/// # Errors
/// `Config` when the file exists but cannot be used.
pub fn init_path(path: &Path) -> BridgeResult<()> {
    if !path.exists() {
        return Ok(());
    }
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| BridgeError::Config(format!("log config {}: {e}", path.display())))
}

/// Parses `error|warn|info|debug|trace`; anything else is `info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, stem: &str) -> BridgeResult<RollingFileAppender> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), KEEP)
        .map_err(|e| BridgeError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))
        .map_err(BridgeError::from)
}

/// Builds the log4rs config: `{name}.log` for the root logger and, when
/// `dev_trace` is set, `{name}_dev.log` for `dev_trace!` lines.
///
/// # Errors
/// `Io` if the directory or files cannot be created, `Config` for a rejected config.
pub fn build_config(dir: &Path, name: &str, level: LevelFilter, dev_trace: bool) -> BridgeResult<Config> {
    std::fs::create_dir_all(dir)?;
    let mut builder =
        Config::builder().appender(Appender::builder().build("app", Box::new(rolling(dir, name)?)));
    builder = if dev_trace {
        builder
            .appender(Appender::builder().build("dev", Box::new(rolling(dir, &format!("{name}_dev"))?)))
            .logger(Logger::builder().appender("dev").additive(false).build(DEV_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV_TARGET, LevelFilter::Off))
    };
    builder
        .build(Root::builder().appender("app").build(level))
        .map_err(|e| BridgeError::Config(e.to_string()))
}

/// Logs to `{base_dir}/{name}_logs/{name}.log` at info level.
///
/// # Errors
/// Directory creation failures, or a logger that is already installed.
pub fn init_in(base_dir: &Path, name: &str) -> BridgeResult<()> {
    let dir = base_dir.join(format!("{name}_logs"));
    let config = build_config(&dir, name, LevelFilter::Info, false)?;
    log4rs::init_config(config).map_err(|e| BridgeError::Config(e.to_string()))?;
    Ok(())
}

/// Process-wide logging. `dir` defaults to the working directory. A second
/// call after a logger is installed is ignored.
///
/// # Errors
/// Directory creation or appender failures.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, dev_trace: bool) -> BridgeResult<()> {
    let base = dir.map_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")), PathBuf::from);
    let config = build_config(&base, "docbridge", parse_level(level), dev_trace)?;
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already installed; keeping existing configuration");
    }
    Ok(())
}
