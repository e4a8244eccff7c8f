pub mod bridge;
pub mod config;
pub mod devlog;
pub mod errors;
pub mod logger;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod value;

pub use bridge::{Bridge, Dispatcher, ResultCallback};
pub use errors::{BridgeError, BridgeResult};
pub use query::{PipelineWarning, Query, QueryPipeline};
pub use snapshot::{PluginResult, SnapshotTranslator};
pub use store::{DocumentStore, ListenOptions, ListenerRegistration, MemoryStore};
pub use value::{CodecOptions, FieldValue, ValueCodec};

use std::path::Path;

/// Loads configuration, installs its codec options process-wide and sets up
/// logging from it. Returns the loaded configuration.
///
/// # Errors
/// Config loading, option validation, or logger setup failures.
pub fn init(config_path: Option<&Path>) -> BridgeResult<config::BridgeConfig> {
    let cfg = config::load_config(config_path)?;
    value::install_options(cfg.codec_options()?)?;
    if cfg.log_dir.is_some() || cfg.log_level.is_some() {
        logger::configure_logging(cfg.log_dir.as_deref(), cfg.log_level.as_deref(), cfg.dev_trace.unwrap_or(false))?;
    }
    Ok(cfg)
}
