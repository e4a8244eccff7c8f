//! Bridge configuration from TOML files and environment variables.
//!
//! Precedence: explicit path > `DOCBRIDGE_CONFIG` > `./docbridge.toml` >
//! defaults. The `DOCBRIDGE_*_PREFIX` variables then override whatever the
//! files set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{BridgeError, BridgeResult};
use crate::value::{CodecOptions, DateFormat};

pub const CONFIG_ENV: &str = "DOCBRIDGE_CONFIG";
pub const DATE_PREFIX_ENV: &str = "DOCBRIDGE_DATE_PREFIX";
pub const REFERENCE_PREFIX_ENV: &str = "DOCBRIDGE_REFERENCE_PREFIX";
pub const TIMESTAMP_PREFIX_ENV: &str = "DOCBRIDGE_TIMESTAMP_PREFIX";
pub const GEOPOINT_PREFIX_ENV: &str = "DOCBRIDGE_GEOPOINT_PREFIX";
pub const DEFAULT_CONFIG_FILE: &str = "docbridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub date_prefix: Option<String>,
    pub reference_prefix: Option<String>,
    pub timestamp_prefix: Option<String>,
    pub geopoint_prefix: Option<String>,
    pub date_format: Option<DateFormat>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub dev_trace: Option<bool>,
}

impl BridgeConfig {
    /// # Errors
    /// `Toml` for invalid TOML or unknown value shapes.
    pub fn from_toml_str(s: &str) -> BridgeResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// `Io` if the file cannot be read, `Toml` if it does not parse.
    pub fn from_file(path: &Path) -> BridgeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Fills unset fields from `other`.
    fn fill_from(&mut self, other: Self) {
        if self.date_prefix.is_none() {
            self.date_prefix = other.date_prefix;
        }
        if self.reference_prefix.is_none() {
            self.reference_prefix = other.reference_prefix;
        }
        if self.timestamp_prefix.is_none() {
            self.timestamp_prefix = other.timestamp_prefix;
        }
        if self.geopoint_prefix.is_none() {
            self.geopoint_prefix = other.geopoint_prefix;
        }
        if self.date_format.is_none() {
            self.date_format = other.date_format;
        }
        if self.log_dir.is_none() {
            self.log_dir = other.log_dir;
        }
        if self.log_level.is_none() {
            self.log_level = other.log_level;
        }
        if self.dev_trace.is_none() {
            self.dev_trace = other.dev_trace;
        }
    }

    /// Codec options with defaults for anything unset.
    ///
    /// # Errors
    /// `Config` if the resulting prefixes are empty or overlap.
    pub fn codec_options(&self) -> BridgeResult<CodecOptions> {
        let mut options = CodecOptions::default();
        if let Some(p) = &self.date_prefix {
            options.date_prefix.clone_from(p);
        }
        if let Some(p) = &self.reference_prefix {
            options.reference_prefix.clone_from(p);
        }
        if let Some(p) = &self.timestamp_prefix {
            options.timestamp_prefix.clone_from(p);
        }
        if let Some(p) = &self.geopoint_prefix {
            options.geopoint_prefix.clone_from(p);
        }
        if let Some(f) = self.date_format {
            options.date_format = f;
        }
        options.validate()?;
        Ok(options)
    }
}

/// Candidate files, highest precedence first.
pub fn config_paths(
    explicit: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
    cwd: Option<&Path>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = env(CONFIG_ENV) {
        paths.push(PathBuf::from(p));
    }
    if let Some(cwd) = cwd {
        paths.push(cwd.join(DEFAULT_CONFIG_FILE));
    }
    paths
}

/// Loads configuration from the process environment and working directory.
///
/// # Errors
/// `Config` if an explicit file is missing; `Io`/`Toml` for unreadable files.
pub fn load_config(explicit: Option<&Path>) -> BridgeResult<BridgeConfig> {
    let cwd = std::env::current_dir().ok();
    load_config_with(explicit, &|k: &str| std::env::var(k).ok(), cwd.as_deref())
}

/// [`load_config`] with the environment and working directory supplied.
///
/// # Errors
/// Same as [`load_config`].
pub fn load_config_with(
    explicit: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
    cwd: Option<&Path>,
) -> BridgeResult<BridgeConfig> {
    if let Some(p) = explicit
        && !p.exists()
    {
        return Err(BridgeError::Config(format!("config file not found: {}", p.display())));
    }
    let mut cfg = BridgeConfig::default();
    for path in config_paths(explicit, env, cwd) {
        if path.exists() {
            log::debug!("reading config {}", path.display());
            cfg.fill_from(BridgeConfig::from_file(&path)?);
        }
    }
    if let Some(p) = env(DATE_PREFIX_ENV) {
        cfg.date_prefix = Some(p);
    }
    if let Some(p) = env(REFERENCE_PREFIX_ENV) {
        cfg.reference_prefix = Some(p);
    }
    if let Some(p) = env(TIMESTAMP_PREFIX_ENV) {
        cfg.timestamp_prefix = Some(p);
    }
    if let Some(p) = env(GEOPOINT_PREFIX_ENV) {
        cfg.geopoint_prefix = Some(p);
    }
    Ok(cfg)
}

/// Applies a JSON options payload `{"datePrefix", "referencePrefix",
/// "timestampPrefix", "geopointPrefix", "dateFormat"}` on top of `base`. Absent keys keep their current value.
///
/// # Errors
/// `Parse` for a non-object payload or wrongly typed keys, `Config` for
/// invalid resulting prefixes.
pub fn apply_json_options(base: CodecOptions, payload: &Value) -> BridgeResult<CodecOptions> {
    let Value::Object(obj) = payload else {
        return Err(BridgeError::Parse("options must be a JSON object".into()));
    };
    let mut options = base;
    if let Some(v) = obj.get("datePrefix") {
        options.date_prefix = string_option(v, "datePrefix")?;
    }
    if let Some(v) = obj.get("referencePrefix") {
        options.reference_prefix = string_option(v, "referencePrefix")?;
    }
    if let Some(v) = obj.get("timestampPrefix") {
        options.timestamp_prefix = string_option(v, "timestampPrefix")?;
    }
    if let Some(v) = obj.get("geopointPrefix") {
        options.geopoint_prefix = string_option(v, "geopointPrefix")?;
    }
    if let Some(v) = obj.get("dateFormat") {
        options.date_format = parse_date_format(&string_option(v, "dateFormat")?)?;
    }
    options.validate()?;
    Ok(options)
}

fn string_option(v: &Value, key: &str) -> BridgeResult<String> {
    v.as_str()
        .map(str::to_owned)
        .ok_or_else(|| BridgeError::Parse(format!("option '{key}' must be a string")))
}

/// # Errors
/// `Parse` for an unrecognised format name.
pub fn parse_date_format(s: &str) -> BridgeResult<DateFormat> {
    match s {
        "prefixed" => Ok(DateFormat::Prefixed),
        "seconds_nanos" | "secondsNanos" | "timestamp" => Ok(DateFormat::SecondsNanos),
        other => Err(BridgeError::Parse(format!("unknown date format '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn toml_fields_parse() {
        let cfg = BridgeConfig::from_toml_str(
            "date_prefix = \"@D:\"\ndate_format = \"seconds_nanos\"\nlog_level = \"debug\"\n",
        )
        .unwrap();
        assert_eq!(cfg.date_prefix.as_deref(), Some("@D:"));
        assert_eq!(cfg.date_format, Some(DateFormat::SecondsNanos));
        let opts = cfg.codec_options().unwrap();
        assert_eq!(opts.reference_prefix, crate::value::DEFAULT_REFERENCE_PREFIX);
    }

    #[test]
    fn explicit_file_wins_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("a.toml");
        let env_file = dir.path().join("b.toml");
        std::fs::write(&explicit, "date_prefix = \"A:\"\n").unwrap();
        std::fs::write(&env_file, "date_prefix = \"B:\"\nlog_level = \"warn\"\n").unwrap();
        let env_path = env_file.display().to_string();

        let env = env_of(&[(CONFIG_ENV, env_path.as_str())]);
        let cfg = load_config_with(Some(&explicit), &env, None).unwrap();
        assert_eq!(cfg.date_prefix.as_deref(), Some("A:"));
        assert_eq!(cfg.log_level.as_deref(), Some("warn"));

        let env = env_of(&[(CONFIG_ENV, env_path.as_str()), (DATE_PREFIX_ENV, "E:")]);
        let cfg = load_config_with(Some(&explicit), &env, None).unwrap();
        assert_eq!(cfg.date_prefix.as_deref(), Some("E:"));
    }

    #[test]
    fn working_directory_file_is_last() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "reference_prefix = \"R:\"\n").unwrap();
        let cfg = load_config_with(None, &env_of(&[]), Some(dir.path())).unwrap();
        assert_eq!(cfg.reference_prefix.as_deref(), Some("R:"));
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(load_config_with(None, &env_of(&[]), Some(empty.path())).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config_with(Some(Path::new("/nonexistent/docbridge.toml")), &env_of(&[]), None);
        assert!(matches!(err, Err(BridgeError::Config(_))));
    }

    #[test]
    fn json_options_patch_codec_options() {
        let opts = apply_json_options(
            CodecOptions::default(),
            &json!({"datePrefix": "D|", "dateFormat": "secondsNanos"}),
        )
        .unwrap();
        assert_eq!(opts.date_prefix, "D|");
        assert_eq!(opts.date_format, DateFormat::SecondsNanos);
        assert!(matches!(
            apply_json_options(CodecOptions::default(), &json!({"datePrefix": 3})),
            Err(BridgeError::Parse(_))
        ));
        assert!(matches!(
            apply_json_options(CodecOptions::default(), &json!({"datePrefix": ""})),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn native_prefixes_come_from_toml_env_and_json() {
        let cfg = BridgeConfig::from_toml_str("timestamp_prefix = \"TS|\"\n").unwrap();
        let opts = cfg.codec_options().unwrap();
        assert_eq!(opts.timestamp_prefix, "TS|");
        assert_eq!(opts.geopoint_prefix, crate::value::DEFAULT_GEOPOINT_PREFIX);

        let env = env_of(&[(GEOPOINT_PREFIX_ENV, "GP|")]);
        let cfg = load_config_with(None, &env, None).unwrap();
        assert_eq!(cfg.geopoint_prefix.as_deref(), Some("GP|"));

        let opts = apply_json_options(opts, &json!({"geopointPrefix": "G|"})).unwrap();
        assert_eq!((opts.timestamp_prefix.as_str(), opts.geopoint_prefix.as_str()), ("TS|", "G|"));
        assert!(matches!(
            apply_json_options(CodecOptions::default(), &json!({"timestampPrefix": "__DATE:"})),
            Err(BridgeError::Config(_))
        ));
    }
}
