//! Configuration Vault – reads/writes `~/.rover/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use rover_hal::thermal::DEFAULT_THERMAL_ZONE;

/// Persisted rover configuration.  Every field has a default, so a partial
/// file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP port for the control surface.
    pub http_port: u16,

    /// Identifier written into every persisted telemetry row.
    pub vehicle_id: String,

    /// SQLite telemetry database.
    pub database_path: PathBuf,

    /// Control-loop period in milliseconds.
    pub tick_period_ms: u64,

    /// Sound clip played by the horn.
    pub horn_sound: PathBuf,

    /// sysfs node holding the SoC temperature in millidegrees.
    pub cpu_temp_path: PathBuf,
}

impl Config {
    /// Defaults with every per-user path rooted at `home`.
    pub fn for_home(home: &Path) -> Self {
        let dir = home.join(".rover");
        Self {
            http_port: 5000,
            vehicle_id: "rover-01".to_string(),
            database_path: dir.join("telemetry.db"),
            tick_period_ms: 50,
            horn_sound: dir.join("sounds").join("car-double-horn.wav"),
            cpu_temp_path: PathBuf::from(DEFAULT_THERMAL_ZONE),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_home(&home_dir())
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &Path) -> PathBuf {
    home.join(".rover").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_HTTP_PORT` | `http_port` |
/// | `ROVER_VEHICLE_ID` | `vehicle_id` |
/// | `ROVER_DATABASE_PATH` | `database_path` |
/// | `ROVER_TICK_MS` | `tick_period_ms` |
/// | `ROVER_HORN_SOUND` | `horn_sound` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROVER_HTTP_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.http_port = port;
    }
    if let Ok(v) = std::env::var("ROVER_VEHICLE_ID")
        && !v.trim().is_empty()
    {
        cfg.vehicle_id = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("ROVER_DATABASE_PATH") {
        cfg.database_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("ROVER_TICK_MS")
        && let Ok(ms) = v.parse::<u64>()
        && ms > 0
    {
        cfg.tick_period_ms = ms;
    }
    if let Ok(v) = std::env::var("ROVER_HORN_SOUND") {
        cfg.horn_sound = PathBuf::from(v);
    }
}

/// Save the config to disk, creating `~/.rover/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(dir.path());

        save_to(&Config::for_home(dir.path()), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_meta = std::fs::metadata(path.parent().unwrap()).unwrap();
        let dir_mode = dir_meta.permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(dir.path());
        let cfg = Config::for_home(dir.path());
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.http_port, 5000);
        assert_eq!(loaded.tick_period_ms, 50);
        assert!(loaded.database_path.ends_with(".rover/telemetry.db"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "vehicle_id = \"rover-42\"\n").unwrap();
        let loaded = load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.vehicle_id, "rover-42");
        assert_eq!(loaded.http_port, 5000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "http_port = \"five thousand\"\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn config_path_points_to_rover_dir() {
        let p = config_path_for_home(Path::new("/home/testuser"));
        assert_eq!(p, PathBuf::from("/home/testuser/.rover/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        assert!(load_from(&config_path_for_home(dir.path())).unwrap().is_none());
    }

    // Env-var tests share one function so they never race each other.
    #[test]
    fn apply_env_overrides() {
        // SAFETY: the only test in this crate that touches these variables.
        unsafe {
            std::env::set_var("ROVER_HTTP_PORT", "8181");
            std::env::set_var("ROVER_VEHICLE_ID", " rover-07 ");
            std::env::set_var("ROVER_TICK_MS", "not-a-number");
            std::env::set_var("ROVER_DATABASE_PATH", "/tmp/t.db");
        }
        let mut cfg = Config::for_home(Path::new("/home/x"));
        super::apply_env_overrides(&mut cfg);
        assert_eq!(cfg.http_port, 8181);
        assert_eq!(cfg.vehicle_id, "rover-07");
        assert_eq!(cfg.tick_period_ms, 50);
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/t.db"));

        unsafe { std::env::set_var("ROVER_TICK_MS", "0") };
        super::apply_env_overrides(&mut cfg);
        assert_eq!(cfg.tick_period_ms, 50);

        unsafe {
            std::env::remove_var("ROVER_HTTP_PORT");
            std::env::remove_var("ROVER_VEHICLE_ID");
            std::env::remove_var("ROVER_TICK_MS");
            std::env::remove_var("ROVER_DATABASE_PATH");
        }
    }
}
