//! SoC temperature reading.

use std::fs;
use std::path::Path;

use rover_types::RoverError;

/// Default sysfs node exposing the SoC temperature in millidegrees.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Read the temperature in °C from a sysfs thermal zone file.
///
/// # Errors
///
/// Returns [`RoverError::HardwareFault`] when the file is missing or does not
/// hold an integer millidegree value.
pub fn read_cpu_temp(path: impl AsRef<Path>) -> Result<f64, RoverError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| RoverError::hardware("thermal", format!("{}: {e}", path.display())))?;
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|e| RoverError::hardware("thermal", format!("bad reading {raw:?}: {e}")))?;
    Ok(millis as f64 / 1000.0)
}
