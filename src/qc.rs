use std::path::Path;

use crate::error::{EnrichError, Result};

pub fn check_range_f64(value: f64, min: f64, max: f64, exclusive: bool, name: &str) -> Result<()> {
    if !value.is_finite() {
        return Err(EnrichError::InvalidArgument(format!(
            "Value of {name} should be finite"
        )));
    }
    let below = if exclusive { value <= min } else { value < min };
    if below {
        return Err(EnrichError::InvalidArgument(format!(
            "Value of {name} should be above {min}"
        )));
    }
    let above = if exclusive { value >= max } else { value > max };
    if above {
        return Err(EnrichError::InvalidArgument(format!(
            "Value of {name} should be below {max}"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        return Err(EnrichError::InvalidArgument(format!(
            "File {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}
