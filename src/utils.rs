use num::{FromPrimitive, traits::WrappingAdd};
use std::{env, time::Duration};
use tracing::warn;

/// Wait timeout used when the environment does not give a usable one
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Increments a mutable reference in place, and returns the original value
pub(crate) fn wrapping_inplace_add<T: WrappingAdd + FromPrimitive + Copy>(value: &mut T) -> T {
    let id = *value;
    *value = value.wrapping_add(&T::from_u8(1).unwrap());
    id
}

/// Get the get/put wait timeout, either from environment or default 5 seconds
pub fn get_default_wait_timeout() -> Duration {
    parse_wait_timeout(env::var("EPICS_PVA_WAIT_TIMEOUT").ok().as_deref())
}

/// Interpret a timeout setting in (fractional) seconds
///
/// Anything that is not a finite, strictly positive number of seconds falls back
/// to [`DEFAULT_WAIT_TIMEOUT`].
pub(crate) fn parse_wait_timeout(setting: Option<&str>) -> Duration {
    let Some(setting) = setting else {
        return DEFAULT_WAIT_TIMEOUT;
    };
    match setting
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    {
        Some(timeout) => timeout,
        None => {
            warn!("Ignoring unusable EPICS_PVA_WAIT_TIMEOUT '{setting}'");
            DEFAULT_WAIT_TIMEOUT
        }
    }
}
