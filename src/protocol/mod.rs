//! Wire types of the Deezer services.
//!
//! * [`gateway`] - Private gateway API: session data and track descriptors
//! * [`media`] - Media URL resolution
//!
//! Responses are parsed through [`json`], which logs payloads at TRACE
//! level for protocol analysis.

pub mod gateway;
pub mod media;

use crate::error::Result;
use serde::Deserialize;
use std::fmt::Debug;

/// Parses and logs a JSON response.
///
/// # Logging
///
/// * Success: parsed structure at TRACE level
/// * Structure mismatch: raw JSON at TRACE level
/// * Invalid JSON: ERROR level, raw text at TRACE level
///
/// # Errors
///
/// Returns `InvalidArgument` if the body does not deserialize into `T`.
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}
