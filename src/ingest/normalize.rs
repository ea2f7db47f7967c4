/// Raw feed payload normalization.
///
/// Upstream feeds are inconsistent: the same payload may arrive as a single
/// object or an array, wrapped in a `{success, data}` envelope or bare, with
/// snake_case or camelCase keys, and with numbers encoded as strings. These
/// functions absorb all of that and always yield the typed records the core
/// consumes.
///
/// Entries that cannot be interpreted are skipped; a payload with no usable
/// shape at all is a `DataSourceUnavailable` error for the named feed.

use serde_json::Value;

use crate::ingest::{Nowcast, StationLevel};
use crate::model::{AdvisoryEntry, HazardError, WarningEntry};

// ---------------------------------------------------------------------------
// Envelope and field helpers
// ---------------------------------------------------------------------------

/// Unwraps a `{success, data}` envelope, failing on `success: false`.
fn unwrap_envelope<'a>(feed: &str, payload: &'a Value) -> Result<&'a Value, HazardError> {
    if let Some(obj) = payload.as_object() {
        if obj.get("success").and_then(Value::as_bool) == Some(false) {
            let reason = obj
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("feed reported success=false");
            return Err(HazardError::unavailable(feed, reason));
        }
        if let Some(data) = obj.get("data") {
            return Ok(data);
        }
    }
    Ok(payload)
}

/// Views a value as a list: arrays as-is, `null` as empty, anything else as
/// a single-element list.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// First present key among `keys`.
fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(k)).filter(|v| !v.is_null())
}

/// Numbers may arrive as JSON numbers or numeric strings.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn text(value: &Value, keys: &[&str]) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => field(value, keys).and_then(Value::as_str).map(str::to_string),
    }
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Per-feed normalizers
// ---------------------------------------------------------------------------

/// Weather warnings: `[{title}]`, a single `{title}`, or bare strings.
pub fn warnings_from_value(payload: &Value) -> Result<Vec<WarningEntry>, HazardError> {
    let data = unwrap_envelope("warnings", payload)?;
    let data = field(data, &["warnings", "items"]).unwrap_or(data);
    Ok(as_list(data)
        .into_iter()
        .filter_map(|item| text(item, &["title", "name", "headline"]))
        .map(|title| WarningEntry { title })
        .collect())
}

/// Advisory bulletins: `[{text}]`, a single `{text}`, or bare strings.
pub fn advisories_from_value(payload: &Value) -> Result<Vec<AdvisoryEntry>, HazardError> {
    let data = unwrap_envelope("advisories", payload)?;
    let data = field(data, &["advisories", "items"]).unwrap_or(data);
    Ok(as_list(data)
        .into_iter()
        .filter_map(|item| text(item, &["text", "body", "description"]))
        .map(|text| AdvisoryEntry { text })
        .collect())
}

/// Nowcast: a single object or the first element of an array.
///
/// A missing wind speed is treated as calm; a missing hourly rainfall makes
/// the payload unusable.
pub fn nowcast_from_value(payload: &Value) -> Result<Nowcast, HazardError> {
    let data = unwrap_envelope("nowcast", payload)?;
    let record = as_list(data)
        .into_iter()
        .next()
        .ok_or_else(|| HazardError::unavailable("nowcast", "empty payload"))?;

    let rainfall_1h = field(record, &["rainfall1h", "rainfall_1h", "precipitation1h"])
        .and_then(number)
        .ok_or_else(|| HazardError::unavailable("nowcast", "missing rainfall1h"))?;
    let rainfall_24h = field(record, &["rainfall24h", "rainfall_24h"]).and_then(number);
    let wind_speed = field(record, &["windSpeed", "wind_speed"])
        .and_then(number)
        .unwrap_or(0.0);

    Ok(Nowcast {
        rainfall_1h: rainfall_1h.max(0.0),
        rainfall_24h: rainfall_24h.map(|v| v.max(0.0)),
        wind_speed: wind_speed.max(0.0),
    })
}

/// River stages: `[{stationName, waterLevel}]` or a single object.
///
/// Stations reporting a non-numeric level (e.g. `"--"` while a gauge is
/// offline) are skipped.
pub fn station_levels_from_value(payload: &Value) -> Result<Vec<StationLevel>, HazardError> {
    let data = unwrap_envelope("water_level", payload)?;
    let data = field(data, &["stations"]).unwrap_or(data);
    if !(data.is_array() || data.is_object()) {
        return Err(HazardError::unavailable("water_level", "unexpected payload shape"));
    }
    Ok(as_list(data)
        .into_iter()
        .filter_map(|item| {
            let station_name = text(item, &["stationName", "station_name", "name"])?;
            let water_level = field(item, &["waterLevel", "water_level", "level"]).and_then(number)?;
            Some(StationLevel {
                station_name,
                water_level,
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
