use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;
use serde_json::Value;

use super::SaveData;

/// Serializes `value` to JSON, dropping `_`-prefixed keys and empty objects.
pub fn to_storage_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let value = serde_json::to_value(value).context("failed to serialize save payload")?;
    let value = prune(value).unwrap_or(Value::Null);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    json.context("failed to serialize save payload to JSON")
}

pub fn save_to_json_string(save_data: &SaveData) -> Result<String> {
    to_storage_json(save_data, false)
}

pub fn load_from_json_string(json: &str) -> Result<SaveData> {
    serde_json::from_str(json).context("failed to parse save JSON")
}

pub fn export_to_base64(save_data: &SaveData) -> Result<String> {
    let json = save_to_json_string(save_data)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

pub fn import_from_base64(encoded: &str) -> Result<SaveData> {
    let json = decode_base64(encoded)?;
    load_from_json_string(&json)
}

/// Decodes a stored payload into a JSON value. Accepts base64-wrapped JSON
/// and, failing that, raw JSON.
pub fn decode_payload(payload: &str) -> Result<Value> {
    if let Ok(json) = decode_base64(payload)
        && let Ok(value) = serde_json::from_str(&json)
    {
        return Ok(value);
    }
    serde_json::from_str(payload.trim()).context("save payload is neither base64 nor JSON")
}

fn decode_base64(encoded: &str) -> Result<String> {
    let raw = STANDARD
        .decode(encoded.trim())
        .context("failed to decode base64 save payload")?;
    String::from_utf8(raw).context("decoded base64 payload is not UTF-8")
}

fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let pruned: serde_json::Map<String, Value> = map
                .into_iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .filter_map(|(key, value)| prune(value).map(|value| (key, value)))
                .collect();
            (!pruned.is_empty()).then_some(Value::Object(pruned))
        }
        Value::Array(items) => Some(Value::Array(
            items
                .into_iter()
                .map(|item| prune(item).unwrap_or(Value::Null))
                .collect(),
        )),
        other => Some(other),
    }
}
