use serde_json::Value;
use tracing::warn;

/// The body could not be mapped to a non-null item array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    NotJson(String),
    MissingKey { key: String },
    NotAnArray { key: String },
    NoArrayFound,
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeError::NotJson(e) => write!(f, "response is not JSON: {e}"),
            ShapeError::MissingKey { key } => write!(f, "response has no `{key}` field"),
            ShapeError::NotAnArray { key } => write!(f, "response field `{key}` is not an array"),
            ShapeError::NoArrayFound => write!(f, "response holds no item array"),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Returns the raw items of `payload`.
///
/// With an expected key the lookup is strict. Without one the body may be a
/// bare array, or the first array-valued top-level key is taken (degraded
/// mode, logged every time).
pub fn locate_items<'a>(
    payload: &'a Value,
    expected_key: Option<&str>,
) -> Result<&'a [Value], ShapeError> {
    if let Some(key) = expected_key {
        let value = payload
            .as_object()
            .and_then(|obj| obj.get(key))
            .ok_or_else(|| ShapeError::MissingKey {
                key: key.to_string(),
            })?;
        return value
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| ShapeError::NotAnArray {
                key: key.to_string(),
            });
    }

    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(obj) => {
            let (key, items) = obj
                .iter()
                .find_map(|(k, v)| v.as_array().map(|a| (k, a)))
                .ok_or(ShapeError::NoArrayFound)?;
            warn!("no payload key configured; using first array field `{key}`");
            Ok(items)
        }
        _ => Err(ShapeError::NoArrayFound),
    }
}
