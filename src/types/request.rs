//! Decoding of `/predict` request bodies

use crate::error::ServiceError;
use crate::types::iris::{IrisFeatures, FEATURE_COUNT, FEATURE_NAMES};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Body of a `/predict` request.
///
/// `features` stays untyped here so that decoding can tell a missing field
/// (invalid request) apart from a field of the wrong shape.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub features: Value,
}

impl PredictRequest {
    /// Decode a raw body. Anything other than a JSON object carrying
    /// `features` is an invalid request.
    pub fn from_slice(body: &[u8]) -> Result<Self, ServiceError> {
        let object: Map<String, Value> =
            serde_json::from_slice(body).map_err(|_| ServiceError::InvalidRequest)?;
        serde_json::from_value(Value::Object(object)).map_err(|_| ServiceError::InvalidRequest)
    }

    /// Validate the shape of `features` and coerce its entries to numbers.
    ///
    /// A value that is not a list of exactly four entries is a shape error.
    /// Numbers, numeric strings and booleans (as 1.0/0.0) are accepted; other
    /// entries, and values outside the float32 range, fail as inference errors.
    pub fn features(&self) -> Result<IrisFeatures, ServiceError> {
        let entries = match &self.features {
            Value::Array(entries) if entries.len() == FEATURE_COUNT => entries,
            _ => return Err(ServiceError::InvalidShape),
        };

        let mut values = [0.0; FEATURE_COUNT];
        for (idx, entry) in entries.iter().enumerate() {
            values[idx] = coerce_feature(FEATURE_NAMES[idx], entry)?;
        }

        Ok(IrisFeatures::from_array(values))
    }
}

fn coerce_feature(name: &str, entry: &Value) -> Result<f64, ServiceError> {
    let value = match entry {
        Value::Number(number) => number.as_f64().ok_or_else(|| {
            ServiceError::Inference(format!("{name}: {number} is not representable as a float"))
        })?,
        Value::String(text) => text.trim().parse::<f64>().map_err(|_| {
            ServiceError::Inference(format!("could not convert string to float: '{text}'"))
        })?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        other => {
            return Err(ServiceError::Inference(format!(
                "{name} must be a number, got {}",
                json_kind(other)
            )))
        }
    };

    if value.is_nan() {
        return Err(ServiceError::Inference(format!("Input contains NaN ({name})")));
    }
    // Models evaluate in single precision
    if value.abs() > f64::from(f32::MAX) {
        return Err(ServiceError::Inference(format!(
            "Input contains infinity or a value too large for float32 ({name})"
        )));
    }

    Ok(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
