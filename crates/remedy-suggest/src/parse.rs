use serde::de::DeserializeOwned;

use crate::error::InvocationError;

/// Parse raw LLM output into a typed output record.
///
/// Leading prose and code fences are tolerated, and so is anything after the
/// first complete object. The object itself is not repaired. Missing or
/// mistyped fields are a failure.
pub fn parse_output<T: DeserializeOwned>(raw: &str) -> Result<T, InvocationError> {
    let start = raw
        .find('{')
        .ok_or_else(|| InvocationError::Schema("no JSON object in response".to_string()))?;
    serde_json::Deserializer::from_str(&raw[start..])
        .into_iter::<T>()
        .next()
        .unwrap_or_else(|| Err(serde::de::Error::custom("unterminated JSON object")))
        .map_err(|e| InvocationError::Schema(e.to_string()))
}
