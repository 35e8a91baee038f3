use serde_json::Value;
use sttp_types::{PipelineOutput, ResponseRef};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("[ERROR]: Unable to extract response: neither data[0].response nor data[0].segments[0].response is present")]
    Missing,
    #[error("[ERROR]: Unable to extract response: {path} is {found}, expected a string")]
    NotString { path: &'static str, found: String },
}

/// Pull the response reference out of the first result entry.
///
/// No entries is not an error: the run carries on with empty output.
pub fn extract_response(output: &PipelineOutput) -> Result<Option<ResponseRef>, ExtractError> {
    let Some(first) = output.data.first() else {
        warn!("pipeline returned no results, writing empty output");
        return Ok(None);
    };
    if output.data.len() > 1 {
        warn!(entries = output.data.len(), "using only the first result entry");
    }

    if let Some(v) = first.get("response") {
        return to_response_ref(v, "data[0].response").map(Some);
    }
    let nested = first
        .get("segments")
        .and_then(|s| s.get(0))
        .and_then(|s| s.get("response"));
    match nested {
        Some(v) => to_response_ref(v, "data[0].segments[0].response").map(Some),
        None => Err(ExtractError::Missing),
    }
}

fn to_response_ref(v: &Value, path: &'static str) -> Result<ResponseRef, ExtractError> {
    match v {
        Value::String(s) => Ok(ResponseRef::classify(s)),
        other => Err(ExtractError::NotString {
            path,
            found: kind(other).to_string(),
        }),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(data: Value) -> PipelineOutput {
        serde_json::from_value(json!({ "data": data })).unwrap()
    }

    #[test]
    fn empty_data_is_not_fatal() {
        assert_eq!(extract_response(&output(json!([]))), Ok(None));
        assert_eq!(extract_response(&PipelineOutput::default()), Ok(None));
    }

    #[test]
    fn top_level_response_wins() {
        let out = output(json!([
            {"response": "hello", "segments": [{"response": "https://x/y"}]},
            {"response": "ignored"}
        ]));
        assert_eq!(extract_response(&out), Ok(Some(ResponseRef::Text("hello".into()))));
    }

    #[test]
    fn falls_back_to_first_segment() {
        let out = output(json!([{"segments": [{"response": "https://cdn.example.com/o.txt"}, {"response": "no"}]}]));
        assert_eq!(
            extract_response(&out),
            Ok(Some(ResponseRef::Url("https://cdn.example.com/o.txt".into())))
        );
    }

    #[test]
    fn missing_or_malformed_response() {
        assert_eq!(extract_response(&output(json!([{"label": "Output 1"}]))), Err(ExtractError::Missing));
        assert_eq!(extract_response(&output(json!([{"segments": []}]))), Err(ExtractError::Missing));
        let err = extract_response(&output(json!([{"response": 42}]))).unwrap_err();
        assert_eq!(
            err,
            ExtractError::NotString {
                path: "data[0].response",
                found: "a number".into()
            }
        );
        assert!(err.to_string().contains("data[0].response is a number"));
    }
}
