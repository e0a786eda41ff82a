use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

/// Error text returned when the input folder is absent or not a directory
pub const INVALID_RAW_DATA_FOLDER: &str = "Invalid or missing raw_data_folder";

/// Body of `POST /process_data`
#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct ProcessRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    #[validate(required(message = "Invalid or missing raw_data_folder"))]
    pub raw_data_folder: Option<String>,

    /// Falls back to the configured output directory
    pub output_folder: Option<String>,
}

/// Any non-string JSON value counts as missing, so it fails validation
/// with the folder error instead of a generic parse error
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Query string of `GET /jobs`
#[derive(Deserialize, Debug, Default)]
pub struct JobListQuery {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_string_folder_reads_as_missing() {
        for body in [
            json!({"raw_data_folder": 42}),
            json!({"raw_data_folder": ["x"]}),
            json!({"raw_data_folder": null}),
            json!({}),
        ] {
            let request: ProcessRequest = serde_json::from_value(body).unwrap();
            assert!(request.raw_data_folder.is_none());
            assert!(request.validate().is_err());
        }

        let request: ProcessRequest =
            serde_json::from_value(json!({"raw_data_folder": "/data"})).unwrap();
        assert_eq!(request.raw_data_folder.as_deref(), Some("/data"));
    }
}
