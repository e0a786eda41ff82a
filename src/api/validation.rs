use actix_web::HttpResponse;
use serde::Serialize;

/// JSON error body shared by every endpoint
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: None,
        }
    }
}

fn bad_request(error: String, fields: serde_json::Map<String, serde_json::Value>) -> actix_web::Error {
    let error_response = ErrorResponse {
        error,
        fields: Some(serde_json::Value::Object(fields)),
    };
    actix_web::error::InternalError::from_response(
        "",
        HttpResponse::BadRequest().json(error_response),
    )
    .into()
}

/// Creates a configured JsonConfig with standardized error handling for the entire project
///
/// Field validation failures put the first field message in `error`, so a
/// request missing `raw_data_folder` gets the same text as one naming a
/// folder that does not exist.
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default().error_handler(|err, _req| {
        let mut fields = serde_json::Map::new();

        match err {
            actix_web_validator::Error::Validate(validation_errors) => {
                let mut first_message = None;
                for (field, errors) in validation_errors.field_errors() {
                    let messages: Vec<String> = errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| format!("Validation error in field: {}", field))
                        })
                        .collect();
                    if first_message.is_none() {
                        first_message = messages.first().cloned();
                    }
                    fields.insert(field.to_string(), serde_json::json!({ "errors": messages }));
                }

                bad_request(
                    first_message.unwrap_or_else(|| "Validation failed".to_string()),
                    fields,
                )
            }
            actix_web_validator::Error::Deserialize(de_err) => {
                let err_string = de_err.to_string();

                let message = if err_string.contains("EOF while parsing") {
                    "Request body is empty. Expected JSON payload"
                } else if err_string.contains("invalid type") {
                    "Field has the wrong type. Folders must be strings"
                } else {
                    "Invalid JSON format"
                };
                fields.insert("message".to_string(), serde_json::json!(message));

                bad_request("Request validation failed".to_string(), fields)
            }
            _ => {
                fields.insert(
                    "message".to_string(),
                    serde_json::json!("Expected a JSON request body"),
                );
                bad_request("Request validation failed".to_string(), fields)
            }
        }
    })
}
