use actix_multipart::form::MultipartFormConfig;
use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

fn bad_request(error: &str, fields: serde_json::Map<String, serde_json::Value>) -> actix_web::Error {
    let error_response = ErrorResponse {
        error: error.to_string(),
        fields: serde_json::Value::Object(fields),
    };
    actix_web::error::InternalError::from_response("", HttpResponse::BadRequest().json(error_response)).into()
}

fn message(text: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut fields = serde_json::Map::new();
    fields.insert("message".to_string(), serde_json::json!(text));
    fields
}

/// Creates a configured JsonConfig with standardized error handling for the entire project
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default().error_handler(|err, _req| match err {
        actix_web_validator::Error::Validate(validation_errors) => {
            let mut fields = serde_json::Map::new();
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
                fields.insert(field.to_string(), serde_json::json!({"errors": messages}));
            }
            bad_request("Validation failed", fields)
        }
        actix_web_validator::Error::Deserialize(de_err) => {
            let err_string = de_err.to_string();

            let fields = if err_string.contains("EOF while parsing") {
                message("Request body is empty. Expected JSON payload")
            } else if err_string.contains("missing field") {
                message(&err_string)
            } else {
                message("Invalid JSON format")
            };
            bad_request("Request validation failed", fields)
        }
        _ => bad_request("Validation failed", message("Validation error")),
    })
}

/// Multipart limits plus the same JSON error shape as the JSON endpoints
pub fn multipart_config(max_payload_size: usize) -> MultipartFormConfig {
    MultipartFormConfig::default()
        .total_limit(max_payload_size)
        .memory_limit(max_payload_size)
        .error_handler(|err, _req| bad_request("Invalid upload", message(&err.to_string())))
}
