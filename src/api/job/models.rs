use actix_multipart::form::{MultipartForm, bytes::Bytes, text::Text};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// JSON body for creating a job from text that is already extracted
#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct CreateJobRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: String,

    #[validate(length(min = 1, message = "Instruction must not be empty"))]
    pub instruction: String,

    pub text: String,
}

/// Multipart upload: a UTF-8 text document plus the transformation prompt
#[derive(MultipartForm)]
pub struct UploadForm {
    pub file: Bytes,
    pub prompt: Text<String>,
}
