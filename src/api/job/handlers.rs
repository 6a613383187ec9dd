use actix_multipart::form::MultipartForm;
use actix_web::{
    HttpResponse, Responder, get, post,
    web::{Data, Path, ServiceConfig, scope},
};
use actix_web_validator::Json;
use tracing::info;

use super::dto::{CreateJobResponse, JobSummary, ResumeJobResponse};
use super::models::{CreateJobRequest, UploadForm};
use super::service::{JobService, ServiceError};

/// Accept a text document and its prompt, then begin processing
#[post("/upload")]
async fn upload_document(
    service: Data<JobService>,
    MultipartForm(form): MultipartForm<UploadForm>,
) -> Result<impl Responder, ServiceError> {
    let name = form
        .file
        .file_name
        .clone()
        .unwrap_or_else(|| "upload.txt".to_string());
    info!("Received upload: {} ({} bytes)", name, form.file.data.len());

    let text = std::str::from_utf8(&form.file.data)
        .map_err(|_| ServiceError::ValidationError("Uploaded file must be UTF-8 text".to_string()))?;

    let submitted = service.create_job(&name, &form.prompt, text).await?;
    Ok(HttpResponse::Accepted().json(CreateJobResponse {
        message: "Processing started".to_string(),
        job_id: submitted.job.id,
        total_segments: submitted.job.total_segments(),
    }))
}

#[post("")]
async fn create_job(
    service: Data<JobService>,
    request: Json<CreateJobRequest>,
) -> Result<impl Responder, ServiceError> {
    let submitted = service
        .create_job(&request.name, &request.instruction, &request.text)
        .await?;

    Ok(HttpResponse::Accepted().json(CreateJobResponse {
        message: "Processing started".to_string(),
        job_id: submitted.job.id,
        total_segments: submitted.job.total_segments(),
    }))
}

#[get("")]
async fn list_jobs(service: Data<JobService>) -> Result<impl Responder, ServiceError> {
    let jobs = service.list_jobs().await?;
    let summaries: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();
    Ok(HttpResponse::Ok().json(summaries))
}

#[get("/{id}")]
async fn get_job(service: Data<JobService>, id: Path<String>) -> Result<impl Responder, ServiceError> {
    let id = JobService::parse_id(&id)?;
    let job = service.get_job(id).await?;
    Ok(HttpResponse::Ok().json(job))
}

#[post("/{id}/resume")]
async fn resume_job(service: Data<JobService>, id: Path<String>) -> Result<impl Responder, ServiceError> {
    let id = JobService::parse_id(&id)?;
    let outcome = service.resume_job(id).await?;
    Ok(HttpResponse::Ok().json(ResumeJobResponse::from(&outcome)))
}

pub fn job_config(config: &mut ServiceConfig) {
    config.service(
        scope("/api").service(upload_document).service(
            scope("/jobs")
                .service(create_job)
                .service(list_jobs)
                .service(get_job)
                .service(resume_job),
        ),
    );
}
