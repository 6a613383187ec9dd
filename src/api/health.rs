use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use tracing::error;

use crate::engine::JobEngine;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    running_jobs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// General health check including store reachability and the number of
/// jobs currently being processed.
#[get("/health")]
async fn health_check(engine: web::Data<JobEngine>) -> impl Responder {
    let running_jobs = Some(engine.running_jobs());
    match engine.store().ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            store: "connected".to_string(),
            running_jobs,
            error: None,
        }),
        Err(e) => {
            error!("Health check failed: {:?}", e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "unhealthy".to_string(),
                store: "disconnected".to_string(),
                running_jobs,
                error: Some(format!("Store error: {}", e)),
            })
        }
    }
}

/// Readiness check endpoint
///
/// Returns 503 while the store is unreachable; the process recovers once it returns.
#[get("/ready")]
async fn readiness_check(engine: web::Data<JobEngine>) -> impl Responder {
    match engine.store().ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: "ready".to_string(),
            store: "connected".to_string(),
            running_jobs: None,
            error: None,
        }),
        Err(e) => {
            error!("Readiness check failed: store unavailable: {:?}", e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "not_ready".to_string(),
                store: "disconnected".to_string(),
                running_jobs: None,
                error: Some(format!("Store unavailable: {}", e)),
            })
        }
    }
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        store: "not_checked".to_string(),
        running_jobs: None,
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
