use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

use crate::geodb::{DatabaseKind, DatabaseMetadata};
use crate::refresh::{KindStatus, RefreshCoordinator};
use crate::services::LookupService;

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub ready: bool,
    pub generation: Option<u64>,
    pub installed_at: Option<DateTime<Utc>>,
    pub metadata: Option<DatabaseMetadata>,
    pub refresh: KindStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub generation: u64,
    pub databases: BTreeMap<DatabaseKind, DatabaseHealth>,
}

pub struct HealthApi;

impl HealthApi {
    /// 所有数据库就绪返回 200，否则 503
    pub async fn health_check(
        service: web::Data<LookupService>,
        coordinator: web::Data<Arc<dyn RefreshCoordinator>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        trace!("Received health check request");

        let snapshot = service.registry().snapshot();
        let refresh_status = coordinator.status();

        let databases: BTreeMap<DatabaseKind, DatabaseHealth> = DatabaseKind::all()
            .map(|kind| {
                let installed = snapshot.get(kind);
                let health = DatabaseHealth {
                    ready: installed.is_some(),
                    generation: installed.map(|i| i.generation),
                    installed_at: installed.map(|i| i.installed_at),
                    metadata: installed.map(|i| i.database.metadata()),
                    refresh: refresh_status.get(kind).clone(),
                };
                (kind, health)
            })
            .collect();

        let is_healthy = snapshot.is_complete();
        let now = Utc::now();
        let body = HealthResponse {
            status: if is_healthy { "healthy" } else { "unavailable" },
            timestamp: now.to_rfc3339(),
            uptime: (now - app_start_time.start_datetime).num_seconds().max(0) as u64,
            generation: snapshot.generation(),
            databases,
        };

        let status = if is_healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        HttpResponse::build(status).json(body)
    }
}

/// `GET /health`
pub fn health_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(HealthApi::health_check))
        .route("/health", web::head().to(HealthApi::health_check));
}
