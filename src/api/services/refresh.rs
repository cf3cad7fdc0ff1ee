use std::sync::Arc;

use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use serde_json::json;
use tracing::{error, info};

use crate::errors::IpGeoError;
use crate::refresh::{RefreshCoordinator, RefreshOutcome, RefreshTarget};

pub struct RefreshApi;

impl RefreshApi {
    /// 手动刷新全部数据库
    ///
    /// 刷新在独立任务中执行，客户端断开不会中断下载与安装。
    pub async fn refresh(coordinator: web::Data<Arc<dyn RefreshCoordinator>>) -> impl Responder {
        let coordinator = coordinator.get_ref().clone();
        let task = tokio::spawn(async move { coordinator.refresh(RefreshTarget::All).await });

        let outcome = match task.await {
            Ok(result) => result,
            Err(e) => Err(IpGeoError::file_operation(format!(
                "Refresh task failed: {}",
                e
            ))),
        };

        match outcome {
            Ok(RefreshOutcome::Completed { .. }) => HttpResponse::Ok().json(json!({
                "message": "Database refreshed successfully"
            })),
            Ok(RefreshOutcome::Coalesced { kinds }) => {
                let busy: Vec<String> = kinds
                    .iter()
                    .map(|(kind, state)| format!("{}: {}", kind, state))
                    .collect();
                info!("Manual refresh coalesced ({})", busy.join(", "));
                HttpResponse::build(StatusCode::ACCEPTED).json(json!({
                    "message": format!("Refresh already in progress ({})", busy.join(", "))
                }))
            }
            Err(e) => {
                error!("Manual refresh failed: {}", e);
                // 刷新失败统一返回 500
                HttpResponse::InternalServerError().json(json!({ "error": e.message() }))
            }
        }
    }
}

/// `POST /refresh`
pub fn refresh_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/refresh", web::post().to(RefreshApi::refresh));
}

