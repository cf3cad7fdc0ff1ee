//! HTTP API
//!
//! - `GET /` banner
//! - `GET /ip/{address}` combined lookup
//! - `POST /refresh` on-demand refresh
//! - `GET /health` per-database readiness

pub mod middleware;
pub mod services;

use actix_web::{HttpResponse, http::StatusCode, web};
use serde_json::json;

use crate::errors::IpGeoError;

/// HTTP status for an error returned by the lookup path
pub fn error_status(err: &IpGeoError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if err.is_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// `{"error": "<message>"}` with the mapped status
pub fn error_response(err: &IpGeoError) -> HttpResponse {
    HttpResponse::build(error_status(err)).json(json!({ "error": err.message() }))
}

/// Register every route on an `App`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(services::lookup_routes)
        .configure(services::refresh_routes)
        .configure(services::health_routes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&IpGeoError::invalid_address("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(error_status(&IpGeoError::decode("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_status(&IpGeoError::not_ready("x")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_status(&IpGeoError::service_unavailable("x")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_status(&IpGeoError::file_operation("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
