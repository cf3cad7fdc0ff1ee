use actix_web::{HttpResponse, Responder, web};
use tracing::{debug, trace};

use crate::api::error_response;
use crate::services::LookupService;

pub const BANNER: &str = "IP2Location API Service is running! This uses IP2Location LITE data available from http://www.ip2location.com.";

pub struct LookupApi;

impl LookupApi {
    pub async fn banner() -> impl Responder {
        HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(BANNER)
    }

    pub async fn lookup(
        path: web::Path<String>,
        service: web::Data<LookupService>,
    ) -> impl Responder {
        let address = path.into_inner();
        trace!("Lookup request for {}", address);

        match service.resolve(&address) {
            Ok(record) => HttpResponse::Ok().json(record),
            Err(e) => {
                debug!("Lookup of {} failed: {}", address, e);
                error_response(&e)
            }
        }
    }
}

/// `/` and `/ip/{address}`
pub fn lookup_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(LookupApi::banner))
        .route("/ip/{address}", web::get().to(LookupApi::lookup));
}
