use actix_web::{get, web};
use serde::Serialize;

use crate::block_chain::Network;
use crate::routes::BadgeState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub blockchain_enabled: bool,
    pub networks: Vec<Network>,
    pub queue_capacity: usize,
    pub queued: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_error: Option<String>,
}

#[get("/api/health")]
pub async fn health(state: web::Data<BadgeState>) -> web::Json<HealthResponse> {
    web::Json(HealthResponse {
        status: "ok",
        blockchain_enabled: state.blockchain_enabled(),
        networks: state.networks.clone(),
        queue_capacity: state.queue.capacity(),
        queued: state.queue.len(),
        init_error: state.init_error.clone(),
    })
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use serde_json::Value;

    use super::*;
    use crate::routes::testing::{live_state, simulated_state};

    #[actix_web::test]
    async fn test_health_live() {
        let (state, _receiver) = live_state(Vec::new());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).service(health)).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["blockchain_enabled"], true);
        assert_eq!(body["networks"], serde_json::json!(["ethereum", "blockdag"]));
        assert!(body.get("init_error").is_none());
    }

    #[actix_web::test]
    async fn test_health_reports_simulation_mode() {
        let (state, _receiver) = simulated_state(100);
        let app = test::init_service(App::new().app_data(web::Data::new(state)).service(health)).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["blockchain_enabled"], false);
        assert_eq!(body["queue_capacity"], 100);
        assert_eq!(body["init_error"], "PRIVATE_KEY environment variable not set");
    }
}
