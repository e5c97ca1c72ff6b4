use crate::configuration::Configuration;
use crate::error::SlotError;
use crate::persistence::SlotPersistence;
use crate::slot_store::SlotStore;
use crate::types::Holder;
use axum::body::Body;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState<P: SlotPersistence> {
    pub slots: SlotStore<P>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CallerIdentity {
    id: String,
    display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaimRequest {
    /// Absent means "list the available slots" instead of claiming one.
    #[serde(default)]
    slot_id: Option<u32>,
    caller: CallerIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnclaimRequest {
    caller_id: String,
}

pub fn create_app<P: SlotPersistence>(
    state: AppState<P>,
    configuration: impl Configuration,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/", get(liveness))
        .route("/schedule", get(get_schedule));

    let required_role = configuration.required_role();
    let commands = Router::new()
        .route("/claim", post(claim_slot))
        .route("/unclaim", post(unclaim_slot))
        .route_layer(middleware::from_fn(move |request: Request<Body>, next: Next| {
            role_auth(required_role.clone(), request, next)
        }));

    Router::new()
        .merge(public)
        .merge(commands)
        .with_state(state)
        .layer(cors)
}

/// Role gate for the command routes. The caller's role arrives as a
/// header; the comparison ignores case the way role names do.
async fn role_auth(
    required_role: String,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let role = request
        .headers()
        .get("x-caller-role")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if !role.eq_ignore_ascii_case(&required_role) {
        return Err((
            StatusCode::UNAUTHORIZED,
            format!("You need the {required_role} role."),
        ));
    }
    Ok(next.run(request).await)
}

async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "training slots server running".to_string())
}

async fn get_schedule<P: SlotPersistence>(State(state): State<AppState<P>>) -> impl IntoResponse {
    Json(state.slots.schedule())
}

async fn claim_slot<P: SlotPersistence>(
    State(state): State<AppState<P>>,
    Json(claim): Json<ClaimRequest>,
) -> Response {
    let Some(slot_id) = claim.slot_id else {
        return Json(state.slots.available()).into_response();
    };

    let holder = Holder {
        id: claim.caller.id,
        display: claim.caller.display,
    };
    match state.slots.claim(slot_id, holder) {
        Ok(slot) => Json(slot).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

async fn unclaim_slot<P: SlotPersistence>(
    State(state): State<AppState<P>>,
    Json(unclaim): Json<UnclaimRequest>,
) -> Response {
    match state.slots.unclaim(&unclaim.caller_id) {
        Ok(slot) => Json(slot).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

fn error_response(err: SlotError) -> (StatusCode, String) {
    let status = match err {
        SlotError::NotFound(_) => StatusCode::NOT_FOUND,
        SlotError::InvalidState(_) => StatusCode::CONFLICT,
        SlotError::Persistence(_) | SlotError::IntegrityAnomaly(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}
