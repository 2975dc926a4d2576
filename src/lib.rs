use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Identity, credentials and sessions.
pub mod auth;
pub mod credentials;
pub mod directory;
pub mod models;
pub mod session;

// Per-request authorization.
pub mod classifier;
pub mod gatekeeper;

pub mod config;
pub mod errors;
pub mod handlers;

// Route tables, split by access class (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{Authenticator, CurrentIdentity};
pub use config::AppConfig;
pub use credentials::{CredentialVerifier, HashCost};
pub use directory::{DirectoryState, InMemoryAccountDirectory, PostgresAccountDirectory};
pub use errors::AuthError;
pub use gatekeeper::{Decision, Gatekeeper, RejectReason};
pub use session::{SessionStore, SessionToken};

/// ApiDoc
///
/// The OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::api_login, handlers::api_logout, handlers::me,
        handlers::list_accounts, handlers::deactivate_account
    ),
    components(
        schemas(
            models::Role, models::LoginRequest, models::IdentityView,
            models::DeactivateAccountRequest, models::ApiError,
        )
    ),
    tags(
        (name = "pawnshop-backoffice", description = "Pawn shop back-office authentication API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single container of shared services, cloned into every request. The session store
/// lives here (and only here): it is created in `main` and cleared on shutdown.
#[derive(Clone)]
pub struct AppState {
    pub directory: DirectoryState,
    pub sessions: Arc<SessionStore>,
    pub authenticator: Authenticator,
    pub gatekeeper: Arc<Gatekeeper>,
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Wires the session store, credential verifier, authenticator and gatekeeper around the
    /// given directory, all sized from `config`.
    pub fn new(
        config: AppConfig,
        directory: DirectoryState,
    ) -> Result<Self, credentials::CredentialError> {
        let verifier = CredentialVerifier::new(config.hash_cost)?;
        Ok(Self::with_verifier(config, directory, verifier))
    }

    /// Same as [`AppState::new`] with an already-built verifier.
    pub fn with_verifier(
        config: AppConfig,
        directory: DirectoryState,
        verifier: CredentialVerifier,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_idle_timeout));
        let authenticator = Authenticator::new(directory.clone(), verifier, sessions.clone());
        let gatekeeper = Gatekeeper::new(
            config.route_policy.clone(),
            sessions.clone(),
            directory.clone(),
            config.context_root.clone(),
        )
        .with_secure_cookies(config.env.is_production());

        Self {
            directory,
            sessions,
            authenticator,
            gatekeeper: Arc::new(gatekeeper),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for Arc<Gatekeeper> {
    fn from_ref(app_state: &AppState) -> Arc<Gatekeeper> {
        app_state.gatekeeper.clone()
    }
}

/// create_router
///
/// Assembles the route table, puts the gatekeeper in front of *all* of it (routes and
/// fallback alike, so an unknown path is still gated), then adds the observability and CORS
/// layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let context_root = state.config.context_root.trim_end_matches('/').to_string();

    // 2. Base Router Assembly
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes());

    // Mount under the context root when one is configured.
    let app = if context_root.is_empty() {
        app
    } else {
        Router::new().nest(&context_root, app)
    };

    // 3. The Gatekeeper: one authorization decision per inbound request.
    let app = app
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gatekeeper::gatekeeper_middleware,
        ))
        .with_state(state);

    // 4. Observability and Correlation Layers (Applied outermost/first)
    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
    // 5. CORS Layer
    .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span with method, URI and the `x-request-id`, so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
