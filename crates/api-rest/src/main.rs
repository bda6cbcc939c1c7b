//! Observation record REST API server.
//!
//! ## Purpose
//! Exposes the `obs-core` controller over HTTP: retrieve and search with
//! representation selection, create, update-by-supersession, void and purge.
//! Provides OpenAPI/Swagger documentation for the whole surface.

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use obs_core::config::include_voided_from_env_value;
use obs_core::views::{
    AuditView, ConceptView, DefaultObsView, FullObsView, ObsView, RefStub, RefView, ValueView,
};
use obs_core::{
    Concept, ConceptDatatype, CoreConfig, InMemoryObsStore, Location, ObsError, ObsPayload,
    ObsService, Person, Representation,
};
use obs_types::NonEmptyText;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request
/// handlers: the observation service bound to its record store.
#[derive(Clone)]
struct AppState {
    service: Arc<ObsService>,
}

/// Liveness response body.
#[derive(Serialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

/// Structured error body: a stable kind plus a human-readable message.
#[derive(Serialize, ToSchema)]
struct ErrorRes {
    error: String,
    message: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct RepQuery {
    /// Representation depth: `default` or `full`.
    v: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SearchQuery {
    /// Identifier of the subject whose observations are listed.
    patient: Option<String>,
    /// Representation depth: `default` or `full`.
    v: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct DeleteQuery {
    /// Void reason; required unless purging.
    reason: Option<String>,
    /// When true, hard-delete instead of voiding.
    purge: Option<bool>,
    /// Representation depth for the returned voided view.
    v: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, get_obs, search_obs, create_obs, update_obs, delete_obs),
    components(schemas(
        HealthRes,
        ErrorRes,
        ObsPayload,
        ObsView,
        DefaultObsView,
        FullObsView,
        RefStub,
        RefView,
        ConceptView,
        ValueView,
        AuditView,
    ))
)]
struct ApiDoc;

/// Main entry point for the observation record REST API server
///
/// Starts the REST server on the configured address (default: 0.0.0.0:3000)
/// with OpenAPI/Swagger documentation mounted under `/swagger-ui`.
///
/// # Environment Variables
/// - `OBS_REST_ADDR`: server address (default: "0.0.0.0:3000")
/// - `OBS_BASE_URL`: absolute prefix for rendered self links
/// - `OBS_INCLUDE_VOIDED`: whether voided records stay retrievable by id
/// - `OBS_RECORDED_BY`: audit identity for records created here
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("obs_api_rest=info".parse()?)
                .add_directive("obs_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let addr = std::env::var("OBS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let base_url =
        std::env::var("OBS_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let include_voided =
        include_voided_from_env_value(std::env::var("OBS_INCLUDE_VOIDED").ok(), true)?;
    let recorded_by =
        NonEmptyText::new(std::env::var("OBS_RECORDED_BY").unwrap_or_else(|_| "daemon".into()))?;

    tracing::info!("-- Starting observation REST API on {}", addr);

    let cfg = Arc::new(CoreConfig::new(base_url, recorded_by, include_voided)?);

    // TODO: swap in the EMR-backed store once its adapter lands.
    let store = Arc::new(InMemoryObsStore::new());
    seed_demo_dictionary(&store);

    let state = AppState {
        service: Arc::new(ObsService::new(cfg, store)),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Builds the router with all routes, documentation and middleware.
fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/obs", get(search_obs).post(create_obs))
        .route(
            "/obs/:uuid",
            get(get_obs).post(update_obs).delete(delete_obs),
        )
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Registers a starter reference dictionary so the in-memory store is
/// usable out of the box. Dictionary management itself is out of scope.
fn seed_demo_dictionary(store: &InMemoryObsStore) {
    store.register_person(Person {
        uuid: "5946f880-b197-400b-9caa-a3c661d23041".into(),
        display: "Horatio Hornblower".into(),
    });
    store.register_concept(Concept {
        uuid: "a09ab2c5-878e-4905-b25d-5784167d0216".into(),
        display: "WEIGHT (KG)".into(),
        datatype: ConceptDatatype::Numeric,
    });
    store.register_concept(Concept {
        uuid: "96408258-000b-424e-af1a-403919332938".into(),
        display: "FINDINGS".into(),
        datatype: ConceptDatatype::Text,
    });
    store.register_location(Location {
        uuid: "dc5c1fcc-0459-4201-bf70-0b90535ba362".into(),
        display: "Outpatient Clinic".into(),
    });
    tracing::info!("seeded demo reference dictionary");
}

type ErrResponse = (StatusCode, Json<ErrorRes>);

/// Maps a core error onto an HTTP status and structured body.
fn error_response(err: ObsError) -> ErrResponse {
    let status = match err.kind() {
        obs_core::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        obs_core::ErrorKind::Validation => StatusCode::BAD_REQUEST,
        obs_core::ErrorKind::Conflict => StatusCode::CONFLICT,
    };
    tracing::warn!(kind = err.kind().as_str(), "request failed: {err}");
    (
        status,
        Json(ErrorRes {
            error: err.kind().as_str().to_string(),
            message: err.to_string(),
        }),
    )
}

fn representation(v: Option<&str>) -> Result<Representation, ErrResponse> {
    Representation::from_query(v).map_err(error_response)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "observation REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/obs/{uuid}",
    params(
        ("uuid" = String, Path, description = "Observation identifier"),
        RepQuery
    ),
    responses(
        (status = 200, description = "Rendered observation", body = ObsView),
        (status = 400, description = "Unknown representation", body = ErrorRes),
        (status = 404, description = "No such observation", body = ErrorRes)
    )
)]
/// Retrieve one observation at the requested representation depth
#[axum::debug_handler]
async fn get_obs(
    State(state): State<AppState>,
    AxumPath(uuid): AxumPath<String>,
    Query(query): Query<RepQuery>,
) -> Result<Json<ObsView>, ErrResponse> {
    let rep = representation(query.v.as_deref())?;
    let view = state.service.retrieve(&uuid, rep).map_err(error_response)?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/obs",
    params(SearchQuery),
    responses(
        (status = 200, description = "Observations for the subject", body = [ObsView]),
        (status = 400, description = "Missing patient or unknown representation", body = ErrorRes)
    )
)]
/// List all active observations for a subject, in creation order
#[axum::debug_handler]
async fn search_obs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ObsView>>, ErrResponse> {
    let rep = representation(query.v.as_deref())?;
    let patient = query
        .patient
        .as_deref()
        .ok_or_else(|| error_response(ObsError::MissingField("patient")))?;
    let views = state
        .service
        .search_by_person(patient, rep)
        .map_err(error_response)?;
    Ok(Json(views))
}

#[utoipa::path(
    post,
    path = "/obs",
    request_body = ObsPayload,
    params(RepQuery),
    responses(
        (status = 201, description = "Observation created", body = ObsView),
        (status = 400, description = "Invalid payload", body = ErrorRes)
    )
)]
/// Create a new observation
#[axum::debug_handler]
async fn create_obs(
    State(state): State<AppState>,
    Query(query): Query<RepQuery>,
    Json(payload): Json<ObsPayload>,
) -> Result<(StatusCode, Json<ObsView>), ErrResponse> {
    let rep = representation(query.v.as_deref())?;
    let view = state
        .service
        .create(&payload, rep)
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    post,
    path = "/obs/{uuid}",
    request_body = ObsPayload,
    params(
        ("uuid" = String, Path, description = "Observation identifier"),
        RepQuery
    ),
    responses(
        (status = 200, description = "Successor observation", body = ObsView),
        (status = 400, description = "Invalid payload", body = ErrorRes),
        (status = 404, description = "No active observation", body = ErrorRes)
    )
)]
/// Update an observation by voiding it and creating a successor
#[axum::debug_handler]
async fn update_obs(
    State(state): State<AppState>,
    AxumPath(uuid): AxumPath<String>,
    Query(query): Query<RepQuery>,
    Json(payload): Json<ObsPayload>,
) -> Result<Json<ObsView>, ErrResponse> {
    let rep = representation(query.v.as_deref())?;
    let view = state
        .service
        .update(&uuid, &payload, rep)
        .map_err(error_response)?;
    Ok(Json(view))
}

#[utoipa::path(
    delete,
    path = "/obs/{uuid}",
    params(
        ("uuid" = String, Path, description = "Observation identifier"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Voided observation", body = ObsView),
        (status = 204, description = "Observation purged"),
        (status = 400, description = "Missing void reason", body = ErrorRes),
        (status = 404, description = "No such observation", body = ErrorRes),
        (status = 409, description = "Purge blocked by dependent data", body = ErrorRes)
    )
)]
/// Void an observation, or hard-delete it with `purge=true`
#[axum::debug_handler]
async fn delete_obs(
    State(state): State<AppState>,
    AxumPath(uuid): AxumPath<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, ErrResponse> {
    if query.purge.unwrap_or(false) {
        state.service.purge(&uuid).map_err(error_response)?;
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let rep = representation(query.v.as_deref())?;
    let reason = query.reason.as_deref().unwrap_or("");
    let view = state
        .service
        .void(&uuid, reason, rep)
        .map_err(error_response)?;
    Ok(Json(view).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const PERSON: &str = "5946f880-b197-400b-9caa-a3c661d23041";
    const WEIGHT: &str = "a09ab2c5-878e-4905-b25d-5784167d0216";
    const VITALS: &str = "0f97e14e-cdc2-49ac-9255-b5126f8a5147";
    const CLINIC: &str = "dc5c1fcc-0459-4201-bf70-0b90535ba362";

    fn test_state() -> AppState {
        let store = Arc::new(InMemoryObsStore::new());
        seed_demo_dictionary(&store);
        store.register_concept(Concept {
            uuid: VITALS.into(),
            display: "VITALS".into(),
            datatype: ConceptDatatype::NotApplicable,
        });

        let cfg = Arc::new(
            CoreConfig::new(
                "http://localhost:3000",
                NonEmptyText::new("daemon").unwrap(),
                true,
            )
            .unwrap(),
        );
        AppState {
            service: Arc::new(ObsService::new(cfg, store)),
        }
    }

    fn weight_payload() -> serde_json::Value {
        serde_json::json!({
            "location": CLINIC,
            "concept": WEIGHT,
            "person": PERSON,
            "obsDatetime": "2011-05-18",
            "value": "150.0",
        })
    }

    fn created_obs(state: &AppState) -> String {
        let payload: ObsPayload = serde_json::from_value(weight_payload()).unwrap();
        state
            .service
            .create(&payload, Representation::Default)
            .expect("create should succeed")
            .uuid()
            .to_string()
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(state.clone())
            .oneshot(request)
            .await
            .expect("request should not error");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let state = test_state();
        let (status, json) = send(&state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn get_obs_default_representation_omits_audit() {
        let state = test_state();
        let uuid = created_obs(&state);

        let (status, json) = send(&state, get(&format!("/obs/{uuid}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["uuid"], uuid.as_str());
        assert!(json.get("link").is_some());
        assert!(json.get("person").is_some());
        assert!(json.get("concept").is_some());
        assert!(json.get("auditInfo").is_none());
    }

    #[tokio::test]
    async fn get_obs_full_representation_includes_audit() {
        let state = test_state();
        let uuid = created_obs(&state);

        let (status, json) = send(&state, get(&format!("/obs/{uuid}?v=full"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["uuid"], uuid.as_str());
        assert_eq!(json["auditInfo"]["creator"], "daemon");
    }

    #[tokio::test]
    async fn get_obs_unknown_identifier_is_404() {
        let state = test_state();
        let (status, json) = send(&state, get("/obs/no-such-record")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn get_obs_rejects_unknown_representation() {
        let state = test_state();
        let uuid = created_obs(&state);
        let (status, json) = send(&state, get(&format!("/obs/{uuid}?v=FULL"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation");
    }

    #[tokio::test]
    async fn search_requires_the_patient_parameter() {
        let state = test_state();
        let (status, json) = send(&state, get("/obs")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation");
    }

    #[tokio::test]
    async fn search_lists_observations_for_the_subject() {
        let state = test_state();
        let first = created_obs(&state);
        let second = created_obs(&state);

        let (status, json) = send(&state, get(&format!("/obs?patient={PERSON}"))).await;
        assert_eq!(status, StatusCode::OK);
        let list = json.as_array().expect("search returns an array");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["uuid"], first.as_str());
        assert_eq!(list[1]["uuid"], second.as_str());
    }

    #[tokio::test]
    async fn create_returns_201_with_the_rendered_view() {
        let state = test_state();
        let (status, json) = send(&state, post_json("/obs", &weight_payload())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["value"], 150.0);
        assert!(json.get("uuid").is_some());
    }

    #[tokio::test]
    async fn create_maps_validation_failures_to_400() {
        let state = test_state();
        let mut payload = weight_payload();
        payload["value"] = serde_json::Value::String("high".into());
        let (status, json) = send(&state, post_json("/obs", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation");
    }

    #[tokio::test]
    async fn update_returns_the_successor_and_voids_the_prior() {
        let state = test_state();
        let prior = created_obs(&state);

        let (status, json) = send(
            &state,
            post_json(
                &format!("/obs/{prior}"),
                &serde_json::json!({"valueNumeric": 35.0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(json["uuid"], prior.as_str());
        assert_eq!(json["value"], 35.0);

        let (status, old) = send(&state, get(&format!("/obs/{prior}?v=full"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(old["voided"], true);
        assert_eq!(old["value"], 150.0);
    }

    #[tokio::test]
    async fn delete_without_reason_is_rejected() {
        let state = test_state();
        let uuid = created_obs(&state);
        let (status, json) = send(&state, delete(&format!("/obs/{uuid}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation");
    }

    #[tokio::test]
    async fn delete_voids_with_the_supplied_reason() {
        let state = test_state();
        let uuid = created_obs(&state);

        let (status, _) = send(&state, delete(&format!("/obs/{uuid}?reason=unit%20test"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(&state, get(&format!("/obs/{uuid}?v=full"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["voided"], true);
        assert_eq!(json["voidReason"], "unit test");
    }

    #[tokio::test]
    async fn purge_removes_the_record_entirely() {
        let state = test_state();
        let uuid = created_obs(&state);

        let (status, _) = send(&state, delete(&format!("/obs/{uuid}?purge=true"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&state, get(&format!("/obs/{uuid}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn purge_with_dependent_data_is_a_409() {
        let state = test_state();
        let parent_payload: ObsPayload = serde_json::from_value(serde_json::json!({
            "concept": VITALS,
            "person": PERSON,
            "obsDatetime": "2011-05-18",
        }))
        .unwrap();
        let parent = state
            .service
            .create(&parent_payload, Representation::Default)
            .unwrap()
            .uuid()
            .to_string();
        let member_payload: ObsPayload = serde_json::from_value(serde_json::json!({
            "concept": WEIGHT,
            "person": PERSON,
            "obsDatetime": "2011-05-18",
            "value": "61.0",
            "obsGroup": parent,
        }))
        .unwrap();
        state
            .service
            .create(&member_payload, Representation::Default)
            .unwrap();

        let (status, json) = send(&state, delete(&format!("/obs/{parent}?purge=true"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "conflict");

        let (status, _) = send(&state, get(&format!("/obs/{parent}"))).await;
        assert_eq!(status, StatusCode::OK, "record survives a failed purge");
    }
}
