//! REST API for the inventory service.
//!
//! Stateless endpoints expose the grouping key and the auto-box engine
//! directly. Stop endpoints work on an in-memory session per stop that is
//! loaded from the store on first access and written back on save or close.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::autobox::{AutoBoxState, BoxReconciliation, reconcile_boxes_with_progress};
use crate::catalog::{CatalogId, CatalogItem};
use crate::config::ApiConfig;
use crate::error::Error;
use crate::grouping::compute_grouping_key;
use crate::inventory::{InventoryContext, InventoryTotals, MutationOutcome, StopInventory};
use crate::model::{ItemConfig, ItemInstance, ItemPatch, PackingNeeds, ValidationError};
use crate::store::InventoryStore;
use crate::types::{MAX_MEASURE, RoomId, Weighted};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    ctx: Arc<InventoryContext>,
    store: Arc<dyn InventoryStore>,
    sessions: Arc<Mutex<HashMap<String, StopInventory>>>,
    auto_boxes_default: bool,
}

impl ApiState {
    pub fn new(
        ctx: InventoryContext,
        store: Arc<dyn InventoryStore>,
        auto_boxes_default: bool,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            store,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            auto_boxes_default,
        }
    }

    /// Runs `f` on the session of `stop_id`, loading it from the store first
    /// if it is not open yet.
    async fn with_session<T>(
        &self,
        stop_id: &str,
        f: impl FnOnce(&mut StopInventory, &InventoryContext) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut sessions = self.sessions.lock().await;
        let inventory = match sessions.entry(stop_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let inventory = match self.store.load_inventory(stop_id).await? {
                    Some(stored) => {
                        tracing::info!(stop = stop_id, backend = self.store.backend_name(), "stop loaded");
                        StopInventory::from_snapshot(stop_id, stored, &self.ctx, self.auto_boxes_default)
                    }
                    None => {
                        tracing::info!(stop = stop_id, "new stop opened");
                        StopInventory::new(stop_id, self.auto_boxes_default)
                    }
                };
                entry.insert(inventory)
            }
        };
        f(inventory, &self.ctx)
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>move-inventory API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Item configuration to derive a grouping key for.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "furnitureItemId": 1,
    "tags": ["blanket_wrapped"],
    "lbs": "120",
    "packingNeedsCounts": { "shrink_wrap": 1 }
}))]
pub struct GroupingKeyRequest {
    pub furniture_item_id: CatalogId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cuft: String,
    #[serde(default)]
    pub lbs: String,
    #[serde(default, alias = "packingNeeds")]
    #[schema(value_type = BTreeMap<String, u32>)]
    pub packing_needs_counts: PackingNeeds,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub uploaded_images: Vec<String>,
    #[serde(default)]
    pub camera_images: Vec<String>,
}

impl GroupingKeyRequest {
    fn into_instance(self) -> ItemInstance {
        ItemInstance {
            id: String::new(),
            furniture_item_id: self.furniture_item_id,
            room_id: 0,
            name: String::new(),
            image_name: String::new(),
            letters: Vec::new(),
            search: false,
            tags: self.tags,
            notes: self.notes,
            cuft: self.cuft,
            lbs: self.lbs,
            packing_needs_counts: self.packing_needs_counts,
            link: self.link,
            uploaded_images: self.uploaded_images,
            camera_images: self.camera_images,
            auto_added: false,
            grouping_key: String::new(),
            count: 1,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupingKeyResponse {
    pub grouping_key: String,
}

/// Items of a stop plus the auto-box bookkeeping of the previous run.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub items: Vec<ItemInstance>,
    #[serde(default)]
    pub state: AutoBoxState,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<BoxReconciliation>,
}

impl From<Option<BoxReconciliation>> for ReconcileResponse {
    fn from(result: Option<BoxReconciliation>) -> Self {
        Self {
            changed: result.is_some(),
            reconciliation: result,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({ "tags": ["blanket_wrapped"], "tag": "crating" }))]
pub struct TagToggleRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    pub tag: String,
}

#[derive(Serialize, ToSchema)]
pub struct TagToggleResponse {
    pub tags: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "catalogId": 7,
    "roomId": 4,
    "count": 1,
    "config": { "notes": "headboard loose" }
}))]
pub struct AddItemRequest {
    pub catalog_id: CatalogId,
    pub room_id: RoomId,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub config: ItemConfig,
}

fn default_count() -> u32 {
    1
}

#[derive(Deserialize, ToSchema)]
pub struct SetCountRequest {
    pub count: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct AutoBoxesRequest {
    pub enabled: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoBoxesResponse {
    pub enabled: bool,
    pub boxes_added: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomToggleResponse {
    pub room_id: RoomId,
    pub displayed: bool,
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    pub saved: bool,
}

/// Current state of a stop.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub stop_id: String,
    pub items_by_room: BTreeMap<RoomId, Vec<ItemInstance>>,
    #[schema(value_type = Vec<u32>)]
    pub displayed_rooms: BTreeSet<RoomId>,
    pub auto_boxes_enabled: bool,
    pub auto_box_state: AutoBoxState,
    pub totals: InventoryTotals,
}

impl InventoryResponse {
    fn from_inventory(inventory: &StopInventory, ctx: &InventoryContext) -> Self {
        Self {
            stop_id: inventory.stop_id().to_string(),
            items_by_room: inventory.items_by_room().clone(),
            displayed_rooms: inventory.displayed_rooms().clone(),
            auto_boxes_enabled: inventory.auto_boxes_enabled(),
            auto_box_state: inventory.auto_box_state().clone(),
            totals: inventory.totals(ctx),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

/// Maps a domain error onto its HTTP status.
fn inventory_error(err: Error) -> Response {
    let (status, error) = match &err {
        Error::ItemNotFound(_) => (StatusCode::NOT_FOUND, "Item not found"),
        Error::StopNotOpen(_) => (StatusCode::NOT_FOUND, "Stop not open"),
        Error::RoomNotToggleable(_) => (StatusCode::CONFLICT, "Room cannot be toggled"),
        Error::UnknownCatalogItem(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Unknown catalog item"),
        Error::InvalidTag(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid tags"),
        Error::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid input data"),
        Error::Io(_) | Error::Json(_) => {
            tracing::error!(error = %err, "storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
        }
    };
    error_response(status, error, err.to_string())
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(err) => Err(json_deserialize_error(err)),
    }
}

/// Rejects rows whose weight or volume is beyond any real item.
fn check_measures(items: &[ItemInstance]) -> Result<(), Response> {
    for item in items {
        for (name, value) in [("Lbs", item.lbs()), ("Cuft", item.cuft_value())] {
            if value > MAX_MEASURE {
                let details = format!(
                    "{} of item {} must not exceed {}, got: {}",
                    name, item.id, MAX_MEASURE, value
                );
                return Err(inventory_error(Error::Validation(
                    ValidationError::InvalidMeasure(details),
                )));
            }
        }
    }
    Ok(())
}

fn respond<T: Serialize>(result: Result<T, Error>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => inventory_error(err),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_grouping_key,
        handle_reconcile,
        handle_reconcile_stream,
        handle_toggle_tag,
        handle_catalog,
        handle_get_inventory,
        handle_add_item,
        handle_update_item,
        handle_delete_item,
        handle_set_count,
        handle_toggle_room,
        handle_auto_boxes,
        handle_save,
        handle_close
    ),
    components(
        schemas(
            GroupingKeyRequest,
            GroupingKeyResponse,
            ReconcileRequest,
            ReconcileResponse,
            TagToggleRequest,
            TagToggleResponse,
            AddItemRequest,
            SetCountRequest,
            AutoBoxesRequest,
            AutoBoxesResponse,
            RoomToggleResponse,
            SaveResponse,
            InventoryResponse,
            MutationOutcome,
            InventoryTotals,
            ItemInstance,
            ItemConfig,
            ItemPatch,
            CatalogItem,
            AutoBoxState,
            BoxReconciliation,
            ErrorResponse
        )
    ),
    tags(
        (name = "grouping", description = "Item identity and tag rules"),
        (name = "autobox", description = "Automatic packing boxes"),
        (name = "inventory", description = "Per-stop inventory sessions")
    )
)]
struct ApiDoc;

/// Builds the router with all endpoints.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // Stateless endpoints
        .route("/grouping_key", post(handle_grouping_key))
        .route("/reconcile", post(handle_reconcile))
        .route("/reconcile_stream", post(handle_reconcile_stream))
        .route("/tags/toggle", post(handle_toggle_tag))
        .route("/catalog", get(handle_catalog))
        // Stop sessions
        .route("/stops/{stop_id}/inventory", get(handle_get_inventory))
        .route("/stops/{stop_id}/items", post(handle_add_item))
        .route(
            "/stops/{stop_id}/items/{item_id}",
            put(handle_update_item).delete(handle_delete_item),
        )
        .route("/stops/{stop_id}/items/{item_id}/count", put(handle_set_count))
        .route("/stops/{stop_id}/rooms/{room_id}/toggle", post(handle_toggle_room))
        .route("/stops/{stop_id}/auto_boxes", post(handle_auto_boxes))
        .route("/stops/{stop_id}/save", post(handle_save))
        .route("/stops/{stop_id}/close", post(handle_close))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let app = router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        tracing::info!("local access: http://localhost:{}", config.port());
    }
    tracing::info!("documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /grouping_key.
#[utoipa::path(
    post,
    path = "/grouping_key",
    request_body = GroupingKeyRequest,
    responses(
        (status = 200, description = "Grouping key of the configuration", body = GroupingKeyResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "grouping"
)]
async fn handle_grouping_key(payload: Result<Json<GroupingKeyRequest>, JsonRejection>) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let grouping_key = compute_grouping_key(&request.into_instance());
    (StatusCode::OK, Json(GroupingKeyResponse { grouping_key })).into_response()
}

/// Handler for POST /reconcile.
///
/// Runs the auto-box engine over a supplied item list. Nothing is stored.
#[utoipa::path(
    post,
    path = "/reconcile",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Reconciliation result, `changed: false` for a no-op", body = ReconcileResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "autobox"
)]
async fn handle_reconcile(
    State(state): State<ApiState>,
    payload: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if let Err(response) = check_measures(&request.items) {
        return response;
    }

    tracing::debug!(items = request.items.len(), "reconcile request");
    let ctx = &state.ctx;
    let result = reconcile_boxes_with_progress(
        &request.items,
        &ctx.catalog,
        &ctx.rules,
        &request.state,
        &ctx.auto_box,
        |_| {},
    );
    (StatusCode::OK, Json(ReconcileResponse::from(result))).into_response()
}

/// Handler for POST /reconcile_stream (SSE).
///
/// Streams the engine's events as they happen, followed by a `result` event
/// carrying the same body as POST /reconcile.
#[utoipa::path(
    post,
    path = "/reconcile_stream",
    request_body = ReconcileRequest,
    responses(
        (
            status = 200,
            description = "Streams reconciliation events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "autobox"
)]
async fn handle_reconcile_stream(
    State(state): State<ApiState>,
    payload: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if let Err(response) = check_measures(&request.items) {
        return response;
    }

    let (tx, rx) = mpsc::channel::<Event>(32);
    let ctx = Arc::clone(&state.ctx);

    tokio::task::spawn_blocking(move || {
        let result = reconcile_boxes_with_progress(
            &request.items,
            &ctx.catalog,
            &ctx.rules,
            &request.state,
            &ctx.auto_box,
            |evt| {
                if let Ok(json) = serde_json::to_string(evt) {
                    // A closed receiver only drops the remaining events.
                    let _ = tx.blocking_send(Event::default().data(json));
                }
            },
        );
        if let Ok(json) = serde_json::to_string(&ReconcileResponse::from(result)) {
            let _ = tx.blocking_send(Event::default().event("result").data(json));
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /tags/toggle.
#[utoipa::path(
    post,
    path = "/tags/toggle",
    request_body = TagToggleRequest,
    responses(
        (status = 200, description = "Tag selection after the toggle", body = TagToggleResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Unknown tag", body = ErrorResponse)
    ),
    tag = "grouping"
)]
async fn handle_toggle_tag(
    State(state): State<ApiState>,
    payload: Result<Json<TagToggleRequest>, JsonRejection>,
) -> Response {
    let TagToggleRequest { mut tags, tag } = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond(
        state
            .ctx
            .rules
            .toggle_tag(&mut tags, &tag)
            .map(|()| TagToggleResponse { tags }),
    )
}

/// Handler for GET /catalog.
#[utoipa::path(
    get,
    path = "/catalog",
    responses((status = 200, description = "All catalog items", body = [CatalogItem])),
    tag = "inventory"
)]
async fn handle_catalog(State(state): State<ApiState>) -> Response {
    (StatusCode::OK, Json(state.ctx.catalog.items().to_vec())).into_response()
}

/// Handler for GET /stops/{stop_id}/inventory. Opens the stop if needed.
#[utoipa::path(
    get,
    path = "/stops/{stop_id}/inventory",
    params(("stop_id" = String, Path, description = "Stop identifier")),
    responses(
        (status = 200, description = "Current inventory of the stop", body = InventoryResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Stored inventory could not be read", body = ErrorResponse)
    ),
    tag = "inventory"
)]
async fn handle_get_inventory(
    State(state): State<ApiState>,
    Path(stop_id): Path<String>,
) -> Response {
    respond(
        state
            .with_session(&stop_id, |inventory, ctx| {
                Ok(InventoryResponse::from_inventory(inventory, ctx))
            })
            .await,
    )
}

/// Handler for POST /stops/{stop_id}/items.
#[utoipa::path(
    post,
    path = "/stops/{stop_id}/items",
    params(("stop_id" = String, Path, description = "Stop identifier")),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Item added or merged", body = MutationOutcome),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid item", body = ErrorResponse)
    ),
    tag = "inventory"
)]
async fn handle_add_item(
    State(state): State<ApiState>,
    Path(stop_id): Path<String>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond(
        state
            .with_session(&stop_id, |inventory, ctx| {
                inventory.add_item(
                    ctx,
                    request.catalog_id,
                    request.room_id,
                    request.config,
                    request.count,
                )
            })
            .await,
    )
}

/// Handler for PUT /stops/{stop_id}/items/{item_id}.
#[utoipa::path(
    put,
    path = "/stops/{stop_id}/items/{item_id}",
    params(
        ("stop_id" = String, Path, description = "Stop identifier"),
        ("item_id" = String, Path, description = "Item instance identifier")
    ),
    request_body = ItemPatch,
    responses(
        (status = 200, description = "Item updated, possibly merged", body = MutationOutcome),
        (status = NOT_FOUND, description = "Unknown item", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid edit", body = ErrorResponse)
    ),
    tag = "inventory"
)]
async fn handle_update_item(
    State(state): State<ApiState>,
    Path((stop_id, item_id)): Path<(String, String)>,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> Response {
    let patch = match parse_json(payload) {
        Ok(patch) => patch,
        Err(response) => return response,
    };
    respond(
        state
            .with_session(&stop_id, |inventory, ctx| {
                inventory.update_item(ctx, &item_id, patch)
            })
            .await,
    )
}

/// Handler for DELETE /stops/{stop_id}/items/{item_id}. Removes one unit.
#[utoipa::path(
    delete,
    path = "/stops/{stop_id}/items/{item_id}",
    params(
        ("stop_id" = String, Path, description = "Stop identifier"),
        ("item_id" = String, Path, description = "Item instance identifier")
    ),
    responses(
        (status = 200, description = "Count decremented, item gone at zero", body = MutationOutcome),
        (status = NOT_FOUND, description = "Unknown item", body = ErrorResponse)
    ),
    tag = "inventory"
)]
async fn handle_delete_item(
    State(state): State<ApiState>,
    Path((stop_id, item_id)): Path<(String, String)>,
) -> Response {
    respond(
        state
            .with_session(&stop_id, |inventory, ctx| {
                inventory.delete_item(ctx, &item_id)
            })
            .await,
    )
}

/// Handler for PUT /stops/{stop_id}/items/{item_id}/count.
#[utoipa::path(
    put,
    path = "/stops/{stop_id}/items/{item_id}/count",
    params(
        ("stop_id" = String, Path, description = "Stop identifier"),
        ("item_id" = String, Path, description = "Item instance identifier")
    ),
    request_body = SetCountRequest,
    responses(
        (status = 200, description = "Count set, item gone at zero", body = MutationOutcome),
        (status = NOT_FOUND, description = "Unknown item", body = ErrorResponse)
    ),
    tag = "inventory"
)]
async fn handle_set_count(
    State(state): State<ApiState>,
    Path((stop_id, item_id)): Path<(String, String)>,
    payload: Result<Json<SetCountRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond(
        state
            .with_session(&stop_id, |inventory, ctx| {
                inventory.set_count(ctx, &item_id, request.count)
            })
            .await,
    )
}

/// Handler for POST /stops/{stop_id}/rooms/{room_id}/toggle.
#[utoipa::path(
    post,
    path = "/stops/{stop_id}/rooms/{room_id}/toggle",
    params(
        ("stop_id" = String, Path, description = "Stop identifier"),
        ("room_id" = u32, Path, description = "Room identifier")
    ),
    responses(
        (status = 200, description = "Room shown or hidden", body = RoomToggleResponse),
        (status = CONFLICT, description = "The boxes room cannot be toggled", body = ErrorResponse)
    ),
    tag = "inventory"
)]
async fn handle_toggle_room(
    State(state): State<ApiState>,
    Path((stop_id, room_id)): Path<(String, RoomId)>,
) -> Response {
    respond(
        state
            .with_session(&stop_id, |inventory, _| {
                let displayed = inventory.toggle_room(room_id)?;
                Ok(RoomToggleResponse { room_id, displayed })
            })
            .await,
    )
}

/// Handler for POST /stops/{stop_id}/auto_boxes.
#[utoipa::path(
    post,
    path = "/stops/{stop_id}/auto_boxes",
    params(("stop_id" = String, Path, description = "Stop identifier")),
    request_body = AutoBoxesRequest,
    responses((status = 200, description = "Auto-box mode switched", body = AutoBoxesResponse)),
    tag = "autobox"
)]
async fn handle_auto_boxes(
    State(state): State<ApiState>,
    Path(stop_id): Path<String>,
    payload: Result<Json<AutoBoxesRequest>, JsonRejection>,
) -> Response {
    let AutoBoxesRequest { enabled } = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond(
        state
            .with_session(&stop_id, |inventory, ctx| {
                let boxes_added = inventory.set_auto_boxes(ctx, enabled);
                Ok(AutoBoxesResponse {
                    enabled,
                    boxes_added,
                })
            })
            .await,
    )
}

/// Handler for POST /stops/{stop_id}/save.
#[utoipa::path(
    post,
    path = "/stops/{stop_id}/save",
    params(("stop_id" = String, Path, description = "Stop identifier")),
    responses(
        (status = 200, description = "Inventory written to the store", body = SaveResponse),
        (status = NOT_FOUND, description = "Stop is not open", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Store failure", body = ErrorResponse)
    ),
    tag = "inventory"
)]
async fn handle_save(State(state): State<ApiState>, Path(stop_id): Path<String>) -> Response {
    let snapshot = {
        let sessions = state.sessions.lock().await;
        match sessions.get(&stop_id) {
            Some(inventory) => inventory.snapshot(),
            None => return inventory_error(Error::StopNotOpen(stop_id)),
        }
    };

    respond(
        state
            .store
            .save_inventory(&stop_id, &snapshot)
            .await
            .map(|()| {
                tracing::info!(stop = %stop_id, "stop saved");
                SaveResponse { saved: true }
            }),
    )
}

/// Handler for POST /stops/{stop_id}/close.
///
/// Attempts a final save and evicts the session either way. A failed save is
/// logged and reported as `saved: false`. The session stays locked until the
/// save has finished, so requests arriving meanwhile see the closed state.
#[utoipa::path(
    post,
    path = "/stops/{stop_id}/close",
    params(("stop_id" = String, Path, description = "Stop identifier")),
    responses((status = 200, description = "Session closed", body = SaveResponse)),
    tag = "inventory"
)]
async fn handle_close(State(state): State<ApiState>, Path(stop_id): Path<String>) -> Response {
    let mut sessions = state.sessions.lock().await;
    let Some(snapshot) = sessions.get(&stop_id).map(StopInventory::snapshot) else {
        return (StatusCode::OK, Json(SaveResponse { saved: false })).into_response();
    };

    let saved = match state.store.save_inventory(&stop_id, &snapshot).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(stop = %stop_id, error = %err, "saving on close failed");
            false
        }
    };
    sessions.remove(&stop_id);
    drop(sessions);

    tracing::info!(stop = %stop_id, saved, "stop closed");
    (StatusCode::OK, Json(SaveResponse { saved })).into_response()
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
