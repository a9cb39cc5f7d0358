use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthSession, Authenticator, IdentityProvider, Session, SessionStore};
use crate::config::ServiceConfig;
use crate::error::{ApiError, ApiResult};
use crate::monitor::{QueueSummary, SummaryHandle};
use crate::queue_view::{enrich_order, QueueDetail, QueueView};
use crate::repository::{Page, PageParams, Repository};
use crate::stats::DashboardService;
use crate::store::{DbPool, ReadStore};

#[derive(Clone)]
pub struct AppState {
    pub repository: Repository,
    pub dashboard: DashboardService,
    pub store: Arc<dyn ReadStore>,
    pub queue: QueueView,
    pub auth: Authenticator,
    pub sessions: SessionStore,
    pub summary: SummaryHandle,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        store: Arc<dyn ReadStore>,
        identity: Arc<dyn IdentityProvider>,
        summary: SummaryHandle,
        config: &ServiceConfig,
    ) -> Self {
        let sessions = SessionStore::new(config.session_ttl);
        Self {
            repository: Repository::new(pool.clone()),
            dashboard: DashboardService::new(pool),
            queue: QueueView::new(store.clone(), config.steps.clone(), config.unknown_recheck),
            auth: Authenticator::new(identity, store.clone(), sessions.clone()),
            store,
            sessions,
            summary,
        }
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/login/idp", post(login_with_idp))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(current_session))
        .route("/users", get(list_users))
        .route("/users/invite", post(invite_user))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/admin", put(set_admin))
        .route("/admin-users", get(list_admin_users))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/artists", get(list_artists).post(create_artist))
        .route("/artists/:id", put(update_artist).delete(delete_artist))
        .route("/subjects", get(list_subjects).post(create_subject))
        .route("/subjects/:id", put(update_subject).delete(delete_subject))
        .route("/home-images", get(list_home_images).post(create_home_image))
        .route("/home-images/:id", put(update_home_image).delete(delete_home_image))
        .route("/images", get(list_images))
        .route("/images/:id", axum::routing::delete(delete_image))
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/dashboard/trends", get(dashboard_trends))
        .route("/queue", get(list_queue))
        .route("/queue/summary", get(queue_summary))
        .route("/queue/:order_id", get(get_queue_item))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}

fn deleted(found: bool, what: &str, id: &str) -> ApiResult<StatusCode> {
    if found {
        tracing::info!("Deleted {} {}", what, id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("{} {} not found", what, id)))
    }
}

fn found<T>(value: Option<T>, what: &str, id: &str) -> ApiResult<Json<T>> {
    value
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", what, id)))
}

// Auth

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct IdpLoginRequest {
    pub provider_id: String,
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<Json<Session>> {
    let session = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(session))
}

pub async fn login_with_idp(
    State(state): State<AppState>,
    Json(request): Json<IdpLoginRequest>,
) -> ApiResult<Json<Session>> {
    let session = state
        .auth
        .login_with_idp(&request.provider_id, &request.id_token)
        .await?;
    Ok(Json(session))
}

pub async fn logout(State(state): State<AppState>, AuthSession(session): AuthSession) -> StatusCode {
    state.auth.logout(session.token).await;
    tracing::info!("Staff session closed for {}", session.user.uid);
    StatusCode::NO_CONTENT
}

pub async fn current_session(AuthSession(session): AuthSession) -> Json<Session> {
    Json(session)
}

pub async fn invite_user(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(request): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    if !request.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    state.auth.invite(&request.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: format!("Invitation sent to {}", request.email),
        }),
    ))
}

// Users

#[derive(Debug, Serialize)]
pub struct UserOverview {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub orders: Vec<OrderAggregate>,
    pub images: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
pub struct AdminFlag {
    pub is_admin: bool,
}

pub async fn list_users(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<UserProfile>>> {
    Ok(Json(state.repository.list_users(&params).await?))
}

pub async fn list_admin_users(
    State(state): State<AppState>,
    _session: AuthSession,
) -> ApiResult<Json<Vec<UserProfile>>> {
    Ok(Json(state.repository.list_admin_users().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<Json<UserOverview>> {
    let (profile, orders, images) = futures::try_join!(
        state.store.find_user(&id),
        state.repository.orders_for_user(&id),
        state.repository.images_for_user(&id)
    )?;
    let Some(profile) = profile else {
        return Err(ApiError::NotFound(format!("user {} not found", id)));
    };

    let store = state.store.as_ref();
    let orders = join_all(orders.into_iter().map(|order| enrich_order(store, order))).await;

    Ok(Json(UserOverview { profile, orders, images }))
}

pub async fn set_admin(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
    Json(flag): Json<AdminFlag>,
) -> ApiResult<Json<UserProfile>> {
    found(state.repository.set_admin(&id, flag.is_admin).await?, "user", &id)
}

pub async fn delete_user(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted(state.repository.delete_user(&id).await?, "user", &id)
}

// Products

pub async fn list_products(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Product>>> {
    Ok(Json(state.repository.list_products(&params).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(draft): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.repository.create_product(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<Product>> {
    found(state.repository.update_product(&id, patch).await?, "product", &id)
}

pub async fn delete_product(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted(state.repository.delete_product(&id).await?, "product", &id)
}

// Orders

pub async fn list_orders(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Order>>> {
    Ok(Json(state.repository.list_orders(&params).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderAggregate>> {
    let Some(order) = state.store.find_order(&id).await? else {
        return Err(ApiError::NotFound(format!("order {} not found", id)));
    };
    Ok(Json(enrich_order(state.store.as_ref(), order).await))
}

pub async fn update_order(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
    Json(patch): Json<OrderPatch>,
) -> ApiResult<Json<Order>> {
    found(state.repository.update_order(&id, patch).await?, "order", &id)
}

pub async fn delete_order(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted(state.repository.delete_order(&id).await?, "order", &id)
}

// Artists

pub async fn list_artists(State(state): State<AppState>, _session: AuthSession) -> ApiResult<Json<Vec<Artist>>> {
    Ok(Json(state.repository.list_artists().await?))
}

pub async fn create_artist(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(draft): Json<NewArtist>,
) -> ApiResult<(StatusCode, Json<Artist>)> {
    let artist = state.repository.create_artist(draft).await?;
    Ok((StatusCode::CREATED, Json(artist)))
}

pub async fn update_artist(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
    Json(patch): Json<ArtistPatch>,
) -> ApiResult<Json<Artist>> {
    found(state.repository.update_artist(&id, patch).await?, "artist", &id)
}

pub async fn delete_artist(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted(state.repository.delete_artist(&id).await?, "artist", &id)
}

// Subjects

pub async fn list_subjects(State(state): State<AppState>, _session: AuthSession) -> ApiResult<Json<Vec<Subject>>> {
    Ok(Json(state.repository.list_subjects().await?))
}

pub async fn create_subject(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(draft): Json<NewSubject>,
) -> ApiResult<(StatusCode, Json<Subject>)> {
    let subject = state.repository.create_subject(draft).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn update_subject(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
    Json(patch): Json<SubjectPatch>,
) -> ApiResult<Json<Subject>> {
    found(state.repository.update_subject(&id, patch).await?, "subject", &id)
}

pub async fn delete_subject(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted(state.repository.delete_subject(&id).await?, "subject", &id)
}

// Home images

pub async fn list_home_images(
    State(state): State<AppState>,
    _session: AuthSession,
) -> ApiResult<Json<Vec<HomeImage>>> {
    Ok(Json(state.repository.list_home_images().await?))
}

pub async fn create_home_image(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(draft): Json<NewHomeImage>,
) -> ApiResult<(StatusCode, Json<HomeImage>)> {
    let image = state.repository.create_home_image(draft).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn update_home_image(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
    Json(patch): Json<HomeImagePatch>,
) -> ApiResult<Json<HomeImage>> {
    found(state.repository.update_home_image(&id, patch).await?, "home image", &id)
}

pub async fn delete_home_image(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted(state.repository.delete_home_image(&id).await?, "home image", &id)
}

// Generated images

pub async fn list_images(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<GeneratedImage>>> {
    Ok(Json(state.repository.list_images(&params).await?))
}

pub async fn delete_image(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted(state.repository.delete_image(&id).await?, "image", &id)
}

// Dashboard

pub async fn dashboard_stats(State(state): State<AppState>, _session: AuthSession) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.dashboard.stats().await?))
}

pub async fn dashboard_trends(
    State(state): State<AppState>,
    _session: AuthSession,
) -> ApiResult<Json<DashboardTrends>> {
    Ok(Json(state.dashboard.trends(Utc::now()).await?))
}

// Queue

/// Raw query string of the queue list; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct QueueParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

impl TryFrom<QueueParams> for QueueQuery {
    type Error = ApiError;

    fn try_from(params: QueueParams) -> Result<Self, Self::Error> {
        let invalid = |param: &str, e: UnrecognizedValue| ApiError::BadRequest(format!("{}: {}", param, e));

        let mut query = QueueQuery {
            search: params.search.filter(|s| !s.trim().is_empty()),
            ..Default::default()
        };
        if let Some(status) = params.status {
            query.status = status.parse().map_err(|e| invalid("status", e))?;
        }
        if let Some(priority) = params.priority {
            query.priority = priority.parse().map_err(|e| invalid("priority", e))?;
        }
        if let Some(sort) = params.sort {
            query.sort.field = sort.parse().map_err(|e| invalid("sort", e))?;
        }
        if let Some(direction) = params.direction {
            query.sort.direction = direction.parse().map_err(|e| invalid("direction", e))?;
        }
        Ok(query)
    }
}

pub async fn list_queue(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(params): Query<QueueParams>,
) -> ApiResult<Json<Vec<QueueItem>>> {
    let query = QueueQuery::try_from(params)?;
    Ok(Json(state.queue.list(&query).await?))
}

pub async fn get_queue_item(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(order_id): Path<String>,
) -> ApiResult<Json<QueueDetail>> {
    found(state.queue.load_queue_detail(&order_id).await?, "queue item", &order_id)
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: QueueSummary,
    pub stale_since: Option<DateTime<Utc>>,
}

pub async fn queue_summary(State(state): State<AppState>, _session: AuthSession) -> Json<SummaryResponse> {
    let summary = state.summary.read().await.clone();
    let stale_since = summary.last_error.as_ref().and(summary.refreshed_at);
    Json(SummaryResponse { summary, stale_since })
}
