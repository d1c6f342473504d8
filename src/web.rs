use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::handlers::{KitchenOrchestrator, KitchenState, NoticeBoard};
use crate::models::{DishImage, EditRequest, IngredientQuery, Recipe};

pub struct AppState {
    /// None when no API key is configured; the page then shows the setup screen.
    pub kitchen: Option<Arc<KitchenOrchestrator>>,
    pub notices: Arc<NoticeBoard>,
}

#[derive(Deserialize)]
pub struct RecommendBody {
    pub ingredients: String,
}

#[derive(Deserialize)]
pub struct EditBody {
    pub instruction: String,
}

/// What the page polls and renders
#[derive(Debug, Serialize)]
pub struct StateView {
    pub ingredients: String,
    pub recipe: Option<Recipe>,
    pub image: Option<DishImage>,
    pub edit_prompt: String,
    pub is_loading: bool,
    pub is_image_loading: bool,
    pub is_editing: bool,
    pub edit_enabled: bool,
    pub notices: Vec<String>,
}

impl StateView {
    fn new(state: KitchenState, notices: Vec<String>) -> Self {
        Self {
            is_loading: state.is_loading(),
            is_image_loading: state.is_image_loading(),
            is_editing: state.is_editing(),
            edit_enabled: state.edit_enabled(),
            ingredients: state.ingredients,
            recipe: state.recipe,
            image: state.image,
            edit_prompt: state.edit_prompt,
            notices,
        }
    }
}

pub fn create_router(kitchen: Option<Arc<KitchenOrchestrator>>, notices: Arc<NoticeBoard>) -> Router {
    let state = Arc::new(AppState { kitchen, notices });

    Router::new()
        .route("/", get(index_page))
        .route("/health", get(health_check))
        .route("/api/state", get(get_state))
        .route("/api/recommend", post(recommend))
        .route("/api/edit", post(edit_image))
        .route("/api/image", get(get_image))
        .with_state(state)
}

/// Workflow endpoints are unavailable until an API key is configured
fn require_kitchen(state: &AppState) -> Result<Arc<KitchenOrchestrator>, StatusCode> {
    state
        .kitchen
        .clone()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn index_page(State(state): State<Arc<AppState>>) -> Html<&'static str> {
    if state.kitchen.is_some() {
        Html(include_str!("../static/index.html"))
    } else {
        Html(include_str!("../static/setup.html"))
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_state(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    let kitchen = require_kitchen(&state)?;
    let view = StateView::new(kitchen.snapshot(), state.notices.take_all());
    Ok(Json(view))
}

async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecommendBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let kitchen = require_kitchen(&state)?;

    if kitchen.snapshot().is_loading() {
        return Err(StatusCode::CONFLICT);
    }

    let query = IngredientQuery::parse(&body.ingredients);
    kitchen.set_ingredients(body.ingredients);

    // Blank input: nothing to do, hand back the unchanged state
    let Some(query) = query else {
        return Ok((StatusCode::OK, Json(StateView::new(kitchen.snapshot(), Vec::new()))));
    };

    log::info!("🍽️ Recommendation requested for: {}", query.as_str());
    let mut rx = kitchen.subscribe();
    tokio::spawn({
        let kitchen = kitchen.clone();
        async move {
            kitchen.recommend(query).await;
        }
    });

    // Answer once the workflow has made its first move so the page sees it busy
    let _ = rx.changed().await;
    let snapshot = rx.borrow_and_update().clone();
    Ok((StatusCode::ACCEPTED, Json(StateView::new(snapshot, Vec::new()))))
}

async fn edit_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EditBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let kitchen = require_kitchen(&state)?;

    if kitchen.snapshot().is_editing() {
        return Err(StatusCode::CONFLICT);
    }

    let request = kitchen
        .snapshot()
        .image
        .and_then(|image| EditRequest::new(image, &body.instruction));
    kitchen.set_edit_prompt(body.instruction);

    // No image yet or blank instruction
    let Some(request) = request else {
        return Ok((StatusCode::OK, Json(StateView::new(kitchen.snapshot(), Vec::new()))));
    };

    log::info!("✏️ Image edit requested: {}", request.instruction);
    let mut rx = kitchen.subscribe();
    tokio::spawn({
        let kitchen = kitchen.clone();
        async move {
            kitchen.edit_image(request).await;
        }
    });

    let _ = rx.changed().await;
    let snapshot = rx.borrow_and_update().clone();
    Ok((StatusCode::ACCEPTED, Json(StateView::new(snapshot, Vec::new()))))
}

/// Current dish image as raw bytes
async fn get_image(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    let kitchen = require_kitchen(&state)?;
    let image = kitchen.snapshot().image.ok_or(StatusCode::NOT_FOUND)?;

    let bytes = image.decoded_bytes().map_err(|e| {
        log::error!("Failed to decode dish image: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, image.mime_type)], bytes))
}
