//! Movie catalog endpoints

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::{parse_id, store_error};
use crate::{
    db::MovieRepository,
    models::{
        CreateMovieRequest, Filters, Movie, QueryParams, UpdateMovieRequest, MOVIES_READ,
        MOVIES_WRITE, MOVIE_SORT_SAFELIST,
    },
    require_permission,
    utils::{AppError, JsonBody, Validator},
    AppState,
};

/// Create routes for movie endpoints
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_movies)
                .route_layer(require_permission!(state, MOVIES_READ))
                .merge(post(create_movie).route_layer(require_permission!(state, MOVIES_WRITE))),
        )
        .route(
            "/{id}",
            get(show_movie)
                .route_layer(require_permission!(state, MOVIES_READ))
                .merge(
                    axum::routing::patch(update_movie)
                        .delete(delete_movie)
                        .route_layer(require_permission!(state, MOVIES_WRITE)),
                ),
        )
}

/// List movies with filtering, sorting and pagination
async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    let query = QueryParams::new(&params);
    let mut v = Validator::new();

    let title = query.string("title", "");
    let genres = query.csv("genres");
    let filters = Filters {
        page: query.int("page", 1, &mut v),
        page_size: query.int("page_size", 20, &mut v),
        sort: query.string("sort", "id"),
        sort_safelist: MOVIE_SORT_SAFELIST,
    };
    filters.validate(&mut v);
    v.finish()?;

    let (movies, metadata) = MovieRepository::new(&state.db)
        .list(&title, &genres, &filters)
        .await
        .map_err(store_error)?;

    Ok(Json(json!({ "movies": movies, "metadata": metadata })))
}

/// Create a new movie
async fn create_movie(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateMovieRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), AppError> {
    let mut movie = Movie::from(payload);

    let mut v = Validator::new();
    movie.validate(&mut v);
    v.finish()?;

    MovieRepository::new(&state.db)
        .insert(&mut movie)
        .await
        .map_err(store_error)?;

    info!(movie_id = movie.id, title = %movie.title, "Movie created");

    let mut headers = HeaderMap::new();
    let location = format!("/v1/movies/{}", movie.id);
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(LOCATION, value);
    }

    Ok((StatusCode::CREATED, headers, Json(json!({ "movie": movie }))))
}

/// Get a specific movie
async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    let movie = MovieRepository::new(&state.db)
        .get(id)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "movie": movie })))
}

/// Partially update a movie
///
/// An optional `X-Expected-Version` header must match the stored version.
async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<UpdateMovieRequest>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    let repo = MovieRepository::new(&state.db);
    let mut movie = repo.get(id).await.map_err(store_error)?;

    if let Some(expected) = headers.get("x-expected-version") {
        if expected.to_str().ok() != Some(movie.version.to_string().as_str()) {
            return Err(AppError::EditConflict);
        }
    }

    payload.apply(&mut movie);

    let mut v = Validator::new();
    movie.validate(&mut v);
    v.finish()?;

    repo.update(&mut movie).await.map_err(store_error)?;

    Ok(Json(json!({ "movie": movie })))
}

/// Delete a movie
async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    MovieRepository::new(&state.db)
        .delete(id)
        .await
        .map_err(store_error)?;

    info!(movie_id = id, "Movie deleted");
    Ok(Json(json!({ "message": "movie successfully deleted" })))
}
