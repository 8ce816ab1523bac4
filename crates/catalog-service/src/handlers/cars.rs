//! Car catalog handlers.
//!
//! Authorization is enforced by the gate middleware before any of these run.
//! `PUT` additionally checks `SCOPE_write` itself.

use crate::auth::Principal;
use crate::errors::CatalogError;
use crate::middleware::PrincipalExt;
use crate::models::{Car, CarDto, CarRequest, CreateCarResponse, Page, PageParams};
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Authority required to replace a car.
pub const WRITE_AUTHORITY: &str = "SCOPE_write";

fn parse_body(body: Result<Json<CarRequest>, JsonRejection>) -> Result<CarRequest, CatalogError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!(target: "catalog.handlers.cars", error = %e, "Rejected car body");
        CatalogError::BadRequest("Invalid request body".to_string())
    })?;

    request
        .validate()
        .map_err(|reason| CatalogError::BadRequest(reason.to_string()))?;
    Ok(request)
}

fn to_page(cars: &[Car], params: PageParams) -> Page<CarDto> {
    Page::from_items(cars.iter().map(CarDto::from).collect(), params)
}

/// Handler for POST /cars
///
/// Returns 201 with the new car's ids, 400 for an invalid body and 409 if the
/// `object_id` is taken.
#[instrument(skip_all, name = "catalog.handlers.cars.create")]
pub async fn create_car(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CarRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateCarResponse>), CatalogError> {
    let request = parse_body(body)?;
    let car = state.cars.create(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCarResponse {
            id: car.id,
            object_id: car.object_id,
        }),
    ))
}

/// Handler for GET /cars
///
/// All cars, make descending.
#[instrument(skip_all, name = "catalog.handlers.cars.list")]
pub async fn list_cars(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Json<Page<CarDto>> {
    let cars = state.cars.find_all().await;
    Json(to_page(&cars, params))
}

/// Handler for GET /cars/:object_id
#[instrument(skip_all, name = "catalog.handlers.cars.get")]
pub async fn get_car(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<String>,
) -> Result<Json<CarDto>, CatalogError> {
    let car = state
        .cars
        .get_by_object_id(&object_id)
        .await
        .ok_or_else(|| CatalogError::NotFound("Car not found".to_string()))?;

    Ok(Json(CarDto::from(&car)))
}

/// Handler for PUT /cars/:object_id
///
/// The `object_id` in the body, if any, is ignored.
#[instrument(skip_all, name = "catalog.handlers.cars.update")]
pub async fn update_car(
    State(state): State<Arc<AppState>>,
    principal: Option<Extension<Principal>>,
    Path(object_id): Path<String>,
    body: Result<Json<CarRequest>, JsonRejection>,
) -> Result<Json<CarDto>, CatalogError> {
    if !principal.is_authenticated() {
        return Err(CatalogError::Unauthenticated);
    }
    if !principal.has_authority(WRITE_AUTHORITY) {
        tracing::debug!(target: "catalog.handlers.cars", "Update without write authority");
        return Err(CatalogError::InsufficientScope);
    }

    let request = parse_body(body)?;
    let car = state.cars.update(&object_id, request).await?;

    Ok(Json(CarDto::from(&car)))
}

/// Handler for DELETE /cars/:object_id
///
/// Returns 204 on success.
#[instrument(skip_all, name = "catalog.handlers.cars.delete")]
pub async fn delete_car(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<String>,
) -> Result<StatusCode, CatalogError> {
    state.cars.delete_by_object_id(&object_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /cars/makes/:make
#[instrument(skip_all, name = "catalog.handlers.cars.by_make")]
pub async fn cars_by_make(
    State(state): State<Arc<AppState>>,
    Path(make): Path<String>,
    Query(params): Query<PageParams>,
) -> Json<Page<CarDto>> {
    let cars = state.cars.find_by_make(&make).await;
    Json(to_page(&cars, params))
}

/// Handler for GET /cars/makes/:make/models/:model
#[instrument(skip_all, name = "catalog.handlers.cars.by_model")]
pub async fn cars_by_make_and_model(
    State(state): State<Arc<AppState>>,
    Path((make, model)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> Json<Page<CarDto>> {
    let cars = state.cars.find_by_make_and_model(&make, &model).await;
    Json(to_page(&cars, params))
}

/// Handler for GET /cars/makes/:make/models/:model/years/:year
#[instrument(skip_all, name = "catalog.handlers.cars.by_year")]
pub async fn cars_by_year(
    State(state): State<Arc<AppState>>,
    Path((make, model, year)): Path<(String, String, i32)>,
    Query(params): Query<PageParams>,
) -> Json<Page<CarDto>> {
    let cars = state
        .cars
        .find_by_make_model_and_years(&make, &model, year, year)
        .await;
    Json(to_page(&cars, params))
}

/// Handler for GET /cars/makes/:make/models/:model/min-years/:min/max-years/:max
///
/// Returns 400 if `min > max`.
#[instrument(skip_all, name = "catalog.handlers.cars.by_year_range")]
pub async fn cars_by_year_range(
    State(state): State<Arc<AppState>>,
    Path((make, model, min_year, max_year)): Path<(String, String, i32, i32)>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<CarDto>>, CatalogError> {
    if min_year > max_year {
        return Err(CatalogError::BadRequest(
            "min-years must not exceed max-years".to_string(),
        ));
    }

    let cars = state
        .cars
        .find_by_make_model_and_years(&make, &model, min_year, max_year)
        .await;
    Ok(Json(to_page(&cars, params)))
}
