use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::model::Car;
use crate::{
    error::AppError,
    factory::{self, One},
    response::{keyed, Envelope, Keyed},
    state::AppState,
    store::{Filter, FindOptions},
};

/// Shape check run ahead of create and update.
pub fn validate_car_data(body: &Value) -> Result<(), AppError> {
    let text = |key: &str| body.get(key).and_then(Value::as_str);

    if text("number").map_or(true, str::is_empty) {
        return Err(AppError::BadRequest("من فضلك ادخل رقم سيارة صحيح".into()));
    }
    if text("letters").map_or(true, |s| s.trim().is_empty()) {
        return Err(AppError::BadRequest("من فضلك ادخل حروف السيارة".into()));
    }
    if text("governorate").map_or(true, str::is_empty) {
        return Err(AppError::BadRequest("من فضلك ادخل اسم المحافظة".into()));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct CarSearch {
    pub number: Option<String>,
    pub letters: Option<String>,
    pub governorate: Option<String>,
}

impl CarSearch {
    pub fn filter(&self) -> Filter {
        [
            ("number", &self.number),
            ("letters", &self.letters),
            ("governorate", &self.governorate),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (field, v))
        })
        .fold(Filter::new(), |filter, (field, value)| filter.eq(field, value))
    }
}

#[instrument(skip_all)]
pub async fn create_car(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, One<Car>), AppError> {
    let Json(body) = payload?;
    validate_car_data(&body)?;
    let car = factory::insert(&state.repo::<Car>(), body).await?;
    Ok((StatusCode::CREATED, Json(factory::one(&car))))
}

#[instrument(skip(state, payload))]
pub async fn update_car(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<One<Car>, AppError> {
    let Path(id) = path?;
    let id = factory::parse_id(&id)?;
    let Json(body) = payload?;
    validate_car_data(&body)?;
    let car = factory::update(&state.repo::<Car>(), id, body).await?;
    Ok(Json(factory::one(&car)))
}

#[instrument(skip(state))]
pub async fn search_cars(
    State(state): State<AppState>,
    query: Result<Query<CarSearch>, QueryRejection>,
) -> Result<Json<Envelope<Keyed<Vec<Car>>>>, AppError> {
    let Query(search) = query?;
    let cars = state
        .repo::<Car>()
        .find(FindOptions::filtered(search.filter()))
        .await?;
    Ok(Json(Envelope::listing(cars.len(), keyed("cars", cars))))
}

#[instrument(skip_all)]
pub async fn delete_all_cars(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let removed = state.repo::<Car>().delete_many(Filter::new()).await?;
    info!(removed, "all cars deleted");
    Ok(StatusCode::NO_CONTENT)
}
