use actix_web::{delete, get, post, web, HttpResponse, Result};
use serde::{Deserialize, Serialize};

use crate::{
    configuration::{AppState, State},
    error::Error,
    types::{EndpointQuery, PushSubscription},
};

#[post("/subscriptions")]
pub async fn post_index(
    state: web::Data<AppState<State>>,
    subscription: web::Json<PushSubscription>,
) -> Result<HttpResponse, Error> {
    let result = match &subscription.keys {
        Some(keys) => state.store.upsert(&subscription.endpoint, keys).await?,
        None => false,
    };

    Ok(HttpResponse::Ok().json(Response { result }))
}

#[delete("/subscriptions")]
pub async fn delete_index(
    state: web::Data<AppState<State>>,
    data: web::Json<EndpointQuery>,
) -> Result<HttpResponse, Error> {
    state.store.delete_by_endpoint(&data.endpoint).await?;
    Ok(HttpResponse::Ok().json(Response { result: true }))
}

#[delete("/subscriptions/{id}")]
pub async fn delete_by_id(
    state: web::Data<AppState<State>>,
    id: web::Path<i64>,
) -> Result<HttpResponse, Error> {
    state.store.delete_by_id(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(Response { result: true }))
}

#[get("/subscriptions/count")]
pub async fn count(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    let count = state.store.count_or_zero().await;
    Ok(HttpResponse::Ok().json(CountResponse { count }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub result: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}
