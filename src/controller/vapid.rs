use actix_web::{get, web, Responder};
use serde::{Deserialize, Serialize};

use crate::{
    configuration::{AppState, State, VAPID_PUBLIC_KEY},
    error::Error,
};

#[get("/vapid-public-key")]
pub async fn index(
    state: web::Data<AppState<State>>,
) -> Result<impl Responder, Error> {
    let public_key = state.config.vapid_public_key.to_owned().ok_or_else(|| {
        Error::MissingConfiguration(vec![String::from(VAPID_PUBLIC_KEY)])
    })?;

    Ok(web::Json(Response { public_key }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub public_key: String,
}
