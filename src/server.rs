use actix_cors::Cors;
use actix_web::{
    dev::Server,
    http::{header, Method},
    middleware, web, App, HttpServer,
};
use tracing::info;

use crate::{
    configuration::{AppState, State},
    controller::{send_notification, subscribe, vapid, version},
    error::Error,
};

const BODY_LIMIT: usize = 4096;

pub async fn server_task(app_state: &AppState<State>) -> Result<(), Error> {
    let app = app_state.clone();
    tokio::spawn(async move {
        let server = init_server(app)?;
        server.await?;
        Ok(())
    })
    .await?
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/send-notification")
                    .route(web::post().to(send_notification::index))
                    .route(
                        web::method(Method::OPTIONS)
                            .to(send_notification::preflight),
                    )
                    .default_service(web::to(
                        send_notification::method_not_allowed,
                    )),
            )
            .service(subscribe::count)
            .service(subscribe::post_index)
            .service(subscribe::delete_index)
            .service(subscribe::delete_by_id)
            .service(vapid::index)
            .service(version::index),
    );
}

pub fn cors(app_state: &AppState<State>) -> Cors {
    let app = app_state.clone();
    let cors_access_all = app.config.cors_access_all();

    Cors::default()
        .allowed_origin_fn(move |origin, _| {
            if cors_access_all {
                return true;
            }
            let allowed = &app.config.allowed_origins;
            if let Ok(origin) = origin.to_str() {
                return allowed.iter().any(|item| item == origin);
            }
            false
        })
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600)
}

fn init_server(app_state: AppState<State>) -> Result<Server, Error> {
    let host = app_state.config.server_host.to_owned();
    let port = app_state.config.port;

    info!("Listening on {}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&app_state))
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(BODY_LIMIT))
            .app_data(web::PayloadConfig::new(BODY_LIMIT))
            .configure(routes)
    })
    .bind((host, port))?
    .run();
    Ok(server)
}
