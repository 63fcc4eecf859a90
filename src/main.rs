use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use log::info;
use sqlx::mysql::MySqlPoolOptions;

use taskmarket::config::AppConfig;
use taskmarket::routes;
use taskmarket::state::AppState;
use taskmarket::store::mysql::MySqlStore;
use taskmarket::store::MarketStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().expect("Invalid configuration");
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to create pool");

    let store: Arc<dyn MarketStore> = Arc::new(MySqlStore::new(pool));
    let state = web::Data::new(AppState::new(store, &config));

    info!(
        "Server running at http://{} (fan-out {}, {} recommendations)",
        config.server_address,
        config.dispatch_fan_out,
        state.recommender.mode()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(|| async { HttpResponse::Ok().body("Hello, world!") }))
            .configure(routes::routes::task_view_configure)
            .configure(routes::routes::worker_view_configure)
    })
    .bind(&config.server_address)?
    .run()
    .await
}
