use std::env;

use actix_request_identifier::{IdReuse, RequestIdentifier};
use actix_web::web::Data;
use tracing_actix_web::TracingLogger;

use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::database::connect::{create_db_connection_pool, run_migrations};
use crate::routes::{
    auto_withdraw_handler, balance_handler, cash_register_handler, donate_handler, page_handler, payments_handler,
    withdraw_handler, withdrawals_handler,
};

mod database;
mod donation;
mod notify;
mod rates;
mod responses;
mod routes;
mod schema;
mod settlement;
mod tasks;

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();

    // setup tracing and use bunyan formatter
    let formatting_layer = BunyanFormattingLayer::new("tipjar-rust".into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(filter_fn(|metadata| *metadata.level() <= tracing::Level::INFO))
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let db = create_db_connection_pool();
    run_migrations(&db);

    let http = reqwest::Client::new();
    let rate_converter = rates::RateConverter::from_env(http.clone());
    let notifier = notify::Notifier::from_env(http);

    actix_web::rt::spawn(tasks::auto_withdraw_sweep(
        db.clone(),
        rate_converter.clone(),
        notifier.clone(),
    ));

    let server = actix_web::HttpServer::new(move || {
        let db = db.clone();

        actix_web::App::new()
            .wrap(RequestIdentifier::with_uuid().use_incoming_id(IdReuse::UseIncoming))
            .wrap(TracingLogger::default())
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(rate_converter.clone()))
            .app_data(Data::new(notifier.clone()))
            .service(balance_handler)
            .service(page_handler)
            .service(payments_handler)
            .service(withdrawals_handler)
            .service(auto_withdraw_handler)
            .service(cash_register_handler)
            .service(donate_handler)
            .service(withdraw_handler)
    });

    server
        .bind(env::var("BIND_ADDRESS").unwrap())
        .unwrap()
        .run()
        .await
        .unwrap();
}
