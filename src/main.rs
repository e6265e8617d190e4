use std::env;

use actix_request_identifier::{IdReuse, RequestIdentifier};
use actix_web::web::Data;

use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::database::connect::{create_db_connection_pool, run_migrations};
use crate::gateway::PaymentGateway;
use crate::routes::{
    gifts_handler, gifts_received_handler, gifts_sent_handler, latest_reward_handler, my_codes_handler,
    open_purchase_handler, packages_handler, payment_webhook_handler, purchases_handler, send_gift_handler,
    validate_discount_handler, wallet_handler,
};

mod database;
mod errors;
mod gateway;
mod responses;
mod routes;
mod schema;

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();

    // setup tracing and use bunyan formatter
    let formatting_layer = BunyanFormattingLayer::new("streamcoin".into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(filter_fn(|metadata| *metadata.level() <= tracing::Level::INFO))
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let db = create_db_connection_pool();
    run_migrations(&db);

    let payment_gateway = PaymentGateway::from_env();

    let server = actix_web::HttpServer::new(move || {
        let db = db.clone();

        actix_web::App::new()
            .wrap(RequestIdentifier::with_uuid().use_incoming_id(IdReuse::UseIncoming))
            .wrap(actix_web::middleware::Logger::default())
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(payment_gateway.clone()))
            .service(wallet_handler)
            .service(packages_handler)
            .service(open_purchase_handler)
            .service(purchases_handler)
            .service(gifts_handler)
            .service(send_gift_handler)
            .service(gifts_sent_handler)
            .service(gifts_received_handler)
            .service(validate_discount_handler)
            .service(my_codes_handler)
            .service(latest_reward_handler)
            .service(payment_webhook_handler)
    });

    server
        .bind(env::var("BIND_ADDRESS").unwrap())
        .unwrap()
        .run()
        .await
        .unwrap();
}
