use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use duka_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    rate_limit::{InMemoryRateLimiter, RateLimiter},
    CardPaymentApi,
    OrderFlowApi,
    PushPaymentApi,
    SqliteDatabase,
};
use log::*;
use mpesa_tools::MpesaApi;
use stripe_tools::StripeApi;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_rate_limit_expiry_worker,
    integrations::{mpesa::MpesaGateway, stripe::StripeGateway},
    routes::{
        health,
        CancelPushRoute,
        ConfirmCardPaymentRoute,
        CreateCardIntentRoute,
        InitiatePushRoute,
        PaymentAttemptsRoute,
        PaymentStatusRoute,
        PlaceOrderRoute,
        PushCallbackRoute,
        QueryPushRoute,
        ResendPushRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;
const RATE_LIMIT_PURGE_PERIOD: Duration = Duration::from_secs(60);

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let hooks = create_event_hooks();
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let limiter: Arc<dyn RateLimiter> = Arc::new(InMemoryRateLimiter::new(config.rate_limit));
    let _purge_worker = start_rate_limit_expiry_worker(Arc::clone(&limiter), RATE_LIMIT_PURGE_PERIOD);
    let srv = create_server_instance(config, db, producers, limiter)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Payment events are logged. Downstream integrations (fulfilment, notifications) hang off these hooks.
fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!("🪝️ Order {} has been paid ({:?})", ev.order.order_id, ev.method);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
        .on_payment_failed(|ev| {
            Box::pin(async move {
                info!("🪝️ Payment for order {} failed. {}", ev.order.order_id, ev.reason);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    limiter: Arc<dyn RateLimiter>,
) -> Result<Server, ServerError> {
    let mpesa = MpesaApi::new(config.mpesa.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the M-Pesa client. {e}")))?;
    let stripe = StripeApi::new(config.stripe.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the card gateway client. {e}")))?;
    if !config.mpesa.is_configured() {
        warn!("🪛️ M-Pesa is not fully configured. Push payment requests will fail until it is.");
    }
    if !config.stripe.is_configured() {
        info!("🪛️ Card payments are not configured.");
    }
    let options = ServerOptions::from_config(&config);
    let callback_auth = config.callback_auth.clone();
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone());
        let push_api = PushPaymentApi::new(db.clone(), MpesaGateway::new(mpesa.clone()), producers.clone());
        let card_api = CardPaymentApi::new(db.clone(), StripeGateway::new(stripe.clone()), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("duka::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(push_api))
            .app_data(web::Data::new(card_api))
            .app_data(web::Data::from(Arc::clone(&limiter)))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(callback_auth.clone()))
            .service(health)
            .service(PlaceOrderRoute::<SqliteDatabase>::new())
            .service(PaymentStatusRoute::<SqliteDatabase>::new())
            .service(PaymentAttemptsRoute::<SqliteDatabase, MpesaGateway>::new())
            .service(InitiatePushRoute::<SqliteDatabase, MpesaGateway>::new())
            .service(ResendPushRoute::<SqliteDatabase, MpesaGateway>::new())
            .service(CancelPushRoute::<SqliteDatabase, MpesaGateway>::new())
            .service(PushCallbackRoute::<SqliteDatabase, MpesaGateway>::new())
            .service(QueryPushRoute::<SqliteDatabase, MpesaGateway>::new())
            .service(CreateCardIntentRoute::<SqliteDatabase, StripeGateway>::new())
            .service(ConfirmCardPaymentRoute::<SqliteDatabase, StripeGateway>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
