//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution. Every gateway call made by these handlers has its own timeout.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use duka_payment_engine::{
    db_types::OrderId,
    payment_objects::PaymentStatusRecord,
    rate_limit::RateLimiter,
    traits::{CardPaymentGateway, GatewayError, PaymentStore, PushPaymentGateway},
    CardPaymentApi,
    OrderFlowApi,
    PushPaymentApi,
};
use log::*;
use mpesa_tools::StkCallbackEnvelope;

use crate::{
    config::{CallbackAuthConfig, ServerOptions},
    data_objects::{
        CallbackAck,
        CallbackTokenParam,
        ConfirmCardRequest,
        CreateIntentRequest,
        InitiatePushRequest,
        IntentCreated,
        JsonResponse,
        NewOrderRequest,
        OrderPlaced,
        OrderRequest,
        PushInitiated,
    },
    errors::ServerError,
    helpers::{rate_limit_key, verify_callback_token},
    integrations::mpesa::to_push_callback,
};

pub const CALLBACK_TOKEN_HEADER: &str = "X-Callback-Token";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

fn check_rate_limit(
    action: &str,
    req: &HttpRequest,
    limiter: &dyn RateLimiter,
    options: &ServerOptions,
) -> Result<(), ServerError> {
    let key = rate_limit_key(action, req, options.use_x_forwarded_for, options.use_forwarded);
    let decision = limiter.check(&key);
    if decision.allowed {
        Ok(())
    } else {
        info!("🚦️ Rejected {key}. Next attempt allowed at {}", decision.reset_at);
        Err(ServerError::RateLimited { reset_at: decision.reset_at })
    }
}

//----------------------------------------------   Push payments  ----------------------------------------------------
route!(initiate_push => Post "/payments/push/initiate" impl PaymentStore, PushPaymentGateway);
/// Sends a payment prompt to the customer's phone for the full order total.
///
/// Requests are rate limited per client address. The response is `202 Accepted`: the payment is only complete once
/// the network delivers its result to the callback endpoint, so clients should poll
/// `/orders/{order_id}/payment-status` until it reports `paid` or `failed`.
pub async fn initiate_push<B, G>(
    req: HttpRequest,
    body: web::Json<InitiatePushRequest>,
    api: web::Data<PushPaymentApi<B, G>>,
    limiter: web::Data<dyn RateLimiter>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PushPaymentGateway,
{
    let InitiatePushRequest { order_id, phone } = body.into_inner();
    debug!("💻️ Received push payment request for order {order_id}");
    check_rate_limit("initiate", &req, limiter.get_ref(), options.get_ref())?;
    let requested = api.initiate(&order_id, &phone).await?;
    Ok(HttpResponse::Accepted().json(PushInitiated::from(requested)))
}

route!(resend_push => Post "/payments/push/resend" impl PaymentStore, PushPaymentGateway);
/// Sends a fresh payment prompt to the phone used for the previous one. The previous request is superseded, and any
/// late failure reported for it is ignored.
pub async fn resend_push<B, G>(
    req: HttpRequest,
    body: web::Json<OrderRequest>,
    api: web::Data<PushPaymentApi<B, G>>,
    limiter: web::Data<dyn RateLimiter>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PushPaymentGateway,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ Received resend request for order {order_id}");
    check_rate_limit("resend", &req, limiter.get_ref(), options.get_ref())?;
    let requested = api.resend(&order_id).await?;
    Ok(HttpResponse::Accepted().json(PushInitiated::from(requested)))
}

route!(cancel_push => Post "/payments/push/cancel" impl PaymentStore, PushPaymentGateway);
pub async fn cancel_push<B, G>(
    body: web::Json<OrderRequest>,
    api: web::Data<PushPaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PushPaymentGateway,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ Received cancel request for order {order_id}");
    let order = api.cancel(&order_id).await?;
    let message = format!("Payment request for order {} cancelled", order.order_id);
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

route!(push_callback => Post "/payments/push/callback" impl PaymentStore, PushPaymentGateway);
/// Receives payment results from the push payment network.
///
/// Payloads that are malformed, or that carry an invalid callback token (in the `X-Callback-Token` header or the
/// `token` query parameter), are answered with `400`. Everything else is acknowledged with `200`, even if the result
/// could not be applied, so that the network stops redelivering it. The ack's `status` field is `OK` or `ERROR`.
pub async fn push_callback<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    query: web::Query<CallbackTokenParam>,
    api: web::Data<PushPaymentApi<B, G>>,
    auth: web::Data<CallbackAuthConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PushPaymentGateway,
{
    trace!("💻️ Received payment callback: {}", String::from_utf8_lossy(&body));
    let envelope = serde_json::from_slice::<StkCallbackEnvelope>(&body).map_err(|e| {
        warn!("💻️ Could not deserialize payment callback. {e}");
        ServerError::CallbackRejected(format!("Invalid callback payload. {e}"))
    })?;
    let callback = envelope.validate().map_err(|e| {
        warn!("💻️ Payment callback failed validation. {e}");
        ServerError::CallbackRejected(e.to_string())
    })?;
    let header_token = req.headers().get(CALLBACK_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    let token = header_token.or(query.token.as_deref());
    verify_callback_token(auth.get_ref(), &callback.checkout_request_id, token)?;
    let checkout_request_id = callback.checkout_request_id.clone();
    let ack = match api.process_callback(to_push_callback(callback)).await {
        Ok(outcome) => {
            info!("💻️ Callback for {checkout_request_id} processed. {outcome}");
            CallbackAck::ok()
        },
        Err(e) => {
            warn!("💻️ Callback for {checkout_request_id} could not be applied. {e}");
            CallbackAck::error(e)
        },
    };
    Ok(HttpResponse::Ok().json(ack))
}

route!(query_push => Post "/payments/push/query" impl PaymentStore, PushPaymentGateway);
/// Asks the network for the outcome of the order's active payment request and applies it, in case the callback was
/// lost. Returns the resulting payment status.
pub async fn query_push<B, G>(
    body: web::Json<OrderRequest>,
    api: web::Data<PushPaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PushPaymentGateway,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ Received status query for order {order_id}");
    let record = api.reconcile_status(&order_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders" impl PaymentStore);
/// Records a new order and its line items. Placing the same order twice is harmless: the second call changes nothing
/// and answers `200` instead of `201`.
pub async fn place_order<B: PaymentStore>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ Received new order {} for customer {}", order.order_id, order.customer_id);
    let (order, created) = api.place_order(order.into()).await?;
    let result = OrderPlaced { order_id: order.order_id, created, total: order.total_price, currency: order.currency };
    if created {
        Ok(HttpResponse::Created().json(result))
    } else {
        Ok(HttpResponse::Ok().json(result))
    }
}

route!(payment_status => Get "/orders/{order_id}/payment-status" impl PaymentStore);
pub async fn payment_status<B: PaymentStore>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ Fetching payment status for order {order_id}");
    let record: PaymentStatusRecord = api.payment_status(&order_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(payment_attempts => Get "/orders/{order_id}/payment-attempts" impl PaymentStore, PushPaymentGateway);
pub async fn payment_attempts<B, G>(
    path: web::Path<String>,
    api: web::Data<PushPaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PushPaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ Fetching payment attempts for order {order_id}");
    let attempts = api.payment_attempts(&order_id).await?;
    Ok(HttpResponse::Ok().json(attempts))
}

//----------------------------------------------   Card payments  ----------------------------------------------------
route!(create_card_intent => Post "/payments/card/create-intent" impl PaymentStore, CardPaymentGateway);
/// Creates a card payment intent for the order total. The client completes the payment with the returned client
/// secret, then calls `/payments/card/confirm`.
pub async fn create_card_intent<B, C>(
    body: web::Json<CreateIntentRequest>,
    api: web::Data<CardPaymentApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    C: CardPaymentGateway,
{
    let CreateIntentRequest { order_id, amount } = body.into_inner();
    debug!("💻️ Received card intent request for order {order_id}");
    let intent = api.create_intent(&order_id, amount).await?;
    let client_secret = intent.client_secret.ok_or_else(|| {
        error!("💻️ Card intent {} for order {order_id} has no client secret", intent.id);
        ServerError::PaymentGateway(GatewayError::IncompleteResponse("Intent has no client secret".into()))
    })?;
    Ok(HttpResponse::Ok().json(IntentCreated { intent_id: intent.id, client_secret }))
}

route!(confirm_card_payment => Post "/payments/card/confirm" impl PaymentStore, CardPaymentGateway);
pub async fn confirm_card_payment<B, C>(
    body: web::Json<ConfirmCardRequest>,
    api: web::Data<CardPaymentApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    C: CardPaymentGateway,
{
    let ConfirmCardRequest { order_id, intent_id } = body.into_inner();
    debug!("💻️ Received card confirmation for order {order_id} ({intent_id})");
    let order = api.confirm(&order_id, &intent_id).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusRecord::from(order)))
}
