use cucumber::World;
use duka_payment_engine::{
    db_types::{Order, OrderId},
    events::EventProducers,
    payment_objects::{CallbackOutcome, PushRequested},
    test_utils::{
        fake_gateways::{FakeCardGateway, FakePushGateway},
        prepare_env::{prepare_test_env, random_db_path},
    },
    traits::CardIntent,
    CardPaymentApi,
    OrderFlowApi,
    PaymentFlowError,
    PaymentStore,
    PushPaymentApi,
    SqliteDatabase,
};
use log::*;

#[derive(Default, Debug, World)]
pub struct PaymentsWorld {
    pub system: Option<PaymentSystem>,
    pub last_error: Option<PaymentFlowError>,
    pub last_request: Option<PushRequested>,
    pub last_outcome: Option<CallbackOutcome>,
    pub last_intent: Option<CardIntent>,
}

#[derive(Debug)]
pub struct PaymentSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub push: PushPaymentApi<SqliteDatabase, FakePushGateway>,
    pub card: CardPaymentApi<SqliteDatabase, FakeCardGateway>,
    pub push_gateway: FakePushGateway,
    pub card_gateway: FakeCardGateway,
}

impl PaymentsWorld {
    pub fn system(&self) -> &PaymentSystem {
        self.system.as_ref().expect("Payment system not initialised")
    }

    pub fn record<T>(&mut self, result: Result<T, PaymentFlowError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Call failed: {e}");
                self.last_error = Some(e);
                None
            },
        }
    }

    pub async fn order(&self, order_id: &str) -> Order {
        let oid = OrderId::from(order_id);
        self.system().db.fetch_order(&oid).await.expect("Error fetching order").expect("Order does not exist")
    }
}

impl PaymentSystem {
    pub async fn new(card_gateway: FakeCardGateway) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let push_gateway = FakePushGateway::default();
        let orders = OrderFlowApi::new(db.clone());
        let push = PushPaymentApi::new(db.clone(), push_gateway.clone(), EventProducers::default());
        let card = CardPaymentApi::new(db.clone(), card_gateway.clone(), EventProducers::default());
        Self { db_path: url, db, orders, push, card, push_gateway, card_gateway }
    }
}
