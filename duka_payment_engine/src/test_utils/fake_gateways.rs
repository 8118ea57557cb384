//! In-memory payment gateways with scripted behaviour.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    db_types::{Kes, OrderId},
    traits::{
        CardIntent,
        CardIntentStatus,
        CardPaymentGateway,
        GatewayError,
        PushAccepted,
        PushPaymentGateway,
        PushQueryResult,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPushRequest {
    pub phone: String,
    pub amount: Kes,
    pub account_reference: String,
    pub checkout_request_id: String,
}

#[derive(Debug, Default)]
struct PushState {
    counter: u64,
    sent: Vec<SentPushRequest>,
    next_error: Option<GatewayError>,
    query_results: HashMap<String, Result<PushQueryResult, GatewayError>>,
}

/// Accepts every push request (unless told otherwise) and hands out sequential request ids: `ws_CO_1`, `ws_CO_2` and
/// so on.
#[derive(Debug, Clone, Default)]
pub struct FakePushGateway {
    state: Arc<Mutex<PushState>>,
}

impl FakePushGateway {
    fn state(&self) -> MutexGuard<'_, PushState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The next push request fails with `error`.
    pub fn fail_next_request(&self, error: GatewayError) {
        self.state().next_error = Some(error);
    }

    pub fn set_query_result(&self, checkout_request_id: &str, result: Result<PushQueryResult, GatewayError>) {
        self.state().query_results.insert(checkout_request_id.to_string(), result);
    }

    pub fn sent_requests(&self) -> Vec<SentPushRequest> {
        self.state().sent.clone()
    }

    pub fn last_request(&self) -> Option<SentPushRequest> {
        self.state().sent.last().cloned()
    }
}

impl PushPaymentGateway for FakePushGateway {
    async fn request_payment(
        &self,
        phone: &str,
        amount: Kes,
        account_reference: &str,
        _description: &str,
    ) -> Result<PushAccepted, GatewayError> {
        let mut state = self.state();
        if let Some(e) = state.next_error.take() {
            return Err(e);
        }
        if !amount.is_positive() {
            return Err(GatewayError::InvalidAmount(format!("{amount} is not a valid amount")));
        }
        state.counter += 1;
        let n = state.counter;
        let accepted = PushAccepted {
            merchant_request_id: format!("mr_{n}"),
            checkout_request_id: format!("ws_CO_{n}"),
            customer_message: "Success. Request accepted for processing".to_string(),
        };
        state.sent.push(SentPushRequest {
            phone: phone.to_string(),
            amount,
            account_reference: account_reference.to_string(),
            checkout_request_id: accepted.checkout_request_id.clone(),
        });
        Ok(accepted)
    }

    async fn query_payment(&self, checkout_request_id: &str) -> Result<PushQueryResult, GatewayError> {
        self.state().query_results.get(checkout_request_id).cloned().unwrap_or(Ok(PushQueryResult::Processing))
    }
}

#[derive(Debug, Default)]
struct CardState {
    counter: u64,
    intents: HashMap<String, CardIntent>,
}

/// A card processor where intents are created as `requires_payment_method` and only change when a test says so.
#[derive(Debug, Clone)]
pub struct FakeCardGateway {
    configured: bool,
    state: Arc<Mutex<CardState>>,
}

impl Default for FakeCardGateway {
    fn default() -> Self {
        Self { configured: true, state: Arc::default() }
    }
}

impl FakeCardGateway {
    pub fn unconfigured() -> Self {
        Self { configured: false, ..Default::default() }
    }

    fn state(&self) -> MutexGuard<'_, CardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies `f` to the stored intent, as if the customer had interacted with the processor.
    pub fn update_intent<F: FnOnce(&mut CardIntent)>(&self, intent_id: &str, f: F) {
        if let Some(intent) = self.state().intents.get_mut(intent_id) {
            f(intent);
        }
    }

    pub fn set_status(&self, intent_id: &str, status: CardIntentStatus) {
        self.update_intent(intent_id, |i| i.status = status);
    }

    pub fn insert_intent(&self, intent: CardIntent) {
        self.state().intents.insert(intent.id.clone(), intent);
    }

    pub fn intent(&self, intent_id: &str) -> Option<CardIntent> {
        self.state().intents.get(intent_id).cloned()
    }
}

impl CardPaymentGateway for FakeCardGateway {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn create_intent(&self, amount: Kes, currency: &str, order_id: &OrderId) -> Result<CardIntent, GatewayError> {
        if !self.configured {
            return Err(GatewayError::Unconfigured("No card processor key".into()));
        }
        let mut state = self.state();
        state.counter += 1;
        let id = format!("pi_{}", state.counter);
        let intent = CardIntent {
            id: id.clone(),
            amount_minor: amount.to_minor_units(),
            currency: currency.to_lowercase(),
            status: CardIntentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("{id}_secret_{}", state.counter)),
            order_id: Some(order_id.as_str().to_string()),
        };
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn fetch_intent(&self, intent_id: &str) -> Result<CardIntent, GatewayError> {
        self.state().intents.get(intent_id).cloned().ok_or_else(|| GatewayError::Declined {
            reason: "The card payment could not be found".into(),
            detail: format!("No such payment_intent: '{intent_id}'"),
        })
    }
}
