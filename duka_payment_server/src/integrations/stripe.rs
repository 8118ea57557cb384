use duka_payment_engine::{
    db_types::{Kes, OrderId},
    traits::{CardIntent, CardIntentStatus, CardPaymentGateway, GatewayError},
};
use log::*;
use stripe_tools::{PaymentIntent, PaymentIntentStatus, StripeApi, StripeApiError};

/// Stripe payment intents as a card payment gateway.
#[derive(Clone)]
pub struct StripeGateway {
    api: StripeApi,
}

impl StripeGateway {
    pub fn new(api: StripeApi) -> Self {
        Self { api }
    }
}

impl CardPaymentGateway for StripeGateway {
    fn is_configured(&self) -> bool {
        self.api.is_configured()
    }

    async fn create_intent(&self, amount: Kes, currency: &str, order_id: &OrderId) -> Result<CardIntent, GatewayError> {
        let intent = self
            .api
            .create_payment_intent(amount.to_minor_units(), currency, order_id.as_str())
            .await
            .map_err(to_gateway_error)?;
        Ok(to_card_intent(intent))
    }

    async fn fetch_intent(&self, intent_id: &str) -> Result<CardIntent, GatewayError> {
        let intent = self.api.retrieve_payment_intent(intent_id).await.map_err(to_gateway_error)?;
        Ok(to_card_intent(intent))
    }
}

fn to_card_intent(intent: PaymentIntent) -> CardIntent {
    let order_id = intent.order_id().map(String::from);
    let status = match intent.status {
        PaymentIntentStatus::Succeeded => CardIntentStatus::Succeeded,
        PaymentIntentStatus::Processing => CardIntentStatus::Processing,
        PaymentIntentStatus::RequiresAction | PaymentIntentStatus::RequiresConfirmation => {
            CardIntentStatus::RequiresAction
        },
        PaymentIntentStatus::RequiresPaymentMethod => CardIntentStatus::RequiresPaymentMethod,
        PaymentIntentStatus::Canceled => CardIntentStatus::Canceled,
        PaymentIntentStatus::RequiresCapture | PaymentIntentStatus::Unknown => CardIntentStatus::Other,
    };
    CardIntent {
        id: intent.id,
        amount_minor: intent.amount,
        currency: intent.currency,
        status,
        client_secret: intent.client_secret,
        order_id,
    }
}

pub fn to_gateway_error(e: StripeApiError) -> GatewayError {
    match e {
        StripeApiError::Initialization(s) => GatewayError::Unconfigured(s),
        StripeApiError::Unconfigured => GatewayError::Unconfigured("No card gateway secret key is set".into()),
        StripeApiError::Request { timeout, message } => GatewayError::Network { timeout, message },
        StripeApiError::Api { status: 401 | 403, message, .. } => GatewayError::Auth(message),
        StripeApiError::Api { status, code, message } if (400..500).contains(&status) => {
            let detail = format!("{status} {}: {message}", code.as_deref().unwrap_or("error"));
            let reason = match code.as_deref() {
                Some("card_declined") | Some("generic_decline") => "Your card was declined.".to_string(),
                Some("insufficient_funds") => "Your card has insufficient funds.".to_string(),
                Some("expired_card") => "Your card has expired.".to_string(),
                _ => message,
            };
            GatewayError::Declined { reason, detail }
        },
        StripeApiError::Api { status, message, .. } => {
            warn!("💳️ Card gateway returned {status}: {message}");
            GatewayError::Network { timeout: false, message: format!("{status}: {message}") }
        },
        StripeApiError::JsonError(s) => GatewayError::IncompleteResponse(s),
    }
}
