use duka_payment_engine::{
    db_types::Kes,
    traits::{GatewayError, PushAccepted, PushCallback, PushPaymentDetails, PushPaymentGateway, PushQueryResult},
};
use log::*;
use mpesa_tools::{MpesaApi, MpesaApiError, ValidatedCallback};

/// The M-Pesa Daraja API as a push payment gateway.
#[derive(Clone)]
pub struct MpesaGateway {
    api: MpesaApi,
}

impl MpesaGateway {
    pub fn new(api: MpesaApi) -> Self {
        Self { api }
    }
}

impl PushPaymentGateway for MpesaGateway {
    async fn request_payment(
        &self,
        phone: &str,
        amount: Kes,
        account_reference: &str,
        description: &str,
    ) -> Result<PushAccepted, GatewayError> {
        let accepted =
            self.api.stk_push(phone, amount, account_reference, description).await.map_err(to_gateway_error)?;
        Ok(PushAccepted {
            merchant_request_id: accepted.merchant_request_id,
            checkout_request_id: accepted.checkout_request_id,
            customer_message: accepted.customer_message,
        })
    }

    async fn query_payment(&self, checkout_request_id: &str) -> Result<PushQueryResult, GatewayError> {
        match self.api.stk_query(checkout_request_id).await {
            Ok(result) => {
                Ok(PushQueryResult::Completed { result_code: result.result_code, result_desc: result.result_desc })
            },
            Err(MpesaApiError::StillProcessing(_)) => Ok(PushQueryResult::Processing),
            Err(e) => Err(to_gateway_error(e)),
        }
    }
}

pub fn to_gateway_error(e: MpesaApiError) -> GatewayError {
    match e {
        MpesaApiError::Initialization(s) | MpesaApiError::Unconfigured(s) => GatewayError::Unconfigured(s),
        MpesaApiError::AuthError(s) => GatewayError::Auth(s),
        MpesaApiError::NetworkError { timeout, message } => GatewayError::Network { timeout, message },
        MpesaApiError::Declined { reason, message } => {
            GatewayError::Declined { reason: reason.user_message().to_string(), detail: message }
        },
        MpesaApiError::IncompleteResponse(s) | MpesaApiError::JsonError(s) => GatewayError::IncompleteResponse(s),
        MpesaApiError::StillProcessing(s) => {
            debug!("📲️ Unexpected 'still processing' answer outside a status query: {s}");
            GatewayError::IncompleteResponse(s)
        },
        MpesaApiError::InvalidPhone(s) => GatewayError::InvalidPhone(s),
        MpesaApiError::InvalidAmount(s) => GatewayError::InvalidAmount(s),
    }
}

/// Converts a structurally valid callback into the engine's provider-neutral form.
pub fn to_push_callback(callback: ValidatedCallback) -> PushCallback {
    PushCallback {
        merchant_request_id: callback.merchant_request_id,
        checkout_request_id: callback.checkout_request_id,
        result_code: callback.result_code,
        result_desc: callback.result_desc,
        details: callback.details.map(|d| PushPaymentDetails {
            amount: d.amount,
            receipt_number: d.receipt_number,
            transaction_date: d.transaction_date,
            phone: d.phone,
        }),
    }
}
