use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::ProcessorConfig,
    webhook,
    CheckoutSessionObject,
    EventEnvelope,
    NewCheckoutSession,
    NewRefund,
    ProcessorApiError,
    RefundObject,
};

#[derive(Clone)]
pub struct ProcessorApi {
    config: ProcessorConfig,
    client: Arc<Client>,
}

impl ProcessorApi {
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        idempotency_key: Option<&str>,
        body: Option<B>,
    ) -> Result<T, ProcessorApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProcessorApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProcessorApiError::RestResponseError(e.to_string()))?;
            Err(ProcessorApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Opens a hosted checkout session. The client reference doubles as the idempotency key, so a retried request
    /// for the same transaction returns the session the first attempt created.
    pub async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSessionObject, ProcessorApiError> {
        debug!("Opening checkout session for {}", session.client_reference_id);
        let key = format!("checkout-{}", session.client_reference_id);
        let result = self
            .rest_query::<CheckoutSessionObject, _>(Method::POST, "/checkout/sessions", Some(&key), Some(session))
            .await?;
        info!("Opened checkout session {} for {}", result.id, session.client_reference_id);
        Ok(result)
    }

    pub async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionObject, ProcessorApiError> {
        let path = format!("/checkout/sessions/{session_id}");
        debug!("Fetching checkout session {session_id}");
        self.rest_query::<CheckoutSessionObject, ()>(Method::GET, &path, None, None).await
    }

    /// Closes an open session so that it can no longer be paid. The processor refuses if the session already
    /// completed.
    pub async fn expire_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionObject, ProcessorApiError> {
        let path = format!("/checkout/sessions/{session_id}/expire");
        debug!("Expiring checkout session {session_id}");
        let result = self.rest_query::<CheckoutSessionObject, ()>(Method::POST, &path, None, None).await?;
        info!("Checkout session {session_id} is now {:?}", result.status);
        Ok(result)
    }

    pub async fn create_refund(&self, refund: &NewRefund) -> Result<RefundObject, ProcessorApiError> {
        debug!("Requesting refund of {} for session {}", refund.amount, refund.checkout_session);
        let key = format!("refund-{}", refund.checkout_session);
        let result = self.rest_query::<RefundObject, _>(Method::POST, "/refunds", Some(&key), Some(refund)).await?;
        info!("Refund {} for session {} is {}", result.id, refund.checkout_session, result.status);
        Ok(result)
    }

    /// Authenticates a webhook delivery against the configured signing secret and decodes the envelope.
    pub fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<EventEnvelope, ProcessorApiError> {
        let now = chrono::Utc::now().timestamp();
        webhook::verify_signature(
            self.config.webhook_secret.reveal(),
            payload,
            signature,
            self.config.webhook_tolerance,
            now,
        )?;
        EventEnvelope::from_slice(payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::webhook::sign_payload;

    fn api() -> ProcessorApi {
        let config = ProcessorConfig {
            base_url: "https://processor.test/".into(),
            api_key: "sk_test".to_string().into(),
            webhook_secret: "whsec_test".to_string().into(),
            ..Default::default()
        };
        ProcessorApi::new(config).unwrap()
    }

    #[test]
    fn urls() {
        let api = api();
        assert_eq!(api.url("/refunds"), "https://processor.test/v1/refunds");
    }

    #[test]
    fn verify_and_decode() {
        let api = api();
        let payload = br#"{"id":"evt_9","type":"customer.created","data":{"object":{}}}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign_payload("whsec_test", payload, now);
        let event = api.verify_webhook(payload, &header).unwrap();
        assert_eq!(event.id, "evt_9");
        let header = sign_payload("whsec_other", payload, now);
        assert!(matches!(api.verify_webhook(payload, &header), Err(ProcessorApiError::SignatureMismatch)));
    }
}
