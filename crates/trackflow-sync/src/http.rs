//! HTTP clients for the expense service and the exchange-rate provider.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::info;
use trackflow_core::{ClientConfig, ExchangeRates, Expense, ExpensePayload, QueuedExpense};

use crate::rates::{RateError, RateProvider};
use crate::remote::{DeliveryError, ExpenseRemote};

/// Header carrying the client id so the service can drop redeliveries.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP client for the expense-submission endpoint.
pub struct ExpenseClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ExpenseClient {
    /// Build a client from the shared configuration.
    ///
    /// `config.request_timeout` bounds every delivery attempt.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }
}

/// Multipart body matching the service's form fields, one `receipt` part per file.
async fn expense_form(payload: &ExpensePayload) -> Result<Form, DeliveryError> {
    let mut form = Form::new()
        .text("amount", payload.amount.to_string())
        .text("currency", payload.currency.clone())
        .text("category", payload.category.clone())
        .text("date", payload.date.format("%Y-%m-%d").to_string())
        .text("description", payload.description.clone().unwrap_or_default());

    for path in &payload.receipts {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| DeliveryError::Attachment {
                path: path.clone(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "receipt".to_string());
        form = form.part("receipt", Part::bytes(bytes).file_name(file_name));
    }
    Ok(form)
}

#[async_trait]
impl ExpenseRemote for ExpenseClient {
    async fn submit(&self, record: &QueuedExpense) -> Result<Expense, DeliveryError> {
        let url = format!("{}/expenses", self.base_url);
        let form = expense_form(record.payload()).await?;

        info!(url = %url, id = %record.id(), "submitting expense");
        let mut request = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_HEADER, record.id().to_string())
            .multipart(form);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::from_status(status.as_u16(), body));
        }

        resp.json::<Expense>()
            .await
            .map_err(|e| DeliveryError::Decode(e.to_string()))
    }
}

#[derive(Deserialize)]
struct RatesResponse {
    base: String,
    rates: BTreeMap<String, f64>,
    /// Unix seconds.
    #[serde(default)]
    time_last_updated: Option<i64>,
}

/// Exchange-rate provider speaking the `GET {base_url}/{currency}` API.
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateProvider {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.exchange_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn latest(&self, base: &str) -> Result<ExchangeRates, RateError> {
        let url = format!("{}/{}", self.base_url, base);

        info!(url = %url, "fetching exchange rates");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RateError::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RateError::Server {
                status: status.as_u16(),
            });
        }

        let body: RatesResponse = resp
            .json()
            .await
            .map_err(|e| RateError::Fetch(e.to_string()))?;
        let fetched_at = body
            .time_last_updated
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);
        info!(base = %body.base, count = body.rates.len(), "exchange rates fetched");
        Ok(ExchangeRates {
            base: body.base,
            rates: body.rates,
            fetched_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use trackflow_core::ExpenseStatus;

    use super::*;

    fn config(base: &str) -> ClientConfig {
        ClientConfig {
            api_base_url: format!("{base}/api/"),
            exchange_api_url: format!("{base}/v4/latest"),
            auth_token: Some("secret-token".into()),
            request_timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        }
    }

    fn record() -> QueuedExpense {
        let payload = ExpensePayload::new(
            100.0,
            "USD",
            "Travel",
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        );
        QueuedExpense::new(payload).unwrap()
    }

    const EXPENSE_JSON: &str = r#"{
        "id": "exp_1",
        "amount": 100.0,
        "currency": "USD",
        "category": "Travel",
        "date": "2025-03-14",
        "receiptUrls": [],
        "status": "Pending"
    }"#;

    #[test]
    fn client_trims_trailing_slash() {
        let client = ExpenseClient::new(&config("http://localhost:3000")).unwrap();
        assert_eq!(client.base_url, "http://localhost:3000/api");
    }

    #[tokio::test]
    async fn submit_sends_idempotency_key_and_token() {
        let mut server = mockito::Server::new_async().await;
        let record = record();
        let mock = server
            .mock("POST", "/api/expenses")
            .match_header("idempotency-key", record.id().to_string().as_str())
            .match_header("authorization", "Bearer secret-token")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(EXPENSE_JSON)
            .create_async()
            .await;

        let client = ExpenseClient::new(&config(&server.url())).unwrap();
        let expense = client.submit(&record).await.unwrap();

        assert_eq!(expense.id, "exp_1");
        assert_eq!(expense.status, ExpenseStatus::Pending);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn validation_rejection_is_not_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/expenses")
            .with_status(422)
            .with_body("currency not supported")
            .create_async()
            .await;

        let client = ExpenseClient::new(&config(&server.url())).unwrap();
        let err = client.submit(&record()).await.unwrap_err();

        assert!(!err.is_retryable());
        assert!(matches!(
            err,
            DeliveryError::Rejected { status: 422, ref body } if body == "currency not supported"
        ));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/expenses")
            .with_status(503)
            .create_async()
            .await;

        let client = ExpenseClient::new(&config(&server.url())).unwrap();
        let err = client.submit(&record()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transient { status: 503, .. }));
    }

    #[tokio::test]
    async fn garbled_success_body_counts_as_acknowledged() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/expenses")
            .with_status(200)
            .with_body("<html>ok</html>")
            .create_async()
            .await;

        let client = ExpenseClient::new(&config(&server.url())).unwrap();
        let err = client.submit(&record()).await.unwrap_err();
        assert!(err.is_acknowledged());
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let client = ExpenseClient::new(&config("http://127.0.0.1:1")).unwrap();
        let err = client.submit(&record()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Network(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_receipt_fails_before_sending() {
        let tmp = tempfile::TempDir::new().unwrap();
        let payload = ExpensePayload::new(
            5.0,
            "EUR",
            "Meals",
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        )
        .with_receipt(tmp.path().join("missing.jpg"));
        let record = QueuedExpense::new(payload).unwrap();

        let client = ExpenseClient::new(&config("http://127.0.0.1:1")).unwrap();
        let err = client.submit(&record).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Attachment { .. }));
    }

    #[tokio::test]
    async fn receipts_are_uploaded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let receipt = tmp.path().join("taxi.jpg");
        std::fs::write(&receipt, b"fake-jpeg-bytes").unwrap();
        let payload = ExpensePayload::new(
            42.0,
            "USD",
            "Travel",
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        )
        .with_receipt(&receipt);

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/expenses")
            .match_body(mockito::Matcher::Regex("taxi.jpg".into()))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(EXPENSE_JSON)
            .create_async()
            .await;

        let client = ExpenseClient::new(&config(&server.url())).unwrap();
        client
            .submit(&QueuedExpense::new(payload).unwrap())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetches_rate_table() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v4/latest/USD")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"base":"USD","rates":{"USD":1,"INR":83.1},"time_last_updated":1741910400}"#)
            .create_async()
            .await;

        let provider = HttpRateProvider::new(&config(&server.url())).unwrap();
        let rates = provider.latest("USD").await.unwrap();

        assert_eq!(rates.base, "USD");
        assert_eq!(rates.rate("INR"), Some(83.1));
        assert_eq!(rates.fetched_at.timestamp(), 1_741_910_400);
    }

    #[tokio::test]
    async fn rate_provider_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v4/latest/ZZZ")
            .with_status(404)
            .create_async()
            .await;

        let provider = HttpRateProvider::new(&config(&server.url())).unwrap();
        let err = provider.latest("ZZZ").await.unwrap_err();
        assert!(matches!(err, RateError::Server { status: 404 }));
    }
}
