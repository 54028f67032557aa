//! Ticket Tailor REST client.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::TicketSourceConfig;
use crate::metrics;

use super::types::IssuedTicketPage;
use super::{CheckAction, CheckInResponse, IssuedTicket, SourceError, TicketSource};

/// Client for the Ticket Tailor v1 API.
pub struct TicketTailorClient {
    client: Client,
    config: TicketSourceConfig,
}

impl TicketTailorClient {
    /// Create a new client. Configuration is validated per request.
    pub fn new(config: TicketSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SourceError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn validate(&self) -> Result<(), SourceError> {
        if self.config.api_key.trim().is_empty() {
            return Err(SourceError::Configuration("API key is required".to_string()));
        }
        if self.config.event_id.trim().is_empty() {
            return Err(SourceError::Configuration("event ID is required".to_string()));
        }
        if self.config.base_url.trim().is_empty() {
            return Err(SourceError::Configuration("base URL is required".to_string()));
        }
        Ok(())
    }

    /// Join `segment` onto the configured base URL path.
    fn endpoint(&self, segment: &str) -> Result<Url, SourceError> {
        let mut url = Url::parse(self.config.base_url.trim()).map_err(|e| {
            SourceError::Configuration(format!("invalid base URL {}: {}", self.config.base_url, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                SourceError::Configuration(format!(
                    "base URL cannot carry a path: {}",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .push(segment);

        Ok(url)
    }

    fn issued_tickets_url(&self, status: &str, starting_after: Option<&str>) -> Result<Url, SourceError> {
        let mut url = self.endpoint("issued_tickets")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("event_id", &self.config.event_id);
            if !status.is_empty() {
                query.append_pair("status", status);
            }
            if let Some(cursor) = starting_after {
                query.append_pair("starting_after", cursor);
            }
        }
        Ok(url)
    }

    async fn check_status(response: Response) -> Result<Response, SourceError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SourceError::Api {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl TicketSource for TicketTailorClient {
    fn name(&self) -> &str {
        "tickettailor"
    }

    async fn fetch_issued_tickets(
        &self,
        status: &str,
        starting_after: Option<&str>,
    ) -> Result<Vec<IssuedTicket>, SourceError> {
        self.validate()?;
        let url = self.issued_tickets_url(status, starting_after)?;

        debug!(url = %url, "Fetching issued tickets page");
        let start = Instant::now();

        let result = async {
            let response = self
                .client
                .get(url.clone())
                .basic_auth(&self.config.api_key, Some(""))
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(SourceError::from_reqwest)?;

            info!(
                method = "GET",
                url = %url,
                status = response.status().as_u16(),
                "Ticket source request completed"
            );

            let page: IssuedTicketPage = Self::check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| SourceError::Decode(e.to_string()))?;

            Ok::<_, SourceError>(page.data)
        }
        .await;

        metrics::observe_external(
            "tickettailor",
            "issued_tickets",
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        if let Ok(tickets) = &result {
            debug!(count = tickets.len(), "Issued tickets page received");
        }
        result
    }

    async fn set_check_in(
        &self,
        ticket_id: &str,
        action: CheckAction,
    ) -> Result<CheckInResponse, SourceError> {
        self.validate()?;
        if ticket_id.trim().is_empty() {
            return Err(SourceError::Configuration("ticket ID is required".to_string()));
        }

        let url = self.endpoint("check_ins")?;
        let quantity = action.quantity().to_string();
        let start = Instant::now();

        let result = async {
            let response = self
                .client
                .post(url.clone())
                .basic_auth(&self.config.api_key, Some(""))
                .header("Accept", "application/json")
                .form(&[("issued_ticket_id", ticket_id), ("quantity", quantity.as_str())])
                .send()
                .await
                .map_err(SourceError::from_reqwest)?;

            info!(
                method = "POST",
                url = %url,
                ticket_id = ticket_id,
                action = action.as_str(),
                status = response.status().as_u16(),
                "Ticket source request completed"
            );

            Self::check_status(response)
                .await?
                .json::<CheckInResponse>()
                .await
                .map_err(|e| SourceError::Decode(e.to_string()))
        }
        .await;

        metrics::observe_external(
            "tickettailor",
            "check_ins",
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        metrics::CHECK_INS
            .with_label_values(&[action.as_str(), if result.is_ok() { "success" } else { "error" }])
            .inc();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> TicketSourceConfig {
        TicketSourceConfig {
            base_url: base_url.to_string(),
            api_key: "sk_test".to_string(),
            event_id: "ev_1".to_string(),
            status: "valid".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_fetch_page_sends_auth_and_query() {
        let server = MockServer::start().await;
        let expected_auth = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("sk_test:")
        );

        Mock::given(method("GET"))
            .and(path("/v1/issued_tickets"))
            .and(query_param("event_id", "ev_1"))
            .and(query_param("status", "valid"))
            .and(query_param("starting_after", "it_9"))
            .and(header("Authorization", expected_auth.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "it_10", "barcode": "B10", "full_name": "Simba"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TicketTailorClient::new(config(&format!("{}/v1", server.uri()))).unwrap();
        let tickets = client.fetch_issued_tickets("valid", Some("it_9")).await.unwrap();

        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].id, "it_10");
        assert_eq!(tickets[0].full_name, "Simba");
    }

    #[tokio::test]
    async fn test_fetch_all_follows_cursor_until_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/issued_tickets"))
            .and(query_param("starting_after", "it_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "it_3"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/issued_tickets"))
            .and(query_param("starting_after", "it_3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": []
            })))
            .expect(1)
            .mount(&server)
            .await;
        // First page: no cursor. Mounted last so the cursor mocks match first.
        Mock::given(method("GET"))
            .and(path("/issued_tickets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "it_1"}, {"id": "it_2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TicketTailorClient::new(config(&server.uri())).unwrap();
        let tickets = client.fetch_all_issued_tickets("valid").await.unwrap();

        let ids: Vec<_> = tickets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["it_1", "it_2", "it_3"]);
    }

    #[tokio::test]
    async fn test_fetch_all_fails_when_a_later_page_fails() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/issued_tickets"))
            .and(query_param("starting_after", "it_2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/issued_tickets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "it_1"}, {"id": "it_2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TicketTailorClient::new(config(&server.uri())).unwrap();
        let result = client.fetch_all_issued_tickets("valid").await;

        match result {
            Err(SourceError::Api { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_api_key_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.api_key = String::new();
        let client = TicketTailorClient::new(cfg).unwrap();

        let err = client.fetch_issued_tickets("valid", None).await.unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_empty_event_id_fails() {
        let mut cfg = config("http://127.0.0.1:9");
        cfg.event_id = "  ".to_string();
        let client = TicketTailorClient::new(cfg).unwrap();

        let err = client.fetch_issued_tickets("valid", None).await.unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issued_tickets"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let client = TicketTailorClient::new(config(&server.uri())).unwrap();
        let err = client.fetch_issued_tickets("valid", None).await.unwrap_err();

        match err {
            SourceError::Api { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issued_tickets"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = TicketTailorClient::new(config(&server.uri())).unwrap();
        let err = client.fetch_issued_tickets("valid", None).await.unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn test_check_in_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check_ins"))
            .and(body_string_contains("issued_ticket_id=it_7"))
            .and(body_string_contains("quantity=-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "check_in",
                "id": "ch_1",
                "issued_ticket_id": "it_7",
                "quantity": -1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TicketTailorClient::new(config(&server.uri())).unwrap();
        let response = client
            .set_check_in("it_7", CheckAction::CheckOut)
            .await
            .unwrap();

        assert_eq!(response.issued_ticket_id, "it_7");
        assert_eq!(response.quantity, -1);
    }
}
