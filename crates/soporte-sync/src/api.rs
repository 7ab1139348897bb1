// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the backend REST collaborator.
//!
//! Provides [`HttpTicketApi`], which carries the bearer credential on every
//! request and accepts both bare and wrapped response bodies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{Value, json};
use soporte_core::{EntityId, Role, SoporteError, TicketApi, TicketStatus};
use tracing::debug;

/// Keys a backend may wrap a list response in.
const LIST_KEYS: &[&str] = &["tickets", "comentarios", "analistas", "data"];

/// Keys a backend may wrap a single record in.
const RECORD_KEYS: &[&str] = &["ticket", "comentario", "data"];

/// REST collaborator over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTicketApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTicketApi {
    /// Creates a client for `base_url` (the backend origin; paths start at
    /// `/api`) authenticating with `credential`.
    pub fn new(base_url: &str, credential: &str, timeout: Duration) -> Result<Self, SoporteError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|e| SoporteError::CredentialInvalid(format!("credential is not a valid header: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SoporteError::RequestFailed {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Points the client at a different origin (used by tests).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Value, SoporteError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SoporteError::Timeout {
                    duration: self.timeout,
                }
            } else {
                SoporteError::RequestFailed {
                    status: None,
                    message: format!("{what}: HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                }
            }
        })?;

        let status = response.status();
        debug!(status = %status, request = what, "REST response received");
        let body = response.text().await.map_err(|e| SoporteError::RequestFailed {
            status: Some(status.as_u16()),
            message: format!("{what}: failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(SoporteError::request(
                Some(status.as_u16()),
                format!("{what}: {}", error_message(status, &body)),
            ));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| SoporteError::RequestFailed {
            status: Some(status.as_u16()),
            message: format!("{what}: failed to parse response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn get_list(&self, path: &str, what: &str) -> Result<Vec<Value>, SoporteError> {
        let body = self.send(self.client.get(self.url(path)), what).await?;
        unwrap_list(body).ok_or_else(|| SoporteError::request(None, format!("{what}: expected a list")))
    }

    async fn post_record(&self, path: &str, body: Value, what: &str) -> Result<Value, SoporteError> {
        let value = self.send(self.client.post(self.url(path)).json(&body), what).await?;
        Ok(unwrap_record(value))
    }
}

/// Text of a failed response: `message`/`msg`/`error` from a JSON body,
/// else the raw body, else the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error"] {
            if let Some(Value::String(text)) = fields.get(key) {
                return format!("{status}: {text}");
            }
        }
    }
    if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    }
}

fn unwrap_list(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut fields) => LIST_KEYS.iter().find_map(|key| match fields.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

fn unwrap_record(body: Value) -> Value {
    if let Value::Object(fields) = &body
        && !fields.contains_key("id")
    {
        for key in RECORD_KEYS {
            if let Some(inner @ Value::Object(_)) = fields.get(*key) {
                return inner.clone();
            }
        }
    }
    body
}

#[async_trait]
impl TicketApi for HttpTicketApi {
    async fn list_tickets(&self, role: Role) -> Result<Vec<Value>, SoporteError> {
        self.get_list(&format!("/api/tickets/{role}"), "list tickets")
            .await
    }

    async fn change_status(
        &self,
        ticket_id: &EntityId,
        estado: TicketStatus,
    ) -> Result<Value, SoporteError> {
        self.post_record(
            &format!("/api/tickets/{ticket_id}/estado"),
            json!({ "estado": estado.as_ref() }),
            "change status",
        )
        .await
    }

    async fn assign(
        &self,
        ticket_id: &EntityId,
        analyst_id: &EntityId,
        reassignment: bool,
    ) -> Result<Value, SoporteError> {
        self.post_record(
            &format!("/api/tickets/{ticket_id}/asignar"),
            json!({
                "id_analista": analyst_id.to_value(),
                "es_reasignacion": reassignment,
            }),
            "assign ticket",
        )
        .await
    }

    async fn create_comment(&self, ticket_id: &EntityId, texto: &str) -> Result<Value, SoporteError> {
        self.post_record(
            "/api/comentarios",
            json!({ "id_ticket": ticket_id.to_value(), "texto": texto }),
            "create comment",
        )
        .await
    }

    async fn list_comments(&self, ticket_id: &EntityId) -> Result<Vec<Value>, SoporteError> {
        self.get_list(&format!("/api/tickets/{ticket_id}/comentarios"), "list comments")
            .await
    }

    async fn list_analysts(&self) -> Result<Vec<Value>, SoporteError> {
        self.get_list("/api/analistas", "list analysts").await
    }

    async fn fetch_recommendation(&self, ticket_id: &EntityId) -> Result<Value, SoporteError> {
        self.send(
            self.client
                .get(self.url(&format!("/api/tickets/{ticket_id}/recomendaciones-similares"))),
            "fetch recommendation",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_api(base_url: &str) -> HttpTicketApi {
        HttpTicketApi::new(base_url, "test-token", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn list_tickets_uses_role_path_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets/supervisor"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"id": 1, "estado": "en_espera"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tickets = test_api(&server.uri())
            .list_tickets(Role::Supervisor)
            .await
            .unwrap();
        assert_eq!(tickets, vec![json!({"id": 1, "estado": "en_espera"})]);
    }

    #[tokio::test]
    async fn wrapped_lists_are_unwrapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets/42/comentarios"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"comentarios": [{"id": 9, "texto": "hola"}]})),
            )
            .mount(&server)
            .await;

        let comments = test_api(&server.uri())
            .list_comments(&EntityId::Int(42))
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0]["texto"], "hola");
    }

    #[tokio::test]
    async fn assign_posts_analyst_and_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tickets/42/asignar"))
            .and(body_json(json!({"id_analista": 7, "es_reasignacion": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ticket": {"id": 42, "estado": "en_espera", "asignacion_actual": {"id_analista": 7}}
            })))
            .mount(&server)
            .await;

        let ticket = test_api(&server.uri())
            .assign(&EntityId::Int(42), &EntityId::Int(7), false)
            .await
            .unwrap();
        assert_eq!(ticket["id"], 42);
        assert_eq!(ticket["asignacion_actual"]["id_analista"], 7);
    }

    #[tokio::test]
    async fn change_status_posts_estado() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tickets/5/estado"))
            .and(body_json(json!({"estado": "solucionado"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 5, "estado": "solucionado"})),
            )
            .mount(&server)
            .await;

        let ticket = test_api(&server.uri())
            .change_status(&EntityId::Int(5), TicketStatus::Solucionado)
            .await
            .unwrap();
        assert_eq!(ticket["estado"], "solucionado");
    }

    #[tokio::test]
    async fn error_body_message_and_status_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/comentarios"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"message": "sin permiso"})),
            )
            .mount(&server)
            .await;

        let err = test_api(&server.uri())
            .create_comment(&EntityId::Int(1), "hola")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("sin permiso"));
    }

    #[tokio::test]
    async fn unauthorized_forces_logout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/analistas"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = test_api(&server.uri()).list_analysts().await.unwrap_err();
        assert!(err.forces_logout());
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets/3/recomendaciones-similares"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let api = HttpTicketApi::new(&server.uri(), "t", Duration::from_millis(100)).unwrap();
        let err = api.fetch_recommendation(&EntityId::Int(3)).await.unwrap_err();
        assert!(matches!(err, SoporteError::Timeout { .. }));
    }

    #[test]
    fn error_message_prefers_json_text() {
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"msg": "ya asignado"}"#),
            "409 Conflict: ya asignado"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "502 Bad Gateway");
    }
}
