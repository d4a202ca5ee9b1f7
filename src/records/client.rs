//! HTTP client for the dashboard backend.
//!
//! Uses reqwest against `{base}/api/dashboard/...`. One attempt per call: a
//! failed fetch is reported to the caller, never retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{RawRecord, RecordSource, RecordsError};
use crate::types::{Config, Provider, TableSource};

/// How much of a non-JSON body to quote in the error.
const BODY_SNIPPET_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Option<Value>,
}

pub struct RecordsClient {
    pub(super) client: reqwest::Client,
    base_url: Url,
}

impl RecordsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RecordsError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| RecordsError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RecordsError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, RecordsError> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `{base}/api/dashboard/<segments...>` with each segment percent-encoded
    /// (table names contain spaces).
    pub(super) fn endpoint(&self, segments: &[&str]) -> Result<Url, RecordsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RecordsError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "dashboard"])
            .extend(segments);
        Ok(url)
    }

    /// Look up a provider by the login code it hands to its staff.
    pub async fn fetch_provider_by_code(&self, code: &str) -> Result<Provider, RecordsError> {
        let url = self.endpoint(&["provider"])?;
        let resp = self
            .client
            .get(url)
            .query(&[("providerCode", code)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = read_json(resp).await.unwrap_or(Value::Null);
            return Err(RecordsError::ProviderNotFound(
                error_message(&body).unwrap_or_else(|| code.to_string()),
            ));
        }

        let body = read_json(resp).await?;
        let provider = body
            .get("provider")
            .cloned()
            .ok_or_else(|| RecordsError::ProviderNotFound(code.to_string()))?;
        Ok(serde_json::from_value(provider)?)
    }

    /// Offer catalogue shown to providers (not provider-scoped).
    pub async fn fetch_offers(&self) -> Result<Vec<RawRecord>, RecordsError> {
        let url = self.endpoint(&["offers"])?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(api_error("offers", status, resp).await);
        }
        records_from(read_json(resp).await?)
    }
}

#[async_trait]
impl RecordSource for RecordsClient {
    async fn fetch_records(
        &self,
        table: TableSource,
        provider_id: &str,
    ) -> Result<Vec<RawRecord>, RecordsError> {
        let url = self.endpoint(&["leads"])?;
        let resp = self
            .client
            .get(url)
            .query(&[("tableName", table.table_name()), ("providerId", provider_id)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(table.table_name(), status, resp).await);
        }

        let records = records_from(read_json(resp).await?)?;
        log::debug!("Fetched {} {} records", records.len(), table);
        Ok(records)
    }

    async fn fetch_history(
        &self,
        table: TableSource,
        provider_id: &str,
    ) -> Result<Vec<RawRecord>, RecordsError> {
        let url = self.endpoint(&["contact-history"])?;
        let resp = self
            .client
            .get(url)
            .query(&[("tableSource", table.table_name()), ("providerId", provider_id)])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::URI_TOO_LONG {
            log::warn!(
                "Contact history for {} temporarily unavailable: request too large (414)",
                table
            );
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let context = format!("contact history ({})", table);
            return Err(api_error(&context, status, resp).await);
        }

        let records = records_from(read_json(resp).await?)?;
        log::debug!("Fetched {} {} contact-history records", records.len(), table);
        Ok(records)
    }
}

/// Parse a JSON body, refusing anything not labelled `application/json` so an
/// HTML error page shows up as such rather than as a parse error.
pub(super) async fn read_json(resp: reqwest::Response) -> Result<Value, RecordsError> {
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !content_type.contains("application/json") {
        let text = resp.text().await.unwrap_or_default();
        return Err(RecordsError::NotJson {
            content_type: if content_type.is_empty() {
                "no content type".to_string()
            } else {
                content_type
            },
            snippet: text.chars().take(BODY_SNIPPET_CHARS).collect(),
        });
    }

    Ok(resp.json::<Value>().await?)
}

/// `{records: [...]}` → records. A missing or non-array `records` is empty.
/// Rows without a usable id are skipped one at a time.
fn records_from(body: Value) -> Result<Vec<RawRecord>, RecordsError> {
    let response: RecordsResponse = serde_json::from_value(body)?;
    let Some(Value::Array(rows)) = response.records else {
        return Ok(Vec::new());
    };
    Ok(rows
        .iter()
        .filter_map(|row| {
            let record = RawRecord::from_value(row);
            if record.is_none() {
                log::debug!("Skipping record without an id: {}", row);
            }
            record
        })
        .collect())
}

/// Backend error bodies carry `message`, `error` (string) or `error.message`.
pub(super) fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.get("message"))
        .or_else(|| body.get("error"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(super) async fn api_error(
    context: &str,
    status: StatusCode,
    resp: reqwest::Response,
) -> RecordsError {
    let body = read_json(resp).await.unwrap_or(Value::Null);
    RecordsError::Api {
        context: context.to_string(),
        status: status.as_u16(),
        message: error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one canned HTTP response on a random localhost port.
    /// The handle resolves to the raw request (head and body) that was received.
    pub async fn serve_once(
        status_line: &str,
        content_type: &str,
        body: &str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            content_type,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if request_complete(&received) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        received.len() >= head_end + 4 + content_length
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::serve_once;
    use super::*;

    fn client(base: &str) -> RecordsClient {
        RecordsClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_table_segment() {
        let c = client("https://backend.example.com/");
        let url = c.endpoint(&["records", "Web Popup Leads", "rec1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://backend.example.com/api/dashboard/records/Web%20Popup%20Leads/rec1"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            RecordsClient::new("not a url", Duration::from_secs(1)),
            Err(RecordsError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_records_filters_by_provider_id() {
        let (base, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"success":true,"records":[{"id":"recL1","fields":{"Name":"Ana"},"createdTime":"2024-01-01T00:00:00.000Z"}]}"#,
        )
        .await;

        let records = client(&base)
            .fetch_records(TableSource::Leads, "recProv")
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "recL1");
        assert_eq!(records[0].created_time.as_deref(), Some("2024-01-01T00:00:00.000Z"));

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap_or_default();
        assert!(request_line.starts_with("GET /api/dashboard/leads?"));
        assert!(request_line.contains("tableName=Web+Popup+Leads"));
        assert!(request_line.contains("providerId=recProv"));
    }

    #[tokio::test]
    async fn test_fetch_records_missing_array_is_empty() {
        let (base, _server) = serve_once("200 OK", "application/json", r#"{"success":true}"#).await;
        let records = client(&base)
            .fetch_records(TableSource::Patients, "recProv")
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_records_error_status_is_fatal() {
        let (base, _server) = serve_once(
            "500 Internal Server Error",
            "application/json",
            r#"{"message":"table offline"}"#,
        )
        .await;
        let err = client(&base)
            .fetch_records(TableSource::Patients, "recProv")
            .await
            .unwrap_err();
        match err {
            RecordsError::Api {
                context,
                status,
                message,
            } => {
                assert_eq!(context, "Patients");
                assert_eq!(status, 500);
                assert_eq!(message, "table offline");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_records_rejects_non_json() {
        let (base, _server) = serve_once("200 OK", "text/html", "<html>gateway</html>").await;
        let err = client(&base)
            .fetch_records(TableSource::Leads, "recProv")
            .await
            .unwrap_err();
        assert!(matches!(err, RecordsError::NotJson { .. }));
        assert!(err.to_string().contains("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_history_uri_too_long_is_soft_failure() {
        let (base, _server) = serve_once("414 URI Too Long", "text/plain", "too long").await;
        let records = client(&base)
            .fetch_history(TableSource::Patients, "recProv")
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_history_other_error_raises() {
        let (base, _server) = serve_once(
            "502 Bad Gateway",
            "application/json",
            r#"{"error":{"message":"upstream"}}"#,
        )
        .await;
        let err = client(&base)
            .fetch_history(TableSource::Leads, "recProv")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("upstream"));
    }

    #[tokio::test]
    async fn test_fetch_history_sends_table_source() {
        let (base, server) =
            serve_once("200 OK", "application/json", r#"{"records":[]}"#).await;
        client(&base)
            .fetch_history(TableSource::Patients, "recProv")
            .await
            .unwrap();
        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap_or_default();
        assert!(request_line.starts_with("GET /api/dashboard/contact-history?"));
        assert!(request_line.contains("tableSource=Patients"));
    }

    #[tokio::test]
    async fn test_fetch_provider_by_code() {
        let (base, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"provider":{"id":"recProv","name":"Glow Clinic","code":"glow","Web Link":"https://tele"}}"#,
        )
        .await;
        let provider = client(&base).fetch_provider_by_code("glow").await.unwrap();
        assert_eq!(provider.id, "recProv");
        assert_eq!(provider.name, "Glow Clinic");
        let request = server.await.unwrap();
        assert!(request.contains("providerCode=glow"));
    }

    #[tokio::test]
    async fn test_fetch_provider_not_found_uses_body_message() {
        let (base, _server) = serve_once(
            "404 Not Found",
            "application/json",
            r#"{"message":"No provider with code nope"}"#,
        )
        .await;
        let err = client(&base).fetch_provider_by_code("nope").await.unwrap_err();
        match err {
            RecordsError::ProviderNotFound(msg) => assert_eq!(msg, "No provider with code nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_message_precedence() {
        let nested = serde_json::json!({"error": {"message": "nested"}, "message": "top"});
        assert_eq!(error_message(&nested).as_deref(), Some("nested"));
        let flat = serde_json::json!({"error": "flat"});
        assert_eq!(error_message(&flat).as_deref(), Some("flat"));
        assert_eq!(error_message(&Value::Null), None);
    }

    fn history_body() -> Value {
        serde_json::json!({"records": [
            {"id": "h1", "fields": {"Web Popup Lead": ["L1"], "Date": "2024-03-01"}},
            {"id": "h2", "fields": null},
            {"fields": {"Web Popup Lead": ["L1"], "Date": "2024-02-01"}},
            "h4"
        ]})
    }

    #[test]
    fn test_records_from_skips_malformed_rows() {
        let records = records_from(history_body()).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "h2"]);
        assert!(records[1].fields.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_history_keeps_good_rows_beside_bad_ones() {
        let (base, _server) =
            serve_once("200 OK", "application/json", &history_body().to_string()).await;
        let records = client(&base)
            .fetch_history(TableSource::Leads, "recProv")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].first_link("Web Popup Lead").as_deref(), Some("L1"));
    }

    #[tokio::test]
    async fn test_malformed_history_row_leaves_refresh_complete() {
        use crate::clients::{aggregate_clients, RefreshOutcome};
        use crate::records::fake::{raw, FakeSource};

        let source = FakeSource::new()
            .with_records(
                "recProv",
                TableSource::Leads,
                vec![raw("L1", serde_json::json!({"Name": "Lead One"}))],
            )
            .with_history("recProv", TableSource::Leads, records_from(history_body()).unwrap());

        let clients = match aggregate_clients(&source, Some("recProv")).await {
            RefreshOutcome::Complete(clients) => clients,
            other => panic!("expected complete outcome, got {other:?}"),
        };
        assert_eq!(clients.len(), 1);
        let history: Vec<&str> = clients[0].contact_history.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(history, vec!["h1"]);
        assert!(clients[0].last_contact.is_some());
    }

    #[tokio::test]
    async fn test_fetch_offers() {
        let (base, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"records":[{"id":"recO1","fields":{"Offer":"20% off"}}]}"#,
        )
        .await;
        let offers = client(&base).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].text(&["Offer"]).as_deref(), Some("20% off"));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/dashboard/offers "));
    }
}
