//! Socrata SODA API page fetcher.
//!
//! Fetches one page at a time using the `$limit`, `$offset`, and `$where`
//! query parameters. The `$where` expression combines the inclusive
//! issue-date bounds with the camera ticket-type exclusion.

use async_trait::async_trait;
use parking_map_source_models::PageQuery;
use parking_map_ticket_models::RawPayload;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::source_def::SourceDefinition;
use crate::{PageSource, SourceError};

/// Socrata client for a single dataset.
///
/// Holds one [`reqwest::Client`] so connections are reused across pages.
#[derive(Debug, Clone)]
pub struct SocrataClient {
    definition: SourceDefinition,
    client: reqwest::Client,
}

impl SocrataClient {
    /// Builds a client for `definition`. When `app_token` is set and
    /// non-blank it is sent on every request in the definition's token
    /// header.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Definition`] if the token header name or value
    /// is not a valid HTTP header, or [`SourceError::Transport`] if the HTTP
    /// client cannot be built.
    pub fn new(definition: SourceDefinition, app_token: Option<&str>) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = app_token.map(str::trim).filter(|t| !t.is_empty()) {
            let name = HeaderName::from_bytes(definition.token_header.as_bytes()).map_err(|e| {
                SourceError::Definition {
                    message: format!("invalid header name '{}': {e}", definition.token_header),
                }
            })?;
            let value = HeaderValue::from_str(token).map_err(|e| SourceError::Definition {
                message: format!("invalid app token: {e}"),
            })?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(definition.timeout())
            .build()?;

        Ok(Self { definition, client })
    }

    /// The definition this client was built from.
    #[must_use]
    pub const fn definition(&self) -> &SourceDefinition {
        &self.definition
    }
}

#[async_trait]
impl PageSource for SocrataClient {
    fn id(&self) -> &str {
        &self.definition.id
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RawPayload>, SourceError> {
        let params = build_query_params(&self.definition, query);
        log::debug!(
            "[{}] GET {} offset={} limit={}",
            self.definition.id,
            self.definition.api_url,
            query.offset,
            query.limit
        );

        let response = self
            .client
            .get(&self.definition.api_url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                SourceError::Schema {
                    message: format!("response body is not valid JSON: {e}"),
                }
            } else {
                SourceError::Transport(e)
            }
        })?;

        parse_page(body)
    }
}

/// Builds the `$where` expression for a page query, or `None` when no
/// filter applies.
///
/// Date bounds are inclusive comparisons on the definition's date column.
/// The camera exclusion keeps rows whose category is NULL.
#[must_use]
pub fn build_where_clause(definition: &SourceDefinition, query: &PageQuery) -> Option<String> {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(from) = query.issue_dates.from {
        clauses.push(format!(
            "{} >= '{}'",
            definition.date_column,
            from.format("%Y-%m-%d")
        ));
    }
    if let Some(to) = query.issue_dates.to {
        clauses.push(format!(
            "{} <= '{}'",
            definition.date_column,
            to.format("%Y-%m-%d")
        ));
    }

    if query.exclude_camera_tickets && !definition.camera_ticket_types.is_empty() {
        let camera_filters = definition
            .camera_ticket_types
            .iter()
            .map(|prefix| {
                format!(
                    "upper({}) NOT LIKE '{}%'",
                    definition.category_column,
                    prefix.to_uppercase().replace('\'', "''")
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        clauses.push(format!(
            "({camera_filters} OR {} IS NULL)",
            definition.category_column
        ));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

/// Builds the full query-parameter list for a page request.
#[must_use]
pub fn build_query_params(definition: &SourceDefinition, query: &PageQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("$limit".to_string(), query.limit.to_string()),
        ("$offset".to_string(), query.offset.to_string()),
    ];
    if let Some(where_clause) = build_where_clause(definition, query) {
        params.push(("$where".to_string(), where_clause));
    }
    params
}

/// Extracts the records from a response body.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if the body is not a JSON array or any
/// element is not an object.
pub fn parse_page(body: serde_json::Value) -> Result<Vec<RawPayload>, SourceError> {
    let serde_json::Value::Array(items) = body else {
        return Err(SourceError::Schema {
            message: format!("expected JSON array of records, got {}", json_kind(&body)),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(SourceError::Schema {
                message: format!("record {i} is {} instead of an object", json_kind(&other)),
            }),
        })
        .collect()
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use parking_map_source_models::IssueDateRange;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

    use super::*;
    use crate::registry::default_source;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn no_filters_means_no_where_clause() {
        let def = default_source();
        let query = PageQuery::first(100, IssueDateRange::default(), false);
        assert_eq!(build_where_clause(&def, &query), None);

        let params = build_query_params(&def, &query);
        assert_eq!(
            params,
            vec![
                ("$limit".to_string(), "100".to_string()),
                ("$offset".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let def = default_source();
        let query = PageQuery::first(
            100,
            IssueDateRange::new(date(2023, 1, 1), date(2023, 1, 31)),
            false,
        );
        assert_eq!(
            build_where_clause(&def, &query).as_deref(),
            Some("issue_date >= '2023-01-01' AND issue_date <= '2023-01-31'")
        );
    }

    #[test]
    fn camera_exclusion_keeps_null_ticket_types() {
        let def = default_source();
        let query = PageQuery::first(100, IssueDateRange::default(), true);
        let clause = build_where_clause(&def, &query).unwrap();
        assert!(clause.starts_with("(upper(ticket_type) NOT LIKE 'SPEED CAMERA%' AND "));
        assert!(clause.ends_with(" OR ticket_type IS NULL)"));
        for prefix in &def.camera_ticket_types {
            assert!(clause.contains(&format!("NOT LIKE '{prefix}%'")));
        }
    }

    #[test]
    fn combines_dates_and_camera_filter() {
        let def = default_source();
        let query = PageQuery::first(50, IssueDateRange::new(date(2024, 6, 1), None), true);
        let params = build_query_params(&def, &query.next());
        assert_eq!(params[1], ("$offset".to_string(), "50".to_string()));
        let (key, clause) = &params[2];
        assert_eq!(key, "$where");
        assert!(clause.starts_with("issue_date >= '2024-06-01' AND (upper(ticket_type)"));
    }

    #[test]
    fn camera_prefixes_are_quoted() {
        let mut def = default_source();
        def.camera_ticket_types = vec!["o'neil cam".to_string()];
        let query = PageQuery::first(1, IssueDateRange::default(), true);
        assert_eq!(
            build_where_clause(&def, &query).as_deref(),
            Some("(upper(ticket_type) NOT LIKE 'O''NEIL CAM%' OR ticket_type IS NULL)")
        );
    }

    #[test]
    fn parses_array_of_objects() {
        let body = serde_json::json!([
            {"summons_number": "1"},
            {"summons_number": "2", "street_name": "5 AVE"},
        ]);
        let page = parse_page(body).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[1]["street_name"], "5 AVE");
    }

    #[test]
    fn empty_array_is_an_empty_page() {
        assert!(parse_page(serde_json::json!([])).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_array_body() {
        let err = parse_page(serde_json::json!({"error": true, "message": "bad query"}))
            .unwrap_err();
        assert!(matches!(err, SourceError::Schema { .. }));
    }

    #[test]
    fn rejects_non_object_records() {
        let err = parse_page(serde_json::json!([{"a": 1}, 2])).unwrap_err();
        match err {
            SourceError::Schema { message } => assert!(message.contains("record 1")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn client_rejects_invalid_token() {
        let err = SocrataClient::new(default_source(), Some("bad\ntoken")).unwrap_err();
        assert!(matches!(err, SourceError::Definition { .. }));
    }

    #[test]
    fn client_reports_source_id() {
        let client = SocrataClient::new(default_source(), None).unwrap();
        assert_eq!(client.id(), "nyc_parking");
        assert_eq!(client.definition().page_size, 50_000);
    }

    /// Answers one request on a local port with a canned response and
    /// returns the lowercased request head it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!(
            "http://{}/resource/test.json",
            listener.local_addr().unwrap()
        );
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_ascii_lowercase()
        });
        (url, server)
    }

    fn local_client(api_url: String, token: Option<&str>) -> SocrataClient {
        let mut def = default_source();
        def.api_url = api_url;
        SocrataClient::new(def, token).unwrap()
    }

    fn unfiltered(limit: u64) -> PageQuery {
        PageQuery::first(limit, IssueDateRange::default(), false)
    }

    #[tokio::test]
    async fn error_status_is_transport_error() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":true}"#).await;
        let err = local_client(url, None)
            .fetch_page(&unfiltered(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn error_object_body_is_schema_error() {
        let (url, server) = serve_once("200 OK", r#"{"error":true,"message":"bad query"}"#).await;
        let err = local_client(url, None)
            .fetch_page(&unfiltered(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Schema { .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_body_is_schema_error() {
        let (url, server) = serve_once("200 OK", "not json").await;
        let err = local_client(url, None)
            .fetch_page(&unfiltered(10))
            .await
            .unwrap_err();
        match err {
            SourceError::Schema { message } => assert!(message.contains("not valid JSON")),
            other => panic!("unexpected error: {other}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn sends_token_and_paging_params() {
        let (url, server) = serve_once("200 OK", "[]").await;
        let page = local_client(url, Some("secret-token"))
            .fetch_page(&unfiltered(10))
            .await
            .unwrap();
        assert!(page.is_empty());

        let request = server.await.unwrap();
        assert!(request.starts_with("get /resource/test.json?"));
        assert!(request.contains("limit=10"));
        assert!(request.contains("offset=0"));
        assert!(request.contains("x-app-token: secret-token"));
    }

    #[tokio::test]
    async fn blank_token_is_not_sent() {
        let (url, server) = serve_once("200 OK", "[]").await;
        local_client(url, Some("   "))
            .fetch_page(&unfiltered(5))
            .await
            .unwrap();
        assert!(!server.await.unwrap().contains("x-app-token"));
    }
}
