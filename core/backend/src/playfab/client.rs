//! PlayFab REST API client.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use pftoolkit_common::{Error, Result, TitleId};

use super::session::SessionStore;

/// PlayFab API host suffix; the title id is the leading label.
const API_HOST_SUFFIX: &str = "playfabapi.com";

/// Value of the `X-PlayFabSDK` header and the HTTP user agent.
pub const SDK_VERSION: &str = concat!("pftoolkit-rs-", env!("CARGO_PKG_VERSION"));

/// Which credential a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAuth {
    /// Anonymous (login, registration, recovery).
    None,
    /// `X-Authorization: <session ticket>`.
    SessionTicket,
    /// `X-EntityToken: <entity token>`.
    EntityToken,
}

/// Successful response envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: Option<T>,
}

/// Error response envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// HTTP status code echoed by the API.
    #[serde(default)]
    pub code: u16,
    /// HTTP status text.
    #[serde(default)]
    pub status: Option<String>,
    /// Short error name, e.g. `InvalidParams`.
    #[serde(default)]
    pub error: Option<String>,
    /// Numeric PlayFab error code.
    #[serde(default)]
    pub error_code: Option<u32>,
    /// Human readable message.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Per-field validation messages.
    #[serde(default)]
    pub error_details: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiErrorBody {
    /// Whether the body looks like a PlayFab error at all.
    pub fn is_api_error(&self) -> bool {
        self.error_message.is_some() || self.error.is_some()
    }

    /// Format the report surfaced to callers.
    ///
    /// `"{endpoint}: {message}"`, then one `"\n{field}: {detail}"` line per
    /// detail message.
    pub fn report(&self, endpoint: &str) -> String {
        let mut report = String::new();
        let message = self.error_message.as_deref().or(self.error.as_deref());
        if let Some(message) = message {
            report.push_str(endpoint);
            report.push_str(": ");
            report.push_str(message);
        }
        if let Some(details) = &self.error_details {
            for (field, messages) in details {
                for message in messages {
                    report.push('\n');
                    report.push_str(field);
                    report.push_str(": ");
                    report.push_str(message);
                }
            }
        }
        report
    }
}

/// PlayFab API client.
///
/// Sends JSON POST requests to `{endpoint}{api path}`, attaching the
/// credential held in the shared [`SessionStore`] when asked to.
pub struct PlayFabClient {
    http: Client,
    endpoint: String,
    title_id: TitleId,
    session: Arc<SessionStore>,
}

impl PlayFabClient {
    /// Create a new client for `title_id`.
    ///
    /// `endpoint` overrides the default `https://{title}.playfabapi.com`.
    ///
    /// # Errors
    /// - Endpoint is not a valid URL
    /// - HTTP client could not be built
    pub fn new(title_id: TitleId, endpoint: Option<&str>) -> Result<Self> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => default_endpoint(&title_id),
        };
        Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        let http = Client::builder()
            .user_agent(SDK_VERSION)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            title_id,
            session: Arc::new(SessionStore::new()),
        })
    }

    /// Title this client talks to.
    pub fn title_id(&self) -> &TitleId {
        &self.title_id
    }

    /// Base endpoint without trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Session credentials shared by every request.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Underlying HTTP client, for reuse by the blob transport.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Full URL of an API path such as `/Client/LoginWithCustomID`.
    pub fn url_for(&self, api_path: &str) -> String {
        format!("{}{}", self.endpoint, api_path)
    }

    /// POST `body` to `api_path` and decode the `data` member of the reply.
    ///
    /// # Errors
    /// - `NotAuthenticated` if `auth` names a credential that is not held
    /// - `Remote` with the formatted error report for API errors
    /// - `Network` for transport failures and non-API HTTP errors
    /// - `Serialization` for malformed replies
    pub async fn post<Req, Resp>(&self, api_path: &str, body: &Req, auth: RequestAuth) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(self.url_for(api_path))
            .header("X-PlayFabSDK", SDK_VERSION)
            .json(body);

        match auth {
            RequestAuth::None => {}
            RequestAuth::SessionTicket => {
                let ticket = self.session.session_ticket().await.ok_or_else(|| {
                    Error::NotAuthenticated(format!("{} requires a logged-in session", api_path))
                })?;
                request = request.header("X-Authorization", ticket.expose());
            }
            RequestAuth::EntityToken => {
                let token = self.session.entity_token().await.ok_or_else(|| {
                    Error::NotAuthenticated(format!(
                        "{} requires a valid entity token; call get_entity_token first",
                        api_path
                    ))
                })?;
                request = request.header("X-EntityToken", token.expose());
            }
        }

        tracing::debug!(api = api_path, "Sending PlayFab request");

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} request failed: {}", api_path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read {} response: {}", api_path, e)))?;

        decode_response(api_path, status, &text)
    }
}

/// Default endpoint for a title.
pub fn default_endpoint(title_id: &TitleId) -> String {
    format!("https://{}.{}", title_id.as_str(), API_HOST_SUFFIX)
}

/// Decode a PlayFab reply body given its HTTP status.
fn decode_response<T: DeserializeOwned>(api_path: &str, status: StatusCode, text: &str) -> Result<T> {
    if status.is_success() {
        let envelope: ApiEnvelope<T> = serde_json::from_str(text).map_err(|e| {
            Error::Serialization(format!("Failed to parse {} response: {}", api_path, e))
        })?;
        return envelope
            .data
            .ok_or_else(|| Error::Serialization(format!("{} response has no data", api_path)));
    }

    match serde_json::from_str::<ApiErrorBody>(text) {
        Ok(body) if body.is_api_error() => Err(Error::Remote(body.report(api_path))),
        _ => Err(Error::Network(format!("{} failed: {} - {}", api_path, status, text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Sample {
        play_fab_id: String,
    }

    #[test]
    fn test_default_endpoint() {
        let title = TitleId::new("T1").unwrap();
        assert_eq!(default_endpoint(&title), "https://T1.playfabapi.com");
    }

    #[test]
    fn test_custom_endpoint_trims_slash() {
        let client =
            PlayFabClient::new(TitleId::new("T1").unwrap(), Some("http://localhost:9000/")).unwrap();
        assert_eq!(client.url_for("/File/GetFiles"), "http://localhost:9000/File/GetFiles");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = PlayFabClient::new(TitleId::new("T1").unwrap(), Some("not a url"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_decode_success_envelope() {
        let body = r#"{"code":200,"status":"OK","data":{"PlayFabId":"ABC123"}}"#;
        let sample: Sample = decode_response("/Client/LoginWithCustomID", StatusCode::OK, body).unwrap();
        assert_eq!(sample.play_fab_id, "ABC123");
    }

    #[test]
    fn test_decode_missing_data() {
        let body = r#"{"code":200,"status":"OK"}"#;
        let result: Result<Sample> = decode_response("/x", StatusCode::OK, body);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_decode_api_error_report() {
        let body = r#"{
            "code": 400,
            "status": "BadRequest",
            "error": "InvalidParams",
            "errorCode": 1000,
            "errorMessage": "Invalid input parameters",
            "errorDetails": {"Password": ["Password must be between 6 and 100 characters."]}
        }"#;
        let result: Result<Sample> =
            decode_response("/Client/RegisterPlayFabUser", StatusCode::BAD_REQUEST, body);

        match result {
            Err(Error::Remote(report)) => assert_eq!(
                report,
                "/Client/RegisterPlayFabUser: Invalid input parameters\nPassword: Password must be between 6 and 100 characters."
            ),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_non_api_error() {
        let result: Result<Sample> =
            decode_response("/File/GetFiles", StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[test]
    fn test_report_orders_details_by_field() {
        let mut details = BTreeMap::new();
        details.insert("Username".to_string(), vec!["taken".to_string()]);
        details.insert("Email".to_string(), vec!["invalid".to_string(), "taken".to_string()]);
        let body = ApiErrorBody {
            error_message: Some("Invalid input parameters".to_string()),
            error_details: Some(details),
            ..Default::default()
        };

        assert_eq!(
            body.report("/Client/RegisterPlayFabUser"),
            "/Client/RegisterPlayFabUser: Invalid input parameters\nEmail: invalid\nEmail: taken\nUsername: taken"
        );
    }

    #[tokio::test]
    async fn test_session_ticket_required_before_send() {
        let client = PlayFabClient::new(TitleId::new("T1").unwrap(), None).unwrap();
        let result: Result<serde_json::Value> = client
            .post(
                "/Authentication/GetEntityToken",
                &serde_json::json!({}),
                RequestAuth::SessionTicket,
            )
            .await;
        assert!(matches!(result, Err(Error::NotAuthenticated(_))));
    }
}
