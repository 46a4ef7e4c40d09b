// # TR-064 Router Client
//
// This crate provides a TR-064 (SOAP over HTTP) router client for the
// linewatch system, as spoken by AVM FRITZ!Box and compatible routers.
//
// ## Actions Used
//
// - `WANIPConnection:1#GetStatusInfo`: connection status, last error, uptime
// - `WANIPConnection:1#GetExternalIPAddress`: external IPv4 address
// - `WANCommonInterfaceConfig:1#GetCommonLinkProperties`: access type, link status, bit rate
// - `DeviceInfo:1#GetDeviceLog`: the device event log as one text blob
//
// ## Authentication
//
// The router protects its TR-064 endpoints with HTTP Digest auth on both
// the HTTP and the HTTPS port. Every request first goes out bare and is
// resent once with the answer to the router's challenge.
//
// ## Architecture
//
// The client is stateless apart from its HTTP connection pool. Every call
// is a single request bounded by the configured timeout. Only the
// `GetStatusInfo` call decides the outcome of `poll_status()`; the other
// status calls only enrich the details and are skipped on failure.

mod soap;

pub use soap::{extract_field, unescape};

use digest_auth::AuthContext;
use linewatch_core::config::RouterConfig;
use linewatch_core::log_line::parse_device_log;
use linewatch_core::model::RawLogLine;
use linewatch_core::traits::{RouterClient, RouterStatus};
use linewatch_core::{Error, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use serde_json::Value;
use soap::{ActionResponse, DEVICE_INFO, Service, WAN_COMMON_INTERFACE_CONFIG, WAN_IP_CONNECTION};
use std::fmt;
use std::time::Duration;

/// TR-064 port for plain HTTP
pub const HTTP_PORT: u16 = 49000;

/// TR-064 port for HTTPS
pub const HTTPS_PORT: u16 = 49443;

/// TR-064 router client
pub struct Tr064Client {
    /// Scheme, host and port, without trailing slash
    base_url: String,

    username: Option<String>,

    password: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl Tr064Client {
    /// Create a client from router configuration
    ///
    /// Uses port 49443 over HTTPS when `use_tls` is set, 49000 otherwise.
    pub fn new(config: &RouterConfig) -> Result<Self> {
        let (scheme, port) = if config.use_tls {
            ("https", HTTPS_PORT)
        } else {
            ("http", HTTP_PORT)
        };
        let base_url = format!("{}://{}:{}", scheme, config.address.trim(), port);
        Self::with_base_url(base_url, config)
    }

    /// Create a client against an explicit base URL
    ///
    /// Credentials and timeout are taken from `config`; its address and
    /// TLS flag are ignored.
    pub fn with_base_url(base_url: impl Into<String>, config: &RouterConfig) -> Result<Self> {
        config.validate()?;

        // FRITZ!Box certificates are self-signed
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.use_tls)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke an action without input arguments
    ///
    /// The first request goes out without credentials. A 401 carrying a
    /// Digest challenge is answered once; a second 401 means the
    /// credentials were rejected.
    async fn call_action(&self, service: Service, action: &str) -> Result<ActionResponse> {
        let url = format!("{}{}", self.base_url, service.control_url);
        let body = soap::envelope(service, action);

        let mut response = self.send(&url, service, action, &body, None).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            && let Some(username) = &self.username
        {
            let authorization = digest_authorization(
                &response,
                service.control_url,
                username,
                self.password.as_deref().unwrap_or_default(),
                &body,
            )?;
            response = self
                .send(&url, service, action, &body, Some(authorization))
                .await?;
        }

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::auth(format!(
                "{} rejected credentials: HTTP {}",
                action, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::router(format!("Failed to read {} response: {}", action, e)))?;

        // Faults arrive as HTTP 500 with a SOAP body worth reporting
        if !status.is_success() && !body.contains("Fault>") {
            return Err(Error::router(format!("{} failed: HTTP {}", action, status)));
        }

        ActionResponse::parse(action, body)
    }

    async fn send(
        &self,
        url: &str,
        service: Service,
        action: &str,
        body: &str,
        authorization: Option<String>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", soap::soap_action(service, action))
            .body(body.to_string());

        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        request
            .send()
            .await
            .map_err(|e| Error::router(format!("{} request failed: {}", action, e)))
    }

    /// Call an enrichment action, logging instead of failing
    async fn optional_action(&self, service: Service, action: &str) -> Option<ActionResponse> {
        match self.call_action(service, action).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!("{} unavailable: {}", action, e);
                None
            }
        }
    }
}

impl fmt::Debug for Tr064Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tr064Client")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Answer the Digest challenge of a 401 response
fn digest_authorization(
    response: &reqwest::Response,
    uri: &str,
    username: &str,
    password: &str,
    body: &str,
) -> Result<String> {
    let challenge = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::auth("HTTP 401 without a WWW-Authenticate challenge"))?;

    let mut prompt = digest_auth::parse(challenge)
        .map_err(|e| Error::auth(format!("Unsupported challenge '{}': {}", challenge, e)))?;
    let context = AuthContext::new_post(username, password, uri, Some(body.as_bytes()));
    let answer = prompt
        .respond(&context)
        .map_err(|e| Error::auth(format!("Failed to answer Digest challenge: {}", e)))?;

    Ok(answer.to_header_string())
}

fn text_value(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn number_value(value: Option<String>) -> Value {
    match value {
        Some(text) => text
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        None => Value::Null,
    }
}

#[async_trait::async_trait]
impl RouterClient for Tr064Client {
    async fn poll_status(&self) -> Result<RouterStatus> {
        let info = self.call_action(WAN_IP_CONNECTION, "GetStatusInfo").await?;
        let connection_status = info.require("NewConnectionStatus")?;
        let connected = connection_status == "Connected";

        let external_ip = self
            .optional_action(WAN_IP_CONNECTION, "GetExternalIPAddress")
            .await
            .and_then(|r| r.get("NewExternalIPAddress"))
            .filter(|ip| !ip.is_empty());

        let link = self
            .optional_action(WAN_COMMON_INTERFACE_CONFIG, "GetCommonLinkProperties")
            .await;
        let link_field = |name: &str| link.as_ref().and_then(|r| r.get(name));

        let status = RouterStatus::new(connected)
            .with_detail("connection_status", connection_status)
            .with_detail("external_ip", text_value(external_ip))
            .with_detail("last_error", text_value(info.get("NewLastConnectionError")))
            .with_detail("uptime", number_value(info.get("NewUptime")))
            .with_detail("wan_access_type", text_value(link_field("NewWANAccessType")))
            .with_detail(
                "wan_link_status",
                text_value(link_field("NewPhysicalLinkStatus")),
            )
            .with_detail(
                "max_bit_rate",
                number_value(link_field("NewLayer1DownstreamMaxBitRate")),
            );

        tracing::debug!("Router status: connected={}", connected);
        Ok(status)
    }

    async fn fetch_device_log(&self) -> Result<Vec<RawLogLine>> {
        let response = self.call_action(DEVICE_INFO, "GetDeviceLog").await?;
        let blob = response.require("NewDeviceLog")?;
        let lines = parse_device_log(&blob);

        tracing::debug!("Fetched {} device log lines", lines.len());
        Ok(lines)
    }

    fn client_name(&self) -> &'static str {
        "tr064"
    }
}
