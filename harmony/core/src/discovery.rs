//! Hub Discovery
//!
//! One-shot startup sequence that turns a configured hub address into a
//! connected session and a decoded activity catalog.
//!
//! ```text
//! HTTP POST :8088 connect.discoveryinfo?get ──► HubIdentity
//!                                                   │
//!                   ws://host:8088/?domain=..&hubId=..
//!                                                   ▼
//!                         engine?config ──► Catalog + main activity
//! ```
//!
//! Any failure here is fatal to startup: the caller registers no accessory
//! and starts no refresh timer.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_CHARSET, CONTENT_TYPE, ORIGIN};
use serde_json::{json, Value};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogOptions, MainActivitySelection};
use crate::config::PlatformConfig;
use crate::protocol::{HubRequest, CMD_DISCOVERY_INFO};
use crate::transport::{HubTransport, TransportError, WebSocketSession};

/// Origin the hub accepts discovery calls from
pub const DISCOVERY_ORIGIN: &str = "http://localhost.nebula.myharmony.com";

/// Errors raised while discovering the hub and its catalog
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Hub did not answer the discovery call (refused, timed out)
    #[error("Hub unreachable: {0}")]
    Unreachable(String),

    /// Discovery call answered with a non-success HTTP status
    #[error("Discovery returned HTTP {0}")]
    HttpStatus(u16),

    /// Discovery reply lacked a required identity field
    #[error("Discovery reply missing {0}")]
    MissingIdentity(String),

    /// Discovery server URI could not be parsed
    #[error("Invalid discovery server URI: {0}")]
    InvalidDiscoveryUri(String),

    /// Session failed while loading the catalog
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Engine config reply had an unexpected shape
    #[error("Malformed hub config: {0}")]
    MalformedConfig(String),

    /// Hub declares no selectable activity
    #[error("Hub declares no selectable activity")]
    EmptyCatalog,
}

/// Identity of the hub as reported by discovery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubIdentity {
    /// Address the hub was reached at
    pub host: String,
    /// Port for both discovery and the session
    pub port: u16,
    /// Host part of the hub's discovery server URI
    pub domain: String,
    /// Hub identifier used to address the session
    pub remote_id: String,
    /// Account the hub is registered to
    pub account_id: String,
    /// Account email
    pub email: String,
    /// Name the hub was given in its companion app
    pub friendly_name: String,
}

impl HubIdentity {
    /// Decode the `data` block of a discovery reply
    pub fn from_discovery_data(
        host: impl Into<String>,
        port: u16,
        data: &Value,
    ) -> Result<Self, DiscoveryError> {
        let remote_id = scalar_field(data, "remoteId")
            .ok_or_else(|| DiscoveryError::MissingIdentity("remoteId".to_string()))?;
        let server_uri = scalar_field(data, "discoveryServerUri")
            .ok_or_else(|| DiscoveryError::MissingIdentity("discoveryServerUri".to_string()))?;

        let domain = reqwest::Url::parse(&server_uri)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or(DiscoveryError::InvalidDiscoveryUri(server_uri))?;

        Ok(Self {
            host: host.into(),
            port,
            domain,
            remote_id,
            account_id: scalar_field(data, "accountId").unwrap_or_default(),
            email: scalar_field(data, "email").unwrap_or_default(),
            friendly_name: scalar_field(data, "friendlyName").unwrap_or_default(),
        })
    }
}

fn scalar_field(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ask the hub at `host:port` for its identity
pub async fn fetch_identity(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<HubIdentity, DiscoveryError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DiscoveryError::Unreachable(e.to_string()))?;

    let url = format!("http://{host}:{port}/");
    tracing::debug!(%url, "Requesting hub discovery info");

    let response = client
        .post(&url)
        .header(ORIGIN, DISCOVERY_ORIGIN)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .header(ACCEPT_CHARSET, "utf-8")
        .json(&json!({ "id": 1, "cmd": CMD_DISCOVERY_INFO, "params": {} }))
        .send()
        .await
        .map_err(|e| DiscoveryError::Unreachable(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::HttpStatus(status.as_u16()));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| DiscoveryError::MissingIdentity(format!("decodable body ({e})")))?;

    let data = body
        .get("data")
        .ok_or_else(|| DiscoveryError::MissingIdentity("data".to_string()))?;

    HubIdentity::from_discovery_data(host, port, data)
}

/// Request the engine config over an open session and decode the catalog
pub async fn load_catalog<T>(
    transport: &mut T,
    identity: &HubIdentity,
    options: &CatalogOptions,
) -> Result<(Catalog, MainActivitySelection), DiscoveryError>
where
    T: HubTransport + ?Sized,
{
    transport.open().await?;
    let reply = transport
        .request(HubRequest::get_config(identity.remote_id.clone()))
        .await?;

    let data = reply.payload().ok_or_else(|| {
        DiscoveryError::MalformedConfig(format!(
            "config reply without data (code {:?})",
            reply.status_code()
        ))
    })?;

    Catalog::from_config(data, options)
}

/// Result of a successful discovery
pub struct Discovery<T> {
    /// Hub identity
    pub identity: HubIdentity,
    /// Selectable activities
    pub catalog: Catalog,
    /// How the main activity was chosen
    pub selection: MainActivitySelection,
    /// Open session to the hub
    pub transport: T,
}

/// Load the catalog over an already constructed transport
pub async fn connect<T: HubTransport>(
    identity: HubIdentity,
    mut transport: T,
    options: &CatalogOptions,
) -> Result<Discovery<T>, DiscoveryError> {
    let (catalog, selection) = load_catalog(&mut transport, &identity, options).await?;

    tracing::info!(
        hub = %identity.friendly_name,
        remote_id = %identity.remote_id,
        activities = catalog.activities().len(),
        main_activity = %catalog.main_activity_id(),
        "Hub discovery complete"
    );

    Ok(Discovery {
        identity,
        catalog,
        selection,
        transport,
    })
}

/// Discover the configured hub and open its WebSocket session
pub async fn discover(config: &PlatformConfig) -> Result<Discovery<WebSocketSession>, DiscoveryError> {
    let identity = fetch_identity(
        &config.hub_ip,
        config.hub_port,
        config.discovery_timeout(),
    )
    .await?;

    tracing::info!(
        host = %identity.host,
        domain = %identity.domain,
        "Hub identity received"
    );

    let session = WebSocketSession::for_hub(&identity);
    connect(identity, session, &config.catalog_options()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActivityId;
    use crate::protocol::{HubResponse, CMD_GET_CONFIG};
    use crate::transport::InProcessHub;
    use pretty_assertions::assert_eq;

    fn discovery_data() -> Value {
        json!({
            "friendlyName": "Living Room",
            "remoteId": 12345,
            "discoveryServerUri": "https://svcs.myharmony.com/Discovery/Discovery.svc",
            "email": "user@example.com",
            "accountId": "777"
        })
    }

    #[test]
    fn test_identity_from_discovery_data() {
        let identity = HubIdentity::from_discovery_data("10.0.0.5", 8088, &discovery_data()).unwrap();
        assert_eq!(
            identity,
            HubIdentity {
                host: "10.0.0.5".to_string(),
                port: 8088,
                domain: "svcs.myharmony.com".to_string(),
                remote_id: "12345".to_string(),
                account_id: "777".to_string(),
                email: "user@example.com".to_string(),
                friendly_name: "Living Room".to_string(),
            }
        );
    }

    #[test]
    fn test_identity_missing_remote_id() {
        let mut data = discovery_data();
        data.as_object_mut().unwrap().remove("remoteId");
        let result = HubIdentity::from_discovery_data("10.0.0.5", 8088, &data);
        assert!(matches!(result, Err(DiscoveryError::MissingIdentity(field)) if field == "remoteId"));
    }

    #[test]
    fn test_identity_invalid_server_uri() {
        let mut data = discovery_data();
        data["discoveryServerUri"] = json!("not a uri");
        let result = HubIdentity::from_discovery_data("10.0.0.5", 8088, &data);
        assert!(matches!(result, Err(DiscoveryError::InvalidDiscoveryUri(_))));
    }

    #[tokio::test]
    async fn test_connect_loads_catalog() {
        let hub = InProcessHub::new(|request| {
            assert_eq!(request.cmd(), CMD_GET_CONFIG);
            Ok(HubResponse::with_code(200).data(json!({
                "activity": [
                    { "id": "-1", "label": "PowerOff" },
                    { "id": "1", "label": "WatchTV" },
                    { "id": "2", "label": "PlayConsole" }
                ]
            })))
        });
        let identity = HubIdentity::from_discovery_data("10.0.0.5", 8088, &discovery_data()).unwrap();
        let options = CatalogOptions {
            dev_mode: false,
            main_activity: Some("WatchTV".to_string()),
        };

        let discovery = connect(identity, hub, &options).await.unwrap();
        assert_eq!(discovery.catalog.main_activity_id(), ActivityId(1));
        assert_eq!(discovery.selection, MainActivitySelection::Configured);
        assert!(discovery.transport.is_open());
    }

    #[tokio::test]
    async fn test_connect_transport_failure() {
        let hub = InProcessHub::new(|_| Err(TransportError::ConnectionClosed));
        let identity = HubIdentity::from_discovery_data("10.0.0.5", 8088, &discovery_data()).unwrap();
        let result = connect(identity, hub, &CatalogOptions::default()).await;
        assert!(matches!(result, Err(DiscoveryError::Transport(_))));
    }

    #[tokio::test]
    async fn test_config_reply_without_data() {
        let hub = InProcessHub::new(|_| Ok(HubResponse::with_code(500)));
        let identity = HubIdentity::from_discovery_data("10.0.0.5", 8088, &discovery_data()).unwrap();
        let result = connect(identity, hub, &CatalogOptions::default()).await;
        assert!(matches!(result, Err(DiscoveryError::MalformedConfig(_))));
    }
}
