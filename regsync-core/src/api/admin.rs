use super::{error::*, types::*};
use async_trait::async_trait;
use base64::prelude::*;
use reqwest::{header, ClientBuilder, Method};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const XSRF_HEADER: &str = "X-XSRF-Header";
const XSRF_VALUE: &str = "PingFederate";

/// Connection settings for the federation server's admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Base URL of the OAuth client administration endpoint.
    pub admin_base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// JSON file with the base client definition newly created clients
    /// start from. Server defaults apply when unset.
    #[serde(default)]
    pub client_definition: Option<PathBuf>,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            admin_base_url: "https://localhost:9999/pf-admin-api/v1/oauth/clients".to_string(),
            username: "Administrator".to_string(),
            password: "2FederateM0re".to_string(),
            accept_invalid_certs: false,
            client_definition: None,
        }
    }
}

/// Mutations the reconciler needs from the target system.
///
/// The engine plans and executes against this trait so its behavior can
/// be exercised without a running federation server.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn create_client(&self, client: &OAuthClient) -> Result<MutationOutcome>;
    async fn update_client(&self, client_id: &str, client: &OAuthClient)
        -> Result<MutationOutcome>;
    async fn delete_client(&self, client_id: &str) -> Result<MutationOutcome>;
}

/// Administrative client for the federation server's OAuth client store.
pub struct AdminClient {
    http: reqwest::Client,
    base: Url,
    auth_header: String,
}

impl AdminClient {
    pub fn connect(settings: &TargetSettings) -> Result<Self> {
        let base = Url::parse(settings.admin_base_url.trim_end_matches('/'))?;

        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("regsync/0.1.0");
        if settings.accept_invalid_certs {
            warn!("TLS certificate verification for the admin API is DISABLED");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base,
            auth_header: basic_auth(&settings.username, &settings.password),
        })
    }

    /// Fetch every OAuth client currently registered, managed or not.
    pub async fn list_clients(&self) -> Result<Vec<OAuthClient>> {
        debug!("Requesting the OAuth client inventory...");
        let response = self.request(Method::GET, self.base.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Admin {
                status: status.as_u16(),
                message,
            });
        }

        let list: ClientList = response.json().await?;
        info!(
            "Target server holds {} clients, including manually created ones",
            list.items.len()
        );
        Ok(list.items)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(XSRF_HEADER, XSRF_VALUE)
            .header(header::AUTHORIZATION, self.auth_header.as_str())
    }

    /// URL of a single client resource. Client identifiers are URLs
    /// themselves, so each is pushed as one percent-encoded path segment.
    fn client_url(&self, client_id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(client_id);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&OAuthClient>,
    ) -> Result<MutationOutcome> {
        let mut request = self.request(method.clone(), url.clone());
        if let Some(client) = body {
            request = request.json(client);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("{} {} failed with {}: {}", method, url, status, text);
            if let Some(client) = body {
                debug!(
                    "Rejected payload: {}",
                    serde_json::to_string(client).unwrap_or_default()
                );
            }
        }

        Ok(MutationOutcome {
            ok: status.is_success(),
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn create_client(&self, client: &OAuthClient) -> Result<MutationOutcome> {
        debug!("Creating client {}", client.client_id);
        self.send(Method::POST, self.base.clone(), Some(client))
            .await
    }

    async fn update_client(
        &self,
        client_id: &str,
        client: &OAuthClient,
    ) -> Result<MutationOutcome> {
        debug!("Updating client {}", client_id);
        self.send(Method::PUT, self.client_url(client_id), Some(client))
            .await
    }

    async fn delete_client(&self, client_id: &str) -> Result<MutationOutcome> {
        debug!("Deleting client {}", client_id);
        self.send(Method::DELETE, self.client_url(client_id), None)
            .await
    }
}

fn basic_auth(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        BASE64_STANDARD.encode(format!("{}:{}", username, password))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AdminClient {
        AdminClient::connect(&TargetSettings::default()).unwrap()
    }

    #[test]
    fn basic_auth_encodes_credentials() {
        assert_eq!(
            basic_auth("Administrator", "2FederateM0re"),
            "Basic QWRtaW5pc3RyYXRvcjoyRmVkZXJhdGVNMHJl"
        );
    }

    #[test]
    fn client_url_keeps_a_url_id_in_one_segment() {
        let url = test_client().client_url("https://rp.example.com/rp/1");
        let path = url.path();
        let tail = path
            .strip_prefix("/pf-admin-api/v1/oauth/clients/")
            .expect("client id should extend the base path");
        assert!(!tail.contains('/'), "id must stay one segment: {}", tail);
        assert!(tail.contains("%2F"), "slashes must be escaped: {}", tail);
    }

    #[test]
    fn trailing_slash_on_the_base_url_is_dropped() {
        let settings = TargetSettings {
            admin_base_url: "https://localhost:9999/pf-admin-api/v1/oauth/clients/".to_string(),
            ..Default::default()
        };
        let client = AdminClient::connect(&settings).unwrap();
        let url = client.client_url("abc");
        assert_eq!(url.path(), "/pf-admin-api/v1/oauth/clients/abc");
    }
}
