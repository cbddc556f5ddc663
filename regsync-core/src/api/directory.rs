use super::{error::*, types::*};
use chrono::Utc;
use reqwest::ClientBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the participant directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Issuer URL used for OpenID Connect discovery.
    pub issuer: String,
    /// Client identifier presented in the client credentials grant.
    pub client_id: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Endpoint serving the paginated client listing.
    pub clients_endpoint: String,
    /// Directory role the listing is filtered by.
    #[serde(default = "default_role")]
    pub role: String,
    /// PEM-encoded transport certificate presented over mutual TLS.
    pub client_cert: PathBuf,
    /// PEM-encoded private key for the transport certificate.
    pub client_key: PathBuf,
    /// Extra root certificate bundle to trust, typically the directory's CA.
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// Informational only: how far back `last_updated` churn is expected.
    /// The full client list is fetched either way.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

fn default_scope() -> String {
    "directory:software".to_string()
}

fn default_role() -> String {
    "RP-CORE".to_string()
}

fn default_lookback_days() -> u32 {
    7
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            issuer: "https://auth.directory.example.com".to_string(),
            client_id:
                "https://rp.directory.example.com/openid_relying_party/00000000-0000-0000-0000-000000000000"
                    .to_string(),
            scope: default_scope(),
            clients_endpoint: "https://api.directory.example.com/clients".to_string(),
            role: default_role(),
            client_cert: PathBuf::from("certs/transport.pem"),
            client_key: PathBuf::from("certs/transport.key"),
            ca_bundle: None,
            accept_invalid_certs: false,
            https_proxy: None,
            lookback_days: default_lookback_days(),
        }
    }
}

/// Client for the participant directory.
///
/// Every call goes over the directory's mutual-TLS channel: the transport
/// certificate from [`DirectorySettings`] is presented for discovery, the
/// token grant and the client listing alike.
pub struct DirectoryApi {
    http: reqwest::Client,
    settings: DirectorySettings,
}

impl DirectoryApi {
    /// Load the transport identity and build the HTTP client.
    pub async fn connect(settings: DirectorySettings) -> Result<Self> {
        let identity = load_identity(&settings.client_cert, &settings.client_key).await?;

        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("regsync/0.1.0")
            .identity(identity);

        if let Some(path) = &settings.ca_bundle {
            let pem = read_pem(path).await?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        if settings.accept_invalid_certs {
            warn!("TLS certificate verification for the directory is DISABLED");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = &settings.https_proxy {
            debug!("Routing directory traffic through proxy {}", proxy);
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        let http = builder.build()?;
        Ok(Self { http, settings })
    }

    /// Fetch the issuer's OpenID Connect discovery document.
    pub async fn discover(&self) -> Result<ProviderMetadata> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            self.settings.issuer.trim_end_matches('/')
        );
        info!("Discovering issuer {}...", self.settings.issuer);

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Discovery(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let metadata: ProviderMetadata = response.json().await?;
        debug!("Token endpoint is {}", metadata.token_endpoint);
        Ok(metadata)
    }

    /// Run the client credentials grant against the discovered token
    /// endpoint. The grant is authenticated by the mutual-TLS channel, so
    /// only the client identifier and scope travel in the form body.
    pub async fn request_token(&self, metadata: &ProviderMetadata) -> Result<TokenResponse> {
        info!("Requesting an access token...");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.settings.client_id.as_str()),
            ("scope", self.settings.scope.as_str()),
        ];

        let response = self
            .http
            .post(&metadata.token_endpoint)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ApiError::Token(format!("{} - {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        info!("Access token issued");
        Ok(token)
    }

    /// Walk the zero-indexed pages of the client listing and merge them
    /// into one deduplicated snapshot.
    ///
    /// The merged snapshot must account for every record the directory
    /// says it holds; a short count fails with
    /// [`ApiError::FetchIncomplete`] and no records are returned.
    pub async fn fetch_clients(&self, access_token: &str) -> Result<Vec<DirectoryClient>> {
        if self.settings.lookback_days > 0 {
            let since = Utc::now() - chrono::Duration::days(i64::from(self.settings.lookback_days));
            info!(
                "Directory lookback window starts {}; fetching the full client list regardless",
                since.format("%Y-%m-%d")
            );
        }

        let mut pages = Vec::new();
        let mut page: u32 = 0;
        let mut total_pages: u32 = 0;
        loop {
            debug!("Requesting directory clients page {}...", page);
            let page_param = page.to_string();
            let response = self
                .http
                .get(&self.settings.clients_endpoint)
                .query(&[
                    ("role", self.settings.role.as_str()),
                    ("page", page_param.as_str()),
                ])
                .bearer_auth(access_token)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(ApiError::Directory {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: ClientPage = response.json().await?;
            if page == 0 {
                total_pages = body.total_pages;
                info!(
                    "Directory reports {} clients across {} pages",
                    body.total_size, body.total_pages
                );
            }
            pages.push(body);

            page += 1;
            if page >= total_pages {
                break;
            }
        }

        let clients = merge_pages(pages)?;
        info!("Retrieved {} clients from the directory", clients.len());
        Ok(clients)
    }

    /// Full fetch pipeline: discovery, token grant, then the paginated
    /// client listing.
    pub async fn fetch_authoritative(&self) -> Result<Vec<DirectoryClient>> {
        let metadata = self.discover().await?;
        let token = self.request_token(&metadata).await?;
        self.fetch_clients(&token.access_token).await
    }
}

async fn read_pem(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::Identity(format!("{}: {}", path.display(), e)))
}

async fn load_identity(cert_path: &Path, key_path: &Path) -> Result<reqwest::Identity> {
    let cert = read_pem(cert_path).await?;
    let key = read_pem(key_path).await?;
    reqwest::Identity::from_pkcs8_pem(&cert, &key)
        .map_err(|e| ApiError::Identity(format!("{}: {}", cert_path.display(), e)))
}

fn merge_pages(pages: Vec<ClientPage>) -> Result<Vec<DirectoryClient>> {
    let expected = pages.first().map(|page| page.total_size).unwrap_or(0);
    let merged: Vec<DirectoryClient> = pages.into_iter().flat_map(|page| page.content).collect();
    if merged.len() != expected {
        return Err(ApiError::FetchIncomplete {
            expected,
            retrieved: merged.len(),
        });
    }
    Ok(dedup_by_client_id(merged))
}

fn dedup_by_client_id(clients: Vec<DirectoryClient>) -> Vec<DirectoryClient> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(clients.len());
    for client in clients {
        if seen.insert(client.client_id.clone()) {
            unique.push(client);
        } else {
            warn!(
                "Directory listed client {} more than once; keeping the first record",
                client.client_id
            );
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ids: &[&str], total_pages: u32, total_size: usize) -> ClientPage {
        ClientPage {
            content: ids
                .iter()
                .map(|id| DirectoryClient {
                    client_id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
            total_pages,
            total_size,
        }
    }

    #[test]
    fn merge_pages_concatenates_in_page_order() {
        let merged = merge_pages(vec![
            page(&["a", "b"], 2, 3),
            page(&["c"], 2, 3),
        ])
        .unwrap();
        let ids: Vec<_> = merged.iter().map(|c| c.client_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn merge_pages_rejects_a_short_snapshot() {
        let result = merge_pages(vec![page(&["a", "b"], 2, 5), page(&["c"], 2, 5)]);
        match result {
            Err(ApiError::FetchIncomplete {
                expected,
                retrieved,
            }) => {
                assert_eq!(expected, 5);
                assert_eq!(retrieved, 3);
            }
            other => panic!("expected FetchIncomplete, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn merge_pages_accepts_an_empty_directory() {
        assert!(merge_pages(vec![page(&[], 0, 0)]).unwrap().is_empty());
        assert!(merge_pages(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_records_keep_first_occurrence() {
        let first = DirectoryClient {
            client_id: "a".to_string(),
            status: "Active".to_string(),
            ..Default::default()
        };
        let second = DirectoryClient {
            client_id: "a".to_string(),
            ..Default::default()
        };
        let third = DirectoryClient {
            client_id: "b".to_string(),
            ..Default::default()
        };

        let unique = dedup_by_client_id(vec![first.clone(), second, third]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0], first);
        assert_eq!(unique[1].client_id, "b");
    }

    #[test]
    fn settings_fill_in_directory_defaults() {
        let settings: DirectorySettings = serde_json::from_value(json!({
            "issuer": "https://auth.directory.example.com",
            "client_id": "https://rp.example.com/rp/1",
            "clients_endpoint": "https://api.directory.example.com/clients",
            "client_cert": "certs/transport.pem",
            "client_key": "certs/transport.key"
        }))
        .unwrap();

        assert_eq!(settings.scope, "directory:software");
        assert_eq!(settings.role, "RP-CORE");
        assert_eq!(settings.lookback_days, 7);
        assert!(!settings.accept_invalid_certs);
        assert!(settings.ca_bundle.is_none());
    }
}
