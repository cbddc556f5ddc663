use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relying-party record as published by the participant directory.
///
/// Only the fields the sync cares about are typed; everything else the
/// directory sends lands in `extra` and stays addressable through
/// [`DirectoryClient::claim_values`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryClient {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_description: Option<String>,
    #[serde(default)]
    pub sector_identifier_uri: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DirectoryClient {
    /// Status value the directory uses for clients that may transact.
    pub const ACTIVE: &'static str = "Active";

    pub fn is_active(&self) -> bool {
        self.status == Self::ACTIVE
    }

    /// Values of a directory field by its wire name, normalized to a list.
    ///
    /// Scalars become a single-element list, lists pass through, and an
    /// empty or missing field becomes an empty list. Works for both the
    /// typed fields and anything carried in `extra`.
    pub fn claim_values(&self, field: &str) -> Vec<String> {
        fn scalar(value: &Option<String>) -> Vec<String> {
            value.iter().filter(|v| !v.is_empty()).cloned().collect()
        }

        match field {
            "client_id" if self.client_id.is_empty() => Vec::new(),
            "client_id" => vec![self.client_id.clone()],
            "status" if self.status.is_empty() => Vec::new(),
            "status" => vec![self.status.clone()],
            "redirect_uris" => self.redirect_uris.clone(),
            "grant_types" => self.grant_types.clone(),
            "response_types" => self.response_types.clone(),
            "client_name" => scalar(&self.client_name),
            "client_description" => scalar(&self.client_description),
            "sector_identifier_uri" => scalar(&self.sector_identifier_uri),
            "jwks_uri" => scalar(&self.jwks_uri),
            "logo_uri" => scalar(&self.logo_uri),
            "last_updated" => scalar(&self.last_updated),
            other => self
                .extra
                .get(other)
                .map(value_to_strings)
                .unwrap_or_default(),
        }
    }
}

fn value_to_strings(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::String(s) if s.is_empty() => Vec::new(),
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(items) => items.iter().flat_map(value_to_strings).collect(),
        other => vec![other.to_string()],
    }
}

/// One page of the directory's paginated client listing. Pages are
/// zero-indexed; `total_size` is the directory's own count of records
/// across all pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientPage {
    #[serde(default)]
    pub content: Vec<DirectoryClient>,
    #[serde(rename = "totalPages", default)]
    pub total_pages: u32,
    #[serde(rename = "totalSize", default)]
    pub total_size: usize,
}

/// OAuth client record held by the federation server's admin API.
///
/// Unknown fields at every level are kept in `extra` maps so a record can
/// make the fetch, merge and update round trip without dropping anything
/// the server or an administrator put there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuthClient {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub restricted_response_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub oidc_policy: OidcPolicy,
    pub jwks_settings: JwksSettings,
    pub extended_parameters: HashMap<String, ParameterValues>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl OAuthClient {
    /// Extended parameter carrying the directory's `last_updated` value at
    /// the time the client was last written.
    pub const WATERMARK_PARAM: &'static str = "register_last_updated";

    /// The stored watermark, if the client carries a non-empty one.
    pub fn watermark(&self) -> Option<&str> {
        self.extended_parameters
            .get(Self::WATERMARK_PARAM)
            .and_then(|parameter| parameter.values.first())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Whether this record was written by the sync rather than created by
    /// hand. Only managed clients are eligible for the orphan sweep.
    pub fn is_directory_managed(&self) -> bool {
        self.watermark().is_some()
    }
}

/// `oidcPolicy` sub-document of an OAuth client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OidcPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_identifier_uri: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// `jwksSettings` sub-document of an OAuth client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JwksSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_url: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Value list for one extended parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterValues {
    #[serde(default)]
    pub values: Vec<String>,
}

impl ParameterValues {
    pub fn single(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }
}

impl From<Vec<String>> for ParameterValues {
    fn from(values: Vec<String>) -> Self {
        Self { values }
    }
}

/// List wrapper returned by the admin API's client collection endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientList {
    #[serde(default)]
    pub items: Vec<OAuthClient>,
}

/// Result of a single admin API mutation. Non-2xx responses are reported
/// here rather than as errors so one rejected client cannot abort the pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub ok: bool,
    pub status: u16,
    pub body: String,
}

impl MutationOutcome {
    pub fn success(status: u16) -> Self {
        Self {
            ok: true,
            status,
            body: String::new(),
        }
    }
}

/// Subset of the issuer's OpenID Connect discovery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub token_endpoint: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Token endpoint response for the client credentials grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}
