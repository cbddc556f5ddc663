//! Field mapping from directory records onto target client records

use std::collections::BTreeMap;

use regsync_core::{DirectoryClient, OAuthClient};

/// Merge a directory record onto a base client record.
///
/// The base is copied, never mutated: for updates it is the record the
/// target server currently holds, for creates it is the operator's client
/// definition template. Directory-owned fields overwrite their
/// counterparts; everything else on the base, including fields only the
/// target server knows about, rides along untouched.
pub fn merge(
    base: &OAuthClient,
    record: &DirectoryClient,
    claims_mapping: &BTreeMap<String, String>,
) -> OAuthClient {
    let mut client = base.clone();

    client.client_id = record.client_id.clone();
    client.name = record.client_name.clone();
    client.description = record.client_description.clone();
    client.enabled = record.is_active();
    client.redirect_uris = record.redirect_uris.clone();
    client.grant_types = record
        .grant_types
        .iter()
        .map(|grant| grant.to_uppercase())
        .collect();
    client.restricted_response_types = record.response_types.clone();
    client.logo_url = record.logo_uri.clone();
    client.oidc_policy.sector_identifier_uri = record.sector_identifier_uri.clone();
    client.jwks_settings.jwks_url = record.jwks_uri.clone();

    // The watermark is always written, claims mapping or not.
    client.extended_parameters.insert(
        OAuthClient::WATERMARK_PARAM.to_string(),
        record.claim_values("last_updated").into(),
    );
    for (field, parameter) in claims_mapping {
        client
            .extended_parameters
            .insert(parameter.clone(), record.claim_values(field).into());
    }

    client
}
