//! Core library for regsync.
//!
//! This crate holds the wire types shared by the participant directory
//! and the federation server, plus the HTTP clients for talking to both.
//! The reconciliation engine lives in the `regsync` crate and only
//! reaches the network through the [`api::AdminApi`] trait defined here.

pub mod api;

pub use api::{
    AdminApi, AdminClient, ApiError, ClientList, ClientPage, DirectoryApi, DirectoryClient,
    DirectorySettings, JwksSettings, MutationOutcome, OAuthClient, OidcPolicy, ParameterValues,
    ProviderMetadata, TargetSettings, TokenResponse,
};
