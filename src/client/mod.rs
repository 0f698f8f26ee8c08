//! Supabase REST client and credentials.
//!
//! This module provides the [`RestClient`] for talking to a project's
//! PostgREST endpoints, the [`RecordStore`] trait the migration is written
//! against, and [`Credentials`] for authenticating requests.

mod auth;
mod rest;
mod store;

pub use auth::Credentials;
pub use rest::RestClient;
pub use store::{Record, RecordStore, StoreFailure};

#[cfg(test)]
pub(crate) use store::memory;
