//! PostgREST client module
//!
//! Provides `RestClient` for reading and upserting rows through a
//! Supabase project's `/rest/v1/{table}` endpoints.

use super::{Credentials, Record, RecordStore, StoreFailure};
use eyre::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Request, Response};
use url::Url;

const REST_PATH: &str = "rest/v1/";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates";

/// HTTP client bound to one Supabase project.
///
/// One client (and connection pool) is reused for every request; the
/// authentication headers are attached to each request as it is built.
///
/// # Example
/// ```no_run
/// use supabase_migrate::client::{Credentials, RecordStore, RestClient};
///
/// # async fn example() -> eyre::Result<()> {
/// let creds = Credentials::parse("https://project.supabase.co", "anon-key")?;
/// let client = RestClient::try_new(creds)?;
///
/// let page = client.select_page("candidatos", "id", 1000, 0).await?;
/// println!("fetched {} rows", page.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RestClient {
    client: Client,
    headers: HeaderMap,
    base: Url,
}

impl RestClient {
    /// Create a client for the project identified by `credentials`
    ///
    /// # Errors
    /// Returns an error if the key cannot be used as a header value, the
    /// URL cannot carry a path, or the HTTP client cannot be built
    pub fn try_new(credentials: Credentials) -> Result<Self> {
        let headers = credentials.headers()?;
        let client = Client::builder()
            .build()
            .with_context(|| "Failed to build HTTP client")?;

        // Url::join drops the last path segment unless it ends with '/'
        let mut root = credentials.url().clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let base = root
            .join(REST_PATH)
            .with_context(|| format!("Cannot build REST endpoint from {}", credentials))?;

        Ok(Self {
            client,
            headers,
            base,
        })
    }

    /// The `/rest/v1/` endpoint all table URLs hang off
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base_url}/rest/v1/{table}`
    pub fn table_url(&self, table: &str) -> Result<Url> {
        self.base
            .join(table)
            .with_context(|| format!("Invalid table name: {}", table))
    }

    /// Build the GET request for one page of `table`
    pub fn select_request(
        &self,
        table: &str,
        order_by: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Request> {
        let request = self
            .client
            .get(self.table_url(table)?)
            .headers(self.headers.clone())
            .query(&[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("order", format!("{}.asc", order_by)),
            ])
            .build()?;
        Ok(request)
    }

    /// Build the POST request that upserts `records` into `table`
    pub fn upsert_request(
        &self,
        table: &str,
        conflict_key: &str,
        records: &[Record],
    ) -> Result<Request> {
        let request = self
            .client
            .post(self.table_url(table)?)
            .headers(self.headers.clone())
            .query(&[("on_conflict", conflict_key)])
            .header("Prefer", MERGE_DUPLICATES)
            .json(records)
            .build()?;
        Ok(request)
    }

    /// Verify the project is reachable and the key is accepted
    pub async fn test_connection(&self) -> Result<Response> {
        let response = self
            .client
            .get(self.base.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base))?;
        Ok(response)
    }

    async fn send(&self, request: Request) -> Result<Response, StoreFailure> {
        log::trace!("{} {}", request.method(), request.url());
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| StoreFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StoreFailure::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl RecordStore for RestClient {
    async fn select_page(
        &self,
        table: &str,
        order_by: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>, StoreFailure> {
        let request = self
            .select_request(table, order_by, limit, offset)
            .map_err(|e| StoreFailure::Transport(e.to_string()))?;
        let response = self.send(request).await?;
        response
            .json::<Vec<Record>>()
            .await
            .map_err(|e| StoreFailure::Decode(e.to_string()))
    }

    async fn upsert(
        &self,
        table: &str,
        conflict_key: &str,
        records: &[Record],
    ) -> Result<(), StoreFailure> {
        let request = self
            .upsert_request(table, conflict_key, records)
            .map_err(|e| StoreFailure::Transport(e.to_string()))?;
        self.send(request).await?;
        Ok(())
    }
}

impl std::fmt::Display for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)
    }
}
