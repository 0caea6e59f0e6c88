//! Paginated harvester
//!
//! Walks a remote collection by following continuation links and gathers
//! the raw records of every page into one ordered list. The first request
//! carries the filter parameters; continuation requests carry only the API
//! key, since the link already encodes the rest.
//!
//! A failed page ends the walk: a response at or above 400, a transport
//! error or an undecodable body. Records gathered before the failure are
//! kept and returned alongside it, and the caller decides whether a partial
//! harvest is acceptable.

use dcombine_common::config::HarvestConfig;
use dcombine_common::{time, Error, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::api_client::{read_json, ApiClient, FetchFailure};

/// Remote collection to harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Contacts,
    Lists,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Contacts => "contacts",
            Collection::Lists => "lists",
        }
    }
}

/// Where the next page begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Opaque link to the next page
    Next(String),
    /// No further pages
    Done,
    /// The request failed; no further pages will be fetched
    Failed(FetchFailure),
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Value>,
    pub continuation: Continuation,
}

/// Result of walking a whole collection
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    /// Records in page order
    pub records: Vec<Value>,
    /// Set when the walk ended on an HTTP failure
    pub failure: Option<FetchFailure>,
    /// Set when a continuation page could not be fetched or decoded
    pub error: Option<Error>,
    pub pages: usize,
}

impl HarvestOutcome {
    /// True when every page was fetched
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.error.is_none()
    }

    /// Records, or what stopped the walk when it did not finish
    pub fn into_complete(self) -> Result<Vec<Value>> {
        if let Some(failure) = self.failure {
            return Err(failure.into());
        }
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.records),
        }
    }
}

/// Harvests lists and contacts from the remote API
pub struct Harvester {
    client: ApiClient,
    config: HarvestConfig,
}

impl Harvester {
    pub fn new(client: ApiClient, config: HarvestConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvest every page of `collection`, optionally only records modified
    /// since `modified_since`
    ///
    /// # Errors
    /// - `Error::Format` when `modified_since` is not extended ISO-8601
    ///   (checked before any request is issued)
    /// - `Error::Http` or `Error::InvalidInput` when the first page cannot
    ///   be fetched or decoded
    ///
    /// HTTP failures are not errors here: they end the walk and are reported
    /// in [`HarvestOutcome::failure`]. A continuation page that cannot be
    /// fetched or decoded ends the walk too, reported in
    /// [`HarvestOutcome::error`].
    pub async fn harvest(&self, collection: Collection, modified_since: Option<&str>) -> Result<HarvestOutcome> {
        let params = self.seed_params(collection, modified_since)?;

        let seed = match collection {
            Collection::Contacts => self.config.contacts_uri.clone(),
            Collection::Lists => self.config.lists_uri.clone(),
        };

        let mut outcome = HarvestOutcome::default();
        let mut page = self.fetch_page(&seed, &params).await?;

        loop {
            outcome.pages += 1;
            outcome.records.append(&mut page.records);

            match page.continuation {
                Continuation::Next(link) => match self.fetch_page(&link, &[]).await {
                    Ok(next) => page = next,
                    Err(e) => {
                        warn!(
                            kept = outcome.records.len(),
                            "Harvest of {} ended early on {}, keeping partial result",
                            collection.name(),
                            e
                        );
                        outcome.error = Some(e);
                        break;
                    }
                },
                Continuation::Done => {
                    debug!("No more {} to harvest.", collection.name());
                    break;
                }
                Continuation::Failed(failure) => {
                    warn!(
                        status = failure.status,
                        kept = outcome.records.len(),
                        "Harvest of {} ended early, keeping partial result",
                        collection.name()
                    );
                    outcome.failure = Some(failure);
                    break;
                }
            }
        }

        info!(
            records = outcome.records.len(),
            pages = outcome.pages,
            complete = outcome.is_complete(),
            "Harvested {}",
            collection.name()
        );
        Ok(outcome)
    }

    /// Query parameters for the first request of a walk
    pub fn seed_params(&self, collection: Collection, modified_since: Option<&str>) -> Result<Vec<(&'static str, String)>> {
        let mut params = Vec::new();

        if collection == Collection::Contacts {
            params.push(("status", self.config.status.clone()));
            params.push(("limit", self.config.page_size.to_string()));
        }

        if let Some(since) = modified_since {
            if !time::is_iso8601(since) {
                return Err(Error::Format(format!("'{}' is not in iso8601 format", since)));
            }
            params.push(("modified_since", since.to_string()));
        }

        Ok(params)
    }

    /// Fetch one page; `params` is empty for continuation links
    pub async fn fetch_page(&self, path: &str, params: &[(&str, String)]) -> Result<Page> {
        debug!("Getting '{}' records from {}.", self.config.page_size, self.client.url(path));
        let response = self.client.get(path, params).await?;

        let body = match read_json(response).await? {
            Ok(body) => body,
            Err(failure) => {
                return Ok(Page {
                    records: Vec::new(),
                    continuation: Continuation::Failed(failure),
                })
            }
        };

        parse_page(body)
    }
}

/// Split a response body into records and continuation
///
/// Accepts the `{results, meta: {pagination: {next_link}}}` envelope, or a
/// bare array, which is a single terminal page.
pub fn parse_page(body: Value) -> Result<Page> {
    match body {
        Value::Array(records) => Ok(Page {
            records,
            continuation: Continuation::Done,
        }),
        Value::Object(mut envelope) => {
            let records = match envelope.remove("results") {
                Some(Value::Array(records)) => records,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(Error::InvalidInput(format!(
                        "'results' is not an array: {}",
                        other
                    )))
                }
            };

            let next_link = envelope
                .get("meta")
                .and_then(|m| m.get("pagination"))
                .and_then(|p| p.get("next_link"))
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty());

            let continuation = match next_link {
                Some(link) => {
                    debug!("Found next link to harvest: '{}'", link);
                    Continuation::Next(link.to_string())
                }
                None => Continuation::Done,
            };

            Ok(Page { records, continuation })
        }
        other => Err(Error::InvalidInput(format!(
            "Unexpected response shape: {}",
            other
        ))),
    }
}
