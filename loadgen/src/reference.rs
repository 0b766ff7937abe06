//! Fetches the reference data a virtual user needs for its detail-style actions.

use std::fmt;

use reqwest::Client;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http;

/// Identifier of an existing entity in the target service.
///
/// Identifiers are kept in their textual form, since they are only ever spliced into URLs.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Extracts an identifier from a JSON `id` value.
    ///
    /// Numbers and strings are accepted, anything else yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(Self(number.to_string())),
            Value::String(string) => Some(Self(string.clone())),
            _ => None,
        }
    }

    /// The identifier as it appears in URLs.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ReferenceId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ReferenceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lists the collection at `url` and returns the identifiers of all records.
///
/// Any failure is reported as [`Error::SetupFailed`], wrapping the underlying cause. The request
/// is never retried.
pub async fn fetch_reference_ids(client: &Client, url: &str) -> Result<Vec<ReferenceId>> {
    let fetch = async {
        let body = http::send(client.get(url)).await?;
        parse_reference_ids(&body)
    };

    fetch.await.map_err(|err| Error::SetupFailed(Box::new(err)))
}

/// Parses a JSON array of records and collects their `id` fields in order.
///
/// Records without a usable `id` are skipped.
pub fn parse_reference_ids(body: &[u8]) -> Result<Vec<ReferenceId>> {
    let records: Vec<Value> = serde_json::from_slice(body)?;

    let ids = records
        .iter()
        .filter_map(|record| record.get("id"))
        .filter_map(ReferenceId::from_json)
        .collect();

    Ok(ids)
}
