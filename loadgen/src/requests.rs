//! The built-in actions issuing requests against a REST collection.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::{Error, Result};
use crate::http::{self, Session};
use crate::records::RecordSource;
use crate::reference::ReferenceId;
use crate::registry::{Execute, Execution};

/// `GET <path>`, listing the whole collection.
#[derive(Clone, Debug)]
pub struct ListRequest {
    path: String,
}

impl ListRequest {
    /// Lists the collection at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Execute for ListRequest {
    async fn execute(&self, session: &mut Session) -> Result<Execution> {
        let url = session.url(&self.path);
        http::send(session.client().get(url)).await?;
        Ok(Execution::Completed)
    }
}

/// `GET <path>/{id}` for a random identifier out of the user's reference data.
///
/// Skips the cycle if the user has no reference data.
#[derive(Clone, Debug)]
pub struct DetailRequest {
    path: String,
}

impl DetailRequest {
    /// Fetches single records from the collection at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Execute for DetailRequest {
    async fn execute(&self, session: &mut Session) -> Result<Execution> {
        let Some(id) = session.choose_reference().cloned() else {
            return Ok(Execution::Skipped);
        };

        let url = record_url(&session.url(&self.path), &id)?;
        http::send(session.client().get(url)).await?;
        Ok(Execution::Completed)
    }
}

/// Appends `id` to `collection` as a single, percent-encoded path segment.
fn record_url(collection: &str, id: &ReferenceId) -> Result<Url> {
    let invalid = || Error::InvalidConfig(format!("`{collection}` cannot hold record paths"));

    let mut url = Url::parse(collection).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push(id.as_str());
    Ok(url)
}

/// `POST <path>` with a freshly generated record as JSON body.
#[derive(Clone, Debug)]
pub struct CreateRequest {
    path: String,
    records: Arc<dyn RecordSource>,
}

impl CreateRequest {
    /// Creates records produced by `records` in the collection at `path`.
    pub fn new(path: impl Into<String>, records: Arc<dyn RecordSource>) -> Self {
        Self {
            path: path.into(),
            records,
        }
    }
}

#[async_trait]
impl Execute for CreateRequest {
    async fn execute(&self, session: &mut Session) -> Result<Execution> {
        let record = self.records.record(session.rng());
        let url = session.url(&self.path);
        http::send(session.client().post(url).json(&record)).await?;
        Ok(Execution::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_url_appends_one_segment() {
        let id = ReferenceId::from(7_u64);

        let url = record_url("http://localhost:8080/api/customer/owners", &id).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/customer/owners/7");

        let url = record_url("http://localhost:8080/api/customer/owners/", &id).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/customer/owners/7");
    }

    #[test]
    fn record_url_escapes_identifiers() {
        let id = ReferenceId::from("a/b?c#d");
        let url = record_url("http://localhost:8080/owners", &id).unwrap();

        assert_eq!(url.as_str(), "http://localhost:8080/owners/a%2Fb%3Fc%23d");
        assert_eq!(url.path_segments().unwrap().count(), 2);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn record_url_rejects_invalid_collections() {
        let err = record_url("not a url", &ReferenceId::from(1_u64)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
