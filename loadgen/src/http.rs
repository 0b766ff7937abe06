//! Per-user HTTP sessions against the target service.

use std::time::Duration;

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use reqwest::{Client, RequestBuilder};

use crate::error::{Error, Result};
use crate::reference::ReferenceId;

/// The state a single virtual user carries between its cycles.
///
/// Every session owns its own [`Client`] and therefore its own connection pool. Connections are
/// reused across the cycles of one user, but never shared between users.
#[derive(Debug)]
pub struct Session {
    client: Client,
    remote: String,
    reference_ids: Vec<ReferenceId>,
    rng: SmallRng,
}

impl Session {
    /// Creates a new session for the given base URL.
    ///
    /// Every request issued through this session is bounded by `request_timeout`.
    pub fn new(remote: &str, request_timeout: Duration, rng: SmallRng) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("loadgen/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            remote: remote.trim_end_matches('/').to_owned(),
            reference_ids: Vec::new(),
            rng,
        })
    }

    /// The HTTP client owned by this session.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Resolves `path` against the base URL of the target service.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.remote, path.trim_start_matches('/'))
    }

    /// The identifiers fetched during setup, in the order the service returned them.
    pub fn reference_ids(&self) -> &[ReferenceId] {
        &self.reference_ids
    }

    /// Picks one of the reference identifiers uniformly at random.
    ///
    /// Returns `None` when setup yielded no reference data.
    pub fn choose_reference(&mut self) -> Option<&ReferenceId> {
        self.reference_ids.choose(&mut self.rng)
    }

    /// The random number generator of this user.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    pub(crate) fn set_reference_ids(&mut self, ids: Vec<ReferenceId>) {
        self.reference_ids = ids;
    }
}

/// Sends the request and reads the full response body.
///
/// The body is always drained so the connection can go back to the pool, then any non-success
/// status is turned into [`Error::UnexpectedStatus`].
pub async fn send(request: RequestBuilder) -> Result<Bytes> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(Error::UnexpectedStatus(status));
    }

    Ok(body)
}

/// Checks that the target service accepts connections.
///
/// Any HTTP response counts as reachable, only transport errors fail the probe.
pub async fn probe(remote: &str, timeout: Duration) -> Result<()> {
    let client = Client::builder().timeout(timeout).build()?;
    match client.get(remote).send().await {
        Ok(response) => {
            tracing::debug!(status = %response.status(), "target service is reachable");
            Ok(())
        }
        Err(source) => Err(Error::Unreachable {
            url: remote.to_owned(),
            source,
        }),
    }
}
