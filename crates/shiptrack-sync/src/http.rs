//! HTTP carrier adapter.
//!
//! Speaks a plain JSON-over-HTTP carrier aggregator API:
//!
//! - `POST {base}/trackings` with a [`CreateTrackingInput`] body returns a
//!   [`TrackingSession`].
//! - `GET {base}/trackings/{session}/events` returns the full event list
//!   for a session.

use std::time::Duration;

use crate::adapter::{
  AdapterError, CarrierAdapter, CarrierEvent, CreateTrackingInput,
  TrackingSession,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpCarrierAdapter {
  client:   reqwest::Client,
  base_url: String,
  provider: String,
  api_key:  Option<String>,
  timeout:  Duration,
}

impl HttpCarrierAdapter {
  pub fn new(
    base_url: impl Into<String>,
    provider: impl Into<String>,
    api_key: Option<String>,
  ) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: base_url.into().trim_end_matches('/').to_owned(),
      provider: provider.into(),
      api_key,
      timeout: DEFAULT_TIMEOUT,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.api_key {
      Some(key) => req.bearer_auth(key),
      None => req,
    }
  }

  fn classify(&self, e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
      AdapterError::Timeout(self.timeout)
    } else {
      AdapterError::Transport(e.to_string())
    }
  }

  async fn decode<T: serde::de::DeserializeOwned>(
    &self,
    response: reqwest::Response,
  ) -> Result<T, AdapterError> {
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(AdapterError::Transport(format!(
        "carrier returned {status}: {body}"
      )));
    }
    response.json().await.map_err(|e| self.classify(e))
  }
}

impl CarrierAdapter for HttpCarrierAdapter {
  fn provider_name(&self) -> &str { &self.provider }

  async fn create_tracking(
    &self,
    input: CreateTrackingInput,
  ) -> Result<TrackingSession, AdapterError> {
    let url = format!("{}/trackings", self.base_url);
    let response = self
      .apply_auth(self.client.post(&url))
      .timeout(self.timeout)
      .json(&input)
      .send()
      .await
      .map_err(|e| self.classify(e))?;
    self.decode(response).await
  }

  async fn get_updates(
    &self,
    session_id: &str,
  ) -> Result<Vec<CarrierEvent>, AdapterError> {
    let url = format!("{}/trackings/{session_id}/events", self.base_url);
    let response = self
      .apply_auth(self.client.get(&url))
      .timeout(self.timeout)
      .send()
      .await
      .map_err(|e| self.classify(e))?;
    self.decode(response).await
  }
}
