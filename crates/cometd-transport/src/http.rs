//! reqwest-backed request mechanism.
//!
//! Same-domain batches are POSTed as the form field `message`; the reply may
//! carry a comment guard. Cross-domain batches travel as a GET with
//! `message` and a uniquely named callback in the query string; the reply is
//! a `callback(...)` invocation.

use std::time::Duration;

use async_trait::async_trait;
use cometd_core::{Message, RequestError};
use cometd_settings::RequestSettings;
use tracing::{debug, trace};

use crate::codec;
use crate::mechanism::{Request, RequestMechanism, RequestMode};

const MAX_ERROR_BODY: usize = 512;

/// HTTP client settings.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Whole-request timeout; must exceed the server's long-poll hold time.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Query parameter carrying the callback name on cross-domain requests.
    pub callback_param: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(&RequestSettings::default())
    }
}

impl From<&RequestSettings> for HttpConfig {
    fn from(settings: &RequestSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            callback_param: settings.callback_param.clone(),
        }
    }
}

/// [`RequestMechanism`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpMechanism {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpMechanism {
    pub fn new(config: HttpConfig) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RequestError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Use an existing client; its own timeouts apply.
    pub fn with_client(client: reqwest::Client, config: HttpConfig) -> Self {
        Self { client, config }
    }

    fn classify(&self, error: &reqwest::Error) -> RequestError {
        if error.is_timeout() {
            RequestError::Timeout(self.config.timeout)
        } else {
            RequestError::Network(error.to_string())
        }
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<String, RequestError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(&e))?;
        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// A callback name unique to one request.
pub fn callback_name() -> String {
    format!("cometd_jsonp_{}", uuid::Uuid::now_v7().simple())
}

#[async_trait]
impl RequestMechanism for HttpMechanism {
    async fn send(&self, request: Request) -> Result<Vec<Message>, RequestError> {
        let payload = codec::encode(&request.messages)?;
        trace!(url = %request.url, mode = ?request.mode, %payload, "sending batch");

        let replies = match request.mode {
            RequestMode::SameDomain => {
                let response = self
                    .client
                    .post(&request.url)
                    .form(&[("message", payload.as_str())])
                    .send()
                    .await
                    .map_err(|e| self.classify(&e))?;
                let body = self.read_body(response).await?;
                codec::decode_same_domain(&body)?
            }
            RequestMode::CrossDomain => {
                let callback = callback_name();
                let response = self
                    .client
                    .get(&request.url)
                    .query(&[
                        ("message", payload.as_str()),
                        (self.config.callback_param.as_str(), callback.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| self.classify(&e))?;
                let body = self.read_body(response).await?;
                codec::decode_cross_domain(&body, &callback)?
            }
        };
        debug!(url = %request.url, sent = request.messages.len(), received = replies.len(), "batch answered");
        Ok(replies)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
