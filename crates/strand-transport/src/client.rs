//! The per-server HTTP/SSE client.

use crate::auth::{AuthHeaders, TokenProvider};
use crate::TransportError;
use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use strand_protocol_ag_ui::{Event, RunAgentInput, SseDecoder};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Common boxed stream for transport results.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = Result<T, TransportError>> + Send>>;

/// Caller-configurable knobs for one streaming run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Abort the stream when no event arrives within this window.
    pub idle_timeout: Duration,
    /// Maximum retries when the stream fails before its first event.
    pub retry_attempts: u32,
    /// Linear backoff base: retry `n` sleeps `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

struct HttpState {
    client: reqwest::Client,
    /// Bumped on every credential refresh. Callers that observed an older
    /// generation know a refresh already happened and skip their own.
    generation: u64,
}

struct TransportInner {
    base_url: String,
    token_provider: Arc<dyn TokenProvider>,
    http: RwLock<HttpState>,
    refresh_gate: tokio::sync::Mutex<()>,
}

/// Authenticated HTTP/SSE client for one server.
///
/// Cheap to clone; all clones share credentials, so a refresh performed
/// through one clone is observed by every in-flight request.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

impl Transport {
    /// Create a transport for `base_url` with initial credentials.
    pub fn new(
        base_url: impl Into<String>,
        headers: AuthHeaders,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.into();
        let client = build_client(&headers)?;
        Ok(Self {
            inner: Arc::new(TransportInner {
                base_url: base_url.trim_end_matches('/').to_string(),
                token_provider,
                http: RwLock::new(HttpState {
                    client,
                    generation: 0,
                }),
                refresh_gate: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Authenticated GET, decoded as JSON.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.url(path);
        let resp = self.send_with_auth(|c| c.get(&url)).await?;
        resp.json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Authenticated POST with a JSON body, decoded as JSON.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = self.url(path);
        let resp = self.send_with_auth(|c| c.post(&url).json(body)).await?;
        resp.json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Start an agent run and stream its decoded events.
    ///
    /// Failures before the first event retry up to
    /// `options.retry_attempts` times with linear backoff; once an event
    /// has been yielded the stream is never resumed, because the caller
    /// cannot distinguish a resumed stream from a restarted one. A silent
    /// close ends the stream cleanly — interpreting that is the run
    /// engine's concern.
    pub fn run_agent(
        &self,
        room_id: &str,
        thread_id: &str,
        run_id: &str,
        input: RunAgentInput,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> BoxStream<Event> {
        let transport = self.clone();
        let url = self.url(&format!("/api/v1/rooms/{room_id}/agui/{thread_id}/{run_id}"));
        Box::pin(stream! {
            let mut attempt: u32 = 0;
            let mut yielded_any = false;
            'attempts: loop {
                if cancel.is_cancelled() {
                    yield Err(TransportError::Cancelled);
                    return;
                }
                let sent = transport
                    .send_with_auth(|c| {
                        c.post(&url)
                            .header(ACCEPT, "text/event-stream")
                            .json(&input)
                    })
                    .await;
                let resp = match sent {
                    Ok(resp) => resp,
                    Err(error) => {
                        if attempt < options.retry_attempts {
                            attempt += 1;
                            debug!(attempt, %error, "run request failed; retrying");
                            sleep(options.retry_backoff * attempt).await;
                            continue 'attempts;
                        }
                        yield Err(error);
                        return;
                    }
                };

                enum Next {
                    Cancelled,
                    Timeout,
                    Item(Option<Result<Bytes, reqwest::Error>>),
                }

                let mut decoder = SseDecoder::new();
                let mut body = resp.bytes_stream();
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Next::Cancelled,
                        item = timeout(options.idle_timeout, body.next()) => match item {
                            Ok(item) => Next::Item(item),
                            Err(_elapsed) => Next::Timeout,
                        },
                    };
                    match next {
                        Next::Cancelled => {
                            yield Err(TransportError::Cancelled);
                            return;
                        }
                        Next::Timeout => {
                            if !yielded_any && attempt < options.retry_attempts {
                                attempt += 1;
                                debug!(attempt, "idle timeout before first event; retrying");
                                sleep(options.retry_backoff * attempt).await;
                                continue 'attempts;
                            }
                            yield Err(TransportError::IdleTimeout(options.idle_timeout));
                            return;
                        }
                        Next::Item(Some(Ok(chunk))) => {
                            for event in decoder.push(&chunk) {
                                yielded_any = true;
                                yield Ok(event);
                            }
                        }
                        Next::Item(Some(Err(error))) => {
                            if !yielded_any && attempt < options.retry_attempts {
                                attempt += 1;
                                warn!(attempt, %error, "stream failed before first event; retrying");
                                sleep(options.retry_backoff * attempt).await;
                                continue 'attempts;
                            }
                            yield Err(TransportError::Request(error.to_string()));
                            return;
                        }
                        Next::Item(None) => {
                            for event in decoder.finish() {
                                yield Ok(event);
                            }
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Send a request, refreshing credentials once on 401.
    ///
    /// Concurrent 401s share one refresh: the generation counter tells a
    /// waiter whether another caller already swapped the credentials in.
    async fn send_with_auth<F>(&self, build: F) -> Result<reqwest::Response, TransportError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let (client, generation) = self.current_client();
        let resp = build(&client).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp).await;
        }

        self.refresh_credentials(generation).await?;
        let (client, _) = self.current_client();
        let resp = build(&client).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(TransportError::AuthFailed);
        }
        check_status(resp).await
    }

    fn current_client(&self) -> (reqwest::Client, u64) {
        let state = self.inner.http.read().unwrap_or_else(|e| e.into_inner());
        (state.client.clone(), state.generation)
    }

    /// Single-flight refresh: the gate serializes refreshers, and the
    /// generation check turns every follower into a no-op.
    async fn refresh_credentials(&self, observed: u64) -> Result<(), TransportError> {
        let _gate = self.inner.refresh_gate.lock().await;
        {
            let state = self.inner.http.read().unwrap_or_else(|e| e.into_inner());
            if state.generation != observed {
                debug!("credentials already refreshed by a concurrent request");
                return Ok(());
            }
        }

        let headers = self
            .inner
            .token_provider
            .refresh()
            .await
            .map_err(|e| TransportError::RefreshFailed(e.to_string()))?;
        let client = build_client(&headers)?;
        let mut state = self.inner.http.write().unwrap_or_else(|e| e.into_inner());
        state.client = client;
        state.generation += 1;
        debug!(generation = state.generation, "credentials refreshed");
        Ok(())
    }
}

fn build_client(headers: &AuthHeaders) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .default_headers(headers.header_map()?)
        .build()
        .map_err(|e| TransportError::Config(e.to_string()))
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}
