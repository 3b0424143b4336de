use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, PipeRequest, PipeResponse};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};

const RUN_PATH: &str = "/v1/pipes/run";
const PIPES_PATH: &str = "/v1/pipes";

/// HTTP client for the chat and label pipes.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct LangbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    /// Create a new Langbase client
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Run a pipe over `request.messages`.
    ///
    /// Rate limits, 5xx responses, timeouts and transport errors are retried
    /// with exponential backoff; once attempts run out the last failure is
    /// reported as [`LangbaseError::Unavailable`]. Other errors return at once.
    pub async fn call_pipe(&self, request: PipeRequest) -> LangbaseResult<PipeResponse> {
        let max_retries = self.request_config.max_retries;
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    pipe = %request.name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying pipe run"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            debug!(pipe = %request.name, turns = request.messages.len(), attempt, "Running pipe");

            match self.post::<_, PipeResponse>(RUN_PATH, &request).await {
                Ok(response) => {
                    info!(
                        pipe = %request.name,
                        turns = request.messages.len(),
                        completion_chars = response.completion.chars().count(),
                        total_tokens = ?response.total_tokens(),
                        latency_ms = start.elapsed().as_millis(),
                        "Pipe run succeeded"
                    );
                    return Ok(response);
                }
                Err(e) if is_retryable(&e) => {
                    warn!(
                        pipe = %request.name,
                        attempt,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        "Pipe run failed, will retry if attempts remain"
                    );
                    last_error = e.to_string();
                }
                Err(e) => {
                    warn!(pipe = %request.name, attempt, error = %e, "Pipe run rejected");
                    return Err(e);
                }
            }
        }

        Err(LangbaseError::Unavailable {
            message: last_error,
            retries: max_retries + 1,
        })
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create or update a pipe definition. Not retried.
    pub async fn create_pipe(
        &self,
        request: CreatePipeRequest,
    ) -> LangbaseResult<CreatePipeResponse> {
        info!(
            pipe = %request.name,
            model = ?request.model,
            upsert = ?request.upsert,
            "Creating pipe"
        );
        self.post(PIPES_PATH, &request).await
    }

    /// Make sure a pipe exists; "already exists" (409) counts as success.
    pub async fn ensure_pipe(&self, request: CreatePipeRequest) -> LangbaseResult<()> {
        let pipe_name = request.name.clone();

        match self.create_pipe(request).await {
            Ok(created) => {
                info!(pipe = %pipe_name, status = ?created.status, "Pipe ready");
                Ok(())
            }
            Err(LangbaseError::Api { status: 409, .. }) => {
                info!(pipe = %pipe_name, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.request_config.retry_delay_ms.saturating_mul(factor))
    }

    /// One authenticated JSON POST; non-2xx statuses become [`LangbaseError::Api`].
    async fn post<B, R>(&self, path: &str, body: &B) -> LangbaseResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LangbaseError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LangbaseError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| LangbaseError::InvalidResponse {
                message: format!("Failed to parse {} response: {}", path, e),
            })
    }
}

fn is_retryable(err: &LangbaseError) -> bool {
    match err {
        LangbaseError::Api { status, .. } => *status == 429 || *status >= 500,
        LangbaseError::InvalidResponse { .. } => false,
        _ => true,
    }
}
