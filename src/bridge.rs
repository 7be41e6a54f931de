//! # Context Bridge
//! Connects the engine to the surrounding runtime: the per-tab job context
//! from the keyed store, and the Autofill Data Service that resolves a
//! (job, profile) pair into an answer map. Absence of a job context is not
//! an error — the engine idles and keeps scanning for diagnostics.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

use crate::answers::{AnswerMap, AutofillAnswers};

const STATE_PATH: &str = "state/job_context.json";
const ENV_STATE_PATH: &str = "AUTOFILL_STATE_PATH";
const ENV_API_TOKEN: &str = "AUTOFILL_API_TOKEN";
const TOKEN_PATH: &str = "state/auth.json";

/// Which job/profile pair applies to the current tab. Immutable for the
/// tab's lifetime; read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    pub job_id: String,
    pub profile_id: String,
}

fn state_path() -> PathBuf {
    std::env::var(ENV_STATE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(STATE_PATH))
}

/// Read the stored job context for this tab, if any. Tolerant: a missing
/// or unreadable file is simply "no context".
pub async fn read_job_context() -> Option<JobContext> {
    match fs::read_to_string(state_path()).await {
        Ok(s) => serde_json::from_str(&s).ok(),
        Err(_) => None,
    }
}

pub async fn write_job_context(ctx: &JobContext) -> Result<()> {
    let path = state_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await.context("state dir")?;
    }
    fs::write(&path, serde_json::to_vec_pretty(ctx)?)
        .await
        .with_context(|| format!("write job context to {}", path.display()))
}

#[derive(Debug, Deserialize)]
struct StoredToken {
    token: String,
}

/// Bearer token for the data service: env first, then local storage.
pub async fn read_token() -> Option<String> {
    if let Ok(t) = std::env::var(ENV_API_TOKEN) {
        if !t.trim().is_empty() {
            return Some(t);
        }
    }
    let raw = fs::read_to_string(TOKEN_PATH).await.ok()?;
    serde_json::from_str::<StoredToken>(&raw)
        .ok()
        .map(|s| s.token)
}

// --- tolerant variants of the data-service response ---

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    autofill_answers: AutofillAnswers,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<EnvelopeData>,
    // Some deployments return the answers unwrapped.
    #[serde(default)]
    autofill_answers: Option<AutofillAnswers>,
    #[serde(default)]
    error: Option<String>,
}

fn parse_envelope(body: &str) -> Result<AnswerMap> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        anyhow::bail!("data service returned empty/null body");
    }
    let env: Envelope = serde_json::from_str(trimmed)
        .with_context(|| "parse data-service JSON failed".to_string())?;

    if env.success == Some(false) {
        anyhow::bail!(
            "data service error: {}",
            env.error.unwrap_or_else(|| "unspecified".into())
        );
    }
    let answers = env
        .data
        .map(|d| d.autofill_answers)
        .or(env.autofill_answers)
        .ok_or_else(|| anyhow!("response carries no autofill_answers"))?;
    Ok(answers.into())
}

/// Seam for the external Autofill Data Service.
#[async_trait::async_trait]
pub trait AnswerService: Send + Sync {
    async fn fetch_answers(&self, ctx: &JobContext, token: &str) -> Result<AnswerMap>;
    fn name(&self) -> &'static str;
}

/// HTTP client for the data service, relayed through the backend API.
#[derive(Clone)]
pub struct HttpAnswerService {
    endpoint: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl HttpAnswerService {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest<'a> {
    job_id: &'a str,
    profile_id: &'a str,
    token: &'a str,
}

#[async_trait::async_trait]
impl AnswerService for HttpAnswerService {
    async fn fetch_answers(&self, ctx: &JobContext, token: &str) -> Result<AnswerMap> {
        let payload = FetchRequest {
            job_id: &ctx.job_id,
            profile_id: &ctx.profile_id,
            token,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.endpoint)
                .bearer_auth(token)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("data service HTTP error: {e}"));
                    }
                    let body = rsp.text().await.context("read data-service body")?;
                    return parse_envelope(&body);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("data service request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Startup path: read the tab's context, then fetch its answer map.
/// Every failure mode degrades to `None` — the engine idles but keeps
/// scanning; the user can trigger manually or reload.
pub async fn load_answers(service: &dyn AnswerService) -> Option<AnswerMap> {
    let ctx = match read_job_context().await {
        Some(ctx) => ctx,
        None => {
            tracing::info!("no job context for this tab; engine idle");
            return None;
        }
    };

    let token = match read_token().await {
        Some(t) => t,
        None => {
            tracing::warn!("missing auth token; cannot reach the data service");
            counter!("autofill_bridge_errors_total").increment(1);
            return None;
        }
    };

    match service.fetch_answers(&ctx, &token).await {
        Ok(map) => {
            tracing::info!(provider = service.name(), answers = map.len(), "answer map loaded");
            Some(map)
        }
        Err(e) => {
            tracing::warn!(error = ?e, provider = service.name(), "answer fetch failed");
            counter!("autofill_bridge_errors_total").increment(1);
            None
        }
    }
}
