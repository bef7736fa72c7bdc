//! # External Custody Settlement
//!
//! [`HttpSettlementProvider`] instructs a remote custody service to move
//! stake funds, then commits the same transition to the local
//! [`StakeLedger`]. The remote call goes first: if the service is
//! unreachable the operation fails with
//! [`StakeError::ProviderUnavailable`] and local state is untouched, so the
//! caller can queue the settlement and retry.
//!
//! Every instruction carries an idempotency key derived from the stake id
//! and operation. A `409 Conflict` reply means the service already applied
//! that key and is treated as success.
//!
//! ## Runtime
//!
//! The trait is synchronous. Calls bridge into async with
//! `block_in_place` on the ambient Tokio handle, which requires the
//! multi-threaded runtime. Without one, calls fail as unavailable rather
//! than panic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::runtime::{Handle, RuntimeFlavor};

use verdict_core::{Amount, BasisPoints, TaskId, Timestamp, UserId};

use crate::error::StakeError;
use crate::ledger::StakeLedger;
use crate::provider::{Allowance, SettlementProvider};
use crate::retry::{retry_send, RetryPolicy};
use crate::stake::{SettlementSplit, Stake, StakeRequest};

/// Connection settings for the custody service.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExternalSettlementConfig {
    /// Base URL, e.g. `https://custody.internal/v1`.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Transport retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ExternalSettlementConfig {
    /// Settings with default timeout and retry.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl std::fmt::Debug for ExternalSettlementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalSettlementConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    available: Amount,
}

/// Custody-service settlement mirrored into a local ledger.
#[derive(Debug)]
pub struct HttpSettlementProvider {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    ledger: Arc<StakeLedger>,
}

impl HttpSettlementProvider {
    /// Build the HTTP client.
    pub fn new(config: ExternalSettlementConfig, ledger: Arc<StakeLedger>) -> Result<Self, StakeError> {
        let unavailable = |reason: String| StakeError::ProviderUnavailable {
            provider: "http".into(),
            reason,
        };
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| unavailable("invalid API key characters".into()))?,
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
            ledger,
        })
    }

    fn unavailable(&self, reason: impl Into<String>) -> StakeError {
        StakeError::ProviderUnavailable {
            provider: self.provider_name().to_string(),
            reason: reason.into(),
        }
    }

    fn run<T>(&self, fut: impl Future<Output = Result<T, StakeError>>) -> Result<T, StakeError> {
        let handle = Handle::try_current()
            .map_err(|_| self.unavailable("no async runtime available for HTTP request"))?;
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(self.unavailable("HTTP settlement requires the multi-threaded runtime"));
        }
        tokio::task::block_in_place(|| handle.block_on(fut))
    }

    async fn send<F>(&self, operation: &'static str, build: F) -> Result<reqwest::Response, StakeError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let resp = retry_send(&self.retry, || build().send())
            .await
            .map_err(|e| self.unavailable(format!("{operation}: {e}")))?;
        let status = resp.status();
        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.unavailable(format!("{operation}: HTTP {status}: {body}")));
        }
        if status == StatusCode::CONFLICT {
            tracing::info!(operation, "custody service already applied instruction");
            return Ok(resp);
        }
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StakeError::ProviderRejected {
                provider: self.provider_name().to_string(),
                operation,
                reason: format!("HTTP {status}: {body}"),
            });
        }
        Ok(resp)
    }

    /// Preview a transition on the current local stake without committing.
    fn preview(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        transition: impl FnOnce(&mut Stake, Timestamp) -> Result<SettlementSplit, StakeError>,
    ) -> Result<(Stake, SettlementSplit), StakeError> {
        let mut stake = self
            .ledger
            .get_stake(task_id, worker_id)
            .ok_or(StakeError::NotFound {
                task_id: *task_id,
                worker_id: *worker_id,
            })?;
        let split = transition(&mut stake, self.ledger.now())?;
        Ok((stake, split))
    }

    fn instruct_settlement(
        &self,
        operation: &'static str,
        stake: &Stake,
        split: SettlementSplit,
        reason: &str,
    ) -> Result<(), StakeError> {
        let url = format!("{}/stakes/{}/settle", self.base_url, stake.id.as_uuid());
        let body = json!({
            "idempotency_key": format!("{}:{operation}", stake.id),
            "operation": operation,
            "task_id": stake.task_id,
            "worker_id": stake.worker_id,
            "requester_id": stake.requester_id,
            "worker_return": split.worker_return,
            "requester_share": split.requester_share,
            "platform_share": split.platform_share,
            "currency": stake.currency,
            "reason": reason,
        });
        self.run(async {
            self.send(operation, || self.client.post(&url).json(&body)).await?;
            Ok(())
        })
    }
}

impl SettlementProvider for HttpSettlementProvider {
    fn provider_name(&self) -> &str {
        "http"
    }

    fn create_stake(&self, request: &StakeRequest) -> Result<Stake, StakeError> {
        if self.ledger.get_stake(&request.task_id, &request.worker_id).is_some() {
            return Err(StakeError::AlreadyExists {
                task_id: request.task_id,
                worker_id: request.worker_id,
            });
        }
        let required = self
            .ledger
            .policy()
            .required_stake(request.bounty, request.strike_count, request.reputation);
        let url = format!("{}/stakes", self.base_url);
        let body = json!({
            "idempotency_key": format!("{}:{}:create", request.task_id, request.worker_id),
            "task_id": request.task_id,
            "worker_id": request.worker_id,
            "amount": required.amount,
            "currency": request.currency,
        });
        self.run(async {
            self.send("create_stake", || self.client.post(&url).json(&body)).await?;
            Ok(())
        })?;
        self.ledger.create_stake(request)
    }

    fn release_stake(&self, task_id: &TaskId, worker_id: &UserId, reason: &str) -> Result<Stake, StakeError> {
        let (stake, split) = self.preview(task_id, worker_id, |s, now| s.release(now))?;
        self.instruct_settlement("release", &stake, split, reason)?;
        self.ledger.release_stake(task_id, worker_id, reason)
    }

    fn slash_stake(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        let (stake, split) = self.preview(task_id, worker_id, |s, now| s.slash(requester_share, reason, now))?;
        self.instruct_settlement("slash", &stake, split, reason)?;
        self.ledger.slash_stake(task_id, worker_id, requester_share, reason)
    }

    fn partial_slash(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        worker_return: BasisPoints,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        let (stake, split) = self.preview(task_id, worker_id, |s, now| {
            s.partial_slash(worker_return, requester_share, reason, now)
        })?;
        self.instruct_settlement("partial_slash", &stake, split, reason)?;
        self.ledger
            .partial_slash(task_id, worker_id, worker_return, requester_share, reason)
    }

    fn get_stake(&self, task_id: &TaskId, worker_id: &UserId) -> Result<Option<Stake>, StakeError> {
        Ok(self.ledger.get_stake(task_id, worker_id))
    }

    fn check_allowance(&self, worker_id: &UserId, amount: Amount) -> Result<Allowance, StakeError> {
        let url = format!("{}/balances/{}", self.base_url, worker_id.as_uuid());
        let balance: BalanceResponse = self.run(async {
            let resp = self.send("check_allowance", || self.client.get(&url)).await?;
            resp.json()
                .await
                .map_err(|e| self.unavailable(format!("check_allowance: invalid response: {e}")))
        })?;
        Ok(Allowance::evaluate(balance.available, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryStrikes;
    use crate::policy::StakePolicy;
    use crate::stake::StakeStatus;
    use verdict_core::{Currency, ManualClock, SystemClock};

    fn unreachable_provider() -> (HttpSettlementProvider, Arc<StakeLedger>) {
        let ledger = Arc::new(StakeLedger::new(
            StakePolicy::default(),
            Arc::new(InMemoryStrikes::new()),
            Arc::new(SystemClock),
        ));
        let mut config = ExternalSettlementConfig::new("http://127.0.0.1:1/", "secret-token");
        config.timeout_secs = 1;
        config.retry = RetryPolicy::none();
        (HttpSettlementProvider::new(config, ledger.clone()).unwrap(), ledger)
    }

    fn request() -> StakeRequest {
        StakeRequest {
            task_id: TaskId::new(),
            worker_id: UserId::new(),
            requester_id: UserId::new(),
            bounty: Amount::from_major(100),
            strike_count: 0,
            reputation: 50,
            currency: Currency::default(),
        }
    }

    #[test]
    fn config_debug_redacts_api_key() {
        let config = ExternalSettlementConfig::new("https://custody.example", "secret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unreachable_service_leaves_ledger_untouched() {
        let (provider, ledger) = unreachable_provider();
        let req = request();

        let err = provider.create_stake(&req).unwrap_err();
        assert!(matches!(err, StakeError::ProviderUnavailable { .. }));
        assert!(ledger.get_stake(&req.task_id, &req.worker_id).is_none());

        ledger.create_stake(&req).unwrap();
        let err = provider
            .release_stake(&req.task_id, &req.worker_id, "approved")
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            ledger.get_stake(&req.task_id, &req.worker_id).unwrap().status,
            StakeStatus::Held
        );
        assert_eq!(ledger.entries_for_task(&req.task_id).len(), 1);
    }

    #[tokio::test]
    async fn current_thread_runtime_is_reported_unavailable() {
        let (provider, _) = unreachable_provider();
        let err = provider
            .check_allowance(&UserId::new(), Amount::from_major(1))
            .unwrap_err();
        assert!(matches!(err, StakeError::ProviderUnavailable { .. }));
    }

    #[test]
    fn no_runtime_is_reported_unavailable() {
        let (provider, _) = unreachable_provider();
        let err = provider.create_stake(&request()).unwrap_err();
        assert!(matches!(err, StakeError::ProviderUnavailable { .. }));
    }

    #[test]
    fn preview_stamps_with_the_ledger_clock() {
        let at = Timestamp::parse("2026-03-01T12:00:00Z").unwrap();
        let ledger = Arc::new(StakeLedger::new(
            StakePolicy::default(),
            Arc::new(InMemoryStrikes::new()),
            Arc::new(ManualClock::new(at)),
        ));
        let config = ExternalSettlementConfig::new("http://127.0.0.1:1/", "secret-token");
        let provider = HttpSettlementProvider::new(config, ledger.clone()).unwrap();
        let req = request();
        ledger.create_stake(&req).unwrap();

        let (stake, split) = provider
            .preview(&req.task_id, &req.worker_id, |stake, now| stake.release(now))
            .unwrap();
        assert_eq!(stake.settled_at, Some(at));
        assert_eq!(split.worker_return, stake.amount);
        assert_eq!(
            ledger.get_stake(&req.task_id, &req.worker_id).unwrap().status,
            StakeStatus::Held
        );
    }

    #[test]
    fn local_guards_run_before_any_request() {
        let (provider, ledger) = unreachable_provider();
        let req = request();
        ledger.create_stake(&req).unwrap();
        ledger.release_stake(&req.task_id, &req.worker_id, "done").unwrap();
        // Terminal locally: rejected without touching the network or runtime.
        let err = provider
            .slash_stake(&req.task_id, &req.worker_id, BasisPoints::FULL, "late")
            .unwrap_err();
        assert!(matches!(err, StakeError::InvalidStatus { .. }));
    }
}
