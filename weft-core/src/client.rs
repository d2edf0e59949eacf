//! HTTP client for the control-plane REST API
//!
//! Covers the snapshot fetch consumed once per conversation open and the
//! outbound operator actions. Actions are fire-and-forget from the
//! reconciliation engine's perspective: a 2xx here does not mutate any local
//! state. The pending registries change only when the corresponding push
//! event arrives.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{PendingApproval, PendingInteraction, TimelineItem};

/// Response from GET /threads/{thread_id}/snapshot
///
/// A point-in-time view of the conversation: the persisted timeline plus the
/// currently pending operator actions. Used as the initial merge input and
/// initial registry population.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSnapshot {
    /// Ordered timeline items
    #[serde(default)]
    pub items: Vec<TimelineItem>,
    /// Approvals awaiting a decision at snapshot time
    #[serde(default)]
    pub pending_approvals: Vec<PendingApproval>,
    /// Interactions awaiting an answer at snapshot time
    #[serde(default)]
    pub pending_interactions: Vec<PendingInteraction>,
}

/// Operator decision on a pending approval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Deny,
}

impl ApprovalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Deny => "deny",
        }
    }
}

/// HTTP client for the control-plane API
pub struct ControlPlaneClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ControlPlaneClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Add authorization header
        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the point-in-time snapshot for a thread.
    ///
    /// Failure here is fatal for the conversation view: there is no retry,
    /// the caller surfaces the error and the operator re-opens the thread.
    pub async fn fetch_snapshot(&self, thread_id: &str) -> Result<ThreadSnapshot> {
        let url = format!(
            "{}/threads/{}/snapshot",
            self.base_url,
            urlencoding::encode(thread_id)
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Api(format!("snapshot request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let snapshot: ThreadSnapshot = response
                .json()
                .await
                .map_err(|e| Error::Api(format!("failed to parse snapshot: {}", e)))?;
            tracing::debug!(
                thread_id = %thread_id,
                items = snapshot.items.len(),
                approvals = snapshot.pending_approvals.len(),
                interactions = snapshot.pending_interactions.len(),
                "Fetched thread snapshot"
            );
            Ok(snapshot)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Submit a decision for a pending approval.
    ///
    /// The approval leaves the registry only via the subsequent
    /// `approval/decision` push event, never from this response.
    pub async fn submit_approval(
        &self,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<()> {
        let url = format!(
            "{}/approvals/{}/decision",
            self.base_url,
            urlencoding::encode(approval_id)
        );

        let request = DecisionRequest {
            decision: decision.as_str(),
        };

        self.post_action(&url, &request).await
    }

    /// Submit an answer for a pending interaction.
    pub async fn submit_interaction_reply(&self, interaction_id: &str, answer: &str) -> Result<()> {
        let url = format!(
            "{}/interactions/{}/reply",
            self.base_url,
            urlencoding::encode(interaction_id)
        );

        let request = ReplyRequest { answer };

        self.post_action(&url, &request).await
    }

    async fn post_action<B: Serialize>(&self, url: &str, body: &B) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }
}

/// Request body for POST /approvals/{id}/decision
#[derive(Serialize)]
struct DecisionRequest<'a> {
    decision: &'a str,
}

/// Request body for POST /interactions/{id}/reply
#[derive(Serialize)]
struct ReplyRequest<'a> {
    answer: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_valid_config() {
        let config = ServerConfig {
            base_url: "".to_string(),
            ..Default::default()
        };
        assert!(ControlPlaneClient::new(&config).is_err());
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let config = ServerConfig {
            base_url: "http://localhost:7600/".to_string(),
            ..Default::default()
        };
        let client = ControlPlaneClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:7600");
    }

    #[test]
    fn test_snapshot_parses_with_missing_lists() {
        let snapshot: ThreadSnapshot = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(snapshot.items.is_empty());
        assert!(snapshot.pending_approvals.is_empty());
        assert!(snapshot.pending_interactions.is_empty());
    }

    #[test]
    fn test_decision_strings() {
        assert_eq!(ApprovalDecision::Approve.as_str(), "approve");
        assert_eq!(ApprovalDecision::Deny.as_str(), "deny");
    }
}
