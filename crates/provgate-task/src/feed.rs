//! Remote timeline feed logging.
//!
//! Appends evaluation messages to the hosting pipeline's timeline record
//! feed. The feed is best-effort by contract: the debug-gate logger swallows
//! whatever this sink returns, so a broken feed never fails an evaluation.

use crate::properties::TaskProperties;
use async_trait::async_trait;
use chrono::Utc;
use provgate_core::LogSink;
use serde_json::json;
use tracing::debug;

const FEED_API_VERSION: &str = "4.1";

/// Log sink posting messages to the plan's timeline record feed.
pub struct TimelineFeedLogger {
    http_client: reqwest::Client,
    auth_token: String,
    feed_url: String,
}

impl TimelineFeedLogger {
    /// Build a feed logger for the plan addressed by the task properties.
    pub fn new(properties: &TaskProperties) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent("provgate-task/0.1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        TimelineFeedLogger {
            http_client,
            auth_token: properties.auth_token.clone(),
            feed_url: feed_url(properties),
        }
    }

    /// The resolved feed endpoint.
    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }
}

#[async_trait]
impl LogSink for TimelineFeedLogger {
    async fn append(&self, message: &str) -> anyhow::Result<()> {
        let body = json!({
            "value": [format!("{} {}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"), message)],
            "count": 1,
        });

        let response = self
            .http_client
            .post(&self.feed_url)
            .bearer_auth(&self.auth_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("timeline feed returned {status}");
        }

        debug!(url = %self.feed_url, "Appended message to timeline feed");
        Ok(())
    }
}

fn feed_url(properties: &TaskProperties) -> String {
    let base = properties.plan_url.trim_end_matches('/');
    let project = properties
        .project_id
        .map(|id| id.to_string())
        .unwrap_or_default();

    format!(
        "{base}/{project}/_apis/distributedtask/hubs/{hub}/plans/{plan}/timelines/{timeline}/records/{job}/feed?api-version={version}",
        hub = properties.hub_name,
        plan = properties.plan_id,
        timeline = properties.timeline_id,
        job = properties.job_id,
        version = FEED_API_VERSION,
    )
}
