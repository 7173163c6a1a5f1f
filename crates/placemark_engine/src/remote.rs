use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::{Category, JobStatus, Message, RemoteError, RemoteFailureKind};

/// Connection settings for the production remote capability.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound on simultaneously in-flight requests.
    pub max_concurrent_requests: usize,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.placemark.example".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_concurrent_requests: 3,
        }
    }
}

/// The one external capability the engine consumes. Transport, auth, and
/// error encoding are the implementor's concern.
#[async_trait::async_trait]
pub trait RemoteCapability: Send + Sync {
    /// Fetch one fresh status message for a category.
    async fn fetch_message(&self, category: Category) -> Result<Message, RemoteError>;

    /// Fetch the current status of a job by id.
    async fn fetch_job_status(&self, job_id: &str) -> Result<JobStatus, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    text: String,
}

/// HTTP-backed remote capability.
pub struct ReqwestRemote {
    settings: RemoteSettings,
    client: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl ReqwestRemote {
    pub fn new(settings: RemoteSettings) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RemoteError::new(RemoteFailureKind::Network, err.to_string()))?;
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_requests));
        Ok(Self {
            settings,
            client,
            permits,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: String) -> Result<T, RemoteError> {
        // Closed semaphores are never exposed here, acquire cannot fail.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| RemoteError::new(RemoteFailureKind::Network, err.to_string()))?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::new(
                RemoteFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                RemoteError::new(RemoteFailureKind::Decode, err.to_string())
            } else {
                map_reqwest_error(err)
            }
        })
    }
}

#[async_trait::async_trait]
impl RemoteCapability for ReqwestRemote {
    async fn fetch_message(&self, category: Category) -> Result<Message, RemoteError> {
        let url = format!(
            "{}/status-messages/{}",
            self.settings.base_url.trim_end_matches('/'),
            category.as_str()
        );
        let body: MessageBody = self.get_json(url).await?;
        if body.text.trim().is_empty() {
            return Err(RemoteError::new(
                RemoteFailureKind::Decode,
                "empty message text",
            ));
        }
        Ok(Message::new(body.text, category, Instant::now()))
    }

    async fn fetch_job_status(&self, job_id: &str) -> Result<JobStatus, RemoteError> {
        let url = format!(
            "{}/jobs/{}",
            self.settings.base_url.trim_end_matches('/'),
            job_id
        );
        self.get_json(url).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::new(RemoteFailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return RemoteError::new(RemoteFailureKind::InvalidUrl, err.to_string());
    }
    RemoteError::new(RemoteFailureKind::Network, err.to_string())
}
