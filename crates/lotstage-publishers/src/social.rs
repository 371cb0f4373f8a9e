use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lotstage_jobs::{HandlerError, Job, JobHandler};

/// Payload of a `social_publish` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPublishPayload {
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Posts a staged project to the dealer's social accounts.
#[derive(Debug, Default)]
pub struct SocialPublish;

impl SocialPublish {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for SocialPublish {
    fn kind(&self) -> &'static str {
        crate::SOCIAL_PUBLISH
    }

    async fn run(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: SocialPublishPayload = serde_json::from_value(job.payload.clone())?;
        // Stub: FB/IG/LinkedIn/X posting adapters go here.
        tracing::info!(
            project_id = %payload.project_id,
            platforms = ?payload.platforms,
            "social publish"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn publishes_with_platform_list() {
        let handler = SocialPublish::new();
        let job = Job::new(
            "dealer-1",
            crate::SOCIAL_PUBLISH,
            json!({"projectId": "p1", "platforms": ["facebook", "instagram"]}),
            Utc::now(),
        );
        assert!(handler.run(&job).await.is_ok());
    }

    #[tokio::test]
    async fn platforms_and_caption_are_optional() {
        let handler = SocialPublish::new();
        let job = Job::new(
            "dealer-1",
            crate::SOCIAL_PUBLISH,
            json!({"projectId": "p1"}),
            Utc::now(),
        );
        assert!(handler.run(&job).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_payload_without_project() {
        let handler = SocialPublish::new();
        let job = Job::new("dealer-1", crate::SOCIAL_PUBLISH, json!({}), Utc::now());
        assert!(handler.run(&job).await.is_err());
    }
}
