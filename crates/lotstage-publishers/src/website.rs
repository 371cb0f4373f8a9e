use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lotstage_jobs::{HandlerError, Job, JobHandler};

/// Credentials for the dealer's website platform, as stored per integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum WebsiteCredentials {
    Wordpress {
        base_url: String,
        username: String,
        app_password: String,
    },
    Webflow {
        api_token: String,
        site_id: String,
        collection_id: String,
    },
    /// Nothing to push; the site pulls from the inventory feed.
    Feed,
}

/// Payload of a `website_publish` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsitePublishPayload {
    #[serde(rename = "projectId")]
    pub project_id: String,
}

/// Pushes a staged project to the dealer's website CMS.
pub struct WebsitePublish {
    creds: WebsiteCredentials,
}

impl WebsitePublish {
    pub fn new(creds: WebsiteCredentials) -> Self {
        Self { creds }
    }

    async fn push(&self, payload: &WebsitePublishPayload) -> Result<(), HandlerError> {
        match &self.creds {
            WebsiteCredentials::Wordpress { base_url, .. } => {
                // Stub: WordPress REST API push (`{base_url}/wp-json/wp/v2/vehicle`).
                tracing::info!(
                    project_id = %payload.project_id,
                    base_url = %base_url,
                    "website publish (wordpress)"
                );
                Ok(())
            }
            WebsiteCredentials::Webflow { site_id, .. } => {
                // Stub: Webflow CMS API push.
                tracing::info!(
                    project_id = %payload.project_id,
                    site_id = %site_id,
                    "website publish (webflow)"
                );
                Ok(())
            }
            WebsiteCredentials::Feed => {
                tracing::info!(project_id = %payload.project_id, "website publish (feed, no-op)");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl JobHandler for WebsitePublish {
    fn kind(&self) -> &'static str {
        crate::WEBSITE_PUBLISH
    }

    async fn run(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: WebsitePublishPayload = serde_json::from_value(job.payload.clone())?;
        self.push(&payload).await
    }
}
