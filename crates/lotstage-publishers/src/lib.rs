//! Concrete job handlers for publishing staged vehicle projects.
//!
//! Two job kinds exist today: `website_publish` (push a project to the
//! dealer's website CMS) and `social_publish` (post it to social platforms).
//! The network adapters are stubs pending the real CMS/social integrations;
//! the payload contracts and credential shapes are final.

pub mod social;
pub mod website;

pub use social::{SocialPublish, SocialPublishPayload};
pub use website::{WebsiteCredentials, WebsitePublish, WebsitePublishPayload};

use lotstage_jobs::EnqueueRequest;
use serde_json::json;

/// Job kind handled by [`WebsitePublish`].
pub const WEBSITE_PUBLISH: &str = "website_publish";
/// Job kind handled by [`SocialPublish`].
pub const SOCIAL_PUBLISH: &str = "social_publish";

/// The batch of jobs a "publish this project" action enqueues.
///
/// The caller passes the whole batch to `JobQueue::enqueue_batch` so a
/// partial store failure surfaces as one error.
pub fn publish_requests(
    project_id: &str,
    website: bool,
    social: bool,
    social_platforms: &[String],
) -> Vec<EnqueueRequest> {
    let mut requests = Vec::new();
    if website {
        requests.push(EnqueueRequest::new(
            WEBSITE_PUBLISH,
            json!({ "projectId": project_id }),
        ));
    }
    if social {
        requests.push(EnqueueRequest::new(
            SOCIAL_PUBLISH,
            json!({ "projectId": project_id, "platforms": social_platforms }),
        ));
    }
    requests
}
