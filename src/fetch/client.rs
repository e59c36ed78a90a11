use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport used by every call to the analytics service. Wrappers such as
/// [`super::auth::ApiKey`] decorate a request and delegate to an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
