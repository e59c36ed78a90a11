mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use crate::error::{PipelineError, Result};
use tracing::debug;

/// Sends `req` and returns the body text of a successful response.
///
/// Non-2xx statuses become [`PipelineError::Status`] carrying whatever body
/// the service sent back.
pub async fn fetch_text<C: HttpClient + ?Sized>(
    client: &C,
    endpoint: &'static str,
    req: reqwest::Request,
) -> Result<String> {
    let started = std::time::Instant::now();
    let resp = client.execute(req).await?;
    let status = resp.status();

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PipelineError::Status {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }

    let body = resp.text().await?;
    debug!(
        endpoint,
        status = status.as_u16(),
        bytes = body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Response received"
    );
    Ok(body)
}
