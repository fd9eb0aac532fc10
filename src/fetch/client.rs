//! Client abstraction so dataset fetches can be stubbed in tests.

use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes one HTTP request. [`super::BasicClient`] is the production
/// implementation.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
