//! Deadlines on database calls.

use crate::error::{GatewayError, GatewayResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Run a driver future under a deadline, mapping driver errors and expiry.
pub(crate) async fn with_deadline<T, F>(
    operation: &str,
    deadline: Duration,
    future: F,
) -> GatewayResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(deadline, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(GatewayError::from(e)),
        Err(_) => Err(GatewayError::timeout(operation, deadline)),
    }
}
