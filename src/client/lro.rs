//! Long-running-operation polling state machine (§4.M).

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::error::ClientError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const MAX_POLLS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LroState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

/// The initial `202 Accepted` response handed back by a create/update call.
#[derive(Debug, Clone)]
pub struct LroHandle {
    pub operation_url: String,
    pub retry_after: Duration,
}

impl LroHandle {
    pub fn from_headers(location: Option<String>, operation_id: Option<String>, retry_after_secs: Option<u64>) -> Option<Self> {
        let operation_url = location.or(operation_id)?;
        Some(Self {
            operation_url,
            retry_after: Duration::from_secs(retry_after_secs.unwrap_or(30)),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(rename = "percentComplete", default)]
    percent_complete: Option<u32>,
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: String,
}

/// Polls `operation_url` until it reports `Succeeded`/`Failed`, or the poll
/// budget/cancellation token fires. `fetch_status` performs one GET and
/// returns the parsed body plus an optional `Location` header (present once
/// the operation succeeds, pointing at the result resource).
pub async fn poll_until_complete<F, Fut>(
    handle: &LroHandle,
    token: &CancellationToken,
    mut fetch_status: F,
) -> Result<Value, ClientError>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<(Value, Option<String>), ClientError>>,
{
    let mut interval = if handle.retry_after.is_zero() {
        DEFAULT_POLL_INTERVAL
    } else {
        handle.retry_after
    };
    let mut last_progress = 0u32;

    for attempt in 0..MAX_POLLS {
        token
            .sleep_cancellable(interval, "waiting for operation")
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let (body, location) = match fetch_status(handle.operation_url.clone()).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(attempt, error = %err, "operation polling request failed, retrying");
                continue;
            }
        };

        let status: OperationStatus = serde_json::from_value(body.clone())
            .map_err(|e| ClientError::OperationFailed(format!("malformed operation status: {e}")))?;

        if let Some(percent) = status.percent_complete {
            if percent > last_progress {
                debug!(percent, "operation progress");
                last_progress = percent;
            }
        }
        info!(status = %status.status, attempt, "polled operation status");

        match status.status.as_str() {
            "Succeeded" => {
                if let Some(result_url) = location {
                    return Ok(serde_json::json!({ "_result_url": result_url }));
                }
                return Ok(body);
            }
            "Failed" => {
                let message = status
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "unknown error".to_string());
                return Err(ClientError::OperationFailed(message));
            }
            _ => {
                // Pending/Running: keep polling at the same interval.
                interval = interval.max(Duration::from_secs(1));
            }
        }
    }

    Err(ClientError::OperationTimedOut(MAX_POLLS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationTokenSource;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_first_succeeded_status() {
        let handle = LroHandle {
            operation_url: "https://example/op/1".to_string(),
            retry_after: Duration::from_millis(1),
        };
        let token = CancellationTokenSource::new().token();

        let result = poll_until_complete(&handle, &token, |_url| async {
            Ok((serde_json::json!({ "status": "Succeeded", "percentComplete": 100 }), None))
        })
        .await
        .unwrap();

        assert_eq!(result["status"], "Succeeded");
    }

    #[tokio::test]
    async fn propagates_failed_status_as_operation_failed() {
        let handle = LroHandle {
            operation_url: "https://example/op/1".to_string(),
            retry_after: Duration::from_millis(1),
        };
        let token = CancellationTokenSource::new().token();

        let result = poll_until_complete(&handle, &token, |_url| async {
            Ok((
                serde_json::json!({ "status": "Failed", "error": { "message": "bad input" } }),
                None,
            ))
        })
        .await;

        match result {
            Err(ClientError::OperationFailed(msg)) => assert_eq!(msg, "bad input"),
            other => panic!("expected OperationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transitions_through_running_before_succeeding() {
        let handle = LroHandle {
            operation_url: "https://example/op/1".to_string(),
            retry_after: Duration::from_millis(1),
        };
        let token = CancellationTokenSource::new().token();
        let calls = AtomicU32::new(0);

        let result = poll_until_complete(&handle, &token, |_url| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Ok((serde_json::json!({ "status": "Running", "percentComplete": 50 }), None))
                } else {
                    Ok((serde_json::json!({ "status": "Succeeded", "percentComplete": 100 }), None))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result["status"], "Succeeded");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
