// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::CatalogError;
use crate::metrics;
use crate::storage::traits::StorageError;

/// Run one backend call under `limit`.
///
/// Elapsed time maps to [`CatalogError::BackendTimeout`]; adapter errors go
/// through [`CatalogError::from_storage`].
pub async fn bounded<T, Fut>(
    backend: &str,
    operation: &str,
    limit: Duration,
    fut: Fut,
) -> Result<T, CatalogError>
where
    Fut: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            if matches!(err, StorageError::Connection(_)) {
                metrics::record_connection_error(backend);
            }
            Err(CatalogError::from_storage(backend, err, limit))
        }
        Err(_) => {
            warn!(backend, operation, ?limit, "Backend call timed out");
            metrics::record_timeout(backend, operation);
            Err(CatalogError::BackendTimeout {
                operation: operation.to_string(),
                after: limit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_value_through() {
        let value = bounded("memory", "count", Duration::from_secs(1), async { Ok::<_, StorageError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded("elasticsearch", "search", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StorageError>(())
        })
        .await
        .unwrap_err();

        match err {
            CatalogError::BackendTimeout { operation, after } => {
                assert_eq!(operation, "search");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bounded_maps_adapter_error() {
        let err = bounded("sql", "fetch_all", Duration::from_secs(1), async {
            Err::<(), _>(StorageError::Connection("refused".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "BackendUnavailable");
    }
}
