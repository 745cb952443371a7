//! Serial and parallel scheduling of host units

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::unit::{UnitContext, run_unit};
use crate::summary::HostResult;

/// Run hosts one after another, results in input order
pub(crate) async fn run_serial(ctx: Arc<UnitContext>, hosts: Vec<String>) -> Vec<HostResult> {
    let mut results = Vec::with_capacity(hosts.len());

    for host in hosts {
        info!(host = %host, "executing on host");
        let result = run_unit(Arc::clone(&ctx), host).await;
        log_result(&result);
        results.push(result);
    }

    results
}

/// Run hosts on a bounded pool, results in completion order
pub(crate) async fn run_parallel(
    ctx: Arc<UnitContext>,
    hosts: Vec<String>,
    max_parallel: usize,
) -> Vec<HostResult> {
    let workers = pool_size(hosts.len(), max_parallel);
    let semaphore = Arc::new(Semaphore::new(workers));
    info!(hosts = hosts.len(), workers, "starting parallel execution");

    let mut pending: FuturesUnordered<_> = hosts
        .into_iter()
        .map(|host| {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            let task_host = host.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return HostResult::failed(
                            task_host,
                            format!("Executor error: semaphore acquisition failed: {e}"),
                        );
                    }
                };
                run_unit(ctx, task_host).await
            });

            async move { (host, handle.await) }
        })
        .collect();

    let mut results = Vec::with_capacity(pending.len());
    while let Some((host, joined)) = pending.next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                error!(host = %host, error = %e, "host task failed");
                HostResult::failed(host, format!("Executor error: {e}"))
            }
        };
        log_result(&result);
        results.push(result);
    }

    results
}

/// Workers for `hosts` under a cap of `max_parallel` (at least one)
pub(crate) fn pool_size(hosts: usize, max_parallel: usize) -> usize {
    hosts.min(max_parallel.max(1))
}

fn log_result(result: &HostResult) {
    if result.success {
        info!(host = %result.hostname, "host completed successfully");
    } else {
        warn!(
            host = %result.hostname,
            error = result.error.as_deref().unwrap_or("non-zero exit status"),
            "host failed"
        );
    }
}
