use std::future::Future;

use anyhow::Context;

/// Runs `fut` to completion from synchronous code, whether or not the caller
/// is already inside the async runtime.
///
/// Calling `Runtime::block_on` from a thread that belongs to a live runtime
/// panics, so the two situations need different plumbing:
/// - a runtime is active: ship the future to a dedicated worker thread that
///   owns a fresh current-thread runtime, and join it;
/// - no runtime: build one inline and `block_on` directly.
///
/// Both paths return the future's output unchanged. A panicking worker
/// surfaces as an error instead of poisoning the caller.
pub fn run_blocking<F>(fut: F) -> anyhow::Result<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(_) => {
            let worker = std::thread::Builder::new()
                .name("automation-bridge".to_string())
                .spawn(move || -> anyhow::Result<F::Output> {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .context("building bridge runtime")?;
                    Ok(runtime.block_on(fut))
                })
                .context("spawning bridge worker")?;
            worker
                .join()
                .map_err(|_| anyhow::anyhow!("automation bridge worker panicked"))?
        }
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("building bridge runtime")?;
            Ok(runtime.block_on(fut))
        }
    }
}
