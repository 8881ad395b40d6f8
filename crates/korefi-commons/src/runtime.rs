//! Blocking bridge for the AWS backends (feature = "aws")
//!
//! Each backend owns a current-thread runtime. `Runtime::block_on` panics when
//! the calling thread is already inside a tokio runtime, so in that case the
//! future is driven on a scoped helper thread instead.

use std::future::Future;
use tokio::runtime::{Handle, Runtime};

/// Build the private runtime a backend drives its SDK calls on
pub(crate) fn backend_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Drive `future` to completion on `runtime` from any calling context.
///
/// Returns `Err` with a description if the helper thread panicked.
pub(crate) fn block_on<F>(runtime: &Runtime, future: F) -> Result<F::Output, String>
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_err() {
        return Ok(runtime.block_on(future));
    }

    std::thread::scope(|scope| {
        scope
            .spawn(|| runtime.block_on(future))
            .join()
            .map_err(|panic| {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                format!("backend call panicked: {detail}")
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_outside_runtime() {
        let runtime = backend_runtime().unwrap();
        assert_eq!(block_on(&runtime, async { 7 }).unwrap(), 7);
    }

    #[test]
    fn test_block_on_inside_another_runtime() {
        let outer = backend_runtime().unwrap();
        let inner = backend_runtime().unwrap();

        let value = outer.block_on(async { block_on(&inner, async { 7 }) });
        assert_eq!(value.unwrap(), 7);
    }
}
