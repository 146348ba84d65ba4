use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use rota_model::TaskDescriptor;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

/// Work executed by a run once this instance is allowed to proceed.
///
/// A returned error is logged and ends the run; a panic is caught at the run
/// boundary. Neither affects later triggers.
///
/// The run only logs the panic message. Call
/// `rota_observe::install_panic_hook()` at startup to also log the panic's
/// location and backtrace.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, task: Arc<TaskDescriptor>) -> HandlerResult;
}

pub type HandlerRef = Arc<dyn Handler>;

/// Adapter turning an async closure into a [`Handler`].
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Arc<TaskDescriptor>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, task: Arc<TaskDescriptor>) -> HandlerResult {
        (self.f)(task).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerRef
where
    F: Fn(Arc<TaskDescriptor>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(HandlerFn { f })
}
