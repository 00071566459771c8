use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use super::{BackendError, ChatMessage, CompletionBackend, FragmentStream};

/// Called with each fragment as it arrives, before reassembly.
pub type FragmentObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Wraps a backend and reports every fragment to an observer, leaving the
/// stream itself unchanged. Used for progress display; the fragments may
/// still contain a reasoning trace.
pub struct ObservedBackend {
    inner: Arc<dyn CompletionBackend>,
    observer: FragmentObserver,
}

impl ObservedBackend {
    pub fn new(inner: Arc<dyn CompletionBackend>, observer: FragmentObserver) -> Self {
        Self { inner, observer }
    }
}

#[async_trait]
impl CompletionBackend for ObservedBackend {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<FragmentStream, BackendError> {
        let observer = self.observer.clone();
        let fragments = self.inner.complete(model, messages).await?;
        Ok(fragments
            .inspect(move |item| {
                if let Ok(fragment) = item {
                    observer(fragment);
                }
            })
            .boxed())
    }
}
