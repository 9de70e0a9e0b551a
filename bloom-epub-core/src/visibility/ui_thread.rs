//! Adapter for renderers that must stay on the thread that created them

use super::{RenderedPage, VisibilityOracle};
use crate::error::VisibilityError;
use tokio::sync::{mpsc, oneshot};

struct Request {
    markup: String,
    reply: oneshot::Sender<Result<RenderedPage, VisibilityError>>,
}

/// Marshals render requests onto a dedicated thread that owns the real renderer.
///
/// The renderer is built on that thread by the `make` closure and never leaves it,
/// so it does not have to be `Send`. `render` blocks the caller until the reply
/// arrives and must not be called from inside an async task; staging calls it
/// from `spawn_blocking`.
pub struct UiThreadOracle {
    requests: mpsc::Sender<Request>,
}

impl UiThreadOracle {
    pub fn spawn<F, R>(make: F) -> Result<Self, VisibilityError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: FnMut(&str) -> Result<RenderedPage, VisibilityError> + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Request>(8);
        std::thread::Builder::new()
            .name("visibility-renderer".to_string())
            .spawn(move || {
                let mut render = make();
                while let Some(request) = rx.blocking_recv() {
                    let result = render(&request.markup);
                    // The requester may have given up waiting
                    let _ = request.reply.send(result);
                }
                tracing::debug!("Visibility renderer thread finished");
            })
            .map_err(|e| VisibilityError::Unavailable(e.to_string()))?;
        Ok(Self { requests: tx })
    }
}

impl VisibilityOracle for UiThreadOracle {
    fn render(&self, page_markup: &str) -> Result<RenderedPage, VisibilityError> {
        let (reply, reply_rx) = oneshot::channel();
        self.requests
            .blocking_send(Request {
                markup: page_markup.to_string(),
                reply,
            })
            .map_err(|_| VisibilityError::Unavailable("renderer thread has stopped".to_string()))?;
        reply_rx
            .blocking_recv()
            .map_err(|_| VisibilityError::Navigation("renderer dropped the request".to_string()))?
    }
}
