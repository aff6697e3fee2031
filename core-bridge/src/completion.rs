//! Completion handler.
//!
//! The callback surface handed to the fetch engine for one request. It runs
//! on the network context, delivers the result to the blocked caller through
//! a one-shot channel and schedules destruction of the in-flight handle.

use std::sync::Arc;

use bridge_traits::{CompletionCallback, FetchOutcome};
use core_async::sync::oneshot;
use tracing::{debug, warn};

use crate::bridge::BridgeResponse;
use crate::network::{NetworkHandle, RequestId};
use crate::request_context::IsolatedRequestContext;

pub struct CompletionHandler {
    request_id: RequestId,
    url: String,
    sender: Option<oneshot::Sender<BridgeResponse>>,
    context: Arc<IsolatedRequestContext>,
    network: Option<NetworkHandle>,
}

impl CompletionHandler {
    pub fn new(
        request_id: RequestId,
        url: impl Into<String>,
        sender: oneshot::Sender<BridgeResponse>,
        context: Arc<IsolatedRequestContext>,
        network: NetworkHandle,
    ) -> Self {
        Self {
            request_id,
            url: url.into(),
            sender: Some(sender),
            context,
            network: Some(network),
        }
    }

    /// Wrap the handler as the engine's completion callback.
    pub fn into_callback(self) -> CompletionCallback {
        Box::new(move |outcome| self.complete(outcome))
    }

    /// Deliver `outcome` to the waiting caller.
    pub fn complete(mut self, outcome: FetchOutcome) {
        if let Some(network) = self.network.as_ref() {
            if !network.runs_tasks_on_current_thread() {
                warn!(request_id = %self.request_id, "Fetch completed off the network context");
            }
        }

        self.context.store_cookies(&self.url, &outcome.cookies);

        let response = BridgeResponse::from_outcome(outcome);
        debug!(
            request_id = %self.request_id,
            success = response.success,
            status = ?response.http_status,
            os_error = response.os_error,
            bytes = response.body.len(),
            "Fetch completed"
        );

        // Queued first so work the caller posts after waking sees the handle
        // gone.
        self.schedule_release();

        if let Some(sender) = self.sender.take() {
            if sender.send(response).is_err() {
                debug!(request_id = %self.request_id, "Caller stopped waiting before completion");
            }
        }
    }

    fn schedule_release(&mut self) {
        let Some(network) = self.network.take() else {
            return;
        };

        let id = self.request_id;
        if network.post(move |arena| {
            arena.release(id);
        })
        .is_err()
        {
            debug!(request_id = %id, "Network context gone; nothing to release");
        }
    }
}

impl Drop for CompletionHandler {
    fn drop(&mut self) {
        if self.sender.is_some() {
            warn!(
                request_id = %self.request_id,
                "Completion callback dropped without being invoked"
            );
        }
        self.schedule_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkContext;
    use bridge_traits::BaselineContext;
    use bytes::Bytes;

    fn handler(
        network: &NetworkContext,
    ) -> (
        CompletionHandler,
        oneshot::Receiver<BridgeResponse>,
        Arc<IsolatedRequestContext>,
    ) {
        let (tx, rx) = oneshot::channel();
        let context = Arc::new(IsolatedRequestContext::new(&BaselineContext::default()));
        let handler = CompletionHandler::new(
            RequestId::new(),
            "https://example.com/command",
            tx,
            Arc::clone(&context),
            network.handle(),
        );
        (handler, rx, context)
    }

    #[test]
    fn test_complete_delivers_response_and_rejects_cookies() {
        let network = NetworkContext::spawn("completion-network").unwrap();
        let (handler, rx, context) = handler(&network);

        network
            .handle()
            .post(move |_| {
                handler.complete(
                    FetchOutcome::completed(404, Bytes::from_static(b"missing"))
                        .with_cookie("sid=1"),
                )
            })
            .unwrap();

        let response = rx.blocking_recv().unwrap();
        assert!(response.success);
        assert_eq!(response.http_status, Some(404));
        assert_eq!(response.os_error, 0);
        assert_eq!(&response.body[..], b"missing");
        assert_eq!(context.cookie_count(), 0);
        assert_eq!(context.rejected_cookie_count(), 1);
    }

    #[test]
    fn test_dropped_handler_closes_channel() {
        let network = NetworkContext::spawn("dropped-network").unwrap();
        let (handler, rx, _context) = handler(&network);

        let callback = handler.into_callback();
        drop(callback);

        assert!(rx.blocking_recv().is_err());
    }

    #[test]
    fn test_failure_is_delivered() {
        let network = NetworkContext::spawn("failing-network").unwrap();
        let (handler, rx, _context) = handler(&network);

        network
            .handle()
            .post(move |_| (handler.into_callback())(FetchOutcome::failed(7)))
            .unwrap();

        let response = rx.blocking_recv().unwrap();
        assert!(!response.success);
        assert_eq!(response.os_error, 7);
        assert_eq!(response.http_status, None);
        assert!(response.body.is_empty());
    }
}
