//! Event Pipeline
//!
//! Each raw event is routed and dispatched on its own tracked task.
//! `shutdown` stops intake and waits for every in-flight event.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::protocol::RawEvent;
use crate::router::EventRouter;
use crate::webhooks::{DispatchError, DispatchReport, WebhookDispatcher};

/// Routes raw events to webhook deliveries.
#[derive(Clone)]
pub struct Pipeline {
    router: Arc<EventRouter>,
    dispatcher: Arc<WebhookDispatcher>,
    tracker: TaskTracker,
}

impl Pipeline {
    pub fn new(router: EventRouter, dispatcher: WebhookDispatcher) -> Self {
        Self {
            router: Arc::new(router),
            dispatcher: Arc::new(dispatcher),
            tracker: TaskTracker::new(),
        }
    }

    /// Hand an event to a worker task.
    ///
    /// Returns `false` without spawning once shutdown has begun.
    pub fn submit(&self, event: RawEvent) -> bool {
        if self.tracker.is_closed() {
            warn!(kind = event.name(), "Pipeline is shutting down, dropping event");
            return false;
        }

        let span = info_span!("event", id = %Uuid::now_v7(), kind = event.name());
        let pipeline = self.clone();
        self.tracker.spawn(
            async move {
                pipeline.handle(&event).await;
            }
            .instrument(span),
        );
        true
    }

    /// Route one raw event and dispatch everything it produces, in order.
    pub async fn handle(&self, event: &RawEvent) -> Vec<Result<DispatchReport, DispatchError>> {
        let events = self.router.route(event).await;
        if events.is_empty() {
            debug!(kind = event.name(), "Event produced no webhooks");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(events.len());
        for webhook in &events {
            let result = self.dispatcher.dispatch(webhook).await;
            if let Err(e) = &result {
                error!(event = %webhook.kind(), error = %e, "Webhook dispatch failed");
            }
            results.push(result);
        }
        results
    }

    /// Number of events still being processed.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting events and wait for in-flight ones to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!(in_flight = self.tracker.len(), "Waiting for in-flight events");
        self.tracker.wait().await;
        info!("Pipeline drained");
    }
}
