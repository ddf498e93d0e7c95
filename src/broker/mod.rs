/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! In-process event fan-out over three topic spaces: job id, account name
//! (sessions), and account name (auth challenges). Sessions and challenges
//! also carry a wildcard `all` key.
//!
//! Channels are lazily allocated per topic key with a bounded buffer of 256
//! events. A full subscriber buffer drops the **oldest** unread event, never
//! the newest: slow readers lose history but publishers never block and
//! never fail. Events published on one key are observed in publish order by
//! any subscriber that does not overflow.
//!
//! Events for a key with no subscribers are discarded without allocating a
//! channel.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::models::{AuthChallengeEvent, JobEvent, SessionEvent};

/// Topic key receiving every session / auth-challenge event regardless of
/// account.
pub const WILDCARD_ACCOUNT: &str = "all";

/// Per-subscriber buffer; an overflowing subscriber loses its oldest events.
const SUBSCRIBER_BUFFER: usize = 256;

/// One keyed topic space.
struct Topics<T> {
    channels: Arc<DashMap<String, broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> Topics<T> {
    fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
        }
    }

    fn publish(&self, key: &str, event: T) {
        let Some(tx) = self.channels.get(key) else {
            // No subscribers: discard without allocating anything.
            return;
        };
        if tx.send(event).is_err() {
            // The last subscriber left between lookup and send. Drop the
            // map guard before mutating the shard.
            drop(tx);
            self.channels
                .remove_if(key, |_, tx| tx.receiver_count() == 0);
        }
    }

    fn subscribe(&self, key: &str) -> TopicStream<T> {
        let tx = self
            .channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0)
            .clone();
        TopicStream {
            stream: Some(BroadcastStream::new(tx.subscribe())),
            channels: Arc::clone(&self.channels),
            key: key.to_string(),
        }
    }

    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.channels.len()
    }
}

/// A subscription to one topic key.
///
/// Yields every event delivered to its channel, skipping over overflow
/// gaps. Dropping the stream removes its channel registration; the key is
/// removed once no channels remain under it.
pub struct TopicStream<T: Clone + Send + 'static> {
    stream: Option<BroadcastStream<T>>,
    channels: Arc<DashMap<String, broadcast::Sender<T>>>,
    key: String,
}

impl<T: Clone + Send + 'static> Stream for TopicStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(stream) = this.stream.as_mut() else {
            return Poll::Ready(None);
        };
        loop {
            match Pin::new(&mut *stream).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    // Buffer overflowed: the oldest `skipped` events are gone,
                    // keep reading from the oldest retained one.
                    trace!(key = %this.key, skipped, "subscriber lagged, dropped oldest events");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T: Clone + Send + 'static> Drop for TopicStream<T> {
    fn drop(&mut self) {
        // Release our receiver before checking whether the key is empty.
        self.stream.take();
        self.channels
            .remove_if(&self.key, |_, tx| tx.receiver_count() == 0);
    }
}

/// The event broker. `Clone` shares the underlying topic maps.
#[derive(Clone)]
pub struct EventBroker {
    job: Arc<Topics<JobEvent>>,
    session: Arc<Topics<SessionEvent>>,
    challenge: Arc<Topics<AuthChallengeEvent>>,
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            job: Arc::new(Topics::new()),
            session: Arc::new(Topics::new()),
            challenge: Arc::new(Topics::new()),
        }
    }

    /// Publishes a job event to every subscriber of `job_id`.
    ///
    /// Empty job ids (agent lifecycle events) and ids without subscribers
    /// are discarded silently.
    pub fn publish_job_event(
        &self,
        job_id: &str,
        event_type: &str,
        payload: Option<serde_json::Map<String, serde_json::Value>>,
    ) {
        if job_id.is_empty() {
            return;
        }
        self.job
            .publish(job_id, JobEvent::new(job_id, event_type, payload));
    }

    /// Publishes a session event to the account's subscribers and to the
    /// wildcard subscribers.
    pub fn publish_session_event(&self, event: SessionEvent) {
        let account = event.account_name.clone();
        self.session.publish(&account, event.clone());
        self.session.publish(WILDCARD_ACCOUNT, event);
    }

    /// Publishes an auth challenge to the account's subscribers and to the
    /// wildcard subscribers.
    pub fn publish_auth_challenge(&self, event: AuthChallengeEvent) {
        let account = event.account_name.clone();
        self.challenge.publish(&account, event.clone());
        self.challenge.publish(WILDCARD_ACCOUNT, event);
    }

    pub fn subscribe_job(&self, job_id: &str) -> TopicStream<JobEvent> {
        self.job.subscribe(job_id)
    }

    /// Subscribes to one account's session events, or to all accounts when
    /// `account` is `None`.
    pub fn subscribe_sessions(&self, account: Option<&str>) -> TopicStream<SessionEvent> {
        self.session.subscribe(account.unwrap_or(WILDCARD_ACCOUNT))
    }

    /// Subscribes to one account's auth challenges, or to all accounts when
    /// `account` is `None`.
    pub fn subscribe_auth_challenges(
        &self,
        account: Option<&str>,
    ) -> TopicStream<AuthChallengeEvent> {
        self.challenge.subscribe(account.unwrap_or(WILDCARD_ACCOUNT))
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}
