//! Event bus for reply events
//!
//! A tokio broadcast channel fans events out to every subscriber. Text events
//! are sanitized for speech and de-duplicated per channel within a user turn,
//! so the same sentence delivered as intermediate text and again as a final
//! reply reaches the client once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use super::speech::tts_sanitize;
use super::types::ReplyEvent;
use crate::channels::MainPhase;
use crate::coordination::Channel;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Central bus for one conversation
pub struct EventBus {
    tx: broadcast::Sender<ReplyEvent>,
    seen: Arc<Mutex<HashSet<(Channel, String)>>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ReplyEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Forget texts delivered during the previous user turn
    pub fn begin_turn(&self) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.clear();
        }
    }

    /// Emitter whose text events are attributed to `channel`
    pub fn emitter_for(&self, channel: Channel) -> EventEmitter {
        EventEmitter {
            tx: self.tx.clone(),
            seen: self.seen.clone(),
            channel,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cheap-to-clone handle for runners and tools
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<ReplyEvent>,
    seen: Arc<Mutex<HashSet<(Channel, String)>>>,
    channel: Channel,
}

impl EventEmitter {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Emit an event, dropping text already delivered this turn
    ///
    /// Returns false when the event was suppressed as a duplicate.
    pub fn emit(&self, event: ReplyEvent) -> bool {
        let event = match event {
            ReplyEvent::Text { channel, text } => ReplyEvent::Text {
                channel,
                text: tts_sanitize(&text),
            },
            ReplyEvent::Progress { text } => ReplyEvent::Progress {
                text: tts_sanitize(&text),
            },
            ReplyEvent::Final { channel, text } => ReplyEvent::Final {
                channel,
                text: tts_sanitize(&text),
            },
            other => other,
        };

        if let Some(text) = event.text() {
            let text = text.trim();
            if text.is_empty() {
                return false;
            }
            let key = (self.channel, text.to_string());
            if let Ok(mut seen) = self.seen.lock()
                && !seen.insert(key)
            {
                debug!(event_type = event.event_type(), "EventEmitter::emit: duplicate text suppressed");
                return false;
            }
        }

        debug!(event_type = event.event_type(), channel = %self.channel, "EventEmitter::emit");
        let _ = self.tx.send(event);
        true
    }

    pub fn text(&self, text: impl Into<String>) -> bool {
        self.emit(ReplyEvent::Text {
            channel: self.channel,
            text: text.into(),
        })
    }

    pub fn progress(&self, text: impl Into<String>) -> bool {
        self.emit(ReplyEvent::Progress { text: text.into() })
    }

    pub fn final_reply(&self, text: impl Into<String>) -> bool {
        self.emit(ReplyEvent::Final {
            channel: self.channel,
            text: text.into(),
        })
    }

    pub fn phase(&self, phase: MainPhase) {
        self.emit(ReplyEvent::Phase { phase });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(ReplyEvent::Error {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::with_default_capacity();
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for(Channel::Main);

        assert!(emitter.final_reply("Done \u{2014} all set"));
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ReplyEvent::Final {
                channel: Channel::Main,
                text: "Done - all set".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_text_suppressed_within_turn() {
        let bus = EventBus::with_default_capacity();
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for(Channel::Secondary);

        assert!(emitter.text("One moment."));
        assert!(!emitter.final_reply("One moment."));
        assert!(!emitter.text("   "));

        bus.begin_turn();
        assert!(emitter.final_reply("One moment."));

        assert!(matches!(rx.recv().await.unwrap(), ReplyEvent::Text { .. }));
        assert!(matches!(rx.recv().await.unwrap(), ReplyEvent::Final { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_same_text_on_other_channel_is_delivered() {
        let bus = EventBus::with_default_capacity();
        let mut rx = bus.subscribe();
        let main = bus.emitter_for(Channel::Main);
        let secondary = bus.emitter_for(Channel::Secondary);

        assert!(secondary.final_reply("Your package is now Premium Plus."));
        assert!(main.final_reply("Your package is now Premium Plus."));
        assert!(!main.text("Your package is now Premium Plus."));

        for channel in [Channel::Secondary, Channel::Main] {
            match rx.recv().await.unwrap() {
                ReplyEvent::Final { channel: got, .. } => assert_eq!(got, channel),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_phase_events_never_deduplicated() {
        let bus = EventBus::with_default_capacity();
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for(Channel::Main);
        emitter.phase(MainPhase::RunningTools);
        emitter.phase(MainPhase::RunningTools);
        assert!(rx.recv().await.is_ok());
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emitter_for(Channel::Main).progress("Processing your request..."));
    }
}
