//! Self-hosted analytics plumbing: validates inbound page events, enriches
//! them with request metadata, and relays queued events to the downstream
//! collector. The queue and the collector are collaborators behind the
//! [`EventQueue`] and [`Webhook`] traits; this module owns only the logic
//! between them.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The JSON payload received from clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub referrer: String,

    #[serde(default)]
    pub screen_width: u32,

    #[serde(default)]
    pub props: Option<HashMap<String, String>>,
}

/// The message body enqueued for downstream processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub domain: String,
    pub name: String,
    pub url: String,
    pub referrer: String,
    pub user_agent: String,
    pub screen_width: u32,
    pub ip: String,

    /// RFC3339, UTC.
    pub timestamp: String,

    pub props: HashMap<String, String>,
}

/// Request metadata that is not part of the client payload.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub user_agent: String,
    pub ip: String,
}

/// One received queue message: the body plus the receipt needed to delete
/// it. Messages returned by [`EventQueue::receive`] are claimed until
/// deleted or redelivered.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub receipt: String,
    pub body: String,
}

/// Errors produced by transport implementations.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// A durable event queue, such as SQS.
pub trait EventQueue {
    fn send(&mut self, body: &str) -> std::result::Result<(), TransportError>;

    /// Receives a batch of claimed messages. An empty batch means the queue
    /// is drained.
    fn receive(&mut self) -> std::result::Result<Vec<QueueMessage>, TransportError>;

    fn delete(&mut self, receipt: &str) -> std::result::Result<(), TransportError>;
}

/// The downstream collector endpoint.
pub trait Webhook {
    fn forward(&self, event: &QueueEvent) -> std::result::Result<(), TransportError>;
}

/// Validates inbound events and enqueues them for downstream processing.
/// The clock is injectable so timestamps are deterministic under test.
pub struct Processor<Q> {
    queue: Q,
    now: fn() -> DateTime<Utc>,
}

impl<Q: EventQueue> Processor<Q> {
    pub fn new(queue: Q) -> Processor<Q> {
        Processor::with_clock(queue, Utc::now)
    }

    pub fn with_clock(queue: Q, now: fn() -> DateTime<Utc>) -> Processor<Q> {
        Processor { queue, now }
    }

    /// Validates `event`, stamps it with `meta` and the current time, and
    /// enqueues the result. Events missing a name, URL, or domain are
    /// rejected.
    pub fn handle(&mut self, event: InboundEvent, meta: &Meta) -> Result<()> {
        if event.name.is_empty() || event.url.is_empty() || event.domain.is_empty() {
            return Err(Error::InvalidEvent);
        }

        let queued = QueueEvent {
            domain: event.domain,
            name: event.name,
            url: event.url,
            referrer: event.referrer,
            user_agent: meta.user_agent.clone(),
            screen_width: event.screen_width,
            ip: meta.ip.clone(),
            timestamp: (self.now)().to_rfc3339_opts(SecondsFormat::Secs, true),
            props: event.props.unwrap_or_default(),
        };
        let body = serde_json::to_string(&queued)?;
        self.queue.send(&body).map_err(Error::Transport)?;
        Ok(())
    }
}

/// Drains the queue into the webhook: receive a batch, decode each message
/// body, forward it, and delete it only after a successful forward.
/// Undecodable or rejected messages are logged and left claimed for
/// redelivery. Returns the number of events forwarded.
pub fn relay(queue: &mut dyn EventQueue, webhook: &dyn Webhook) -> Result<usize> {
    let mut forwarded = 0;
    loop {
        let batch = queue.receive().map_err(Error::Transport)?;
        if batch.is_empty() {
            return Ok(forwarded);
        }
        for message in batch {
            let event: QueueEvent = match serde_json::from_str(&message.body) {
                Ok(event) => event,
                Err(err) => {
                    warn!(receipt = %message.receipt, error = %err, "undecodable queue message");
                    continue;
                }
            };
            if let Err(err) = webhook.forward(&event) {
                warn!(receipt = %message.receipt, error = %err, "forwarding event");
                continue;
            }
            queue.delete(&message.receipt).map_err(Error::Transport)?;
            forwarded += 1;
        }
    }
}

/// The result of an analytics operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error ingesting or relaying events.
#[derive(Debug)]
pub enum Error {
    /// Returned when an inbound event is missing its name, URL, or domain.
    InvalidEvent,

    /// Returned when an event can't be serialized.
    Json(serde_json::Error),

    /// Returned when the queue or webhook fails.
    Transport(TransportError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidEvent => write!(f, "invalid event: name, url, and domain are required"),
            Error::Json(err) => write!(f, "encoding event: {}", err),
            Error::Transport(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidEvent => None,
            Error::Json(err) => Some(err),
            Error::Transport(err) => Some(err.as_ref()),
        }
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when encoding events.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Default)]
    struct InMemoryQueue {
        pending: Vec<String>,
        deleted: Vec<String>,
    }

    impl EventQueue for InMemoryQueue {
        fn send(&mut self, body: &str) -> std::result::Result<(), TransportError> {
            self.pending.push(body.to_owned());
            Ok(())
        }

        // claims everything pending; claimed messages are not redelivered
        // within the drain
        fn receive(&mut self) -> std::result::Result<Vec<QueueMessage>, TransportError> {
            Ok(std::mem::take(&mut self.pending)
                .into_iter()
                .enumerate()
                .map(|(i, body)| QueueMessage {
                    receipt: i.to_string(),
                    body,
                })
                .collect())
        }

        fn delete(&mut self, receipt: &str) -> std::result::Result<(), TransportError> {
            self.deleted.push(receipt.to_owned());
            Ok(())
        }
    }

    struct RejectingWebhook;

    impl Webhook for RejectingWebhook {
        fn forward(&self, _: &QueueEvent) -> std::result::Result<(), TransportError> {
            Err("collector unavailable".into())
        }
    }

    struct RecordingWebhook(std::cell::RefCell<Vec<QueueEvent>>);

    impl Webhook for RecordingWebhook {
        fn forward(&self, event: &QueueEvent) -> std::result::Result<(), TransportError> {
            self.0.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.ymd(2024, 6, 15).and_hms(12, 0, 0)
    }

    fn inbound() -> InboundEvent {
        InboundEvent {
            name: String::from("pageview"),
            url: String::from("https://example.com/sagas/s/"),
            domain: String::from("example.com"),
            ..InboundEvent::default()
        }
    }

    #[test]
    fn test_handle_rejects_incomplete_events() {
        let mut processor = Processor::with_clock(InMemoryQueue::default(), fixed_now);
        for missing in &["name", "url", "domain"] {
            let mut event = inbound();
            match *missing {
                "name" => event.name.clear(),
                "url" => event.url.clear(),
                _ => event.domain.clear(),
            }
            match processor.handle(event, &Meta::default()) {
                Err(Error::InvalidEvent) => (),
                other => panic!("missing {}: wanted InvalidEvent; found {:?}", missing, other),
            }
        }
        assert!(processor.queue.pending.is_empty());
    }

    #[test]
    fn test_handle_enriches_and_enqueues() {
        let mut processor = Processor::with_clock(InMemoryQueue::default(), fixed_now);
        let meta = Meta {
            user_agent: String::from("curl/8"),
            ip: String::from("192.0.2.7"),
        };
        processor.handle(inbound(), &meta).unwrap();

        assert_eq!(processor.queue.pending.len(), 1);
        let queued: QueueEvent = serde_json::from_str(&processor.queue.pending[0]).unwrap();
        assert_eq!(queued.name, "pageview");
        assert_eq!(queued.user_agent, "curl/8");
        assert_eq!(queued.ip, "192.0.2.7");
        assert_eq!(queued.timestamp, "2024-06-15T12:00:00Z");
        // absent props become an empty map, not null
        assert_eq!(queued.props, HashMap::new());
    }

    #[test]
    fn test_relay_forwards_and_deletes() {
        let mut queue = InMemoryQueue::default();
        let mut processor = Processor::with_clock(queue, fixed_now);
        processor.handle(inbound(), &Meta::default()).unwrap();
        queue = processor.queue;

        let webhook = RecordingWebhook(std::cell::RefCell::new(Vec::new()));
        let forwarded = relay(&mut queue, &webhook).unwrap();
        assert_eq!(forwarded, 1);
        assert_eq!(webhook.0.borrow().len(), 1);
        assert_eq!(webhook.0.borrow()[0].name, "pageview");
        assert_eq!(queue.deleted, vec![String::from("0")]);
    }

    #[test]
    fn test_relay_leaves_undecodable_messages() {
        let mut queue = InMemoryQueue::default();
        queue.pending.push(String::from("not json"));

        let webhook = RecordingWebhook(std::cell::RefCell::new(Vec::new()));
        let forwarded = relay(&mut queue, &webhook).unwrap();
        assert_eq!(forwarded, 0);
        assert!(queue.deleted.is_empty());
    }

    #[test]
    fn test_relay_leaves_rejected_messages() {
        let mut queue = InMemoryQueue::default();
        let mut processor = Processor::with_clock(queue, fixed_now);
        processor.handle(inbound(), &Meta::default()).unwrap();
        queue = processor.queue;

        let forwarded = relay(&mut queue, &RejectingWebhook).unwrap();
        assert_eq!(forwarded, 0);
        assert!(queue.deleted.is_empty());
    }
}
