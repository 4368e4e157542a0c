//! Topic subscriptions. Fire-and-forget against the transport; no local record
//! of which topics are subscribed is kept.

use std::fmt;

use crate::transport::MessagingTransport;

const MAX_TOPIC_LEN: usize = 900;

/// Validated topic name: 1..=900 chars of `[A-Za-z0-9-_.~%]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic name is empty")]
    Empty,
    #[error("topic name longer than 900 characters")]
    TooLong,
    #[error("invalid character {0:?} in topic name")]
    InvalidChar(char),
}

impl Topic {
    pub fn parse(name: &str) -> Result<Self, TopicError> {
        let name = name.strip_prefix("/topics/").unwrap_or(name);
        if name.is_empty() {
            return Err(TopicError::Empty);
        }
        if name.len() > MAX_TOPIC_LEN {
            return Err(TopicError::TooLong);
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "-_.~%".contains(*c)))
        {
            return Err(TopicError::InvalidChar(c));
        }
        Ok(Topic(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub async fn subscribe(transport: &dyn MessagingTransport, name: &str) -> bool {
    let topic = match Topic::parse(name) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("not subscribing to {:?}: {}", name, e);
            return false;
        }
    };
    match transport.subscribe_to_topic(topic.as_str()).await {
        Ok(()) => {
            log::info!("subscribed to topic: {}", topic);
            true
        }
        Err(e) => {
            log::warn!("error subscribing to topic {}: {}", topic, e);
            false
        }
    }
}

pub async fn unsubscribe(transport: &dyn MessagingTransport, name: &str) -> bool {
    let topic = match Topic::parse(name) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("not unsubscribing from {:?}: {}", name, e);
            return false;
        }
    };
    match transport.unsubscribe_from_topic(topic.as_str()).await {
        Ok(()) => {
            log::info!("unsubscribed from topic: {}", topic);
            true
        }
        Err(e) => {
            log::warn!("error unsubscribing from topic {}: {}", topic, e);
            false
        }
    }
}
