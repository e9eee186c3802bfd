//! Identity types shared across the tracker and scheduler: `Session`,
//! `TopicRoute`, `Handle` and `Direction` as defined in the data model.

use std::fmt;

/// Direction of a topic route relative to the target forwarder.
///
/// `Out` corresponds to a discovered publication, `In` to a discovered
/// subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "IN"),
            Direction::Out => write!(f, "OUT"),
        }
    }
}

/// Opaque identifier for a remote endpoint, unique per discovery source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// Opaque identifier for a discovered participant, used only by filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantKey(pub u64);

/// Identity = `(topic, partition)`. The empty string is a legal partition
/// meaning "no partition advertised".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    pub topic: String,
    pub partition: String,
}

impl Session {
    pub fn new(topic: impl Into<String>, partition: impl Into<String>) -> Self {
        Session {
            topic: topic.into(),
            partition: partition.into(),
        }
    }
}

/// Identity = `(direction, topic, type)`. Two routes differing only in
/// `type_name` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicRoute {
    pub direction: Direction,
    pub topic: String,
    pub type_name: String,
}

impl TopicRoute {
    pub fn new(direction: Direction, topic: impl Into<String>, type_name: impl Into<String>) -> Self {
        TopicRoute {
            direction,
            topic: topic.into(),
            type_name: type_name.into(),
        }
    }
}
