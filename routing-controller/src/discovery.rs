//! Discovery Adapter (spec.md §2 item 1, §4.1): translates raw
//! publication/subscription discovery data into `DiscoveryEvent`s and
//! exposes the participant metadata lookup used by filters. The
//! underlying pub/sub middleware discovery source itself is out of
//! scope (spec.md §1); this module only defines the seam it plugs into.

use std::collections::HashMap;

use crate::model::{Direction, Handle, ParticipantKey};

/// Participant-advertised service kind, read by the self-filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKind {
    RoutingService,
    Other(String),
}

/// Metadata about a discovered participant. `properties` holds vendor
/// properties such as `rti.routing_service.group_name`.
#[derive(Debug, Clone, Default)]
pub struct ParticipantData {
    pub service_kind: Option<ServiceKind>,
    pub properties: HashMap<String, String>,
}

/// Looks up participant metadata by key. A participant not yet fully
/// discovered may legitimately return `None`; per spec.md §9, filters
/// treat that as "don't ignore" rather than suppressing the event.
pub trait ParticipantLookup: Send + Sync {
    fn participant_data(&self, key: &ParticipantKey) -> Option<ParticipantData>;
}

/// Built-in topic data carried by a discovery callback, before partition
/// expansion.
#[derive(Debug, Clone)]
pub struct RawEndpointData {
    pub topic_name: String,
    pub type_name: String,
    /// Ordered sequence of partition names; may be empty.
    pub partitions: Vec<String>,
    pub participant_key: ParticipantKey,
}

/// A single discovered or lost endpoint, already carrying its direction.
#[derive(Debug, Clone)]
pub struct DiscoveryEvent {
    pub handle: Handle,
    pub direction: Direction,
    pub data: RawEndpointData,
}

/// Thin inbound translator. Wraps a `ParticipantLookup` so filters and
/// the tracker can be handed both the event and a way to resolve
/// participant metadata, without depending on the concrete discovery
/// middleware.
pub struct DiscoveryAdapter<L: ParticipantLookup> {
    participant_lookup: L,
}

impl<L: ParticipantLookup> DiscoveryAdapter<L> {
    pub fn new(participant_lookup: L) -> Self {
        DiscoveryAdapter { participant_lookup }
    }

    pub fn participant_lookup(&self) -> &L {
        &self.participant_lookup
    }

    pub fn publication_discovered(&self, handle: Handle, data: RawEndpointData) -> DiscoveryEvent {
        DiscoveryEvent {
            handle,
            direction: Direction::Out,
            data,
        }
    }

    pub fn publication_lost(&self, handle: Handle, data: RawEndpointData) -> DiscoveryEvent {
        self.publication_discovered(handle, data)
    }

    pub fn subscription_discovered(&self, handle: Handle, data: RawEndpointData) -> DiscoveryEvent {
        DiscoveryEvent {
            handle,
            direction: Direction::In,
            data,
        }
    }

    pub fn subscription_lost(&self, handle: Handle, data: RawEndpointData) -> DiscoveryEvent {
        self.subscription_discovered(handle, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullLookup;
    impl ParticipantLookup for NullLookup {
        fn participant_data(&self, _key: &ParticipantKey) -> Option<ParticipantData> {
            None
        }
    }

    #[test]
    fn publication_is_tagged_out() {
        let adapter = DiscoveryAdapter::new(NullLookup);
        let event = adapter.publication_discovered(
            Handle(1),
            RawEndpointData {
                topic_name: "Square".into(),
                type_name: "Shape".into(),
                partitions: vec!["A".into()],
                participant_key: ParticipantKey(1),
            },
        );
        assert_eq!(event.direction, Direction::Out);
    }

    #[test]
    fn subscription_is_tagged_in() {
        let adapter = DiscoveryAdapter::new(NullLookup);
        let event = adapter.subscription_discovered(
            Handle(2),
            RawEndpointData {
                topic_name: "Square".into(),
                type_name: "Shape".into(),
                partitions: vec![],
                participant_key: ParticipantKey(2),
            },
        );
        assert_eq!(event.direction, Direction::In);
    }
}
