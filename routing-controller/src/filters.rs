//! Filter Chain (spec.md §4.1): an ordered list of predicates, OR-combined
//! with short-circuit evaluation. Suppressing a publication/subscription
//! suppresses the whole event; suppressing a partition skips just that
//! partition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::discovery::{ParticipantData, ParticipantLookup, RawEndpointData, ServiceKind};
use crate::model::ParticipantKey;

pub trait Filter: Send + Sync {
    fn ignore_publication(&self, _data: &RawEndpointData) -> bool {
        false
    }

    fn ignore_subscription(&self, _data: &RawEndpointData) -> bool {
        false
    }

    fn ignore_partition(&self, _partition: &str) -> bool {
        false
    }
}

/// Ordered, short-circuit OR composition of registered filters.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        FilterChain { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn ignore_publication(&self, data: &RawEndpointData) -> bool {
        self.filters.iter().any(|f| f.ignore_publication(data))
    }

    pub fn ignore_subscription(&self, data: &RawEndpointData) -> bool {
        self.filters.iter().any(|f| f.ignore_subscription(data))
    }

    pub fn ignore_partition(&self, partition: &str) -> bool {
        self.filters.iter().any(|f| f.ignore_partition(partition))
    }
}

/// A no-eviction cache of participant lookups, shared by the self-filters.
/// Negative lookups (participant not yet discovered) are *not* cached,
/// since the metadata may legitimately arrive later.
struct ParticipantCache {
    lookup: Arc<dyn ParticipantLookup>,
    cache: Mutex<HashMap<ParticipantKey, ParticipantData>>,
}

impl ParticipantCache {
    fn new(lookup: Arc<dyn ParticipantLookup>) -> Self {
        ParticipantCache {
            lookup,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &ParticipantKey) -> Option<ParticipantData> {
        if let Some(data) = self.cache.lock().unwrap().get(key) {
            return Some(data.clone());
        }
        let data = self.lookup.participant_data(key)?;
        self.cache.lock().unwrap().insert(key.clone(), data.clone());
        Some(data)
    }
}

fn is_routing_service(participant: &Option<ParticipantData>) -> bool {
    // A participant not yet fully discovered is treated as "don't ignore"
    // (spec.md §9): only a positive match suppresses the event.
    matches!(
        participant.as_ref().and_then(|p| p.service_kind.as_ref()),
        Some(ServiceKind::RoutingService)
    )
}

/// Ignores endpoints whose participant advertises `service kind =
/// routing-service`. Without this the controller would route its own
/// administrative traffic.
pub struct SelfFilter {
    participants: ParticipantCache,
}

impl SelfFilter {
    pub fn new(lookup: Arc<dyn ParticipantLookup>) -> Self {
        SelfFilter {
            participants: ParticipantCache::new(lookup),
        }
    }
}

impl Filter for SelfFilter {
    fn ignore_publication(&self, data: &RawEndpointData) -> bool {
        is_routing_service(&self.participants.get(&data.participant_key))
    }

    fn ignore_subscription(&self, data: &RawEndpointData) -> bool {
        is_routing_service(&self.participants.get(&data.participant_key))
    }
}

/// As `SelfFilter`, further restricted to participants whose
/// `rti.routing_service.group_name` property matches the configured
/// group. Used when coexisting with peer forwarders.
pub struct GroupSelfFilter {
    participants: ParticipantCache,
    group_name: String,
}

const GROUP_NAME_PROPERTY: &str = "rti.routing_service.group_name";

impl GroupSelfFilter {
    pub fn new(lookup: Arc<dyn ParticipantLookup>, group_name: impl Into<String>) -> Self {
        GroupSelfFilter {
            participants: ParticipantCache::new(lookup),
            group_name: group_name.into(),
        }
    }

    fn matches(&self, data: &RawEndpointData) -> bool {
        let participant = self.participants.get(&data.participant_key);
        if !is_routing_service(&participant) {
            return false;
        }
        participant
            .and_then(|p| p.properties.get(GROUP_NAME_PROPERTY).cloned())
            .is_some_and(|group| group == self.group_name)
    }
}

impl Filter for GroupSelfFilter {
    fn ignore_publication(&self, data: &RawEndpointData) -> bool {
        self.matches(data)
    }

    fn ignore_subscription(&self, data: &RawEndpointData) -> bool {
        self.matches(data)
    }
}

/// Ignores topics whose name begins with a vendor-internal prefix
/// (`"rti"` by default).
pub struct PrefixFilter {
    prefix: String,
}

impl PrefixFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        PrefixFilter { prefix: prefix.into() }
    }
}

impl Default for PrefixFilter {
    fn default() -> Self {
        PrefixFilter::new("rti")
    }
}

impl Filter for PrefixFilter {
    fn ignore_publication(&self, data: &RawEndpointData) -> bool {
        data.topic_name.starts_with(&self.prefix)
    }

    fn ignore_subscription(&self, data: &RawEndpointData) -> bool {
        data.topic_name.starts_with(&self.prefix)
    }
}

/// Ignores partition strings containing pub/sub wildcard metacharacters,
/// since those cannot be materialised as concrete partition
/// configurations.
#[derive(Default)]
pub struct WildcardPartitionFilter;

impl Filter for WildcardPartitionFilter {
    fn ignore_partition(&self, partition: &str) -> bool {
        partition.contains('*') || partition.contains('?')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    struct StaticLookup(Map<ParticipantKey, ParticipantData>);
    impl ParticipantLookup for StaticLookup {
        fn participant_data(&self, key: &ParticipantKey) -> Option<ParticipantData> {
            self.0.get(key).cloned()
        }
    }

    fn data(topic: &str) -> RawEndpointData {
        RawEndpointData {
            topic_name: topic.into(),
            type_name: "Shape".into(),
            partitions: vec![],
            participant_key: ParticipantKey(1),
        }
    }

    #[test]
    fn prefix_filter_ignores_rti_topics() {
        let filter = PrefixFilter::default();
        assert!(filter.ignore_publication(&data("rtiInternal")));
        assert!(!filter.ignore_publication(&data("Square")));
    }

    #[test]
    fn wildcard_partition_filter_catches_metacharacters() {
        let filter = WildcardPartitionFilter;
        assert!(filter.ignore_partition("A*"));
        assert!(filter.ignore_partition("A?"));
        assert!(!filter.ignore_partition("A"));
    }

    #[test]
    fn self_filter_ignores_routing_service_participants() {
        let mut participants = Map::new();
        participants.insert(
            ParticipantKey(1),
            ParticipantData {
                service_kind: Some(ServiceKind::RoutingService),
                properties: Map::new(),
            },
        );
        let filter = SelfFilter::new(Arc::new(StaticLookup(participants)));
        assert!(filter.ignore_publication(&data("Square")));
    }

    #[test]
    fn self_filter_does_not_ignore_unknown_participant() {
        let filter = SelfFilter::new(Arc::new(StaticLookup(Map::new())));
        assert!(!filter.ignore_publication(&data("Square")));
    }

    #[test]
    fn group_self_filter_requires_matching_group() {
        let mut properties = Map::new();
        properties.insert(GROUP_NAME_PROPERTY.to_string(), "group-a".to_string());
        let mut participants = Map::new();
        participants.insert(
            ParticipantKey(1),
            ParticipantData {
                service_kind: Some(ServiceKind::RoutingService),
                properties,
            },
        );
        let filter = GroupSelfFilter::new(Arc::new(StaticLookup(participants)), "group-b");
        assert!(!filter.ignore_publication(&data("Square")));
    }

    #[test]
    fn filter_chain_short_circuits_on_first_match() {
        let mut chain = FilterChain::new();
        chain.push(Box::new(PrefixFilter::default()));
        chain.push(Box::new(WildcardPartitionFilter));
        assert!(chain.ignore_publication(&data("rtiInternal")));
        assert!(!chain.ignore_publication(&data("Square")));
        assert!(chain.ignore_partition("A*"));
        assert!(!chain.ignore_partition("A"));
    }
}
