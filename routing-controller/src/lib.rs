//! Dynamic partition routing controller.
//!
//! Observes a publish/subscribe discovery stream, infers which logical
//! `(topic, partition, direction)` routes should exist between two
//! pub/sub domains, and drives a target forwarder through an
//! administrative request/reply channel so that its configuration
//! continuously mirrors the observed demand:
//!
//! ```text
//! discovery events -> filter chain -> partition/route state tracker
//!                                        | emits create/delete events
//!                                        v
//!                                   command scheduler -> remote admin RPC
//! ```
//!
//! Process bootstrap, logging initialization, and the concrete discovery
//! middleware / admin transport wire format are left to the host process;
//! this crate wires the tracker, dispatcher, and scheduler together and
//! exposes the seams (`ParticipantLookup`, `AdminTransport`,
//! `ConfigProvider`) a host plugs concrete implementations into.

pub mod admin;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filters;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod tracker;

use std::sync::Arc;

pub use admin::{AdminTransport, CommandRequest, CommandResponse};
pub use config::Config;
pub use discovery::{DiscoveryAdapter, DiscoveryEvent, ParticipantData, ParticipantLookup, RawEndpointData, ServiceKind};
pub use error::ConfigError;
pub use filters::{Filter, FilterChain, GroupSelfFilter, PrefixFilter, SelfFilter, WildcardPartitionFilter};
pub use model::{Direction, Handle, ParticipantKey, Session, TopicRoute};
pub use provider::{ConfigProvider, StaticConfigProvider};
pub use scheduler::{Commander, SchedulerConfig};
pub use tracker::{Dispatcher, RouteEvent, RouteListener, Tracker};

/// Wires the Observer and the Command Scheduler together behind the
/// configured filter chain, so host code only needs to feed discovery
/// events in and own a concrete `AdminTransport` + `ConfigProvider`.
pub struct RoutingController {
    tracker: Arc<Tracker>,
    commander: Arc<Commander>,
}

impl RoutingController {
    pub fn new(
        config: &Config,
        participant_lookup: Arc<dyn ParticipantLookup>,
        transport: Arc<dyn AdminTransport>,
        provider: Arc<dyn ConfigProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut filters = FilterChain::new();
        filters.push(Box::new(SelfFilter::new(participant_lookup.clone())));
        if let Some(group_name) = &config.group_name {
            filters.push(Box::new(GroupSelfFilter::new(
                participant_lookup.clone(),
                group_name.clone(),
            )));
        }
        filters.push(Box::new(PrefixFilter::default()));
        filters.push(Box::new(WildcardPartitionFilter));

        let tracker = Arc::new(Tracker::new(filters, Dispatcher::new()));

        let scheduler_config = SchedulerConfig {
            retry_delay: config.retry_delay(),
            request_timeout: config.request_timeout(),
            max_xml_len: config.max_xml_len,
        };
        let commander = Arc::new(Commander::new(
            config.target_routing_service.clone(),
            scheduler_config,
            transport,
            provider,
        )?);

        tracker.register_listener(commander.clone());

        Ok(RoutingController { tracker, commander })
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    pub fn commander(&self) -> &Arc<Commander> {
        &self.commander
    }
}
