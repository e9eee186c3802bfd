//! Config Provider (spec.md §4.5): the only point of policy for how
//! logical sessions/routes map onto forwarder configuration. Pure
//! queries — same inputs always produce the same outputs. Concrete XML
//! generation is an out-of-scope, pluggable concern; this module defines
//! the seam plus a small test/example double.

use crate::model::{Session, TopicRoute};

pub trait ConfigProvider: Send + Sync {
    /// Name of the forwarder entity under which the session is created.
    fn session_parent(&self, session: &Session) -> String;

    /// Fully-qualified session entity name, used for deletion and as the
    /// route parent.
    fn session_entity_name(&self, session: &Session) -> String;

    /// Fully-qualified route entity name.
    fn topic_route_entity_name(&self, session: &Session, route: &TopicRoute) -> String;

    /// XML snippet embedded in a session CREATE request.
    fn session_configuration(&self, session: &Session) -> String;

    /// XML snippet embedded in a route CREATE request.
    fn topic_route_configuration(&self, session: &Session, route: &TopicRoute) -> String;
}

/// A string-template `ConfigProvider`, useful for tests and as a worked
/// example of the trait. Not meant for production XML generation.
pub struct StaticConfigProvider {
    pub parent: String,
}

impl StaticConfigProvider {
    pub fn new(parent: impl Into<String>) -> Self {
        StaticConfigProvider { parent: parent.into() }
    }

    fn session_name(session: &Session) -> String {
        format!("{}::{}", session.topic, session.partition)
    }

    fn route_name(session: &Session, route: &TopicRoute) -> String {
        format!(
            "{}::{}::{}::{}",
            session.topic, session.partition, route.direction, route.type_name
        )
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn session_parent(&self, _session: &Session) -> String {
        self.parent.clone()
    }

    fn session_entity_name(&self, session: &Session) -> String {
        Self::session_name(session)
    }

    fn topic_route_entity_name(&self, session: &Session, route: &TopicRoute) -> String {
        Self::route_name(session, route)
    }

    fn session_configuration(&self, session: &Session) -> String {
        format!(
            "<session name=\"{}\" topic=\"{}\" partition=\"{}\"/>",
            Self::session_name(session),
            session.topic,
            session.partition
        )
    }

    fn topic_route_configuration(&self, session: &Session, route: &TopicRoute) -> String {
        format!(
            "<topic_route name=\"{}\" direction=\"{}\" type=\"{}\"/>",
            Self::route_name(session, route),
            route.direction,
            route.type_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;

    #[test]
    fn static_provider_is_pure() {
        let provider = StaticConfigProvider::new("Domain");
        let session = Session::new("Square", "A");
        let route = TopicRoute::new(Direction::Out, "Square", "Shape");
        assert_eq!(
            provider.topic_route_entity_name(&session, &route),
            provider.topic_route_entity_name(&session, &route)
        );
        assert_eq!(provider.session_parent(&session), "Domain");
    }
}
