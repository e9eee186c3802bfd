//! Command Scheduler ("Commander", spec.md §4.3): drives the target
//! forwarder to match each observed lifecycle transition via an
//! at-least-once admin command, retried at a fixed delay until success —
//! with a newer inverse request pre-empting an outstanding one.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::admin::{AdminTransport, CommandKind, CommandRequest, EntityDesc, ResponseKind, XmlUrl};
use crate::error::ConfigError;
use crate::model::{Session, TopicRoute};
use crate::provider::ConfigProvider;
use crate::tracker::RouteListener;

/// Identity of a pending command: a session-level op, or a route-level
/// op scoped to a session. Avoids a nullable `TopicRoute?` field
/// (spec.md §9).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKey {
    Session(Session),
    Route(Session, TopicRoute),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    CreateSession,
    DeleteSession,
    CreateRoute,
    DeleteRoute,
}

impl Op {
    fn kind(self) -> CommandKind {
        match self {
            Op::CreateSession | Op::CreateRoute => CommandKind::Create,
            Op::DeleteSession | Op::DeleteRoute => CommandKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub max_xml_len: usize,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout);
        }
        Ok(())
    }
}

struct PendingEntry {
    op: Op,
    generation: u64,
}

/// Lazily-deleted min-heap entry: ordered by due time, then generation.
/// The `CommandKey` is carried along but not part of the ordering.
struct HeapItem {
    due: Instant,
    generation: u64,
    key: CommandKey,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.generation == other.generation
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) yields the smallest due
        // time first.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

struct SchedulerState {
    entries: HashMap<CommandKey, PendingEntry>,
    heap: BinaryHeap<HeapItem>,
}

struct Shared {
    state: Mutex<SchedulerState>,
    condvar: Condvar,
    shutdown: AtomicBool,
    next_generation: AtomicU64,
}

enum Popped {
    Fire { key: CommandKey, op: Op, generation: u64 },
    Stale,
}

fn wait_and_pop(shared: &Shared) -> Option<Popped> {
    let mut guard = shared.state.lock().unwrap();
    loop {
        if shared.shutdown.load(AtomicOrdering::Relaxed) {
            return None;
        }

        let next_due = guard.heap.peek().map(|top| top.due);
        match next_due {
            Some(due) => {
                let now = Instant::now();
                if due <= now {
                    let item = guard.heap.pop().unwrap();
                    let popped = match guard.entries.get(&item.key) {
                        Some(entry) if entry.generation == item.generation => Popped::Fire {
                            key: item.key,
                            op: entry.op,
                            generation: item.generation,
                        },
                        _ => Popped::Stale,
                    };
                    return Some(popped);
                } else {
                    let wait = due - now;
                    let (g, _timeout) = shared.condvar.wait_timeout(guard, wait).unwrap();
                    guard = g;
                }
            }
            None => {
                guard = shared.condvar.wait(guard).unwrap();
            }
        }
    }
}

fn build_request(
    key: &CommandKey,
    op: Op,
    provider: &dyn ConfigProvider,
    config: &SchedulerConfig,
    target: &str,
) -> Result<CommandRequest, ConfigError> {
    let kind = op.kind();

    let check_xml = |content: String| -> Result<String, ConfigError> {
        if content.len() > config.max_xml_len {
            Err(ConfigError::XmlTooLong {
                len: content.len(),
                max: config.max_xml_len,
            })
        } else {
            Ok(content)
        }
    };

    match (op, key) {
        (Op::CreateSession, CommandKey::Session(session)) => {
            let name = provider.session_parent(session);
            let content = check_xml(provider.session_configuration(session))?;
            Ok(CommandRequest {
                target_router: target.to_string(),
                kind,
                entity_desc: Some(EntityDesc {
                    name,
                    xml_url: XmlUrl { is_final: true, content },
                }),
                entity_name: None,
            })
        }
        (Op::DeleteSession, CommandKey::Session(session)) => Ok(CommandRequest {
            target_router: target.to_string(),
            kind,
            entity_desc: None,
            entity_name: Some(provider.session_entity_name(session)),
        }),
        (Op::CreateRoute, CommandKey::Route(session, route)) => {
            let name = provider.session_entity_name(session);
            let content = check_xml(provider.topic_route_configuration(session, route))?;
            Ok(CommandRequest {
                target_router: target.to_string(),
                kind,
                entity_desc: Some(EntityDesc {
                    name,
                    xml_url: XmlUrl { is_final: true, content },
                }),
                entity_name: None,
            })
        }
        (Op::DeleteRoute, CommandKey::Route(session, route)) => Ok(CommandRequest {
            target_router: target.to_string(),
            kind,
            entity_desc: None,
            entity_name: Some(provider.topic_route_entity_name(session, route)),
        }),
        _ => unreachable!("op {:?} does not match key shape {:?}", op, key),
    }
}

fn worker_loop(
    shared: Arc<Shared>,
    transport: Arc<dyn AdminTransport>,
    provider: Arc<dyn ConfigProvider>,
    config: SchedulerConfig,
    target: String,
) {
    loop {
        let popped = match wait_and_pop(&shared) {
            Some(popped) => popped,
            None => return,
        };

        let (key, op, generation) = match popped {
            Popped::Stale => continue,
            Popped::Fire { key, op, generation } => (key, op, generation),
        };

        let request = match build_request(&key, op, provider.as_ref(), &config, &target) {
            Ok(request) => request,
            Err(e) => {
                log::error!("configuration error building command for {:?}: {}", key, e);
                // Fail-fast precondition violation: not retried, the
                // identity is abandoned (spec.md §4.3, §7).
                let mut guard = shared.state.lock().unwrap();
                if matches!(guard.entries.get(&key), Some(entry) if entry.generation == generation) {
                    guard.entries.remove(&key);
                }
                continue;
            }
        };

        let response = transport.send_request(&request, config.request_timeout);
        let success = matches!(&response, Some(r) if r.is_ok());
        if !success {
            match &response {
                Some(r) => log::warn!(
                    "admin command failed for {:?}: kind={:?} message={}",
                    key,
                    r.kind,
                    r.message
                ),
                None => log::warn!("admin command timed out for {:?}", key),
            }
        }

        let mut guard = shared.state.lock().unwrap();
        let still_current = matches!(guard.entries.get(&key), Some(entry) if entry.generation == generation);
        if !still_current {
            // A newer request superseded this one while the send was in
            // flight; the outcome (success or failure) is stale and
            // discarded (spec.md §5 cancellation races).
            continue;
        }

        if success {
            guard.entries.remove(&key);
        } else {
            let due = Instant::now() + config.retry_delay;
            guard.heap.push(HeapItem {
                due,
                generation,
                key,
            });
        }
    }
}

/// Implements the tracker's listener interface and ensures the remote
/// target converges to the corresponding state via at-least-once admin
/// commands.
pub struct Commander {
    shared: Arc<Shared>,
    target: String,
    worker: Option<thread::JoinHandle<()>>,
}

impl Commander {
    pub fn new(
        target: impl Into<String>,
        config: SchedulerConfig,
        transport: Arc<dyn AdminTransport>,
        provider: Arc<dyn ConfigProvider>,
    ) -> Result<Self, ConfigError> {
        let target = target.into();
        if target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        config.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState {
                entries: HashMap::new(),
                heap: BinaryHeap::new(),
            }),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            next_generation: AtomicU64::new(0),
        });

        let worker_shared = shared.clone();
        let worker_target = target.clone();
        let worker = thread::Builder::new()
            .name("routing-controller-scheduler".into())
            .spawn(move || worker_loop(worker_shared, transport, provider, config, worker_target))
            .expect("failed to spawn scheduler worker thread");

        Ok(Commander {
            shared,
            target,
            worker: Some(worker),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn request(&self, key: CommandKey, op: Op) {
        let generation = self.shared.next_generation.fetch_add(1, AtomicOrdering::Relaxed);
        let due = Instant::now();
        {
            let mut guard = self.shared.state.lock().unwrap();
            guard.entries.insert(key.clone(), PendingEntry { op, generation });
            guard.heap.push(HeapItem { due, generation, key });
        }
        self.shared.condvar.notify_all();
    }

    #[cfg(test)]
    fn pending_op(&self, key: &CommandKey) -> Option<Op> {
        self.shared.state.lock().unwrap().entries.get(key).map(|e| e.op)
    }
}

impl RouteListener for Commander {
    fn create_session(&self, session: &Session) {
        self.request(CommandKey::Session(session.clone()), Op::CreateSession);
    }

    fn delete_session(&self, session: &Session) {
        self.request(CommandKey::Session(session.clone()), Op::DeleteSession);
    }

    fn create_topic_route(&self, session: &Session, route: &TopicRoute) {
        self.request(CommandKey::Route(session.clone(), route.clone()), Op::CreateRoute);
    }

    fn delete_topic_route(&self, session: &Session, route: &TopicRoute) {
        self.request(CommandKey::Route(session.clone(), route.clone()), Op::DeleteRoute);
    }
}

impl Drop for Commander {
    fn drop(&mut self) {
        // Forceful shutdown, no drain (spec.md §5): the worker may be
        // blocked in a send when this fires, in which case it notices
        // the flag on its next loop iteration rather than immediately.
        self.shared.shutdown.store(true, AtomicOrdering::Relaxed);
        self.shared.condvar.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;
    use crate::provider::StaticConfigProvider;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockAdminTransport {
        responses: StdMutex<VecDeque<Option<crate::admin::CommandResponse>>>,
        requests: StdMutex<Vec<CommandRequest>>,
    }

    impl MockAdminTransport {
        fn with_responses(responses: Vec<Option<crate::admin::CommandResponse>>) -> Self {
            MockAdminTransport {
                responses: StdMutex::new(responses.into()),
                requests: StdMutex::new(Vec::new()),
            }
        }
    }

    impl AdminTransport for MockAdminTransport {
        fn send_request(&self, request: &CommandRequest, _timeout: Duration) -> Option<crate::admin::CommandResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            responses.pop_front().unwrap_or_else(|| Some(crate::admin::CommandResponse::ok()))
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            retry_delay: Duration::from_millis(10),
            request_timeout: Duration::from_millis(50),
            max_xml_len: 1024,
        }
    }

    #[test]
    fn rejects_empty_target() {
        let transport = Arc::new(MockAdminTransport::default());
        let provider = Arc::new(StaticConfigProvider::new("Domain"));
        let result = Commander::new("", fast_config(), transport, provider);
        assert!(matches!(result, Err(ConfigError::EmptyTarget)));
    }

    #[test]
    fn rejects_non_positive_timeout() {
        let transport = Arc::new(MockAdminTransport::default());
        let provider = Arc::new(StaticConfigProvider::new("Domain"));
        let mut config = fast_config();
        config.request_timeout = Duration::ZERO;
        let result = Commander::new("Target", config, transport, provider);
        assert!(matches!(result, Err(ConfigError::NonPositiveTimeout)));
    }

    #[test]
    fn create_session_converges_on_success() {
        let transport = Arc::new(MockAdminTransport::default());
        let provider = Arc::new(StaticConfigProvider::new("Domain"));
        let commander = Commander::new("Target", fast_config(), transport.clone(), provider).unwrap();

        let session = Session::new("Square", "A");
        commander.create_session(&session);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(commander.pending_op(&CommandKey::Session(session)), None);
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn retries_on_transient_failure_then_succeeds() {
        let responses = vec![None, None, None, Some(crate::admin::CommandResponse::ok())];
        let transport = Arc::new(MockAdminTransport::with_responses(responses));
        let provider = Arc::new(StaticConfigProvider::new("Domain"));
        let commander = Commander::new("Target", fast_config(), transport.clone(), provider).unwrap();

        let session = Session::new("Square", "A");
        commander.create_session(&session);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(commander.pending_op(&CommandKey::Session(session)), None);
        assert_eq!(transport.requests.lock().unwrap().len(), 4);
    }

    #[test]
    fn inverse_request_preempts_outstanding_command() {
        // A slow first send lets us replace the pending op before it resolves.
        let transport = Arc::new(MockAdminTransport::default());
        let provider = Arc::new(StaticConfigProvider::new("Domain"));
        let commander = Commander::new("Target", fast_config(), transport.clone(), provider).unwrap();

        let session = Session::new("Square", "A");
        let route = TopicRoute::new(Direction::Out, "Square", "Shape");
        commander.create_topic_route(&session, &route);
        commander.delete_topic_route(&session, &route);

        // Whichever op is current, it must be the most recently requested one.
        assert_eq!(
            commander.pending_op(&CommandKey::Route(session.clone(), route.clone())),
            Some(Op::DeleteRoute)
        );

        thread::sleep(Duration::from_millis(200));
        assert_eq!(commander.pending_op(&CommandKey::Route(session, route)), None);
    }

    #[test]
    fn xml_too_long_is_a_configuration_error_not_a_retry() {
        struct HugeProvider;
        impl ConfigProvider for HugeProvider {
            fn session_parent(&self, _s: &Session) -> String {
                "Domain".into()
            }
            fn session_entity_name(&self, _s: &Session) -> String {
                "Domain::Session".into()
            }
            fn topic_route_entity_name(&self, _s: &Session, _r: &TopicRoute) -> String {
                "Domain::Session::Route".into()
            }
            fn session_configuration(&self, _s: &Session) -> String {
                "x".repeat(10_000)
            }
            fn topic_route_configuration(&self, _s: &Session, _r: &TopicRoute) -> String {
                "x".repeat(10_000)
            }
        }

        let transport = Arc::new(MockAdminTransport::default());
        let provider = Arc::new(HugeProvider);
        let mut config = fast_config();
        config.max_xml_len = 16;
        let commander = Commander::new("Target", config, transport.clone(), provider).unwrap();

        let session = Session::new("Square", "A");
        commander.create_session(&session);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(commander.pending_op(&CommandKey::Session(session)), None);
        assert_eq!(transport.requests.lock().unwrap().len(), 0);
    }

    #[test]
    fn xml_content_length_exactly_at_max_is_accepted() {
        let provider = StaticConfigProvider::new("Domain");
        let session = Session::new("Square", "A");
        let content_len = provider.session_configuration(&session).len();
        let config = SchedulerConfig {
            max_xml_len: content_len,
            ..fast_config()
        };

        let request = build_request(&CommandKey::Session(session.clone()), Op::CreateSession, &provider, &config, "Target");
        assert!(request.is_ok());

        let mut one_under = config;
        one_under.max_xml_len = content_len - 1;
        let request = build_request(&CommandKey::Session(session), Op::CreateSession, &provider, &one_under, "Target");
        assert!(matches!(request, Err(ConfigError::XmlTooLong { .. })));
    }
}
