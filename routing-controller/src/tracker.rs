//! Partition/Route State Tracker ("Observer", spec.md §4.2) and the
//! single-threaded ordered dispatcher that hands its lifecycle events to
//! listeners (spec.md §5).

use std::collections::HashMap;
use std::panic;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::discovery::{DiscoveryEvent, RawEndpointData};
use crate::filters::FilterChain;
use crate::model::{Direction, Handle, Session, TopicRoute};

/// Lifecycle event emitted when a session/route's liveness changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    CreateSession(Session),
    DeleteSession(Session),
    CreateTopicRoute(Session, TopicRoute),
    DeleteTopicRoute(Session, TopicRoute),
}

/// Listener interface implemented by the Command Scheduler (and any other
/// observer of route liveness).
pub trait RouteListener: Send + Sync {
    fn create_session(&self, session: &Session);
    fn delete_session(&self, session: &Session);
    fn create_topic_route(&self, session: &Session, route: &TopicRoute);
    fn delete_topic_route(&self, session: &Session, route: &TopicRoute);
}

fn dispatch_one(listener: &dyn RouteListener, event: &RouteEvent) {
    match event {
        RouteEvent::CreateSession(s) => listener.create_session(s),
        RouteEvent::DeleteSession(s) => listener.delete_session(s),
        RouteEvent::CreateTopicRoute(s, r) => listener.create_topic_route(s, r),
        RouteEvent::DeleteTopicRoute(s, r) => listener.delete_topic_route(s, r),
    }
}

/// A bounded FIFO queue drained by a single dedicated worker thread, so
/// listeners observe events in the exact order state transitions
/// occurred even though discovery callbacks may arrive concurrently.
/// Listener registration uses a copy-on-write snapshot per dispatch to
/// avoid mutation-during-iteration hazards (spec.md §9).
pub struct Dispatcher {
    sender: Sender<RouteEvent>,
    listeners: Arc<Mutex<Vec<Arc<dyn RouteListener>>>>,
    worker: Option<thread::JoinHandle<()>>,
}

const DISPATCH_QUEUE_CAPACITY: usize = 4096;

impl Dispatcher {
    pub fn new() -> Self {
        let (sender, receiver): (Sender<RouteEvent>, Receiver<RouteEvent>) =
            crossbeam_channel::bounded(DISPATCH_QUEUE_CAPACITY);
        let listeners: Arc<Mutex<Vec<Arc<dyn RouteListener>>>> = Arc::new(Mutex::new(Vec::new()));
        let worker_listeners = listeners.clone();

        let worker = thread::Builder::new()
            .name("routing-controller-dispatcher".into())
            .spawn(move || {
                for event in receiver.iter() {
                    let snapshot: Vec<Arc<dyn RouteListener>> = worker_listeners.lock().unwrap().clone();
                    for listener in &snapshot {
                        let listener = listener.clone();
                        let event = event.clone();
                        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                            dispatch_one(listener.as_ref(), &event)
                        }));
                        if outcome.is_err() {
                            log::error!("route listener panicked while handling {:?}", event);
                        }
                    }
                }
            })
            .expect("failed to spawn dispatcher thread");

        Dispatcher {
            sender,
            listeners,
            worker: Some(worker),
        }
    }

    pub fn register(&self, listener: Arc<dyn RouteListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn dispatch(&self, event: RouteEvent) {
        if let Err(e) = self.sender.try_send(event) {
            log::error!("dispatcher queue overflow, dropping event: {:?}", e.into_inner());
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Dropping `sender` closes the channel, so the worker's `for
        // event in receiver.iter()` loop ends. Per spec.md §5, shutdown
        // is forceful and in-flight dispatch is best-effort; we still
        // join here since the dispatcher never blocks for long.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn expand_partitions(partitions: &[String]) -> Vec<String> {
    if partitions.is_empty() {
        vec![String::new()]
    } else {
        partitions.to_vec()
    }
}

#[derive(Default)]
struct TrackerState {
    map: HashMap<Session, HashMap<TopicRoute, HashMap<Handle, usize>>>,
}

impl TrackerState {
    fn insert_handle(&mut self, session: Session, route: TopicRoute, handle: Handle) -> Vec<RouteEvent> {
        let mut events = Vec::new();

        let is_new_session = !self.map.contains_key(&session);
        let routes = self.map.entry(session.clone()).or_default();
        if is_new_session {
            events.push(RouteEvent::CreateSession(session.clone()));
        }

        let is_new_route = !routes.contains_key(&route);
        let handles = routes.entry(route.clone()).or_default();
        if is_new_route {
            events.push(RouteEvent::CreateTopicRoute(session, route));
        }

        *handles.entry(handle).or_insert(0) += 1;
        events
    }

    fn remove_handle(&mut self, session: &Session, route: &TopicRoute, handle: Handle) -> Vec<RouteEvent> {
        let mut events = Vec::new();

        let Some(routes) = self.map.get_mut(session) else {
            return events;
        };
        let Some(handles) = routes.get_mut(route) else {
            return events;
        };

        // A lost event for a handle not present is tolerated silently
        // (duplicate-lost delivery, spec.md §7).
        if let Some(count) = handles.get_mut(&handle) {
            *count -= 1;
            if *count == 0 {
                handles.remove(&handle);
            }
        }

        if handles.is_empty() {
            routes.remove(route);
            events.push(RouteEvent::DeleteTopicRoute(session.clone(), route.clone()));
        }

        if routes.is_empty() {
            self.map.remove(session);
            events.push(RouteEvent::DeleteSession(session.clone()));
        }

        events
    }

    #[cfg(test)]
    fn handle_count(&self, session: &Session, route: &TopicRoute, handle: Handle) -> usize {
        self.map
            .get(session)
            .and_then(|routes| routes.get(route))
            .and_then(|handles| handles.get(&handle))
            .copied()
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.map.len()
    }

    #[cfg(test)]
    fn route_count(&self, session: &Session) -> usize {
        self.map.get(session).map(HashMap::len).unwrap_or(0)
    }
}

/// The Observer: maintains `M : Session -> (TopicRoute -> multiset<Handle>)`
/// under a single mutex and emits lifecycle transitions through the
/// dispatcher in state-transition order.
pub struct Tracker {
    state: Mutex<TrackerState>,
    filters: FilterChain,
    dispatcher: Dispatcher,
}

impl Tracker {
    pub fn new(filters: FilterChain, dispatcher: Dispatcher) -> Self {
        Tracker {
            state: Mutex::new(TrackerState::default()),
            filters,
            dispatcher,
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn RouteListener>) {
        self.dispatcher.register(listener);
    }

    pub fn on_publication_discovered(&self, event: DiscoveryEvent) {
        self.on_discovered(event)
    }

    pub fn on_publication_lost(&self, event: DiscoveryEvent) {
        self.on_lost(event)
    }

    pub fn on_subscription_discovered(&self, event: DiscoveryEvent) {
        self.on_discovered(event)
    }

    pub fn on_subscription_lost(&self, event: DiscoveryEvent) {
        self.on_lost(event)
    }

    fn ignored(&self, direction: Direction, data: &RawEndpointData) -> bool {
        match direction {
            Direction::Out => self.filters.ignore_publication(data),
            Direction::In => self.filters.ignore_subscription(data),
        }
    }

    fn on_discovered(&self, event: DiscoveryEvent) {
        if self.ignored(event.direction, &event.data) {
            return;
        }

        for partition in expand_partitions(&event.data.partitions) {
            if self.filters.ignore_partition(&partition) {
                continue;
            }
            let session = Session::new(event.data.topic_name.clone(), partition);
            let route = TopicRoute::new(event.direction, event.data.topic_name.clone(), event.data.type_name.clone());

            // The lock is held across both the mutation and the dispatch
            // so that racing callbacks for the same identity enqueue in
            // the same order they mutated `M` (spec.md §5, §3 I4);
            // `dispatch` is a non-blocking `try_send`, so this doesn't
            // extend the critical section meaningfully.
            let mut state = self.state.lock().unwrap();
            let events = state.insert_handle(session, route, event.handle);
            for route_event in events {
                self.dispatcher.dispatch(route_event);
            }
        }
    }

    fn on_lost(&self, event: DiscoveryEvent) {
        if self.ignored(event.direction, &event.data) {
            return;
        }

        // A partition filtered out on a lost event is skipped, not used
        // to short-circuit the remaining partitions (spec.md §4.2, §9).
        for partition in expand_partitions(&event.data.partitions) {
            if self.filters.ignore_partition(&partition) {
                continue;
            }
            let session = Session::new(event.data.topic_name.clone(), partition);
            let route = TopicRoute::new(event.direction, event.data.topic_name.clone(), event.data.type_name.clone());

            // See the matching comment in `on_discovered`: the lock spans
            // the dispatch calls too, so enqueue order always matches
            // mutation order.
            let mut state = self.state.lock().unwrap();
            let events = state.remove_handle(&session, &route, event.handle);
            for route_event in events {
                self.dispatcher.dispatch(route_event);
            }
        }
    }

    #[cfg(test)]
    fn handle_count(&self, session: &Session, route: &TopicRoute, handle: Handle) -> usize {
        self.state.lock().unwrap().handle_count(session, route, handle)
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.state.lock().unwrap().session_count()
    }

    #[cfg(test)]
    fn route_count(&self, session: &Session) -> usize {
        self.state.lock().unwrap().route_count(session)
    }
}
