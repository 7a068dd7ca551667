//! Sequential consumer of gossip events.
//!
//! The loop is the only writer of the [`MemberRegistry`]. Events are applied
//! strictly in arrival order, one member at a time:
//!
//! ```text
//! Idle ──event──> Processing ──done──> Idle
//!   │
//!   └──channel closed and drained──> Stopped
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::event::{GossipEvent, MemberEvent, MemberEventKind};
use crate::handler::MemberHandler;
use crate::member::Member;
use crate::registry::MemberRegistry;
use crate::translate::EventTranslator;

/// Lifecycle state of the event loop
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoopState {
    /// Waiting for the next event
    #[default]
    Idle,
    /// Applying an event
    Processing,
    /// Channel closed and drained, terminal
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Processing => write!(f, "processing"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Applies gossip events to a registry, consulting a handler.
pub struct EventLoop {
    events: mpsc::Receiver<GossipEvent>,
    registry: MemberRegistry,
    handler: Arc<dyn MemberHandler>,
    state: Arc<watch::Sender<LoopState>>,
}

impl EventLoop {
    /// Create a loop and a receiver for its state
    #[must_use]
    pub fn new(
        events: mpsc::Receiver<GossipEvent>,
        registry: MemberRegistry,
        handler: Arc<dyn MemberHandler>,
    ) -> (Self, watch::Receiver<LoopState>) {
        let (state, state_rx) = watch::channel(LoopState::Idle);

        (
            Self {
                events,
                registry,
                handler,
                state: Arc::new(state),
            },
            state_rx,
        )
    }

    /// Handle to the published state.
    ///
    /// Lets the owner mark the loop `Stopped` when the task is aborted
    /// before it could finish on its own.
    #[must_use]
    pub fn state_sender(&self) -> Arc<watch::Sender<LoopState>> {
        self.state.clone()
    }

    /// Consume events until the channel is closed and drained
    pub async fn run(mut self) {
        debug!("membership event loop running");

        while let Some(event) = self.events.recv().await {
            self.state.send_replace(LoopState::Processing);
            self.process(event).await;
            self.state.send_replace(LoopState::Idle);
        }

        self.state.send_replace(LoopState::Stopped);
        info!("membership event loop stopped");
    }

    async fn process(&self, event: GossipEvent) {
        match event {
            GossipEvent::Member(event) => self.process_member_event(&event).await,
            GossipEvent::User(event) => {
                debug!("ignoring user event {}", event.name);
            }
        }
    }

    async fn process_member_event(&self, event: &MemberEvent) {
        for member in EventTranslator::translate(event) {
            debug!("{} {} at {}", event.kind, member.id, member.addr);

            match event.kind {
                MemberEventKind::Join => self.apply_join(member).await,
                MemberEventKind::Update => self.apply_update(member).await,
                MemberEventKind::Leave | MemberEventKind::Failed => self.apply_leave(member).await,
                MemberEventKind::Reap => debug!("ignoring reap of {}", member.id),
            }
        }
    }

    async fn apply_join(&self, member: Member) {
        if let Err(e) = self.handler.on_member_join(&member).await {
            error!("failed to handle member join of {}: {}", member.id, e);
        }
        self.registry.upsert(member);
    }

    async fn apply_update(&self, member: Member) {
        if let Err(e) = self.handler.on_member_update(&member).await {
            error!("failed to handle member update of {}: {}", member.id, e);
        }
        self.registry.upsert(member);
    }

    async fn apply_leave(&self, member: Member) {
        self.registry.remove(&member.id);
        if let Err(e) = self.handler.on_member_leave(&member).await {
            error!("failed to handle member leave of {}: {}", member.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tracing_test::traced_test;

    use super::*;
    use crate::event::{PeerDescriptor, UserEvent};
    use crate::handler::{HandlerError, NoopHandler};
    use crate::member::TAG_GROUP;

    #[derive(Clone, Debug, Eq, PartialEq)]
    struct Call {
        hook: &'static str,
        id: String,
        registered_before: bool,
    }

    struct RecordingHandler {
        registry: MemberRegistry,
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(registry: MemberRegistry, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                registry,
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn record(&self, hook: &'static str, member: &Member) -> Result<(), HandlerError> {
            self.calls.lock().unwrap().push(Call {
                hook,
                id: member.id.clone(),
                registered_before: self.registry.contains(&member.id),
            });

            if self.fail {
                Err(format!("{hook} rejected {}", member.id).into())
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MemberHandler for RecordingHandler {
        async fn on_member_join(&self, member: &Member) -> Result<(), HandlerError> {
            self.record("join", member)
        }

        async fn on_member_update(&self, member: &Member) -> Result<(), HandlerError> {
            self.record("update", member)
        }

        async fn on_member_leave(&self, member: &Member) -> Result<(), HandlerError> {
            self.record("leave", member)
        }
    }

    fn peer(name: &str, group: &str) -> PeerDescriptor {
        PeerDescriptor {
            name: name.to_string(),
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
            port: 7946,
            tags: HashMap::from([(TAG_GROUP.to_string(), group.to_string())]),
        }
    }

    fn event(kind: MemberEventKind, peers: Vec<PeerDescriptor>) -> GossipEvent {
        MemberEvent::new(kind, peers).into()
    }

    fn new_loop(
        registry: &MemberRegistry,
        handler: Arc<dyn MemberHandler>,
    ) -> (EventLoop, mpsc::Sender<GossipEvent>) {
        let (tx, rx) = mpsc::channel(3);
        let (event_loop, _) = EventLoop::new(rx, registry.clone(), handler);
        (event_loop, tx)
    }

    #[tokio::test]
    async fn test_join_without_handler_matches_payload() {
        let registry = MemberRegistry::new();
        let (event_loop, _tx) = new_loop(&registry, Arc::new(NoopHandler));

        let p1 = peer("p1", "a");
        event_loop
            .process(event(MemberEventKind::Join, vec![p1.clone()]))
            .await;

        let member = registry.get("p1").unwrap();
        assert_eq!(member.addr, "10.0.0.7:7946");
        assert_eq!(member.advertise, "10.0.0.7:7946");
        assert_eq!(member.tags(), &p1.tags);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_join_and_update_fail_open() {
        let registry = MemberRegistry::new();
        let handler = RecordingHandler::new(registry.clone(), true);
        let (event_loop, _tx) = new_loop(&registry, handler.clone());

        event_loop
            .process(event(MemberEventKind::Join, vec![peer("p1", "a")]))
            .await;
        assert_eq!(registry.get("p1").unwrap().group(), Some("a"));

        event_loop
            .process(event(MemberEventKind::Update, vec![peer("p1", "b")]))
            .await;
        assert_eq!(registry.get("p1").unwrap().group(), Some("b"));

        assert_eq!(
            handler.calls(),
            vec![
                Call {
                    hook: "join",
                    id: "p1".to_string(),
                    registered_before: false,
                },
                Call {
                    hook: "update",
                    id: "p1".to_string(),
                    registered_before: true,
                },
            ]
        );

        assert!(logs_contain("failed to handle member join of p1"));
        assert!(logs_contain("failed to handle member update of p1"));
    }

    #[tokio::test]
    async fn test_hook_runs_before_registration() {
        let registry = MemberRegistry::new();
        let handler = RecordingHandler::new(registry.clone(), false);
        let (event_loop, _tx) = new_loop(&registry, handler.clone());

        event_loop
            .process(event(MemberEventKind::Join, vec![peer("p1", "a")]))
            .await;

        assert_eq!(handler.calls().len(), 1);
        assert!(!handler.calls()[0].registered_before);
        assert!(registry.contains("p1"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_leave_and_failed_remove_before_hook() {
        let registry = MemberRegistry::new();
        let handler = RecordingHandler::new(registry.clone(), true);
        let (event_loop, _tx) = new_loop(&registry, handler.clone());

        event_loop
            .process(event(
                MemberEventKind::Join,
                vec![peer("p1", "a"), peer("p2", "a")],
            ))
            .await;
        event_loop
            .process(event(MemberEventKind::Leave, vec![peer("p1", "a")]))
            .await;
        event_loop
            .process(event(MemberEventKind::Failed, vec![peer("p2", "a")]))
            .await;

        assert!(registry.get("p1").is_none());
        assert!(registry.get("p2").is_none());

        let leaves: Vec<_> = handler
            .calls()
            .into_iter()
            .filter(|call| call.hook == "leave")
            .collect();
        assert_eq!(leaves.len(), 2);
        assert!(leaves.iter().all(|call| !call.registered_before));
        assert!(logs_contain("failed to handle member leave of p2"));
    }

    #[tokio::test]
    async fn test_leave_of_unknown_member_is_noop() {
        let registry = MemberRegistry::new();
        let (event_loop, _tx) = new_loop(&registry, Arc::new(NoopHandler));

        event_loop
            .process(event(MemberEventKind::Leave, vec![peer("ghost", "a")]))
            .await;

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_join_leave_join_equals_last_join() {
        let registry = MemberRegistry::new();
        let (event_loop, _tx) = new_loop(&registry, Arc::new(NoopHandler));

        event_loop
            .process(event(MemberEventKind::Join, vec![peer("p1", "a")]))
            .await;
        event_loop
            .process(event(MemberEventKind::Leave, vec![peer("p1", "a")]))
            .await;
        event_loop
            .process(event(MemberEventKind::Join, vec![peer("p1", "c")]))
            .await;

        let only_last = MemberRegistry::new();
        only_last.upsert(EventTranslator::translate_peer(&peer("p1", "c")));

        assert_eq!(registry.list(), only_last.list());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_reap_and_user_events_ignored() {
        let registry = MemberRegistry::new();
        let handler = RecordingHandler::new(registry.clone(), false);
        let (event_loop, _tx) = new_loop(&registry, handler.clone());

        event_loop
            .process(event(MemberEventKind::Join, vec![peer("p1", "a")]))
            .await;
        event_loop
            .process(event(MemberEventKind::Reap, vec![peer("p1", "a")]))
            .await;
        event_loop
            .process(GossipEvent::User(UserEvent {
                name: "deploy".to_string(),
                payload: Bytes::from_static(b"v2"),
                coalesce: false,
            }))
            .await;

        assert!(registry.contains("p1"));
        assert_eq!(handler.calls().len(), 1);
        assert!(logs_contain("ignoring reap of p1"));
        assert!(logs_contain("ignoring user event deploy"));
    }

    #[tokio::test]
    async fn test_run_drains_then_stops() {
        let registry = MemberRegistry::new();
        let (tx, rx) = mpsc::channel(3);
        let (event_loop, state) = EventLoop::new(rx, registry.clone(), Arc::new(NoopHandler));

        tx.send(event(MemberEventKind::Join, vec![peer("p1", "a")]))
            .await
            .unwrap();
        tx.send(event(MemberEventKind::Update, vec![peer("p1", "b")]))
            .await
            .unwrap();
        tx.send(event(MemberEventKind::Leave, vec![peer("p1", "b")]))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(*state.borrow(), LoopState::Idle);
        tokio::spawn(event_loop.run()).await.unwrap();

        assert!(registry.is_empty());
        assert_eq!(*state.borrow(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_run_preserves_arrival_order() {
        let registry = MemberRegistry::new();
        let (tx, rx) = mpsc::channel(3);
        let (event_loop, _state) = EventLoop::new(rx, registry.clone(), Arc::new(NoopHandler));
        let handle = tokio::spawn(event_loop.run());

        for i in 0..20 {
            tx.send(event(
                MemberEventKind::Update,
                vec![peer("p1", &format!("g{i}"))],
            ))
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(registry.get("p1").unwrap().group(), Some("g19"));
    }
}
