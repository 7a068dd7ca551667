//! Membership lifecycle facade

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::address::split_host_port;
use crate::config::MembershipConfig;
use crate::error::Error;
use crate::event::GossipEvent;
use crate::event_loop::{EventLoop, LoopState};
use crate::handler::{MemberHandler, NoopHandler};
use crate::member::Member;
use crate::registry::MemberRegistry;
use crate::transport::{GossipTransport, TransportConfig};

/// How long `stop` waits for the event loop to drain
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// State held while the membership is running
struct Running<T> {
    transport: Arc<T>,
    events: mpsc::Sender<GossipEvent>,
    event_loop: JoinHandle<()>,
    loop_state: Arc<watch::Sender<LoopState>>,
}

/// A node's view of cluster membership.
///
/// Owns the gossip transport and the event loop that feeds the member
/// registry. Reads go straight to the registry and never wait on the loop.
pub struct Membership<T>
where
    T: GossipTransport,
{
    config: MembershipConfig,
    options: T::Options,
    handler: Arc<dyn MemberHandler>,
    registry: MemberRegistry,
    tags: RwLock<HashMap<String, String>>,
    span: Span,
    running: Mutex<Option<Running<T>>>,
    loop_state: RwLock<Option<watch::Receiver<LoopState>>>,
}

impl<T> Membership<T>
where
    T: GossipTransport,
{
    /// Create a membership that has not been started yet
    pub fn new(config: MembershipConfig, options: T::Options) -> Self {
        let span = info_span!("membership", node_id = %config.node_id);
        let tags = RwLock::new(config.tags.clone());

        Self {
            config,
            options,
            handler: Arc::new(NoopHandler),
            registry: MemberRegistry::new(),
            tags,
            span,
            running: Mutex::new(None),
            loop_state: RwLock::new(None),
        }
    }

    /// Install a member handler, builder style
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn MemberHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Use `span` as the parent of every record this membership logs
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Install a member handler, used from the next `start`
    pub fn set_handler(&mut self, handler: Arc<dyn MemberHandler>) {
        self.handler = handler;
    }

    /// Get this node's id
    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    /// Get the shared member registry
    pub const fn registry(&self) -> &MemberRegistry {
        &self.registry
    }

    /// All currently known members, including this node
    pub fn members(&self) -> Vec<Member> {
        self.registry.list()
    }

    /// This node's registered entry, `None` until the transport reported it
    pub fn local_member(&self) -> Option<Member> {
        self.registry.get(&self.config.node_id)
    }

    /// Current event loop state, `None` if never started
    pub fn loop_state(&self) -> Option<LoopState> {
        self.loop_state.read().as_ref().map(|state| *state.borrow())
    }

    /// Subscribe to event loop state changes of the current run
    pub fn subscribe_state(&self) -> Option<watch::Receiver<LoopState>> {
        self.loop_state.read().clone()
    }

    /// Start the transport and the event loop, then join configured seeds.
    ///
    /// A failed seed join is logged and does not fail the start.
    ///
    /// # Errors
    ///
    /// Returns an error if an address cannot be parsed, the transport cannot
    /// be created, or the membership is already running.
    pub async fn start(&self) -> Result<(), Error> {
        self.start_inner().instrument(self.span.clone()).await
    }

    async fn start_inner(&self) -> Result<(), Error> {
        let transport = {
            let mut running = self.running.lock().await;
            if running.is_some() {
                return Err(Error::AlreadyStarted);
            }

            let advertise = split_host_port(&self.config.advertise_addr)?;
            let bind = split_host_port(&self.config.bind_addr)?;

            let transport_config = TransportConfig {
                node_name: self.config.node_id.clone(),
                bind,
                advertise,
                tags: self.tags.read().clone(),
            };

            // members from a previous run are not reported again by a new transport
            self.registry.clear();

            let (events_tx, events_rx) = mpsc::channel(self.config.event_capacity());
            let (event_loop, state) =
                EventLoop::new(events_rx, self.registry.clone(), self.handler.clone());
            let loop_state = event_loop.state_sender();
            let event_loop = tokio::spawn(event_loop.run().instrument(self.span.clone()));
            *self.loop_state.write() = Some(state);

            let transport =
                match T::create(self.options.clone(), transport_config, events_tx.clone()).await {
                    Ok(transport) => Arc::new(transport),
                    Err(e) => {
                        drop(events_tx);
                        if let Err(join_error) = event_loop.await {
                            error!("membership event loop panicked: {}", join_error);
                        }
                        return Err(Error::TransportCreate(Box::new(e)));
                    }
                };

            *running = Some(Running {
                transport: transport.clone(),
                events: events_tx,
                event_loop,
                loop_state,
            });

            transport
        };

        info!(
            "membership started, addr: {}, advertise: {}",
            self.config.bind_addr, self.config.advertise_addr
        );

        if !self.config.seeds.is_empty() {
            match transport.join(&self.config.seeds, false).await {
                Ok(contacted) => info!("joined cluster through {} seeds", contacted),
                Err(e) => warn!("failed to join seeds {:?}: {}", self.config.seeds, e),
            }
        }

        Ok(())
    }

    /// Join a cluster through `seeds`, replaying the cluster's history.
    ///
    /// Returns the number of seeds contacted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] before `start`, or [`Error::Join`] with
    /// the transport's error if no seed could be reached.
    pub async fn join(&self, seeds: &[String]) -> Result<usize, Error> {
        async {
            let transport = self.transport().await?;
            let contacted = transport
                .join(seeds, false)
                .await
                .map_err(|e| Error::Join(Box::new(e)))?;

            info!("joined cluster through {} of {} seeds", contacted, seeds.len());
            Ok(contacted)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Leave the cluster gracefully, so peers see a leave rather than a failure
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] before `start`, or [`Error::Leave`].
    pub async fn leave(&self) -> Result<(), Error> {
        async {
            let transport = self.transport().await?;
            transport
                .leave()
                .await
                .map_err(|e| Error::Leave(Box::new(e)))?;

            info!("left cluster");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Replace the tags gossiped for this node
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] before `start`, or [`Error::SetTags`].
    pub async fn update_tags(&self, tags: HashMap<String, String>) -> Result<(), Error> {
        async {
            let transport = self.transport().await?;
            transport
                .set_tags(tags.clone())
                .await
                .map_err(|e| Error::SetTags(Box::new(e)))?;

            debug!("updated tags to {:?}", tags);
            *self.tags.write() = tags;
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Shut down the transport and wait for the event loop to stop.
    ///
    /// Safe to call at any point of the lifecycle, any number of times.
    pub async fn stop(&self) {
        self.stop_inner().instrument(self.span.clone()).await;
    }

    async fn stop_inner(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!("membership not running, nothing to stop");
            return;
        };

        let Running {
            transport,
            events,
            mut event_loop,
            loop_state,
        } = running;

        if let Err(e) = transport.shutdown().await {
            warn!("failed to shut down gossip transport: {}", e);
        }
        drop(events);

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut event_loop).await {
            Ok(Ok(())) => debug!("membership event loop completed"),
            Ok(Err(e)) => error!("membership event loop panicked: {}", e),
            Err(_) => {
                warn!("membership event loop did not drain within timeout, aborting");
                event_loop.abort();
                if let Err(e) = (&mut event_loop).await {
                    debug!("membership event loop aborted: {}", e);
                }
            }
        }

        // a loop that panicked or was aborted never published this itself
        loop_state.send_replace(LoopState::Stopped);
        self.registry.clear();
        info!("membership stopped");
    }

    async fn transport(&self) -> Result<Arc<T>, Error> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| running.transport.clone())
            .ok_or(Error::NotStarted)
    }
}

impl<T> Debug for Membership<T>
where
    T: GossipTransport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Membership")
            .field("node_id", &self.config.node_id)
            .field("members", &self.registry.len())
            .finish_non_exhaustive()
    }
}
