//! In-process replica set implementing [`ClusterHandle`].
//!
//! ## Key Responsibilities
//! - Keeps one leader op log that followers pull on a fixed clock
//! - Pauses replication on fsync-locked nodes
//! - Interrupts writes waiting on a write concern when their node loses leadership
//! - Elects a replacement leader once the cluster has been leaderless for
//!   `election_timeout_ms`
//!
//! Every background task is stopped by [`ClusterHandle::shutdown`].

mod state;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use nanoid::nanoid;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio::time::timeout_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use self::state::ClusterState;
use crate::utils::async_task::spawn_task;
use crate::ClusterConfig;
use crate::ClusterError;
use crate::ClusterHandle;
use crate::Document;
use crate::LockToken;
use crate::NodeId;
use crate::NodeInfo;
use crate::ReplicationState;
use crate::Result;
use crate::StepDownAck;
use crate::TeardownReport;
use crate::WriteAck;
use crate::WriteConcernRequest;

pub struct LocalCluster {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

struct Shared {
    settings: ClusterConfig,
    state: Mutex<ClusterState>,
    /// fsync locks by node
    locks: DashMap<NodeId, LockToken>,
    /// Bumped on every state change; waiters re-check on each bump
    changes: watch::Sender<u64>,
    closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> std::result::Result<(), ClusterError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClusterError::Shutdown);
        }
        Ok(())
    }

    fn notify(&self) {
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn is_frozen(
        &self,
        node: NodeId,
    ) -> bool {
        self.locks.contains_key(&node)
    }

    fn replicate_tick(
        &self,
        node: NodeId,
    ) {
        // Checked under the state lock: `insert` appends under it, so a lock
        // published before an append is always seen here.
        let changed = {
            let mut state = self.state.lock();
            !self.is_frozen(node) && state.replicate(node)
        };
        if changed {
            self.notify();
        }
    }

    fn election_tick(&self) {
        let elected = {
            let mut state = self.state.lock();
            state.elect(Instant::now(), |id| self.is_frozen(id)).map(|id| (id, state.term))
        };
        if let Some((id, term)) = elected {
            info!("node {} elected leader for term {}", id, term);
            self.notify();
        }
    }
}

impl LocalCluster {
    /// Boots the replica set with node 1 as leader and starts its background tasks.
    pub async fn start(settings: ClusterConfig) -> Result<Self> {
        settings.validate()?;

        let (changes, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            state: Mutex::new(ClusterState::bootstrap(&settings)),
            locks: DashMap::new(),
            changes,
            closed: AtomicBool::new(false),
            settings,
        });
        let shutdown = CancellationToken::new();
        let mut handles = Vec::new();

        for id in 1..=shared.settings.node_count as NodeId {
            let shared = shared.clone();
            let token = shutdown.clone();
            spawn_task(
                &format!("replication-{id}"),
                move || replication_loop(shared, id, token),
                Some(&mut handles),
            );
        }
        {
            let shared = shared.clone();
            let token = shutdown.clone();
            spawn_task("election", move || election_loop(shared, token), Some(&mut handles));
        }

        info!(
            "local cluster started: {} nodes from {}",
            shared.settings.node_count,
            shared.settings.node_address(1)
        );

        Ok(Self {
            shared,
            tasks: Mutex::new(handles),
            shutdown,
        })
    }

    /// Documents applied on `node`, in op log order.
    pub fn documents_on(
        &self,
        node: NodeId,
    ) -> std::result::Result<Vec<Document>, ClusterError> {
        self.shared.state.lock().documents_on(node)
    }

    pub fn current_term(&self) -> u64 {
        self.shared.state.lock().term
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for LocalCluster {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn replication_loop(
    shared: Arc<Shared>,
    node: NodeId,
    token: CancellationToken,
) -> Result<()> {
    let mut ticker = interval(shared.settings.replication_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("replication loop of node {} stopped", node);
                return Ok(());
            }
            _ = ticker.tick() => shared.replicate_tick(node),
        }
    }
}

async fn election_loop(
    shared: Arc<Shared>,
    token: CancellationToken,
) -> Result<()> {
    let mut ticker = interval(shared.settings.election_timeout());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the bootstrap leader needs no election
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("election loop stopped");
                return Ok(());
            }
            _ = ticker.tick() => shared.election_tick(),
        }
    }
}

#[async_trait]
impl ClusterHandle for LocalCluster {
    async fn topology(&self) -> std::result::Result<Vec<NodeInfo>, ClusterError> {
        self.shared.ensure_open()?;
        let state = self.shared.state.lock();
        Ok(state
            .nodes
            .iter()
            .map(|n| NodeInfo {
                id: n.id,
                address: n.address.clone(),
                role: n.role,
                replication_state: if self.shared.is_frozen(n.id) {
                    ReplicationState::Frozen
                } else {
                    ReplicationState::Active
                },
                applied_index: n.applied,
            })
            .collect())
    }

    async fn leader(&self) -> std::result::Result<NodeId, ClusterError> {
        self.shared.ensure_open()?;
        self.shared.state.lock().leader_id().ok_or(ClusterError::NoLeader)
    }

    async fn insert(
        &self,
        node: NodeId,
        document: Document,
    ) -> std::result::Result<WriteAck, ClusterError> {
        self.shared.ensure_open()?;
        let ack = self.shared.state.lock().append(node, document.clone(), Instant::now())?;
        debug!("node {} accepted {} at op {}", node, document, ack.op_index);
        self.shared.notify();
        Ok(ack)
    }

    async fn fsync_lock(
        &self,
        node: NodeId,
    ) -> std::result::Result<LockToken, ClusterError> {
        self.shared.ensure_open()?;
        self.shared.state.lock().node(node)?;

        let token = match self.shared.locks.entry(node) {
            Entry::Occupied(_) => return Err(ClusterError::AlreadyLocked(node)),
            Entry::Vacant(slot) => slot.insert(LockToken::new(nanoid!())).value().clone(),
        };
        info!("node {} fsync-locked, replication paused", node);
        self.shared.notify();
        Ok(token)
    }

    async fn fsync_unlock(
        &self,
        node: NodeId,
        token: LockToken,
    ) -> std::result::Result<(), ClusterError> {
        self.shared.ensure_open()?;
        self.shared.state.lock().node(node)?;

        if self.shared.locks.remove_if(&node, |_, held| *held == token).is_none() {
            return Err(if self.shared.is_frozen(node) {
                ClusterError::LockTokenMismatch(node)
            } else {
                ClusterError::NotLocked(node)
            });
        }
        info!("node {} unlocked, replication resumes", node);
        self.shared.notify();
        Ok(())
    }

    async fn await_replication(
        &self,
        timeout: Duration,
    ) -> std::result::Result<bool, ClusterError> {
        let mut rx = self.shared.changes.subscribe();
        let deadline = Instant::now() + timeout;
        loop {
            self.shared.ensure_open()?;
            if self.shared.state.lock().fully_replicated() {
                return Ok(true);
            }
            match timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(ClusterError::Shutdown),
                Err(_) => {
                    warn!("replication did not complete within {:?}", timeout);
                    return Ok(false);
                }
            }
        }
    }

    async fn step_down(
        &self,
        node: NodeId,
    ) -> std::result::Result<StepDownAck, ClusterError> {
        self.shared.ensure_open()?;
        let settings = &self.shared.settings;
        let ack = self.shared.state.lock().step_down(
            node,
            Instant::now(),
            settings.step_down_catchup_window(),
            settings.step_down_ineligible(),
        )?;
        info!(
            "node {} stepped down in term {}, ineligible for {:?}",
            node,
            ack.term,
            settings.step_down_ineligible()
        );
        self.shared.notify();
        Ok(ack)
    }

    async fn acknowledged_write(
        &self,
        node: NodeId,
        concern: WriteConcernRequest,
    ) -> std::result::Result<WriteAck, ClusterError> {
        self.shared.ensure_open()?;
        let mut rx = self.shared.changes.subscribe();

        let (op_index, start_term) = {
            let state = self.shared.state.lock();
            state.node(node)?;
            let node_count = state.nodes.len();
            if concern.acknowledgment_count() > node_count {
                return Err(ClusterError::UnsatisfiableWriteConcern {
                    required: concern.acknowledgment_count(),
                    node_count,
                });
            }
            if !state.is_leader(node) {
                return Err(ClusterError::NotLeader(node));
            }
            (state.last_index(), state.term)
        };
        debug!("node {} waiting for op {} to reach {}", node, op_index, concern);

        let deadline = Instant::now() + concern.timeout();
        loop {
            self.shared.ensure_open()?;
            let acknowledged = {
                let state = self.shared.state.lock();
                if !state.is_leader(node) || state.term != start_term {
                    return Err(ClusterError::InterruptedDueToStepDown {
                        node,
                        previous_term: start_term,
                        current_term: state.term,
                    });
                }
                state.acknowledgments(op_index)
            };
            if acknowledged >= concern.acknowledgment_count() {
                return Ok(WriteAck {
                    op_index,
                    acknowledged,
                });
            }

            match timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(ClusterError::Shutdown),
                Err(_) => {
                    return Err(ClusterError::WriteConcernTimeout {
                        acknowledged: self.shared.state.lock().acknowledgments(op_index),
                        required: concern.acknowledgment_count(),
                        timeout: concern.timeout(),
                    });
                }
            }
        }
    }

    async fn shutdown(&self) -> std::result::Result<TeardownReport, ClusterError> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Err(ClusterError::Shutdown);
        }
        self.shutdown.cancel();
        // wake writers still waiting on a write concern
        self.shared.notify();

        let handles = std::mem::take(&mut *self.tasks.lock());
        let tasks_stopped = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("background task did not stop cleanly: {:?}", e);
            }
        }

        let mut locked_nodes: Vec<NodeId> = self.shared.locks.iter().map(|e| *e.key()).collect();
        locked_nodes.sort_unstable();
        self.shared.locks.clear();
        if !locked_nodes.is_empty() {
            warn!("nodes {:?} were still fsync-locked at shutdown", locked_nodes);
        }

        info!("local cluster stopped ({} background tasks)", tasks_stopped);
        Ok(TeardownReport {
            locked_nodes,
            tasks_stopped,
        })
    }
}
