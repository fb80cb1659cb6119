use std::cmp::Reverse;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::ClusterConfig;
use crate::ClusterError;
use crate::Document;
use crate::NodeId;
use crate::Role;
use crate::StepDownAck;
use crate::WriteAck;

#[derive(Debug, Clone)]
pub(super) struct OpEntry {
    pub(super) document: Document,
    pub(super) written_at: Instant,
}

#[derive(Debug)]
pub(super) struct NodeState {
    pub(super) id: NodeId,
    pub(super) address: String,
    pub(super) role: Role,
    /// Number of op log entries applied; op indexes start at 1
    pub(super) applied: u64,
    pub(super) ineligible_until: Option<Instant>,
}

/// Replica set bookkeeping behind one lock.
///
/// The op log is the current leader's; followers track how far into it they
/// have applied.
#[derive(Debug)]
pub(super) struct ClusterState {
    pub(super) term: u64,
    pub(super) nodes: Vec<NodeState>,
    pub(super) oplog: Vec<OpEntry>,
}

impl ClusterState {
    /// Node 1 starts as leader in term 1.
    pub(super) fn bootstrap(settings: &ClusterConfig) -> Self {
        let nodes = (1..=settings.node_count as NodeId)
            .map(|id| NodeState {
                id,
                address: settings.node_address(id),
                role: if id == 1 { Role::Leader } else { Role::Follower },
                applied: 0,
                ineligible_until: None,
            })
            .collect();

        Self {
            term: 1,
            nodes,
            oplog: Vec::new(),
        }
    }

    pub(super) fn node(
        &self,
        id: NodeId,
    ) -> Result<&NodeState, ClusterError> {
        self.nodes.iter().find(|n| n.id == id).ok_or(ClusterError::UnknownNode(id))
    }

    fn node_mut(
        &mut self,
        id: NodeId,
    ) -> Result<&mut NodeState, ClusterError> {
        self.nodes.iter_mut().find(|n| n.id == id).ok_or(ClusterError::UnknownNode(id))
    }

    pub(super) fn leader_id(&self) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.role == Role::Leader).map(|n| n.id)
    }

    pub(super) fn is_leader(
        &self,
        id: NodeId,
    ) -> bool {
        self.leader_id() == Some(id)
    }

    pub(super) fn last_index(&self) -> u64 {
        self.oplog.len() as u64
    }

    /// Appends a write on the leader.
    pub(super) fn append(
        &mut self,
        node: NodeId,
        document: Document,
        now: Instant,
    ) -> Result<WriteAck, ClusterError> {
        self.node(node)?;
        if !self.is_leader(node) {
            return Err(ClusterError::NotLeader(node));
        }

        self.oplog.push(OpEntry {
            document,
            written_at: now,
        });
        let op_index = self.last_index();
        self.node_mut(node)?.applied = op_index;

        Ok(WriteAck {
            op_index,
            acknowledged: 1,
        })
    }

    /// Documents visible on `node`, in op log order.
    pub(super) fn documents_on(
        &self,
        node: NodeId,
    ) -> Result<Vec<Document>, ClusterError> {
        let applied = self.node(node)?.applied as usize;
        Ok(self.oplog[..applied].iter().map(|op| op.document.clone()).collect())
    }

    /// Nodes, leader included, that applied op `index`.
    pub(super) fn acknowledgments(
        &self,
        index: u64,
    ) -> usize {
        self.nodes.iter().filter(|n| n.applied >= index).count()
    }

    pub(super) fn fully_replicated(&self) -> bool {
        let last = self.last_index();
        self.nodes.iter().all(|n| n.applied >= last)
    }

    /// Brings a follower up to the leader's op log. Returns whether anything changed.
    pub(super) fn replicate(
        &mut self,
        node: NodeId,
    ) -> bool {
        if self.leader_id().is_none() || self.is_leader(node) {
            return false;
        }
        let last = self.last_index();
        match self.node_mut(node) {
            Ok(n) if n.applied != last => {
                debug!("node {} applied ops {}..={}", n.id, n.applied + 1, last);
                n.applied = last;
                true
            }
            _ => false,
        }
    }

    /// Relinquishes leadership on `node`.
    ///
    /// Refused unless some follower's last applied write is within `window` of
    /// the leader's last write.
    pub(super) fn step_down(
        &mut self,
        node: NodeId,
        now: Instant,
        window: Duration,
        ineligible_for: Duration,
    ) -> Result<StepDownAck, ClusterError> {
        self.node(node)?;
        if !self.is_leader(node) {
            return Err(ClusterError::NotLeader(node));
        }

        let Some(last) = self.oplog.last() else {
            return Err(ClusterError::NoElectableFollower { window });
        };
        let electable = self.nodes.iter().filter(|n| n.id != node && n.applied > 0).any(|n| {
            let applied = &self.oplog[(n.applied - 1) as usize];
            last.written_at.saturating_duration_since(applied.written_at) <= window
        });
        if !electable {
            return Err(ClusterError::NoElectableFollower { window });
        }

        let term = self.term;
        let n = self.node_mut(node)?;
        n.role = Role::Follower;
        n.ineligible_until = Some(now + ineligible_for);

        Ok(StepDownAck { node, term })
    }

    /// Promotes the most up-to-date eligible node when there is no leader.
    ///
    /// Writes the winner never applied are rolled back.
    pub(super) fn elect(
        &mut self,
        now: Instant,
        is_frozen: impl Fn(NodeId) -> bool,
    ) -> Option<NodeId> {
        if self.leader_id().is_some() {
            return None;
        }

        let winner = self
            .nodes
            .iter()
            .filter(|n| !is_frozen(n.id))
            .filter(|n| n.ineligible_until.map_or(true, |until| now >= until))
            .max_by_key(|n| (n.applied, Reverse(n.id)))
            .map(|n| (n.id, n.applied))?;
        let (id, applied) = winner;

        if applied < self.last_index() {
            warn!(
                "node {} elected without ops {}..={}; rolling them back",
                id,
                applied + 1,
                self.last_index()
            );
            self.oplog.truncate(applied as usize);
        }

        self.term += 1;
        for n in self.nodes.iter_mut() {
            n.applied = n.applied.min(applied);
            if n.id == id {
                n.role = Role::Leader;
                n.ineligible_until = None;
            }
        }

        Some(id)
    }
}
