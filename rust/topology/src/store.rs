// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapshot storage and optimistic transactions.
//!
//! Committed state is an immutable [`TopologyData`] behind an `Arc`. Edits run
//! in a [`Transaction`] that overlays staged rows on a snapshot and records
//! every row and table it reads. At commit the read and write sets are
//! checked against row versions published after the snapshot; any overlap is
//! a [`Error::ConcurrencyConflict`] and nothing is applied.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::ids::{DirectedEdge, EdgeId, EntityRef, FaceId, LayerId, NodeId, TopoGeomId};
use crate::primitives::{Edge, Face, Layer, Node, Relation};

/// Committed rows of one topology.
#[derive(Debug, Clone, Default)]
pub struct TopologyData {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) edges: BTreeMap<EdgeId, Edge>,
    pub(crate) faces: BTreeMap<FaceId, Face>,
    pub(crate) layers: BTreeMap<LayerId, Layer>,
    pub(crate) relations: BTreeSet<Relation>,

    /// Node -> incident edges (upward adjacency)
    pub(crate) node_edges: FxHashMap<NodeId, FxHashSet<EdgeId>>,
}

impl TopologyData {
    /// Empty data holding only the universal face.
    pub fn new() -> Self {
        let mut data = Self::default();
        data.faces.insert(
            FaceId::UNIVERSAL,
            Face {
                id: FaceId::UNIVERSAL,
                mbr: None,
            },
        );
        data
    }

    fn link_edge(&mut self, edge: &Edge) {
        for node in [edge.start_node, edge.end_node] {
            self.node_edges.entry(node).or_default().insert(edge.id);
        }
    }

    fn unlink_edge(&mut self, edge: &Edge) {
        for node in [edge.start_node, edge.end_node] {
            if let Some(set) = self.node_edges.get_mut(&node) {
                set.remove(&edge.id);
                if set.is_empty() {
                    self.node_edges.remove(&node);
                }
            }
        }
    }

    /// Inserts or replaces an edge keeping the incidence index current.
    pub(crate) fn insert_edge(&mut self, edge: Edge) {
        if let Some(old) = self.edges.remove(&edge.id) {
            self.unlink_edge(&old);
        }
        self.link_edge(&edge);
        self.edges.insert(edge.id, edge);
    }

    pub(crate) fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let old = self.edges.remove(&id)?;
        self.unlink_edge(&old);
        Some(old)
    }

    fn relation_range(&self, layer: LayerId, tg: TopoGeomId) -> impl Iterator<Item = &Relation> {
        let lo = Relation {
            layer_id: layer,
            topogeo_id: tg,
            element_type: i64::MIN,
            element_id: i64::MIN,
        };
        let hi = Relation {
            layer_id: layer,
            topogeo_id: tg,
            element_type: i64::MAX,
            element_id: i64::MAX,
        };
        self.relations.range(lo..=hi)
    }
}

/// Read access shared by committed snapshots and open transactions.
///
/// Lookups return owned rows so transactions can merge staged and committed
/// state freely.
pub trait TopologyView {
    fn node(&self, id: NodeId) -> Option<Node>;
    fn edge(&self, id: EdgeId) -> Option<Edge>;
    fn face(&self, id: FaceId) -> Option<Face>;
    fn layer(&self, id: LayerId) -> Option<Layer>;

    fn nodes(&self) -> Vec<Node>;
    fn edges(&self) -> Vec<Edge>;
    fn faces(&self) -> Vec<Face>;
    fn layers(&self) -> Vec<Layer>;

    /// Ids of edges starting or ending at `node`, ascending.
    fn edges_at_node(&self, node: NodeId) -> Vec<EdgeId>;

    /// Relation rows of one TopoGeometry.
    fn relations_of(&self, layer: LayerId, tg: TopoGeomId) -> Vec<Relation>;

    /// All relation rows.
    fn relations(&self) -> Vec<Relation>;

    fn require_node(&self, id: NodeId) -> Result<Node> {
        self.node(id).ok_or(Error::NotFound(EntityRef::Node(id)))
    }

    fn require_edge(&self, id: EdgeId) -> Result<Edge> {
        self.edge(id).ok_or(Error::NotFound(EntityRef::Edge(id)))
    }

    fn require_face(&self, id: FaceId) -> Result<Face> {
        self.face(id).ok_or(Error::NotFound(EntityRef::Face(id)))
    }

    fn require_layer(&self, id: LayerId) -> Result<Layer> {
        self.layer(id).ok_or(Error::NotFound(EntityRef::Layer(id)))
    }

    /// The half-edge that follows `dir` on its ring.
    fn next_half_edge(&self, dir: DirectedEdge) -> Result<DirectedEdge> {
        Ok(self.require_edge(dir.edge())?.next(dir.is_forward()))
    }
}

impl TopologyView for TopologyData {
    fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.get(&id).cloned()
    }

    fn edge(&self, id: EdgeId) -> Option<Edge> {
        self.edges.get(&id).cloned()
    }

    fn face(&self, id: FaceId) -> Option<Face> {
        self.faces.get(&id).cloned()
    }

    fn layer(&self, id: LayerId) -> Option<Layer> {
        self.layers.get(&id).cloned()
    }

    fn nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    fn edges(&self) -> Vec<Edge> {
        self.edges.values().cloned().collect()
    }

    fn faces(&self) -> Vec<Face> {
        self.faces.values().cloned().collect()
    }

    fn layers(&self) -> Vec<Layer> {
        self.layers.values().cloned().collect()
    }

    fn edges_at_node(&self, node: NodeId) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self
            .node_edges
            .get(&node)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn relations_of(&self, layer: LayerId, tg: TopoGeomId) -> Vec<Relation> {
        self.relation_range(layer, tg).copied().collect()
    }

    fn relations(&self) -> Vec<Relation> {
        self.relations.iter().copied().collect()
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// A row a transaction read or wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RowKey {
    /// Node row and the set of edges incident to it.
    Node(NodeId),
    Edge(EdgeId),
    Face(FaceId),
    Layer(LayerId),
    TopoGeom(LayerId, TopoGeomId),
}

/// A table a transaction scanned in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Table {
    Nodes,
    Edges,
    Faces,
    Layers,
    Relations,
}

/// Staged changes over a snapshot.
#[derive(Debug)]
pub(crate) struct Transaction {
    base: Arc<TopologyData>,
    base_version: u64,

    nodes: BTreeMap<NodeId, Option<Node>>,
    edges: BTreeMap<EdgeId, Option<Edge>>,
    faces: BTreeMap<FaceId, Option<Face>>,
    layers: BTreeMap<LayerId, Option<Layer>>,
    relations_added: BTreeSet<Relation>,
    relations_removed: BTreeSet<Relation>,

    reads: RefCell<FxHashSet<RowKey>>,
    scans: RefCell<FxHashSet<Table>>,
}

impl Transaction {
    pub(crate) fn new(base: Arc<TopologyData>, base_version: u64) -> Self {
        Self {
            base,
            base_version,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            faces: BTreeMap::new(),
            layers: BTreeMap::new(),
            relations_added: BTreeSet::new(),
            relations_removed: BTreeSet::new(),
            reads: RefCell::new(FxHashSet::default()),
            scans: RefCell::new(FxHashSet::default()),
        }
    }

    fn track(&self, key: RowKey) {
        self.reads.borrow_mut().insert(key);
    }

    fn track_scan(&self, table: Table) {
        self.scans.borrow_mut().insert(table);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.edges.is_empty()
            && self.faces.is_empty()
            && self.layers.is_empty()
            && self.relations_added.is_empty()
            && self.relations_removed.is_empty()
    }

    // --- Node operations ---

    pub(crate) fn put_node(&mut self, node: Node) {
        self.nodes.insert(node.id, Some(node));
    }

    pub(crate) fn delete_node(&mut self, id: NodeId) {
        self.nodes.insert(id, None);
    }

    // --- Edge operations ---

    pub(crate) fn put_edge(&mut self, edge: Edge) {
        self.edges.insert(edge.id, Some(edge));
    }

    pub(crate) fn delete_edge(&mut self, id: EdgeId) {
        self.edges.insert(id, None);
    }

    // --- Face operations ---

    pub(crate) fn put_face(&mut self, face: Face) {
        self.faces.insert(face.id, Some(face));
    }

    pub(crate) fn delete_face(&mut self, id: FaceId) {
        self.faces.insert(id, None);
    }

    // --- Layer operations ---

    pub(crate) fn put_layer(&mut self, layer: Layer) {
        self.layers.insert(layer.layer_id, Some(layer));
    }

    pub(crate) fn delete_layer(&mut self, id: LayerId) {
        self.layers.insert(id, None);
    }

    // --- Relation operations ---

    pub(crate) fn add_relation(&mut self, rel: Relation) {
        self.relations_removed.remove(&rel);
        if !self.base.relations.contains(&rel) {
            self.relations_added.insert(rel);
        }
    }

    pub(crate) fn remove_relation(&mut self, rel: Relation) {
        self.relations_added.remove(&rel);
        if self.base.relations.contains(&rel) {
            self.relations_removed.insert(rel);
        }
    }

    // --- Untracked reads used by commit-time checks ---

    fn peek_edge(&self, id: EdgeId) -> Option<Edge> {
        match self.edges.get(&id) {
            Some(row) => row.clone(),
            None => self.base.edges.get(&id).cloned(),
        }
    }

    fn peek_node(&self, id: NodeId) -> Option<Node> {
        match self.nodes.get(&id) {
            Some(row) => row.clone(),
            None => self.base.nodes.get(&id).cloned(),
        }
    }

    fn peek_edges_at_node(&self, node: NodeId) -> FxHashSet<EdgeId> {
        let mut set = self.base.node_edges.get(&node).cloned().unwrap_or_default();
        for (id, row) in &self.edges {
            set.remove(id);
            if let Some(edge) = row {
                if edge.start_node == node || edge.end_node == node {
                    set.insert(*id);
                }
            }
        }
        set
    }

    /// Verifies that every ring through a staged edge closes, that rings keep
    /// one face on their left and that touched nodes are isolated exactly when
    /// they have no edges.
    pub(crate) fn check_invariants(&self) -> Result<()> {
        let limit = 2 * (self.base.edges.len() + self.edges.len()) + 2;
        let mut touched_nodes: BTreeSet<NodeId> = self.nodes.keys().copied().collect();

        for (id, row) in &self.edges {
            if let Some(old) = self.base.edges.get(id) {
                touched_nodes.insert(old.start_node);
                touched_nodes.insert(old.end_node);
            }
            let edge = match row {
                Some(edge) => edge,
                None => continue,
            };
            touched_nodes.insert(edge.start_node);
            touched_nodes.insert(edge.end_node);
            for forward in [true, false] {
                self.check_ring(DirectedEdge::new(*id, forward), limit)?;
            }
        }

        for node_id in touched_nodes {
            let node = match self.peek_node(node_id) {
                Some(node) => node,
                None => {
                    if !self.peek_edges_at_node(node_id).is_empty() {
                        return Err(Error::invalid(format!(
                            "edges still reference removed node {node_id}"
                        )));
                    }
                    continue;
                }
            };
            let has_edges = !self.peek_edges_at_node(node_id).is_empty();
            if has_edges == node.containing_face.is_some() {
                return Err(Error::invalid(format!(
                    "node {node_id} containing face does not match its incidence"
                )));
            }
        }
        Ok(())
    }

    fn check_ring(&self, start: DirectedEdge, limit: usize) -> Result<()> {
        let mut current = start;
        for _ in 0..limit {
            let edge = self
                .peek_edge(current.edge())
                .ok_or(Error::NotFound(EntityRef::Edge(current.edge())))?;
            let fwd = current.is_forward();
            let next = edge.next(fwd);
            let next_edge = self.peek_edge(next.edge()).ok_or_else(|| {
                Error::invalid(format!(
                    "half-edge {current} links to missing edge {}",
                    next.edge()
                ))
            })?;
            if next_edge.origin(next.is_forward()) != edge.destination(fwd) {
                return Err(Error::invalid(format!(
                    "half-edge {next} does not start where {current} ends"
                )));
            }
            if next_edge.face_left_of(next.is_forward()) != edge.face_left_of(fwd) {
                return Err(Error::invalid(format!(
                    "ring through {current} changes face at {next}"
                )));
            }
            current = next;
            if current == start {
                return Ok(());
            }
        }
        Err(Error::invalid(format!("ring starting at {start} does not close")))
    }
}

fn merged<K: Ord + Copy, V: Clone>(base: &BTreeMap<K, V>, overlay: &BTreeMap<K, Option<V>>) -> Vec<V> {
    let mut out: BTreeMap<K, V> = base.clone();
    for (k, row) in overlay {
        match row {
            Some(v) => {
                out.insert(*k, v.clone());
            }
            None => {
                out.remove(k);
            }
        }
    }
    out.into_values().collect()
}

impl TopologyView for Transaction {
    fn node(&self, id: NodeId) -> Option<Node> {
        self.track(RowKey::Node(id));
        self.peek_node(id)
    }

    fn edge(&self, id: EdgeId) -> Option<Edge> {
        self.track(RowKey::Edge(id));
        self.peek_edge(id)
    }

    fn face(&self, id: FaceId) -> Option<Face> {
        self.track(RowKey::Face(id));
        match self.faces.get(&id) {
            Some(row) => row.clone(),
            None => self.base.faces.get(&id).cloned(),
        }
    }

    fn layer(&self, id: LayerId) -> Option<Layer> {
        self.track(RowKey::Layer(id));
        match self.layers.get(&id) {
            Some(row) => row.clone(),
            None => self.base.layers.get(&id).cloned(),
        }
    }

    fn nodes(&self) -> Vec<Node> {
        self.track_scan(Table::Nodes);
        merged(&self.base.nodes, &self.nodes)
    }

    fn edges(&self) -> Vec<Edge> {
        self.track_scan(Table::Edges);
        merged(&self.base.edges, &self.edges)
    }

    fn faces(&self) -> Vec<Face> {
        self.track_scan(Table::Faces);
        merged(&self.base.faces, &self.faces)
    }

    fn layers(&self) -> Vec<Layer> {
        self.track_scan(Table::Layers);
        merged(&self.base.layers, &self.layers)
    }

    fn edges_at_node(&self, node: NodeId) -> Vec<EdgeId> {
        self.track(RowKey::Node(node));
        let mut ids: Vec<EdgeId> = self.peek_edges_at_node(node).into_iter().collect();
        ids.sort();
        ids
    }

    fn relations_of(&self, layer: LayerId, tg: TopoGeomId) -> Vec<Relation> {
        self.track(RowKey::TopoGeom(layer, tg));
        let mut rows: BTreeSet<Relation> = self
            .base
            .relation_range(layer, tg)
            .filter(|r| !self.relations_removed.contains(r))
            .copied()
            .collect();
        rows.extend(
            self.relations_added
                .iter()
                .filter(|r| r.layer_id == layer && r.topogeo_id == tg),
        );
        rows.into_iter().collect()
    }

    fn relations(&self) -> Vec<Relation> {
        self.track_scan(Table::Relations);
        let mut rows: BTreeSet<Relation> = self
            .base
            .relations
            .difference(&self.relations_removed)
            .copied()
            .collect();
        rows.extend(self.relations_added.iter().copied());
        rows.into_iter().collect()
    }
}

// ============================================================================
// Committed state
// ============================================================================

/// Published snapshot plus the version bookkeeping used for conflict checks.
#[derive(Debug)]
pub(crate) struct CommittedState {
    data: Arc<TopologyData>,
    version: u64,
    row_versions: FxHashMap<RowKey, u64>,
    table_versions: FxHashMap<Table, u64>,
}

impl CommittedState {
    pub(crate) fn new(data: TopologyData) -> Self {
        Self {
            data: Arc::new(data),
            version: 0,
            row_versions: FxHashMap::default(),
            table_versions: FxHashMap::default(),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<TopologyData> {
        Arc::clone(&self.data)
    }

    pub(crate) fn begin(&self) -> Transaction {
        Transaction::new(Arc::clone(&self.data), self.version)
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    fn changed_since(&self, key: &RowKey, version: u64) -> bool {
        self.row_versions.get(key).is_some_and(|v| *v > version)
    }

    /// Validates and publishes a transaction. Returns the new version.
    pub(crate) fn commit(&mut self, tx: Transaction, topology: &str) -> Result<u64> {
        if tx.is_empty() {
            return Ok(self.version);
        }

        let Transaction {
            base,
            base_version,
            nodes,
            edges,
            faces,
            layers,
            relations_added,
            relations_removed,
            reads,
            scans,
        } = tx;

        let mut written: Vec<RowKey> = Vec::new();
        written.extend(nodes.keys().map(|id| RowKey::Node(*id)));
        written.extend(faces.keys().map(|id| RowKey::Face(*id)));
        written.extend(layers.keys().map(|id| RowKey::Layer(*id)));
        for (id, row) in &edges {
            written.push(RowKey::Edge(*id));
            if let Some(old) = base.edges.get(id) {
                written.push(RowKey::Node(old.start_node));
                written.push(RowKey::Node(old.end_node));
            }
            if let Some(edge) = row {
                written.push(RowKey::Node(edge.start_node));
                written.push(RowKey::Node(edge.end_node));
            }
        }
        for rel in relations_added.iter().chain(relations_removed.iter()) {
            written.push(RowKey::TopoGeom(rel.layer_id, rel.topogeo_id));
        }

        let reads = reads.into_inner();
        let conflict = reads
            .iter()
            .chain(written.iter())
            .find(|key| self.changed_since(key, base_version));
        if let Some(key) = conflict {
            tracing::warn!(topology, ?key, base_version, "edit aborted by a concurrent commit");
            return Err(Error::ConcurrencyConflict {
                topology: topology.to_string(),
                detail: format!("{key:?} was modified after version {base_version}"),
            });
        }
        for table in scans.into_inner() {
            if self.table_versions.get(&table).is_some_and(|v| *v > base_version) {
                tracing::warn!(topology, ?table, base_version, "edit aborted by a concurrent commit");
                return Err(Error::ConcurrencyConflict {
                    topology: topology.to_string(),
                    detail: format!("{table:?} was modified after version {base_version}"),
                });
            }
        }

        // Release the transaction's hold on the snapshot before copy-on-write
        drop(base);
        let data = Arc::make_mut(&mut self.data);
        let version = self.version + 1;

        let mut tables: Vec<Table> = Vec::new();
        if !nodes.is_empty() {
            tables.push(Table::Nodes);
        }
        if !edges.is_empty() {
            tables.push(Table::Edges);
        }
        if !faces.is_empty() {
            tables.push(Table::Faces);
        }
        if !layers.is_empty() {
            tables.push(Table::Layers);
        }
        if !relations_added.is_empty() || !relations_removed.is_empty() {
            tables.push(Table::Relations);
        }

        for (id, row) in nodes {
            match row {
                Some(node) => {
                    data.nodes.insert(id, node);
                }
                None => {
                    data.nodes.remove(&id);
                }
            }
        }
        for (id, row) in edges {
            match row {
                Some(edge) => data.insert_edge(edge),
                None => {
                    data.remove_edge(id);
                }
            }
        }
        for (id, row) in faces {
            match row {
                Some(face) => {
                    data.faces.insert(id, face);
                }
                None => {
                    data.faces.remove(&id);
                }
            }
        }
        for (id, row) in layers {
            match row {
                Some(layer) => {
                    data.layers.insert(id, layer);
                }
                None => {
                    data.layers.remove(&id);
                }
            }
        }
        for rel in &relations_removed {
            data.relations.remove(rel);
        }
        data.relations.extend(relations_added);

        for key in written {
            self.row_versions.insert(key, version);
        }
        for table in tables {
            self.table_versions.insert(table, version);
        }
        self.version = version;

        tracing::debug!(topology, version, "committed edit");
        Ok(version)
    }
}

// ============================================================================
// Sequences
// ============================================================================

/// Id sources of a topology.
///
/// Sequences live outside transactions: ids consumed by an aborted edit are
/// never handed out again.
#[derive(Debug)]
pub(crate) struct Sequences {
    node: AtomicI64,
    edge: AtomicI64,
    face: AtomicI64,
    layer: AtomicI64,
    topogeo: Mutex<FxHashMap<LayerId, i64>>,
}

impl Default for Sequences {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequences {
    pub(crate) fn new() -> Self {
        Self {
            node: AtomicI64::new(0),
            edge: AtomicI64::new(0),
            face: AtomicI64::new(0),
            layer: AtomicI64::new(0),
            topogeo: Mutex::new(FxHashMap::default()),
        }
    }

    pub(crate) fn next_node(&self) -> NodeId {
        NodeId(self.node.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn next_edge(&self) -> EdgeId {
        EdgeId(self.edge.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn next_face(&self) -> FaceId {
        FaceId(self.face.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn next_layer(&self) -> LayerId {
        LayerId(self.layer.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn create_topogeo_sequence(&self, layer: LayerId) {
        self.topogeo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(layer, 0);
    }

    pub(crate) fn drop_topogeo_sequence(&self, layer: LayerId) {
        self.topogeo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&layer);
    }

    pub(crate) fn next_topogeo(&self, layer: LayerId) -> Result<TopoGeomId> {
        let mut seqs = self.topogeo.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = seqs
            .get_mut(&layer)
            .ok_or(Error::NotFound(EntityRef::Layer(layer)))?;
        *counter += 1;
        Ok(TopoGeomId(*counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn node(id: i64, x: f64, y: f64) -> Node {
        Node {
            id: NodeId(id),
            point: Point2::new(x, y),
            containing_face: Some(FaceId::UNIVERSAL),
        }
    }

    #[test]
    fn test_new_data_has_universal_face() {
        let data = TopologyData::new();
        assert!(data.face(FaceId::UNIVERSAL).is_some());
        assert_eq!(data.faces().len(), 1);
    }

    #[test]
    fn test_transaction_overlay_reads() {
        let state = CommittedState::new(TopologyData::new());
        let mut tx = state.begin();
        tx.put_node(node(1, 0.0, 0.0));
        assert!(tx.node(NodeId(1)).is_some());
        assert_eq!(tx.nodes().len(), 1);
        tx.delete_node(NodeId(1));
        assert!(tx.node(NodeId(1)).is_none());
        assert!(tx.nodes().is_empty());
    }

    #[test]
    fn test_commit_publishes_snapshot() {
        let mut state = CommittedState::new(TopologyData::new());
        let before = state.snapshot();
        let mut tx = state.begin();
        tx.put_node(node(1, 0.0, 0.0));
        let version = state.commit(tx, "t").unwrap();
        assert_eq!(version, 1);
        assert!(before.node(NodeId(1)).is_none());
        assert!(state.snapshot().node(NodeId(1)).is_some());
    }

    #[test]
    fn test_conflicting_commits() {
        let mut state = CommittedState::new(TopologyData::new());
        let mut seed = state.begin();
        seed.put_node(node(1, 0.0, 0.0));
        state.commit(seed, "t").unwrap();

        let mut a = state.begin();
        let mut b = state.begin();
        let mut moved = a.node(NodeId(1)).unwrap();
        moved.point = Point2::new(1.0, 1.0);
        a.put_node(moved);
        let mut other = b.node(NodeId(1)).unwrap();
        other.point = Point2::new(2.0, 2.0);
        b.put_node(other);

        state.commit(a, "t").unwrap();
        let err = state.commit(b, "t").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(state.snapshot().node(NodeId(1)).unwrap().point, Point2::new(1.0, 1.0));
    }

    #[test]
    fn test_disjoint_commits_both_apply() {
        let mut state = CommittedState::new(TopologyData::new());
        let mut a = state.begin();
        let mut b = state.begin();
        a.put_node(node(1, 0.0, 0.0));
        b.put_node(node(2, 5.0, 5.0));
        state.commit(a, "t").unwrap();
        state.commit(b, "t").unwrap();
        assert_eq!(state.snapshot().nodes().len(), 2);
    }

    #[test]
    fn test_scan_conflicts_with_insert() {
        let mut state = CommittedState::new(TopologyData::new());
        let mut a = state.begin();
        let mut b = state.begin();
        assert!(b.nodes().is_empty());
        b.put_node(node(2, 5.0, 5.0));
        a.put_node(node(1, 0.0, 0.0));
        state.commit(a, "t").unwrap();
        assert!(state.commit(b, "t").is_err());
    }

    #[test]
    fn test_relation_overlay() {
        let state = CommittedState::new(TopologyData::new());
        let mut tx = state.begin();
        let rel = Relation {
            layer_id: LayerId(1),
            topogeo_id: TopoGeomId(1),
            element_type: 3,
            element_id: 1,
        };
        tx.add_relation(rel);
        assert_eq!(tx.relations_of(LayerId(1), TopoGeomId(1)), vec![rel]);
        tx.remove_relation(rel);
        assert!(tx.relations().is_empty());
        assert!(tx.is_empty());
    }

    #[test]
    fn test_ring_check_rejects_dangling_pointer() {
        let state = CommittedState::new(TopologyData::new());
        let mut tx = state.begin();
        let mut a = node(1, 0.0, 0.0);
        let mut b = node(2, 1.0, 0.0);
        a.containing_face = None;
        b.containing_face = None;
        tx.put_node(a);
        tx.put_node(b);
        tx.put_edge(Edge {
            id: EdgeId(1),
            start_node: NodeId(1),
            end_node: NodeId(2),
            next_left_edge: DirectedEdge(9),
            next_right_edge: DirectedEdge(1),
            left_face: FaceId::UNIVERSAL,
            right_face: FaceId::UNIVERSAL,
            geometry: topolite_geometry::LineString::from_coords(&[(0.0, 0.0), (1.0, 0.0)]),
        });
        assert!(tx.check_invariants().is_err());
    }

    #[test]
    fn test_sequences_are_monotonic() {
        let seq = Sequences::new();
        assert_eq!(seq.next_node(), NodeId(1));
        assert_eq!(seq.next_node(), NodeId(2));
        assert_eq!(seq.next_face(), FaceId(1));
        assert!(seq.next_topogeo(LayerId(1)).is_err());
        seq.create_topogeo_sequence(LayerId(1));
        assert_eq!(seq.next_topogeo(LayerId(1)).unwrap(), TopoGeomId(1));
    }
}
