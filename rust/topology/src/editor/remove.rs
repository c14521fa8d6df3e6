// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removing edges, merging the faces on their two sides.

use std::collections::BTreeSet;

use super::{detach_nodes, ensure_edge_unreferenced, face_relations};
use crate::error::{Error, Result};
use crate::face::refresh_face_mbr;
use crate::ids::{EdgeId, FaceId, LayerId, TopoGeomId};
use crate::primitives::{Face, Relation};
use crate::store::{TopologyView, Transaction};
use crate::topology::Topology;
use crate::traversal::relink_nodes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    /// Keep the lower of the two face ids.
    ModFace,
    /// Allocate a fresh id for the merged face.
    NewFace,
}

impl Topology {
    /// Removes an edge. When its sides differ the faces merge into the lower
    /// face id, which is returned.
    pub fn rem_edge_mod_face(&self, edge: EdgeId) -> Result<FaceId> {
        let (merged, _) = self.remove_edge("rem_edge_mod_face", edge, MergeMode::ModFace)?;
        Ok(merged)
    }

    /// Removes an edge. When its sides differ the faces merge into a newly
    /// allocated face, whose id is returned.
    ///
    /// Returns `None` when no face was created: the edge had the same face on
    /// both sides, or one side was the universal face.
    pub fn rem_edge_new_face(&self, edge: EdgeId) -> Result<Option<FaceId>> {
        let (merged, created) = self.remove_edge("rem_edge_new_face", edge, MergeMode::NewFace)?;
        Ok(created.then_some(merged))
    }

    fn remove_edge(&self, op: &'static str, id: EdgeId, mode: MergeMode) -> Result<(FaceId, bool)> {
        let geometry = self.geometry();
        self.edit(op, |tx| {
            let edge = tx.require_edge(id)?;
            ensure_edge_unreferenced(tx, id)?;

            let (fl, fr) = (edge.left_face, edge.right_face);
            if fl != fr {
                check_merge_preserves_topogeometries(tx, id, fl, fr)?;
            }

            let (merged, created) = if fl == fr {
                (fl, false)
            } else if fl.is_universal() || fr.is_universal() {
                (FaceId::UNIVERSAL, false)
            } else {
                match mode {
                    MergeMode::ModFace => (fl.min(fr), false),
                    MergeMode::NewFace => (self.sequences.next_face(), true),
                }
            };

            tx.delete_edge(id);
            relink_nodes(tx, &[edge.start_node, edge.end_node])?;
            detach_nodes(tx, &[edge.start_node, edge.end_node], merged)?;

            if fl != fr {
                if created {
                    tx.put_face(Face { id: merged, mbr: None });
                }
                let dropped: Vec<FaceId> = [fl, fr].into_iter().filter(|f| *f != merged).collect();
                merge_faces(tx, &dropped, merged)?;
            }
            refresh_face_mbr(tx, geometry, merged)?;

            tracing::debug!(topology = %self.name(), edge = %id, left = %fl, right = %fr, merged = %merged, "edge removed");
            Ok((merged, created))
        })
    }
}

/// TopoGeometries must cover both faces or neither.
fn check_merge_preserves_topogeometries(
    tx: &Transaction,
    edge: EdgeId,
    fl: FaceId,
    fr: FaceId,
) -> Result<()> {
    let owners = |face: FaceId| -> BTreeSet<(LayerId, TopoGeomId)> {
        face_relations(tx, face)
            .into_iter()
            .map(|r| (r.layer_id, r.topogeo_id))
            .collect()
    };
    let left = owners(fl);
    let right = owners(fr);
    if let Some((layer, tg)) = left.symmetric_difference(&right).next() {
        return Err(Error::conflict(format!(
            "topogeometry {tg} in layer {layer} cannot be represented dropping edge {edge}"
        )));
    }
    Ok(())
}

/// Relabels everything that referred to `dropped` faces to `merged`.
fn merge_faces(tx: &mut Transaction, dropped: &[FaceId], merged: FaceId) -> Result<()> {
    for mut edge in tx.edges() {
        let mut changed = false;
        if dropped.contains(&edge.left_face) {
            edge.left_face = merged;
            changed = true;
        }
        if dropped.contains(&edge.right_face) {
            edge.right_face = merged;
            changed = true;
        }
        if changed {
            tx.put_edge(edge);
        }
    }
    for mut node in tx.nodes() {
        if node.containing_face.is_some_and(|f| dropped.contains(&f)) {
            node.containing_face = Some(merged);
            tx.put_node(node);
        }
    }

    for face in dropped {
        for rel in face_relations(tx, *face) {
            tx.remove_relation(rel);
            if !merged.is_universal() {
                tx.add_relation(Relation {
                    element_id: merged.0,
                    ..rel
                });
            }
        }
        if !face.is_universal() {
            tx.delete_face(*face);
        }
    }
    Ok(())
}
