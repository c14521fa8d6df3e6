// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer & Relation Manager
//!
//! Layers group TopoGeometries of one feature type. A level-0 layer's
//! TopoGeometries are made of primitives; a layer built on a child layer
//! (level = child level + 1) composes TopoGeometries of that child.
//! Relation rows and layer rows change inside the same transactions as
//! primitives, so integrity checks see a consistent state.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::ids::{EdgeId, EntityRef, FaceId, FeatureType, LayerId, NodeId, PrimitiveType, TopoGeomId};
use crate::primitives::{Layer, Relation, TopoElement, TopoGeometry};
use crate::store::TopologyView;
use crate::topology::Topology;

/// Walks the child chain below `child`, returning its level.
///
/// Fails when the chain loops or is deeper than `max_depth`.
fn check_hierarchy<V: TopologyView + ?Sized>(view: &V, child: LayerId, max_depth: usize) -> Result<u32> {
    let top = view.require_layer(child)?;
    let mut seen = FxHashSet::default();
    let mut current = Some(top.clone());
    let mut depth = 0usize;
    while let Some(layer) = current {
        if !seen.insert(layer.layer_id) {
            return Err(Error::malformed(format!(
                "layer hierarchy below layer {child} contains a cycle at layer {}",
                layer.layer_id
            )));
        }
        depth += 1;
        if depth >= max_depth {
            return Err(Error::malformed(format!(
                "layer hierarchy would exceed the maximum depth of {max_depth}"
            )));
        }
        current = match layer.child_id {
            Some(id) => Some(view.require_layer(id)?),
            None => None,
        };
    }
    Ok(top.level + 1)
}

/// Primitive (or child TopoGeometry) elements of a TopoGeometry.
///
/// Edge ids are reported unsigned. Returns `(kind, id)` pairs.
pub(crate) fn collect_elements<V: TopologyView + ?Sized>(
    view: &V,
    layer: &Layer,
    tg: TopoGeomId,
    depth: usize,
    max_depth: usize,
    out: &mut BTreeSet<(i64, i64)>,
) -> Result<()> {
    if depth > max_depth {
        return Err(Error::malformed(format!(
            "layer hierarchy deeper than {max_depth} at layer {}",
            layer.layer_id
        )));
    }
    let rows = view.relations_of(layer.layer_id, tg);
    match layer.child_id {
        None => {
            for rel in rows {
                out.insert((rel.element_type, rel.element_id.abs()));
            }
        }
        Some(child) => {
            let child_layer = view.require_layer(child)?;
            for rel in rows {
                collect_elements(view, &child_layer, TopoGeomId(rel.element_id), depth + 1, max_depth, out)?;
            }
        }
    }
    Ok(())
}

impl Topology {
    /// Registers a layer. With `child` the layer is hierarchical and its
    /// TopoGeometries are built from TopoGeometries of the child layer.
    pub(crate) fn add_layer(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        feature_type: FeatureType,
        child: Option<LayerId>,
    ) -> Result<Layer> {
        for (what, name) in [("schema", schema), ("table", table), ("column", column)] {
            if name.trim().is_empty() {
                return Err(Error::malformed(format!("{what} name must not be empty")));
            }
        }
        let max_depth = self.config().max_hierarchy_depth;
        let layer = self.edit("add_layer", |tx| {
            let duplicate = tx.layers().into_iter().find(|l| {
                l.schema_name == schema && l.table_name == table && l.feature_column == column
            });
            if let Some(existing) = duplicate {
                return Err(Error::conflict(format!(
                    "{} is already registered as layer {}",
                    existing.qualified_name(),
                    existing.layer_id
                )));
            }
            let level = match child {
                Some(child) => check_hierarchy(tx, child, max_depth)?,
                None => 0,
            };

            let layer = Layer {
                topology_id: self.id(),
                layer_id: self.sequences.next_layer(),
                schema_name: schema.to_string(),
                table_name: table.to_string(),
                feature_column: column.to_string(),
                feature_type,
                level,
                child_id: child,
            };
            tx.put_layer(layer.clone());
            self.sequences.create_topogeo_sequence(layer.layer_id);
            Ok(layer)
        })?;
        tracing::info!(
            topology = %self.name(),
            layer = %layer.layer_id,
            column = %layer.qualified_name(),
            kind = %layer.feature_type,
            level = layer.level,
            "layer added"
        );
        Ok(layer)
    }

    /// Removes a layer and every relation row of its TopoGeometries.
    ///
    /// A layer that another layer is built on cannot be dropped.
    pub(crate) fn drop_layer(&self, id: LayerId) -> Result<Layer> {
        let mut dropped = self.drop_layers(&[id])?;
        dropped.pop().ok_or(Error::NotFound(EntityRef::Layer(id)))
    }

    /// Removes several layers and their relation rows in one transaction.
    ///
    /// Fails without changes when a layer is missing or is the child of a
    /// layer outside `ids`.
    pub(crate) fn drop_layers(&self, ids: &[LayerId]) -> Result<Vec<Layer>> {
        let dropping: FxHashSet<LayerId> = ids.iter().copied().collect();
        let layers = self.edit("drop_layers", |tx| {
            let mut layers = Vec::with_capacity(ids.len());
            for &id in ids {
                layers.push(tx.require_layer(id)?);
            }
            for parent in tx.layers() {
                if dropping.contains(&parent.layer_id) {
                    continue;
                }
                if let Some(child) = parent.child_id.filter(|c| dropping.contains(c)) {
                    return Err(Error::conflict(format!(
                        "layer {child} is the child of layer {}",
                        parent.layer_id
                    )));
                }
            }
            for rel in tx.relations().into_iter().filter(|r| dropping.contains(&r.layer_id)) {
                tx.remove_relation(rel);
            }
            for &id in ids {
                tx.delete_layer(id);
            }
            Ok(layers)
        })?;
        for layer in &layers {
            self.sequences.drop_topogeo_sequence(layer.layer_id);
            tracing::info!(
                topology = %self.name(),
                layer = %layer.layer_id,
                column = %layer.qualified_name(),
                "layer dropped"
            );
        }
        Ok(layers)
    }

    pub fn layer(&self, id: LayerId) -> Result<Layer> {
        self.snapshot().require_layer(id)
    }

    pub fn layers(&self) -> Vec<Layer> {
        self.snapshot().layers()
    }

    /// Creates a TopoGeometry of type `type_code` (1 point, 2 line,
    /// 3 polygon, 4 collection) in `layer` from `elements`.
    ///
    /// Elements of a level-0 layer are `(primitive id, primitive type)`
    /// pairs; those of a hierarchical layer are `(child TopoGeometry id,
    /// child layer id)`. `(0, 0)` is an empty placeholder. Either every
    /// element is recorded or none is.
    pub fn create_topo_geom(
        &self,
        type_code: i32,
        layer: LayerId,
        elements: &[TopoElement],
    ) -> Result<TopoGeometry> {
        let kind = FeatureType::from_code(type_code)?;
        self.edit("create_topo_geom", |tx| {
            let row = tx.require_layer(layer)?;
            if !row.feature_type.accepts(kind) {
                return Err(Error::mismatch(format!(
                    "cannot create a {kind} TopoGeometry in layer {layer} of type {}",
                    row.feature_type
                )));
            }

            let mut relations = Vec::with_capacity(elements.len());
            for el in elements {
                if el.is_placeholder() {
                    if el.id != 0 {
                        return Err(Error::malformed(format!(
                            "element type 0 must pair with element id 0, got {}",
                            el.id
                        )));
                    }
                    continue;
                }
                match row.child_id {
                    None => check_primitive_element(tx, kind, el)?,
                    Some(child) => {
                        if el.kind != child.0 {
                            return Err(Error::mismatch(format!(
                                "element type {} does not match child layer {child} of layer {layer}",
                                el.kind
                            )));
                        }
                        let child_tg = TopoGeomId(el.id);
                        if tx.relations_of(child, child_tg).is_empty() {
                            return Err(Error::NotFound(EntityRef::TopoGeometry(child, child_tg)));
                        }
                    }
                }
                relations.push(*el);
            }

            let id = self.sequences.next_topogeo(layer)?;
            for el in relations {
                tx.add_relation(Relation {
                    layer_id: layer,
                    topogeo_id: id,
                    element_type: el.kind,
                    element_id: el.id,
                });
            }
            Ok(TopoGeometry {
                topology_id: self.id(),
                layer_id: layer,
                id,
                kind,
            })
        })
    }

    /// Primitives a TopoGeometry is made of, expanding hierarchical layers
    /// down to level 0. Sorted by type then id, without duplicates.
    pub fn get_topo_geom_elements(&self, layer: LayerId, tg: TopoGeomId) -> Result<Vec<TopoElement>> {
        let data = self.snapshot();
        let row = data.require_layer(layer)?;
        let mut out = BTreeSet::new();
        collect_elements(data.as_ref(), &row, tg, 0, self.config().max_hierarchy_depth, &mut out)?;
        Ok(out.into_iter().map(|(kind, id)| TopoElement::new(id, kind)).collect())
    }

    /// Whether `tg` has any relation rows in `layer`.
    pub fn topo_geometry_exists(&self, layer: LayerId, tg: TopoGeomId) -> bool {
        !self.snapshot().relations_of(layer, tg).is_empty()
    }
}

fn check_primitive_element<V: TopologyView + ?Sized>(
    view: &V,
    kind: FeatureType,
    el: &TopoElement,
) -> Result<()> {
    let Some(primitive) = PrimitiveType::from_code(el.kind) else {
        return Err(Error::malformed(format!(
            "element type {} is not a primitive type (1 node, 2 edge, 3 face)",
            el.kind
        )));
    };
    if kind != FeatureType::Collection && primitive.feature_type() != kind {
        return Err(Error::mismatch(format!(
            "a {kind} TopoGeometry cannot contain element type {}",
            el.kind
        )));
    }
    match primitive {
        PrimitiveType::Node => {
            view.require_node(NodeId(el.id))?;
        }
        PrimitiveType::Edge => {
            if el.id == 0 {
                return Err(Error::malformed("edge id 0 is not a valid element"));
            }
            view.require_edge(EdgeId(el.id.abs()))?;
        }
        PrimitiveType::Face => {
            if el.id == FaceId::UNIVERSAL.0 {
                return Err(Error::malformed("the universal face cannot be an element"));
            }
            view.require_face(FaceId(el.id))?;
        }
    }
    Ok(())
}
