// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catalog: the registry of topologies and of the feature columns their
//! layers are attached to.
//!
//! Lock order: the column map before the topology map. The topology map is
//! never held while the column map is acquired.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use topolite_geometry::{Geometry, GeometryLibrary, PlanarGeometry};

use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use crate::ids::{EntityRef, FeatureType, LayerId, TopoGeomId, TopologyId};
use crate::primitives::{Layer, TopoElement, TopoGeometry, TopologyInfo};
use crate::topology::Topology;
use crate::validate::Diagnostic;

/// `schema.table.column` name of a feature column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.schema, self.table, self.column)
    }
}

/// Values stored in one feature column, keyed by row id.
#[derive(Debug, Clone)]
struct FeatureColumn {
    topology: TopologyId,
    layer: LayerId,
    kind: FeatureType,
    rows: BTreeMap<i64, TopoGeometry>,
}

/// Registry of topologies.
#[derive(Debug)]
pub struct Catalog {
    config: CatalogConfig,
    geometry: Arc<dyn GeometryLibrary>,
    next_topology: AtomicI64,
    topologies: RwLock<BTreeMap<String, Arc<Topology>>>,
    columns: RwLock<FxHashMap<ColumnRef, FeatureColumn>>,
}

impl Catalog {
    pub fn new(config: CatalogConfig, geometry: Arc<dyn GeometryLibrary>) -> Self {
        Self {
            config,
            geometry,
            next_topology: AtomicI64::new(0),
            topologies: RwLock::new(BTreeMap::new()),
            columns: RwLock::new(FxHashMap::default()),
        }
    }

    /// Default configuration with the planar geometry library.
    pub fn with_defaults() -> Self {
        Self::new(CatalogConfig::default(), Arc::new(PlanarGeometry::new()))
    }

    /// Configuration from the environment with the planar geometry library.
    pub fn from_env() -> Self {
        Self::new(CatalogConfig::from_env(), Arc::new(PlanarGeometry::new()))
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Topologies
    // ------------------------------------------------------------------

    /// Creates an empty topology holding only the universal face.
    pub fn create_topology(&self, name: &str, srid: i32, precision: f64, has_z: bool) -> Result<TopologyId> {
        if name.trim().is_empty() {
            return Err(Error::malformed("topology name must not be empty"));
        }
        if !precision.is_finite() || precision < 0.0 {
            return Err(Error::malformed(format!(
                "precision must be a non-negative number, got {precision}"
            )));
        }

        let mut topologies = self.topologies.write().unwrap_or_else(PoisonError::into_inner);
        if topologies.contains_key(name) {
            return Err(Error::conflict(format!("topology {name:?} already exists")));
        }
        let id = TopologyId(self.next_topology.fetch_add(1, Ordering::SeqCst) + 1);
        let info = TopologyInfo {
            id,
            name: name.to_string(),
            srid,
            precision,
            has_z,
        };
        topologies.insert(
            name.to_string(),
            Arc::new(Topology::new(info, Arc::clone(&self.geometry), self.config.clone())),
        );
        tracing::info!(topology = %name, id = %id, srid, precision, has_z, "topology created");
        Ok(id)
    }

    /// Creates a topology with the configured default SRID and precision 0.
    pub fn create_topology_with_defaults(&self, name: &str) -> Result<TopologyId> {
        self.create_topology(name, self.config.default_srid, 0.0, false)
    }

    /// Drops every layer of a topology together with its feature column,
    /// then the topology. Nothing is dropped when a layer has no column.
    pub fn drop_topology(&self, name: &str) -> Result<()> {
        let topo = self.topology(name)?;
        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        let mut layers = topo.layers();
        layers.sort_by(|a, b| b.level.cmp(&a.level).then(a.layer_id.cmp(&b.layer_id)));

        let mut keys = Vec::with_capacity(layers.len());
        for layer in &layers {
            let key = columns
                .iter()
                .find(|(_, entry)| entry.topology == topo.id() && entry.layer == layer.layer_id)
                .map(|(key, _)| key.clone())
                .ok_or_else(|| {
                    Error::NotFound(EntityRef::FeatureColumn(layer.qualified_name()))
                })?;
            keys.push(key);
        }
        let ids: Vec<LayerId> = layers.iter().map(|l| l.layer_id).collect();
        topo.drop_layers(&ids)?;
        for key in keys {
            if let Some(entry) = columns.remove(&key) {
                tracing::debug!(column = %key, values = entry.rows.len(), "feature column detached");
            }
        }
        self.topologies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        tracing::info!(topology = %name, layers = ids.len(), "topology dropped");
        Ok(())
    }

    pub fn topology(&self, name: &str) -> Result<Arc<Topology>> {
        self.topologies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(EntityRef::Topology(name.to_string())))
    }

    pub fn topology_by_id(&self, id: TopologyId) -> Result<Arc<Topology>> {
        self.topologies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|t| t.id() == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(EntityRef::Topology(format!("#{id}"))))
    }

    pub fn topology_id(&self, name: &str) -> Result<TopologyId> {
        Ok(self.topology(name)?.id())
    }

    pub fn topology_name(&self, id: TopologyId) -> Result<String> {
        Ok(self.topology_by_id(id)?.name().to_string())
    }

    pub fn topology_srid(&self, name: &str) -> Result<i32> {
        Ok(self.topology(name)?.srid())
    }

    /// Every registered topology, by name.
    pub fn topologies(&self) -> Vec<TopologyInfo> {
        self.topologies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|t| t.info().clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    /// Registers a TopoGeometry column of `topology` and the layer behind it.
    ///
    /// `layer_type` is a type name (`POINT`, `LINE`, `POLYGON`,
    /// `COLLECTION` or an OGC synonym). With `child` the layer is built on
    /// that layer of the same topology.
    pub fn add_topo_geometry_column(
        &self,
        topology: &str,
        schema: &str,
        table: &str,
        column: &str,
        layer_type: &str,
        child: Option<LayerId>,
    ) -> Result<LayerId> {
        let kind = FeatureType::from_name(layer_type)?;
        let key = ColumnRef::new(schema, table, column);

        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        let topo = self.topology(topology)?;
        if let Some(existing) = columns.get(&key) {
            return Err(Error::conflict(format!(
                "column {key} already holds layer {} of topology #{}",
                existing.layer, existing.topology
            )));
        }
        let layer = topo.add_layer(schema, table, column, kind, child)?;
        columns.insert(
            key,
            FeatureColumn {
                topology: topo.id(),
                layer: layer.layer_id,
                kind,
                rows: BTreeMap::new(),
            },
        );
        Ok(layer.layer_id)
    }

    /// Drops the layer behind a column together with its relations and
    /// detaches the column's values. Returns the removed layer.
    pub fn drop_topo_geometry_column(&self, column: &ColumnRef) -> Result<Layer> {
        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        let (topology, layer) = columns
            .get(column)
            .map(|entry| (entry.topology, entry.layer))
            .ok_or_else(|| Error::NotFound(EntityRef::FeatureColumn(column.to_string())))?;
        let topo = self.topology_by_id(topology)?;

        let dropped = topo.drop_layer(layer)?;
        if let Some(entry) = columns.remove(column) {
            tracing::debug!(column = %column, values = entry.rows.len(), "feature column detached");
        }
        Ok(dropped)
    }

    // ------------------------------------------------------------------
    // TopoGeometries
    // ------------------------------------------------------------------

    pub fn create_topo_geom(
        &self,
        topology: &str,
        type_code: i32,
        layer: LayerId,
        elements: &[TopoElement],
    ) -> Result<TopoGeometry> {
        self.topology(topology)?.create_topo_geom(type_code, layer, elements)
    }

    pub fn get_topo_geom_elements(
        &self,
        topology: &str,
        layer: LayerId,
        tg: TopoGeomId,
    ) -> Result<Vec<TopoElement>> {
        self.topology(topology)?.get_topo_geom_elements(layer, tg)
    }

    /// Concrete geometry of a TopoGeometry of any registered topology.
    pub fn geometry(&self, tg: &TopoGeometry) -> Result<Geometry> {
        self.topology_by_id(tg.topology_id)
            .map_err(|_| Error::NotFound(EntityRef::TopoGeometry(tg.layer_id, tg.id)))?
            .realize(tg)
    }

    pub fn validate_topology(&self, name: &str) -> Result<Vec<Diagnostic>> {
        Ok(self.topology(name)?.validate())
    }

    // ------------------------------------------------------------------
    // Feature values
    // ------------------------------------------------------------------

    /// Stores (or with `None` clears) the value of one row of a column.
    ///
    /// The value must come from the column's topology and layer.
    pub fn set_feature(&self, column: &ColumnRef, row: i64, value: Option<TopoGeometry>) -> Result<()> {
        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        let entry = columns
            .get_mut(column)
            .ok_or_else(|| Error::NotFound(EntityRef::FeatureColumn(column.to_string())))?;
        let Some(tg) = value else {
            entry.rows.remove(&row);
            return Ok(());
        };
        if tg.topology_id != entry.topology || tg.layer_id != entry.layer {
            return Err(Error::mismatch(format!(
                "column {column} holds layer {} of topology #{}, got layer {} of topology #{}",
                entry.layer, entry.topology, tg.layer_id, tg.topology_id
            )));
        }
        if !entry.kind.accepts(tg.kind) {
            return Err(Error::mismatch(format!(
                "column {column} of type {} cannot hold a {} TopoGeometry",
                entry.kind, tg.kind
            )));
        }
        entry.rows.insert(row, tg);
        Ok(())
    }

    pub fn feature(&self, column: &ColumnRef, row: i64) -> Result<Option<TopoGeometry>> {
        let columns = self.columns.read().unwrap_or_else(PoisonError::into_inner);
        let entry = columns
            .get(column)
            .ok_or_else(|| Error::NotFound(EntityRef::FeatureColumn(column.to_string())))?;
        Ok(entry.rows.get(&row).copied())
    }

    /// All values of a column in row order.
    pub fn features(&self, column: &ColumnRef) -> Result<Vec<(i64, TopoGeometry)>> {
        let columns = self.columns.read().unwrap_or_else(PoisonError::into_inner);
        let entry = columns
            .get(column)
            .ok_or_else(|| Error::NotFound(EntityRef::FeatureColumn(column.to_string())))?;
        Ok(entry.rows.iter().map(|(row, tg)| (*row, *tg)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_create_and_lookup() {
        let catalog = Catalog::with_defaults();
        let id = catalog.create_topology("city", 4326, 0.0, false).unwrap();
        assert_eq!(catalog.topology_id("city").unwrap(), id);
        assert_eq!(catalog.topology_name(id).unwrap(), "city");
        assert_eq!(catalog.topology_srid("city").unwrap(), 4326);
        assert_eq!(catalog.topologies().len(), 1);

        let dup = catalog.create_topology("city", 0, 0.0, false).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::ReferentialConflict);
        let blank = catalog.create_topology(" ", 0, 0.0, false).unwrap_err();
        assert_eq!(blank.kind(), ErrorKind::MalformedInput);
        let negative = catalog.create_topology("neg", 0, -1.0, false).unwrap_err();
        assert_eq!(negative.kind(), ErrorKind::MalformedInput);
        assert_eq!(catalog.topology("nowhere").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_defaults_use_configured_srid() {
        let config = CatalogConfig {
            default_srid: 3857,
            ..CatalogConfig::default()
        };
        let catalog = Catalog::new(config, Arc::new(PlanarGeometry::new()));
        catalog.create_topology_with_defaults("web").unwrap();
        assert_eq!(catalog.topology_srid("web").unwrap(), 3857);
    }

    #[test]
    fn test_columns_are_unique_across_topologies() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("a", 0, 0.0, false).unwrap();
        catalog.create_topology("b", 0, 0.0, false).unwrap();
        catalog
            .add_topo_geometry_column("a", "public", "roads", "topo", "LINE", None)
            .unwrap();
        let err = catalog
            .add_topo_geometry_column("b", "public", "roads", "topo", "LINE", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConflict);
        let bad = catalog
            .add_topo_geometry_column("b", "public", "x", "topo", "SURFACE", None)
            .unwrap_err();
        assert_eq!(bad.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_feature_values_checked() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("t", 0, 0.0, false).unwrap();
        let poi = catalog
            .add_topo_geometry_column("t", "public", "poi", "topo", "POINT", None)
            .unwrap();
        let areas = catalog
            .add_topo_geometry_column("t", "public", "areas", "topo", "POLYGON", None)
            .unwrap();
        let column = ColumnRef::new("public", "poi", "topo");
        let tg = catalog.create_topo_geom("t", 1, poi, &[]).unwrap();
        catalog.set_feature(&column, 7, Some(tg)).unwrap();
        assert_eq!(catalog.feature(&column, 7).unwrap(), Some(tg));

        let other = catalog.create_topo_geom("t", 3, areas, &[]).unwrap();
        let err = catalog.set_feature(&column, 8, Some(other)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        catalog.set_feature(&column, 7, None).unwrap();
        assert!(catalog.features(&column).unwrap().is_empty());

        let dropped = catalog.drop_topo_geometry_column(&column).unwrap();
        assert_eq!(dropped.layer_id, poi);
        assert_eq!(catalog.feature(&column, 7).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_drop_topology_drops_layers() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("gone", 0, 0.0, false).unwrap();
        let base = catalog
            .add_topo_geometry_column("gone", "s", "base", "c", "POLYGON", None)
            .unwrap();
        catalog
            .add_topo_geometry_column("gone", "s", "upper", "c", "POLYGON", Some(base))
            .unwrap();
        catalog.drop_topology("gone").unwrap();
        assert!(catalog.topologies().is_empty());
        assert_eq!(
            catalog
                .drop_topo_geometry_column(&ColumnRef::new("s", "base", "c"))
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        // the name can be reused
        catalog.create_topology("gone", 0, 0.0, false).unwrap();
    }

    #[test]
    fn test_drop_topology_needs_every_column() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("kept", 0, 0.0, false).unwrap();
        let roads = catalog
            .add_topo_geometry_column("kept", "s", "roads", "c", "LINE", None)
            .unwrap();
        let topo = catalog.topology("kept").unwrap();
        let loose = topo.add_layer("s", "b", "c", FeatureType::Point, None).unwrap();

        let err = catalog.drop_topology("kept").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let ids: Vec<_> = topo.layers().iter().map(|l| l.layer_id).collect();
        assert_eq!(ids, vec![roads, loose.layer_id]);
        assert!(catalog.topology("kept").is_ok());
        assert!(catalog.features(&ColumnRef::new("s", "roads", "c")).is_ok());
    }
}
