// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-topology handle.
//!
//! A [`Topology`] owns the committed rows of one topology and its id
//! sequences. Readers take cheap snapshots; every edit runs in its own
//! transaction and either commits as a whole or leaves the topology
//! untouched.

use std::sync::{Arc, PoisonError, RwLock};

use topolite_geometry::GeometryLibrary;

use crate::config::CatalogConfig;
use crate::error::Result;
use crate::ids::TopologyId;
use crate::primitives::TopologyInfo;
use crate::store::{CommittedState, Sequences, TopologyData, Transaction};

/// One planar topology: primitives, layers and relations.
#[derive(Debug)]
pub struct Topology {
    info: TopologyInfo,
    geometry: Arc<dyn GeometryLibrary>,
    config: CatalogConfig,
    state: RwLock<CommittedState>,
    pub(crate) sequences: Sequences,
}

impl Topology {
    pub(crate) fn new(
        info: TopologyInfo,
        geometry: Arc<dyn GeometryLibrary>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            info,
            geometry,
            config,
            state: RwLock::new(CommittedState::new(TopologyData::new())),
            sequences: Sequences::new(),
        }
    }

    pub fn info(&self) -> &TopologyInfo {
        &self.info
    }

    pub fn id(&self) -> TopologyId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn srid(&self) -> i32 {
        self.info.srid
    }

    pub fn precision(&self) -> f64 {
        self.info.precision
    }

    pub fn geometry(&self) -> &dyn GeometryLibrary {
        self.geometry.as_ref()
    }

    pub(crate) fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Consistent read-only view of the last committed state.
    pub fn snapshot(&self) -> Arc<TopologyData> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Number of edits committed so far.
    pub fn version(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version()
    }

    pub(crate) fn begin(&self) -> Transaction {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .begin()
    }

    pub(crate) fn commit(&self, tx: Transaction) -> Result<u64> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .commit(tx, &self.info.name)
    }

    /// Runs `f` in a fresh transaction, checks ring invariants and commits.
    ///
    /// Nothing is published when `f`, the invariant check or the commit fails.
    pub(crate) fn edit<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut tx = self.begin();
        let out = match f(&mut tx) {
            Ok(out) => out,
            Err(err) => {
                tracing::debug!(topology = %self.info.name, op, error = %err, "edit rejected");
                return Err(err);
            }
        };
        tx.check_invariants()?;
        let version = self.commit(tx)?;
        tracing::debug!(topology = %self.info.name, op, version, "edit applied");
        Ok(out)
    }
}
