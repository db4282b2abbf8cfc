//! Session layer registry.
//!
//! Built from the capabilities collaborator's layer descriptors when a
//! session starts. Layer identities and reference systems are fixed for the
//! session; only visibility and the workspace filter change.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use map_common::{CrsCode, Layer, LayerDescriptor, LayerId, QueryError, QueryResult};

/// Queryable layers of the current session.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<Layer>,
    /// Visible layers in the order they were switched on
    visible_order: Vec<LayerId>,
    /// Workspaces in first-seen order
    workspaces: Vec<String>,
    selected_workspaces: BTreeSet<String>,
}

/// Pick the reference system used for a layer.
///
/// The first preferred code the layer advertises wins, then the first
/// advertised code, then Web Mercator.
pub fn choose_reference_system(advertised: &[String], preferred: &[CrsCode]) -> CrsCode {
    let advertised: Vec<CrsCode> = advertised
        .iter()
        .filter_map(|s| match CrsCode::parse(s) {
            Ok(code) => Some(code),
            Err(_) => {
                debug!(crs = %s, "Skipping unparseable advertised CRS");
                None
            }
        })
        .collect();

    preferred
        .iter()
        .find(|code| advertised.contains(code))
        .or_else(|| advertised.first())
        .cloned()
        .unwrap_or_else(CrsCode::web_mercator)
}

impl LayerRegistry {
    pub fn from_descriptors(descriptors: &[LayerDescriptor], preferred_crs: &[CrsCode]) -> Self {
        let mut registry = LayerRegistry::default();

        for descriptor in descriptors {
            let Some(id) = LayerId::parse(&descriptor.name) else {
                debug!(name = %descriptor.name, "Skipping layer without workspace prefix");
                continue;
            };
            if registry.get(&id).is_some() {
                warn!(layer = %id, "Duplicate layer in catalog, keeping the first");
                continue;
            }

            if !registry.workspaces.contains(&id.workspace) {
                registry.workspaces.push(id.workspace.clone());
                registry.selected_workspaces.insert(id.workspace.clone());
            }

            let title = descriptor
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| id.name.clone());

            registry.layers.push(Layer {
                reference_system: choose_reference_system(&descriptor.crs, preferred_crs),
                id,
                title,
                keywords: descriptor.keywords.clone(),
                styles: descriptor.styles.clone(),
                geographic_bbox: descriptor.geographic_bbox,
                visible: false,
            });
        }

        info!(
            layers = registry.layers.len(),
            workspaces = registry.workspaces.len(),
            "Layer registry built"
        );
        registry
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    /// Look up a layer by qualified name.
    pub fn find(&self, qualified: &str) -> Option<&Layer> {
        LayerId::parse(qualified).and_then(|id| self.get(&id))
    }

    pub fn require(&self, id: &LayerId) -> QueryResult<&Layer> {
        self.get(id)
            .ok_or_else(|| QueryError::LayerNotFound(id.qualified()))
    }

    /// Switch a layer on or off.
    ///
    /// A layer switched on goes to the end of the visible order.
    pub fn set_visible(&mut self, id: &LayerId, visible: bool) -> QueryResult<()> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| QueryError::LayerNotFound(id.qualified()))?;

        if layer.visible == visible {
            return Ok(());
        }
        layer.visible = visible;
        if visible {
            self.visible_order.push(id.clone());
        } else {
            self.visible_order.retain(|v| v != id);
        }
        debug!(layer = %id, visible, "Layer visibility changed");
        Ok(())
    }

    /// Flip a layer's visibility, returning the new state.
    pub fn toggle(&mut self, id: &LayerId) -> QueryResult<bool> {
        let visible = !self.require(id)?.visible;
        self.set_visible(id, visible)?;
        Ok(visible)
    }

    /// Visible layers in query priority order.
    pub fn visible_layers(&self) -> Vec<Layer> {
        self.visible_order
            .iter()
            .filter_map(|id| self.get(id))
            .cloned()
            .collect()
    }

    pub fn workspaces(&self) -> &[String] {
        &self.workspaces
    }

    /// Restrict listings to the given workspaces. Unknown names are ignored.
    pub fn select_workspaces<I, S>(&mut self, workspaces: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selected_workspaces = workspaces
            .into_iter()
            .map(|w| w.as_ref().to_string())
            .filter(|w| self.workspaces.contains(w))
            .collect();
    }

    pub fn select_all_workspaces(&mut self) {
        self.selected_workspaces = self.workspaces.iter().cloned().collect();
    }

    pub fn is_workspace_selected(&self, workspace: &str) -> bool {
        self.selected_workspaces.contains(workspace)
    }

    /// Layers of the selected workspaces, in catalog order.
    pub fn filtered_layers(&self) -> Vec<&Layer> {
        self.layers
            .iter()
            .filter(|l| self.selected_workspaces.contains(&l.id.workspace))
            .collect()
    }
}
