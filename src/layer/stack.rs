use super::{Layer, LayerId, LayerPatch};
use crate::assets::{AssetId, AssetRef};

/// Ordered layers; index 0 is the bottom of the z-order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub const fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Builds a stack, dropping any layer whose id is already present.
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        let mut stack = Self::new();
        for layer in layers {
            if !stack.push(layer) {
                tracing::warn!("dropping layer with duplicate id while building stack");
            }
        }
        stack
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn as_slice(&self) -> &[Layer] {
        &self.layers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    /// Ids of the raster assets the stack draws from.
    pub fn asset_ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.layers
            .iter()
            .filter_map(|layer| layer.content.raster_source())
            .map(AssetRef::id)
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }

    /// Appends on top. Rejects a layer whose id is already in the stack.
    pub fn push(&mut self, layer: Layer) -> bool {
        if self.contains(layer.id) {
            return false;
        }
        self.layers.push(layer);
        true
    }

    /// Inserts at `index` (clamped to the top). Rejects duplicate ids.
    pub fn insert(&mut self, index: usize, layer: Layer) -> bool {
        if self.contains(layer.id) {
            return false;
        }
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        true
    }

    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.index_of(id)?;
        Some(self.layers.remove(index))
    }

    /// Splice move. A no-op when either index is out of range.
    ///
    /// Positional, not id-based: resolve ids with [`LayerStack::index_of`]
    /// immediately before calling, or use [`LayerStack::move_layer_by_id`].
    pub fn move_layer(&mut self, from: usize, to: usize) -> bool {
        let len = self.layers.len();
        if from >= len || to >= len {
            tracing::debug!(from, to, len, "ignoring out-of-range layer move");
            return false;
        }
        if from == to {
            return false;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        true
    }

    pub fn move_layer_by_id(&mut self, id: LayerId, to: usize) -> bool {
        match self.index_of(id) {
            Some(from) => self.move_layer(from, to),
            None => false,
        }
    }

    /// Merges `patch` into the layer with `id`. Unknown ids are a silent no-op.
    pub fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> bool {
        match self.get_mut(id) {
            Some(layer) => layer.apply_patch(patch),
            None => {
                tracing::debug!(layer = %id, "update for missing layer ignored");
                false
            }
        }
    }

    /// Functional form of [`LayerStack::update_layer`].
    pub fn with_update(&self, id: LayerId, patch: &LayerPatch) -> LayerStack {
        let mut next = self.clone();
        next.update_layer(id, patch);
        next
    }

    /// Functional form of [`LayerStack::move_layer`].
    pub fn with_move(&self, from: usize, to: usize) -> LayerStack {
        let mut next = self.clone();
        next.move_layer(from, to);
        next
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|layer| layer.id).collect()
    }
}

impl<'a> IntoIterator for &'a LayerStack {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}
