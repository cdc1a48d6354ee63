//! Linear undo/redo over deep-copied layer stack snapshots.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbaImage;

use crate::geometry::CanvasSize;
use crate::layer::{Layer, LayerStack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(u64);

impl SnapshotId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Point-in-time copy of the layer stack with its flattened preview.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub preview: Arc<RgbaImage>,
    pub layers: LayerStack,
    pub label: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    Undo,
    Redo,
}

impl HistoryStep {
    pub const fn applied_message(self) -> &'static str {
        match self {
            Self::Undo => "undo applied",
            Self::Redo => "redo applied",
        }
    }

    pub const fn empty_message(self) -> &'static str {
        match self {
            Self::Undo => "nothing to undo",
            Self::Redo => "nothing to redo",
        }
    }
}

/// Ordered snapshots plus a cursor. Never empty; `current` always indexes an entry.
///
/// Mutation needs `&mut self`, so pushes and undo/redo can't interleave.
#[derive(Debug, Clone)]
pub struct Timeline {
    entries: Vec<Snapshot>,
    current: usize,
    canvas: CanvasSize,
    next_id: u64,
}

impl Timeline {
    /// Seeds the timeline with snapshot 0.
    pub fn new(
        canvas: CanvasSize,
        layers: &LayerStack,
        preview: RgbaImage,
        label: impl Into<String>,
    ) -> Self {
        let mut timeline = Self {
            entries: Vec::new(),
            current: 0,
            canvas,
            next_id: 1,
        };
        let first = timeline.make_snapshot(layers, preview, label.into());
        timeline.entries.push(first);
        timeline
    }

    /// Drops every entry and starts over with a single base layer.
    pub fn reset(&mut self, canvas: CanvasSize, base: Layer, preview: RgbaImage) {
        let stack = LayerStack::from_layers(vec![base]);
        let first = self.make_snapshot(&stack, preview, "Reset".to_string());
        self.entries.clear();
        self.entries.push(first);
        self.current = 0;
        self.canvas = canvas;
        tracing::debug!(width = canvas.width, height = canvas.height, "history reset");
    }

    /// Discards any redo tail, appends a copy of `layers` and makes it current.
    pub fn push(
        &mut self,
        layers: &LayerStack,
        preview: RgbaImage,
        label: impl Into<String>,
    ) -> SnapshotId {
        let snapshot = self.make_snapshot(layers, preview, label.into());
        let id = snapshot.id;
        let discarded = self.entries.len() - (self.current + 1);
        self.entries.truncate(self.current + 1);
        self.entries.push(snapshot);
        self.current = self.entries.len() - 1;
        tracing::debug!(
            snapshot = id.get(),
            index = self.current,
            discarded,
            label = %self.entries[self.current].label,
            "history snapshot recorded"
        );
        id
    }

    /// Steps back and returns a fresh copy of that snapshot's stack.
    pub fn undo(&mut self) -> Option<LayerStack> {
        self.step(HistoryStep::Undo)
    }

    pub fn redo(&mut self) -> Option<LayerStack> {
        self.step(HistoryStep::Redo)
    }

    pub fn step(&mut self, step: HistoryStep) -> Option<LayerStack> {
        let target = match step {
            HistoryStep::Undo => self.current.checked_sub(1)?,
            HistoryStep::Redo => Some(self.current + 1)
                .filter(|index| *index < self.entries.len())?,
        };
        self.current = target;
        tracing::debug!(index = target, "{}", step.applied_message());
        Some(self.entries[target].layers.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.entries.len()
    }

    pub fn current(&self) -> &Snapshot {
        &self.entries[self.current]
    }

    pub const fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub const fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    fn make_snapshot(&mut self, layers: &LayerStack, preview: RgbaImage, label: String) -> Snapshot {
        let id = SnapshotId(self.next_id);
        self.next_id += 1;
        Snapshot {
            id,
            preview: Arc::new(preview),
            layers: layers.clone(),
            label,
            created_at: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
