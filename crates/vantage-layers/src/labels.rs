// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pool of text labels shared by every extension.
//!
//! Labels are expensive to create (text atlas space, DOM/overlay nodes on
//! some hosts), so the host keeps a pool. Renderables borrow labels with
//! [`LabelPool::acquire`] and hand them back with [`LabelPool::release`];
//! they never destroy a label outright.

use std::collections::HashMap;

use glam::Vec3;

/// Exclusive loan of one pooled label.
#[must_use = "labels must be returned to the pool"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Label(u64);

impl Label {
    /// Pool-wide label identity.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Mutable state of a label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelData {
    /// Displayed text.
    pub text: String,
    /// Anchor in the owning renderable's frame.
    pub position: Vec3,
    /// Text height in meters.
    pub size: f32,
    /// Whether the label is drawn.
    pub visible: bool,
}

/// Host-owned label pool.
#[derive(Debug, Default)]
pub struct LabelPool {
    next_id: u64,
    labels: HashMap<u64, LabelData>,
    free: Vec<u64>,
}

impl LabelPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows a label, reusing a returned one when available.
    pub fn acquire(&mut self) -> Label {
        if let Some(id) = self.free.pop() {
            return Label(id);
        }
        self.next_id += 1;
        self.labels.insert(self.next_id, LabelData::default());
        Label(self.next_id)
    }

    /// Returns a label; its state is reset for the next borrower.
    pub fn release(&mut self, label: Label) {
        if let Some(data) = self.labels.get_mut(&label.0) {
            *data = LabelData::default();
            self.free.push(label.0);
        }
    }

    /// Reads a borrowed label.
    pub fn get(&self, label: &Label) -> Option<&LabelData> {
        self.labels.get(&label.0)
    }

    /// Updates a borrowed label in place.
    pub fn get_mut(&mut self, label: &Label) -> Option<&mut LabelData> {
        self.labels.get_mut(&label.0)
    }

    /// Labels currently on loan.
    pub fn outstanding(&self) -> usize {
        self.labels.len() - self.free.len()
    }

    /// Labels sitting in the pool ready for reuse.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Labels ever created by the pool.
    pub fn created(&self) -> usize {
        self.labels.len()
    }
}
