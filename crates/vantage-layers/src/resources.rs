// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! GPU-side resource accounting.
//!
//! The real scene graph is an external collaborator; the [`ResourceArena`]
//! models the part of it renderables are responsible for: which buffers and
//! materials are alive and who owns them.
//!
//! # Ownership
//!
//! - [`GeometryHandle`], [`MaterialHandle`] and [`InstanceBufferHandle`] are
//!   exclusive: they are neither `Clone` nor `Copy`, and the `release_*`
//!   methods consume them. A handle can therefore be released at most once,
//!   and storing it as `Option<Handle>` plus `take()` makes disposal idempotent.
//! - [`SharedGeometry`] is a counted reference to a named template. Renderables
//!   return it with [`ResourceArena::release_shared`]; the template is freed
//!   when the last reference goes. Mutating a template requires
//!   [`ResourceArena::clone_shared`], which yields an exclusive handle.

use std::collections::HashMap;

use glam::Vec3;
use tracing::{trace, warn};

use crate::labels::LabelPool;

/// Opaque identity of a live resource, comparable across calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Exclusive handle to a geometry buffer.
#[must_use = "geometry leaks unless released through the arena"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct GeometryHandle(ResourceId);

/// Exclusive handle to a material.
#[must_use = "materials leak unless released through the arena"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MaterialHandle(ResourceId);

/// Exclusive handle to a fixed-capacity instance buffer.
#[must_use = "instance buffers leak unless released through the arena"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InstanceBufferHandle(ResourceId);

/// Counted reference to a named, read-only geometry template.
#[must_use = "shared templates stay pinned unless released through the arena"]
#[derive(Debug, PartialEq, Eq)]
pub struct SharedGeometry {
    name: String,
    id: ResourceId,
}

macro_rules! handle_id {
    ($($ty:ty),*) => {
        $(impl $ty {
            /// Identity of the underlying resource.
            pub fn id(&self) -> ResourceId {
                self.0
            }
        })*
    };
}

handle_id!(GeometryHandle, MaterialHandle, InstanceBufferHandle);

impl SharedGeometry {
    /// Identity of the template (same for every reference).
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Primitive assembly of a geometry buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Pairs of vertices form segments.
    LineList,
    /// Consecutive vertices form a polyline.
    LineStrip,
    /// Each vertex is a point sprite.
    Points,
    /// Vertex triples form triangles.
    Triangles,
}

/// Vertex data of a geometry buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryData {
    /// Primitive assembly.
    pub topology: Topology,
    /// Vertex positions. The length is fixed for the life of the buffer.
    pub positions: Vec<Vec3>,
    /// Number of leading vertices drawn (`<= positions.len()`).
    pub draw_count: usize,
}

impl GeometryData {
    /// Geometry that draws every vertex.
    pub fn new(topology: Topology, positions: Vec<Vec3>) -> Self {
        let draw_count = positions.len();
        Self {
            topology,
            positions,
            draw_count,
        }
    }

    /// Zeroed buffer of `capacity` vertices with nothing drawn.
    pub fn with_capacity(topology: Topology, capacity: usize) -> Self {
        Self {
            topology,
            positions: vec![Vec3::ZERO; capacity],
            draw_count: 0,
        }
    }
}

/// Uniform state of a material. Updating it never reallocates geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialData {
    /// Linear RGBA color.
    pub color: [f32; 4],
    /// Line width in pixels (line topologies only).
    pub line_width: f32,
    /// Whether the material is drawn at all.
    pub visible: bool,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            line_width: 1.0,
            visible: true,
        }
    }
}

/// Per-instance transforms and colors with a fixed capacity.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceBufferData {
    capacity: usize,
    /// Instance positions (first `count` entries are live).
    pub positions: Vec<Vec3>,
    /// Instance scales.
    pub scales: Vec<Vec3>,
    /// Instance colors.
    pub colors: Vec<[f32; 4]>,
    count: usize,
}

impl InstanceBufferData {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            positions: vec![Vec3::ZERO; capacity],
            scales: vec![Vec3::ONE; capacity],
            colors: vec![[0.0; 4]; capacity],
            count: 0,
        }
    }

    /// Maximum number of instances the buffer can draw.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of instances drawn.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sets the drawn instance count, clamped to capacity. Returns the
    /// effective count.
    pub fn set_count(&mut self, requested: usize) -> usize {
        self.count = requested.min(self.capacity);
        self.count
    }
}

#[derive(Debug)]
enum Slot {
    Geometry(GeometryData),
    Material(MaterialData),
    Instances(InstanceBufferData),
}

#[derive(Debug)]
struct SharedEntry {
    id: ResourceId,
    refs: usize,
}

/// Live-resource table owned by the rendering host.
#[derive(Debug, Default)]
pub struct ResourceArena {
    next_id: u64,
    slots: HashMap<ResourceId, Slot>,
    shared: HashMap<String, SharedEntry>,
    allocated: usize,
    released: usize,
}

impl ResourceArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, slot: Slot) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.slots.insert(id, slot);
        self.allocated += 1;
        trace!(id = id.0, "allocated resource");
        id
    }

    fn free(&mut self, id: ResourceId) {
        if self.slots.remove(&id).is_some() {
            self.released += 1;
            trace!(id = id.0, "released resource");
        } else {
            warn!(id = id.0, "release of unknown resource");
        }
    }

    /// Uploads a geometry buffer.
    pub fn create_geometry(&mut self, data: GeometryData) -> GeometryHandle {
        GeometryHandle(self.allocate(Slot::Geometry(data)))
    }

    /// Reads a geometry buffer.
    pub fn geometry(&self, handle: &GeometryHandle) -> Option<&GeometryData> {
        self.geometry_by_id(handle.0)
    }

    /// Reads any geometry (exclusive or shared template) by identity.
    pub fn geometry_by_id(&self, id: ResourceId) -> Option<&GeometryData> {
        match self.slots.get(&id) {
            Some(Slot::Geometry(data)) => Some(data),
            _ => None,
        }
    }

    /// Writes a geometry buffer in place. The vertex count cannot change
    /// through this path; size changes require a new buffer.
    pub fn geometry_mut(&mut self, handle: &GeometryHandle) -> Option<&mut GeometryData> {
        match self.slots.get_mut(&handle.0) {
            Some(Slot::Geometry(data)) => Some(data),
            _ => None,
        }
    }

    /// Frees a geometry buffer.
    pub fn release_geometry(&mut self, handle: GeometryHandle) {
        self.free(handle.0);
    }

    /// Creates a material.
    pub fn create_material(&mut self, data: MaterialData) -> MaterialHandle {
        MaterialHandle(self.allocate(Slot::Material(data)))
    }

    /// Reads a material.
    pub fn material(&self, handle: &MaterialHandle) -> Option<&MaterialData> {
        match self.slots.get(&handle.0) {
            Some(Slot::Material(data)) => Some(data),
            _ => None,
        }
    }

    /// Updates material uniforms in place.
    pub fn material_mut(&mut self, handle: &MaterialHandle) -> Option<&mut MaterialData> {
        match self.slots.get_mut(&handle.0) {
            Some(Slot::Material(data)) => Some(data),
            _ => None,
        }
    }

    /// Frees a material.
    pub fn release_material(&mut self, handle: MaterialHandle) {
        self.free(handle.0);
    }

    /// Allocates an instance buffer able to hold `capacity` instances.
    pub fn create_instance_buffer(&mut self, capacity: usize) -> InstanceBufferHandle {
        let slot = Slot::Instances(InstanceBufferData::new(capacity));
        InstanceBufferHandle(self.allocate(slot))
    }

    /// Reads an instance buffer.
    pub fn instance_buffer(&self, handle: &InstanceBufferHandle) -> Option<&InstanceBufferData> {
        match self.slots.get(&handle.0) {
            Some(Slot::Instances(data)) => Some(data),
            _ => None,
        }
    }

    /// Writes an instance buffer in place.
    pub fn instance_buffer_mut(
        &mut self,
        handle: &InstanceBufferHandle,
    ) -> Option<&mut InstanceBufferData> {
        match self.slots.get_mut(&handle.0) {
            Some(Slot::Instances(data)) => Some(data),
            _ => None,
        }
    }

    /// Frees an instance buffer.
    pub fn release_instance_buffer(&mut self, handle: InstanceBufferHandle) {
        self.free(handle.0);
    }

    /// Borrows the template called `name`, building it on first use.
    pub fn acquire_shared<F>(&mut self, name: &str, build: F) -> SharedGeometry
    where
        F: FnOnce() -> GeometryData,
    {
        if let Some(entry) = self.shared.get_mut(name) {
            entry.refs += 1;
            return SharedGeometry {
                name: name.to_owned(),
                id: entry.id,
            };
        }
        let id = self.allocate(Slot::Geometry(build()));
        self.shared
            .insert(name.to_owned(), SharedEntry { id, refs: 1 });
        SharedGeometry {
            name: name.to_owned(),
            id,
        }
    }

    /// Returns a template reference; the last one frees the template.
    pub fn release_shared(&mut self, shared: SharedGeometry) {
        let Some(entry) = self.shared.get_mut(&shared.name) else {
            warn!(name = %shared.name, "release of unknown shared template");
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            let id = entry.id;
            self.shared.remove(&shared.name);
            self.free(id);
        }
    }

    /// Copies a template into a new exclusively-owned buffer.
    pub fn clone_shared(&mut self, shared: &SharedGeometry) -> Option<GeometryHandle> {
        let data = self.geometry_by_id(shared.id)?.clone();
        Some(self.create_geometry(data))
    }

    /// Outstanding references to template `name` (0 when not cached).
    pub fn shared_refs(&self, name: &str) -> usize {
        self.shared.get(name).map_or(0, |entry| entry.refs)
    }

    /// Whether a resource is still alive.
    pub fn is_live(&self, id: ResourceId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of live resources (templates included).
    pub fn live_count(&self) -> usize {
        self.slots.len()
    }

    /// Total allocations since creation.
    pub fn allocated_count(&self) -> usize {
        self.allocated
    }

    /// Total releases since creation.
    pub fn released_count(&self) -> usize {
        self.released
    }
}

/// Everything a renderable may own or borrow: arena resources and pooled labels.
#[derive(Debug, Default)]
pub struct SceneResources {
    /// Geometry, materials and instance buffers.
    pub arena: ResourceArena,
    /// Host-owned label pool.
    pub labels: LabelPool,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;

    fn triangle() -> GeometryData {
        GeometryData::new(Topology::Triangles, vec![Vec3::X, Vec3::Y, Vec3::Z])
    }

    #[test]
    fn release_frees_exactly_once() {
        let mut arena = ResourceArena::new();
        let handle = arena.create_geometry(triangle());
        let id = handle.id();
        assert!(arena.is_live(id));
        arena.release_geometry(handle);
        assert!(!arena.is_live(id));
        assert_eq!(arena.released_count(), 1);
        assert_eq!(arena.live_count(), 0);
    }

    #[test]
    fn shared_template_lives_until_last_reference() {
        let mut arena = ResourceArena::new();
        let a = arena.acquire_shared("unit-box", triangle);
        let b = arena.acquire_shared("unit-box", || unreachable!("template is cached"));
        assert_eq!(a.id(), b.id());
        assert_eq!(arena.shared_refs("unit-box"), 2);

        arena.release_shared(a);
        assert!(arena.is_live(b.id()));
        let id = b.id();
        arena.release_shared(b);
        assert!(!arena.is_live(id));
        assert_eq!(arena.shared_refs("unit-box"), 0);
    }

    #[test]
    fn clone_of_template_is_independent() {
        let mut arena = ResourceArena::new();
        let template = arena.acquire_shared("tri", triangle);
        let owned = arena.clone_shared(&template).unwrap();
        assert_ne!(owned.id(), template.id());

        arena.geometry_mut(&owned).unwrap().positions[0] = Vec3::NEG_X;
        let shared = arena.geometry_by_id(template.id()).unwrap();
        assert_eq!(shared.positions[0], Vec3::X);

        arena.release_geometry(owned);
        assert!(arena.is_live(template.id()));
        arena.release_shared(template);
        assert_eq!(arena.live_count(), 0);
    }

    #[test]
    fn instance_count_clamps_to_capacity() {
        let mut arena = ResourceArena::new();
        let buffer = arena.create_instance_buffer(2);
        let data = arena.instance_buffer_mut(&buffer).unwrap();
        assert_eq!(data.set_count(5), 2);
        assert_eq!(data.count(), 2);
        arena.release_instance_buffer(buffer);
    }
}
