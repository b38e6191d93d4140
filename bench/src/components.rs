//! Common component descriptors used across benchmarks.
//!
//! These are sized to be representative of real game components: small
//! float vectors, a wide transform, a couple of integer stat blocks and a
//! pair of tags.

use strata_engine::ecs::{Component, ElementKind, Schema};

/// The standard fixture set, built once per world so every benchmark
/// resolves the same descriptors.
pub struct Fixtures {
    /// 3D position (three f32 columns).
    pub position: Component,

    /// 3D velocity (three f32 columns).
    pub velocity: Component,

    /// Euler rotation (three f32 columns).
    pub rotation: Component,

    /// Row-major 4x4 transform (sixteen f32 columns).
    pub transform: Component,

    /// Hit points and armor (u16 + u8 columns).
    pub health: Component,

    /// Marker for entities excluded from simulation.
    pub frozen: Component,

    /// Marker for entities flagged for teardown.
    pub doomed: Component,
}

impl Fixtures {
    /// Build a fresh descriptor set.
    pub fn new() -> Self {
        Self {
            position: vec3("position"),
            velocity: vec3("velocity"),
            rotation: vec3("rotation"),
            transform: transform(),
            health: Component::new(
                "health",
                Schema::new()
                    .field("hp", ElementKind::U16)
                    .field("armor", ElementKind::U8),
            )
            .unwrap(),
            frozen: Component::tag("frozen").unwrap(),
            doomed: Component::tag("doomed").unwrap(),
        }
    }

    /// Every fixture descriptor, in registration order.
    pub fn all(&self) -> Vec<Component> {
        vec![
            self.position.clone(),
            self.velocity.clone(),
            self.rotation.clone(),
            self.transform.clone(),
            self.health.clone(),
            self.frozen.clone(),
            self.doomed.clone(),
        ]
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}

fn vec3(name: &str) -> Component {
    Component::new(
        name,
        Schema::new()
            .field("x", ElementKind::F32)
            .field("y", ElementKind::F32)
            .field("z", ElementKind::F32),
    )
    .unwrap()
}

fn transform() -> Component {
    let mut schema = Schema::new();
    for row in 0..4 {
        for col in 0..4 {
            schema = schema.field(format!("m{row}{col}"), ElementKind::F32);
        }
    }
    Component::new("transform", schema).unwrap()
}
