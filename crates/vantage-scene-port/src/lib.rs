// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collaborator contracts for Vantage scene extensions.
//!
//! Scene extensions own a registry of renderables but none of the services
//! those renderables depend on. This crate names those services:
//!
//! - **Time** is supplied by the host frame clock and by message headers.
//! - **Poses** come from a [`TransformResolver`]; an unresolvable frame is an
//!   expected steady state during startup, not an error condition.
//! - **Pointer input** arrives as [`PointerEvent`]s whose world point may be
//!   absent when the pointer is off every pickable surface.
//! - **Redraws** are requested through a [`RenderPort`].
//!
//! # Crate Features
//!
//! - `test-utils`: exposes [`mock::StaticTransforms`].

mod input;
mod pose;
mod render_port;
mod time;
mod transform;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use input::{PointerEvent, PointerEventKind};
pub use pose::Pose;
pub use render_port::RenderPort;
pub use time::Time;
pub use transform::{TransformError, TransformQuery, TransformResolver};
