// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port trait for requesting a redraw without depending on a windowing crate.

/// Minimal redraw port; implementations are expected to be cheap/best-effort
/// and typically forward to a surface's `request_redraw`.
pub trait RenderPort {
    /// Request a redraw of the scene surface.
    fn request_redraw(&self);
}
