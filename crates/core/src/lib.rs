//! `polecheck-core`: pole/wire data model and shared primitives.
//!
//! Pure crate: geometry, fiber-token extraction and description unwrapping
//! live here exactly once so every consumer shares the same heuristics.
//! Nothing in this crate returns an error for malformed data.

pub mod describe;
pub mod fiber;
pub mod geo;
pub mod model;
pub mod text;

pub use fiber::{extract_fiber_size, is_fiber_wire, is_gigapower, FiberText};
pub use model::{
    Attachment, AttachmentKind, Coordinates, KmzFiberData, Measure, Owner, Pole, PoleLayer,
    PoleWire, ProjectInfo, WireEndPoint, EXISTING, PROPOSED, REMEDY,
};
