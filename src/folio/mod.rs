//! Folio sequencing and reassembly.

pub mod reassembly;
pub mod window;

pub use reassembly::{FolioEvent, FolioWindow};
pub use window::{Acceptance, SequenceTracker};
