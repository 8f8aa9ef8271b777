//! Three-state peer visibility lifecycle.

/// A peer's observed liveliness state. Peers are created `Offline`,
/// promoted as traffic arrives, and demoted back to `Offline` by the
/// data-loss scan; records are resurrected in place, never reallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Offline,
    Advertising,
    Online,
}
