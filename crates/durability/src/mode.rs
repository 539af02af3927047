//! Durability mode configuration
//!
//! Controls when committed records are fsynced (Standard, Always).

/// Durability mode for container commits
///
/// # Modes
///
/// | Mode | fsync | Data Loss Window |
/// |------|-------|-----------------|
/// | Always | Every commit | Zero |
/// | Standard | Every `batch_size` commits, and on flush/close | Up to batch |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync after every commit (slow, maximum durability)
    ///
    /// Use when every recorded row must survive a crash of the traced
    /// program.
    Always,

    /// Leave flushing to the OS, fsync every `batch_size` commits (the default)
    ///
    /// A crash may lose the most recent rows, never earlier ones: a torn
    /// tail record is discarded on reopen.
    Standard {
        /// Maximum commits between fsyncs
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::Always => "Always sync (safest, slowest)",
            DurabilityMode::Standard { .. } => "Standard (balanced speed/safety)",
        }
    }

    /// Create a standard mode with recommended defaults
    ///
    /// Returns `Standard { batch_size: 1000 }`.
    pub fn standard_default() -> Self {
        DurabilityMode::Standard { batch_size: 1000 }
    }

    /// Whether a commit that brings the unsynced count to `pending` must sync.
    pub fn sync_due(&self, pending: usize) -> bool {
        match self {
            DurabilityMode::Always => true,
            DurabilityMode::Standard { batch_size } => pending >= (*batch_size).max(1),
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::standard_default()
    }
}
