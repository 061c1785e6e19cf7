//! Process memory readings for the `{memoryMB}` token.

use parking_lot::Mutex;
use sysinfo::{ProcessesToUpdate, System};

/// Source of the current process's resident memory.
pub trait MemoryProbe: Send + Sync {
    /// Resident memory in megabytes.
    fn resident_mb(&self) -> f64;
}

/// Reads live process memory via `sysinfo`.
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    /// Create a probe. The first reading refreshes process data.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    #[allow(clippy::cast_precision_loss)]
    fn resident_mb(&self) -> f64 {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return 0.0;
        };
        let mut system = self.system.lock();
        let _ = system.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
        let bytes = system.process(pid).map_or(0, sysinfo::Process::memory);
        bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Constant reading, for deterministic output in tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedMemoryProbe(pub f64);

impl MemoryProbe for FixedMemoryProbe {
    fn resident_mb(&self) -> f64 {
        self.0
    }
}
