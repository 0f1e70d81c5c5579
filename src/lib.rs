// Library crate for hexfs: re-export internal modules for reuse by the demo
// binary and external callers.

pub mod kvadapter;
pub mod syscall;
