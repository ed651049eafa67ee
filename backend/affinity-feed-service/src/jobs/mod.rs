// ============================================
// Background Jobs Module
// ============================================
//
// Contains background job runners for:
// 1. Idle session flush (persist and drop profiles of inactive users)
//
// Jobs are spawned by the service binary and run until shutdown.

pub mod idle_flush;

pub use idle_flush::{FlushStats, IdleFlushJob};
