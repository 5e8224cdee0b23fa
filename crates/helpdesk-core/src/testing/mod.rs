//! Test doubles for services and handlers.
//!
//! Enabled with the `testing` feature. Tests that need real SQL behaviour
//! should run against PostgreSQL; everything else can use [`MemoryStore`]
//! and [`RecordingOutbox`].

mod memory;
mod outbox;

pub use memory::MemoryStore;
pub use outbox::RecordingOutbox;
