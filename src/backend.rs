//! Backend adapters shipped with the crate.

pub mod memory;

#[doc(inline)]
pub use memory::MemoryBackend;
