mod memory;
mod tikv;

pub use memory::MemoryStore;
pub use tikv::TikvStore;
