mod memory;

pub use memory::MemoryMessageQueue;
