pub mod driver;
pub mod memory;
pub mod policy;

pub use driver::{MAX_REFERENCE_LEN, SimOutcome, compare, random_reference_string, simulate};
pub use memory::{
    Access, FrameId, MAX_FRAMES, MemoryManager, MemoryStats, Page, PageRef, SimPid,
};
pub use policy::{Algorithm, EvictionOrder};
