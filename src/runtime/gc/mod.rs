pub mod node_heap;
pub mod node_id;
pub mod slot;
pub mod telemetry;

pub use node_heap::NodeHeap;
pub use node_id::NodeId;
pub use slot::{ActorId, SlotState};
pub use telemetry::{CycleMetrics, GcTelemetry, HeapSnapshot};
