//! Stream descriptor, replication state, sinks and the cycle driver

mod clock;
mod driver;
mod schema;
mod sink;
mod state;

pub use clock::{Clock, FixedClock, SystemClock};
pub use driver::{CycleSummary, StreamDriver};
pub use schema::{FieldSpec, FieldType, StreamSchema};
pub use sink::{JsonLinesSink, RecordSink, VecSink};
pub use state::{JsonFileStateStore, MemoryStateStore, ReplicationState, StateStore};
