//! `momsync-outbound`: the execution-repository → planning-system pipeline.
//!
//! # Architecture
//!
//! ```text
//! Repository (OTDB)
//!     │  query_changed_since([cursor.last_end, now))
//!     ▼
//! Poller        ← timer driven, one cycle at a time, persists the cursor
//!     │  Task { payload: outbound XML }
//!     ▼
//! TaskQueue     ← FIFO, async dequeue, requeue at tail on failure
//!     │
//!     ▼
//! Dispatcher    ← single consumer, persistent session, bounded retries
//!     │  POST command=IMPORTXML2
//!     ▼
//! PlanningClient (MoM)
//! ```

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod queue;

pub use client::PlanningClient;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::OutboundError;
pub use poller::{CycleReport, Poller};
pub use queue::TaskQueue;
