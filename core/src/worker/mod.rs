//! Background worker: message protocol, dispatcher and the task that runs it.

pub mod context;
pub mod dispatcher;
pub mod protocol;
pub mod service;

pub use context::{HttpWorkerContext, StartupError, WorkerContext};
pub use dispatcher::{Dispatcher, Outbound};
pub use protocol::{FinalizedTransaction, Inbound, ProtocolError, WorkerRequest, WorkerResponse};
pub use service::{WorkerHandle, WorkerService};
