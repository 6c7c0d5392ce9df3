//! gatestream: duplex request/response messaging over a single process pipe.
//!
//! A server endpoint sends requests and drains responses into a keyed,
//! concurrently queryable buffer; a worker endpoint receives requests,
//! runs application logic, and replies under the originating id. Payloads
//! larger than the transport part limit travel as continuation-marked part
//! chains.

pub mod buffer;
pub mod drainer;
pub mod framing;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod worker;

pub use buffer::ResponseBuffer;
pub use drainer::Drainer;
pub use framing::{CONTINUATION_MARKER, MAX_PART, MalformedStreamError};
pub use protocol::{CorrelationId, Request, Response, body_to_bytes, bytes_to_body};
pub use server::{ServerEndpoint, ServerError, UnknownResponseIdError};
pub use transport::{ChannelTransport, PartTransport, PipeTransport, TransportError};
pub use worker::{Handler, WorkerEndpoint, WorkerError, run_worker};
