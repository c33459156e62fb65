//! Wire protocol.
//!
//! Every message on the channel is a JSON envelope `{"event": .., "data": ..}`
//! serialized to text. The shape of `data` depends on `event`:
//! - `request-api`, `api-received`: no data.
//! - `api`: ordered list of function names.
//! - `call-function`: [`CallRecord`].
//! - `return-value`: [`ReturnRecord`].
//! - `return-error`: [`ErrorRecord`].

pub mod envelope;
pub mod records;

pub use envelope::{encode_envelope, Envelope, EventKind};
pub use records::{ApiDescriptor, CallId, CallRecord, ErrorRecord, ReturnRecord};
