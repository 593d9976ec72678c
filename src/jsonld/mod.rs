//! JSON-LD serialization engine: context, identity, single-record and
//! streaming serialization for FOCUS cost records.

pub mod context;
pub mod identity;
pub mod options;
pub mod record;
pub mod serializer;
pub mod stream;

pub use context::{Context, ContextError};
pub use identity::{IdentityError, IdentityGenerator};
pub use options::{DateFormat, SerializerOptions, SerializerOptionsBuilder, StreamLimits};
pub use record::{
    ChargeCategory, ChargeClass, ChargeFrequency, ContractCommitment, FocusCostRecord, Money,
};
pub use serializer::{SerializeError, Serializer};
pub use stream::{
    serialize_batch, serialize_slice, serialize_stream, RecordSource, StreamError, StreamErrorKind,
    StreamResult, StreamStopReason, VecSource,
};
