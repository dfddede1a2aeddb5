//! Fundamental types for the overlay services node.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! transaction ids, output references, submission and lookup envelopes,
//! advertisements, and the structured error report returned to callers.

pub mod advertisement;
pub mod error;
pub mod lookup;
pub mod metadata;
pub mod network;
pub mod outpoint;
pub mod submission;
pub mod time;
pub mod txid;

pub use advertisement::{Advertisement, AdvertisementData, AdvertisementProtocol};
pub use error::{ErrorKind, ErrorReport, TypesError};
pub use lookup::{LookupAnswer, LookupFormula, LookupQuestion, LookupResult, OutputListItem};
pub use metadata::ServiceMetaData;
pub use network::NetworkId;
pub use outpoint::OutputRef;
pub use submission::{AdmittanceInstructions, Steak, TaggedTransaction, TopicSteak};
pub use time::Timestamp;
pub use txid::TxId;
