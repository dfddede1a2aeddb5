//! SHIP/SLAP peer discovery.
//!
//! Nodes advertise the topics they host (SHIP) and the lookup services they
//! answer (SLAP) as PushDrop tokens. This crate provides the token format,
//! the `tm_ship`/`tm_slap` topic managers, the `ls_ship`/`ls_slap` lookup
//! services, and an [`overlay_protocol::Advertiser`] that builds the
//! advertisement and revocation transactions.

pub mod advertiser;
pub mod lookup_service;
pub mod token;
pub mod topic_manager;

pub use advertiser::PushDropAdvertiser;
pub use lookup_service::AdvertisementLookupService;
pub use token::{decode_advertisement, encode_advertisement, AdvertisementError};
pub use topic_manager::AdvertisementTopicManager;
