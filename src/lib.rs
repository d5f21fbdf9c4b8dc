//! A PLDM terminus stack for baseboard management controllers.
//!
//! PLDM (DMTF DSP0240/DSP0245/DSP0248) is a binary request/response protocol
//! carried over MCTP, used to manage platform hardware: reading the Platform
//! Descriptor Record (PDR) repository, driving state and numeric effecters,
//! and handling platform events. This crate implements the BMC side of that
//! conversation:
//!
//! - [`pdr`]: the PDR repository and the entity association tree.
//! - [`engine`]: the MCTP request/response engine and instance id arbiter.
//! - [`host`]: the remote-terminus PDR synchronisation state machine.
//! - [`effecter`]: the property-driven effecter write pipeline.
//! - [`events`]: `PlatformEventMessage` ingest and emission.
//! - [`codec`]: typed encoders/decoders for the commands this stack speaks.
//!
//! Everything runs on a single-threaded cooperative executor; tasks suspend
//! only at awaits, so state is single-owner between suspension points.

pub mod bus;
pub mod codec;
pub mod effecter;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
mod instance_id;
pub mod mctp;
pub mod pdr;
pub mod responder;

pub use instance_id::InstanceIdDb;

/// MCTP endpoint identifier.
pub type Eid = u8;

/// PLDM terminus identifier.
pub type Tid = u8;

/// PLDM instance id, 5 bits on the wire.
pub type InstanceId = u8;

/// MCTP message type octet for PLDM, per DSP0241.
pub const MCTP_MSG_TYPE_PLDM: u8 = 0x01;

/// The `tid` value reserved for "unknown terminus".
pub const UNKNOWN_TID: Tid = 0xFF;

/// Terminus handle used for PDRs owned by this (the BMC's) terminus.
pub const BMC_TERMINUS_HANDLE: u16 = 1;

/// Effecter id value meaning "not yet resolved against the repository".
pub const INVALID_EFFECTER_ID: u16 = 0xFFFF;
