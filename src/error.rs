//! Stack-wide error types.

use crate::codec::CompletionCode;
use crate::Eid;
use core::num::TryFromIntError;

/// A PLDM stack error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An error occurred encoding or decoding an item.
    Wire(pldm_wire::WireError),
    /// A peer misbehaved at the protocol level.
    Protocol(ProtocolError),
    /// A PDR repository operation failed.
    Repo(RepoError),
    /// An entity association tree operation failed.
    Tree(TreeError),
    /// Something timed out.
    Timeout,
    /// All 32 instance ids for an endpoint are reserved.
    InstanceIdExhausted {
        /// The endpoint the allocation was attempted against.
        eid: Eid,
    },
    /// An instance id is already bound to an in-flight request.
    InstanceIdInFlight {
        /// The endpoint the request was addressed to.
        eid: Eid,
        /// The doubly-bound instance id.
        instance_id: u8,
    },
    /// An item in a collection could not be found.
    NotFound {
        /// Item kind.
        item: Item,
    },
    /// A socket operation failed.
    Io(std::io::ErrorKind),
    /// A datagram was only partially sent.
    PartialSend {
        /// Message length in bytes.
        len: usize,
        /// The number of bytes sent.
        sent: usize,
    },
    /// A value may be too large or otherwise could not be converted into a
    /// target type.
    IntegerTypeConversion,
    /// A configuration file is malformed.
    Config(ConfigError),
    /// A requested value is outside the configured settable range.
    OutOfRange,
    /// An internal error occurred. This indicates something that shouldn't
    /// happen within the stack.
    Internal,
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Wire(e) => write!(f, "wire encode/decode error: {}", e),
            Error::Protocol(e) => write!(f, "protocol: {}", e),
            Error::Repo(e) => write!(f, "pdr repository: {}", e),
            Error::Tree(e) => write!(f, "entity tree: {}", e),
            Error::Timeout => f.write_str("timeout"),
            Error::InstanceIdExhausted { eid } => {
                write!(f, "no free instance id for eid {}", eid)
            }
            Error::InstanceIdInFlight { eid, instance_id } => write!(
                f,
                "instance id {} already bound to a request for eid {}",
                instance_id, eid
            ),
            Error::NotFound { item } => write!(f, "item kind {:?} not found", item),
            Error::Io(kind) => write!(f, "socket: {}", kind),
            Error::PartialSend { len, sent } => {
                write!(f, "datagram of {} bytes only had {} bytes sent", len, sent)
            }
            Error::IntegerTypeConversion => {
                f.write_str("failed to convert between integer types")
            }
            Error::Config(e) => write!(f, "config: {}", e),
            Error::OutOfRange => f.write_str("value outside settable range"),
            Error::Internal => f.write_str("internal error"),
        }
    }
}

/// The kind of item being looked for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Item {
    /// A PDR record.
    Record,
    /// An entity association tree node.
    EntityNode,
    /// A state or numeric effecter.
    Effecter,
    /// A state sensor.
    Sensor,
    /// A remote terminus.
    Terminus,
    /// A FRU record set.
    FruRecordSet,
}

/// A peer response or request failed protocol-level validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The peer returned a non-success completion code.
    Completion(CompletionCode),
    /// A message is too short to hold a PLDM header.
    Truncated,
    /// A request carried a PLDM type this responder does not implement.
    UnknownType(u8),
    /// A request carried a command this responder does not implement for an
    /// otherwise known type.
    UnknownCommand {
        /// PLDM type octet.
        ty: u8,
        /// Command octet.
        command: u8,
    },
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::Completion(cc) => write!(f, "completion code {}", cc),
            ProtocolError::Truncated => f.write_str("message too short for PLDM header"),
            ProtocolError::UnknownType(ty) => write!(f, "unknown PLDM type {:#04x}", ty),
            ProtocolError::UnknownCommand { ty, command } => {
                write!(f, "unknown command {:#04x} for type {:#04x}", command, ty)
            }
        }
    }
}

/// PDR repository errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// A record body may not be empty.
    EmptyRecord,
    /// The requested record handle is already present.
    HandleInUse(u32),
    /// The record handle space is exhausted.
    HandleExhausted,
    /// A record is too short to hold the common PDR header.
    MalformedRecord,
}

impl core::fmt::Display for RepoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RepoError::EmptyRecord => f.write_str("record body may not be empty"),
            RepoError::HandleInUse(handle) => {
                write!(f, "record handle {:#010x} already in use", handle)
            }
            RepoError::HandleExhausted => f.write_str("record handle space exhausted"),
            RepoError::MalformedRecord => {
                f.write_str("record too short for the common PDR header")
            }
        }
    }
}

/// Entity association tree errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// An entity with the same type and instance already exists under the
    /// given parent.
    Duplicate,
    /// The container id space (u16, minus the reserved values) is exhausted.
    ContainerExhausted,
    /// The instance number space under a parent is exhausted.
    InstanceExhausted,
}

impl core::fmt::Display for TreeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TreeError::Duplicate => f.write_str("entity already present under parent"),
            TreeError::ContainerExhausted => f.write_str("container id space exhausted"),
            TreeError::InstanceExhausted => f.write_str("instance number space exhausted"),
        }
    }
}

/// Configuration load errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    Read(std::io::ErrorKind),
    /// The file is not valid JSON.
    Parse,
    /// A required key is absent.
    Missing(&'static str),
    /// The number of configured property values does not match the number of
    /// effecter states.
    StateCountMismatch {
        /// Object path of the offending entry.
        object_path: String,
    },
    /// The number of configured property mappings does not match the
    /// composite effecter count.
    CompositeCountMismatch {
        /// Composite count declared by the entry.
        declared: usize,
        /// Property mappings actually present.
        present: usize,
    },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::Read(kind) => write!(f, "read: {}", kind),
            ConfigError::Parse => f.write_str("invalid JSON"),
            ConfigError::Missing(key) => write!(f, "missing key `{}`", key),
            ConfigError::StateCountMismatch { object_path } => write!(
                f,
                "property values and state values differ in length for {}",
                object_path
            ),
            ConfigError::CompositeCountMismatch { declared, present } => write!(
                f,
                "entry declares {} composite effecters but maps {} properties",
                declared, present
            ),
        }
    }
}

impl From<pldm_wire::WireError> for Error {
    fn from(value: pldm_wire::WireError) -> Self {
        Self::Wire(value)
    }
}

impl From<ProtocolError> for Error {
    fn from(value: ProtocolError) -> Self {
        Self::Protocol(value)
    }
}

impl From<RepoError> for Error {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<TreeError> for Error {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.kind())
    }
}

impl From<TryFromIntError> for Error {
    fn from(_value: TryFromIntError) -> Self {
        Self::IntegerTypeConversion
    }
}
