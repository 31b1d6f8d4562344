extern crate byteorder;
extern crate core;
#[macro_use]
extern crate log;
extern crate rand;
extern crate smoltcp;

use core::fmt;
use std::error::Error as StdError;

mod field {
    use core::ops;
    pub type Field = ops::Range<usize>;
    pub type Rest = ops::RangeFrom<usize>;
}

/// The error type for the OpenFlow codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An operation cannot proceed because a buffer is empty or full.
    Exhausted,
    /// An incoming packet could not be parsed because some of its fields were out of bounds
    /// of the received data.
    Truncated,
    /// An incoming packet could not be recognized and was dropped.
    /// E.g. an OpenFlow message with an unknown type code.
    Unrecognized,
    /// An incoming packet was recognized but was self-contradictory, e.g. a flow mod whose
    /// action list length disagrees with the message length.
    Malformed,
    /// An OXM field could not be parsed because the "class" field in the header is invalid
    BadOxmClass,
    /// An OXM field could not be parsed because the "class" field in the header is not supported.
    /// This library does not support the legacy Nicira eXtensible Match.
    UnsupportedOxmClass,
    /// An OXM field could not be parsed because the "field" field in the header is invalid
    BadOxmField,
    /// The match type field in a flow match header is invalid
    BadMatchType,
    #[doc(hidden)] __Nonexhaustive,
}

/// The result type for the OpenFlow codecs.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl StdError for Error {
    fn description(&self) -> &str {
        match *self {
            Error::Exhausted => "buffer space exhausted",
            Error::Truncated => "truncated packet",
            Error::Unrecognized => "unrecognized packet",
            Error::Malformed => "malformed packet",
            Error::BadOxmClass => "unknown oxm class",
            Error::UnsupportedOxmClass => "unsupported oxm class",
            Error::BadOxmField => "unknown oxm field",
            Error::BadMatchType => "unknown match type",
            Error::__Nonexhaustive => unreachable!(),
        }
    }

    fn cause(&self) -> Option<&StdError> {
        None
    }
}

pub trait Repr
where
    Self: Sized,
{
    /// Parse a packet and return a high-level representation.
    fn parse(buffer: &[u8]) -> Result<Self>;

    /// Return the length of a packet that will be emitted from this high-level representation.
    fn buffer_len(&self) -> usize;

    /// Emit a high-level representation into a buffer
    fn emit(&self, buffer: &mut [u8]) -> Result<()>;
}

#[macro_use]
mod macros;
mod port;
pub mod oxm;
mod packets;
pub mod flow_match;
pub mod headers;
pub mod sim;
pub mod link;
pub mod connection;
pub mod flow;
pub mod flow_table;
pub mod flow13;
pub mod flow_table13;
pub mod group13;
pub mod switch;
pub mod switch13;
pub mod controller;

pub use port::{PortNumber, PortNumber13, OFP_CONTROLLER_PORT};
pub use packets::openflow::{Packet, PacketRepr, PayloadRepr};
pub use packets::*;
