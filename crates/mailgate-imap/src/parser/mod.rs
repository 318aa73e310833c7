//! Sans-I/O response parser.
//!
//! Input is one complete response as produced by the framed reader (line
//! plus any embedded literals). Nothing here touches the network.

mod fetch;
mod response;
mod value;

pub use fetch::{Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem, FetchResponse};
pub use response::{Response, ResponseCode, UntaggedResponse, parse_response};
pub use value::{Reader, Value};

pub(crate) use response::capabilities_in;
