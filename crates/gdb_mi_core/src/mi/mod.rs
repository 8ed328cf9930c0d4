//! GDB/MI output grammar: line classification and payload decoding.

pub mod parser;
pub mod record;
pub mod value;

pub use parser::MiParseError;
pub use record::{
    parse_line, AsyncKind, AsyncRecord, Record, ResultClass, ResultRecord, StreamKind,
    StreamRecord,
};
pub use value::MiValue;
