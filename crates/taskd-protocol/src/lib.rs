//! taskd Protocol - Wire protocol between agent and supervisor
//!
//! The protocol is plain UTF-8 text, one message per `\n`-terminated line.
//! Commands are `NAME` or `NAME:ARGUMENT`; replies are short `KEY:VALUE`
//! lines, except the process list which is a single-line JSON array.

pub mod codec;
pub mod command;
pub mod reply;
pub mod wire;

pub use codec::{CodecError, LineCodec, MAX_LINE_SIZE};
pub use command::{Command, CommandMessage};
pub use reply::Reply;
pub use wire::{decode_process_list, encode_process_list, WireProcess};
