//! Binary persistence of coverage data
//!
//! ```text
//! magic "CNTR" | version | dictionary | classes
//!                            │             └─ class ref, methods ─ signature, lines ─ hits, branches
//!                            └─ every string once, referenced by index
//! ```
//!
//! All integers are LEB128 varints. Branch detail is only stored for lines
//! that were hit; a line without hits decodes with all branch counters zero.

mod dictionary;
mod reader;
mod varint;
mod writer;

pub use dictionary::{Dictionary, DictionaryTable};
pub use reader::{decode, load, read_project, LoadReport};
pub use varint::{unzigzag, zigzag, Decoder, Encoder};
pub use writer::{encode, save, write_project};

use crate::class::descriptor::TOKENIZED_METHOD_ID_VERSION;

/// File signature
pub const MAGIC: &[u8; 4] = b"CNTR";

/// Oldest protocol version that can be read and written
pub const MIN_PROTOCOL_VERSION: u32 = 3;

/// Protocol version written by default
pub const CURRENT_PROTOCOL_VERSION: u32 = TOKENIZED_METHOD_ID_VERSION;

fn check_version(version: u32) -> crate::result::ContarResult<()> {
    if (MIN_PROTOCOL_VERSION..=CURRENT_PROTOCOL_VERSION).contains(&version) {
        Ok(())
    } else {
        Err(crate::result::ContarError::UnsupportedVersion { version })
    }
}
