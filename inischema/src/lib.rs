pub mod document;
pub mod error;
pub mod index;
pub mod parse;
pub mod schema;
pub mod validation;
pub mod value;

pub use document::{IniFile, IniSect, IniValue, SectionBody};
pub use error::{Error, ErrorLog, Result};
pub use index::OrderedIndex;
pub use parse::{parse_file, parse_reader, parse_str, SinkAction, WarningSink};
pub use schema::{
    FileSchema, HookOutcome, OptionDecl, OptionSchema, SectionDecl, SectionFlags, SectionSchema,
};
pub use value::{types, OptionType, Parsed, Value};
