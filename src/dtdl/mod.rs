//! DTDL ingestion (§4.F): JSON(-LD) loading and interface extraction.

mod extractor;
mod parser;

pub use extractor::{ComponentMode, CommandMode, DtdlExtractOptions, extract};
pub use parser::{DtdlDocument, load_documents, validate_dtmi};
