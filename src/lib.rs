pub mod cancellation;
pub mod cdm;
pub mod client;
pub mod compliance;
pub mod compare;
pub mod config;
pub mod converter;
pub mod dtdl;
pub mod error;
pub mod idgen;
pub mod logging;
pub mod model;
pub mod rdf;
pub mod report;
pub mod serializer;
pub mod streaming;
pub mod turtle_export;
pub mod typemap;
pub mod validation;

pub use config::{CliArgs, Command, ConvertLikeArgs, FileConfig, SourceFormat};
pub use converter::{ConvertOptions, ConvertedOntology, convert, write_bundle_to_disk};
pub use error::{ConverterError, ErrorCode};
pub use logging::{LoggingConfig, init_logging};
