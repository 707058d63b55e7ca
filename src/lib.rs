//! # wiredsl — schema compiler front end for a binary wire-protocol DSL
//!
//! Reads protocol definitions written as XML schema documents and builds a validated,
//! fully cross-referenced in-memory model for a code generator to consume.
//!
//! ## Model
//!
//! - **Fields**: `int`, `float`, `enum`, `set`, `bitfield`, `bundle`, `string`, `data`,
//!   `list`, `ref`, `optional`, `variant`, each with its own validation rules
//! - **Namespaces**: nested containers of fields, interfaces, messages and frames,
//!   addressed by dotted external references such as `ns.sub.Field`
//! - **Messages** and **interfaces**: ordered field lists; messages carry a numeric or
//!   enumerated id
//! - **Frames**: ordered transport layers (`sync`, `size`, `id`, `value`, `checksum`,
//!   `payload`) wrapping the message payload
//! - **Versions**: every element exists in a `[sinceVersion, deprecated)` window
//!
//! ## Example schema
//!
//! ```text
//! <schema name="Demo" endian="big">
//!   <ns name="ns">
//!     <int name="len" type="uint8"/>
//!     <data name="payload" lengthPrefix="$len"/>
//!     <frame name="Frame">
//!       <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0xabcd"/></sync>
//!       <size name="Size" field="ns.len"/>
//!       <payload name="Data"/>
//!     </frame>
//!   </ns>
//! </schema>
//! ```
//!
//! ## Usage
//!
//! ```
//! use wiredsl::Protocol;
//!
//! let mut protocol = Protocol::new();
//! assert!(protocol.parse(r#"<schema name="Demo"><int name="len" type="uint8"/></schema>"#));
//! assert!(protocol.validate());
//! assert_eq!(protocol.find_field("len").map(|f| f.kind_name()), Some("int"));
//! ```
//!
//! Findings are collected in [`Diagnostics`]; parsing and validation keep going after
//! an error so one run reports everything.

pub mod access;
pub mod alias;
pub mod diag;
pub mod document;
pub mod error;
pub mod field;
pub mod interface;
pub mod layer;
pub mod literal;
pub mod message;
pub mod namespace;
pub mod parser;
pub mod protocol;
pub mod schema;
pub mod version;

pub use access::AccessedFields;
pub use alias::Alias;
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use document::{Element, Props};
pub use error::SchemaError;
pub use field::{Field, FieldArena, FieldCore, FieldId, FieldKind, FieldRef, SemanticType};
pub use interface::Interface;
pub use layer::{ChecksumAlg, ChecksumRange, Frame, Layer, LayerField, LayerKind};
pub use message::Message;
pub use namespace::Namespace;
pub use parser::parse_document;
pub use protocol::{Protocol, ProtocolConfig};
pub use schema::{Endian, Schema};
pub use version::{VersionGate, VersionWindow, NOT_YET_DEPRECATED};
