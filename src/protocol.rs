//! Facade: document ingestion, the validation pass and the query API.

use std::path::Path;

use crate::access::AccessedFields;
use crate::diag::{Diagnostics, ReportFn};
use crate::document::Element;
use crate::error::SchemaError;
use crate::field::{Field, FieldId};
use crate::interface::Interface;
use crate::layer::Frame;
use crate::message::Message;
use crate::parser::parse_document;
use crate::schema::Schema;
use crate::version::VersionGate;

/// Caller-supplied knobs, applied on top of the documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Effective protocol version; must not exceed the schema version.
    pub forced_version: Option<u32>,
    /// Oldest remote version that must still be supported.
    pub min_remote_version: u32,
    /// Whether generated code may depend on the remote version. Defaults to whether
    /// some interface carries a version field.
    pub version_dependent_code: Option<bool>,
    pub warn_as_error: bool,
}

impl ProtocolConfig {
    pub fn forced_version(mut self, version: u32) -> Self {
        self.forced_version = Some(version);
        self
    }

    pub fn min_remote_version(mut self, version: u32) -> Self {
        self.min_remote_version = version;
        self
    }

    pub fn version_dependent_code(mut self, enabled: bool) -> Self {
        self.version_dependent_code = Some(enabled);
        self
    }

    pub fn warn_as_error(mut self, enabled: bool) -> Self {
        self.warn_as_error = enabled;
        self
    }
}

/// Entry point: feed documents with `parse*`, run [`Protocol::validate`], then query.
///
/// The accessed-field set used by emitters is owned by the caller; create an
/// [`AccessedFields`] and drive it with [`Protocol::access_field`] and
/// [`Protocol::emit_accessed`].
#[derive(Debug, Default)]
pub struct Protocol {
    config: ProtocolConfig,
    diag: Diagnostics,
    schema: Option<Schema>,
    /// Result of the validation pass, once it ran.
    validated: Option<bool>,
}

impl Protocol {
    pub fn new() -> Self {
        Protocol::default()
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        let mut diag = Diagnostics::new();
        diag.set_warn_as_error(config.warn_as_error);
        Protocol {
            config,
            diag,
            schema: None,
            validated: None,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Receive every diagnostic as `(severity, "source:line: message")`.
    pub fn set_error_report_callback(&mut self, callback: ReportFn) {
        self.diag.set_sink(callback);
    }

    pub fn parse(&mut self, text: &str) -> bool {
        self.parse_named("<input>", text)
    }

    /// Parse one document; `name` prefixes its diagnostics.
    pub fn parse_named(&mut self, name: &str, text: &str) -> bool {
        self.diag.set_source(name);
        match parse_document(text) {
            Ok(root) => self.parse_element(&root),
            Err(e) => {
                self.diag.error(0, SchemaError::Document(e).to_string());
                false
            }
        }
    }

    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => self.parse_named(&path.display().to_string(), &text),
            Err(e) => {
                self.diag.set_source(path.display().to_string());
                self.diag.error(0, SchemaError::Io(e).to_string());
                false
            }
        }
    }

    /// Add an already parsed `<schema>` document.
    pub fn parse_element(&mut self, root: &Element) -> bool {
        if self.validated.is_some() {
            self.diag.error(root.line, "cannot add documents after validation");
            return false;
        }
        if self.schema.is_none() {
            match Schema::parse(root, &mut self.diag) {
                Ok(schema) => {
                    tracing::info!(schema = %schema.name, version = schema.version, "schema found");
                    self.schema = Some(schema);
                }
                Err(e) => {
                    self.diag.error(root.line, e.to_string());
                    return false;
                }
            }
        }
        let Some(schema) = self.schema.as_mut() else {
            return false;
        };
        let errors_before = self.diag.error_count();
        schema.populate(root, &mut self.diag) && self.diag.error_count() == errors_before
    }

    /// Link the documents and check the complete model. Runs once; later calls return
    /// the first result.
    pub fn validate(&mut self) -> bool {
        if let Some(result) = self.validated {
            return result;
        }
        let result = self.run_validation();
        self.validated = Some(result);
        tracing::info!(
            valid = result,
            errors = self.diag.error_count(),
            warnings = self.diag.warning_count(),
            "validation finished"
        );
        result
    }

    fn run_validation(&mut self) -> bool {
        let Some(schema) = self.schema.as_mut() else {
            self.diag.error(0, "no schema has been parsed");
            return false;
        };
        if let Some(forced) = self.config.forced_version {
            if schema.version < forced {
                self.diag.error(
                    0,
                    format!(
                        "forced version ({}) is greater than the schema version ({})",
                        forced, schema.version
                    ),
                );
                return false;
            }
        }
        schema.link(&mut self.diag);
        let version_dependent_code = self
            .config
            .version_dependent_code
            .unwrap_or_else(|| schema.has_version_field());
        schema.validate(&mut self.diag, version_dependent_code) && !self.diag.has_errors()
    }

    pub fn is_validated(&self) -> bool {
        self.validated == Some(true)
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    pub fn version_gate(&self) -> VersionGate {
        let schema_version = self.schema.as_ref().map_or(0, |s| s.version);
        VersionGate {
            version: self.config.forced_version.unwrap_or(schema_version),
            min_remote_version: self.config.min_remote_version,
        }
    }

    pub fn version_dependent_code(&self) -> bool {
        self.config
            .version_dependent_code
            .unwrap_or_else(|| self.schema.as_ref().is_some_and(Schema::has_version_field))
    }

    pub fn find_field_id(&self, path: &str) -> Option<FieldId> {
        self.schema.as_ref()?.root.find_field_id(path)
    }

    pub fn find_field(&self, path: &str) -> Option<&Field> {
        self.field(self.find_field_id(path)?)
    }

    /// Look a field up and record it in `accessed`.
    pub fn access_field(&self, accessed: &mut AccessedFields, path: &str) -> Option<&Field> {
        let schema = self.schema.as_ref()?;
        let id = accessed.find_field(schema, path)?;
        schema.fields.try_get(id)
    }

    /// Emit every recorded field and whatever it references, until nothing new is
    /// recorded. Returns the number of passes.
    pub fn emit_accessed(&self, accessed: &mut AccessedFields, emit: impl FnMut(FieldId, &Field)) -> usize {
        match self.schema.as_ref() {
            Some(schema) => accessed.run_to_fixed_point(&schema.fields, emit),
            None => 0,
        }
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.schema.as_ref()?.fields.try_get(id)
    }

    pub fn find_interface(&self, path: &str) -> Option<&Interface> {
        self.schema.as_ref()?.root.find_interface(path)
    }

    pub fn find_frame(&self, path: &str) -> Option<&Frame> {
        self.schema.as_ref()?.root.find_frame(path)
    }

    pub fn find_message(&self, path: &str) -> Option<&Message> {
        self.schema.as_ref()?.root.find_message(path)
    }

    pub fn find_message_id_field(&self) -> Option<&Field> {
        let schema = self.schema.as_ref()?;
        let id = schema.root.find_message_id_field(&schema.fields)?;
        schema.fields.try_get(id)
    }

    /// Messages of every namespace admitted by the version gate, ordered by id.
    /// Messages with the same id keep their namespace order.
    pub fn all_messages(&self) -> Vec<&Message> {
        let Some(schema) = self.schema.as_ref() else {
            return Vec::new();
        };
        let gate = self.version_gate();
        let mut messages = Vec::new();
        schema.root.for_each_message(&mut |m| {
            if gate.admits(&m.window) {
                messages.push(m);
            }
        });
        messages.sort_by_key(|m| (m.id.is_none(), m.id));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Severity;
    use std::cell::RefCell;
    use std::rc::Rc;

    const SCHEMA: &str = r#"
        <schema name="Demo" version="3" endian="big">
          <ns name="ns">
            <int name="len" type="uint8"/>
            <message name="B" id="2"/>
            <message name="A" id="1"/>
            <message name="Old" id="3" sinceVersion="1" deprecated="2"/>
          </ns>
        </schema>"#;

    #[test]
    fn parse_validate_and_query() {
        let mut protocol = Protocol::new();
        assert!(protocol.parse(SCHEMA));
        assert!(protocol.validate());
        assert!(protocol.is_validated());
        assert_eq!(protocol.find_field("ns.len").map(Field::kind_name), Some("int"));
        let ids: Vec<Option<i128>> = protocol.all_messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, [Some(1), Some(2), Some(3)]);
        assert!(protocol.find_interface("").is_some());
    }

    #[test]
    fn min_remote_version_drops_deprecated_messages() {
        let mut protocol = Protocol::with_config(ProtocolConfig::default().min_remote_version(2));
        assert!(protocol.parse(SCHEMA));
        assert!(protocol.validate());
        let names: Vec<&str> = protocol.all_messages().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn forced_version_above_schema_fails() {
        let mut protocol = Protocol::with_config(ProtocolConfig::default().forced_version(4));
        assert!(protocol.parse(SCHEMA));
        assert!(!protocol.validate());
        assert!(!protocol.validate());
    }

    #[test]
    fn callback_receives_every_report() {
        let seen: Rc<RefCell<Vec<Severity>>> = Rc::default();
        let captured = Rc::clone(&seen);
        let mut protocol = Protocol::new();
        protocol.set_error_report_callback(Box::new(move |level, _| captured.borrow_mut().push(level)));
        assert!(!protocol.parse("<schema name=\"x\"><int name=\"i\"/></schema>"));
        assert_eq!(seen.borrow().as_slice(), [Severity::Error]);
    }

    #[test]
    fn documents_must_share_the_schema_name() {
        let mut protocol = Protocol::new();
        assert!(protocol.parse(r#"<schema name="A"/>"#));
        assert!(!protocol.parse(r#"<schema name="B"/>"#));
    }

    #[test]
    fn earlier_failure_does_not_fail_later_documents() {
        let mut protocol = Protocol::new();
        assert!(!protocol.parse(r#"<schema name="A"><int name="i"/></schema>"#));
        assert!(protocol.parse(r#"<schema name="A"><int name="j" type="uint8"/></schema>"#));
        assert!(!protocol.validate());
    }

    #[test]
    fn accessed_fields_through_the_facade() {
        let mut protocol = Protocol::new();
        assert!(protocol.parse(
            r#"<schema name="A">
                 <ref name="R" field="Len"/>
                 <int name="Len" type="uint16"/>
               </schema>"#
        ));
        assert!(protocol.validate());
        let mut accessed = AccessedFields::new();
        assert_eq!(protocol.access_field(&mut accessed, "R").map(Field::kind_name), Some("ref"));
        assert!(protocol.access_field(&mut accessed, "Missing").is_none());
        let mut names = Vec::new();
        let passes = protocol.emit_accessed(&mut accessed, |_, f| names.push(f.name().to_string()));
        assert_eq!(passes, 2);
        assert_eq!(names, ["R", "Len"]);
    }

    #[test]
    fn malformed_markup_is_a_diagnostic() {
        let mut protocol = Protocol::new();
        assert!(!protocol.parse("<schema name=\"x\">"));
        assert_eq!(protocol.diagnostics().error_count(), 1);
        assert!(!protocol.validate());
    }
}
