//! Interfaces: transport fields shared by every message of a namespace.

use crate::document::Element;
use crate::error::SchemaError;
use crate::field::{parse_fields, Field, ParseContext, Scope, SemanticType, ValidateContext};
use crate::literal::is_valid_name;
use crate::namespace::validate_owned_fields;
use crate::version::VersionWindow;

const PROPS: &[&str] = &["name", "description"];

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    /// Empty for the default interface of a namespace.
    pub name: String,
    pub external_ref: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub line: usize,
}

impl Interface {
    pub(crate) fn parse(elem: &Element, ctx: &mut ParseContext<'_>) -> Result<Self, SchemaError> {
        let props = elem.props(PROPS);
        let name = props.single("name")?.unwrap_or_default();
        if !name.is_empty() && !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        for key in props.unknown(PROPS) {
            ctx.diag
                .warning(elem.line, format!("<interface>: unknown property \"{}\"", key));
        }
        let owner = if name.is_empty() { "interface" } else { name };
        let fields = parse_fields(elem, "fields", owner, ctx, Scope::member(VersionWindow::default()))?;
        let external_ref = if name.is_empty() {
            ctx.namespace.clone()
        } else {
            ctx.external_ref(name)
        };
        Ok(Interface {
            name: name.to_string(),
            external_ref,
            description: props.single("description")?.unwrap_or_default().to_string(),
            fields,
            line: elem.line,
        })
    }

    /// Default interface of a namespace that declares none.
    pub(crate) fn synthesized(namespace: &str) -> Self {
        Interface {
            name: String::new(),
            external_ref: namespace.to_string(),
            description: String::new(),
            fields: Vec::new(),
            line: 0,
        }
    }

    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// The field carrying the protocol version of the remote end, if any.
    pub fn version_field(&self) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.semantic_type() == SemanticType::Version)
    }

    pub(crate) fn validate(&self, cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
        let versions = self
            .fields
            .iter()
            .filter(|f| f.semantic_type() == SemanticType::Version)
            .count();
        if versions > 1 {
            return Err(SchemaError::invalid(
                &self.external_ref,
                "only one field may have the \"version\" semantic type",
            ));
        }
        validate_owned_fields(&self.external_ref, &self.fields, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::field::FieldArena;
    use crate::schema::Endian;
    use std::collections::HashMap;

    fn parse(elem: &Element) -> Result<Interface, SchemaError> {
        let mut diag = Diagnostics::new();
        let mut reusable = HashMap::new();
        let mut ctx = ParseContext {
            diag: &mut diag,
            reusable: &mut reusable,
            schema_version: 1,
            endian: Endian::Little,
            namespace: "ns".to_string(),
        };
        Interface::parse(elem, &mut ctx)
    }

    fn version(name: &str) -> Element {
        Element::new("int")
            .with_attr("name", name)
            .with_attr("type", "uint8")
            .with_attr("semanticType", "version")
    }

    #[test]
    fn version_field_is_found() {
        let i = parse(&Element::new("interface").with_attr("name", "Common").with_child(version("ver")))
            .expect("interface");
        assert_eq!(i.external_ref, "ns.Common");
        assert_eq!(i.version_field().map(Field::name), Some("ver"));
        assert!(!i.is_default());
    }

    #[test]
    fn at_most_one_version_field() {
        let i = parse(
            &Element::new("interface")
                .with_child(version("v1"))
                .with_child(version("v2")),
        )
        .expect("interface");
        assert!(i.is_default());
        let arena = FieldArena::default();
        let mut diag = Diagnostics::new();
        let mut cx = ValidateContext {
            arena: &arena,
            diag: &mut diag,
            version_dependent_code: true,
        };
        assert!(matches!(i.validate(&mut cx), Err(SchemaError::Invalid { .. })));
    }
}
