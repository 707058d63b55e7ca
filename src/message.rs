//! Messages: an id, a version window and the ordered payload fields.

use crate::document::Element;
use crate::error::SchemaError;
use crate::field::{parse_fields, sum_saturating, Field, FieldArena, ParseContext, Scope, ValidateContext};
use crate::literal::{is_valid_name, is_valid_ref, parse_int};
use crate::namespace::{validate_owned_fields, SchemaScope};
use crate::version::VersionWindow;

const PROPS: &[&str] = &[
    "name",
    "id",
    "displayName",
    "description",
    "sinceVersion",
    "deprecated",
    "platforms",
    "interface",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub external_ref: String,
    /// The `id` property as written: a number or an `Enum.Value` path.
    pub id_spec: String,
    /// Numeric id; symbolic ids are filled in once references are resolved.
    pub id: Option<i128>,
    pub window: VersionWindow,
    pub fields: Vec<Field>,
    /// Platforms the message is restricted to; empty means all.
    pub platforms: Vec<String>,
    pub interface: Option<String>,
    pub line: usize,
}

impl Message {
    pub(crate) fn parse(elem: &Element, ctx: &mut ParseContext<'_>) -> Result<Self, SchemaError> {
        let props = elem.props(PROPS);
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        let id_spec = props.required("id")?;
        let id = parse_int(id_spec);
        if id.is_none() && !is_valid_ref(id_spec) {
            return Err(SchemaError::unexpected("id", id_spec));
        }
        let window = VersionWindow::parse(name, &props, VersionWindow::default(), ctx.schema_version)?;
        let platforms = props
            .single("platforms")?
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let interface = props.single("interface")?.map(str::to_string);
        if let Some(path) = &interface {
            if !is_valid_ref(path) {
                return Err(SchemaError::unexpected("interface", path));
            }
        }
        for key in props.unknown(PROPS) {
            ctx.diag
                .warning(elem.line, format!("<message>: unknown property \"{}\"", key));
        }
        let fields = parse_fields(elem, "fields", name, ctx, Scope::member(window))?;
        Ok(Message {
            name: name.to_string(),
            display_name: props.single("displayName")?.unwrap_or_default().to_string(),
            description: props.single("description")?.unwrap_or_default().to_string(),
            external_ref: ctx.external_ref(name),
            id_spec: id_spec.to_string(),
            id,
            window,
            fields,
            platforms,
            interface,
            line: elem.line,
        })
    }

    /// External reference of the declaring namespace.
    pub fn namespace(&self) -> &str {
        self.external_ref
            .rsplit_once('.')
            .map_or("", |(ns, _)| ns)
    }

    pub fn does_exist(&self, version: u32) -> bool {
        self.window.does_exist(version)
    }

    pub fn is_version_dependent(&self) -> bool {
        self.fields.iter().any(Field::is_version_dependent)
    }

    pub fn min_length(&self, arena: &FieldArena) -> usize {
        sum_saturating(self.fields.iter().map(|f| f.min_length(arena)))
    }

    pub fn max_length(&self, arena: &FieldArena) -> usize {
        sum_saturating(self.fields.iter().map(|f| f.max_length(arena)))
    }

    pub(crate) fn validate(&self, scope: &SchemaScope<'_>, cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
        if let Some(platform) = self.platforms.iter().find(|p| !scope.platforms.contains(p)) {
            return Err(SchemaError::UndeclaredPlatform {
                message: self.external_ref.clone(),
                platform: platform.clone(),
            });
        }
        if let Some(path) = &self.interface {
            if scope.root.find_interface(path).is_none() {
                return Err(SchemaError::invalid(
                    &self.external_ref,
                    format!("cannot find interface \"{}\"", path),
                ));
            }
        }
        validate_owned_fields(&self.external_ref, &self.fields, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::schema::Endian;
    use std::collections::HashMap;

    fn parse(elem: &Element) -> Result<Message, SchemaError> {
        let mut diag = Diagnostics::new();
        let mut reusable = HashMap::new();
        let mut ctx = ParseContext {
            diag: &mut diag,
            reusable: &mut reusable,
            schema_version: 4,
            endian: Endian::Little,
            namespace: "proto".to_string(),
        };
        Message::parse(elem, &mut ctx)
    }

    fn message(id: &str) -> Element {
        Element::new("message").with_attr("name", "Msg").with_attr("id", id)
    }

    #[test]
    fn numeric_and_symbolic_ids() {
        let m = parse(&message("0x10")).expect("message");
        assert_eq!(m.id, Some(16));
        assert_eq!(m.namespace(), "proto");
        let m = parse(&message("MsgId.Msg")).expect("message");
        assert_eq!((m.id, m.id_spec.as_str()), (None, "MsgId.Msg"));
        assert!(parse(&message("not an id")).is_err());
    }

    #[test]
    fn fields_inherit_the_window() {
        let elem = message("1")
            .with_attr("sinceVersion", "2")
            .with_child(Element::new("int").with_attr("name", "a").with_attr("type", "uint16"))
            .with_child(Element::new("int").with_attr("name", "b").with_attr("type", "uint8").with_attr("sinceVersion", "3"));
        let m = parse(&elem).expect("message");
        assert_eq!(m.fields[0].window().since, 2);
        assert!(m.is_version_dependent());
        assert!(!m.does_exist(1));
        let arena = FieldArena::default();
        assert_eq!((m.min_length(&arena), m.max_length(&arena)), (3, 3));
    }

    #[test]
    fn field_older_than_message_is_rejected() {
        let elem = message("1")
            .with_attr("sinceVersion", "2")
            .with_child(Element::new("int").with_attr("name", "a").with_attr("type", "uint8").with_attr("sinceVersion", "1"));
        assert!(matches!(parse(&elem), Err(SchemaError::InvalidMembers(_))));
    }

    #[test]
    fn platform_list() {
        let m = parse(&message("1").with_attr("platforms", "arm, x86")).expect("message");
        assert_eq!(m.platforms, ["arm", "x86"]);
    }
}
