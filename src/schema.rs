//! Schema root: metadata, the field arena and the root namespace.
//!
//! A schema is built in three steps. [`Schema::parse`] reads the metadata of the first
//! document, [`Schema::populate`] adds the content of every document, and once all of
//! them are in, [`Schema::link`] binds cross references and [`Schema::validate`] runs
//! the checks that need the complete tree.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::diag::Diagnostics;
use crate::document::Element;
use crate::error::SchemaError;
use crate::field::{Field, FieldArena, FieldId, FieldRef, ParseContext, ValidateContext};
use crate::literal::{is_valid_name, parse_bool, parse_unsigned};
use crate::message::Message;
use crate::namespace::{Namespace, SchemaScope};

pub(crate) const PROPS: &[&str] = &[
    "name",
    "id",
    "version",
    "endian",
    "description",
    "nonUniqueMsgIdAllowed",
    "dslVersion",
];

/// Byte order of multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("little") {
            Some(Endian::Little)
        } else if s.eq_ignore_ascii_case("big") {
            Some(Endian::Big)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub id: u32,
    pub version: u32,
    pub endian: Endian,
    pub description: String,
    pub non_unique_msg_id_allowed: bool,
    /// Declared platform names, in declaration order.
    pub platforms: Vec<String>,
    pub root: Namespace,
    pub fields: FieldArena,
    /// Merged elements of namespace-level fields, by external reference, for `reuse`.
    reusable: HashMap<String, Element>,
}

impl Schema {
    /// Read the metadata of a `<schema>` element. Content is added by [`Schema::populate`].
    pub(crate) fn parse(elem: &Element, diag: &mut Diagnostics) -> Result<Schema, SchemaError> {
        if elem.tag != "schema" {
            return Err(SchemaError::Document(format!(
                "root element must be <schema>, not <{}>",
                elem.tag
            )));
        }
        let props = elem.props(PROPS);
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        let unsigned = |key: &str| -> Result<u32, SchemaError> {
            match props.single(key)? {
                Some(s) => parse_unsigned(s).ok_or_else(|| SchemaError::unexpected(key, s)),
                None => Ok(0),
            }
        };
        let id = unsigned("id")?;
        let version = unsigned("version")?;
        let endian = match props.single("endian")? {
            Some(s) => Endian::parse(s).ok_or_else(|| SchemaError::unexpected("endian", s))?,
            None => Endian::default(),
        };
        let non_unique_msg_id_allowed = match props.single("nonUniqueMsgIdAllowed")? {
            Some(s) => parse_bool(s).ok_or_else(|| SchemaError::unexpected("nonUniqueMsgIdAllowed", s))?,
            None => false,
        };
        for key in props.unknown(PROPS) {
            diag.warning(elem.line, format!("<schema>: unknown property \"{}\"", key));
        }
        Ok(Schema {
            name: name.to_string(),
            id,
            version,
            endian,
            description: props.single("description")?.unwrap_or_default().to_string(),
            non_unique_msg_id_allowed,
            platforms: Vec::new(),
            root: Namespace::root(),
            fields: FieldArena::default(),
            reusable: HashMap::new(),
        })
    }

    /// Add the platforms and namespace content of one `<schema>` document.
    /// Returns `false` if any element failed; all of them are still visited.
    pub(crate) fn populate(&mut self, elem: &Element, diag: &mut Diagnostics) -> bool {
        match elem.props(PROPS).single("name") {
            Ok(Some(name)) if name == self.name => {}
            _ => {
                diag.error(
                    elem.line,
                    format!("all documents must describe the same schema \"{}\"", self.name),
                );
                return false;
            }
        }
        let mut ok = true;
        if let Err(e) = self.parse_platforms(elem) {
            diag.error(elem.line, e.to_string());
            ok = false;
        }
        let Schema {
            root,
            fields,
            reusable,
            version,
            endian,
            ..
        } = self;
        let mut ctx = ParseContext {
            diag,
            reusable,
            schema_version: *version,
            endian: *endian,
            namespace: String::new(),
        };
        root.populate(elem, PROPS, &mut ctx, fields) && ok
    }

    fn parse_platforms(&mut self, elem: &Element) -> Result<(), SchemaError> {
        for platform in elem.children_named("platforms").flat_map(|p| p.children_named("platform")) {
            let name = platform.props(&[]).required("name")?.to_string();
            if !is_valid_name(&name) {
                return Err(SchemaError::InvalidName(name));
            }
            if self.platforms.contains(&name) {
                return Err(SchemaError::DuplicateName { kind: "platform", name });
            }
            self.platforms.push(name);
        }
        Ok(())
    }

    /// Second pass: bind references, break cycles, apply post-resolution fix-ups and
    /// resolve symbolic message ids. Every failure is reported to `diag`.
    pub(crate) fn link(&mut self, diag: &mut Diagnostics) {
        self.resolve_references(diag);
        break_cycles(&mut self.fields, diag);

        let Schema { root, fields, .. } = self;
        fields.update_each(|field, arena| field.finalize(arena, diag));
        root.for_each_field_mut(&mut |field| field.finalize(fields, diag));

        self.resolve_message_ids(diag);
        if !self.has_interfaces() {
            tracing::debug!("no interface declared, adding the default one");
            self.root.add_default_interface();
        }
    }

    fn resolve_references(&mut self, diag: &mut Diagnostics) {
        let Schema { root, fields, .. } = self;
        let mut targets: BTreeMap<String, Option<FieldId>> = BTreeMap::new();
        let mut collect = |r: &FieldRef| {
            targets.entry(r.path().to_string()).or_insert(None);
        };
        fields.iter().for_each(|(_, f)| f.for_each_ref(&mut collect));
        root.for_each_ref(&mut collect);
        for (path, target) in targets.iter_mut() {
            *target = root.find_field_id(path);
        }

        let mut bind = |r: &mut FieldRef| {
            let target = targets.get(r.path()).copied().flatten();
            r.bind(target);
            if target.is_none() {
                diag.error(r.line(), SchemaError::UnresolvedReference(r.path().to_string()).to_string());
            }
        };
        fields.iter_mut().for_each(|f| f.for_each_ref_mut(&mut bind));
        root.for_each_ref_mut(&mut bind);
    }

    fn resolve_message_ids(&mut self, diag: &mut Diagnostics) {
        let root = &self.root;
        let arena = &self.fields;
        let mut ids: Vec<Option<i128>> = Vec::new();
        root.for_each_message(&mut |m| {
            ids.push(m.id.or_else(|| resolve_enum_value(root, arena, m.namespace(), &m.id_spec)));
        });

        let mut ids = ids.into_iter();
        self.root.for_each_message_mut(&mut |m| {
            let Some(id) = ids.next() else {
                return;
            };
            m.id = id;
            if id.is_none() {
                let err = SchemaError::UnknownMessageId {
                    message: m.name.clone(),
                    id: m.id_spec.clone(),
                };
                diag.error(m.line, err.to_string());
            }
        });
    }

    fn has_interfaces(&self) -> bool {
        let mut found = false;
        self.root.for_each_interface(&mut |_| found = true);
        found
    }

    /// Whether some interface carries a `Version` semantic field.
    pub fn has_version_field(&self) -> bool {
        let mut found = false;
        self.root
            .for_each_interface(&mut |i| found |= i.version_field().is_some());
        found
    }

    /// Checks that need the linked tree. Returns `false` if any error was reported.
    pub(crate) fn validate(&self, diag: &mut Diagnostics, version_dependent_code: bool) -> bool {
        let mut interface_fields = BTreeSet::new();
        self.root.for_each_interface(&mut |i| {
            interface_fields.extend(i.fields.iter().map(Field::name));
        });
        let scope = SchemaScope {
            root: &self.root,
            platforms: &self.platforms,
            interface_fields,
        };
        let mut cx = ValidateContext {
            arena: &self.fields,
            diag,
            version_dependent_code,
        };
        let tree_ok = self.root.validate(&scope, &mut cx);
        let ids_ok = self.check_message_ids(cx.diag);
        tree_ok && ids_ok
    }

    fn check_message_ids(&self, diag: &mut Diagnostics) -> bool {
        if self.non_unique_msg_id_allowed {
            return true;
        }
        let mut ok = true;
        let mut seen: BTreeMap<i128, &Message> = BTreeMap::new();
        self.root.for_each_message(&mut |m| {
            let Some(id) = m.id else {
                return;
            };
            if let Some(existing) = seen.get(&id) {
                let err = SchemaError::DuplicateMessageId {
                    message: m.external_ref.clone(),
                    id,
                    existing: existing.external_ref.clone(),
                };
                diag.error(m.line, err.to_string());
                ok = false;
            } else {
                seen.insert(id, m);
            }
        });
        ok
    }
}

/// `Enum.Value` or `ns.Enum.Value`, looked up relative to `namespace` first.
fn resolve_enum_value(root: &Namespace, arena: &FieldArena, namespace: &str, spec: &str) -> Option<i128> {
    let (enum_path, value) = spec.rsplit_once('.')?;
    let relative = (!namespace.is_empty()).then(|| format!("{}.{}", namespace, enum_path));
    relative
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(enum_path))
        .find_map(|path| {
            let id = root.find_field_id(path)?;
            let field = arena.get(id).resolved(arena)?;
            field.as_enum()?.value(value).map(|v| v.value)
        })
}

/// Report every cycle through references among namespace fields and unbind the edge
/// that closes it, so length queries over the arena terminate.
fn break_cycles(arena: &mut FieldArena, diag: &mut Diagnostics) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let edges: Vec<Vec<FieldId>> = arena
        .iter()
        .map(|(_, field)| {
            let mut targets = Vec::new();
            field.for_each_ref(&mut |r| targets.extend(r.target()));
            targets
        })
        .collect();
    let mut marks = vec![Mark::New; edges.len()];
    let mut back_edges = Vec::new();
    for start in 0..edges.len() {
        if marks[start] != Mark::New {
            continue;
        }
        marks[start] = Mark::Active;
        let mut stack = vec![(start, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            match edges[node].get(next) {
                Some(&target) => {
                    top.1 += 1;
                    match marks[target.0] {
                        Mark::New => {
                            marks[target.0] = Mark::Active;
                            stack.push((target.0, 0));
                        }
                        Mark::Active => back_edges.push((FieldId(node), target)),
                        Mark::Done => {}
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }

    for (from, to) in back_edges {
        let Some(field) = arena.get_mut(from) else {
            continue;
        };
        let name = if field.external_ref().is_empty() {
            field.name().to_string()
        } else {
            field.external_ref().to_string()
        };
        diag.error(field.core.line, SchemaError::ReferenceCycle(name).to_string());
        field.for_each_ref_mut(&mut |r| {
            if r.target() == Some(to) {
                r.bind(None);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn load(text: &str) -> (Option<Schema>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let root = parse_document(text).expect("well-formed");
        let schema = Schema::parse(&root, &mut diag).ok().map(|mut schema| {
            schema.populate(&root, &mut diag);
            schema.link(&mut diag);
            schema
        });
        (schema, diag)
    }

    #[test]
    fn metadata_defaults() {
        let (schema, diag) = load(r#"<schema name="P"/>"#);
        let schema = schema.expect("schema");
        assert_eq!((schema.id, schema.version, schema.endian), (0, 0, Endian::Little));
        assert!(!diag.has_errors());
        assert!(schema.root.find_interface("").is_some());
    }

    #[test]
    fn root_must_be_schema() {
        let root = parse_document("<ns name=\"x\"/>").expect("well-formed");
        assert!(matches!(
            Schema::parse(&root, &mut Diagnostics::new()),
            Err(SchemaError::Document(_))
        ));
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let (_, diag) = load(r#"<schema name="P" version="1"><ref name="R" field="Missing"/></schema>"#);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.messages()[0].message.contains("\"Missing\""));
    }

    #[test]
    fn cycle_is_reported_and_broken() {
        let (schema, diag) = load(
            r#"<schema name="P">
                 <bundle name="A"><ref name="b" field="B"/></bundle>
                 <bundle name="B"><ref name="a" field="A"/></bundle>
               </schema>"#,
        );
        assert_eq!(diag.error_count(), 1);
        let schema = schema.expect("schema");
        let a = schema.root.find_field_id("A").expect("A");
        // lengths terminate once the back edge is gone
        assert_eq!(schema.fields.get(a).min_length(&schema.fields), 0);
    }

    #[test]
    fn symbolic_message_id() {
        let (schema, diag) = load(
            r#"<schema name="P">
                 <ns name="ns">
                   <enum name="MsgId" type="uint8" semanticType="messageId">
                     <validValue name="Ping" val="5"/>
                   </enum>
                   <message name="Ping" id="MsgId.Ping"/>
                   <message name="Pong" id="ns.MsgId.Pong"/>
                 </ns>
               </schema>"#,
        );
        assert_eq!(diag.error_count(), 1);
        let schema = schema.expect("schema");
        assert_eq!(schema.root.find_message("ns.Ping").and_then(|m| m.id), Some(5));
    }
}
