//! Aliases: alternative names for (possibly nested) members of bundles and variants.

use crate::document::Element;
use crate::error::SchemaError;
use crate::field::{Field, FieldArena, FieldCore, FieldKind};
use crate::literal::{is_valid_name, is_valid_ref, split_first_segment};

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    /// Dotted member path, e.g. `header.flags`.
    pub field_path: String,
    pub description: String,
    pub line: usize,
}

/// Read the `<alias name field/>` children of a composite. Paths are only checked
/// syntactically here; whether they lead to a member is decided after references are
/// resolved (see [`resolve_alias_path`]).
pub(crate) fn parse_aliases(elem: &Element, core: &FieldCore, members: &[Field]) -> Result<Vec<Alias>, SchemaError> {
    let mut aliases: Vec<Alias> = Vec::new();
    for child in elem.children_named("alias") {
        let props = child.props(&["description"]);
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        if aliases.iter().any(|a| a.name == name) {
            return Err(SchemaError::DuplicateName {
                kind: "alias",
                name: name.to_string(),
            });
        }
        if members.iter().any(|m| m.core.name == name) {
            return Err(SchemaError::invalid(
                &core.name,
                format!("alias \"{}\" clashes with a member of the same name", name),
            ));
        }
        let raw = props.required("field")?;
        let path = raw.strip_prefix('$').unwrap_or(raw);
        if !is_valid_ref(path) {
            return Err(SchemaError::unexpected("field", raw));
        }
        aliases.push(Alias {
            name: name.to_string(),
            field_path: path.to_string(),
            description: props.single("description")?.unwrap_or_default().to_string(),
            line: child.line,
        });
    }
    Ok(aliases)
}

/// Follow `path` from `field` through bundle and variant members (and the refs that
/// lead to them). `None` when a segment does not name a member.
pub fn resolve_alias_path<'a>(field: &'a Field, path: &str, arena: &'a FieldArena) -> Option<&'a Field> {
    let field = field.resolved(arena)?;
    if !matches!(field.kind, FieldKind::Bundle(_) | FieldKind::Variant(_)) {
        return None;
    }
    let (first, rest) = split_first_segment(path);
    let member = field.members().iter().find(|m| m.core.name == first)?;
    match rest {
        None => Some(member),
        Some(rest) => resolve_alias_path(member, rest, arena),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::field::test_support::parse;

    fn int(name: &str) -> Element {
        Element::new("int").with_attr("name", name).with_attr("type", "uint8")
    }

    fn outer(alias_path: &str) -> Element {
        Element::new("bundle")
            .with_attr("name", "Outer")
            .with_child(Element::new("bundle").with_attr("name", "a").with_child(int("b")))
            .with_child(Element::new("alias").with_attr("name", "shortcut").with_attr("field", alias_path))
    }

    #[test]
    fn nested_path_resolves() {
        let (res, _) = parse(&outer("$a.b"));
        let f = res.expect("bundle");
        let arena = FieldArena::default();
        assert_eq!(f.aliases()[0].field_path, "a.b");
        assert_eq!(resolve_alias_path(&f, "a.b", &arena).map(Field::name), Some("b"));
        assert_eq!(resolve_alias_path(&f, "a", &arena).map(Field::name), Some("a"));
        assert!(resolve_alias_path(&f, "a.c", &arena).is_none());
        assert!(resolve_alias_path(&f, "a.b.c", &arena).is_none());
    }

    #[test]
    fn broken_alias_is_dropped_with_warning() {
        let (res, _) = parse(&outer("a.c"));
        let mut f = res.expect("bundle");
        let mut diag = Diagnostics::new();
        f.finalize(&FieldArena::default(), &mut diag);
        assert!(f.aliases().is_empty());
        assert_eq!(diag.warning_count(), 1);
        assert!(!diag.has_errors());
    }

    #[test]
    fn valid_alias_survives_finalize() {
        let (res, _) = parse(&outer("a.b"));
        let mut f = res.expect("bundle");
        let mut diag = Diagnostics::new();
        f.finalize(&FieldArena::default(), &mut diag);
        assert_eq!(f.aliases().len(), 1);
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn alias_name_must_not_shadow_member() {
        let elem = Element::new("bundle")
            .with_attr("name", "Outer")
            .with_child(int("x"))
            .with_child(Element::new("alias").with_attr("name", "x").with_attr("field", "x"));
        let (res, _) = parse(&elem);
        assert!(matches!(res, Err(SchemaError::Invalid { .. })));
    }
}
