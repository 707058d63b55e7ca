//! Bundles: an ordered sequence of member fields serialised back to back.

use super::{parse_fields, sum_saturating, Field, FieldArena, FieldCore, ParseContext, Scope};
use crate::alias::{parse_aliases, Alias};
use crate::document::Element;
use crate::error::SchemaError;

pub(crate) const PROPS: &[&str] = &[];

/// Children of bundles and variants.
pub(crate) const CHILDREN: &[&str] = &[
    "members", "alias", "int", "float", "enum", "bitfield", "bundle", "string", "data", "list", "ref",
    "optional", "variant", "set",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleField {
    pub members: Vec<Field>,
    pub aliases: Vec<Alias>,
}

impl BundleField {
    pub(crate) fn parse(elem: &Element, core: &FieldCore, ctx: &mut ParseContext<'_>) -> Result<Self, SchemaError> {
        let members = parse_fields(elem, "members", &core.name, ctx, Scope::member(core.window))?;
        if members.is_empty() {
            return Err(SchemaError::invalid(&core.name, "bundle must have members"));
        }
        let aliases = parse_aliases(elem, core, &members)?;
        Ok(BundleField { members, aliases })
    }

    pub fn member(&self, name: &str) -> Option<&Field> {
        self.members.iter().find(|m| m.core.name == name)
    }

    pub fn min_length(&self, arena: &FieldArena) -> usize {
        sum_saturating(self.members.iter().map(|m| m.min_length(arena)))
    }

    /// Saturates at `usize::MAX` once any member is unbounded.
    pub fn max_length(&self, arena: &FieldArena) -> usize {
        sum_saturating(self.members.iter().map(|m| m.max_length(arena)))
    }
}

#[cfg(test)]
mod tests {
    use crate::document::Element;
    use crate::error::SchemaError;
    use crate::field::test_support::parse;
    use crate::field::FieldArena;

    fn int(name: &str, ty: &str) -> Element {
        Element::new("int").with_attr("name", name).with_attr("type", ty)
    }

    fn string(name: &str) -> Element {
        Element::new("string").with_attr("name", name)
    }

    #[test]
    fn lengths_sum_members() {
        let elem = Element::new("bundle")
            .with_attr("name", "B")
            .with_child(int("a", "uint8"))
            .with_child(int("b", "uint32"))
            .with_child(int("c", "uintvar").with_attr("length", "3"));
        let (res, _) = parse(&elem);
        let f = res.expect("bundle");
        let arena = FieldArena::default();
        assert_eq!(f.min_length(&arena), 6);
        assert_eq!(f.max_length(&arena), 8);
    }

    #[test]
    fn unbounded_member_saturates() {
        let base = Element::new("bundle").with_attr("name", "B").with_child(int("a", "uint8"));
        let (res, _) = parse(&base.clone().with_child(string("s")));
        let arena = FieldArena::default();
        let f = res.expect("bundle");
        assert_eq!(f.max_length(&arena), usize::MAX);
        assert_eq!(f.min_length(&arena), 1);

        // adding members never shrinks the bounds
        let (res, _) = parse(&base.with_child(string("s")).with_child(int("z", "uint16")));
        let g = res.expect("bundle");
        assert_eq!(g.max_length(&arena), usize::MAX);
        assert!(g.min_length(&arena) >= f.min_length(&arena));
    }

    #[test]
    fn members_wrapper_is_accepted() {
        let elem = Element::new("bundle")
            .with_attr("name", "B")
            .with_child(Element::new("members").with_child(int("a", "uint8")));
        let (res, diag) = parse(&elem);
        assert_eq!(res.expect("bundle").members().len(), 1);
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn failing_member_fails_the_bundle_but_is_reported() {
        let elem = Element::new("bundle")
            .with_attr("name", "B")
            .with_child(int("a", "uint9"))
            .with_child(int("b", "uint8").with_attr("defaultValue", "x"));
        let (res, diag) = parse(&elem);
        assert!(matches!(res, Err(SchemaError::InvalidMembers(name)) if name == "B"));
        assert_eq!(diag.error_count(), 2);
    }
}
