//! Variants: exactly one of the member fields is present on the wire.

use super::{parse_fields, validate_siblings, Field, FieldArena, FieldCore, ParseContext, Scope, ValidateContext};
use crate::alias::{parse_aliases, Alias};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::parse_int;

pub(crate) const PROPS: &[&str] = &["defaultMember"];

#[derive(Debug, Clone, PartialEq)]
pub struct VariantField {
    pub members: Vec<Field>,
    /// Member selected by default; `None` leaves the variant empty.
    pub default_member: Option<usize>,
    pub aliases: Vec<Alias>,
}

impl VariantField {
    pub(crate) fn parse(
        elem: &Element,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Self, SchemaError> {
        let members = parse_fields(elem, "members", &core.name, ctx, Scope::member(core.window))?;
        let default_member = match props.single("defaultMember")? {
            None | Some("none") => None,
            Some(s) => match parse_int(s) {
                Some(idx) if idx < 0 => None,
                Some(idx) => {
                    let idx = usize::try_from(idx).ok().filter(|i| *i < members.len()).ok_or_else(|| {
                        SchemaError::invalid(
                            &core.name,
                            format!("default member index {} is out of range (0..{})", idx, members.len()),
                        )
                    })?;
                    Some(idx)
                }
                None => Some(members.iter().position(|m| m.core.name == s).ok_or_else(|| {
                    SchemaError::invalid(&core.name, format!("default member \"{}\" is not a member", s))
                })?),
            },
        };
        let aliases = parse_aliases(elem, core, &members)?;
        Ok(VariantField {
            members,
            default_member,
            aliases,
        })
    }

    pub fn min_length(&self, arena: &FieldArena) -> usize {
        self.members.iter().map(|m| m.min_length(arena)).min().unwrap_or(0)
    }

    pub fn max_length(&self, arena: &FieldArena) -> usize {
        self.members.iter().map(|m| m.max_length(arena)).max().unwrap_or(0)
    }

    /// When code generation is version dependent, members cannot be introduced in a
    /// later version than the variant itself.
    pub(crate) fn validate(&self, core: &FieldCore, cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
        let mut ok = validate_siblings(&self.members, cx);
        if cx.version_dependent_code {
            for member in self.members.iter().filter(|m| m.is_version_dependent() && m.core.window.since != core.window.since) {
                let err = SchemaError::VersionDependentMember {
                    variant: core.name.clone(),
                    member: member.core.name.clone(),
                };
                cx.diag.error(member.core.line, err.to_string());
                ok = false;
            }
        }
        if ok {
            Ok(())
        } else {
            Err(SchemaError::InvalidMembers(core.name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::field::test_support::parse;

    fn member(name: &str) -> Element {
        Element::new("bundle").with_attr("name", name).with_child(
            Element::new("int").with_attr("name", "id").with_attr("type", "uint8"),
        )
    }

    fn variant() -> Element {
        Element::new("variant")
            .with_attr("name", "V")
            .with_child(member("P1"))
            .with_child(member("P2").with_attr("sinceVersion", "2"))
    }

    #[test]
    fn default_member_by_name_index_or_none() {
        let (res, _) = parse(&variant().with_attr("defaultMember", "P2"));
        assert_eq!(res.expect("variant").as_variant().and_then(|v| v.default_member), Some(1));
        let (res, _) = parse(&variant().with_attr("defaultMember", "0"));
        assert_eq!(res.expect("variant").as_variant().and_then(|v| v.default_member), Some(0));
        let (res, _) = parse(&variant());
        assert_eq!(res.expect("variant").as_variant().and_then(|v| v.default_member), None);
        let (res, _) = parse(&variant().with_attr("defaultMember", "none"));
        assert_eq!(res.expect("variant").as_variant().and_then(|v| v.default_member), None);
    }

    #[test]
    fn invalid_default_member() {
        let (res, _) = parse(&variant().with_attr("defaultMember", "2"));
        assert!(matches!(res, Err(SchemaError::Invalid { .. })));
        let (res, _) = parse(&variant().with_attr("defaultMember", "P3"));
        assert!(matches!(res, Err(SchemaError::Invalid { .. })));
    }

    #[test]
    fn version_dependent_member_rejected_only_when_configured() {
        let (res, _) = parse(&variant());
        let field = res.expect("variant");
        let arena = FieldArena::default();

        let mut diag = Diagnostics::new();
        let mut cx = ValidateContext {
            arena: &arena,
            diag: &mut diag,
            version_dependent_code: false,
        };
        assert!(field.validate(crate::field::Siblings::None, &mut cx).is_ok());

        let mut diag = Diagnostics::new();
        let mut cx = ValidateContext {
            arena: &arena,
            diag: &mut diag,
            version_dependent_code: true,
        };
        assert!(matches!(
            field.validate(crate::field::Siblings::None, &mut cx),
            Err(SchemaError::InvalidMembers(_))
        ));
        assert!(diag.messages()[0].message.contains("P2"));
    }

    #[test]
    fn member_deprecated_earlier_is_not_version_dependent() {
        let elem = Element::new("variant")
            .with_attr("name", "V")
            .with_attr("sinceVersion", "2")
            .with_child(member("P1"))
            .with_child(member("P2").with_attr("deprecated", "4"));
        let (res, _) = parse(&elem);
        let field = res.expect("variant");
        let arena = FieldArena::default();
        let mut diag = Diagnostics::new();
        let mut cx = ValidateContext {
            arena: &arena,
            diag: &mut diag,
            version_dependent_code: true,
        };
        assert!(field.validate(crate::field::Siblings::None, &mut cx).is_ok());
        assert_eq!(diag.error_count(), 0);
    }

    #[test]
    fn length_spans_members() {
        let elem = Element::new("variant")
            .with_attr("name", "V")
            .with_child(Element::new("int").with_attr("name", "a").with_attr("type", "uint8"))
            .with_child(Element::new("int").with_attr("name", "b").with_attr("type", "uint32"));
        let (res, _) = parse(&elem);
        let f = res.expect("variant");
        assert_eq!(f.min_length(&FieldArena::default()), 1);
        assert_eq!(f.max_length(&FieldArena::default()), 4);
    }
}
