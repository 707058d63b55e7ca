//! Optional fields: a referenced field that may be absent on the wire.

use super::{FieldCore, FieldRef, Siblings};
use crate::document::Props;
use crate::error::SchemaError;
use crate::literal::{is_valid_name, parse_bool};

pub(crate) const PROPS: &[&str] = &["field", "defaultMode", "cond", "missingOnReadFail"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionalMode {
    #[default]
    Tentative,
    Exists,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionalField {
    pub field: FieldRef,
    pub default_mode: OptionalMode,
    /// Presence condition over earlier siblings, e.g. `$flags.hasExtra`.
    pub cond: Option<String>,
    pub missing_on_read_fail: bool,
}

impl OptionalField {
    pub(crate) fn parse(props: &Props, core: &FieldCore) -> Result<Self, SchemaError> {
        let field = FieldRef::new(props.required("field")?, core.line)?;
        let default_mode = match props.single("defaultMode")? {
            None | Some("tentative") => OptionalMode::Tentative,
            Some("exists" | "exist") => OptionalMode::Exists,
            Some("missing") => OptionalMode::Missing,
            Some(other) => return Err(SchemaError::unexpected("defaultMode", other)),
        };
        let cond = match props.single("cond")? {
            Some(c) => {
                if cond_sibling(c).is_none() {
                    return Err(SchemaError::unexpected("cond", c));
                }
                Some(c.to_string())
            }
            None => None,
        };
        let missing_on_read_fail = match props.single("missingOnReadFail")? {
            Some(s) => parse_bool(s).ok_or_else(|| SchemaError::unexpected("missingOnReadFail", s))?,
            None => false,
        };
        Ok(OptionalField {
            field,
            default_mode,
            cond,
            missing_on_read_fail,
        })
    }

    /// The condition must start with an existing sibling.
    pub(crate) fn validate(&self, core: &FieldCore, siblings: Siblings<'_>) -> Result<(), SchemaError> {
        let Some(name) = self.cond.as_deref().and_then(cond_sibling) else {
            return Ok(());
        };
        if name == core.name || siblings.find(name).is_none() {
            return Err(SchemaError::invalid(
                &core.name,
                format!("condition refers to unknown sibling \"{}\"", name),
            ));
        }
        Ok(())
    }
}

/// Leading `$name` of a condition such as `$flags.bit0` or `$len != 0`.
fn cond_sibling(cond: &str) -> Option<&str> {
    let rest = cond.trim().strip_prefix('!').unwrap_or(cond.trim()).strip_prefix('$')?;
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let name = &rest[..end];
    is_valid_name(name).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;
    use crate::field::test_support::parse;
    use crate::field::{Field, FieldArena};

    fn optional() -> Element {
        Element::new("optional").with_attr("name", "o").with_attr("field", "ns.Extra")
    }

    #[test]
    fn condition_names_first_sibling() {
        assert_eq!(cond_sibling("$flags.hasExtra"), Some("flags"));
        assert_eq!(cond_sibling("!$len"), Some("len"));
        assert_eq!(cond_sibling("$len != 0"), Some("len"));
        assert_eq!(cond_sibling("len"), None);
    }

    #[test]
    fn modes_and_lengths() {
        let (res, _) = parse(&optional().with_attr("defaultMode", "missing"));
        let f = res.expect("optional");
        assert_eq!(f.as_optional().map(|o| o.default_mode), Some(OptionalMode::Missing));
        assert_eq!(f.min_length(&FieldArena::default()), 0);
        let (res, _) = parse(&optional().with_attr("defaultMode", "sometimes"));
        assert!(matches!(res, Err(SchemaError::UnexpectedValue { .. })));
    }

    #[test]
    fn condition_sibling_is_checked() {
        let (res, _) = parse(&optional().with_attr("cond", "$flags.hasExtra"));
        let f = res.expect("optional");
        let (flags, _) = parse(&Element::new("set").with_attr("name", "flags").with_attr("length", "1"));
        let siblings: Vec<Field> = vec![flags.expect("set")];
        let o = f.as_optional().expect("optional");
        assert!(o.validate(&f.core, Siblings::List(&siblings)).is_ok());
        assert!(o.validate(&f.core, Siblings::List(&[])).is_err());
    }
}
