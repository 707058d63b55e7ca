//! Strings.

use super::list::{named_prefix, Prefix};
use super::{FieldArena, FieldCore};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::{parse_bool, parse_usize};

pub(crate) const PROPS: &[&str] = &["length", "defaultValue", "encoding", "zeroTermSuffix", "lengthPrefix"];

#[derive(Debug, Clone, PartialEq)]
pub struct StringField {
    /// Fixed serialised length in bytes.
    pub length: Option<usize>,
    pub default_value: String,
    pub encoding: Option<String>,
    pub zero_term_suffix: bool,
    pub length_prefix: Option<Prefix>,
}

/// Fixed length, length prefix and terminating suffix exclude each other.
pub(crate) fn check_sizing(
    core: &FieldCore,
    length: Option<usize>,
    prefix: Option<&Prefix>,
    suffix: bool,
) -> Result<(), SchemaError> {
    let conflict = |reason: &str| SchemaError::PrefixConflict {
        name: core.name.clone(),
        reason: reason.to_string(),
    };
    match (length, prefix, suffix) {
        (Some(_), Some(_), _) => Err(conflict("fixed \"length\" cannot be combined with \"lengthPrefix\"")),
        (Some(_), None, true) => Err(conflict("fixed \"length\" cannot be combined with a terminating suffix")),
        (None, Some(_), true) => Err(conflict("\"lengthPrefix\" cannot be combined with a terminating suffix")),
        _ => Ok(()),
    }
}

pub(crate) fn parse_length(props: &Props) -> Result<Option<usize>, SchemaError> {
    match props.single("length")? {
        Some(s) => Ok(Some(
            parse_usize(s)
                .filter(|n| *n > 0)
                .ok_or_else(|| SchemaError::unexpected("length", s))?,
        )),
        None => Ok(None),
    }
}

/// Lower and upper bound of a variable sized sequence of bytes.
pub(crate) fn byte_bounds(
    arena: &FieldArena,
    length: Option<usize>,
    prefix: Option<&Prefix>,
    suffix: usize,
) -> (usize, usize) {
    if let Some(n) = length {
        return (n, n);
    }
    match prefix {
        Some(p) => (
            p.min_length(arena),
            p.max_length(arena).saturating_add(p.max_value(arena)),
        ),
        None => (suffix, usize::MAX),
    }
}

impl StringField {
    pub(crate) fn parse(elem: &Element, props: &Props, core: &FieldCore) -> Result<Self, SchemaError> {
        let length = parse_length(props)?;
        let zero_term_suffix = match props.single("zeroTermSuffix")? {
            Some(s) => parse_bool(s).ok_or_else(|| SchemaError::unexpected("zeroTermSuffix", s))?,
            None => false,
        };
        let length_prefix = parse_prefix_by_name(elem, props, core)?;
        check_sizing(core, length, length_prefix.as_ref(), zero_term_suffix)?;

        let default_value = props.single("defaultValue")?.unwrap_or_default().to_string();
        if let Some(n) = length {
            if n < default_value.len() {
                return Err(SchemaError::Length {
                    name: core.name.clone(),
                    reason: format!("default value is longer than the fixed length {}", n),
                });
            }
        }
        Ok(StringField {
            length,
            default_value,
            encoding: props.single("encoding")?.map(str::to_string),
            zero_term_suffix,
            length_prefix,
        })
    }

    fn bounds(&self, arena: &FieldArena) -> (usize, usize) {
        let suffix = usize::from(self.zero_term_suffix);
        byte_bounds(arena, self.length, self.length_prefix.as_ref(), suffix)
    }

    pub fn min_length(&self, arena: &FieldArena) -> usize {
        self.bounds(arena).0
    }

    pub fn max_length(&self, arena: &FieldArena) -> usize {
        self.bounds(arena).1
    }
}

/// Strings and data reference their length prefix; they never nest fields.
pub(crate) fn parse_prefix_by_name(elem: &Element, props: &Props, core: &FieldCore) -> Result<Option<Prefix>, SchemaError> {
    if elem.children.iter().any(|c| c.tag == "lengthPrefix" && !c.children.is_empty()) {
        return Err(SchemaError::invalid(
            &core.name,
            "\"lengthPrefix\" cannot be defined inline, reference a field instead",
        ));
    }
    match props.single("lengthPrefix")? {
        Some(value) => named_prefix("lengthPrefix", value, elem.line).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use crate::document::Element;
    use crate::error::SchemaError;
    use crate::field::test_support::parse;
    use crate::field::{FieldArena, Prefix};

    fn string() -> Element {
        Element::new("string").with_attr("name", "s")
    }

    #[test]
    fn sizing_variants() {
        let arena = FieldArena::default();
        let (res, _) = parse(&string().with_attr("length", "4"));
        let f = res.expect("string");
        assert_eq!((f.min_length(&arena), f.max_length(&arena)), (4, 4));

        let (res, _) = parse(&string().with_attr("zeroTermSuffix", "true"));
        let f = res.expect("string");
        assert_eq!((f.min_length(&arena), f.max_length(&arena)), (1, usize::MAX));

        let (res, _) = parse(&string().with_attr("lengthPrefix", "$len"));
        let f = res.expect("string");
        assert_eq!(f.as_string().and_then(|s| s.length_prefix.clone()), Some(Prefix::Detached("len".into())));
        assert_eq!(f.min_length(&arena), 0);
    }

    #[test]
    fn sizing_conflicts() {
        let (res, _) = parse(&string().with_attr("length", "4").with_attr("lengthPrefix", "$len"));
        assert!(matches!(res, Err(SchemaError::PrefixConflict { .. })));
        let (res, _) = parse(&string().with_attr("lengthPrefix", "$len").with_attr("zeroTermSuffix", "true"));
        assert!(matches!(res, Err(SchemaError::PrefixConflict { .. })));
    }

    #[test]
    fn default_must_fit_fixed_length() {
        let (res, _) = parse(&string().with_attr("length", "2").with_attr("defaultValue", "abc"));
        assert!(matches!(res, Err(SchemaError::Length { .. })));
    }

    #[test]
    fn inline_prefix_is_rejected() {
        let elem = string().with_child(
            Element::new("lengthPrefix").with_child(Element::new("int").with_attr("name", "n").with_attr("type", "uint8")),
        );
        let (res, _) = parse(&elem);
        assert!(matches!(res, Err(SchemaError::Invalid { .. })));
    }
}
