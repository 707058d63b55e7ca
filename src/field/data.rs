//! Raw octet sequences.

use super::list::Prefix;
use super::string::{byte_bounds, check_sizing, parse_length, parse_prefix_by_name};
use super::{FieldArena, FieldCore};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::parse_hex_bytes;

pub(crate) const PROPS: &[&str] = &["length", "defaultValue", "lengthPrefix"];

#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    pub length: Option<usize>,
    pub default_value: Vec<u8>,
    pub length_prefix: Option<Prefix>,
}

impl DataField {
    pub(crate) fn parse(elem: &Element, props: &Props, core: &FieldCore) -> Result<Self, SchemaError> {
        let length = parse_length(props)?;
        let length_prefix = parse_prefix_by_name(elem, props, core)?;
        check_sizing(core, length, length_prefix.as_ref(), false)?;
        let default_value = match props.single("defaultValue")? {
            Some(s) => parse_hex_bytes(s).ok_or_else(|| SchemaError::unexpected("defaultValue", s))?,
            None => Vec::new(),
        };
        if let Some(n) = length {
            if n < default_value.len() {
                return Err(SchemaError::Length {
                    name: core.name.clone(),
                    reason: format!("default value is longer than the fixed length {}", n),
                });
            }
        }
        Ok(DataField {
            length,
            default_value,
            length_prefix,
        })
    }

    pub fn min_length(&self, arena: &FieldArena) -> usize {
        byte_bounds(arena, self.length, self.length_prefix.as_ref(), 0).0
    }

    pub fn max_length(&self, arena: &FieldArena) -> usize {
        byte_bounds(arena, self.length, self.length_prefix.as_ref(), 0).1
    }
}

#[cfg(test)]
mod tests {
    use crate::document::Element;
    use crate::error::SchemaError;
    use crate::field::test_support::parse;
    use crate::field::FieldArena;

    fn data() -> Element {
        Element::new("data").with_attr("name", "d")
    }

    #[test]
    fn hex_default() {
        let (res, _) = parse(&data().with_attr("defaultValue", "de ad be ef"));
        let f = res.expect("data");
        assert_eq!(f.as_data().map(|d| d.default_value.clone()), Some(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(f.max_length(&FieldArena::default()), usize::MAX);
        let (res, _) = parse(&data().with_attr("defaultValue", "xyz"));
        assert!(matches!(res, Err(SchemaError::UnexpectedValue { .. })));
    }

    #[test]
    fn fixed_length_bounds_default() {
        let (res, _) = parse(&data().with_attr("length", "2").with_attr("defaultValue", "010203"));
        assert!(matches!(res, Err(SchemaError::Length { .. })));
        let (res, _) = parse(&data().with_attr("length", "3").with_attr("defaultValue", "010203"));
        assert_eq!(res.expect("data").min_length(&FieldArena::default()), 3);
    }
}
