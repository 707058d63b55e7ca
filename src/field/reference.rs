//! `ref` fields: a local alias of a namespace-level field.

use super::{FieldCore, FieldRef, ParseContext, Scope};
use crate::document::Props;
use crate::error::SchemaError;
use crate::literal::parse_usize;

pub(crate) const PROPS: &[&str] = &["field", "bitLength"];

/// Does not own its target; lengths and kind are those of the referenced field.
#[derive(Debug, Clone, PartialEq)]
pub struct RefField {
    pub target: FieldRef,
    /// Width inside a bitfield.
    pub bit_length: Option<usize>,
}

impl RefField {
    pub(crate) fn parse(
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
        scope: Scope,
    ) -> Result<Self, SchemaError> {
        let target = FieldRef::new(props.required("field")?, core.line)?;
        let bit_length = match (props.single("bitLength")?, scope.in_bitfield) {
            (Some(s), true) => Some(
                parse_usize(s)
                    .filter(|n| (1..=64).contains(n))
                    .ok_or_else(|| SchemaError::unexpected("bitLength", s))?,
            ),
            (None, true) => return Err(SchemaError::MissingProperty("bitLength".to_string())),
            (Some(_), false) => {
                ctx.diag.warning(
                    core.line,
                    format!("\"{}\": property \"bitLength\" is applicable only to bitfield members", core.name),
                );
                None
            }
            (None, false) => None,
        };
        Ok(RefField { target, bit_length })
    }
}
