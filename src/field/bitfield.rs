//! Bitfields: integral, enum and set members packed into a whole number of bytes.

use super::{
    parse_endian, parse_fields, validate_siblings, Field, FieldCore, FieldKind, ParseContext, Scope,
    ValidateContext,
};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::parse_usize;
use crate::schema::Endian;

pub(crate) const PROPS: &[&str] = &["endian", "length"];

pub(crate) const CHILDREN: &[&str] = &["members", "int", "enum", "set", "ref"];

const MAX_BITS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldField {
    pub endian: Endian,
    /// Total length in bytes.
    pub length: usize,
    pub members: Vec<Field>,
}

impl BitfieldField {
    pub(crate) fn parse(
        elem: &Element,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Self, SchemaError> {
        let members = parse_fields(elem, "members", &core.name, ctx, Scope::bitfield_member(core.window))?;
        if members.is_empty() {
            return Err(SchemaError::invalid(&core.name, "bitfield must have members"));
        }
        for member in &members {
            if !matches!(
                member.kind,
                FieldKind::Int(_) | FieldKind::Enum(_) | FieldKind::Set(_) | FieldKind::Ref(_)
            ) {
                return Err(SchemaError::BitfieldMemberKind {
                    name: member.core.name.clone(),
                    kind: member.kind_name(),
                });
            }
        }

        let actual: usize = members.iter().map(Field::bit_length).sum();
        let expected = match props.single("length")? {
            Some(s) => parse_usize(s)
                .filter(|n| (1..=MAX_BITS / 8).contains(n))
                .ok_or_else(|| SchemaError::unexpected("length", s))?
                * 8,
            // Without a declared length the members must fill whole bytes.
            None => actual.div_ceil(8).clamp(1, MAX_BITS / 8) * 8,
        };
        if actual != expected {
            return Err(SchemaError::BitLengthMismatch {
                name: core.name.clone(),
                expected,
                actual,
            });
        }

        Ok(BitfieldField {
            endian: parse_endian(props, ctx.endian)?,
            length: expected / 8,
            members,
        })
    }

    /// Members declared by reference must land on an integral, enum or set field.
    pub(crate) fn validate(&self, core: &FieldCore, cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
        let mut ok = validate_siblings(&self.members, cx);
        for member in &self.members {
            let Some(target) = member.resolved(cx.arena) else {
                continue;
            };
            if !matches!(target.kind, FieldKind::Int(_) | FieldKind::Enum(_) | FieldKind::Set(_)) {
                let err = SchemaError::BitfieldMemberKind {
                    name: member.core.name.clone(),
                    kind: target.kind_name(),
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
