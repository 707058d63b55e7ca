//! Bit-set fields.

use std::collections::BTreeMap;

use super::int::IntType;
use super::{parse_bit_length, parse_endian, parse_flag, FieldCore, ParseContext, Scope};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::{is_valid_name, parse_bool, parse_usize};
use crate::schema::Endian;
use crate::version::VersionWindow;

pub(crate) const PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "defaultValue",
    "reservedValue",
    "nonUniqueAllowed",
    "validCheckVersion",
];

pub(crate) const CHILDREN: &[&str] = &["bit"];

#[derive(Debug, Clone, PartialEq)]
pub struct SetBit {
    pub name: String,
    pub idx: usize,
    pub default_value: bool,
    pub reserved: bool,
    pub window: VersionWindow,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetField {
    pub ty: IntType,
    pub endian: Endian,
    pub length: usize,
    pub bit_length: usize,
    /// Value of bits that are not declared.
    pub default_value: bool,
    /// Expected value of reserved (undeclared) bits.
    pub reserved_value: bool,
    pub non_unique_allowed: bool,
    pub valid_check_version: bool,
    pub bits: BTreeMap<String, SetBit>,
}

fn unsigned_type_of_length(length: usize) -> Option<IntType> {
    match length {
        1 => Some(IntType::Uint8),
        2 => Some(IntType::Uint16),
        3 | 4 => Some(IntType::Uint32),
        5..=8 => Some(IntType::Uint64),
        _ => None,
    }
}

impl SetField {
    pub(crate) fn parse(
        elem: &Element,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
        scope: Scope,
    ) -> Result<Self, SchemaError> {
        let declared_type = match props.single("type")? {
            Some(s) => Some(
                IntType::parse(s)
                    .filter(|t| !t.is_signed() && !t.is_var())
                    .ok_or_else(|| SchemaError::unexpected("type", s))?,
            ),
            None => None,
        };
        let declared_length = match props.single("length")? {
            Some(s) => Some(parse_usize(s).ok_or_else(|| SchemaError::unexpected("length", s))?),
            None => None,
        };
        let (ty, length) = match (declared_type, declared_length) {
            (Some(ty), None) => (ty, ty.max_length()),
            (Some(ty), Some(n)) if n != 0 && n <= ty.max_length() => (ty, n),
            (None, Some(n)) => {
                let ty = unsigned_type_of_length(n).ok_or_else(|| SchemaError::Length {
                    name: core.name.clone(),
                    reason: format!("length {} must be within 1..=8", n),
                })?;
                (ty, n)
            }
            (Some(ty), Some(n)) => {
                return Err(SchemaError::Length {
                    name: core.name.clone(),
                    reason: format!("length {} is not supported by type {}", n, ty.name()),
                })
            }
            (None, None) => return Err(SchemaError::MissingProperty("length".to_string())),
        };

        let mut field = SetField {
            ty,
            endian: parse_endian(props, ctx.endian)?,
            length,
            bit_length: parse_bit_length(props, core, ctx, scope, false, length * 8)?,
            default_value: parse_flag(props, "defaultValue")?,
            reserved_value: parse_flag(props, "reservedValue")?,
            non_unique_allowed: parse_flag(props, "nonUniqueAllowed")?,
            valid_check_version: parse_flag(props, "validCheckVersion")?,
            bits: BTreeMap::new(),
        };
        field.parse_bits(elem, core, ctx)?;
        Ok(field)
    }

    fn parse_bits(&mut self, elem: &Element, core: &FieldCore, ctx: &ParseContext<'_>) -> Result<(), SchemaError> {
        for child in elem.children_named("bit") {
            let props = child.props(&["description", "displayName"]);
            let name = props.required("name")?;
            if !is_valid_name(name) {
                return Err(SchemaError::InvalidName(name.to_string()));
            }
            if self.bits.contains_key(name) {
                return Err(SchemaError::DuplicateName {
                    kind: "bit",
                    name: name.to_string(),
                });
            }
            let raw = props.required("idx")?;
            let idx = parse_usize(raw).ok_or_else(|| SchemaError::unexpected("idx", raw))?;
            if self.bit_length <= idx {
                return Err(SchemaError::Length {
                    name: core.name.clone(),
                    reason: format!("bit \"{}\" index {} exceeds bit length {}", name, idx, self.bit_length),
                });
            }
            if !self.non_unique_allowed {
                if let Some(existing) = self.bits.values().find(|b| b.idx == idx) {
                    return Err(SchemaError::DuplicateValue {
                        name: core.name.clone(),
                        value: idx.to_string(),
                        existing: existing.name.clone(),
                    });
                }
            }
            let flag = |key: &str, default: bool| -> Result<bool, SchemaError> {
                match props.single(key)? {
                    Some(s) => parse_bool(s).ok_or_else(|| SchemaError::unexpected(key, s)),
                    None => Ok(default),
                }
            };
            let bit = SetBit {
                name: name.to_string(),
                idx,
                default_value: flag("defaultValue", self.default_value)?,
                reserved: flag("reserved", false)?,
                window: VersionWindow::parse(name, &props, core.window, ctx.schema_version)?,
                description: props.single("description")?.unwrap_or_default().to_string(),
                display_name: props.single("displayName")?.unwrap_or_default().to_string(),
            };
            self.bits.insert(bit.name.clone(), bit);
        }
        Ok(())
    }

    pub fn bit(&self, name: &str) -> Option<&SetBit> {
        self.bits.get(name)
    }

    /// Indices no declared bit uses.
    pub fn reserved_indices(&self) -> Vec<usize> {
        (0..self.bit_length)
            .filter(|idx| !self.bits.values().any(|b| b.idx == *idx && !b.reserved))
            .collect()
    }
}
