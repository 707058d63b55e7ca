//! Enumerated fields.

use std::collections::BTreeMap;

use super::int::{bits_range, IntType};
use super::{check_int_value, parse_bit_length, parse_endian, parse_flag, FieldCore, ParseContext, Scope};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::{is_valid_name, parse_int, parse_usize};
use crate::schema::Endian;
use crate::version::VersionWindow;

pub(crate) const PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "nonUniqueAllowed",
    "hexAssign",
    "validCheckVersion",
    "defaultValue",
];

pub(crate) const CHILDREN: &[&str] = &["validValue"];

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub value: i128,
    pub window: VersionWindow,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumField {
    pub ty: IntType,
    pub endian: Endian,
    pub length: usize,
    pub bit_length: usize,
    pub non_unique_allowed: bool,
    pub hex_assign: bool,
    pub valid_check_version: bool,
    pub default_value: i128,
    /// Declared values by name.
    pub values: BTreeMap<String, EnumValue>,
    /// Names declared for each numeric value, in declaration order.
    pub rev_values: BTreeMap<i128, Vec<String>>,
}

impl EnumField {
    pub(crate) fn parse(
        elem: &Element,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
        scope: Scope,
    ) -> Result<Self, SchemaError> {
        let raw_type = props.required("type")?;
        let ty = IntType::parse(raw_type)
            .filter(|t| !t.is_var())
            .ok_or_else(|| SchemaError::unexpected("type", raw_type))?;
        let length = match props.single("length")? {
            Some(s) => {
                let n = parse_usize(s).ok_or_else(|| SchemaError::unexpected("length", s))?;
                if n == 0 || ty.max_length() < n {
                    return Err(SchemaError::Length {
                        name: core.name.clone(),
                        reason: format!("length {} is not supported by type {}", n, ty.name()),
                    });
                }
                n
            }
            None => ty.max_length(),
        };
        let mut field = EnumField {
            ty,
            endian: parse_endian(props, ctx.endian)?,
            length,
            bit_length: parse_bit_length(props, core, ctx, scope, false, length * 8)?,
            non_unique_allowed: parse_flag(props, "nonUniqueAllowed")?,
            hex_assign: parse_flag(props, "hexAssign")?,
            valid_check_version: parse_flag(props, "validCheckVersion")?,
            default_value: 0,
            values: BTreeMap::new(),
            rev_values: BTreeMap::new(),
        };
        field.parse_values(elem, core, ctx)?;
        if field.values.is_empty() {
            return Err(SchemaError::invalid(&core.name, "enum must define at least one value"));
        }

        if let Some(s) = props.single("defaultValue")? {
            let value = match parse_int(s) {
                Some(v) => v,
                None if is_valid_name(s) => field
                    .values
                    .get(s)
                    .map(|v| v.value)
                    .ok_or_else(|| SchemaError::invalid(&core.name, format!("unknown default value \"{}\"", s)))?,
                None => return Err(SchemaError::unexpected("defaultValue", s)),
            };
            check_int_value(core, "default value", value, field.type_range(), field.serialisable_range(), ctx)?;
            field.default_value = value;
        }
        Ok(field)
    }

    fn parse_values(&mut self, elem: &Element, core: &FieldCore, ctx: &mut ParseContext<'_>) -> Result<(), SchemaError> {
        let type_range = self.type_range();
        let wire_range = self.serialisable_range();
        for child in elem.children_named("validValue") {
            let props = child.props(&["description", "displayName"]);
            let name = props.required("name")?;
            if !is_valid_name(name) {
                return Err(SchemaError::InvalidName(name.to_string()));
            }
            if self.values.contains_key(name) {
                return Err(SchemaError::DuplicateName {
                    kind: "enum value",
                    name: name.to_string(),
                });
            }
            let raw = props.required("val")?;
            let value = parse_int(raw).ok_or_else(|| SchemaError::unexpected("val", raw))?;
            check_int_value(core, "value", value, type_range, wire_range, ctx)?;
            if !self.non_unique_allowed {
                if let Some(existing) = self.rev_values.get(&value).and_then(|names| names.first()) {
                    return Err(SchemaError::DuplicateValue {
                        name: core.name.clone(),
                        value: value.to_string(),
                        existing: existing.clone(),
                    });
                }
            }
            let info = EnumValue {
                name: name.to_string(),
                value,
                window: VersionWindow::parse(name, &props, core.window, ctx.schema_version)?,
                description: props.single("description")?.unwrap_or_default().to_string(),
                display_name: props.single("displayName")?.unwrap_or_default().to_string(),
            };
            self.rev_values.entry(value).or_default().push(info.name.clone());
            self.values.insert(info.name.clone(), info);
        }
        Ok(())
    }

    pub fn type_range(&self) -> (i128, i128) {
        self.ty.range()
    }

    pub fn serialisable_range(&self) -> (i128, i128) {
        bits_range(self.ty.is_signed(), self.bit_length.min(self.length * 8))
    }

    pub fn value(&self, name: &str) -> Option<&EnumValue> {
        self.values.get(name)
    }

    /// Names declared for `value`; several only when non-unique values are allowed.
    pub fn names_of(&self, value: i128) -> &[String] {
        self.rev_values.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every numeric value is declared under exactly one name.
    pub fn is_unique(&self) -> bool {
        self.rev_values.values().all(|names| names.len() == 1)
    }
}
