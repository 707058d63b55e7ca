//! Integral fields.

use super::{check_int_value, parse_bit_length, parse_endian, FieldCore, ParseContext, Scope};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::{is_valid_name, parse_bool, parse_int, parse_range, parse_scaling, parse_usize};
use crate::schema::Endian;
use crate::version::VersionWindow;

pub(crate) const PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "serOffset",
    "defaultValue",
    "scaling",
    "units",
    "validRange",
    "validValue",
    "validMin",
    "validMax",
    "validFullRange",
    "displayDecimals",
];

pub(crate) const CHILDREN: &[&str] = &["special"];

/// Storage type of integral values (also used by enums and sets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Intvar,
    Uintvar,
}

impl IntType {
    pub fn parse(s: &str) -> Option<Self> {
        let ty = match s {
            "int8" => IntType::Int8,
            "uint8" => IntType::Uint8,
            "int16" => IntType::Int16,
            "uint16" => IntType::Uint16,
            "int32" => IntType::Int32,
            "uint32" => IntType::Uint32,
            "int64" => IntType::Int64,
            "uint64" => IntType::Uint64,
            "intvar" => IntType::Intvar,
            "uintvar" => IntType::Uintvar,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            IntType::Int8 => "int8",
            IntType::Uint8 => "uint8",
            IntType::Int16 => "int16",
            IntType::Uint16 => "uint16",
            IntType::Int32 => "int32",
            IntType::Uint32 => "uint32",
            IntType::Int64 => "int64",
            IntType::Uint64 => "uint64",
            IntType::Intvar => "intvar",
            IntType::Uintvar => "uintvar",
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntType::Int8 | IntType::Int16 | IntType::Int32 | IntType::Int64 | IntType::Intvar
        )
    }

    /// Base-128 encodings whose serialised length depends on the value.
    pub fn is_var(self) -> bool {
        matches!(self, IntType::Intvar | IntType::Uintvar)
    }

    /// Maximal serialised length in bytes.
    pub fn max_length(self) -> usize {
        match self {
            IntType::Int8 | IntType::Uint8 => 1,
            IntType::Int16 | IntType::Uint16 => 2,
            IntType::Int32 | IntType::Uint32 => 4,
            IntType::Int64 | IntType::Uint64 => 8,
            IntType::Intvar | IntType::Uintvar => 9,
        }
    }

    /// Value bits carried by `length` bytes: 7 per byte for base-128 encodings.
    pub fn value_bits(self, length: usize) -> usize {
        if self.is_var() {
            length * 7
        } else {
            length * 8
        }
    }

    /// Range of the in-memory storage type.
    pub fn range(self) -> (i128, i128) {
        match self {
            IntType::Int8 => (i8::MIN.into(), i8::MAX.into()),
            IntType::Uint8 => (0, u8::MAX.into()),
            IntType::Int16 => (i16::MIN.into(), i16::MAX.into()),
            IntType::Uint16 => (0, u16::MAX.into()),
            IntType::Int32 => (i32::MIN.into(), i32::MAX.into()),
            IntType::Uint32 => (0, u32::MAX.into()),
            IntType::Int64 | IntType::Intvar => (i64::MIN.into(), i64::MAX.into()),
            IntType::Uint64 | IntType::Uintvar => (0, u64::MAX.into()),
        }
    }
}

/// Range representable by `bits` bits of the given signedness.
pub(crate) fn bits_range(signed: bool, bits: usize) -> (i128, i128) {
    if bits == 0 {
        return (0, 0);
    }
    let bits = bits.min(64) as u32;
    if signed {
        let half = 1i128 << (bits - 1);
        (-half, half - 1)
    } else {
        (0, (1i128 << bits) - 1)
    }
}

/// Named value with its own lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Special<T> {
    pub name: String,
    pub value: T,
    pub window: VersionWindow,
    pub description: String,
    pub display_name: String,
}

/// Read the `<special name val .../>` children of a numeric field.
pub(crate) fn parse_specials<T>(
    elem: &Element,
    core: &FieldCore,
    ctx: &ParseContext<'_>,
    value_of: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Special<T>>, SchemaError> {
    let mut specials: Vec<Special<T>> = Vec::new();
    for child in elem.children_named("special") {
        let props = child.props(&["description", "displayName"]);
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        if specials.iter().any(|s| s.name == name) {
            return Err(SchemaError::DuplicateName {
                kind: "special value",
                name: name.to_string(),
            });
        }
        let raw = props.required("val")?;
        let value = value_of(raw).ok_or_else(|| SchemaError::unexpected("val", raw))?;
        specials.push(Special {
            name: name.to_string(),
            value,
            window: VersionWindow::parse(name, &props, core.window, ctx.schema_version)?,
            description: props.single("description")?.unwrap_or_default().to_string(),
            display_name: props.single("displayName")?.unwrap_or_default().to_string(),
        });
    }
    Ok(specials)
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntField {
    pub ty: IntType,
    pub endian: Endian,
    /// Serialised length in bytes (the maximum one for variable length types).
    pub length: usize,
    pub bit_length: usize,
    /// Added to the value before serialisation.
    pub ser_offset: i128,
    pub default_value: i128,
    pub scaling: (i128, i128),
    pub units: Option<String>,
    pub display_decimals: usize,
    pub valid_ranges: Vec<(i128, i128)>,
    pub specials: Vec<Special<i128>>,
}

impl IntField {
    pub(crate) fn parse(
        elem: &Element,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
        scope: Scope,
    ) -> Result<Self, SchemaError> {
        let raw_type = props.required("type")?;
        let ty = IntType::parse(raw_type).ok_or_else(|| SchemaError::unexpected("type", raw_type))?;
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
        let bit_length = parse_bit_length(props, core, ctx, scope, ty.is_var(), length * 8)?;
        let ser_offset = match props.single("serOffset")? {
            Some(s) => parse_int(s).ok_or_else(|| SchemaError::unexpected("serOffset", s))?,
            None => 0,
        };
        let scaling = match props.single("scaling")? {
            Some(s) => parse_scaling(s).ok_or_else(|| SchemaError::unexpected("scaling", s))?,
            None => (1, 1),
        };
        let display_decimals = match props.single("displayDecimals")? {
            Some(s) => parse_usize(s).ok_or_else(|| SchemaError::unexpected("displayDecimals", s))?,
            None => 0,
        };

        let mut field = IntField {
            ty,
            endian: parse_endian(props, ctx.endian)?,
            length,
            bit_length,
            ser_offset,
            default_value: 0,
            scaling,
            units: props.single("units")?.map(str::to_string),
            display_decimals,
            valid_ranges: Vec::new(),
            specials: parse_specials(elem, core, ctx, parse_int)?,
        };
        if field.offset_range().is_none() {
            return Err(SchemaError::invalid(
                &core.name,
                format!("serialisation offset {} is too large", ser_offset),
            ));
        }
        let type_range = field.type_range();
        let wire_range = field.serialisable_range();

        for special in &field.specials {
            check_int_value(core, "special value", special.value, type_range, wire_range, ctx)?;
        }
        if let Some(s) = props.single("defaultValue")? {
            let value = field
                .value_of(s)
                .ok_or_else(|| SchemaError::unexpected("defaultValue", s))?;
            check_int_value(core, "default value", value, type_range, wire_range, ctx)?;
            field.default_value = value;
        }
        field.valid_ranges = field.parse_valid_ranges(props, core, ctx)?;
        Ok(field)
    }

    /// Number literal or the name of a special value.
    fn value_of(&self, s: &str) -> Option<i128> {
        parse_int(s).or_else(|| self.special(s).map(|sp| sp.value))
    }

    fn parse_valid_ranges(
        &self,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Vec<(i128, i128)>, SchemaError> {
        let (type_min, type_max) = self.type_range();
        let mut ranges = Vec::new();
        let value = |key: &str, s: &str| self.value_of(s).ok_or_else(|| SchemaError::unexpected(key, s));
        for s in props.all("validRange") {
            let (min, max) = parse_range(s).ok_or_else(|| SchemaError::unexpected("validRange", s))?;
            ranges.push((value("validRange", min)?, value("validRange", max)?));
        }
        for s in props.all("validValue") {
            let v = value("validValue", s)?;
            ranges.push((v, v));
        }
        for s in props.all("validMin") {
            ranges.push((value("validMin", s)?, type_max));
        }
        for s in props.all("validMax") {
            ranges.push((type_min, value("validMax", s)?));
        }
        if let Some(s) = props.single("validFullRange")? {
            if parse_bool(s).ok_or_else(|| SchemaError::unexpected("validFullRange", s))? {
                ranges.push((type_min, type_max));
            }
        }
        let wire_range = self.serialisable_range();
        for &(min, max) in &ranges {
            if max < min {
                return Err(SchemaError::invalid(
                    &core.name,
                    format!("valid range [{}, {}] is reversed", min, max),
                ));
            }
            check_int_value(core, "valid range bound", min, (type_min, type_max), wire_range, ctx)?;
            check_int_value(core, "valid range bound", max, (type_min, type_max), wire_range, ctx)?;
        }
        Ok(ranges)
    }

    pub fn type_range(&self) -> (i128, i128) {
        self.ty.range()
    }

    /// Values whose serialised form (after `serOffset`) fits the declared length or
    /// bit length.
    pub fn serialisable_range(&self) -> (i128, i128) {
        self.offset_range().unwrap_or((i128::MIN, i128::MAX))
    }

    fn offset_range(&self) -> Option<(i128, i128)> {
        let bits = if self.bit_length < self.length * 8 {
            self.bit_length
        } else {
            self.ty.value_bits(self.length)
        };
        let (min, max) = bits_range(self.ty.is_signed(), bits);
        Some((min.checked_sub(self.ser_offset)?, max.checked_sub(self.ser_offset)?))
    }

    pub fn special(&self, name: &str) -> Option<&Special<i128>> {
        self.specials.iter().find(|s| s.name == name)
    }

    /// Values accepted by the declared valid ranges; everything when none is declared.
    pub fn is_valid_value(&self, value: i128) -> bool {
        self.valid_ranges.is_empty()
            || self
                .valid_ranges
                .iter()
                .any(|&(min, max)| min <= value && value <= max)
    }

    pub fn min_length(&self) -> usize {
        if self.ty.is_var() {
            1
        } else {
            self.length
        }
    }

    pub fn max_length(&self) -> usize {
        self.length
    }
}
