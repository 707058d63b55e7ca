//! Floating point fields.

use super::int::{parse_specials, Special};
use super::{parse_endian, FieldCore, ParseContext};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::{parse_bool, parse_float, parse_range};
use crate::schema::Endian;

pub(crate) const PROPS: &[&str] = &[
    "type",
    "endian",
    "defaultValue",
    "validRange",
    "validValue",
    "validMin",
    "validMax",
    "validFullRange",
    "units",
    "displayDecimals",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatType {
    Float,
    Double,
}

impl FloatType {
    pub fn length(self) -> usize {
        match self {
            FloatType::Float => 4,
            FloatType::Double => 8,
        }
    }

    fn fits(self, value: f64) -> bool {
        match self {
            FloatType::Float => !value.is_finite() || value.abs() <= f64::from(f32::MAX),
            FloatType::Double => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatField {
    pub ty: FloatType,
    pub endian: Endian,
    pub default_value: f64,
    pub valid_ranges: Vec<(f64, f64)>,
    pub specials: Vec<Special<f64>>,
    pub units: Option<String>,
}

impl FloatField {
    pub(crate) fn parse(
        elem: &Element,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Self, SchemaError> {
        let raw_type = props.required("type")?;
        let ty = match raw_type {
            "float" => FloatType::Float,
            "double" => FloatType::Double,
            other => return Err(SchemaError::unexpected("type", other)),
        };
        let mut field = FloatField {
            ty,
            endian: parse_endian(props, ctx.endian)?,
            default_value: 0.0,
            valid_ranges: Vec::new(),
            specials: parse_specials(elem, core, ctx, parse_float)?,
            units: props.single("units")?.map(str::to_string),
        };
        for special in &field.specials {
            field.check(core, special.value)?;
        }
        if let Some(s) = props.single("defaultValue")? {
            let value = field
                .value_of(s)
                .ok_or_else(|| SchemaError::unexpected("defaultValue", s))?;
            field.check(core, value)?;
            field.default_value = value;
        }

        let value = |key: &str, s: &str| field.value_of(s).ok_or_else(|| SchemaError::unexpected(key, s));
        let mut ranges = Vec::new();
        for s in props.all("validRange") {
            let (min, max) = parse_range(s).ok_or_else(|| SchemaError::unexpected("validRange", s))?;
            ranges.push((value("validRange", min)?, value("validRange", max)?));
        }
        for s in props.all("validValue") {
            let v = value("validValue", s)?;
            ranges.push((v, v));
        }
        for s in props.all("validMin") {
            ranges.push((value("validMin", s)?, f64::INFINITY));
        }
        for s in props.all("validMax") {
            ranges.push((f64::NEG_INFINITY, value("validMax", s)?));
        }
        if let Some(s) = props.single("validFullRange")? {
            if parse_bool(s).ok_or_else(|| SchemaError::unexpected("validFullRange", s))? {
                ranges.push((f64::NEG_INFINITY, f64::INFINITY));
            }
        }
        for &(min, max) in &ranges {
            // nan is only valid as a single value
            if min.is_nan() != max.is_nan() || max < min {
                return Err(SchemaError::invalid(
                    &core.name,
                    format!("invalid valid range [{}, {}]", min, max),
                ));
            }
            field.check(core, min)?;
            field.check(core, max)?;
        }
        field.valid_ranges = ranges;
        Ok(field)
    }

    fn value_of(&self, s: &str) -> Option<f64> {
        parse_float(s).or_else(|| self.specials.iter().find(|sp| sp.name == s).map(|sp| sp.value))
    }

    fn check(&self, core: &FieldCore, value: f64) -> Result<(), SchemaError> {
        if self.ty.fits(value) {
            return Ok(());
        }
        Err(SchemaError::OutOfTypeRange {
            name: core.name.clone(),
            value: value.to_string(),
        })
    }

    pub fn is_valid_value(&self, value: f64) -> bool {
        if self.valid_ranges.is_empty() {
            return true;
        }
        self.valid_ranges.iter().any(|&(min, max)| {
            if value.is_nan() {
                min.is_nan()
            } else {
                min <= value && value <= max
            }
        })
    }
}
