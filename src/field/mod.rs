//! Field model: the closed set of field kinds, their shared core, and the arena that
//! owns namespace-level fields.
//!
//! Fields are built in two passes. [`Field::parse`] turns one element into a field and
//! records every cross reference as an unbound [`FieldRef`]; once all documents are in,
//! the schema binds each reference to a [`FieldId`] in the [`FieldArena`] and runs the
//! checks that need the populated tree.

mod bitfield;
mod bundle;
mod data;
mod enumeration;
mod float;
mod int;
mod list;
mod optional;
mod reference;
mod set;
mod string;
mod variant;

pub use bitfield::BitfieldField;
pub use bundle::BundleField;
pub use data::DataField;
pub use enumeration::{EnumField, EnumValue};
pub use float::{FloatField, FloatType};
pub use int::{IntField, IntType, Special};
pub use list::{ListElement, ListField, Prefix};
pub use optional::{OptionalField, OptionalMode};
pub use reference::RefField;
pub use set::{SetBit, SetField};
pub use string::StringField;
pub use variant::VariantField;

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::alias::Alias;
use crate::diag::Diagnostics;
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::{is_valid_name, is_valid_ref, parse_usize};
use crate::schema::Endian;
use crate::version::VersionWindow;

/// Element tags that declare a field.
pub const FIELD_TAGS: &[&str] = &[
    "int", "float", "enum", "bitfield", "bundle", "string", "data", "list", "ref", "optional",
    "variant", "set",
];

const COMMON_PROPS: &[&str] = &[
    "name",
    "displayName",
    "description",
    "sinceVersion",
    "deprecated",
    "semanticType",
    "reuse",
];

pub fn is_field_tag(tag: &str) -> bool {
    FIELD_TAGS.contains(&tag)
}

fn kind_props(tag: &str) -> Option<&'static [&'static str]> {
    let props = match tag {
        "int" => int::PROPS,
        "float" => float::PROPS,
        "enum" => enumeration::PROPS,
        "bitfield" => bitfield::PROPS,
        "bundle" => bundle::PROPS,
        "string" => string::PROPS,
        "data" => data::PROPS,
        "list" => list::PROPS,
        "ref" => reference::PROPS,
        "optional" => optional::PROPS,
        "variant" => variant::PROPS,
        "set" => set::PROPS,
        _ => return None,
    };
    Some(props)
}

fn kind_children(tag: &str) -> &'static [&'static str] {
    match tag {
        "int" | "float" => int::CHILDREN,
        "enum" => enumeration::CHILDREN,
        "set" => set::CHILDREN,
        "bitfield" => bitfield::CHILDREN,
        "bundle" | "variant" => bundle::CHILDREN,
        "list" => list::CHILDREN,
        _ => &[],
    }
}

/// Every property name understood by a field element of the given tag.
pub(crate) fn prop_names(tag: &str) -> Option<Vec<&'static str>> {
    kind_props(tag).map(|props| COMMON_PROPS.iter().chain(props).copied().collect())
}

/// Semantic role of a field, independent of its wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemanticType {
    #[default]
    None,
    Version,
    MessageId,
    Length,
}

impl SemanticType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "none" => Some(SemanticType::None),
            "version" => Some(SemanticType::Version),
            "messageId" => Some(SemanticType::MessageId),
            "length" => Some(SemanticType::Length),
            _ => None,
        }
    }
}

/// Attributes shared by every field kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCore {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub window: VersionWindow,
    /// Dotted path from the schema root; empty for fields nested in other elements.
    pub external_ref: String,
    pub semantic_type: SemanticType,
    pub line: usize,
}

impl FieldCore {
    fn parse(
        elem: &Element,
        props: &Props,
        ctx: &ParseContext<'_>,
        scope: Scope,
    ) -> Result<Self, SchemaError> {
        let name = match props.single("name")? {
            Some(n) if is_valid_name(n) => n.to_string(),
            Some(n) => return Err(SchemaError::InvalidName(n.to_string())),
            // A nested ref takes the name of its target.
            None if elem.tag == "ref" && !scope.top_level => String::new(),
            None => return Err(SchemaError::MissingProperty("name".to_string())),
        };
        let semantic_type = match props.single("semanticType")? {
            Some(s) => SemanticType::parse(s).ok_or_else(|| SchemaError::unexpected("semanticType", s))?,
            None => SemanticType::None,
        };
        let window = VersionWindow::parse(&name, props, scope.parent, ctx.schema_version)?;
        let external_ref = if scope.top_level {
            ctx.external_ref(&name)
        } else {
            String::new()
        };
        Ok(FieldCore {
            display_name: props.single("displayName")?.unwrap_or_default().to_string(),
            description: props.single("description")?.unwrap_or_default().to_string(),
            name,
            window,
            external_ref,
            semantic_type,
            line: elem.line,
        })
    }
}

/// The closed set of field kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int(IntField),
    Float(FloatField),
    Enum(EnumField),
    Bitfield(BitfieldField),
    Bundle(BundleField),
    String(StringField),
    Data(DataField),
    List(ListField),
    Ref(RefField),
    Optional(OptionalField),
    Variant(VariantField),
    Set(SetField),
}

/// Stable index of a namespace-level field in the [`FieldArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owner of every namespace-level field; namespaces and references hold [`FieldId`]s.
#[derive(Debug, Clone, Default)]
pub struct FieldArena {
    fields: Vec<Field>,
}

impl FieldArena {
    /// Panics if `id` was not issued by this arena.
    pub fn get(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn try_get(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &Field)> {
        self.fields.iter().enumerate().map(|(i, f)| (FieldId(i), f))
    }

    pub(crate) fn push(&mut self, field: Field) -> FieldId {
        self.fields.push(field);
        FieldId(self.fields.len() - 1)
    }

    pub(crate) fn get_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.get_mut(id.0)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.iter_mut()
    }

    /// Run `f` on every field while giving it read access to the rest of the arena.
    /// The field being updated is swapped out for the duration of the call.
    pub(crate) fn update_each(&mut self, mut f: impl FnMut(&mut Field, &FieldArena)) {
        for i in 0..self.fields.len() {
            let mut field = std::mem::replace(&mut self.fields[i], Field::placeholder());
            f(&mut field, self);
            self.fields[i] = field;
        }
    }
}

/// Cross reference by dotted path, bound to an arena slot after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    path: String,
    target: Option<FieldId>,
    line: usize,
}

impl FieldRef {
    pub(crate) fn new(path: &str, line: usize) -> Result<Self, SchemaError> {
        if !is_valid_ref(path) {
            return Err(SchemaError::InvalidName(path.to_string()));
        }
        Ok(FieldRef {
            path: path.to_string(),
            target: None,
            line,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn target(&self) -> Option<FieldId> {
        self.target
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn field<'a>(&self, arena: &'a FieldArena) -> Option<&'a Field> {
        self.target.and_then(|id| arena.try_get(id))
    }

    pub(crate) fn bind(&mut self, target: Option<FieldId>) {
        self.target = target;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub core: FieldCore,
    pub kind: FieldKind,
}

macro_rules! kind_accessor {
    ($($fn_name:ident => $variant:ident($ty:ty)),* $(,)?) => {
        $(
            pub fn $fn_name(&self) -> Option<&$ty> {
                match &self.kind {
                    FieldKind::$variant(f) => Some(f),
                    _ => None,
                }
            }
        )*
    };
}

impl Field {
    /// Parse a field element, applying `reuse` inheritance first.
    pub(crate) fn parse(elem: &Element, ctx: &mut ParseContext<'_>, scope: Scope) -> Result<Field, SchemaError> {
        let elem = ctx.resolve_reuse(elem)?;
        Field::parse_merged(&elem, ctx, scope)
    }

    /// Parse a field element whose `reuse` base has already been merged in.
    pub(crate) fn parse_merged(
        elem: &Element,
        ctx: &mut ParseContext<'_>,
        scope: Scope,
    ) -> Result<Field, SchemaError> {
        let names = prop_names(&elem.tag).ok_or_else(|| SchemaError::UnknownFieldKind(elem.tag.clone()))?;
        let props = elem.props(&names);
        let core = FieldCore::parse(elem, &props, ctx, scope)?;
        let kind = match elem.tag.as_str() {
            "int" => FieldKind::Int(IntField::parse(elem, &props, &core, ctx, scope)?),
            "float" => FieldKind::Float(FloatField::parse(elem, &props, &core, ctx)?),
            "enum" => FieldKind::Enum(EnumField::parse(elem, &props, &core, ctx, scope)?),
            "bitfield" => FieldKind::Bitfield(BitfieldField::parse(elem, &props, &core, ctx)?),
            "bundle" => FieldKind::Bundle(BundleField::parse(elem, &core, ctx)?),
            "string" => FieldKind::String(StringField::parse(elem, &props, &core)?),
            "data" => FieldKind::Data(DataField::parse(elem, &props, &core)?),
            "list" => FieldKind::List(ListField::parse(elem, &props, &core, ctx)?),
            "ref" => FieldKind::Ref(RefField::parse(&props, &core, ctx, scope)?),
            "optional" => FieldKind::Optional(OptionalField::parse(&props, &core)?),
            "variant" => FieldKind::Variant(VariantField::parse(elem, &props, &core, ctx)?),
            "set" => FieldKind::Set(SetField::parse(elem, &props, &core, ctx, scope)?),
            other => return Err(SchemaError::UnknownFieldKind(other.to_string())),
        };
        let field = Field { core, kind };
        field.check_semantic_type()?;
        ctx.warn_unknown(elem, &props, &names, kind_children(&elem.tag));
        Ok(field)
    }

    fn placeholder() -> Field {
        Field {
            core: FieldCore::default(),
            kind: FieldKind::Bundle(BundleField::default()),
        }
    }

    /// A `ref` is checked again against its target once references are bound.
    fn check_semantic_type(&self) -> Result<(), SchemaError> {
        let ok = matches!(self.kind, FieldKind::Ref(_)) || self.fits_semantic_type(self.core.semantic_type);
        if ok {
            return Ok(());
        }
        Err(self.semantic_type_mismatch(self))
    }

    fn fits_semantic_type(&self, semantic_type: SemanticType) -> bool {
        match semantic_type {
            SemanticType::None => true,
            SemanticType::Version | SemanticType::Length => matches!(self.kind, FieldKind::Int(_)),
            SemanticType::MessageId => matches!(self.kind, FieldKind::Enum(_)),
        }
    }

    fn semantic_type_mismatch(&self, target: &Field) -> SchemaError {
        SchemaError::invalid(
            &self.core.name,
            format!(
                "semantic type {:?} is not applicable to {} fields",
                self.core.semantic_type,
                target.kind_name()
            ),
        )
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn display_name(&self) -> &str {
        &self.core.display_name
    }

    pub fn external_ref(&self) -> &str {
        &self.core.external_ref
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.core.semantic_type
    }

    pub fn window(&self) -> VersionWindow {
        self.core.window
    }

    pub fn does_exist(&self, version: u32) -> bool {
        self.core.window.does_exist(version)
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            FieldKind::Int(_) => "int",
            FieldKind::Float(_) => "float",
            FieldKind::Enum(_) => "enum",
            FieldKind::Bitfield(_) => "bitfield",
            FieldKind::Bundle(_) => "bundle",
            FieldKind::String(_) => "string",
            FieldKind::Data(_) => "data",
            FieldKind::List(_) => "list",
            FieldKind::Ref(_) => "ref",
            FieldKind::Optional(_) => "optional",
            FieldKind::Variant(_) => "variant",
            FieldKind::Set(_) => "set",
        }
    }

    kind_accessor! {
        as_int => Int(IntField),
        as_float => Float(FloatField),
        as_enum => Enum(EnumField),
        as_bitfield => Bitfield(BitfieldField),
        as_bundle => Bundle(BundleField),
        as_string => String(StringField),
        as_data => Data(DataField),
        as_list => List(ListField),
        as_ref => Ref(RefField),
        as_optional => Optional(OptionalField),
        as_variant => Variant(VariantField),
        as_set => Set(SetField),
    }

    /// Follow `ref` indirections to the field that defines the wire shape.
    pub fn resolved<'a>(&'a self, arena: &'a FieldArena) -> Option<&'a Field> {
        let mut current = self;
        for _ in 0..=arena.len() {
            match &current.kind {
                FieldKind::Ref(r) => current = r.target.field(arena)?,
                _ => return Some(current),
            }
        }
        None
    }

    /// Minimal serialised length in bytes.
    pub fn min_length(&self, arena: &FieldArena) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.min_length(),
            FieldKind::Float(f) => f.ty.length(),
            FieldKind::Enum(f) => f.length,
            FieldKind::Bitfield(f) => f.length,
            FieldKind::Bundle(f) => f.min_length(arena),
            FieldKind::String(f) => f.min_length(arena),
            FieldKind::Data(f) => f.min_length(arena),
            FieldKind::List(f) => f.min_length(arena),
            FieldKind::Ref(f) => f.target.field(arena).map_or(0, |t| t.min_length(arena)),
            FieldKind::Optional(_) => 0,
            FieldKind::Variant(f) => f.min_length(arena),
            FieldKind::Set(f) => f.length,
        }
    }

    /// Maximal serialised length in bytes; `usize::MAX` means unbounded.
    pub fn max_length(&self, arena: &FieldArena) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.max_length(),
            FieldKind::Float(f) => f.ty.length(),
            FieldKind::Enum(f) => f.length,
            FieldKind::Bitfield(f) => f.length,
            FieldKind::Bundle(f) => f.max_length(arena),
            FieldKind::String(f) => f.max_length(arena),
            FieldKind::Data(f) => f.max_length(arena),
            FieldKind::List(f) => f.max_length(arena),
            FieldKind::Ref(f) => f.target.field(arena).map_or(usize::MAX, |t| t.max_length(arena)),
            FieldKind::Optional(f) => f.field.field(arena).map_or(usize::MAX, |t| t.max_length(arena)),
            FieldKind::Variant(f) => f.max_length(arena),
            FieldKind::Set(f) => f.length,
        }
    }

    /// Bits occupied inside a bitfield; full byte width for kinds that are not members.
    pub fn bit_length(&self) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.bit_length,
            FieldKind::Enum(f) => f.bit_length,
            FieldKind::Set(f) => f.bit_length,
            FieldKind::Float(f) => f.ty.length() * 8,
            FieldKind::Bitfield(f) => f.length * 8,
            FieldKind::Ref(f) => f.bit_length.unwrap_or(0),
            _ => 0,
        }
    }

    pub fn is_version_dependent(&self) -> bool {
        self.core.window.since > 0 || self.members().iter().any(Field::is_version_dependent)
    }

    /// Nested member fields of bundles, bitfields and variants.
    pub fn members(&self) -> &[Field] {
        match &self.kind {
            FieldKind::Bundle(f) => &f.members,
            FieldKind::Bitfield(f) => &f.members,
            FieldKind::Variant(f) => &f.members,
            _ => &[],
        }
    }

    fn members_mut(&mut self) -> Option<&mut Vec<Field>> {
        match &mut self.kind {
            FieldKind::Bundle(f) => Some(&mut f.members),
            FieldKind::Bitfield(f) => Some(&mut f.members),
            FieldKind::Variant(f) => Some(&mut f.members),
            _ => None,
        }
    }

    pub fn aliases(&self) -> &[Alias] {
        match &self.kind {
            FieldKind::Bundle(f) => &f.aliases,
            FieldKind::Variant(f) => &f.aliases,
            _ => &[],
        }
    }

    fn aliases_mut(&mut self) -> Option<&mut Vec<Alias>> {
        match &mut self.kind {
            FieldKind::Bundle(f) => Some(&mut f.aliases),
            FieldKind::Variant(f) => Some(&mut f.aliases),
            _ => None,
        }
    }

    /// Visit every reference held by this field and its inline sub-fields.
    pub fn for_each_ref(&self, f: &mut dyn FnMut(&FieldRef)) {
        match &self.kind {
            FieldKind::Bundle(b) => b.members.iter().for_each(|m| m.for_each_ref(f)),
            FieldKind::Bitfield(b) => b.members.iter().for_each(|m| m.for_each_ref(f)),
            FieldKind::Variant(v) => v.members.iter().for_each(|m| m.for_each_ref(f)),
            FieldKind::List(l) => {
                match &l.element {
                    ListElement::Inline(e) => e.for_each_ref(f),
                    ListElement::Reference(r) => f(r),
                }
                for prefix in l.prefixes() {
                    match prefix {
                        Prefix::Inline(p) => p.for_each_ref(f),
                        Prefix::External(r) => f(r),
                        Prefix::Detached(_) => {}
                    }
                }
            }
            FieldKind::String(s) => {
                if let Some(Prefix::External(r)) = &s.length_prefix {
                    f(r);
                }
            }
            FieldKind::Data(d) => {
                if let Some(Prefix::External(r)) = &d.length_prefix {
                    f(r);
                }
            }
            FieldKind::Ref(r) => f(&r.target),
            FieldKind::Optional(o) => f(&o.field),
            FieldKind::Int(_) | FieldKind::Float(_) | FieldKind::Enum(_) | FieldKind::Set(_) => {}
        }
    }

    pub(crate) fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut FieldRef)) {
        match &mut self.kind {
            FieldKind::Bundle(b) => b.members.iter_mut().for_each(|m| m.for_each_ref_mut(f)),
            FieldKind::Bitfield(b) => b.members.iter_mut().for_each(|m| m.for_each_ref_mut(f)),
            FieldKind::Variant(v) => v.members.iter_mut().for_each(|m| m.for_each_ref_mut(f)),
            FieldKind::List(l) => {
                match &mut l.element {
                    ListElement::Inline(e) => e.for_each_ref_mut(f),
                    ListElement::Reference(r) => f(r),
                }
                for prefix in l.prefixes_mut() {
                    match prefix {
                        Prefix::Inline(p) => p.for_each_ref_mut(f),
                        Prefix::External(r) => f(r),
                        Prefix::Detached(_) => {}
                    }
                }
            }
            FieldKind::String(s) => {
                if let Some(Prefix::External(r)) = &mut s.length_prefix {
                    f(r);
                }
            }
            FieldKind::Data(d) => {
                if let Some(Prefix::External(r)) = &mut d.length_prefix {
                    f(r);
                }
            }
            FieldKind::Ref(r) => f(&mut r.target),
            FieldKind::Optional(o) => f(&mut o.field),
            FieldKind::Int(_) | FieldKind::Float(_) | FieldKind::Enum(_) | FieldKind::Set(_) => {}
        }
    }

    /// Post-resolution fix-ups: refs without a local name take their target's name,
    /// aliases whose path does not lead to a member are dropped with a warning.
    pub(crate) fn finalize(&mut self, arena: &FieldArena, diag: &mut Diagnostics) {
        if let FieldKind::Ref(r) = &self.kind {
            if let Some(target) = r.target.field(arena) {
                if self.core.name.is_empty() {
                    self.core.name = target.core.name.clone();
                }
                if self.core.display_name.is_empty() {
                    self.core.display_name = target.core.display_name.clone();
                }
            }
        }
        if let Some(members) = self.members_mut() {
            members.iter_mut().for_each(|m| m.finalize(arena, diag));
        }
        if let FieldKind::List(l) = &mut self.kind {
            if let ListElement::Inline(e) = &mut l.element {
                e.finalize(arena, diag);
            }
            for prefix in l.prefixes_mut() {
                if let Prefix::Inline(p) = prefix {
                    p.finalize(arena, diag);
                }
            }
        }

        let Some(aliases) = self.aliases_mut().map(std::mem::take) else {
            return;
        };
        let mut kept = Vec::with_capacity(aliases.len());
        for alias in aliases {
            if crate::alias::resolve_alias_path(self, &alias.field_path, arena).is_some() {
                kept.push(alias);
            } else {
                diag.warning(
                    alias.line,
                    format!(
                        "\"{}\": alias \"{}\" refers to unknown member \"{}\", ignored",
                        self.core.name, alias.name, alias.field_path
                    ),
                );
            }
        }
        if let Some(slot) = self.aliases_mut() {
            *slot = kept;
        }
    }

    /// Checks that need resolved references and the sibling list.
    pub(crate) fn validate(&self, siblings: Siblings<'_>, cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
        if let FieldKind::Ref(r) = &self.kind {
            let target = r.target.field(cx.arena).and_then(|t| t.resolved(cx.arena));
            if let Some(target) = target {
                if !target.fits_semantic_type(self.core.semantic_type) {
                    return Err(self.semantic_type_mismatch(target));
                }
            }
        }
        match &self.kind {
            FieldKind::Bundle(b) => validate_members(&self.core, &b.members, cx),
            FieldKind::Bitfield(b) => b.validate(&self.core, cx),
            FieldKind::Variant(v) => v.validate(&self.core, cx),
            FieldKind::List(l) => l.validate(&self.core, siblings, cx),
            FieldKind::String(s) => match &s.length_prefix {
                Some(prefix) => list::check_prefix(&self.core, "lengthPrefix", prefix, siblings, cx),
                None => Ok(()),
            },
            FieldKind::Data(d) => match &d.length_prefix {
                Some(prefix) => list::check_prefix(&self.core, "lengthPrefix", prefix, siblings, cx),
                None => Ok(()),
            },
            FieldKind::Optional(o) => o.validate(&self.core, siblings),
            FieldKind::Int(_)
            | FieldKind::Float(_)
            | FieldKind::Enum(_)
            | FieldKind::Set(_)
            | FieldKind::Ref(_) => Ok(()),
        }
    }
}

/// Where a field looks up its siblings (detached prefixes, optional conditions).
#[derive(Clone, Copy)]
pub(crate) enum Siblings<'a> {
    None,
    List(&'a [Field]),
    Namespace(&'a [(String, FieldId)], &'a FieldArena),
}

impl<'a> Siblings<'a> {
    pub fn find(&self, name: &str) -> Option<&'a Field> {
        match *self {
            Siblings::None => None,
            Siblings::List(fields) => fields.iter().find(|f| f.core.name == name),
            Siblings::Namespace(index, arena) => index
                .binary_search_by(|(n, _)| n.as_str().cmp(name))
                .ok()
                .map(|pos| arena.get(index[pos].1)),
        }
    }
}

/// Parser state threaded through one document.
pub(crate) struct ParseContext<'a> {
    pub diag: &'a mut Diagnostics,
    /// Merged elements of namespace-level fields, by external reference, for `reuse`.
    pub reusable: &'a mut HashMap<String, Element>,
    pub schema_version: u32,
    pub endian: Endian,
    /// External reference of the namespace being populated; empty for the root.
    pub namespace: String,
}

impl ParseContext<'_> {
    pub fn external_ref(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.namespace, name)
        }
    }

    pub fn report(&mut self, line: usize, err: &SchemaError) {
        self.diag.error(line, err.to_string());
    }

    /// Apply `reuse="path"`: the element inherits the properties and child declarations
    /// of an earlier namespace-level field of the same kind.
    pub fn resolve_reuse<'e>(&self, elem: &'e Element) -> Result<Cow<'e, Element>, SchemaError> {
        let names = prop_names(&elem.tag).ok_or_else(|| SchemaError::UnknownFieldKind(elem.tag.clone()))?;
        let props = elem.props(&["reuse"]);
        let Some(path) = props.single("reuse")? else {
            return Ok(Cow::Borrowed(elem));
        };
        let owner = elem.attr("name").unwrap_or(&elem.tag);
        let base = self
            .reusable
            .get(&self.external_ref(path))
            .or_else(|| self.reusable.get(path))
            .ok_or_else(|| SchemaError::invalid(owner, format!("cannot find field \"{}\" to reuse", path)))?;
        if base.tag != elem.tag {
            return Err(SchemaError::invalid(
                owner,
                format!("reused field \"{}\" is <{}>, not <{}>", path, base.tag, elem.tag),
            ));
        }
        Ok(Cow::Owned(elem.inherit_from(base, &names)))
    }

    /// Warn about properties and child elements the element kind does not understand.
    pub fn warn_unknown(&mut self, elem: &Element, props: &Props, prop_names: &[&str], children: &[&str]) {
        for key in props.unknown(prop_names) {
            self.diag
                .warning(elem.line, format!("<{}>: unknown property \"{}\"", elem.tag, key));
        }
        for child in &elem.children {
            let tag = child.tag.as_str();
            if prop_names.contains(&tag) || children.contains(&tag) {
                continue;
            }
            self.diag
                .warning(child.line, format!("<{}>: unexpected child element <{}>", elem.tag, tag));
        }
    }
}

/// Position of the element being parsed within its parent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope {
    pub parent: VersionWindow,
    pub top_level: bool,
    pub in_bitfield: bool,
}

impl Scope {
    pub fn namespace() -> Self {
        Scope {
            parent: VersionWindow::default(),
            top_level: true,
            in_bitfield: false,
        }
    }

    pub fn member(parent: VersionWindow) -> Self {
        Scope {
            parent,
            top_level: false,
            in_bitfield: false,
        }
    }

    pub fn bitfield_member(parent: VersionWindow) -> Self {
        Scope {
            in_bitfield: true,
            ..Scope::member(parent)
        }
    }
}

/// State of the post-resolution validation pass.
pub(crate) struct ValidateContext<'a> {
    pub arena: &'a FieldArena,
    pub diag: &'a mut Diagnostics,
    pub version_dependent_code: bool,
}

/// Parse the fields of a composite element: the children of a `wrapper` element when
/// present, otherwise the field elements placed directly inside. Every failing field
/// is reported; the rest are still parsed.
pub(crate) fn parse_fields(
    elem: &Element,
    wrapper: &str,
    owner: &str,
    ctx: &mut ParseContext<'_>,
    scope: Scope,
) -> Result<Vec<Field>, SchemaError> {
    let mut wrappers = elem.children_named(wrapper);
    let container = match (wrappers.next(), wrappers.next()) {
        (Some(_), Some(_)) => return Err(SchemaError::DuplicateProperty(wrapper.to_string())),
        (Some(w), None) => w,
        (None, _) => elem,
    };
    let mut fields = Vec::new();
    let mut failed = false;
    for child in &container.children {
        if !is_field_tag(&child.tag) {
            if !std::ptr::eq(container, elem) {
                ctx.diag.warning(
                    child.line,
                    format!("<{}>: unexpected child element <{}>", wrapper, child.tag),
                );
            }
            continue;
        }
        match Field::parse(child, ctx, scope) {
            Ok(field) => fields.push(field),
            Err(e) => {
                ctx.report(child.line, &e);
                failed = true;
            }
        }
    }
    if failed {
        return Err(SchemaError::InvalidMembers(owner.to_string()));
    }
    Ok(fields)
}

/// Validate an ordered sibling list: unique names, then per-field checks.
/// Every failure is reported; returns `false` if any occurred.
pub(crate) fn validate_siblings(fields: &[Field], cx: &mut ValidateContext<'_>) -> bool {
    let mut ok = true;
    let mut seen: HashSet<&str> = HashSet::new();
    for field in fields {
        if !field.core.name.is_empty() && !seen.insert(field.core.name.as_str()) {
            let err = SchemaError::DuplicateName {
                kind: "field",
                name: field.core.name.clone(),
            };
            cx.diag.error(field.core.line, err.to_string());
            ok = false;
        }
        if let Err(e) = field.validate(Siblings::List(fields), cx) {
            cx.diag.error(field.core.line, e.to_string());
            ok = false;
        }
    }
    ok
}

fn validate_members(core: &FieldCore, members: &[Field], cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
    if validate_siblings(members, cx) {
        Ok(())
    } else {
        Err(SchemaError::InvalidMembers(core.name.clone()))
    }
}

pub(crate) fn parse_endian(props: &Props, default: Endian) -> Result<Endian, SchemaError> {
    match props.single("endian")? {
        Some(s) => Endian::parse(s).ok_or_else(|| SchemaError::unexpected("endian", s)),
        None => Ok(default),
    }
}

pub(crate) fn parse_flag(props: &Props, key: &str) -> Result<bool, SchemaError> {
    match props.single(key)? {
        Some(s) => crate::literal::parse_bool(s).ok_or_else(|| SchemaError::unexpected(key, s)),
        None => Ok(false),
    }
}

/// Read `bitLength` of an integral member. Outside a bitfield the property is ignored
/// with a warning; inside, variable length types are rejected.
pub(crate) fn parse_bit_length(
    props: &Props,
    core: &FieldCore,
    ctx: &mut ParseContext<'_>,
    scope: Scope,
    variable: bool,
    max_bits: usize,
) -> Result<usize, SchemaError> {
    if scope.in_bitfield && variable {
        return Err(SchemaError::VariableLengthMember(core.name.clone()));
    }
    let Some(s) = props.single("bitLength")? else {
        return Ok(max_bits);
    };
    if !scope.in_bitfield {
        ctx.diag.warning(
            core.line,
            format!("\"{}\": property \"bitLength\" is applicable only to bitfield members", core.name),
        );
        return Ok(max_bits);
    }
    let bits = parse_usize(s).ok_or_else(|| SchemaError::unexpected("bitLength", s))?;
    if bits == 0 || bits > max_bits {
        return Err(SchemaError::Length {
            name: core.name.clone(),
            reason: format!("bit length {} must be within 1..={}", bits, max_bits),
        });
    }
    Ok(bits)
}

/// Error when `value` falls outside the type range, warning when it only falls
/// outside the range the wire representation can carry.
pub(crate) fn check_int_value(
    core: &FieldCore,
    what: &str,
    value: i128,
    type_range: (i128, i128),
    wire_range: (i128, i128),
    ctx: &mut ParseContext<'_>,
) -> Result<(), SchemaError> {
    if value < type_range.0 || type_range.1 < value {
        return Err(SchemaError::OutOfTypeRange {
            name: core.name.clone(),
            value: value.to_string(),
        });
    }
    if value < wire_range.0 || wire_range.1 < value {
        ctx.diag.warning(
            core.line,
            format!(
                "\"{}\": {} {} cannot be serialised within [{}, {}]",
                core.name, what, value, wire_range.0, wire_range.1
            ),
        );
    }
    Ok(())
}

pub(crate) fn sum_saturating(values: impl IntoIterator<Item = usize>) -> usize {
    values.into_iter().fold(0, usize::saturating_add)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Parse one element in a throw-away context.
    pub fn parse_in(elem: &Element, scope: Scope) -> (Result<Field, SchemaError>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let mut reusable = HashMap::new();
        let result = {
            let mut ctx = ParseContext {
                diag: &mut diag,
                reusable: &mut reusable,
                schema_version: 5,
                endian: Endian::Big,
                namespace: String::new(),
            };
            Field::parse(elem, &mut ctx, scope)
        };
        (result, diag)
    }

    pub fn parse(elem: &Element) -> (Result<Field, SchemaError>, Diagnostics) {
        parse_in(elem, Scope::namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::parse;
    use super::*;

    #[test]
    fn unknown_kind_is_an_error() {
        let (res, _) = parse(&Element::new("widget").with_attr("name", "w"));
        assert!(matches!(res, Err(SchemaError::UnknownFieldKind(k)) if k == "widget"));
    }

    #[test]
    fn name_is_required_and_validated() {
        let (res, _) = parse(&Element::new("int").with_attr("type", "uint8"));
        assert!(matches!(res, Err(SchemaError::MissingProperty(p)) if p == "name"));
        let (res, _) = parse(&Element::new("int").with_attr("name", "1x").with_attr("type", "uint8"));
        assert!(matches!(res, Err(SchemaError::InvalidName(_))));
    }

    #[test]
    fn unknown_properties_warn() {
        let (res, diag) = parse(
            &Element::new("int")
                .with_attr("name", "x")
                .with_attr("type", "uint8")
                .with_attr("colour", "red")
                .with_child(Element::new("frobnicate")),
        );
        assert!(res.is_ok());
        assert_eq!(diag.warning_count(), 2);
        assert!(!diag.has_errors());
    }

    #[test]
    fn semantic_type_must_fit_the_kind() {
        let (res, _) = parse(
            &Element::new("int")
                .with_attr("name", "v")
                .with_attr("type", "uint8")
                .with_attr("semanticType", "version"),
        );
        assert_eq!(res.expect("int").semantic_type(), SemanticType::Version);
        let (res, _) = parse(
            &Element::new("int")
                .with_attr("name", "id")
                .with_attr("type", "uint8")
                .with_attr("semanticType", "messageId"),
        );
        assert!(matches!(res, Err(SchemaError::Invalid { .. })));
    }

    #[test]
    fn top_level_fields_carry_external_reference() {
        let (res, _) = parse(&Element::new("int").with_attr("name", "len").with_attr("type", "uint8"));
        assert_eq!(res.expect("int").external_ref(), "len");
    }

    #[test]
    fn siblings_lookup_in_namespace_index() {
        let mut arena = FieldArena::default();
        let (field, _) = parse(&Element::new("int").with_attr("name", "len").with_attr("type", "uint8"));
        let id = arena.push(field.expect("int"));
        let index = vec![("len".to_string(), id)];
        let siblings = Siblings::Namespace(&index, &arena);
        assert_eq!(siblings.find("len").map(Field::name), Some("len"));
        assert!(siblings.find("other").is_none());
    }

    #[test]
    fn saturating_sum_stops_at_max() {
        assert_eq!(sum_saturating([1, 2, 3]), 6);
        assert_eq!(sum_saturating([usize::MAX, 1]), usize::MAX);
    }
}
