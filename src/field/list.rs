//! Lists and the length/count prefixes shared with strings and data.

use super::{
    is_field_tag, sum_saturating, Field, FieldArena, FieldCore, FieldKind, FieldRef, ParseContext, Scope,
    Siblings, ValidateContext,
};
use crate::document::{Element, Props};
use crate::error::SchemaError;
use crate::literal::{is_valid_name, parse_bool, parse_usize};

pub(crate) const PROPS: &[&str] = &[
    "element",
    "count",
    "countPrefix",
    "lengthPrefix",
    "elemLengthPrefix",
    "elemFixedLength",
];

pub(crate) const CHILDREN: &[&str] = &[
    "element",
    "countPrefix",
    "lengthPrefix",
    "elemLengthPrefix",
    "int",
    "float",
    "enum",
    "bitfield",
    "bundle",
    "string",
    "data",
    "list",
    "ref",
    "optional",
    "variant",
    "set",
];

/// Where a count or length value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Prefix {
    /// Field defined inline, serialised right before the data.
    Inline(Box<Field>),
    /// Namespace-level field referenced by path.
    External(FieldRef),
    /// `$name`: a sibling field in the same parent.
    Detached(String),
}

impl Prefix {
    pub fn field<'a>(&'a self, arena: &'a FieldArena) -> Option<&'a Field> {
        match self {
            Prefix::Inline(f) => Some(f),
            Prefix::External(r) => r.field(arena),
            Prefix::Detached(_) => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Prefix::Detached(_))
    }

    /// Bytes the prefix itself adds; detached prefixes are serialised elsewhere.
    pub fn min_length(&self, arena: &FieldArena) -> usize {
        self.field(arena).map_or(0, |f| f.min_length(arena))
    }

    pub fn max_length(&self, arena: &FieldArena) -> usize {
        match self {
            Prefix::Detached(_) => 0,
            _ => self.field(arena).map_or(usize::MAX, |f| f.max_length(arena)),
        }
    }

    /// Largest count or length the prefix can carry; unbounded when it is unknown.
    pub fn max_value(&self, arena: &FieldArena) -> usize {
        self.field(arena)
            .and_then(|f| f.resolved(arena))
            .and_then(Field::as_int)
            .map_or(usize::MAX, |int| {
                usize::try_from(int.serialisable_range().1.max(0)).unwrap_or(usize::MAX)
            })
    }
}

/// Read the prefix called `key`: a `$sibling` or field path given as property, or a
/// single field declared inside a `<key>` child element.
pub(crate) fn parse_prefix(
    elem: &Element,
    props: &Props,
    key: &str,
    core: &FieldCore,
    ctx: &mut ParseContext<'_>,
) -> Result<Option<Prefix>, SchemaError> {
    let by_name = props.single(key)?;
    let mut wrappers = elem.children.iter().filter(|c| c.tag == key && !c.children.is_empty());
    let inline = match (wrappers.next(), wrappers.next()) {
        (Some(_), Some(_)) => return Err(SchemaError::DuplicateProperty(key.to_string())),
        (wrapper, _) => wrapper,
    };
    match (by_name, inline) {
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Err(SchemaError::PrefixConflict {
            name: core.name.clone(),
            reason: format!("\"{}\" is both referenced and defined inline", key),
        }),
        (Some(value), None) => named_prefix(key, value, elem.line).map(Some),
        (None, Some(wrapper)) => {
            let fields: Vec<&Element> = wrapper.children.iter().filter(|c| is_field_tag(&c.tag)).collect();
            let [field] = fields.as_slice() else {
                return Err(SchemaError::invalid(
                    &core.name,
                    format!("\"{}\" must contain exactly one field", key),
                ));
            };
            let field = Field::parse(field, ctx, Scope::member(core.window))?;
            Ok(Some(Prefix::Inline(Box::new(field))))
        }
    }
}

pub(super) fn named_prefix(key: &str, value: &str, line: usize) -> Result<Prefix, SchemaError> {
    match value.strip_prefix('$') {
        Some(name) if is_valid_name(name) => Ok(Prefix::Detached(name.to_string())),
        Some(_) => Err(SchemaError::unexpected(key, value)),
        None => Ok(Prefix::External(FieldRef::new(value, line)?)),
    }
}

/// Prefixes must carry an integral value; detached ones must name an existing sibling.
/// Sibling order is not checked: namespace siblings are kept sorted by name.
pub(crate) fn check_prefix(
    core: &FieldCore,
    key: &str,
    prefix: &Prefix,
    siblings: Siblings<'_>,
    cx: &mut ValidateContext<'_>,
) -> Result<(), SchemaError> {
    let source = match prefix {
        Prefix::Detached(name) => {
            if *name == core.name {
                return Err(SchemaError::PrefixConflict {
                    name: core.name.clone(),
                    reason: format!("\"{}\" refers to the field itself", key),
                });
            }
            siblings.find(name).ok_or_else(|| SchemaError::PrefixConflict {
                name: core.name.clone(),
                reason: format!("\"{}\" refers to unknown sibling \"{}\"", key, name),
            })?
        }
        Prefix::Inline(field) => {
            field.validate(Siblings::None, cx)?;
            field
        }
        // unresolved paths have already been reported
        Prefix::External(r) => match r.field(cx.arena) {
            Some(field) => field,
            None => return Ok(()),
        },
    };
    match source.resolved(cx.arena) {
        Some(field) if !matches!(field.kind, FieldKind::Int(_)) => Err(SchemaError::PrefixConflict {
            name: core.name.clone(),
            reason: format!("\"{}\" must be an integral field, not {}", key, field.kind_name()),
        }),
        _ => Ok(()),
    }
}

/// List element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ListElement {
    Inline(Box<Field>),
    Reference(FieldRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListField {
    pub element: ListElement,
    /// Fixed number of elements.
    pub count: Option<usize>,
    pub count_prefix: Option<Prefix>,
    pub length_prefix: Option<Prefix>,
    pub elem_length_prefix: Option<Prefix>,
    /// All elements share one length, serialised once before the first of them.
    pub elem_fixed_length: bool,
}

impl ListField {
    pub(crate) fn parse(
        elem: &Element,
        props: &Props,
        core: &FieldCore,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Self, SchemaError> {
        let element = parse_element(elem, props, core, ctx)?;
        let count = match props.single("count")? {
            Some(s) => Some(
                parse_usize(s)
                    .filter(|n| *n > 0)
                    .ok_or_else(|| SchemaError::unexpected("count", s))?,
            ),
            None => None,
        };
        let count_prefix = parse_prefix(elem, props, "countPrefix", core, ctx)?;
        let length_prefix = parse_prefix(elem, props, "lengthPrefix", core, ctx)?;
        let elem_length_prefix = parse_prefix(elem, props, "elemLengthPrefix", core, ctx)?;
        let elem_fixed_length = match props.single("elemFixedLength")? {
            Some(s) => parse_bool(s).ok_or_else(|| SchemaError::unexpected("elemFixedLength", s))?,
            None => false,
        };

        let conflict = |reason: &str| SchemaError::PrefixConflict {
            name: core.name.clone(),
            reason: reason.to_string(),
        };
        if count.is_some() && count_prefix.is_some() {
            return Err(conflict("\"count\" and \"countPrefix\" cannot be used together"));
        }
        if count.is_some() && length_prefix.is_some() {
            return Err(conflict("\"count\" and \"lengthPrefix\" cannot be used together"));
        }
        if count_prefix.is_some() && length_prefix.is_some() {
            return Err(conflict("\"countPrefix\" and \"lengthPrefix\" cannot be used together"));
        }
        if elem_fixed_length && elem_length_prefix.is_none() {
            return Err(conflict("\"elemFixedLength\" requires \"elemLengthPrefix\""));
        }

        Ok(ListField {
            element,
            count,
            count_prefix,
            length_prefix,
            elem_length_prefix,
            elem_fixed_length,
        })
    }

    pub fn element_field<'a>(&'a self, arena: &'a FieldArena) -> Option<&'a Field> {
        match &self.element {
            ListElement::Inline(f) => Some(f),
            ListElement::Reference(r) => r.field(arena),
        }
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &Prefix> {
        [&self.count_prefix, &self.length_prefix, &self.elem_length_prefix]
            .into_iter()
            .flatten()
    }

    pub(crate) fn prefixes_mut(&mut self) -> impl Iterator<Item = &mut Prefix> {
        [&mut self.count_prefix, &mut self.length_prefix, &mut self.elem_length_prefix]
            .into_iter()
            .flatten()
    }

    /// Bounds of one element including its own length prefix.
    fn element_bounds(&self, arena: &FieldArena) -> (usize, usize) {
        let (min, max) = self
            .element_field(arena)
            .map_or((0, usize::MAX), |f| (f.min_length(arena), f.max_length(arena)));
        match &self.elem_length_prefix {
            Some(p) if !self.elem_fixed_length => (
                min.saturating_add(p.min_length(arena)),
                max.saturating_add(p.max_length(arena)),
            ),
            _ => (min, max),
        }
    }

    fn shared_prefix(&self, arena: &FieldArena) -> (usize, usize) {
        match &self.elem_length_prefix {
            Some(p) if self.elem_fixed_length => (p.min_length(arena), p.max_length(arena)),
            _ => (0, 0),
        }
    }

    pub fn min_length(&self, arena: &FieldArena) -> usize {
        if let Some(count) = self.count {
            let (elem_min, _) = self.element_bounds(arena);
            return sum_saturating([self.shared_prefix(arena).0, count.saturating_mul(elem_min)]);
        }
        self.count_prefix
            .as_ref()
            .or(self.length_prefix.as_ref())
            .map_or(0, |p| p.min_length(arena))
    }

    pub fn max_length(&self, arena: &FieldArena) -> usize {
        let (_, elem_max) = self.element_bounds(arena);
        let shared = self.shared_prefix(arena).1;
        if let Some(count) = self.count {
            return sum_saturating([shared, count.saturating_mul(elem_max)]);
        }
        if let Some(p) = &self.count_prefix {
            return sum_saturating([
                p.max_length(arena),
                shared,
                p.max_value(arena).saturating_mul(elem_max),
            ]);
        }
        if let Some(p) = &self.length_prefix {
            return sum_saturating([p.max_length(arena), p.max_value(arena)]);
        }
        usize::MAX
    }

    pub(crate) fn validate(
        &self,
        core: &FieldCore,
        siblings: Siblings<'_>,
        cx: &mut ValidateContext<'_>,
    ) -> Result<(), SchemaError> {
        if let ListElement::Inline(field) = &self.element {
            field.validate(Siblings::None, cx)?;
        }
        for (key, prefix) in [
            ("countPrefix", &self.count_prefix),
            ("lengthPrefix", &self.length_prefix),
            ("elemLengthPrefix", &self.elem_length_prefix),
        ] {
            if let Some(prefix) = prefix {
                check_prefix(core, key, prefix, siblings, cx)?;
            }
        }
        Ok(())
    }
}

fn parse_element(
    elem: &Element,
    props: &Props,
    core: &FieldCore,
    ctx: &mut ParseContext<'_>,
) -> Result<ListElement, SchemaError> {
    let by_name = props.single("element")?;
    let mut inline: Vec<&Element> = elem.children.iter().filter(|c| is_field_tag(&c.tag)).collect();
    for wrapper in elem.children_named("element").filter(|c| !c.children.is_empty()) {
        inline.extend(wrapper.children.iter().filter(|c| is_field_tag(&c.tag)));
    }
    match (by_name, inline.as_slice()) {
        (Some(path), []) => Ok(ListElement::Reference(FieldRef::new(path, elem.line)?)),
        (None, [field]) => {
            let field = Field::parse(field, ctx, Scope::member(core.window))?;
            Ok(ListElement::Inline(Box::new(field)))
        }
        (None, []) => Err(SchemaError::MissingProperty("element".to_string())),
        _ => Err(SchemaError::invalid(&core.name, "list element must be defined exactly once")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::field::test_support::parse;

    fn list() -> Element {
        Element::new("list")
            .with_attr("name", "L")
            .with_child(Element::new("int").with_attr("name", "e").with_attr("type", "uint16"))
    }

    fn inline_prefix(key: &str) -> Element {
        Element::new(key).with_child(Element::new("int").with_attr("name", "n").with_attr("type", "uint8"))
    }

    #[test]
    fn fixed_count_lengths() {
        let (res, _) = parse(&list().with_attr("count", "3"));
        let f = res.expect("list");
        let arena = FieldArena::default();
        assert_eq!(f.min_length(&arena), 6);
        assert_eq!(f.max_length(&arena), 6);
    }

    #[test]
    fn inline_count_prefix_bounds() {
        let (res, _) = parse(&list().with_child(inline_prefix("countPrefix")));
        let f = res.expect("list");
        let arena = FieldArena::default();
        assert_eq!(f.min_length(&arena), 1);
        assert_eq!(f.max_length(&arena), 1 + 255 * 2);
        assert!(matches!(f.as_list().and_then(|l| l.count_prefix.as_ref()), Some(Prefix::Inline(_))));
    }

    #[test]
    fn detached_and_external_prefixes() {
        let (res, _) = parse(&list().with_attr("countPrefix", "$num"));
        let f = res.expect("list");
        let l = f.as_list().expect("list");
        assert_eq!(l.count_prefix, Some(Prefix::Detached("num".to_string())));
        assert_eq!(f.max_length(&FieldArena::default()), usize::MAX);

        let (res, _) = parse(&list().with_attr("lengthPrefix", "ns.Len"));
        let f = res.expect("list");
        assert!(matches!(
            f.as_list().and_then(|l| l.length_prefix.as_ref()),
            Some(Prefix::External(r)) if r.path() == "ns.Len"
        ));
    }

    #[test]
    fn referenced_and_inline_prefix_conflict() {
        let elem = list().with_attr("countPrefix", "$num").with_child(inline_prefix("countPrefix"));
        let (res, _) = parse(&elem);
        assert!(matches!(res, Err(SchemaError::PrefixConflict { .. })));
    }

    #[test]
    fn mutually_exclusive_sizing() {
        let (res, _) = parse(&list().with_attr("count", "2").with_attr("countPrefix", "$num"));
        assert!(matches!(res, Err(SchemaError::PrefixConflict { .. })));
        let (res, _) = parse(&list().with_attr("countPrefix", "$a").with_attr("lengthPrefix", "$b"));
        assert!(matches!(res, Err(SchemaError::PrefixConflict { .. })));
        let (res, _) = parse(&list().with_attr("elemFixedLength", "true"));
        assert!(matches!(res, Err(SchemaError::PrefixConflict { .. })));
    }

    #[test]
    fn element_must_be_defined_once() {
        let (res, _) = parse(&Element::new("list").with_attr("name", "L"));
        assert!(matches!(res, Err(SchemaError::MissingProperty(p)) if p == "element"));
        let (res, _) = parse(&list().with_attr("element", "ns.E"));
        assert!(matches!(res, Err(SchemaError::Invalid { .. })));
        let wrapped = Element::new("list")
            .with_attr("name", "L")
            .with_child(Element::new("element").with_child(Element::new("int").with_attr("name", "e").with_attr("type", "uint8")));
        let (res, diag) = parse(&wrapped);
        assert!(res.is_ok());
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn detached_prefix_must_name_integral_sibling() {
        let (num, _) = parse(&Element::new("int").with_attr("name", "num").with_attr("type", "uint8"));
        let (text, _) = parse(&Element::new("string").with_attr("name", "text"));
        let (l, _) = parse(&list().with_attr("countPrefix", "$num"));
        let (bad, _) = parse(&list().with_attr("countPrefix", "$text"));
        let (missing, _) = parse(&list().with_attr("countPrefix", "$nope"));
        let siblings = vec![num.expect("num"), text.expect("text")];
        let arena = FieldArena::default();
        let mut diag = Diagnostics::new();
        let mut cx = ValidateContext {
            arena: &arena,
            diag: &mut diag,
            version_dependent_code: false,
        };
        let sib = Siblings::List(&siblings);
        assert!(l.expect("list").validate(sib, &mut cx).is_ok());
        assert!(matches!(bad.expect("list").validate(sib, &mut cx), Err(SchemaError::PrefixConflict { .. })));
        assert!(matches!(missing.expect("list").validate(sib, &mut cx), Err(SchemaError::PrefixConflict { .. })));
    }
}
