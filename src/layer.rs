//! Transport framing: a frame is an ordered chain of layers, outermost first, that
//! wraps the message payload.

use crate::document::Element;
use crate::error::SchemaError;
use crate::field::{is_field_tag, Field, FieldArena, FieldKind, FieldRef, ParseContext, Scope, Siblings, ValidateContext};
use crate::literal::{is_valid_name, parse_bool};
use crate::namespace::SchemaScope;
use crate::version::VersionWindow;

pub const LAYER_TAGS: &[&str] = &["sync", "size", "id", "value", "checksum", "payload"];

const FRAME_PROPS: &[&str] = &["name", "description"];
const LAYER_PROPS: &[&str] = &["name", "description", "field"];
const VALUE_PROPS: &[&str] = &["interfaceFieldName", "pseudo"];
const CHECKSUM_PROPS: &[&str] = &["alg", "algName", "from", "until", "verifyBeforeRead"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumAlg {
    Sum,
    CrcCcitt,
    Crc16,
    Crc32,
    /// Implemented outside the protocol definition, identified by name.
    Custom(String),
}

impl ChecksumAlg {
    fn parse(alg: &str, alg_name: Option<&str>) -> Result<Self, SchemaError> {
        let alg = match alg {
            "sum" => ChecksumAlg::Sum,
            "crc-ccitt" => ChecksumAlg::CrcCcitt,
            "crc-16" => ChecksumAlg::Crc16,
            "crc-32" => ChecksumAlg::Crc32,
            "custom" => match alg_name {
                Some(name) if is_valid_name(name) => ChecksumAlg::Custom(name.to_string()),
                Some(name) => return Err(SchemaError::unexpected("algName", name)),
                None => return Err(SchemaError::MissingProperty("algName".to_string())),
            },
            other => return Err(SchemaError::unexpected("alg", other)),
        };
        Ok(alg)
    }
}

/// Which part of the frame a checksum covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumRange {
    /// From the named (earlier) layer up to the checksum.
    From(String),
    /// From the checksum up to the end of the named (later) layer.
    Until(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Sync,
    Size,
    Id,
    Value {
        interface_field_name: String,
        /// Not present on the wire, the value is supplied by the application.
        pseudo: bool,
    },
    Checksum {
        alg: ChecksumAlg,
        range: ChecksumRange,
        verify_before_read: bool,
    },
    Payload,
}

/// Field a layer reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerField {
    Inline(Box<Field>),
    Reference(FieldRef),
}

impl LayerField {
    pub fn field<'a>(&'a self, arena: &'a FieldArena) -> Option<&'a Field> {
        match self {
            LayerField::Inline(f) => Some(f),
            LayerField::Reference(r) => r.field(arena),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub description: String,
    pub kind: LayerKind,
    /// `None` only for the payload layer.
    pub field: Option<LayerField>,
    pub line: usize,
}

impl Layer {
    fn parse(elem: &Element, ctx: &mut ParseContext<'_>) -> Result<Layer, SchemaError> {
        let extra: &[&str] = match elem.tag.as_str() {
            "value" => VALUE_PROPS,
            "checksum" => CHECKSUM_PROPS,
            _ => &[],
        };
        let names: Vec<&str> = LAYER_PROPS.iter().chain(extra).copied().collect();
        let props = elem.props(&names);
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        let flag = |key: &str| -> Result<bool, SchemaError> {
            match props.single(key)? {
                Some(s) => parse_bool(s).ok_or_else(|| SchemaError::unexpected(key, s)),
                None => Ok(false),
            }
        };
        let kind = match elem.tag.as_str() {
            "sync" => LayerKind::Sync,
            "size" => LayerKind::Size,
            "id" => LayerKind::Id,
            "payload" => LayerKind::Payload,
            "value" => LayerKind::Value {
                interface_field_name: props.required("interfaceFieldName")?.to_string(),
                pseudo: flag("pseudo")?,
            },
            "checksum" => {
                let range = match (props.single("from")?, props.single("until")?) {
                    (Some(from), None) => ChecksumRange::From(from.to_string()),
                    (None, Some(until)) => ChecksumRange::Until(until.to_string()),
                    (None, None) => return Err(SchemaError::MissingProperty("from".to_string())),
                    (Some(_), Some(_)) => {
                        return Err(SchemaError::invalid(name, "\"from\" and \"until\" cannot be used together"))
                    }
                };
                LayerKind::Checksum {
                    alg: ChecksumAlg::parse(props.required("alg")?, props.single("algName")?)?,
                    range,
                    verify_before_read: flag("verifyBeforeRead")?,
                }
            }
            other => return Err(SchemaError::UnknownFieldKind(other.to_string())),
        };

        let field = Layer::parse_field(elem, name, props.single("field")?, ctx)?;
        match (&kind, &field) {
            (LayerKind::Payload, Some(_)) => {
                return Err(SchemaError::invalid(name, "payload layer cannot have a field"));
            }
            (LayerKind::Payload, None) | (_, Some(_)) => {}
            (_, None) => return Err(SchemaError::MissingProperty("field".to_string())),
        }

        for key in props.unknown(&names) {
            ctx.diag
                .warning(elem.line, format!("<{}>: unknown property \"{}\"", elem.tag, key));
        }
        Ok(Layer {
            name: name.to_string(),
            description: props.single("description")?.unwrap_or_default().to_string(),
            kind,
            field,
            line: elem.line,
        })
    }

    /// `field="path"` or one field declared inside, optionally wrapped in `<field>`.
    fn parse_field(
        elem: &Element,
        name: &str,
        by_name: Option<&str>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Option<LayerField>, SchemaError> {
        let mut inline: Vec<&Element> = elem.children.iter().filter(|c| is_field_tag(&c.tag)).collect();
        for wrapper in elem.children_named("field").filter(|c| !c.children.is_empty()) {
            inline.extend(wrapper.children.iter().filter(|c| is_field_tag(&c.tag)));
        }
        match (by_name, inline.as_slice()) {
            (None, []) => Ok(None),
            (Some(path), []) => Ok(Some(LayerField::Reference(FieldRef::new(path, elem.line)?))),
            (None, [field]) => {
                let field = Field::parse(field, ctx, Scope::member(VersionWindow::default()))?;
                Ok(Some(LayerField::Inline(Box::new(field))))
            }
            _ => Err(SchemaError::invalid(name, "layer field must be defined exactly once")),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            LayerKind::Sync => "sync",
            LayerKind::Size => "size",
            LayerKind::Id => "id",
            LayerKind::Value { .. } => "value",
            LayerKind::Checksum { .. } => "checksum",
            LayerKind::Payload => "payload",
        }
    }

    pub fn is_payload(&self) -> bool {
        self.kind == LayerKind::Payload
    }

    /// A pseudo value layer feeding one of the given interface version fields.
    pub fn is_pseudo_version_layer(&self, version_field_names: &[&str]) -> bool {
        match &self.kind {
            LayerKind::Value {
                interface_field_name,
                pseudo: true,
            } => version_field_names.contains(&interface_field_name.as_str()),
            _ => false,
        }
    }

    pub fn field<'a>(&'a self, arena: &'a FieldArena) -> Option<&'a Field> {
        self.field.as_ref().and_then(|f| f.field(arena))
    }

    pub(crate) fn inline_field_mut(&mut self) -> Option<&mut Field> {
        match &mut self.field {
            Some(LayerField::Inline(f)) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn for_each_ref(&self, f: &mut dyn FnMut(&FieldRef)) {
        match &self.field {
            Some(LayerField::Inline(field)) => field.for_each_ref(f),
            Some(LayerField::Reference(r)) => f(r),
            None => {}
        }
    }

    pub(crate) fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut FieldRef)) {
        match &mut self.field {
            Some(LayerField::Inline(field)) => field.for_each_ref_mut(f),
            Some(LayerField::Reference(r)) => f(r),
            None => {}
        }
    }

    fn validate(&self, frame: &str, scope: &SchemaScope<'_>, cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
        if let Some(LayerField::Inline(field)) = &self.field {
            field.validate(Siblings::None, cx)?;
        }
        let composition = |reason: String| SchemaError::LayerComposition {
            frame: frame.to_string(),
            reason,
        };
        if let LayerKind::Value {
            interface_field_name, ..
        } = &self.kind
        {
            if !scope.interface_fields.contains(interface_field_name.as_str()) {
                return Err(composition(format!(
                    "value layer \"{}\" refers to unknown interface field \"{}\"",
                    self.name, interface_field_name
                )));
            }
        }
        // unresolved references have already been reported
        let Some(field) = self.field(cx.arena).and_then(|f| f.resolved(cx.arena)) else {
            return Ok(());
        };
        let fits = match self.kind {
            LayerKind::Size => matches!(field.kind, FieldKind::Int(_)),
            LayerKind::Id => matches!(field.kind, FieldKind::Int(_) | FieldKind::Enum(_)),
            _ => true,
        };
        if fits {
            return Ok(());
        }
        Err(composition(format!(
            "{} layer \"{}\" cannot use a field of kind {}",
            self.kind_name(),
            self.name,
            field.kind_name()
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub external_ref: String,
    pub description: String,
    /// Outermost first, in document order.
    pub layers: Vec<Layer>,
    pub line: usize,
}

impl Frame {
    pub(crate) fn parse(elem: &Element, ctx: &mut ParseContext<'_>) -> Result<Frame, SchemaError> {
        let props = elem.props(FRAME_PROPS);
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        let external_ref = ctx.external_ref(name);

        let mut layers = Vec::new();
        let mut failed = false;
        let declared = elem
            .children
            .iter()
            .flat_map(|c| if c.tag == "layers" { c.children.iter().collect() } else { vec![c] });
        for child in declared {
            if !LAYER_TAGS.contains(&child.tag.as_str()) {
                if !child.is_property_child(FRAME_PROPS) {
                    ctx.diag
                        .warning(child.line, format!("<frame>: unexpected child element <{}>", child.tag));
                }
                continue;
            }
            match Layer::parse(child, ctx) {
                Ok(layer) => layers.push(layer),
                Err(e) => {
                    ctx.report(child.line, &e);
                    failed = true;
                }
            }
        }
        if failed {
            return Err(SchemaError::InvalidMembers(external_ref));
        }
        let frame = Frame {
            name: name.to_string(),
            external_ref,
            description: props.single("description")?.unwrap_or_default().to_string(),
            layers,
            line: elem.line,
        };
        frame.check_composition()?;
        Ok(frame)
    }

    /// One payload, at most one id layer, unique names, checksum ranges in order.
    fn check_composition(&self) -> Result<(), SchemaError> {
        let fail = |reason: String| {
            Err(SchemaError::LayerComposition {
                frame: self.external_ref.clone(),
                reason,
            })
        };
        let payloads = self.layers.iter().filter(|l| l.is_payload()).count();
        if payloads != 1 {
            return fail(format!("exactly one payload layer is required, found {}", payloads));
        }
        if self.layers.iter().filter(|l| l.kind == LayerKind::Id).count() > 1 {
            return fail("only one id layer is allowed".to_string());
        }
        for (idx, layer) in self.layers.iter().enumerate() {
            if self.layers[..idx].iter().any(|l| l.name == layer.name) {
                return fail(format!("layer \"{}\" has already been defined", layer.name));
            }
            let LayerKind::Checksum { range, .. } = &layer.kind else {
                continue;
            };
            let (target, ok) = match range {
                ChecksumRange::From(target) => (target, self.position(target).is_some_and(|p| p < idx)),
                ChecksumRange::Until(target) => (target, self.position(target).is_some_and(|p| p > idx)),
            };
            if !ok {
                return fail(format!(
                    "checksum layer \"{}\" covers layer \"{}\" that is not on the correct side of it",
                    layer.name, target
                ));
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn payload(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.is_payload())
    }

    pub fn id_layer(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == LayerKind::Id)
    }

    pub fn has_pseudo_version_layer(&self, version_field_names: &[&str]) -> bool {
        self.layers
            .iter()
            .any(|l| l.is_pseudo_version_layer(version_field_names))
    }

    pub(crate) fn validate(&self, scope: &SchemaScope<'_>, cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
        let mut failed = false;
        for layer in &self.layers {
            if let Err(e) = layer.validate(&self.external_ref, scope, cx) {
                cx.diag.error(layer.line, e.to_string());
                failed = true;
            }
        }
        if failed {
            return Err(SchemaError::InvalidMembers(self.external_ref.clone()));
        }
        Ok(())
    }
}
