//! Namespace tree: sorted collections of fields, interfaces, messages, frames and
//! nested namespaces, and dotted-path lookup across them.

use std::collections::BTreeSet;

use crate::document::Element;
use crate::error::SchemaError;
use crate::field::{
    is_field_tag, validate_siblings, Field, FieldArena, FieldId, FieldRef, ParseContext, Scope, SemanticType,
    Siblings, ValidateContext,
};
use crate::interface::Interface;
use crate::layer::Frame;
use crate::literal::{is_valid_name, split_first_segment};
use crate::message::Message;

pub(crate) const PROPS: &[&str] = &["name", "description"];

/// Child elements understood by a namespace besides field declarations.
const CHILDREN: &[&str] = &[
    "ns", "fields", "interface", "interfaces", "message", "messages", "frame", "frames",
];

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Empty for the root.
    pub name: String,
    pub external_ref: String,
    pub description: String,
    /// Namespace-level fields by name.
    fields: Vec<(String, FieldId)>,
    interfaces: Vec<Interface>,
    messages: Vec<Message>,
    frames: Vec<Frame>,
    namespaces: Vec<Namespace>,
}

/// Schema-wide facts the namespace checks consult.
pub(crate) struct SchemaScope<'a> {
    pub root: &'a Namespace,
    pub platforms: &'a [String],
    /// Names of the fields of every interface.
    pub interface_fields: BTreeSet<&'a str>,
}

/// Insert keeping `items` sorted by name; duplicates are rejected.
fn insert_sorted<T>(
    items: &mut Vec<T>,
    item: T,
    kind: &'static str,
    name_of: impl Fn(&T) -> &str,
) -> Result<(), SchemaError> {
    match items.binary_search_by(|probe| name_of(probe).cmp(name_of(&item))) {
        Ok(_) => Err(SchemaError::DuplicateName {
            kind,
            name: name_of(&item).to_string(),
        }),
        Err(pos) => {
            items.insert(pos, item);
            Ok(())
        }
    }
}

fn find_sorted<'a, T>(items: &'a [T], name: &str, name_of: impl Fn(&T) -> &str) -> Option<&'a T> {
    items
        .binary_search_by(|probe| name_of(probe).cmp(name))
        .ok()
        .map(|pos| &items[pos])
}

/// Direct children with an accepted tag plus those nested in `wrapper` elements.
fn declared<'a>(elem: &'a Element, wrapper: &'a str, accept: impl Fn(&str) -> bool) -> Vec<&'a Element> {
    let mut found: Vec<&Element> = Vec::new();
    for child in &elem.children {
        if child.tag == wrapper {
            found.extend(child.children.iter().filter(|c| accept(&c.tag)));
        } else if accept(&child.tag) {
            found.push(child);
        }
    }
    found
}

impl Namespace {
    pub(crate) fn root() -> Self {
        Namespace::default()
    }

    fn new(name: &str, external_ref: String) -> Self {
        Namespace {
            name: name.to_string(),
            external_ref,
            ..Namespace::default()
        }
    }

    /// Add the content of `elem`: nested namespaces first, then fields, interfaces,
    /// messages and frames. Every failing element is reported and skipped.
    pub(crate) fn populate(
        &mut self,
        elem: &Element,
        prop_names: &[&str],
        ctx: &mut ParseContext<'_>,
        arena: &mut FieldArena,
    ) -> bool {
        let mut ok = true;
        for child in elem.children_named("ns") {
            let result = self.populate_namespace(child, ctx, arena);
            ok &= parsed(ctx, child.line, result);
        }
        for child in declared(elem, "fields", is_field_tag) {
            let result = self.add_field(child, ctx, arena);
            ok &= parsed(ctx, child.line, result);
        }
        for child in declared(elem, "interfaces", |t| t == "interface") {
            let result = Interface::parse(child, ctx).and_then(|i| self.add_interface(i));
            ok &= parsed(ctx, child.line, result);
        }
        for child in declared(elem, "messages", |t| t == "message") {
            let result = Message::parse(child, ctx)
                .and_then(|m| insert_sorted(&mut self.messages, m, "message", |m| m.name.as_str()));
            ok &= parsed(ctx, child.line, result);
        }
        for child in declared(elem, "frames", |t| t == "frame") {
            let result =
                Frame::parse(child, ctx).and_then(|f| insert_sorted(&mut self.frames, f, "frame", |f| f.name.as_str()));
            ok &= parsed(ctx, child.line, result);
        }

        for child in &elem.children {
            let tag = child.tag.as_str();
            let known = CHILDREN.contains(&tag)
                || is_field_tag(tag)
                || child.is_property_child(prop_names)
                || (self.name.is_empty() && tag == "platforms");
            if !known {
                ctx.diag
                    .warning(child.line, format!("<{}>: unexpected child element <{}>", elem.tag, tag));
            }
        }
        tracing::debug!(namespace = %self.external_ref, fields = self.fields.len(), "namespace populated");
        ok
    }

    /// Namespaces of the same name merge, within and across documents.
    fn populate_namespace(
        &mut self,
        elem: &Element,
        ctx: &mut ParseContext<'_>,
        arena: &mut FieldArena,
    ) -> Result<(), SchemaError> {
        let props = elem.props(PROPS);
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        for key in props.unknown(PROPS) {
            ctx.diag
                .warning(elem.line, format!("<ns>: unknown property \"{}\"", key));
        }
        let external_ref = ctx.external_ref(name);
        let pos = match self.namespaces.binary_search_by(|n| n.name.as_str().cmp(name)) {
            Ok(pos) => pos,
            Err(pos) => {
                self.namespaces.insert(pos, Namespace::new(name, external_ref.clone()));
                pos
            }
        };
        let child = &mut self.namespaces[pos];
        if let Some(description) = props.single("description")? {
            child.description = description.to_string();
        }

        let parent = std::mem::replace(&mut ctx.namespace, external_ref);
        let ok = child.populate(elem, PROPS, ctx, arena);
        ctx.namespace = parent;
        if ok {
            Ok(())
        } else {
            Err(SchemaError::InvalidMembers(child.external_ref.clone()))
        }
    }

    fn add_field(&mut self, elem: &Element, ctx: &mut ParseContext<'_>, arena: &mut FieldArena) -> Result<(), SchemaError> {
        let merged = ctx.resolve_reuse(elem)?;
        let field = Field::parse_merged(&merged, ctx, Scope::namespace())?;
        let name = field.name().to_string();
        let pos = match self.fields.binary_search_by(|(n, _)| n.as_str().cmp(&name)) {
            Ok(_) => return Err(SchemaError::DuplicateName { kind: "field", name }),
            Err(pos) => pos,
        };
        ctx.reusable
            .insert(field.external_ref().to_string(), merged.into_owned());
        let id = arena.push(field);
        self.fields.insert(pos, (name, id));
        Ok(())
    }

    fn add_interface(&mut self, interface: Interface) -> Result<(), SchemaError> {
        if interface.is_default() && self.interfaces.first().is_some_and(Interface::is_default) {
            return Err(SchemaError::invalid(
                &self.external_ref,
                "only one interface without a name may be declared per namespace",
            ));
        }
        insert_sorted(&mut self.interfaces, interface, "interface", |i| i.name.as_str())
    }

    pub(crate) fn add_default_interface(&mut self) {
        if !self.interfaces.first().is_some_and(Interface::is_default) {
            self.interfaces.insert(0, Interface::synthesized(&self.external_ref));
        }
    }

    fn namespace(&self, name: &str) -> Option<&Namespace> {
        find_sorted(&self.namespaces, name, |n| n.name.as_str())
    }

    /// Resolve a dotted path relative to this namespace.
    pub fn find_field_id(&self, path: &str) -> Option<FieldId> {
        match split_first_segment(path) {
            (name, None) => find_sorted(&self.fields, name, |(n, _)| n.as_str()).map(|(_, id)| *id),
            (ns, Some(rest)) => self.namespace(ns)?.find_field_id(rest),
        }
    }

    /// The default interface of a namespace is found by its (empty) local name.
    pub fn find_interface(&self, path: &str) -> Option<&Interface> {
        match split_first_segment(path) {
            (name, None) => find_sorted(&self.interfaces, name, |i| i.name.as_str()),
            (ns, Some(rest)) => self.namespace(ns)?.find_interface(rest),
        }
    }

    pub fn find_frame(&self, path: &str) -> Option<&Frame> {
        match split_first_segment(path) {
            (name, None) => find_sorted(&self.frames, name, |f| f.name.as_str()),
            (ns, Some(rest)) => self.namespace(ns)?.find_frame(rest),
        }
    }

    pub fn find_message(&self, path: &str) -> Option<&Message> {
        match split_first_segment(path) {
            (name, None) => find_sorted(&self.messages, name, |m| m.name.as_str()),
            (ns, Some(rest)) => self.namespace(ns)?.find_message(rest),
        }
    }

    /// Depth-first: own fields in name order, then nested namespaces.
    pub fn find_message_id_field(&self, arena: &FieldArena) -> Option<FieldId> {
        let own = self.fields.iter().map(|(_, id)| *id).find(|id| {
            let field = arena.get(*id);
            field.semantic_type() == SemanticType::MessageId
                && field.resolved(arena).and_then(Field::as_enum).is_some()
        });
        own.or_else(|| self.namespaces.iter().find_map(|ns| ns.find_message_id_field(arena)))
    }

    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.iter().map(|(_, id)| *id)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn for_each_message<'a>(&'a self, f: &mut dyn FnMut(&'a Message)) {
        self.messages.iter().for_each(&mut *f);
        for ns in &self.namespaces {
            ns.for_each_message(f);
        }
    }

    pub(crate) fn for_each_message_mut(&mut self, f: &mut dyn FnMut(&mut Message)) {
        self.messages.iter_mut().for_each(&mut *f);
        for ns in &mut self.namespaces {
            ns.for_each_message_mut(f);
        }
    }

    pub fn for_each_interface<'a>(&'a self, f: &mut dyn FnMut(&'a Interface)) {
        self.interfaces.iter().for_each(&mut *f);
        for ns in &self.namespaces {
            ns.for_each_interface(f);
        }
    }

    /// Fields owned by the tree itself: message, interface and inline layer fields.
    /// Namespace-level fields live in the arena.
    pub(crate) fn for_each_field_mut(&mut self, f: &mut dyn FnMut(&mut Field)) {
        for message in &mut self.messages {
            message.fields.iter_mut().for_each(&mut *f);
        }
        for interface in &mut self.interfaces {
            interface.fields.iter_mut().for_each(&mut *f);
        }
        for frame in &mut self.frames {
            frame.layers.iter_mut().filter_map(|l| l.inline_field_mut()).for_each(&mut *f);
        }
        for ns in &mut self.namespaces {
            ns.for_each_field_mut(f);
        }
    }

    /// References held by the tree, excluding those inside arena fields.
    pub(crate) fn for_each_ref(&self, f: &mut dyn FnMut(&FieldRef)) {
        for message in &self.messages {
            message.fields.iter().for_each(|field| field.for_each_ref(f));
        }
        for interface in &self.interfaces {
            interface.fields.iter().for_each(|field| field.for_each_ref(f));
        }
        for frame in &self.frames {
            frame.layers.iter().for_each(|layer| layer.for_each_ref(f));
        }
        for ns in &self.namespaces {
            ns.for_each_ref(f);
        }
    }

    pub(crate) fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut FieldRef)) {
        for message in &mut self.messages {
            message.fields.iter_mut().for_each(|field| field.for_each_ref_mut(f));
        }
        for interface in &mut self.interfaces {
            interface.fields.iter_mut().for_each(|field| field.for_each_ref_mut(f));
        }
        for frame in &mut self.frames {
            frame.layers.iter_mut().for_each(|layer| layer.for_each_ref_mut(f));
        }
        for ns in &mut self.namespaces {
            ns.for_each_ref_mut(f);
        }
    }

    /// Run the post-link checks over the whole subtree. Every failure is reported;
    /// returns `false` if any occurred.
    pub(crate) fn validate(&self, scope: &SchemaScope<'_>, cx: &mut ValidateContext<'_>) -> bool {
        let mut ok = true;
        let arena = cx.arena;
        for (_, id) in &self.fields {
            let field = arena.get(*id);
            let result = field.validate(Siblings::Namespace(&self.fields, arena), cx);
            ok &= checked(cx, field.core.line, result);
        }
        for interface in &self.interfaces {
            let result = interface.validate(cx);
            ok &= checked(cx, interface.line, result);
        }
        for message in &self.messages {
            let result = message.validate(scope, cx);
            ok &= checked(cx, message.line, result);
        }
        for frame in &self.frames {
            let result = frame.validate(scope, cx);
            ok &= checked(cx, frame.line, result);
        }
        for ns in &self.namespaces {
            ok &= ns.validate(scope, cx);
        }
        ok
    }
}

fn parsed(ctx: &mut ParseContext<'_>, line: usize, result: Result<(), SchemaError>) -> bool {
    result.map_err(|e| ctx.report(line, &e)).is_ok()
}

fn checked(cx: &mut ValidateContext<'_>, line: usize, result: Result<(), SchemaError>) -> bool {
    result.map_err(|e| cx.diag.error(line, e.to_string())).is_ok()
}

/// Validate a field list owned by a message or interface.
pub(crate) fn validate_owned_fields(owner: &str, fields: &[Field], cx: &mut ValidateContext<'_>) -> Result<(), SchemaError> {
    if validate_siblings(fields, cx) {
        Ok(())
    } else {
        Err(SchemaError::InvalidMembers(owner.to_string()))
    }
}
