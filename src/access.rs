//! Demand-driven field materialisation.
//!
//! An emitter records every namespace field it resolves, then repeatedly takes the
//! pending ones, emits them and records what they reference, until a pass adds
//! nothing. Records are never removed, so the loop ends after at most one pass per
//! field of the schema.

use std::collections::BTreeSet;

use crate::field::{Field, FieldArena, FieldId};
use crate::schema::Schema;

#[derive(Debug, Clone, Default)]
pub struct AccessedFields {
    accessed: BTreeSet<FieldId>,
    emitted: BTreeSet<FieldId>,
}

impl AccessedFields {
    pub fn new() -> Self {
        AccessedFields::default()
    }

    /// Returns `true` when `id` was not recorded before.
    pub fn record(&mut self, id: FieldId) -> bool {
        self.accessed.insert(id)
    }

    /// Look a field up by external reference and record it.
    pub fn find_field(&mut self, schema: &Schema, path: &str) -> Option<FieldId> {
        let id = schema.root.find_field_id(path)?;
        self.record(id);
        Some(id)
    }

    /// Record the namespace fields `field` refers to directly.
    pub fn record_references(&mut self, field: &Field) {
        field.for_each_ref(&mut |r| {
            if let Some(id) = r.target() {
                self.accessed.insert(id);
            }
        });
    }

    pub fn is_accessed(&self, id: FieldId) -> bool {
        self.accessed.contains(&id)
    }

    pub fn accessed(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.accessed.iter().copied()
    }

    /// Accessed but not yet emitted.
    pub fn pending(&self) -> Vec<FieldId> {
        self.accessed.difference(&self.emitted).copied().collect()
    }

    pub fn mark_emitted(&mut self, id: FieldId) {
        self.emitted.insert(id);
    }

    /// Emit pending fields until a pass records nothing new. Returns the number of
    /// passes that emitted something.
    pub fn run_to_fixed_point(&mut self, arena: &FieldArena, mut emit: impl FnMut(FieldId, &Field)) -> usize {
        let mut passes = 0;
        loop {
            let pending = self.pending();
            if pending.is_empty() {
                return passes;
            }
            passes += 1;
            tracing::debug!(pass = passes, fields = pending.len(), "emitting accessed fields");
            for id in pending {
                let field = arena.get(id);
                emit(id, field);
                self.mark_emitted(id);
                self.record_references(field);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::parser::parse_document;

    fn linked(text: &str) -> Schema {
        let root = parse_document(text).expect("well-formed");
        let mut diag = Diagnostics::new();
        let mut schema = Schema::parse(&root, &mut diag).expect("schema");
        assert!(schema.populate(&root, &mut diag));
        schema.link(&mut diag);
        assert!(!diag.has_errors());
        schema
    }

    #[test]
    fn chain_is_materialised_pass_by_pass() {
        let schema = linked(
            r#"<schema name="P">
                 <ns name="X">
                   <ref name="A" field="X.B"/>
                   <ref name="B" field="X.C"/>
                   <int name="C" type="uint8"/>
                 </ns>
               </schema>"#,
        );
        let mut accessed = AccessedFields::new();
        let a = accessed.find_field(&schema, "X.A").expect("A");
        let mut order = Vec::new();
        let passes = accessed.run_to_fixed_point(&schema.fields, |_, f| order.push(f.name().to_string()));
        assert_eq!(passes, 3);
        assert_eq!(order, ["A", "B", "C"]);
        assert!(accessed.is_accessed(a));
        assert!(accessed.pending().is_empty());
        // nothing new: a second run does no work
        assert_eq!(accessed.run_to_fixed_point(&schema.fields, |_, _| {}), 0);
    }

    #[test]
    fn recording_is_idempotent() {
        let schema = linked(r#"<schema name="P"><int name="C" type="uint8"/></schema>"#);
        let mut accessed = AccessedFields::new();
        let id = accessed.find_field(&schema, "C").expect("C");
        assert!(!accessed.record(id));
        assert_eq!(accessed.accessed().count(), 1);
        assert!(accessed.find_field(&schema, "D").is_none());
    }
}
