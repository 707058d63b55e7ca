//! Version windows and the existence gate.
//!
//! Every element with a lifecycle (fields, messages, enum values, set bits, interface
//! fields) carries a [`VersionWindow`]; whether it exists for a given protocol version is
//! decided by [`VersionWindow::does_exist`] and nothing else.

use crate::document::Props;
use crate::error::SchemaError;
use crate::literal::parse_unsigned;

/// Sentinel for "never deprecated", larger than any real version.
pub const NOT_YET_DEPRECATED: u32 = u32::MAX;

/// Inclusive-lower / exclusive-upper version range in which an element exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionWindow {
    pub since: u32,
    pub deprecated: u32,
}

impl Default for VersionWindow {
    fn default() -> Self {
        VersionWindow {
            since: 0,
            deprecated: NOT_YET_DEPRECATED,
        }
    }
}

impl VersionWindow {
    pub fn new(since: u32, deprecated: u32) -> Result<Self, SchemaError> {
        if deprecated <= since {
            return Err(SchemaError::VersionWindow {
                name: String::new(),
                since,
                deprecated,
            });
        }
        Ok(VersionWindow { since, deprecated })
    }

    /// `since <= version < deprecated`.
    pub fn does_exist(&self, version: u32) -> bool {
        self.since <= version && version < self.deprecated
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated != NOT_YET_DEPRECATED
    }

    /// Read `sinceVersion` / `deprecated` of an element nested in `parent`.
    ///
    /// Missing values are inherited from the parent; a nested element cannot exist
    /// outside its parent's window and not beyond the schema version.
    pub fn parse(
        name: &str,
        props: &Props,
        parent: VersionWindow,
        schema_version: u32,
    ) -> Result<Self, SchemaError> {
        let since = match props.single("sinceVersion")? {
            Some(s) => parse_unsigned(s).ok_or_else(|| SchemaError::unexpected("sinceVersion", s))?,
            None => parent.since,
        };
        let deprecated = match props.single("deprecated")? {
            Some(s) => parse_unsigned(s).ok_or_else(|| SchemaError::unexpected("deprecated", s))?,
            None => parent.deprecated,
        };
        if schema_version < since {
            return Err(SchemaError::SinceAboveSchema {
                name: name.to_string(),
                since,
                schema: schema_version,
            });
        }
        if since < parent.since {
            return Err(SchemaError::invalid(
                name,
                format!("since version ({}) is smaller than that of the parent ({})", since, parent.since),
            ));
        }
        if deprecated <= since {
            return Err(SchemaError::VersionWindow {
                name: name.to_string(),
                since,
                deprecated,
            });
        }
        if parent.deprecated < deprecated {
            return Err(SchemaError::invalid(
                name,
                format!("deprecated version ({}) is greater than that of the parent ({})", deprecated, parent.deprecated),
            ));
        }
        Ok(VersionWindow { since, deprecated })
    }
}

/// Caller-supplied versioning knobs applied on top of the windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGate {
    /// Effective protocol version (schema version or forced override).
    pub version: u32,
    /// Oldest remote version that must still be supported.
    pub min_remote_version: u32,
}

impl VersionGate {
    /// An element is admitted when it already exists at the effective version and some
    /// supported remote version still has it.
    pub fn admits(&self, window: &VersionWindow) -> bool {
        window.since <= self.version && self.min_remote_version < window.deprecated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;

    fn props(attrs: &[(&str, &str)]) -> Props {
        attrs
            .iter()
            .fold(Element::new("int"), |e, (k, v)| e.with_attr(*k, *v))
            .props(&[])
    }

    #[test]
    fn window_bounds() {
        let w = VersionWindow::new(2, 5).expect("window");
        assert!(!w.does_exist(1));
        assert!(w.does_exist(2));
        assert!(w.does_exist(4));
        assert!(!w.does_exist(5));
        assert!(VersionWindow::default().does_exist(u32::MAX - 1));
        assert!(VersionWindow::new(3, 3).is_err());
        assert!(VersionWindow::new(4, 3).is_err());
    }

    #[test]
    fn parse_inherits_from_parent() {
        let parent = VersionWindow::new(1, 9).expect("window");
        let w = VersionWindow::parse("x", &props(&[]), parent, 10).expect("parse");
        assert_eq!(w, parent);
        let w = VersionWindow::parse("x", &props(&[("sinceVersion", "3")]), parent, 10).expect("parse");
        assert_eq!(w.since, 3);
        assert_eq!(w.deprecated, 9);
    }

    #[test]
    fn parse_rejects_reversed_window() {
        let err = VersionWindow::parse(
            "x",
            &props(&[("sinceVersion", "4"), ("deprecated", "2")]),
            VersionWindow::default(),
            10,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::VersionWindow { since: 4, deprecated: 2, .. }));
    }

    #[test]
    fn parse_rejects_since_above_schema() {
        let err = VersionWindow::parse("x", &props(&[("sinceVersion", "4")]), VersionWindow::default(), 3)
            .unwrap_err();
        assert!(matches!(err, SchemaError::SinceAboveSchema { .. }));
    }

    #[test]
    fn gate_keeps_deprecated_elements_for_old_remotes() {
        let w = VersionWindow::new(1, 3).expect("window");
        let gate = VersionGate { version: 5, min_remote_version: 2 };
        assert!(gate.admits(&w));
        let gate = VersionGate { version: 5, min_remote_version: 3 };
        assert!(!gate.admits(&w));
        let gate = VersionGate { version: 0, min_remote_version: 0 };
        assert!(!gate.admits(&w));
    }
}
