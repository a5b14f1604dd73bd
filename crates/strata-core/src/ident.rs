//! Hierarchical identifiers for catalog entities.
//!
//! The namespace tree has four levels: metalake → catalog → schema → object.
//! A [`Namespace`] is the ordered sequence of segments *above* the leaf being
//! addressed (zero through three levels); an [`EntityIdent`] is a namespace
//! plus a leaf [`Name`]. Segments are always contiguous root-to-leaf — the
//! representation cannot express a schema without a catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entity::EntityKind;
use crate::error::{Error, Result};
use crate::name::Name;

/// Maximum namespace depth (metalake, catalog, schema above an object).
pub const MAX_NAMESPACE_DEPTH: usize = 3;

/// An ordered sequence of namespace levels above an addressed leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Namespace(Vec<Name>);

impl Namespace {
    /// The empty (metalake-level) namespace.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Creates a namespace from the given levels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if there are more than
    /// [`MAX_NAMESPACE_DEPTH`] levels.
    pub fn of(levels: Vec<Name>) -> Result<Self> {
        if levels.len() > MAX_NAMESPACE_DEPTH {
            return Err(Error::validation(format!(
                "namespace has {} levels, maximum is {MAX_NAMESPACE_DEPTH}",
                levels.len()
            )));
        }
        Ok(Self(levels))
    }

    /// Returns the number of levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when this is the metalake-level (empty) namespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the levels as a slice.
    #[must_use]
    pub fn levels(&self) -> &[Name] {
        &self.0
    }

    /// Returns a child namespace with `name` appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when already at maximum depth.
    pub fn child(&self, name: Name) -> Result<Self> {
        let mut levels = self.0.clone();
        levels.push(name);
        Self::of(levels)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for level in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{level}")?;
            first = false;
        }
        Ok(())
    }
}

/// A fully qualified entity identifier: namespace plus leaf name.
///
/// The depth of the namespace determines the kind of entity the identifier
/// addresses: 0 = metalake, 1 = catalog, 2 = schema, 3 = object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityIdent {
    /// The namespace above the leaf.
    pub namespace: Namespace,
    /// The leaf name.
    pub name: Name,
}

impl EntityIdent {
    /// Creates an identifier from a namespace and leaf name.
    #[must_use]
    pub fn new(namespace: Namespace, name: Name) -> Self {
        Self { namespace, name }
    }

    /// Creates a metalake identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on a malformed name.
    pub fn metalake_of(metalake: &str) -> Result<Self> {
        Ok(Self::new(Namespace::root(), Name::new(metalake)?))
    }

    /// Creates a catalog identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on a malformed segment.
    pub fn catalog_of(metalake: &str, catalog: &str) -> Result<Self> {
        Ok(Self::new(
            Namespace::of(vec![Name::new(metalake)?])?,
            Name::new(catalog)?,
        ))
    }

    /// Creates a schema identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on a malformed segment.
    pub fn schema_of(metalake: &str, catalog: &str, schema: &str) -> Result<Self> {
        Ok(Self::new(
            Namespace::of(vec![Name::new(metalake)?, Name::new(catalog)?])?,
            Name::new(schema)?,
        ))
    }

    /// Creates an object identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on a malformed segment.
    pub fn object_of(metalake: &str, catalog: &str, schema: &str, object: &str) -> Result<Self> {
        Ok(Self::new(
            Namespace::of(vec![
                Name::new(metalake)?,
                Name::new(catalog)?,
                Name::new(schema)?,
            ])?,
            Name::new(object)?,
        ))
    }

    /// Returns the namespace depth (0 for a metalake identifier).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.namespace.len()
    }

    /// Returns the kind of entity this identifier addresses.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self.depth() {
            0 => EntityKind::Metalake,
            1 => EntityKind::Catalog,
            2 => EntityKind::Schema,
            _ => EntityKind::Object,
        }
    }

    /// Returns the identifier of the parent entity, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let levels = self.namespace.levels();
        let (name, ancestors) = levels.split_last()?;
        Some(Self {
            namespace: Namespace(ancestors.to_vec()),
            name: name.clone(),
        })
    }

    /// Returns the catalog identifier this entity belongs to, if any.
    ///
    /// For a catalog identifier this is the identifier itself; for a schema
    /// or object it is the enclosing catalog; metalakes have none.
    #[must_use]
    pub fn catalog(&self) -> Option<Self> {
        let levels = self.namespace.levels();
        match self.depth() {
            1 => Some(self.clone()),
            2 | 3 => Some(Self {
                namespace: Namespace(levels[..1].to_vec()),
                name: levels[1].clone(),
            }),
            _ => None,
        }
    }

    /// Returns all path segments root-to-leaf, including the leaf name.
    #[must_use]
    pub fn segments(&self) -> Vec<Name> {
        let mut segments = self.namespace.levels().to_vec();
        segments.push(self.name.clone());
        segments
    }

    /// Returns a sibling identifier with a different leaf name.
    #[must_use]
    pub fn with_name(&self, name: Name) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name,
        }
    }

    /// Returns the namespace formed by this identifier's full path, used to
    /// address children of this entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the entity is an object (objects
    /// have no children).
    pub fn as_child_namespace(&self) -> Result<Namespace> {
        Namespace::of(self.segments())
    }
}

impl fmt::Display for EntityIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

impl FromStr for EntityIdent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in s.split('.') {
            segments.push(Name::new(part)?);
        }
        let name = segments
            .pop()
            .ok_or_else(|| Error::validation("identifier cannot be empty"))?;
        Ok(Self::new(Namespace::of(segments)?, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_determines_kind() {
        assert_eq!(
            EntityIdent::metalake_of("t1").unwrap().kind(),
            EntityKind::Metalake
        );
        assert_eq!(
            EntityIdent::catalog_of("t1", "c1").unwrap().kind(),
            EntityKind::Catalog
        );
        assert_eq!(
            EntityIdent::schema_of("t1", "c1", "s1").unwrap().kind(),
            EntityKind::Schema
        );
        assert_eq!(
            EntityIdent::object_of("t1", "c1", "s1", "o1").unwrap().kind(),
            EntityKind::Object
        );
    }

    #[test]
    fn parent_walks_up_the_tree() {
        let object = EntityIdent::object_of("t1", "c1", "s1", "o1").unwrap();
        let schema = object.parent().unwrap();
        assert_eq!(schema, EntityIdent::schema_of("t1", "c1", "s1").unwrap());

        let catalog = schema.parent().unwrap();
        assert_eq!(catalog, EntityIdent::catalog_of("t1", "c1").unwrap());

        let metalake = catalog.parent().unwrap();
        assert_eq!(metalake, EntityIdent::metalake_of("t1").unwrap());
        assert!(metalake.parent().is_none());
    }

    #[test]
    fn catalog_of_any_level() {
        let object = EntityIdent::object_of("t1", "c1", "s1", "o1").unwrap();
        let catalog = EntityIdent::catalog_of("t1", "c1").unwrap();
        assert_eq!(object.catalog().unwrap(), catalog);
        assert_eq!(catalog.catalog().unwrap(), catalog);
        assert!(EntityIdent::metalake_of("t1").unwrap().catalog().is_none());
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let ident = EntityIdent::schema_of("t1", "c1", "s1").unwrap();
        assert_eq!(ident.to_string(), "t1.c1.s1");
        let parsed: EntityIdent = "t1.c1.s1".parse().unwrap();
        assert_eq!(parsed, ident);
    }

    #[test]
    fn namespace_depth_is_bounded() {
        assert!("a.b.c.d.e".parse::<EntityIdent>().is_err());
        assert!(Namespace::of(vec![
            Name::new("a").unwrap(),
            Name::new("b").unwrap(),
            Name::new("c").unwrap(),
            Name::new("d").unwrap(),
        ])
        .is_err());
    }

    #[test]
    fn malformed_segment_rejected() {
        assert!("t1.bad-name.s1".parse::<EntityIdent>().is_err());
        assert!("t1..s1".parse::<EntityIdent>().is_err());
    }
}
