//! Sample element types.
//!
//! [`Part`] is a small entity with a stable identity and mutable state, so
//! tests can tell an update (same identity, new state) from a replacement.

use ormkit_codec::Value;
use ormkit_core::{CoreError, CoreResult, ElementType, EntityId};

/// A versioned part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Identity.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Revision, bumped by [`Part::revised`].
    pub version: i64,
}

impl Part {
    /// A new part with a fresh identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(EntityId::new(), name)
    }

    /// A part with a given identity.
    pub fn with_id(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: 1,
        }
    }

    /// The same part at the next revision.
    #[must_use]
    pub fn revised(&self) -> Self {
        Self {
            version: self.version + 1,
            ..self.clone()
        }
    }
}

/// Element type for [`Part`]: identity is the id, state is name and version.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartType;

impl ElementType for PartType {
    type Element = Part;
    type Id = EntityId;

    fn id_of(&self, part: &Part) -> EntityId {
        part.id
    }

    fn is_dirty(&self, current: &Part, snapshot: &Part) -> bool {
        current.name != snapshot.name || current.version != snapshot.version
    }

    fn externalize(&self, part: &Part) -> CoreResult<Value> {
        Ok(Value::map(vec![
            (Value::from("id"), Value::Bytes(part.id.as_bytes().to_vec())),
            (Value::from("name"), Value::from(part.name.as_str())),
            (Value::from("version"), Value::Integer(part.version)),
        ]))
    }

    fn externalize_id(&self, part: &Part) -> CoreResult<Value> {
        Ok(Value::Bytes(part.id.as_bytes().to_vec()))
    }

    fn internalize(&self, value: &Value) -> CoreResult<Part> {
        let id = value
            .get("id")
            .and_then(Value::as_bytes)
            .and_then(EntityId::from_slice)
            .ok_or_else(|| CoreError::conversion("part without a 16-byte id"))?;
        let name = value
            .get("name")
            .and_then(Value::as_text)
            .ok_or_else(|| CoreError::conversion("part without a name"))?;
        let version = value
            .get("version")
            .and_then(Value::as_integer)
            .ok_or_else(|| CoreError::conversion("part without a version"))?;
        Ok(Part {
            id,
            name: name.to_string(),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_keeps_identity_and_is_dirty() {
        let part = Part::new("bolt");
        let next = part.revised();
        assert_eq!(PartType.id_of(&part), PartType.id_of(&next));
        assert!(PartType.is_dirty(&next, &part));
        assert!(!PartType.is_dirty(&part, &part.clone()));
        assert_eq!(
            PartType.externalize_id(&part).unwrap(),
            PartType.externalize_id(&next).unwrap()
        );
    }

    #[test]
    fn externalized_form_roundtrips() {
        let part = Part::new("nut");
        let value = PartType.externalize(&part).unwrap();
        assert_eq!(PartType.internalize(&value).unwrap(), part);
    }

    #[test]
    fn internalize_reports_missing_fields() {
        let err = PartType.internalize(&Value::from("nut")).unwrap_err();
        assert!(matches!(err, CoreError::Conversion { .. }));
    }
}
