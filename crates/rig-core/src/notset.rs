use serde::{Deserialize, Deserializer};

/// Three-state descriptor field: absent from the JSON document (the
/// inheritance walker should fall through to the parent), present and
/// explicitly `null` (the node overrides and unsets), or a concrete value.
///
/// `#[serde(default)]` on the field gives the `NotSet` arm when the key is
/// missing; this type's `Deserialize` impl only ever produces `Null` or
/// `Value` since it is invoked when the key *is* present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotSet<T> {
    NotSet,
    Null,
    Value(T),
}

impl<T> Default for NotSet<T> {
    fn default() -> Self {
        NotSet::NotSet
    }
}

impl<T> NotSet<T> {
    pub fn is_not_set(&self) -> bool {
        matches!(self, NotSet::NotSet)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NotSet::Null)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            NotSet::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            NotSet::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Resolves against a parent value the way the inheritance walker does:
    /// a not-set field falls through, a null field clears, a value wins.
    pub fn or_inherit(self, parent: Option<T>) -> Option<T> {
        match self {
            NotSet::NotSet => parent,
            NotSet::Null => None,
            NotSet::Value(v) => Some(v),
        }
    }
}

impl<'de, T> Deserialize<'de> for NotSet<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<T>::deserialize(deserializer)?;
        Ok(match opt {
            Some(v) => NotSet::Value(v),
            None => NotSet::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_inherit_falls_through_on_not_set() {
        let field: NotSet<i32> = NotSet::NotSet;
        assert_eq!(field.or_inherit(Some(5)), Some(5));
    }

    #[test]
    fn or_inherit_clears_on_null() {
        let field: NotSet<i32> = NotSet::Null;
        assert_eq!(field.or_inherit(Some(5)), None);
    }

    #[test]
    fn or_inherit_overrides_on_value() {
        let field = NotSet::Value(7);
        assert_eq!(field.or_inherit(Some(5)), Some(7));
    }
}
