use serde::{Deserialize, Deserializer};

/// Tri-state field of a partial update.
///
/// A field missing from the JSON body is `Absent` (leave unchanged), an
/// explicit `null` is `Clear`, and any value is `Set`. Fields using this type
/// need `#[serde(default)]` so that missing keys deserialize at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    /// Whether the column should be written at all.
    pub fn touched(&self) -> bool {
        !self.is_absent()
    }

    /// New column value when touched; `None` means NULL.
    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl Patch<String> {
    /// Treat an empty or whitespace-only string as a deliberate clear.
    pub fn normalized(self) -> Patch<String> {
        match self {
            Patch::Set(s) if s.trim().is_empty() => Patch::Clear,
            Patch::Set(s) => Patch::Set(s.trim().to_string()),
            other => other,
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}
