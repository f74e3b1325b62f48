use std::fmt;

/// Stable identifier of a layer descriptor (a district or a thematic layer).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorId(String);

impl DescriptorId {
    pub fn new(id: impl Into<String>) -> Self {
        DescriptorId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DescriptorId {
    fn from(s: &str) -> Self {
        DescriptorId::new(s)
    }
}

impl From<String> for DescriptorId {
    fn from(s: String) -> Self {
        DescriptorId(s)
    }
}

/// Handle of a live render layer.
///
/// Assigned by the reconciler from a monotonic counter; a handle is never
/// reused, so a stale handle can't address a newer layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Identifier of a feature record, unique within one parsed feature set.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        FeatureId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
