use std::fmt;

/// An opaque, non-negative, monotonically assigned e-node/e-class identifier.
///
/// Ids are never freed and are dense starting at zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(val: usize) -> Self {
        NodeId(val as u32)
    }

    pub fn val(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for NodeId {
    fn from(val: usize) -> Self {
        NodeId::new(val)
    }
}
