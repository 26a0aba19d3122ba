use std::fmt;

/// Stable identifier of one restoration case.
///
/// Ids come straight from the dataset and survive reloads, so ordering by id
/// is the canonical, deterministic record order everywhere in the workspace.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
