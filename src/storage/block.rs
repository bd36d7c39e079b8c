use std::fmt;

/// Block number used as a lock-table key to serialize file growth.
/// No real block ever has this number.
pub const END_OF_FILE: i64 = -1;

/// Reference to a fixed-size block of a file: the unit of disk IO.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    filename: String,
    num: i64,
}

impl BlockId {
    pub fn new(filename: impl Into<String>, num: i64) -> Self {
        Self {
            filename: filename.into(),
            num,
        }
    }

    /// The sentinel block guarding appends to `filename`.
    pub fn end_of_file(filename: impl Into<String>) -> Self {
        Self::new(filename, END_OF_FILE)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn num(&self) -> i64 {
        self.num
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file: {}, block: {}", self.filename, self.num)
    }
}
