use crate::common::{DbError, Result};

/// Width in bytes of every integer stored on a page.
pub const I64_SIZE: usize = 8;

/// Number of bytes needed to store a string of `strlen` bytes,
/// including the length prefix.
pub fn max_len(strlen: usize) -> usize {
    I64_SIZE + strlen
}

/// In-memory buffer holding the contents of one file block.
///
/// Three value kinds can be read and written at arbitrary offsets:
///
/// Integers are 8-byte big-endian two's-complement:
///
/// ```text
/// +---------+
/// | i64     |
/// +---------+
/// | 8 bytes |
/// +---------+
/// ```
///
/// Byte vectors carry an 8-byte length prefix followed by the payload;
/// strings are UTF-8 bytes stored the same way:
///
/// ```text
/// +----------+----------------+
/// | len      | payload        |
/// +----------+----------------+
/// | 8 bytes  | len bytes      |
/// +----------+----------------+
/// ```
///
/// Accessors bounds-check against the page size only. The page is
/// fixed-size scratch; the caller owns the layout of valid data.
#[derive(Debug, Clone)]
pub struct Page {
    buf: Vec<u8>,
}

impl Page {
    /// A zeroed page of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size],
        }
    }

    /// A page wrapping an existing buffer, e.g. a decoded log record.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn contents(&self) -> &[u8] {
        &self.buf
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn get_int(&self, offset: usize) -> Result<i64> {
        let end = offset.checked_add(I64_SIZE).ok_or(DbError::OutOfBounds)?;
        if end > self.buf.len() {
            return Err(DbError::OutOfBounds);
        }
        let mut bytes = [0u8; I64_SIZE];
        bytes.copy_from_slice(&self.buf[offset..end]);
        Ok(i64::from_be_bytes(bytes))
    }

    pub fn set_int(&mut self, offset: usize, value: i64) -> Result<()> {
        let end = offset.checked_add(I64_SIZE).ok_or(DbError::OutOfBounds)?;
        if end > self.buf.len() {
            return Err(DbError::OutOfBounds);
        }
        self.buf[offset..end].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn get_bytes(&self, offset: usize) -> Result<&[u8]> {
        let length = self.get_int(offset)?;
        let length = usize::try_from(length).map_err(|_| DbError::OutOfBounds)?;
        let start = offset + I64_SIZE;
        let end = start.checked_add(length).ok_or(DbError::OutOfBounds)?;
        if end > self.buf.len() {
            return Err(DbError::OutOfBounds);
        }
        Ok(&self.buf[start..end])
    }

    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let start = offset.checked_add(I64_SIZE).ok_or(DbError::OutOfBounds)?;
        let end = start.checked_add(bytes.len()).ok_or(DbError::OutOfBounds)?;
        if end > self.buf.len() {
            return Err(DbError::OutOfBounds);
        }
        self.set_int(offset, bytes.len() as i64)?;
        self.buf[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn get_string(&self, offset: usize) -> Result<String> {
        let bytes = self.get_bytes(offset)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DbError::Corrupt(format!("invalid utf-8 at offset {offset}: {e}")))
    }

    pub fn set_string(&mut self, offset: usize, value: &str) -> Result<()> {
        self.set_bytes(offset, value.as_bytes())
    }
}
