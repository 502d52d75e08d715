//! Fixed little-endian binary primitives shared by the command envelope,
//! the journal writer and snapshot serialization.
//!
//! Every multi-byte primitive is written least-significant-byte first and
//! read back the same way, independent of host endianness. Maps and
//! sequences are length-prefixed with an `i32` count followed by the
//! concatenated encoding of their elements.

use crate::error::{Error, Result};

/// A growable byte buffer commands and snapshots are encoded into.
pub type WriteBuf = Vec<u8>;

pub fn write_i8(out: &mut WriteBuf, v: i8) {
    out.push(v as u8);
}

pub fn write_i32(out: &mut WriteBuf, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i64(out: &mut WriteBuf, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_bytes(out: &mut WriteBuf, bytes: &[u8]) {
    write_i32(out, bytes.len() as i32);
    out.extend_from_slice(bytes);
}

/// A cursor over an immutable byte slice, tracking how far decoding has
/// progressed. Every read either advances the cursor or returns a
/// [`Error::Codec`] without consuming anything.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Codec(format!(
                "unexpected end of buffer: wanted {n} bytes, {} remaining",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("checked length");
        Ok(i32::from_le_bytes(bytes))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("checked length");
        Ok(i64::from_le_bytes(bytes))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(Error::Codec(format!("negative byte length: {len}")));
        }
        self.take(len as usize)
    }

    /// Reads exactly `n` raw bytes with no length prefix, for formats
    /// that carry their own external length field (e.g. the journal's
    /// compressed-block framing).
    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }
}

/// Writes a length-prefixed map, encoding each key/value pair with the
/// supplied callbacks.
pub fn write_map<K, V>(
    out: &mut WriteBuf,
    items: impl ExactSizeIterator<Item = (K, V)>,
    mut write_key: impl FnMut(&mut WriteBuf, K),
    mut write_val: impl FnMut(&mut WriteBuf, V),
) {
    write_i32(out, items.len() as i32);
    for (k, v) in items {
        write_key(out, k);
        write_val(out, v);
    }
}

/// Reads a length-prefixed map built by [`write_map`].
pub fn read_map<K, V>(
    r: &mut Reader<'_>,
    mut read_key: impl FnMut(&mut Reader<'_>) -> Result<K>,
    mut read_val: impl FnMut(&mut Reader<'_>) -> Result<V>,
) -> Result<Vec<(K, V)>> {
    let count = r.read_i32()?;
    if count < 0 {
        return Err(Error::Codec(format!("negative map length: {count}")));
    }
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let k = read_key(r)?;
        let v = read_val(r)?;
        items.push((k, v));
    }
    Ok(items)
}
