//! Little-endian primitive reader and writer for the compact encoding.

use super::error::{DecodeError, EncodeError};
use super::types::Components;
use crate::core::constants::{MAX_ID_LEN, MAX_TEXT_LEN};
use crate::core::{Quat, Vec3};

/// Append-only body writer.
#[derive(Debug, Default)]
pub(crate) struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Short identifier: u8 length + UTF-8.
    pub(crate) fn put_id(&mut self, field: &'static str, s: &str) -> Result<(), EncodeError> {
        if s.len() > MAX_ID_LEN {
            return Err(EncodeError::IdTooLong { field, len: s.len() });
        }
        self.put_u8(s.len() as u8);
        self.put_raw(s.as_bytes());
        Ok(())
    }

    /// Free text: u16 length + UTF-8.
    pub(crate) fn put_text(&mut self, field: &'static str, s: &str) -> Result<(), EncodeError> {
        if s.len() > MAX_TEXT_LEN {
            return Err(EncodeError::TextTooLong { field, len: s.len() });
        }
        self.put_u16(s.len() as u16);
        self.put_raw(s.as_bytes());
        Ok(())
    }

    /// Opaque blob: u32 length + bytes.
    pub(crate) fn put_blob(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.put_raw(bytes);
    }

    pub(crate) fn put_vec3(&mut self, v: Vec3) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
    }

    pub(crate) fn put_quat(&mut self, q: Quat) {
        self.put_f32(q.x);
        self.put_f32(q.y);
        self.put_f32(q.z);
        self.put_f32(q.w);
    }

    /// u16 entry count, then `id key` / `text value` pairs.
    pub(crate) fn put_components(&mut self, components: &Components) -> Result<(), EncodeError> {
        if components.len() > u16::MAX as usize {
            return Err(EncodeError::TooManyEntries {
                field: "components",
                count: components.len(),
            });
        }
        self.put_u16(components.len() as u16);
        for (key, value) in components {
            self.put_id("component key", key)?;
            self.put_text("component value", value)?;
        }
        Ok(())
    }
}

/// Cursor over a body whose length was already validated against the header.
///
/// Running out of bytes here means the payload is shorter than its shape, so
/// it is reported as [`DecodeError::Truncated`], never as incomplete.
#[derive(Debug)]
pub(crate) struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated { field });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    pub(crate) fn get_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>(field)?[0])
    }

    pub(crate) fn get_u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array(field)?))
    }

    pub(crate) fn get_u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array(field)?))
    }

    pub(crate) fn get_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array(field)?))
    }

    pub(crate) fn get_f32(&mut self, field: &'static str) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take_array(field)?))
    }

    fn get_str(&mut self, field: &'static str, len: usize) -> Result<String, DecodeError> {
        let bytes = self.take(field, len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    pub(crate) fn get_id(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.get_u8(field)? as usize;
        self.get_str(field, len)
    }

    pub(crate) fn get_text(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.get_u16(field)? as usize;
        self.get_str(field, len)
    }

    pub(crate) fn get_blob(&mut self, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        let len = self.get_u32(field)? as usize;
        Ok(self.take(field, len)?.to_vec())
    }

    pub(crate) fn get_vec3(&mut self, field: &'static str) -> Result<Vec3, DecodeError> {
        Ok(Vec3::new(
            self.get_f32(field)?,
            self.get_f32(field)?,
            self.get_f32(field)?,
        ))
    }

    pub(crate) fn get_quat(&mut self, field: &'static str) -> Result<Quat, DecodeError> {
        Ok(Quat::new(
            self.get_f32(field)?,
            self.get_f32(field)?,
            self.get_f32(field)?,
            self.get_f32(field)?,
        ))
    }

    pub(crate) fn get_components(&mut self) -> Result<Components, DecodeError> {
        let count = self.get_u16("components")?;
        let mut components = Components::new();
        for _ in 0..count {
            let key = self.get_id("component key")?;
            let value = self.get_text("component value")?;
            components.insert(key, value);
        }
        Ok(components)
    }

    /// Fails if any bytes are left unread.
    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_length_limit() {
        let mut w = WireWriter::new();
        let long = "x".repeat(256);
        assert_eq!(
            w.put_id("entity_id", &long),
            Err(EncodeError::IdTooLong {
                field: "entity_id",
                len: 256
            })
        );
        assert!(w.put_id("entity_id", &"x".repeat(255)).is_ok());
    }

    #[test]
    fn test_reader_reports_truncation() {
        let mut w = WireWriter::new();
        w.put_text("message", "hello").unwrap();
        let bytes = w.into_inner();

        let mut r = WireReader::new(&bytes[..4]);
        assert_eq!(
            r.get_text("message"),
            Err(DecodeError::Truncated { field: "message" })
        );
    }

    #[test]
    fn test_reader_rejects_invalid_utf8() {
        let bytes = [2u8, 0xC3, 0x28];
        let mut r = WireReader::new(&bytes);
        assert_eq!(
            r.get_id("entity_id"),
            Err(DecodeError::InvalidUtf8 { field: "entity_id" })
        );
    }

    #[test]
    fn test_finish_detects_trailing_bytes() {
        let bytes = [1u8, 2, 3];
        let mut r = WireReader::new(&bytes);
        r.get_u8("a").unwrap();
        assert_eq!(r.finish(), Err(DecodeError::TrailingBytes(2)));
    }

    #[test]
    fn test_floats_are_fixed_width_le() {
        let mut w = WireWriter::new();
        w.put_vec3(Vec3::new(1.0, 0.0, -2.0));
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[8..], &(-2.0f32).to_le_bytes());
    }
}
