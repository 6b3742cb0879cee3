use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{BerError, Result};
use crate::primitive::{encode_integer, encode_real, encode_relative_oid};
use crate::scalar::Scalar;
use crate::tag::{encode_length, Tag, INDEFINITE};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// How container lengths are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthForm {
    /// Containers are buffered and prefixed with their exact length.
    Definite,
    /// Containers are opened with `0x80` and closed with end-of-contents octets.
    #[default]
    Indefinite,
}

struct OpenContainer {
    outer: Tag,
    inner: Tag,
    start: usize,
}

/// Streaming writer for explicitly tagged EmBER values.
///
/// Every value is written as an outer field tag wrapping one inner TLV, so
/// `write_integer(Tag::context(0), 5)` produces `A0 03 02 01 05`.
pub struct EmberWriter {
    buf: BytesMut,
    form: LengthForm,
    open: Vec<OpenContainer>,
}

impl EmberWriter {
    /// Create a writer that uses the indefinite length form for containers.
    pub fn new() -> Self {
        Self::with_form(LengthForm::default())
    }

    pub fn with_form(form: LengthForm) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            form,
            open: Vec::new(),
        }
    }

    pub fn form(&self) -> LengthForm {
        self.form
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Open a container field: `outer` wraps a constructed `inner` type.
    pub fn start_container(&mut self, outer: Tag, inner: Tag) {
        let outer = outer.into_constructed();
        let inner = inner.into_constructed();

        match self.form {
            LengthForm::Definite => {
                self.open.push(OpenContainer {
                    outer,
                    inner,
                    start: self.buf.len(),
                });
            }
            LengthForm::Indefinite => {
                outer.encode(&mut self.buf);
                self.buf.put_u8(INDEFINITE);
                inner.encode(&mut self.buf);
                self.buf.put_u8(INDEFINITE);
                self.open.push(OpenContainer {
                    outer,
                    inner,
                    start: self.buf.len(),
                });
            }
        }
    }

    pub fn start_sequence(&mut self, outer: Tag) {
        self.start_container(outer, Tag::SEQUENCE);
    }

    pub fn start_set(&mut self, outer: Tag) {
        self.start_container(outer, Tag::SET);
    }

    pub fn start_application(&mut self, outer: Tag, number: u32) {
        self.start_container(outer, Tag::application(number));
    }

    /// Close the most recently opened container.
    pub fn end_container(&mut self) -> Result<()> {
        let container = self.open.pop().ok_or(BerError::UnbalancedContainer)?;

        match self.form {
            LengthForm::Definite => {
                let contents = self.buf.split_off(container.start);
                let mut inner = BytesMut::with_capacity(contents.len() + 8);
                container.inner.encode(&mut inner);
                encode_length(contents.len(), &mut inner);
                inner.unsplit(contents);

                container.outer.encode(&mut self.buf);
                encode_length(inner.len(), &mut self.buf);
                self.buf.unsplit(inner);
            }
            LengthForm::Indefinite => {
                self.buf.put_slice(&[0, 0, 0, 0]);
            }
        }

        Ok(())
    }

    pub fn write_boolean(&mut self, outer: Tag, value: bool) {
        let octet = if value { 0xFF } else { 0x00 };
        self.write_primitive(outer, Tag::BOOLEAN, &[octet]);
    }

    pub fn write_integer(&mut self, outer: Tag, value: i64) {
        let mut contents = BytesMut::with_capacity(8);
        encode_integer(value, &mut contents);
        self.write_primitive(outer, Tag::INTEGER, &contents);
    }

    pub fn write_real(&mut self, outer: Tag, value: f64) {
        let mut contents = BytesMut::with_capacity(10);
        encode_real(value, &mut contents);
        self.write_primitive(outer, Tag::REAL, &contents);
    }

    pub fn write_utf8(&mut self, outer: Tag, value: &str) {
        self.write_primitive(outer, Tag::UTF8_STRING, value.as_bytes());
    }

    pub fn write_octets(&mut self, outer: Tag, value: &[u8]) {
        self.write_primitive(outer, Tag::OCTET_STRING, value);
    }

    pub fn write_null(&mut self, outer: Tag) {
        self.write_primitive(outer, Tag::NULL, &[]);
    }

    pub fn write_relative_oid(&mut self, outer: Tag, path: &[u32]) {
        let mut contents = BytesMut::with_capacity(path.len() * 2);
        encode_relative_oid(path, &mut contents);
        self.write_primitive(outer, Tag::RELATIVE_OID, &contents);
    }

    pub fn write_scalar(&mut self, outer: Tag, value: &Scalar) {
        match value {
            Scalar::Boolean(v) => self.write_boolean(outer, *v),
            Scalar::Integer(v) => self.write_integer(outer, *v),
            Scalar::Real(v) => self.write_real(outer, *v),
            Scalar::Utf8(v) => self.write_utf8(outer, v),
            Scalar::Octets(v) => self.write_octets(outer, v),
            Scalar::Null => self.write_null(outer),
            Scalar::RelativeOid(v) => self.write_relative_oid(outer, v),
        }
    }

    /// Finish writing and return the encoded bytes.
    pub fn finish(self) -> Result<Bytes> {
        if !self.open.is_empty() {
            return Err(BerError::OpenContainers(self.open.len()));
        }
        Ok(self.buf.freeze())
    }

    fn write_primitive(&mut self, outer: Tag, inner: Tag, contents: &[u8]) {
        let inner = Tag {
            constructed: false,
            ..inner
        };
        let mut inner_header = BytesMut::with_capacity(8);
        inner.encode(&mut inner_header);
        encode_length(contents.len(), &mut inner_header);

        outer.into_constructed().encode(&mut self.buf);
        encode_length(inner_header.len() + contents.len(), &mut self.buf);
        self.buf.put_slice(&inner_header);
        self.buf.put_slice(contents);
    }
}

impl Default for EmberWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmberWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmberWriter")
            .field("form", &self.form)
            .field("len", &self.buf.len())
            .field(
                "open",
                &self
                    .open
                    .iter()
                    .map(|c| (c.outer, c.inner))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_field_layout() {
        let mut writer = EmberWriter::new();
        writer.write_integer(Tag::context(0), 5);
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.as_ref(), &[0xA0, 0x03, 0x02, 0x01, 0x05]);
    }

    #[test]
    fn definite_container_layout() {
        let mut writer = EmberWriter::with_form(LengthForm::Definite);
        writer.start_application(Tag::context(0), 2);
        writer.write_integer(Tag::context(0), 32);
        writer.end_container().unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0xA0, 0x07, 0x62, 0x05, 0xA0, 0x03, 0x02, 0x01, 0x20]
        );
    }

    #[test]
    fn indefinite_container_layout() {
        let mut writer = EmberWriter::with_form(LengthForm::Indefinite);
        writer.start_sequence(Tag::context(1));
        writer.write_boolean(Tag::context(0), true);
        writer.end_container().unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0xA1, 0x80, 0x30, 0x80, 0xA0, 0x03, 0x01, 0x01, 0xFF, 0, 0, 0, 0]
        );
    }

    #[test]
    fn nested_definite_lengths_are_exact() {
        let mut writer = EmberWriter::with_form(LengthForm::Definite);
        writer.start_application(Tag::application(0), 11);
        writer.start_application(Tag::context(0), 3);
        writer.write_integer(Tag::context(0), 1);
        writer.start_set(Tag::context(1));
        writer.write_utf8(Tag::context(0), "root");
        writer.end_container().unwrap();
        writer.end_container().unwrap();
        writer.end_container().unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes[1] as usize, bytes.len() - 2);
    }

    #[test]
    fn long_contents_use_long_length_form() {
        let mut writer = EmberWriter::new();
        writer.write_octets(Tag::context(0), &[0xAB; 200]);
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..5], &[0xA0, 0x81, 0xCB, 0x04, 0x81]);
        assert_eq!(bytes.len(), 3 + 3 + 200);
    }

    #[test]
    fn unbalanced_end_is_rejected() {
        let mut writer = EmberWriter::new();
        assert_eq!(writer.end_container(), Err(BerError::UnbalancedContainer));
    }

    #[test]
    fn finish_with_open_container_is_rejected() {
        let mut writer = EmberWriter::with_form(LengthForm::Definite);
        writer.start_sequence(Tag::context(0));
        assert_eq!(writer.depth(), 1);
        assert_eq!(writer.finish().unwrap_err(), BerError::OpenContainers(1));
    }
}
