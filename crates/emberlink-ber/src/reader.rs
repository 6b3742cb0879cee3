use crate::error::{BerError, Result};
use crate::primitive::{decode_boolean, decode_integer, decode_real, decode_relative_oid};
use crate::scalar::Scalar;
use crate::tag::{decode_length, universal, Length, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    At(usize),
    Eoc,
}

#[derive(Debug, Clone, Copy)]
struct Element {
    outer: Tag,
    inner: Tag,
    outer_end: End,
    contents: usize,
    inner_end: End,
}

/// Pull reader over explicitly tagged EmBER data.
///
/// `read` advances to the next field at the current nesting level and returns
/// `false` once the enclosing container (or the input) is exhausted. Calling
/// `read` while positioned on a container descends into it.
#[derive(Debug)]
pub struct EmberReader<'a> {
    src: &'a [u8],
    pos: usize,
    levels: Vec<Element>,
    current: Option<Element>,
}

impl<'a> EmberReader<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            levels: Vec::new(),
            current: None,
        }
    }

    /// Number of containers the reader has descended into.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Byte offset of the next unread octet.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Advance to the next field.
    pub fn read(&mut self) -> Result<bool> {
        if let Some(element) = self.current.take() {
            if element.inner.constructed {
                self.levels.push(element);
                self.pos = element.contents;
            } else {
                self.leave(element)?;
            }
        }

        if let Some(container) = self.levels.last().copied() {
            let at_end = match container.inner_end {
                End::At(end) if self.pos > end => {
                    return Err(BerError::LengthOverrun { offset: self.pos })
                }
                End::At(end) => self.pos == end,
                End::Eoc => {
                    if self.pos >= self.src.len() {
                        return Err(BerError::Unterminated { offset: self.pos });
                    }
                    self.at_end_of_contents()
                }
            };
            if at_end {
                self.levels.pop();
                self.leave(container)?;
                return Ok(false);
            }
        } else if self.pos >= self.src.len() {
            return Ok(false);
        }

        let element = self.read_header()?;
        self.current = Some(element);
        Ok(true)
    }

    /// Skip the current field, including everything nested inside it.
    pub fn skip(&mut self) -> Result<()> {
        let Some(element) = self.current else {
            return Ok(());
        };

        if !element.inner.constructed {
            self.current = None;
            return self.leave(element);
        }

        if let End::At(end) = element.outer_end {
            self.current = None;
            self.pos = end;
            return Ok(());
        }

        while self.read()? {
            self.skip()?;
        }
        Ok(())
    }

    /// Discard the rest of the enclosing container, leaving the reader on its parent level.
    pub fn skip_to_end_of_container(&mut self) -> Result<()> {
        self.skip()?;
        while self.read()? {
            self.skip()?;
        }
        Ok(())
    }

    pub fn outer_tag(&self) -> Result<Tag> {
        Ok(self.element()?.outer)
    }

    pub fn inner_tag(&self) -> Result<Tag> {
        Ok(self.element()?.inner)
    }

    /// Returns true if the current field wraps a constructed value.
    pub fn is_container(&self) -> bool {
        self.current.is_some_and(|e| e.inner.constructed)
    }

    pub fn read_boolean(&self) -> Result<bool> {
        decode_boolean(self.contents_of(Tag::BOOLEAN)?)
    }

    pub fn read_integer(&self) -> Result<i64> {
        decode_integer(self.contents_of(Tag::INTEGER)?)
    }

    pub fn read_i32(&self) -> Result<i32> {
        i32::try_from(self.read_integer()?).map_err(|_| BerError::IntegerOverflow { bits: 32 })
    }

    pub fn read_u32(&self) -> Result<u32> {
        u32::try_from(self.read_integer()?).map_err(|_| BerError::IntegerOverflow { bits: 32 })
    }

    pub fn read_real(&self) -> Result<f64> {
        decode_real(self.contents_of(Tag::REAL)?)
    }

    pub fn read_utf8(&self) -> Result<&'a str> {
        Ok(std::str::from_utf8(self.contents_of(Tag::UTF8_STRING)?)?)
    }

    pub fn read_octets(&self) -> Result<&'a [u8]> {
        self.contents_of(Tag::OCTET_STRING)
    }

    pub fn read_null(&self) -> Result<()> {
        if self.contents_of(Tag::NULL)?.is_empty() {
            Ok(())
        } else {
            Err(BerError::InvalidNull)
        }
    }

    pub fn read_relative_oid(&self) -> Result<Vec<u32>> {
        decode_relative_oid(self.contents_of(Tag::RELATIVE_OID)?)
    }

    /// Decode the current field whatever its universal type.
    pub fn read_scalar(&self) -> Result<Scalar> {
        let element = self.element()?;
        let contents = self.contents(element)?;
        let inner = element.inner;
        if inner.class != crate::tag::Class::Universal {
            return Err(BerError::NotScalar(inner));
        }

        match inner.number {
            universal::BOOLEAN => decode_boolean(contents).map(Scalar::Boolean),
            universal::INTEGER => decode_integer(contents).map(Scalar::Integer),
            universal::REAL => decode_real(contents).map(Scalar::Real),
            universal::UTF8_STRING => Ok(Scalar::Utf8(std::str::from_utf8(contents)?.to_owned())),
            universal::OCTET_STRING => Ok(Scalar::Octets(contents.to_vec())),
            universal::NULL if contents.is_empty() => Ok(Scalar::Null),
            universal::NULL => Err(BerError::InvalidNull),
            universal::RELATIVE_OID => decode_relative_oid(contents).map(Scalar::RelativeOid),
            _ => Err(BerError::NotScalar(inner)),
        }
    }

    fn element(&self) -> Result<Element> {
        self.current.ok_or(BerError::NoCurrentElement)
    }

    fn contents(&self, element: Element) -> Result<&'a [u8]> {
        match element.inner_end {
            End::At(end) if !element.inner.constructed => Ok(&self.src[element.contents..end]),
            _ => Err(BerError::NotScalar(element.inner)),
        }
    }

    fn contents_of(&self, expected: Tag) -> Result<&'a [u8]> {
        let element = self.element()?;
        if !element.inner.is_universal(expected.number) || element.inner.constructed {
            return Err(BerError::TagMismatch {
                expected,
                actual: element.inner,
            });
        }
        self.contents(element)
    }

    fn at_end_of_contents(&self) -> bool {
        self.src.get(self.pos..self.pos + 2) == Some(&[0, 0][..])
    }

    fn expect_end_of_contents(&mut self) -> Result<()> {
        if !self.at_end_of_contents() {
            return Err(BerError::Unterminated { offset: self.pos });
        }
        self.pos += 2;
        Ok(())
    }

    // Move past the inner value (already positioned at its end for containers)
    // and then past the outer field.
    fn leave(&mut self, element: Element) -> Result<()> {
        match element.inner_end {
            End::At(end) if !element.inner.constructed => self.pos = end,
            End::At(_) => {}
            End::Eoc => self.expect_end_of_contents()?,
        }

        match element.outer_end {
            End::At(end) if self.pos > end => Err(BerError::LengthOverrun { offset: self.pos }),
            End::At(end) => {
                self.pos = end;
                Ok(())
            }
            End::Eoc => self.expect_end_of_contents(),
        }
    }

    fn bounded(&self, start: usize, len: usize, limit: Option<usize>) -> Result<usize> {
        let end = start
            .checked_add(len)
            .ok_or(BerError::InvalidLength { offset: start })?;
        if let Some(limit) = limit {
            if end > limit {
                return Err(BerError::LengthOverrun { offset: start });
            }
        }
        if end > self.src.len() {
            return Err(BerError::Truncated { offset: start });
        }
        Ok(end)
    }

    fn read_header(&mut self) -> Result<Element> {
        let limit = match self.levels.last().map(|e| e.inner_end) {
            Some(End::At(end)) => Some(end),
            _ => None,
        };

        let (outer, used) = Tag::decode(self.src, self.pos)?;
        if !outer.constructed {
            return Err(BerError::PrimitiveOuter(outer));
        }
        self.pos += used;
        let (outer_len, used) = decode_length(self.src, self.pos)?;
        self.pos += used;
        let outer_end = match outer_len {
            Length::Definite(len) => End::At(self.bounded(self.pos, len, limit)?),
            Length::Indefinite => End::Eoc,
        };

        let inner_limit = match outer_end {
            End::At(end) => Some(end),
            End::Eoc => limit,
        };
        let (inner, used) = Tag::decode(self.src, self.pos)?;
        self.pos += used;
        let (inner_len, used) = decode_length(self.src, self.pos)?;
        self.pos += used;
        let inner_end = match inner_len {
            Length::Definite(len) => End::At(self.bounded(self.pos, len, inner_limit)?),
            Length::Indefinite if !inner.constructed => {
                return Err(BerError::IndefinitePrimitive(inner))
            }
            Length::Indefinite => End::Eoc,
        };

        if inner.is_universal(universal::END_OF_CONTENTS) {
            return Err(BerError::Unterminated { offset: self.pos });
        }

        Ok(Element {
            outer,
            inner,
            outer_end,
            contents: self.pos,
            inner_end,
        })
    }
}
