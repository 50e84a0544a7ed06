//! Deserializer: the inverse schema walk.
//!
//! Reading is a seek-and-return graph walk, not a linear scan. Every
//! indirect field resolves its pointer, saves the cursor, decodes the
//! referent at the target (recursing into further seeks), and restores the
//! cursor so sibling fields continue contiguously. The pending-read stack
//! of the design is simply the call stack of this recursion.
//!
//! All failures are fatal for the current read and carry the field name
//! and byte offset; no partial object is ever returned.

use crate::error::ReadError;
use crate::options::{LengthPos, Options, PointerKind};
use crate::resolver::TaggedRecord;
use crate::scalar::Scalar;
use crate::schema::{Codec, FieldKind, Record, Schema};

/// Binary deserializer over a randomly addressable byte buffer.
pub struct Reader<'d> {
    data: &'d [u8],
    pos: usize,
    opts: Options,
    version: u32,
    field: &'static str,
}

impl<'d> Reader<'d> {
    pub fn new(data: &'d [u8], opts: Options) -> Self {
        Self {
            data,
            pos: 0,
            opts,
            version: 0,
            field: "<root>",
        }
    }

    pub fn options(&self) -> Options {
        self.opts
    }

    /// Running format revision, initialized from the container header.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    /// Run `f` with the version counter replaced by `version`, restoring
    /// it afterwards. Used for nested blocks that carry their own embedded
    /// revision.
    pub fn scoped_version<R>(
        &mut self,
        version: u32,
        f: impl FnOnce(&mut Self) -> Result<R, ReadError>,
    ) -> Result<R, ReadError> {
        let saved = self.version;
        self.version = version;
        let res = f(self);
        self.version = saved;
        res
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Field currently being decoded, for error construction in custom
    /// codecs.
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn seek(&mut self, pos: u64) -> Result<(), ReadError> {
        if pos > self.data.len() as u64 {
            return Err(ReadError::UnexpectedEof {
                field: self.field,
                offset: pos,
            });
        }
        self.pos = pos as usize;
        Ok(())
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.take(len)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inline primitives
    // ------------------------------------------------------------------

    pub fn scalar<S: Scalar>(&mut self) -> Result<S, ReadError> {
        Ok(S::get(self.take(S::SIZE)?))
    }

    pub fn u8(&mut self) -> Result<u8, ReadError> {
        self.scalar()
    }

    pub fn u16(&mut self) -> Result<u16, ReadError> {
        self.scalar()
    }

    pub fn u32(&mut self) -> Result<u32, ReadError> {
        self.scalar()
    }

    pub fn i32(&mut self) -> Result<i32, ReadError> {
        self.scalar()
    }

    pub fn f32(&mut self) -> Result<f32, ReadError> {
        self.scalar()
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'d [u8], ReadError> {
        self.take(len)
    }

    /// Inline run of scalars with a compile-time-known count.
    pub fn f32_array<const N: usize>(&mut self) -> Result<[f32; N], ReadError> {
        let mut out = [0.0f32; N];
        for v in &mut out {
            *v = self.f32()?;
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Decode a record at the current cursor by driving its schema over a
    /// default-constructed instance.
    pub fn record<T: Record>(&mut self) -> Result<T, ReadError> {
        let schema = T::schema();
        let saved = self.field;
        self.field = schema.type_name();
        let mut value = T::default();
        let res = match schema.codec() {
            Codec::Custom { read, .. } => read(&mut value, self),
            Codec::Wrapped { post_read, .. } => self
                .walk(schema, &mut value)
                .and_then(|_| post_read(&mut value, self)),
            Codec::Default => self.walk(schema, &mut value),
        };
        self.field = saved;
        res.map(|_| value)
    }

    fn walk<T: Record>(&mut self, schema: &Schema<T>, value: &mut T) -> Result<(), ReadError> {
        for desc in schema.fields() {
            if matches!(desc.kind, FieldKind::Ignored) {
                continue;
            }
            if let Some(gate) = desc.gate {
                if !gate.admits(self.version) {
                    continue;
                }
            }
            self.field = desc.name;
            (desc.read)(value, self)?;
        }
        Ok(())
    }

    /// Contiguous inline records.
    pub fn inline_list<T: Record>(&mut self, count: usize) -> Result<Vec<T>, ReadError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.record()?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Indirection
    // ------------------------------------------------------------------

    /// Decode a required single referent through a pointer slot.
    pub fn reference<T: Record>(&mut self) -> Result<T, ReadError> {
        self.indirect(|d| d.record())
    }

    /// Counted indirect array of records.
    pub fn list<T: Record>(&mut self) -> Result<Vec<T>, ReadError> {
        self.counted(Vec::new(), |d, count| d.inline_list(count as usize))
    }

    /// Indirect array with an implied count (no count word on the wire).
    pub fn fixed_list<T: Record>(&mut self, count: usize) -> Result<Vec<T>, ReadError> {
        self.indirect(move |d| d.inline_list(count))
    }

    /// Resolve a tagged pointer: read the discriminant at the referent
    /// head, look up the concrete variant, decode its payload. An
    /// unregistered discriminant is a hard decode failure.
    pub fn tagged_ref<T: TaggedRecord>(&mut self) -> Result<T, ReadError> {
        self.indirect(|d| {
            let tag_offset = d.position();
            let tag = d.u32()?;
            let entry =
                T::tag_table()
                    .resolve(tag)
                    .ok_or(ReadError::UnknownTag {
                        field: d.field,
                        type_name: T::NAME,
                        offset: tag_offset,
                        tag,
                    })?;
            (entry.read)(d)
        })
    }

    /// Counted indirect array of scalars.
    pub fn scalar_list<S: Scalar>(&mut self) -> Result<Vec<S>, ReadError> {
        self.counted(Vec::new(), |d, count| {
            let count = count as usize;
            d.check_remaining(count, S::SIZE)?;
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(d.scalar()?);
            }
            Ok(out)
        })
    }

    /// Counted byte blob (image data), copied out verbatim.
    pub fn blob(&mut self) -> Result<Vec<u8>, ReadError> {
        self.counted(Vec::new(), |d, count| {
            let count = count as usize;
            d.check_remaining(count, 1)?;
            Ok(d.bytes(count)?.to_vec())
        })
    }

    /// The raw indirection primitive: resolve a required pointer, seek to
    /// the target, run `f`, restore the cursor.
    pub fn indirect<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, ReadError>,
    ) -> Result<R, ReadError> {
        let slot = self.position();
        let raw = self.u32()?;
        let target = self.resolve_pointer(raw, slot)?.ok_or(ReadError::NullPointer {
            field: self.field,
            slot,
        })?;
        let saved = self.pos;
        self.pos = target as usize;
        let res = f(self);
        self.pos = saved;
        res
    }

    /// The counted indirection primitive: decode the count and pointer in
    /// policy order, return `empty` for a zero count (the pointer may be
    /// null in that case), otherwise seek and run `f`.
    pub fn counted<R>(
        &mut self,
        empty: R,
        f: impl FnOnce(&mut Self, u32) -> Result<R, ReadError>,
    ) -> Result<R, ReadError> {
        let (count, slot, raw) = match self.opts.lengths {
            LengthPos::BeforePointer => {
                let count = self.u32()?;
                let slot = self.position();
                let raw = self.u32()?;
                (count, slot, raw)
            }
            LengthPos::AfterPointer => {
                let slot = self.position();
                let raw = self.u32()?;
                let count = self.u32()?;
                (count, slot, raw)
            }
        };
        if count == 0 {
            return Ok(empty);
        }
        if u64::from(count) > self.data.len() as u64 {
            return Err(ReadError::CountOutOfRange {
                field: self.field,
                offset: slot,
                count,
            });
        }
        let target = self.resolve_pointer(raw, slot)?.ok_or(ReadError::NullPointer {
            field: self.field,
            slot,
        })?;
        let saved = self.pos;
        self.pos = target as usize;
        let res = f(self, count);
        self.pos = saved;
        res
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Required pointer to a NUL-terminated UTF-8 string.
    pub fn string(&mut self) -> Result<String, ReadError> {
        let slot = self.position();
        let raw = self.u32()?;
        let target = self.resolve_pointer(raw, slot)?.ok_or(ReadError::NullPointer {
            field: self.field,
            slot,
        })?;
        let tail = &self.data[target as usize..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::Malformed {
                field: self.field,
                what: "unterminated string",
                offset: target,
            })?;
        String::from_utf8(tail[..len].to_vec()).map_err(|_| ReadError::Malformed {
            field: self.field,
            what: "utf-8 string",
            offset: target,
        })
    }

    /// Counted indirect array of string pointers.
    pub fn string_list(&mut self) -> Result<Vec<String>, ReadError> {
        self.counted(Vec::new(), |d, count| {
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                out.push(d.string()?);
            }
            Ok(out)
        })
    }

    /// Required pointer to a NUL-terminated UTF-16 string.
    pub fn string_utf16(&mut self, big_endian: bool) -> Result<String, ReadError> {
        let slot = self.position();
        let raw = self.u32()?;
        let target = self.resolve_pointer(raw, slot)?.ok_or(ReadError::NullPointer {
            field: self.field,
            slot,
        })?;
        let mut units = Vec::new();
        let mut at = target as usize;
        loop {
            let Some(pair) = self.data.get(at..at + 2) else {
                return Err(ReadError::Malformed {
                    field: self.field,
                    what: "unterminated utf-16 string",
                    offset: target,
                });
            };
            let unit = if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            };
            if unit == 0 {
                break;
            }
            units.push(unit);
            at += 2;
        }
        String::from_utf16(&units).map_err(|_| ReadError::Malformed {
            field: self.field,
            what: "utf-16 string",
            offset: target,
        })
    }

    /// Counted indirect array of UTF-16 string pointers.
    pub fn string_list_utf16(&mut self, big_endian: bool) -> Result<Vec<String>, ReadError> {
        self.counted(Vec::new(), |d, count| {
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                out.push(d.string_utf16(big_endian)?);
            }
            Ok(out)
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn take(&mut self, len: usize) -> Result<&'d [u8], ReadError> {
        let Some(end) = self.pos.checked_add(len) else {
            return Err(ReadError::UnexpectedEof {
                field: self.field,
                offset: self.position(),
            });
        };
        let Some(bytes) = self.data.get(self.pos..end) else {
            return Err(ReadError::UnexpectedEof {
                field: self.field,
                offset: self.position(),
            });
        };
        self.pos = end;
        Ok(bytes)
    }

    /// Turn a slot value into an absolute, bounds-checked target offset.
    /// A zero slot is "no referent"; callers decide whether that is an
    /// empty array or a null-pointer error.
    fn resolve_pointer(&self, raw: u32, slot: u64) -> Result<Option<u64>, ReadError> {
        if raw == 0 {
            return Ok(None);
        }
        let target = match self.opts.pointers {
            PointerKind::SelfRelative => slot + u64::from(raw),
            PointerKind::Absolute => u64::from(raw),
        };
        if target >= self.data.len() as u64 {
            return Err(ReadError::PointerOutOfRange {
                field: self.field,
                slot,
                target,
                len: self.data.len() as u64,
            });
        }
        Ok(Some(target))
    }

    fn check_remaining(&self, count: usize, elem_size: usize) -> Result<(), ReadError> {
        let need = count as u64 * elem_size as u64;
        let have = (self.data.len() - self.pos) as u64;
        if need > have {
            return Err(ReadError::CountOutOfRange {
                field: self.field,
                offset: self.position(),
                count: count as u32,
            });
        }
        Ok(())
    }
}
