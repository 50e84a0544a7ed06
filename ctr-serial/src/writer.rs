//! Serializer: drives record schemas over an object graph and produces the
//! final file bytes.
//!
//! Writing is two-phase. During the walk, inline values go straight into
//! the current section while every indirect field reserves a 4-byte slot
//! and enqueues its referent on the target section's relocation ledger.
//! Ledgers then drain breadth-first, section by section in declared order,
//! which reproduces the reference tool's layout: a referent discovered
//! first is emitted first, and its own referents queue behind everything
//! already discovered. Slots are patched once section base offsets are
//! known, after which the sections are concatenated into one buffer.
//!
//! The writer borrows the root object for the whole session (`'v`), so
//! deferred referents are either borrows into the graph or small owned
//! buffers produced by custom codecs.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::error::WriteError;
use crate::options::{LengthPos, Options, PointerKind};
use crate::resolver::TaggedRecord;
use crate::scalar::Scalar;
use crate::schema::{Codec, FieldKind, Record, Schema};
use crate::section::{align_up, FileLayout, PatchEntry, SectionBuf, SectionId, SectionSpan, Slot};

/// Alignment of deferred records and scalar buffers within a section.
const VALUE_ALIGN: u32 = 4;
/// Alignment of raw image blobs.
const BLOB_ALIGN: u32 = 0x10;

type EmitFn<'v> = Box<dyn FnOnce(&mut Writer<'v>) -> Result<(), WriteError> + 'v>;

enum Pending<'v> {
    /// A deferred referent; `emit` appends its bytes at the section cursor.
    Value {
        emit: EmitFn<'v>,
        patch: usize,
        align: u32,
    },
    /// An interned string; emitted once per distinct value.
    Str { text: &'v str, patch: usize },
}

/// Binary serializer for one conversion.
pub struct Writer<'v> {
    opts: Options,
    version: u32,
    sections: [SectionBuf; 3],
    pending: [VecDeque<Pending<'v>>; 3],
    patches: Vec<PatchEntry>,
    interned: HashMap<&'v str, u32>,
    cur: SectionId,
    field: &'static str,
}

impl<'v> Writer<'v> {
    pub fn new(opts: Options, version: u32) -> Self {
        Self {
            opts,
            version,
            sections: [
                SectionBuf::new(SectionId::Contents),
                SectionBuf::new(SectionId::Strings),
                SectionBuf::new(SectionId::Image),
            ],
            pending: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            patches: Vec::new(),
            interned: HashMap::new(),
            cur: SectionId::Contents,
            field: "<root>",
        }
    }

    pub fn options(&self) -> Options {
        self.opts
    }

    /// Running format revision, checked by version-gated fields.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Reserve zero-filled header bytes at the start of a section. The
    /// container layer patches them into the returned buffer after
    /// [`finish`](Self::finish), once all lengths are known.
    pub fn prologue(&mut self, id: SectionId, len: u32) {
        self.sections[id.index()].set_prologue(len);
    }

    // ------------------------------------------------------------------
    // Inline primitives
    // ------------------------------------------------------------------

    pub fn scalar<S: Scalar>(&mut self, value: S) -> Result<(), WriteError> {
        let mut buf = Vec::with_capacity(S::SIZE);
        value.put(&mut buf);
        self.section_mut().append(&buf)?;
        Ok(())
    }

    pub fn u8(&mut self, value: u8) -> Result<(), WriteError> {
        self.scalar(value)
    }

    pub fn u16(&mut self, value: u16) -> Result<(), WriteError> {
        self.scalar(value)
    }

    pub fn u32(&mut self, value: u32) -> Result<(), WriteError> {
        self.scalar(value)
    }

    pub fn i32(&mut self, value: i32) -> Result<(), WriteError> {
        self.scalar(value)
    }

    pub fn f32(&mut self, value: f32) -> Result<(), WriteError> {
        self.scalar(value)
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.section_mut().append(bytes)?;
        Ok(())
    }

    pub fn zeros(&mut self, len: usize) -> Result<(), WriteError> {
        self.section_mut().reserve(len)?;
        Ok(())
    }

    /// Inline run of scalars (fixed inline arrays).
    pub fn scalar_slice<S: Scalar>(&mut self, values: &[S]) -> Result<(), WriteError> {
        let mut buf = Vec::with_capacity(values.len() * S::SIZE);
        for v in values {
            v.put(&mut buf);
        }
        self.section_mut().append(&buf)?;
        Ok(())
    }

    pub fn f32_slice(&mut self, values: &[f32]) -> Result<(), WriteError> {
        self.scalar_slice(values)
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Write a record inline at the current cursor, driving its schema.
    pub fn record<T: Record>(&mut self, value: &'v T) -> Result<(), WriteError> {
        let schema = T::schema();
        let saved = self.field;
        self.field = schema.type_name();
        let res = match schema.codec() {
            Codec::Custom { write, .. } => write(value, self),
            Codec::Wrapped { pre_write, .. } => {
                pre_write(value, self).and_then(|_| self.walk(schema, value))
            }
            Codec::Default => self.walk(schema, value),
        };
        self.field = saved;
        res
    }

    fn walk<T: Record>(&mut self, schema: &Schema<T>, value: &'v T) -> Result<(), WriteError> {
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
            (desc.write)(value, self)?;
        }
        Ok(())
    }

    /// Contiguous inline records.
    pub fn inline_list<T: Record>(&mut self, items: &'v [T]) -> Result<(), WriteError> {
        for item in items {
            self.record(item)?;
        }
        Ok(())
    }

    /// Inline records with a compile-time-known count; the length is
    /// validated before any bytes are written.
    pub fn fixed_inline_list<T: Record>(
        &mut self,
        items: &'v [T],
        expected: usize,
    ) -> Result<(), WriteError> {
        self.check_len(items.len(), expected)?;
        self.inline_list(items)
    }

    // ------------------------------------------------------------------
    // Indirection
    // ------------------------------------------------------------------

    /// Reserve a pointer slot and defer the referent to this section's
    /// ledger.
    pub fn reference<T: Record>(&mut self, value: &'v T) -> Result<(), WriteError> {
        self.deferred_in(self.cur, VALUE_ALIGN, None, move |w| w.record(value))
    }

    /// Counted indirect array of records.
    pub fn list<T: Record>(&mut self, items: &'v [T]) -> Result<(), WriteError> {
        self.deferred(Some(items.len() as u32), move |w| w.inline_list(items))
    }

    /// Indirect array with an implied count (no count word on the wire).
    pub fn fixed_list<T: Record>(
        &mut self,
        items: &'v [T],
        expected: usize,
    ) -> Result<(), WriteError> {
        self.check_len(items.len(), expected)?;
        self.deferred_in(self.cur, VALUE_ALIGN, None, move |w| w.inline_list(items))
    }

    /// Pointer to a polymorphic referent: the variant's wire tag is written
    /// at the referent head, then its payload.
    pub fn tagged_ref<T: TaggedRecord>(&mut self, value: &'v T) -> Result<(), WriteError> {
        self.deferred_in(self.cur, VALUE_ALIGN, None, move |w| {
            w.u32(value.wire_tag())?;
            value.write_payload(w)
        })
    }

    /// Counted indirect array of scalars.
    pub fn scalar_list<S: Scalar + 'static>(&mut self, values: &'v [S]) -> Result<(), WriteError> {
        self.deferred(Some(values.len() as u32), move |w| w.scalar_slice(values))
    }

    /// Counted indirect array of scalars computed by a custom codec; the
    /// buffer is owned by the ledger until it drains.
    pub fn scalar_list_owned<S: Scalar + 'static>(
        &mut self,
        values: Vec<S>,
    ) -> Result<(), WriteError> {
        self.deferred(Some(values.len() as u32), move |w| w.scalar_slice(&values))
    }

    /// Raw byte blob, routed to the image section and 0x10-aligned.
    pub fn blob(&mut self, bytes: &'v [u8]) -> Result<(), WriteError> {
        self.deferred_in(SectionId::Image, BLOB_ALIGN, Some(bytes.len() as u32), move |w| {
            w.bytes(bytes)
        })
    }

    /// The raw deferral primitive: count word per policy (if any), pointer
    /// slot, referent enqueued on the current section's ledger. Compound
    /// shapes (dicts) are built from this.
    pub fn deferred(
        &mut self,
        count: Option<u32>,
        emit: impl FnOnce(&mut Writer<'v>) -> Result<(), WriteError> + 'v,
    ) -> Result<(), WriteError> {
        self.deferred_in(self.cur, VALUE_ALIGN, count, emit)
    }

    /// [`deferred`](Self::deferred) with an explicit target section and
    /// alignment.
    pub fn deferred_in(
        &mut self,
        target: SectionId,
        align: u32,
        count: Option<u32>,
        emit: impl FnOnce(&mut Writer<'v>) -> Result<(), WriteError> + 'v,
    ) -> Result<(), WriteError> {
        // An empty array is a count of zero and a null slot; nothing is
        // deferred and the slot is never patched.
        if count == Some(0) {
            self.u32(0)?;
            self.u32(0)?;
            return Ok(());
        }
        if let (Some(n), LengthPos::BeforePointer) = (count, self.opts.lengths) {
            self.u32(n)?;
        }
        let patch = self.reserve_slot()?;
        if let (Some(n), LengthPos::AfterPointer) = (count, self.opts.lengths) {
            self.u32(n)?;
        }
        self.pending[target.index()].push_back(Pending::Value {
            emit: Box::new(emit),
            patch,
            align,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Pointer to an interned NUL-terminated UTF-8 string in the strings
    /// section. Equal values collapse to one on-disk instance.
    pub fn string(&mut self, text: &'v str) -> Result<(), WriteError> {
        let patch = self.reserve_slot()?;
        self.pending[SectionId::Strings.index()].push_back(Pending::Str { text, patch });
        Ok(())
    }

    /// Counted indirect array of string pointers.
    pub fn string_list(&mut self, items: &'v [String]) -> Result<(), WriteError> {
        self.deferred(Some(items.len() as u32), move |w| {
            for item in items {
                w.string(item)?;
            }
            Ok(())
        })
    }

    /// Pointer to a NUL-terminated UTF-16 string. UTF-16 values are not
    /// interned.
    pub fn string_utf16(&mut self, text: &'v str, big_endian: bool) -> Result<(), WriteError> {
        let mut encoded = Vec::with_capacity((text.len() + 1) * 2);
        for unit in text.encode_utf16() {
            let b = if big_endian {
                unit.to_be_bytes()
            } else {
                unit.to_le_bytes()
            };
            encoded.extend_from_slice(&b);
        }
        encoded.extend_from_slice(&[0, 0]);
        let patch = self.reserve_slot()?;
        self.pending[SectionId::Strings.index()].push_back(Pending::Value {
            emit: Box::new(move |w| w.bytes(&encoded)),
            patch,
            align: 2,
        });
        Ok(())
    }

    /// Counted indirect array of UTF-16 string pointers.
    pub fn string_list_utf16(
        &mut self,
        items: &'v [String],
        big_endian: bool,
    ) -> Result<(), WriteError> {
        self.deferred(Some(items.len() as u32), move |w| {
            for item in items {
                w.string_utf16(item, big_endian)?;
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------

    /// Drain all ledgers, assign section bases, patch every pointer slot
    /// and concatenate the sections. Returns the file bytes and the layout
    /// for the container header patch.
    pub fn finish(mut self) -> Result<(Vec<u8>, FileLayout), WriteError> {
        self.drain()?;

        let mut spans: [Option<SectionSpan>; 3] = [None, None, None];
        let mut cursor = 0u32;
        for id in SectionId::ALL {
            let sec = &self.sections[id.index()];
            if id != SectionId::Contents && !sec.has_values() {
                continue;
            }
            cursor = align_up(cursor, id.alignment());
            spans[id.index()] = Some(SectionSpan {
                offset: cursor,
                len: sec.len(),
            });
            cursor = cursor
                .checked_add(sec.len())
                .ok_or(WriteError::SectionOverflow { section: id.name() })?;
        }

        let mut out = Vec::with_capacity(cursor as usize);
        let [contents, strings, image] = self.sections;
        for (buf, span) in [contents, strings, image].into_iter().zip(spans) {
            if let Some(span) = span {
                out.resize(span.offset as usize, 0);
                out.extend_from_slice(&buf.into_data());
            }
        }

        for entry in &self.patches {
            let Some(target) = entry.target else {
                debug_assert!(false, "slot reserved but referent never emitted");
                continue;
            };
            let slot_abs = spans[entry.slot.section.index()]
                .map(|s| s.offset + entry.slot.offset)
                .unwrap_or(entry.slot.offset);
            let target_abs = spans[target.section.index()]
                .map(|s| s.offset + target.offset)
                .unwrap_or(target.offset);
            let value = match self.opts.pointers {
                PointerKind::SelfRelative => {
                    let delta = i64::from(target_abs) - i64::from(slot_abs);
                    u32::try_from(delta).map_err(|_| WriteError::PointerRange {
                        field: entry.field,
                        slot: u64::from(slot_abs),
                        target: u64::from(target_abs),
                    })?
                }
                PointerKind::Absolute => target_abs,
            };
            let at = slot_abs as usize;
            out[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }

        let layout = FileLayout {
            contents: spans[0].expect("contents section always present"),
            strings: spans[1],
            image: spans[2],
            total_len: out.len() as u32,
        };
        tracing::debug!(
            contents = layout.contents.len,
            strings = layout.strings.map(|s| s.len).unwrap_or(0),
            image = layout.image.map(|s| s.len).unwrap_or(0),
            patched = self.patches.len(),
            "serialized object graph"
        );
        Ok((out, layout))
    }

    fn drain(&mut self) -> Result<(), WriteError> {
        for id in SectionId::ALL {
            self.cur = id;
            while let Some(pending) = self.pending[id.index()].pop_front() {
                match pending {
                    Pending::Value { emit, patch, align } => {
                        let offset = self.sections[id.index()].align_to(align)?;
                        self.patches[patch].target = Some(Slot {
                            section: id,
                            offset,
                        });
                        emit(self)?;
                    }
                    Pending::Str { text, patch } => {
                        let offset = match self.interned.get(text) {
                            Some(&offset) => offset,
                            None => {
                                let sec = &mut self.sections[SectionId::Strings.index()];
                                let offset = sec.append(text.as_bytes())?;
                                sec.append(&[0])?;
                                self.interned.insert(text, offset);
                                offset
                            }
                        };
                        self.patches[patch].target = Some(Slot {
                            section: SectionId::Strings,
                            offset,
                        });
                    }
                }
            }
        }
        debug_assert!(self.pending.iter().all(VecDeque::is_empty));
        Ok(())
    }

    fn reserve_slot(&mut self) -> Result<usize, WriteError> {
        let offset = self.sections[self.cur.index()].reserve(4)?;
        self.patches.push(PatchEntry {
            slot: Slot {
                section: self.cur,
                offset,
            },
            target: None,
            field: self.field,
        });
        Ok(self.patches.len() - 1)
    }

    fn check_len(&self, actual: usize, expected: usize) -> Result<(), WriteError> {
        if actual != expected {
            return Err(WriteError::LengthMismatch {
                field: self.field,
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn section_mut(&mut self) -> &mut SectionBuf {
        &mut self.sections[self.cur.index()]
    }
}
