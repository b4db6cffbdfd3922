//! Indirect object bookkeeping for the cross-reference section.
//!
//! Every object id handed out by the registry gets an entry recording
//! whether it is in use, where it was written and whether the entry must
//! appear in the next xref section. Entry 0 is the head of the free list.

use crate::error::{Error, Result};
use crate::io::OutputStream;
use crate::object::{Object, ObjectId, ObjectRef};
use crate::reader::PdfReader;
use crate::writer::objects_context::ObjectsContext;
use crate::writer::primitive_writer::TokenSeparator;
use crate::xref::{XRefEntry, XrefSource};
use std::io::{Read, Seek};

/// Largest offset a 10 digit xref entry can hold.
pub const MAX_WRITE_POSITION: u64 = 9_999_999_999;

/// Highest generation number; a slot at this generation cannot be reused.
pub const MAX_GENERATION: u16 = 65535;

/// In-use or free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    /// Object exists
    Used,
    /// Slot is on the free list
    Free,
}

/// Registry entry for one object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectWriteInformation {
    /// In use or free
    pub reference_type: ReferenceType,
    /// A write position has been recorded
    pub written: bool,
    /// Must be listed in the next xref section
    pub dirty: bool,
    /// Offset of the object header (meaningful for written used entries)
    pub write_position: u64,
    /// Generation number
    pub generation: u16,
}

impl ObjectWriteInformation {
    fn fresh() -> Self {
        Self {
            reference_type: ReferenceType::Used,
            written: false,
            dirty: true,
            write_position: 0,
            generation: 0,
        }
    }

    fn free_head() -> Self {
        Self {
            reference_type: ReferenceType::Free,
            written: false,
            dirty: true,
            write_position: 0,
            generation: MAX_GENERATION,
        }
    }
}

/// Registry of indirect objects, indexed by object id.
#[derive(Debug, Clone)]
pub struct IndirectObjectsReferenceRegistry {
    entries: Vec<ObjectWriteInformation>,
}

impl Default for IndirectObjectsReferenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IndirectObjectsReferenceRegistry {
    /// Registry holding only the free-list head.
    pub fn new() -> Self {
        Self {
            entries: vec![ObjectWriteInformation::free_head()],
        }
    }

    /// Back to the state of [`new`](Self::new).
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.push(ObjectWriteInformation::free_head());
    }

    /// Hand out the next object id.
    pub fn allocate_new_object_id(&mut self) -> ObjectId {
        self.entries.push(ObjectWriteInformation::fresh());
        (self.entries.len() - 1) as ObjectId
    }

    fn entry_mut(&mut self, id: ObjectId) -> Result<&mut ObjectWriteInformation> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.entries.get_mut(index))
            .ok_or(Error::ObjectNotAllocated(id))
    }

    /// Record where an object was written. An object is written once.
    pub fn mark_object_as_written(&mut self, id: ObjectId, position: u64) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.written {
            log::error!(
                "Object {} was already written at position {}; cannot write it again at {}",
                id,
                entry.write_position,
                position
            );
            return Err(Error::ObjectAlreadyWritten {
                id,
                position: entry.write_position,
            });
        }
        if position > MAX_WRITE_POSITION {
            log::error!("Write position {} for object {} does not fit an xref entry", position, id);
            return Err(Error::PositionOutOfRange(position));
        }
        entry.written = true;
        entry.dirty = true;
        entry.write_position = position;
        Ok(())
    }

    /// Record a new position for an object rewritten by an incremental
    /// update.
    pub fn mark_object_as_updated(&mut self, id: ObjectId, position: u64) -> Result<()> {
        if position > MAX_WRITE_POSITION {
            return Err(Error::PositionOutOfRange(position));
        }
        let entry = self.entry_mut(id)?;
        entry.reference_type = ReferenceType::Used;
        entry.written = true;
        entry.dirty = true;
        entry.write_position = position;
        Ok(())
    }

    /// Free an object, bumping its generation so the slot can be reused.
    pub fn delete_object(&mut self, id: ObjectId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.generation == MAX_GENERATION {
            log::error!("Object {} cannot be deleted: generation number exhausted", id);
            return Err(Error::GenerationExhausted(id));
        }
        entry.generation += 1;
        entry.write_position = 0;
        entry.reference_type = ReferenceType::Free;
        entry.written = false;
        entry.dirty = true;
        Ok(())
    }

    /// Entry for `id`.
    pub fn nth_object_reference(&self, id: ObjectId) -> Result<&ObjectWriteInformation> {
        self.object_write_information(id).ok_or(Error::ObjectNotAllocated(id))
    }

    /// Entry for `id`, `None` when never allocated.
    pub fn object_write_information(&self, id: ObjectId) -> Option<&ObjectWriteInformation> {
        usize::try_from(id).ok().and_then(|index| self.entries.get(index))
    }

    /// Reference to `id` carrying its current generation.
    pub fn object_reference(&self, id: ObjectId) -> Result<ObjectRef> {
        Ok(ObjectRef::new(id, self.nth_object_reference(id)?.generation))
    }

    /// Number of entries, the free-list head included.
    pub fn objects_count(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Iterate entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectWriteInformation)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id as ObjectId, entry))
    }

    /// Append an entry copied from an existing file. Such entries are not
    /// dirty: the original xref already lists them.
    pub fn append_existing_item(
        &mut self,
        reference_type: ReferenceType,
        generation: u16,
        written: bool,
        write_position: u64,
    ) -> ObjectId {
        self.entries.push(ObjectWriteInformation {
            reference_type,
            written,
            dirty: false,
            write_position,
            generation,
        });
        (self.entries.len() - 1) as ObjectId
    }

    /// Import the objects of a file being modified. Entry 0 is kept.
    pub fn setup_xref_from_modified_file(&mut self, source: &dyn XrefSource) {
        self.reset();
        for id in 1..source.xref_size() {
            match source.xref_entry(id) {
                Some(XRefEntry::Uncompressed { offset, generation }) => {
                    self.append_existing_item(ReferenceType::Used, generation, true, offset);
                },
                Some(XRefEntry::Compressed { .. }) => {
                    self.append_existing_item(ReferenceType::Used, 0, true, 0);
                },
                Some(XRefEntry::Free { generation, .. }) => {
                    self.append_existing_item(ReferenceType::Free, generation, false, 0);
                },
                None => {
                    self.append_existing_item(ReferenceType::Free, 0, false, 0);
                },
            }
        }
        log::debug!("Imported {} objects from the modified file", self.entries.len() - 1);
    }

    /// Write the registry as object `object_id` of a state file, followed by
    /// one object per entry.
    pub fn write_state<S: OutputStream>(&self, state: &mut ObjectsContext<S>, object_id: ObjectId) -> Result<()> {
        let entry_ids: Vec<ObjectId> = self
            .entries
            .iter()
            .map(|_| state.registry_mut().allocate_new_object_id())
            .collect();

        state.start_new_indirect_object_with_id(object_id)?;
        let dict = state.start_dictionary()?;
        state.write_key(&dict, "Type")?;
        state.write_name("IndirectObjectsReferenceRegistry", TokenSeparator::EndLine)?;
        state.write_key(&dict, "Entries")?;
        state.start_array()?;
        for id in &entry_ids {
            state.write_indirect_object_reference(*id, TokenSeparator::Space)?;
        }
        state.end_array(TokenSeparator::EndLine)?;
        state.end_dictionary(dict)?;
        state.end_indirect_object()?;

        for (entry, id) in self.entries.iter().zip(entry_ids) {
            state.start_new_indirect_object_with_id(id)?;
            let dict = state.start_dictionary()?;
            state.write_key(&dict, "Type")?;
            state.write_name("ObjectWriteInformation", TokenSeparator::EndLine)?;
            state.write_key(&dict, "ReferenceType")?;
            let kind = match entry.reference_type {
                ReferenceType::Used => "Used",
                ReferenceType::Free => "Free",
            };
            state.write_name(kind, TokenSeparator::EndLine)?;
            state.write_key(&dict, "Written")?;
            state.write_boolean(entry.written, TokenSeparator::EndLine)?;
            state.write_key(&dict, "Dirty")?;
            state.write_boolean(entry.dirty, TokenSeparator::EndLine)?;
            state.write_key(&dict, "WritePosition")?;
            state.write_integer(entry.write_position as i64, TokenSeparator::EndLine)?;
            state.write_key(&dict, "Generation")?;
            state.write_integer(i64::from(entry.generation), TokenSeparator::EndLine)?;
            state.end_dictionary(dict)?;
            state.end_indirect_object()?;
        }
        Ok(())
    }

    /// Restore the registry from a state file written by
    /// [`write_state`](Self::write_state).
    pub fn read_state<R: Read + Seek>(&mut self, reader: &mut PdfReader<R>, object_id: ObjectId) -> Result<()> {
        let root = reader.object(object_id)?;
        let refs: Vec<ObjectRef> = state_dict(&root)?
            .get("Entries")
            .and_then(Object::as_array)
            .ok_or_else(|| Error::InvalidState("registry state has no /Entries".to_string()))?
            .iter()
            .map(|item| {
                item.as_reference()
                    .ok_or_else(|| Error::InvalidState("registry entry is not a reference".to_string()))
            })
            .collect::<Result<_>>()?;

        let mut entries = Vec::with_capacity(refs.len());
        for reference in refs {
            let object = reader.object(reference.id)?;
            let dict = state_dict(&object)?;
            let reference_type = match dict.get("ReferenceType").and_then(Object::as_name) {
                Some("Used") => ReferenceType::Used,
                Some("Free") => ReferenceType::Free,
                other => return Err(Error::InvalidState(format!("unknown reference type {:?}", other))),
            };
            let integer = |key: &str| {
                dict.get(key)
                    .and_then(Object::as_integer)
                    .ok_or_else(|| Error::InvalidState(format!("registry entry has no /{}", key)))
            };
            let boolean = |key: &str| dict.get(key).and_then(Object::as_bool).unwrap_or(false);
            entries.push(ObjectWriteInformation {
                reference_type,
                written: boolean("Written"),
                dirty: boolean("Dirty"),
                write_position: integer("WritePosition")? as u64,
                generation: integer("Generation")? as u16,
            });
        }
        if entries.is_empty() {
            return Err(Error::InvalidState("registry state is empty".to_string()));
        }
        self.entries = entries;
        Ok(())
    }
}

pub(crate) fn state_dict(object: &Object) -> Result<&crate::object::Dictionary> {
    object.as_dict().ok_or_else(|| Error::InvalidObjectType {
        expected: "Dictionary".to_string(),
        found: object.type_name().to_string(),
    })
}
