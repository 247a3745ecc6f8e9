//! Storage that is only placed once all code has been emitted.
//!
//! Every operand that names a slot is written as a placeholder and recorded
//! as a patch site of that slot; [`StaticTable::layout`] assigns addresses
//! and fills the placeholders in. Forward branches go through the
//! [`JumpTable`] the same way.

use std::collections::HashMap;

use crate::{
    codegen::{Error, IMAGE_SIZE},
    diagnostic::{Diagnostics, Stage},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Contents {
    /// One zeroed byte.
    Byte,
    /// The characters followed by a zero terminator.
    Str(Box<str>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub name: Box<str>,
    pub contents: Contents,
    /// A string variable takes the address of the slot it was last assigned
    /// from and needs no storage of its own.
    pub alias: Option<SlotId>,
    pub address: Option<u8>,
    /// Offsets of the operand bytes that must hold this slot's address.
    pub patches: Vec<usize>,
}

impl Slot {
    fn size(&self) -> usize {
        match (&self.alias, &self.contents) {
            (Some(_), _) => 0,
            (None, Contents::Byte) => 1,
            (None, Contents::Str(s)) => s.len() + 1,
        }
    }
}

#[derive(Debug, Default)]
pub struct StaticTable {
    slots: Vec<Slot>,
    by_name: HashMap<Box<str>, SlotId>,
}

impl StaticTable {
    pub fn new() -> StaticTable {
        StaticTable::default()
    }

    /// Creates a slot. A name that is already taken keeps its first slot.
    pub fn insert(&mut self, name: impl Into<Box<str>>, contents: Contents) -> SlotId {
        let name = name.into();
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        let id = SlotId(self.slots.len());
        self.by_name.insert(name.clone(), id);
        self.slots.push(Slot {
            name,
            contents,
            alias: None,
            address: None,
            patches: Vec::new(),
        });
        id
    }

    pub fn get(&self, name: &str) -> Option<SlotId> {
        self.by_name.get(name).copied()
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.0]
    }

    pub fn name(&self, id: SlotId) -> &str {
        &self.slot(id).name
    }

    pub fn patch(&mut self, id: SlotId, offset: usize) {
        self.slots[id.0].patches.push(offset);
    }

    /// Makes `target` an alias of `source`, unless `source` already leads
    /// back to `target`, in which case the assignment changes nothing.
    pub fn set_alias(&mut self, target: SlotId, source: SlotId) {
        if self.reaches(source, target) {
            return;
        }
        self.slots[target.0].alias = Some(source);
    }

    /// Whether following aliases from `from` arrives at `to`.
    pub fn reaches(&self, from: SlotId, to: SlotId) -> bool {
        self.chain(from).any(|id| id == to)
    }

    /// The slot that will actually hold the bytes of `id`.
    pub fn resolve(&self, id: SlotId) -> Result<SlotId, Error> {
        self.chain(id)
            .last()
            .filter(|last| self.slot(*last).alias.is_none())
            .ok_or_else(|| {
                Error::Internal(format!("alias cycle through {}", self.name(id)).into())
            })
    }

    /// `id` followed by its aliases, cut short after visiting every slot once.
    fn chain(&self, id: SlotId) -> impl Iterator<Item = SlotId> + '_ {
        std::iter::successors(Some(id), |id| self.slot(*id).alias).take(self.slots.len())
    }

    /// Bytes needed by slots that are not aliases.
    pub fn size(&self) -> usize {
        self.slots.iter().map(Slot::size).sum()
    }

    /// Places every slot starting at `base` and fills in all patch sites.
    /// Concrete slots come first in creation order, then aliases take the
    /// address of the slot they resolve to. Returns the first free offset.
    pub fn layout(
        &mut self,
        base: usize,
        image: &mut [u8; IMAGE_SIZE],
        diagnostics: &mut Diagnostics,
    ) -> Result<usize, Error> {
        let mut next = base;
        for slot in &mut self.slots {
            if slot.alias.is_some() {
                continue;
            }
            let size = slot.size();
            if next + size > IMAGE_SIZE {
                return Err(Error::OutOfMemory { size: next + size });
            }
            if let Contents::Str(s) = &slot.contents {
                image[next..next + s.len()].copy_from_slice(s.as_bytes());
                image[next + s.len()] = 0;
            }
            slot.address = Some(address(next)?);
            diagnostics.debug(
                Stage::CodeGen,
                format!("Allocated {} at ${next:02X}", slot.name),
            );
            next += size;
        }

        for i in 0..self.slots.len() {
            if self.slots[i].alias.is_none() {
                continue;
            }
            let resolved = self.resolve(SlotId(i))?;
            let address = self.slots[resolved.0].address;
            diagnostics.debug(
                Stage::CodeGen,
                format!(
                    "Resolved {} to {}",
                    self.slots[i].name, self.slots[resolved.0].name
                ),
            );
            self.slots[i].address = address;
        }

        for slot in &self.slots {
            let address = slot.address.ok_or_else(|| {
                Error::Internal(format!("{} was never placed", slot.name).into())
            })?;
            for patch in &slot.patches {
                image[*patch] = address;
            }
        }
        Ok(next)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JumpId(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Jump {
    /// Offset of the branch operand.
    patch: usize,
    target: Option<usize>,
}

/// Forward branches whose targets are not known when they are emitted.
#[derive(Debug, Default)]
pub struct JumpTable {
    jumps: Vec<Jump>,
}

impl JumpTable {
    pub fn new() -> JumpTable {
        JumpTable::default()
    }

    pub fn add(&mut self, patch: usize) -> JumpId {
        self.jumps.push(Jump {
            patch,
            target: None,
        });
        JumpId(self.jumps.len() - 1)
    }

    pub fn land(&mut self, id: JumpId, target: usize) {
        self.jumps[id.0].target = Some(target);
    }

    pub fn fill(&self, image: &mut [u8; IMAGE_SIZE]) -> Result<(), Error> {
        for (i, jump) in self.jumps.iter().enumerate() {
            let target = jump
                .target
                .ok_or_else(|| Error::Internal(format!("jump {i} has no target").into()))?;
            image[jump.patch] = relative(jump.patch, target);
        }
        Ok(())
    }
}

/// The branch operand at `patch` that moves the program counter to `target`.
#[allow(clippy::cast_possible_truncation)]
pub fn relative(patch: usize, target: usize) -> u8 {
    let offset = (target + IMAGE_SIZE - (patch + 1) % IMAGE_SIZE) % IMAGE_SIZE;
    offset as u8
}

fn address(offset: usize) -> Result<u8, Error> {
    u8::try_from(offset).map_err(|_| Error::OutOfMemory { size: offset + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn relative_offsets_wrap() {
        assert_eq!(relative(10, 20), 9);
        assert_eq!(relative(20, 10), 245);
        assert_eq!(relative(5, 6), 0);
    }

    #[test]
    fn concrete_slots_first_then_aliases() {
        let mut table = StaticTable::new();
        let a = table.insert("a@0", Contents::Byte);
        let s = table.insert("$s0", Contents::Str("hi".into()));
        let t = table.insert("$t0", Contents::Byte);
        table.set_alias(a, s);
        table.patch(a, 1);
        table.patch(t, 3);
        assert_eq!(table.size(), 4);

        let mut image = [0; IMAGE_SIZE];
        let end = table.layout(10, &mut image, &mut Diagnostics::new());
        assert_eq!(end, Ok(14));
        assert_eq!(&image[10..13], b"hi\0");
        assert_eq!(image[1], 10);
        assert_eq!(image[3], 13);
    }

    #[test]
    fn self_alias_is_ignored() {
        let mut table = StaticTable::new();
        let a = table.insert("a@0", Contents::Byte);
        let b = table.insert("b@0", Contents::Byte);
        table.set_alias(b, a);
        table.set_alias(a, b);
        assert_eq!(table.slot(a).alias, None);
        assert_eq!(table.resolve(b), Ok(a));
        assert!(table.reaches(b, a));
        assert!(!table.reaches(a, b));
    }

    #[test]
    fn overflow_is_out_of_memory() {
        let mut table = StaticTable::new();
        table.insert("$s0", Contents::Str("abcdef".into()));
        let mut image = [0; IMAGE_SIZE];
        let result = table.layout(250, &mut image, &mut Diagnostics::new());
        assert_eq!(result, Err(Error::OutOfMemory { size: 257 }));
    }

    #[test]
    fn unlanded_jump_is_internal() {
        let mut jumps = JumpTable::new();
        let id = jumps.add(4);
        let mut image = [0; IMAGE_SIZE];
        assert!(jumps.fill(&mut image).is_err());
        jumps.land(id, 9);
        assert_eq!(jumps.fill(&mut image), Ok(()));
        assert_eq!(image[4], 4);
    }
}
