use core::fmt;

/// Where an allocation lives in the [`Heap`](crate::Heap): its slot and the slot's generation at
/// allocation time.
///
/// Sweeping a slot bumps its generation, so an id only resolves while the allocation it was issued
/// for is alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId {
  index: u32,
  generation: u32,
}

impl HeapId {
  pub(crate) fn new(index: u32, generation: u32) -> Self {
    Self { index, generation }
  }

  #[inline]
  pub fn index(self) -> u32 {
    self.index
  }

  #[inline]
  pub fn generation(self) -> u32 {
    self.generation
  }
}

impl fmt::Debug for HeapId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "HeapId({}@{})", self.index, self.generation)
  }
}

macro_rules! gc_id {
  ($(#[$doc:meta])* $name:ident) => {
    $(#[$doc])*
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct $name(pub(crate) HeapId);

    impl $name {
      #[inline]
      pub fn id(self) -> HeapId {
        self.0
      }
    }
  };
}

gc_id!(
  /// An object allocation.
  GcObject
);
gc_id!(
  /// A string allocation.
  GcString
);
gc_id!(
  /// A symbol allocation.
  GcSymbol
);

/// Slot of a host-held root in the heap's root table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RootId(pub(crate) u32);

/// A scope-bound reference to a value, as handed to native code.
///
/// A handle is an index into the owning [`Env`](crate::Env)'s handle arena plus a stamp. It does
/// not own any engine memory: it stays valid while the scope frame that created it is live (or
/// after it was escaped into the parent frame). Once the frame is popped, the arena slot may be
/// reused under a new stamp, and the old handle resolves like [`Handle::EMPTY`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
  index: u32,
  stamp: u64,
}

impl Handle {
  /// Never resolves to a value. Stamp 0 is never issued to a live handle.
  pub const EMPTY: Handle = Handle { index: 0, stamp: 0 };

  pub(crate) fn new(index: u32, stamp: u64) -> Self {
    debug_assert_ne!(stamp, 0);
    Self { index, stamp }
  }

  /// Only [`Handle::EMPTY`] is empty by this check; stale handles are not, though every API
  /// resolves them the same way.
  #[inline]
  pub fn is_empty(self) -> bool {
    self.stamp == 0
  }

  #[inline]
  pub(crate) fn index(self) -> u32 {
    self.index
  }

  #[inline]
  pub(crate) fn stamp(self) -> u64 {
    self.stamp
  }
}

impl Default for Handle {
  fn default() -> Self {
    Self::EMPTY
  }
}

impl fmt::Debug for Handle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      f.write_str("Handle(empty)")
    } else {
      write!(f, "Handle({}#{})", self.index, self.stamp)
    }
  }
}

/// A reference to an entry in the environment's global reference table.
///
/// Entries are recycled under a new generation once reclaimed, so a stale `GlobalRef` never
/// reaches the entry that replaced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalRef {
  slot: HeapId,
}

impl GlobalRef {
  pub(crate) fn new(index: u32, generation: u32) -> Self {
    Self {
      slot: HeapId::new(index, generation),
    }
  }

  #[inline]
  pub(crate) fn index(self) -> u32 {
    self.slot.index()
  }

  #[inline]
  pub(crate) fn generation(self) -> u32 {
    self.slot.generation()
  }
}

impl fmt::Debug for GlobalRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "GlobalRef({}@{})", self.index(), self.generation())
  }
}
