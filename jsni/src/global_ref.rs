use crate::callback::ExternalData;
use crate::{Env, GlobalRef, Handle, Value};

/// Runs once when a global reference's value is reclaimed, with the data registered alongside it.
pub type FinalizeCallback = fn(&mut Env, ExternalData);

/// Lifecycle of a global reference.
///
/// `Live` references are strong roots. Once the count drops to zero (or the reference is deleted)
/// while a finalizer is registered, the reference becomes `PendingReclaim`: it no longer keeps its
/// value alive, and the next collection that finds the value unreachable runs the finalizer and
/// frees the entry. Without a finalizer the entry goes straight to `Reclaimed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlobalRefState {
  Live,
  PendingReclaim,
  Reclaimed,
}

struct Finalizer {
  data: ExternalData,
  callback: FinalizeCallback,
}

struct GlobalRefSlot {
  generation: u32,
  state: GlobalRefState,
  /// `None` for a reference created from an empty handle.
  value: Option<Value>,
  count: usize,
  finalizer: Option<Finalizer>,
}

pub(crate) struct GlobalRefTable {
  slots: Vec<GlobalRefSlot>,
  free_list: Vec<u32>,
}

impl GlobalRefTable {
  pub(crate) fn new() -> Self {
    Self {
      slots: Vec::new(),
      free_list: Vec::new(),
    }
  }

  fn insert(&mut self, value: Option<Value>) -> GlobalRef {
    let idx = match self.free_list.pop() {
      Some(idx) => idx as usize,
      None => {
        self.slots.push(GlobalRefSlot {
          generation: 0,
          state: GlobalRefState::Reclaimed,
          value: None,
          count: 0,
          finalizer: None,
        });
        self.slots.len() - 1
      }
    };
    let slot = &mut self.slots[idx];
    debug_assert_eq!(slot.state, GlobalRefState::Reclaimed);
    slot.state = GlobalRefState::Live;
    slot.value = value;
    slot.count = 1;
    slot.finalizer = None;
    GlobalRef::new(idx as u32, slot.generation)
  }

  fn slot(&self, r: GlobalRef) -> Option<&GlobalRefSlot> {
    let slot = self.slots.get(r.index() as usize)?;
    (slot.generation == r.generation() && slot.state != GlobalRefState::Reclaimed).then_some(slot)
  }

  fn slot_mut(&mut self, r: GlobalRef) -> Option<&mut GlobalRefSlot> {
    let slot = self.slots.get_mut(r.index() as usize)?;
    (slot.generation == r.generation() && slot.state != GlobalRefState::Reclaimed).then_some(slot)
  }

  fn free(&mut self, idx: usize) -> Option<Finalizer> {
    let slot = &mut self.slots[idx];
    slot.state = GlobalRefState::Reclaimed;
    slot.value = None;
    slot.count = 0;
    slot.generation = slot.generation.wrapping_add(1);
    self.free_list.push(idx as u32);
    slot.finalizer.take()
  }

  /// Drops the strong hold: pending reclaim with a finalizer, freed without one.
  fn drop_strong(&mut self, r: GlobalRef) {
    let idx = r.index() as usize;
    let Some(slot) = self.slot_mut(r) else {
      return;
    };
    if slot.finalizer.is_some() {
      slot.state = GlobalRefState::PendingReclaim;
      tracing::debug!(?r, "global reference pending reclaim");
    } else {
      self.free(idx);
      tracing::debug!(?r, "global reference reclaimed");
    }
  }

  /// Values held by live references.
  pub(crate) fn strong_values(&self) -> impl Iterator<Item = Value> + '_ {
    self
      .slots
      .iter()
      .filter(|slot| slot.state == GlobalRefState::Live)
      .filter_map(|slot| slot.value)
  }

  /// Indices and values of references waiting for the collector.
  pub(crate) fn pending(&self) -> (Vec<usize>, Vec<Value>) {
    self
      .slots
      .iter()
      .enumerate()
      .filter(|(_, slot)| slot.state == GlobalRefState::PendingReclaim)
      .map(|(idx, slot)| (idx, slot.value.unwrap_or(Value::Undefined)))
      .unzip()
  }

  /// Frees every pending entry whose value did not survive, returning the finalizers to run.
  pub(crate) fn reclaim_dead(
    &mut self,
    pending: &[usize],
    survived: &[bool],
  ) -> Vec<(ExternalData, FinalizeCallback)> {
    let mut finalizers = Vec::new();
    for (&idx, &alive) in pending.iter().zip(survived) {
      if alive {
        continue;
      }
      if let Some(f) = self.free(idx) {
        finalizers.push((f.data, f.callback));
      }
    }
    finalizers
  }
}

impl Env {
  /// Creates a global reference to the value behind `value`, with a count of 1.
  pub fn new_global_value(&mut self, value: Handle) -> GlobalRef {
    self.clear_error_code();
    let value = self.resolve(value);
    let r = self.globals.insert(value);
    tracing::debug!(?r, "global reference created");
    r
  }

  /// Drops the reference immediately, whatever its count.
  ///
  /// With a finalizer registered, the value stays reachable through the reference until the
  /// collector reclaims it; the finalizer runs then.
  pub fn delete_global_value(&mut self, r: GlobalRef) {
    self.clear_error_code();
    match self.globals.slot(r).map(|slot| slot.state) {
      Some(GlobalRefState::Live) => self.globals.drop_strong(r),
      Some(_) | None => tracing::warn!(?r, "deleting a global reference that is not live"),
    }
  }

  /// Increments the count and returns the new value.
  pub fn acquire_global_value(&mut self, r: GlobalRef) -> usize {
    self.clear_error_code();
    match self.globals.slot_mut(r) {
      Some(slot) if slot.state == GlobalRefState::Live => {
        slot.count += 1;
        slot.count
      }
      _ => {
        tracing::warn!(?r, "acquiring a global reference that is not live");
        0
      }
    }
  }

  /// Decrements the count and returns the new value. Reaching zero drops the reference as
  /// [`Env::delete_global_value`] does; releasing at zero is logged and leaves the count at zero.
  pub fn release_global_value(&mut self, r: GlobalRef) -> usize {
    let Some(slot) = self.globals.slot_mut(r) else {
      tracing::warn!(?r, "decreasing ref count when ref count is 0");
      return 0;
    };
    if slot.count == 0 || slot.state != GlobalRefState::Live {
      tracing::warn!(?r, "decreasing ref count when ref count is 0");
      return 0;
    }
    slot.count -= 1;
    let count = slot.count;
    if count == 0 {
      self.globals.drop_strong(r);
    }
    count
  }

  /// Registers the finalizer for `r`, replacing any earlier one.
  pub fn set_finalizer(&mut self, r: GlobalRef, data: ExternalData, callback: FinalizeCallback) {
    match self.globals.slot_mut(r) {
      Some(slot) => slot.finalizer = Some(Finalizer { data, callback }),
      None => tracing::warn!(?r, "setting a finalizer on a reclaimed global reference"),
    }
  }

  /// Returns a new scope-bound handle to the referenced value, or an empty handle once the
  /// reference has been reclaimed.
  pub fn get_global_value(&mut self, r: GlobalRef) -> Handle {
    self.clear_error_code();
    match self.globals.slot(r).and_then(|slot| slot.value) {
      Some(value) => self.arena.push(value),
      None => Handle::EMPTY,
    }
  }

  pub fn global_ref_state(&self, r: GlobalRef) -> GlobalRefState {
    self
      .globals
      .slot(r)
      .map(|slot| slot.state)
      .unwrap_or(GlobalRefState::Reclaimed)
  }

  /// Current count, 0 once reclaimed.
  pub fn global_ref_count(&self, r: GlobalRef) -> usize {
    self.globals.slot(r).map(|slot| slot.count).unwrap_or(0)
  }
}
