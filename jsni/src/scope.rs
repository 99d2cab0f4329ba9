use crate::error::{fatal_error, ErrorCode};
use crate::{Env, Handle, Value};
use std::mem;

struct ArenaSlot {
  value: Value,
  stamp: u64,
}

/// Backing storage for scope-bound [`Handle`]s.
///
/// Handles are allocated strictly LIFO: popping a scope frame truncates the arena back to the
/// length recorded when the frame was pushed. Every push gets a fresh stamp, so a handle that
/// outlived its frame no longer matches the slot's stamp once the slot is reused.
pub(crate) struct HandleArena {
  slots: Vec<ArenaSlot>,
  /// Strictly increasing, never reused.
  next_stamp: u64,
}

impl HandleArena {
  pub(crate) fn new() -> Self {
    Self {
      slots: Vec::new(),
      next_stamp: 1,
    }
  }

  pub(crate) fn push(&mut self, value: Value) -> Handle {
    // Starts at 1; stamp 0 is reserved for `Handle::EMPTY`.
    let stamp = self.next_stamp;
    self.next_stamp += 1;
    let index = self.slots.len() as u32;
    self.slots.push(ArenaSlot { value, stamp });
    Handle::new(index, stamp)
  }

  pub(crate) fn get(&self, handle: Handle) -> Option<Value> {
    if handle.is_empty() {
      return None;
    }
    let slot = self.slots.get(handle.index() as usize)?;
    (slot.stamp == handle.stamp()).then_some(slot.value)
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.slots.len()
  }

  pub(crate) fn truncate(&mut self, len: usize) {
    self.slots.truncate(len);
  }

  pub(crate) fn values(&self) -> impl Iterator<Item = Value> + '_ {
    self.slots.iter().map(|slot| slot.value)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScopeKind {
  Plain,
  Escapable,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ScopeFrame {
  kind: ScopeKind,
  handles_at_entry: usize,
}

impl Env {
  /// Resolves a handle to the value it refers to. Empty and stale handles resolve to `None`.
  pub fn resolve(&self, handle: Handle) -> Option<Value> {
    self.arena.get(handle)
  }

  /// Creates a handle for `value` in the innermost live scope.
  pub fn new_handle(&mut self, value: Value) -> Handle {
    debug_assert!(self.heap.is_valid_value(value));
    self.arena.push(value)
  }

  /// Number of handles currently live in this environment.
  pub fn handle_count(&self) -> usize {
    self.arena.len()
  }

  /// Number of local scopes pushed and not yet popped.
  pub fn scope_depth(&self) -> usize {
    self.frames.len()
  }

  /// Opens a local scope. Handles created until the matching [`Env::pop_local_scope`] belong to
  /// it.
  pub fn push_local_scope(&mut self) {
    self.clear_error_code();
    self.push_frame(ScopeKind::Plain);
  }

  /// Closes the innermost local scope, releasing every handle created since the matching push.
  ///
  /// With no scope pushed in the current native call, this records
  /// [`ErrorCode::ScopeUnderflow`] and does nothing else. An escapable scope may be closed this
  /// way too, in which case nothing escapes.
  pub fn pop_local_scope(&mut self) {
    self.clear_error_code();
    let Some(frame) = self.pop_frame() else {
      return;
    };
    self.arena.truncate(frame.handles_at_entry);
  }

  /// Opens a local scope from which exactly one handle can be promoted on exit.
  pub fn push_escapable_local_scope(&mut self) {
    self.clear_error_code();
    self.push_frame(ScopeKind::Escapable);
  }

  /// Closes the innermost escapable scope, re-creating `value` in the enclosing scope.
  ///
  /// Returns the new handle, or [`Handle::EMPTY`] if `value` was empty (or stale). With no scope
  /// pushed this records [`ErrorCode::ScopeUnderflow`] and returns an empty handle. Closing a
  /// plain scope this way is a fatal error.
  pub fn pop_escapable_local_scope(&mut self, value: Handle) -> Handle {
    self.clear_error_code();
    if let Some(top) = self.frames.last() {
      if self.frames.len() > self.frame_floor && top.kind != ScopeKind::Escapable {
        fatal_error(
          self.options().fatal_mode,
          "Env::pop_escapable_local_scope",
          "the innermost local scope is not escapable",
        );
      }
    }
    let escaped = self.resolve(value);
    let Some(frame) = self.pop_frame() else {
      return Handle::EMPTY;
    };
    self.arena.truncate(frame.handles_at_entry);
    match escaped {
      Some(value) => self.arena.push(value),
      None => Handle::EMPTY,
    }
  }

  fn push_frame(&mut self, kind: ScopeKind) {
    tracing::trace!(?kind, depth = self.frames.len(), "push local scope");
    self.frames.push(ScopeFrame {
      kind,
      handles_at_entry: self.arena.len(),
    });
  }

  fn pop_frame(&mut self) -> Option<ScopeFrame> {
    if self.frames.len() <= self.frame_floor {
      tracing::warn!("local scope popped more times than it was pushed");
      self.set_error_code(ErrorCode::ScopeUnderflow);
      return None;
    }
    let frame = self.frames.pop()?;
    tracing::trace!(kind = ?frame.kind, depth = self.frames.len(), "pop local scope");
    Some(frame)
  }

  /// Runs `f` as one native call: its own implicit scope and its own scope-stack floor.
  ///
  /// Scopes left open by `f` are unwound, and every handle it created is released.
  pub(crate) fn with_native_frame<R>(&mut self, f: impl FnOnce(&mut Env) -> R) -> R {
    let arena_base = self.arena.len();
    let frames_base = self.frames.len();
    let saved_floor = mem::replace(&mut self.frame_floor, frames_base);

    let result = f(self);

    if self.frames.len() > frames_base {
      tracing::warn!(
        unclosed = self.frames.len() - frames_base,
        "native call returned with local scopes still open"
      );
      self.frames.truncate(frames_base);
    }
    self.arena.truncate(arena_base);
    self.frame_floor = saved_floor;
    result
  }
}
