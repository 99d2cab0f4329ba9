use crate::callback::{ExternalData, NativeCallback};
use crate::property::PropertyEntry;
use crate::string::JsString;
use crate::typed_array::TypedArrayStorage;
use crate::{GcObject, GcString, GcSymbol, HeapId, RootId, Value, VmError};
use core::mem;

/// Prototype walks give up after this many links.
pub const MAX_PROTOTYPE_CHAIN: usize = 10_000;

/// Memory budget of a [`Heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapLimits {
  /// Allocations that would take live bytes past this fail with [`VmError::OutOfMemory`].
  pub max_bytes: usize,
  /// Live bytes above which the owning environment collects at its next native call boundary.
  pub gc_threshold: usize,
}

impl HeapLimits {
  pub fn new(max_bytes: usize, gc_threshold: usize) -> Self {
    Self {
      max_bytes,
      gc_threshold,
    }
  }
}

/// Engine model backing an [`Env`](crate::Env): a non-moving mark/sweep heap.
///
/// Every allocation lives in an index-addressed slot. Ids carry the slot's generation, which is
/// bumped whenever the slot is swept, so an id that outlived its allocation is detected instead of
/// aliasing whatever reuses the slot.
///
/// The heap has no notion of scopes or handles and never collects by itself; the environment
/// decides when to run a cycle and what to pass in as roots.
pub struct Heap {
  limits: HeapLimits,
  live_bytes: usize,
  collections: u64,

  slots: Vec<HeapSlot>,
  vacant: Vec<u32>,
  symbol_counter: u64,

  /// Host-held roots, indexed by [`RootId`].
  host_roots: Vec<Option<Value>>,
  vacant_roots: Vec<u32>,
}

struct HeapSlot {
  generation: u32,
  bytes: usize,
  entry: Option<HeapEntry>,
}

enum HeapEntry {
  String(JsString),
  Symbol(SymbolRecord),
  Object(JsObject),
}

/// Symbols compare by id; the serial only shows up in debug output.
#[derive(Debug)]
struct SymbolRecord {
  #[allow(dead_code)]
  serial: u64,
  description: Option<GcString>,
}

impl Heap {
  pub fn new(limits: HeapLimits) -> Self {
    debug_assert!(limits.gc_threshold <= limits.max_bytes);
    Self {
      limits,
      live_bytes: 0,
      collections: 0,
      slots: Vec::new(),
      vacant: Vec::new(),
      symbol_counter: 0,
      host_roots: Vec::new(),
      vacant_roots: Vec::new(),
    }
  }

  pub fn limits(&self) -> HeapLimits {
    self.limits
  }

  /// Bytes held by live allocations. External typed-array buffers are not counted.
  pub fn used_bytes(&self) -> usize {
    self.live_bytes
  }

  /// Number of completed collection cycles.
  pub fn gc_runs(&self) -> u64 {
    self.collections
  }

  pub fn live_allocations(&self) -> usize {
    self.slots.iter().filter(|slot| slot.entry.is_some()).count()
  }

  /// Marks from `roots` and the host roots, then sweeps everything unmarked.
  ///
  /// `weak` values are not traced. For each of them the result says whether it was marked through
  /// some other path; immediates have nothing to mark and always report `false`.
  pub(crate) fn collect_garbage_with(&mut self, roots: &[Value], weak: &[Value]) -> Vec<bool> {
    let mut marker = Marker {
      slots: &self.slots,
      marked: vec![false; self.slots.len()],
      pending: Vec::new(),
    };
    for value in roots.iter().chain(self.host_roots.iter().flatten()) {
      marker.visit_value(*value);
    }
    marker.drain();

    let weak_alive: Vec<bool> = weak
      .iter()
      .map(|value| heap_id_of(*value).is_some_and(|id| marker.is_marked(id)))
      .collect();
    let marked = marker.marked;

    let mut freed = 0usize;
    for (idx, slot) in self.slots.iter_mut().enumerate() {
      if marked[idx] || slot.entry.is_none() {
        continue;
      }
      slot.entry = None;
      slot.generation = slot.generation.wrapping_add(1);
      self.live_bytes = self.live_bytes.saturating_sub(mem::take(&mut slot.bytes));
      self.vacant.push(idx as u32);
      freed += 1;
    }
    self.collections += 1;

    tracing::debug!(
      gc_runs = self.collections,
      freed,
      used_bytes = self.live_bytes,
      "heap collected"
    );
    weak_alive
  }

  pub(crate) fn add_root(&mut self, value: Value) -> RootId {
    debug_assert!(self.is_valid_value(value));
    let idx = match self.vacant_roots.pop() {
      Some(idx) => idx,
      None => {
        self.host_roots.push(None);
        (self.host_roots.len() - 1) as u32
      }
    };
    self.host_roots[idx as usize] = Some(value);
    RootId(idx)
  }

  pub(crate) fn get_root(&self, id: RootId) -> Option<Value> {
    self.host_roots.get(id.0 as usize).copied().flatten()
  }

  pub(crate) fn remove_root(&mut self, id: RootId) {
    let released = self
      .host_roots
      .get_mut(id.0 as usize)
      .and_then(Option::take)
      .is_some();
    if released {
      self.vacant_roots.push(id.0);
    }
  }

  /// `true` for immediates, and for heap values whose allocation is still live.
  pub fn is_valid_value(&self, value: Value) -> bool {
    match value {
      Value::String(s) => matches!(self.entry(s.id()), Ok(HeapEntry::String(_))),
      Value::Symbol(s) => matches!(self.entry(s.id()), Ok(HeapEntry::Symbol(_))),
      Value::Object(o) => matches!(self.entry(o.id()), Ok(HeapEntry::Object(_))),
      _ => value.is_primitive_immediate(),
    }
  }

  pub fn get_string(&self, s: GcString) -> Result<&JsString, VmError> {
    match self.entry(s.id())? {
      HeapEntry::String(s) => Ok(s),
      _ => Err(VmError::InvalidHandle),
    }
  }

  /// The description a symbol was created with, if any.
  pub fn symbol_description(&self, sym: GcSymbol) -> Result<Option<GcString>, VmError> {
    match self.entry(sym.id())? {
      HeapEntry::Symbol(record) => Ok(record.description),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn get_object(&self, obj: GcObject) -> Result<&JsObject, VmError> {
    match self.entry(obj.id())? {
      HeapEntry::Object(o) => Ok(o),
      _ => Err(VmError::InvalidHandle),
    }
  }

  /// Runs `f` on an object, then charges any growth against the limit.
  ///
  /// The mutation has already happened when [`VmError::OutOfMemory`] is returned.
  pub(crate) fn with_object_mut<R>(
    &mut self,
    obj: GcObject,
    f: impl FnOnce(&mut JsObject) -> R,
  ) -> Result<R, VmError> {
    let idx = self.slot_index(obj.id()).ok_or(VmError::InvalidHandle)?;
    let slot = &mut self.slots[idx];
    let Some(HeapEntry::Object(o)) = slot.entry.as_mut() else {
      return Err(VmError::InvalidHandle);
    };
    let result = f(o);
    let bytes = o.heap_size_bytes();
    self.live_bytes = self.live_bytes.saturating_sub(slot.bytes).saturating_add(bytes);
    slot.bytes = bytes;
    if self.live_bytes > self.limits.max_bytes {
      return Err(VmError::OutOfMemory);
    }
    Ok(result)
  }

  /// Walks from `obj` up its prototype chain and returns the first `Some` produced by `pred`.
  pub(crate) fn find_in_chain<T>(
    &self,
    obj: GcObject,
    mut pred: impl FnMut(&JsObject) -> Option<T>,
  ) -> Result<Option<T>, VmError> {
    let mut next = Some(obj);
    for _ in 0..MAX_PROTOTYPE_CHAIN {
      let Some(current) = next else {
        break;
      };
      let object = self.get_object(current)?;
      if let Some(found) = pred(object) {
        return Ok(Some(found));
      }
      next = object.prototype;
    }
    Ok(None)
  }

  pub(crate) fn alloc_string(&mut self, s: JsString) -> Result<GcString, VmError> {
    let bytes = s.heap_size_bytes();
    self.insert(HeapEntry::String(s), bytes).map(GcString)
  }

  pub(crate) fn alloc_symbol(&mut self, description: Option<GcString>) -> Result<GcSymbol, VmError> {
    self.symbol_counter += 1;
    let record = SymbolRecord {
      serial: self.symbol_counter,
      description,
    };
    self
      .insert(HeapEntry::Symbol(record), mem::size_of::<SymbolRecord>())
      .map(GcSymbol)
  }

  pub(crate) fn alloc_object(&mut self, obj: JsObject) -> Result<GcObject, VmError> {
    let bytes = obj.heap_size_bytes();
    self.insert(HeapEntry::Object(obj), bytes).map(GcObject)
  }

  fn insert(&mut self, entry: HeapEntry, bytes: usize) -> Result<HeapId, VmError> {
    if self.live_bytes.saturating_add(bytes) > self.limits.max_bytes {
      return Err(VmError::OutOfMemory);
    }
    let idx = match self.vacant.pop() {
      Some(idx) => idx as usize,
      None => {
        self.slots.push(HeapSlot {
          generation: 0,
          bytes: 0,
          entry: None,
        });
        self.slots.len() - 1
      }
    };
    let slot = &mut self.slots[idx];
    debug_assert!(slot.entry.is_none());
    slot.entry = Some(entry);
    slot.bytes = bytes;
    self.live_bytes += bytes;
    Ok(HeapId::new(idx as u32, slot.generation))
  }

  fn slot_index(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    (slot.generation == id.generation() && slot.entry.is_some()).then_some(idx)
  }

  fn entry(&self, id: HeapId) -> Result<&HeapEntry, VmError> {
    self
      .slot_index(id)
      .and_then(|idx| self.slots[idx].entry.as_ref())
      .ok_or(VmError::InvalidHandle)
  }
}

fn heap_id_of(value: Value) -> Option<HeapId> {
  match value {
    Value::String(s) => Some(s.id()),
    Value::Symbol(s) => Some(s.id()),
    Value::Object(o) => Some(o.id()),
    _ => None,
  }
}

/// What an object is beyond its ordinary properties.
pub(crate) enum ObjectKind {
  Ordinary,
  /// Dense elements; holes read as `undefined`.
  Array(Vec<Value>),
  /// Created by one of the error constructors; the kind lives in the prototype.
  Error,
  Function(NativeCallback),
  TypedArray(TypedArrayStorage),
}

pub(crate) struct JsObject {
  pub prototype: Option<GcObject>,
  pub properties: Vec<PropertyEntry>,
  /// Host-only slots, invisible to property access and not traced.
  pub internal_fields: Box<[Option<ExternalData>]>,
  pub kind: ObjectKind,
}

impl JsObject {
  pub(crate) fn new(prototype: Option<GcObject>, kind: ObjectKind) -> Self {
    Self {
      prototype,
      properties: Vec::new(),
      internal_fields: Box::default(),
      kind,
    }
  }

  pub(crate) fn with_internal_fields(prototype: Option<GcObject>, count: usize) -> Self {
    Self {
      internal_fields: vec![None; count].into_boxed_slice(),
      ..Self::new(prototype, ObjectKind::Ordinary)
    }
  }

  pub(crate) fn own_property(&self, key: &str) -> Option<&PropertyEntry> {
    self.properties.iter().find(|prop| prop.key == *key)
  }

  pub(crate) fn own_property_index(&self, key: &str) -> Option<usize> {
    self.properties.iter().position(|prop| prop.key == *key)
  }

  fn heap_size_bytes(&self) -> usize {
    let properties: usize = self
      .properties
      .iter()
      .map(|prop| mem::size_of::<PropertyEntry>() + prop.key.heap_size_bytes())
      .sum();
    let elements = match &self.kind {
      ObjectKind::Array(elements) => elements.len() * mem::size_of::<Value>(),
      _ => 0,
    };
    mem::size_of::<Self>()
      + properties
      + elements
      + self.internal_fields.len() * mem::size_of::<Option<ExternalData>>()
  }
}

/// Reports the heap values an allocation keeps alive.
pub(crate) trait Trace {
  fn trace(&self, marker: &mut Marker<'_>);
}

impl Trace for HeapEntry {
  fn trace(&self, marker: &mut Marker<'_>) {
    match self {
      HeapEntry::String(_) => {}
      HeapEntry::Symbol(record) => {
        if let Some(description) = record.description {
          marker.visit_value(Value::String(description));
        }
      }
      HeapEntry::Object(o) => o.trace(marker),
    }
  }
}

impl Trace for JsObject {
  fn trace(&self, marker: &mut Marker<'_>) {
    if let Some(proto) = self.prototype {
      marker.visit_value(Value::Object(proto));
    }
    for prop in &self.properties {
      prop.trace(marker);
    }
    if let ObjectKind::Array(elements) = &self.kind {
      for element in elements {
        marker.visit_value(*element);
      }
    }
  }
}

/// Mark phase state: one mark bit per slot and a stack of slots still to scan.
pub(crate) struct Marker<'a> {
  slots: &'a [HeapSlot],
  marked: Vec<bool>,
  pending: Vec<usize>,
}

impl<'a> Marker<'a> {
  pub(crate) fn visit_value(&mut self, value: Value) {
    let Some(id) = heap_id_of(value) else {
      return;
    };
    let idx = id.index() as usize;
    match self.slots.get(idx) {
      Some(slot) if slot.generation == id.generation() && slot.entry.is_some() => {
        if !self.marked[idx] {
          self.marked[idx] = true;
          self.pending.push(idx);
        }
      }
      _ => debug_assert!(false, "stale heap id reached during marking: {id:?}"),
    }
  }

  fn drain(&mut self) {
    let slots = self.slots;
    while let Some(idx) = self.pending.pop() {
      if let Some(entry) = &slots[idx].entry {
        entry.trace(self);
      }
    }
  }

  fn is_marked(&self, id: HeapId) -> bool {
    let idx = id.index() as usize;
    self
      .slots
      .get(idx)
      .is_some_and(|slot| slot.generation == id.generation() && self.marked[idx])
  }
}
