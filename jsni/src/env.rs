use crate::callback::{CallbackKind, Invocation};
use crate::error::{fatal_error, ErrorCode};
use crate::global_ref::GlobalRefTable;
use crate::heap::ObjectKind;
use crate::intrinsics::Intrinsics;
use crate::module::ModuleRecord;
use crate::property::PropertyKind;
use crate::scope::{HandleArena, ScopeFrame};
use crate::string::JsString;
use crate::{FatalMode, GcObject, Handle, Heap, HeapLimits, Value, VmError};
use ahash::AHashMap;

/// Construction-time environment options.
#[derive(Debug, Clone, Copy)]
pub struct EnvOptions {
  pub heap_limits: HeapLimits,
  /// Nested native calls beyond this depth throw a `RangeError` instead of running.
  pub max_call_depth: usize,
  pub fatal_mode: FatalMode,
}

impl Default for EnvOptions {
  fn default() -> Self {
    Self {
      heap_limits: HeapLimits::new(64 * 1024 * 1024, 64 * 1024 * 1024),
      max_call_depth: 1024,
      fatal_mode: FatalMode::Abort,
    }
  }
}

/// One execution context as seen by native modules.
///
/// All bridge state lives here and is threaded explicitly through every call: the heap, the
/// handle arena and its scope stack, the global reference table, the advisory error code and the
/// pending exception. An `Env` is single-threaded; host data attached to it is `Rc`-based, so it is
/// neither `Send` nor `Sync`.
pub struct Env {
  pub(crate) heap: Heap,
  pub(crate) intrinsics: Intrinsics,

  pub(crate) arena: HandleArena,
  pub(crate) frames: Vec<ScopeFrame>,
  /// Frames below this index belong to an enclosing native call and cannot be popped.
  pub(crate) frame_floor: usize,

  pub(crate) globals: GlobalRefTable,

  pub(crate) error_code: ErrorCode,
  pub(crate) pending_exception: Option<Value>,
  /// Exceptions pending in callers of the native calls currently on the stack.
  pub(crate) saved_exceptions: Vec<Option<Value>>,
  pub(crate) return_values: Vec<Option<Value>>,
  pub(crate) call_depth: usize,

  pub(crate) modules: AHashMap<String, ModuleRecord>,

  options: EnvOptions,
}

impl Env {
  pub fn new(options: EnvOptions) -> Result<Self, VmError> {
    let mut heap = Heap::new(options.heap_limits);
    let intrinsics = Intrinsics::new(&mut heap)?;
    Ok(Self {
      heap,
      intrinsics,
      arena: HandleArena::new(),
      frames: Vec::new(),
      frame_floor: 0,
      globals: GlobalRefTable::new(),
      error_code: ErrorCode::Ok,
      pending_exception: None,
      saved_exceptions: Vec::new(),
      return_values: Vec::new(),
      call_depth: 0,
      modules: AHashMap::new(),
      options,
    })
  }

  pub fn options(&self) -> &EnvOptions {
    &self.options
  }

  pub fn heap(&self) -> &Heap {
    &self.heap
  }

  #[inline]
  pub(crate) fn clear_error_code(&mut self) {
    self.error_code = ErrorCode::Ok;
  }

  #[inline]
  pub(crate) fn set_error_code(&mut self, code: ErrorCode) {
    self.error_code = code;
  }

  /// Runs a full collection, then the finalizers of every global reference it reclaimed.
  ///
  /// Roots are the live handles, live global references, pending and saved exceptions, return
  /// values in flight, loaded module exports and the built-in prototypes. Finalizers run on this
  /// thread, each in its own implicit scope.
  pub fn collect_garbage(&mut self) {
    let mut roots: Vec<Value> = self.arena.values().collect();
    roots.extend(self.globals.strong_values());
    roots.extend(self.pending_exception);
    roots.extend(self.saved_exceptions.iter().flatten().copied());
    roots.extend(self.return_values.iter().flatten().copied());

    let (pending, weak) = self.globals.pending();
    let survived = self.heap.collect_garbage_with(&roots, &weak);
    let finalizers = self.globals.reclaim_dead(&pending, &survived);

    if !finalizers.is_empty() {
      tracing::debug!(count = finalizers.len(), "running finalizers");
    }
    for (data, callback) in finalizers {
      // The outer exception stays rooted in `saved_exceptions` while the finalizer runs, and
      // whatever call triggered the collection never sees the finalizer's own exception.
      let outer = self.pending_exception.take();
      self.saved_exceptions.push(outer);
      self.with_native_frame(|env| callback(env, data));
      if let Some(exception) = self.pending_exception.take() {
        tracing::warn!(?exception, "exception thrown by finalizer dropped");
      }
      self.pending_exception = self.saved_exceptions.pop().flatten();
    }
  }

  /// Collects if the heap has grown past its threshold. Called at native call boundaries, once the
  /// call's receiver and arguments are held by handles.
  pub(crate) fn collect_at_safe_point(&mut self) {
    if self.heap.used_bytes() > self.heap.limits().gc_threshold {
      tracing::debug!(
        used_bytes = self.heap.used_bytes(),
        "gc threshold exceeded at native call boundary"
      );
      self.collect_garbage();
    }
  }

  /// Takes the exception left pending at top level, if any.
  pub fn take_exception(&mut self) -> Option<Value> {
    self.pending_exception.take()
  }

  /// Calls a native function from the host.
  ///
  /// An exception thrown by the callee surfaces as [`VmError::Throw`]. The returned value is not
  /// rooted: hold it in a handle or global reference before the next collection.
  pub fn call(&mut self, callee: Value, this: Value, args: &[Value]) -> Result<Value, VmError> {
    if !self.heap.is_valid_value(callee) || !self.heap.is_valid_value(this) {
      return Err(VmError::InvalidHandle);
    }
    if args.iter().any(|arg| !self.heap.is_valid_value(*arg)) {
      return Err(VmError::InvalidHandle);
    }
    let Value::Object(func) = callee else {
      return Err(VmError::NotCallable);
    };
    let ObjectKind::Function(callback) = self.heap.get_object(func)?.kind else {
      return Err(VmError::NotCallable);
    };
    self.invoke_native(Invocation {
      callback,
      kind: CallbackKind::Function,
      this,
      args,
      new_target: Value::Undefined,
      data: None,
    })
  }

  /// Reads a property from the host, running native getters.
  pub fn get(&mut self, object: Value, name: &str) -> Result<Value, VmError> {
    let Value::Object(obj) = object else {
      return Err(VmError::NotObject);
    };
    self.object_get(obj, object, name)
  }

  /// Writes a property from the host, running native setters. Returns `false` if the write was
  /// rejected (read-only property, accessor without setter).
  pub fn set(&mut self, object: Value, name: &str, value: Value) -> Result<bool, VmError> {
    let Value::Object(obj) = object else {
      return Err(VmError::NotObject);
    };
    self.object_set(obj, object, name, value)
  }

  /// Allocates a string from the host.
  pub fn alloc_string(&mut self, s: &str) -> Result<Value, VmError> {
    Ok(Value::String(
      self.heap.alloc_string(JsString::from_rust_str(s))?,
    ))
  }

  /// Reads a string value back for the host. `None` for non-strings.
  pub fn string_contents(&self, value: Value) -> Option<String> {
    match value {
      Value::String(s) => self.heap.get_string(s).ok().map(JsString::to_utf8_lossy),
      _ => None,
    }
  }

  /// Returns the data value of an own property without running accessors.
  pub fn get_own_data_property(&self, object: Value, name: &str) -> Option<Value> {
    let Value::Object(obj) = object else {
      return None;
    };
    let entry = self.heap.get_object(obj).ok()?.own_property(name)?;
    match entry.kind {
      PropertyKind::Data(value) => Some(value),
      PropertyKind::Accessor(_) => None,
    }
  }

  /// Unwraps an engine-level result inside a native API call.
  ///
  /// Engine errors other than a throw (allocation failure, a corrupted handle) cannot be reported
  /// through the advisory error channel and are fatal.
  pub(crate) fn or_fatal<T>(&self, location: &str, result: Result<T, VmError>) -> T {
    match result {
      Ok(value) => value,
      Err(err) => fatal_error(self.options.fatal_mode, location, &err.to_string()),
    }
  }

  /// Turns the result of running code into a handle: a throw becomes the pending exception and an
  /// empty handle.
  pub(crate) fn settle(&mut self, location: &str, result: Result<Value, VmError>) -> Handle {
    match result {
      Ok(value) => self.arena.push(value),
      Err(VmError::Throw(exception)) => {
        self.pending_exception = Some(exception);
        Handle::EMPTY
      }
      Err(err) => fatal_error(self.options.fatal_mode, location, &err.to_string()),
    }
  }

  /// Resolves `handle` to an object, recording [`ErrorCode::ObjectExpected`] otherwise.
  pub(crate) fn expect_object(&mut self, handle: Handle) -> Option<GcObject> {
    match self.resolve(handle) {
      Some(Value::Object(obj)) => Some(obj),
      _ => {
        self.set_error_code(ErrorCode::ObjectExpected);
        None
      }
    }
  }
}
