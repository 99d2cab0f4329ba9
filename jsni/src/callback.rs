use crate::error::fatal_error;
use crate::exception::ErrorKind;
use crate::{Env, Handle, Value, VmError};
use std::any::Any;
use std::rc::Rc;

/// Opaque host data attached to accessors, internal fields and finalizers.
///
/// The bridge never inspects it; native code downcasts it back with [`Rc::downcast`] or
/// `<dyn Any>::downcast_ref`.
pub type ExternalData = Rc<dyn Any>;

/// A native callback: a function, property getter or property setter implemented in Rust.
///
/// # Scope expectations
///
/// Every invocation runs inside an implicit local scope. Handles created by the callback (and the
/// argument/receiver handles in `info`) are released when it returns; the return value set through
/// [`CallbackInfo::set_return_value`] is copied out before that happens.
pub type NativeCallback = fn(&mut Env, &CallbackInfo);

/// Which kind of invocation a [`CallbackInfo`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
  Function,
  Getter,
  Setter,
}

/// Per-invocation context handed to a [`NativeCallback`].
///
/// Only valid for the duration of the callback.
pub struct CallbackInfo {
  kind: CallbackKind,
  this: Handle,
  /// Function arguments, or the single assigned value for a setter.
  args: Vec<Handle>,
  new_target: Handle,
  data: Option<ExternalData>,
  return_slot: usize,
}

impl CallbackInfo {
  #[inline]
  pub fn kind(&self) -> CallbackKind {
    self.kind
  }

  /// 0 for a getter, 1 for a setter, the call arity for a function.
  pub fn arg_count(&self) -> usize {
    match self.kind {
      CallbackKind::Function => self.args.len(),
      CallbackKind::Getter => 0,
      CallbackKind::Setter => 1,
    }
  }

  /// Returns the argument at `index`, or [`Handle::EMPTY`] when out of range.
  ///
  /// For a setter, index 0 is the value being assigned. A getter has no arguments.
  pub fn arg(&self, index: usize) -> Handle {
    match self.kind {
      CallbackKind::Getter => Handle::EMPTY,
      CallbackKind::Function | CallbackKind::Setter => {
        self.args.get(index).copied().unwrap_or(Handle::EMPTY)
      }
    }
  }

  /// The receiver.
  #[inline]
  pub fn this(&self) -> Handle {
    self.this
  }

  /// The opaque data registered with the accessor.
  ///
  /// Function callbacks carry no data; asking for it is a fatal error.
  pub fn data(&self, env: &Env) -> Option<ExternalData> {
    if self.kind == CallbackKind::Function {
      fatal_error(
        env.options().fatal_mode,
        "CallbackInfo::data",
        "function callbacks carry no accessor data",
      );
    }
    self.data.clone()
  }

  /// `new.target` for a function callback: the constructor when invoked through
  /// [`Env::new_instance`], `undefined` for a plain call.
  pub fn new_target(&self, env: &Env) -> Handle {
    if self.kind != CallbackKind::Function {
      fatal_error(
        env.options().fatal_mode,
        "CallbackInfo::new_target",
        "new.target is only available to function callbacks",
      );
    }
    self.new_target
  }

  /// Sets the value returned to the caller. An empty handle returns `undefined`.
  ///
  /// Setters have no return slot; calling this from one is a fatal error.
  pub fn set_return_value(&self, env: &mut Env, value: Handle) {
    if self.kind == CallbackKind::Setter {
      fatal_error(
        env.options().fatal_mode,
        "CallbackInfo::set_return_value",
        "a setter callback cannot set a return value",
      );
    }
    let value = env.resolve(value).unwrap_or(Value::Undefined);
    if let Some(slot) = env.return_values.get_mut(self.return_slot) {
      *slot = Some(value);
    }
  }
}

/// A single native invocation, as seen by the trampoline.
pub(crate) struct Invocation<'a> {
  pub callback: NativeCallback,
  pub kind: CallbackKind,
  pub this: Value,
  pub args: &'a [Value],
  pub new_target: Value,
  pub data: Option<ExternalData>,
}

impl Env {
  /// Runs a native callback inside its own implicit scope.
  ///
  /// An exception left pending by the callback is re-raised as [`VmError::Throw`]; any exception
  /// that was pending in the caller is restored afterwards. The returned value is not rooted.
  pub(crate) fn invoke_native(&mut self, call: Invocation<'_>) -> Result<Value, VmError> {
    if self.call_depth >= self.options().max_call_depth {
      tracing::warn!(depth = self.call_depth, "native call depth limit reached");
      let err = self.alloc_error(ErrorKind::RangeError, "Maximum call stack size exceeded")?;
      return Err(VmError::Throw(Value::Object(err)));
    }

    let span = tracing::debug_span!("jsni.callback", kind = ?call.kind, depth = self.call_depth);
    let _entered = span.enter();

    self.call_depth += 1;
    let outer_exception = self.pending_exception.take();
    self.saved_exceptions.push(outer_exception);
    let return_slot = self.return_values.len();
    self.return_values.push(None);

    self.with_native_frame(|env| {
      let this = env.arena.push(call.this);
      let args = call.args.iter().map(|arg| env.arena.push(*arg)).collect();
      let new_target = match call.kind {
        CallbackKind::Function => env.arena.push(call.new_target),
        CallbackKind::Getter | CallbackKind::Setter => Handle::EMPTY,
      };
      env.collect_at_safe_point();

      let info = CallbackInfo {
        kind: call.kind,
        this,
        args,
        new_target,
        data: call.data,
        return_slot,
      };
      (call.callback)(env, &info);
    });

    let returned = self
      .return_values
      .pop()
      .flatten()
      .unwrap_or(Value::Undefined);
    let thrown = self.pending_exception.take();
    self.pending_exception = self.saved_exceptions.pop().flatten();
    self.call_depth -= 1;

    match thrown {
      Some(exception) => {
        tracing::debug!("native callback returned with a pending exception");
        Err(VmError::Throw(exception))
      }
      None => Ok(returned),
    }
  }
}
