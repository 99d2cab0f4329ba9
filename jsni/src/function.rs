use crate::callback::{CallbackKind, Invocation, NativeCallback};
use crate::heap::{JsObject, ObjectKind};
use crate::property::{PropertyAttributes, PropertyEntry};
use crate::string::JsString;
use crate::{Env, GcObject, Handle, Value, VmError};

impl Env {
  /// Allocates a native function object with its own `prototype` object, so that it can be used
  /// as a constructor.
  pub(crate) fn alloc_function(
    &mut self,
    callback: NativeCallback,
    name: &str,
  ) -> Result<GcObject, VmError> {
    let name = self.heap.alloc_string(JsString::from_rust_str(name))?;
    let func = self.heap.alloc_object(JsObject::new(
      Some(self.intrinsics.function_prototype),
      ObjectKind::Function(callback),
    ))?;
    let mut prototype = JsObject::new(Some(self.intrinsics.object_prototype), ObjectKind::Ordinary);
    prototype.properties.push(PropertyEntry::data(
      "constructor",
      PropertyAttributes::DONT_ENUM,
      Value::Object(func),
    ));
    let prototype = self.heap.alloc_object(prototype)?;
    self.heap.with_object_mut(func, |o| {
      o.properties.push(PropertyEntry::data(
        "name",
        PropertyAttributes::READ_ONLY | PropertyAttributes::DONT_ENUM,
        Value::String(name),
      ));
      o.properties.push(PropertyEntry::data(
        "prototype",
        PropertyAttributes::DONT_ENUM | PropertyAttributes::DONT_DELETE,
        Value::Object(prototype),
      ));
    })?;
    Ok(func)
  }

  /// Creates an anonymous native function.
  pub fn new_function(&mut self, callback: NativeCallback) -> Handle {
    self.clear_error_code();
    let result = self.alloc_function(callback, "");
    let func = self.or_fatal("Env::new_function", result);
    self.arena.push(Value::Object(func))
  }

  /// Creates a native function named `name` and stores it as `receiver[name]`.
  ///
  /// This is how module entry points export their functions. Returns `false` if `receiver` is not
  /// an object or the store was rejected.
  pub fn register_method(&mut self, receiver: Handle, name: &str, callback: NativeCallback) -> bool {
    self.clear_error_code();
    let Some(obj) = self.expect_object(receiver) else {
      return false;
    };
    let result = self.alloc_function(callback, name);
    let func = self.or_fatal("Env::register_method", result);
    let result = self.object_set(obj, Value::Object(obj), name, Value::Object(func));
    self.settle_bool("Env::register_method", result)
  }

  /// Calls `func` with `receiver` as `this`.
  ///
  /// Returns an empty handle (recording `FunctionExpected`) if `func` is not a function. If the
  /// callee throws, the exception becomes pending and the result is an empty handle.
  pub fn call_function(&mut self, func: Handle, receiver: Handle, args: &[Handle]) -> Handle {
    self.clear_error_code();
    let Some(callee) = self.expect_function(func) else {
      return Handle::EMPTY;
    };
    let this = self.resolve(receiver).unwrap_or(Value::Undefined);
    let result = self.construct_or_call(callee, this, args, Value::Undefined);
    self.settle("Env::call_function", result)
  }

  /// `new constructor(...args)`.
  ///
  /// The callback sees a fresh object inheriting from `constructor.prototype` as `this`, and
  /// `constructor` as `new.target`. If it returns an object, that object is the result; otherwise
  /// the fresh object is.
  pub fn new_instance(&mut self, constructor: Handle, args: &[Handle]) -> Handle {
    self.clear_error_code();
    let Some(ctor) = self.expect_function(constructor) else {
      return Handle::EMPTY;
    };
    let prototype = match self.own_data_property(ctor, "prototype") {
      Some(Value::Object(proto)) => proto,
      _ => self.intrinsics.object_prototype,
    };
    let result = self
      .heap
      .alloc_object(JsObject::new(Some(prototype), ObjectKind::Ordinary));
    let instance = Value::Object(self.or_fatal("Env::new_instance", result));

    let result = self
      .construct_or_call(ctor, instance, args, Value::Object(ctor))
      .map(|returned| match returned {
        Value::Object(_) => returned,
        _ => instance,
      });
    self.settle("Env::new_instance", result)
  }

  fn construct_or_call(
    &mut self,
    callee: GcObject,
    this: Value,
    args: &[Handle],
    new_target: Value,
  ) -> Result<Value, VmError> {
    let ObjectKind::Function(callback) = self.heap.get_object(callee)?.kind else {
      return Err(VmError::NotCallable);
    };
    let args: Vec<Value> = args
      .iter()
      .map(|arg| self.resolve(*arg).unwrap_or(Value::Undefined))
      .collect();
    self.invoke_native(Invocation {
      callback,
      kind: CallbackKind::Function,
      this,
      args: &args,
      new_target,
      data: None,
    })
  }
}
