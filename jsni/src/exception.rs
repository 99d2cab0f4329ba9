use crate::error::ErrorInfo;
use crate::heap::{JsObject, ObjectKind};
use crate::property::{PropertyAttributes, PropertyEntry};
use crate::string::JsString;
use crate::{Env, GcObject, Handle, Value, VmError};

/// The built-in error constructors native code can instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Error,
  TypeError,
  RangeError,
}

impl Env {
  /// Allocates an error object of `kind` with an own `message` property.
  pub(crate) fn alloc_error(&mut self, kind: ErrorKind, message: &str) -> Result<GcObject, VmError> {
    let prototype = self.intrinsics.error_prototype_for(kind);
    let message = self.heap.alloc_string(JsString::from_rust_str(message))?;
    let mut obj = JsObject::new(Some(prototype), ObjectKind::Error);
    obj.properties.push(PropertyEntry::data(
      "message",
      PropertyAttributes::DONT_ENUM,
      Value::String(message),
    ));
    self.heap.alloc_object(obj)
  }

  fn new_error_of_kind(&mut self, kind: ErrorKind, message: &str, location: &str) -> Handle {
    self.clear_error_code();
    let result = self.alloc_error(kind, message);
    let obj = self.or_fatal(location, result);
    self.arena.push(Value::Object(obj))
  }

  fn throw_error_of_kind(&mut self, kind: ErrorKind, message: &str, location: &str) {
    self.clear_error_code();
    let result = self.alloc_error(kind, message);
    let obj = self.or_fatal(location, result);
    tracing::debug!(?kind, reason = message, "native code threw");
    self.pending_exception = Some(Value::Object(obj));
  }

  pub fn new_error(&mut self, message: &str) -> Handle {
    self.new_error_of_kind(ErrorKind::Error, message, "Env::new_error")
  }

  pub fn new_type_error(&mut self, message: &str) -> Handle {
    self.new_error_of_kind(ErrorKind::TypeError, message, "Env::new_type_error")
  }

  pub fn new_range_error(&mut self, message: &str) -> Handle {
    self.new_error_of_kind(ErrorKind::RangeError, message, "Env::new_range_error")
  }

  /// Makes a new `Error` the pending exception, replacing any exception already pending.
  pub fn throw_error(&mut self, message: &str) {
    self.throw_error_of_kind(ErrorKind::Error, message, "Env::throw_error")
  }

  pub fn throw_type_error(&mut self, message: &str) {
    self.throw_error_of_kind(ErrorKind::TypeError, message, "Env::throw_type_error")
  }

  pub fn throw_range_error(&mut self, message: &str) {
    self.throw_error_of_kind(ErrorKind::RangeError, message, "Env::throw_range_error")
  }

  /// Throws an arbitrary value. An empty handle throws `undefined`.
  pub fn throw_error_object(&mut self, error: Handle) {
    self.clear_error_code();
    self.pending_exception = Some(self.resolve(error).unwrap_or(Value::Undefined));
  }

  /// Returns `true` for objects created by one of the error constructors.
  pub fn is_error(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    let Some(Value::Object(obj)) = self.resolve(value) else {
      return false;
    };
    matches!(
      self.heap.get_object(obj).map(|o| &o.kind),
      Ok(ObjectKind::Error)
    )
  }

  /// Returns `true` if an exception is pending.
  pub fn has_exception(&self) -> bool {
    self.pending_exception.is_some()
  }

  /// Discards the pending exception, if any.
  pub fn clear_exception(&mut self) {
    if self.pending_exception.take().is_some() {
      tracing::trace!("pending exception cleared");
    }
  }

  /// Returns the code recorded by the last API call, then resets it.
  pub fn get_last_error_info(&mut self) -> ErrorInfo {
    let code = std::mem::take(&mut self.error_code);
    if !code.is_ok() {
      tracing::warn!(
        code = code as i32,
        reason = code.message(),
        "error recorded by the last native interface call"
      );
    }
    ErrorInfo::from(code)
  }
}
