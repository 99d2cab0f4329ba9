use crate::error::{fatal_error, ErrorCode};
use crate::heap::{JsObject, ObjectKind};
use crate::{Env, GcObject, Handle, Value, VmError};
use std::mem;

impl Env {
  /// Creates an array of `length` `undefined` elements.
  pub fn new_array(&mut self, length: usize) -> Handle {
    self.clear_error_code();
    let result = self.alloc_array(length);
    let array = self.or_fatal("Env::new_array", result);
    self.arena.push(Value::Object(array))
  }

  fn alloc_array(&mut self, length: usize) -> Result<GcObject, VmError> {
    // Refuse before materializing an element vector the heap could never hold.
    if length.saturating_mul(mem::size_of::<Value>()) > self.heap.limits().max_bytes {
      return Err(VmError::OutOfMemory);
    }
    self.heap.alloc_object(JsObject::new(
      Some(self.intrinsics.array_prototype),
      ObjectKind::Array(vec![Value::Undefined; length]),
    ))
  }

  /// Number of elements; 0 (with [`ErrorCode::ArrayExpected`]) for non-arrays.
  pub fn array_length(&mut self, array: Handle) -> usize {
    self.clear_error_code();
    self.with_elements(array, |elements| elements.len()).unwrap_or(0)
  }

  /// Element at `index`; `undefined` past the end or for non-arrays.
  pub fn get_array_element(&mut self, array: Handle, index: usize) -> Handle {
    self.clear_error_code();
    let value = self
      .with_elements(array, |elements| elements.get(index).copied())
      .flatten()
      .unwrap_or(Value::Undefined);
    self.arena.push(value)
  }

  /// Stores `value` at `index`, growing the array with `undefined` as needed.
  pub fn set_array_element(&mut self, array: Handle, index: usize, value: Handle) {
    self.clear_error_code();
    let Some(obj) = self.expect_array(array) else {
      return;
    };
    let value = self.resolve(value).unwrap_or(Value::Undefined);
    let needed = index.saturating_add(1);
    if needed.saturating_mul(mem::size_of::<Value>()) > self.heap.limits().max_bytes {
      fatal_error(
        self.options().fatal_mode,
        "Env::set_array_element",
        &VmError::OutOfMemory.to_string(),
      );
    }
    let result = self.heap.with_object_mut(obj, |o| {
      if let ObjectKind::Array(elements) = &mut o.kind {
        if elements.len() < needed {
          elements.resize(needed, Value::Undefined);
        }
        elements[index] = value;
      }
    });
    self.or_fatal("Env::set_array_element", result)
  }

  fn with_elements<R>(&mut self, array: Handle, f: impl FnOnce(&[Value]) -> R) -> Option<R> {
    let obj = self.expect_array(array)?;
    match &self.heap.get_object(obj).ok()?.kind {
      ObjectKind::Array(elements) => Some(f(elements)),
      _ => None,
    }
  }

  fn expect_array(&mut self, array: Handle) -> Option<GcObject> {
    let is_array = self.object_kind_is(array, |kind| matches!(kind, ObjectKind::Array(_)));
    match self.resolve(array) {
      Some(Value::Object(obj)) if is_array => Some(obj),
      _ => {
        self.set_error_code(ErrorCode::ArrayExpected);
        None
      }
    }
  }
}
