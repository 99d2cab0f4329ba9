use crate::error::ErrorCode;
use crate::heap::ObjectKind;
use crate::string::JsString;
use crate::{Env, GcObject, Handle, Value};

impl Env {
  pub fn new_undefined(&mut self) -> Handle {
    self.clear_error_code();
    self.arena.push(Value::Undefined)
  }

  pub fn new_null(&mut self) -> Handle {
    self.clear_error_code();
    self.arena.push(Value::Null)
  }

  pub fn new_boolean(&mut self, value: bool) -> Handle {
    self.clear_error_code();
    self.arena.push(Value::Bool(value))
  }

  pub fn new_number(&mut self, value: f64) -> Handle {
    self.clear_error_code();
    self.arena.push(Value::Number(value))
  }

  /// Creates a symbol. `description` may be empty or `undefined`; anything other than a string
  /// records [`ErrorCode::StringExpected`] and returns an empty handle.
  pub fn new_symbol(&mut self, description: Handle) -> Handle {
    self.clear_error_code();
    let description = match self.resolve(description) {
      None | Some(Value::Undefined) => None,
      Some(Value::String(s)) => Some(s),
      Some(_) => {
        self.set_error_code(ErrorCode::StringExpected);
        return Handle::EMPTY;
      }
    };
    let result = self.heap.alloc_symbol(description);
    let sym = self.or_fatal("Env::new_symbol", result);
    self.arena.push(Value::Symbol(sym))
  }

  pub fn is_empty(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    self.resolve(value).is_none()
  }

  pub fn is_undefined(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    matches!(self.resolve(value), Some(Value::Undefined))
  }

  pub fn is_null(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    matches!(self.resolve(value), Some(Value::Null))
  }

  pub fn is_boolean(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    matches!(self.resolve(value), Some(Value::Bool(_)))
  }

  pub fn is_number(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    matches!(self.resolve(value), Some(Value::Number(_)))
  }

  pub fn is_string(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    matches!(self.resolve(value), Some(Value::String(_)))
  }

  pub fn is_symbol(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    matches!(self.resolve(value), Some(Value::Symbol(_)))
  }

  /// `true` for every object, including functions, arrays and typed arrays.
  pub fn is_object(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    matches!(self.resolve(value), Some(Value::Object(_)))
  }

  pub fn is_function(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    self.object_kind_is(value, |kind| matches!(kind, ObjectKind::Function(_)))
  }

  pub fn is_array(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    self.object_kind_is(value, |kind| matches!(kind, ObjectKind::Array(_)))
  }

  pub(crate) fn object_kind_is(
    &self,
    value: Handle,
    pred: impl FnOnce(&ObjectKind) -> bool,
  ) -> bool {
    match self.resolve(value) {
      Some(Value::Object(obj)) => self.heap.get_object(obj).map_or(false, |o| pred(&o.kind)),
      _ => false,
    }
  }

  /// Resolves `value` to a native function object, recording [`ErrorCode::FunctionExpected`]
  /// otherwise.
  pub(crate) fn expect_function(&mut self, value: Handle) -> Option<GcObject> {
    let is_function = self.object_kind_is(value, |kind| matches!(kind, ObjectKind::Function(_)));
    match self.resolve(value) {
      Some(Value::Object(obj)) if is_function => Some(obj),
      _ => {
        self.set_error_code(ErrorCode::FunctionExpected);
        None
      }
    }
  }

  /// The boolean behind `value`; `false` with [`ErrorCode::BooleanExpected`] for anything else.
  pub fn to_bool(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    match self.resolve(value) {
      Some(Value::Bool(b)) => b,
      _ => {
        self.set_error_code(ErrorCode::BooleanExpected);
        false
      }
    }
  }

  /// The number behind `value`; NaN with [`ErrorCode::NumberExpected`] for anything else.
  pub fn to_f64(&mut self, value: Handle) -> f64 {
    self.clear_error_code();
    match self.resolve(value) {
      Some(Value::Number(n)) => n,
      _ => {
        self.set_error_code(ErrorCode::NumberExpected);
        f64::NAN
      }
    }
  }

  /// ECMAScript `ToInt32` of a number: truncate, then wrap modulo 2^32.
  pub fn to_i32(&mut self, value: Handle) -> i32 {
    self.number_or_zero(value).map_or(0, |n| to_uint32(n) as i32)
  }

  /// ECMAScript `ToUint32` of a number.
  pub fn to_u32(&mut self, value: Handle) -> u32 {
    self.number_or_zero(value).map_or(0, to_uint32)
  }

  /// Truncates toward zero, saturating at the `i64` range; NaN maps to 0.
  pub fn to_i64(&mut self, value: Handle) -> i64 {
    // `as` saturates and maps NaN to 0.
    self.number_or_zero(value).map_or(0, |n| n as i64)
  }

  fn number_or_zero(&mut self, value: Handle) -> Option<f64> {
    self.clear_error_code();
    match self.resolve(value) {
      Some(Value::Number(n)) => Some(n),
      _ => {
        self.set_error_code(ErrorCode::NumberExpected);
        None
      }
    }
  }

  /// Creates a string from UTF-8 bytes. Invalid sequences become U+FFFD.
  pub fn new_string_from_utf8(&mut self, bytes: &[u8]) -> Handle {
    self.clear_error_code();
    self.push_string(JsString::from_utf8_lossy(bytes), "Env::new_string_from_utf8")
  }

  /// Creates a string from UTF-16 code units. Lone surrogates are kept as they are.
  pub fn new_string(&mut self, units: &[u16]) -> Handle {
    self.clear_error_code();
    self.push_string(JsString::from_code_units(units), "Env::new_string")
  }

  fn push_string(&mut self, s: JsString, location: &str) -> Handle {
    let result = self.heap.alloc_string(s);
    let s = self.or_fatal(location, result);
    self.arena.push(Value::String(s))
  }

  /// Number of bytes [`Env::string_utf8_chars`] needs for the whole string, without a terminator.
  pub fn string_utf8_length(&mut self, value: Handle) -> usize {
    self.clear_error_code();
    self.with_string(value, JsString::utf8_len).unwrap_or(0)
  }

  /// Copies the string into `buf` as UTF-8 and returns the number of bytes written.
  ///
  /// A code point that does not fit entirely is not written.
  pub fn string_utf8_chars(&mut self, value: Handle, buf: &mut [u8]) -> usize {
    self.clear_error_code();
    self.with_string(value, |s| s.write_utf8(buf)).unwrap_or(0)
  }

  /// Length in UTF-16 code units.
  pub fn string_length(&mut self, value: Handle) -> usize {
    self.clear_error_code();
    self.with_string(value, JsString::len_code_units).unwrap_or(0)
  }

  /// Copies UTF-16 code units into `buf` and returns how many were written.
  pub fn string_chars(&mut self, value: Handle, buf: &mut [u16]) -> usize {
    self.clear_error_code();
    self.with_string(value, |s| s.write_code_units(buf)).unwrap_or(0)
  }

  fn with_string<R>(&mut self, value: Handle, f: impl FnOnce(&JsString) -> R) -> Option<R> {
    let s = match self.resolve(value) {
      Some(Value::String(s)) if self.heap.get_string(s).is_ok() => s,
      _ => {
        self.set_error_code(ErrorCode::StringExpected);
        return None;
      }
    };
    self.heap.get_string(s).ok().map(f)
  }

  /// `===`. Empty handles compare as `undefined`.
  pub fn strict_equals(&mut self, left: Handle, right: Handle) -> bool {
    self.clear_error_code();
    let left = self.resolve(left).unwrap_or(Value::Undefined);
    let right = self.resolve(right).unwrap_or(Value::Undefined);
    left.strict_equals(right, &self.heap)
  }
}

fn to_uint32(n: f64) -> u32 {
  if !n.is_finite() {
    return 0;
  }
  n.trunc().rem_euclid(4_294_967_296.0) as u32
}
