use crate::{GcObject, GcString, GcSymbol, Heap};

/// An engine value as the bridge stores it.
///
/// Native modules only ever hold these indirectly, through a [`Handle`](crate::Handle) or a
/// [`GlobalRef`](crate::GlobalRef); the host side of an [`Env`](crate::Env) uses them directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(GcString),
  Symbol(GcSymbol),
  Object(GcObject),
}

impl Value {
  /// `===`. Numbers use IEEE equality (so `NaN !== NaN` and `0 === -0`), strings compare their
  /// code units, and everything else on the heap compares by identity.
  pub fn strict_equals(self, other: Self, heap: &Heap) -> bool {
    if let (Value::String(a), Value::String(b)) = (self, other) {
      return match (heap.get_string(a), heap.get_string(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
      };
    }
    // Derived `PartialEq` already has the right semantics for every other pairing.
    self == other
  }

  /// `true` for values stored inline rather than on the heap.
  #[inline]
  pub fn is_primitive_immediate(self) -> bool {
    !matches!(self, Value::String(_) | Value::Symbol(_) | Value::Object(_))
  }
}
