use std::fmt;

/// String contents as the engine stores them: UTF-16 code units, unpaired surrogates allowed.
///
/// Every UTF-8 view substitutes U+FFFD for an unpaired surrogate.
#[derive(Clone, PartialEq, Eq)]
pub struct JsString(Box<[u16]>);

impl JsString {
  pub fn from_code_units(units: &[u16]) -> Self {
    Self(units.into())
  }

  pub fn from_rust_str(s: &str) -> Self {
    Self(s.encode_utf16().collect())
  }

  /// Invalid UTF-8 sequences become U+FFFD.
  pub fn from_utf8_lossy(bytes: &[u8]) -> Self {
    Self::from_rust_str(&String::from_utf8_lossy(bytes))
  }

  pub fn len_code_units(&self) -> usize {
    self.0.len()
  }

  pub fn code_units(&self) -> &[u16] {
    &self.0
  }

  pub fn to_utf8_lossy(&self) -> String {
    String::from_utf16_lossy(&self.0)
  }

  fn chars(&self) -> impl Iterator<Item = char> + '_ {
    char::decode_utf16(self.0.iter().copied()).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
  }

  /// Byte length of the UTF-8 view.
  pub fn utf8_len(&self) -> usize {
    self.chars().map(char::len_utf8).sum()
  }

  /// Fills `buf` with the UTF-8 view, whole characters only, and returns the byte count.
  pub fn write_utf8(&self, buf: &mut [u8]) -> usize {
    let mut written = 0;
    for c in self.chars() {
      let Some(dst) = buf.get_mut(written..written + c.len_utf8()) else {
        break;
      };
      written += c.encode_utf8(dst).len();
    }
    written
  }

  /// Copies as many code units as fit, returning how many were copied.
  pub fn write_code_units(&self, buf: &mut [u16]) -> usize {
    let n = buf.len().min(self.0.len());
    buf[..n].copy_from_slice(&self.0[..n]);
    n
  }

  pub(crate) fn heap_size_bytes(&self) -> usize {
    self.0.len().saturating_mul(2)
  }
}

impl PartialEq<str> for JsString {
  fn eq(&self, other: &str) -> bool {
    self.0.iter().copied().eq(other.encode_utf16())
  }
}

impl fmt::Debug for JsString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "JsString({:?})", self.to_utf8_lossy())
  }
}
