//! Native-interface bridge for JavaScript engine extension modules.
//!
//! Native modules never touch engine values directly. They work through an [`Env`]: every value
//! they see is a scope-bound [`Handle`], every value they keep is a ref-counted [`GlobalRef`], and
//! every failure is reported through an advisory error code or a pending exception.
//!
//! # Handles and local scopes
//!
//! A [`Handle`] is an index into the environment's handle arena plus a stamp. Handles are created
//! inside the innermost local scope and released, all at once, when that scope is popped. Every
//! native callback runs inside an implicit scope, so handles created by a callback that pushes no
//! scope of its own are released when it returns. An escapable scope promotes exactly one handle to
//! its parent.
//!
//! A handle that outlived its scope does not dangle: once its arena slot is reused the stamp no
//! longer matches and it resolves like [`Handle::EMPTY`].
//!
//! # Global references
//!
//! A [`GlobalRef`] keeps its value alive across scopes and collections while its count is
//! positive. When the count drops to zero (or the reference is deleted) with a finalizer
//! registered, the reference turns weak; the finalizer runs once the collector finds the value
//! unreachable. See [`GlobalRefState`].
//!
//! # Errors
//!
//! - Type mismatches record an [`ErrorCode`] and return a sentinel; read it back with
//!   [`Env::get_last_error_info`].
//! - Exceptions thrown by callees or by native code are held as the pending exception and re-raised
//!   to the caller of the native callback unless cleared.
//! - Internal consistency violations are fatal (see [`FatalMode`]).
//!
//! # Collection
//!
//! The heap is a non-moving mark/sweep heap with generation-checked ids. It collects only on
//! [`Env::collect_garbage`], or at a native call boundary once it has grown past
//! [`HeapLimits::gc_threshold`].

mod array;
mod callback;
mod convert;
mod env;
mod error;
mod exception;
mod function;
mod global_ref;
mod handle;
mod heap;
mod intrinsics;
mod module;
mod object;
mod property;
mod scope;
mod string;
mod typed_array;
mod value;

pub use crate::callback::CallbackInfo;
pub use crate::callback::CallbackKind;
pub use crate::callback::ExternalData;
pub use crate::callback::NativeCallback;
pub use crate::env::Env;
pub use crate::env::EnvOptions;
pub use crate::error::ErrorCode;
pub use crate::error::ErrorInfo;
pub use crate::error::FatalMode;
pub use crate::error::LoadError;
pub use crate::error::VmError;
pub use crate::exception::ErrorKind;
pub use crate::global_ref::FinalizeCallback;
pub use crate::global_ref::GlobalRefState;
pub use crate::handle::GcObject;
pub use crate::handle::GcString;
pub use crate::handle::GcSymbol;
pub use crate::handle::GlobalRef;
pub use crate::handle::Handle;
pub use crate::handle::HeapId;
pub use crate::handle::RootId;
pub use crate::heap::Heap;
pub use crate::heap::HeapLimits;
pub use crate::heap::MAX_PROTOTYPE_CHAIN;
pub use crate::module::ModuleInitFn;
pub use crate::module::Version;
pub use crate::module::JSNI_VERSION_1_0;
pub use crate::module::JSNI_VERSION_1_1;
pub use crate::module::JSNI_VERSION_2_0;
pub use crate::module::JSNI_VERSION_2_1;
pub use crate::module::JSNI_VERSION_2_2;
pub use crate::module::JSNI_VERSION_2_3;
pub use crate::property::AccessorPropertyDescriptor;
pub use crate::property::DataPropertyDescriptor;
pub use crate::property::PropertyAttributes;
pub use crate::property::PropertyDescriptor;
pub use crate::string::JsString;
pub use crate::typed_array::SharedBuffer;
pub use crate::typed_array::TypedArrayType;
pub use crate::value::Value;
