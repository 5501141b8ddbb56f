//! Capability declaration for privileged targets.
//!
//! A target declares which of its methods may be invoked from the elevated
//! helper by building a [`MethodTable`]: an explicit, finite mapping from
//! method name to an ordered list of argument coercions plus a bound invoker.
//! The table is built once at startup; there is no runtime reflection.
//!
//! Both sides of the privilege boundary derive their checks from the same
//! table. The unprivileged proxy projects it into an invoker-free
//! [`AllowList`] for pre-flight checks; the elevated dispatcher keeps the
//! full table and refuses anything outside it.
//!
//! # Example
//!
//! ```
//! use sudo_proxy::allowlist::{ArgKind, Elevated, MethodTable, Value};
//!
//! struct Updater {
//!     installed: Vec<String>,
//! }
//!
//! impl Elevated for Updater {
//!     fn name(&self) -> &str {
//!         "acme-updater"
//!     }
//!
//!     fn method_table() -> MethodTable<Self> {
//!         MethodTable::new().register("install_version", &[ArgKind::Str], |app: &mut Updater, args| {
//!             let version = args[0].expect_str()?;
//!             app.installed.push(version.to_string());
//!             Ok(Value::Bool(true))
//!         })
//!     }
//! }
//! ```

mod table;
mod value;

pub use table::{AllowList, Elevated, InvokeError, MethodTable};
pub use value::{ArgKind, CallFault, Value};
