//! Call-recording stubs and self-restoring spies for test suites.
//!
//! A [`Stub`] wraps a [`Callable`] and appends a [`CallRecord`] for every
//! invocation. A spy is a stub installed over a named method of a
//! [`MethodSlots`] target; the swap is registered with the running test's
//! [`Registry`] and undone when the test ends.
//!
//! ```
//! use ninos::{Callable, Lifecycle, Object};
//! use serde_json::json;
//!
//! let obj = Object::new().with_method("m", Callable::new(|_, _| Ok(json!("orig"))));
//! let lifecycle = Lifecycle::default();
//! {
//!     let doubles = lifecycle.sandbox("example");
//!     let spy = doubles
//!         .spy(&obj, "m", Some(Callable::new(|_, args| Ok(json!(args.len())))))
//!         .unwrap();
//!     assert_eq!(obj.call("m", &[json!(1), json!(2)]).unwrap(), json!(2));
//!     assert_eq!(spy.calls().len(), 1);
//! }
//! assert_eq!(obj.call("m", &[]).unwrap(), json!("orig"));
//! ```

pub mod callable;
pub mod config;
pub mod errors;
pub mod harness;
pub mod interceptor;
pub mod lifecycle;
pub mod logging;
pub mod record;
pub mod recorder;
pub mod registry;
pub mod slots;
mod sync;

pub use callable::{Callable, ErrorMessage, Thrown};
pub use config::{load_config, parse_config, NinosConfig};
pub use errors::NinosError;
pub use interceptor::{intercept, intercept_with, Interceptor};
pub use lifecycle::{install, Doubles, Hook, Lifecycle, Sandbox, TestContext, TestHooks};
pub use record::{CallLog, CallRecord, Outcome};
pub use recorder::{create_recorder, Stub};
pub use registry::Registry;
pub use slots::{MethodSlots, Object};
