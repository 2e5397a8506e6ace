//! FireBridge Commands - identifier to request translation
//!
//! Every command the host can send is either an entry of the static table
//! ([`table::COMMANDS`]) or a `custom_app:<package>` identifier. Anything else
//! is rejected before it can reach the network.
//!
//! ```
//! use firebridge_commands::CommandTranslator;
//!
//! let translator = CommandTranslator::new();
//! let spec = translator.resolve("DPAD_DOWN").unwrap();
//! let request = spec.to_request("FireTV");
//! assert_eq!(request.to_string(), "POST /v1/FireTV?action=DPAD_DOWN");
//! ```

mod spec;
pub mod table;
mod translator;

pub use spec::{CommandCategory, CommandParam, CommandSpec, ScanDirection};
pub use translator::{
    is_valid_package, CommandTranslator, ResolveError, ResolveResult, CUSTOM_APP_PREFIX,
};
