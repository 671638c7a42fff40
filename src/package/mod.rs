//! Userscript packages.
//!
//! A package is an immediate sub-directory of the package root holding a
//! `package.json` manifest:
//!
//! ```json
//! {
//!   "name": "github-tweaks",
//!   "main": "index.js",
//!   "userScript": { "matches": ["https://github.com/*"], "isProduction": true }
//! }
//! ```
//!
//! | Module     | Purpose                                         |
//! |------------|-------------------------------------------------|
//! | `manifest` | `package.json` reading and validation           |
//! | `registry` | Discovery of all packages under the package root|
//! | `pattern`  | Anchored `*` glob matching against page URLs    |

mod manifest;
mod pattern;
mod registry;

pub use manifest::{MANIFEST_FILE, ManifestError, Package};
pub use pattern::{glob_to_regex, matches_any};
pub use registry::{PackageRegistry, RegistryError};
