//! Configuration sections of `uspack.toml`.
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[build]`   | Package root, build root, libs, minify, ignore   |
//! | `[bundler]` | External bundler command line                    |
//! | `[serve]`   | HTTP server (interface, port, hostname, watch)   |
//! | `[watch]`   | Drain interval and polling                       |

pub mod build;
mod bundler;
mod serve;
mod watch;

pub use build::BuildSectionConfig;
pub use bundler::BundlerConfig;
pub use serve::ServeConfig;
pub use watch::WatchConfig;
