//! Embedded static resources.
//!
//! - `build` - the default entrypoint template for the aggregate
//! - `serve` - the loader userscript and the index page

mod template;

pub use template::{Template, TemplateVars};

pub mod build {
    /// Default entrypoint template.
    ///
    /// Text between `/* loop-start */` and `/* loop-end */` is repeated once
    /// per package with `/* matches */`, `/* require-name */` and `/* name */`
    /// substituted; `/* date */` is substituted everywhere.
    pub const ENTRYPOINT_JS: &str = include_str!("build/entrypoint.js");
}

pub mod serve {
    use super::{Template, TemplateVars};

    /// Variables for bootstrap.user.js.
    pub struct BootstrapVars {
        pub hostname: String,
        pub port: u16,
    }

    impl TemplateVars for BootstrapVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("{{hostname}}", &self.hostname)
                .replace("{{port}}", &self.port.to_string())
        }
    }

    /// Loader userscript header.
    pub const BOOTSTRAP_USER_JS: Template<BootstrapVars> =
        Template::new(include_str!("serve/bootstrap.user.js"));

    /// Variables for index.html.
    pub struct IndexVars {
        /// Build status line (plain text, escaped here).
        pub status: String,
        /// `(name, patterns)` per registered package.
        pub packages: Vec<(String, Vec<String>)>,
    }

    impl TemplateVars for IndexVars {
        fn apply(&self, content: &str) -> String {
            let packages = self
                .packages
                .iter()
                .map(|(name, matches)| {
                    format!(
                        "    <li><strong>{}</strong> <code>{}</code></li>",
                        escape_html(name),
                        escape_html(&matches.join(" "))
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            content
                .replace("__STATUS__", &escape_html(&self.status))
                .replace("__PACKAGES__", &packages)
        }
    }

    /// Server index page.
    pub const INDEX_HTML: Template<IndexVars> =
        Template::new(include_str!("serve/index.html"));

    fn escape_html(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }
}
