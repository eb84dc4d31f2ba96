//! npm package naming rules.
//!
//! Errors make a name unusable everywhere. Warnings mark names that old
//! packages may still carry but that new packages can no longer use.

use tracing::debug;

/// Longest name the registry accepts for new packages.
pub const MAX_NAME_LENGTH: usize = 214;

/// Names npm refuses outright.
const BLACKLIST: &[&str] = &["node_modules", "favicon.ico"];

/// Node core modules, which cannot be published as packages.
const CORE_MODULES: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console",
    "constants", "crypto", "dgram", "diagnostics_channel", "dns", "domain",
    "events", "fs", "http", "http2", "https", "inspector", "module", "net",
    "os", "path", "perf_hooks", "process", "punycode", "querystring",
    "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi",
    "worker_threads", "zlib",
];

/// Outcome of checking a name against the naming rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SyntaxReport {
    /// Whether a new package may be published under this name.
    pub fn valid_for_new_packages(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Whether an existing (legacy) package could carry this name.
    pub fn valid_for_old_packages(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors followed by warnings.
    pub fn into_messages(self) -> Vec<String> {
        let mut messages = self.errors;
        messages.extend(self.warnings);
        messages
    }
}

/// Check a candidate name against npm's naming rules.
pub fn check_syntax(name: &str) -> SyntaxReport {
    let mut report = SyntaxReport::default();

    if name.is_empty() {
        report
            .errors
            .push("name length must be greater than zero".to_string());
    }
    if name.starts_with('.') {
        report.errors.push("name cannot start with a period".to_string());
    }
    if name.starts_with('_') {
        report
            .errors
            .push("name cannot start with an underscore".to_string());
    }
    if name.trim() != name {
        report
            .errors
            .push("name cannot contain leading or trailing spaces".to_string());
    }

    let lower = name.to_lowercase();
    if BLACKLIST.contains(&lower.as_str()) {
        report.errors.push(format!("{} is a blacklisted name", lower));
    }

    if CORE_MODULES.contains(&lower.as_str()) {
        report.warnings.push(format!("{} is a core module name", lower));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        report.warnings.push(format!(
            "name can no longer contain more than {} characters",
            MAX_NAME_LENGTH
        ));
    }
    if lower != name {
        report
            .warnings
            .push("name can no longer contain capital letters".to_string());
    }

    let unscoped = name.rsplit('/').next().unwrap_or(name);
    if unscoped.contains(['~', '\'', '!', '(', ')', '*']) {
        report
            .warnings
            .push("name can no longer contain special characters (\"~'!()*\")".to_string());
    }

    if !name.is_empty() && !is_url_friendly(name) {
        report
            .errors
            .push("name can only contain URL-friendly characters".to_string());
    }

    if !report.valid_for_new_packages() {
        debug!("Name {:?} fails naming rules: {:?}", name, report);
    }
    report
}

/// URL-safe as is, or a `@scope/name` pair whose parts are URL-safe.
fn is_url_friendly(name: &str) -> bool {
    if is_uri_component_safe(name) {
        return true;
    }

    let Some((scope, package)) = name.strip_prefix('@').and_then(|rest| rest.split_once('/')) else {
        return false;
    };
    !scope.is_empty()
        && !package.is_empty()
        && is_uri_component_safe(scope)
        && is_uri_component_safe(package)
        && !package.starts_with('.')
}

/// Characters a URI component keeps unescaped.
fn is_uri_component_safe(part: &str) -> bool {
    part.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_valid() {
        for name in ["lodash", "azure-mgmt-store", "a.b_c", "@scope/pkg", "x1"] {
            assert!(check_syntax(name).valid_for_new_packages(), "{}", name);
        }
    }

    #[test]
    fn test_spaces_and_at_signs() {
        let report = check_syntax(" @@__");
        assert!(!report.valid_for_new_packages());
        assert!(report
            .errors
            .contains(&"name cannot contain leading or trailing spaces".to_string()));
        assert!(report
            .errors
            .contains(&"name can only contain URL-friendly characters".to_string()));
    }

    #[test]
    fn test_empty_and_leading_characters() {
        assert_eq!(
            check_syntax("").errors,
            vec!["name length must be greater than zero".to_string()]
        );
        assert!(check_syntax(".hidden")
            .errors
            .contains(&"name cannot start with a period".to_string()));
        assert!(check_syntax("_private")
            .errors
            .contains(&"name cannot start with an underscore".to_string()));
    }

    #[test]
    fn test_blacklisted() {
        let report = check_syntax("node_modules");
        assert!(report
            .errors
            .contains(&"node_modules is a blacklisted name".to_string()));
    }

    #[test]
    fn test_warnings_block_new_packages() {
        let report = check_syntax("http");
        assert!(report.valid_for_old_packages());
        assert!(!report.valid_for_new_packages());

        let report = check_syntax("CamelCase");
        assert_eq!(
            report.warnings,
            vec!["name can no longer contain capital letters".to_string()]
        );

        let report = check_syntax("wow!");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.errors.is_empty());

        let long = "a".repeat(MAX_NAME_LENGTH + 1);
        assert!(!check_syntax(&long).valid_for_new_packages());
    }

    #[test]
    fn test_scoped_rules() {
        assert!(!check_syntax("@scope/.pkg").valid_for_old_packages());
        assert!(!check_syntax("@scope/a/b").valid_for_old_packages());
        assert!(!check_syntax("@sc ope/pkg").valid_for_old_packages());
    }

    #[test]
    fn test_messages_order() {
        let messages = check_syntax(" Http").into_messages();
        assert_eq!(messages[0], "name cannot contain leading or trailing spaces");
        assert!(messages.len() >= 2);
    }
}
