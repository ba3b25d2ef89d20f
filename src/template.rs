use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([A-Z][A-Z_]*?)__").expect("Invalid placeholder regex"));

/// Substitute `__KEY__` placeholders in one pass.
///
/// Substituted values are never rescanned, so user text containing a
/// placeholder token comes out verbatim. Unknown placeholders are kept.
pub(crate) fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let out = render("__HOME__/bin:__HOME__/.local/bin", &[("HOME", "/home/deck")]);
        assert_eq!(out, "/home/deck/bin:/home/deck/.local/bin");
    }

    #[test]
    fn test_render_keys_with_underscores() {
        let out = render("run \"__SCRIPT_PATH__\"", &[("SCRIPT_PATH", "/x/heartbeat.sh")]);
        assert_eq!(out, "run \"/x/heartbeat.sh\"");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render(
            "__DESCRIPTION__ / __SHARED__",
            &[("DESCRIPTION", "see __SHARED__"), ("SHARED", "/shared.md")],
        );
        assert_eq!(out, "see __SHARED__ / /shared.md");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        assert_eq!(render("a __OTHER__ b", &[("NAME", "x")]), "a __OTHER__ b");
    }
}
