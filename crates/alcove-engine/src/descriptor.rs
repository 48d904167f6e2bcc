//! Type descriptor parsing.
//!
//! A descriptor names a type textually, optionally generic, optionally
//! qualified by an origin module:
//!
//! ```text
//! Name ['`' Arity] ['[' ArgList ']'] [',' Origin]
//! ```
//!
//! `ArgList` is a comma-separated list of descriptors. An argument is
//! wrapped in its own brackets when it carries an origin qualifier
//! (`Pair`2[[Inner, mod1],Int]`), and brackets nest arbitrarily for
//! nested generics (`Outer`1[Inner`2[A,B]]`). The scan below owns the
//! tie-break rules: a bracket opening at an argument boundary owns the
//! whole argument (the brackets are stripped), a bracket opening
//! mid-argument extends the argument to the bracket's close (the
//! brackets are kept).
//!
//! The reserved descriptor `Local.Variable.<name>` is not a type at all;
//! it tells the parameter binder to substitute a stored variable.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EngineError;

/// Head of a descriptor: base name plus optional backtick arity.
static HEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[\w+]+(\.[\w+]+)*)(`(?P<count>\d+))?$").expect("head regex")
});

/// Reserved variable-substitution sentinel.
static LOCAL_VARIABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Local\.Variable\.(?P<name>.+)$").expect("sentinel regex"));

/// Structured decomposition of a type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTypeRef {
    /// Base name, without arity marker, argument list, or origin.
    pub name: String,
    /// Declared generic arity, if the name carried a backtick marker.
    pub arity: Option<usize>,
    /// Raw argument substring (content between the outer brackets).
    pub args_src: Option<String>,
    /// Origin module qualifier, if present.
    pub origin: Option<String>,
}

impl ParsedTypeRef {
    /// A descriptor is a generic-construction candidate when it declares
    /// an arity and carries a bracketed argument list.
    pub fn is_generic(&self) -> bool {
        self.arity.is_some() && self.args_src.is_some()
    }

    /// The open-type descriptor for a generic candidate (`Name`k`).
    pub fn open_name(&self) -> Option<String> {
        self.arity.map(|n| format!("{}`{}", self.name, n))
    }
}

/// If `descriptor` matches `Local.Variable.<name>`, return `<name>`.
pub fn local_variable_name(descriptor: &str) -> Option<&str> {
    LOCAL_VARIABLE_RE
        .captures(descriptor.trim())
        .and_then(|c| c.name("name"))
        .map(|m| m.as_str())
}

/// Parse a descriptor into its structured parts.
///
/// The argument substring is located by bracket matching rather than by
/// the head regex, so origin-qualified arguments containing commas and
/// brackets cannot confuse the outer split.
pub fn parse(descriptor: &str) -> Result<ParsedTypeRef, EngineError> {
    let s = descriptor.trim();
    if s.is_empty() {
        return Err(EngineError::DescriptorSyntax("empty descriptor".into()));
    }

    let bytes = s.as_bytes();
    let (head, args_src, tail) = match bytes.iter().position(|&b| b == b'[') {
        Some(open) => {
            let close = matching_bracket(s, open)?;
            (&s[..open], Some(s[open + 1..close].to_string()), &s[close + 1..])
        }
        None => {
            // No argument list: split head from origin at the first comma.
            match bytes.iter().position(|&b| b == b',') {
                Some(comma) => (&s[..comma], None, &s[comma..]),
                None => (s, None, ""),
            }
        }
    };

    let origin = parse_origin(tail)?;

    let head = head.trim();
    let caps = HEAD_RE
        .captures(head)
        .ok_or_else(|| EngineError::DescriptorSyntax(format!("malformed type name `{}`", head)))?;
    let name = caps["name"].to_string();
    let arity = match caps.name("count") {
        Some(m) => Some(m.as_str().parse::<usize>().map_err(|_| {
            EngineError::DescriptorSyntax(format!("bad arity marker in `{}`", head))
        })?),
        None => None,
    };

    Ok(ParsedTypeRef { name, arity, args_src, origin })
}

/// Tail after the name/argument section: empty, or `, Origin ...`.
/// Anything after the origin token (version/culture noise) is ignored.
fn parse_origin(tail: &str) -> Result<Option<String>, EngineError> {
    let tail = tail.trim();
    if tail.is_empty() {
        return Ok(None);
    }
    let rest = tail.strip_prefix(',').ok_or_else(|| {
        EngineError::DescriptorSyntax(format!("unexpected trailing text `{}`", tail))
    })?;
    let token = rest.split(',').next().unwrap_or("").trim();
    if token.is_empty() {
        return Err(EngineError::DescriptorSyntax("empty origin qualifier".into()));
    }
    Ok(Some(token.to_string()))
}

/// Find the `]` matching the `[` at byte position `open`.
fn matching_bracket(s: &str, open: usize) -> Result<usize, EngineError> {
    let mut level = 0usize;
    for (i, b) in s.bytes().enumerate().skip(open) {
        match b {
            b'[' => level += 1,
            b']' => {
                level -= 1;
                if level == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(EngineError::DescriptorSyntax(format!("unbalanced brackets in `{}`", s)))
}

/// Split a generic argument substring into individual argument descriptors.
///
/// Depth-counter scan: a comma at depth zero terminates an argument; a
/// bracket at depth zero starts a sub-scope that runs to its matching
/// close. Whether the bracketed span keeps its brackets depends on where
/// the argument started (see module docs). Any trailing remainder
/// becomes one final argument.
pub fn split_args(args_src: &str) -> Result<Vec<String>, EngineError> {
    let s = args_src;
    let bytes = s.as_bytes();
    let mut args = Vec::new();

    let mut start = 0usize;
    let mut offset = 0usize;
    while offset < bytes.len() {
        match bytes[offset] {
            b'[' => {
                let close = matching_bracket(s, offset)?;
                let end = close + 1;
                if end - offset > 2 {
                    if start == offset {
                        // The bracket pair owns the argument: strip it.
                        // Example: Pair`2[[Inner, mod1],Int]
                        args.push(s[offset + 1..close].trim().to_string());
                    } else {
                        // Bracket opened mid-argument (nested generic):
                        // the argument runs to the bracket's close.
                        // Example: Outer`1[Inner`2[A,B]]
                        args.push(s[start..end].trim().to_string());
                    }
                }
                offset = end;
                start = offset;
            }
            b',' => {
                if offset > start {
                    args.push(s[start..offset].trim().to_string());
                }
                offset += 1;
                start = offset;
            }
            _ => offset += 1,
        }
    }

    if offset > start {
        args.push(s[start..offset].trim().to_string());
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let r = parse("Greeter").unwrap();
        assert_eq!(r.name, "Greeter");
        assert_eq!(r.arity, None);
        assert_eq!(r.args_src, None);
        assert_eq!(r.origin, None);
        assert!(!r.is_generic());
    }

    #[test]
    fn test_parse_origin_qualified() {
        let r = parse("Greeter, widgets").unwrap();
        assert_eq!(r.name, "Greeter");
        assert_eq!(r.origin.as_deref(), Some("widgets"));
    }

    #[test]
    fn test_parse_origin_trailing_noise_ignored() {
        let r = parse("Greeter, widgets, Version=1.0.0").unwrap();
        assert_eq!(r.origin.as_deref(), Some("widgets"));
    }

    #[test]
    fn test_parse_dotted_name() {
        let r = parse("Acme.Widgets.Greeter").unwrap();
        assert_eq!(r.name, "Acme.Widgets.Greeter");
    }

    #[test]
    fn test_parse_open_generic_name() {
        let r = parse("List`1").unwrap();
        assert_eq!(r.name, "List");
        assert_eq!(r.arity, Some(1));
        assert!(r.args_src.is_none());
        assert!(!r.is_generic());
    }

    #[test]
    fn test_parse_closed_generic() {
        let r = parse("List`1[Int]").unwrap();
        assert_eq!(r.arity, Some(1));
        assert_eq!(r.args_src.as_deref(), Some("Int"));
        assert!(r.is_generic());
        assert_eq!(r.open_name().as_deref(), Some("List`1"));
    }

    #[test]
    fn test_parse_generic_with_origin() {
        let r = parse("Pair`2[[Inner, mod1],Int], mod2").unwrap();
        assert_eq!(r.name, "Pair");
        assert_eq!(r.arity, Some(2));
        assert_eq!(r.args_src.as_deref(), Some("[Inner, mod1],Int"));
        assert_eq!(r.origin.as_deref(), Some("mod2"));
    }

    #[test]
    fn test_parse_rejects_unbalanced() {
        assert!(parse("List`1[Int").is_err());
        assert!(parse("").is_err());
        assert!(parse("List`1[Int]]").is_err());
    }

    #[test]
    fn test_split_plain_args() {
        assert_eq!(split_args("A,B").unwrap(), vec!["A", "B"]);
        assert_eq!(split_args("A").unwrap(), vec!["A"]);
        assert_eq!(split_args(" A , B ").unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_split_bracket_owns_argument() {
        // Bracket at the argument boundary: brackets stripped.
        assert_eq!(
            split_args("[Inner, mod1],Int").unwrap(),
            vec!["Inner, mod1", "Int"]
        );
    }

    #[test]
    fn test_split_bracket_mid_argument() {
        // Nested generic: the bracket extends the argument, brackets kept.
        assert_eq!(
            split_args("Inner`2[A,B]").unwrap(),
            vec!["Inner`2[A,B]"]
        );
        assert_eq!(
            split_args("Inner`1[A],Other").unwrap(),
            vec!["Inner`1[A]", "Other"]
        );
    }

    #[test]
    fn test_split_mixed_plain_and_bracketed() {
        assert_eq!(
            split_args("Int,[Inner, mod1]").unwrap(),
            vec!["Int", "Inner, mod1"]
        );
    }

    #[test]
    fn test_split_deep_nesting() {
        assert_eq!(
            split_args("Outer`1[Inner`2[[A, m],B]]").unwrap(),
            vec!["Outer`1[Inner`2[[A, m],B]]"]
        );
    }

    #[test]
    fn test_split_empty_bracket_group_yields_nothing() {
        assert!(split_args("[]").unwrap().is_empty());
    }

    #[test]
    fn test_split_unbalanced_fails() {
        assert!(split_args("[A, m").is_err());
    }

    #[test]
    fn test_local_variable_sentinel() {
        assert_eq!(local_variable_name("Local.Variable.x"), Some("x"));
        assert_eq!(local_variable_name("Local.Variable.my var"), Some("my var"));
        assert_eq!(local_variable_name("Local.Variable."), None);
        assert_eq!(local_variable_name("System.String"), None);
    }
}
