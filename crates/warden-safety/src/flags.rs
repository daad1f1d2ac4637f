//! Command-line flag blacklist for external processes.

use std::collections::BTreeSet;
use tracing::warn;

/// Flags stripped from every argument list by default.
pub const DEFAULT_BLOCKED_FLAGS: &[&str] = &[
    "--os-shell",
    "--os-pwn",
    "--os-smbrelay",
    "--os-bof",
    "--priv-esc",
    "--os-cmd",
    "--msfvenom",
    "--os-smbexec",
];

/// Result of filtering one argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredArgs {
    /// Arguments that survive.
    pub kept: Vec<String>,
    /// Tokens that were removed, including consumed values.
    pub removed: Vec<String>,
}

/// Strips blacklisted flags from argument lists.
///
/// A blacklisted flag also consumes the following token when that token
/// does not start with `-`. The `--flag=value` form is removed as one token.
/// Filtering never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagFilter {
    blocked: BTreeSet<String>,
}

impl Default for FlagFilter {
    fn default() -> Self {
        Self::with_flags(DEFAULT_BLOCKED_FLAGS.iter().copied())
    }
}

impl FlagFilter {
    /// A filter with an explicit blacklist. An empty list blocks nothing.
    #[must_use]
    pub fn with_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: flags.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `token` is a blocked flag, in bare or `--flag=value` form.
    #[must_use]
    pub fn is_blocked(&self, token: &str) -> bool {
        if self.blocked.contains(token) {
            return true;
        }
        token
            .split_once('=')
            .is_some_and(|(flag, _)| self.blocked.contains(flag))
    }

    /// The blacklisted flags.
    pub fn blocked_flags(&self) -> impl Iterator<Item = &str> {
        self.blocked.iter().map(String::as_str)
    }

    /// Filter `args`, returning what was kept and what was removed.
    #[must_use]
    pub fn filter_with_report<S: AsRef<str>>(&self, args: &[S]) -> FilteredArgs {
        let mut out = FilteredArgs::default();
        let mut tokens = args.iter().map(AsRef::as_ref).peekable();

        while let Some(token) = tokens.next() {
            if !self.is_blocked(token) {
                out.kept.push(token.to_string());
                continue;
            }
            out.removed.push(token.to_string());
            let takes_value = !token.contains('=');
            if takes_value && let Some(value) = tokens.next_if(|next| !next.starts_with('-')) {
                out.removed.push(value.to_string());
            }
        }

        if !out.removed.is_empty() {
            warn!(removed = ?out.removed, "Stripped blocked flags from argument list");
        }
        out
    }

    /// Filter `args`, returning only the surviving arguments.
    #[must_use]
    pub fn filter<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        self.filter_with_report(args).kept
    }

    /// Blocked flags present in `args`, without their values.
    #[must_use]
    pub fn find_blocked<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        args.iter()
            .map(AsRef::as_ref)
            .filter(|t| self.is_blocked(t))
            .map(ToString::to_string)
            .collect()
    }
}
