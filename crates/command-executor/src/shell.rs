//! Shell quoting for command strings handed to `sh -c`.
//!
//! Every command assembled from user data (paths, package names, container
//! names) goes through [`quote`] so interpolated values reach the shell as a
//! single literal word.

use std::borrow::Cow;

const SPECIAL: &str = "\"'\\$`!*?<>|&;()[]{}#~";

/// Quote a string for safe inclusion in a POSIX shell command.
///
/// Plain words are returned unchanged; anything containing whitespace or a
/// shell metacharacter is wrapped in single quotes.
pub fn quote(s: &str) -> Cow<'_, str> {
    if s.is_empty() {
        return Cow::Borrowed("''");
    }
    if s.contains(|c: char| c.is_whitespace() || SPECIAL.contains(c)) {
        Cow::Owned(format!("'{}'", s.replace('\'', "'\"'\"'")))
    } else {
        Cow::Borrowed(s)
    }
}

/// Quote each word and join them with single spaces
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| quote(w.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
