//! Helpers for parsing the tabular output of command-line tools

/// Comparison applied by [`filter_column`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFilter<'a> {
    /// Exact match
    Eq(&'a str),
    /// Substring match
    Contains(&'a str),
    /// Prefix match
    StartsWith(&'a str),
    /// Suffix match
    EndsWith(&'a str),
}

impl ColumnFilter<'_> {
    fn matches(&self, word: &str) -> bool {
        match self {
            Self::Eq(value) => word == *value,
            Self::Contains(value) => word.contains(value),
            Self::StartsWith(value) => word.starts_with(value),
            Self::EndsWith(value) => word.ends_with(value),
        }
    }
}

/// Word at `column` of a whitespace-separated line; negative columns count
/// from the end (`-1` is the last word).
fn word_at(line: &str, column: isize) -> Option<&str> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let index = if column < 0 {
        words.len().checked_sub(column.unsigned_abs())?
    } else {
        column as usize
    };
    words.get(index).copied()
}

/// Extract one column from lines of text, skipping the first `start` lines.
///
/// Lines too short to have the column are ignored.
pub fn extract_column<'a, I>(lines: I, column: isize, start: usize) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .skip(start)
        .filter_map(|line| word_at(line, column))
        .collect()
}

/// Keep the lines whose word at `column` passes `filter`, skipping the first
/// `start` lines.
pub fn filter_column<'a, I>(
    lines: I,
    column: isize,
    start: usize,
    filter: ColumnFilter<'_>,
) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .skip(start)
        .filter(|line| word_at(line, column).is_some_and(|word| filter.matches(word)))
        .collect()
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random identifier of `len` lowercase letters and digits
pub fn random_id(len: usize) -> String {
    let mut id = String::with_capacity(len);
    while id.len() < len {
        for byte in uuid::Uuid::new_v4().as_bytes() {
            if id.len() == len {
                break;
            }
            id.push(ID_ALPHABET[*byte as usize % ID_ALPHABET.len()] as char);
        }
    }
    id
}
