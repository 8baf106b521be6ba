use std::fmt::{Debug, Display};

use crate::Show;

/// An immutable finite sequence of symbols. Words are used for both input and output sequences,
/// so the type of the elements is not restricted to alphabet symbols.
///
/// All operations that would modify the word return a new one instead.
///
/// # Example
/// ```
/// use automata_core::prelude::*;
/// let word = Word::from("abcde");
/// assert_eq!(word.prefix(2), Word::from("ab"));
/// assert_eq!(word.suffix(2), Word::from("de"));
/// assert_eq!(word.subword(1, 3), Word::from("bc"));
/// assert_eq!(word.skip(3).append('f'), Word::from("def"));
/// assert_eq!(Word::<char>::epsilon().len(), 0);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Word<T>(Vec<T>);

impl<T> Word<T> {
    /// Returns the empty word.
    pub fn epsilon() -> Self {
        Self(vec![])
    }

    /// Returns the number of symbols in `self`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if `self` is the empty word.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over references to the symbols.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Gives a slice of all symbols in order.
    pub fn symbols(&self) -> &[T] {
        &self.0
    }
}

impl<T: Clone> Word<T> {
    /// Creates a word consisting only of the given symbol.
    pub fn singleton(symbol: T) -> Self {
        Self(vec![symbol])
    }

    /// Returns the symbol at the given position, if it exists.
    pub fn nth(&self, position: usize) -> Option<T> {
        self.0.get(position).cloned()
    }

    /// Returns the first symbol, if it exists.
    pub fn first(&self) -> Option<T> {
        self.0.first().cloned()
    }

    /// Returns the last symbol, if it exists.
    pub fn last(&self) -> Option<T> {
        self.0.last().cloned()
    }

    /// Returns the prefix of length `length`. Panics if `length` exceeds the length of `self`.
    pub fn prefix(&self, length: usize) -> Self {
        Self(self.0[..length].to_vec())
    }

    /// Returns the suffix consisting of the last `length` symbols.
    pub fn suffix(&self, length: usize) -> Self {
        Self(self.0[self.len() - length..].to_vec())
    }

    /// Returns the symbols from position `from` (inclusive) to `to` (exclusive).
    pub fn subword(&self, from: usize, to: usize) -> Self {
        Self(self.0[from..to].to_vec())
    }

    /// Returns the suffix that starts at position `offset`.
    pub fn skip(&self, offset: usize) -> Self {
        Self(self.0[offset..].to_vec())
    }

    /// Returns the concatenation of `self` and `other`.
    pub fn concat(&self, other: &Self) -> Self {
        let mut symbols = Vec::with_capacity(self.len() + other.len());
        symbols.extend_from_slice(&self.0);
        symbols.extend_from_slice(&other.0);
        Self(symbols)
    }

    /// Returns a new word that is `self` followed by `symbol`.
    pub fn append(&self, symbol: T) -> Self {
        let mut symbols = Vec::with_capacity(self.len() + 1);
        symbols.extend_from_slice(&self.0);
        symbols.push(symbol);
        Self(symbols)
    }

    /// Returns a new word that is `symbol` followed by `self`.
    pub fn prepend(&self, symbol: T) -> Self {
        let mut symbols = Vec::with_capacity(self.len() + 1);
        symbols.push(symbol);
        symbols.extend_from_slice(&self.0);
        Self(symbols)
    }
}

impl<T: PartialEq> Word<T> {
    /// Returns `true` if `prefix` is a prefix of `self`.
    pub fn starts_with(&self, prefix: &Word<T>) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl<T> std::ops::Index<usize> for Word<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> FromIterator<T> for Word<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Word<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Word<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T> From<Vec<T>> for Word<T> {
    fn from(value: Vec<T>) -> Self {
        Self(value)
    }
}

impl<T: Clone> From<&[T]> for Word<T> {
    fn from(value: &[T]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&str> for Word<char> {
    fn from(value: &str) -> Self {
        Self(value.chars().collect())
    }
}

impl<T: Show> Show for Word<T> {
    fn show(&self) -> String {
        T::show_collection(self.0.iter())
    }
}

impl<T: Debug> Debug for Word<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<T: Show> Display for Word<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.show())
    }
}
