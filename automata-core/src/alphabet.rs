use std::{fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::Show;

/// A symbol of an alphabet, which is also the type of the symbols in a word. Symbols are small
/// values that are compared by equality, so we require them to be `Copy` and totally ordered.
pub trait Symbol: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show {}
impl<S: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show> Symbol for S {}

/// An alphabet abstracts a finite, ordered collection of [`Symbol`]s. The order in which
/// [`Alphabet::universe`] yields the symbols is the order in which learning algorithms
/// iterate over inputs, which makes them deterministic.
pub trait Alphabet: Clone + Debug + PartialEq {
    /// The type of symbols in this alphabet.
    type Symbol: Symbol;

    /// Type for an iterator over all possible symbols in the alphabet.
    type Universe<'this>: Iterator<Item = Self::Symbol>
    where
        Self: 'this;

    /// Returns an iterator over all symbols in the alphabet, in order.
    fn universe(&self) -> Self::Universe<'_>;

    /// Returns true if the given symbol is present in the alphabet.
    fn contains(&self, symbol: Self::Symbol) -> bool {
        self.position(symbol).is_some()
    }

    /// Returns the position of the given symbol in the alphabet, if it is present.
    fn position(&self, symbol: Self::Symbol) -> Option<usize>;

    /// Returns the symbol at the given position.
    fn nth(&self, position: usize) -> Option<Self::Symbol>;

    /// Returns the number of symbols in the alphabet.
    fn size(&self) -> usize;

    /// Returns true if the alphabet contains no symbols at all.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// An alphabet that may be extended while it is in use. New symbols are always appended, so the
/// [`Alphabet::position`] of a symbol never changes once it has been added. This allows data
/// structures that are indexed by symbol positions to grow without rehashing.
pub trait GrowingAlphabet: Alphabet {
    /// Adds the given symbol to the alphabet. Returns `true` if the symbol was not present before,
    /// adding a symbol twice is a no-op.
    fn add_symbol(&mut self, symbol: Self::Symbol) -> bool;
}

impl<A: Alphabet> Alphabet for &A {
    type Symbol = A::Symbol;
    type Universe<'this> = A::Universe<'this> where Self: 'this;

    fn universe(&self) -> Self::Universe<'_> {
        A::universe(self)
    }
    fn contains(&self, symbol: Self::Symbol) -> bool {
        A::contains(self, symbol)
    }
    fn position(&self, symbol: Self::Symbol) -> Option<usize> {
        A::position(self, symbol)
    }
    fn nth(&self, position: usize) -> Option<Self::Symbol> {
        A::nth(self, position)
    }
    fn size(&self) -> usize {
        A::size(self)
    }
}

/// Represents an alphabet that is just a list of symbols, the position of a symbol in the list
/// determines its position in the alphabet.
///
/// # Example
/// ```
/// use automata_core::prelude::*;
/// let mut alphabet = CharAlphabet::of_size(2);
/// assert_eq!(alphabet.universe().collect::<Vec<_>>(), vec!['a', 'b']);
/// assert!(alphabet.add_symbol('c'));
/// assert!(!alphabet.add_symbol('a'));
/// assert_eq!(alphabet.position('c'), Some(2));
/// ```
#[derive(Clone, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub struct SimpleAlphabet<S>(pub(crate) Vec<S>);

/// Represents an alphabet where a [`Symbol`] is just a single `char`.
pub type CharAlphabet = SimpleAlphabet<char>;

impl CharAlphabet {
    /// Creates a new [`CharAlphabet`] alphabet of the given size. The symbols are just the first `size` letters
    /// of the alphabet, i.e. 'a' to 'z'.
    pub fn of_size(size: usize) -> Self {
        assert!(size <= 26, "Alphabet is too large");
        Self((0..size).map(|i| (b'a' + i as u8) as char).collect())
    }
}

impl<S: Symbol> SimpleAlphabet<S> {
    /// Creates a new alphabet from an iterator over the symbols. The order of the iterator is kept,
    /// duplicates are dropped.
    pub fn new<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        Self(symbols.into_iter().unique().collect())
    }

    /// Gives a slice over all symbols in order.
    pub fn symbols(&self) -> &[S] {
        &self.0
    }
}

impl<S> std::ops::Index<usize> for SimpleAlphabet<S> {
    type Output = S;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Helper macro for creating a [`CharAlphabet`] alphabet. Is called simply with a list of symbols
/// that are separated by commata.
///
/// # Examples
/// ```
/// use automata_core::prelude::*;
/// let alphabet = alphabet!(simple 'a', 'b', 'c');
/// assert_eq!(alphabet.size(), 3);
/// ```
#[macro_export]
macro_rules! alphabet {
    (simple $($c:literal),*) => {
        $crate::alphabet::SimpleAlphabet::new(vec![$($c),*])
    };
}

impl<S: Symbol> From<Vec<S>> for SimpleAlphabet<S> {
    fn from(value: Vec<S>) -> Self {
        Self::new(value)
    }
}

impl<S: Symbol> FromIterator<S> for SimpleAlphabet<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().unique().sorted().collect())
    }
}

impl<S: Symbol> Alphabet for SimpleAlphabet<S> {
    type Symbol = S;

    type Universe<'this> = std::iter::Cloned<std::slice::Iter<'this, S>>
        where
            Self: 'this;

    fn universe(&self) -> Self::Universe<'_> {
        self.0.iter().cloned()
    }

    fn position(&self, symbol: Self::Symbol) -> Option<usize> {
        self.0.iter().position(|s| s == &symbol)
    }

    fn nth(&self, position: usize) -> Option<Self::Symbol> {
        self.0.get(position).copied()
    }

    fn size(&self) -> usize {
        self.0.len()
    }
}

impl<S: Symbol> GrowingAlphabet for SimpleAlphabet<S> {
    fn add_symbol(&mut self, symbol: Self::Symbol) -> bool {
        if self.contains(symbol) {
            return false;
        }
        self.0.push(symbol);
        true
    }
}

impl<S: Symbol> Show for SimpleAlphabet<S> {
    fn show(&self) -> String {
        format!("{{{}}}", self.0.iter().map(|s| s.show()).join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_from_iter_is_sorted_and_unique() {
        let alphabet: CharAlphabet = "cabbc".chars().collect();
        assert_eq!(alphabet.symbols(), &['a', 'b', 'c']);
        assert_eq!(alphabet.show(), "{a, b, c}");
    }

    #[test]
    fn growing_keeps_positions() {
        let mut alphabet = alphabet!(simple 'x', 'y');
        assert_eq!(alphabet.position('y'), Some(1));
        assert!(alphabet.add_symbol('a'));
        assert!(!alphabet.add_symbol('a'));
        assert_eq!(alphabet.position('y'), Some(1));
        assert_eq!(alphabet.position('a'), Some(2));
        assert_eq!(alphabet.nth(2), Some('a'));
        assert_eq!(alphabet.size(), 3);
        assert!(!alphabet.contains('z'));
    }
}
