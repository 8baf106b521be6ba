/// Type alias for sets, we use this to hide which type of `HashSet` we are actually using.
/// Iteration follows insertion order, which keeps every algorithm built on top deterministic.
pub type Set<S> = indexmap::IndexSet<S>;

/// Type alias for maps, iteration follows insertion order.
pub type Map<K, V> = indexmap::IndexMap<K, V>;

/// A set that is only ever used for membership tests, never iterated.
pub type HashSet<S> = fxhash::FxHashSet<S>;
/// A map that is only ever used for lookups, never iterated.
pub type HashMap<K, V> = fxhash::FxHashMap<K, V>;

/// Represents a bijective mapping between `L` and `R`, that is a mapping which associates
/// each `L` with precisely one `R` and vice versa.
pub type Bijection<L, R> = bimap::BiBTreeMap<L, R>;
