use std::hash::Hash;

pub(crate) type HashFn<T> = fn(&T) -> u64;

pub(crate) fn hash_of<T: Hash>(value: &T) -> u64 {
	fxhash::hash64(value)
}

/// A value together with the hash it had when it was stored. The hash
/// stands in for an equality predicate: two stores with the same hash
/// are treated as "unchanged". `hash` is `None` for value types without
/// `Hash`, in which case every store counts as a change.
pub(crate) struct Hashed<T> {
	pub value: T,
	pub hash: Option<u64>,
}

impl<T> Hashed<T> {
	pub fn new(value: T, hasher: Option<HashFn<T>>) -> Self {
		let hash = hasher.map(|hasher| hasher(&value));
		Hashed { value, hash }
	}

	/// Stores `value` and reports whether the stored value actually
	/// changed. Equal hashes suppress the write entirely.
	pub fn replace(&mut self, value: T, hasher: Option<HashFn<T>>) -> bool {
		let next = Hashed::new(value, hasher);
		match (self.hash, next.hash) {
			(Some(prev), Some(new)) if prev == new => false,
			_ => {
				*self = next;
				true
			}
		}
	}
}
