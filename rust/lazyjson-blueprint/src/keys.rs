//! Key storages: index-addressable arrays of keys that widen on overflow.
//!
//! Every storage keeps all of its slots at a single integer width (`i16`, `i32` or `i64`),
//! the narrowest one able to hold every key written so far. Writing a key that does not
//! fit widens the storage; widening is monotonic and never narrows back. The mutating
//! operations consume the storage and hand back the (possibly widened) result, so callers
//! always continue with the returned value.

use lazyjson_common::{Error, Result};

/// A per-field index entry: an inline value, `offset + 1`, or `list id + 1`.
pub type Key = i64;

/// The absent/null key.
pub const NULL_KEY: Key = 0;

/// Integer width of the slots of a key storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyWidth {
    Short,
    Int,
    Long,
}

impl KeyWidth {
    /// The narrowest width able to hold `key`.
    pub fn for_value(key: Key) -> KeyWidth {
        if i16::try_from(key).is_ok() {
            KeyWidth::Short
        } else if i32::try_from(key).is_ok() {
            KeyWidth::Int
        } else {
            KeyWidth::Long
        }
    }

    pub fn fits(self, key: Key) -> bool {
        KeyWidth::for_value(key) <= self
    }
}

/// A key storage with a slot count fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedKeys {
    Short(Box<[i16]>),
    Int(Box<[i32]>),
    Long(Box<[i64]>),
}

impl FixedKeys {
    /// Creates a storage of `len` null keys at the narrowest width.
    pub fn new(len: usize) -> FixedKeys {
        FixedKeys::with_width(len, KeyWidth::Short)
    }

    pub fn with_width(len: usize, width: KeyWidth) -> FixedKeys {
        match width {
            KeyWidth::Short => FixedKeys::Short(vec![0; len].into_boxed_slice()),
            KeyWidth::Int => FixedKeys::Int(vec![0; len].into_boxed_slice()),
            KeyWidth::Long => FixedKeys::Long(vec![0; len].into_boxed_slice()),
        }
    }

    /// Builds a storage holding `keys` at the narrowest width covering all of them.
    pub fn from_keys(keys: &[Key]) -> FixedKeys {
        let width = keys
            .iter()
            .map(|&k| KeyWidth::for_value(k))
            .max()
            .unwrap_or(KeyWidth::Short);
        match width {
            KeyWidth::Short => FixedKeys::Short(keys.iter().map(|&k| k as i16).collect()),
            KeyWidth::Int => FixedKeys::Int(keys.iter().map(|&k| k as i32).collect()),
            KeyWidth::Long => FixedKeys::Long(keys.into()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FixedKeys::Short(keys) => keys.len(),
            FixedKeys::Int(keys) => keys.len(),
            FixedKeys::Long(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> KeyWidth {
        match self {
            FixedKeys::Short(_) => KeyWidth::Short,
            FixedKeys::Int(_) => KeyWidth::Int,
            FixedKeys::Long(_) => KeyWidth::Long,
        }
    }

    /// Returns the key at `index`.
    pub fn get(&self, index: usize) -> Result<Key> {
        let key = match self {
            FixedKeys::Short(keys) => keys.get(index).map(|&k| k as Key),
            FixedKeys::Int(keys) => keys.get(index).map(|&k| k as Key),
            FixedKeys::Long(keys) => keys.get(index).copied(),
        };
        key.ok_or_else(|| Error::out_of_bounds("key storage", index as u64, self.len() as u64))
    }

    /// Stores `key` at `index`, widening the storage if `key` does not fit.
    pub fn set(self, index: usize, key: Key) -> Result<FixedKeys> {
        if index >= self.len() {
            return Err(Error::out_of_bounds(
                "key storage",
                index as u64,
                self.len() as u64,
            ));
        }
        let mut keys = if self.width().fits(key) {
            self
        } else {
            self.widen(KeyWidth::for_value(key))
        };
        match &mut keys {
            FixedKeys::Short(slots) => slots[index] = key as i16,
            FixedKeys::Int(slots) => slots[index] = key as i32,
            FixedKeys::Long(slots) => slots[index] = key,
        }
        Ok(keys)
    }

    /// Converts the storage to `width`, or returns it unchanged if it is already at least
    /// that wide.
    pub fn widen(self, width: KeyWidth) -> FixedKeys {
        if width <= self.width() {
            return self;
        }
        match width {
            KeyWidth::Short => self,
            KeyWidth::Int => FixedKeys::Int(self.iter().map(|k| k as i32).collect()),
            KeyWidth::Long => FixedKeys::Long(self.iter().collect()),
        }
    }

    /// Creates an empty storage of the same length and width.
    pub fn reproduce(&self) -> FixedKeys {
        FixedKeys::with_width(self.len(), self.width())
    }

    /// Joins storages of equal length `L` into one storage of length `N × L` at the widest
    /// width among the parts.
    pub fn concat(parts: &[FixedKeys]) -> Result<FixedKeys> {
        let Some(first) = parts.first() else {
            return Ok(FixedKeys::new(0));
        };
        let part_len = first.len();
        if let Some(bad) = parts.iter().find(|p| p.len() != part_len) {
            return Err(Error::invalid_arg(
                "parts",
                format!(
                    "cannot concatenate storages of length {} and {part_len}",
                    bad.len()
                ),
            ));
        }
        let width = parts
            .iter()
            .map(FixedKeys::width)
            .max()
            .unwrap_or(KeyWidth::Short);
        let total = part_len * parts.len();
        Ok(match width {
            KeyWidth::Short => {
                let mut out = Vec::with_capacity(total);
                for part in parts {
                    out.extend(part.iter().map(|k| k as i16));
                }
                FixedKeys::Short(out.into_boxed_slice())
            }
            KeyWidth::Int => {
                let mut out = Vec::with_capacity(total);
                for part in parts {
                    out.extend(part.iter().map(|k| k as i32));
                }
                FixedKeys::Int(out.into_boxed_slice())
            }
            KeyWidth::Long => {
                let mut out = Vec::with_capacity(total);
                for part in parts {
                    out.extend(part.iter());
                }
                FixedKeys::Long(out.into_boxed_slice())
            }
        })
    }

    pub fn iter(&self) -> KeyIter<'_> {
        KeyIter {
            keys: self.as_slice(),
            pos: 0,
        }
    }

    /// Largest key stored, or `0` for an empty storage.
    pub fn max_value(&self) -> Key {
        self.iter().max().unwrap_or(NULL_KEY)
    }

    pub fn to_vec(&self) -> Vec<Key> {
        self.iter().collect()
    }

    fn as_slice(&self) -> KeySlice<'_> {
        match self {
            FixedKeys::Short(keys) => KeySlice::Short(keys),
            FixedKeys::Int(keys) => KeySlice::Int(keys),
            FixedKeys::Long(keys) => KeySlice::Long(keys),
        }
    }
}

#[derive(Clone, Copy)]
enum KeySlice<'a> {
    Short(&'a [i16]),
    Int(&'a [i32]),
    Long(&'a [i64]),
}

impl KeySlice<'_> {
    fn len(&self) -> usize {
        match self {
            KeySlice::Short(s) => s.len(),
            KeySlice::Int(s) => s.len(),
            KeySlice::Long(s) => s.len(),
        }
    }

    fn at(&self, index: usize) -> Key {
        match self {
            KeySlice::Short(s) => s[index] as Key,
            KeySlice::Int(s) => s[index] as Key,
            KeySlice::Long(s) => s[index],
        }
    }
}

/// Iterator over the keys of a storage, widened to [`Key`].
pub struct KeyIter<'a> {
    keys: KeySlice<'a>,
    pos: usize,
}

impl Iterator for KeyIter<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        if self.pos < self.keys.len() {
            let key = self.keys.at(self.pos);
            self.pos += 1;
            Some(key)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.keys.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for KeyIter<'_> {}

/// A key storage growing by amortized 1.5× reallocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicKeys {
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
}

impl Default for DynamicKeys {
    fn default() -> Self {
        DynamicKeys::new()
    }
}

impl DynamicKeys {
    const MIN_CAPACITY: usize = 8;

    pub fn new() -> DynamicKeys {
        DynamicKeys::with_width(KeyWidth::Short)
    }

    pub fn with_width(width: KeyWidth) -> DynamicKeys {
        match width {
            KeyWidth::Short => DynamicKeys::Short(Vec::new()),
            KeyWidth::Int => DynamicKeys::Int(Vec::new()),
            KeyWidth::Long => DynamicKeys::Long(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DynamicKeys::Short(keys) => keys.len(),
            DynamicKeys::Int(keys) => keys.len(),
            DynamicKeys::Long(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> KeyWidth {
        match self {
            DynamicKeys::Short(_) => KeyWidth::Short,
            DynamicKeys::Int(_) => KeyWidth::Int,
            DynamicKeys::Long(_) => KeyWidth::Long,
        }
    }

    pub fn get(&self, index: usize) -> Result<Key> {
        let key = match self {
            DynamicKeys::Short(keys) => keys.get(index).map(|&k| k as Key),
            DynamicKeys::Int(keys) => keys.get(index).map(|&k| k as Key),
            DynamicKeys::Long(keys) => keys.get(index).copied(),
        };
        key.ok_or_else(|| Error::out_of_bounds("key storage", index as u64, self.len() as u64))
    }

    /// Appends `key`, widening the storage if `key` does not fit.
    pub fn add(self, key: Key) -> DynamicKeys {
        let mut keys = if self.width().fits(key) {
            self
        } else {
            self.widen(KeyWidth::for_value(key))
        };
        match &mut keys {
            DynamicKeys::Short(v) => push_grow(v, key as i16),
            DynamicKeys::Int(v) => push_grow(v, key as i32),
            DynamicKeys::Long(v) => push_grow(v, key),
        }
        keys
    }

    pub fn widen(self, width: KeyWidth) -> DynamicKeys {
        if width <= self.width() {
            return self;
        }
        let keys = self.iter().collect::<Vec<_>>();
        match width {
            KeyWidth::Short => self,
            KeyWidth::Int => DynamicKeys::Int(with_growth(keys.iter().map(|&k| k as i32))),
            KeyWidth::Long => DynamicKeys::Long(with_growth(keys.into_iter())),
        }
    }

    /// Creates an empty storage with the same width.
    pub fn reproduce(&self) -> DynamicKeys {
        DynamicKeys::with_width(self.width())
    }

    pub fn iter(&self) -> KeyIter<'_> {
        let keys = match self {
            DynamicKeys::Short(keys) => KeySlice::Short(keys),
            DynamicKeys::Int(keys) => KeySlice::Int(keys),
            DynamicKeys::Long(keys) => KeySlice::Long(keys),
        };
        KeyIter { keys, pos: 0 }
    }

    pub fn max_value(&self) -> Key {
        self.iter().max().unwrap_or(NULL_KEY)
    }

    /// Freezes the storage into a fixed-length one of the same width.
    pub fn into_fixed(self) -> FixedKeys {
        match self {
            DynamicKeys::Short(keys) => FixedKeys::Short(keys.into_boxed_slice()),
            DynamicKeys::Int(keys) => FixedKeys::Int(keys.into_boxed_slice()),
            DynamicKeys::Long(keys) => FixedKeys::Long(keys.into_boxed_slice()),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            DynamicKeys::Short(keys) => keys.capacity(),
            DynamicKeys::Int(keys) => keys.capacity(),
            DynamicKeys::Long(keys) => keys.capacity(),
        }
    }
}

fn push_grow<T>(v: &mut Vec<T>, value: T) {
    if v.len() == v.capacity() {
        let grow = (v.capacity() / 2).max(DynamicKeys::MIN_CAPACITY);
        v.reserve_exact(grow);
    }
    v.push(value);
}

fn with_growth<T>(keys: impl ExactSizeIterator<Item = T>) -> Vec<T> {
    let len = keys.len();
    let mut v = Vec::with_capacity(len + (len / 2).max(DynamicKeys::MIN_CAPACITY));
    v.extend(keys);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_for_value() {
        assert_eq!(KeyWidth::for_value(0), KeyWidth::Short);
        assert_eq!(KeyWidth::for_value(i16::MAX as Key), KeyWidth::Short);
        assert_eq!(KeyWidth::for_value(i16::MAX as Key + 1), KeyWidth::Int);
        assert_eq!(KeyWidth::for_value(i32::MAX as Key + 1), KeyWidth::Long);
        assert!(KeyWidth::Int.fits(100));
        assert!(!KeyWidth::Short.fits(1 << 20));
    }

    #[test]
    fn test_fixed_set_widens() {
        let keys = FixedKeys::new(4);
        assert_eq!(keys.width(), KeyWidth::Short);
        let keys = keys.set(0, 7).unwrap();
        let keys = keys.set(1, 40_000).unwrap();
        assert_eq!(keys.width(), KeyWidth::Int);
        let keys = keys.set(2, 1 << 40).unwrap();
        assert_eq!(keys.width(), KeyWidth::Long);
        let keys = keys.set(3, 1).unwrap();
        assert_eq!(keys.width(), KeyWidth::Long);
        assert_eq!(keys.to_vec(), [7, 40_000, 1 << 40, 1]);
    }

    #[test]
    fn test_fixed_bounds() {
        let keys = FixedKeys::new(2);
        assert!(keys.get(2).is_err());
        assert!(keys.set(2, 1).is_err());
    }

    #[test]
    fn test_fixed_random_widening_preserves_content() {
        for _ in 0..100 {
            let len = fastrand::usize(1..64);
            let mut keys = FixedKeys::new(len);
            let mut expected = vec![0; len];
            let mut widest = KeyWidth::Short;
            for _ in 0..len * 2 {
                let index = fastrand::usize(0..len);
                let key = match fastrand::u8(0..3) {
                    0 => fastrand::i64(0..=i16::MAX as i64),
                    1 => fastrand::i64(0..=i32::MAX as i64),
                    _ => fastrand::i64(0..=1 << 59),
                };
                widest = widest.max(KeyWidth::for_value(key));
                expected[index] = key;
                keys = keys.set(index, key).unwrap();
                assert_eq!(keys.width(), widest);
            }
            for (i, &key) in expected.iter().enumerate() {
                assert_eq!(keys.get(i).unwrap(), key);
            }
        }
    }

    #[test]
    fn test_reproduce_keeps_width() {
        let keys = FixedKeys::new(3).set(1, 1 << 20).unwrap();
        let sibling = keys.reproduce();
        assert_eq!(sibling.width(), KeyWidth::Int);
        assert_eq!(sibling.len(), 3);
        assert_eq!(sibling.to_vec(), [0, 0, 0]);
    }

    #[test]
    fn test_concat_widest() {
        let a = FixedKeys::from_keys(&[1, 2]);
        let b = FixedKeys::from_keys(&[3, 100_000]);
        let c = FixedKeys::from_keys(&[5, 6]);
        let joined = FixedKeys::concat(&[a, b, c]).unwrap();
        assert_eq!(joined.width(), KeyWidth::Int);
        assert_eq!(joined.to_vec(), [1, 2, 3, 100_000, 5, 6]);

        let mismatched = [FixedKeys::new(2), FixedKeys::new(3)];
        assert!(FixedKeys::concat(&mismatched).is_err());
        assert!(FixedKeys::concat(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_dynamic_growth_and_widening() {
        let mut keys = DynamicKeys::new();
        for i in 0..1000 {
            keys = keys.add(i);
        }
        assert_eq!(keys.width(), KeyWidth::Short);
        keys = keys.add(1 << 33);
        assert_eq!(keys.width(), KeyWidth::Long);
        assert_eq!(keys.len(), 1001);
        for i in 0..1000 {
            assert_eq!(keys.get(i as usize).unwrap(), i);
        }
        assert_eq!(keys.get(1000).unwrap(), 1 << 33);
        assert!(keys.get(1001).is_err());
        assert!(keys.capacity() >= 1001);

        let fixed = keys.into_fixed();
        assert_eq!(fixed.len(), 1001);
        assert_eq!(fixed.max_value(), 1 << 33);
    }

    #[test]
    fn test_dynamic_growth_factor() {
        let mut keys = DynamicKeys::new();
        let mut last_capacity = 0;
        for i in 0..200 {
            keys = keys.add(i);
            let capacity = keys.capacity();
            if capacity != last_capacity {
                if last_capacity >= 16 {
                    assert!(capacity >= last_capacity + last_capacity / 2);
                }
                last_capacity = capacity;
            }
        }
    }

    #[test]
    fn test_dynamic_reproduce_keeps_width() {
        let keys = DynamicKeys::new().add(1).add(70_000);
        assert_eq!(keys.width(), KeyWidth::Int);
        let sibling = keys.reproduce();
        assert_eq!(sibling.width(), KeyWidth::Int);
        assert!(sibling.is_empty());
    }
}
