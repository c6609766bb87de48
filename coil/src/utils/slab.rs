use std::mem::MaybeUninit;

/// An index arena with slot reuse.
///
/// A `Slab` stores values of type `T` in a contiguous array and hands out
/// small integer keys. The task table, the timer queue and the reactor all
/// address their records through a slab, so that continuations only ever
/// hold a key and never a pointer into another component.
///
/// Keys are reused after [`remove`](Self::remove); callers that may hold a
/// key past removal pair it with a generation of their own (see
/// `TimerKey` and `RegistrationKey`).
pub(crate) struct Slab<T> {
    /// Storage for items (may contain uninitialized slots).
    items: Vec<MaybeUninit<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Marks whether a slot is currently initialized.
    used: Vec<bool>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with `size` free slots.
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| MaybeUninit::<T>::uninit()).collect();
        // Reversed so that the lowest index is handed out first.
        let free = (0..size).rev().collect();
        let used = vec![false; size];

        Self {
            items,
            free,
            used,
            len: 0,
        }
    }

    /// Inserts a value and returns its key.
    ///
    /// A free slot is reused when available, otherwise the slab doubles.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                let len = self.items.len();
                let new_len = if len == 0 { 1 } else { 2 * len };

                self.items
                    .extend((len..new_len).map(|_| MaybeUninit::<T>::uninit()));
                self.free.extend(((len + 1)..new_len).rev());
                self.used.resize(new_len, false);

                len
            }
        };

        self.items[index] = MaybeUninit::new(item);
        self.used[index] = true;
        self.len += 1;

        index
    }

    /// The key the next [`insert`](Self::insert) will return.
    pub(crate) fn vacant_key(&self) -> usize {
        self.free.last().copied().unwrap_or(self.items.len())
    }

    /// Removes and returns the value stored at `index`.
    ///
    /// Returns `None` if the slot is out of range or vacant, which makes
    /// removal idempotent for callers holding stale keys.
    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        if !self.contains(index) {
            return None;
        }

        self.free.push(index);
        self.used[index] = false;
        self.len -= 1;

        // SAFETY: `used[index]` was true, so the slot is initialized, and it
        // is marked vacant before anyone can observe it again.
        let item = unsafe { self.items[index].assume_init_read() };
        self.items[index] = MaybeUninit::uninit();

        Some(item)
    }

    /// Returns `true` if `index` refers to an occupied slot.
    pub(crate) fn contains(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    /// Returns a shared reference to the value at `index`, if occupied.
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if !self.contains(index) {
            return None;
        }

        // SAFETY: the slot is occupied.
        Some(unsafe { self.items[index].assume_init_ref() })
    }

    /// Returns a mutable reference to the value at `index`, if occupied.
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if !self.contains(index) {
            return None;
        }

        // SAFETY: the slot is occupied.
        Some(unsafe { self.items[index].assume_init_mut() })
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Keys of all occupied slots, in index order.
    pub(crate) fn keys(&self) -> Vec<usize> {
        self.used
            .iter()
            .enumerate()
            .filter_map(|(i, &used)| used.then_some(i))
            .collect()
    }

    /// Removes every value and returns them in index order.
    ///
    /// The values are returned instead of dropped in place so that the
    /// caller can release any borrow on the owner before running their
    /// destructors.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.remove(key))
            .collect()
    }
}

impl<T> Drop for Slab<T> {
    /// Drops all initialized elements stored in the slab.
    fn drop(&mut self) {
        for (slot, &used) in self.items.iter_mut().zip(self.used.iter()) {
            if used {
                // SAFETY: occupied slots are initialized.
                unsafe {
                    slot.assume_init_drop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Slab;

    #[test]
    fn reuses_freed_slots() {
        let mut slab = Slab::new(2);

        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_eq!((a, b), (0, 1));

        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.vacant_key(), a);
        assert_eq!(slab.insert("c"), a);
        assert_eq!(slab.vacant_key(), 2);
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut slab = Slab::new(0);
        let keys: Vec<_> = (0..5).map(|i| slab.insert(i)).collect();

        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
        assert_eq!(slab.get(3), Some(&3));
    }

    #[test]
    fn stale_removal_is_a_no_op() {
        let mut slab = Slab::new(1);
        let key = slab.insert(String::from("x"));

        assert!(slab.remove(key).is_some());
        assert!(slab.remove(key).is_none());
        assert!(slab.remove(42).is_none());
        assert!(slab.is_empty());
    }

    #[test]
    fn drain_empties_and_preserves_order() {
        let mut slab = Slab::new(4);
        slab.insert(1);
        let mid = slab.insert(2);
        slab.insert(3);
        slab.remove(mid);

        assert_eq!(slab.drain(), vec![1, 3]);
        assert!(slab.is_empty());
        assert_eq!(slab.keys(), Vec::<usize>::new());
    }
}
