//! Contiguous addressable bit array with heap, off-heap, and file-mapped
//! backings
//!
//! Bits live in 64-bit words: bit `i` maps to word `i >> 6`, bit `i & 63`.
//! Words are accessed as [`AtomicU64`] so independent lock stripes can touch
//! adjacent bits of a shared word without corrupting each other; every
//! mutation is a per-bit atomic read-modify-write. The set-bit count is
//! maintained incrementally from `set`/`unset` transition results.
//!
//! Off-heap vectors use anonymous memory maps; file-mapped vectors extend the
//! file to the required word-aligned length and map it read-write, so a
//! process reopening the same file with the same bit size observes the stored
//! state. The on-disk layout is the raw word array with no header.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};

use crate::common::{FilterError, Result};

/// Storage backing of a [`BitVector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    /// Words owned by the process heap
    Heap,
    /// Anonymous off-heap memory map
    OffHeap,
    /// Read-write file mapping
    FileMapped,
}

enum Words {
    Heap(Box<[AtomicU64]>),
    Anon {
        // The map owns the allocation; the pointer is captured once at
        // construction because later access only holds `&self`.
        _map: MmapMut,
        ptr: *mut u8,
        words: usize,
    },
    File {
        map: MmapMut,
        ptr: *mut u8,
        words: usize,
        _file: File,
    },
    Closed,
}

/// An indexed sequence of bits over one of three storage backings
///
/// All bit operations take `&self` and are safe under concurrent use; the
/// caller is responsible for any atomicity wider than a single bit (the
/// filters layer stripe locks over logical records for that).
pub struct BitVector {
    words: Words,
    kind: BackingKind,
    bit_size: u64,
    cardinality: AtomicU64,
}

// SAFETY: the raw pointers in `Words` point into memory owned by the `MmapMut`
// stored alongside them, and all access goes through `AtomicU64`.
unsafe impl Send for BitVector {}
unsafe impl Sync for BitVector {}

impl BitVector {
    /// Creates a heap-backed vector of `bit_size` zero bits
    ///
    /// # Panics
    /// Panics if `bit_size` is 0.
    pub fn new_heap(bit_size: u64) -> Self {
        assert!(bit_size > 0, "bit size must be > 0");
        let words = (0..word_count(bit_size))
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        BitVector {
            words: Words::Heap(words),
            kind: BackingKind::Heap,
            bit_size,
            cardinality: AtomicU64::new(0),
        }
    }

    /// Creates a vector of `bit_size` zero bits in anonymous off-heap memory
    ///
    /// # Errors
    /// Propagates the mapping failure.
    ///
    /// # Panics
    /// Panics if `bit_size` is 0.
    pub fn new_off_heap(bit_size: u64) -> Result<Self> {
        assert!(bit_size > 0, "bit size must be > 0");
        let words = word_count(bit_size);
        let mut map = MmapMut::map_anon(words * 8)?;
        let ptr = map.as_mut_ptr();
        Ok(BitVector {
            words: Words::Anon {
                _map: map,
                ptr,
                words,
            },
            kind: BackingKind::OffHeap,
            bit_size,
            cardinality: AtomicU64::new(0),
        })
    }

    /// Opens (creating if absent) and maps `path` as a vector of `bit_size`
    /// bits
    ///
    /// The file is extended to `ceil(bit_size/64) * 8` bytes when shorter. An
    /// existing file of the required length contributes its stored bits; the
    /// cardinality is recomputed from the mapped words.
    ///
    /// # Errors
    /// Propagates open, extend, and mapping failures.
    ///
    /// # Panics
    /// Panics if `bit_size` is 0.
    pub fn open_file(path: &Path, bit_size: u64) -> Result<Self> {
        assert!(bit_size > 0, "bit size must be > 0");
        let words = word_count(bit_size);
        let byte_len = (words * 8) as u64;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if file.metadata()?.len() < byte_len {
            file.set_len(byte_len)?;
        }
        // SAFETY: the mapping stays valid for the vector's lifetime; the file
        // handle is kept alive alongside it.
        let mut map = unsafe { MmapOptions::new().len(words * 8).map_mut(&file)? };
        let ptr = map.as_mut_ptr();

        let vector = BitVector {
            words: Words::File {
                map,
                ptr,
                words,
                _file: file,
            },
            kind: BackingKind::FileMapped,
            bit_size,
            cardinality: AtomicU64::new(0),
        };
        let stored = vector
            .words()
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as u64)
            .sum();
        vector.cardinality.store(stored, Ordering::Relaxed);
        Ok(vector)
    }

    fn words(&self) -> &[AtomicU64] {
        match &self.words {
            Words::Heap(words) => words,
            Words::Anon { ptr, words, .. } | Words::File { ptr, words, .. } => {
                // SAFETY: the mapping is word-aligned (page-aligned base, length
                // a multiple of 8) and `AtomicU64` is layout-compatible with u64.
                unsafe { std::slice::from_raw_parts(*ptr as *const AtomicU64, *words) }
            }
            Words::Closed => panic!("bit vector is closed"),
        }
    }

    #[inline]
    fn word_for(&self, index: u64) -> (&AtomicU64, u64) {
        assert!(
            index < self.bit_size,
            "bit index {} out of range for {} bits",
            index,
            self.bit_size
        );
        let word = &self.words()[(index >> 6) as usize];
        (word, 1u64 << (index & 63))
    }

    /// Reads bit `index`
    #[inline]
    pub fn get(&self, index: u64) -> bool {
        let (word, mask) = self.word_for(index);
        word.load(Ordering::Acquire) & mask != 0
    }

    /// Sets bit `index`; returns `true` iff the bit transitioned 0 to 1
    #[inline]
    pub fn set(&self, index: u64) -> bool {
        let (word, mask) = self.word_for(index);
        let previous = word.fetch_or(mask, Ordering::AcqRel);
        if previous & mask == 0 {
            self.cardinality.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Clears bit `index`; returns `true` iff the bit transitioned 1 to 0
    #[inline]
    pub fn unset(&self, index: u64) -> bool {
        let (word, mask) = self.word_for(index);
        let previous = word.fetch_and(!mask, Ordering::AcqRel);
        if previous & mask != 0 {
            self.cardinality.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Number of set bits
    pub fn cardinality(&self) -> u64 {
        self.cardinality.load(Ordering::Relaxed)
    }

    /// Number of addressable bits
    pub fn bit_size(&self) -> u64 {
        self.bit_size
    }

    /// Storage backing of this vector
    pub fn kind(&self) -> BackingKind {
        self.kind
    }

    /// Zeroes every bit
    pub fn clear(&self) {
        for word in self.words() {
            word.store(0, Ordering::Release);
        }
        self.cardinality.store(0, Ordering::Relaxed);
    }

    /// In-place bitwise OR of `other` into `self`
    ///
    /// The cardinality is recomputed from the merged words afterwards.
    ///
    /// # Errors
    /// [`FilterError::IncompatibleMerge`] when the backing kinds or bit sizes
    /// differ.
    pub fn put_all(&self, other: &BitVector) -> Result<()> {
        if self.kind != other.kind {
            return Err(FilterError::incompatible(format!(
                "backing mismatch: {:?} vs {:?}",
                self.kind, other.kind
            )));
        }
        if self.bit_size != other.bit_size {
            return Err(FilterError::incompatible(format!(
                "bit size mismatch: {} vs {}",
                self.bit_size, other.bit_size
            )));
        }

        let own = self.words();
        for (word, source) in own.iter().zip(other.words()) {
            word.fetch_or(source.load(Ordering::Acquire), Ordering::AcqRel);
        }
        let merged = own
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as u64)
            .sum();
        self.cardinality.store(merged, Ordering::Relaxed);
        Ok(())
    }

    /// Releases the backing storage
    ///
    /// File-mapped vectors are flushed before unmapping; flush failures are
    /// swallowed so teardown never leaks the mapping. Idempotent.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.words, Words::Closed) {
            Words::File { map, _file, .. } => {
                let _ = map.flush();
                drop(map);
                drop(_file);
            }
            other => drop(other),
        }
    }

    /// Whether [`BitVector::close`] has been called
    pub fn is_closed(&self) -> bool {
        matches!(self.words, Words::Closed)
    }

    /// Bytes held by the word array
    pub fn memory_usage(&self) -> usize {
        word_count(self.bit_size) * 8
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitVector")
            .field("kind", &self.kind)
            .field("bit_size", &self.bit_size)
            .field("cardinality", &self.cardinality())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn word_count(bit_size: u64) -> usize {
    bit_size.div_ceil(64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_unset_transitions() {
        let vector = BitVector::new_heap(128);

        assert!(!vector.get(5));
        assert!(vector.set(5), "first set should transition");
        assert!(!vector.set(5), "second set should not transition");
        assert!(vector.get(5));
        assert_eq!(vector.cardinality(), 1);

        assert!(vector.unset(5));
        assert!(!vector.unset(5));
        assert!(!vector.get(5));
        assert_eq!(vector.cardinality(), 0);
    }

    #[test]
    fn test_word_boundaries() {
        let vector = BitVector::new_heap(130);
        for index in [0, 63, 64, 127, 128, 129] {
            assert!(vector.set(index), "bit {}", index);
        }
        assert_eq!(vector.cardinality(), 6);
        for index in [0, 63, 64, 127, 128, 129] {
            assert!(vector.get(index), "bit {}", index);
        }
        assert!(!vector.get(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_out_of_range() {
        let vector = BitVector::new_heap(64);
        vector.get(64);
    }

    #[test]
    fn test_clear() {
        let vector = BitVector::new_heap(256);
        for index in 0..100 {
            vector.set(index);
        }
        vector.clear();
        assert_eq!(vector.cardinality(), 0);
        assert!(!vector.get(42));
    }

    #[test]
    fn test_put_all_unions_and_recounts() {
        let a = BitVector::new_heap(128);
        let b = BitVector::new_heap(128);
        a.set(1);
        a.set(64);
        b.set(64);
        b.set(100);

        a.put_all(&b).unwrap();
        assert!(a.get(1));
        assert!(a.get(64));
        assert!(a.get(100));
        assert_eq!(a.cardinality(), 3);

        // OR is idempotent
        a.put_all(&b).unwrap();
        assert_eq!(a.cardinality(), 3);
    }

    #[test]
    fn test_put_all_size_mismatch() {
        let a = BitVector::new_heap(128);
        let b = BitVector::new_heap(64);
        assert!(matches!(
            a.put_all(&b),
            Err(FilterError::IncompatibleMerge { .. })
        ));
    }

    #[test]
    fn test_put_all_backing_mismatch() {
        let a = BitVector::new_heap(64);
        let b = BitVector::new_off_heap(64).unwrap();
        assert!(matches!(
            a.put_all(&b),
            Err(FilterError::IncompatibleMerge { .. })
        ));
    }

    #[test]
    fn test_off_heap_starts_zeroed() {
        let vector = BitVector::new_off_heap(512).unwrap();
        assert_eq!(vector.cardinality(), 0);
        for index in 0..512 {
            assert!(!vector.get(index));
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut vector = BitVector::new_off_heap(64).unwrap();
        vector.set(3);
        vector.close();
        assert!(vector.is_closed());
        vector.close();
        assert!(vector.is_closed());
    }

    #[test]
    fn test_concurrent_sets_keep_count_exact() {
        use std::sync::Arc;

        let vector = Arc::new(BitVector::new_heap(1 << 16));
        let mut handles = Vec::new();
        for t in 0..8u64 {
            let vector = Arc::clone(&vector);
            handles.push(std::thread::spawn(move || {
                // Overlapping ranges: transitions must be counted once
                for i in (t * 4096)..(t * 4096 + 8192) {
                    vector.set(i % (1 << 16));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let expected: u64 = (0..(1u64 << 16)).filter(|i| vector.get(*i)).count() as u64;
        assert_eq!(vector.cardinality(), expected);
    }
}
