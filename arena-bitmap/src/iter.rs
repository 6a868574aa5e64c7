use std::iter::FusedIterator;

use crate::arena::Arena;
use crate::container::Container;

/// Ascending iterator over the values of a [`Bitmap`](crate::Bitmap).
///
/// Values are decoded lazily, one container at a time. The iterator ends
/// with `None`, so a stored `0` is an ordinary value.
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    arena: &'a Arena,
    /// Current container.
    index: usize,
    /// Next array value or next bitmap word to load.
    pos: usize,
    /// Unvisited bits of bitmap word `pos - 1`.
    word: u16,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(arena: &'a Arena) -> Self {
        Self {
            arena,
            index: 0,
            pos: 0,
            word: 0,
        }
    }

    /// Restarts from the smallest value.
    pub fn rewind(&mut self) {
        self.index = 0;
        self.pos = 0;
        self.word = 0;
    }
}

impl Iterator for Iter<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let keys = self.arena.keys();
        while self.index < keys.len() {
            let key = keys.key(self.index);
            match Container::view(self.arena.container(keys.offset(self.index))) {
                Container::Array(values) => {
                    if let Some(&low) = values.get(self.pos) {
                        self.pos += 1;
                        return Some(key | low as u64);
                    }
                }
                Container::Bitmap { bits, .. } => loop {
                    if self.word != 0 {
                        let bit = self.word.trailing_zeros() as u64;
                        self.word &= self.word - 1;
                        return Some(key | ((self.pos as u64 - 1) << 4) | bit);
                    }
                    match bits.get(self.pos) {
                        Some(&word) => {
                            self.word = word;
                            self.pos += 1;
                        }
                        None => break,
                    }
                },
            }
            self.index += 1;
            self.pos = 0;
            self.word = 0;
        }
        None
    }
}

impl FusedIterator for Iter<'_> {}
