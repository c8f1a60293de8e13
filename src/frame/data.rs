// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{BigEndian, ByteOrder};

use super::Word;

/// Modbus data (u16 register values), owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub(crate) data: Vec<u8>,
    pub(crate) quantity: usize,
}

impl Data {
    /// Pack words (u16 values) into their big-endian wire representation.
    #[must_use]
    pub fn from_words(words: &[u16]) -> Self {
        let mut data = vec![0u8; words.len() * 2];
        for (i, w) in words.iter().enumerate() {
            BigEndian::write_u16(&mut data[i * 2..], *w);
        }
        Data {
            data,
            quantity: words.len(),
        }
    }

    pub(crate) fn from_bytes(data: Vec<u8>, quantity: usize) -> Self {
        Data { data, quantity }
    }

    /// Quantity of words (u16 values).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.quantity
    }

    /// Returns `true` if the container has no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Get a specific word.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Word> {
        if idx >= self.quantity {
            return None;
        }
        let idx = idx * 2;
        Some(BigEndian::read_u16(&self.data[idx..idx + 2]))
    }

    /// Raw big-endian bytes, as they appear on the wire.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Collect into a plain `Vec<u16>`.
    #[must_use]
    pub fn to_words(&self) -> Vec<u16> {
        self.clone().into_iter().collect()
    }
}

/// Data iterator.
#[derive(Debug, Clone)]
pub struct DataIter {
    cnt: usize,
    data: Data,
}

impl Iterator for DataIter {
    type Item = Word;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.data.get(self.cnt);
        self.cnt += 1;
        result
    }
}

impl IntoIterator for Data {
    type Item = Word;
    type IntoIter = DataIter;

    fn into_iter(self) -> Self::IntoIter {
        DataIter { cnt: 0, data: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_word_slice() {
        let words: &[u16] = &[0xABCD, 0xEF00, 0x1234];
        let data = Data::from_words(words);
        assert_eq!(data.len(), 3);
        let mut iter = data.into_iter();
        assert_eq!(iter.next(), Some(0xABCD));
        assert_eq!(iter.next(), Some(0xEF00));
        assert_eq!(iter.next(), Some(0x1234));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn data_empty() {
        assert!(Data::from_words(&[]).is_empty());
    }

    #[test]
    fn data_get() {
        let data = Data::from_bytes(vec![0xAB, 0xBC, 0x12], 1);
        assert_eq!(data.get(0), Some(0xABBC));
        assert_eq!(data.get(1), None);
    }

    #[test]
    fn data_to_words_round_trips() {
        let words = vec![0x0102, 0x0304, 0xAABB];
        let data = Data::from_words(&words);
        assert_eq!(data.to_words(), words);
    }
}
