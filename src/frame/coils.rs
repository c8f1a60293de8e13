// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::Error;

/// Packed coils, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coils {
    pub(crate) data: Vec<u8>,
    pub(crate) quantity: usize,
}

impl Coils {
    /// Pack coils defined by a bool slice.
    #[must_use]
    pub fn from_bools(bools: &[bool]) -> Self {
        Self::from_iter(bools.iter().copied())
    }

    /// Pack coils from an iterator.
    pub fn from_iter(bools: impl IntoIterator<Item = bool>) -> Self {
        let (data, quantity) = pack_coils(bools);
        Coils { data, quantity }
    }

    pub(crate) fn from_packed(data: Vec<u8>, quantity: usize) -> Self {
        Coils { data, quantity }
    }

    /// Quantity of coils.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.quantity
    }

    /// Number of bytes required to pack the coils.
    #[must_use]
    pub const fn packed_len(&self) -> usize {
        self.quantity.div_ceil(8)
    }

    /// Returns `true` if the container has no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Get a specific coil.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Coil> {
        if idx >= self.quantity {
            return None;
        }
        Some((self.data[idx / 8] >> (idx % 8)) & 0b1 > 0)
    }

    /// Raw packed bytes, as they appear on the wire.
    #[must_use]
    pub fn packed(&self) -> &[u8] {
        &self.data
    }

    /// Truncate to the first `count` coils, as the caller-side responsibility
    /// noted for read responses whose wire `byteCount` may over-report.
    #[must_use]
    pub fn truncated(mut self, count: usize) -> Self {
        self.quantity = self.quantity.min(count);
        self
    }
}

type Coil = bool;

/// Coils iterator.
#[derive(Debug, Clone)]
pub struct CoilsIter {
    cnt: usize,
    coils: Coils,
}

impl Iterator for CoilsIter {
    type Item = Coil;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.coils.get(self.cnt);
        self.cnt += 1;
        result
    }
}

impl IntoIterator for Coils {
    type Item = Coil;
    type IntoIter = CoilsIter;

    fn into_iter(self) -> Self::IntoIter {
        CoilsIter { cnt: 0, coils: self }
    }
}

/// Turn a bool into a u16 coil value.
#[must_use]
pub const fn bool_to_u16_coil(state: bool) -> u16 {
    if state { 0xFF00 } else { 0x0000 }
}

/// Turn a u16 coil value into a boolean value.
pub const fn u16_coil_to_bool(coil: u16) -> Result<bool, Error> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::CoilValue(coil)),
    }
}

/// Pack coils into bytes. Bit 0 of each octet holds the lowest-indexed coil
/// (LSB-first); the final partial octet is zero-padded.
#[must_use]
pub fn pack_coils(coils: impl IntoIterator<Item = Coil>) -> (Vec<u8>, usize) {
    let mut data = Vec::new();
    let mut count = 0usize;
    for coil in coils {
        if count % 8 == 0 {
            data.push(0);
        }
        if coil {
            let last = data.len() - 1;
            data[last] |= 1 << (count % 8);
        }
        count += 1;
    }
    (data, count)
}

/// Unpack `count` coils from packed bytes.
pub fn unpack_coils(bytes: &[u8], count: u16) -> Result<Vec<Coil>, Error> {
    let needed = (count as usize).div_ceil(8);
    if bytes.len() < needed {
        return Err(Error::BufferSize);
    }
    Ok((0..count)
        .map(|i| (bytes[(i / 8) as usize] >> (i % 8)) & 0b1 > 0)
        .collect())
}
