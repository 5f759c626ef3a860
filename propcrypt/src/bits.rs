//! Bit-string helpers over big-endian byte buffers.
//!
//! Bit `0` is the most significant bit of byte `0`. The prefix-preserving
//! ciphers walk plaintexts in this order, and the binary field used by the
//! RH2 hash stores its elements in the same layout.

/// Returns bit `index` of `bytes`.
#[must_use]
pub fn bit(bytes: &[u8], index: usize) -> bool {
    bytes[index / 8] & (0x80 >> (index % 8)) != 0
}

/// Sets or clears bit `index` of `bytes`.
pub fn set_bit(bytes: &mut [u8], index: usize, value: bool) {
    let mask = 0x80 >> (index % 8);
    if value {
        bytes[index / 8] |= mask;
    } else {
        bytes[index / 8] &= !mask;
    }
}

/// XORs `other` into `target` over their common length.
pub fn xor_in_place(target: &mut [u8], other: &[u8]) {
    for (t, o) in target.iter_mut().zip(other) {
        *t ^= o;
    }
}

/// Rotates the whole buffer left by `shift` bits.
#[must_use]
pub fn rotate_left(bytes: &[u8], shift: usize) -> Vec<u8> {
    let total = bytes.len() * 8;
    if total == 0 {
        return Vec::new();
    }
    let shift = shift % total;
    let byte_shift = shift / 8;
    let bit_shift = shift % 8;

    let len = bytes.len();
    (0..len)
        .map(|i| {
            let hi = bytes[(i + byte_shift) % len];
            if bit_shift == 0 {
                hi
            } else {
                let lo = bytes[(i + byte_shift + 1) % len];
                (hi << bit_shift) | (lo >> (8 - bit_shift))
            }
        })
        .collect()
}

/// Copies the first `count` bits of `bytes`, leaving the rest zero.
#[must_use]
pub fn prefix(bytes: &[u8], count: usize) -> Vec<u8> {
    let mut out = vec![0u8; bytes.len()];
    let whole = count / 8;
    out[..whole].copy_from_slice(&bytes[..whole]);
    let rest = count % 8;
    if rest > 0 {
        out[whole] = bytes[whole] & !(0xFF >> rest);
    }
    out
}

/// Reverses the order of all bits in the buffer.
#[must_use]
pub fn reverse_bits(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().map(|b| b.reverse_bits()).collect()
}

/// Arithmetic in GF(2^n) for `n = 8 * width`.
///
/// Elements are `width`-byte big-endian buffers: the coefficient of `x^j`
/// is the bit with value `2^(j % 8)` in byte `width - 1 - j / 8`. The
/// modulus is a pentanomial `x^n + x^(j+1) + x^j + x^(j-1) + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryField {
    width: usize,
    reduction: Vec<u8>,
}

impl BinaryField {
    /// Creates the field of `width` bytes reduced by the pentanomial centered
    /// on `middle`.
    ///
    /// Callers must pick `2 <= middle < 8 * width - 1`.
    #[must_use]
    pub fn pentanomial(width: usize, middle: usize) -> Self {
        let mut reduction = vec![0u8; width];
        for exponent in [0, middle - 1, middle, middle + 1] {
            reduction[width - 1 - exponent / 8] |= 1 << (exponent % 8);
        }
        Self { width, reduction }
    }

    /// Element width in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    fn coefficient(&self, element: &[u8], exponent: usize) -> bool {
        element[self.width - 1 - exponent / 8] & (1 << (exponent % 8)) != 0
    }

    /// Multiplies `element` by `x` in place.
    fn double(&self, element: &mut [u8]) {
        let carry = element[0] & 0x80 != 0;
        for i in 0..self.width {
            let next = if i + 1 < self.width { element[i + 1] >> 7 } else { 0 };
            element[i] = (element[i] << 1) | next;
        }
        if carry {
            xor_in_place(element, &self.reduction);
        }
    }

    /// Returns `a * b`.
    #[must_use]
    pub fn mul(&self, a: &[u8], b: &[u8]) -> Vec<u8> {
        let mut acc = vec![0u8; self.width];
        let mut shifted = a.to_vec();
        for exponent in 0..self.width * 8 {
            if self.coefficient(b, exponent) {
                xor_in_place(&mut acc, &shifted);
            }
            self.double(&mut shifted);
        }
        acc
    }
}
