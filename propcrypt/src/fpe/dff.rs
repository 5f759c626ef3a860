//! DFF format-preserving encryption.
//!
//! A 10-round Feistel network whose round function is AES under a per-call
//! subkey `J`, derived from the radix, the tweak and the input length.

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

use super::{
    num_be, parse_digits, render_digits, str_be, write_be, FormatPreserving, FpeParams,
    LengthBounds,
};
use crate::block::{Aes, BLOCK_SIZE};
use crate::error::Error;
use crate::key::{check_key_size, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::Dff;

/// Largest tweak length in bytes.
pub const MAX_TWEAK_LENGTH: usize = 13;

const ROUNDS: u8 = 10;

/// Offset of the tweak inside the `J1` input block.
const TWEAK_OFFSET: usize = 3;

/// Returns a fresh random tweak of the maximal length.
pub fn random_tweak<R>(rng: &mut R) -> Vec<u8>
where
    R: RngCore + CryptoRng + ?Sized,
{
    crate::kdf::random_bytes(rng, MAX_TWEAK_LENGTH).to_vec()
}

/// Checks the tweak length.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` if `tweak` is longer than 13 bytes.
pub fn check_tweak(tweak: &[u8]) -> Result<(), Error> {
    if tweak.len() <= MAX_TWEAK_LENGTH {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "DFF tweak must be at most {MAX_TWEAK_LENGTH} bytes, was {}",
            tweak.len()
        )))
    }
}

/// Bits each half may span: the round input keeps one byte for the round
/// index, and non power-of-two radixes leave extra headroom.
const fn half_bits(radix: u32) -> u32 {
    if radix.is_power_of_two() {
        120
    } else {
        98
    }
}

/// The DFF cipher for one key, radix and tweak.
#[derive(Clone)]
pub struct DffCipher {
    aes: Aes,
    radix: u32,
    tweak: Vec<u8>,
    /// `AES_K(0, 0, 0 || T || 0...)`, whitening of every round input.
    whitening: [u8; BLOCK_SIZE],
    bounds: LengthBounds,
}

impl DffCipher {
    /// Builds the cipher.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeySize` for keys other than 128, 192 or 256
    /// bits and `Error::InvalidParameter` if the tweak is missing or longer
    /// than 13 bytes.
    pub fn new(key: &SecretKey, params: &FpeParams) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;
        let tweak = params
            .tweak()
            .ok_or_else(|| Error::InvalidParameter("DFF requires a tweak".to_string()))?;
        check_tweak(tweak)?;

        let aes = Aes::new(key.expose())?;
        let mut whitening = [0u8; BLOCK_SIZE];
        whitening[TWEAK_OFFSET..TWEAK_OFFSET + tweak.len()].copy_from_slice(tweak);
        aes.encrypt_block(&mut whitening);

        Ok(Self {
            aes,
            radix: params.radix(),
            tweak: tweak.to_vec(),
            whitening,
            bounds: LengthBounds::new(params.radix(), half_bits(params.radix())),
        })
    }

    /// Derives the round cipher for inputs of `len` digits.
    fn round_cipher(&self, len: usize) -> Result<Aes, Error> {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = self.radix as u8;
        block[1] = self.tweak.len() as u8;
        block[2] = u8::try_from(len)
            .map_err(|_| Error::Domain(format!("numeral length {len} does not fit a byte")))?;
        block[BLOCK_SIZE - self.tweak.len()..].copy_from_slice(&self.tweak);
        self.aes.encrypt_block(&mut block);
        Aes::new(&block)
    }

    fn round_value(&self, cipher: &Aes, round: u8, half: &[u32]) -> BigUint {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = round;
        write_be(&num_be(half, self.radix), &mut block[1..]);
        for (byte, mask) in block.iter_mut().zip(self.whitening) {
            *byte ^= mask;
        }
        cipher.encrypt_block(&mut block);
        BigUint::from_bytes_be(&block)
    }

    fn split(&self, numeral: &str) -> Result<(Vec<u32>, Vec<u32>), Error> {
        let mut digits = parse_digits(numeral, self.radix)?;
        self.bounds.check(digits.len())?;
        let right = digits.split_off(digits.len().div_ceil(2));
        Ok((digits, right))
    }

    fn moduli(&self, u: usize, v: usize) -> [BigUint; 2] {
        let radix = BigUint::from(self.radix);
        [radix.pow(u as u32), radix.pow(v as u32)]
    }
}

impl FormatPreserving for DffCipher {
    fn encrypt(&self, numeral: &str) -> Result<String, Error> {
        let (mut a, mut b) = self.split(numeral)?;
        let (u, v) = (a.len(), b.len());
        let cipher = self.round_cipher(u + v)?;
        let moduli = self.moduli(u, v);

        for round in 0..ROUNDS {
            let m = if round % 2 == 0 { u } else { v };
            let c = (num_be(&a, self.radix) + self.round_value(&cipher, round, &b))
                % &moduli[usize::from(round % 2)];
            a = std::mem::replace(&mut b, str_be(&c, self.radix, m));
        }

        a.extend_from_slice(&b);
        Ok(render_digits(&a, self.radix))
    }

    fn decrypt(&self, numeral: &str) -> Result<String, Error> {
        let (mut a, mut b) = self.split(numeral)?;
        let (u, v) = (a.len(), b.len());
        let cipher = self.round_cipher(u + v)?;
        let moduli = self.moduli(u, v);

        for round in (0..ROUNDS).rev() {
            let m = if round % 2 == 0 { u } else { v };
            let modulus = &moduli[usize::from(round % 2)];
            let y = self.round_value(&cipher, round, &a) % modulus;
            let c = (num_be(&b, self.radix) + modulus - y) % modulus;
            b = std::mem::replace(&mut a, str_be(&c, self.radix, m));
        }

        a.extend_from_slice(&b);
        Ok(render_digits(&a, self.radix))
    }

    fn radix(&self) -> u32 {
        self.radix
    }

    fn tweak(&self) -> &[u8] {
        &self.tweak
    }
}
