// fastqsumm: Sample reads and fastqcheck statistics from SAM and BAM files.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Packed 4-bit base calls.
//!
//! Sequences are stored the way BAM stores them: two calls per byte, high
//! nibble first, each nibble a bitmask over {A, C, G, T} with `0xF` for N.
//! Decoding picks the lowest set bit, so ambiguity codes collapse to the
//! first base they cover. Nibble 0 (`=`) has no base and decodes to `U`,
//! which the statistics count as N.

/// Nibble code for N.
pub const NIBBLE_N: u8 = 0xF;

const FORWARD: [u8; 4] = [b'A', b'C', b'G', b'T'];
const COMPLEMENT: [u8; 4] = [b'T', b'G', b'C', b'A'];

/// Base classes counted by [FastqCheck](crate::fastqcheck::FastqCheck).
pub const BASE_A: usize = 0;
pub const BASE_C: usize = 1;
pub const BASE_G: usize = 2;
pub const BASE_T: usize = 3;
pub const BASE_N: usize = 4;

/// Nibble code of an IUPAC character, N for anything unrecognised.
pub fn encode_base(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'=' => 0x0,
        b'A' => 0x1,
        b'C' => 0x2,
        b'M' => 0x3,
        b'G' => 0x4,
        b'R' => 0x5,
        b'S' => 0x6,
        b'V' => 0x7,
        b'T' => 0x8,
        b'W' => 0x9,
        b'Y' => 0xA,
        b'H' => 0xB,
        b'K' => 0xC,
        b'D' => 0xD,
        b'B' => 0xE,
        _ => NIBBLE_N,
    }
}

/// Pack `bases` into `out`, replacing its contents.
pub fn pack_bases(
    bases: &[u8],
    out: &mut Vec<u8>,
) {
    out.clear();
    out.reserve(bases.len().div_ceil(2));
    bases.chunks(2).for_each(|pair| {
        let hi = encode_base(pair[0]) << 4;
        let lo = if pair.len() == 2 { encode_base(pair[1]) } else { 0 };
        out.push(hi | lo);
    });
}

/// The nibble at call index `idx`.
pub fn nibble_at(
    packed: &[u8],
    idx: usize,
) -> u8 {
    let byte = packed[idx / 2];
    if idx % 2 == 0 { byte >> 4 } else { byte & 0xF }
}

/// Decode one nibble to an ASCII base, complemented if `complement` is set.
pub fn decode_nibble(
    code: u8,
    complement: bool,
) -> u8 {
    match code {
        NIBBLE_N => return b'N',
        0 => return b'U',
        _ => (),
    }
    let map = if complement { &COMPLEMENT } else { &FORWARD };
    map[code.trailing_zeros() as usize]
}

/// Base class index used by the statistics accumulator.
pub fn base_class(base: u8) -> usize {
    match base {
        b'A' | b'a' => BASE_A,
        b'C' | b'c' => BASE_C,
        b'G' | b'g' => BASE_G,
        b'T' | b't' => BASE_T,
        _ => BASE_N,
    }
}

/// Iterator over the calls of a packed sequence in read orientation.
///
/// Reverse complemented sequences are walked from the last call to the first
/// and complemented.
pub struct Calls<'a> {
    packed: &'a [u8],
    next: usize,
    end: usize,
    reverse: bool,
}

impl<'a> Calls<'a> {
    pub fn new(
        packed: &'a [u8],
        len: usize,
        reverse: bool,
    ) -> Self {
        Calls { packed, next: 0, end: len, reverse }
    }
}

impl Iterator for Calls<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.next >= self.end {
            return None
        }
        let idx = if self.reverse { self.end - 1 - self.next } else { self.next };
        self.next += 1;
        Some(decode_nibble(nibble_at(self.packed, idx), self.reverse))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Calls<'_> {}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn pack_and_decode_forward() {
        use super::{pack_bases, Calls};

        let bases = b"ACGTNACG".to_vec();
        let mut packed = Vec::new();
        pack_bases(&bases, &mut packed);
        assert_eq!(packed, vec![0x12, 0x48, 0xF1, 0x24]);

        let got: Vec<u8> = Calls::new(&packed, bases.len(), false).collect();
        assert_eq!(got, bases);
    }

    #[test]
    fn pack_odd_length() {
        use super::{pack_bases, Calls};

        let mut packed = Vec::new();
        pack_bases(b"GAT", &mut packed);
        assert_eq!(packed, vec![0x41, 0x80]);

        let got: Vec<u8> = Calls::new(&packed, 3, false).collect();
        assert_eq!(got, b"GAT".to_vec());
    }

    #[test]
    fn decode_reverse_complement() {
        use super::{pack_bases, Calls};

        let mut packed = Vec::new();
        pack_bases(b"ACGT", &mut packed);

        // A,C,G,T complemented to T,G,C,A and read back last to first
        let got: Vec<u8> = Calls::new(&packed, 4, true).collect();
        assert_eq!(got, b"ACGT".to_vec());

        pack_bases(b"AACN", &mut packed);
        let got: Vec<u8> = Calls::new(&packed, 4, true).collect();
        assert_eq!(got, b"NGTT".to_vec());
    }

    #[test]
    fn ambiguity_codes_take_lowest_bit() {
        use super::{decode_nibble, encode_base};

        assert_eq!(decode_nibble(encode_base(b'M'), false), b'A');
        assert_eq!(decode_nibble(encode_base(b'K'), false), b'G');
        assert_eq!(decode_nibble(encode_base(b'K'), true), b'C');
        assert_eq!(decode_nibble(encode_base(b'n'), true), b'N');
        assert_eq!(decode_nibble(encode_base(b'*'), false), b'N');
    }

    #[test]
    fn equals_sign_decodes_to_u() {
        use super::{base_class, pack_bases, Calls, BASE_N};

        let mut packed = Vec::new();
        pack_bases(b"A=C", &mut packed);
        assert_eq!(packed, vec![0x10, 0x20]);

        let got: Vec<u8> = Calls::new(&packed, 3, false).collect();
        assert_eq!(got, b"AUC".to_vec());
        let got: Vec<u8> = Calls::new(&packed, 3, true).collect();
        assert_eq!(got, b"GUT".to_vec());
        assert_eq!(base_class(b'U'), BASE_N);
    }

    #[test]
    fn base_classes() {
        use super::{base_class, BASE_A, BASE_C, BASE_G, BASE_N, BASE_T};

        let got: Vec<usize> = b"AcGtNx.".iter().map(|b| base_class(*b)).collect();
        assert_eq!(got, vec![BASE_A, BASE_C, BASE_G, BASE_T, BASE_N, BASE_N, BASE_N]);
    }
}
