use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hash<const N: usize> {
    pub buffer: [u8; N],
}

impl<const N: usize> Hash<N> {
    const EVEN_WIDTH: () = assert!(N % 2 == 0, "hash width must be even");

    pub const LEN: usize = N;

    pub const fn zeroed() -> Self {
        let () = Self::EVEN_WIDTH;
        Self { buffer: [0; N] }
    }

    pub const fn from_bytes(buffer: [u8; N]) -> Self {
        let () = Self::EVEN_WIDTH;
        Self { buffer }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl<const N: usize> Default for Hash<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const N: usize> AsRef<[u8]> for Hash<N> {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

impl<const N: usize> fmt::Display for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.buffer {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

pub type Hash128 = Hash<16>;
pub type Hash256 = Hash<32>;
pub type Hash512 = Hash<64>;

const BLOCK_LEN: usize = 64;

const INITIAL_STATE: [u32; 8] = [
    0x6a09_e667,
    0xbb67_ae85,
    0x3c6e_f372,
    0xa54f_f53a,
    0x510e_527f,
    0x9b05_688c,
    0x1f83_d9ab,
    0x5be0_cd19,
];

const ROUND_CONSTANTS: [u32; 64] = [
    0x428a_2f98,
    0x7137_4491,
    0xb5c0_fbcf,
    0xe9b5_dba5,
    0x3956_c25b,
    0x59f1_11f1,
    0x923f_82a4,
    0xab1c_5ed5,
    0xd807_aa98,
    0x1283_5b01,
    0x2431_85be,
    0x550c_7dc3,
    0x72be_5d74,
    0x80de_b1fe,
    0x9bdc_06a7,
    0xc19b_f174,
    0xe49b_69c1,
    0xefbe_4786,
    0x0fc1_9dc6,
    0x240c_a1cc,
    0x2de9_2c6f,
    0x4a74_84aa,
    0x5cb0_a9dc,
    0x76f9_88da,
    0x983e_5152,
    0xa831_c66d,
    0xb003_27c8,
    0xbf59_7fc7,
    0xc6e0_0bf3,
    0xd5a7_9147,
    0x06ca_6351,
    0x1429_2967,
    0x27b7_0a85,
    0x2e1b_2138,
    0x4d2c_6dfc,
    0x5338_0d13,
    0x650a_7354,
    0x766a_0abb,
    0x81c2_c92e,
    0x9272_2c85,
    0xa2bf_e8a1,
    0xa81a_664b,
    0xc24b_8b70,
    0xc76c_51a3,
    0xd192_e819,
    0xd699_0624,
    0xf40e_3585,
    0x106a_a070,
    0x19a4_c116,
    0x1e37_6c08,
    0x2748_774c,
    0x34b0_bcb5,
    0x391c_0cb3,
    0x4ed8_aa4a,
    0x5b9c_ca4f,
    0x682e_6ff3,
    0x748f_82ee,
    0x78a5_636f,
    0x84c8_7814,
    0x8cc7_0208,
    0x90be_fffa,
    0xa450_6ceb,
    0xbef9_a3f7,
    0xc671_78f2,
];

#[derive(Debug, Clone)]
pub struct Sha256 {
    state: [u32; 8],
    block: [u8; BLOCK_LEN],
    block_len: usize,
    bit_len: u64,
    finalized: bool,
}

impl Sha256 {
    pub fn new() -> Self {
        Self {
            state: INITIAL_STATE,
            block: [0; BLOCK_LEN],
            block_len: 0,
            bit_len: 0,
            finalized: false,
        }
    }

    pub fn digest(bytes: &[u8]) -> Hash256 {
        let mut ctx = Self::new();
        ctx.update(bytes);
        ctx.finalize()
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn update(&mut self, data: &[u8]) {
        assert!(!self.finalized, "Sha256::update after finalize");

        for &byte in data {
            self.block[self.block_len] = byte;
            self.block_len += 1;
            if self.block_len == BLOCK_LEN {
                let block = self.block;
                self.transform(&block);
                self.bit_len += (BLOCK_LEN as u64) * 8;
                self.block_len = 0;
            }
        }
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn finalize(&mut self) -> Hash256 {
        assert!(!self.finalized, "Sha256::finalize called twice");
        self.finalized = true;

        self.bit_len += (self.block_len as u64) * 8;

        let mut block = self.block;
        let mut i = self.block_len;
        block[i] = 0x80;
        i += 1;

        if i > BLOCK_LEN - 8 {
            block[i..].fill(0);
            let full = block;
            self.transform(&full);
            block = [0; BLOCK_LEN];
            i = 0;
        }

        block[i..BLOCK_LEN - 8].fill(0);
        block[BLOCK_LEN - 8..].copy_from_slice(&self.bit_len.to_be_bytes());
        let last = block;
        self.transform(&last);

        let mut result = Hash256::zeroed();
        for (chunk, word) in result.buffer.chunks_exact_mut(4).zip(self.state) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        result
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn transform(&mut self, block: &[u8; BLOCK_LEN]) {
        let mut schedule = [0u32; 64];
        for (word, chunk) in schedule.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        for i in 16..64 {
            schedule[i] = sig1(schedule[i - 2])
                .wrapping_add(schedule[i - 7])
                .wrapping_add(sig0(schedule[i - 15]))
                .wrapping_add(schedule[i - 16]);
        }

        let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = self.state;

        for i in 0..64 {
            let t1 = h
                .wrapping_add(big_sig1(e))
                .wrapping_add(choose(e, f, g))
                .wrapping_add(ROUND_CONSTANTS[i])
                .wrapping_add(schedule[i]);
            let t2 = big_sig0(a).wrapping_add(majority(a, b, c));
            h = g;
            g = f;
            f = e;
            e = d.wrapping_add(t1);
            d = c;
            c = b;
            b = a;
            a = t1.wrapping_add(t2);
        }

        for (word, added) in self.state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
            *word = word.wrapping_add(added);
        }
    }
}

impl Default for Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

const fn choose(e: u32, f: u32, g: u32) -> u32 {
    (e & f) ^ (!e & g)
}

const fn majority(a: u32, b: u32, c: u32) -> u32 {
    (a & (b | c)) | (b & c)
}

const fn big_sig0(x: u32) -> u32 {
    x.rotate_right(2) ^ x.rotate_right(13) ^ x.rotate_right(22)
}

const fn big_sig1(x: u32) -> u32 {
    x.rotate_right(6) ^ x.rotate_right(11) ^ x.rotate_right(25)
}

const fn sig0(x: u32) -> u32 {
    x.rotate_right(7) ^ x.rotate_right(18) ^ (x >> 3)
}

const fn sig1(x: u32) -> u32 {
    x.rotate_right(17) ^ x.rotate_right(19) ^ (x >> 10)
}

#[cfg(test)]
mod tests {
    use sha2::Digest;

    use super::*;

    #[test]
    fn empty_input_matches_published_vector() {
        let digest = Sha256::digest(b"");
        assert_eq!(
            digest.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn abc_matches_published_vector() {
        let digest = Sha256::digest(b"abc");
        assert_eq!(
            digest.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn two_block_vector_matches() {
        let digest =
            Sha256::digest(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq");
        assert_eq!(
            digest.to_string(),
            "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
        );
    }

    #[test]
    fn matches_rustcrypto_for_padding_boundaries() {
        for len in [0usize, 1, 55, 56, 57, 63, 64, 65, 119, 120, 128, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let ours = Sha256::digest(&data);
            let theirs = sha2::Sha256::digest(&data);
            assert_eq!(ours.as_bytes(), theirs.as_slice(), "length {len}");
        }
    }

    #[test]
    fn streaming_equals_one_shot() {
        let data: Vec<u8> = (0u32..777).map(|i| (i % 256) as u8).collect();
        let one_shot = Sha256::digest(&data);

        let mut ctx = Sha256::new();
        for chunk in data.chunks(13) {
            ctx.update(chunk);
        }
        assert_eq!(ctx.finalize(), one_shot);
    }

    #[test]
    fn reset_allows_reuse() {
        let mut ctx = Sha256::new();
        ctx.update(b"first message");
        let _first = ctx.finalize();

        ctx.reset();
        ctx.update(b"abc");
        let second = ctx.finalize();
        assert_eq!(second, Sha256::digest(b"abc"));
    }

    #[test]
    #[should_panic(expected = "update after finalize")]
    fn update_after_finalize_panics() {
        let mut ctx = Sha256::new();
        ctx.update(b"data");
        let _digest = ctx.finalize();
        ctx.update(b"more");
    }

    #[test]
    #[should_panic(expected = "finalize called twice")]
    fn double_finalize_panics() {
        let mut ctx = Sha256::new();
        let _digest = ctx.finalize();
        let _again = ctx.finalize();
    }

    #[test]
    fn hash_widths_are_exact() {
        assert_eq!(Hash128::LEN, 16);
        assert_eq!(Hash256::LEN, 32);
        assert_eq!(Hash512::LEN, 64);
        assert_eq!(Hash128::zeroed().as_bytes().len(), 16);
        assert_eq!(Hash256::zeroed().as_bytes().len(), 32);
        assert_eq!(Hash512::zeroed().as_bytes().len(), 64);
    }

    #[test]
    fn hashes_compare_by_raw_bytes() {
        let mut a = Hash256::zeroed();
        let b = Hash256::zeroed();
        assert_eq!(a, b);
        a.buffer[0] ^= 0xff;
        assert_ne!(a, b);
        assert!(a > b);
    }
}
