//! Image generation.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use anyhow::{anyhow, Result};

pub struct GeneratedImage {
    pub data: Vec<u8>,
}

impl GeneratedImage {
    /// Split the image into transfer-sized pieces, each paired with its
    /// offset into the image.
    pub fn chunks(&self, size: usize) -> impl Iterator<Item = (usize, &[u8])> {
        self.data
            .chunks(size)
            .enumerate()
            .map(move |(i, chunk)| (i * size, chunk))
    }
}

pub struct GenBuilder {
    /// Total size of the image.
    size: usize,
    /// Seed for the PRNG
    seed: usize,
}

impl Default for GenBuilder {
    fn default() -> Self {
        GenBuilder {
            size: 76_138,
            seed: 1,
        }
    }
}

impl GenBuilder {
    pub fn size(&mut self, size: usize) -> &mut Self {
        self.size = size;
        self
    }

    pub fn seed(&mut self, seed: usize) -> &mut Self {
        self.seed = seed;
        self
    }

    pub fn build(&self) -> Result<GeneratedImage> {
        if self.size == 0 {
            return Err(anyhow!("Image must not be empty"));
        }
        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed as u64);
        let mut data = vec![0u8; self.size];
        rng.fill_bytes(&mut data);

        Ok(GeneratedImage { data })
    }
}

#[cfg(test)]
mod tester {
    use super::GenBuilder;

    #[test]
    fn test_gen() {
        let a = GenBuilder::default().seed(7).build().unwrap();
        let b = GenBuilder::default().seed(7).build().unwrap();
        let c = GenBuilder::default().seed(8).build().unwrap();
        assert_eq!(a.data.len(), 76_138);
        assert_eq!(a.data, b.data);
        assert_ne!(a.data, c.data);
        assert!(GenBuilder::default().size(0).build().is_err());
    }

    #[test]
    fn test_chunks() {
        let img = GenBuilder::default().size(10).build().unwrap();
        let chunks: Vec<_> = img.chunks(4).map(|(off, c)| (off, c.len())).collect();
        assert_eq!(chunks, vec![(0, 4), (4, 4), (8, 2)]);
    }
}
