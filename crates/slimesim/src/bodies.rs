use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Spawn coordinates stay just inside the unit cube.
pub const SPAWN_EXTENT: f32 = 0.99;

/// One agent as the compute shader sees it (std430, 32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Body {
    /// `x, y, z, 1.0`
    pub pos: [f32; 4],
    /// `angle, id, 0, 0`
    pub dat: [f32; 4],
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub fn generate_bodies<R: Rng>(count: u32, rng: &mut R) -> Vec<Body> {
    (0..count)
        .map(|index| {
            let x = rng.gen_range(-SPAWN_EXTENT..=SPAWN_EXTENT);
            let y = rng.gen_range(-SPAWN_EXTENT..=SPAWN_EXTENT);
            let z = rng.gen_range(-SPAWN_EXTENT..=SPAWN_EXTENT);
            let angle = rng.gen_range(0.0..TAU);
            Body {
                pos: [x, y, z, 1.0],
                dat: [angle, index as f32, 0.0, 0.0],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_matches_gpu_stride() {
        assert_eq!(std::mem::size_of::<Body>(), 32);
        assert_eq!(std::mem::align_of::<Body>(), 4);
    }

    #[test]
    fn bodies_stay_in_range() {
        let bodies = generate_bodies(2048, &mut seeded_rng(Some(7)));
        assert_eq!(bodies.len(), 2048);
        for (index, body) in bodies.iter().enumerate() {
            for coord in &body.pos[..3] {
                assert!((-SPAWN_EXTENT..=SPAWN_EXTENT).contains(coord));
            }
            assert_eq!(body.pos[3], 1.0);
            assert!((0.0..TAU).contains(&body.dat[0]));
            assert_eq!(body.dat[1], index as f32);
            assert_eq!(&body.dat[2..], &[0.0, 0.0]);
        }
    }

    #[test]
    fn seed_makes_generation_repeatable() {
        let first = generate_bodies(64, &mut seeded_rng(Some(42)));
        let second = generate_bodies(64, &mut seeded_rng(Some(42)));
        let other = generate_bodies(64, &mut seeded_rng(Some(43)));
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn bytes_follow_field_order() {
        let bodies = generate_bodies(2, &mut seeded_rng(Some(1)));
        let bytes: &[u8] = bytemuck::cast_slice(&bodies);
        assert_eq!(bytes.len(), 64);
        let id: f32 = bytemuck::pod_read_unaligned(&bytes[32 + 20..32 + 24]);
        assert_eq!(id, 1.0);
    }
}
