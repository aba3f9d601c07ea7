//! Model-free character trigram embeddings
//!
//! Text is case-folded, padded with one space on each side, split into every
//! overlapping 3-character window and each window is hashed into a bucket.
//! Bucket counts are L2-normalized. blake3 keeps bucket assignment identical
//! across processes and platforms.

/// Default embedding dimension
pub const DEFAULT_DIMS: usize = 1024;

/// Embed `text` into a unit (or zero) vector of length `dims`
pub fn embed(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    if dims == 0 {
        return v;
    }

    let padded: Vec<char> = std::iter::once(' ')
        .chain(text.to_lowercase().chars())
        .chain(std::iter::once(' '))
        .collect();

    let mut buf = [0u8; 12];
    for window in padded.windows(3) {
        let mut len = 0;
        for c in window {
            len += c.encode_utf8(&mut buf[len..]).len();
        }
        v[bucket(&buf[..len], dims)] += 1.0;
    }

    normalize(&mut v);
    v
}

fn bucket(trigram: &[u8], dims: usize) -> usize {
    let hash = blake3::hash(trigram);
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(head) % dims as u64) as usize
}

/// Scale to unit length in place; zero vectors stay zero
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity, 0 when either side has zero norm
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}
