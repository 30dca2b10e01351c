//! Content-similarity measures used by the pattern and plagiarism
//! analyzers. All return a score in [0, 1]. Inputs are normalized (case
//! folded, whitespace collapsed, punctuation stripped) so cosmetic edits do
//! not mask a copy.

use std::collections::{HashMap, HashSet};

/// Levenshtein is quadratic; inputs are clipped to this many normalized
/// tokens-worth of characters before the DP runs.
const EDIT_DISTANCE_CLIP: usize = 2_000;

/// Shingle width for the structural measure.
const SHINGLE_K: usize = 3;

fn normalize(content: &[u8]) -> String {
    let text = String::from_utf8_lossy(content);
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Exact-content check over the raw bytes: BLAKE3 fingerprints match or
/// they don't.
pub fn hash_similarity(a: &[u8], b: &[u8]) -> f64 {
    if blake3::hash(a) == blake3::hash(b) {
        1.0
    } else {
        0.0
    }
}

/// Structural similarity: Jaccard overlap of token 3-shingles. Robust to
/// reordering of larger blocks, sensitive to local token sequences.
pub fn structural_similarity(a: &[u8], b: &[u8]) -> f64 {
    let (na, nb) = (normalize(a), normalize(b));
    let (ta, tb) = (tokens(&na), tokens(&nb));
    if ta.len() < SHINGLE_K || tb.len() < SHINGLE_K {
        // Degenerate inputs: fall back to exact token equality.
        return if ta == tb && !ta.is_empty() { 1.0 } else { 0.0 };
    }
    let shingles = |ts: &[&str]| -> HashSet<u64> {
        ts.windows(SHINGLE_K)
            .map(|w| {
                let mut hasher = blake3::Hasher::new();
                for t in w {
                    hasher.update(t.as_bytes());
                    hasher.update(b"\x1f");
                }
                let digest = hasher.finalize();
                u64::from_le_bytes(
                    digest.as_bytes()[..8].try_into().unwrap_or([0u8; 8]),
                )
            })
            .collect()
    };
    let sa = shingles(&ta);
    let sb = shingles(&tb);
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Semantic similarity: cosine over token-frequency vectors. Ignores order
/// entirely, catching rewrites that keep the vocabulary.
pub fn semantic_similarity(a: &[u8], b: &[u8]) -> f64 {
    let (na, nb) = (normalize(a), normalize(b));
    fn freq<'a>(ts: Vec<&'a str>) -> HashMap<&'a str, f64> {
        let mut map: HashMap<&'a str, f64> = HashMap::new();
        for t in ts {
            *map.entry(t).or_insert(0.0) += 1.0;
        }
        map
    }
    let fa = freq(tokens(&na));
    let fb = freq(tokens(&nb));
    if fa.is_empty() || fb.is_empty() {
        return 0.0;
    }
    let dot: f64 = fa
        .iter()
        .filter_map(|(t, va)| fb.get(t).map(|vb| va * vb))
        .sum();
    let norm = |m: &HashMap<&str, f64>| m.values().map(|v| v * v).sum::<f64>().sqrt();
    let denom = norm(&fa) * norm(&fb);
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Edit similarity: 1 − normalized Levenshtein distance over the clipped,
/// normalized text.
pub fn edit_similarity(a: &[u8], b: &[u8]) -> f64 {
    let mut na = normalize(a);
    let mut nb = normalize(b);
    na.truncate(EDIT_DISTANCE_CLIP);
    nb.truncate(EDIT_DISTANCE_CLIP);
    let (ca, cb): (Vec<char>, Vec<char>) = (na.chars().collect(), nb.chars().collect());
    let max_len = ca.len().max(cb.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&ca, &cb);
    1.0 - distance as f64 / max_len as f64
}

/// Two-row Levenshtein.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
