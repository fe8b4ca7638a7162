//! Filtre de Bloom sur les motifs bloqués.
//!
//! Ensemble probabiliste de taille fixe : `add()` est déterministe, `query()`
//! ne produit jamais de faux négatif mais peut produire des faux positifs.
//! Aucune suppression n'est possible : retirer un bit casserait la garantie
//! pour les autres motifs qui le partagent.
//!
//! ## Hachage
//!
//! Hash multiplicatif glissant, une graine par sonde `i ∈ [0, K)` :
//!
//! ```text
//! h_i(x) = fold(acc = 31·acc + unité UTF-16) mod N     avec acc₀ = i
//! ```
//!
//! L'accumulateur est un `u32` qui boucle (wrapping), comme un `imul` 32 bits.

use tracing::debug;

/// Taille par défaut du tableau de bits.
pub const DEFAULT_SIZE: usize = 100_000;

/// Nombre de sondes par défaut.
pub const DEFAULT_HASH_COUNT: u32 = 3;

/// Filtre de Bloom à `size` bits et `hash_count` sondes.
#[derive(Debug, Clone)]
pub struct MembershipFilter {
    bits: Vec<u64>,
    size: usize,
    hash_count: u32,
    inserted: usize,
}

impl MembershipFilter {
    /// Crée un filtre vide. `size` et `hash_count` sont ramenés à au moins 1.
    pub fn new(size: usize, hash_count: u32) -> Self {
        let size = size.max(1);
        Self {
            bits: vec![0; size.div_ceil(64)],
            size,
            hash_count: hash_count.max(1),
            inserted: 0,
        }
    }

    /// Reconstruit un filtre avec d'autres paramètres à partir de la liste
    /// d'origine. C'est la seule façon de changer `size`/`hash_count`.
    pub fn rebuild<'a, I>(size: usize, hash_count: u32, patterns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut filter = Self::new(size, hash_count);
        for pattern in patterns {
            filter.add(pattern);
        }
        debug!(
            size = filter.size,
            hash_count = filter.hash_count,
            inserted = filter.inserted,
            "Membership filter rebuilt"
        );
        filter
    }

    pub fn add(&mut self, pattern: &str) {
        for seed in 0..self.hash_count {
            let bit = self.probe(pattern, seed);
            self.bits[bit / 64] |= 1 << (bit % 64);
        }
        self.inserted += 1;
    }

    /// `true` si toutes les sondes sont à 1 (« peut-être bloqué »).
    pub fn query(&self, pattern: &str) -> bool {
        (0..self.hash_count).all(|seed| {
            let bit = self.probe(pattern, seed);
            self.bits[bit / 64] & (1 << (bit % 64)) != 0
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Nombre d'appels à `add()` (doublons compris).
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Taux de faux positifs attendu : `(1 - e^(-K·n/N))^K`.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let k = f64::from(self.hash_count);
        let n = self.inserted as f64;
        let m = self.size as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    fn probe(&self, item: &str, seed: u32) -> usize {
        let h = item
            .encode_utf16()
            .fold(seed, |acc, unit| acc.wrapping_mul(31).wrapping_add(u32::from(unit)));
        h as usize % self.size
    }
}

impl Default for MembershipFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE, DEFAULT_HASH_COUNT)
    }
}
