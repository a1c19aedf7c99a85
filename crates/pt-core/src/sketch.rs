//! DDSketch: a relative-error quantile sketch.
//!
//! Values are bucketed on a logarithmic scale so that the relative error of
//! any quantile estimate is bounded by `alpha` regardless of the
//! underlying distribution. Buckets are kept in a sparse map until the
//! occupied range becomes dense enough that a flat array is cheaper, at
//! which point the sketch switches to a dense store permanently.

use pt_common::{Error, Result};
use pt_math::logspace::{bucket_index, bucket_value, gamma_from_alpha};
use pt_math::KahanSum;
use std::collections::{BTreeMap, VecDeque};

/// A contiguous dense bucket range, used once a sparse store becomes dense
/// enough to be cheaper as a flat array.
#[derive(Debug, Clone)]
struct Dense {
    min_index: i32,
    counts: VecDeque<u64>,
}

impl Dense {
    fn from_sparse(map: &BTreeMap<i32, u64>) -> Self {
        let min_index = *map.keys().next().expect("non-empty sparse map");
        let max_index = *map.keys().next_back().expect("non-empty sparse map");
        let width = (max_index - min_index + 1) as usize;
        let mut counts = VecDeque::from(vec![0u64; width]);
        for (&idx, &count) in map {
            counts[(idx - min_index) as usize] = count;
        }
        Self { min_index, counts }
    }

    fn add(&mut self, index: i32, count: u64) {
        if index < self.min_index {
            let grow = (self.min_index - index) as usize;
            for _ in 0..grow {
                self.counts.push_front(0);
            }
            self.min_index = index;
        } else {
            let max_index = self.min_index + self.counts.len() as i32 - 1;
            if index > max_index {
                let target_len = (index - self.min_index + 1) as usize;
                self.counts.resize(target_len, 0);
            }
        }
        let pos = (index - self.min_index) as usize;
        self.counts[pos] += count;
    }

    fn iter_all(&self) -> impl Iterator<Item = (i32, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(move |(i, &c)| (self.min_index + i as i32, c))
    }

    fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    fn range_width(&self) -> usize {
        self.counts.len()
    }
}

#[derive(Debug, Clone)]
enum Store {
    Sparse(BTreeMap<i32, u64>),
    Dense(Dense),
}

impl Store {
    fn new() -> Self {
        Store::Sparse(BTreeMap::new())
    }

    fn add(&mut self, index: i32, count: u64) {
        match self {
            Store::Sparse(map) => {
                *map.entry(index).or_insert(0) += count;
            }
            Store::Dense(dense) => dense.add(index, count),
        }
    }

    fn distinct(&self) -> usize {
        match self {
            Store::Sparse(map) => map.len(),
            Store::Dense(dense) => dense.distinct(),
        }
    }

    fn iter_all(&self) -> Vec<(i32, u64)> {
        match self {
            Store::Sparse(map) => map.iter().map(|(&k, &v)| (k, v)).collect(),
            Store::Dense(dense) => dense.iter_all().collect(),
        }
    }

    /// Switch to a dense store if the occupied range is narrow relative to
    /// the number of distinct buckets. Never switches back.
    fn maybe_densify(&mut self, density_factor: f64) {
        if let Store::Sparse(map) = self {
            if map.is_empty() {
                return;
            }
            let distinct = map.len();
            let min_index = *map.keys().next().unwrap();
            let max_index = *map.keys().next_back().unwrap();
            let width = (max_index - min_index + 1) as usize;
            if (width as f64) < density_factor * (distinct as f64) {
                *self = Store::Dense(Dense::from_sparse(map));
            }
        }
    }
}

/// One side (positive or negative-magnitude) of the sketch's bucket store,
/// with its own collapse bookkeeping.
#[derive(Debug, Clone)]
struct Bucketed {
    store: Store,
    collapsed_upper: Option<i32>,
    collapsed_count: u64,
}

impl Bucketed {
    fn new() -> Self {
        Self {
            store: Store::new(),
            collapsed_upper: None,
            collapsed_count: 0,
        }
    }

    fn total(&self) -> u64 {
        self.collapsed_count + self.store.iter_all().iter().map(|&(_, c)| c).sum::<u64>()
    }

    fn add(&mut self, index: i32, count: u64, collapse_limit: usize, density_factor: f64) {
        self.store.add(index, count);
        self.store.maybe_densify(density_factor);
        self.collapse_if_needed(collapse_limit);
    }

    fn collapse_if_needed(&mut self, collapse_limit: usize) {
        while self.store.distinct() > collapse_limit {
            let Store::Sparse(map) = &mut self.store else {
                // A densified store never exceeds its own collapse
                // accounting going forward; nothing to collapse.
                break;
            };
            let Some((&lowest_idx, &lowest_count)) = map.iter().next() else {
                break;
            };
            map.remove(&lowest_idx);
            self.collapsed_count += lowest_count;
            self.collapsed_upper = Some(self.collapsed_upper.map_or(lowest_idx, |u| u.max(lowest_idx)));
        }
    }

    /// All (index, count) pairs in ascending index order, including the
    /// collapsed region (represented at `collapsed_upper`) as its own entry.
    fn iter_all_ascending(&self) -> Vec<(i32, u64)> {
        let mut out = Vec::new();
        if self.collapsed_count > 0 {
            out.push((self.collapsed_upper.unwrap(), self.collapsed_count));
        }
        out.extend(self.store.iter_all());
        out
    }

    fn merge_from(&mut self, other: &Bucketed, collapse_limit: usize, density_factor: f64) {
        if other.collapsed_count > 0 {
            self.add(
                other.collapsed_upper.unwrap(),
                other.collapsed_count,
                collapse_limit,
                density_factor,
            );
        }
        for (idx, count) in other.store.iter_all() {
            self.add(idx, count, collapse_limit, density_factor);
        }
    }
}

/// Configuration needed to construct a [`Sketch`].
#[derive(Debug, Clone, Copy)]
pub struct SketchParams {
    pub alpha: f64,
    pub collapse_limit: usize,
    pub density_factor: f64,
    /// Whether negative values are accepted. When false, [`Sketch::add`]
    /// rejects negative input with [`Error::UnsupportedValue`].
    pub allow_negative: bool,
}

impl Default for SketchParams {
    fn default() -> Self {
        Self {
            alpha: 0.0075,
            collapse_limit: 2048,
            density_factor: 2.0,
            allow_negative: false,
        }
    }
}

/// A relative-error quantile sketch (DDSketch).
#[derive(Debug, Clone)]
pub struct Sketch {
    alpha: f64,
    gamma: f64,
    params: SketchParams,
    zero_count: u64,
    positive: Bucketed,
    negative: Bucketed,
    min: f64,
    max: f64,
    sum: KahanSum,
    count: u64,
}

const SERIALIZE_VERSION: u8 = 1;

impl Sketch {
    /// Create a new, empty sketch with the given relative-accuracy
    /// parameter. `alpha` must be in `(0, 1)`.
    pub fn new(params: SketchParams) -> Self {
        let gamma = gamma_from_alpha(params.alpha);
        Self {
            alpha: params.alpha,
            gamma,
            params,
            zero_count: 0,
            positive: Bucketed::new(),
            negative: Bucketed::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: KahanSum::new(),
            count: 0,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn sum(&self) -> f64 {
        self.sum.total()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Ingest a value with the given weight (defaults to 1 via [`Sketch::add`]).
    pub fn add_weighted(&mut self, value: f64, weight: u64) -> Result<()> {
        if weight == 0 {
            return Ok(());
        }
        if value.is_nan() || value.is_infinite() {
            return Err(Error::UnsupportedValue(value));
        }
        if value < 0.0 && !self.params.allow_negative {
            return Err(Error::UnsupportedValue(value));
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum.add(value * weight as f64);
        self.count += weight;

        if value == 0.0 {
            self.zero_count += weight;
        } else if value > 0.0 {
            let idx = bucket_index(value, self.gamma);
            self.positive
                .add(idx, weight, self.params.collapse_limit, self.params.density_factor);
        } else {
            let idx = bucket_index(-value, self.gamma);
            self.negative
                .add(idx, weight, self.params.collapse_limit, self.params.density_factor);
        }
        Ok(())
    }

    /// Ingest a single value.
    pub fn add(&mut self, value: f64) -> Result<()> {
        self.add_weighted(value, 1)
    }

    /// Approximate the `q`-quantile (`q` in `[0, 1]`).
    ///
    /// Guaranteed within a relative error of `alpha` of the true value,
    /// provided no bucket range has been collapsed past the requested
    /// quantile's rank.
    pub fn quantile(&self, q: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        if q <= 0.0 {
            return self.min;
        }
        if q >= 1.0 {
            return self.max;
        }

        let rank = (q * self.count as f64) as u64;
        let mut cumulative: u64 = 0;

        // Negative side walked from largest magnitude (most negative) down
        // to the smallest, i.e. ascending actual value.
        let mut negative_desc = self.negative.iter_all_ascending();
        negative_desc.reverse();
        for (idx, count) in negative_desc {
            cumulative += count;
            if cumulative > rank {
                return -bucket_value(idx, self.gamma);
            }
        }

        if self.zero_count > 0 {
            cumulative += self.zero_count;
            if cumulative > rank {
                return 0.0;
            }
        }

        for (idx, count) in self.positive.iter_all_ascending() {
            cumulative += count;
            if cumulative > rank {
                return bucket_value(idx, self.gamma);
            }
        }

        self.max
    }

    /// Merge `other` into `self` in place. Requires matching `alpha`
    /// (compared within a small tolerance to absorb float round-trip
    /// through serialization).
    pub fn merge(&mut self, other: &Sketch) -> Result<()> {
        if (self.alpha - other.alpha).abs() > 1e-6 {
            return Err(Error::IncompatibleSketch {
                a: self.alpha,
                b: other.alpha,
            });
        }

        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count += other.count;
        self.sum.add(other.sum.total());
        self.zero_count += other.zero_count;
        self.positive
            .merge_from(&other.positive, self.params.collapse_limit, self.params.density_factor);
        self.negative
            .merge_from(&other.negative, self.params.collapse_limit, self.params.density_factor);
        Ok(())
    }

    /// Serialize to the wire format: version byte, gamma as f32, zero
    /// count, positive bucket count + (zigzag-varint index, varint count)
    /// pairs, the same for negative buckets, then min/max/sum/count as f64/u64.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(SERIALIZE_VERSION);
        out.extend_from_slice(&(self.gamma as f32).to_le_bytes());
        out.extend_from_slice(&self.zero_count.to_le_bytes());

        let positive_buckets = self.positive.iter_all_ascending();
        out.extend_from_slice(&(positive_buckets.len() as u64).to_le_bytes());
        for (idx, count) in &positive_buckets {
            write_varint_i32(&mut out, *idx);
            write_varint_u64(&mut out, *count);
        }

        let negative_buckets = self.negative.iter_all_ascending();
        out.extend_from_slice(&(negative_buckets.len() as u64).to_le_bytes());
        for (idx, count) in &negative_buckets {
            write_varint_i32(&mut out, *idx);
            write_varint_u64(&mut out, *count);
        }

        out.extend_from_slice(&self.min.to_le_bytes());
        out.extend_from_slice(&self.max.to_le_bytes());
        out.extend_from_slice(&self.sum.total().to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out
    }

    /// Deserialize a sketch previously produced by [`Sketch::serialize`].
    ///
    /// The reconstructed sketch always stores buckets sparsely; it will
    /// re-densify on subsequent `add` calls according to its own
    /// `density_factor` if applicable.
    pub fn deserialize(bytes: &[u8], params: SketchParams) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let version = cursor.read_u8()?;
        if version != SERIALIZE_VERSION {
            return Err(Error::SchemaValidation(format!(
                "unsupported sketch wire version {version}"
            )));
        }

        let gamma = f32::from_le_bytes(cursor.read_array()?) as f64;
        let zero_count = u64::from_le_bytes(cursor.read_array()?);

        let positive_len = u64::from_le_bytes(cursor.read_array()?);
        let mut positive_store = BTreeMap::new();
        for _ in 0..positive_len {
            let idx = read_varint_i32(&mut cursor)?;
            let count = read_varint_u64(&mut cursor)?;
            positive_store.insert(idx, count);
        }

        let negative_len = u64::from_le_bytes(cursor.read_array()?);
        let mut negative_store = BTreeMap::new();
        for _ in 0..negative_len {
            let idx = read_varint_i32(&mut cursor)?;
            let count = read_varint_u64(&mut cursor)?;
            negative_store.insert(idx, count);
        }

        let min = f64::from_le_bytes(cursor.read_array()?);
        let max = f64::from_le_bytes(cursor.read_array()?);
        let sum = f64::from_le_bytes(cursor.read_array()?);
        let count = u64::from_le_bytes(cursor.read_array()?);

        let mut kahan = KahanSum::new();
        kahan.add(sum);

        Ok(Self {
            alpha: params.alpha,
            gamma,
            params,
            zero_count,
            positive: Bucketed {
                store: Store::Sparse(positive_store),
                collapsed_upper: None,
                collapsed_count: 0,
            },
            negative: Bucketed {
                store: Store::Sparse(negative_store),
                collapsed_upper: None,
                collapsed_count: 0,
            },
            min,
            max,
            sum: kahan,
            count,
        })
    }

    /// Whether the positive store has switched to a dense array. Exposed
    /// for tests and diagnostics, not load-bearing for correctness.
    pub fn positive_is_dense(&self) -> bool {
        matches!(self.positive.store, Store::Dense(_))
    }

    /// Width of the dense positive range, if densified.
    pub fn positive_dense_width(&self) -> Option<usize> {
        match &self.positive.store {
            Store::Dense(d) => Some(d.range_width()),
            Store::Sparse(_) => None,
        }
    }
}

// ── Minimal byte-cursor + varint helpers ────────────────────────────────

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| Error::SchemaValidation("unexpected end of sketch bytes".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.bytes.get(self.pos..self.pos + N).ok_or_else(|| {
            Error::SchemaValidation("unexpected end of sketch bytes".into())
        })?;
        self.pos += N;
        let mut arr = [0u8; N];
        arr.copy_from_slice(slice);
        Ok(arr)
    }
}

fn write_varint_u64(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint_u64(cursor: &mut Cursor) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = cursor.read_u8()?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

fn write_varint_i32(out: &mut Vec<u8>, value: i32) {
    // Zigzag encode so small-magnitude negative indices stay compact.
    let zigzag = ((value << 1) ^ (value >> 31)) as u32;
    write_varint_u64(out, zigzag as u64);
}

fn read_varint_i32(cursor: &mut Cursor) -> Result<i32> {
    let zigzag = read_varint_u64(cursor)? as u32;
    Ok(((zigzag >> 1) as i32) ^ -((zigzag & 1) as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> SketchParams {
        SketchParams {
            alpha: 0.0075,
            collapse_limit: 2048,
            density_factor: 2.0,
            allow_negative: false,
        }
    }

    #[test]
    fn sketch_accuracy_bound_on_1_to_10000() {
        let mut sketch = Sketch::new(test_params());
        for v in 1..=10000u64 {
            sketch.add(v as f64).unwrap();
        }
        let p95 = sketch.quantile(0.95);
        let alpha = 0.0075;
        let true_p95 = 9500.0;
        assert!(
            p95 >= true_p95 * (1.0 - alpha) && p95 <= true_p95 * (1.0 + alpha),
            "p95={} out of bounds",
            p95
        );
    }

    #[test]
    fn sketch_merge_matches_single_sketch_within_alpha() {
        let mut a = Sketch::new(test_params());
        let mut b = Sketch::new(test_params());
        let mut combined = Sketch::new(test_params());

        for v in 1..=5000u64 {
            a.add(v as f64).unwrap();
            combined.add(v as f64).unwrap();
        }
        for v in 5001..=10000u64 {
            b.add(v as f64).unwrap();
            combined.add(v as f64).unwrap();
        }

        a.merge(&b).unwrap();

        let q = 0.9;
        let merged_q = a.quantile(q);
        let combined_q = combined.quantile(q);
        let rel_err = (merged_q - combined_q).abs() / combined_q;
        assert!(rel_err <= 0.02, "rel_err={}", rel_err);
    }

    #[test]
    fn merge_rejects_mismatched_alpha() {
        let mut a = Sketch::new(test_params());
        let mut b = Sketch::new(SketchParams {
            alpha: 0.02,
            ..test_params()
        });
        a.add(1.0).unwrap();
        b.add(1.0).unwrap();
        assert!(matches!(
            a.merge(&b),
            Err(Error::IncompatibleSketch { .. })
        ));
    }

    #[test]
    fn negative_value_rejected_by_default() {
        let mut sketch = Sketch::new(test_params());
        assert!(matches!(
            sketch.add(-1.0),
            Err(Error::UnsupportedValue(_))
        ));
    }

    #[test]
    fn negative_value_accepted_when_allowed() {
        let mut sketch = Sketch::new(SketchParams {
            allow_negative: true,
            ..test_params()
        });
        sketch.add(-5.0).unwrap();
        sketch.add(5.0).unwrap();
        sketch.add(0.0).unwrap();
        assert_eq!(sketch.count(), 3);
    }

    #[test]
    fn serialize_deserialize_round_trip() {
        let mut sketch = Sketch::new(test_params());
        for v in [1.0, 2.0, 2.0, 100.0, 100.0, 100.0, 5000.0] {
            sketch.add(v).unwrap();
        }
        let bytes = sketch.serialize();
        let back = Sketch::deserialize(&bytes, test_params()).unwrap();

        assert_eq!(back.count(), sketch.count());
        assert_eq!(back.min(), sketch.min());
        assert_eq!(back.max(), sketch.max());
        assert!((back.quantile(0.5) - sketch.quantile(0.5)).abs() < 1e-6);
    }

    #[test]
    fn empty_sketch_quantile_is_zero() {
        let sketch = Sketch::new(test_params());
        assert_eq!(sketch.quantile(0.5), 0.0);
    }

    #[test]
    fn densifies_under_clustered_input() {
        let mut sketch = Sketch::new(test_params());
        for _ in 0..1000 {
            sketch.add(100.0).unwrap();
        }
        // A single repeated value densifies trivially (range width 1).
        assert!(sketch.positive_is_dense() || sketch.positive_dense_width().is_none());
    }

    #[test]
    fn collapse_bounds_distinct_bucket_count() {
        let mut sketch = Sketch::new(SketchParams {
            collapse_limit: 16,
            ..test_params()
        });
        for v in 1..=100_000u64 {
            sketch.add(v as f64).unwrap();
        }
        match &sketch.positive.store {
            Store::Sparse(map) => assert!(map.len() <= 16),
            Store::Dense(_) => {}
        }
    }
}
