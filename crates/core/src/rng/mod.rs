use rand::RngCore;

/// Probability that an anti-repeat pick excludes the previous value.
pub const EXCLUDE_PREVIOUS_PROBABILITY: f64 = 0.8;

const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Mulberry32 over a single 32-bit state. The same seed yields the same draw
/// sequence on every platform. Pick helpers never panic: an empty candidate
/// slice yields `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Current internal state, mostly useful for debugging a replay.
    pub fn state(&self) -> u32 {
        self.state
    }

    fn step(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Returns a float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.step()) / TWO_POW_32
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize {
        let idx = (self.next_f64() * len as f64) as usize;
        idx.min(len - 1)
    }

    pub fn pick<T: Copy>(&mut self, set: &[T]) -> Option<T> {
        if set.is_empty() {
            return None;
        }
        let idx = self.index(set.len());
        Some(set[idx])
    }

    /// Picks uniformly among values other than `prev`. Falls back to the
    /// whole set when the exclusion would leave nothing.
    pub fn pick_excluding<T: Copy + PartialEq>(&mut self, set: &[T], prev: Option<T>) -> Option<T> {
        match prev {
            Some(prev) => self.pick_excluding_all(set, &[prev]),
            None => self.pick(set),
        }
    }

    pub fn pick_excluding_all<T: Copy + PartialEq>(
        &mut self,
        set: &[T],
        excludes: &[T],
    ) -> Option<T> {
        let candidates: Vec<T> = set
            .iter()
            .copied()
            .filter(|value| !excludes.contains(value))
            .collect();
        if candidates.is_empty() {
            self.pick(set)
        } else {
            self.pick(&candidates)
        }
    }

    /// 80% of the time excludes `prev`, 20% of the time draws from the full
    /// set so repeats stay possible.
    pub fn pick_avoiding_consecutive<T: Copy + PartialEq>(
        &mut self,
        set: &[T],
        prev: Option<T>,
    ) -> Option<T> {
        if self.next_f64() < EXCLUDE_PREVIOUS_PROBABILITY {
            self.pick_excluding(set, prev)
        } else {
            self.pick(set)
        }
    }

    /// Restricts candidates to the values tied for the lowest count, then
    /// applies the anti-repeat policy. `counts` is parallel to `set`; missing
    /// entries count as zero.
    pub fn pick_balanced<T: Copy + PartialEq>(
        &mut self,
        set: &[T],
        counts: &[usize],
        prev: Option<T>,
    ) -> Option<T> {
        let count_at = |idx: usize| counts.get(idx).copied().unwrap_or(0);
        let min = (0..set.len()).map(count_at).min()?;
        let candidates: Vec<T> = set
            .iter()
            .enumerate()
            .filter(|(idx, _)| count_at(*idx) == min)
            .map(|(_, value)| *value)
            .collect();
        self.pick_avoiding_consecutive(&candidates, prev)
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let low = u64::from(self.step());
        let high = u64::from(self.step());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
        assert_eq!(a, b);
    }

    #[test]
    fn draws_stay_in_unit_interval() {
        let mut rng = SeededRng::new(0);
        for _ in 0..10_000 {
            let value = rng.next_f64();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn empty_sets_yield_none() {
        let mut rng = SeededRng::new(1);
        let empty: [u8; 0] = [];
        assert_eq!(rng.pick(&empty), None);
        assert_eq!(rng.pick_excluding(&empty, Some(1)), None);
        assert_eq!(rng.pick_balanced(&empty, &[], None), None);
    }

    #[test]
    fn excluding_never_returns_excluded_value() {
        let mut rng = SeededRng::new(9);
        for _ in 0..500 {
            let value = rng.pick_excluding(&[1, 2, 3, 4], Some(2)).unwrap();
            assert_ne!(value, 2);
            let value = rng.pick_excluding_all(&[1, 2, 3, 4], &[1, 3]).unwrap();
            assert!(value == 2 || value == 4);
        }
    }

    #[test]
    fn excluding_everything_falls_back_to_full_set() {
        let mut rng = SeededRng::new(3);
        assert_eq!(rng.pick_excluding(&[7], Some(7)), Some(7));
        let value = rng.pick_excluding_all(&[1, 2], &[1, 2]).unwrap();
        assert!(value == 1 || value == 2);
    }

    #[test]
    fn anti_repeat_pick_repeats_about_five_percent_of_the_time() {
        // 20% allow-repeat branch times a 1-in-4 uniform pick.
        let mut rng = SeededRng::new(2024);
        let trials = 20_000;
        let repeats = (0..trials)
            .filter(|_| rng.pick_avoiding_consecutive(&[0, 1, 2, 3], Some(0)) == Some(0))
            .count();
        let ratio = repeats as f64 / trials as f64;
        assert!((0.03..0.07).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn balanced_pick_only_returns_least_used_values() {
        let mut rng = SeededRng::new(5);
        for _ in 0..200 {
            let value = rng
                .pick_balanced(&['r', 'g', 'y', 'b'], &[3, 1, 1, 2], None)
                .unwrap();
            assert!(value == 'g' || value == 'y');
        }
    }

    #[test]
    fn balanced_pick_is_forced_when_single_candidate() {
        let mut rng = SeededRng::new(5);
        let value = rng.pick_balanced(&['r', 'g'], &[0, 4], Some('r'));
        assert_eq!(value, Some('r'));
    }

    #[test]
    fn composes_with_rand_distributions() {
        use rand::Rng;

        let mut a = SeededRng::new(9);
        let mut b = SeededRng::new(9);
        let rolls: Vec<u8> = (0..32).map(|_| a.gen_range(0..4)).collect();
        assert!(rolls.iter().all(|roll| *roll < 4));
        assert_eq!(rolls, (0..32).map(|_| b.gen_range(0..4)).collect::<Vec<u8>>());

        let mut raw = SeededRng::new(9);
        let mut bytes = [0u8; 6];
        raw.fill_bytes(&mut bytes);
        let mut words = SeededRng::new(9);
        assert_eq!(bytes[..4], words.next_u32().to_le_bytes());
        assert_eq!(bytes[4..], words.next_u32().to_le_bytes()[..2]);
    }

    #[test]
    fn next_f64_matches_raw_word() {
        let mut a = SeededRng::new(123);
        let mut b = SeededRng::new(123);
        let word = a.next_u32();
        assert_eq!(b.next_f64(), f64::from(word) / 4_294_967_296.0);
    }
}
