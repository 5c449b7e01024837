//! Lexicographic enumeration of k-element index subsets.

/// Walks every size-`k` subset of `0..n` in lexicographic order, reusing one
/// buffer.
///
/// ```
/// use passcut_partition::NextKSubset;
///
/// let mut it = NextKSubset::new(4, 2);
/// let mut seen = Vec::new();
/// while let Some(s) = it.next() {
///     seen.push(s.to_vec());
/// }
/// assert_eq!(seen.len(), 6);
/// assert_eq!(seen[0], vec![0, 1]);
/// assert_eq!(seen[5], vec![2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct NextKSubset {
    n: usize,
    k: usize,
    current: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl NextKSubset {
    pub fn new(n: usize, k: usize) -> Self {
        let mut it = Self {
            n: 0,
            k: 0,
            current: Vec::new(),
            started: false,
            exhausted: false,
        };
        it.init(n, k);
        it
    }

    /// Restart over size-`k` subsets of `0..n`.
    pub fn init(&mut self, n: usize, k: usize) {
        self.n = n;
        self.k = k;
        self.current.clear();
        self.current.extend(0..k);
        self.started = false;
        self.exhausted = k > n;
    }

    /// Whether every subset has been produced.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The next subset, or `None` once exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&[usize]> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            if self.k == 0 {
                self.exhausted = true;
            }
            return Some(&self.current);
        }
        // Rightmost position that can still advance.
        let k = self.k;
        let n = self.n;
        let Some(i) = (0..k).rev().find(|&i| self.current[i] < n - k + i) else {
            self.exhausted = true;
            return None;
        };
        self.current[i] += 1;
        for j in i + 1..k {
            self.current[j] = self.current[j - 1] + 1;
        }
        Some(&self.current)
    }
}
