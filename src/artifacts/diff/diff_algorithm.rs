//! Myers' O(ND) shortest edit script
//!
//! Edits refer to positions in the compared sequences rather than carrying values, so callers
//! can compare normalized keys and still render the original lines.

use derive_new::new;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Delete { a: usize },
    Insert { b: usize },
    Equal { a: usize, b: usize },
}

impl Edit {
    pub fn is_change(&self) -> bool {
        !matches!(self, Edit::Equal { .. })
    }
}

pub trait DiffAlgorithm<'d, T> {
    type Trace;
    type EditPath;
    type EditScript;

    fn compute_shortest_edit(&self) -> Self::Trace;
    fn backtrack(&self) -> Self::EditPath;
    fn diff(&self) -> Self::EditScript;
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct MyersDiff<'d, T> {
    a: &'d [T],
    b: &'d [T],
}

impl<'d, T: Eq> DiffAlgorithm<'d, T> for MyersDiff<'d, T> {
    type Trace = Vec<Vec<isize>>;
    type EditPath = Vec<(isize, isize, isize, isize)>;
    type EditScript = Vec<Edit>;

    fn compute_shortest_edit(&self) -> Self::Trace {
        let (n, m) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (n + m) as usize;

        // one spare slot on each side keeps k = ±d lookups in bounds
        let mut v = vec![0; 2 * offset + 3];
        let offset = offset + 1;

        let mut trace = Vec::new();

        for d in 0..=(n + m) {
            trace.push(v.clone());

            for k in (-d..=d).step_by(2) {
                let idx = (offset as isize + k) as usize;

                let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                    // we could have only come from k+1, thus an insertion
                    v[idx + 1]
                } else {
                    // deletion from k-1
                    v[idx - 1] + 1
                };

                let mut y = x - k;
                while x < n && y < m && self.a[x as usize] == self.b[y as usize] {
                    // snake
                    x += 1;
                    y += 1;
                }

                v[idx] = x;

                if x >= n && y >= m {
                    return trace;
                }
            }
        }

        trace
    }

    fn backtrack(&self) -> Self::EditPath {
        let (mut x, mut y) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (x + y) as usize + 1;
        let mut edit_path = Vec::new();

        if x == 0 && y == 0 {
            return edit_path;
        }

        let trace = self.compute_shortest_edit();

        for (d, v) in trace.iter().enumerate().rev() {
            let d = d as isize;
            let k = x - y;

            let below = v[(offset as isize + k - 1) as usize];
            let above = v[(offset as isize + k + 1) as usize];
            let prev_k = if k == -d || (k != d && below < above) {
                k + 1
            } else {
                k - 1
            };

            let prev_x = v[(offset as isize + prev_k) as usize];
            let prev_y = prev_x - prev_k;

            while x > prev_x && y > prev_y {
                edit_path.push((x - 1, y - 1, x, y));
                x -= 1;
                y -= 1;
            }

            if d > 0 {
                edit_path.push((prev_x, prev_y, x, y));
            }

            (x, y) = (prev_x, prev_y);
        }

        edit_path
    }

    fn diff(&self) -> Self::EditScript {
        let mut diff = self
            .backtrack()
            .into_iter()
            .filter_map(|(prev_x, prev_y, x, y)| {
                if x == prev_x {
                    // only y moved
                    (prev_y >= 0).then_some(Edit::Insert { b: prev_y as usize })
                } else if y == prev_y {
                    (prev_x >= 0).then_some(Edit::Delete { a: prev_x as usize })
                } else {
                    Some(Edit::Equal {
                        a: prev_x as usize,
                        b: prev_y as usize,
                    })
                }
            })
            .collect::<Vec<_>>();

        diff.reverse();
        diff
    }
}
