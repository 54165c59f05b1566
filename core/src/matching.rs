//! Exact minimum-cost bipartite matching.
//!
//! Hungarian algorithm with row/column potentials and shortest
//! augmenting paths over a dense f64 matrix, O(rows² · cols).
//! Clinic-scale matrices solve in microseconds. Costs must be finite.

/// Solve the rectangular assignment problem for `cost[row][col]`.
///
/// Returns `assigned[row] = Some(col)` minimizing total matched cost.
/// With rows ≤ cols every row is matched; with more rows than columns
/// exactly `cols` rows are matched and the rest return None.
pub fn min_cost_assignment(cost: &[Vec<f64>]) -> Vec<Option<usize>> {
    let rows = cost.len();
    if rows == 0 {
        return Vec::new();
    }
    let cols = cost[0].len();
    if cols == 0 {
        return vec![None; rows];
    }

    if rows > cols {
        // Transpose so the augmenting loop always runs with rows ≤ cols.
        let transposed: Vec<Vec<f64>> = (0..cols)
            .map(|j| (0..rows).map(|i| cost[i][j]).collect())
            .collect();
        let col_to_row = min_cost_assignment(&transposed);
        let mut assigned = vec![None; rows];
        for (j, row) in col_to_row.iter().enumerate() {
            if let Some(i) = row {
                assigned[*i] = Some(j);
            }
        }
        return assigned;
    }

    // 1-indexed potentials; index 0 is the virtual unmatched column.
    let mut u = vec![0.0f64; rows + 1];
    let mut v = vec![0.0f64; cols + 1];
    // matched_row[j] = row currently occupying column j (0 = free).
    let mut matched_row = vec![0usize; cols + 1];
    let mut way = vec![0usize; cols + 1];

    for i in 1..=rows {
        matched_row[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; cols + 1];
        let mut used = vec![false; cols + 1];

        // Dijkstra over reduced costs until a free column is reached.
        loop {
            used[j0] = true;
            let i0 = matched_row[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=cols {
                if used[j] {
                    continue;
                }
                let reduced = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=cols {
                if used[j] {
                    u[matched_row[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if matched_row[j0] == 0 {
                break;
            }
        }

        // Augment along the recorded path.
        loop {
            let j1 = way[j0];
            matched_row[j0] = matched_row[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assigned = vec![None; rows];
    for (j, &i) in matched_row.iter().enumerate().skip(1) {
        if i != 0 {
            assigned[i - 1] = Some(j - 1);
        }
    }
    assigned
}
