//! Pareto ranking primitives for NSGA-II.
//!
//! Everything works on an arena of objective vectors addressed by index, so
//! fronts are plain `Vec<usize>` and no back-references between individuals
//! are needed. All objectives are maximized.

/// Objectives per individual.
pub const OBJECTIVES: usize = 2;

pub type Objectives = [f64; OBJECTIVES];

/// `p` dominates `q` when it is nowhere worse and somewhere strictly better.
pub fn dominates(p: &Objectives, q: &Objectives) -> bool {
    let none_worse = p.iter().zip(q).all(|(a, b)| a >= b);
    let one_better = p.iter().zip(q).any(|(a, b)| a > b);
    none_worse && one_better
}

/// Fast non-dominated sort.
///
/// Returns fronts of arena indices, front 0 first. Within a front, members
/// appear in the order they were released (input order for front 0).
pub fn non_dominated_sort(objectives: &[Objectives]) -> Vec<Vec<usize>> {
    let n = objectives.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();

    let mut first = Vec::new();
    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if dominates(&objectives[p], &objectives[q]) {
                dominated_by[p].push(q);
            } else if dominates(&objectives[q], &objectives[p]) {
                domination_count[p] += 1;
            }
        }
        if domination_count[p] == 0 {
            first.push(p);
        }
    }

    let mut current = first;
    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        fronts.push(current);
        current = next;
    }

    fronts
}

/// Crowding distance of every member of `front`.
///
/// `front` is reordered in place: it ends up stably sorted by the last
/// objective, as each objective pass sorts it. The returned distances are
/// aligned with the reordered `front`. Boundary members of every objective
/// get `f64::INFINITY`; objectives with zero range add nothing to interior
/// members.
pub fn crowding_distance_assignment(objectives: &[Objectives], front: &mut [usize]) -> Vec<f64> {
    let len = front.len();
    let mut distance = vec![0.0; objectives.len()];
    if len == 0 {
        return Vec::new();
    }

    for m in 0..OBJECTIVES {
        front.sort_by(|&a, &b| objectives[a][m].total_cmp(&objectives[b][m]));

        let lo = front[0];
        let hi = front[len - 1];
        distance[lo] = f64::INFINITY;
        distance[hi] = f64::INFINITY;

        let range = objectives[hi][m] - objectives[lo][m];
        if range == 0.0 {
            continue;
        }
        for i in 1..len.saturating_sub(1) {
            let gap = objectives[front[i + 1]][m] - objectives[front[i - 1]][m];
            distance[front[i]] += gap / range;
        }
    }

    front.iter().map(|&i| distance[i]).collect()
}
