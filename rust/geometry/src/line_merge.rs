// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sews line strings into maximal chains.
//!
//! Two lines are joined where exactly two line ends meet at a point, which is
//! how a chain of topology edges becomes one feature line.

use nalgebra::Point2;
use rustc_hash::FxHashMap;

use crate::types::LineString;

type NodeKey = (u64, u64);

fn key(p: &Point2<f64>) -> NodeKey {
    // Normalise -0.0 so it hashes like 0.0
    ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits())
}

/// Merges lines at degree-2 endpoints.
///
/// Direction of the first line of each chain is preserved; following lines are
/// reversed as needed. Output order follows the first input line of each chain.
pub fn line_merge(lines: &[LineString]) -> Vec<LineString> {
    let lines: Vec<&LineString> = lines.iter().filter(|l| l.len() >= 2).collect();
    if lines.is_empty() {
        return Vec::new();
    }

    // endpoint -> (line index, at_start)
    let mut ends: FxHashMap<NodeKey, Vec<(usize, bool)>> = FxHashMap::default();
    for (idx, line) in lines.iter().enumerate() {
        if let (Some(s), Some(e)) = (line.start(), line.end()) {
            ends.entry(key(s)).or_default().push((idx, true));
            ends.entry(key(e)).or_default().push((idx, false));
        }
    }

    let degree = |p: &Point2<f64>| ends.get(&key(p)).map_or(0, Vec::len);
    let mut used = vec![false; lines.len()];
    let mut out = Vec::new();

    // Chains start at ends that are not degree-2 joints; pure cycles come last
    let mut order: Vec<usize> = (0..lines.len())
        .filter(|&i| {
            let l = lines[i];
            let s = l.start().map_or(0, |p| degree(p));
            let e = l.end().map_or(0, |p| degree(p));
            s != 2 || e != 2
        })
        .collect();
    order.extend(0..lines.len());

    for start_idx in order {
        if used[start_idx] {
            continue;
        }
        used[start_idx] = true;

        let mut points = lines[start_idx].points.clone();
        // Walk away from a non-joint end, then restore the seed's direction
        let start_deg = points.first().map_or(0, |p| degree(p));
        let end_deg = points.last().map_or(0, |p| degree(p));
        let flipped = start_deg == 2 && end_deg != 2;
        if flipped {
            points.reverse();
        }

        extend_forward(&mut points, &lines, &ends, &mut used);
        points.reverse();
        extend_forward(&mut points, &lines, &ends, &mut used);
        points.reverse();

        if flipped {
            points.reverse();
        }

        out.push(LineString::new(points));
    }

    out
}

fn extend_forward(
    points: &mut Vec<Point2<f64>>,
    lines: &[&LineString],
    ends: &FxHashMap<NodeKey, Vec<(usize, bool)>>,
    used: &mut [bool],
) {
    loop {
        let tail = match points.last() {
            Some(p) => *p,
            None => return,
        };
        let here = match ends.get(&key(&tail)) {
            Some(v) if v.len() == 2 => v,
            _ => return,
        };
        let next = here.iter().find(|(idx, _)| !used[*idx]);
        let (idx, at_start) = match next {
            Some(&(idx, at_start)) => (idx, at_start),
            None => return,
        };
        used[idx] = true;
        let line = lines[idx];
        if at_start {
            points.extend(line.points.iter().skip(1));
        } else {
            points.extend(line.points.iter().rev().skip(1));
        }
    }
}
