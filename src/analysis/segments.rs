//! Segment timeline construction and validation

use crate::types::{BeatGrid, Segment, SegmentKind};

/// Boundary comparison tolerance in seconds
const EPSILON: f64 = 1e-6;

/// True when `segments` are contiguous, non-overlapping and cover `[0, duration)`
pub fn is_contiguous_cover(segments: &[Segment], duration: f64) -> bool {
    let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
        return false;
    };
    if first.start.abs() > EPSILON || (last.end - duration).abs() > EPSILON {
        return false;
    }
    segments.iter().all(|s| s.end > s.start)
        && segments
            .windows(2)
            .all(|pair| (pair[0].end - pair[1].start).abs() <= EPSILON)
}

/// Turn per-window labels into a merged segment timeline
///
/// Window `i` spans `[i * window, (i + 1) * window)`; the last segment is
/// stretched or clipped to end exactly at `duration`.
pub fn from_window_labels(
    labels: &[SegmentKind],
    energy: &[f32],
    window: f64,
    duration: f64,
) -> Vec<Segment> {
    if labels.is_empty() || window <= 0.0 {
        return vec![Segment::new(SegmentKind::Unknown, 0.0, duration, 0.0)];
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut run_start = 0usize;
    for i in 1..=labels.len() {
        if i == labels.len() || labels[i] != labels[run_start] {
            let start = run_start as f64 * window;
            let end = (i as f64 * window).min(duration);
            if end > start {
                segments.push(Segment::new(
                    labels[run_start],
                    start,
                    end,
                    mean(&energy[run_start.min(energy.len())..i.min(energy.len())]),
                ));
            }
            run_start = i;
        }
    }

    if let Some(last) = segments.last_mut() {
        last.end = duration;
    }
    segments
}

/// Move internal boundaries onto nearby downbeats
///
/// A boundary moves only if a downbeat lies within `tolerance` and the move
/// keeps every segment non-empty. Segments that would vanish are absorbed
/// into their predecessor, then equal neighbours are merged.
pub fn snap_to_downbeats(segments: Vec<Segment>, grid: &BeatGrid, tolerance: f64) -> Vec<Segment> {
    if grid.is_empty() || segments.len() < 2 {
        return segments;
    }

    let mut snapped: Vec<Segment> = Vec::with_capacity(segments.len());
    for (i, seg) in segments.iter().enumerate() {
        let mut seg = *seg;
        if let Some(prev) = snapped.last() {
            seg.start = prev.end;
        }
        if i + 1 < segments.len() {
            let boundary = seg.end;
            if let Some(db) = grid.nearest_within(boundary, boundary - tolerance, boundary + tolerance) {
                let next_end = segments[i + 1].end;
                if db > seg.start + EPSILON && db < next_end - EPSILON {
                    seg.end = db;
                }
            }
        }
        if seg.end - seg.start > EPSILON {
            snapped.push(seg);
        } else if let Some(prev) = snapped.last_mut() {
            prev.end = seg.end.max(prev.end);
        }
    }

    merge_adjacent(snapped)
}

/// Merge neighbouring segments of the same kind, length-weighting energy
pub fn merge_adjacent(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match merged.last_mut() {
            Some(prev) if prev.kind == seg.kind => {
                let total = seg.end - prev.start;
                if total > 0.0 {
                    prev.avg_energy = (prev.avg_energy * prev.length() + seg.avg_energy * seg.length()) / total;
                }
                prev.end = seg.end;
            }
            _ => merged.push(seg),
        }
    }
    merged
}

fn mean(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_detection() {
        let ok = vec![
            Segment::new(SegmentKind::Intro, 0.0, 10.0, 0.2),
            Segment::new(SegmentKind::Drop, 10.0, 30.0, 0.9),
        ];
        assert!(is_contiguous_cover(&ok, 30.0));
        assert!(!is_contiguous_cover(&ok, 31.0));

        let gap = vec![
            Segment::new(SegmentKind::Intro, 0.0, 10.0, 0.2),
            Segment::new(SegmentKind::Drop, 11.0, 30.0, 0.9),
        ];
        assert!(!is_contiguous_cover(&gap, 30.0));
        assert!(!is_contiguous_cover(&[], 30.0));
    }

    #[test]
    fn test_window_labels_merge() {
        use SegmentKind::*;
        let labels = [Intro, Intro, Drop, Drop, Drop, Outro];
        let energy = [0.2, 0.2, 0.9, 0.9, 0.9, 0.1];
        let segs = from_window_labels(&labels, &energy, 1.0, 5.5);
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[1].kind, Drop);
        assert_eq!(segs[1].start, 2.0);
        assert_eq!(segs[2].end, 5.5);
        assert!((segs[1].avg_energy - 0.9).abs() < 1e-6);
        assert!(is_contiguous_cover(&segs, 5.5));
    }

    #[test]
    fn test_snap_moves_boundary_to_downbeat() {
        let grid = BeatGrid::regular(120.0, 0.0, 40.0);
        let segs = vec![
            Segment::new(SegmentKind::Intro, 0.0, 9.3, 0.2),
            Segment::new(SegmentKind::Drop, 9.3, 40.0, 0.9),
        ];
        let snapped = snap_to_downbeats(segs, &grid, 1.0);
        assert_eq!(snapped[0].end, 10.0);
        assert_eq!(snapped[1].start, 10.0);
        assert!(is_contiguous_cover(&snapped, 40.0));
    }

    #[test]
    fn test_snap_never_creates_empty_segments() {
        let grid = BeatGrid::regular(120.0, 0.0, 20.0);
        let segs = vec![
            Segment::new(SegmentKind::Intro, 0.0, 3.9, 0.2),
            Segment::new(SegmentKind::Buildup, 3.9, 4.1, 0.5),
            Segment::new(SegmentKind::Drop, 4.1, 20.0, 0.9),
        ];
        let snapped = snap_to_downbeats(segs, &grid, 1.0);
        assert!(is_contiguous_cover(&snapped, 20.0));
        assert!(snapped.iter().all(|s| s.length() > 0.0));
    }
}
