//! Non-maximum suppression

use super::decode::{BoundingBox, Detection};
use std::cmp::Ordering;

/// Greedy non-maximum suppression over one frame's candidates.
#[derive(Debug, Clone, Copy)]
pub struct Suppressor {
    score_threshold: f32,
    overlap_threshold: f32,
}

impl Suppressor {
    pub fn new(score_threshold: f32, overlap_threshold: f32) -> Self {
        Self {
            score_threshold,
            overlap_threshold,
        }
    }

    /// Indices into `candidates` of the detections to keep, highest
    /// confidence first. Equal confidences keep their original order, so the
    /// lower index wins a tie.
    pub fn select(&self, candidates: &[Detection]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..candidates.len())
            .filter(|&i| {
                let confidence = candidates[i].confidence;
                confidence.is_finite() && confidence > self.score_threshold
            })
            .collect();

        // Stable sort keeps index order among equal confidences.
        order.sort_by(|&a, &b| {
            candidates[b]
                .confidence
                .partial_cmp(&candidates[a].confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut keep: Vec<usize> = Vec::new();
        for idx in order {
            let bbox = &candidates[idx].bbox;
            let overlaps_kept = keep
                .iter()
                .any(|&kept| iou(&candidates[kept].bbox, bbox) > self.overlap_threshold);
            if !overlaps_kept {
                keep.push(idx);
            }
        }
        keep
    }

    /// Accepted detections, cloned out of `candidates` by index.
    pub fn apply(&self, candidates: &[Detection]) -> Vec<Detection> {
        self.select(candidates)
            .into_iter()
            .map(|idx| candidates[idx].clone())
            .collect()
    }
}

/// Intersection over union of two boxes. Degenerate boxes never overlap.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let (area_a, area_b) = (a.area(), b.area());
    if area_a == 0 || area_b == 0 {
        return 0.0;
    }

    let inter_w = (a.right().min(b.right()) as i64 - a.x.max(b.x) as i64).max(0);
    let inter_h = (a.bottom().min(b.bottom()) as i64 - a.y.max(b.y) as i64).max(0);
    let inter = inter_w * inter_h;
    if inter == 0 {
        return 0.0;
    }

    let union = area_a + area_b - inter;
    (inter as f64 / union as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(confidence: f32, x: i32, y: i32, w: i32, h: i32) -> Detection {
        Detection {
            class_id: 0,
            confidence,
            bbox: BoundingBox::new(x, y, w, h),
        }
    }

    #[test]
    fn test_iou_basics() {
        let a = BoundingBox::new(0, 0, 10, 10);
        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &BoundingBox::new(10, 0, 10, 10)), 0.0);
        let half = iou(&a, &BoundingBox::new(5, 0, 10, 10));
        assert!((half - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(iou(&a, &BoundingBox::new(0, 0, 0, 10)), 0.0);
    }

    #[test]
    fn test_keeps_highest_of_cluster() {
        let candidates = vec![
            det(0.6, 0, 0, 100, 100),
            det(0.9, 5, 5, 100, 100),
            det(0.8, 500, 500, 50, 50),
        ];
        let keep = Suppressor::new(0.5, 0.4).select(&candidates);
        assert_eq!(keep, vec![1, 2]);
    }

    #[test]
    fn test_tie_goes_to_lower_index() {
        let candidates = vec![det(0.7, 2, 2, 50, 50), det(0.7, 0, 0, 50, 50)];
        let keep = Suppressor::new(0.5, 0.4).select(&candidates);
        assert_eq!(keep, vec![0]);

        let candidates = vec![det(0.7, 0, 0, 50, 50), det(0.7, 2, 2, 50, 50)];
        assert_eq!(Suppressor::new(0.5, 0.4).select(&candidates), vec![0]);
    }

    #[test]
    fn test_overlap_must_exceed_threshold() {
        // IoU exactly 1/3
        let candidates = vec![det(0.9, 0, 0, 10, 10), det(0.8, 5, 0, 10, 10)];
        let at_threshold = Suppressor::new(0.5, 50.0 / 150.0).select(&candidates);
        assert_eq!(at_threshold.len(), 2);
        let below = Suppressor::new(0.5, 0.3).select(&candidates);
        assert_eq!(below, vec![0]);
    }

    #[test]
    fn test_score_threshold_filters() {
        let candidates = vec![det(0.5, 0, 0, 10, 10), det(0.2, 100, 100, 10, 10)];
        assert!(Suppressor::new(0.5, 0.4).select(&candidates).is_empty());
    }

    #[test]
    fn test_apply_matches_by_index() {
        let mut candidates = vec![det(0.6, 0, 0, 10, 10), det(0.95, 200, 200, 10, 10)];
        candidates[1].class_id = 7;
        let accepted = Suppressor::new(0.5, 0.4).apply(&candidates);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].class_id, 7);
        assert_eq!(accepted[0].bbox, BoundingBox::new(200, 200, 10, 10));
    }

    #[test]
    fn test_empty_input() {
        assert!(Suppressor::new(0.5, 0.4).select(&[]).is_empty());
    }
}
