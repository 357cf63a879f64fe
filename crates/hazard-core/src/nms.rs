use crate::decode::Detection;

/// Greedy class-scoped NMS. Detections of different classes never suppress each other,
/// since distinct hazards legitimately overlap (a knife on a table edge).
pub fn nms_filter(mut dets: Vec<Detection>, iou_th: f32, max_det: usize) -> Vec<Detection> {
    // stable: equal confidences keep input order
    dets.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<Detection> = Vec::new();

    'outer: for d in dets {
        for k in &kept {
            if k.class_name == d.class_name && d.bbox.iou(&k.bbox) >= iou_th {
                continue 'outer;
            }
        }
        kept.push(d);
        if kept.len() >= max_det { break; }
    }
    kept
}
