use crate::pose::Point;

/// ランドマーク1点ぶんのEMA平滑化フィルタ
///
/// x, y, z, visibility を成分ごとに同じ alpha で平滑化する。
/// 初回フレームはそのまま保持して返す。
#[derive(Debug, Clone)]
pub struct PointSmoother {
    alpha: f32,
    prev: Option<Point>,
}

impl PointSmoother {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, prev: None }
    }

    pub fn apply(&mut self, point: Point) -> Point {
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(point);
                return point;
            }
        };

        let a = self.alpha;
        let result = Point {
            x: a * point.x + (1.0 - a) * prev.x,
            y: a * point.y + (1.0 - a) * prev.y,
            z: a * point.z + (1.0 - a) * prev.z,
            visibility: a * point.visibility + (1.0 - a) * prev.visibility,
        };
        self.prev = Some(result);
        result
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_point(a: &Point, b: &Point, eps: f32) -> bool {
        (a.x - b.x).abs() < eps
            && (a.y - b.y).abs() < eps
            && (a.z - b.z).abs() < eps
            && (a.visibility - b.visibility).abs() < eps
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut s = PointSmoother::new(0.2);
        let p = Point::new(0.1, 0.2, 0.3, 0.9);
        assert_eq!(s.apply(p), p);
    }

    #[test]
    fn test_ema_all_fields() {
        let mut s = PointSmoother::new(0.5);
        s.apply(Point::new(0.0, 0.0, 0.0, 0.0));
        let result = s.apply(Point::new(2.0, 4.0, 6.0, 1.0));
        assert!(approx_eq_point(&result, &Point::new(1.0, 2.0, 3.0, 0.5), 1e-6));
    }

    #[test]
    fn test_state_carries_over() {
        let mut s = PointSmoother::new(0.2);
        s.apply(Point::new(0.0, 0.0, 0.0, 1.0));
        s.apply(Point::new(1.0, 0.0, 0.0, 1.0)); // 0.2
        let result = s.apply(Point::new(1.0, 0.0, 0.0, 1.0)); // 0.2*1 + 0.8*0.2
        assert!((result.x - 0.36).abs() < 1e-6);
    }

    #[test]
    fn test_slow_alpha_converges() {
        let mut s = PointSmoother::new(0.05);
        s.apply(Point::new(0.0, 0.0, 0.0, 1.0));
        let mut last = 0.0;
        for _ in 0..200 {
            let p = s.apply(Point::new(1.0, 1.0, 0.0, 1.0));
            assert!(p.x >= last);
            last = p.x;
        }
        assert!(last > 0.99 && last <= 1.0);
    }

    #[test]
    fn test_returned_points_do_not_alias() {
        let mut s = PointSmoother::new(0.5);
        let first = s.apply(Point::new(0.0, 0.0, 0.0, 1.0));
        let second = s.apply(Point::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(first.x, 0.0);
        assert_eq!(second.x, 0.5);
    }

    #[test]
    fn test_reset() {
        let mut s = PointSmoother::new(0.0);
        s.apply(Point::new(1.0, 2.0, 3.0, 1.0));
        s.reset();
        let p = Point::new(4.0, 5.0, 6.0, 0.7);
        assert_eq!(s.apply(p), p);
    }
}
