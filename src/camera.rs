use crate::vec2::Vec2;

pub struct Camera {
    pub position: Vec2,  // (x, y) position in world space
    pub angle: f32,      // radians, facing direction in the grid plane
    pub direction: Vec2, // unit vector derived from angle, refreshed per frame
}

impl Camera {
    pub fn new(position: Vec2, angle: f32) -> Self {
        let mut camera = Self {
            position,
            angle,
            direction: Vec2::ZERO,
        };
        camera.refresh_direction();
        camera
    }

    /// Copy in the externally-owned pose. Called once per frame, before any
    /// column processing reads `direction`.
    pub fn set(&mut self, position: Vec2, angle: f32) {
        self.position = position;
        self.angle = angle;
        self.refresh_direction();
    }

    #[inline]
    pub fn refresh_direction(&mut self) {
        self.direction = Vec2::new(self.angle.cos(), self.angle.sin());
    }

    /// World-space ray for a screen column. The camera-local fan is
    /// (1, (x - W/2) / W * 2); the 2.0 factor fixes the horizontal FOV.
    #[inline]
    pub fn column_ray(&self, column: i32, screen_width: i32) -> Vec2 {
        let lateral = (column - screen_width / 2) as f32 / screen_width as f32 * 2.0;
        Vec2::new(1.0, lateral).rotate(self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_derives_from_angle() {
        let camera = Camera::new(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
        assert!(camera.direction.x.abs() < 1e-6);
        assert!((camera.direction.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn central_column_ray_is_the_facing_direction() {
        let camera = Camera::new(Vec2::ZERO, 0.0);
        let ray = camera.column_ray(320, 640);
        assert_eq!(ray, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn edge_columns_span_the_fov() {
        let camera = Camera::new(Vec2::ZERO, 0.0);
        let left = camera.column_ray(0, 640);
        let right = camera.column_ray(639, 640);
        assert!((left.y + 1.0).abs() < 1e-6);
        assert!(right.y > 0.99);
        assert_eq!(left.x, 1.0);
        assert_eq!(right.x, 1.0);
    }
}
