// The smallest unit of resident audio; one stereo frame
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn mono(x: f32) -> Self {
        Self { left: x, right: x }
    }

    #[inline]
    pub fn lerp(self, next: Self, t: f32) -> Self {
        Self {
            left: self.left * (1.0 - t) + next.left * t,
            right: self.right * (1.0 - t) + next.right * t,
        }
    }
}
