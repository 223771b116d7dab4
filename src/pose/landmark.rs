/// MediaPipe Pose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;

    /// 関節ドリフト判定に使う点（鼻・目・耳・肩）
    pub const KEY_JOINTS: [LandmarkIndex; 7] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
    ];

    /// 体幹中心（両肩・両腰）
    pub const BODY_CENTER: [LandmarkIndex; 4] = [
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftHip,
        Self::RightHip,
    ];

    /// 視線（yaw）推定に使う点
    pub const GAZE: [LandmarkIndex; 3] = [Self::Nose, Self::LeftEar, Self::RightEar];

    pub fn from_index(index: usize) -> Option<Self> {
        use LandmarkIndex::*;
        const ALL: [LandmarkIndex; LandmarkIndex::COUNT] = [
            Nose, LeftEyeInner, LeftEye, LeftEyeOuter, RightEyeInner, RightEye,
            RightEyeOuter, LeftEar, RightEar, MouthLeft, MouthRight, LeftShoulder,
            RightShoulder, LeftElbow, RightElbow, LeftWrist, RightWrist, LeftPinky,
            RightPinky, LeftIndex, RightIndex, LeftThumb, RightThumb, LeftHip, RightHip,
            LeftKnee, RightKnee, LeftAnkle, RightAnkle, LeftHeel, RightHeel,
            LeftFootIndex, RightFootIndex,
        ];
        ALL.get(index).copied()
    }

    /// 顔のランドマーク（0〜10）か。視線判定でのみ使う
    pub fn is_face(self) -> bool {
        (self as usize) <= Self::MouthRight as usize
    }
}

/// 可視判定の閾値（これを超えたら有効）
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0)
    pub y: f32,
    pub z: f32,
    /// 可視性スコア (0.0〜1.0)
    pub visibility: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility > VISIBILITY_THRESHOLD
    }

    /// XY平面上のユークリッド距離（zは使わない）
    pub fn distance_2d(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 33ランドマークからなる姿勢
#[derive(Debug, Clone, PartialEq)]
pub struct PoseLandmarks {
    pub points: [Point; LandmarkIndex::COUNT],
}

impl PoseLandmarks {
    pub fn new(points: [Point; LandmarkIndex::COUNT]) -> Self {
        Self { points }
    }

    /// 33点ちょうどでなければ None
    pub fn from_slice(points: &[Point]) -> Option<Self> {
        let points: [Point; LandmarkIndex::COUNT] = points.try_into().ok()?;
        Some(Self { points })
    }

    /// インデックスでランドマークを取得
    pub fn get(&self, index: LandmarkIndex) -> &Point {
        &self.points[index as usize]
    }

    pub fn get_mut(&mut self, index: LandmarkIndex) -> &mut Point {
        &mut self.points[index as usize]
    }
}

impl Default for PoseLandmarks {
    fn default() -> Self {
        Self {
            points: [Point::default(); LandmarkIndex::COUNT],
        }
    }
}
