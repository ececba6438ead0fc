// src/skeleton.rs - Joint vocabularies shared by the capture modes

/// Sensor-side joint types with their stable numeric codes. The codes are
/// what the joint record files carry, so the order must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum JointType {
    Head = 0,
    ShoulderSpine = 1,
    LeftShoulder = 2,
    LeftElbow = 3,
    LeftHand = 4,
    RightShoulder = 5,
    RightElbow = 6,
    RightHand = 7,
    MidSpine = 8,
    BaseSpine = 9,
    LeftHip = 10,
    LeftKnee = 11,
    LeftFoot = 12,
    RightHip = 13,
    RightKnee = 14,
    RightFoot = 15,
    LeftWrist = 16,
    RightWrist = 17,
    Neck = 18,
}

impl JointType {
    pub const COUNT: usize = 19;

    /// Numeric code used as the joint key in record files.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Head),
            1 => Some(Self::ShoulderSpine),
            2 => Some(Self::LeftShoulder),
            3 => Some(Self::LeftElbow),
            4 => Some(Self::LeftHand),
            5 => Some(Self::RightShoulder),
            6 => Some(Self::RightElbow),
            7 => Some(Self::RightHand),
            8 => Some(Self::MidSpine),
            9 => Some(Self::BaseSpine),
            10 => Some(Self::LeftHip),
            11 => Some(Self::LeftKnee),
            12 => Some(Self::LeftFoot),
            13 => Some(Self::RightHip),
            14 => Some(Self::RightKnee),
            15 => Some(Self::RightFoot),
            16 => Some(Self::LeftWrist),
            17 => Some(Self::RightWrist),
            18 => Some(Self::Neck),
            _ => None,
        }
    }
}

/// Bone connections drawn by the 2D overlay (start joint, end joint).
/// A bone is rendered only when both endpoints were detected this frame.
pub const BONES: [(JointType, JointType); 18] = [
    (JointType::Head, JointType::Neck),
    (JointType::Neck, JointType::ShoulderSpine),
    // left arm
    (JointType::ShoulderSpine, JointType::LeftShoulder),
    (JointType::LeftShoulder, JointType::LeftElbow),
    (JointType::LeftElbow, JointType::LeftWrist),
    (JointType::LeftWrist, JointType::LeftHand),
    // right arm
    (JointType::ShoulderSpine, JointType::RightShoulder),
    (JointType::RightShoulder, JointType::RightElbow),
    (JointType::RightElbow, JointType::RightWrist),
    (JointType::RightWrist, JointType::RightHand),
    // spine
    (JointType::ShoulderSpine, JointType::MidSpine),
    (JointType::MidSpine, JointType::BaseSpine),
    // left leg
    (JointType::BaseSpine, JointType::LeftHip),
    (JointType::LeftHip, JointType::LeftKnee),
    (JointType::LeftKnee, JointType::LeftFoot),
    // right leg
    (JointType::BaseSpine, JointType::RightHip),
    (JointType::RightHip, JointType::RightKnee),
    (JointType::RightKnee, JointType::RightFoot),
];

/// Size of the external estimator's fixed keypoint topology.
pub const POSE_POINT_COUNT: usize = 18;

/// Index of the neck point in the estimator topology, traced per frame as a
/// quick sanity signal for the operator.
pub const POSE_NECK: usize = 1;
