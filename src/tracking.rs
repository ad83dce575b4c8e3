/// Tracking state reported by the skeleton-tracking collaborator for one
/// user. Mirrors the sensor SDK's user lifecycle; only `Tracking` makes
/// joint coordinates trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum PresenceState {
    NotFound,
    Found,
    Calibrating,
    Tracking,
    Stopped,
}

/// Error for presence values in recorded sessions that match no known
/// tracker state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPresence(pub String);

impl std::fmt::Display for UnknownPresence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown presence state '{}'", self.0)
    }
}

impl std::error::Error for UnknownPresence {}

impl std::str::FromStr for PresenceState {
    type Err = UnknownPresence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotFound" => Ok(PresenceState::NotFound),
            "Found" => Ok(PresenceState::Found),
            "Calibrating" => Ok(PresenceState::Calibrating),
            "Tracking" => Ok(PresenceState::Tracking),
            "Stopped" => Ok(PresenceState::Stopped),
            other => Err(UnknownPresence(other.to_string())),
        }
    }
}

impl PresenceState {
    /// Status line shown to the person in front of the sensor.
    pub fn status_text(&self) -> &'static str {
        match self {
            PresenceState::NotFound => "LOOKING FOR USER",
            PresenceState::Found => "USER DETECTED",
            PresenceState::Calibrating => "CALIBRATING",
            PresenceState::Tracking => "TRACKING",
            PresenceState::Stopped => "STOPPED",
        }
    }
}

/// A joint position in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub x: f32,
    pub y: f32,
}

impl Joint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The ten upper/lower-body joints persisted per telemetry row. A joint is
/// `None` when the tracker could not resolve it this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Joints {
    pub head: Option<Joint>,
    pub neck: Option<Joint>,
    pub left_shoulder: Option<Joint>,
    pub right_shoulder: Option<Joint>,
    pub left_elbow: Option<Joint>,
    pub right_elbow: Option<Joint>,
    pub left_hand: Option<Joint>,
    pub right_hand: Option<Joint>,
    pub left_hip: Option<Joint>,
    pub right_hip: Option<Joint>,
}

impl Joints {
    /// True if at least one hand can be resolved; a user without hands
    /// cannot interact with targets and is treated as lost.
    pub fn has_hand(&self) -> bool {
        self.left_hand.is_some() || self.right_hand.is_some()
    }

    /// Both hands, in a fixed order, skipping unresolved ones.
    pub fn hands(&self) -> impl Iterator<Item = Joint> + '_ {
        [self.left_hand, self.right_hand].into_iter().flatten()
    }

    /// All joints in persistence column order.
    pub fn all(&self) -> [Option<Joint>; 10] {
        [
            self.head,
            self.neck,
            self.left_shoulder,
            self.right_shoulder,
            self.left_elbow,
            self.right_elbow,
            self.left_hand,
            self.right_hand,
            self.left_hip,
            self.right_hip,
        ]
    }
}

/// One tracked user as seen in a single sensor frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserFrame {
    pub state: PresenceState,
    pub joints: Joints,
}

/// One tick's worth of sensor input: every user the tracker currently
/// knows about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorFrame {
    pub users: Vec<UserFrame>,
}

impl SensorFrame {
    pub fn single(state: PresenceState, joints: Joints) -> Self {
        Self {
            users: vec![UserFrame { state, joints }],
        }
    }

    /// Collapses per-user states into the single aggregate signal the
    /// session engine consumes: the state of the first user with a
    /// resolvable hand, or `NotFound` when no such user exists. There is
    /// no fixed cap on the number of users considered.
    pub fn presence(&self) -> PresenceState {
        self.users
            .iter()
            .find(|u| u.joints.has_hand())
            .map(|u| u.state)
            .unwrap_or(PresenceState::NotFound)
    }

    /// Joints of the first actively tracked user, if any. This is the user
    /// whose movements drive hit detection and telemetry.
    pub fn active_joints(&self) -> Option<&Joints> {
        self.users
            .iter()
            .find(|u| u.state == PresenceState::Tracking && u.joints.has_hand())
            .map(|u| &u.joints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joints_with_hand() -> Joints {
        Joints {
            right_hand: Some(Joint::new(100.0, 200.0)),
            ..Joints::default()
        }
    }

    #[test]
    fn empty_frame_is_not_found() {
        assert_eq!(SensorFrame::default().presence(), PresenceState::NotFound);
    }

    #[test]
    fn user_without_hands_is_not_found() {
        let frame = SensorFrame::single(PresenceState::Tracking, Joints::default());
        assert_eq!(frame.presence(), PresenceState::NotFound);
    }

    #[test]
    fn tracked_user_with_hand_is_tracking() {
        let frame = SensorFrame::single(PresenceState::Tracking, joints_with_hand());
        assert_eq!(frame.presence(), PresenceState::Tracking);
    }

    #[test]
    fn first_user_with_hand_wins() {
        let frame = SensorFrame {
            users: vec![
                UserFrame {
                    state: PresenceState::Calibrating,
                    joints: Joints::default(),
                },
                UserFrame {
                    state: PresenceState::Tracking,
                    joints: joints_with_hand(),
                },
            ],
        };
        assert_eq!(frame.presence(), PresenceState::Tracking);
    }

    #[test]
    fn aggregate_scales_past_two_users() {
        let mut users = vec![
            UserFrame {
                state: PresenceState::Stopped,
                joints: Joints::default(),
            };
            5
        ];
        users.push(UserFrame {
            state: PresenceState::Tracking,
            joints: joints_with_hand(),
        });
        let frame = SensorFrame { users };
        assert_eq!(frame.presence(), PresenceState::Tracking);
    }

    #[test]
    fn active_joints_requires_tracking() {
        let frame = SensorFrame::single(PresenceState::Calibrating, joints_with_hand());
        assert!(frame.active_joints().is_none());

        let frame = SensorFrame::single(PresenceState::Tracking, joints_with_hand());
        assert!(frame.active_joints().is_some());
    }

    #[test]
    fn hands_iterator_skips_unresolved() {
        let joints = Joints {
            left_hand: Some(Joint::new(1.0, 2.0)),
            ..Joints::default()
        };
        assert_eq!(joints.hands().count(), 1);
        assert_eq!(Joints::default().hands().count(), 0);
    }

    #[test]
    fn presence_parses_from_str() {
        use std::str::FromStr;
        assert_eq!(
            PresenceState::from_str("Tracking").unwrap(),
            PresenceState::Tracking
        );
        assert!(PresenceState::from_str("Walking").is_err());
    }
}
