use std::error::Error;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tracking::{Joint, Joints, PresenceState, SensorFrame, UserFrame};

/// Per-tick supplier of sensor frames. Live acquisition lives behind this
/// trait in the host application; the crate ships the replay
/// implementation.
pub trait FrameSource {
    /// The next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Option<SensorFrame>;
}

/// One CSV row of a recorded session. Empty cells are joints the tracker
/// could not resolve on that frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReplayRow {
    offset_ms: u64,
    presence: String,
    head_x: Option<f32>,
    head_y: Option<f32>,
    neck_x: Option<f32>,
    neck_y: Option<f32>,
    left_shoulder_x: Option<f32>,
    left_shoulder_y: Option<f32>,
    right_shoulder_x: Option<f32>,
    right_shoulder_y: Option<f32>,
    left_elbow_x: Option<f32>,
    left_elbow_y: Option<f32>,
    right_elbow_x: Option<f32>,
    right_elbow_y: Option<f32>,
    left_hand_x: Option<f32>,
    left_hand_y: Option<f32>,
    right_hand_x: Option<f32>,
    right_hand_y: Option<f32>,
    left_hip_x: Option<f32>,
    left_hip_y: Option<f32>,
    right_hip_x: Option<f32>,
    right_hip_y: Option<f32>,
}

fn joint(x: Option<f32>, y: Option<f32>) -> Option<Joint> {
    match (x, y) {
        (Some(x), Some(y)) => Some(Joint::new(x, y)),
        _ => None,
    }
}

fn split(j: Option<Joint>) -> (Option<f32>, Option<f32>) {
    match j {
        Some(j) => (Some(j.x), Some(j.y)),
        None => (None, None),
    }
}

impl ReplayRow {
    fn from_frame(offset: Duration, user: &UserFrame) -> Self {
        let j = &user.joints;
        let (head_x, head_y) = split(j.head);
        let (neck_x, neck_y) = split(j.neck);
        let (left_shoulder_x, left_shoulder_y) = split(j.left_shoulder);
        let (right_shoulder_x, right_shoulder_y) = split(j.right_shoulder);
        let (left_elbow_x, left_elbow_y) = split(j.left_elbow);
        let (right_elbow_x, right_elbow_y) = split(j.right_elbow);
        let (left_hand_x, left_hand_y) = split(j.left_hand);
        let (right_hand_x, right_hand_y) = split(j.right_hand);
        let (left_hip_x, left_hip_y) = split(j.left_hip);
        let (right_hip_x, right_hip_y) = split(j.right_hip);

        Self {
            offset_ms: offset.as_millis() as u64,
            presence: user.state.to_string(),
            head_x,
            head_y,
            neck_x,
            neck_y,
            left_shoulder_x,
            left_shoulder_y,
            right_shoulder_x,
            right_shoulder_y,
            left_elbow_x,
            left_elbow_y,
            right_elbow_x,
            right_elbow_y,
            left_hand_x,
            left_hand_y,
            right_hand_x,
            right_hand_y,
            left_hip_x,
            left_hip_y,
            right_hip_x,
            right_hip_y,
        }
    }

    fn into_frame(self) -> Result<SensorFrame, Box<dyn Error>> {
        let state = PresenceState::from_str(&self.presence)?;

        let joints = Joints {
            head: joint(self.head_x, self.head_y),
            neck: joint(self.neck_x, self.neck_y),
            left_shoulder: joint(self.left_shoulder_x, self.left_shoulder_y),
            right_shoulder: joint(self.right_shoulder_x, self.right_shoulder_y),
            left_elbow: joint(self.left_elbow_x, self.left_elbow_y),
            right_elbow: joint(self.right_elbow_x, self.right_elbow_y),
            left_hand: joint(self.left_hand_x, self.left_hand_y),
            right_hand: joint(self.right_hand_x, self.right_hand_y),
            left_hip: joint(self.left_hip_x, self.left_hip_y),
            right_hip: joint(self.right_hip_x, self.right_hip_y),
        };

        Ok(SensorFrame::single(state, joints))
    }
}

/// Replays a recorded session frame by frame, standing in for the live
/// sensor the way the original player accepted a recording file as its
/// device.
#[derive(Debug)]
pub struct ReplayFrameSource {
    frames: Vec<SensorFrame>,
    cursor: usize,
}

impl ReplayFrameSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, Box<dyn Error>> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut frames = Vec::new();
        for row in csv_reader.deserialize::<ReplayRow>() {
            frames.push(row?.into_frame()?);
        }
        Ok(Self { frames, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.frames.len() - self.cursor
    }
}

impl FrameSource for ReplayFrameSource {
    fn next_frame(&mut self) -> Option<SensorFrame> {
        let frame = self.frames.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(frame)
    }
}

/// Appends frames of the live session to a CSV file while recording is
/// active. Driven by the `RecordStart`/`RecordStop` intents in the outer
/// loop.
#[derive(Default)]
pub struct FrameRecorder {
    writer: Option<csv::Writer<File>>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    /// Starts a new recording; a recording already in progress keeps
    /// running.
    pub fn start<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Box<dyn Error>> {
        if self.writer.is_none() {
            self.writer = Some(csv::Writer::from_path(path)?);
        }
        Ok(())
    }

    /// Writes the active user of `frame`, if any. Frames without users are
    /// recorded as a bare NotFound row so replay preserves user-lost gaps.
    pub fn record(&mut self, offset: Duration, frame: &SensorFrame) -> Result<(), Box<dyn Error>> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        let fallback = UserFrame {
            state: PresenceState::NotFound,
            joints: Joints::default(),
        };
        let user = frame
            .users
            .iter()
            .find(|u| u.joints.has_hand())
            .copied()
            .unwrap_or(fallback);

        writer.serialize(ReplayRow::from_frame(offset, &user))?;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
