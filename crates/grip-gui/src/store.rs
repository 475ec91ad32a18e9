//! Prepared views over the loaded recording.
//!
//! Descriptors are rebuilt lazily: a parameter change only marks the
//! affected views dirty, and `prepare` rebuilds the single view the active
//! tab is about to show. A render failure degrades that view to
//! `Unavailable` without touching its siblings.

use grip_lib::frame::SensorFrame;
use grip_lib::record::{Side, TactileSite};
use grip_lib::render::{
    render_all_tactile_comparison, render_joint_states, render_tactile, render_wrist_pose,
    RenderDescriptor,
};

use crate::GuiTab;

#[derive(Default)]
struct DirtyFlags {
    wrist: bool,
    joints: bool,
    fingers: bool,
    palm: bool,
    compare: bool,
}

impl DirtyFlags {
    fn mark_all(&mut self) {
        self.wrist = true;
        self.joints = true;
        self.fingers = true;
        self.palm = true;
        self.compare = true;
    }
}

#[derive(Default)]
struct Snapshot {
    wrist: Option<RenderDescriptor>,
    joints: Option<RenderDescriptor>,
    fingers: Option<RenderDescriptor>,
    palm: Option<RenderDescriptor>,
    compare: Option<RenderDescriptor>,
}

pub struct ViewStore {
    recording: Option<SensorFrame>,
    side: Side,
    frame_index: Option<usize>,
    finger: TactileSite,
    snapshot: Snapshot,
    dirty: DirtyFlags,
}

impl Default for ViewStore {
    fn default() -> Self {
        ViewStore {
            recording: None,
            side: Side::Left,
            frame_index: None,
            finger: TactileSite::Finger0,
            snapshot: Snapshot::default(),
            dirty: DirtyFlags::default(),
        }
    }
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_recording(&mut self, frame: SensorFrame) {
        self.recording = Some(frame);
        self.dirty.mark_all();
    }

    pub fn clear(&mut self) {
        self.recording = None;
        self.snapshot = Snapshot::default();
        self.dirty.mark_all();
    }

    pub fn set_side(&mut self, side: Side) {
        if self.side != side {
            self.side = side;
            self.dirty.mark_all();
        }
    }

    pub fn set_frame_index(&mut self, frame_index: Option<usize>) {
        if self.frame_index != frame_index {
            self.frame_index = frame_index;
            self.dirty.mark_all();
        }
    }

    pub fn set_finger(&mut self, finger: TactileSite) {
        if self.finger != finger {
            self.finger = finger;
            self.dirty.fingers = true;
        }
    }

    pub fn finger(&self) -> TactileSite {
        self.finger
    }

    pub fn recording(&self) -> Option<&SensorFrame> {
        self.recording.as_ref()
    }

    pub fn descriptor(&self, tab: GuiTab) -> Option<&RenderDescriptor> {
        match tab {
            GuiTab::Wrist => self.snapshot.wrist.as_ref(),
            GuiTab::Joints => self.snapshot.joints.as_ref(),
            GuiTab::Fingers => self.snapshot.fingers.as_ref(),
            GuiTab::Palm => self.snapshot.palm.as_ref(),
            GuiTab::All => self.snapshot.compare.as_ref(),
        }
    }

    pub fn prepare(&mut self, tab: GuiTab) {
        match tab {
            GuiTab::Wrist => self.ensure_wrist(),
            GuiTab::Joints => self.ensure_joints(),
            GuiTab::Fingers => self.ensure_fingers(),
            GuiTab::Palm => self.ensure_palm(),
            GuiTab::All => self.ensure_compare(),
        }
    }

    fn ensure_wrist(&mut self) {
        if !self.dirty.wrist {
            return;
        }
        self.snapshot.wrist = self.recording.as_ref().map(|frame| {
            render_wrist_pose(frame, self.side, self.frame_index).unwrap_or_else(degraded)
        });
        self.dirty.wrist = false;
    }

    fn ensure_joints(&mut self) {
        if !self.dirty.joints {
            return;
        }
        self.snapshot.joints = self.recording.as_ref().map(|frame| {
            render_joint_states(frame, self.side, self.frame_index).unwrap_or_else(degraded)
        });
        self.dirty.joints = false;
    }

    fn ensure_fingers(&mut self) {
        if !self.dirty.fingers {
            return;
        }
        let site = self.finger;
        self.snapshot.fingers = self.recording.as_ref().map(|frame| {
            render_tactile(frame, self.side, site, self.frame_index).unwrap_or_else(degraded)
        });
        self.dirty.fingers = false;
    }

    fn ensure_palm(&mut self) {
        if !self.dirty.palm {
            return;
        }
        self.snapshot.palm = self.recording.as_ref().map(|frame| {
            render_tactile(frame, self.side, TactileSite::Palm, self.frame_index)
                .unwrap_or_else(degraded)
        });
        self.dirty.palm = false;
    }

    fn ensure_compare(&mut self) {
        if !self.dirty.compare {
            return;
        }
        self.snapshot.compare = self.recording.as_ref().map(|frame| {
            render_all_tactile_comparison(frame, self.side, self.frame_index)
                .unwrap_or_else(degraded)
        });
        self.dirty.compare = false;
    }
}

fn degraded(err: grip_lib::Error) -> RenderDescriptor {
    RenderDescriptor::Unavailable {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorFrame {
        let doc = br#"{
            "left_wrist_pose": [[0.0, 0.1, 0.2, 1.0, 0.0, 0.0, 0.0],
                                [0.3, 0.4, 0.5, 0.9, 0.1, 0.0, 0.0]],
            "left_joint_states": [[0.1, 0.2], [0.3, 0.4]],
            "left_finger_0_tactile": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            "left_finger_1_tactile": [[0.5, 0.6, 0.7], [0.8, 0.9, 1.0]],
            "left_finger_2_tactile": [[], []],
            "left_palm_tactile": [[1.0, 1.5], [2.0, 2.5]]
        }"#;
        SensorFrame::from_slice(doc).unwrap()
    }

    #[test]
    fn prepare_builds_only_the_requested_tab() {
        let mut store = ViewStore::new();
        store.set_recording(sample());
        store.prepare(GuiTab::Wrist);
        assert!(store.descriptor(GuiTab::Wrist).is_some());
        assert!(store.descriptor(GuiTab::Joints).is_none());
    }

    #[test]
    fn frame_index_change_switches_wrist_to_metrics() {
        let mut store = ViewStore::new();
        store.set_recording(sample());
        store.prepare(GuiTab::Wrist);
        assert!(matches!(
            store.descriptor(GuiTab::Wrist),
            Some(RenderDescriptor::TimeSeriesLines { .. })
        ));
        store.set_frame_index(Some(1));
        store.prepare(GuiTab::Wrist);
        assert!(matches!(
            store.descriptor(GuiTab::Wrist),
            Some(RenderDescriptor::FrameMetrics { .. })
        ));
    }

    #[test]
    fn finger_change_rebuilds_the_fingers_view_only() {
        let mut store = ViewStore::new();
        store.set_recording(sample());
        store.prepare(GuiTab::Fingers);
        let before = store.descriptor(GuiTab::Fingers).unwrap().title().unwrap();
        assert!(before.contains("Finger 0"));

        store.set_finger(TactileSite::Finger1);
        store.prepare(GuiTab::Fingers);
        let after = store.descriptor(GuiTab::Fingers).unwrap().title().unwrap();
        assert!(after.contains("Finger 1"));
    }

    #[test]
    fn absent_side_degrades_to_unavailable() {
        let mut store = ViewStore::new();
        store.set_recording(sample());
        store.set_side(Side::Right);
        store.prepare(GuiTab::Wrist);
        assert!(matches!(
            store.descriptor(GuiTab::Wrist),
            Some(RenderDescriptor::Unavailable { .. })
        ));
    }

    #[test]
    fn empty_tactile_site_is_reported_unavailable() {
        let mut store = ViewStore::new();
        store.set_recording(sample());
        store.set_finger(TactileSite::Finger2);
        store.prepare(GuiTab::Fingers);
        assert!(matches!(
            store.descriptor(GuiTab::Fingers),
            Some(RenderDescriptor::Unavailable { .. })
        ));
    }

    #[test]
    fn clear_drops_prepared_views() {
        let mut store = ViewStore::new();
        store.set_recording(sample());
        store.prepare(GuiTab::Wrist);
        store.clear();
        assert!(store.descriptor(GuiTab::Wrist).is_none());
        assert!(store.recording().is_none());
    }
}
