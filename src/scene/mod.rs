//! Scene fixtures: a measured tree plus a script of viewport changes.
//!
//! A scene is a JSON document:
//!
//! ```json
//! {
//!   "root": { "type_id": 1, "name": "List", "bounds": { ... }, "children": [ ... ] },
//!   "ranges": { "prefetch": { "before": 1, "after": 2 } },
//!   "steps": [
//!     { "step": "rect", "left": 0, "top": 0, "right": 100, "bottom": 50 },
//!     { "step": "position", "position": 4, "first_visible": 0, "last_visible": 3,
//!       "first_fully_visible": 0, "last_fully_visible": 2 },
//!     { "step": "layout", "root": { ... } },
//!     { "step": "unmount_all" }
//!   ]
//! }
//! ```
//!
//! [`replay`] lays the root out, attaches it to a [`MountCoordinator`] and
//! runs every step, collecting the mount operations and range events each
//! one produced.

use crate::model::{CoreError, MeasuredNode, Rect};
use crate::mount::{MountCoordinator, MountOp, MountOptions};
use crate::publish::{LayoutSession, TreePublisher};
use crate::render_tree::RenderTree;
use crate::working_range::{
    PrefetchRange, RangeEvent, RangePosition, WorkingRange, WorkingRangeContainer,
    WorkingRangeTracker,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Failures loading a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The scene file could not be read.
    #[error("Failed to read scene at {path:?}: {source}")]
    Read {
        /// Scene path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scene is not valid JSON or does not match the format.
    #[error("Invalid scene: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One scripted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SceneStep {
    /// Move the visible rectangle.
    Rect(Rect),
    /// Mount everything.
    MountAll,
    /// Unmount everything.
    UnmountAll,
    /// Lay out a new measured tree and swap it in.
    Layout {
        /// New measured root.
        root: MeasuredNode,
    },
    /// Report a list position to the working ranges.
    Position(RangePosition),
}

/// A measured tree and the steps to replay against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    /// Initial measured root.
    pub root: MeasuredNode,
    /// Working ranges components may register by name.
    #[serde(default)]
    pub ranges: BTreeMap<String, PrefetchRange>,
    /// Steps in order.
    #[serde(default)]
    pub steps: Vec<SceneStep>,
}

impl Scene {
    /// Parse a scene from JSON.
    ///
    /// # Errors
    ///
    /// [`SceneError::Parse`] for malformed input.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Read and parse a scene file.
///
/// # Errors
///
/// [`SceneError::Read`] if the file cannot be read, [`SceneError::Parse`]
/// if it is malformed.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    let json = std::fs::read_to_string(path).map_err(|source| SceneError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Scene::from_json(&json)
}

/// What one step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step that ran; `None` for attaching the initial tree.
    pub step: Option<SceneStep>,
    /// Mount operations in emission order.
    pub ops: Vec<MountOp>,
    /// Working range events.
    pub events: Vec<RangeEvent>,
}

/// Result of replaying a scene.
#[derive(Debug, Clone)]
pub struct Replay {
    /// Tree attached at the end of the replay.
    pub tree: Arc<RenderTree>,
    /// Reports: the initial attach, then one per step.
    pub steps: Vec<StepReport>,
    /// Exit events dispatched when the replay tore its ranges down.
    pub teardown: Vec<RangeEvent>,
}

impl Replay {
    /// Every operation of the replay in order.
    pub fn ops(&self) -> impl Iterator<Item = &MountOp> {
        self.steps.iter().flat_map(|report| report.ops.iter())
    }
}

struct Player {
    session: LayoutSession,
    coordinator: MountCoordinator,
    tracker: WorkingRangeTracker,
    ranges: HashMap<String, Arc<dyn WorkingRange>>,
}

impl Player {
    fn attach(&mut self, root: &MeasuredNode) -> Result<StepReport, CoreError> {
        let commit = self.session.layout(Some(root))?;
        let ops = self.coordinator.set_tree(Arc::clone(&commit.tree))?;
        let container = WorkingRangeContainer::from_registrations(
            commit.tree.range_registrations(),
            |name| self.ranges.get(name).cloned(),
        );
        let events = self.tracker.set_container(container)?;
        Ok(StepReport {
            step: None,
            ops,
            events,
        })
    }

    fn run(&mut self, step: &SceneStep) -> Result<StepReport, CoreError> {
        let mut report = match step {
            SceneStep::Rect(rect) => ops_only(self.coordinator.update_visible_rect(*rect)?),
            SceneStep::MountAll => ops_only(self.coordinator.mount_all()?),
            SceneStep::UnmountAll => ops_only(self.coordinator.unmount_all()?),
            SceneStep::Layout { root } => self.attach(root)?,
            SceneStep::Position(position) => StepReport {
                step: None,
                ops: Vec::new(),
                events: self.tracker.check(position)?,
            },
        };
        report.step = Some(step.clone());
        Ok(report)
    }
}

fn ops_only(ops: Vec<MountOp>) -> StepReport {
    StepReport {
        step: None,
        ops,
        events: Vec::new(),
    }
}

/// Replay `scene` with the given mount options.
///
/// # Errors
///
/// Propagates [`CoreError`] from layout, mounting or working ranges.
pub fn replay(scene: &Scene, options: MountOptions) -> Result<Replay, CoreError> {
    let ranges = scene
        .ranges
        .iter()
        .map(|(name, range)| (name.clone(), Arc::new(*range) as Arc<dyn WorkingRange>))
        .collect();
    let mut player = Player {
        session: LayoutSession::new(Arc::new(TreePublisher::new())),
        coordinator: MountCoordinator::new(options),
        tracker: WorkingRangeTracker::new(),
        ranges,
    };

    let mut steps = vec![player.attach(&scene.root)?];
    for step in &scene.steps {
        steps.push(player.run(step)?);
    }
    let teardown = player.tracker.teardown()?;

    let tree = player
        .coordinator
        .tree()
        .cloned()
        .ok_or(CoreError::InvalidRootState)?;
    info!(
        steps = scene.steps.len(),
        ops = steps.iter().map(|report| report.ops.len()).sum::<usize>(),
        outputs = tree.len(),
        "replayed scene"
    );
    Ok(Replay {
        tree,
        steps,
        teardown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"{
        "root": {
            "type_id": 1, "name": "Stack",
            "bounds": { "left": 0, "top": 0, "right": 10, "bottom": 30 },
            "children": [
                { "type_id": 2, "key": "one", "name": "Item", "has_content": true,
                  "content_allocator": "Item", "working_ranges": ["prefetch"],
                  "bounds": { "left": 0, "top": 0, "right": 10, "bottom": 10 } },
                { "type_id": 2, "key": "two", "name": "Item", "has_content": true,
                  "content_allocator": "Item",
                  "bounds": { "left": 0, "top": 10, "right": 10, "bottom": 20 } },
                { "type_id": 2, "key": "three", "name": "Item", "has_content": true,
                  "content_allocator": "Item",
                  "bounds": { "left": 0, "top": 20, "right": 10, "bottom": 30 } }
            ]
        },
        "ranges": { "prefetch": { "after": 1 } },
        "steps": [
            { "step": "rect", "left": 0, "top": 10, "right": 10, "bottom": 20 },
            { "step": "rect", "left": 0, "top": 0, "right": 10, "bottom": 0 },
            { "step": "position", "position": 0, "first_visible": 0, "last_visible": 1,
              "first_fully_visible": 0, "last_fully_visible": 1 }
        ]
    }"#;

    fn mounted(report: &StepReport) -> Vec<String> {
        report
            .ops
            .iter()
            .filter(|op| matches!(op, MountOp::Mount { .. }))
            .map(|op| op.id().to_string())
            .collect()
    }

    #[test]
    fn parses_steps() {
        let scene = Scene::from_json(STACK).expect("valid scene");
        assert_eq!(scene.steps.len(), 3);
        assert_eq!(scene.steps[0], SceneStep::Rect(Rect::new(0, 10, 10, 20)));
        assert_eq!(scene.ranges["prefetch"], PrefetchRange::new(0, 1));
    }

    #[test]
    fn replays_stack_scenario() {
        let scene = Scene::from_json(STACK).expect("valid scene");
        let replay = replay(&scene, MountOptions::default()).expect("replay succeeds");

        assert!(replay.steps[0].ops.is_empty(), "no rect yet, nothing mounted");
        let second = replay.tree.output(2).id.to_string();
        assert_eq!(
            mounted(&replay.steps[1]),
            vec![replay.tree.output(0).id.to_string(), second],
            "only the root host and the middle item mount"
        );

        let unmounts = replay.steps[2]
            .ops
            .iter()
            .filter(|op| matches!(op, MountOp::Unmount { .. }))
            .count();
        assert_eq!(unmounts, 1, "the empty rect unmounts the middle item");

        assert_eq!(replay.steps[3].events.len(), 1);
        assert_eq!(replay.teardown.len(), 1, "entered range is exited on teardown");
    }

    #[test]
    fn mount_all_survives_a_layout_step() {
        let json = r#"{
            "root": { "type_id": 1, "name": "List",
                      "bounds": { "left": 0, "top": 0, "right": 10, "bottom": 10 },
                      "children": [
                { "type_id": 2, "key": "a", "name": "Row", "has_content": true,
                  "bounds": { "left": 0, "top": 0, "right": 10, "bottom": 10 } } ] },
            "steps": [
                { "step": "mount_all" },
                { "step": "layout", "root": { "type_id": 1, "name": "List",
                    "bounds": { "left": 0, "top": 0, "right": 10, "bottom": 20 },
                    "children": [
                    { "type_id": 2, "key": "a", "name": "Row", "has_content": true,
                      "bounds": { "left": 0, "top": 0, "right": 10, "bottom": 10 } },
                    { "type_id": 2, "key": "b", "name": "Row", "has_content": true,
                      "bounds": { "left": 0, "top": 10, "right": 10, "bottom": 20 } } ] } }
            ]
        }"#;
        let scene = Scene::from_json(json).expect("valid scene");
        let replay = replay(&scene, MountOptions::default()).expect("replay succeeds");

        assert_eq!(mounted(&replay.steps[1]).len(), 2, "root host and row a");
        assert_eq!(
            mounted(&replay.steps[2]),
            vec![replay.tree.output(2).id.to_string()],
            "row b mounts under the standing mount-all"
        );
    }

    #[test]
    fn full_range_root_replays() {
        let json = r#"{
            "root": {
                "type_id": 1, "name": "Root",
                "bounds": { "left": -2147483648, "top": -2147483648,
                            "right": 2147483647, "bottom": 2147483647 },
                "children": [
                    { "type_id": 2, "key": "item", "name": "Item", "has_content": true,
                      "content_allocator": "Item",
                      "bounds": { "left": -2147483648, "top": 0, "right": 2147483647, "bottom": 10 } }
                ]
            },
            "steps": [
                { "step": "rect", "left": -2147483648, "top": -2147483648,
                  "right": 2147483647, "bottom": 2147483647 }
            ]
        }"#;
        let scene = Scene::from_json(json).expect("valid scene");
        let replay = replay(&scene, MountOptions::default()).expect("replay succeeds");

        assert_eq!(replay.tree.width(), i32::MAX);
        assert_eq!(mounted(&replay.steps[1]).len(), 2);
    }

    #[test]
    fn unknown_step_is_rejected() {
        let json = r#"{ "root": { "type_id": 1 }, "steps": [ { "step": "zoom" } ] }"#;
        assert!(matches!(Scene::from_json(json), Err(SceneError::Parse(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = load_scene(Path::new("/nonexistent/scene.json"));
        assert!(matches!(result, Err(SceneError::Read { .. })));
    }
}
