//! Mount operations, update results and host-ordering enforcement.

use crate::model::{CoreError, OutputId, Rect};
use crate::render_tree::{RenderOutput, RenderTree};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// What to do when a host would be unmounted before its descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvariantPolicy {
    /// Refuse the update with [`CoreError::MountOrderingViolation`].
    Fail,
    /// Unmount the stragglers first and log a warning.
    #[default]
    Heal,
}

impl InvariantPolicy {
    /// `Fail` when strict, `Heal` otherwise.
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Fail
        } else {
            Self::Heal
        }
    }
}

/// Engine behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountOptions {
    /// Mount only what intersects the visible rectangle. When false every
    /// update behaves like `mount_all`.
    pub incremental: bool,
    /// Host-ordering enforcement.
    pub policy: InvariantPolicy,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            incremental: true,
            policy: InvariantPolicy::from_strict(cfg!(debug_assertions)),
        }
    }
}

/// Ids to mount and unmount after one update.
///
/// `to_mount` is in mount order (hosts first); `to_unmount` is in reverse
/// mount order (descendants first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountDelta {
    /// Outputs to mount, hosts before their descendants.
    pub to_mount: Vec<OutputId>,
    /// Outputs to unmount, descendants before their hosts.
    pub to_unmount: Vec<OutputId>,
}

impl MountDelta {
    /// True if nothing changes.
    pub fn is_empty(&self) -> bool {
        self.to_mount.is_empty() && self.to_unmount.is_empty()
    }

    /// Platform operations: all unmounts, then all mounts.
    pub fn ops(&self, tree: &RenderTree) -> Vec<MountOp> {
        let unmounts = self
            .to_unmount
            .iter()
            .filter_map(|&id| tree.get(id))
            .map(MountOp::unmount);
        let mounts = self
            .to_mount
            .iter()
            .filter_map(|&id| tree.get(id))
            .map(MountOp::mount);
        unmounts.chain(mounts).collect()
    }
}

/// One instruction for the platform mount layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MountOp {
    /// Create (or acquire) content and attach it to `host`.
    Mount {
        /// Output id.
        id: OutputId,
        /// Host to attach to; `None` for the root host.
        host: Option<OutputId>,
        /// Allocator that creates the content.
        allocator: Option<String>,
        /// Bounds in root coordinates.
        bounds: Rect,
    },
    /// Detach content from `host` and release it.
    Unmount {
        /// Output id.
        id: OutputId,
        /// Host it is attached to.
        host: Option<OutputId>,
    },
    /// Keep mounted content but apply new bounds or rebind it.
    Update {
        /// Output id.
        id: OutputId,
        /// New bounds.
        bounds: Rect,
        /// Content must be rebound to new props.
        rebind: bool,
    },
}

impl MountOp {
    /// Mount instruction for `output`.
    pub fn mount(output: &RenderOutput) -> Self {
        Self::Mount {
            id: output.id,
            host: output.host_id,
            allocator: output.allocator.clone(),
            bounds: output.bounds,
        }
    }

    /// Unmount instruction for `output`.
    pub fn unmount(output: &RenderOutput) -> Self {
        Self::Unmount {
            id: output.id,
            host: output.host_id,
        }
    }

    /// Output the instruction applies to.
    pub fn id(&self) -> OutputId {
        match self {
            Self::Mount { id, .. } | Self::Unmount { id, .. } | Self::Update { id, .. } => *id,
        }
    }
}

impl fmt::Display for MountOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = |host: &Option<OutputId>| host.map_or_else(|| "-".to_string(), |h| h.to_string());
        match self {
            Self::Mount {
                id,
                host: parent,
                allocator,
                bounds,
            } => write!(
                f,
                "mount   {id} host={} {bounds} {}",
                host(parent),
                allocator.as_deref().unwrap_or("-")
            ),
            Self::Unmount { id, host: parent } => write!(f, "unmount {id} host={}", host(parent)),
            Self::Update { id, bounds, rebind } => {
                write!(f, "update  {id} {bounds}")?;
                if *rebind {
                    f.write_str(" rebind")?;
                }
                Ok(())
            }
        }
    }
}

/// Make sure no host in `unmount` (reverse mount order) is torn down while
/// one of its descendants stays mounted.
///
/// Under [`InvariantPolicy::Heal`] stragglers are inserted right before
/// their host; under [`InvariantPolicy::Fail`] the first straggler aborts.
pub fn enforce_host_ordering(
    tree: &RenderTree,
    is_mounted: impl Fn(usize) -> bool,
    unmount: &mut Vec<usize>,
    policy: InvariantPolicy,
) -> Result<(), CoreError> {
    let mut scheduled: HashSet<usize> = HashSet::with_capacity(unmount.len());
    let mut ordered = Vec::with_capacity(unmount.len());

    for &index in unmount.iter() {
        if tree.output(index).kind.is_host() {
            for descendant in tree.descendants(index).rev() {
                if !is_mounted(descendant) || scheduled.contains(&descendant) {
                    continue;
                }
                let host = tree.output(index).id;
                let straggler = tree.output(descendant).id;
                match policy {
                    InvariantPolicy::Fail => {
                        return Err(CoreError::MountOrderingViolation { host, straggler });
                    }
                    InvariantPolicy::Heal => {
                        warn!(%host, %straggler, "unmounting straggler before its host");
                        scheduled.insert(descendant);
                        ordered.push(descendant);
                    }
                }
            }
        }
        if scheduled.insert(index) {
            ordered.push(index);
        }
    }

    *unmount = ordered;
    Ok(())
}
