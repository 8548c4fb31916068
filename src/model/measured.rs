//! Measured component trees: the input to render-tree building.
//!
//! Layout itself is out of scope. A [`MeasuredNode`] is what a layout pass
//! hands over: bounds in root coordinates, the size constraints the node was
//! measured under, and the flags that decide which outputs it emits.

use super::geometry::Rect;
use super::output::TransitionKey;
use serde::{Deserialize, Serialize};

/// Measurement mode of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecMode {
    /// Any size is acceptable.
    #[default]
    Unspecified,
    /// At most `size`.
    AtMost,
    /// Exactly `size`.
    Exactly,
}

/// Size constraint for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SizeSpec {
    /// Constraint mode.
    pub mode: SpecMode,
    /// Constraint size; ignored for [`SpecMode::Unspecified`].
    #[serde(default)]
    pub size: i32,
}

impl SizeSpec {
    /// No constraint.
    pub const UNSPECIFIED: Self = Self {
        mode: SpecMode::Unspecified,
        size: 0,
    };

    /// Exactly `size`.
    pub const fn exactly(size: i32) -> Self {
        Self {
            mode: SpecMode::Exactly,
            size,
        }
    }

    /// At most `size`.
    pub const fn at_most(size: i32) -> Self {
        Self {
            mode: SpecMode::AtMost,
            size,
        }
    }
}

/// One component in a measured tree.
///
/// Deserializes from JSON with every field optional so fixtures stay short.
/// `children` are in declaration order; the builder reorders them by
/// `z_index` when flattening.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeasuredNode {
    /// Component type identifier; part of the global key when `key` is unset.
    pub type_id: u32,
    /// Human readable component name, used in dumps.
    pub name: String,
    /// Explicit key supplied by the author.
    pub key: Option<String>,
    /// Bounds in root coordinates.
    pub bounds: Rect,
    /// Width constraint the node was measured under.
    pub width_spec: SizeSpec,
    /// Height constraint the node was measured under.
    pub height_spec: SizeSpec,
    /// Digest of the component's props and state.
    pub props_digest: u64,
    /// Emit a host output that contains this node's descendants.
    pub wrap_in_view: bool,
    /// Drawing order among siblings. A non-zero value on any child forces
    /// the parent to become a host.
    pub z_index: i32,
    /// Emit a content output.
    pub has_content: bool,
    /// Emit a background output.
    pub background: bool,
    /// Emit a foreground output.
    pub foreground: bool,
    /// Emit a border output.
    pub border: bool,
    /// Opaque reference to whatever creates this node's mount content.
    pub content_allocator: Option<String>,
    /// Keep this node's outputs mounted regardless of the visible rectangle.
    pub exclude_from_incremental_mount: bool,
    /// Transition key, if any.
    pub transition_key: Option<TransitionKey>,
    /// Root of a nested tree with its own cached layout.
    pub nested_tree: bool,
    /// Names of working ranges this component registers for.
    pub working_ranges: Vec<String>,
    /// Child components.
    pub children: Vec<MeasuredNode>,
}

impl MeasuredNode {
    /// A layout-only node: no drawables, no content.
    pub fn new(type_id: u32, name: impl Into<String>, bounds: Rect) -> Self {
        Self {
            type_id,
            name: name.into(),
            bounds,
            ..Self::default()
        }
    }

    /// A node that mounts content created by an allocator named after it.
    pub fn content(type_id: u32, name: impl Into<String>, bounds: Rect) -> Self {
        let name = name.into();
        Self {
            type_id,
            content_allocator: Some(name.clone()),
            name,
            bounds,
            has_content: true,
            ..Self::default()
        }
    }

    /// Set the explicit key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append one child.
    pub fn with_child(mut self, child: MeasuredNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children.
    pub fn with_children(mut self, children: impl IntoIterator<Item = MeasuredNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Request a host output for this node.
    pub fn wrapped_in_view(mut self) -> Self {
        self.wrap_in_view = true;
        self
    }

    /// Keep this node mounted regardless of visibility.
    pub fn excluded_from_incremental_mount(mut self) -> Self {
        self.exclude_from_incremental_mount = true;
        self
    }

    /// Emit a background output.
    pub fn with_background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Emit a foreground output.
    pub fn with_foreground(mut self) -> Self {
        self.foreground = true;
        self
    }

    /// Emit a border output.
    pub fn with_border(mut self) -> Self {
        self.border = true;
        self
    }

    /// Set the drawing order among siblings.
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Set the props digest.
    pub fn with_props_digest(mut self, digest: u64) -> Self {
        self.props_digest = digest;
        self
    }

    /// Set the size constraints the node was measured under.
    pub fn with_size_specs(mut self, width: SizeSpec, height: SizeSpec) -> Self {
        self.width_spec = width;
        self.height_spec = height;
        self
    }

    /// Attach a transition key.
    pub fn with_transition(mut self, key: TransitionKey) -> Self {
        self.transition_key = Some(key);
        self
    }

    /// Mark as the root of a nested tree.
    pub fn as_nested_tree(mut self) -> Self {
        self.nested_tree = true;
        self
    }

    /// Register for a named working range.
    pub fn with_working_range(mut self, name: impl Into<String>) -> Self {
        self.working_ranges.push(name.into());
        self
    }

    /// Measured width, derived from the bounds.
    pub fn measured_width(&self) -> i32 {
        self.bounds.width()
    }

    /// Measured height, derived from the bounds.
    pub fn measured_height(&self) -> i32 {
        self.bounds.height()
    }

    /// True if any child carries a non-zero z-index.
    pub fn has_z_indexed_children(&self) -> bool {
        self.children.iter().any(|child| child.z_index != 0)
    }
}
