//! Output identifiers, output kinds and transition identifiers.
//!
//! An [`OutputId`] is a 64-bit value that packs three fields:
//!
//! | bits   | field                                      |
//! |--------|--------------------------------------------|
//! | 0-31   | sequence, unique per (global key, kind)    |
//! | 32-39  | [`OutputKind`] tag                         |
//! | 40-47  | nesting level of the owning component      |
//!
//! The value `0` is reserved for the root host ([`OutputId::ROOT_HOST`]).

use serde::{Deserialize, Serialize};
use std::fmt;

const SEQUENCE_MASK: u64 = 0xFFFF_FFFF;
const KIND_SHIFT: u32 = 32;
const KIND_MASK: u64 = 0xFF;
const LEVEL_SHIFT: u32 = 40;
const LEVEL_MASK: u64 = 0xFF;

/// Stable 64-bit identity of one render output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OutputId(u64);

impl OutputId {
    /// Identity of the root host. Always present, always mounted while the
    /// tree is attached.
    pub const ROOT_HOST: Self = Self(0);

    /// Pack a sequence, kind and level into an id.
    pub fn compose(sequence: u32, kind: OutputKind, level: u8) -> Self {
        Self(
            u64::from(sequence)
                | (u64::from(kind.tag()) << KIND_SHIFT)
                | (u64::from(level) << LEVEL_SHIFT),
        )
    }

    /// Wrap a raw value, e.g. one produced by an external nested tree.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The packed value.
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Low 32 bits.
    pub fn sequence(&self) -> u32 {
        (self.0 & SEQUENCE_MASK) as u32
    }

    /// Kind encoded in bits 32-39. The root host decodes as [`OutputKind::Host`].
    /// Returns `None` for ids carrying an unknown tag.
    pub fn kind(&self) -> Option<OutputKind> {
        if self.is_root_host() {
            return Some(OutputKind::Host);
        }
        OutputKind::from_tag(((self.0 >> KIND_SHIFT) & KIND_MASK) as u8)
    }

    /// Nesting level encoded in bits 40-47.
    pub fn level(&self) -> u8 {
        ((self.0 >> LEVEL_SHIFT) & LEVEL_MASK) as u8
    }

    /// True for [`OutputId::ROOT_HOST`].
    pub const fn is_root_host(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Role of an output within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// The component's own mountable content.
    Content,
    /// Drawable behind the content.
    Background,
    /// Drawable above the content.
    Foreground,
    /// Border drawn around the component.
    Border,
    /// Container that hosts descendant outputs.
    Host,
}

impl OutputKind {
    /// All kinds in tag order.
    pub const ALL: [Self; 5] = [
        Self::Content,
        Self::Background,
        Self::Foreground,
        Self::Border,
        Self::Host,
    ];

    /// Tag stored in bits 32-39 of an [`OutputId`].
    pub const fn tag(self) -> u8 {
        match self {
            Self::Content => 1,
            Self::Background => 2,
            Self::Foreground => 3,
            Self::Border => 4,
            Self::Host => 5,
        }
    }

    /// Inverse of [`OutputKind::tag`].
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Content),
            2 => Some(Self::Background),
            3 => Some(Self::Foreground),
            4 => Some(Self::Border),
            5 => Some(Self::Host),
            _ => None,
        }
    }

    /// Hosts contain other outputs.
    pub const fn is_host(self) -> bool {
        matches!(self, Self::Host)
    }

    /// Lowercase name used in dumps and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Background => "background",
            Self::Foreground => "foreground",
            Self::Border => "border",
            Self::Host => "host",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a transition key was declared on a measured node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum TransitionKey {
    /// Key that is unique across the whole tree.
    Global {
        /// The declared key.
        key: String,
    },
    /// Key that is unique only among the outputs of the same owner.
    Scoped {
        /// The declared key.
        key: String,
    },
    /// No declared key; the component's global key is used.
    Automatic,
}

/// Kind part of a [`TransitionId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Unique across the tree.
    Global,
    /// Unique under the owner with this global key.
    Scoped(String),
    /// Derived from a component's global key.
    Automatic,
}

/// Identity used to group outputs that animate together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId {
    /// Declaration kind.
    pub kind: TransitionKind,
    /// Declared key, or the component's global key for automatic ids.
    pub key: String,
}

impl TransitionId {
    /// Tree-wide transition id.
    pub fn global(key: impl Into<String>) -> Self {
        Self {
            kind: TransitionKind::Global,
            key: key.into(),
        }
    }

    /// Transition id scoped to `owner`.
    pub fn scoped(key: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            kind: TransitionKind::Scoped(owner.into()),
            key: key.into(),
        }
    }

    /// Transition id derived from a component's global key.
    pub fn automatic(global_key: impl Into<String>) -> Self {
        Self {
            kind: TransitionKind::Automatic,
            key: global_key.into(),
        }
    }

    /// Same kind with `suffix` appended to the key.
    pub fn with_key_suffix(&self, suffix: &str) -> Self {
        Self {
            kind: self.kind.clone(),
            key: format!("{}{}", self.key, suffix),
        }
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::Global => write!(f, "global:{}", self.key),
            TransitionKind::Scoped(owner) => write!(f, "scoped:{}/{}", owner, self.key),
            TransitionKind::Automatic => write!(f, "auto:{}", self.key),
        }
    }
}
