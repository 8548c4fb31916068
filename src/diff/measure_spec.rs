//! Size-spec compatibility for measurement reuse.

use crate::model::{SizeSpec, SpecMode};

/// Whether a node measured at `old_measured` under `old` can keep that
/// measurement under `new`.
///
/// Compatible when:
/// - the specs are identical,
/// - both are unspecified,
/// - `new` is at-most and the old measurement fits, coming from either an
///   unspecified spec or a strictly larger at-most spec,
/// - `new` is exactly the old measurement.
///
/// # Examples
///
/// ```
/// # use incmount::diff::is_spec_compatible;
/// # use incmount::model::SizeSpec;
/// assert!(is_spec_compatible(SizeSpec::at_most(100), SizeSpec::at_most(80), 50));
/// assert!(!is_spec_compatible(SizeSpec::at_most(100), SizeSpec::at_most(40), 50));
/// assert!(is_spec_compatible(SizeSpec::at_most(100), SizeSpec::exactly(50), 50));
/// ```
pub fn is_spec_compatible(old: SizeSpec, new: SizeSpec, old_measured: i32) -> bool {
    if old == new {
        return true;
    }
    match (old.mode, new.mode) {
        (SpecMode::Unspecified, SpecMode::Unspecified) => true,
        (SpecMode::Unspecified, SpecMode::AtMost) => old_measured <= new.size,
        (SpecMode::AtMost, SpecMode::AtMost) => old.size > new.size && old_measured <= new.size,
        (_, SpecMode::Exactly) => new.size == old_measured,
        _ => false,
    }
}

/// Both axes of [`is_spec_compatible`].
pub fn has_compatible_size_specs(
    old_width: SizeSpec,
    old_height: SizeSpec,
    new_width: SizeSpec,
    new_height: SizeSpec,
    old_measured_width: i32,
    old_measured_height: i32,
) -> bool {
    is_spec_compatible(old_width, new_width, old_measured_width)
        && is_spec_compatible(old_height, new_height, old_measured_height)
}
