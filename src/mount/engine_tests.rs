//! Tests for the incremental mount engine.

use super::*;
use crate::identity::IdGenerator;
use crate::model::MeasuredNode;
use crate::mount::InvariantPolicy;
use crate::render_tree::build_render_tree;

const STRICT: MountOptions = MountOptions {
    incremental: true,
    policy: InvariantPolicy::Fail,
};

fn rect(left: i32, top: i32, right: i32, bottom: i32) -> Rect {
    Rect::new(left, top, right, bottom)
}

fn engine_for(root: MeasuredNode) -> IncrementalMountEngine {
    let tree = build_render_tree(&Arc::new(IdGenerator::new()), Some(&root), None)
        .expect("root is present");
    IncrementalMountEngine::new(Arc::new(tree), STRICT)
}

fn ids(engine: &IncrementalMountEngine, indices: &[usize]) -> Vec<OutputId> {
    indices
        .iter()
        .map(|&index| engine.tree().output(index).id)
        .collect()
}

fn mounted_indices(engine: &IncrementalMountEngine) -> Vec<usize> {
    (0..engine.tree().len())
        .filter(|&index| engine.output(index).is_mounted)
        .collect()
}

/// Root at index 0 and `count` 10x10 items stacked from y = 0.
fn stack(count: i32) -> MeasuredNode {
    MeasuredNode::new(1, "Column", rect(0, 0, 10, count * 10)).with_children(
        (0..count).map(|i| MeasuredNode::content(2, "Item", rect(0, i * 10, 10, i * 10 + 10))),
    )
}

mod stacked_items {
    use super::*;

    #[test]
    fn only_the_middle_item_mounts() {
        let mut engine = engine_for(stack(3));
        let delta = engine
            .update_visible_rect(rect(0, 10, 10, 20))
            .expect("update succeeds");
        assert_eq!(delta.to_mount, ids(&engine, &[0, 2]));
        assert!(delta.to_unmount.is_empty());
    }

    #[test]
    fn empty_rect_unmounts_every_item() {
        let mut engine = engine_for(stack(3));
        engine.mount_all().expect("mount all");

        let delta = engine
            .update_visible_rect(rect(0, 0, 10, 0))
            .expect("update succeeds");
        assert_eq!(delta.to_unmount, ids(&engine, &[3, 2, 1]));
        assert_eq!(mounted_indices(&engine), vec![0], "only the root host stays");

        let delta = engine
            .update_visible_rect(rect(0, 0, 0, 0))
            .expect("update succeeds");
        assert!(delta.is_empty());
    }

    #[test]
    fn scrolling_down_and_back_swaps_one_item_each_way() {
        let mut engine = engine_for(stack(3));
        engine.update_visible_rect(rect(0, 0, 10, 10)).expect("first update");
        assert_eq!(mounted_indices(&engine), vec![0, 1]);

        let down = engine.update_visible_rect(rect(0, 10, 10, 20)).expect("scroll down");
        assert_eq!(down.to_mount, ids(&engine, &[2]));
        assert_eq!(down.to_unmount, ids(&engine, &[1]));

        let up = engine.update_visible_rect(rect(0, 0, 10, 10)).expect("scroll up");
        assert_eq!(up.to_mount, ids(&engine, &[1]));
        assert_eq!(up.to_unmount, ids(&engine, &[2]));
        assert_eq!(mounted_indices(&engine), vec![0, 1]);
    }

    #[test]
    fn partial_overlap_mounts_both_neighbours() {
        let mut engine = engine_for(stack(3));
        engine.update_visible_rect(rect(0, 5, 10, 15)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1, 2]);
    }

    #[test]
    fn jump_past_everything_unmounts_all_items() {
        let mut engine = engine_for(stack(3));
        engine.update_visible_rect(rect(0, 0, 10, 30)).expect("update");
        let delta = engine.update_visible_rect(rect(0, 100, 10, 130)).expect("jump");
        assert_eq!(delta.to_unmount, ids(&engine, &[3, 2, 1]));
        assert!(delta.to_mount.is_empty());
    }
}

mod zero_size {
    use super::*;

    fn with_flat_item() -> MeasuredNode {
        MeasuredNode::new(1, "Column", rect(0, 0, 10, 30))
            .with_child(MeasuredNode::content(2, "Divider", rect(0, 10, 10, 10)))
    }

    #[test]
    fn zero_height_item_inside_rect_is_mounted() {
        let mut engine = engine_for(with_flat_item());
        engine.update_visible_rect(rect(0, 0, 10, 30)).expect("update");
        assert!(engine.output(1).is_mounted);
    }

    #[test]
    fn zero_height_item_on_rect_edge_is_not_mounted() {
        let mut engine = engine_for(with_flat_item());
        engine.update_visible_rect(rect(0, 0, 10, 10)).expect("update");
        assert!(!engine.output(1).is_mounted);
        engine.update_visible_rect(rect(0, 10, 10, 20)).expect("update");
        assert!(!engine.output(1).is_mounted);
    }

    #[test]
    fn zero_height_item_unmounts_when_rect_becomes_empty() {
        let mut engine = engine_for(with_flat_item());
        engine.update_visible_rect(rect(0, 0, 10, 30)).expect("update");
        let delta = engine.update_visible_rect(rect(0, 10, 10, 10)).expect("update");
        assert_eq!(delta.to_unmount, ids(&engine, &[1]));
    }
}

mod hosts {
    use super::*;

    /// [0] root, [1] padded host at 0..50, [2] child at 20..30 on both axes.
    fn padded() -> MeasuredNode {
        MeasuredNode::new(1, "Root", rect(0, 0, 50, 100)).with_child(
            MeasuredNode::new(2, "Padded", rect(0, 0, 50, 50))
                .wrapped_in_view()
                .with_child(MeasuredNode::content(3, "Child", rect(20, 20, 30, 30))),
        )
    }

    #[test]
    fn child_follows_its_own_bounds_inside_visible_host() {
        let mut engine = engine_for(padded());
        engine.update_visible_rect(rect(0, 0, 50, 20)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1]);

        engine.update_visible_rect(rect(0, 0, 50, 40)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1, 2]);
    }

    #[test]
    fn horizontal_move_is_checked() {
        let mut engine = engine_for(padded());
        engine.update_visible_rect(rect(0, 0, 50, 40)).expect("update");
        let delta = engine.update_visible_rect(rect(30, 0, 50, 40)).expect("update");
        assert_eq!(delta.to_unmount, ids(&engine, &[2]));
        assert!(engine.output(1).is_mounted, "host still overlaps");
    }

    #[test]
    fn invisible_host_unmounts_children_first() {
        let mut engine = engine_for(padded());
        engine.update_visible_rect(rect(0, 0, 50, 40)).expect("update");
        let delta = engine.update_visible_rect(rect(0, 60, 50, 100)).expect("update");
        assert_eq!(delta.to_unmount, ids(&engine, &[2, 1]));
    }

    /// [0] root, [1] host at 0..10, [2] child overflowing it at 20..30.
    fn overflowing() -> MeasuredNode {
        MeasuredNode::new(1, "Root", rect(0, 0, 10, 100)).with_child(
            MeasuredNode::new(2, "Clip", rect(0, 0, 10, 10))
                .wrapped_in_view()
                .with_child(MeasuredNode::content(3, "Overflow", rect(0, 20, 10, 30))),
        )
    }

    #[test]
    fn visible_child_of_invisible_host_stays_unmounted() {
        let mut engine = engine_for(overflowing());
        engine.update_visible_rect(rect(0, 20, 10, 30)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0]);
    }

    #[test]
    fn host_flip_drags_its_subtree_along() {
        let mut engine = engine_for(overflowing());
        engine.update_visible_rect(rect(0, 5, 10, 25)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1, 2]);

        // Only the host crosses a cursor; the child's own visibility is unchanged.
        let delta = engine.update_visible_rect(rect(0, 15, 10, 30)).expect("scroll");
        assert_eq!(delta.to_unmount, ids(&engine, &[2, 1]));

        let delta = engine.update_visible_rect(rect(0, 5, 10, 25)).expect("scroll back");
        assert_eq!(delta.to_mount, ids(&engine, &[1, 2]), "host before child");
    }
}

mod exclusion {
    use super::*;

    fn with_pinned() -> MeasuredNode {
        MeasuredNode::new(1, "Root", rect(0, 0, 10, 200)).with_children([
            MeasuredNode::content(2, "Item", rect(0, 0, 10, 10)),
            MeasuredNode::content(3, "Pinned", rect(0, 100, 10, 110))
                .excluded_from_incremental_mount(),
        ])
    }

    #[test]
    fn excluded_item_mounts_while_out_of_view() {
        let mut engine = engine_for(with_pinned());
        engine.update_visible_rect(rect(0, 0, 10, 10)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1, 2]);
    }

    #[test]
    fn excluded_item_is_never_unmounted_by_scrolling() {
        let mut engine = engine_for(with_pinned());
        engine.update_visible_rect(rect(0, 100, 10, 110)).expect("update");
        for top in [0, 50, 150, 190] {
            let delta = engine.update_visible_rect(rect(0, top, 10, top + 10)).expect("scroll");
            assert!(
                !delta.to_unmount.contains(&engine.tree().output(2).id),
                "pinned item unmounted at top={top}"
            );
        }
        let delta = engine.update_visible_rect(rect(0, 0, 10, 0)).expect("empty rect");
        assert!(delta.to_unmount.is_empty(), "empty rect leaves excluded outputs alone");
    }

    #[test]
    fn excluded_item_follows_its_host() {
        let root = MeasuredNode::new(1, "Root", rect(0, 0, 10, 200)).with_child(
            MeasuredNode::new(2, "Card", rect(0, 0, 10, 10))
                .wrapped_in_view()
                .with_child(
                    MeasuredNode::content(3, "Pinned", rect(0, 0, 10, 10))
                        .excluded_from_incremental_mount(),
                ),
        );
        let mut engine = engine_for(root);
        engine.update_visible_rect(rect(0, 0, 10, 10)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1, 2]);

        let delta = engine.update_visible_rect(rect(0, 50, 10, 60)).expect("scroll");
        assert_eq!(delta.to_unmount, ids(&engine, &[2, 1]));
    }
}

mod overlapping {
    use super::*;

    #[test]
    fn overlapping_siblings_are_evaluated_independently() {
        let root = MeasuredNode::new(1, "Root", rect(0, 0, 20, 20)).with_children([
            MeasuredNode::content(2, "Back", rect(0, 0, 10, 10)),
            MeasuredNode::content(2, "Front", rect(5, 5, 15, 15)),
        ]);
        let mut engine = engine_for(root);
        engine.update_visible_rect(rect(0, 0, 5, 5)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1]);

        engine.update_visible_rect(rect(5, 5, 10, 10)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 1, 2]);

        engine.update_visible_rect(rect(10, 10, 15, 15)).expect("update");
        assert_eq!(mounted_indices(&engine), vec![0, 2]);
    }
}

mod directives {
    use super::*;

    #[test]
    fn same_rect_twice_is_a_no_op() {
        let mut engine = engine_for(stack(5));
        let first = engine.update_visible_rect(rect(0, 12, 10, 33)).expect("update");
        assert!(!first.is_empty());
        let second = engine.update_visible_rect(rect(0, 12, 10, 33)).expect("update");
        assert!(second.is_empty());
    }

    #[test]
    fn mount_all_then_update_unmounts_the_invisible() {
        let mut engine = engine_for(stack(3));
        let all = engine.mount_all().expect("mount all");
        assert_eq!(all.to_mount, ids(&engine, &[0, 1, 2, 3]));
        assert_eq!(engine.visible_rect(), None);

        let delta = engine.update_visible_rect(rect(0, 0, 10, 10)).expect("update");
        assert_eq!(delta.to_unmount, ids(&engine, &[3, 2]));
    }

    #[test]
    fn unmount_all_tears_down_in_reverse_mount_order() {
        let mut engine = engine_for(stack(3));
        engine.update_visible_rect(rect(0, 0, 10, 30)).expect("update");
        let delta = engine.unmount_all().expect("unmount all");
        assert_eq!(delta.to_unmount, ids(&engine, &[3, 2, 1, 0]));
        assert_eq!(engine.mounted_count(), 0);

        let delta = engine.update_visible_rect(rect(0, 0, 10, 30)).expect("remount");
        assert_eq!(delta.to_mount, ids(&engine, &[0, 1, 2, 3]));
    }

    #[test]
    fn disabled_incremental_mount_mounts_everything() {
        let tree = build_render_tree(&Arc::new(IdGenerator::new()), Some(&stack(3)), None)
            .expect("root is present");
        let mut engine = IncrementalMountEngine::new(
            Arc::new(tree),
            MountOptions {
                incremental: false,
                policy: InvariantPolicy::Fail,
            },
        );
        let delta = engine.update_visible_rect(rect(0, 0, 10, 10)).expect("update");
        assert_eq!(delta.to_mount.len(), 4);
        let delta = engine.update_visible_rect(rect(0, 20, 10, 30)).expect("update");
        assert!(delta.is_empty());
    }

    #[test]
    fn released_engine_refuses_every_call() {
        let mut engine = engine_for(stack(1));
        engine.release();
        assert!(engine.is_released());
        let released = Err(CoreError::Released {
            what: "incremental mount engine",
        });
        assert_eq!(engine.update_visible_rect(rect(0, 0, 10, 10)), released);
        assert_eq!(engine.mount_all(), released);
        assert_eq!(engine.unmount_all(), released);
    }

    #[test]
    fn seeded_engine_reconciles_on_first_update() {
        let tree = Arc::new(
            build_render_tree(&Arc::new(IdGenerator::new()), Some(&stack(3)), None)
                .expect("root is present"),
        );
        let seeded: HashSet<_> = [tree.output(0).id, tree.output(3).id].into_iter().collect();
        let mut engine = IncrementalMountEngine::with_mounted(Arc::clone(&tree), STRICT, &seeded);
        assert!(engine.is_mounted(tree.output(3).id));

        let delta = engine.update_visible_rect(rect(0, 0, 10, 10)).expect("update");
        assert_eq!(delta.to_mount, vec![tree.output(1).id]);
        assert_eq!(delta.to_unmount, vec![tree.output(3).id]);
    }
}

mod cursors {
    use super::*;

    #[test]
    fn cached_positions_match_sorted_orderings() {
        let engine = engine_for(stack(4));
        let tree = Arc::clone(engine.tree());
        for (position, &index) in tree.by_top().iter().enumerate() {
            assert_eq!(engine.output(index).position_in_by_top, position);
        }
        for (position, &index) in tree.by_bottom().iter().enumerate() {
            assert_eq!(engine.output(index).position_in_by_bottom, position);
        }
    }

    #[test]
    fn incremental_scroll_matches_full_recompute() {
        let root = MeasuredNode::new(1, "Root", rect(0, 0, 10, 400)).with_children((0..20).map(|i| {
            let top = i * 20;
            MeasuredNode::new(2, "Row", rect(0, top, 10, top + 20))
                .wrapped_in_view()
                .with_children([
                    MeasuredNode::content(3, "Icon", rect(0, top, 5, top + 5)),
                    MeasuredNode::content(4, "Label", rect(0, top + 5, 10, top + 15)),
                ])
        }));
        let tree = Arc::new(
            build_render_tree(&Arc::new(IdGenerator::new()), Some(&root), None)
                .expect("root is present"),
        );
        let mut scrolling = IncrementalMountEngine::new(Arc::clone(&tree), STRICT);

        for top in (0..380).step_by(7).chain((0..380).rev().step_by(13)) {
            let visible = rect(0, top, 10, top + 33);
            scrolling.update_visible_rect(visible).expect("scroll");

            let mut fresh = IncrementalMountEngine::new(Arc::clone(&tree), STRICT);
            fresh.update_visible_rect(visible).expect("recompute");
            assert_eq!(
                scrolling.mounted_ids(),
                fresh.mounted_ids(),
                "divergence at top={top}"
            );
        }
    }
}
