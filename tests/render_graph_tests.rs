//! Render graph declaration and compile tests.
//!
//! Covers dependency derivation, multi-writer ordering, cycle rejection,
//! transient allocation rollback, layered topological groups, and the
//! compile/teardown handle balance.

mod common;

use common::{MockDevice, Op};
use ember::device::{Format, TextureDesc, TextureUsage};
use ember::graph::{RenderGraph, RgResourceHandle};

fn color_target(width: u32, height: u32) -> TextureDesc {
    TextureDesc {
        width,
        height,
        format: Format::Rgba8Unorm,
        usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
        ..TextureDesc::default()
    }
}

fn begin_render_pass_count(ops: &[Op]) -> usize {
    ops.iter()
        .filter(|op| matches!(op, Op::BeginRenderPass { .. }))
        .count()
}

#[test]
fn two_pass_linear_graph_compiles_in_order() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(64, 64);

    let a = graph.declare_texture("scene_color", color_target(64, 64));
    graph.add_pass(
        "writer",
        move |builder| {
            builder.write_color(0, a);
        },
        |_, _| {},
    );
    graph.add_pass(
        "reader",
        move |builder| {
            builder.read_texture(a).write_swapchain();
        },
        |_, _| {},
    );

    assert!(graph.compile(&device), "{}", graph.last_error());
    assert!(graph.is_compiled());
    assert_eq!(graph.topological_order(), &[0, 1]);

    let lists = graph.record_passes(&device);
    assert_eq!(lists.len(), 2);
    for id in &lists {
        let recorded = device.list(*id).unwrap();
        assert_eq!(begin_render_pass_count(&recorded.ops), 1);
    }
}

#[test]
fn multi_writer_ordering_follows_declaration_index() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(32, 32);

    let a = graph.declare_texture("accum", color_target(0, 0));
    graph.add_pass(
        "first_writer",
        move |b| {
            b.write_color(0, a);
        },
        |_, _| {},
    );
    graph.add_pass(
        "second_writer",
        move |b| {
            b.write_color(0, a);
        },
        |_, _| {},
    );
    graph.add_pass(
        "reader",
        move |b| {
            b.read_texture(a).write_swapchain();
        },
        |_, _| {},
    );

    assert!(graph.compile(&device));
    let order = graph.topological_order();
    let pos = |p: u32| order.iter().position(|&x| x == p).unwrap();
    assert!(pos(0) < pos(1), "writers keep declaration order");
    assert!(pos(1) < pos(2), "both writers precede the reader");
}

#[test]
fn dependency_cycle_fails_compile_without_leaking() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(16, 16);

    let a = graph.declare_texture("a", color_target(0, 0));
    let b = graph.declare_texture("b", color_target(0, 0));
    graph.add_pass(
        "p0",
        move |builder| {
            builder.write_color(0, a).read_texture(b);
        },
        |_, _| {},
    );
    graph.add_pass(
        "p1",
        move |builder| {
            builder.write_color(0, b).read_texture(a);
        },
        |_, _| {},
    );

    assert!(!graph.compile(&device));
    assert!(graph.last_error().contains("cycle"));
    assert!(!graph.is_compiled());
    assert!(graph.topological_order().is_empty());
    assert_eq!(device.live_texture_count(), 0, "no transient resources remain");
}

#[test]
fn redeclaring_a_name_returns_the_existing_handle() {
    let mut graph = RenderGraph::new();
    graph.set_resolution(8, 8);

    let a = graph.declare_texture("shadow_map", color_target(0, 0));
    let again = graph.declare_texture("shadow_map", color_target(128, 128));
    assert_eq!(a, again);
    assert_eq!(graph.handle_by_name("shadow_map"), a);
    assert_eq!(graph.handle_by_name("missing"), RgResourceHandle::INVALID);

    let b = graph.declare_texture("other", color_target(0, 0));
    assert_ne!(a, b);
}

#[test]
fn failed_transient_allocation_rolls_back() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(32, 32);

    let a = graph.declare_texture("first", color_target(0, 0));
    let b = graph.declare_texture("second", color_target(0, 0));
    graph.add_pass(
        "p",
        move |builder| {
            builder.write_color(0, a).write_depth(b);
        },
        |_, _| {},
    );

    // First texture succeeds, second fails.
    device.fail_texture_creates_after(1);
    assert!(!graph.compile(&device));
    assert!(graph.last_error().contains("second"));
    assert!(!graph.is_compiled());
    assert_eq!(
        device.live_texture_count(),
        0,
        "everything created during the failed compile is destroyed"
    );
}

#[test]
fn recompile_and_teardown_balance_created_handles() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(64, 64);

    let a = graph.declare_texture("color", color_target(0, 0));
    graph.add_pass(
        "main",
        move |builder| {
            builder.write_color(0, a).write_swapchain();
        },
        |_, _| {},
    );

    assert!(graph.compile(&device));
    graph.execute(&device);
    graph.execute(&device);

    // Second compile destroys the first compile's transients.
    assert!(graph.compile(&device));
    graph.destroy(&device);

    assert_eq!(device.created_texture_count(), device.destroyed_texture_count());
    assert_eq!(device.live_texture_count(), 0);
    assert_eq!(device.live_fence_count(), 0);
}

#[test]
fn topological_groups_layer_a_diamond() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(32, 32);

    let a = graph.declare_texture("a", color_target(0, 0));
    let b = graph.declare_texture("b", color_target(0, 0));
    let c = graph.declare_texture("c", color_target(0, 0));
    graph.add_pass(
        "root",
        move |builder| {
            builder.write_color(0, a);
        },
        |_, _| {},
    );
    graph.add_pass(
        "left",
        move |builder| {
            builder.read_texture(a).write_color(0, b);
        },
        |_, _| {},
    );
    graph.add_pass(
        "right",
        move |builder| {
            builder.read_texture(a).write_color(0, c);
        },
        |_, _| {},
    );
    graph.add_pass(
        "join",
        move |builder| {
            builder.read_texture(b).read_texture(c).write_swapchain();
        },
        |_, _| {},
    );

    assert!(graph.compile(&device));
    let groups = graph.topological_groups();
    assert_eq!(groups, vec![vec![0], vec![1, 2], vec![3]]);
}

#[test]
fn execute_on_uncompiled_graph_is_a_no_op() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(32, 32);
    let a = graph.declare_texture("a", color_target(0, 0));
    graph.add_pass(
        "p",
        move |builder| {
            builder.write_color(0, a);
        },
        |_, _| {},
    );

    graph.execute(&device);
    assert_eq!(device.acquire_count(), 0);
    assert_eq!(device.submit_count(), 0);
}

#[test]
fn transfer_pass_records_without_render_pass() {
    let device = MockDevice::new();
    let mut graph = RenderGraph::new();
    graph.set_resolution(32, 32);

    graph.add_pass(
        "upload",
        |builder| {
            builder.execute_without_render_pass();
        },
        |_, cmd| {
            cmd.barrier(&[]);
        },
    );

    assert!(graph.compile(&device));
    let lists = graph.record_passes(&device);
    assert_eq!(lists.len(), 1);
    let recorded = device.list(lists[0]).unwrap();
    assert_eq!(begin_render_pass_count(&recorded.ops), 0);
    assert_eq!(recorded.ops, vec![Op::Barrier]);
}
