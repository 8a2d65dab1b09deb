//! Material descriptor set lifecycle tests.
//!
//! Covers the shared material set (declaration-order bindings, rebuild on
//! change), the pooled per-instance sets with per-frame recycling, and
//! the draw-time binding contract including the push-constant variant.

mod common;

use std::sync::Arc;

use common::{MockDevice, Op};
use ember::device::{Format, RenderDevice, TextureDesc, TextureUsage};
use ember::material::{Material, Renderable};
use ember::resource::Texture;

fn make_texture(device: &MockDevice) -> Arc<Texture> {
    let handle = device.create_texture(
        &TextureDesc {
            width: 4,
            height: 4,
            format: Format::Rgba8Unorm,
            usage: TextureUsage::SAMPLED,
            ..TextureDesc::default()
        },
        None,
    );
    Arc::new(Texture {
        handle,
        width: 4,
        height: 4,
        format: Format::Rgba8Unorm,
        mip_levels: 1,
    })
}

#[test]
fn instance_set_pool_reuses_released_handles() {
    let device = MockDevice::new();
    let material = Material::new();
    let data = [0u8; 64];

    let h1 = material.acquire_instance_descriptor_set(&device, &data);
    let h2 = material.acquire_instance_descriptor_set(&device, &data);
    assert!(h1.is_valid() && h2.is_valid());
    assert_ne!(h1, h2);
    assert_eq!(material.instance_sets_in_use(), 2);

    let created = device.instance_sets_created();
    material.release_all_instance_descriptor_sets(&device);
    assert_eq!(material.instance_sets_in_use(), 0);
    assert_eq!(device.instance_sets_outstanding(), 0);

    let h3 = material.acquire_instance_descriptor_set(&device, &data);
    let h4 = material.acquire_instance_descriptor_set(&device, &data);
    assert!([h1, h2].contains(&h3));
    assert!([h1, h2].contains(&h4));
    assert_eq!(
        device.instance_sets_created(),
        created,
        "reuse does not allocate new sets"
    );
}

#[test]
fn material_set_binds_textures_in_declaration_order() {
    let device = MockDevice::new();
    let mut material = Material::new();

    let albedo = make_texture(&device);
    let normal = make_texture(&device);
    material.set_texture("albedo", albedo.clone());
    material.set_texture("normal", normal.clone());

    material.ensure_material_descriptor_set(&device);
    let set = material.material_descriptor_set();
    assert!(set.is_valid());

    assert_eq!(
        device.descriptor_texture_writes(),
        vec![
            (set.id, 0, albedo.handle.id),
            (set.id, 1, normal.handle.id),
        ]
    );
}

#[test]
fn ensure_rebuilds_and_destroys_the_old_set() {
    let device = MockDevice::new();
    let mut material = Material::new();
    material.set_texture("albedo", make_texture(&device));

    material.ensure_material_descriptor_set(&device);
    let first = material.material_descriptor_set();

    material.set_texture("emissive", make_texture(&device));
    material.ensure_material_descriptor_set(&device);
    let second = material.material_descriptor_set();

    assert!(second.is_valid());
    assert_ne!(first, second);
    assert_eq!(device.destroyed_set_count(), 1);
}

#[test]
fn material_without_textures_builds_no_set() {
    let device = MockDevice::new();
    let material = Material::new();
    material.ensure_material_descriptor_set(&device);
    assert!(!material.material_descriptor_set().is_valid());
}

#[test]
fn bind_for_draw_binds_pipeline_and_both_sets() {
    let device = MockDevice::new();
    let mut material = Material::new();
    material.set_texture("albedo", make_texture(&device));
    material.ensure_material_descriptor_set(&device);

    let pipeline = device.create_pipeline(&Default::default());
    material.set_pipeline(pipeline);

    let instance_data = [3u8; 64];
    let mut cmd = device.begin_command_list(0).unwrap();
    material.bind_for_draw(cmd.as_mut(), Some(&device), &instance_data);
    let id = device.end_command_list(cmd);

    let ops = device.list(id).unwrap().ops;
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], Op::BindPipeline(pipeline.id));
    assert!(matches!(ops[1], Op::BindDescriptorSet(0, _)));
    assert!(matches!(ops[2], Op::BindDescriptorSet(1, _)));
    assert_eq!(material.instance_sets_in_use(), 1);
}

#[test]
fn push_constant_material_skips_descriptor_sets() {
    let device = MockDevice::new();
    let material = Material::push_constant_only();
    let pipeline = device.create_pipeline(&Default::default());
    material.set_pipeline(pipeline);

    let instance_data = [9u8; 16];
    let mut cmd = device.begin_command_list(0).unwrap();
    material.bind_for_draw(cmd.as_mut(), Some(&device), &instance_data);
    let id = device.end_command_list(cmd);

    let ops = device.list(id).unwrap().ops;
    assert_eq!(
        ops,
        vec![
            Op::BindPipeline(pipeline.id),
            Op::SetPushConstants(instance_data.to_vec()),
        ]
    );
    assert_eq!(material.instance_sets_in_use(), 0);
}

#[test]
fn release_frame_resources_returns_instance_sets() {
    let device = MockDevice::new();
    let material = Material::new();
    let data = [0u8; 32];
    material.acquire_instance_descriptor_set(&device, &data);
    material.acquire_instance_descriptor_set(&device, &data);

    // Through the Renderable hook, as the graph calls it at frame end.
    let renderable: &dyn Renderable = &material;
    renderable.release_frame_resources(&device);
    assert_eq!(material.instance_sets_in_use(), 0);
    assert_eq!(device.instance_sets_outstanding(), 0);
}

#[test]
fn parameters_round_trip() {
    let mut material = Material::new();
    material.set_parameter("roughness", &0.5f32.to_le_bytes());
    material.set_parameter("", &[1]);

    assert_eq!(material.parameter("roughness"), Some(&0.5f32.to_le_bytes()[..]));
    assert_eq!(material.parameter(""), None);
    assert_eq!(material.parameter("missing"), None);
}
