// =============================================================================
// LIT RENDERER - Headless resource-core demo
// =============================================================================
//
// Brings up the Vulkan device and drives the resource core through a fixed
// number of frames without a window:
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  VulkanDevice                                                   │
// │    └── CommandPool (one-time transfers, mip generation)         │
// │          └── Scene                                              │
// │                ├── DescriptorPool / DescriptorSetLayout         │
// │                ├── Textures + shadow map                        │
// │                └── Meshes (buffers, per-frame UBOs, sets)       │
// │    └── FrameRing (one fence per frame in flight)                │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Wait on the slot's fence
// 2. Write that slot's uniform buffers
// 3. Submit the slot's command buffer, signalling the fence
// 4. Advance to the next slot
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use glam::{Mat4, Vec3, Vec4};
use lit_renderer::backend::{CommandPool, FrameRing, VulkanDevice};
use lit_renderer::config::Config;
use lit_renderer::scene::{self, CameraMatrices, Scene};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::Instant;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    // Initialize logging
    init_logging(&config);
    log::info!("Starting {}", config.app.name);
    log::info!("Frames in flight: {}, descriptor sets: {}",
        config.graphics.max_frames_in_flight,
        config.descriptors.max_sets
    );

    run(&config)
}

/// Initialize logging, optionally redirecting every record to the log file
fn init_logging(config: &Config) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);

    if config.debug.log_to_file {
        match open_log_file(&config.debug.log_file, &config.app.name) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Failed to open log file {}: {}", config.debug.log_file, e),
        }
    }

    builder.init();
}

/// Create/clear the log file and write its banner
fn open_log_file(path: &str, app_name: &str) -> std::io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    writeln!(file, "=== {} Log ===", app_name)?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;
    Ok(file)
}

fn run(config: &Config) -> Result<()> {
    config.validate()?;

    // ─────────────────────────────────────────────────────────────────────
    // STEP 1: Create Vulkan device
    // ─────────────────────────────────────────────────────────────────────
    let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
    let device = VulkanDevice::new(&config.app.name, enable_validation)
        .context("Failed to create Vulkan device")?;

    let commands = CommandPool::new(&device).context("Failed to create command pool")?;

    // ─────────────────────────────────────────────────────────────────────
    // STEP 2: Scene resources
    // ─────────────────────────────────────────────────────────────────────
    let mut scene = Scene::new(&commands, config).context("Failed to create scene")?;

    let pixels = scene::checkerboard(256, 8);
    let checker = scene
        .add_texture(&commands, 256, 256, &pixels)
        .context("Failed to upload texture")?;

    let (vertices, indices) = scene::cube();
    let cubes = [Vec3::new(-1.5, 0.0, 0.0), Vec3::ZERO, Vec3::new(1.5, 0.0, 0.0)];
    let mut meshes = Vec::with_capacity(cubes.len());
    for offset in cubes {
        let mesh = scene
            .add_mesh(&commands, &vertices, &indices, checker)
            .context("Failed to add mesh")?;
        scene.set_transform(mesh, Mat4::from_translation(offset))?;
        meshes.push((mesh, offset));
    }
    scene.set_light(Vec3::new(4.0, 8.0, 4.0), Vec4::new(1.0, 0.95, 0.9, 1.0));

    log::info!("Descriptor sets in use: {}/{}",
        scene.descriptor_pool().outstanding(),
        scene.descriptor_pool().max_sets());

    // ─────────────────────────────────────────────────────────────────────
    // STEP 3: Per-frame command buffers and fences
    // ─────────────────────────────────────────────────────────────────────
    let mut frames = FrameRing::new(&device, scene.frames_in_flight())?;
    let command_buffers = commands.allocate(scene.frames_in_flight() as u32)?;

    let extent = config.extent();
    let aspect = extent.width as f32 / extent.height as f32;
    let mut proj = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 100.0);
    proj.y_axis.y *= -1.0; // Vulkan clip space has Y pointing down

    // ─────────────────────────────────────────────────────────────────────
    // STEP 4: Frame loop
    // ─────────────────────────────────────────────────────────────────────
    let start = Instant::now();
    for frame in 0..config.debug.demo_frames {
        let slot = frames.begin_frame()?;

        let t = frame as f32 / 60.0;
        let eye = Vec3::new(6.0 * t.cos(), 3.0, 6.0 * t.sin());
        let camera = CameraMatrices {
            view: Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
            proj,
        };
        for &(mesh, offset) in &meshes {
            scene.set_transform(mesh, Mat4::from_translation(offset) * Mat4::from_rotation_y(t))?;
        }
        scene.update(slot, &camera)?;

        // Draw recording belongs to the pipeline layer; the submission still
        // orders this slot's UBO writes against the next wait on its fence
        let draws = scene.draw_items(slot)?;
        let cmd = command_buffers[slot];
        unsafe {
            device.device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            device.device.begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::builder())?;
            device.device.end_command_buffer(cmd)?;

            let submit_cmds = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&submit_cmds);
            device.device.queue_submit(
                device.graphics_queue,
                &[submit_info.build()],
                frames.fence(),
            )?;
        }

        if frame == 0 {
            log::info!("Frame slot {}: {} draw item(s)", slot, draws.len());
        }
        frames.advance();
    }

    let elapsed = start.elapsed().as_secs_f32();
    log::info!("Ran {} frames in {:.2}s", config.debug.demo_frames, elapsed);

    // ─────────────────────────────────────────────────────────────────────
    // CLEANUP - reverse order of creation
    // ─────────────────────────────────────────────────────────────────────
    device.wait_idle()?;
    drop(frames);
    drop(scene);
    drop(commands);

    log::info!("Cleanup complete");
    Ok(())
}
