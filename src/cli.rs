use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::StreamConfig;
use crate::gpu::renderer::Renderer;
use crate::layer::LayerKind;
use crate::material::ShaderLibrary;
use crate::quality::QualityProfile;
use crate::stream::CognitionStream;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the frame loop without a GPU and print a summary
    Simulate {
        /// Number of frames to run
        #[arg(long, default_value_t = 300)]
        frames: u32,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Use reduced quality
        #[arg(long)]
        reduced: bool,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for reproducible layouts (overrides the config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write the sanitized render tree at a given time as JSON
    Snapshot {
        /// Output file
        #[arg(long)]
        out: PathBuf,

        /// Elapsed time in seconds
        #[arg(long, default_value_t = 0.0)]
        time: f32,

        /// Use reduced quality
        #[arg(long)]
        reduced: bool,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the quality profile chosen for a viewport and user agent
    Classify {
        /// Viewport width in CSS pixels
        #[arg(long)]
        width: u32,

        /// User agent string
        #[arg(long, default_value = "")]
        user_agent: String,
    },

    /// Render frames to disk
    Render {
        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Number of frames to render
        #[arg(long, default_value_t = 120)]
        frames: u32,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Use reduced quality
        #[arg(long)]
        reduced: bool,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { frames, fps, reduced, config, seed } => {
            let mut config = load_config(config.as_deref())?;
            if seed.is_some() {
                config.seed = seed;
            }
            simulate(&config, frames, fps, reduced)?;
        }
        Commands::Snapshot { out, time, reduced, config } => {
            let config = load_config(config.as_deref())?;
            snapshot(&config, &out, time, reduced)?;
        }
        Commands::Classify { width, user_agent } => {
            let config = StreamConfig::default();
            let reduced = config.classifier()?.classify(width, &user_agent);
            println!("{}", serde_json::to_string_pretty(&QualityProfile::for_flag(reduced))?);
        }
        Commands::Render { out, frames, fps, width, height, reduced, config } => {
            let config = load_config(config.as_deref())?;
            pollster::block_on(render_offline(&config, out, frames, fps, width, height, reduced))?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    match path {
        Some(path) => StreamConfig::from_json_file(path),
        None => Ok(StreamConfig::default()),
    }
}

fn simulate(config: &StreamConfig, frames: u32, fps: f32, reduced: bool) -> Result<()> {
    anyhow::ensure!(fps > 0.0, "fps must be positive");
    let mut stream = CognitionStream::with_quality(config, reduced)?;
    let dt = 1.0 / fps;

    let mut shader_units = 0usize;
    let mut uploads = 0usize;
    for i in 0..frames {
        let report = stream.frame(i as f32 * dt);
        shader_units += report.shader_units_advanced;
        uploads += stream.scene_mut().take_dirty().len();
    }

    println!("Simulated {} frames ({:.2}s, reduced quality: {})", frames, frames as f32 * dt, reduced);
    for kind in LayerKind::ALL {
        match stream.layer_stats(kind) {
            Some(stats) => println!(
                "  {:<14} {:>4} entities {:>3} buffers {:>7} floats",
                kind.name(),
                stats.entities,
                stats.buffers,
                stats.floats
            ),
            None => println!("  {:<14} hidden", kind.name()),
        }
    }
    println!("  shader units advanced: {}", shader_units);
    println!("  buffer uploads: {}", uploads);
    Ok(())
}

fn snapshot(config: &StreamConfig, out: &Path, time: f32, reduced: bool) -> Result<()> {
    let mut stream = CognitionStream::with_quality(config, reduced)?;
    stream.frame(time);
    let json = stream.render_tree_json()?;
    std::fs::write(out, json).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Wrote render tree at t={:.2}s to {:?}", time, out);
    Ok(())
}

async fn render_offline(
    config: &StreamConfig,
    out_dir: PathBuf,
    frames: u32,
    fps: f32,
    width: u32,
    height: u32,
    reduced: bool,
) -> Result<()> {
    anyhow::ensure!(fps > 0.0, "fps must be positive");
    anyhow::ensure!(width > 0 && height > 0, "output size must be non-zero");
    let dt = 1.0 / fps;

    let mut stream = CognitionStream::with_quality(config, reduced)?;
    std::fs::create_dir_all(&out_dir)?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await?;

    let texture_desc = wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    };
    let texture = device.create_texture(&texture_desc);
    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Rows in the readback buffer are padded to 256 bytes.
    let unpadded_bytes_per_row = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut renderer = Renderer::new(device, queue, texture_desc.format, width, height, &ShaderLibrary::new());

    println!("Rendering {} frames to {:?}...", frames, out_dir);

    for i in 0..frames {
        stream.frame(i as f32 * dt);
        let sync = renderer.render(&texture_view, &mut stream);
        if sync.created > 0 || sync.released > 0 {
            log::debug!("frame {}: {} created, {} released", i, sync.created, sync.released);
        }

        let mut encoder = renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture_desc.size,
        );
        renderer.queue().submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        renderer.device().poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("readback channel closed")?
            .context("failed to map readback buffer")?;

        let data = buffer_slice.get_mapped_range();
        let mut unpadded = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            unpadded.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
        }

        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(&frame_path, &unpadded, width, height, image::ColorType::Rgba8)?;

        drop(data);
        output_buffer.unmap();

        if i % 60 == 0 {
            print!(".");
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone.");

    Ok(())
}
