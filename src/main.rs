// Headless demo runner for the `stimulus_lab` engine: loads a stimulus
// library (from a directory if one is given, otherwise a generated one),
// stands in a synthetic camera, and drives a short scripted session.
// A real deployment replaces the scripted events, memory display and
// synthetic capture with GUI and camera collaborators.

use anyhow::{Context, Result};
use stimulus_lab::core_modules::frame_store::{FrameBuffer, FrameShape};
use stimulus_lab::core_modules::taxonomy::{
    CategoryAssets, StimulusTaxonomy, SubcategoryAssets, VariantAssets,
};
use stimulus_lab::io::assets::{AssetSource, DirectoryAssets};
use stimulus_lab::io::capture::{FrameSource, LogTtl, SyntheticCapture};
use stimulus_lab::io::display::{ImageKey, MemoryDisplay};
use stimulus_lab::io::events::{InputEvent, ScriptedEvents};
use stimulus_lab::io::persistence::FsPersistence;
use stimulus_lab::session::{run_session, SessionConfig, SessionPipeline, SystemClock};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "stimulus_lab=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let assets = match args.get(1) {
        Some(root) => DirectoryAssets::new(root)
            .enumerate()
            .with_context(|| format!("loading stimulus assets from {root}"))?,
        None => demo_assets(),
    };
    let taxonomy = StimulusTaxonomy::assemble(assets).context("assembling stimulus taxonomy")?;

    let mut capture = SyntheticCapture::single(640, 480);
    for port in capture.ports() {
        info!(port = port.id, width = port.width, height = port.height, "camera port available");
    }

    let script = demo_script(&taxonomy);
    let mut events = ScriptedEvents::from_events(script);
    let mut display = MemoryDisplay::new();
    let mut persistence = FsPersistence;
    let mut ttl = LogTtl;
    let mut clock = SystemClock;

    let mut pipeline = SessionPipeline::new(SessionConfig::default(), taxonomy);
    run_session(
        &mut pipeline,
        &mut events,
        &mut capture,
        &mut display,
        &mut persistence,
        &mut ttl,
        &mut clock,
    );

    let movie_frames = display.image_count(ImageKey::Movie);
    let camera_frames = display.image_count(ImageKey::Camera);
    let stats_entries = pipeline.stats().len();
    info!(
        movie_frames,
        camera_frames,
        stats_entries,
        "demo session complete"
    );
    Ok(())
}

/// Clicks down the first navigable branch, plays for a while, then closes.
fn demo_script(taxonomy: &StimulusTaxonomy) -> Vec<InputEvent> {
    let table = taxonomy.affordances();
    let mut events = vec![InputEvent::Timeout];
    if let Some(category) = table.iter().find(|a| a.level == 1) {
        events.push(InputEvent::Affordance(category.key.clone()));
        if let Some(subcategory) = table
            .iter()
            .find(|a| a.level == 2 && a.parent.as_deref() == Some(category.key.as_str()))
        {
            events.push(InputEvent::Affordance(subcategory.key.clone()));
            if let Some(variant) = table
                .iter()
                .find(|a| a.level == 3 && a.parent.as_deref() == Some(subcategory.key.as_str()))
            {
                events.push(InputEvent::Affordance(variant.key.clone()));
            }
        }
    }
    events.push(InputEvent::Play);
    events.extend(std::iter::repeat_n(InputEvent::Timeout, 60));
    events.push(InputEvent::CloseRequested);
    events
}

/// A small generated stimulus library for camera-less smoke runs.
fn demo_assets() -> Vec<CategoryAssets> {
    let shape = FrameShape {
        width: 64,
        height: 48,
    };
    let gradient_frames = |count: usize, seed: u32| -> Vec<FrameBuffer> {
        (0..count)
            .map(|frame| {
                let mut buffer = Vec::with_capacity(shape.byte_len());
                for y in 0..shape.height {
                    for x in 0..shape.width {
                        let shade = ((x * 4 + y * 2 + frame as u32 * 8 + seed) % 256) as u8;
                        buffer.extend_from_slice(&[shade, shade, shade, 255]);
                    }
                }
                buffer
            })
            .collect()
    };

    vec![
        CategoryAssets {
            key: "Laboratory".into(),
            subcategories: vec![SubcategoryAssets {
                key: "Gratings".into(),
                variants: vec![VariantAssets {
                    key: None,
                    shape,
                    frames: gradient_frames(24, 0),
                }],
            }],
        },
        CategoryAssets {
            key: "Naturalistic".into(),
            subcategories: vec![SubcategoryAssets {
                key: "Catcam".into(),
                variants: vec![
                    VariantAssets {
                        key: Some("V1".into()),
                        shape,
                        frames: gradient_frames(36, 64),
                    },
                    VariantAssets {
                        key: Some("V2".into()),
                        shape,
                        frames: gradient_frames(18, 128),
                    },
                ],
            }],
        },
    ]
}
