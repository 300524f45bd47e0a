//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cutframe_core::{FrameRate, Size};
use cutframe_media::{
    DecodeCache, ExportCancel, ExportFormat, ExportQuality, FfmpegDecoder, FfmpegSink,
};
use cutframe_render::{Compositor, ExportOptions, ExportOutcome, ExportSequencer, FontBook};
use cutframe_timeline::{FontStyle, FontWeight, Scene, SceneFile};
use tracing::info;

/// Font face named on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct FontArg {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub path: PathBuf,
}

/// Parse `FAMILY[:bold][:italic]=PATH`.
pub fn parse_font_arg(arg: &str) -> Result<FontArg> {
    let (face, path) = arg
        .split_once('=')
        .with_context(|| format!("font '{arg}' should look like FAMILY=PATH"))?;
    let mut parts = face.split(':');
    let family = parts.next().unwrap_or_default().trim();
    if family.is_empty() || path.trim().is_empty() {
        bail!("font '{arg}' should look like FAMILY=PATH");
    }

    let mut font = FontArg {
        family: family.to_string(),
        weight: FontWeight::Normal,
        style: FontStyle::Normal,
        path: PathBuf::from(path.trim()),
    };
    for flag in parts {
        match flag.trim().to_ascii_lowercase().as_str() {
            "bold" => font.weight = FontWeight::Bold,
            "italic" => font.style = FontStyle::Italic,
            other => bail!("unknown font flag '{other}' in '{arg}'"),
        }
    }
    Ok(font)
}

pub fn load_fonts(args: &[String]) -> Result<Arc<FontBook>> {
    let book = FontBook::new();
    for arg in args {
        let font = parse_font_arg(arg)?;
        book.register_file(&font.family, font.weight, font.style, &font.path)
            .with_context(|| format!("loading font {}", font.path.display()))?;
    }
    if book.is_empty() {
        tracing::warn!("No fonts registered; text elements will be skipped");
    }
    Ok(Arc::new(book))
}

fn load_scene(path: &Path) -> Result<Scene> {
    let file = SceneFile::load_from_file(path)
        .with_context(|| format!("loading project {}", path.display()))?;
    info!(
        path = %path.display(),
        tracks = file.scene.tracks.len(),
        assets = file.scene.assets.len(),
        duration = file.scene.duration(),
        "Project loaded"
    );
    Ok(file.scene)
}

/// Output size from optional overrides; a single override keeps the canvas aspect.
pub fn resolve_size(canvas: Size, width: Option<u32>, height: Option<u32>) -> Size {
    let aspect = canvas.width.max(1) as f64 / canvas.height.max(1) as f64;
    match (width, height) {
        (Some(w), Some(h)) => Size::new(w, h),
        (Some(w), None) => Size::new(w, ((w as f64 / aspect).round() as u32).max(1)),
        (None, Some(h)) => Size::new(((h as f64 * aspect).round() as u32).max(1), h),
        (None, None) => canvas,
    }
}

pub fn render_still(
    project: &Path,
    time: f64,
    out: &Path,
    width: Option<u32>,
    height: Option<u32>,
    fonts: Arc<FontBook>,
) -> Result<()> {
    let scene = load_scene(project)?;
    let size = resolve_size(scene.settings.canvas_size, width, height);

    let decode_cache = Arc::new(DecodeCache::new(Arc::new(FfmpegDecoder::new())));
    let compositor = Compositor::new(Arc::clone(&decode_cache), fonts);
    let frame = compositor.render(time, &scene, size)?;
    decode_cache.clear_all();

    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_packed())
        .context("rendered frame has an unexpected size")?;
    image
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(time, width = size.width, height = size.height, out = %out.display(), "Frame written");
    Ok(())
}

pub struct ExportArgs {
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub fps: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub fn export(project: &Path, out: &Path, args: ExportArgs, fonts: Arc<FontBook>) -> Result<()> {
    let scene = load_scene(project)?;
    let size = resolve_size(scene.settings.canvas_size, args.width, args.height);
    let options = ExportOptions {
        format: args.format,
        quality: args.quality,
        fps: args.fps.map(FrameRate::from_fps),
        size: Some(size),
    };

    let mut sink = FfmpegSink::new(out)?;
    let sequencer = ExportSequencer::new(Arc::new(FfmpegDecoder::new()), fonts);
    let cancel = ExportCancel::new();

    // Log roughly every tenth of the way
    let mut next_report = 0.0;
    let outcome = sequencer.run(
        &scene,
        &options,
        &mut sink,
        |progress| {
            let fraction = progress.fraction();
            if fraction >= next_report {
                info!(
                    percent = (fraction * 100.0).round(),
                    frame = progress.current_frame,
                    total = progress.total_frames,
                    fps = %format!("{:.1}", progress.fps),
                    eta_secs = %format!("{:.1}", progress.eta_seconds),
                    "Exporting"
                );
                next_report = fraction + 0.1;
            }
        },
        &cancel,
    );

    match outcome {
        ExportOutcome::Succeeded(bytes) => {
            info!(out = %out.display(), bytes = bytes.len(), "Export complete");
            Ok(())
        }
        ExportOutcome::Cancelled => bail!("export cancelled"),
        ExportOutcome::Failed(e) => Err(e).context("export failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_font_arg() {
        let font = parse_font_arg("Inter:bold=/fonts/Inter-Bold.ttf").unwrap();
        assert_eq!(font.family, "Inter");
        assert_eq!(font.weight, FontWeight::Bold);
        assert_eq!(font.style, FontStyle::Normal);
        assert_eq!(font.path, PathBuf::from("/fonts/Inter-Bold.ttf"));

        let font = parse_font_arg("Serif:italic:bold=a.otf").unwrap();
        assert_eq!((font.weight, font.style), (FontWeight::Bold, FontStyle::Italic));
    }

    #[test]
    fn test_parse_font_arg_rejects_garbage() {
        assert!(parse_font_arg("Inter").is_err());
        assert!(parse_font_arg("=x.ttf").is_err());
        assert!(parse_font_arg("Inter:wide=x.ttf").is_err());
    }

    #[test]
    fn test_resolve_size_keeps_aspect() {
        let canvas = Size::new(1920, 1080);
        assert_eq!(resolve_size(canvas, None, None), canvas);
        assert_eq!(resolve_size(canvas, Some(640), None), Size::new(640, 360));
        assert_eq!(resolve_size(canvas, None, Some(720)), Size::new(1280, 720));
        assert_eq!(resolve_size(canvas, Some(10), Some(10)), Size::new(10, 10));
    }

    #[test]
    fn test_still_from_project_file() {
        use cutframe_timeline::{Element, ProjectSettings, TextContent, Track};

        let dir = tempfile::tempdir().unwrap();
        let mut settings = ProjectSettings::new(32, 16);
        settings.background.color = "#00ff00".into();
        let track = Track::new_text("Titles")
            .with_element(Element::text(TextContent::new("x"), 0.0, 1.0));
        let scene = Scene::new(vec![track], Vec::new(), settings);
        let project = dir.path().join("project.json");
        std::fs::write(&project, SceneFile::new(scene).to_json().unwrap()).unwrap();

        let out = dir.path().join("still.png");
        render_still(&project, 0.5, &out, Some(16), None, Arc::new(FontBook::new())).unwrap();

        let written = image::open(&out).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (16, 8));
        assert_eq!(written.get_pixel(0, 0).0, [0, 255, 0, 255]);
    }
}
