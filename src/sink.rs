use std::{
    io::{Cursor, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    convert::Rgba8Frame,
    error::{RandomartError, RandomartResult},
};

/// Encode `frame` as a single-frame RGBA8 PNG in memory.
///
/// Bytes go in verbatim: premultiplied input stays premultiplied, no gamma or
/// color-space conversion is applied.
pub fn encode_png(frame: &Rgba8Frame) -> RandomartResult<Vec<u8>> {
    let expected = (frame.width as usize)
        .checked_mul(frame.height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| RandomartError::encode("image size overflow"))?;
    if frame.data.len() != expected {
        return Err(RandomartError::encode(format!(
            "frame holds {} bytes, expected {expected} for {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }

    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| RandomartError::encode("frame buffer does not match its dimensions"))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| RandomartError::encode(format!("png encode failed: {e}")))?;
    Ok(out.into_inner())
}

/// Write `frame` to `path` as PNG, replacing any existing file.
///
/// The parent directory must already exist. The image is written to a sibling
/// temporary file first and renamed into place, so `path` is only touched once
/// the whole file is on disk.
#[tracing::instrument(
    skip(frame),
    fields(width = frame.width, height = frame.height, premultiplied = frame.premultiplied)
)]
pub fn write_png(frame: &Rgba8Frame, path: &Path) -> RandomartResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(RandomartError::encode(format!(
            "output directory '{}' does not exist",
            parent.display()
        )));
    }

    let bytes = encode_png(frame)?;
    replace_file(path, |file| file.write_all(&bytes))
}

/// Stage the file contents produced by `fill` next to `path`, then rename over
/// `path`. The staged file is removed on any failure.
fn replace_file(
    path: &Path,
    fill: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>,
) -> RandomartResult<()> {
    let tmp = temp_path_for(path);
    let staged = std::fs::File::create(&tmp)
        .and_then(|mut file| {
            fill(&mut file)?;
            file.sync_all()
        })
        .with_context(|| format!("write png '{}'", tmp.display()));
    if let Err(e) = staged {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(anyhow::Error::new(e)
            .context(format!("move png into place at '{}'", path.display()))
            .into());
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
