//! Media tooling wrappers.
//!
//! Thin wrappers around yt-dlp, ffmpeg and ffprobe. Everything here is a
//! blocking external-process call surfaced through `tokio::process`; the
//! stage adapters decide what each failure means for the pipeline.

use crate::error::{RecastError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Downloads a remote source and extracts its audio as MP3.
///
/// Uses yt-dlp (Bilibili, YouTube and friends). If the target file
/// already exists it is reused without re-downloading.
#[instrument(skip(output_dir), fields(stem = %stem))]
pub async fn download_audio(url: &str, stem: &str, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let target_path = output_dir.join(format!("{}.mp3", stem));

    if target_path.exists() {
        info!("Using cached audio file");
        return Ok(target_path);
    }

    info!("Downloading audio from {}", url);

    // Download under a partial name and rename into place at the end, so
    // the cache check above only ever sees fully written files.
    let work_stem = format!("{}.part", stem);
    let template = output_dir.join(format!("{}.%(ext)s", work_stem));

    let result = Command::new("yt-dlp")
        .arg("--extract-audio")
        .arg("--audio-format").arg("mp3")
        .arg("--audio-quality").arg("0")
        .arg("--output").arg(template.to_str().unwrap_or_default())
        .arg("--no-playlist")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RecastError::ToolNotFound("yt-dlp".into()));
        }
        Err(e) => {
            return Err(RecastError::Transient(format!(
                "yt-dlp execution failed: {e}"
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // yt-dlp reports unsupported/invalid URLs distinctly from network failures
        if stderr.contains("Unsupported URL") || stderr.contains("is not a valid URL") {
            return Err(RecastError::InvalidInput(format!(
                "Unsupported source: {stderr}"
            )));
        }
        return Err(RecastError::Transient(format!("yt-dlp failed: {stderr}")));
    }

    // yt-dlp may leave a different container; find and normalize to mp3
    let downloaded = find_audio_file(output_dir, &work_stem)?;
    finalize_audio(&downloaded, &target_path).await?;

    Ok(target_path)
}

/// Promote a completed partial download to its final path, re-encoding
/// to MP3 first when the container requires it.
async fn finalize_audio(downloaded: &Path, target: &Path) -> Result<()> {
    if downloaded.extension().and_then(|e| e.to_str()) == Some("mp3") {
        std::fs::rename(downloaded, target)?;
        return Ok(());
    }

    let encoded = target.with_extension("part.mp3");
    extract_audio(downloaded, &encoded).await?;
    std::fs::rename(&encoded, target)?;
    let _ = std::fs::remove_file(downloaded);
    Ok(())
}

/// Locates a downloaded audio file by its stem.
fn find_audio_file(dir: &Path, stem: &str) -> Result<PathBuf> {
    for ext in &["mp3", "opus", "m4a", "webm", "ogg"] {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let entries = std::fs::read_dir(dir)?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(stem) {
            return Ok(entry.path());
        }
    }

    Err(RecastError::Unrecoverable(
        "Audio file not found after download".into(),
    ))
}

/// Extracts (or re-encodes) the audio track of a media file to MP3.
pub async fn extract_audio(source: &Path, dest: &Path) -> Result<()> {
    debug!("Extracting audio from {:?}", source);

    let result = Command::new("ffmpeg")
        .arg("-i").arg(source)
        .arg("-vn")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(RecastError::Unrecoverable(format!(
                "ffmpeg audio extraction failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecastError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(RecastError::Unrecoverable(format!("ffmpeg error: {e}"))),
    }
}

/// Queries the duration of a media file in seconds using ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RecastError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(RecastError::Unrecoverable(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(RecastError::Unrecoverable("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| RecastError::Unrecoverable("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| RecastError::Unrecoverable("Could not determine media duration".into()))
}

/// Generates a silent MP3 of the given length.
pub async fn make_silence(dest: &Path, millis: u64) -> Result<()> {
    let result = Command::new("ffmpeg")
        .arg("-f").arg("lavfi")
        .arg("-i").arg("anullsrc=r=44100:cl=mono")
        .arg("-t").arg(format!("{:.3}", millis as f64 / 1000.0))
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("9")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(RecastError::Unrecoverable(format!(
                "ffmpeg silence generation failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecastError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(RecastError::Unrecoverable(format!("ffmpeg error: {e}"))),
    }
}

/// Concatenates MP3 files into one, re-encoding once at the end.
///
/// Uses the ffmpeg concat demuxer with a generated list file; paths with
/// single quotes are escaped per the demuxer's quoting rules.
#[instrument(skip_all, fields(count = parts.len()))]
pub async fn concat_audio(parts: &[PathBuf], dest: &Path) -> Result<()> {
    if parts.is_empty() {
        return Err(RecastError::Unrecoverable(
            "No audio segments to concatenate".into(),
        ));
    }

    let list_path = dest.with_extension("concat.txt");
    let mut list = String::new();
    for part in parts {
        let escaped = part.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    std::fs::write(&list_path, list)?;

    let result = Command::new("ffmpeg")
        .arg("-f").arg("concat")
        .arg("-safe").arg("0")
        .arg("-i").arg(&list_path)
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .output()
        .await;

    let _ = std::fs::remove_file(&list_path);

    match result {
        Ok(out) if out.status.success() => {
            debug!("Stitched {} segments into {:?}", parts.len(), dest);
            Ok(())
        }
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(RecastError::Unrecoverable(format!(
                "ffmpeg concat failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecastError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(RecastError::Unrecoverable(format!("ffmpeg error: {e}"))),
    }
}

/// Renders a still-image video: cover image looped over the audio, with
/// optional burned-in subtitles. Without a cover image a plain dark
/// background is generated instead.
#[instrument(skip_all)]
pub async fn mux_still_video(
    image: Option<&Path>,
    audio: &Path,
    subtitles: Option<&Path>,
    dest: &Path,
) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    match image {
        Some(img) => {
            cmd.arg("-loop").arg("1").arg("-i").arg(img);
        }
        None => {
            cmd.arg("-f").arg("lavfi")
                .arg("-i").arg("color=c=0x1e1e2e:s=1280x720:r=25");
        }
    }
    cmd.arg("-i").arg(audio);

    if let Some(srt) = subtitles {
        // Burn subtitles into the video stream; scale keeps even dimensions
        // for yuv420p.
        let filter = format!(
            "scale=trunc(iw/2)*2:trunc(ih/2)*2,subtitles='{}'",
            srt.to_string_lossy().replace('\'', "\\'")
        );
        cmd.arg("-vf").arg(filter);
    } else {
        cmd.arg("-vf").arg("scale=trunc(iw/2)*2:trunc(ih/2)*2");
    }

    let result = cmd
        .arg("-c:v").arg("libx264")
        .arg("-tune").arg("stillimage")
        .arg("-c:a").arg("aac")
        .arg("-b:a").arg("192k")
        .arg("-pix_fmt").arg("yuv420p")
        .arg("-shortest")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(RecastError::Unrecoverable(format!(
                "ffmpeg video mux failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecastError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(RecastError::Unrecoverable(format!("ffmpeg error: {e}"))),
    }
}

/// Checks that a media file has an audio stream at all.
pub async fn has_audio_stream(path: &Path) -> Result<bool> {
    let output = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_streams")
        .arg("-select_streams").arg("a")
        .arg(path)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let parsed: serde_json::Value =
                serde_json::from_slice(&out.stdout).unwrap_or_default();
            Ok(parsed["streams"]
                .as_array()
                .is_some_and(|streams| !streams.is_empty()))
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecastError::ToolNotFound("ffprobe".into()))
        }
        Err(e) => {
            warn!("ffprobe stream check failed: {}", e);
            Ok(false)
        }
    }
}
