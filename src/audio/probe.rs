//! Audio Probe — runs `ffprobe` on source files and derives the target
//! bitrate/samplerate for the converted book.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::process::Command;

/// The fixed bitrate quantization ladder the target bitrate is snapped to.
pub const BITRATE_LADDER: [u32; 9] = [32, 48, 64, 96, 128, 160, 192, 256, 320];

/// Relative tolerance between stream and format bitrate beyond which a
/// source file is treated as VBR rather than CBR.
const VBR_RELATIVE_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateMode {
    Cbr,
    Vbr,
}

#[derive(Debug, Clone)]
pub struct AudioProbe {
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels: u8,
    pub codec: String,
    pub duration_secs: f64,
    pub rate_mode: RateMode,
}

/// Probe a single audio file with `ffprobe`, locating it via the configured
/// binary path.
pub async fn probe_file(ffprobe_path: &str, path: &Path) -> Result<AudioProbe> {
    let output = Command::new(ffprobe_path)
        .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("failed to execute ffprobe")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffprobe failed on {}: {}", path.display(), stderr);
    }

    let json: Value =
        serde_json::from_slice(&output.stdout).context("failed to parse ffprobe JSON output")?;
    parse_ffprobe_output(&json)
}

fn parse_ffprobe_output(json: &Value) -> Result<AudioProbe> {
    let streams = json["streams"].as_array().context("no streams in ffprobe output")?;
    let audio_stream = streams
        .iter()
        .find(|s| s["codec_type"] == "audio")
        .context("no audio stream found")?;

    let stream_bitrate = audio_stream["bit_rate"]
        .as_str()
        .and_then(|s| s.parse::<u32>().ok())
        .map(|b| b / 1000);
    let format_bitrate = json["format"]["bit_rate"]
        .as_str()
        .and_then(|s| s.parse::<u32>().ok())
        .map(|b| b / 1000);

    let bitrate_kbps = stream_bitrate
        .or(format_bitrate)
        .context("no bitrate found in ffprobe output")?;

    let rate_mode = match (stream_bitrate, format_bitrate) {
        (Some(s), Some(f)) if f > 0 => {
            let delta = (s as f64 - f as f64).abs() / f as f64;
            if delta > VBR_RELATIVE_TOLERANCE {
                RateMode::Vbr
            } else {
                RateMode::Cbr
            }
        }
        _ => RateMode::Cbr,
    };

    let sample_rate_hz = audio_stream["sample_rate"]
        .as_str()
        .context("no sample rate found")?
        .parse::<u32>()?;

    let channels = audio_stream["channels"].as_u64().context("no channels found")? as u8;

    let codec = audio_stream["codec_name"].as_str().context("no codec found")?.to_string();

    let duration_secs = if let Some(dur) = audio_stream["duration"].as_str() {
        dur.parse::<f64>()?
    } else {
        json["format"]["duration"]
            .as_str()
            .context("no duration found")?
            .parse::<f64>()?
    };

    Ok(AudioProbe { bitrate_kbps, sample_rate_hz, channels, codec, duration_secs, rate_mode })
}

/// Snap a measured bitrate down to the nearest rung of the quantization
/// ladder that does not exceed it; falls back to the lowest rung below the
/// measured value and the highest rung above it at the extremes.
pub fn quantize_bitrate(measured_kbps: u32) -> u32 {
    BITRATE_LADDER
        .iter()
        .rev()
        .find(|&&rung| rung <= measured_kbps)
        .copied()
        .unwrap_or(BITRATE_LADDER[0])
}
