// hudshift-core/tests/common/mod.rs
//
// Shared fixtures for the integration tests.

#![allow(dead_code)]

use hudshift_core::config::{CoreConfig, CoreConfigBuilder};
use hudshift_core::edit::{EditSpec, HardwareEncoder, OutputFormat};
use hudshift_core::external::ProbedMedia;
use hudshift_core::layout::HudLayout;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch workspace: source file, output directory and temp root.
pub struct Workspace {
    pub dir: TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
    pub temp_root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("raid.mp4");
        fs::write(&input, b"source video").expect("write source");
        let out_dir = dir.path().join("out");
        fs::create_dir_all(&out_dir).expect("create out dir");
        let temp_root = dir.path().join("scratch");
        Self {
            output: out_dir.join("raid_short.mp4"),
            input,
            temp_root,
            dir,
        }
    }

    pub fn config(&self) -> CoreConfig {
        CoreConfigBuilder::new().temp_root(&self.temp_root).build()
    }

    /// Writes a dummy music file and returns its path.
    pub fn music(&self) -> PathBuf {
        let path = self.dir.path().join("bgm.mp3");
        fs::write(&path, b"music").expect("write music");
        path
    }

    /// Entries left under the temp root.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        entries(&self.temp_root)
    }

    /// Entries in the output directory.
    pub fn output_entries(&self) -> Vec<PathBuf> {
        entries(self.output.parent().expect("output parent"))
    }
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(read) => read.filter_map(Result::ok).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn probed(width: u32, height: u32, duration_seconds: f64) -> ProbedMedia {
    ProbedMedia {
        width,
        height,
        duration_seconds,
        audio_kbps: Some(160),
        has_audio: true,
        frame_rate: Some(60.0),
    }
}

pub fn portrait(teammates_visible: bool, boss_hp: bool) -> OutputFormat {
    OutputFormat::Portrait {
        layout: HudLayout::reference(),
        teammates_visible,
        boss_hp,
        overlay_text: None,
    }
}

pub fn spec(
    ws: &Workspace,
    trim_start_ms: u64,
    trim_end_ms: u64,
    format: OutputFormat,
) -> EditSpec {
    EditSpec {
        input_path: ws.input.clone(),
        trim_start_ms,
        trim_end_ms,
        speed_factor: 1.0,
        format,
        quality_level: 2,
        background_music: None,
        intro_still: None,
        disable_fades: false,
        hardware_strategy: vec![HardwareEncoder::Cpu],
        output_path: ws.output.clone(),
    }
}

/// Whether `values` never decrease and stay within 0..=100.
pub fn is_monotonic_percent(values: &[u8]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1]) && values.iter().all(|v| *v <= 100)
}
