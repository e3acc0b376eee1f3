// ============================================================================
// hudshift-core/src/render/planner.rs
// ============================================================================
//
// PIPELINE PLANNER: From Edit Description to Ordered Stage Commands
//
// Planning runs every check that can fail before a process is launched:
// spec validation, probing, trim bounds, geometry, bitrate budget. It then
// writes the small files the stages read (caption text, concat manifest)
// into the job's temp scope and emits the stages:
//
//   core    always; the single-pass trim/graph/encode into core.mp4
//   intro   optional; a looped still frame with silent audio
//   concat  with an intro; stream-copies intro + core into the output
//   move    without an intro; publishes core.mp4 as the output
//
// KEY COMPONENTS:
// - PipelinePlanner: builds a RenderPlan for an EditSpec
// - RenderPlan: the stages plus the temp scope that owns their files

use super::encoder::{EncoderPlan, EncoderPlanner};
use super::filter_graph::{FilterGraph, FilterGraphBuilder, GraphInputs, LANDSCAPE_FPS};
use super::stage::{FallbackCommand, Publish, StageCommand, StageKind};
use super::text::{Caption, discover_font, font_size_for};
use super::timing::{TrimWindow, resolve_intro_time};
use crate::config::{CANVAS_HEIGHT, CANVAS_WIDTH, CoreConfig};
use crate::edit::{EditSpec, HardwareEncoder, OutputFormat};
use crate::error::{CoreError, CoreResult};
use crate::external::{FileMetadataProvider, MediaProber, ProbedMedia};
use crate::layout::{CoordinateModel, ResolvedGeometry};
use crate::temp_files::{TempFileScope, partial_output_path};
use crate::utils::{fmt_factor, fmt_secs, format_bytes};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Slack allowed between the requested trim end and the probed duration.
pub const TRIM_END_TOLERANCE_MS: u64 = 50;

pub const CORE_WEIGHT_WITH_INTRO: f64 = 0.8;
pub const INTRO_WEIGHT: f64 = 0.15;
pub const CONCAT_WEIGHT: f64 = 0.05;

const CORE_FILE: &str = "core.mp4";
const INTRO_FILE: &str = "intro.mp4";
const MANIFEST_FILE: &str = "concat.txt";
const CAPTION_FILE: &str = "overlay_text.txt";

/// A fully planned render: the stages and the scratch space they use.
#[derive(Debug, Serialize)]
pub struct RenderPlan {
    pub stages: Vec<StageCommand>,
    pub output_path: PathBuf,
    pub probed: ProbedMedia,
    pub window: TrimWindow,
    pub encoder: EncoderPlan,
    pub filter_graph: FilterGraph,
    pub geometry: Option<ResolvedGeometry>,
    /// Status lines worth showing before the run starts.
    pub notices: Vec<String>,
    #[serde(skip)]
    scope: TempFileScope,
}

impl RenderPlan {
    /// Directory holding the job's intermediate files.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.scope.path()
    }

    /// Sum of all stage weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.stages.iter().map(|s| s.progress_weight).sum()
    }

    pub(crate) fn into_parts(self) -> (Vec<StageCommand>, PathBuf, Vec<String>, TempFileScope) {
        (self.stages, self.output_path, self.notices, self.scope)
    }

    /// Drops the plan and its scratch files without running it.
    pub fn discard(self) -> CoreResult<()> {
        self.scope.release()
    }
}

/// Builds render plans.
pub struct PipelinePlanner<'a, P: MediaProber, M: FileMetadataProvider> {
    config: &'a CoreConfig,
    prober: &'a P,
    metadata: &'a M,
}

impl<'a, P: MediaProber, M: FileMetadataProvider> PipelinePlanner<'a, P, M> {
    pub fn new(config: &'a CoreConfig, prober: &'a P, metadata: &'a M) -> Self {
        Self {
            config,
            prober,
            metadata,
        }
    }

    /// Plans `spec`. Nothing is launched; failures here leave no files behind.
    pub fn plan(&self, spec: &EditSpec) -> CoreResult<RenderPlan> {
        self.config.validate()?;
        spec.validate(self.config)?;

        log::info!("Probing {}", spec.input_path.display());
        let probed = self.prober.probe(&spec.input_path)?;
        log::debug!("Probed source: {probed:?}");
        check_trim_bounds(spec, &probed)?;
        if let Some(music) = &spec.background_music {
            if !music.path.is_file() {
                return Err(CoreError::invalid_spec(
                    "background_music.path",
                    format!("{} is not a readable file", music.path.display()),
                ));
            }
        }

        let source_bytes = if spec.is_highest_quality() {
            let size = self
                .metadata
                .get_size(&spec.input_path)
                .map_err(|e| CoreError::ProbeFailed {
                    path: spec.input_path.clone(),
                    reason: format!("cannot read source size: {e}"),
                })?;
            Some(size)
        } else {
            None
        };
        let encoder = EncoderPlanner::new(self.config).plan(spec, &probed, source_bytes)?;

        let window = TrimWindow::compute(spec, &probed, self.config);
        let caption_text = spec.format.overlay_text();
        let geometry = match &spec.format {
            OutputFormat::Portrait { layout, .. } => {
                let selection = spec.format.selection().unwrap_or_default();
                let reserved = if caption_text.is_some() {
                    self.config.text.reserved_top
                } else {
                    0
                };
                let geometry = CoordinateModel::new(&self.config.geometry)
                    .with_reserved_top(reserved)
                    .to_filter_geometry(&layout.active(selection), probed.resolution())?;
                Some(geometry)
            }
            OutputFormat::Landscape { .. } => None,
        };

        let mut scope = TempFileScope::create(&self.config.temp_root())?;

        let caption = match caption_text {
            Some(text) => Some(Caption {
                text_file: scope.write_file(CAPTION_FILE, text)?,
                font_file: discover_font(&self.config.text),
                font_size: font_size_for(text, &self.config.text),
            }),
            None => None,
        };

        let filter_graph = FilterGraphBuilder::new(self.config).build(&GraphInputs {
            spec,
            probed: &probed,
            window: &window,
            geometry: geometry.as_ref(),
            caption: caption.as_ref(),
        })?;

        let mut notices = Vec::new();
        if encoder.clamped {
            notices.push(format!(
                "Video bitrate raised to the {} kbps floor; the output will exceed its {} target",
                encoder.video_kbps,
                format_bytes(encoder.target_bytes)
            ));
        }

        let core_output = scope.file(CORE_FILE);
        let core_stage = self.core_stage(spec, &window, &encoder, &filter_graph, &core_output);
        let mut stages = Vec::with_capacity(3);

        match spec.intro_still {
            Some(intro) => {
                let at = resolve_intro_time(spec, intro.at, probed.duration_seconds);
                let intro_output = scope.file(INTRO_FILE);
                let manifest = scope.write_file(
                    MANIFEST_FILE,
                    &concat_manifest(&[intro_output.as_path(), core_output.as_path()]),
                )?;
                let partial = partial_output_path(&spec.output_path);
                let intro_stage = self.intro_stage(
                    spec,
                    &probed,
                    at,
                    intro.duration_seconds,
                    &encoder,
                    &intro_output,
                );
                stages.push(StageCommand {
                    progress_weight: CORE_WEIGHT_WITH_INTRO,
                    ..core_stage
                });
                stages.push(intro_stage);
                stages.push(concat_stage(
                    &manifest,
                    &partial,
                    &spec.output_path,
                    encoder.effective_duration,
                ));
            }
            None => {
                stages.push(core_stage);
                stages.push(StageCommand {
                    kind: StageKind::Move,
                    argv: Vec::new(),
                    encoder: None,
                    expects_progress: false,
                    progress_weight: 0.0,
                    expected_duration: 0.0,
                    output: None,
                    fallback: None,
                    publish: Some(Publish {
                        from: core_output.clone(),
                        to: spec.output_path.clone(),
                    }),
                });
            }
        }

        let plan = RenderPlan {
            stages,
            output_path: spec.output_path.clone(),
            probed,
            window,
            encoder,
            filter_graph,
            geometry,
            notices,
            scope,
        };
        check_weights(&plan)?;
        log::info!(
            "Planned {} stage(s) for {} -> {}",
            plan.stages.len(),
            spec.input_path.display(),
            spec.output_path.display()
        );
        Ok(plan)
    }

    fn core_stage(
        &self,
        spec: &EditSpec,
        window: &TrimWindow,
        encoder: &EncoderPlan,
        graph: &FilterGraph,
        output: &Path,
    ) -> StageCommand {
        let clip_seconds = window.output_duration();
        let build = |video_encoder: HardwareEncoder| {
            let mut argv = strings(&["-hide_banner", "-y"]);
            argv.extend(strings(&["-ss", &fmt_secs(window.in_ss), "-t", &fmt_secs(window.in_t)]));
            argv.push("-i".to_string());
            argv.push(path_arg(&spec.input_path));
            if let Some(music) = &spec.background_music {
                argv.push("-i".to_string());
                argv.push(path_arg(&music.path));
            }
            argv.push("-filter_complex".to_string());
            argv.push(graph.filter_complex());
            argv.extend(["-map".to_string(), graph.video_map()]);
            argv.extend(["-map".to_string(), graph.audio_map()]);
            argv.extend(encoder.core_flags(video_encoder, clip_seconds));
            argv.extend(encoder.audio_flags());
            argv.extend(strings(&["-pix_fmt", "yuv420p", "-movflags", "+faststart"]));
            argv.push(path_arg(output));
            argv
        };

        let primary = encoder.primary();
        StageCommand {
            kind: StageKind::Core,
            argv: build(primary),
            encoder: Some(primary),
            expects_progress: true,
            progress_weight: 1.0,
            expected_duration: clip_seconds,
            output: Some(output.to_path_buf()),
            fallback: encoder.fallback().map(|fallback| FallbackCommand {
                encoder: fallback,
                argv: build(fallback),
            }),
            publish: None,
        }
    }

    fn intro_stage(
        &self,
        spec: &EditSpec,
        probed: &ProbedMedia,
        at: f64,
        duration: f64,
        encoder: &EncoderPlan,
        output: &Path,
    ) -> StageCommand {
        let fps = intro_frame_rate(&spec.format, probed);
        let mut video = vec![
            "trim=end_frame=1".to_string(),
            "loop=loop=-1:size=1:start=0".to_string(),
            format!("setpts=N/({}*TB)", fmt_factor(fps)),
        ];
        video.extend(canvas_filters(&spec.format));
        video.push("format=yuv420p".to_string());
        let graph = format!("[0:v]{}[vintro]", video.join(","));
        let silence = "anullsrc=channel_layout=stereo:sample_rate=48000";

        let build = |video_encoder: HardwareEncoder| {
            let mut argv = strings(&["-hide_banner", "-y", "-ss", &fmt_secs(at), "-i"]);
            argv.push(path_arg(&spec.input_path));
            argv.extend(strings(&["-f", "lavfi", "-i", silence]));
            argv.extend(strings(&["-filter_complex", &graph, "-map", "[vintro]", "-map", "1:a"]));
            argv.extend(strings(&["-t", &fmt_secs(duration), "-r", &fmt_factor(fps)]));
            argv.extend(encoder.intro_flags(video_encoder, duration));
            argv.extend(encoder.audio_flags());
            argv.extend(strings(&["-pix_fmt", "yuv420p", "-movflags", "+faststart"]));
            argv.push(path_arg(output));
            argv
        };

        let primary = encoder.primary();
        StageCommand {
            kind: StageKind::Intro,
            argv: build(primary),
            encoder: Some(primary),
            expects_progress: true,
            progress_weight: INTRO_WEIGHT,
            expected_duration: duration,
            output: Some(output.to_path_buf()),
            fallback: encoder.fallback().map(|fallback| FallbackCommand {
                encoder: fallback,
                argv: build(fallback),
            }),
            publish: None,
        }
    }
}

fn concat_stage(manifest: &Path, partial: &Path, output: &Path, duration: f64) -> StageCommand {
    let mut argv = strings(&["-hide_banner", "-y", "-f", "concat", "-safe", "0", "-i"]);
    argv.push(path_arg(manifest));
    argv.extend(strings(&["-c", "copy", "-movflags", "+faststart"]));
    argv.push(path_arg(partial));
    StageCommand {
        kind: StageKind::Concat,
        argv,
        encoder: None,
        expects_progress: false,
        progress_weight: CONCAT_WEIGHT,
        expected_duration: duration,
        output: Some(partial.to_path_buf()),
        fallback: None,
        publish: Some(Publish {
            from: partial.to_path_buf(),
            to: output.to_path_buf(),
        }),
    }
}

/// Filters that bring a still frame onto the same canvas as the core clip.
fn canvas_filters(format: &OutputFormat) -> Vec<String> {
    match format {
        OutputFormat::Portrait { .. } => vec![
            format!("scale=1280:{CANVAS_HEIGHT}:force_original_aspect_ratio=increase"),
            format!("crop=1280:{CANVAS_HEIGHT}"),
            format!("scale={CANVAS_WIDTH}:-2"),
            format!("pad={CANVAS_WIDTH}:{CANVAS_HEIGHT}:(ow-iw)/2:(oh-ih)/2:black"),
        ],
        OutputFormat::Landscape {
            keep_source_res: true,
        } => Vec::new(),
        OutputFormat::Landscape {
            keep_source_res: false,
        } => vec!["scale=-2:1080:flags=lanczos".to_string()],
    }
}

fn intro_frame_rate(format: &OutputFormat, probed: &ProbedMedia) -> f64 {
    match format {
        OutputFormat::Landscape {
            keep_source_res: false,
        } => f64::from(LANDSCAPE_FPS),
        _ => probed
            .frame_rate
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(f64::from(LANDSCAPE_FPS)),
    }
}

/// Concat demuxer manifest listing `files` in order.
#[must_use]
pub fn concat_manifest(files: &[&Path]) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for file in files {
        let path = file.to_string_lossy().replace('\\', "/").replace('\'', "'\\''");
        manifest.push_str(&format!("file '{path}'\n"));
    }
    manifest
}

fn check_trim_bounds(spec: &EditSpec, probed: &ProbedMedia) -> CoreResult<()> {
    let duration_ms = probed.duration_ms();
    if spec.trim_start_ms >= duration_ms {
        return Err(CoreError::invalid_spec(
            "trim_start_ms",
            format!(
                "trim start {} ms is beyond the {duration_ms} ms source",
                spec.trim_start_ms
            ),
        ));
    }
    if spec.trim_end_ms > duration_ms + TRIM_END_TOLERANCE_MS {
        return Err(CoreError::invalid_spec(
            "trim_end_ms",
            format!(
                "trim end {} ms is beyond the {duration_ms} ms source",
                spec.trim_end_ms
            ),
        ));
    }
    Ok(())
}

fn check_weights(plan: &RenderPlan) -> CoreResult<()> {
    let total = plan.total_weight();
    if (total - 1.0).abs() > 1e-9 {
        return Err(CoreError::PlanInvariantBroken(format!(
            "stage weights sum to {total}, not 1.0"
        )));
    }
    Ok(())
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_files_in_order() {
        let manifest = concat_manifest(&[
            Path::new("/tmp/job/intro.mp4"),
            Path::new("/tmp/job/core.mp4"),
        ]);
        assert_eq!(
            manifest,
            "ffconcat version 1.0\nfile '/tmp/job/intro.mp4'\nfile '/tmp/job/core.mp4'\n"
        );
    }

    #[test]
    fn manifest_escapes_quotes() {
        let manifest = concat_manifest(&[Path::new("/tmp/it's/core.mp4")]);
        assert!(manifest.contains("file '/tmp/it'\\''s/core.mp4'"));
    }

    #[test]
    fn intro_rate_follows_core_canvas() {
        let probed = ProbedMedia {
            width: 2560,
            height: 1440,
            duration_seconds: 60.0,
            audio_kbps: None,
            has_audio: true,
            frame_rate: Some(59.94),
        };
        let scaled = OutputFormat::Landscape {
            keep_source_res: false,
        };
        assert_eq!(intro_frame_rate(&scaled, &probed), 60.0);
        let kept = OutputFormat::Landscape {
            keep_source_res: true,
        };
        assert_eq!(intro_frame_rate(&kept, &probed), 59.94);
    }
}
