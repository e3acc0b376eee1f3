// ============================================================================
// hudshift-core/src/render/filter_graph.rs
// ============================================================================
//
// FILTER GRAPH: The Single-Pass Video and Audio Graph of the Core Stage
//
// Portrait renders split the source into the main view plus one branch per
// active HUD element. The main view is cropped to a 1280x1920 canvas and
// faded; each element is cropped, outlined, scaled and converted to an alpha
// format, then overlaid in z order. The composite is letterboxed onto the
// 1080x1920 canvas, time-warped and captioned. Landscape renders are a single
// chain. The audio graph comes from `audio::AudioGraph`.
//
// The builder is a pure function of its inputs, so the same inputs always
// yield a byte-identical graph.
//
// KEY COMPONENTS:
// - FilterGraph: video and audio filter strings plus their output labels
// - FilterGraphBuilder: builds the graph for one render
// - GraphInputs: everything the builder reads

use super::audio::{AudioGraph, GameAudio};
use super::text::Caption;
use super::timing::TrimWindow;
use crate::config::{CANVAS_HEIGHT, CANVAS_WIDTH, CoreConfig};
use crate::edit::{EditSpec, OutputFormat};
use crate::error::{CoreError, CoreResult};
use crate::external::ProbedMedia;
use crate::layout::ResolvedGeometry;
use crate::utils::{fmt_factor, fmt_secs};
use serde::Serialize;
use std::collections::HashSet;

/// Label of the finished video stream.
pub const VIDEO_OUT_LABEL: &str = "vcore";
/// Label of the finished audio stream.
pub const AUDIO_OUT_LABEL: &str = "acore";

/// Width of the intermediate main-view canvas.
pub const MAIN_VIEW_WIDTH: u32 = 1280;

/// Frame rate of scaled landscape renders.
pub const LANDSCAPE_FPS: u32 = 60;

/// The `-filter_complex` content of a core stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterGraph {
    pub video_filter: String,
    pub audio_filter: String,
    pub video_label: String,
    pub audio_label: String,
}

impl FilterGraph {
    /// Video and audio graphs joined into one `-filter_complex` argument.
    #[must_use]
    pub fn filter_complex(&self) -> String {
        format!("{};{}", self.video_filter, self.audio_filter)
    }

    /// `-map` argument of the video output.
    #[must_use]
    pub fn video_map(&self) -> String {
        format!("[{}]", self.video_label)
    }

    /// `-map` argument of the audio output.
    #[must_use]
    pub fn audio_map(&self) -> String {
        format!("[{}]", self.audio_label)
    }
}

/// Inputs of one graph build.
pub struct GraphInputs<'a> {
    pub spec: &'a EditSpec,
    pub probed: &'a ProbedMedia,
    pub window: &'a TrimWindow,
    /// Required for portrait renders.
    pub geometry: Option<&'a ResolvedGeometry>,
    pub caption: Option<&'a Caption>,
}

pub struct FilterGraphBuilder<'a> {
    config: &'a CoreConfig,
}

impl<'a> FilterGraphBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a CoreConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, inputs: &GraphInputs<'_>) -> CoreResult<FilterGraph> {
        let video_filter = match &inputs.spec.format {
            OutputFormat::Portrait { .. } => {
                let geometry = inputs.geometry.ok_or_else(|| {
                    CoreError::PlanInvariantBroken(
                        "portrait graph requested without resolved geometry".to_string(),
                    )
                })?;
                self.portrait_video(inputs.window, geometry, inputs.caption)?
            }
            OutputFormat::Landscape { keep_source_res } => {
                landscape_video(inputs.window, *keep_source_res)
            }
        };

        let game = if inputs.probed.has_audio {
            GameAudio::Source
        } else {
            GameAudio::Silent {
                duration: inputs.window.output_duration(),
            }
        };
        let audio_filter = AudioGraph {
            game,
            speed: inputs.window.speed,
            output_duration: inputs.window.output_duration(),
            music: inputs.spec.background_music.as_ref(),
            ducking: &self.config.ducking,
            out_label: AUDIO_OUT_LABEL,
        }
        .build();

        let graph = FilterGraph {
            video_filter,
            audio_filter,
            video_label: VIDEO_OUT_LABEL.to_string(),
            audio_label: AUDIO_OUT_LABEL.to_string(),
        };
        check_labels(&graph.filter_complex())?;
        log::debug!("Filter graph: {}", graph.filter_complex());
        Ok(graph)
    }

    fn portrait_video(
        &self,
        window: &TrimWindow,
        geometry: &ResolvedGeometry,
        caption: Option<&Caption>,
    ) -> CoreResult<String> {
        let elements = &geometry.elements;
        let mut chains = Vec::with_capacity(elements.len() * 2 + 3);

        let branch_labels: String = (1..=elements.len()).map(|i| format!("[e{i}]")).collect();
        chains.push(format!("[0:v]split={}[main]{branch_labels}", elements.len() + 1));

        let mut main = Vec::new();
        if window.fade_in > 0.0 {
            main.push(format!("fade=t=in:st=0:d={}", fmt_secs(window.fade_in)));
        }
        main.push(format!(
            "scale={MAIN_VIEW_WIDTH}:{CANVAS_HEIGHT}:force_original_aspect_ratio=increase"
        ));
        main.push(format!("crop={MAIN_VIEW_WIDTH}:{CANVAS_HEIGHT}"));
        if window.fade_out > 0.0 {
            main.push(format!(
                "fade=t=out:st={}:d={}",
                fmt_secs(window.fade_out_start()),
                fmt_secs(window.fade_out)
            ));
        }
        chains.push(format!("[main]{}[base]", main.join(",")));

        for (index, element) in elements.iter().enumerate() {
            let crop = element.crop;
            chains.push(format!(
                "[e{n}]crop={}:{}:{}:{},drawbox=t=2:c=black,scale={}:{},format=yuva444p[e{n}_scaled]",
                crop.w,
                crop.h,
                crop.x,
                crop.y,
                element.scaled_w,
                element.scaled_h,
                n = index + 1,
            ));
        }

        let mut previous = "base".to_string();
        for (index, element) in elements.iter().enumerate() {
            let n = index + 1;
            chains.push(format!(
                "[{previous}][e{n}_scaled]overlay={}:{}[t{n}]",
                element.overlay_x, element.overlay_y
            ));
            previous = format!("t{n}");
        }

        let mut tail = vec![
            format!("scale={CANVAS_WIDTH}:-2"),
            format!("pad={CANVAS_WIDTH}:{CANVAS_HEIGHT}:(ow-iw)/2:(oh-ih)/2:black"),
        ];
        if let Some(setpts) = setpts_filter(window.speed) {
            tail.push(setpts);
        }
        if let Some(caption) = caption {
            tail.push(caption.drawtext_filter(&self.config.text));
        }
        chains.push(format!("[{previous}]{}[{VIDEO_OUT_LABEL}]", tail.join(",")));

        Ok(chains.join(";"))
    }
}

fn landscape_video(window: &TrimWindow, keep_source_res: bool) -> String {
    let mut filters = Vec::new();
    if keep_source_res {
        filters.push("scale=iw:ih".to_string());
    } else {
        filters.push("scale=-2:1080:flags=lanczos".to_string());
        filters.push(format!("fps={LANDSCAPE_FPS}"));
    }
    if let Some(setpts) = setpts_filter(window.speed) {
        filters.push(setpts);
    }
    // After setpts the clock runs in output time.
    if window.fade_in > 0.0 {
        filters.push(format!(
            "fade=t=in:st=0:d={}",
            fmt_secs(window.fade_in / window.speed)
        ));
    }
    if window.fade_out > 0.0 {
        filters.push(format!(
            "fade=t=out:st={}:d={}",
            fmt_secs(window.fade_out_start() / window.speed),
            fmt_secs(window.fade_out / window.speed)
        ));
    }
    format!("[0:v]{}[{VIDEO_OUT_LABEL}]", filters.join(","))
}

fn setpts_filter(speed: f64) -> Option<String> {
    if (speed - 1.0).abs() < f64::EPSILON {
        None
    } else {
        Some(format!("setpts=PTS/{}", fmt_factor(speed)))
    }
}

/// Every output label must be produced exactly once.
fn check_labels(graph: &str) -> CoreResult<()> {
    let mut produced = HashSet::new();
    for chain in graph.split(';') {
        // Trailing labels follow the last filter of the chain.
        let mut rest = chain;
        while rest.ends_with(']') {
            let Some(open) = rest.rfind('[') else {
                break;
            };
            let label = &rest[open + 1..rest.len() - 1];
            if !produced.insert(label.to_string()) {
                return Err(CoreError::PlanInvariantBroken(format!(
                    "filter label [{label}] is produced twice"
                )));
            }
            rest = &rest[..open];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryConfig;
    use crate::edit::{HardwareEncoder, MusicTrack};
    use crate::layout::{CoordinateModel, HudLayout, HudSelection, SourceResolution};
    use std::path::PathBuf;

    fn spec(format: OutputFormat) -> EditSpec {
        EditSpec {
            input_path: PathBuf::from("in.mp4"),
            trim_start_ms: 10_000,
            trim_end_ms: 40_000,
            speed_factor: 1.0,
            format,
            quality_level: 2,
            background_music: None,
            intro_still: None,
            disable_fades: false,
            hardware_strategy: vec![HardwareEncoder::Cpu],
            output_path: PathBuf::from("out.mp4"),
        }
    }

    fn portrait(teammates_visible: bool, boss_hp: bool) -> OutputFormat {
        OutputFormat::Portrait {
            layout: HudLayout::reference(),
            teammates_visible,
            boss_hp,
            overlay_text: None,
        }
    }

    fn media(width: u32, height: u32) -> ProbedMedia {
        ProbedMedia {
            width,
            height,
            duration_seconds: 600.0,
            audio_kbps: Some(160),
            has_audio: true,
            frame_rate: Some(60.0),
        }
    }

    fn build(spec: &EditSpec, probed: &ProbedMedia) -> FilterGraph {
        let config = CoreConfig::default();
        let window = TrimWindow::compute(spec, probed, &config);
        let geometry = spec.format.selection().map(|selection| {
            let layout = match &spec.format {
                OutputFormat::Portrait { layout, .. } => layout.active(selection),
                OutputFormat::Landscape { .. } => HudLayout::new(),
            };
            CoordinateModel::new(&GeometryConfig::default())
                .to_filter_geometry(&layout, SourceResolution::new(probed.width, probed.height))
                .expect("geometry")
        });
        FilterGraphBuilder::new(&config)
            .build(&GraphInputs {
                spec,
                probed,
                window: &window,
                geometry: geometry.as_ref(),
                caption: None,
            })
            .expect("graph")
    }

    #[test]
    fn portrait_graph_has_one_branch_per_element() {
        let spec = spec(portrait(false, false));
        let graph = build(&spec, &media(1920, 1080));
        assert!(graph.video_filter.starts_with("[0:v]split=4[main][e1][e2][e3];"));
        assert_eq!(graph.video_filter.matches("overlay=").count(), 3);
        assert_eq!(graph.video_filter.matches("format=yuva444p").count(), 3);
        assert!(graph.video_filter.contains(
            "[main]fade=t=in:st=0:d=1.5,scale=1280:1920:force_original_aspect_ratio=increase,crop=1280:1920,fade=t=out:st=31.5:d=1.5[base]"
        ));
        assert!(graph
            .video_filter
            .ends_with("scale=1080:-2,pad=1080:1920:(ow-iw)/2:(oh-ih)/2:black[vcore]"));
        assert!(!graph.audio_filter.contains("amix"));
    }

    #[test]
    fn hud_selection_controls_branch_count() {
        let spec = spec(portrait(true, true));
        let graph = build(&spec, &media(3440, 1440));
        assert!(graph.video_filter.starts_with("[0:v]split=5[main][e1][e2][e3][e4];"));
        assert_eq!(graph.video_filter.matches("overlay=").count(), 4);
    }

    #[test]
    fn overlays_follow_z_order() {
        let spec = spec(portrait(true, false));
        let graph = build(&spec, &media(1920, 1080));
        // Team (z0) is composited first, Stats (z3) last.
        let first = graph.video_filter.find("[base][e1_scaled]").expect("first overlay");
        let last = graph.video_filter.find("[t3][e4_scaled]").expect("last overlay");
        assert!(first < last);
        assert!(graph.video_filter.contains("[e1]crop=260:200:20:560,"));
    }

    #[test]
    fn speed_goes_after_letterbox() {
        let mut spec = spec(portrait(false, false));
        spec.speed_factor = 1.5;
        let graph = build(&spec, &media(1920, 1080));
        assert!(graph.video_filter.contains(":black,setpts=PTS/1.5[vcore]"));
        assert!(graph.audio_filter.starts_with("[0:a]atempo=1.5,"));
    }

    #[test]
    fn landscape_passthrough_is_a_single_chain() {
        let mut spec = spec(OutputFormat::Landscape {
            keep_source_res: true,
        });
        spec.trim_start_ms = 60_000;
        spec.trim_end_ms = 75_000;
        spec.speed_factor = 2.0;
        let graph = build(&spec, &media(2560, 1440));
        assert_eq!(
            graph.video_filter,
            "[0:v]scale=iw:ih,setpts=PTS/2.0,fade=t=in:st=0:d=0.75,fade=t=out:st=8.25:d=0.75[vcore]"
        );
        assert_eq!(graph.audio_filter.matches("atempo=").count(), 1);
        assert!(graph.audio_filter.contains("atempo=2.0"));
    }

    #[test]
    fn scaled_landscape_runs_at_sixty_fps() {
        let mut spec = spec(OutputFormat::Landscape {
            keep_source_res: false,
        });
        spec.disable_fades = true;
        let graph = build(&spec, &media(3840, 2160));
        assert_eq!(graph.video_filter, "[0:v]scale=-2:1080:flags=lanczos,fps=60[vcore]");
    }

    #[test]
    fn music_adds_second_input_mix() {
        let mut spec = spec(portrait(false, false));
        spec.background_music = Some(MusicTrack {
            path: PathBuf::from("bgm.mp3"),
            volume: 0.35,
            offset_seconds: 5.0,
        });
        let graph = build(&spec, &media(1920, 1080));
        assert!(graph.audio_filter.contains("[1:a]atrim=start=5:duration=33"));
        assert!(graph.audio_filter.contains("sidechaincompress"));
    }

    #[test]
    fn same_inputs_give_identical_graphs() {
        let spec = spec(portrait(true, true));
        let probed = media(2560, 1440);
        assert_eq!(build(&spec, &probed), build(&spec, &probed));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        assert!(check_labels("[0:v]split=2[a][a]").is_err());
        assert!(check_labels("[0:v]null[a];[a]null[b]").is_ok());
    }
}
