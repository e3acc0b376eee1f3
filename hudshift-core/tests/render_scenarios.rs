// hudshift-core/tests/render_scenarios.rs
//
// End-to-end renders through the planner and executor with mocked tools.

mod common;

use common::{Workspace, is_monotonic_percent, portrait, probed, spec};
use hudshift_core::cancel::CancelToken;
use hudshift_core::edit::{HardwareEncoder, IntroStill, IntroTime, MusicTrack, OutputFormat};
use hudshift_core::error::ErrorKind;
use hudshift_core::external::EncoderEvent;
use hudshift_core::external::mocks::{
    MockEncoderSpawner, MockMediaProber, MockMetadataProvider, MockProcessScript, progress_events,
};
use hudshift_core::progress_reporting::RecordingObserver;
use hudshift_core::render::{PipelinePlanner, StageKind, render_job};
use std::thread;
use std::time::{Duration, Instant};

fn planned_bytes(video_kbps: u32, audio_kbps: u32, seconds: f64) -> f64 {
    f64::from(video_kbps + audio_kbps) * 1024.0 / 8.0 * seconds
}

#[test]
fn portrait_standard_render() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 120.0));
    let metadata = MockMetadataProvider::new();
    let job = spec(&ws, 10_000, 40_000, portrait(false, false));

    let plan = PipelinePlanner::new(&config, &prober, &metadata)
        .plan(&job)
        .expect("plan");
    let video = &plan.filter_graph.video_filter;
    assert!(video.starts_with("[0:v]split=4[main][e1][e2][e3];"), "{video}");
    assert_eq!(video.matches("]overlay=").count(), 3);
    assert!(video.contains("pad=1080:1920:(ow-iw)/2:(oh-ih)/2:black[vcore]"));
    assert!(!plan.filter_graph.audio_filter.contains("amix"));
    assert!((plan.encoder.effective_duration - 30.0).abs() < 0.1);
    let bytes = planned_bytes(plan.encoder.video_kbps, plan.encoder.audio_kbps, 30.0);
    let mb = bytes / 1_000_000.0;
    assert!((25.0..=65.0).contains(&mb), "planned {mb:.1} MB");
    plan.discard().expect("discard");

    let spawner = MockEncoderSpawner::new();
    spawner.add_success_expectation("libx264", progress_events(&[8.0, 16.5, 24.0, 33.0]));
    let observer = RecordingObserver::new();
    let result = render_job(
        &config,
        &spawner,
        &prober,
        &metadata,
        &job,
        &observer,
        &CancelToken::new(),
    );

    assert!(result.is_success(), "{result:?}");
    assert!(ws.output.is_file());
    assert_eq!(observer.results().len(), 1);
    let progress = observer.progress();
    assert!(is_monotonic_percent(&progress));
    assert_eq!(progress.last(), Some(&100));
    assert!(ws.scratch_entries().is_empty(), "{:?}", ws.scratch_entries());
    assert_eq!(spawner.get_received_calls().len(), 1);
}

#[test]
fn ultrawide_boss_fight_with_music() {
    let ws = Workspace::new();
    let config = ws.config();
    let source_bytes = 60 * 1024 * 1024;
    let prober = MockMediaProber::new().with(&ws.input, probed(3440, 1440, 95.0));
    let metadata = MockMetadataProvider::new().with(&ws.input, source_bytes);
    let mut job = spec(&ws, 0, 20_000, portrait(true, true));
    job.quality_level = 4;
    job.background_music = Some(MusicTrack {
        path: ws.music(),
        volume: 0.35,
        offset_seconds: 5.0,
    });

    let plan = PipelinePlanner::new(&config, &prober, &metadata)
        .plan(&job)
        .expect("plan");
    let video = &plan.filter_graph.video_filter;
    assert!(video.starts_with("[0:v]split=5[main][e1][e2][e3][e4];"), "{video}");
    assert_eq!(video.matches("]overlay=").count(), 4);
    assert!(!video.contains("fade=t=in"));
    assert_eq!(plan.window.in_ss, 0.0);

    let audio = &plan.filter_graph.audio_filter;
    assert!(audio.contains("sidechaincompress="));
    assert!(audio.contains("amix=inputs=2"));
    assert!(audio.contains("atrim=start=5"));
    assert!(audio.contains("volume=0.35"));

    let bytes = planned_bytes(plan.encoder.video_kbps, plan.encoder.audio_kbps, 20.0);
    let deviation = (bytes - source_bytes as f64).abs() / source_bytes as f64;
    assert!(deviation < 0.2, "planned {bytes} bytes for a {source_bytes} byte source");

    let core = &plan.stages[0];
    assert_eq!(core.kind, StageKind::Core);
    assert_eq!(core.argv.iter().filter(|a| *a == "-i").count(), 2);
    assert!(core.argv.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
    plan.discard().expect("discard");
}

#[test]
fn landscape_passthrough_at_double_speed() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(2560, 1440, 180.0));
    let metadata = MockMetadataProvider::new();
    let mut job = spec(
        &ws,
        60_000,
        75_000,
        OutputFormat::Landscape {
            keep_source_res: true,
        },
    );
    job.speed_factor = 2.0;
    job.quality_level = 3;

    let plan = PipelinePlanner::new(&config, &prober, &metadata)
        .plan(&job)
        .expect("plan");
    let video = &plan.filter_graph.video_filter;
    assert!(video.starts_with("[0:v]scale=iw:ih,setpts=PTS/2.0,fade="), "{video}");
    assert!(plan.geometry.is_none());

    let audio = &plan.filter_graph.audio_filter;
    assert_eq!(audio.matches("atempo=").count(), 1);
    assert!(audio.contains("atempo=2.0"));
    assert!((plan.encoder.effective_duration - 7.5).abs() < 1e-9);
    plan.discard().expect("discard");
}

#[test]
fn tiny_clip_keeps_fades_proportional() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 60.0));
    let metadata = MockMetadataProvider::new();
    let mut job = spec(&ws, 5_000, 5_100, portrait(false, false));
    job.quality_level = 0;

    let plan = PipelinePlanner::new(&config, &prober, &metadata)
        .plan(&job)
        .expect("plan");
    let window = plan.window;
    assert!((window.fade_in - 0.1 / 3.0).abs() < 1e-9);
    assert!((window.fade_out - 0.1 / 3.0).abs() < 1e-9);
    assert!(window.fade_out_start() >= 0.0);
    assert!(window.output_duration().is_finite());
    assert!(plan.filter_graph.video_filter.contains("fade=t=in:st=0:d=0.033"));
    plan.discard().expect("discard");
}

#[test]
fn encoder_fallback_retries_on_cpu() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 120.0));
    let metadata = MockMetadataProvider::new();
    let mut job = spec(&ws, 10_000, 40_000, portrait(false, false));
    job.hardware_strategy = vec![HardwareEncoder::Nvenc, HardwareEncoder::Cpu];

    let spawner = MockEncoderSpawner::new();
    let mut failing = progress_events(&[6.0, 12.0]);
    failing.push(EncoderEvent::Error("No NVENC capable devices found".to_string()));
    spawner.add_exit_error_expectation("h264_nvenc", failing, 1);
    spawner.add_success_expectation("libx264", progress_events(&[3.0, 15.0, 33.0]));
    let observer = RecordingObserver::new();

    let result = render_job(
        &config,
        &spawner,
        &prober,
        &metadata,
        &job,
        &observer,
        &CancelToken::new(),
    );

    assert!(result.is_success(), "{result:?}");
    let statuses = observer.statuses();
    assert!(
        statuses.iter().any(|s| s == "GPU failed, retrying with CPU (libx264)"),
        "{statuses:?}"
    );
    let calls = spawner.get_received_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].iter().any(|a| a == "h264_nvenc"));
    assert!(calls[1].iter().any(|a| a == "libx264"));
    assert!(is_monotonic_percent(&observer.progress()));
    assert_eq!(observer.progress().last(), Some(&100));
    assert!(ws.output.is_file());
    assert!(spawner.pending_patterns().is_empty());
}

#[test]
fn cancellation_mid_core_leaves_nothing_behind() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 120.0));
    let metadata = MockMetadataProvider::new();
    let job = spec(&ws, 10_000, 40_000, portrait(false, false));
    let cancel = CancelToken::new();

    let spawner = MockEncoderSpawner::new();
    spawner.add_expectation(
        "libx264",
        Ok(MockProcessScript {
            events: progress_events(&[5.0, 10.0, 15.0, 20.0]),
            exit_code: Some(0),
            cancel_after: Some((2, cancel.clone())),
            stall: None,
        }),
        true,
    );
    let observer = RecordingObserver::new();

    let result = render_job(&config, &spawner, &prober, &metadata, &job, &observer, &cancel);

    assert!(result.is_cancelled(), "{result:?}");
    assert!(result.output_path().is_none());
    assert!(!ws.output.exists());
    assert_eq!(spawner.terminations(), 1);
    assert!(ws.scratch_entries().is_empty(), "{:?}", ws.scratch_entries());
    assert!(ws.output_entries().is_empty(), "{:?}", ws.output_entries());
    assert_eq!(observer.results().len(), 1);
    assert!(is_monotonic_percent(&observer.progress()));
}

#[test]
fn silent_encoder_is_stopped_soon_after_cancel() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 120.0));
    let metadata = MockMetadataProvider::new();
    let job = spec(&ws, 10_000, 40_000, portrait(false, false));
    let cancel = CancelToken::new();

    let spawner = MockEncoderSpawner::new();
    spawner.add_expectation(
        "libx264",
        Ok(MockProcessScript::stalled(Duration::from_secs(30))),
        true,
    );
    let observer = RecordingObserver::new();

    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        remote.cancel();
    });
    let started = Instant::now();
    let result = render_job(&config, &spawner, &prober, &metadata, &job, &observer, &cancel);
    let elapsed = started.elapsed();
    canceller.join().expect("canceller thread");

    assert!(result.is_cancelled(), "{result:?}");
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert_eq!(spawner.terminations(), 1);
    assert!(!ws.output.exists());
    assert!(ws.scratch_entries().is_empty(), "{:?}", ws.scratch_entries());
    assert_eq!(observer.results().len(), 1);
}

#[test]
fn intro_still_is_concatenated_after_fallback() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 120.0));
    let metadata = MockMetadataProvider::new();
    let mut job = spec(&ws, 10_000, 40_000, portrait(false, false));
    job.hardware_strategy = vec![HardwareEncoder::Nvenc, HardwareEncoder::Cpu];
    job.intro_still = Some(IntroStill {
        duration_seconds: 1.5,
        at: IntroTime::FromMidpoint,
    });

    let spawner = MockEncoderSpawner::new();
    spawner.add_exit_error_expectation("h264_nvenc", Vec::new(), 1);
    spawner.add_success_expectation("core.mp4", progress_events(&[16.0, 33.0]));
    spawner.add_success_expectation("intro.mp4", progress_events(&[0.5, 1.5]));
    spawner.add_success_expectation("concat", Vec::new());
    let observer = RecordingObserver::new();

    let result = render_job(
        &config,
        &spawner,
        &prober,
        &metadata,
        &job,
        &observer,
        &CancelToken::new(),
    );

    assert!(result.is_success(), "{result:?}");
    let calls = spawner.get_received_calls();
    assert_eq!(calls.len(), 4);
    // Once downshifted, the intro starts on the fallback encoder.
    assert!(calls[1].iter().any(|a| a == "libx264"));
    assert!(calls[2].iter().any(|a| a == "libx264"));
    assert!(!calls[2].iter().any(|a| a == "h264_nvenc"));
    assert!(calls[2].iter().any(|a| a == "-ss"));
    assert!(calls[3].windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
    assert!(ws.output.is_file());
    assert_eq!(ws.output_entries(), vec![ws.output.clone()]);
    assert!(ws.scratch_entries().is_empty());
    let progress = observer.progress();
    assert!(is_monotonic_percent(&progress));
    assert!(progress.contains(&80));
    assert!(progress.contains(&95));
    assert_eq!(progress.last(), Some(&100));
}

#[test]
fn concat_failure_removes_partial_output() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 120.0));
    let metadata = MockMetadataProvider::new();
    let mut job = spec(&ws, 10_000, 40_000, portrait(false, false));
    job.intro_still = Some(IntroStill {
        duration_seconds: 1.0,
        at: IntroTime::Absolute(12.0),
    });

    let spawner = MockEncoderSpawner::new();
    spawner.add_success_expectation("core.mp4", progress_events(&[33.0]));
    spawner.add_success_expectation("intro.mp4", progress_events(&[1.0]));
    spawner.add_expectation(
        "concat",
        Ok(MockProcessScript::failure(
            vec![EncoderEvent::Error("Invalid data found when processing input".to_string())],
            1,
        )),
        true,
    );
    let observer = RecordingObserver::new();

    let result = render_job(
        &config,
        &spawner,
        &prober,
        &metadata,
        &job,
        &observer,
        &CancelToken::new(),
    );

    assert_eq!(result.kind(), Some(ErrorKind::ConcatFailed));
    assert!(ws.output_entries().is_empty(), "{:?}", ws.output_entries());
    assert!(ws.scratch_entries().is_empty());
    match &observer.results()[0] {
        hudshift_core::RenderResult::Failed(failure) => {
            assert_eq!(failure.stage, Some(StageKind::Concat));
            assert_eq!(failure.tail, vec!["Invalid data found when processing input"]);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn cpu_failure_without_fallback_is_reported_with_tail() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 120.0));
    let metadata = MockMetadataProvider::new();
    let job = spec(&ws, 10_000, 40_000, portrait(false, false));

    let spawner = MockEncoderSpawner::new();
    spawner.add_exit_error_expectation(
        "libx264",
        vec![EncoderEvent::Error("Conversion failed!".to_string())],
        1,
    );
    let observer = RecordingObserver::new();

    let result = render_job(
        &config,
        &spawner,
        &prober,
        &metadata,
        &job,
        &observer,
        &CancelToken::new(),
    );

    assert_eq!(result.kind(), Some(ErrorKind::EncoderFailed));
    assert_eq!(spawner.get_received_calls().len(), 1);
    assert!(!ws.output.exists());
    assert!(ws.scratch_entries().is_empty());
}

#[test]
fn planning_failures_launch_nothing() {
    let ws = Workspace::new();
    let config = ws.config();
    let prober = MockMediaProber::new().with(&ws.input, probed(1920, 1080, 30.0));
    let metadata = MockMetadataProvider::new();
    let job = spec(&ws, 10_000, 40_000, portrait(false, false));
    let spawner = MockEncoderSpawner::new();
    let observer = RecordingObserver::new();

    let result = render_job(
        &config,
        &spawner,
        &prober,
        &metadata,
        &job,
        &observer,
        &CancelToken::new(),
    );

    assert_eq!(result.kind(), Some(ErrorKind::InvalidEditSpec));
    assert!(spawner.get_received_calls().is_empty());
    assert_eq!(observer.results().len(), 1);
    assert!(ws.scratch_entries().is_empty());
}
