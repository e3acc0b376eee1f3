// ============================================================================
// hudshift-core/src/render/mod.rs
// ============================================================================
//
// RENDER: Planning and Executing Gameplay Renders
//
// A render goes through two phases. The planner validates the edit, probes
// the source, resolves trim/speed/fade timing, HUD geometry and the bitrate
// budget, and emits a RenderPlan of ordered stage commands. The executor then
// runs those commands one at a time, reporting progress to an observer.
//
// KEY COMPONENTS:
// - render_job: plan + execute with a single terminal result
// - PipelinePlanner / RenderPlan (planner)
// - PipelineExecutor (executor)
// - FilterGraphBuilder (filter_graph), AudioGraph (audio), Caption (text)
// - EncoderPlanner (encoder), TrimWindow (timing)
// - RenderResult (result), StageCommand (stage)

pub mod audio;
pub mod encoder;
pub mod executor;
pub mod filter_graph;
pub mod planner;
pub mod result;
pub mod stage;
pub mod text;
pub mod timing;

pub use audio::{AudioGraph, GameAudio, atempo_chain, atempo_filter};
pub use encoder::{EncoderPlan, EncoderPlanner};
pub use executor::{PipelineExecutor, publish_output};
pub use filter_graph::{FilterGraph, FilterGraphBuilder, GraphInputs};
pub use planner::{PipelinePlanner, RenderPlan, concat_manifest};
pub use result::{RenderFailure, RenderResult, RenderSuccess};
pub use stage::{FallbackCommand, Publish, StageCommand, StageKind};
pub use text::{Caption, discover_font, font_size_for};
pub use timing::{TrimWindow, resolve_intro_time};

use crate::cancel::CancelToken;
use crate::config::CoreConfig;
use crate::edit::EditSpec;
use crate::error::CoreError;
use crate::external::{EncoderSpawner, FileMetadataProvider, MediaProber};
use crate::progress_reporting::RenderObserver;
use std::time::Instant;

/// Plans and runs one render job.
///
/// Planning failures become a `Failed` result without launching anything.
/// `observer.on_finished` is called exactly once whatever happens.
pub fn render_job<S, P, M>(
    config: &CoreConfig,
    spawner: &S,
    prober: &P,
    metadata: &M,
    spec: &EditSpec,
    observer: &dyn RenderObserver,
    cancel: &CancelToken,
) -> RenderResult
where
    S: EncoderSpawner,
    P: MediaProber,
    M: FileMetadataProvider,
{
    let started = Instant::now();
    observer.on_status("Planning render");

    let plan = match PipelinePlanner::new(config, prober, metadata).plan(spec) {
        Ok(plan) => plan,
        Err(error) => {
            log::error!("Planning failed: {error}");
            let result = RenderResult::failed(&error, started.elapsed().as_millis() as u64);
            observer.on_finished(&result);
            return result;
        }
    };

    if cancel.is_cancelled() {
        if let Err(e) = plan.discard() {
            log::warn!("Could not remove scratch files of cancelled render: {e}");
        }
        let error = CoreError::Cancelled {
            stage: StageKind::Core,
        };
        let result = RenderResult::failed(&error, started.elapsed().as_millis() as u64);
        observer.on_finished(&result);
        return result;
    }

    PipelineExecutor::new(spawner, config).run(plan, observer, cancel)
}
