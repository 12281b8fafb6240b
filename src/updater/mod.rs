//! Font asset rebuild orchestration
//!
//! [`FontAssetUpdater`] regenerates one configuration's atlas:
//! initialize the engine, load the font, set the size, render the unique
//! characters on a worker thread, then back on the dispatcher's thread
//! build the glyph report, texture, glyph, face and kerning tables and
//! write them into every target asset.
//!
//! Failures never panic. They are logged, reported, and the completion
//! callback still fires with the error.

pub mod batch;
pub mod convert;
pub mod persist;
pub mod report;

pub use batch::{run_batch, BatchResult, RebuildOutcome};
pub use report::GlyphReport;

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::asset::{AssetStore, SharedStore, StoreError};
use crate::config::{resolve_path, FontConfig};
use crate::dispatch::DispatchHandle;
use crate::engine::{EngineCode, EngineLease, EngineSlot, RenderRequest, RenderTarget};
use crate::output::OutputError;
use crate::progress::{ProgressEvent, ProgressReporter, RebuildStatus};

use convert::{
    atlas_texture, build_kerning_table, convert_face_info, convert_glyphs, unique_characters,
    SCALE_DOWN,
};
use persist::{AtlasUpdate, SaveOutcome};

/// Upper bound on kerning pairs requested from the engine.
pub const MAX_KERNING_PAIRS: usize = 7500;

/// Why a rebuild stopped early.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RebuildError {
    #[error("Font engine failed to initialize (code {0})")]
    Initialize(EngineCode),
    #[error("Font engine could not load {path} (code {code})")]
    LoadFont { path: PathBuf, code: EngineCode },
    #[error("Font engine rejected point size {size} (code {code})")]
    SetSize { size: u32, code: EngineCode },
    #[error("Font engine is in use by another rebuild")]
    EngineBusy,
    #[error("Source font not found: {0}")]
    MissingFont(PathBuf),
    #[error("Failed to read character list {path}: {source}")]
    CharacterList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Font engine panicked while rendering: {0}")]
    Render(String),
    #[error("Failed to build atlas texture: {0}")]
    Texture(#[from] OutputError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful rebuild.
#[derive(Debug, Clone)]
pub struct RebuildSummary {
    pub name: String,
    pub report: GlyphReport,
    pub assets: Vec<SaveOutcome>,
    /// Kerning pairs written, `None` when kerning was not requested
    pub kerning_pairs: Option<usize>,
    pub duration: Duration,
}

/// Shared services a rebuild runs against.
#[derive(Clone)]
pub struct RebuildContext {
    pub engine: EngineSlot,
    pub store: SharedStore,
    pub dispatch: DispatchHandle,
    pub reporter: Arc<dyn ProgressReporter>,
    /// Directory that source fonts and character lists resolve against
    pub root: PathBuf,
}

impl RebuildContext {
    pub fn new(
        engine: EngineSlot,
        store: SharedStore,
        dispatch: DispatchHandle,
        reporter: Arc<dyn ProgressReporter>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self { engine, store, dispatch, reporter, root: root.into() }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_path(&self.root, path)
    }

    fn lock_store(&self) -> MutexGuard<'_, dyn AssetStore + 'static> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// State carried from the owner thread to the render thread and back.
struct PendingRender {
    lease: EngineLease,
    request: RenderRequest,
    targets: Vec<PathBuf>,
    font_path: PathBuf,
}

/// Rebuilds the atlas for one font configuration.
pub struct FontAssetUpdater {
    ctx: RebuildContext,
    name: String,
    config: FontConfig,
}

impl FontAssetUpdater {
    pub fn new(ctx: RebuildContext, name: impl Into<String>, config: FontConfig) -> Self {
        Self { ctx, name: name.into(), config }
    }

    /// Start the rebuild. `on_complete` fires exactly once, on the
    /// dispatcher's thread once rendering has begun, or before this returns
    /// if the rebuild aborts during setup.
    pub fn start<F>(self, on_complete: F)
    where
        F: FnOnce(Result<RebuildSummary, RebuildError>) + Send + 'static,
    {
        let started = Instant::now();
        info!(font = %self.name, asset = %self.config.font_asset.display(), "rebuilding font asset");
        self.ctx.reporter.report(ProgressEvent::RebuildStarted { name: self.name.clone() });

        match self.prepare() {
            Ok(pending) => self.render(pending, started, on_complete),
            Err(err) => self.complete(Err(err), started, on_complete),
        }
    }

    /// Everything up to the render: inputs, engine lease, init/load/size.
    fn prepare(&self) -> Result<PendingRender, RebuildError> {
        let lease = self.ctx.engine.try_acquire().ok_or(RebuildError::EngineBusy)?;

        let font_path = self.ctx.resolve(&self.config.source_font);
        if !font_path.is_file() {
            return Err(RebuildError::MissingFont(font_path));
        }

        let list_path = self.ctx.resolve(&self.config.character_list);
        let text = fs::read_to_string(&list_path)
            .map_err(|source| RebuildError::CharacterList { path: list_path, source })?;

        let targets = persist::resolve_targets(&*self.ctx.lock_store(), &self.config)?;

        let code = lease.initialize();
        if code != EngineCode::OK && code != EngineCode::ALREADY_INITIALIZED {
            return Err(RebuildError::Initialize(code));
        }

        let code = lease.load_font(&font_path);
        if code != EngineCode::OK && code != EngineCode::ALREADY_LOADED {
            lease.shutdown();
            return Err(RebuildError::LoadFont { path: font_path, code });
        }

        let size = self.config.point_size();
        let code = lease.set_size(size);
        if !code.is_ok() {
            lease.shutdown();
            return Err(RebuildError::SetSize { size, code });
        }

        let characters = unique_characters(&text);
        debug!(
            font = %self.name,
            unique = characters.len(),
            targets = targets.len(),
            "character list loaded"
        );

        let request = RenderRequest {
            width: self.config.atlas_width(),
            height: self.config.atlas_height(),
            padding: self.config.padding,
            characters,
            style: self.config.font_style,
            style_modifier: self
                .config
                .render_mode
                .effective_style_modifier(self.config.font_style_modifier),
            auto_size: self.config.is_auto_sizing(),
            render_mode: self.config.render_mode,
            packing: self.config.packing_method,
        };

        Ok(PendingRender { lease, request, targets, font_path })
    }

    /// Render on a worker thread while an update hook polls progress, then
    /// hand the buffers back to the dispatcher.
    fn render<F>(self, pending: PendingRender, started: Instant, on_complete: F)
    where
        F: FnOnce(Result<RebuildSummary, RebuildError>) + Send + 'static,
    {
        let hook = {
            let engine = self.ctx.engine.engine();
            let reporter = Arc::clone(&self.ctx.reporter);
            let name = self.name.clone();
            let mut last = f32::NAN;
            self.ctx.dispatch.add_update_hook(move || {
                let fraction = engine.render_progress();
                if fraction != last {
                    last = fraction;
                    reporter.report(ProgressEvent::RenderProgress { name: name.clone(), fraction });
                }
            })
        };

        let dispatch = self.ctx.dispatch.clone();
        thread::spawn(move || {
            let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut target = RenderTarget::for_request(&pending.request);
                pending.lease.render_characters(&pending.request, &mut target);
                target
            }));

            let posted = dispatch.post(move || {
                self.ctx.dispatch.remove_update_hook(hook);
                let result = match rendered {
                    Ok(target) => self.finish(pending, target, started),
                    Err(payload) => {
                        pending.lease.shutdown();
                        drop(pending);
                        Err(RebuildError::Render(panic_message(payload.as_ref())))
                    }
                };
                self.complete(result, started, on_complete);
            });
            if !posted {
                warn!("dispatcher stopped before the render finished, result dropped");
            }
        });
    }

    /// Post-render work on the owner thread. The engine is shut down and
    /// released whatever the outcome.
    fn finish(
        &self,
        pending: PendingRender,
        target: RenderTarget,
        started: Instant,
    ) -> Result<RebuildSummary, RebuildError> {
        let PendingRender { lease, request, targets, font_path } = pending;

        let report = GlyphReport::build(&target.face, &target.glyphs, request.characters.len());
        info!(
            font = %self.name,
            packed = report.packed,
            requested = report.requested,
            missing = report.missing.len(),
            "render finished"
        );
        if report.is_complete() {
            debug!("{}", report.text);
        } else {
            warn!("{}", report.text);
        }
        self.ctx.reporter.report(ProgressEvent::GlyphReport {
            name: self.name.clone(),
            requested: report.requested,
            packed: report.packed,
            missing: report.missing.len(),
        });

        let written = self.write_assets(&lease, &request, &font_path, &targets, target);

        lease.shutdown();
        drop(lease);

        let (assets, kerning_pairs) = written?;
        Ok(RebuildSummary {
            name: self.name.clone(),
            report,
            assets,
            kerning_pairs,
            duration: started.elapsed(),
        })
    }

    fn write_assets(
        &self,
        lease: &EngineLease,
        request: &RenderRequest,
        font_path: &Path,
        targets: &[PathBuf],
        target: RenderTarget,
    ) -> Result<(Vec<SaveOutcome>, Option<usize>), RebuildError> {
        let RenderTarget { buffer, face, glyphs } = target;
        let texture =
            atlas_texture("", &buffer, request.width, request.height, self.config.render_mode)?;
        drop(buffer);

        let (glyphs, kerning_set) = convert_glyphs(&glyphs, SCALE_DOWN);
        let face = convert_face_info(&face, SCALE_DOWN);

        let kerning = if self.config.kerning {
            let pairs = lease.kerning_pairs(font_path, &kerning_set, MAX_KERNING_PAIRS);
            let built = build_kerning_table(&pairs, face.point_size);
            for (first, second) in &built.duplicates {
                let message = format!("Kerning key for [{}] and [{}] is a duplicate", first, second);
                warn!(font = %self.name, first, second, "duplicate kerning pair");
                self.ctx
                    .reporter
                    .report(ProgressEvent::Warning { name: Some(self.name.clone()), message });
            }
            Some(built.table)
        } else {
            None
        };
        let kerning_pairs = kerning.as_ref().map(|k| k.len());

        let update = AtlasUpdate { face, glyphs, kerning, texture, padding: self.config.padding };

        let mut store = self.ctx.lock_store();
        let mut outcomes = Vec::with_capacity(targets.len());
        for path in targets {
            let outcome = persist::save_font_asset(&mut *store, path, &update)?;
            info!(
                font = %self.name,
                path = %path.display(),
                created = outcome.created,
                "font asset saved"
            );
            self.ctx.reporter.report(ProgressEvent::AssetUpdated {
                name: self.name.clone(),
                path: path.clone(),
                created: outcome.created,
            });
            outcomes.push(outcome);
        }

        Ok((outcomes, kerning_pairs))
    }

    fn complete<F>(
        &self,
        result: Result<RebuildSummary, RebuildError>,
        started: Instant,
        on_complete: F,
    ) where
        F: FnOnce(Result<RebuildSummary, RebuildError>),
    {
        let duration_ms = started.elapsed().as_millis() as u64;
        let status = match &result {
            Ok(summary) => {
                info!(font = %self.name, assets = summary.assets.len(), duration_ms, "rebuild complete");
                RebuildStatus::Success
            }
            Err(err) => {
                error!(font = %self.name, error = %err, "rebuild aborted");
                self.ctx.reporter.report(ProgressEvent::Error {
                    name: Some(self.name.clone()),
                    message: err.to_string(),
                });
                RebuildStatus::Failed(err.to_string())
            }
        };
        self.ctx.reporter.report(ProgressEvent::RebuildCompleted {
            name: self.name.clone(),
            status,
            duration_ms,
        });

        on_complete(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryAssetStore;
    use crate::dispatch::Dispatcher;
    use crate::engine::scripted::EngineCall;
    use crate::engine::{EngineFaceInfo, EngineKerningPair, RenderMode, ScriptedEngine};
    use crate::progress::RecordingProgress;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        dispatcher: Dispatcher,
        engine: Arc<ScriptedEngine>,
        store: Arc<Mutex<MemoryAssetStore>>,
        reporter: Arc<RecordingProgress>,
        ctx: RebuildContext,
    }

    fn fixture(engine: ScriptedEngine, characters: &str) -> Fixture {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Font.ttf"), b"not really a font").unwrap();
        fs::write(temp.path().join("chars.txt"), characters).unwrap();

        let dispatcher = Dispatcher::new();
        let engine = Arc::new(engine);
        let store = Arc::new(Mutex::new(MemoryAssetStore::new()));
        let reporter = Arc::new(RecordingProgress::new());
        let ctx = RebuildContext::new(
            EngineSlot::new(engine.clone()),
            store.clone(),
            dispatcher.handle(),
            reporter.clone(),
            temp.path(),
        );
        Fixture { _temp: temp, dispatcher, engine, store, reporter, ctx }
    }

    fn config() -> FontConfig {
        let mut config = FontConfig::new("Font SDF.asset", "Font.ttf", "chars.txt");
        config.atlas_resolution = [64, 64];
        config.padding = 0;
        config
    }

    fn run(fx: &mut Fixture, config: FontConfig) -> Result<RebuildSummary, RebuildError> {
        let slot: Arc<Mutex<Option<Result<RebuildSummary, RebuildError>>>> =
            Arc::new(Mutex::new(None));
        let done = Arc::new(AtomicBool::new(false));
        {
            let slot = slot.clone();
            let done = done.clone();
            FontAssetUpdater::new(fx.ctx.clone(), "font", config).start(move |result| {
                *slot.lock().unwrap() = Some(result);
                done.store(true, Ordering::SeqCst);
            });
        }
        fx.dispatcher.run_until(|| done.load(Ordering::SeqCst));
        // Hook removal is queued alongside the completion
        fx.dispatcher.pump();
        let mut slot = slot.lock().unwrap();
        slot.take().unwrap()
    }

    #[test]
    fn test_rebuild_creates_asset() {
        let mut fx = fixture(ScriptedEngine::new(), "aabbc");
        let summary = run(&mut fx, config()).unwrap();

        assert_eq!(summary.report.requested, 3);
        assert_eq!(summary.assets.len(), 1);
        assert!(summary.assets[0].created);
        assert_eq!(summary.kerning_pairs, None);

        let store = fx.store.lock().unwrap();
        let asset = store.font_asset(Path::new("Font SDF.asset")).unwrap();
        assert_eq!(asset.glyphs.iter().map(|g| g.id).collect::<Vec<_>>(), vec![97, 98, 99]);

        let calls = fx.engine.calls();
        assert_eq!(calls[0], EngineCall::Initialize);
        assert_eq!(calls[2], EngineCall::SetSize(72));
        assert!(matches!(&calls[3], EngineCall::Render(r) if r.characters == vec![97, 98, 99]));
        assert_eq!(calls.last(), Some(&EngineCall::Shutdown));
        assert!(!fx.ctx.engine.is_leased());
        assert_eq!(fx.dispatcher.hook_count(), 0);
    }

    #[test]
    fn test_benign_codes_are_accepted() {
        let engine = ScriptedEngine::new()
            .with_init_code(EngineCode::ALREADY_INITIALIZED)
            .with_load_code(EngineCode::ALREADY_LOADED);
        let mut fx = fixture(engine, "a");
        assert!(run(&mut fx, config()).is_ok());
    }

    #[test]
    fn test_init_failure_aborts_without_render() {
        let engine = ScriptedEngine::new().with_init_code(EngineCode(7));
        let mut fx = fixture(engine, "a");

        let err = run(&mut fx, config()).unwrap_err();
        assert!(matches!(err, RebuildError::Initialize(EngineCode(7))));
        assert_eq!(fx.engine.calls(), vec![EngineCall::Initialize]);
        assert!(fx.store.lock().unwrap().font_asset(Path::new("Font SDF.asset")).is_none());
        assert!(fx.reporter.events().iter().any(|e| matches!(
            e,
            ProgressEvent::RebuildCompleted { status: RebuildStatus::Failed(_), .. }
        )));
    }

    #[test]
    fn test_size_failure_shuts_engine_down() {
        let engine = ScriptedEngine::new().with_size_code(EngineCode::INVALID_SIZE);
        let mut fx = fixture(engine, "a");
        let mut cfg = config();
        cfg.sampling_point_size_mode = crate::config::SamplingPointSize::Custom;
        cfg.sampling_point_size = 36;

        let err = run(&mut fx, cfg).unwrap_err();
        assert!(matches!(err, RebuildError::SetSize { size: 36, .. }));
        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::Shutdown));
    }

    #[test]
    fn test_missing_character_list() {
        let mut fx = fixture(ScriptedEngine::new(), "a");
        let mut cfg = config();
        cfg.character_list = PathBuf::from("nope.txt");

        let err = run(&mut fx, cfg).unwrap_err();
        assert!(matches!(err, RebuildError::CharacterList { .. }));
        assert!(fx.engine.calls().is_empty());
    }

    #[test]
    fn test_missing_source_font() {
        let mut fx = fixture(ScriptedEngine::new(), "a");
        let mut cfg = config();
        cfg.source_font = PathBuf::from("Missing.ttf");

        assert!(matches!(run(&mut fx, cfg), Err(RebuildError::MissingFont(_))));
    }

    #[test]
    fn test_busy_engine() {
        let mut fx = fixture(ScriptedEngine::new(), "a");
        let _held = fx.ctx.engine.try_acquire().unwrap();

        assert!(matches!(run(&mut fx, config()), Err(RebuildError::EngineBusy)));
    }

    #[test]
    fn test_render_panic_still_completes() {
        let mut fx = fixture(ScriptedEngine::new().with_render_panic("rasterizer blew up"), "ab");

        let err = run(&mut fx, config()).unwrap_err();
        assert!(matches!(&err, RebuildError::Render(msg) if msg == "rasterizer blew up"));
        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::Shutdown));
        assert!(!fx.ctx.engine.is_leased());
        assert_eq!(fx.dispatcher.hook_count(), 0);
        assert!(fx.store.lock().unwrap().font_asset(Path::new("Font SDF.asset")).is_none());

        // The engine is usable again afterwards
        assert!(run(&mut fx, config()).is_ok());
    }

    #[test]
    fn test_style_modifier_reaches_engine() {
        let mut fx = fixture(ScriptedEngine::new(), "a");
        let mut cfg = config();
        cfg.render_mode = RenderMode::DistanceField32;
        cfg.font_style_modifier = 2.0;
        run(&mut fx, cfg).unwrap();

        let request = fx
            .engine
            .calls()
            .into_iter()
            .find_map(|c| match c {
                EngineCall::Render(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(request.style_modifier, 64.0);
        assert_eq!(request.render_mode, RenderMode::DistanceField32);
    }

    #[test]
    fn test_kerning_duplicates_warn() {
        let engine = ScriptedEngine::new()
            .with_face(EngineFaceInfo { name: "K".to_string(), point_size: 10, ..Default::default() })
            .with_kerning(vec![
                EngineKerningPair { left: 'A' as u32, right: 'V' as u32, x_advance_offset: -0.5 },
                EngineKerningPair { left: 'A' as u32, right: 'V' as u32, x_advance_offset: -0.9 },
            ]);
        let mut fx = fixture(engine, "AV");
        let mut cfg = config();
        cfg.kerning = true;

        let summary = run(&mut fx, cfg).unwrap();
        assert_eq!(summary.kerning_pairs, Some(1));

        let store = fx.store.lock().unwrap();
        let asset = store.font_asset(Path::new("Font SDF.asset")).unwrap();
        assert_eq!(asset.kerning.pairs[0].x_offset, -5.0);

        let warnings = fx
            .reporter
            .events()
            .into_iter()
            .filter(|e| matches!(e, ProgressEvent::Warning { .. }))
            .count();
        assert_eq!(warnings, 1);
    }
}
