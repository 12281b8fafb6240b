//! End-to-end rebuilds against an on-disk project

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use atlaswatch::asset::{props, AssetStore, FontAssetType, FsAssetStore, Material, SharedStore};
use atlaswatch::config::{load_project, FontConfig};
use atlaswatch::dispatch::Dispatcher;
use atlaswatch::engine::scripted::EngineCall;
use atlaswatch::engine::{EngineCode, EngineKerningPair, EngineSlot, ScriptedEngine};
use atlaswatch::output::load_png;
use atlaswatch::progress::{ProgressEvent, RecordingProgress};
use atlaswatch::updater::{run_batch, RebuildContext, RebuildError};
use tempfile::TempDir;

struct Project {
    temp: TempDir,
    dispatcher: Dispatcher,
    engine: Arc<ScriptedEngine>,
    reporter: Arc<RecordingProgress>,
    ctx: RebuildContext,
}

impl Project {
    fn new(engine: ScriptedEngine) -> Self {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Font.ttf"), b"font bytes").unwrap();

        let dispatcher = Dispatcher::new();
        let engine = Arc::new(engine);
        let reporter = Arc::new(RecordingProgress::new());
        let store: SharedStore = Arc::new(Mutex::new(FsAssetStore::new(temp.path())));
        let ctx = RebuildContext::new(
            EngineSlot::new(engine.clone()),
            store,
            dispatcher.handle(),
            reporter.clone(),
            temp.path(),
        );
        Self { temp, dispatcher, engine, reporter, ctx }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn write_chars(&self, name: &str, contents: &str) {
        fs::write(self.root().join(name), contents).unwrap();
    }

    fn store(&self) -> FsAssetStore {
        FsAssetStore::new(self.root())
    }
}

fn font(list: &str) -> FontConfig {
    let mut config = FontConfig::new("Fonts/Font SDF.asset", "Font.ttf", list);
    config.atlas_resolution = [64, 64];
    config.padding = 2;
    config
}

#[test]
fn test_rebuild_writes_asset_atlas_and_material() {
    let mut project = Project::new(ScriptedEngine::new());
    project.write_chars("chars.txt", "aabbc");

    let result = run_batch(
        &mut project.dispatcher,
        &project.ctx,
        vec![("font".to_string(), font("chars.txt"))],
    );
    assert!(result.is_success());

    let store = project.store();
    let asset = store.load_font_asset(Path::new("Fonts/Font SDF.asset")).unwrap().unwrap();
    assert_eq!(asset.asset_type, FontAssetType::Sdf);
    assert_eq!(asset.glyphs.iter().map(|g| g.id).collect::<Vec<_>>(), vec![97, 98, 99]);
    assert_eq!(asset.face_info.character_count, 3);
    assert_eq!(asset.face_info.atlas_width, 64.0);

    let atlas = asset.atlas.as_ref().unwrap();
    assert_eq!(atlas.path, Path::new("Fonts/Font SDF Atlas.png"));
    let image = load_png(&project.root().join(&atlas.path)).unwrap();
    assert_eq!(image.dimensions(), (64, 64));

    assert_eq!(asset.material.name, "Font SDF Material");
    assert_eq!(asset.material.main_texture.as_deref(), Some(atlas.path.as_path()));
    assert_eq!(asset.material.float(props::GRADIENT_SCALE), Some(3.0));
    assert_eq!(asset.material.float(props::TEXTURE_WIDTH), Some(64.0));
}

#[test]
fn test_derived_face_metrics() {
    let mut project = Project::new(ScriptedEngine::new());
    project.write_chars("chars.txt", "abc");

    let result = run_batch(
        &mut project.dispatcher,
        &project.ctx,
        vec![("font".to_string(), font("chars.txt"))],
    );
    assert!(result.is_success());

    let asset =
        project.store().load_font_asset(Path::new("Fonts/Font SDF.asset")).unwrap().unwrap();
    let face = &asset.face_info;
    assert_eq!(face.point_size, 72.0);
    assert_eq!(face.underline_thickness, 5.0);
    assert_eq!(face.strikethrough_thickness, 5.0);
    assert_eq!(face.superscript_offset, face.ascender);
    assert_eq!(face.subscript_offset, face.underline);
    assert_eq!(face.sub_size, 0.5);
    assert!((face.strikethrough - (70.0 - 18.0) / 2.75).abs() < 1e-4);
}

#[test]
fn test_missing_glyphs_are_dropped() {
    let mut project = Project::new(ScriptedEngine::new().with_missing(['b']));
    project.write_chars("chars.txt", "abc");

    let result = run_batch(
        &mut project.dispatcher,
        &project.ctx,
        vec![("font".to_string(), font("chars.txt"))],
    );
    let summary = result.outcomes[0].result.as_ref().unwrap();
    assert_eq!(summary.report.missing, vec![98]);

    let asset =
        project.store().load_font_asset(Path::new("Fonts/Font SDF.asset")).unwrap().unwrap();
    assert_eq!(asset.glyphs.iter().map(|g| g.id).collect::<Vec<_>>(), vec![97, 99]);
}

#[test]
fn test_kerning_uses_packed_glyphs_only() {
    let engine = ScriptedEngine::new().with_missing(['b']).with_kerning(vec![
        EngineKerningPair { left: 97, right: 99, x_advance_offset: -0.1 },
        EngineKerningPair { left: 97, right: 99, x_advance_offset: -0.2 },
        EngineKerningPair { left: 99, right: 97, x_advance_offset: 0.05 },
    ]);
    let mut project = Project::new(engine);
    project.write_chars("chars.txt", "abc");

    let mut config = font("chars.txt");
    config.kerning = true;
    let result = run_batch(&mut project.dispatcher, &project.ctx, vec![("font".to_string(), config)]);
    assert!(result.is_success());

    let query = project.engine.calls().into_iter().find_map(|call| match call {
        EngineCall::KerningPairs { characters, .. } => Some(characters),
        _ => None,
    });
    assert_eq!(query, Some(vec![97, 99]));

    let asset =
        project.store().load_font_asset(Path::new("Fonts/Font SDF.asset")).unwrap().unwrap();
    assert_eq!(asset.kerning.len(), 2);
    assert!(asset.kerning.contains(97, 99));
    assert!(asset.kerning.contains(99, 97));
}

#[test]
fn test_update_repoints_referencing_materials() {
    let mut project = Project::new(ScriptedEngine::new());
    project.write_chars("chars.txt", "ab");

    let first = run_batch(
        &mut project.dispatcher,
        &project.ctx,
        vec![("font".to_string(), font("chars.txt"))],
    );
    assert!(first.is_success());

    let mut store = project.store();
    let atlas_path = Path::new("Fonts/Font SDF Atlas.png").to_path_buf();
    let mut outline = Material::new("Font SDF_Outline", "Text/Distance Field");
    outline.main_texture = Some(atlas_path.clone());
    store.save_material(Path::new("Fonts/Font SDF_Outline.mat"), &outline).unwrap();
    let mut unrelated = Material::new("Font SDF_Other", "Text/Distance Field");
    unrelated.main_texture = Some("Elsewhere.png".into());
    store.save_material(Path::new("Fonts/Font SDF_Other.mat"), &unrelated).unwrap();

    project.write_chars("chars.txt", "abcd");
    let mut config = font("chars.txt");
    config.padding = 6;
    let second =
        run_batch(&mut project.dispatcher, &project.ctx, vec![("font".to_string(), config)]);
    let summary = second.outcomes[0].result.as_ref().unwrap();
    assert!(!summary.assets[0].created);
    assert_eq!(summary.assets[0].materials_updated, vec![Path::new("Fonts/Font SDF_Outline.mat")]);

    let asset = store.load_font_asset(Path::new("Fonts/Font SDF.asset")).unwrap().unwrap();
    assert_eq!(asset.glyphs.len(), 4);

    let outline = store.load_material(Path::new("Fonts/Font SDF_Outline.mat")).unwrap().unwrap();
    assert_eq!(outline.float(props::GRADIENT_SCALE), Some(7.0));
    let unrelated = store.load_material(Path::new("Fonts/Font SDF_Other.mat")).unwrap().unwrap();
    assert_eq!(unrelated.float(props::GRADIENT_SCALE), None);
}

#[test]
fn test_matching_sdf_assets_are_updated_together() {
    let mut project = Project::new(ScriptedEngine::new());
    project.write_chars("chars.txt", "xyz");

    // An existing sibling asset built from the same font
    let mut store = project.store();
    let sibling = atlaswatch::asset::FontAsset::new("Font SDF Fallback");
    store.save_font_asset(Path::new("Other/Font SDF Fallback.asset"), &sibling).unwrap();

    let result = run_batch(
        &mut project.dispatcher,
        &project.ctx,
        vec![("font".to_string(), font("chars.txt"))],
    );
    let summary = result.outcomes[0].result.as_ref().unwrap();
    assert_eq!(summary.assets.len(), 2);

    let sibling =
        store.load_font_asset(Path::new("Other/Font SDF Fallback.asset")).unwrap().unwrap();
    assert_eq!(sibling.glyphs.len(), 3);
    assert!(project.root().join("Other/Font SDF Fallback Atlas.png").exists());
}

#[test]
fn test_batch_continues_after_failure() {
    let mut project = Project::new(ScriptedEngine::new());
    project.write_chars("good.txt", "ab");

    let fonts = vec![
        ("broken".to_string(), font("missing.txt")),
        ("good".to_string(), font("good.txt")),
    ];
    let result = run_batch(&mut project.dispatcher, &project.ctx, fonts);

    assert_eq!(result.succeeded(), 1);
    assert_eq!(result.failed_names(), vec!["broken"]);
    assert!(matches!(
        result.outcomes[0].result,
        Err(RebuildError::CharacterList { .. })
    ));
    assert!(!project.ctx.engine.is_leased());
    assert_eq!(project.dispatcher.hook_count(), 0);

    let events = project.reporter.events();
    assert!(matches!(events.first(), Some(ProgressEvent::BatchStarted { total: 2 })));
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::BatchCompleted { succeeded: 1, failed: 1, .. })
    ));
}

#[test]
fn test_load_failure_shuts_engine_down() {
    let engine = ScriptedEngine::new().with_load_code(EngineCode::INVALID_FONT);
    let mut project = Project::new(engine);
    project.write_chars("chars.txt", "ab");

    let result = run_batch(
        &mut project.dispatcher,
        &project.ctx,
        vec![("font".to_string(), font("chars.txt"))],
    );
    assert!(matches!(result.outcomes[0].result, Err(RebuildError::LoadFont { .. })));
    assert_eq!(project.engine.calls().last(), Some(&EngineCall::Shutdown));
    assert!(!project.root().join("Fonts/Font SDF.asset").exists());
}

#[test]
fn test_rebuild_from_config_file() {
    let mut project = Project::new(ScriptedEngine::new());
    project.write_chars("chars.txt", "hello");
    fs::write(
        project.root().join("atlaswatch.toml"),
        r#"
[project]
name = "demo"

[fonts.body]
font_asset = "Fonts/Font SDF.asset"
source_font = "Font.ttf"
character_list = "chars.txt"
atlas_resolution = [64, 64]
"#,
    )
    .unwrap();

    let loaded = load_project(Some(&project.root().join("atlaswatch.toml"))).unwrap();
    let fonts = loaded.select(&[]).unwrap();
    assert_eq!(fonts.len(), 1);

    let result = run_batch(&mut project.dispatcher, &project.ctx, fonts);
    let summary = result.outcomes[0].result.as_ref().unwrap();
    // h, e, l, o
    assert_eq!(summary.report.requested, 4);
}
