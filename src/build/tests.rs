//! Session-level behaviour of the orchestrator, driven by an in-memory bundler.

use super::*;

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use rustc_hash::FxHashSet;
use tempfile::TempDir;

// ============================================================================
// test doubles
// ============================================================================

const AGGREGATE_MANIFEST_NAME: &str = "uspack-aggregate";

/// Records calls, fails on demand, and can hold a package bundle open.
#[derive(Default)]
struct FakeBundler {
    calls: Mutex<Vec<String>>,
    aggregate_calls: AtomicUsize,
    failing: Mutex<FxHashSet<String>>,
    aggregate_fails: AtomicBool,
    hold: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl FakeBundler {
    fn package_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.calls.lock().clear();
    }

    fn fail(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    /// Hold the next package bundle until released.
    /// Returns (started, release).
    fn hold_next(&self) -> (Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = channel::bounded(1);
        let (release_tx, release_rx) = channel::bounded(1);
        *self.hold.lock() = Some((started_tx, release_rx));
        (started_rx, release_tx)
    }
}

impl Bundler for FakeBundler {
    fn bundle(&self, entry: &Path, mode: BuildMode) -> Result<String, BundleError> {
        let dir = entry.parent().unwrap();
        let manifest = fs::read_to_string(dir.join("package.json")).unwrap_or_default();

        if manifest.contains(AGGREGATE_MANIFEST_NAME) {
            self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
            if self.aggregate_fails.load(Ordering::SeqCst) {
                return Err(BundleError::message("aggregate: unexpected token"));
            }
            return Ok(inline_modules(entry));
        }

        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.lock().push(name.clone());

        let hold = self.hold.lock().take();
        if let Some((started, release)) = hold {
            started.send(()).unwrap();
            release.recv().unwrap();
        }

        if self.failing.lock().contains(&name) {
            return Err(BundleError::message(format!("{name}: syntax error")));
        }
        let source = fs::read_to_string(entry).map_err(|e| BundleError::message(e.to_string()))?;
        Ok(format!("/*{name}:{mode}*/{source}"))
    }
}

/// Replace each `require("./x.js")` in the entrypoint with `(<x.js>)`.
fn inline_modules(entry: &Path) -> String {
    let dir = entry.parent().unwrap();
    let mut out = fs::read_to_string(entry).unwrap();
    for file in fs::read_dir(dir).unwrap() {
        let path = file.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if name == "index.js" || !name.ends_with(".js") {
            continue;
        }
        let body = fs::read_to_string(&path).unwrap();
        out = out.replace(&format!("require(\"./{name}\")"), &format!("({body})"));
    }
    out
}

/// The inlined module text of `name` inside an aggregate.
fn fragment<'a>(aggregate: &'a str, name: &str) -> &'a str {
    let start = aggregate
        .find(&format!("(/*{name}:"))
        .unwrap_or_else(|| panic!("no fragment for {name}"));
    let end = start + aggregate[start..].find(')').unwrap();
    &aggregate[start..=end]
}

// ============================================================================
// fixture
// ============================================================================

struct Fixture {
    dir: TempDir,
    bundler: Arc<FakeBundler>,
    orchestrator: Orchestrator,
}

impl Fixture {
    fn new(packages: &[(&str, &str)]) -> Self {
        Self::with_policy(packages, MinifyPolicy::Auto)
    }

    fn with_policy(packages: &[(&str, &str)], minify: MinifyPolicy) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        for (name, pattern) in packages {
            write_package(&dir.path().join("src"), name, pattern, true);
        }

        let bundler = Arc::new(FakeBundler::default());
        let orchestrator = Self::orchestrator(dir.path(), Arc::clone(&bundler), minify);
        Self {
            dir,
            bundler,
            orchestrator,
        }
    }

    fn orchestrator(root: &Path, bundler: Arc<FakeBundler>, minify: MinifyPolicy) -> Orchestrator {
        let settings = BuildSettings {
            packages: root.join("src"),
            ignore: vec!["node_modules".into()],
            template: crate::embed::build::ENTRYPOINT_JS.to_string(),
            minify,
            output_file: Some(root.join("build/index.js")),
        };
        Orchestrator::new(settings, BuildCache::new(root.join("build")), bundler)
    }

    fn package_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join("src").join(name)
    }

    fn write(&self, name: &str, file: &str, content: &str) {
        let path = self.package_dir(name).join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn cache(&self) -> BuildCache {
        BuildCache::new(self.dir.path().join("build"))
    }

    fn aggregate(&self) -> String {
        self.orchestrator.current().unwrap().content.to_string()
    }
}

fn write_package(root: &Path, name: &str, pattern: &str, production: bool) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("package.json"),
        format!(
            r#"{{"name":"{name}","userScript":{{"matches":["{pattern}"],"isProduction":{production}}}}}"#
        ),
    )
    .unwrap();
    fs::write(dir.join("index.js"), format!("{name} v1")).unwrap();
}

fn alpha_beta() -> Fixture {
    Fixture::new(&[("alpha", "https://a.example/*"), ("beta", "https://b.example/*")])
}

// ============================================================================
// incrementality
// ============================================================================

#[test]
fn test_first_build_compiles_every_package_and_publishes() {
    let fx = alpha_beta();
    assert!(fx.orchestrator.current().is_none());

    let report = fx.orchestrator.build_all(false).unwrap();
    assert_eq!(report.compiled, vec!["alpha", "beta"]);
    assert!(report.reused.is_empty());
    assert!(report.published);

    let aggregate = fx.aggregate();
    assert_eq!(report.bytes, aggregate.len());
    assert!(aggregate.contains("(/*alpha:production*/alpha v1)"));
    assert!(aggregate.contains("(/*beta:production*/beta v1)"));
    assert!(aggregate.contains(r#"["https://a.example/*"]"#));
    assert!(aggregate.find("alpha v1").unwrap() < aggregate.find("beta v1").unwrap());
    assert_eq!(fx.bundler.aggregate_calls(), 1);
}

#[test]
fn test_unchanged_rebuild_makes_no_bundler_calls() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    let first = fx.orchestrator.current().unwrap();
    fx.bundler.reset();

    let report = fx.orchestrator.build_all(false).unwrap();
    assert!(report.compiled.is_empty());
    assert_eq!(report.reused, vec!["alpha", "beta"]);
    assert!(!report.published);
    assert!(fx.bundler.package_calls().is_empty());
    assert_eq!(fx.bundler.aggregate_calls(), 1);

    let second = fx.orchestrator.current().unwrap();
    assert_eq!(first.content, second.content);
}

#[test]
fn test_changed_package_is_rebuilt_alone() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    let before = fx.aggregate();
    fx.bundler.reset();

    fx.write("beta", "index.js", "beta v2");
    let report = fx.orchestrator.build_all(false).unwrap();
    assert_eq!(fx.bundler.package_calls(), vec!["beta"]);
    assert_eq!(report.reused, vec!["alpha"]);

    let after = fx.aggregate();
    assert_eq!(fragment(&before, "alpha"), fragment(&after, "alpha"));
    assert!(after.contains("beta v2"));
}

#[test]
fn test_dirty_set_forces_named_package() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    fx.bundler.reset();

    let dirty = DirtySet::of([fx.package_dir("alpha")]);
    let report = fx.orchestrator.rebuild(&dirty, false).unwrap();
    assert_eq!(fx.bundler.package_calls(), vec!["alpha"]);
    assert_eq!(report.reused, vec!["beta"]);
}

#[test]
fn test_sentinel_rebuilds_every_package() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    fx.bundler.reset();

    let before = fx.orchestrator.current().unwrap();
    let report = fx.orchestrator.rebuild(&DirtySet::All, false).unwrap();
    assert_eq!(fx.bundler.package_calls(), vec!["alpha", "beta"]);
    assert!(report.reused.is_empty());

    // shared code may have changed, so the aggregate is reassembled
    assert!(report.published);
    assert_eq!(fx.bundler.aggregate_calls(), 2);
    assert!(!Arc::ptr_eq(&before, &fx.orchestrator.current().unwrap()));
}

#[test]
fn test_force_rebuilds_every_package() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    fx.bundler.reset();

    let before = fx.orchestrator.current().unwrap();
    let events = fx.orchestrator.subscribe();
    let report = fx.orchestrator.build_all(true).unwrap();
    assert_eq!(fx.bundler.package_calls(), vec!["alpha", "beta"]);

    assert!(report.published);
    assert_eq!(fx.bundler.aggregate_calls(), 2);
    let after = fx.orchestrator.current().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.generated_at >= before.generated_at);
    assert!(matches!(events.try_recv(), Ok(BuildEvent::Success(_))));
}

#[test]
fn test_dependency_directories_do_not_invalidate() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    fx.bundler.reset();

    fx.write("alpha", "node_modules/left-pad/index.js", "module.exports = 1");
    fx.orchestrator.build_all(false).unwrap();
    assert!(fx.bundler.package_calls().is_empty());
}

#[test]
fn test_cache_survives_restart() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();

    let bundler = Arc::new(FakeBundler::default());
    let restarted = Fixture::orchestrator(fx.dir.path(), Arc::clone(&bundler), MinifyPolicy::Auto);
    let report = restarted.build_all(false).unwrap();

    assert!(bundler.package_calls().is_empty());
    assert_eq!(report.reused, vec!["alpha", "beta"]);
    // a fresh process still assembles once
    assert_eq!(bundler.aggregate_calls(), 1);
    assert!(restarted.current().is_some());
}

#[test]
fn test_corrupt_cache_entry_is_a_miss() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    fx.bundler.reset();

    fs::write(fx.cache().entry_dir("alpha").join("info.json"), "{ broken").unwrap();
    fx.orchestrator.build_all(false).unwrap();
    assert_eq!(fx.bundler.package_calls(), vec!["alpha"]);
    // rewritten by the rebuild
    assert!(fx.cache().load("alpha").unwrap().is_some());
}

#[test]
fn test_new_package_is_picked_up() {
    let fx = Fixture::new(&[("alpha", "https://a.example/*")]);
    fx.orchestrator.build_all(false).unwrap();
    fx.bundler.reset();

    write_package(&fx.dir.path().join("src"), "gamma", "https://g.example/*", true);
    let report = fx.orchestrator.rebuild(&DirtySet::All, false).unwrap();
    assert!(report.compiled.contains(&"gamma".to_string()));
    assert!(fx.aggregate().contains("gamma v1"));
    assert!(fx.orchestrator.registry().get("gamma").is_some());
}

// ============================================================================
// failures
// ============================================================================

#[test]
fn test_failing_package_is_excluded_and_keeps_cache_entry() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    let beta_before = fx.cache().load("beta").unwrap().unwrap();

    fx.write("beta", "index.js", "beta v2 (");
    fx.bundler.fail("beta");
    let report = fx.orchestrator.build_all(false).unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "beta");
    assert_eq!(report.failed[0].diagnostics, vec!["beta: syntax error"]);
    assert_eq!(report.reused, vec!["alpha"]);

    let aggregate = fx.aggregate();
    assert!(aggregate.contains("alpha v1"));
    assert!(!aggregate.contains("beta v"));
    assert_eq!(fx.cache().load("beta").unwrap().unwrap(), beta_before);
}

#[test]
fn test_failing_package_on_first_build_does_not_block_others() {
    let fx = alpha_beta();
    fx.bundler.fail("alpha");

    let report = fx.orchestrator.build_all(false).unwrap();
    assert_eq!(report.compiled, vec!["beta"]);
    assert!(fx.cache().load("alpha").unwrap().is_none());
    assert!(fx.aggregate().contains("beta v1"));
}

#[test]
fn test_assembly_failure_keeps_previous_aggregate() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    let before = fx.orchestrator.current().unwrap();
    let events = fx.orchestrator.subscribe();

    fx.write("alpha", "index.js", "alpha v2");
    fx.bundler.aggregate_fails.store(true, Ordering::SeqCst);
    let err = fx.orchestrator.build_all(false).unwrap_err();
    assert!(matches!(err, BuildError::Assembly(AssemblyError::Bundle(_))));

    let after = fx.orchestrator.current().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(matches!(events.try_recv(), Ok(BuildEvent::Failed(_))));

    // the package itself compiled and was cached
    let alpha = fx.cache().load("alpha").unwrap().unwrap();
    assert!(alpha.content.contains("alpha v2"));

    // recovery republishes
    fx.bundler.aggregate_fails.store(false, Ordering::SeqCst);
    fx.orchestrator.build_all(false).unwrap();
    assert!(fx.aggregate().contains("alpha v2"));
}

#[test]
fn test_duplicate_names_abort_session_and_keep_aggregate() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    let before = fx.orchestrator.current().unwrap();

    write_package(&fx.dir.path().join("src"), "zzz", "*", true);
    fs::write(
        fx.package_dir("zzz").join("package.json"),
        r#"{"name":"alpha","userScript":{"matches":"*"}}"#,
    )
    .unwrap();

    let err = fx.orchestrator.build_all(false).unwrap_err();
    assert!(matches!(err, BuildError::Registry(RegistryError::Duplicate { .. })));
    assert!(Arc::ptr_eq(&before, &fx.orchestrator.current().unwrap()));
    assert!(!fx.orchestrator.is_building());
}

#[test]
fn test_broken_manifest_excludes_only_that_package() {
    let fx = alpha_beta();
    fs::write(fx.package_dir("beta").join("package.json"), r#"{"name":"beta"}"#).unwrap();

    let report = fx.orchestrator.build_all(false).unwrap();
    assert_eq!(report.compiled, vec!["alpha"]);
    assert!(!fx.aggregate().contains("beta v1"));
}

// ============================================================================
// concurrency
// ============================================================================

#[test]
fn test_rebuild_during_session_is_rejected() {
    let fx = Arc::new(alpha_beta());
    fx.orchestrator.build_all(false).unwrap();
    let published = fx.orchestrator.current().unwrap();
    let alpha_entry = fx.cache().load("alpha").unwrap().unwrap();
    fx.bundler.reset();

    fx.write("alpha", "index.js", "alpha v2");
    let (started, release) = fx.bundler.hold_next();
    let session = {
        let fx = Arc::clone(&fx);
        thread::spawn(move || fx.orchestrator.build_all(false))
    };
    started.recv().unwrap();

    assert!(fx.orchestrator.is_building());
    let err = fx.orchestrator.rebuild(&DirtySet::All, true).unwrap_err();
    assert!(matches!(err, BuildError::Busy { .. }));

    // nothing moved while the first session is in flight
    assert_eq!(fx.bundler.package_calls(), vec!["alpha"]);
    assert_eq!(fx.cache().load("alpha").unwrap().unwrap(), alpha_entry);
    assert!(Arc::ptr_eq(&published, &fx.orchestrator.current().unwrap()));

    release.send(()).unwrap();
    let report = session.join().unwrap().unwrap();
    assert_eq!(report.compiled, vec!["alpha"]);
    assert_eq!(fx.bundler.package_calls(), vec!["alpha"]);
    assert!(!fx.orchestrator.is_building());
    assert!(fx.aggregate().contains("alpha v2"));
}

/// Every requester arriving during a cold-start build gets that build's
/// result. A single pending slot would have answered only the last one.
#[test]
fn test_cold_start_waiters_all_receive_the_same_build() {
    let fx = Arc::new(alpha_beta());
    let (started, release) = fx.bundler.hold_next();

    let first = {
        let fx = Arc::clone(&fx);
        thread::spawn(move || fx.orchestrator.current_or_build())
    };
    started.recv().unwrap();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let fx = Arc::clone(&fx);
            thread::spawn(move || fx.orchestrator.current_or_build())
        })
        .collect();
    thread::sleep(Duration::from_millis(50));
    assert!(fx.orchestrator.is_building());

    release.send(()).unwrap();
    let first = first.join().unwrap().unwrap();
    for waiter in waiters {
        let got = waiter.join().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &got));
    }
    assert_eq!(fx.bundler.package_calls(), vec!["alpha", "beta"]);
}

#[test]
fn test_cold_start_failure_yields_nothing() {
    let fx = alpha_beta();
    fx.bundler.aggregate_fails.store(true, Ordering::SeqCst);
    assert!(fx.orchestrator.current_or_build().is_none());
}

// ============================================================================
// outputs
// ============================================================================

#[test]
fn test_alpha_beta_targeted_rebuild() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    let first = fx.aggregate();
    assert!(first.contains(r#"["https://a.example/*"]"#));
    assert!(first.contains(r#"["https://b.example/*"]"#));
    assert!(first.contains("try {"));
    let alpha_entry = fx.cache().load("alpha").unwrap().unwrap();
    fx.bundler.reset();

    fx.write("beta", "index.js", "beta v2");
    let report = fx
        .orchestrator
        .rebuild(&DirtySet::of([fx.package_dir("beta")]), false)
        .unwrap();
    assert_eq!(report.compiled, vec!["beta"]);
    assert_eq!(fx.bundler.package_calls(), vec!["beta"]);

    assert_eq!(fx.cache().load("alpha").unwrap().unwrap(), alpha_entry);
    let second = fx.aggregate();
    assert_eq!(fragment(&first, "alpha"), fragment(&second, "alpha"));
    assert_ne!(fragment(&first, "beta"), fragment(&second, "beta"));
}

#[test]
fn test_minify_policy_selects_mode() {
    let fx = Fixture::new(&[]);
    write_package(&fx.dir.path().join("src"), "dev", "*", false);
    write_package(&fx.dir.path().join("src"), "prod", "*", true);
    fx.orchestrator.build_all(false).unwrap();
    let aggregate = fx.aggregate();
    assert!(aggregate.contains("/*dev:development*/"));
    assert!(aggregate.contains("/*prod:production*/"));

    let bundler = Arc::new(FakeBundler::default());
    let never = Fixture::orchestrator(fx.dir.path(), bundler, MinifyPolicy::Never);
    never.build_all(true).unwrap();
    let aggregate = never.current().unwrap().content.to_string();
    assert!(aggregate.contains("/*prod:development*/"));
}

#[test]
fn test_subscribers_receive_success() {
    let fx = alpha_beta();
    let events = fx.orchestrator.subscribe();

    fx.orchestrator.build_all(false).unwrap();
    match events.try_recv() {
        Ok(BuildEvent::Success(artifact)) => {
            assert!(Arc::ptr_eq(&artifact, &fx.orchestrator.current().unwrap()));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // unchanged sessions publish nothing
    fx.orchestrator.build_all(false).unwrap();
    assert!(events.try_recv().is_err());
}

#[test]
fn test_aggregate_written_to_output_file() {
    let fx = alpha_beta();
    fx.orchestrator.build_all(false).unwrap();
    let written = fs::read_to_string(fx.dir.path().join("build/index.js")).unwrap();
    assert_eq!(written, fx.aggregate());
}

#[test]
fn test_package_named_like_output_file_is_excluded() {
    let fx = Fixture::new(&[("alpha", "https://a.example/*"), ("index.js", "*")]);

    let report = fx.orchestrator.build_all(false).unwrap();
    assert_eq!(report.compiled, vec!["alpha"]);
    assert!(report.failed.is_empty());
    assert!(fx.orchestrator.registry().get("index.js").is_none());

    let written = fs::read_to_string(fx.dir.path().join("build/index.js")).unwrap();
    assert_eq!(written, fx.aggregate());
}
