//! Deciding which steps must re-run.
//!
//! Each step first gets a *local* verdict that looks only at its own files:
//! command fingerprint, produced artifacts, prerequisite timestamps and its
//! dependency list. Local checks are independent and run in parallel. A
//! sequential walk then spreads outdatedness from prerequisites to the steps
//! that consume them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use joist_common::FileStamp;
use joist_graph::{gather_prerequisites, ActionGraph, BuildStep, StepId};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::depcache::DependencyCache;
use crate::history::HistoryStore;

/// Extensions of object files that a crashed compiler may leave empty.
const OBJECT_EXTENSIONS: &[&str] = &["obj", "o"];

/// Knobs for [`gather_outdated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutdatedOptions {
    /// Do not rebuild a step just because an import library it links
    /// against was rebuilt.
    pub ignore_outdated_import_libraries: bool,
    /// How much newer than a step's outputs an input must be to count.
    pub timestamp_slack: Duration,
}

impl Default for OutdatedOptions {
    fn default() -> Self {
        Self {
            ignore_outdated_import_libraries: false,
            timestamp_slack: Duration::from_secs(1),
        }
    }
}

/// Why a step must re-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The step declares no outputs, so nothing proves it ran.
    NoOutputs,
    /// The command fingerprint differs from the recorded one.
    FingerprintChanged {
        /// Output whose record changed.
        artifact: PathBuf,
    },
    /// The history could not be consulted.
    HistoryUnavailable {
        /// Output being checked.
        artifact: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// A produced artifact does not exist.
    MissingOutput {
        /// The missing output.
        artifact: PathBuf,
    },
    /// A compile produced a zero-length object file.
    EmptyObject {
        /// The empty object.
        artifact: PathBuf,
    },
    /// A prerequisite is newer than the step's oldest output.
    PrerequisiteNewer {
        /// The newer prerequisite.
        artifact: PathBuf,
    },
    /// The declared dependency list could not be read.
    DependencyListMissing {
        /// The list file.
        list: PathBuf,
    },
    /// A file named in the dependency list no longer exists.
    DependencyMissing {
        /// The missing dependency.
        file: PathBuf,
    },
    /// A file named in the dependency list is newer than the outputs.
    DependencyNewer {
        /// The newer dependency.
        file: PathBuf,
    },
    /// A prerequisite step is outdated.
    PrerequisiteOutdated {
        /// The outdated prerequisite.
        step: StepId,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoOutputs => write!(f, "step has no produced items"),
            StaleReason::FingerprintChanged { artifact } => {
                write!(f, "command changed since {} was produced", artifact.display())
            }
            StaleReason::HistoryUnavailable { artifact, reason } => {
                write!(f, "history unavailable for {}: {reason}", artifact.display())
            }
            StaleReason::MissingOutput { artifact } => {
                write!(f, "produced item {} is missing", artifact.display())
            }
            StaleReason::EmptyObject { artifact } => {
                write!(f, "produced item {} is zero length", artifact.display())
            }
            StaleReason::PrerequisiteNewer { artifact } => {
                write!(f, "prerequisite {} is newer than the last execution", artifact.display())
            }
            StaleReason::DependencyListMissing { list } => {
                write!(f, "dependency list {} is unavailable", list.display())
            }
            StaleReason::DependencyMissing { file } => {
                write!(f, "dependency {} is missing", file.display())
            }
            StaleReason::DependencyNewer { file } => {
                write!(f, "dependency {} is newer than the last execution", file.display())
            }
            StaleReason::PrerequisiteOutdated { step } => {
                write!(f, "prerequisite {step} is outdated")
            }
        }
    }
}

/// One step that must re-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outdated {
    /// The step.
    pub step: StepId,
    /// The first reason found.
    pub reason: StaleReason,
}

/// Memoizing staleness analyzer for one linked graph.
///
/// Verdicts are computed at most once per step; later queries are lookups.
/// Create a fresh analyzer after executing steps, since file stamps and
/// history change.
pub struct StaleAnalyzer<'a> {
    graph: &'a ActionGraph,
    history: &'a dyn HistoryStore,
    deps: &'a dyn DependencyCache,
    options: OutdatedOptions,
    local: DashMap<StepId, Option<StaleReason>>,
    dependency_stamps: DashMap<PathBuf, FileStamp>,
    transitive: HashMap<StepId, Option<StaleReason>>,
    expanded: Vec<bool>,
}

impl<'a> StaleAnalyzer<'a> {
    /// Creates an analyzer. `graph` must already be linked.
    pub fn new(
        graph: &'a ActionGraph,
        history: &'a dyn HistoryStore,
        deps: &'a dyn DependencyCache,
        options: OutdatedOptions,
    ) -> Self {
        Self {
            graph,
            history,
            deps,
            options,
            local: DashMap::new(),
            dependency_stamps: DashMap::new(),
            transitive: HashMap::new(),
            expanded: vec![false; graph.len()],
        }
    }

    /// Returns the outdated steps among `subset` and its transitive
    /// prerequisites, in ID order.
    pub fn gather_outdated(&mut self, subset: &[StepId]) -> Vec<Outdated> {
        let closure = gather_prerequisites(self.graph, subset);
        self.check_local(&closure);

        let mut outdated = Vec::new();
        for &id in &closure {
            if let Some(reason) = self.resolve(id) {
                debug!(step = %id, action = %self.graph.step(id).label(), "outdated: {reason}");
                outdated.push(Outdated { step: id, reason });
            }
        }
        debug!(checked = closure.len(), outdated = outdated.len(), "gathered outdated steps");
        outdated
    }

    /// Returns `true` if `id` must re-run, considering its prerequisites.
    pub fn is_outdated(&mut self, id: StepId) -> bool {
        self.resolve(id).is_some()
    }

    /// The reason recorded for `id`, if it has been found outdated.
    pub fn reason(&self, id: StepId) -> Option<&StaleReason> {
        self.transitive.get(&id).and_then(Option::as_ref)
    }

    /// Computes local verdicts for every step in `ids` in parallel.
    fn check_local(&self, ids: &[StepId]) {
        let lists: Vec<PathBuf> = ids
            .iter()
            .filter_map(|&id| self.graph.step(id).dependency_list)
            .map(|list| self.graph.artifacts().path(list).to_path_buf())
            .collect();
        self.deps.prefetch(&lists);

        ids.par_iter().for_each(|&id| {
            self.local_verdict(id);
        });
    }

    fn local_verdict(&self, id: StepId) -> Option<StaleReason> {
        if let Some(verdict) = self.local.get(&id) {
            return verdict.clone();
        }
        let verdict = self.check_step(self.graph.step(id));
        self.local.entry(id).or_insert(verdict).clone()
    }

    /// The local check: only this step's own artifacts are consulted.
    fn check_step(&self, step: &BuildStep) -> Option<StaleReason> {
        let artifacts = self.graph.artifacts();
        if step.produced.is_empty() {
            return Some(StaleReason::NoOutputs);
        }

        if step.use_action_history {
            // Every output is updated, so the history is current even when
            // the first one already proves the step outdated.
            let fingerprint = step.fingerprint();
            let mut changed = None;
            for &artifact in &step.produced {
                let path = artifacts.path(artifact);
                match self.history.update_producing_attributes(path, fingerprint) {
                    Ok(false) => {}
                    Ok(true) => {
                        changed.get_or_insert(StaleReason::FingerprintChanged {
                            artifact: path.to_path_buf(),
                        });
                    }
                    Err(e) => {
                        warn!(artifact = %path.display(), "treating step as outdated: {e}");
                        changed.get_or_insert(StaleReason::HistoryUnavailable {
                            artifact: path.to_path_buf(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            if changed.is_some() {
                return changed;
            }
        }

        let check_empty = step.kind.policy().zero_length_outputs_are_stale;
        let mut last_execution: Option<SystemTime> = None;
        for &artifact in &step.produced {
            let stamp = artifacts.stamp(artifact);
            let path = artifacts.path(artifact);
            if !stamp.exists {
                return Some(StaleReason::MissingOutput {
                    artifact: path.to_path_buf(),
                });
            }
            if check_empty && stamp.size == 0 && is_object_file(path) {
                return Some(StaleReason::EmptyObject {
                    artifact: path.to_path_buf(),
                });
            }
            // Without a timestamp nothing can be proven newer; the output
            // counts as produced at the epoch.
            let produced_at = stamp.newest_time().unwrap_or(SystemTime::UNIX_EPOCH);
            last_execution = Some(match last_execution {
                Some(t) => t.min(produced_at),
                None => produced_at,
            });
        }
        let last_execution = last_execution.unwrap_or(SystemTime::UNIX_EPOCH);
        let slack = self.options.timestamp_slack;

        for &artifact in &step.prerequisites {
            if self.options.ignore_outdated_import_libraries && self.is_import_library(artifact) {
                continue;
            }
            if artifacts.stamp(artifact).is_newer_than(last_execution, slack) {
                return Some(StaleReason::PrerequisiteNewer {
                    artifact: artifacts.path(artifact).to_path_buf(),
                });
            }
        }

        if let Some(list) = step.dependency_list {
            let list_path = artifacts.path(list);
            let Some(files) = self.deps.try_get_dependencies(list_path) else {
                return Some(StaleReason::DependencyListMissing {
                    list: list_path.to_path_buf(),
                });
            };
            for file in files {
                let file = resolve_relative(&step.working_dir, file);
                let stamp = self.dependency_stamp(&file);
                if !stamp.exists {
                    return Some(StaleReason::DependencyMissing { file });
                }
                if stamp.is_newer_than(last_execution, slack) {
                    return Some(StaleReason::DependencyNewer { file });
                }
            }
        }
        None
    }

    /// `artifact` is an import library produced by an import-library step.
    fn is_import_library(&self, artifact: joist_graph::ArtifactId) -> bool {
        self.graph
            .producer_of(artifact)
            .is_some_and(|producer| self.graph.step(producer).produces_import_library)
            && self
                .graph
                .artifacts()
                .get(artifact)
                .has_import_library_extension()
    }

    fn dependency_stamp(&self, file: &Path) -> FileStamp {
        if let Some(stamp) = self.dependency_stamps.get(file) {
            return *stamp;
        }
        let stamp = FileStamp::probe(file);
        *self
            .dependency_stamps
            .entry(file.to_path_buf())
            .or_insert(stamp)
    }

    /// Transitive verdict for `root`, memoized for every step visited.
    ///
    /// Post-order walk with an explicit stack. With the import-library
    /// option set, an edge that only carries import libraries does not
    /// propagate, so a step is outdated only if some path of ordinary edges
    /// reaches a locally outdated step.
    fn resolve(&mut self, root: StepId) -> Option<StaleReason> {
        if let Some(verdict) = self.transitive.get(&root) {
            return verdict.clone();
        }
        // Every step expanded here is resolved before returning, so the
        // flags stay valid across calls.
        let graph = self.graph;
        let mut stack: Vec<(StepId, bool)> = vec![(root, false)];

        while let Some((id, post)) = stack.pop() {
            if self.transitive.contains_key(&id) {
                continue;
            }
            if !post {
                if self.expanded[id.index()] {
                    continue;
                }
                self.expanded[id.index()] = true;
                stack.push((id, true));
                for &p in graph.prerequisites(id) {
                    if !self.expanded[p.index()] && !self.transitive.contains_key(&p) {
                        stack.push((p, false));
                    }
                }
                continue;
            }

            let verdict = self.local_verdict(id).or_else(|| {
                graph
                    .prerequisites(id)
                    .iter()
                    .find(|&&p| {
                        let exempt = self.options.ignore_outdated_import_libraries
                            && graph.is_import_library_edge(id, p);
                        !exempt && matches!(self.transitive.get(&p), Some(Some(_)))
                    })
                    .map(|&p| StaleReason::PrerequisiteOutdated { step: p })
            });
            self.transitive.insert(id, verdict);
        }
        self.transitive.get(&root).cloned().flatten()
    }
}

/// Returns the outdated steps among `subset` and its transitive
/// prerequisites, in ID order.
///
/// Shorthand for a single query on a fresh [`StaleAnalyzer`].
pub fn gather_outdated(
    graph: &ActionGraph,
    subset: &[StepId],
    history: &dyn HistoryStore,
    deps: &dyn DependencyCache,
    options: OutdatedOptions,
) -> Vec<Outdated> {
    StaleAnalyzer::new(graph, history, deps, options).gather_outdated(subset)
}

fn is_object_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| OBJECT_EXTENSIONS.iter().any(|o| ext.eq_ignore_ascii_case(o)))
}

fn resolve_relative(working_dir: &Path, file: PathBuf) -> PathBuf {
    if file.is_relative() && !working_dir.as_os_str().is_empty() {
        working_dir.join(file)
    } else {
        file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depcache::DepFileCache;
    use crate::error::StaleError;
    use crate::history::ActionHistory;
    use joist_common::ContentHash;
    use joist_graph::{link, ArtifactTable, StepKind};
    use std::fs::File;

    struct Tree {
        dir: tempfile::TempDir,
    }

    impl Tree {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        /// Creates `name` with `age_secs` seconds of age.
        fn file(&self, name: &str, age_secs: u64) -> PathBuf {
            let path = self.path(name);
            std::fs::write(&path, b"x").unwrap();
            let time = SystemTime::now() - Duration::from_secs(age_secs);
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(time)
                .unwrap();
            path
        }

        /// Creates `name` with a last-write time a minute in the future,
        /// past any output's creation time.
        fn touch(&self, name: &str) -> PathBuf {
            let path = self.path(name);
            std::fs::write(&path, b"x").unwrap();
            let time = SystemTime::now() + Duration::from_secs(60);
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(time)
                .unwrap();
            path
        }
    }

    struct FailingHistory;

    impl HistoryStore for FailingHistory {
        fn update_producing_attributes(
            &self,
            _artifact: &Path,
            _fingerprint: ContentHash,
        ) -> Result<bool, StaleError> {
            Err(StaleError::Poisoned)
        }
    }

    fn id(raw: u32) -> StepId {
        StepId::from_raw(raw)
    }

    fn run(graph: &ActionGraph, options: OutdatedOptions) -> Vec<StepId> {
        let history = ActionHistory::in_memory();
        let deps = DepFileCache::new();
        let all: Vec<StepId> = graph.step_ids().collect();
        gather_outdated(graph, &all, &history, &deps, options)
            .into_iter()
            .map(|o| o.step)
            .collect()
    }

    /// A: a.cpp → a.obj; B: b.cpp → b.obj; C: a.obj, b.obj → app.exe.
    fn abc(tree: &Tree) -> ActionGraph {
        let mut t = ArtifactTable::new();
        let a_cpp = t.intern(tree.path("a.cpp"));
        let b_cpp = t.intern(tree.path("b.cpp"));
        let a_obj = t.intern(tree.path("a.obj"));
        let b_obj = t.intern(tree.path("b.obj"));
        let exe = t.intern(tree.path("app.exe"));
        let steps = vec![
            BuildStep::new(StepKind::Compile, "cc", "a")
                .with_prerequisite(a_cpp)
                .with_produced(a_obj),
            BuildStep::new(StepKind::Compile, "cc", "b")
                .with_prerequisite(b_cpp)
                .with_produced(b_obj),
            BuildStep::new(StepKind::Link, "ld", "app")
                .with_prerequisite(a_obj)
                .with_prerequisite(b_obj)
                .with_produced(exe),
        ];
        let mut graph = ActionGraph::new(t, steps);
        link(&mut graph).unwrap();
        graph
    }

    #[test]
    fn up_to_date_tree_has_nothing_to_do() {
        let tree = Tree::new();
        tree.file("a.cpp", 100);
        tree.file("b.cpp", 100);
        tree.file("a.obj", 50);
        tree.file("b.obj", 50);
        tree.file("app.exe", 10);
        assert!(run(&abc(&tree), OutdatedOptions::default()).is_empty());
    }

    #[test]
    fn touched_source_rebuilds_object_and_link() {
        let tree = Tree::new();
        tree.touch("a.cpp");
        tree.file("b.cpp", 100);
        tree.file("a.obj", 50);
        tree.file("b.obj", 50);
        tree.file("app.exe", 10);
        let graph = abc(&tree);
        assert_eq!(run(&graph, OutdatedOptions::default()), vec![id(0), id(2)]);
    }

    #[test]
    fn missing_output_is_outdated() {
        let tree = Tree::new();
        tree.file("a.cpp", 100);
        tree.file("b.cpp", 100);
        tree.file("a.obj", 50);
        tree.file("app.exe", 10);
        let graph = abc(&tree);
        let history = ActionHistory::in_memory();
        let deps = DepFileCache::new();
        let mut analyzer = StaleAnalyzer::new(&graph, &history, &deps, OutdatedOptions::default());
        let outdated = analyzer.gather_outdated(&[id(2)]);
        assert_eq!(outdated.len(), 2);
        assert!(matches!(outdated[0].reason, StaleReason::MissingOutput { .. }));
        assert_eq!(outdated[1].reason, StaleReason::PrerequisiteOutdated { step: id(1) });
        assert!(analyzer.is_outdated(id(1)));
        assert!(!analyzer.is_outdated(id(0)));
    }

    #[test]
    fn within_slack_is_not_newer() {
        let tree = Tree::new();
        tree.file("a.cpp", 50);
        tree.file("b.cpp", 100);
        tree.file("a.obj", 50);
        tree.file("b.obj", 50);
        tree.file("app.exe", 10);
        // Same-second writes stay up to date under the default slack.
        assert!(run(&abc(&tree), OutdatedOptions::default()).is_empty());
    }

    #[test]
    fn zero_length_object_is_outdated() {
        let tree = Tree::new();
        tree.file("a.cpp", 100);
        tree.file("b.cpp", 100);
        tree.file("a.obj", 50);
        std::fs::write(tree.path("b.obj"), b"").unwrap();
        tree.file("app.exe", 10);
        let graph = abc(&tree);
        let outdated = gather_outdated(
            &graph,
            &[id(1)],
            &ActionHistory::in_memory(),
            &DepFileCache::new(),
            OutdatedOptions::default(),
        );
        assert_eq!(outdated.len(), 1);
        assert!(matches!(outdated[0].reason, StaleReason::EmptyObject { .. }));
    }

    #[test]
    fn step_without_outputs_always_runs() {
        let t = ArtifactTable::new();
        let graph = ActionGraph::new(t, vec![BuildStep::new(StepKind::PostBuild, "echo", "done")]);
        assert_eq!(run(&graph, OutdatedOptions::default()), vec![id(0)]);
    }

    #[test]
    fn changed_command_rebuilds_with_history() {
        let tree = Tree::new();
        tree.file("a.cpp", 100);
        let out = tree.file("a.obj", 10);
        let mut t = ArtifactTable::new();
        let src = t.intern(tree.path("a.cpp"));
        let obj = t.intern(&out);
        let step = BuildStep::new(StepKind::Compile, "cc", "-O2 a.cpp")
            .with_prerequisite(src)
            .with_produced(obj)
            .with_action_history();
        let mut graph = ActionGraph::new(t, vec![step.clone()]);
        link(&mut graph).unwrap();

        let history = ActionHistory::in_memory();
        history
            .update_producing_attributes(&out, step.fingerprint())
            .unwrap();
        let deps = DepFileCache::new();
        let opts = OutdatedOptions::default();
        assert!(gather_outdated(&graph, &[id(0)], &history, &deps, opts).is_empty());

        let mut changed = step.clone();
        changed.command.arguments = "-O0 a.cpp".into();
        graph.replace_step(id(0), changed.clone());
        let outdated = gather_outdated(&graph, &[id(0)], &history, &deps, opts);
        assert!(matches!(outdated[0].reason, StaleReason::FingerprintChanged { .. }));
        assert_eq!(history.get(&out), Some(changed.fingerprint()));
    }

    #[test]
    fn history_fault_degrades_to_outdated() {
        let tree = Tree::new();
        let out = tree.file("a.obj", 10);
        let mut t = ArtifactTable::new();
        let obj = t.intern(&out);
        let graph = ActionGraph::new(
            t,
            vec![BuildStep::new(StepKind::Compile, "cc", "a")
                .with_produced(obj)
                .with_action_history()],
        );
        let outdated = gather_outdated(
            &graph,
            &[id(0)],
            &FailingHistory,
            &DepFileCache::new(),
            OutdatedOptions::default(),
        );
        assert!(matches!(outdated[0].reason, StaleReason::HistoryUnavailable { .. }));
    }

    #[test]
    fn dependency_list_drives_rebuilds() {
        let tree = Tree::new();
        tree.file("a.cpp", 100);
        tree.file("old.h", 100);
        tree.file("a.obj", 50);
        let list = tree.path("a.d");
        let mut t = ArtifactTable::new();
        let src = t.intern(tree.path("a.cpp"));
        let obj = t.intern(tree.path("a.obj"));
        let dep = t.intern(&list);
        let graph = ActionGraph::new(
            t,
            vec![BuildStep::new(StepKind::Compile, "cc", "a")
                .with_prerequisite(src)
                .with_produced(obj)
                .with_dependency_list(dep)
                .with_working_dir(tree.dir.path())],
        );
        let history = ActionHistory::in_memory();
        let opts = OutdatedOptions::default();

        let missing_list = gather_outdated(&graph, &[id(0)], &history, &DepFileCache::new(), opts);
        assert!(matches!(missing_list[0].reason, StaleReason::DependencyListMissing { .. }));

        std::fs::write(&list, "a.obj: a.cpp old.h\n").unwrap();
        assert!(gather_outdated(&graph, &[id(0)], &history, &DepFileCache::new(), opts).is_empty());

        tree.touch("new.h");
        std::fs::write(&list, "a.obj: a.cpp old.h new.h\n").unwrap();
        let newer = gather_outdated(&graph, &[id(0)], &history, &DepFileCache::new(), opts);
        assert_eq!(
            newer[0].reason,
            StaleReason::DependencyNewer {
                file: tree.path("new.h")
            }
        );

        std::fs::write(&list, "a.obj: a.cpp gone.h\n").unwrap();
        let gone = gather_outdated(&graph, &[id(0)], &history, &DepFileCache::new(), opts);
        assert!(matches!(gone[0].reason, StaleReason::DependencyMissing { .. }));
    }

    /// D: d.def → d.dll + d.lib (import library); B: d.lib → b.exe.
    fn import_library_graph(tree: &Tree) -> ActionGraph {
        let mut t = ArtifactTable::new();
        let def = t.intern(tree.path("d.def"));
        let dll = t.intern(tree.path("d.dll"));
        let lib = t.intern(tree.path("d.lib"));
        let exe = t.intern(tree.path("b.exe"));
        let steps = vec![
            BuildStep::new(StepKind::Link, "link", "/dll d")
                .with_prerequisite(def)
                .with_produced(dll)
                .with_produced(lib)
                .with_import_library(),
            BuildStep::new(StepKind::Link, "link", "b")
                .with_prerequisite(lib)
                .with_produced(exe),
        ];
        let mut graph = ActionGraph::new(t, steps);
        link(&mut graph).unwrap();
        graph
    }

    #[test]
    fn import_library_exemption() {
        let tree = Tree::new();
        tree.touch("d.def");
        tree.file("d.dll", 50);
        tree.file("d.lib", 50);
        tree.file("b.exe", 10);
        let graph = import_library_graph(&tree);

        let exempt = OutdatedOptions {
            ignore_outdated_import_libraries: true,
            ..OutdatedOptions::default()
        };
        assert_eq!(run(&graph, exempt), vec![id(0)]);
        assert_eq!(run(&graph, OutdatedOptions::default()), vec![id(0), id(1)]);
    }

    #[test]
    fn import_library_exemption_skips_newer_lib_locally() {
        let tree = Tree::new();
        tree.file("d.def", 100);
        tree.file("d.dll", 50);
        tree.touch("d.lib");
        tree.file("b.exe", 10);
        let graph = import_library_graph(&tree);
        let exempt = OutdatedOptions {
            ignore_outdated_import_libraries: true,
            ..OutdatedOptions::default()
        };
        assert!(run(&graph, exempt).is_empty());
        assert_eq!(run(&graph, OutdatedOptions::default()), vec![id(1)]);
    }

    #[test]
    fn repeated_queries_share_one_walk() {
        let tree = Tree::new();
        let mut t = ArtifactTable::new();
        let base = t.intern(tree.path("base.h"));
        let left = t.intern(tree.file("left.h", 50));
        let right = t.intern(tree.file("right.h", 50));
        let top = t.intern(tree.file("top.h", 10));
        let steps = vec![
            BuildStep::new(StepKind::Generate, "gen", "base").with_produced(base),
            BuildStep::new(StepKind::Generate, "gen", "left")
                .with_prerequisite(base)
                .with_produced(left),
            BuildStep::new(StepKind::Generate, "gen", "right")
                .with_prerequisite(base)
                .with_produced(right),
            BuildStep::new(StepKind::Generate, "gen", "top")
                .with_prerequisite(left)
                .with_prerequisite(right)
                .with_produced(top),
        ];
        let mut graph = ActionGraph::new(t, steps);
        link(&mut graph).unwrap();
        let history = ActionHistory::in_memory();
        let deps = DepFileCache::new();
        let mut analyzer = StaleAnalyzer::new(&graph, &history, &deps, OutdatedOptions::default());
        analyzer.check_local(&graph.step_ids().collect::<Vec<_>>());

        assert!(analyzer.is_outdated(id(1)));
        assert!(analyzer.is_outdated(id(3)));
        assert!(analyzer.is_outdated(id(2)));
        assert_eq!(
            analyzer.reason(id(2)),
            Some(&StaleReason::PrerequisiteOutdated { step: id(0) })
        );
        let again = analyzer.gather_outdated(&[id(3)]);
        assert_eq!(again.len(), 4);
    }

    #[test]
    fn outdated_spreads_to_every_transitive_dependent() {
        let tree = Tree::new();
        let n = 50;
        let mut t = ArtifactTable::new();
        let outs: Vec<_> = (0..n)
            .map(|i| {
                tree.file(&format!("g{i}.h"), 100 - i as u64);
                t.intern(tree.path(&format!("g{i}.h")))
            })
            .collect();
        let steps: Vec<BuildStep> = (0..n)
            .map(|i| {
                let step = BuildStep::new(StepKind::Generate, "gen", format!("{i}"))
                    .with_produced(outs[i]);
                if i > 0 {
                    step.with_prerequisite(outs[i - 1])
                } else {
                    step
                }
            })
            .collect();
        let mut graph = ActionGraph::new(t, steps);
        link(&mut graph).unwrap();
        assert!(run(&graph, OutdatedOptions::default()).is_empty());

        std::fs::remove_file(tree.path("g10.h")).unwrap();
        let mut graph = graph.clone();
        link(&mut graph).unwrap();
        let outdated = run(&graph, OutdatedOptions::default());
        let expected: Vec<StepId> = (10..n as u32).map(id).collect();
        assert_eq!(outdated, expected);
    }
}
