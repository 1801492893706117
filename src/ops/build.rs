//! Implementation of `fpbuild build`.
//!
//! The orchestrator drives a strictly forward state machine:
//!
//! ```text
//! Idle -> Resolving -> BuildingModule -> BuildingExtension(0..n) -> Collecting -> Done
//!   \__________________________\__________________\______________> Aborted(reason)
//! ```
//!
//! The first failure aborts the run. Nothing is retried and no partial
//! manifest is produced.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::builder::{
    BuildError, BuildWarning, CMakeBuilder, EnvInputs, EnvironmentResolver,
    JitExtensionBuilder, Pybind11Probe, ResolvedEnvironment, TargetBuilder, ToolchainProbe,
    TorchExtensionToolchain,
};
use crate::core::{BuildArtifact, BuildResult, BuildTarget, PackagingManifest, ProjectLayout};
use crate::util::process::SystemRunner;
use crate::util::GlobalContext;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Environment prefix (CONDA_PREFIX)
    pub prefix: Option<PathBuf>,

    /// Number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,

    /// Fail when the module build leaves no library behind
    pub strict_artifacts: bool,

    /// Verbose extension toolchain output
    pub verbose_extensions: bool,
}

/// Where the orchestrator is in its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Resolving,
    BuildingModule,
    BuildingExtension(usize),
    Collecting,
    Done,
    Aborted(String),
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorState::Done | OrchestratorState::Aborted(_))
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorState::Idle => write!(f, "idle"),
            OrchestratorState::Resolving => write!(f, "resolving"),
            OrchestratorState::BuildingModule => write!(f, "building module"),
            OrchestratorState::BuildingExtension(i) => write!(f, "building extension #{}", i),
            OrchestratorState::Collecting => write!(f, "collecting"),
            OrchestratorState::Done => write!(f, "done"),
            OrchestratorState::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct BuildReport {
    /// Artifacts to hand to the packaging step
    pub manifest: PackagingManifest,

    /// Environment the run was parameterized by
    pub environment: ResolvedEnvironment,

    /// Every non-fatal problem raised during the run
    pub warnings: Vec<BuildWarning>,
}

/// Sequences resolution, the module build, the extension builds and collection.
pub struct BuildOrchestrator<'a> {
    layout: &'a ProjectLayout,
    probe: &'a dyn ToolchainProbe,
    module_builder: &'a dyn TargetBuilder,
    extension_builder: &'a dyn TargetBuilder,
    options: BuildOptions,
    state: OrchestratorState,
    history: Vec<OrchestratorState>,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(
        layout: &'a ProjectLayout,
        probe: &'a dyn ToolchainProbe,
        module_builder: &'a dyn TargetBuilder,
        extension_builder: &'a dyn TargetBuilder,
        options: BuildOptions,
    ) -> Self {
        BuildOrchestrator {
            layout,
            probe,
            module_builder,
            extension_builder,
            options,
            state: OrchestratorState::Idle,
            history: vec![OrchestratorState::Idle],
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[OrchestratorState] {
        &self.history
    }

    /// Run the pipeline once.
    pub fn run(&mut self) -> Result<BuildReport, BuildError> {
        debug_assert!(
            !self.state.is_terminal(),
            "an orchestrator runs only once"
        );

        // Build directories do not depend on the environment, so ownership is
        // checked before anything touches the filesystem.
        if let Some((first, second)) = self.layout.targets(&[]).overlapping_build_dirs() {
            let err = BuildError::SharedBuildDirectory {
                first: first.name().to_string(),
                second: second.name().to_string(),
                dir: second.build_dir().to_path_buf(),
            };
            return Err(self.abort(err));
        }

        self.transition(OrchestratorState::Resolving);
        let env = EnvironmentResolver::new(
            EnvInputs {
                prefix: self.options.prefix.clone(),
                jobs: self.options.jobs,
            },
            self.probe,
        )
        .resolve();
        let mut warnings = env.warnings.clone();
        let targets = self.layout.targets(&env.extra_include_paths);

        let mut collected: Vec<BTreeSet<BuildArtifact>> = Vec::new();

        self.transition(OrchestratorState::BuildingModule);
        let module_builder = self.module_builder;
        collected.push(self.build_target(module_builder, &targets.module, &env, &mut warnings)?);

        let extension_builder = self.extension_builder;
        for (i, target) in targets.extensions.iter().enumerate() {
            self.transition(OrchestratorState::BuildingExtension(i));
            collected.push(self.build_target(extension_builder, target, &env, &mut warnings)?);
        }

        self.transition(OrchestratorState::Collecting);
        let mut manifest = PackagingManifest::new();
        for artifacts in collected {
            manifest.extend(artifacts);
        }
        tracing::debug!("Collected {} artifacts", manifest.len());

        self.transition(OrchestratorState::Done);
        Ok(BuildReport {
            manifest,
            environment: env,
            warnings,
        })
    }

    fn build_target(
        &mut self,
        builder: &dyn TargetBuilder,
        target: &BuildTarget,
        env: &ResolvedEnvironment,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<BTreeSet<BuildArtifact>, BuildError> {
        let outcome = match builder.build(target, env) {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(self.abort(BuildError::Setup {
                    target: target.name().to_string(),
                    message: format!("{:#}", e),
                }))
            }
        };

        let missing = outcome.warnings.iter().find_map(|w| match w {
            BuildWarning::ArtifactNotFound {
                target,
                pattern,
                build_dir,
            } => Some(BuildError::ArtifactNotFound {
                target: target.clone(),
                pattern: pattern.clone(),
                build_dir: build_dir.clone(),
            }),
            _ => None,
        });
        warnings.extend(outcome.warnings);

        match (outcome.result, missing) {
            (BuildResult::Failure(failure), _) => Err(self.abort(failure.into())),
            (BuildResult::Success(_), Some(err)) if self.options.strict_artifacts => {
                Err(self.abort(err))
            }
            (BuildResult::Success(artifacts), _) => Ok(artifacts),
        }
    }

    fn transition(&mut self, next: OrchestratorState) {
        tracing::debug!("orchestrator: {} -> {}", self.state, next);
        self.state = next.clone();
        self.history.push(next);
    }

    fn abort(&mut self, err: BuildError) -> BuildError {
        tracing::error!("{}", err);
        self.transition(OrchestratorState::Aborted(err.to_string()));
        err
    }
}

/// Build everything with the real toolchains.
pub fn build(ctx: &GlobalContext, opts: &BuildOptions) -> Result<BuildReport, BuildError> {
    let layout = ProjectLayout::from_config(ctx.project_root(), &ctx.config().project);
    let programs = ctx.programs();
    let runner = SystemRunner;

    let probe = Pybind11Probe::new(&programs.python, &runner);
    let module_builder = CMakeBuilder::new(&runner, layout.package())
        .cmake(&programs.cmake)
        .make(&programs.make);
    let toolchain = TorchExtensionToolchain::new(&programs.python, &runner);
    let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root())
        .verbose(opts.verbose_extensions);

    tracing::info!("Running native extension build for {}", layout.package());

    BuildOrchestrator::new(
        &layout,
        &probe,
        &module_builder,
        &extension_builder,
        opts.clone(),
    )
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ToolchainDiscovery;
    use crate::core::BuildStage;
    use crate::test_support::{create_test_project, FakeToolchain, MockExecutor, MockProcessOutput};
    use crate::util::config::ProjectConfig;

    fn no_pybind11() -> ToolchainDiscovery {
        ToolchainDiscovery::Unavailable("No module named 'pybind11'".to_string())
    }

    /// Module build that succeeds and leaves `mycpp.cpython-cpuarch.so` behind.
    fn successful_module(exec: &MockExecutor, layout: &ProjectLayout) {
        exec.expect_prefix("cmake ", MockProcessOutput::success(""));
        exec.expect_creating(
            "make -j2",
            MockProcessOutput::success(""),
            [layout.module_build_dir().join("mycpp.cpython-cpuarch.so")],
        );
    }

    fn options() -> BuildOptions {
        BuildOptions {
            jobs: Some(2),
            ..BuildOptions::default()
        }
    }

    #[test]
    fn test_full_pipeline_without_prefix() {
        let project = create_test_project();
        let layout = ProjectLayout::new(project.path());
        let exec = MockExecutor::new();
        successful_module(&exec, &layout);
        let toolchain = FakeToolchain::new();
        let probe = no_pybind11();

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let mut orchestrator =
            BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, options());

        let report = orchestrator.run().unwrap();

        let destinations: Vec<_> = report.manifest.destinations().collect();
        assert!(destinations.contains(&"foundationpose/mycpp.cpython-cpuarch.so"));
        assert!(destinations.contains(&"foundationpose/bundlesdf/mycuda/common.so"));
        assert!(destinations.contains(&"foundationpose/bundlesdf/mycuda/gridencoder.so"));
        assert_eq!(report.manifest.len(), 3);

        assert_eq!(
            orchestrator.history(),
            &[
                OrchestratorState::Idle,
                OrchestratorState::Resolving,
                OrchestratorState::BuildingModule,
                OrchestratorState::BuildingExtension(0),
                OrchestratorState::BuildingExtension(1),
                OrchestratorState::Collecting,
                OrchestratorState::Done,
            ]
        );
        assert_eq!(toolchain.built(), vec!["common", "gridencoder"]);

        // No prefix: configure gets only the release flag
        let calls = exec.calls();
        assert!(calls[0].ends_with("mycpp -DCMAKE_BUILD_TYPE=Release"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_module_lands_at_package_root() {
        let project = create_test_project();
        let layout = ProjectLayout::new(project.path());
        let exec = MockExecutor::new();
        successful_module(&exec, &layout);
        let toolchain = FakeToolchain::new();
        let probe = no_pybind11();

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let report =
            BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, options())
                .run()
                .unwrap();

        let library = layout.module_build_dir().join("mycpp.cpython-cpuarch.so");
        assert_eq!(
            report.manifest.get(&library),
            Some("foundationpose/mycpp.cpython-cpuarch.so")
        );
    }

    #[test]
    fn test_extension_failure_aborts_everything() {
        let project = create_test_project();
        let layout = ProjectLayout::new(project.path());
        let exec = MockExecutor::new();
        successful_module(&exec, &layout);
        let toolchain = FakeToolchain::new().failing("common");
        let probe = no_pybind11();

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let mut orchestrator =
            BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, options());

        let err = orchestrator.run().unwrap_err();

        assert!(matches!(
            &err,
            BuildError::Compile { target, .. } if target == "common"
        ));
        assert_eq!(err.stage(), Some(BuildStage::Compile));
        // gridencoder is never attempted
        assert_eq!(toolchain.attempted(), vec!["common"]);
        assert!(matches!(orchestrator.state(), OrchestratorState::Aborted(_)));
        assert!(orchestrator.state().is_terminal());
        assert!(!orchestrator
            .history()
            .contains(&OrchestratorState::BuildingExtension(1)));
        assert!(!orchestrator.history().contains(&OrchestratorState::Collecting));
    }

    #[test]
    fn test_configure_failure_stops_before_extensions() {
        let project = create_test_project();
        let layout = ProjectLayout::new(project.path());
        let exec = MockExecutor::new();
        exec.expect_prefix("cmake ", MockProcessOutput::failure(1, "CMake Error"));
        let toolchain = FakeToolchain::new();
        let probe = no_pybind11();

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let mut orchestrator =
            BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, options());

        let err = orchestrator.run().unwrap_err();

        assert!(matches!(
            err,
            BuildError::Configure { ref target, exit_code: 1 } if target == "mycpp"
        ));
        assert!(!exec.was_called("make"));
        assert!(toolchain.attempted().is_empty());
        assert!(layout.module_build_dir().is_dir());
        assert!(crate::util::fs::glob_files(&layout.module_build_dir(), "*.so")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_prefix_reaches_both_builders() {
        let project = create_test_project();
        let layout = ProjectLayout::new(project.path());
        let exec = MockExecutor::new();
        successful_module(&exec, &layout);
        let toolchain = FakeToolchain::new();
        let probe = ToolchainDiscovery::Found(PathBuf::from("/env/share/cmake/pybind11"));

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let opts = BuildOptions {
            prefix: Some(PathBuf::from("/env")),
            ..options()
        };
        let report =
            BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, opts)
                .run()
                .unwrap();

        assert!(report.warnings.is_empty());
        let configure = &exec.calls()[0];
        assert!(configure.contains("-Dpybind11_DIR=/env/share/cmake/pybind11"));
        assert!(configure.contains("-DCMAKE_PREFIX_PATH=/env"));

        for request in toolchain.requests() {
            assert_eq!(
                request.extra_include_paths.last(),
                Some(&PathBuf::from("/env/include/eigen3"))
            );
        }
    }

    #[test]
    fn test_missing_library_warns_by_default() {
        let project = create_test_project();
        let layout = ProjectLayout::new(project.path());
        let exec = MockExecutor::new();
        exec.set_default(MockProcessOutput::success(""));
        let toolchain = FakeToolchain::new();
        let probe = ToolchainDiscovery::Found(PathBuf::from("/pybind11"));

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let report =
            BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, options())
                .run()
                .unwrap();

        assert_eq!(report.manifest.len(), 2);
        assert!(matches!(
            report.warnings.as_slice(),
            [BuildWarning::ArtifactNotFound { .. }]
        ));
    }

    #[test]
    fn test_missing_library_fails_in_strict_mode() {
        let project = create_test_project();
        let layout = ProjectLayout::new(project.path());
        let exec = MockExecutor::new();
        exec.set_default(MockProcessOutput::success(""));
        let toolchain = FakeToolchain::new();
        let probe = ToolchainDiscovery::Found(PathBuf::from("/pybind11"));

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let opts = BuildOptions {
            strict_artifacts: true,
            ..options()
        };
        let err = BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, opts)
            .run()
            .unwrap_err();

        assert!(matches!(err, BuildError::ArtifactNotFound { .. }));
        assert!(toolchain.attempted().is_empty());
    }

    #[test]
    fn test_shared_build_directory_is_rejected() {
        let project = create_test_project();
        let config = ProjectConfig {
            extension_dir: Some(PathBuf::from("mycpp")),
            ..ProjectConfig::default()
        };
        let layout = ProjectLayout::from_config(project.path(), &config);
        let exec = MockExecutor::new();
        let toolchain = FakeToolchain::new();
        let probe = no_pybind11();

        let module_builder = CMakeBuilder::new(&exec, layout.package());
        let extension_builder = JitExtensionBuilder::new(&toolchain, layout.root());
        let mut orchestrator =
            BuildOrchestrator::new(&layout, &probe, &module_builder, &extension_builder, options());

        let err = orchestrator.run().unwrap_err();
        assert!(matches!(err, BuildError::SharedBuildDirectory { .. }));
        assert!(exec.calls().is_empty());
        assert_eq!(
            orchestrator.history(),
            &[
                OrchestratorState::Idle,
                OrchestratorState::Aborted(err.to_string()),
            ]
        );
    }
}
