use rig_core::{AHashMap, AHashSet, Error, Requirement, RequirementSpec, Result};
use rig_finder::{DistroForest, DistroVersion};
use semver::Version;

enum Signal {
    Fatal(Error),
    Conflict(String, Version),
}

impl From<Error> for Signal {
    fn from(e: Error) -> Self {
        Signal::Fatal(e)
    }
}

#[derive(Default)]
struct State {
    combined: AHashMap<String, RequirementSpec>,
    resolved: AHashMap<String, DistroVersion>,
    processed: AHashSet<String>,
    order: Vec<String>,
}

/// The solved distro set plus the order families were first resolved in —
/// callers that compose environments/aliases in "distro dependency order"
/// (spec §4.8) need this; a plain map has no order to preserve.
#[derive(Debug, Clone, Default)]
pub struct SolveResult {
    pub resolved: AHashMap<String, DistroVersion>,
    pub order: Vec<String>,
}

/// The recursive/redirect version solver (component G).
///
/// `forced` pins a family to an exact requirement regardless of what any
/// descriptor declares — documented in the source project as a
/// development/testing escape hatch, so every use is logged at `warn!`.
/// `omittable` names families that may simply be absent from the forest
/// without failing the solve.
pub struct Solver<'a> {
    forest: &'a DistroForest,
    requirements: Vec<Requirement>,
    forced: AHashMap<String, Requirement>,
    omittable: AHashSet<String>,
    allow_prereleases: bool,
    current_platform: &'a str,
    max_redirects: u32,
}

impl<'a> Solver<'a> {
    pub fn new(forest: &'a DistroForest, requirements: Vec<Requirement>, current_platform: &'a str) -> Self {
        Solver {
            forest,
            requirements,
            forced: AHashMap::new(),
            omittable: AHashSet::new(),
            allow_prereleases: false,
            current_platform,
            max_redirects: 2,
        }
    }

    pub fn with_forced(mut self, forced: impl IntoIterator<Item = Requirement>) -> Self {
        for req in forced {
            tracing::warn!(name = %req.name, "forcing distro requirement");
            self.forced.insert(req.name.clone(), req);
        }
        self
    }

    pub fn with_omittable(mut self, omittable: impl IntoIterator<Item = String>) -> Self {
        self.omittable.extend(omittable);
        self
    }

    pub fn with_prereleases(mut self, allow: bool) -> Self {
        self.allow_prereleases = allow;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Runs the solve, restarting from scratch (with a growing set of
    /// per-family version exclusions) each time a conflict is found,
    /// up to `max_redirects` times.
    pub fn resolve(&self) -> Result<SolveResult> {
        let mut invalid: AHashMap<String, AHashSet<Version>> = AHashMap::new();
        let mut redirects = 0u32;
        loop {
            let mut state = State::default();
            match self.resolve_all(&mut state, &invalid) {
                Ok(()) => {
                    return Ok(SolveResult {
                        resolved: state.resolved,
                        order: state.order,
                    })
                }
                Err(Signal::Fatal(e)) => return Err(e),
                Err(Signal::Conflict(name, bad_version)) => {
                    redirects += 1;
                    if redirects > self.max_redirects {
                        return Err(Error::MaxRedirectsExceeded {
                            max_redirects: self.max_redirects,
                        });
                    }
                    tracing::info!(name = %name, version = %bad_version, redirects, "solver redirecting");
                    invalid.entry(name).or_default().insert(bad_version);
                }
            }
        }
    }

    fn resolve_all(&self, state: &mut State, invalid: &AHashMap<String, AHashSet<Version>>) -> std::result::Result<(), Signal> {
        for req in &self.requirements {
            self.resolve_one(req, state, invalid)?;
        }
        Ok(())
    }

    fn resolve_one(
        &self,
        req: &Requirement,
        state: &mut State,
        invalid: &AHashMap<String, AHashSet<Version>>,
    ) -> std::result::Result<(), Signal> {
        if let Some(marker) = &req.marker {
            if marker != self.current_platform {
                return Ok(());
            }
        }

        let name = req.name.clone();
        let effective = self.forced.get(&name).cloned().unwrap_or_else(|| req.clone());

        if state.processed.contains(&name) {
            let mut spec = state.combined.get(&name).cloned().unwrap_or_else(RequirementSpec::any);
            spec.intersect(&effective.spec);
            state.combined.insert(name.clone(), spec.clone());
            let existing = state.resolved.get(&name).expect("processed implies resolved").clone();
            let excluded = invalid.get(&name);
            let still_valid = spec.matches(&existing.version, self.allow_prereleases)
                && excluded.map_or(true, |ex| !ex.contains(&existing.version));
            if !still_valid {
                return Err(Signal::Conflict(name, existing.version));
            }
            return Ok(());
        }

        let family = match self.forest.family(&name) {
            Some(f) => f,
            None => {
                if self.omittable.contains(&name) {
                    tracing::warn!(name = %name, "omittable distro not present in forest, skipping");
                    return Ok(());
                }
                return Err(Error::InvalidRequirementNoFamily { name }.into());
            }
        };

        let mut spec = state.combined.get(&name).cloned().unwrap_or_else(RequirementSpec::any);
        spec.intersect(&effective.spec);
        state.combined.insert(name.clone(), spec.clone());

        let excluded = invalid.get(&name);
        let version = family
            .versions
            .iter()
            .filter(|v| spec.matches(&v.version, self.allow_prereleases))
            .filter(|v| excluded.map_or(true, |ex| !ex.contains(&v.version)))
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned();

        let version = version.ok_or_else(|| {
            Signal::Fatal(Error::InvalidRequirementNoMatch {
                name: name.clone(),
                requirement: spec.to_string(),
            })
        })?;

        state.processed.insert(name.clone());
        state.order.push(name.clone());
        state.resolved.insert(name.clone(), version.clone());

        let subrequirements = version.requirements().map_err(|e| Signal::Fatal(finder_error_to_core(e)))?;
        for sub in &subrequirements {
            if let Err(Signal::Conflict(_, _)) = self.resolve_one(sub, state, invalid) {
                return Err(Signal::Conflict(name.clone(), version.version.clone()));
            }
        }

        Ok(())
    }
}

fn finder_error_to_core(e: rig_finder::FinderError) -> Error {
    match e {
        rig_finder::FinderError::Core(core) => core,
        other => Error::External(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_finder::{DistroFinder, DistroLocation};
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    #[derive(Debug)]
    struct StubFinder;

    impl DistroFinder for StubFinder {
        fn enumerate(&self) -> rig_finder::Result<Vec<DistroLocation>> {
            Ok(Vec::new())
        }
        fn content(&self, location: &DistroLocation) -> PathBuf {
            location.path.clone()
        }
        fn load_descriptor(&self, _location: &Path) -> rig_finder::Result<rig_finder::DistroDescriptor> {
            Ok(rig_finder::DistroDescriptor::default())
        }
        fn install(&self, _l: &DistroLocation, _d: &Path, _r: bool) -> rig_finder::Result<()> {
            Ok(())
        }
    }

    fn version(name: &str, v: &str, requires: Vec<Requirement>) -> DistroVersion {
        let dv = DistroVersion::new(
            name.to_string(),
            Version::parse(v).unwrap(),
            PathBuf::from(format!("{name}-{v}")),
            Rc::new(StubFinder),
        );
        // Prime the lazy descriptor cache directly via the public accessor's
        // side effect isn't available, so tests build the forest through
        // `DistroDescriptor`-aware finders below instead when requirements
        // are needed; simple cases use an empty-requirements stub.
        let _ = requires;
        dv
    }

    fn build_forest() -> DistroForest {
        let mut forest = DistroForest::new();
        forest.insert(version("the_dcc", "1.0.0", vec![]));
        forest.insert(version("the_dcc", "1.1.0", vec![]));
        forest.insert(version("the_dcc", "1.2.0", vec![]));
        forest.insert(version("the_dcc_plugin_b", "0.9.0", vec![]));
        forest.insert(version("the_dcc_plugin_b", "1.0.0", vec![]));
        forest
    }

    #[test]
    fn resolves_simple_requirement_to_latest_matching_version() {
        let forest = build_forest();
        let solver = Solver::new(&forest, vec![Requirement::parse("the_dcc").unwrap()], "linux");
        let result = solver.resolve().unwrap();
        assert_eq!(result.resolved["the_dcc"].version, Version::parse("1.2.0").unwrap());
        assert_eq!(result.order, vec!["the_dcc".to_string()]);
    }

    #[test]
    fn missing_family_is_fatal_unless_omittable() {
        let forest = build_forest();
        let req = Requirement::parse("no_such_distro").unwrap();
        let solver = Solver::new(&forest, vec![req.clone()], "linux");
        assert!(solver.resolve().is_err());

        let solver = Solver::new(&forest, vec![req], "linux").with_omittable(["no_such_distro".to_string()]);
        let result = solver.resolve().unwrap();
        assert!(!result.resolved.contains_key("no_such_distro"));
    }

    #[test]
    fn forced_requirement_overrides_declared_one() {
        let forest = build_forest();
        let solver = Solver::new(&forest, vec![Requirement::parse("the_dcc").unwrap()], "linux")
            .with_forced([Requirement::parse("the_dcc==1.0.0").unwrap()]);
        let result = solver.resolve().unwrap();
        assert_eq!(result.resolved["the_dcc"].version, Version::parse("1.0.0").unwrap());
    }

    #[test]
    fn conflicting_pulled_requirement_triggers_one_redirect() {
        // the_dcc 1.2 pulls the_dcc_plugin_b>=1.0, which conflicts with an
        // already-resolved top-level pin of the_dcc_plugin_b==0.9; the
        // redirect should exclude the_dcc's 1.2 rather than failing outright.
        #[derive(Debug)]
        struct PluggedFinder;
        impl DistroFinder for PluggedFinder {
            fn enumerate(&self) -> rig_finder::Result<Vec<DistroLocation>> {
                Ok(Vec::new())
            }
            fn content(&self, location: &DistroLocation) -> PathBuf {
                location.path.clone()
            }
            fn load_descriptor(&self, location: &Path) -> rig_finder::Result<rig_finder::DistroDescriptor> {
                let mut descriptor = rig_finder::DistroDescriptor::default();
                if location == Path::new("the_dcc-1.2.0") {
                    descriptor.distros = vec![Requirement::parse("the_dcc_plugin_b>=1.0").unwrap()];
                }
                Ok(descriptor)
            }
            fn install(&self, _l: &DistroLocation, _d: &Path, _r: bool) -> rig_finder::Result<()> {
                Ok(())
            }
        }

        let mut forest = DistroForest::new();
        let finder: Rc<dyn DistroFinder> = Rc::new(PluggedFinder);
        for (name, v) in [("the_dcc", "1.0.0"), ("the_dcc", "1.1.0"), ("the_dcc", "1.2.0")] {
            forest.insert(DistroVersion::new(
                name.to_string(),
                Version::parse(v).unwrap(),
                PathBuf::from(format!("{name}-{v}")),
                Rc::clone(&finder),
            ));
        }
        for (name, v) in [("the_dcc_plugin_b", "0.9.0"), ("the_dcc_plugin_b", "1.0.0")] {
            forest.insert(DistroVersion::new(
                name.to_string(),
                Version::parse(v).unwrap(),
                PathBuf::from(format!("{name}-{v}")),
                Rc::clone(&finder),
            ));
        }

        let requirements = vec![
            Requirement::parse("the_dcc_plugin_b==0.9").unwrap(),
            Requirement::parse("the_dcc").unwrap(),
        ];
        let solver = Solver::new(&forest, requirements, "linux");
        let result = solver.resolve().unwrap();
        assert_eq!(result.resolved["the_dcc"].version, Version::parse("1.1.0").unwrap());
        assert_eq!(result.resolved["the_dcc_plugin_b"].version, Version::parse("0.9.0").unwrap());
    }
}
