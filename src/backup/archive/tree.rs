use crate::backup::archive::{ArchiveEntry, ArchiveSink};
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::rules::RuleSet;

use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use itertools::Itertools;
use walkdir::{DirEntry, WalkDir};

use std::path::{Component, Path, PathBuf};

/// Walks the backup root according to a [`RuleSet`] and feeds accepted files
/// into an [`ArchiveSink`].
///
/// Every entry below a start directory must survive two independent checks:
/// its bare name is not an ignored name, and its root-relative path is not an
/// excluded path. Rejected directories are pruned with everything below them.
#[derive(Debug, Clone, Copy)]
pub struct TreeArchiver<'a> {
    root: &'a Path,
    rules: &'a RuleSet,
}

impl<'a> TreeArchiver<'a> {
    pub fn new(root: &'a Path, rules: &'a RuleSet) -> Self {
        Self { root, rules }
    }

    /// Adds every accepted file to `sink` and returns how many the sink took.
    ///
    /// The first unreadable directory aborts the build.
    #[named]
    pub fn build<S: ArchiveSink + ?Sized>(&self, sink: &mut S) -> Result<usize> {
        let mut count = 0;
        for entry in self.entries() {
            let entry = entry
                .with_debug_object_and_fn_name(self.root.to_path_buf(), function_path!())?;
            if sink.add_file(&entry.src, &entry.name)? {
                count += 1;
            }
        }
        tracing::info!("Added {} files from {:?}", count, self.root);
        Ok(count)
    }

    /// Lazily yields the accepted files in walk order.
    pub fn entries(&self) -> DynIter<'a, Result<ArchiveEntry>> {
        if self.rules.excludes_all_files() {
            tracing::info!("File tree excluded entirely, skipping walk of {:?}", self.root);
            return std::iter::empty().into_dyn_iter();
        }

        let prefixes = if self.rules.include().is_empty() {
            vec![String::new()]
        } else {
            self.rules
                .include()
                .iter()
                .map(|p| p.trim_matches('/').to_string())
                .collect_vec()
        };

        let root = self.root;
        let rules = self.rules;
        prefixes
            .into_iter()
            .flat_map(move |prefix| walk_prefix(root, rules, prefix))
            .into_dyn_iter()
    }
}

fn walk_prefix<'a>(
    root: &'a Path,
    rules: &'a RuleSet,
    prefix: String,
) -> impl Iterator<Item = Result<ArchiveEntry>> + 'a {
    let start = if prefix.is_empty() {
        root.to_path_buf()
    } else {
        root.join(&prefix)
    };
    tracing::info!("Starting directory scan: {:?}", start);

    WalkDir::new(start)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |de| de.depth() == 0 || is_accepted(root, rules, de))
        .filter_map(move |res| match res {
            Ok(de) => process_dir_entry(root, de),
            Err(e) => Some(Err(e.into())),
        })
}

fn is_accepted(root: &Path, rules: &RuleSet, de: &DirEntry) -> bool {
    if let Some(name) = de.file_name().to_str() {
        if rules.is_ignored_name(name) {
            tracing::trace!("Skipping {:?}, ignored name", de.path());
            return false;
        }
    }

    // Unrepresentable names are kept here and reported by `process_dir_entry`.
    match relative_name(root, de.path()) {
        Ok(relative) if rules.is_excluded(&relative) => {
            tracing::trace!("Skipping {:?}, excluded path", de.path());
            false
        }
        _ => true,
    }
}

fn process_dir_entry(root: &Path, de: DirEntry) -> Option<Result<ArchiveEntry>> {
    if de.file_type().is_dir() {
        return None;
    }

    let src = de.into_path();
    Some(relative_name(root, &src).map(|name| {
        tracing::debug!("Including file: {:?} -> {:?}", src, name);
        ArchiveEntry::new(src, name)
    }))
}

/// Root-relative, `/`-separated name of `path`.
pub fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let stripped = path.strip_prefix(root).map_err(|_| {
        Error::from(std::io::Error::other(format!(
            "{:?} is outside of {:?}",
            path, root
        )))
    })?;

    stripped
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(
                part.to_str()
                    .ok_or_else(|| Error::NonUtf8Path(PathBuf::from(path))),
            ),
            _ => None,
        })
        .collect::<Result<Vec<_>>>()
        .map(|parts| parts.join("/"))
}
