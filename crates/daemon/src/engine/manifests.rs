// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loading manifests from a checkout.

use std::path::Path;

use kagent_core::Resource;

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// A manifest file that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: String,
    pub error: String,
}

/// Every resource found under the manifest root.
#[derive(Debug, Default)]
pub struct ManifestSet {
    /// Manifest files found, relative to the checkout root, sorted.
    pub files: Vec<String>,
    pub resources: Vec<Resource>,
    pub errors: Vec<FileError>,
}

impl ManifestSet {
    /// Whether every file parsed. Deletions are only safe when this holds.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Resources loaded from `path`.
    pub fn from_file<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.source == path)
    }
}

/// Whether `path` names a manifest file outside any hidden directory.
pub fn is_manifest_path(path: &str) -> bool {
    if path.split('/').any(|segment| segment.starts_with('.') && segment != ".") {
        return false;
    }
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}

/// Load every manifest under `checkout/root`, defaulting object namespaces to
/// `namespace`.
///
/// A file that fails to parse contributes no resources and one entry in
/// [`ManifestSet::errors`]; loading continues with the next file.
pub fn load(checkout: &Path, root: &str, namespace: &str) -> ManifestSet {
    let root = normalize_root(root);
    let mut files = Vec::new();
    let start = if root.is_empty() { checkout.to_path_buf() } else { checkout.join(&root) };
    let mut set = ManifestSet::default();
    if let Err(e) = walk(&start, &root, &mut files) {
        set.errors.push(FileError { path: root.clone(), error: e.to_string() });
    }
    files.sort();

    for file in files {
        match std::fs::read(checkout.join(&file)) {
            Ok(bytes) => match Resource::parse_documents(&file, &bytes, namespace) {
                Ok(resources) => set.resources.extend(resources),
                Err(e) => set.errors.push(FileError { path: file.clone(), error: e.to_string() }),
            },
            Err(e) => set.errors.push(FileError { path: file.clone(), error: e.to_string() }),
        }
        set.files.push(file);
    }
    set
}

/// Root as a relative, slash-separated prefix (`""` for the checkout root).
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_start_matches("./").trim_matches('/');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn walk(dir: &Path, relative: &str, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.') {
            continue;
        }
        let path =
            if relative.is_empty() { name.to_string() } else { format!("{}/{}", relative, name) };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&entry.path(), &path, out)?;
        } else if file_type.is_file() && is_manifest_path(&path) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "manifests_tests.rs"]
mod tests;
