//! Publishing: copy built books and the website into `publish-docs/`.

use crate::config::{BookMappings, RunOptions};
use crate::error::Result;
use crate::types::base_name;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory under the repository root that receives published output.
pub const PUBLISH_DIR: &str = "publish-docs";

/// Directory names never searched for published books when indexing.
const INDEX_SKIP_DIRS: &[&str] = &["common", "webapp", "content"];

const WEBHELP_DIR: &str = "target/docbkx/webhelp";

/// Copies build output of books into the publish tree.
#[derive(Debug, Clone)]
pub struct Publisher {
    pub publish_root: PathBuf,
    pub language: Option<String>,
    pub release_path: String,
    pub mappings: BookMappings,
}

impl Publisher {
    pub fn new(repo_root: &Path, options: &RunOptions) -> Self {
        Self {
            publish_root: repo_root.join(PUBLISH_DIR),
            language: options.language.clone(),
            release_path: options.release_path.clone(),
            mappings: options.mappings.clone(),
        }
    }

    /// Locate the build output of `book_dir` and its publish destination.
    ///
    /// Checked in order: `webhelp/<book>`, `webhelp/local/<book>`,
    /// `webhelp/<release>/<book>`, then an explicit target-dir mapping.
    pub fn locate(&self, book_dir: &Path) -> Option<(PathBuf, PathBuf)> {
        let book = base_name(book_dir);
        let webhelp = book_dir.join(WEBHELP_DIR);

        let mut dest = self.publish_root.clone();
        if let Some(lang) = &self.language {
            dest.push(lang);
        }

        let source = if webhelp.join(book).is_dir() {
            webhelp.join(book)
        } else if webhelp.join("local").join(book).is_dir() {
            dest.push("local");
            webhelp.join("local").join(book)
        } else if webhelp.join(&self.release_path).join(book).is_dir() {
            dest.push(&self.release_path);
            webhelp.join(&self.release_path).join(book)
        } else if let Some(target) = self.mappings.target_dirs.get(book) {
            book_dir.join(target)
        } else {
            return None;
        };

        dest.push(self.mappings.publish_dir(book));
        Some((source, dest))
    }

    /// Publish one built book, replacing any previous copy.
    ///
    /// Returns the destination, or `None` when no build output was found.
    pub fn publish(&self, book_dir: &Path) -> Result<Option<PathBuf>> {
        let Some((source, dest)) = self.locate(book_dir) else {
            tracing::warn!(book = %book_dir.display(), "no build output to publish");
            return Ok(None);
        };
        tracing::debug!(source = %source.display(), dest = %dest.display(), "publishing book");
        remove_dir_if_exists(&dest)?;
        copy_tree(&source, &dest, &|name| name.ends_with(".xml") && name != "atom.xml")?;
        Ok(Some(dest))
    }

    /// Replace `publish-docs/www` with a copy of `www_source`.
    pub fn publish_www(&self, www_source: &Path) -> Result<PathBuf> {
        let dest = self.publish_root.join("www");
        remove_dir_if_exists(&dest)?;
        copy_tree(www_source, &dest, &|_| false)?;
        Ok(dest)
    }

    /// Write `index.html` linking every published book's `content/index.html`.
    pub fn write_index(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.publish_root)?;

        let mut books = Vec::new();
        collect_published(&self.publish_root, &self.publish_root, &mut books);
        books.sort();

        let path = self.publish_root.join("index.html");
        let mut out = fs::File::create(&path)?;
        write!(
            out,
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\"\n\
             \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n\
             <html lang=\"en\" xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\">\n\
             <body>\n\
             <h1>Results of checkbuild</h1>\n"
        )?;
        for rel in &books {
            writeln!(out, "<a href=\"{rel}/content/index.html\">{rel}</a>")?;
            writeln!(out, "<br/>")?;
        }
        write!(out, "</body>\n</html>\n")?;
        Ok(path)
    }
}

fn collect_published(root: &Path, dir: &Path, found: &mut Vec<String>) {
    if dir != root && dir.join("content/index.html").is_file() {
        found.push(
            dir.strip_prefix(root)
                .unwrap_or(dir)
                .to_string_lossy()
                .replace('\\', "/"),
        );
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if is_dir && !INDEX_SKIP_DIRS.contains(&base_name(&path)) {
            collect_published(root, &path, found);
        }
    }
}

fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Recursively copy `src` into `dst`, leaving out files for which `skip` is true.
///
/// Symlinked directories are not descended into.
fn copy_tree(src: &Path, dst: &Path, skip: &dyn Fn(&str) -> bool) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let name = base_name(&path);
        let target = dst.join(name);
        let kind = entry.file_type()?;
        if kind.is_dir() {
            copy_tree(&path, &target, skip)?;
        } else if kind.is_symlink() && path.is_dir() {
            tracing::debug!(link = %path.display(), "not following directory symlink");
        } else if !skip(name) {
            fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn publisher(root: &Path) -> Publisher {
        Publisher::new(root, &RunOptions::default())
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn publish_webhelp_skips_xml() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let book = root.join("doc/admin-guide");
        let out = book.join("target/docbkx/webhelp/admin-guide");
        touch(&out.join("content/index.html"));
        touch(&out.join("content/ch1.xml"));
        touch(&out.join("atom.xml"));

        let dest = publisher(root).publish(&book).unwrap().unwrap();
        assert_eq!(dest, root.join("publish-docs/admin-guide"));
        assert!(dest.join("content/index.html").is_file());
        assert!(dest.join("atom.xml").is_file());
        assert!(!dest.join("content/ch1.xml").exists());
    }

    #[test]
    fn publish_local_and_release_layouts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let local = root.join("doc/install-guide");
        touch(&local.join("target/docbkx/webhelp/local/install-guide/index.html"));
        let release = root.join("doc/config-reference");
        touch(&release.join("target/docbkx/webhelp/trunk/config-reference/index.html"));

        let p = publisher(root);
        assert_eq!(
            p.publish(&local).unwrap(),
            Some(root.join("publish-docs/local/install-guide"))
        );
        assert_eq!(
            p.publish(&release).unwrap(),
            Some(root.join("publish-docs/trunk/config-reference"))
        );
    }

    #[test]
    fn publish_uses_mappings_and_language() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let book = root.join("api-ref");
        touch(&book.join("target/docbkx/html/api-ref/index.html"));

        let mut options = RunOptions::default();
        options.language = Some("ja".to_string());
        options.mappings = BookMappings::from_lists(
            &["api-ref".to_string()],
            &["target/docbkx/html/api-ref".to_string()],
            &["api-reference".to_string()],
        )
        .unwrap();
        let p = Publisher::new(root, &options);
        let dest = p.publish(&book).unwrap().unwrap();
        assert_eq!(dest, root.join("publish-docs/ja/api-reference"));
        assert!(dest.join("index.html").is_file());
    }

    #[test]
    fn publish_without_output() {
        let tmp = TempDir::new().unwrap();
        let book = tmp.path().join("doc/empty");
        fs::create_dir_all(&book).unwrap();
        assert_eq!(publisher(tmp.path()).publish(&book).unwrap(), None);
    }

    #[test]
    fn publish_replaces_previous_copy() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let book = root.join("doc/user-guide");
        touch(&book.join("target/docbkx/webhelp/user-guide/new.html"));
        touch(&root.join("publish-docs/user-guide/stale.html"));

        let dest = publisher(root).publish(&book).unwrap().unwrap();
        assert!(dest.join("new.html").is_file());
        assert!(!dest.join("stale.html").exists());
    }

    #[test]
    fn publish_www_copies_everything() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("www/index.html"));
        touch(&root.join("www/feeds/atom.xml"));
        touch(&root.join("www/sitemap.xml"));

        let dest = publisher(root).publish_www(&root.join("www")).unwrap();
        assert!(dest.join("index.html").is_file());
        assert!(dest.join("sitemap.xml").is_file());
        assert!(dest.join("feeds/atom.xml").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn publish_www_skips_directory_symlinks() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("www/index.html"));
        touch(&root.join("shared/logo.png"));
        std::os::unix::fs::symlink(root.join("www"), root.join("www/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("shared/logo.png"), root.join("www/logo.png")).unwrap();

        let dest = publisher(root).publish_www(&root.join("www")).unwrap();
        assert!(dest.join("index.html").is_file());
        assert!(dest.join("logo.png").is_file());
        assert!(!dest.join("loop").exists());
    }

    #[test]
    fn write_index_links_books() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("publish-docs/admin-guide/content/index.html"));
        touch(&root.join("publish-docs/local/install-guide/content/index.html"));
        touch(&root.join("publish-docs/common/content/index.html"));
        touch(&root.join("publish-docs/index.html"));

        let path = publisher(root).write_index().unwrap();
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("<a href=\"admin-guide/content/index.html\">admin-guide</a>"));
        assert!(html.contains("<a href=\"local/install-guide/content/index.html\">local/install-guide</a>"));
        assert!(!html.contains("common"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
