use std::path::PathBuf;
use std::sync::Arc;

use lsp_bridge::lsp::LspClient;
use lsp_types::Url;
use serde_json::Value;
use tempfile::TempDir;

/// Represents a test fixture with files and an optional cursor position.
#[derive(Debug)]
pub struct Fixture {
    /// files in fixture
    pub files: Vec<(PathBuf, String)>,
    /// 1-indexed position of the `$0` marker, if any
    pub cursor: Option<(PathBuf, u32, u32)>,
}

/// Parses `//- path` sections into file contents.
///
/// Blank lines before the first `//- path` are ignored.
///
/// ## Panics
/// if content appears before the first `//- path` line
pub fn parse_fixture(input: &str) -> Fixture {
    let mut files = Vec::new();
    let mut current_path: Option<PathBuf> = None;
    let mut current_content = String::new();
    let mut cursor = None;

    for line in input.lines() {
        if let Some(path) = line.strip_prefix("//- ") {
            if let Some(p) = current_path.take() {
                files.push((p, std::mem::take(&mut current_content)));
            }
            // Store relative path (trim leading slash)
            current_path = Some(PathBuf::from(path.trim().trim_start_matches('/')));
        } else {
            let Some(path) = current_path.clone() else {
                assert!(line.trim().is_empty(), "fixture content before the first //- path line");
                continue;
            };
            let mut l = line.to_string();
            if let Some(idx) = l.find("$0") {
                let line_no = u32::try_from(current_content.lines().count() + 1)
                    .expect("line count out of range");
                let col = u32::try_from(idx + 1).expect("line index out of range");
                cursor = Some((path, line_no, col));
                l = l.replace("$0", "");
            }
            current_content.push_str(&l);
            current_content.push('\n');
        }
    }

    if let Some(p) = current_path {
        files.push((p, current_content));
    }

    Fixture { files, cursor }
}

/// Temporary workspace on disk, optionally with a running `mockls`.
pub struct TestWorkspace {
    /// Temporary folder for the workspace
    pub root: TempDir,
    /// fixture for the workspace
    pub fixture: Fixture,
    lsp: Option<Arc<LspClient>>,
    /// Canonicalized root path (resolves symlinks like /var -> /private/var on macOS)
    canonical_root: PathBuf,
}

impl TestWorkspace {
    /// Writes `fixture` into a fresh temporary directory.
    ///
    /// ## Panics
    /// if the files cannot be written
    pub fn new(fixture: &str) -> Self {
        let root = TempDir::new().expect("failed to create temp directory");
        let fixture = parse_fixture(fixture);

        for (path, content) in &fixture.files {
            let abs = root.path().join(path);
            std::fs::create_dir_all(abs.parent().expect("file has a parent")).unwrap();
            std::fs::write(&abs, content).unwrap();
        }

        let canonical_root = root
            .path()
            .canonicalize()
            .expect("failed to canonicalize root");

        Self {
            root,
            fixture,
            lsp: None,
            canonical_root,
        }
    }

    pub fn builder() -> TestWorkspaceBuilder {
        TestWorkspaceBuilder::default()
    }

    /// Returns the canonicalized root path
    pub fn canonical_root(&self) -> &PathBuf {
        &self.canonical_root
    }

    /// Converts a relative path to an absolute path
    pub fn apath(&self, path: &str) -> PathBuf {
        self.canonical_root.join(path)
    }

    pub fn uri(&self, path: &str) -> Url {
        super::uri(&self.apath(path))
    }

    /// 1-indexed cursor position from the `$0` marker.
    ///
    /// ## Panics
    /// if the fixture has no cursor
    pub fn cursor(&self) -> (PathBuf, u32, u32) {
        let (path, line, column) = self.fixture.cursor.clone().expect("fixture has no $0 cursor");
        (self.canonical_root.join(path), line, column)
    }

    /// Returns the LSP client
    ///
    /// ## Panics
    /// Panics if the workspace was built without one
    pub fn lsp(&self) -> &Arc<LspClient> {
        self.lsp
            .as_ref()
            .expect("LSP client not started; build the workspace through builder()")
    }
}

type FixtureFn = Box<dyn FnOnce(&TestWorkspace) -> Value>;

/// Builder for a workspace with a `mockls` client.
#[derive(Default)]
pub struct TestWorkspaceBuilder {
    fixture: Option<String>,
    args: Vec<String>,
    responses: Option<FixtureFn>,
    open_files: bool,
}

impl TestWorkspaceBuilder {
    /// Sets the `//- path` fixture content
    #[must_use]
    pub fn fixture(mut self, fixture: &str) -> Self {
        self.fixture = Some(fixture.to_string());
        self
    }

    /// Extra `mockls` command-line arguments.
    #[must_use]
    pub fn mock_args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|a| (*a).to_string()));
        self
    }

    /// Canned `mockls` responses, built once the files exist so they can
    /// refer to real URIs.
    #[must_use]
    pub fn responses(mut self, build: impl FnOnce(&TestWorkspace) -> Value + 'static) -> Self {
        self.responses = Some(Box::new(build));
        self
    }

    /// Opens every fixture file after initialization.
    #[must_use]
    pub fn open_all_files(mut self) -> Self {
        self.open_files = true;
        self
    }

    /// ## Panics
    /// Panics if the fixture is missing or the server fails to start
    pub async fn build(self) -> TestWorkspace {
        let fixture = self.fixture.expect("fixture must be set using .fixture()");
        let mut workspace = TestWorkspace::new(&fixture);

        let mut args = self.args;
        if let Some(build) = self.responses {
            let path = workspace.root.path().join(".mockls-fixture.json");
            let responses = build(&workspace);
            std::fs::write(&path, serde_json::to_string(&responses).unwrap()).unwrap();
            args.push("--fixture".to_string());
            args.push(path.display().to_string());
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let lsp = super::spawn_mockls(workspace.canonical_root(), &args).await;

        if self.open_files {
            for (relative_path, _) in &workspace.fixture.files {
                let abs_path = workspace.canonical_root.join(relative_path);
                lsp.open_file(&abs_path).await.expect("failed to open file");
            }
        }

        workspace.lsp = Some(Arc::new(lsp));
        workspace
    }
}
