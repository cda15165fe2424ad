use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// ワークスペースのメタデータディレクトリ名
pub const DROVER_DIR: &str = ".drover";

/// Snapshot manifests are written under this name.
pub const MANIFEST_FILE_NAME: &str = "drover.yml";

/// droverワークスペースのエンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// ワークスペースのルートパス
    pub root_path: PathBuf,
}

impl Workspace {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
        }
    }

    /// .droverディレクトリのパスを取得
    pub fn drover_dir(&self) -> PathBuf {
        self.root_path.join(DROVER_DIR)
    }

    /// config.ymlファイルのパスを取得
    pub fn config_path(&self) -> PathBuf {
        self.drover_dir().join("config.yml")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.drover_dir().join("versions")
    }

    /// `.drover/versions/<name>/drover.yml`
    pub fn version_manifest_path(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version).join(MANIFEST_FILE_NAME)
    }

    /// マニフェストファイルのパスを取得（優先順位付き）
    ///
    /// Falls back to `<root>/drover.yml` when nothing is on disk yet.
    pub fn manifest_file_path(&self) -> PathBuf {
        self.find_manifest_files()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.root_path.join(MANIFEST_FILE_NAME))
    }

    /// ルート直下と.drover直下のマニフェストを優先順位順に返す
    pub fn find_manifest_files(&self) -> Vec<PathBuf> {
        let manifest_regex = match Regex::new(r"^drover\.(yml|yaml)$") {
            Ok(regex) => regex,
            Err(_) => return Vec::new(),
        };

        let mut manifest_files: Vec<PathBuf> = [self.root_path.clone(), self.drover_dir()]
            .iter()
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| {
                WalkDir::new(dir)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| {
                        e.file_name()
                            .to_str()
                            .map(|name| manifest_regex.is_match(name))
                            .unwrap_or(false)
                    })
                    .map(|e| e.path().to_path_buf())
                    .collect::<Vec<_>>()
            })
            .collect();

        manifest_files.sort_by_key(|path| Self::file_priority(path));
        manifest_files
    }

    /// 数値が小さいほど優先度が高い
    fn file_priority(path: &Path) -> u8 {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let in_drover_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n == DROVER_DIR)
            .unwrap_or(false);

        match (file_name, in_drover_dir) {
            ("drover.yml", false) => 1,
            ("drover.yaml", false) => 2,
            ("drover.yml", true) => 3,
            ("drover.yaml", true) => 4,
            _ => 99,
        }
    }

    pub fn has_manifest(&self) -> bool {
        !self.find_manifest_files().is_empty()
    }

    /// ワークスペース内のプロジェクトの絶対パス
    pub fn project_path(&self, relative: &Path) -> PathBuf {
        self.root_path.join(relative)
    }

    /// 現在のディレクトリから上位に向かってワークスペースルートを発見
    pub fn discover_root(start_path: &Path) -> Option<PathBuf> {
        start_path
            .ancestors()
            .find(|candidate| Workspace::new(*candidate).has_manifest())
            .map(Path::to_path_buf)
    }
}
