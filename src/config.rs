use std::path::{Path, PathBuf};

use crate::pdf::PdfEngine;

/// Process-wide settings, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root holding the global `data/` files and the `projects/` tree.
    pub home: PathBuf,
    pub pdf_engine: PdfEngine,
}

impl Config {
    pub fn from_env() -> Self {
        let home = std::env::var_os("PUBLINE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            home,
            pdf_engine: PdfEngine::from_env(),
        }
    }

    pub fn with_home(mut self, home: Option<&str>) -> Self {
        if let Some(home) = home {
            self.home = PathBuf::from(home);
        }
        self
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.home.join("projects")
    }

    pub fn project_dir(&self, slug: &str) -> PathBuf {
        self.projects_dir().join(slug)
    }

    pub fn socials_json(&self) -> PathBuf {
        self.global_data_dir().join("socials.json")
    }

    pub fn licenses_json(&self) -> PathBuf {
        self.global_data_dir().join("licenses.json")
    }

    fn global_data_dir(&self) -> PathBuf {
        Path::new(&self.home).join("data")
    }
}
