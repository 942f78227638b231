use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {args}` failed: {stderr}")]
    Git { args: String, stderr: String },

    #[error("`tmux {args}` failed: {stderr}")]
    Tmux { args: String, stderr: String },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("GitHub request failed: {0}")]
    GitHub(#[from] octocrab::Error),

    #[error("GitHub query returned errors: {0}")]
    GraphQl(String),

    #[error("no GitHub credentials (set GITHUB_TOKEN or log in with `gh auth login`)")]
    NoCredentials,

    #[error("cannot resolve GitHub owner for repo {0}")]
    NoOwner(String),

    #[error("sqlite: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid toml in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode toml: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("terminal: {0}")]
    Terminal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
