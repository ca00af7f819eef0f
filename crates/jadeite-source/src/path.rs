//! Lexical path cleaning, adapted from the `path-clean` crate
//! (<https://github.com/danreeves/path-clean>, MIT licensed).

use camino::Utf8Component;
use camino::Utf8Path;
use camino::Utf8PathBuf;

/// Resolve `.` and `..` components without touching the filesystem.
#[must_use]
pub fn clean_utf8_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut out: Vec<Utf8Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.last() {
                Some(Utf8Component::RootDir) => {}
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                None
                | Some(
                    Utf8Component::CurDir | Utf8Component::ParentDir | Utf8Component::Prefix(_),
                ) => out.push(component),
            },
            component => out.push(component),
        }
    }

    if out.is_empty() {
        return Utf8PathBuf::from(".");
    }

    let mut cleaned = Utf8PathBuf::new();
    for component in out {
        cleaned.push(component.as_str());
    }
    cleaned
}

/// Join `name` onto `base`, refusing any result that escapes `base`.
pub fn safe_join(base: &Utf8Path, name: &str) -> Result<Utf8PathBuf, SafeJoinError> {
    let base = clean_utf8_path(base);
    let cleaned = clean_utf8_path(&base.join(name));

    let inside = if base.as_str() == "." {
        !cleaned.is_absolute() && !cleaned.starts_with("..")
    } else {
        cleaned.starts_with(&base)
    };

    if inside {
        Ok(cleaned)
    } else {
        Err(SafeJoinError::OutsideBase {
            base,
            attempted: name.to_string(),
            resolved: cleaned,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SafeJoinError {
    #[error("path `{attempted}` resolves to `{resolved}`, outside of `{base}`")]
    OutsideBase {
        base: Utf8PathBuf,
        attempted: String,
        resolved: Utf8PathBuf,
    },
}
