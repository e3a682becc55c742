use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Which input a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    Reference,
    Computed,
    Snr,
}

impl fmt::Display for InputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRole::Reference => f.write_str("reference"),
            InputRole::Computed => f.write_str("computed"),
            InputRole::Snr => f.write_str("SNR"),
        }
    }
}

/// Fatal input problems, reported before any processing starts.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("reference file not found: {}", .0.display())]
    ReferenceMissing(PathBuf),
    #[error("computed file not found: {}", .0.display())]
    ComputedMissing(PathBuf),
    #[error("SNR file not found: {}", .0.display())]
    SnrMissing(PathBuf),
    #[error("invalid input {role} file (directory): {}", .path.display())]
    IsDirectory { role: InputRole, path: PathBuf },
}

/// Fail if `path` names a directory. Used alone for optional inputs.
pub fn reject_directory(path: &Path, role: InputRole) -> Result<(), InputError> {
    if path.is_dir() {
        return Err(InputError::IsDirectory {
            role,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Check that a required input exists and is a regular file.
pub fn validate_input(path: &Path, role: InputRole) -> Result<(), InputError> {
    reject_directory(path, role)?;
    if !path.is_file() {
        return Err(match role {
            InputRole::Reference => InputError::ReferenceMissing(path.to_path_buf()),
            InputRole::Computed => InputError::ComputedMissing(path.to_path_buf()),
            InputRole::Snr => InputError::SnrMissing(path.to_path_buf()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_rejected_with_role() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_input(dir.path(), InputRole::Computed).unwrap_err();
        assert!(matches!(
            err,
            InputError::IsDirectory {
                role: InputRole::Computed,
                ..
            }
        ));
        assert!(err.to_string().contains("computed"));
    }

    #[test]
    fn missing_files_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        assert!(matches!(
            validate_input(&path, InputRole::Reference),
            Err(InputError::ReferenceMissing(_))
        ));
        assert!(matches!(
            validate_input(&path, InputRole::Computed),
            Err(InputError::ComputedMissing(_))
        ));
    }

    #[test]
    fn optional_input_only_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(reject_directory(&dir.path().join("absent.csv"), InputRole::Snr).is_ok());
        let err = reject_directory(dir.path(), InputRole::Snr).unwrap_err();
        assert!(err.to_string().contains("SNR"));
        assert!(matches!(
            validate_input(&dir.path().join("absent.csv"), InputRole::Snr),
            Err(InputError::SnrMissing(_))
        ));
    }
}
