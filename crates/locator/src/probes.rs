use std::fs;
use std::path::Path;

/// Detects whether the host is a Steam Deck / SteamOS session.
pub fn is_steam_deck() -> bool {
    const MARKERS: &[&str] = &["/home/deck", "/usr/bin/steamos-session-select"];
    if MARKERS.iter().any(|m| Path::new(m).exists()) {
        return true;
    }
    std::env::var_os("SteamOS").is_some()
        || std::env::var_os("STEAM_COMPAT_CLIENT_INSTALL_PATH").is_some()
}

/// Checks that `path` is writable, creating it if missing.
///
/// Probes with a throwaway `.write_test` file; permission metadata alone
/// is not trustworthy on SD cards mounted with odd options.
pub fn validate_write_permissions(path: &Path) -> bool {
    if !path.exists() && fs::create_dir_all(path).is_err() {
        return false;
    }

    let probe = path.join(".write_test");
    match fs::write(&probe, b"") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Free space in bytes on the filesystem holding `path`; 0 on failure.
#[cfg(unix)]
pub fn free_space(path: &Path) -> u64 {
    use std::os::unix::ffi::OsStrExt;

    let Ok(cpath) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return 0;
    };
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut stat) };
    if rc == 0 {
        stat.f_frsize as u64 * stat.f_bavail as u64
    } else {
        0
    }
}

#[cfg(not(unix))]
pub fn free_space(_path: &Path) -> u64 {
    0
}

/// True when an external `7z`/`7za` binary is on PATH.
pub fn has_seven_zip() -> bool {
    which::which("7z").or_else(|_| which::which("7za")).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_probe_on_writable_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(validate_write_permissions(tmp.path()));
        // Probe file must not be left behind.
        assert!(!tmp.path().join(".write_test").exists());
    }

    #[test]
    fn write_probe_creates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("RetroArch").join("cores");
        assert!(validate_write_permissions(&nested));
        assert!(nested.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn write_probe_readonly_dir() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ro");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        // Root bypasses permission bits; only assert when not root.
        if unsafe { libc::geteuid() } != 0 {
            assert!(!validate_write_permissions(&dir));
        }

        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn free_space_reports_nonzero_for_tempdir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(free_space(tmp.path()) > 0);
    }

    #[test]
    fn free_space_zero_for_missing_path() {
        assert_eq!(free_space(Path::new("/definitely/not/real")), 0);
    }

    #[test]
    fn host_probes_do_not_panic() {
        let _ = is_steam_deck();
        let _ = has_seven_zip();
    }
}
