use std::path::{Path, PathBuf};

pub const DAEMON_SOCKET: &str = "skiff.sock";

pub fn skiff_root(home: &Path) -> PathBuf {
    home.join(".skiff")
}

pub fn socket_path(home: &Path) -> PathBuf {
    skiff_root(home).join(DAEMON_SOCKET)
}
