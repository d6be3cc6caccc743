// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process liveness probes and group signalling.
//!
//! On POSIX each managed child leads its own process group, so signals
//! sent to the (negative) group ID reap every descendant. Non-unix
//! builds have no group capability here; the spawn path compensates by
//! killing the direct child handle instead.

/// True when the OS still has a process table entry for `pid`.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    // Signal 0: existence probe only.
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Send SIGTERM to the whole process group.
#[cfg(unix)]
pub fn terminate_group(pgid: u32) -> std::io::Result<()> {
    signal_group(pgid, nix::sys::signal::Signal::SIGTERM)
}

/// Send SIGKILL to the whole process group.
#[cfg(unix)]
pub fn kill_group(pgid: u32) -> std::io::Result<()> {
    signal_group(pgid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: nix::sys::signal::Signal) -> std::io::Result<()> {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;
    killpg(Pid::from_raw(pgid as i32), signal).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
pub fn terminate_group(_pgid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "process groups unavailable"))
}

#[cfg(not(unix))]
pub fn kill_group(_pgid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "process groups unavailable"))
}

#[cfg(all(test, unix))]
#[path = "os_tests.rs"]
mod tests;
