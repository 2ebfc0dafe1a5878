use sysinfo::{ProcessRefreshKind, RefreshKind, Signal, System, UpdateKind};
use tracing::{info, warn};

use crate::utils::trim_mount_point;

/// Command name of the monitored tool.
pub const MONITOR_COMMAND: &str = "o2locktop";

/// True if `args` belong to an o2locktop instance watching `mount_point`.
///
/// The program itself must be o2locktop, or be an interpreter whose script
/// (the first argument that is not an option) is o2locktop. With no mount
/// point every instance matches.
pub fn cmdline_matches<S: AsRef<str>>(args: &[S], mount_point: Option<&str>) -> bool {
    let is_command = |arg: &S| arg.as_ref().rsplit('/').next() == Some(MONITOR_COMMAND);
    let mut args_iter = args.iter();
    let is_monitor = match args_iter.next() {
        Some(program) if is_command(program) => true,
        Some(_) => args_iter
            .find(|arg| !arg.as_ref().starts_with('-'))
            .is_some_and(is_command),
        None => false,
    };
    if !is_monitor {
        return false;
    }
    match mount_point {
        Some(mount_point) => args
            .iter()
            .any(|arg| trim_mount_point(arg.as_ref()) == mount_point),
        None => true,
    }
}

/// Kill the o2locktop processes feeding this run.
///
/// Returns how many processes were signalled. The calling process is never
/// included, even though its own command line usually matches.
pub fn terminate_monitor(mount_point: Option<&str>) -> usize {
    let sys = System::new_with_specifics(
        RefreshKind::nothing()
            .with_processes(ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always)),
    );
    let me = sysinfo::get_current_pid().ok();

    let mut killed = 0;
    for (pid, process) in sys.processes() {
        // Threads are listed too and share their process's command line.
        if Some(*pid) == me || process.thread_kind().is_some() {
            continue;
        }
        let args: Vec<String> = process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        if !cmdline_matches(&args, mount_point) {
            continue;
        }
        let cmdline = args.join(" ");
        match process.kill_with(Signal::Kill) {
            Some(true) => {
                info!(pid = pid.as_u32(), cmdline = %cmdline, "killed o2locktop process");
                killed += 1;
            }
            _ => warn!(pid = pid.as_u32(), cmdline = %cmdline, "failed to kill process"),
        }
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmdline: &str) -> Vec<&str> {
        cmdline.split_whitespace().collect()
    }

    #[test]
    fn test_matches_any_instance_without_mount_point() {
        assert!(cmdline_matches(&args("/usr/bin/python3 /usr/bin/o2locktop -l 10 /mnt/a"), None));
        assert!(cmdline_matches(&args("o2locktop -l 10 /mnt/a"), None));
        assert!(!cmdline_matches(&args("/usr/bin/top"), None));
    }

    #[test]
    fn test_ignores_similar_names() {
        assert!(!cmdline_matches(&args("o2locktop-verify -l 10 /mnt/a"), None));
        assert!(!cmdline_matches(&args("target/debug/deps/o2locktop_verify-1a2b"), None));
        assert!(!cmdline_matches(&args("vim /root/o2locktop/notes"), None));
        assert!(!cmdline_matches(&args("less /tmp/log o2locktop"), None));
    }

    #[test]
    fn test_matches_script_after_interpreter_flags() {
        let cmdline = args("python3 -u /usr/sbin/o2locktop -l 10 /mnt/ocfs2");
        assert!(cmdline_matches(&cmdline, None));
        assert!(cmdline_matches(&cmdline, Some("/mnt/ocfs2")));
        assert!(cmdline_matches(&args("/usr/bin/python3 -B -E o2locktop /mnt/ocfs2"), None));
        assert!(!cmdline_matches(&args("python3 -u /usr/sbin/other -l 10 /mnt/ocfs2"), None));
    }

    #[test]
    fn test_matches_mount_point() {
        let cmdline = args("o2locktop -n 10.0.0.2 /mnt/ocfs2/");
        assert!(cmdline_matches(&cmdline, Some("/mnt/ocfs2")));
        assert!(!cmdline_matches(&cmdline, Some("/mnt/other")));
        assert!(!cmdline_matches(&args("o2locktop /mnt/ocfs2-backup"), Some("/mnt/ocfs2")));
        assert!(!cmdline_matches(&args("ls /mnt/ocfs2"), Some("/mnt/ocfs2")));
    }

    #[test]
    fn test_terminate_without_matches() {
        // No process watches this path, so nothing is signalled.
        assert_eq!(terminate_monitor(Some("/nonexistent/o2locktop-verify-test")), 0);
    }
}
