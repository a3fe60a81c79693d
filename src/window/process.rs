use std::sync::Mutex;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use super::{EnrichError, ProcessDetails, ProcessInfo};

/// [`ProcessInfo`] backed by the sysinfo process table
pub struct SysinfoProcesses {
    system: Mutex<System>,
}

impl SysinfoProcesses {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// refresh a single pid and run `f` on it while the table is locked
    fn with_process<T>(&self, pid: u32, f: impl FnOnce(&sysinfo::Process) -> T) -> Option<T> {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pid = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::everything(),
        );
        system.process(pid).map(f)
    }
}

impl Default for SysinfoProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInfo for SysinfoProcesses {
    fn process_name(&self, pid: u32) -> Result<String, EnrichError> {
        self.with_process(pid, |p| p.name().to_string_lossy().into_owned())
            .ok_or_else(|| EnrichError::ProcessInfoUnavailable {
                pid,
                reason: "process exited".to_string(),
            })
    }

    fn process_details(&self, pid: u32) -> Result<ProcessDetails, EnrichError> {
        let details = self.with_process(pid, |p| {
            let path = p.exe().map(|exe| exe.to_string_lossy().into_owned());
            let args: Vec<String> = p
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            ProcessDetails {
                path,
                command_line: if args.is_empty() { None } else { Some(args) },
            }
        });

        match details {
            Some(ProcessDetails { path: None, .. }) => Err(EnrichError::ProcessInfoUnavailable {
                pid,
                reason: "access denied to executable path".to_string(),
            }),
            Some(details) => Ok(details),
            None => Err(EnrichError::ProcessInfoUnavailable {
                pid,
                reason: "process exited".to_string(),
            }),
        }
    }
}
