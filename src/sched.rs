//! Real-time scheduling class and CPU affinity for task/idle threads,
//! applied from inside the spawned thread itself since `std::thread`
//! exposes no pre-spawn pthread attributes. Grounded on `task_create`'s
//! `pthread_attr_set{schedpolicy,schedparam}` and the `with_affinity`
//! handling in `main.c`/`task_create` (which pins every task to the same
//! single-CPU set derived from the process's own affinity mask).

use crate::domain::SystemError;

/// Sets the calling thread's scheduling policy to round-robin real-time
/// at `priority`, matching `TASK_SCHED_POLICY` (`SCHED_RR`) in `task.c`.
pub fn apply_scheduling(priority: u32) -> Result<(), SystemError> {
    let param = libc::sched_param {
        sched_priority: priority as i32,
    };
    // SAFETY: `param` is a valid, fully-initialized `sched_param`; we pass
    // 0 for "calling thread" per `sched_setscheduler(2)`.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_RR, &raw const param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(SystemError::Errno {
            primitive: "sched_setscheduler",
            errno: errno(),
        })
    }
}

/// Pins the calling thread to CPU 0, the single reserved CPU the whole
/// task set runs on by design (`spec.md` §1 Non-goals: no multi-CPU
/// distribution).
pub fn apply_affinity() -> Result<(), SystemError> {
    // SAFETY: `set` is a valid, stack-local `cpu_set_t`.
    #[allow(unsafe_code)]
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(0, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &raw const set);
        if rc == 0 {
            Ok(())
        } else {
            Err(SystemError::Errno {
                primitive: "sched_setaffinity",
                errno: errno(),
            })
        }
    }
}

/// Sets the OS-visible thread name, matching `pthread_setname_np` in
/// `task_loop`/`idle_body`. Truncated to 15 bytes plus NUL, the kernel's
/// `TASK_COMM_LEN` limit.
pub fn set_thread_name(name: &str) {
    let mut bytes: Vec<u8> = name.as_bytes().iter().take(15).copied().collect();
    bytes.push(0);
    let cname = std::ffi::CString::new(&bytes[..bytes.len() - 1]).unwrap_or_default();
    // SAFETY: `cname` is NUL-terminated and "pthread_self()" always
    // refers to the current, live thread.
    #[allow(unsafe_code)]
    unsafe {
        libc::pthread_setname_np(libc::pthread_self(), cname.as_ptr());
    }
}

fn errno() -> i32 {
    // SAFETY: reading the thread-local errno is always sound.
    #[allow(unsafe_code)]
    unsafe {
        *libc::__errno_location()
    }
}
