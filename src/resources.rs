//! Named mutual-exclusion resources with a configurable priority
//! inversion-control protocol, grounded on `resources.c`.
//!
//! Resource `0` is the sentinel "no resource"; `acquire`/`release` on it
//! are no-ops and it never gets an entry in [`ResourceSet`].

use crate::config::MutexProtocol;
use crate::domain::SystemError;

// Not bound by the `libc` crate on this target even though glibc exports
// it; declared directly, matching the original's direct pthread call.
extern "C" {
    fn pthread_mutexattr_setprioceiling(attr: *mut libc::pthread_mutexattr_t, prioceiling: libc::c_int) -> libc::c_int;
}

/// One real mutex plus the priority ceiling computed for it.
pub struct Resource {
    id: u32,
    ceiling_priority: u32,
    mutex: libc::pthread_mutex_t,
}

// SAFETY: `pthread_mutex_t` is designed to be shared across threads; all
// access goes through `lock`/`unlock` below which call the pthread API
// directly.
#[allow(unsafe_code)]
unsafe impl Send for Resource {}
#[allow(unsafe_code)]
unsafe impl Sync for Resource {}

impl Resource {
    fn new(id: u32, ceiling_priority: u32, protocol: MutexProtocol) -> Result<Self, SystemError> {
        let mut attr: libc::pthread_mutexattr_t = unsafe { std::mem::zeroed() };
        // SAFETY: `attr` is a valid, owned `pthread_mutexattr_t`; every
        // call below follows pthread's init/configure/destroy protocol.
        #[allow(unsafe_code)]
        unsafe {
            check(libc::pthread_mutexattr_init(&raw mut attr), "pthread_mutexattr_init")?;
            check(
                libc::pthread_mutexattr_settype(&raw mut attr, libc::PTHREAD_MUTEX_ERRORCHECK),
                "pthread_mutexattr_settype",
            )?;
            let proto = match protocol {
                MutexProtocol::None => libc::PTHREAD_PRIO_NONE,
                MutexProtocol::Inherit => libc::PTHREAD_PRIO_INHERIT,
                MutexProtocol::Protect => libc::PTHREAD_PRIO_PROTECT,
            };
            check(
                libc::pthread_mutexattr_setprotocol(&raw mut attr, proto),
                "pthread_mutexattr_setprotocol",
            )?;
            if matches!(protocol, MutexProtocol::Protect) {
                check(
                    pthread_mutexattr_setprioceiling(&raw mut attr, ceiling_priority as i32),
                    "pthread_mutexattr_setprioceiling",
                )?;
            }

            let mut mutex: libc::pthread_mutex_t = std::mem::zeroed();
            check(libc::pthread_mutex_init(&raw mut mutex, &raw const attr), "pthread_mutex_init")?;
            libc::pthread_mutexattr_destroy(&raw mut attr);

            Ok(Self {
                id,
                ceiling_priority,
                mutex,
            })
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn ceiling_priority(&self) -> u32 {
        self.ceiling_priority
    }

    fn lock(&self) -> Result<(), SystemError> {
        // SAFETY: `self.mutex` was initialized in `new` and outlives this call.
        #[allow(unsafe_code)]
        unsafe {
            check(libc::pthread_mutex_lock(&raw const self.mutex as *mut _), "pthread_mutex_lock")
        }
    }

    fn unlock(&self) -> Result<(), SystemError> {
        // SAFETY: as above.
        #[allow(unsafe_code)]
        unsafe {
            check(libc::pthread_mutex_unlock(&raw const self.mutex as *mut _), "pthread_mutex_unlock")
        }
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        // SAFETY: no other thread can hold a reference once we're dropping.
        #[allow(unsafe_code)]
        unsafe {
            libc::pthread_mutex_destroy(&raw mut self.mutex);
        }
    }
}

fn check(rc: i32, primitive: &'static str) -> Result<(), SystemError> {
    if rc == 0 {
        Ok(())
    } else {
        Err(SystemError::Errno { primitive, errno: rc })
    }
}

/// The full table of resources for a task set, sized from the highest
/// resource id referenced by any task's sections.
pub struct ResourceSet {
    resources: Vec<Resource>,
}

impl ResourceSet {
    /// Builds one [`Resource`] per id `1..=max_id`, each with its ceiling
    /// set to the maximum priority of any task section referencing it.
    /// `sections` is `(resource_id, task_priority)` for every section of
    /// every task, exactly the input `resources_update` folds over in
    /// `resources.c`.
    pub fn build(sections: &[(u32, u32)], protocol: MutexProtocol) -> Result<Self, SystemError> {
        let max_id = sections.iter().map(|(r, _)| *r).max().unwrap_or(0);
        let mut ceilings = vec![0u32; max_id as usize];
        for &(r, priority) in sections {
            if r == 0 {
                continue;
            }
            let slot = &mut ceilings[(r - 1) as usize];
            *slot = (*slot).max(priority);
        }

        let resources = ceilings
            .into_iter()
            .enumerate()
            .map(|(idx, ceiling)| Resource::new((idx + 1) as u32, ceiling, protocol))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { resources })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn ceiling_of(&self, id: u32) -> Option<u32> {
        (id != 0).then(|| self.resources[(id - 1) as usize].ceiling_priority())
    }

    /// No-op for `id == 0` (the "no resource" sentinel).
    pub fn acquire(&self, id: u32) -> Result<(), SystemError> {
        if id == 0 {
            return Ok(());
        }
        self.resources[(id - 1) as usize].lock()
    }

    /// No-op for `id == 0`.
    pub fn release(&self, id: u32) -> Result<(), SystemError> {
        if id == 0 {
            return Ok(());
        }
        self.resources[(id - 1) as usize].unlock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_is_max_priority_of_referencing_tasks() {
        let sections = [(1, 10), (1, 20), (2, 5)];
        let set = ResourceSet::build(&sections, MutexProtocol::None).unwrap();
        assert_eq!(set.ceiling_of(1), Some(20));
        assert_eq!(set.ceiling_of(2), Some(5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn no_resource_is_a_no_op() {
        let set = ResourceSet::build(&[], MutexProtocol::None).unwrap();
        assert!(set.is_empty());
        set.acquire(0).unwrap();
        set.release(0).unwrap();
    }

    #[test]
    fn acquire_then_release_round_trips() {
        let set = ResourceSet::build(&[(1, 10)], MutexProtocol::Inherit).unwrap();
        set.acquire(1).unwrap();
        set.release(1).unwrap();
    }
}
