use std::{io, ptr::NonNull, slice, sync::OnceLock};

use tracing::debug;

use crate::{
    error::{AllocError, Result},
    heap::HeapMemory,
    utils::align,
};

/// Default amount of address space reserved by [`SystemHeap::new`].
pub const DEFAULT_RESERVE: usize = 64 * 1024 * 1024;

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. The heap, our top level view of this, has nothing to do with
/// the concrete APIs offered by each kernel.
trait PlatformMemory {
    /// Reserves `len` bytes of address space without backing them. Returns
    /// None if the underlying syscall fails.
    unsafe fn reserve(len: usize) -> Option<NonNull<u8>>;

    /// Makes `len` bytes starting at `addr` readable and writable.
    unsafe fn commit(addr: *mut u8, len: usize) -> bool;

    /// Gives the physical memory behind `addr..addr + len` back to the kernel
    /// while keeping the address range reserved.
    unsafe fn decommit(addr: *mut u8, len: usize);

    /// Returns the reservation of size `len` starting from `addr`.
    unsafe fn release(addr: *mut u8, len: usize);

    /// Returns the virtual memory page size of the computer in bytes.
    unsafe fn page_size() -> usize;
}

struct Kernel;

/// Wrapper to calculate the computer's page size only once.
#[inline]
pub(crate) fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    *PAGE_SIZE.get_or_init(|| unsafe { Kernel::page_size() })
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use std::{
        os::raw::{c_int, c_void},
        ptr::{self, NonNull},
    };

    impl PlatformMemory for Kernel {
        unsafe fn reserve(len: usize) -> Option<NonNull<u8>> {
            // No access until a page is committed.
            const PROT: c_int = libc::PROT_NONE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: libc::off_t = 0;

            unsafe {
                let addr = libc::mmap(ptr::null_mut::<c_void>(), len, PROT, FLAGS, FD, OFFSET);

                match addr {
                    libc::MAP_FAILED => None,
                    addr => NonNull::new(addr.cast::<u8>()),
                }
            }
        }

        unsafe fn commit(addr: *mut u8, len: usize) -> bool {
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;

            unsafe { libc::mprotect(addr.cast::<c_void>(), len, PROT) == 0 }
        }

        unsafe fn decommit(addr: *mut u8, len: usize) {
            unsafe {
                libc::madvise(addr.cast::<c_void>(), len, libc::MADV_DONTNEED);
                libc::mprotect(addr.cast::<c_void>(), len, libc::PROT_NONE);
            }
        }

        unsafe fn release(addr: *mut u8, len: usize) {
            unsafe {
                libc::munmap(addr.cast::<c_void>(), len);
            }
        }

        unsafe fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

    use super::{Kernel, PlatformMemory};

    use ::windows::Win32::System::{Memory, SystemInformation};

    impl PlatformMemory for Kernel {
        unsafe fn reserve(len: usize) -> Option<NonNull<u8>> {
            unsafe {
                let addr = Memory::VirtualAlloc(None, len, Memory::MEM_RESERVE, Memory::PAGE_NOACCESS);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn commit(addr: *mut u8, len: usize) -> bool {
            unsafe {
                let addr = Memory::VirtualAlloc(
                    Some(addr as *const c_void),
                    len,
                    Memory::MEM_COMMIT,
                    Memory::PAGE_READWRITE,
                );

                !addr.is_null()
            }
        }

        unsafe fn decommit(addr: *mut u8, len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(addr as *mut c_void, len, Memory::MEM_DECOMMIT);
            }
        }

        unsafe fn release(addr: *mut u8, _len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(addr as *mut c_void, 0, Memory::MEM_RELEASE);
            }
        }

        unsafe fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}

/// A private program break backed by the operating system.
///
/// The process break itself is left to the platform's `malloc`. A fixed
/// range of address space is reserved up front and the break moves inside
/// it. Pages are committed lazily as the break crosses them:
///
/// ```text
///   base                     brk         committed              reserved
///   +------------------------+-----------+----------------------+
///   |       heap bytes       | committed |   reserved, no access |
///   +------------------------+-----------+----------------------+
/// ```
///
/// Growing past the reservation is reported as out of memory, exactly like
/// `sbrk` failing.
#[derive(Debug)]
pub struct SystemHeap {
    /// Start of the reservation.
    base: NonNull<u8>,
    /// Size of the reservation, a multiple of the page size.
    reserved: usize,
    /// Bytes from `base` that are readable and writable.
    committed: usize,
    /// Current break relative to `base`.
    brk: usize,
    page_size: usize,
}

impl SystemHeap {
    /// Reserves [`DEFAULT_RESERVE`] bytes of address space.
    pub fn new() -> Result<Self> {
        Self::reserve(DEFAULT_RESERVE)
    }

    /// Reserves `len` bytes of address space, rounded up to the page size.
    pub fn reserve(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(AllocError::Config("heap reservation must not be empty".into()));
        }

        let page_size = page_size();
        let reserved = len.checked_next_multiple_of(page_size).ok_or_else(|| AllocError::Reserve {
            len,
            source: io::ErrorKind::OutOfMemory.into(),
        })?;

        let base = unsafe { Kernel::reserve(reserved) }.ok_or_else(|| AllocError::Reserve {
            len: reserved,
            source: io::Error::last_os_error(),
        })?;

        debug!("Reserved {} bytes of address space at {:?}", reserved, base);

        Ok(Self {
            base,
            reserved,
            committed: 0,
            brk: 0,
            page_size,
        })
    }

    /// Size of the address space reservation.
    pub fn reserved(&self) -> usize {
        self.reserved
    }
}

impl HeapMemory for SystemHeap {
    fn grow(&mut self, len: usize) -> Option<usize> {
        let new_brk = self.brk.checked_add(len)?;

        if new_brk > self.reserved {
            return None;
        }

        if new_brk > self.committed {
            // `reserved` is page aligned, so this never leaves the reservation.
            let target = align(new_brk, self.page_size);

            let committed = unsafe {
                Kernel::commit(self.base.as_ptr().add(self.committed), target - self.committed)
            };

            if !committed {
                return None;
            }

            self.committed = target;
        }

        let prev = self.brk;
        self.brk = new_brk;

        Some(prev)
    }

    fn reset(&mut self) {
        if self.committed > 0 {
            unsafe { Kernel::decommit(self.base.as_ptr(), self.committed) };
        }

        self.committed = 0;
        self.brk = 0;
    }

    fn brk(&self) -> usize {
        self.brk
    }

    fn as_slice(&self) -> &[u8] {
        // Everything below the break is committed and owned by us.
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
    }
}

impl Drop for SystemHeap {
    fn drop(&mut self) {
        unsafe { Kernel::release(self.base.as_ptr(), self.reserved) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_a_power_of_two() {
        assert!(page_size().is_power_of_two());
    }

    #[test]
    fn reservation_is_page_aligned() {
        let heap = SystemHeap::reserve(1).unwrap();

        assert_eq!(page_size(), heap.reserved());
        assert_eq!(0, heap.brk());
    }

    #[test]
    fn new_reserves_the_default_range() {
        let heap = SystemHeap::new().unwrap();

        assert_eq!(DEFAULT_RESERVE, heap.reserved());
        assert!(heap.as_slice().is_empty());
    }

    #[test]
    fn empty_reservation_is_rejected() {
        assert!(matches!(SystemHeap::reserve(0), Err(AllocError::Config(_))));
    }

    #[test]
    fn oversized_reservation_is_an_error() {
        assert!(matches!(SystemHeap::reserve(usize::MAX), Err(AllocError::Reserve { .. })));
    }

    #[test]
    fn grown_memory_is_writable() {
        let mut heap = SystemHeap::reserve(4 * page_size()).unwrap();

        assert_eq!(Some(0), heap.grow(40));
        assert_eq!(Some(40), heap.grow(page_size()));

        let mem = heap.as_mut_slice();
        mem.fill(0xAB);
        assert!(heap.as_slice().iter().all(|b| *b == 0xAB));
        assert_eq!(40 + page_size(), heap.as_slice().len());
    }

    #[test]
    fn cannot_grow_past_the_reservation() {
        let mut heap = SystemHeap::reserve(page_size()).unwrap();

        assert_eq!(Some(0), heap.grow(page_size()));
        assert_eq!(None, heap.grow(1));
        assert_eq!(page_size(), heap.brk());
    }

    #[test]
    fn reset_rewinds_and_memory_can_be_reused() {
        let mut heap = SystemHeap::reserve(2 * page_size()).unwrap();

        heap.grow(100);
        heap.reset();
        assert_eq!(0, heap.brk());

        assert_eq!(Some(0), heap.grow(16));
        heap.as_mut_slice()[..16].copy_from_slice(&[7u8; 16]);
        assert_eq!(&[7u8; 16], heap.as_slice());
    }
}
