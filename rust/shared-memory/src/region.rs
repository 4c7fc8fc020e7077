//! Shared memory region management

use crate::{PlatformUtils, Result, SharedMemoryError};
use std::ptr::NonNull;
use tracing::debug;

/// Shared memory region handle.
///
/// The mapping is released when the handle drops; the creator also removes
/// the name so the segment disappears once every side has closed it.
pub struct SharedMemoryRegion {
    /// Region name/identifier
    name: String,
    /// Mapped size in bytes
    size: usize,
    /// Memory pointer
    ptr: NonNull<u8>,
    /// Platform-specific handle
    platform_handle: PlatformHandle,
    /// Whether this process created the region
    is_creator: bool,
}

/// Platform-specific handle types
#[derive(Debug)]
pub enum PlatformHandle {
    #[cfg(unix)]
    Unix { fd: std::os::fd::OwnedFd },
    #[cfg(windows)]
    Windows { handle: *mut std::ffi::c_void },
}

impl SharedMemoryRegion {
    /// Create a new shared memory region; fails if the name is taken
    pub fn create(name: impl Into<String>, size: usize) -> Result<Self> {
        let name = name.into();
        validate_region_name(&name)?;
        validate_region_size(size)?;

        let size = PlatformUtils::align_to_page_size(size);
        let (ptr, platform_handle) = create_platform_region(&name, size)?;
        debug!("Created shared memory region {} ({} bytes)", name, size);

        Ok(Self {
            name,
            size,
            ptr,
            platform_handle,
            is_creator: true,
        })
    }

    /// Open an existing shared memory region
    pub fn open(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_region_name(&name)?;

        let (ptr, size, platform_handle) = open_platform_region(&name)?;
        debug!("Opened shared memory region {} ({} bytes)", name, size);

        Ok(Self {
            name,
            size,
            ptr,
            platform_handle,
            is_creator: false,
        })
    }

    /// Open the region if it exists, otherwise create it
    pub fn open_or_create(name: impl Into<String>, size: usize) -> Result<Self> {
        let name = name.into();
        match Self::create(name.clone(), size) {
            Err(SharedMemoryError::RegionExists(_)) => Self::open(name),
            other => other,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapped size, rounded up to whole pages
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_creator(&self) -> bool {
        self.is_creator
    }

    /// Get raw pointer to the start of the mapping
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // Platform-specific cleanup
        let _ = cleanup_platform_region(
            self.ptr,
            self.size,
            &self.platform_handle,
            &self.name,
            self.is_creator,
        );
    }
}

impl std::fmt::Debug for SharedMemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryRegion")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("is_creator", &self.is_creator)
            .finish()
    }
}

// Safety: the mapping stays valid for the lifetime of the handle and is only
// reached through raw copies and atomics.
unsafe impl Send for SharedMemoryRegion {}
unsafe impl Sync for SharedMemoryRegion {}

// Platform-specific implementations

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use nix::fcntl::OFlag;
    use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
    use nix::sys::stat::{fstat, Mode};
    use std::num::NonZeroUsize;
    use std::os::fd::{AsRawFd, OwnedFd};

    fn map_shared(fd: &OwnedFd, size: usize) -> Result<NonNull<u8>> {
        let length = NonZeroUsize::new(size).ok_or(SharedMemoryError::InvalidSize {
            size,
            min: 1,
            max: usize::MAX,
        })?;

        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                Some(fd),
                0,
            )
        }
        .map_err(|e| SharedMemoryError::from_platform_error(e as i32, "mmap failed"))?;

        NonNull::new(ptr as *mut u8)
            .ok_or_else(|| SharedMemoryError::MappingFailed("mmap returned null".to_string()))
    }

    pub fn create_platform_region(name: &str, size: usize) -> Result<(NonNull<u8>, PlatformHandle)> {
        let os_name = PlatformUtils::object_name(name);

        let fd = shm_open(
            os_name.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| SharedMemoryError::from_platform_error(e as i32, format!("shm_open {} failed", os_name)))?;

        let sized = nix::unistd::ftruncate(&fd, size as i64)
            .map_err(|e| SharedMemoryError::from_platform_error(e as i32, "ftruncate failed"))
            .and_then(|_| map_shared(&fd, size));

        match sized {
            Ok(ptr) => Ok((ptr, PlatformHandle::Unix { fd })),
            Err(e) => {
                let _ = shm_unlink(os_name.as_str());
                Err(e)
            }
        }
    }

    pub fn open_platform_region(name: &str) -> Result<(NonNull<u8>, usize, PlatformHandle)> {
        let os_name = PlatformUtils::object_name(name);

        let fd = shm_open(os_name.as_str(), OFlag::O_RDWR, Mode::empty())
            .map_err(|e| SharedMemoryError::from_platform_error(e as i32, format!("shm_open {} failed", os_name)))?;

        let stat = fstat(fd.as_raw_fd())
            .map_err(|e| SharedMemoryError::from_platform_error(e as i32, "fstat failed"))?;
        let size = stat.st_size as usize;

        let ptr = map_shared(&fd, size)?;
        Ok((ptr, size, PlatformHandle::Unix { fd }))
    }

    pub fn cleanup_platform_region(
        ptr: NonNull<u8>,
        size: usize,
        _handle: &PlatformHandle,
        name: &str,
        is_creator: bool,
    ) -> Result<()> {
        unsafe { munmap(ptr.as_ptr() as *mut std::ffi::c_void, size) }
            .map_err(|e| SharedMemoryError::from_platform_error(e as i32, "munmap failed"))?;

        // The descriptor closes when the handle drops; only the creator unlinks.
        if is_creator {
            let _ = shm_unlink(PlatformUtils::object_name(name).as_str());
        }
        Ok(())
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use std::ffi::CString;
    use winapi::shared::winerror::ERROR_ALREADY_EXISTS;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
    use winapi::um::memoryapi::{MapViewOfFile, UnmapViewOfFile, VirtualQuery};
    use winapi::um::winbase::{CreateFileMappingA, OpenFileMappingA};
    use winapi::um::winnt::{MEMORY_BASIC_INFORMATION, PAGE_READWRITE};
    use winapi::um::memoryapi::FILE_MAP_ALL_ACCESS;

    fn c_name(name: &str) -> Result<CString> {
        CString::new(name).map_err(|_| SharedMemoryError::Platform("Invalid region name".to_string()))
    }

    pub fn create_platform_region(name: &str, size: usize) -> Result<(NonNull<u8>, PlatformHandle)> {
        let c_name = c_name(name)?;

        let handle = unsafe {
            CreateFileMappingA(
                INVALID_HANDLE_VALUE,
                std::ptr::null_mut(),
                PAGE_READWRITE,
                ((size as u64) >> 32) as u32,
                (size as u64 & 0xFFFF_FFFF) as u32,
                c_name.as_ptr(),
            )
        };

        if handle.is_null() {
            return Err(SharedMemoryError::Platform("CreateFileMapping failed".to_string()));
        }

        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe { CloseHandle(handle) };
            return Err(SharedMemoryError::RegionExists(name.to_string()));
        }

        let ptr = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, size) };

        if ptr.is_null() {
            unsafe { CloseHandle(handle) };
            return Err(SharedMemoryError::MappingFailed("MapViewOfFile failed".to_string()));
        }

        let non_null_ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| SharedMemoryError::MappingFailed("MapViewOfFile returned null".to_string()))?;

        Ok((non_null_ptr, PlatformHandle::Windows { handle }))
    }

    pub fn open_platform_region(name: &str) -> Result<(NonNull<u8>, usize, PlatformHandle)> {
        let c_name = c_name(name)?;

        let handle = unsafe { OpenFileMappingA(FILE_MAP_ALL_ACCESS, 0, c_name.as_ptr()) };

        if handle.is_null() {
            return Err(SharedMemoryError::RegionNotFound(name.to_string()));
        }

        // Map the entire object, then ask how large the view is
        let ptr = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, 0) };

        if ptr.is_null() {
            unsafe { CloseHandle(handle) };
            return Err(SharedMemoryError::MappingFailed("MapViewOfFile failed".to_string()));
        }

        let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
        let queried = unsafe { VirtualQuery(ptr, &mut mbi, std::mem::size_of_val(&mbi)) };

        if queried == 0 {
            unsafe {
                UnmapViewOfFile(ptr);
                CloseHandle(handle);
            };
            return Err(SharedMemoryError::Platform("VirtualQuery failed".to_string()));
        }

        let non_null_ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| SharedMemoryError::MappingFailed("MapViewOfFile returned null".to_string()))?;

        Ok((non_null_ptr, mbi.RegionSize, PlatformHandle::Windows { handle }))
    }

    pub fn cleanup_platform_region(
        ptr: NonNull<u8>,
        _size: usize,
        handle: &PlatformHandle,
        _name: &str,
        _is_creator: bool,
    ) -> Result<()> {
        let PlatformHandle::Windows { handle } = handle;
        unsafe {
            UnmapViewOfFile(ptr.as_ptr() as winapi::shared::minwindef::LPCVOID);
            CloseHandle(*handle);
        }
        Ok(())
    }
}

#[cfg(unix)]
use unix_impl::*;
#[cfg(windows)]
use windows_impl::*;

/// Validate region name
fn validate_region_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 255 {
        return Err(SharedMemoryError::Platform("Invalid region name length".to_string()));
    }

    // Check for invalid characters
    if name.contains('\0') {
        return Err(SharedMemoryError::Platform("Region name contains null byte".to_string()));
    }

    if name.trim_start_matches('/').contains('/') {
        return Err(SharedMemoryError::Platform("Region name contains a path separator".to_string()));
    }

    Ok(())
}

/// Validate region size
fn validate_region_size(size: usize) -> Result<()> {
    const MIN_SIZE: usize = 1;
    const MAX_SIZE: usize = 1024 * 1024 * 1024; // 1GB

    if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
        return Err(SharedMemoryError::InvalidSize {
            size,
            min: MIN_SIZE,
            max: MAX_SIZE,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_validation() {
        // Test invalid name
        assert!(SharedMemoryRegion::create("", 4096).is_err());
        assert!(SharedMemoryRegion::create("test\0name", 4096).is_err());
        assert!(SharedMemoryRegion::create("a/b", 4096).is_err());

        // Test invalid size
        assert!(SharedMemoryRegion::create("ovl_size", 0).is_err());
        assert!(SharedMemoryRegion::create("ovl_size", usize::MAX).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_region_creation_and_sharing() {
        let name = PlatformUtils::generate_region_name("ovl_rg");
        let creator = SharedMemoryRegion::create(name.as_str(), 1000).unwrap();
        assert!(creator.is_creator());
        assert!(creator.size() >= 1000);

        let opened = SharedMemoryRegion::open(name.as_str()).unwrap();
        assert!(!opened.is_creator());
        assert_eq!(opened.size(), creator.size());

        unsafe {
            creator.as_ptr().add(10).write_volatile(0xAB);
            assert_eq!(opened.as_ptr().add(10).read_volatile(), 0xAB);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_create_twice_fails_but_open_or_create_attaches() {
        let name = PlatformUtils::generate_region_name("ovl_rg");
        let _first = SharedMemoryRegion::create(name.as_str(), 4096).unwrap();

        assert!(matches!(
            SharedMemoryRegion::create(name.as_str(), 4096),
            Err(SharedMemoryError::RegionExists(_))
        ));

        let attached = SharedMemoryRegion::open_or_create(name.as_str(), 4096).unwrap();
        assert!(!attached.is_creator());
    }

    #[cfg(unix)]
    #[test]
    fn test_open_missing_region_fails() {
        let name = PlatformUtils::generate_region_name("ovl_none");
        assert!(matches!(
            SharedMemoryRegion::open(name.as_str()),
            Err(SharedMemoryError::RegionNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_creator_drop_unlinks() {
        let name = PlatformUtils::generate_region_name("ovl_rg");
        drop(SharedMemoryRegion::create(name.as_str(), 4096).unwrap());
        assert!(SharedMemoryRegion::open(name.as_str()).is_err());
    }
}
