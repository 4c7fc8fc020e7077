//! Platform-specific helpers for shared memory and signal naming

/// Platform capabilities
pub struct PlatformCapabilities {
    /// Maximum shared memory region size
    pub max_region_size: usize,
    /// Default page size
    pub page_size: usize,
}

impl PlatformCapabilities {
    /// Get platform capabilities
    pub fn get() -> Self {
        #[cfg(unix)]
        {
            Self::unix_capabilities()
        }
        #[cfg(windows)]
        {
            Self::windows_capabilities()
        }
        #[cfg(not(any(unix, windows)))]
        {
            Self::default_capabilities()
        }
    }

    #[cfg(unix)]
    fn unix_capabilities() -> Self {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

        Self {
            max_region_size: 1024 * 1024 * 1024, // 1GB default
            page_size: if page_size > 0 { page_size as usize } else { 4096 },
        }
    }

    #[cfg(windows)]
    fn windows_capabilities() -> Self {
        use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};

        let mut sys_info: SYSTEM_INFO = unsafe { std::mem::zeroed() };
        unsafe { GetSystemInfo(&mut sys_info) };

        Self {
            max_region_size: 1024 * 1024 * 1024,
            page_size: sys_info.dwPageSize as usize,
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn default_capabilities() -> Self {
        Self {
            max_region_size: 64 * 1024 * 1024, // 64MB conservative default
            page_size: 4096,
        }
    }
}

/// Platform-specific utilities
pub struct PlatformUtils;

impl PlatformUtils {
    /// Get current process ID
    pub fn get_process_id() -> u32 {
        std::process::id()
    }

    /// Generate a unique, short object name.
    ///
    /// Kept under 31 characters so it is also a valid semaphore name on macOS.
    pub fn generate_region_name(prefix: &str) -> String {
        let unique = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}", prefix, Self::get_process_id(), &unique[..8])
    }

    /// Name as the OS expects it for named shared objects.
    ///
    /// POSIX requires a single leading slash; Windows takes the name as is.
    pub fn object_name(name: &str) -> String {
        #[cfg(unix)]
        {
            format!("/{}", name.trim_start_matches('/'))
        }
        #[cfg(not(unix))]
        {
            name.to_string()
        }
    }

    /// Align size to page boundary
    pub fn align_to_page_size(size: usize) -> usize {
        let page_size = PlatformCapabilities::get().page_size;

        // Round up to nearest page size
        (size + page_size - 1) & !(page_size - 1)
    }
}
