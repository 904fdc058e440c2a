// Windows foreground process lookup.
//
// Used by the monitor loop to decide whether the game currently owns the
// foreground window.

#[cfg(target_os = "windows")]
mod imp {
    use windows::core::PWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

    fn query_process_path(pid: u32) -> Option<String> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;

            // 4k UTF-16 units is far beyond any real install path.
            let mut buf: Vec<u16> = vec![0; 4096];
            let mut size: u32 = buf.len() as u32;

            let ok = QueryFullProcessImageNameW(
                handle,
                PROCESS_NAME_WIN32,
                PWSTR(buf.as_mut_ptr()),
                &mut size,
            )
            .is_ok();

            let _ = CloseHandle(handle);

            if !ok || size == 0 {
                return None;
            }

            Some(String::from_utf16_lossy(&buf[..size as usize]))
        }
    }

    /// Executable file name of the process owning the foreground window.
    pub fn foreground_process_name() -> Option<String> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return None;
            }

            let mut pid: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            if pid == 0 {
                return None;
            }

            let path = query_process_path(pid)?;
            path.replace('\\', "/")
                .rsplit('/')
                .next()
                .map(|name| name.to_string())
        }
    }
}

#[cfg(target_os = "windows")]
pub use imp::foreground_process_name;

#[cfg(not(target_os = "windows"))]
pub fn foreground_process_name() -> Option<String> {
    None
}
