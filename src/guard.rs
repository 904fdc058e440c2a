// Protected-process guard.
//
// Static configuration data, not computed: process names that must never be
// terminated by this tool. Every termination request consults this list
// first. The comparison is a case-insensitive exact match.

pub const PROTECTED_PROCESS_NAMES: &[&str] = &[
    "[System Process]",          // System Process
    "amdfendrsr.exe",            // AMD External Events Utility
    "AmdPpkgSvc.exe",            // AMD Power Profiling SDK Service
    "ApplicationFrameHost.exe",  // Application Frame Host
    "atieclxx.exe",              // AMD Driver
    "atiesrxx.exe",              // AMD External Events Utility
    "audiodg.exe",               // Audio Engine
    "cmd.exe",                   // Command Prompt
    "conhost.exe",               // Console Window Host
    "csrss.exe",                 // Client/Server Runtime Subsystem
    "cs2.exe",                   // The game itself
    "cs2-tools.exe",             // The CS2 Tools application itself
    "ctfmon.exe",                // Keyboard Input Loader
    "dasHost.exe",               // Device Association Framework Host
    "DataExchangeHost.exe",      // Data Exchange Host
    "dllhost.exe",               // COM Surrogate
    "dwm.exe",                   // Desktop Window Manager
    "explorer.exe",              // Windows Explorer
    "fontdrvhost.exe",           // Font Driver Host
    "KillerAnalyticsService.exe", // Network Driver Utility
    "KillerNetworkService.exe",  // Network Driver
    "lsass.exe",                 // Local Security Authority Process
    "LsaIso.exe",                // LSA Isolated User Mode Process
    "Memory Compression",        // Memory Compression Process
    "msedgewebview2.exe",        // Microsoft Edge WebView2 (hosts this app's UI)
    "MpDefenderCoreService.exe", // Windows Defender
    "MsMpEng.exe",               // Windows Defender
    "NisSrv.exe",                // Network Inspection Service (Windows Defender)
    "NVDisplay.Container.exe",   // NVIDIA Display Container LS
    "Registry",                  // Windows Registry
    "RtkAudUService64.exe",      // Audio Driver
    "RuntimeBroker.exe",         // Store App Permissions Manager
    "SearchFilterHost.exe",      // Windows Search Filter Host
    "SearchHost.exe",            // Windows Search Host
    "SearchIndexer.exe",         // Windows Search
    "SearchProtocolHost.exe",    // Windows Search Protocol Host
    "Secure System",             // Secure System Process
    "SecurityHealthService.exe", // Windows Security Health Service
    "SecurityHealthSystray.exe", // Windows Security Health Systray
    "services.exe",              // Services Control Manager
    "ShellExperienceHost.exe",   // Shell Experience Host
    "ShellHost.exe",             // Windows Shell Host
    "sihost.exe",                // Shell Infrastructure
    "smss.exe",                  // Session Manager Subsystem
    "spoolsv.exe",               // Print Spooler Service
    "StartMenuExperienceHost.exe", // Start Menu Experience Host
    "steam.exe",                 // Steam Client
    "steamservice.exe",          // Steam Client Service
    "steamwebhelper.exe",        // Steam Web Helper
    "System",                    // Another name for the System Process
    "SystemSettings.exe",        // System Settings
    "System Idle Process",       // System Idle Process
    "svchost.exe",               // Service Host Process
    "taskhostw.exe",             // Task Host for Windows
    "taskmgr.exe",               // Task Manager
    "TextInputHost.exe",
    "wininit.exe",               // Windows Start-Up Application
    "winlogon.exe",              // Windows Logon Application
    "wlanext.exe",               // WiFi Driver
    "WmiPrvSE.exe",              // Windows Management Instrumentation
    "wslservice.exe",            // Subsystem for Linux (System Service)
    "WUDFHost.exe",              // Windows Driver Foundation
];

/// Case-insensitive exact match against the protected list.
/// An empty name is never protected.
pub fn is_process_protected(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    PROTECTED_PROCESS_NAMES
        .iter()
        .any(|protected| protected.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_is_case_insensitive() {
        assert!(is_process_protected("cs2.exe"));
        assert!(is_process_protected("CS2.EXE"));
        assert!(is_process_protected("Explorer.exe"));
    }

    #[test]
    fn exact_match_only() {
        assert!(!is_process_protected("cs2"));
        assert!(!is_process_protected("explorer.exe2"));
        assert!(!is_process_protected("chrome.exe"));
    }

    #[test]
    fn empty_name_is_not_protected() {
        assert!(!is_process_protected(""));
    }
}
