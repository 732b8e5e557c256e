use winsandbox_mcp::control_plane::platform::{self, IGNORE_OS_VERSION_ENV, MIN_WINDOWS_BUILD};

/// Print every host precondition. Returns `false` if one would block `wsb`.
pub async fn run() -> bool {
    println!("🔍 Checking Windows Sandbox prerequisites...\n");

    let mut all_ok = true;

    print!("• Checking operating system... ");
    match platform::ensure_windows() {
        Ok(()) => println!("✓ Windows"),
        Err(e) => {
            println!("✗ {}", e);
            all_ok = false;
        }
    }

    let overridden = platform::version_check_overridden();
    print!("• Checking Windows build... ");
    match platform::host_build_number() {
        Some(build) if build >= MIN_WINDOWS_BUILD => println!("✓ Build {}", build),
        Some(build) if overridden => {
            println!("⚠️  Build {} is below {} (check overridden)", build, MIN_WINDOWS_BUILD)
        }
        Some(build) => {
            println!("✗ Build {} is below {}", build, MIN_WINDOWS_BUILD);
            println!("  Windows 11 24H2 or later is required");
            all_ok = false;
        }
        None if overridden => println!("○ Unknown build (check overridden)"),
        None => {
            println!("✗ Could not determine the Windows build");
            all_ok = false;
        }
    }
    if overridden {
        println!("  {} is set", IGNORE_OS_VERSION_ENV);
    }

    print!("• Checking wsb.exe... ");
    match platform::executable_path() {
        Some(path) if path.is_file() => println!("✓ Found at {}", path.display()),
        Some(path) => {
            println!("✗ Not found at {}", path.display());
            println!("  Install the latest Windows Sandbox app from Microsoft Store");
            all_ok = false;
        }
        None => {
            println!("✗ Local application data folder could not be resolved");
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("✓ Ready to run Windows Sandbox");
    } else {
        println!("✗ Some checks failed");
    }

    all_ok
}
