use std::env;
use std::process::Command;

/// Checks the external tools the generation pipeline depends on. Returns a
/// process exit code: 0 when everything needed is present.
pub fn run_doctor(check_expo: bool) -> i32 {
    let mut ok = true;

    for binary in ["node", "npx"] {
        if binary_on_path(binary) {
            println!("✓ {binary} OK");
        } else {
            eprintln!("✗ {binary} not found");
            ok = false;
        }
    }

    if check_expo {
        match Command::new("npx").args(["expo", "--version"]).output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                println!("✓ expo OK ({})", version.trim());
            }
            Ok(_) => {
                eprintln!("✗ expo not available via npx");
                ok = false;
            }
            Err(_) => {
                eprintln!("✗ npx not available");
                ok = false;
            }
        }
    }

    if ok { 0 } else { 1 }
}

fn binary_on_path(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(name);
        candidate.is_file() || candidate.with_extension("exe").is_file()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_on_path_misses_nonsense() {
        assert!(!binary_on_path("definitely-not-a-real-binary-name"));
    }
}
