//! Spawns and line-streams the external Expo processes: project bootstrap
//! and the web dev server. The dev-server stream is scanned for either a
//! local preview URL or a recognizable missing-dependency signature; the
//! latter triggers an `expo install` followed by a single restart.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, OnceLock};
use std::thread;

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(http://localhost:\d+|http://127\.0\.0\.1:\d+)").expect("valid pattern")
    })
}

/// Runs `npx create-expo-app` unless the project directory already exists.
pub fn bootstrap_expo(workspace_root: &Path, project_dir: &str, no_install: bool) -> Result<()> {
    let target = workspace_root.join(project_dir);
    if target.exists() {
        return Ok(());
    }

    let mut cmd = Command::new("npx");
    cmd.args(["create-expo-app", project_dir, "--template", "blank"])
        .current_dir(workspace_root);
    if no_install {
        cmd.arg("--no-install");
    }
    stream_to_completion(cmd, "npx create-expo-app")
}

/// Starts the Expo web dev server and returns the detected preview URL, if
/// any. A missing-dependency signature in the output terminates the server,
/// installs the dependencies and restarts once.
pub fn run_expo_web(project_root: &Path, port: Option<u16>) -> Result<Option<String>> {
    run_expo_web_inner(project_root, port, true)
}

fn run_expo_web_inner(
    project_root: &Path,
    port: Option<u16>,
    allow_install_retry: bool,
) -> Result<Option<String>> {
    let mut cmd = Command::new("npx");
    cmd.args(["expo", "start", "--web"]).current_dir(project_root);
    if let Some(port) = port {
        cmd.args(["--port", &port.to_string()]);
    }

    let (mut child, lines) = spawn_streaming(cmd)?;

    let mut found_url: Option<String> = None;
    let mut combined = String::new();
    let mut to_install: Option<Vec<&'static str>> = None;

    for line in lines {
        println!("{line}");
        combined.push_str(&line);
        combined.push('\n');

        if found_url.is_none() {
            if let Some(m) = url_pattern().find(&line) {
                found_url = Some(m.as_str().to_string());
            }
        }
        if to_install.is_none() {
            to_install = detect_missing_deps(&line).or_else(|| detect_missing_deps(&combined));
            if to_install.is_some() {
                break;
            }
        }
    }

    if let Some(deps) = to_install {
        let _ = child.kill();
        let _ = child.wait();
        return install_and_retry(project_root, port, &deps, allow_install_retry);
    }

    let status = child.wait().context("failed to wait for expo dev server")?;
    if !status.success() {
        if let Some(deps) = detect_missing_deps(&combined) {
            return install_and_retry(project_root, port, &deps, allow_install_retry);
        }
        bail!("command failed: npx expo start --web");
    }
    Ok(found_url)
}

fn install_and_retry(
    project_root: &Path,
    port: Option<u16>,
    deps: &[&'static str],
    allow_retry: bool,
) -> Result<Option<String>> {
    if !allow_retry {
        bail!("still missing dependencies after install: {}", deps.join(", "));
    }
    println!("Installing missing dependencies: {}", deps.join(", "));
    let mut cmd = Command::new("npx");
    cmd.args(["expo", "install"]).args(deps).current_dir(project_root);
    stream_to_completion(cmd, "npx expo install")?;
    run_expo_web_inner(project_root, port, false)
}

/// Maps known failure signatures in Expo output to the packages to install.
pub(crate) fn detect_missing_deps(output: &str) -> Option<Vec<&'static str>> {
    if needs_web_deps(output) {
        return Some(vec!["react-dom", "react-native-web"]);
    }
    if needs_ts_deps(output) {
        return Some(vec!["typescript", "@types/react"]);
    }
    if needs_async_storage(output) {
        return Some(vec!["@react-native-async-storage/async-storage"]);
    }
    None
}

fn needs_web_deps(output: &str) -> bool {
    output.contains("react-dom")
        && output.contains("react-native-web")
        && output.contains("expo install")
}

fn needs_ts_deps(output: &str) -> bool {
    output.contains("TypeScript")
        && output.contains("typescript")
        && output.contains("@types/react")
}

fn needs_async_storage(output: &str) -> bool {
    output.contains("@react-native-async-storage/async-storage")
        && output.contains("Unable to resolve")
}

/// Spawns a command with stdout and stderr merged into one line channel.
/// Reader threads drop their senders when the streams close, ending the
/// channel iteration.
fn spawn_streaming(mut cmd: Command) -> Result<(Child, mpsc::Receiver<String>)> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().context("failed to spawn command")?;

    let (tx, rx) = mpsc::channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }

    Ok((child, rx))
}

fn stream_to_completion(cmd: Command, label: &str) -> Result<()> {
    let (mut child, lines) = spawn_streaming(cmd)?;
    for line in lines {
        println!("{line}");
    }
    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {label}"))?;
    if !status.success() {
        bail!("command failed: {label}");
    }
    Ok(())
}
