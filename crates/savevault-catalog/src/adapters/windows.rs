use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::{ExeMetadata, MetadataAdapter, RegistryAdapter};

/// Adapter subprocesses are killed after this long; a timeout is treated
/// as absence of data, not as failure.
const ADAPTER_TIMEOUT: Duration = Duration::from_secs(4);

/// Output past this size is discarded.
const OUTPUT_CAP: usize = 8 * 1024 * 1024;

pub struct WindowsMetadataAdapter;

impl MetadataAdapter for WindowsMetadataAdapter {
    fn exe_metadata(&self, exe_path: &Path) -> Option<ExeMetadata> {
        let escaped = exe_path.to_string_lossy().replace('\'', "''");
        let script = format!(
            "$v = [System.Diagnostics.FileVersionInfo]::GetVersionInfo('{escaped}'); \
             @{{ productName = $v.ProductName; fileDescription = $v.FileDescription }} | ConvertTo-Json"
        );
        let output = run_powershell(&script)?;
        let value: serde_json::Value = serde_json::from_str(output.trim()).ok()?;
        Some(ExeMetadata {
            product_name: non_empty_string(&value["productName"]),
            file_description: non_empty_string(&value["fileDescription"]),
        })
    }
}

pub struct WindowsRegistryAdapter;

impl RegistryAdapter for WindowsRegistryAdapter {
    fn read_string_values(&self, key_path: &str) -> Vec<String> {
        let mut values = Vec::new();
        for key in view_variants(key_path) {
            let escaped = key.replace('\'', "''");
            let script = format!(
                "Get-ItemProperty -Path 'Registry::{escaped}' -ErrorAction SilentlyContinue | ConvertTo-Json"
            );
            let Some(output) = run_powershell(&script) else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(output.trim()) else {
                continue;
            };
            if let Some(object) = value.as_object() {
                for (name, prop) in object {
                    if name.starts_with("PS") {
                        continue;
                    }
                    if let Some(s) = prop.as_str() {
                        if !s.trim().is_empty() {
                            values.push(s.trim().to_string());
                        }
                    }
                }
            }
        }
        values
    }
}

/// HKLM keys are queried in both registry views; 32-bit software keys live
/// under WOW6432Node on 64-bit hosts.
fn view_variants(key_path: &str) -> Vec<String> {
    let mut keys = vec![key_path.to_string()];
    let upper = key_path.to_uppercase();
    if upper.starts_with("HKEY_LOCAL_MACHINE\\SOFTWARE\\")
        && !upper.contains("WOW6432NODE")
    {
        let rest = &key_path["HKEY_LOCAL_MACHINE\\SOFTWARE\\".len()..];
        keys.push(format!("HKEY_LOCAL_MACHINE\\SOFTWARE\\WOW6432Node\\{rest}"));
    }
    keys
}

fn non_empty_string(value: &serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn run_powershell(script: &str) -> Option<String> {
    run_capped(
        Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", script]),
        ADAPTER_TIMEOUT,
        OUTPUT_CAP,
    )
}

/// Run a command with a hard deadline and a bounded output buffer. Returns
/// `None` on spawn failure, non-zero exit, timeout, or output overflow.
fn run_capped(command: &mut Command, timeout: Duration, cap: usize) -> Option<String> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let mut stdout = child.stdout.take()?;
    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match stdout.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if buf.len() + n > cap {
                        return None;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                Err(_) => break,
            }
        }
        Some(buf)
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                tracing::warn!("adapter subprocess timed out; killing");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(25)),
            Err(_) => {
                let _ = child.kill();
                return None;
            }
        }
    };

    let buf = reader.join().ok()??;
    if !status.success() {
        return None;
    }
    String::from_utf8(buf).ok()
}
