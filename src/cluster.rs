//! PowerShell scripts for the failover cluster cmdlets
//!
//! Scripts run on the remote host through `-EncodedCommand`, so they never
//! pass through a remote shell's quoting rules. Failures are reported as
//! the exception message on stderr with exit code 1.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reconcile::{ClusterLevel, RemoteError};

/// Script printing `"<functional level> <upgrade version>"` for `target`.
pub fn query_script(target: &str) -> String {
    wrap(&format!(
        "    $cluster = Get-Cluster -Name {}\n    '{{0}} {{1}}' -f [int64]$cluster.ClusterFunctionalLevel, [int64]$cluster.ClusterUpgradeVersion",
        quote(target)
    ))
}

/// Script forcing a functional level upgrade on `target`.
pub fn upgrade_script(target: &str) -> String {
    wrap(&format!(
        "    Update-ClusterFunctionalLevel -Cluster {} -Force | Out-Null",
        quote(target)
    ))
}

/// Parse the query script output into a [`ClusterLevel`].
pub fn parse_state(output: &str) -> Result<ClusterLevel, RemoteError> {
    let line = output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| RemoteError::Parse("empty response from Get-Cluster".to_string()))?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    let [level, version] = fields.as_slice() else {
        return Err(RemoteError::Parse(line.to_string()));
    };

    let level = level
        .parse::<i64>()
        .map_err(|_| RemoteError::Parse(line.to_string()))?;
    let version = version
        .parse::<i64>()
        .map_err(|_| RemoteError::Parse(line.to_string()))?;

    Ok(ClusterLevel::new(level, version))
}

/// Encode a script for `powershell -EncodedCommand` (base64 of UTF-16LE).
pub fn encode_command(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(bytes)
}

/// Single-quote a PowerShell string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn wrap(body: &str) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'\n\
         $ProgressPreference = 'SilentlyContinue'\n\
         try {{\n\
         {body}\n\
         }} catch {{\n    \
         [Console]::Error.WriteLine($_.Exception.Message)\n    \
         exit 1\n\
         }}"
    )
}
