//! Local middleware: a process spawned per invocation.

use crate::error::ProxyError;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalMiddleware {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl LocalMiddleware {
    /// Split `command` with shell-word rules into program and arguments.
    pub fn new(command: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let mut words = shell_words::split(command).map_err(|e| {
            ProxyError::MiddlewareUnavailable(format!("cannot parse command '{command}': {e}"))
        })?;
        if words.is_empty() {
            return Err(ProxyError::MiddlewareUnavailable(
                "empty middleware command".to_string(),
            ));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Write `payload` as one line to stdin and return stdout.
    ///
    /// The child is killed if the timeout elapses or the caller is dropped.
    pub async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProxyError::MiddlewareUnavailable(format!("failed to spawn '{}': {e}", self.program))
            })?;

        let stdin = child.stdin.take();
        let mut line = Vec::with_capacity(payload.len() + 1);
        line.extend_from_slice(payload);
        line.push(b'\n');

        let write = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&line).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                        debug!("Middleware closed stdin early");
                    }
                    Err(e) => debug!("Failed writing middleware stdin: {}", e),
                }
            }
        };

        let run = async {
            let (_, output) = tokio::join!(write, child.wait_with_output());
            output
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProxyError::MiddlewareInvalidOutput(format!(
                    "failed to collect output: {e}"
                )))
            }
            Err(_) => return Err(ProxyError::MiddlewareTimeout(self.timeout)),
        };

        if !output.stderr.is_empty() {
            debug!(
                program = %self.program,
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                "Middleware stderr"
            );
        }

        if !output.status.success() {
            return Err(ProxyError::MiddlewareInvalidOutput(format!(
                "'{}' exited with {}",
                self.program, output.status
            )));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(ProxyError::MiddlewareInvalidOutput(
                "empty output".to_string(),
            ));
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout_ms: u64) -> LocalMiddleware {
        LocalMiddleware {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[test]
    fn test_command_is_split_with_shell_rules() {
        let mw = LocalMiddleware::new(r#"python3 "my script.py" --flag"#, Duration::from_secs(1))
            .unwrap();
        assert_eq!(mw.program(), "python3");
        assert_eq!(mw.args, vec!["my script.py", "--flag"]);
        assert!(LocalMiddleware::new("   ", Duration::from_secs(1)).is_err());
        assert!(LocalMiddleware::new("unterminated 'quote", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_identity_exchange() {
        let out = sh("cat", 5000).exchange(br#"{"a":1}"#).await.unwrap();
        assert_eq!(out, b"{\"a\":1}\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let err = sh("exit 2", 5000).exchange(b"{}").await.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareInvalidOutput(_)));
    }

    #[tokio::test]
    async fn test_empty_output() {
        let err = sh("cat > /dev/null", 5000).exchange(b"{}").await.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareInvalidOutput(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = sh("sleep 5", 100).exchange(b"{}").await.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareTimeout(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mw = LocalMiddleware::new("/nonexistent/decoy-middleware", Duration::from_secs(1))
            .unwrap();
        let err = mw.exchange(b"{}").await.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareUnavailable(_)));
    }

    #[tokio::test]
    async fn test_ignoring_stdin_is_not_an_error() {
        let out = sh("echo '{}'", 5000).exchange(&[b'x'; 200_000]).await.unwrap();
        assert_eq!(out, b"{}\n");
    }
}
