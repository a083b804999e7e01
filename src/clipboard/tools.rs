use super::{CopyMethod, CopyTool};
use std::io::Write;
use std::process::{Command, Stdio};

/// How text is encoded on a tool's stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    /// `clip.exe` reads UTF-16LE with a BOM.
    Utf16Le,
}

/// A clipboard program fed through stdin.
struct CommandTool {
    method: CopyMethod,
    program: &'static str,
    args: &'static [&'static str],
    encoding: Encoding,
}

impl CommandTool {
    const fn new(method: CopyMethod, program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            method,
            program,
            args,
            encoding: Encoding::Utf8,
        }
    }

    const fn utf16(mut self) -> Self {
        self.encoding = Encoding::Utf16Le;
        self
    }
}

fn encode(text: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Utf16Le => {
            let mut bytes = vec![0xFF, 0xFE];
            bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
            bytes
        }
    }
}

impl CopyTool for CommandTool {
    fn method(&self) -> CopyMethod {
        self.method
    }

    fn is_available(&self) -> bool {
        which::which(self.program).is_ok()
    }

    fn copy_text(&self, text: &str) -> Result<(), String> {
        // xclip and wl-copy fork a selection owner that outlives the call;
        // no output pipe may be left for it to hold open.
        let mut child = Command::new(self.program)
            .args(self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("spawning {}: {e}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&encode(text, self.encoding))
                .map_err(|e| format!("writing to {}: {e}", self.program))?;
        }

        let status = child
            .wait()
            .map_err(|e| format!("waiting for {}: {e}", self.program))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{} exited with {status}", self.program))
        }
    }
}

/// In-process clipboard through `arboard`.
struct Native;

impl CopyTool for Native {
    fn method(&self) -> CopyMethod {
        CopyMethod::Native
    }

    fn is_available(&self) -> bool {
        true
    }

    fn copy_text(&self, text: &str) -> Result<(), String> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
        clipboard.set_text(text.to_string()).map_err(|e| e.to_string())
    }
}

fn is_wsl() -> bool {
    std::env::var_os("WSL_DISTRO_NAME").is_some_and(|v| !v.is_empty())
}

/// Tools for this platform, in priority order.
///
/// On Linux the external programs come first: they keep serving the
/// selection after this process exits, which an in-process X11 owner does
/// not.
pub fn platform_tools() -> Vec<Box<dyn CopyTool>> {
    let mut tools: Vec<Box<dyn CopyTool>> = Vec::new();

    #[cfg(target_os = "macos")]
    {
        tools.push(Box::new(CommandTool::new(CopyMethod::Pbcopy, "pbcopy", &[])));
        tools.push(Box::new(Native));
    }

    #[cfg(target_os = "linux")]
    {
        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            tools.push(Box::new(CommandTool::new(CopyMethod::WlCopy, "wl-copy", &[])));
        }
        if std::env::var_os("DISPLAY").is_some() {
            tools.push(Box::new(CommandTool::new(
                CopyMethod::Xclip,
                "xclip",
                &["-selection", "clipboard"],
            )));
            tools.push(Box::new(CommandTool::new(
                CopyMethod::Xsel,
                "xsel",
                &["--clipboard", "--input"],
            )));
            tools.push(Box::new(Native));
        }
        if is_wsl() {
            tools.push(Box::new(CommandTool::new(CopyMethod::SafeClip, "safe-clip", &[])));
            tools.push(Box::new(CommandTool::new(CopyMethod::ClipExe, "clip.exe", &[]).utf16()));
        }
    }

    #[cfg(target_os = "windows")]
    {
        tools.push(Box::new(Native));
        tools.push(Box::new(CommandTool::new(CopyMethod::ClipExe, "clip.exe", &[]).utf16()));
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = is_wsl;
        tools.push(Box::new(Native));
    }

    tools
}
